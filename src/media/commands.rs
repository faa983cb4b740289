use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::error::{MutecutError, Result};
use crate::style::CaptionStyleSheet;
use crate::timeline::FilterGraph;

/// Bytes of engine diagnostics retained per invocation.
pub const DIAGNOSTIC_TAIL_BYTES: usize = 2048;

/// Characters of the diagnostic tail surfaced in user-facing errors.
pub const DIAGNOSTIC_EXCERPT_CHARS: usize = 200;

/// Rolling window over the last lines of a diagnostic stream. Whole lines are
/// dropped from the front once the byte budget is exceeded.
#[derive(Debug)]
pub struct DiagnosticTail {
    lines: VecDeque<String>,
    bytes: usize,
    capacity: usize,
}

impl DiagnosticTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            capacity,
        }
    }

    pub fn push(&mut self, line: &str) {
        // An over-long line keeps its end, where the error text sits
        let mut start = (line.len() + 1).saturating_sub(self.capacity);
        while !line.is_char_boundary(start) {
            start += 1;
        }
        let mut line = line[start..].to_string();
        line.push('\n');
        self.bytes += line.len();
        self.lines.push_back(line);

        while self.bytes > self.capacity {
            match self.lines.pop_front() {
                Some(dropped) => self.bytes -= dropped.len(),
                None => break,
            }
        }
    }

    pub fn into_string(self) -> String {
        self.lines.into_iter().collect()
    }
}

/// Result of running the engine: exit code plus the retained diagnostic tail.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub diagnostic_tail: String,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Last `max_chars` characters of `text`, ignoring trailing whitespace.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim_end();
    let skip = text.chars().count().saturating_sub(max_chars);
    text.chars().skip(skip).collect()
}

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    pub fn audio_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-af").arg(filter)
    }

    pub fn filter_complex<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-filter_complex").arg(graph)
    }

    pub fn map<S: Into<String>>(self, label: S) -> Self {
        self.arg("-map").arg(label)
    }

    /// Run the command, discarding stdout and keeping only the last
    /// [`DIAGNOSTIC_TAIL_BYTES`] of stderr. Every stderr line is also handed to
    /// `on_line` as it arrives.
    pub async fn invoke_with<F>(&self, mut on_line: F) -> Result<EngineOutput>
    where
        F: FnMut(&str) + Send,
    {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MutecutError::Engine {
                message: format!("Failed to execute media processor: {}", e),
                exit_code: None,
                diagnostics: String::new(),
            })?;

        let mut tail = DiagnosticTail::new(DIAGNOSTIC_TAIL_BYTES);
        let read = match child.stderr.take() {
            Some(stderr) => read_diagnostics(stderr, &mut tail, &mut on_line).await,
            None => Ok(()),
        };

        // Reap the child even when reading its diagnostics failed
        let status = child.wait().await?;
        read?;

        Ok(EngineOutput {
            exit_code: status.code(),
            diagnostic_tail: tail.into_string(),
        })
    }

    pub async fn invoke(&self) -> Result<EngineOutput> {
        self.invoke_with(|_| {}).await
    }

    /// Run the command and turn a non-zero exit into [`MutecutError::Engine`].
    pub async fn execute(&self) -> Result<EngineOutput> {
        let output = self.invoke().await?;
        output.into_result(&self.description)
    }
}

/// Split a diagnostic stream into lines on `\n` or `\r` (progress updates
/// end in a bare carriage return) and decode each one lossily. A line never
/// grows past twice the tail budget; older bytes are dropped first.
async fn read_diagnostics<R, F>(
    stream: R,
    tail: &mut DiagnosticTail,
    on_line: &mut F,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(stream);
    let mut pending: Vec<u8> = Vec::new();

    let mut emit = |bytes: &[u8], tail: &mut DiagnosticTail| {
        if bytes.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(bytes);
        on_line(&line);
        tail.push(&line);
    };

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            break;
        }
        let consumed = chunk.len();

        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                emit(&pending, tail);
                pending.clear();
            } else {
                pending.push(byte);
                if pending.len() > 2 * DIAGNOSTIC_TAIL_BYTES {
                    pending.drain(..pending.len() - DIAGNOSTIC_TAIL_BYTES);
                }
            }
        }
        reader.consume(consumed);
    }

    emit(&pending, tail);
    Ok(())
}

impl EngineOutput {
    pub fn into_result(self, description: &str) -> Result<EngineOutput> {
        if self.success() {
            return Ok(self);
        }
        Err(MutecutError::Engine {
            message: format!(
                "{} failed: {}",
                description,
                excerpt(&self.diagnostic_tail, DIAGNOSTIC_EXCERPT_CHARS)
            ),
            exit_code: self.exit_code,
            diagnostics: self.diagnostic_tail,
        })
    }
}

/// Builder for the commands the job pipelines run
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Analysis-only pass that prints `silence_start` / `silence_end` markers
    pub fn detect_silence<P: AsRef<Path>>(
        &self,
        video_path: P,
        noise_level: &str,
        min_duration: f64,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Silence detection")
            .input(video_path)
            .audio_filter(format!(
                "silencedetect=noise={}:d={}",
                noise_level, min_duration
            ))
            .arg("-f")
            .arg("null")
            .arg("-")
    }

    /// Re-encode only the kept segments described by `graph`
    pub fn remove_silence<P: AsRef<Path>>(
        &self,
        video_path: P,
        output_path: P,
        graph: &FilterGraph,
        encoding: &EncodingOptions,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "FFmpeg processing")
            .input(video_path)
            .filter_complex(graph.as_str())
            .map(FilterGraph::VIDEO_OUT)
            .map(FilterGraph::AUDIO_OUT)
            .video_codec(&encoding.video_codec)
            .arg("-preset")
            .arg(&encoding.preset)
            .arg("-crf")
            .arg(encoding.crf.to_string())
            .audio_codec(&encoding.audio_codec)
            .arg("-b:a")
            .arg(&encoding.audio_bitrate)
            .output(output_path)
            .overwrite()
    }

    /// Burn an SRT file into the video stream with a forced ASS style
    pub fn burn_captions<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        output_path: P,
        fonts_dir: &Path,
        style: &CaptionStyleSheet,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Caption burning")
            .input(video_path)
            .video_filter(format!(
                "subtitles={}:fontsdir={}:force_style='{}'",
                subtitle_path.as_ref().display(),
                fonts_dir.display(),
                style.force_style()
            ))
            .copy_audio()
            .output(output_path)
            .overwrite()
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

/// Encoder settings for silence removal output
#[derive(Debug, Clone)]
pub struct EncodingOptions {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::CaptionStyleOverrides;
    use crate::timeline::KeepSegment;

    #[test]
    fn test_tail_drops_oldest_lines() {
        let mut tail = DiagnosticTail::new(10);
        tail.push("aaaa");
        tail.push("bbbb");
        tail.push("cccc");
        assert_eq!(tail.into_string(), "bbbb\ncccc\n");
    }

    #[test]
    fn test_tail_keeps_everything_under_budget() {
        let mut tail = DiagnosticTail::new(DIAGNOSTIC_TAIL_BYTES);
        for i in 0..10 {
            tail.push(&format!("frame={}", i));
        }
        assert!(tail.into_string().starts_with("frame=0\n"));
    }

    #[test]
    fn test_failed_output_carries_excerpt() {
        let output = EngineOutput {
            exit_code: Some(1),
            diagnostic_tail: "x".repeat(500),
        };
        match output.into_result("Caption burning") {
            Err(MutecutError::Engine { message, exit_code, diagnostics }) => {
                assert_eq!(message, format!("Caption burning failed: {}", "x".repeat(200)));
                assert_eq!(exit_code, Some(1));
                assert_eq!(diagnostics.len(), 500);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_remove_silence_args() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let graph = FilterGraph::build(&[KeepSegment { start: 0.0, end: 1.0 }]);
        let encoding = EncodingOptions {
            video_codec: "libx264".into(),
            preset: "medium".into(),
            crf: 23,
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
        };
        let cmd = builder.remove_silence("in.mp4", "out.mp4", &graph, &encoding);

        assert_eq!(&cmd.args[..2], &["-i".to_string(), "in.mp4".to_string()]);
        assert!(cmd.args.windows(2).any(|w| w == ["-map", "[outv]"]));
        assert!(cmd.args.windows(2).any(|w| w == ["-crf", "23"]));
        assert_eq!(cmd.args.last().unwrap(), "-y");
    }

    #[test]
    fn test_burn_captions_filter() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let style = CaptionStyleSheet::resolve(None, CaptionStyleOverrides::default());
        let cmd = builder.burn_captions(
            Path::new("in.mp4"),
            Path::new("subs.srt"),
            Path::new("out.mp4"),
            Path::new("fonts"),
            &style,
        );
        let vf = &cmd.args[cmd.args.iter().position(|a| a == "-vf").unwrap() + 1];
        assert!(vf.starts_with("subtitles=subs.srt:fontsdir=fonts:force_style='FontName=DejaVu Sans,"));
        assert!(cmd.args.windows(2).any(|w| w == ["-c:a", "copy"]));
    }

    #[test]
    fn test_tail_keeps_end_of_overlong_line() {
        let mut tail = DiagnosticTail::new(DIAGNOSTIC_TAIL_BYTES);
        tail.push(&format!("{}Conversion failed!", "x".repeat(5000)));
        let kept = tail.into_string();
        assert_eq!(kept.len(), DIAGNOSTIC_TAIL_BYTES);
        assert!(kept.ends_with("Conversion failed!\n"));
    }

    #[test]
    fn test_excerpt_takes_the_end() {
        assert_eq!(excerpt("frame=1\nError opening output\n", 12), "ening output");
        assert_eq!(excerpt("short", 200), "short");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_utf8_diagnostics_keep_exit_code() {
        let cmd = MediaCommand::new("sh", "Caption burning")
            .arg("-c")
            .arg(r"printf 'title: caf\351\n' >&2; printf 'Conversion failed!\n' >&2; exit 1");

        match cmd.execute().await {
            Err(MutecutError::Engine { message, exit_code, diagnostics }) => {
                assert_eq!(exit_code, Some(1));
                assert!(diagnostics.contains("title: caf\u{FFFD}"));
                assert_eq!(message, format!("Caption burning failed: {}", diagnostics.trim_end()));
                assert!(message.ends_with("Conversion failed!"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_carriage_return_progress_does_not_hide_error() {
        let cmd = MediaCommand::new("sh", "FFmpeg processing").arg("-c").arg(
            r"i=0; while [ $i -lt 40 ]; do printf 'frame=%4d fps=25 q=28.0 size=    1024kB time=00:00:01.00 bitrate=8000.0kbits/s speed=1.0x    \r' $i >&2; i=$((i+1)); done; printf '[aac @ 0x1] Error encoding frame: Invalid data found\n' >&2; exit 1",
        );

        let mut lines = 0;
        let output = cmd.invoke_with(|_| lines += 1).await.unwrap();
        assert_eq!(lines, 41);
        assert!(output.diagnostic_tail.len() <= DIAGNOSTIC_TAIL_BYTES);
        assert!(output.diagnostic_tail.contains("frame=  39"));

        match output.into_result("FFmpeg processing") {
            Err(MutecutError::Engine { message, .. }) => {
                assert!(message.ends_with("Error encoding frame: Invalid data found"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_error() {
        let cmd = MediaCommand::new("/nonexistent/mutecut-engine", "Probe");
        assert!(matches!(cmd.invoke().await, Err(MutecutError::Engine { .. })));
    }
}
