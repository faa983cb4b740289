use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cut silent passages out of a remote video
    RemoveSilence {
        /// Direct URL of the source video
        #[arg(short, long)]
        url: String,

        /// Noise floor below which audio counts as silence (e.g. -30dB)
        #[arg(short, long)]
        noise_level: Option<String>,

        /// Shortest pause in seconds that counts as silence
        #[arg(short, long)]
        min_duration: Option<f64>,

        /// Where to write the cleaned video
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Burn word-timed captions into a remote video
    BurnCaptions {
        /// Direct URL of the source video
        #[arg(short, long)]
        url: String,

        /// JSON file with a list of {start, end, text} words
        #[arg(short, long)]
        words: PathBuf,

        /// Words per caption in grouped mode
        #[arg(long)]
        words_per_line: Option<usize>,

        /// Caption layout: grouped or word-by-word
        #[arg(long)]
        caption_style: Option<String>,

        /// Upper-case all caption text
        #[arg(long)]
        all_caps: bool,

        /// Style preset: default, tiktok, youtube, minimal, hormozi
        #[arg(long)]
        style_preset: Option<String>,

        /// Style overrides as a JSON object
        #[arg(long)]
        style: Option<String>,

        /// Where to write the captioned video
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Report silence in a remote video without modifying it
    Info {
        /// Direct URL of the source video
        #[arg(short, long)]
        url: String,

        #[arg(short, long)]
        noise_level: Option<String>,

        #[arg(short, long)]
        min_duration: Option<f64>,
    },

    /// Build an SRT file from a word list
    Srt {
        /// JSON file with a list of {start, end, text} words
        #[arg(short, long)]
        words: PathBuf,

        #[arg(long)]
        words_per_line: Option<usize>,

        #[arg(long)]
        caption_style: Option<String>,

        #[arg(long)]
        all_caps: bool,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_burn_captions() {
        let args = Args::try_parse_from([
            "mutecut",
            "--verbose",
            "burn-captions",
            "--url",
            "https://cdn.example.com/v.mp4",
            "--words",
            "words.json",
            "--caption-style",
            "word-by-word",
            "--all-caps",
            "--output",
            "out.mp4",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Commands::BurnCaptions {
                caption_style,
                all_caps,
                words_per_line,
                ..
            } => {
                assert_eq!(caption_style.as_deref(), Some("word-by-word"));
                assert!(all_caps);
                assert_eq!(words_per_line, None);
            }
            _ => panic!("expected burn-captions"),
        }
    }

    #[test]
    fn test_remove_silence_requires_output() {
        assert!(
            Args::try_parse_from(["mutecut", "remove-silence", "--url", "https://x/v.mp4"]).is_err()
        );
    }
}
