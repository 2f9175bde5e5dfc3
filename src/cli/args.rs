//! CLI argument parsing

use crate::baidu::{Lang, SourceLang};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Chat, translate, draw and speak through Qwen and Baidu APIs
#[derive(Debug, Parser)]
#[command(name = "vendorchat", version)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "vendorchat.toml", value_name = "PATH")]
    pub config: PathBuf,

    /// Log filter, e.g. `debug` or `vendorchat=trace` (overrides RUST_LOG)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Chat with Qwen; without TEXT, read one turn per stdin line
    Chat {
        text: Option<String>,
        /// History session key
        #[arg(long, value_name = "KEY")]
        session: Option<String>,
        /// Extra system description for this call
        #[arg(long)]
        system: Option<String>,
        /// Enable web search
        #[arg(long)]
        web: bool,
        /// Ask for inline citation marks (implies --web)
        #[arg(long)]
        web_mark: bool,
        /// Deep thinking (implies --stream)
        #[arg(long)]
        think: bool,
        /// Print the reply as it arrives
        #[arg(long)]
        stream: bool,
    },

    /// Polish a sentence with Qwen
    Polish { text: String },

    /// Chat with ERNIE; without TEXT, read one turn per stdin line
    Ernie {
        text: Option<String>,
        /// System character for this call
        #[arg(long, conflicts_with = "no_character")]
        character: Option<String>,
        /// Send no system character
        #[arg(long)]
        no_character: bool,
        #[arg(long, value_name = "KEY")]
        session: Option<String>,
    },

    /// Rewrite a sentence with ERNIE in a random tone
    Modify { text: String },

    /// Translate text
    Translate {
        text: String,
        /// Source language code, or `auto`
        #[arg(long)]
        from: Option<SourceLang>,
        /// Target language code
        #[arg(long)]
        to: Option<Lang>,
    },

    /// Generate an image and print its URL
    Image {
        text: String,
        /// Also download the image here
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
    },

    /// Synthesize speech
    Voice {
        text: String,
        /// Save the audio here (required without --job)
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Use a long-text job and print the audio URL
        #[arg(long)]
        job: bool,
    },

    /// Print request log statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_flags() {
        let args = Args::try_parse_from([
            "vendorchat",
            "--config",
            "c.toml",
            "chat",
            "hello",
            "--session",
            "s1",
            "--think",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("c.toml"));
        match args.command {
            Command::Chat {
                text,
                session,
                think,
                stream,
                ..
            } => {
                assert_eq!(text.as_deref(), Some("hello"));
                assert_eq!(session.as_deref(), Some("s1"));
                assert!(think);
                assert!(!stream);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_translate_languages() {
        let args =
            Args::try_parse_from(["vendorchat", "translate", "hi", "--from", "auto", "--to", "jp"])
                .unwrap();
        assert_eq!(
            args.command,
            Command::Translate {
                text: "hi".to_string(),
                from: Some(SourceLang::Auto),
                to: Some(Lang::Jp),
            }
        );
    }

    #[test]
    fn test_unknown_language_rejected() {
        assert!(Args::try_parse_from(["vendorchat", "translate", "hi", "--to", "xx"]).is_err());
    }

    #[test]
    fn test_character_conflicts() {
        assert!(Args::try_parse_from([
            "vendorchat",
            "ernie",
            "hi",
            "--character",
            "a",
            "--no-character"
        ])
        .is_err());
    }
}
