use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mgl_assist::Result;
use mgl_assist::commands::{ask, build, chat, show_status};
use mgl_assist::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "mgl-assist")]
#[command(about = "Retrieval-grounded assistant for Massachusetts real-estate law")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure API connection and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the vector index from a directory of statute section files
    Build {
        /// Directory containing one .txt file per statute section
        corpus_dir: PathBuf,
    },
    /// Start the interactive retrieval-grounded chat session
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// The question to ask
        question: String,
    },
    /// Show index artifacts and configuration status
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Build { corpus_dir } => {
            build(&corpus_dir)?;
        }
        Commands::Chat => {
            chat()?;
        }
        Commands::Ask { question } => {
            ask(&question)?;
        }
        Commands::Status => {
            show_status()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["mgl-assist", "chat"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Chat));
        }
    }

    #[test]
    fn build_command_with_directory() {
        let cli = Cli::try_parse_from(["mgl-assist", "build", "./sections"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Build { corpus_dir } = parsed.command {
                assert_eq!(corpus_dir, PathBuf::from("./sections"));
            }
        }
    }

    #[test]
    fn build_command_requires_directory() {
        let cli = Cli::try_parse_from(["mgl-assist", "build"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn ask_command_with_question() {
        let cli = Cli::try_parse_from(["mgl-assist", "ask", "Can my landlord raise the rent?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question } = parsed.command {
                assert_eq!(question, "Can my landlord raise the rent?");
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["mgl-assist", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["mgl-assist", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["mgl-assist", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
