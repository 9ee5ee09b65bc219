use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Community board for submitting and voting on Solana tokens", long_about = None)]
pub struct Cli {
    /// Path to the configuration file (defaults to config/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Override the listen address from the configuration, e.g. 0.0.0.0:8080
    #[arg(long)]
    pub bind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["token-vote-board", "--config", "board.toml", "-d", "--bind", "0.0.0.0:9000"]);
        assert_eq!(cli.config, Some(PathBuf::from("board.toml")));
        assert!(cli.debug);
        assert_eq!(cli.bind.as_deref(), Some("0.0.0.0:9000"));
        assert!(cli.log_file.is_none());
    }
}
