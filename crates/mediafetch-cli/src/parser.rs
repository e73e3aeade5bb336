//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Fetch media into an organized local library.
#[derive(Parser, Debug)]
#[command(name = "mediafetch")]
#[command(about = "Download media with a bounded queue and organize it into a library")]
#[command(version)]
pub struct Cli {
    /// Override the storage root (DOWNLOAD_DIR) for this invocation
    #[arg(long = "download-dir", global = true)]
    pub download_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mediafetch_core::ChosenCategory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["mediafetch", "--verbose", "--download-dir", "/tmp/media", "disk"]);
        assert!(cli.verbose);
        assert_eq!(cli.download_dir, Some(PathBuf::from("/tmp/media")));
        assert!(matches!(cli.command, Commands::Disk));
    }

    #[test]
    fn test_fetch_args() {
        let cli = Cli::parse_from([
            "mediafetch",
            "fetch",
            "https://example.com/a.mkv",
            "./b.mp4",
            "--category",
            "series",
            "--play",
            "--no-organize",
        ]);
        let Commands::Fetch {
            sources,
            category,
            play,
            no_organize,
        } = cli.command
        else {
            panic!("expected fetch");
        };
        assert_eq!(sources, vec!["https://example.com/a.mkv", "./b.mp4"]);
        assert_eq!(category, Some(ChosenCategory::Series));
        assert!(play);
        assert!(no_organize);
    }

    #[test]
    fn test_fetch_requires_a_source() {
        assert!(Cli::try_parse_from(["mediafetch", "fetch"]).is_err());
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let parsed = Cli::try_parse_from(["mediafetch", "classify", "a.mkv", "--category", "music"]);
        assert!(parsed.is_err());
    }
}
