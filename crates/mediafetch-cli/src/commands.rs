//! Subcommand definitions.

use clap::Subcommand;
use mediafetch_core::ChosenCategory;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download http(s) URLs or local files into the library
    Fetch {
        /// URLs or local paths to fetch
        #[arg(required = true)]
        sources: Vec<String>,
        /// Category for items the classifier cannot decide on
        #[arg(short, long)]
        category: Option<ChosenCategory>,
        /// Ask Kodi to play each finished file when nothing else is playing
        #[arg(long)]
        play: bool,
        /// Keep original filenames at the storage root
        #[arg(long)]
        no_organize: bool,
    },
    /// Show where files would be placed
    Classify {
        /// Filenames to classify
        #[arg(required = true)]
        filenames: Vec<String>,
        /// Apply an explicit category instead of guessing
        #[arg(short, long)]
        category: Option<ChosenCategory>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Remove incomplete staged files and keep complete ones
    Sweep,
    /// Show free space and the configured thresholds
    Disk,
    /// Print the effective configuration
    Config,
}
