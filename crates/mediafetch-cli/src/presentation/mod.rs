//! Shared CLI presentation utilities.
//!
//! Format-only: no domain decisions are made here.

pub mod progress;

pub use progress::ProgressBoard;

use mediafetch_core::{Classification, MediaCategory};

/// Multi-line description of a classification.
pub fn format_classification(filename: &str, classification: &Classification) -> String {
    let mut lines = vec![filename.to_string()];
    lines.push(format!("  Category: {}", classification.category.as_str()));
    if !classification.title.is_empty() {
        lines.push(format!("  Title:    {}", classification.title));
    }
    if let Some(year) = classification.year {
        lines.push(format!("  Year:     {year}"));
    }
    if let (Some(season), Some(episode)) = (classification.season, classification.episode) {
        lines.push(format!("  Episode:  S{season:02}E{episode:02}"));
    }
    if let Some(edition) = &classification.edition {
        lines.push(format!("  Edition:  {edition}"));
    }
    match &classification.relative_path {
        Some(path) => lines.push(format!("  Path:     {}", path.display())),
        None if classification.category == MediaCategory::Undetermined => {
            lines.push("  Path:     (pick one with --category movie|series|other)".to_string());
        }
        None => {}
    }
    lines.join("\n")
}

/// Print a horizontal separator line.
pub fn print_separator() {
    println!("{}", "─".repeat(60));
}
