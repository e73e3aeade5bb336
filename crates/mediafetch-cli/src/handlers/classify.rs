//! Classify handler: shows where files would be placed without fetching.

use anyhow::{Context, Result};
use mediafetch_core::{ChosenCategory, Classification, classify, classify_as};
use serde::Serialize;

use crate::presentation::format_classification;

/// One classified filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedFile {
    /// Input filename.
    pub filename: String,
    /// Classifier output.
    #[serde(flatten)]
    pub classification: Classification,
}

/// Classify every filename, applying `category` when given.
pub fn classify_all(filenames: &[String], category: Option<ChosenCategory>) -> Vec<ClassifiedFile> {
    filenames
        .iter()
        .map(|filename| ClassifiedFile {
            filename: filename.clone(),
            classification: category.map_or_else(
                || classify(filename),
                |choice| classify_as(filename, choice),
            ),
        })
        .collect()
}

/// Execute the classify command.
pub fn execute(filenames: &[String], category: Option<ChosenCategory>, json: bool) -> Result<()> {
    let classified = classify_all(filenames, category);

    if json {
        let out = serde_json::to_string_pretty(&classified)
            .context("Failed to serialize classification")?;
        println!("{out}");
        return Ok(());
    }

    let blocks: Vec<String> = classified
        .iter()
        .map(|file| format_classification(&file.filename, &file.classification))
        .collect();
    println!("{}", blocks.join("\n\n"));
    Ok(())
}
