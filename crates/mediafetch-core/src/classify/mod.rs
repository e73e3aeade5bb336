//! Filename classification.
//!
//! Maps a release-style filename to a media category and a destination
//! path relative to the storage root:
//!
//! - `Movies/<Title> (<Year>)/<Title> (<Year>).<ext>`
//! - `Series/<Title>[ (<Year>)]/Season <N>/<Title> S<NN>E<NN>.<ext>`
//! - `Other/<filename>`
//!
//! Classification is a pure function of the filename: no filesystem access,
//! identical input always yields identical output. When the filename does
//! not settle the category the result is [`MediaCategory::Undetermined`] and
//! carries no path; the caller must supply a [`ChosenCategory`] and call
//! [`classify_as`].

mod tokens;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level folder for movies.
pub const MOVIES_DIR: &str = "Movies";
/// Top-level folder for series.
pub const SERIES_DIR: &str = "Series";
/// Top-level folder for everything else.
pub const OTHER_DIR: &str = "Other";

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:19|20|21)\d{2}$").expect("year pattern is valid"));
static MULTI_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^s([0o]?\d{1,2})e(\d{2})(?:e\d{2}|-\d{2})+$")
        .expect("multi-episode pattern is valid")
});
static SEASON_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^s([0o]?\d{1,2})e(\d{1,3})$").expect("season/episode pattern is valid")
});
static CROSS_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[xX](\d{1,3})$").expect("NxM pattern is valid"));
static THREE_DIGIT_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d)(\d{2})$").expect("NNN pattern is valid"));
static DUPLICATE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d+$").expect("duplicate suffix pattern is valid"));

/// Media category of a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    /// A feature film.
    Movie,
    /// An episode of a series.
    Series,
    /// Anything that is neither.
    Other,
    /// The filename was ambiguous; an explicit choice is required.
    Undetermined,
}

impl MediaCategory {
    /// Convert to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Other => "other",
            Self::Undetermined => "undetermined",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An explicit category decision supplied from outside the classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChosenCategory {
    /// File it as a movie.
    Movie,
    /// File it as a series episode.
    Series,
    /// File it under `Other`.
    Other,
}

impl From<ChosenCategory> for MediaCategory {
    fn from(choice: ChosenCategory) -> Self {
        match choice {
            ChosenCategory::Movie => Self::Movie,
            ChosenCategory::Series => Self::Series,
            ChosenCategory::Other => Self::Other,
        }
    }
}

/// A category string that is not one of movie, series or other.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown category '{0}' (expected movie, series or other)")]
pub struct UnknownCategory(pub String);

impl FromStr for ChosenCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" | "film" | "m" => Ok(Self::Movie),
            "series" | "show" | "tv" | "s" => Ok(Self::Series),
            "other" | "o" => Ok(Self::Other),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// Result of classifying a filename.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Category guessed or chosen.
    pub category: MediaCategory,
    /// Normalized title (show title for series).
    pub title: String,
    /// Release year (show year for series).
    pub year: Option<u16>,
    /// Season number for series.
    pub season: Option<u32>,
    /// Episode number for series.
    pub episode: Option<u32>,
    /// Edition markers such as "Extended Remastered".
    pub edition: Option<String>,
    /// Destination relative to the storage root; `None` while undetermined.
    pub relative_path: Option<PathBuf>,
}

impl Classification {
    /// Whether a destination path is available.
    pub const fn is_determined(&self) -> bool {
        self.relative_path.is_some()
    }

    /// Absolute destination under `root`, if determined.
    pub fn destination(&self, root: &Path) -> Option<PathBuf> {
        self.relative_path.as_ref().map(|rel| root.join(rel))
    }
}

/// Classify a filename by its own tokens.
pub fn classify(filename: &str) -> Classification {
    let analysis = Analysis::new(filename);
    match analysis.guess() {
        Guess::Series(episode) => analysis.series(episode),
        Guess::Movie(index, year) => analysis.movie(analysis.title_from(index, None), Some(year)),
        Guess::Other => analysis.other(),
        Guess::Undetermined => analysis.undetermined(),
    }
}

/// Classify a filename under an explicit category decision.
///
/// Missing pieces are filled deterministically: a movie without a year is
/// filed under its bare title, a series without an episode token becomes
/// S01E01.
pub fn classify_as(filename: &str, choice: ChosenCategory) -> Classification {
    let analysis = Analysis::new(filename);
    match choice {
        ChosenCategory::Movie => match analysis.year_before(analysis.tokens.len()) {
            Some((index, year)) if index > 0 => {
                analysis.movie(analysis.title_from(index, None), Some(year))
            }
            _ => analysis.movie(analysis.full_title(), None),
        },
        ChosenCategory::Series => match analysis.episode {
            Some(episode) => analysis.series(episode),
            None => analysis.default_series(),
        },
        ChosenCategory::Other => analysis.other(),
    }
}

/// Path for a file kept under its own name at the root (organization off).
pub fn flat_path(filename: &str) -> PathBuf {
    PathBuf::from(sanitize_filename(filename))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strength {
    /// `SxxEyy`, multi-episode or `NxM`.
    Strong,
    /// Bare three-digit run such as `205`.
    Weak,
}

#[derive(Clone, Copy, Debug)]
struct EpisodeToken {
    index: usize,
    season: u32,
    episode: u32,
    strength: Strength,
}

enum Guess {
    Series(EpisodeToken),
    Movie(usize, u16),
    Other,
    Undetermined,
}

struct Analysis {
    filename: String,
    ext: String,
    tokens: Vec<String>,
    edition: Option<String>,
    episode: Option<EpisodeToken>,
    years: Vec<(usize, u16)>,
}

impl Analysis {
    fn new(filename: &str) -> Self {
        let filename = base_name(filename);
        let (stem, ext) = split_extension(filename);
        let stem = DUPLICATE_SUFFIX.replace(stem, "");

        let (edition_tokens, tokens): (Vec<String>, Vec<String>) =
            tokenize(&stem).into_iter().partition(|t| tokens::is_edition(t));
        let edition = dedup_edition(&edition_tokens);

        let episode = tokens.iter().enumerate().find_map(|(index, token)| {
            episode_token(token).map(|(season, episode, strength)| EpisodeToken {
                index,
                season,
                episode,
                strength,
            })
        });
        let years = tokens
            .iter()
            .enumerate()
            .filter_map(|(index, token)| parse_year(token).map(|year| (index, year)))
            .collect();

        Self {
            filename: filename.to_string(),
            ext: ext.to_string(),
            tokens,
            edition,
            episode,
            years,
        }
    }

    fn guess(&self) -> Guess {
        if let Some(episode) = self.episode {
            if episode.strength == Strength::Weak && !self.years.is_empty() {
                return Guess::Undetermined;
            }
            if self.title_from(episode.index, None).is_empty() {
                return Guess::Undetermined;
            }
            return Guess::Series(episode);
        }

        match self.year_before(self.tokens.len()) {
            None => Guess::Other,
            Some((0, _)) => Guess::Undetermined,
            Some((index, year)) => {
                if self.title_from(index, None).is_empty() {
                    Guess::Undetermined
                } else {
                    Guess::Movie(index, year)
                }
            }
        }
    }

    /// Last year candidate before `end`; earlier candidates belong to the title.
    fn year_before(&self, end: usize) -> Option<(usize, u16)> {
        self.years.iter().copied().filter(|(i, _)| *i < end).last()
    }

    fn title_from(&self, end: usize, skip: Option<usize>) -> String {
        let picked: Vec<&str> = self.tokens[..end]
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(_, t)| t.as_str())
            .collect();
        build_title(&picked)
    }

    fn full_title(&self) -> String {
        let title = self.title_from(self.tokens.len(), None);
        if title.is_empty() {
            "Untitled".to_string()
        } else {
            title
        }
    }

    /// Show title and year for an episode token at `index`.
    fn show_title(&self, index: usize) -> (String, Option<u16>) {
        if let Some((year_index, year)) = self.year_before(index) {
            let title = self.title_from(index, Some(year_index));
            if !title.is_empty() {
                return (title, Some(year));
            }
        }
        let title = self.title_from(index, None);
        if title.is_empty() {
            (self.full_title(), None)
        } else {
            (title, None)
        }
    }

    fn movie(&self, title: String, year: Option<u16>) -> Classification {
        let stem = year.map_or_else(|| title.clone(), |y| format!("{title} ({y})"));
        let relative_path = Path::new(MOVIES_DIR)
            .join(&stem)
            .join(format!("{stem}{}", self.ext));
        Classification {
            category: MediaCategory::Movie,
            title,
            year,
            season: None,
            episode: None,
            edition: self.edition.clone(),
            relative_path: Some(relative_path),
        }
    }

    fn series(&self, token: EpisodeToken) -> Classification {
        let (title, year) = self.show_title(token.index);
        self.series_path(title, year, token.season, token.episode)
    }

    fn default_series(&self) -> Classification {
        let end = self.tokens.len();
        match self.year_before(end) {
            Some((index, year)) if index > 0 => {
                self.series_path(self.title_from(index, None), Some(year), 1, 1)
            }
            _ => self.series_path(self.full_title(), None, 1, 1),
        }
    }

    fn series_path(
        &self,
        title: String,
        year: Option<u16>,
        season: u32,
        episode: u32,
    ) -> Classification {
        let show_dir = year.map_or_else(|| title.clone(), |y| format!("{title} ({y})"));
        let relative_path = Path::new(SERIES_DIR)
            .join(show_dir)
            .join(format!("Season {season}"))
            .join(format!("{title} S{season:02}E{episode:02}{}", self.ext));
        Classification {
            category: MediaCategory::Series,
            title,
            year,
            season: Some(season),
            episode: Some(episode),
            edition: self.edition.clone(),
            relative_path: Some(relative_path),
        }
    }

    fn other(&self) -> Classification {
        Classification {
            category: MediaCategory::Other,
            title: self.title_from(self.tokens.len(), None),
            year: None,
            season: None,
            episode: None,
            edition: self.edition.clone(),
            relative_path: Some(Path::new(OTHER_DIR).join(sanitize_filename(&self.filename))),
        }
    }

    fn undetermined(&self) -> Classification {
        Classification {
            category: MediaCategory::Undetermined,
            title: self.full_title(),
            year: self.year_before(self.tokens.len()).map(|(_, y)| y),
            season: self.episode.map(|e| e.season),
            episode: self.episode.map(|e| e.episode),
            edition: self.edition.clone(),
            relative_path: None,
        }
    }
}

fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(dot) if dot > 0 && is_extension(&filename[dot + 1..]) => {
            (&filename[..dot], &filename[dot..])
        }
        _ => (filename, ""),
    }
}

fn is_extension(ext: &str) -> bool {
    (1..=5).contains(&ext.len())
        && ext.bytes().all(|b| b.is_ascii_alphanumeric())
        && ext.bytes().any(|b| b.is_ascii_alphabetic())
}

fn tokenize(stem: &str) -> Vec<String> {
    stem.split(['.', '_', ' '])
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedup_edition(tokens: &[String]) -> Option<String> {
    let mut seen: Vec<String> = Vec::new();
    for token in tokens {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(token)) {
            seen.push(token.clone());
        }
    }
    if seen.is_empty() {
        return None;
    }
    Some(
        seen.iter()
            .map(|w| normalize_word(w))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn episode_token(token: &str) -> Option<(u32, u32, Strength)> {
    if let Some(caps) = MULTI_EPISODE
        .captures(token)
        .or_else(|| SEASON_EPISODE.captures(token))
    {
        let season = caps[1].replace(['o', 'O'], "0").parse().ok()?;
        let episode = caps[2].parse().ok()?;
        return Some((season, episode, Strength::Strong));
    }
    if let Some(caps) = CROSS_EPISODE.captures(token) {
        return Some((caps[1].parse().ok()?, caps[2].parse().ok()?, Strength::Strong));
    }
    let caps = THREE_DIGIT_EPISODE.captures(token)?;
    let episode: u32 = caps[2].parse().ok()?;
    (episode < 60).then_some((caps[1].parse().ok()?, episode, Strength::Weak))
}

fn parse_year(token: &str) -> Option<u16> {
    if YEAR.is_match(token) {
        token.parse().ok()
    } else {
        None
    }
}

fn build_title(tokens: &[&str]) -> String {
    let cleaned: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !tokens::is_noise(t))
        .collect();
    let source = if cleaned.is_empty() { tokens } else { &cleaned };
    let joined = source
        .iter()
        .map(|w| normalize_word(w))
        .collect::<Vec<_>>()
        .join(" ");
    sanitize_component(&joined)
}

/// Short all-caps words (acronyms) are kept; everything else is capitalized.
fn normalize_word(word: &str) -> String {
    let has_cased = word.chars().any(char::is_alphabetic);
    let all_upper = has_cased && !word.chars().any(char::is_lowercase);
    if all_upper && word.chars().count() <= 4 {
        return word.to_string();
    }
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect()
    })
}

fn is_path_hostile(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

/// Make a single path component out of title text.
fn sanitize_component(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if is_path_hostile(c) { ' ' } else { c })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches('.').trim().to_string()
}

/// Keep the original filename, minus anything that could escape its folder.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = base_name(filename)
        .chars()
        .map(|c| if is_path_hostile(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}
