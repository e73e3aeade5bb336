//! Token tables for release-style filenames.

/// Technical, quality and release-group markers dropped from titles.
const NOISE: &[&str] = &[
    // Resolutions / quality
    "1080p", "720p", "480p", "2160p", "1440p", "360p", "4k", "8k", "10bit", "uhd", "hdr",
    "hdr10", "hdr10plus", "dv", "dovi", "sdr",
    // Sources / codecs
    "webrip", "web", "web-dl", "webdl", "bluray", "brrip", "bdrip", "hdrip", "dvdrip", "hdtv",
    "x264", "x265", "h264", "h265", "avc", "hevc", "xvid", "remux",
    // Audio
    "aac", "dd5", "ddp5", "dts", "atmos", "truehd", "ac3", "mp3", "flac",
    // Release / language tags
    "multi", "farsi", "dubbed", "dual", "audio", "subs", "esubs", "hc", "proper", "repack",
    "internal", "cut", "uncut", "colorized",
    // Groups
    "pahe", "yts", "rarbg", "galaxyrg", "alphadl", "lama", "psa", "ntb", "evo", "tgx", "fg0",
    "geckos", "cmrg", "amzn",
    // Misc
    "sample", "ad",
];

/// Edition markers pulled out of the title and reported separately.
const EDITION: &[&str] = &[
    "extended",
    "remastered",
    "unrated",
    "imax",
    "directors",
    "director",
    "ultimate",
];

/// Whether `token` is a noise marker (case-insensitive).
pub(super) fn is_noise(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    NOISE.contains(&lower.as_str()) || is_channel_count(&lower)
}

/// Whether `token` is an edition marker (case-insensitive).
pub(super) fn is_edition(token: &str) -> bool {
    EDITION.contains(&token.to_ascii_lowercase().as_str())
}

/// `6ch`, `8ch` and friends.
fn is_channel_count(lower: &str) -> bool {
    lower
        .strip_suffix("ch")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
