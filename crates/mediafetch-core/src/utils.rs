//! Small formatting helpers shared by adapters.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with binary units and at most two decimals.
///
/// Values beyond the terabyte range stay in TB.
#[allow(clippy::cast_precision_loss)]
pub fn humanize_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_size() {
        assert_eq!(humanize_size(0), "0 B");
        assert_eq!(humanize_size(512), "512 B");
        assert_eq!(humanize_size(1536), "1.5 KB");
        assert_eq!(humanize_size(200 * 1024 * 1024), "200 MB");
        assert_eq!(humanize_size(1_288_490_189), "1.2 GB");
    }

    #[test]
    fn test_humanize_size_caps_at_tb() {
        let huge = 3 * 1024_u64.pow(5);
        assert_eq!(humanize_size(huge), "3072 TB");
    }
}
