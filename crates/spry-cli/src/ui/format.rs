//! Formatting for build report sizes and timings.

use std::time::Duration;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Size of a written artifact, e.g. `"812 B"` or `"14.2 KB"`.
///
/// ```
/// use spry_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(812), "812 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    match bytes {
        b if b < KIB => format!("{} B", b),
        b if b < MIB => format!("{:.1} KB", b as f64 / KIB as f64),
        b => format!("{:.1} MB", b as f64 / MIB as f64),
    }
}

/// Build time: whole milliseconds below a second, seconds above.
///
/// ```
/// use std::time::Duration;
/// use spry_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_micros(2_400)), "2ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_switch_units_at_boundaries() {
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(3 * MIB / 2), "1.5 MB");
    }

    #[test]
    fn sub_millisecond_builds_show_zero() {
        assert_eq!(format_duration(Duration::from_micros(300)), "0ms");
        assert_eq!(format_duration(Duration::from_secs(90)), "90.0s");
    }
}
