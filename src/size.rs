const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Renders a byte count with two decimals in the largest unit that keeps the
/// value below 1024. GB is never exceeded.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}
