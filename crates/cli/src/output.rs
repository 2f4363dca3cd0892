//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;

/// Shown wherever a value could not be determined
pub const UNKNOWN: &str = "N/A";

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format seconds with up to three decimals, dropping trailing zeros
pub fn format_secs(secs: Option<f64>) -> String {
    match secs {
        Some(secs) => {
            let formatted = format!("{:.3}", secs);
            let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
            if trimmed == "-0" {
                "0".to_string()
            } else {
                trimmed.to_string()
            }
        }
        None => UNKNOWN.to_string(),
    }
}

/// Format a percentage with two decimals
pub fn format_percent(pct: Option<f64>) -> String {
    match pct {
        Some(pct) => format!("{:.2}", pct),
        None => UNKNOWN.to_string(),
    }
}

/// Format a timestamp as RFC 3339 in UTC
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => UNKNOWN.to_string(),
    }
}

/// Color a relative error by how far the two estimates diverge
pub fn color_error(pct: Option<f64>) -> String {
    let formatted = format_percent(pct);
    match pct {
        Some(pct) if pct.abs() < 10.0 => formatted.green().to_string(),
        Some(pct) if pct.abs() < 25.0 => formatted.yellow().to_string(),
        Some(_) => formatted.red().to_string(),
        None => formatted.dimmed().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(Some(5.0)), "5");
        assert_eq!(format_secs(Some(1.75)), "1.75");
        assert_eq!(format_secs(Some(-3.0)), "-3");
        assert_eq!(format_secs(Some(0.0)), "0");
        assert_eq!(format_secs(Some(2.0004)), "2");
        assert_eq!(format_secs(None), "N/A");
    }

    #[test]
    fn test_format_percent_rounds_instead_of_truncating() {
        assert_eq!(format_percent(Some(3.456789)), "3.46");
        assert_eq!(format_percent(Some(0.0)), "0.00");
        assert_eq!(format_percent(Some(123.0)), "123.00");
        assert_eq!(format_percent(None), "N/A");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T12:00:03+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(Some(ts)), "2024-05-01T10:00:03Z");
        assert_eq!(format_timestamp(None), "N/A");
    }

    #[test]
    fn test_color_error_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(color_error(Some(12.5)), "12.50");
        assert_eq!(color_error(None), "N/A");
    }
}
