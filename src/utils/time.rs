//! Time parsing and formatting utilities

use crate::error::{BeatCutError, BeatCutResult};

/// Time parser for command-line and lyric timestamps
pub struct TimeParser;

impl TimeParser {
    /// Create a new time parser
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TimeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeParser {
    /// Parse `SS.ms`, `MM:SS.ms` or `HH:MM:SS.ms` into seconds
    pub fn parse_time(&self, time_str: &str) -> BeatCutResult<f64> {
        let time_str = time_str.trim();
        let invalid = || BeatCutError::InvalidTime {
            time: time_str.to_string(),
        };

        let parts: Vec<&str> = time_str.split(':').collect();
        let seconds = match parts.as_slice() {
            [seconds] => seconds.parse::<f64>().map_err(|_| invalid())?,
            [minutes, seconds] => {
                let minutes = minutes.parse::<u32>().map_err(|_| invalid())?;
                let seconds = self.parse_seconds_field(seconds).ok_or_else(invalid)?;
                minutes as f64 * 60.0 + seconds
            }
            [hours, minutes, seconds] => {
                let hours = hours.parse::<u32>().map_err(|_| invalid())?;
                let minutes = minutes.parse::<u32>().map_err(|_| invalid())?;
                if minutes >= 60 {
                    return Err(invalid());
                }
                let seconds = self.parse_seconds_field(seconds).ok_or_else(invalid)?;
                hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds
            }
            _ => return Err(invalid()),
        };

        if !seconds.is_finite() || seconds < 0.0 {
            return Err(invalid());
        }
        Ok(seconds)
    }

    /// Parse an LRC tag body: `mm:ss.xx`, `mm:ss:xx` or `mm:ss`.
    ///
    /// The fractional field is read as hundredths when it has two digits
    /// and as milliseconds when it has three.
    pub fn parse_lrc_timestamp(&self, tag: &str) -> Option<f64> {
        let tag = tag.trim();
        let mut fields = tag.splitn(3, ':');
        let minutes = fields.next()?.parse::<u32>().ok()?;
        let rest = fields.next()?;
        let (seconds, fraction) = match fields.next() {
            Some(fraction) => (rest, Some(fraction)),
            None => match rest.split_once('.') {
                Some((seconds, fraction)) => (seconds, Some(fraction)),
                None => (rest, None),
            },
        };

        let seconds = seconds.parse::<u32>().ok()?;
        if seconds >= 60 {
            return None;
        }
        let fraction = match fraction {
            Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
                let value = digits.parse::<u32>().ok()? as f64;
                value / 10f64.powi(digits.len() as i32)
            }
            Some(_) => return None,
            None => 0.0,
        };

        Some(minutes as f64 * 60.0 + seconds as f64 + fraction)
    }

    /// Format seconds as `MM:SS.mmm`, or `HH:MM:SS.mmm` past one hour
    pub fn format_time(&self, seconds: f64) -> String {
        let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        let ms = total_ms % 1000;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, ms)
        } else {
            format!("{:02}:{:02}.{:03}", minutes, secs, ms)
        }
    }

    fn parse_seconds_field(&self, field: &str) -> Option<f64> {
        let seconds = field.parse::<f64>().ok()?;
        if (0.0..60.0).contains(&seconds) {
            Some(seconds)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_seconds() {
        let parser = TimeParser::new();
        assert_eq!(parser.parse_time("12.5").unwrap(), 12.5);
        assert!(parser.parse_time("-1").is_err());
    }

    #[test]
    fn test_parse_clock_formats() {
        let parser = TimeParser::new();
        assert_eq!(parser.parse_time("01:30.5").unwrap(), 90.5);
        assert_eq!(parser.parse_time("01:02:03.5").unwrap(), 3723.5);
        assert!(parser.parse_time("00:75").is_err());
        assert!(parser.parse_time("abc").is_err());
    }

    #[test]
    fn test_parse_lrc_timestamps() {
        let parser = TimeParser::new();
        assert_eq!(parser.parse_lrc_timestamp("00:12.50"), Some(12.5));
        assert_eq!(parser.parse_lrc_timestamp("01:02:25"), Some(62.25));
        assert_eq!(parser.parse_lrc_timestamp("00:07"), Some(7.0));
        assert_eq!(parser.parse_lrc_timestamp("00:01.250"), Some(1.25));
        assert_eq!(parser.parse_lrc_timestamp("ar:Someone"), None);
        assert_eq!(parser.parse_lrc_timestamp("00:61.00"), None);
    }

    #[test]
    fn test_format_time() {
        let parser = TimeParser::new();
        assert_eq!(parser.format_time(90.5), "01:30.500");
        assert_eq!(parser.format_time(3723.456), "01:02:03.456");
    }
}
