//! Time-window parsing for math rules.
//!
//! A window is a pair of signed offsets relative to evaluation time `now`,
//! delimiting the half-open query interval `[now+start, now+end)`. Offsets
//! are written as duration strings with `d h m s` components ("-5m",
//! "-1h30m", "0s"); negative values mean "past".

use chrono::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("window must have exactly two offsets, got {0}")]
    WrongArity(usize),

    #[error("window start must not be after end ({start} > {end})")]
    Inverted { start: String, end: String },
}

/// Parsed offsets of one factor's query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Duration,
    pub end: Duration,
}

impl TimeWindow {
    /// Parse the two-element string pair stored on a rule, enforcing
    /// `start <= end`.
    pub fn parse(pair: &[String]) -> Result<Self, WindowError> {
        if pair.len() != 2 {
            return Err(WindowError::WrongArity(pair.len()));
        }
        let start = parse_offset(&pair[0])?;
        let end = parse_offset(&pair[1])?;
        if start > end {
            return Err(WindowError::Inverted {
                start: pair[0].clone(),
                end: pair[1].clone(),
            });
        }
        Ok(Self { start, end })
    }
}

/// Parse a signed duration string into a chrono [`Duration`].
///
/// Components `Xd`, `Xh`, `Xm`, `Xs` combine ("1h30m", "90s"); a bare
/// number is seconds; an optional leading `-` negates the whole value.
pub fn parse_offset(s: &str) -> Result<Duration, WindowError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(WindowError::InvalidDuration(s.to_string()));
    }

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if body.is_empty() {
        return Err(WindowError::InvalidDuration(s.to_string()));
    }

    let mut total_secs: i64 = 0;
    let mut num_buf = String::new();
    let mut found_unit = false;

    for ch in body.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            let n: i64 = num_buf
                .parse()
                .map_err(|_| WindowError::InvalidDuration(s.to_string()))?;
            num_buf.clear();
            match ch {
                'd' => total_secs += n * 86_400,
                'h' => total_secs += n * 3_600,
                'm' => total_secs += n * 60,
                's' => total_secs += n,
                _ => return Err(WindowError::InvalidDuration(s.to_string())),
            }
            found_unit = true;
        }
    }

    if !num_buf.is_empty() {
        if found_unit {
            // Ambiguous trailing digits, e.g. "5m30".
            return Err(WindowError::InvalidDuration(s.to_string()));
        }
        let n: i64 = num_buf
            .parse()
            .map_err(|_| WindowError::InvalidDuration(s.to_string()))?;
        total_secs += n;
    }

    if negative {
        total_secs = -total_secs;
    }
    Ok(Duration::seconds(total_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_negative_minutes() {
        assert_eq!(parse_offset("-5m").unwrap(), Duration::minutes(-5));
    }

    #[test]
    fn parses_zero() {
        assert_eq!(parse_offset("0m").unwrap(), Duration::zero());
        assert_eq!(parse_offset("0s").unwrap(), Duration::zero());
    }

    #[test]
    fn parses_combined_units() {
        assert_eq!(
            parse_offset("-1h30m").unwrap(),
            Duration::minutes(-90)
        );
        assert_eq!(parse_offset("2d12h").unwrap(), Duration::hours(60));
    }

    #[test]
    fn bare_number_is_seconds() {
        assert_eq!(parse_offset("-120").unwrap(), Duration::seconds(-120));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_offset("").is_err());
        assert!(parse_offset("-").is_err());
        assert!(parse_offset("five minutes").is_err());
        assert!(parse_offset("5m30").is_err());
        assert!(parse_offset("5x").is_err());
    }

    #[test]
    fn window_pair_ordering() {
        let w = TimeWindow::parse(&["-5m".into(), "0m".into()]).unwrap();
        assert_eq!(w.start, Duration::minutes(-5));
        assert_eq!(w.end, Duration::zero());

        assert!(matches!(
            TimeWindow::parse(&["0m".into(), "-5m".into()]),
            Err(WindowError::Inverted { .. })
        ));
    }

    #[test]
    fn window_pair_arity() {
        assert!(matches!(
            TimeWindow::parse(&["-5m".into()]),
            Err(WindowError::WrongArity(1))
        ));
        assert!(matches!(
            TimeWindow::parse(&["-5m".into(), "0m".into(), "1m".into()]),
            Err(WindowError::WrongArity(3))
        ));
    }
}
