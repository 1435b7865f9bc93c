use std::fmt::Display;

use self::regex::TIME_STRING;

pub mod discord;
pub mod regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseToMillisError {
    Empty,
    Invalid(String),
    Overflow,
}
impl Display for ParseToMillisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("no time was provided"),
            Self::Invalid(segment) => write!(f, "'{segment}' is not a valid time (expected e.g. 1h30m)"),
            Self::Overflow => f.write_str("the provided time is too large"),
        }
    }
}
impl std::error::Error for ParseToMillisError {}

/// Parses a time string such as `1h20m30s` into milliseconds.
///
/// Supported units are `s`, `m`, `h` and `d`. The entire input must be made up of
/// `<amount><unit>` segments.
pub fn parse_to_millis(input: &str) -> Result<u64, ParseToMillisError> {
    if input.is_empty() {
        return Err(ParseToMillisError::Empty);
    }

    let mut total: u64 = 0;
    let mut matched_until = 0;

    for captures in TIME_STRING.captures_iter(input) {
        let (Some(whole), Some(amount), Some(unit)) = (captures.get(0), captures.get(1), captures.get(2)) else {
            continue;
        };

        if whole.start() != matched_until {
            return Err(ParseToMillisError::Invalid(input[matched_until..whole.start()].to_owned()));
        }
        matched_until = whole.end();

        let amount: u64 = amount.as_str().parse().map_err(|_| ParseToMillisError::Overflow)?;
        let unit: u64 = match unit.as_str() {
            "s" => 1000,
            "m" => 60 * 1000,
            "h" => 60 * 60 * 1000,
            _ => 24 * 60 * 60 * 1000,
        };

        total = amount
            .checked_mul(unit)
            .and_then(|millis| total.checked_add(millis))
            .ok_or(ParseToMillisError::Overflow)?;
    }

    if matched_until != input.len() {
        return Err(ParseToMillisError::Invalid(input[matched_until..].to_owned()));
    }

    Ok(total)
}
