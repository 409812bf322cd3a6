//! Serde codec for `std::time::Duration` as an ISO-8601 duration string.
//!
//! Encodes as `PT1S`, `PT1M30S`, `PT24H`, `PT0.25S` (hours are never folded into days).
//! Decodes ISO-8601 strings of the form `PnDTnHnMn.nS`, or a plain number of seconds.
//!
//! Use with `#[serde(with = "crate::model::duration")]`.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;
use std::time::Duration;

const NANOS_PER_SEC: u32 = 1_000_000_000;

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_iso(*duration))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DurationVisitor)
}

/// Render a duration the way `java.time.Duration::toString` does.
pub fn format_iso(duration: Duration) -> String {
    let total = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if total == 0 && nanos == 0 {
        return "PT0S".to_string();
    }
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if seconds > 0 || nanos > 0 {
        out.push_str(&seconds.to_string());
        if nanos > 0 {
            let fraction = format!("{:09}", nanos);
            out.push('.');
            out.push_str(fraction.trim_end_matches('0'));
        }
        out.push('S');
    }
    out
}

/// Parse an ISO-8601 duration (`PnDTnHnMn.nS`, case-insensitive, no sign).
pub fn parse_iso(text: &str) -> Result<Duration, String> {
    let upper = text.trim().to_ascii_uppercase();
    let rest = upper.strip_prefix('P').ok_or_else(|| format!("'{}' does not start with 'P'", text))?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(format!("'{}' has an empty time section", text));
            }
            (date, Some(time))
        }
        None => (rest, None),
    };
    if date.is_empty() && time.is_none() {
        return Err(format!("'{}' has no components", text));
    }

    let mut total = Duration::ZERO;
    if !date.is_empty() {
        let days = date
            .strip_suffix('D')
            .and_then(|d| d.parse::<u64>().ok())
            .ok_or_else(|| format!("'{}' has an unsupported date section", text))?;
        let secs = days.checked_mul(86_400).ok_or_else(|| format!("'{}' overflows", text))?;
        total += Duration::from_secs(secs);
    }

    if let Some(time) = time {
        let mut number = String::new();
        let mut last_rank = 0u8;
        for c in time.chars() {
            match c {
                '0'..='9' | '.' => number.push(c),
                'H' | 'M' | 'S' => {
                    let rank = match c {
                        'H' => 1,
                        'M' => 2,
                        _ => 3,
                    };
                    if number.is_empty() || rank <= last_rank {
                        return Err(format!("'{}' has a malformed time section", text));
                    }
                    last_rank = rank;
                    let part = if c == 'S' {
                        parse_seconds(&number)
                    } else {
                        let unit = if c == 'H' { 3600 } else { 60 };
                        number.parse::<u64>().ok().and_then(|n| n.checked_mul(unit)).map(Duration::from_secs)
                    };
                    let part = part.ok_or_else(|| format!("'{}' has an invalid number '{}'", text, number))?;
                    total = total.checked_add(part).ok_or_else(|| format!("'{}' overflows", text))?;
                    number.clear();
                }
                other => return Err(format!("'{}' contains unexpected '{}'", text, other)),
            }
        }
        if !number.is_empty() {
            return Err(format!("'{}' ends with a number lacking a unit", text));
        }
    }
    Ok(total)
}

fn parse_seconds(number: &str) -> Option<Duration> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if whole.is_empty() || fraction.len() > 9 || fraction.contains('.') {
        return None;
    }
    let secs = whole.parse::<u64>().ok()?;
    let nanos = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse::<u32>().ok()?
    };
    Some(Duration::new(secs, nanos))
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an ISO-8601 duration string or a non-negative number of seconds")
    }

    fn visit_u64<E: de::Error>(self, secs: u64) -> Result<Duration, E> {
        Ok(Duration::from_secs(secs))
    }

    fn visit_i64<E: de::Error>(self, secs: i64) -> Result<Duration, E> {
        u64::try_from(secs)
            .map(Duration::from_secs)
            .map_err(|_| E::custom(format!("negative duration: {}", secs)))
    }

    fn visit_f64<E: de::Error>(self, secs: f64) -> Result<Duration, E> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(E::custom(format!("invalid duration: {}", secs)));
        }
        let whole = secs.trunc();
        let nanos = ((secs - whole) * f64::from(NANOS_PER_SEC)).round() as u32;
        Ok(Duration::new(whole as u64, 0) + Duration::from_nanos(u64::from(nanos)))
    }

    fn visit_str<E: de::Error>(self, text: &str) -> Result<Duration, E> {
        parse_iso(text).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "super")]
        d: Duration,
    }

    #[test]
    fn formats_like_java_time() {
        assert_eq!(format_iso(Duration::ZERO), "PT0S");
        assert_eq!(format_iso(Duration::from_secs(1)), "PT1S");
        assert_eq!(format_iso(Duration::from_secs(90)), "PT1M30S");
        assert_eq!(format_iso(Duration::from_secs(86_400)), "PT24H");
        assert_eq!(format_iso(Duration::from_millis(250)), "PT0.25S");
        assert_eq!(format_iso(Duration::from_secs(3_601)), "PT1H1S");
    }

    #[test]
    fn parses_iso_forms() {
        assert_eq!(parse_iso("PT1S").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_iso("pt1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_iso("P1D").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_iso("P1DT2H").unwrap(), Duration::from_secs(93_600));
        assert_eq!(parse_iso("PT0.5S").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_malformed_iso() {
        for text in ["", "1S", "P", "PT", "PT5", "PTS", "PT1S1M", "PT1.5M", "PT-1S", "P1W"] {
            assert!(parse_iso(text).is_err(), "'{}' should be rejected", text);
        }
    }

    #[test]
    fn decodes_numbers_and_strings() {
        let h: Holder = serde_json::from_str(r#"{"d":"PT2S"}"#).unwrap();
        assert_eq!(h.d, Duration::from_secs(2));
        let h: Holder = serde_json::from_str(r#"{"d":3}"#).unwrap();
        assert_eq!(h.d, Duration::from_secs(3));
        let h: Holder = serde_json::from_str(r#"{"d":1.5}"#).unwrap();
        assert_eq!(h.d, Duration::from_millis(1500));
        assert!(serde_json::from_str::<Holder>(r#"{"d":-1}"#).is_err());
    }

    #[test]
    fn encodes_as_string() {
        let json = serde_json::to_string(&Holder { d: Duration::from_secs(60) }).unwrap();
        assert_eq!(json, r#"{"d":"PT1M"}"#);
    }
}
