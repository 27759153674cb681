use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, TimeZone};
use regex::Regex;

use crate::ObjectError;

const SIGNATURE_PATTERN: &str = r"^(.*) <(.*)> (\d+) ([+-])(\d\d)(\d\d)$";

fn signature_pattern() -> Result<&'static Regex, ObjectError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = PATTERN.get() {
        return Ok(re);
    }
    let re = Regex::new(SIGNATURE_PATTERN)
        .map_err(|e| ObjectError::MalformedCommit(e.to_string()))?;
    Ok(PATTERN.get_or_init(|| re))
}

/// An `author`/`committer`/`tagger` identity line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Offset east of UTC, in minutes.
    pub tz_offset_minutes: i32,
}

impl Signature {
    /// Parse `"<name> <<email>> <epoch> <+|-HHMM>"`.
    pub fn parse(line: &str) -> Result<Self, ObjectError> {
        let caps = signature_pattern()?
            .captures(line)
            .ok_or_else(|| ObjectError::MalformedCommit(format!("bad identity line {line:?}")))?;
        let field = |i: usize| caps.get(i).map_or("", |m| m.as_str());

        let timestamp = field(3)
            .parse::<i64>()
            .map_err(|e| ObjectError::MalformedCommit(format!("bad timestamp: {e}")))?;
        let hours: i32 = field(5).parse().unwrap_or(0);
        let minutes: i32 = field(6).parse().unwrap_or(0);
        let sign = if field(4) == "-" { -1 } else { 1 };

        Ok(Self {
            name: field(1).to_owned(),
            email: field(2).to_owned(),
            timestamp,
            tz_offset_minutes: sign * (hours * 60 + minutes),
        })
    }

    /// The signature time in its recorded zone, if representable.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        FixedOffset::east_opt(self.tz_offset_minutes * 60)?
            .timestamp_opt(self.timestamp, 0)
            .single()
    }

    pub fn to_line(&self) -> String {
        let sign = if self.tz_offset_minutes < 0 { '-' } else { '+' };
        let off = self.tz_offset_minutes.abs();
        format!(
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.timestamp,
            sign,
            off / 60,
            off % 60
        )
    }
}
