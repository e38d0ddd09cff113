use std::fmt;
use std::str;
use std::time::{SystemTime, UNIX_EPOCH};

/// An `Attribution` combines a person's identity (name and e-mail address)
/// with the timestamp for a particular action.
///
/// Attributions are recorded as the author and committer of a commit and as
/// the tagger of an annotated tag.
///
/// The `timestamp` value is in seconds relative to the Unix epoch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attribution {
    name: String,
    email: String,
    timestamp: i64,
    tz_offset: i16,
}

impl Attribution {
    /// Creates a new attribution.
    ///
    /// Time zone offsets are given in minutes and clamped to the range
    /// git accepts (-12:00 to +14:00).
    pub fn new(name: &str, email: &str, timestamp: i64, tz_offset: i16) -> Attribution {
        Attribution {
            name: name.to_string(),
            email: email.to_string(),
            timestamp,
            tz_offset: tz_offset.max(-720).min(840),
        }
    }

    /// Creates an attribution stamped with the current system time (UTC).
    pub fn now(name: &str, email: &str) -> Attribution {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Attribution::new(name, email, timestamp, 0)
    }

    /// Parse a name line (e.g. author, committer, tagger) into an `Attribution` struct.
    /// Returns `None` if unable to parse the line properly.
    pub fn parse(line: &[u8]) -> Option<Attribution> {
        let line = drop_last_newline(line);

        let lt = line.iter().position(|b| *b == b'<')?;
        let gt = lt + line[lt..].iter().position(|b| *b == b'>')?;

        let name = str::from_utf8(&line[..lt]).ok()?.trim_end();
        let email = str::from_utf8(&line[lt + 1..gt]).ok()?;

        let mut words = str::from_utf8(&line[gt + 1..]).ok()?.split_whitespace();
        let timestamp = words.next().and_then(|t| t.parse::<i64>().ok()).unwrap_or(0);
        let tz_offset = words.next().and_then(tz_from_str).unwrap_or(0);

        Some(Attribution::new(name, email, timestamp, tz_offset))
    }

    /// Returns the person's human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the person's email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the timestamp.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns the timezone offset (minutes relative to GMT).
    pub fn tz_offset(&self) -> i16 {
        self.tz_offset
    }

    /// Returns the timezone formatted in human readable offset from GMT.
    pub fn format_tz(&self) -> String {
        let sign = if self.tz_offset < 0 { "-" } else { "+" };

        let offset = self.tz_offset.abs();
        let hours = offset / 60;
        let min = offset % 60;

        format!("{}{:02}{:02}", sign, hours, min)
    }
}

fn drop_last_newline(s: &[u8]) -> &[u8] {
    if s.last() == Some(&b'\n') {
        &s[0..s.len() - 1]
    } else {
        s
    }
}

fn tz_from_str(s: &str) -> Option<i16> {
    let s = s.as_bytes();

    if s.len() != 5 || !s[1..].iter().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let sign: i16 = match s[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };

    let digit = |i: usize| (s[i] - b'0') as i16;
    let hh = digit(1) * 10 + digit(2);
    let mm = digit(3) * 10 + digit(4);
    Some(sign * (hh * 60 + mm))
}

fn sanitize(s: &str) -> String {
    // Control characters and angle brackets would corrupt the header line.
    s.trim()
        .chars()
        .filter(|c| !c.is_control() && *c != '<' && *c != '>')
        .collect()
}

impl fmt::Display for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            sanitize(&self.name),
            sanitize(&self.email),
            self.timestamp,
            self.format_tz()
        )
    }
}
