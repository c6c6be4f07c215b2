//! Serato session log parser
//!
//! History logs are line-oriented text. A session opens with an optional
//! `Session Start @ <datetime>` header; play records follow as
//! `HH:MM:SS  Deck <n>  Artist - Title`. Play lines carry only a wall-clock
//! time, so the date comes from the session header (or, failing that, a date
//! embedded in the file name), and a play time earlier than its predecessor
//! rolls the date forward one day. One file may contain several sessions.
//!
//! No deduplication happens here: identical consecutive records are kept
//! verbatim, because only the timeline builder can tell a duplicate record
//! from a genuine back-to-back replay.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use playlog_common::error::{Error, ParseError, Result};
use playlog_common::models::{SessionLog, SessionLogEntry, Track, TrackKey};

static SESSION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Session Start @ (?P<dt>.+)").unwrap());

static PLAY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<time>\d{2}:\d{2}:\d{2})\s+(?P<deck>(?:Deck|DECK)\s+\w+)\s+(?P<body>.+)$")
        .unwrap()
});

static DATE_IN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(20\d{2})[-_](0[1-9]|1[0-2])[-_](0[1-9]|[12]\d|3[01])").unwrap());

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Hour a filename-dated session is assumed to have started at
const FILENAME_ANCHOR_HOUR: u32 = 22;

/// Characters not allowed in a session identifier
const RESERVED_ID_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Decoded session log plus the (placeholder) tracks its lines referenced
#[derive(Debug, Clone)]
pub struct LogParseResult {
    pub log: SessionLog,
    pub tracks: Vec<Track>,
    /// Structural error that truncated the parse, if any
    pub error: Option<ParseError>,
}

impl LogParseResult {
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Parse one session log from disk.
pub fn parse_log_file(path: &Path, timeout: Option<Duration>) -> Result<LogParseResult> {
    let data = std::fs::read(path)?;
    parse_log_bytes(path, &data, timeout)
}

/// Parse session log bytes already in memory.
///
/// Invalid UTF-8 is a structural error: the valid prefix is still decoded and
/// returned as a partial result unless nothing usable preceded the bad byte.
pub fn parse_log_bytes(
    path: &Path,
    data: &[u8],
    timeout: Option<Duration>,
) -> Result<LogParseResult> {
    let (text, mut error) = match std::str::from_utf8(data) {
        Ok(text) => (text.to_string(), None),
        Err(e) => {
            let valid = e.valid_up_to();
            let parse_error = ParseError::new(
                path,
                valid as u64,
                "UTF-8 text",
                "invalid byte sequence",
            );
            (
                String::from_utf8_lossy(&data[..valid]).into_owned(),
                Some(parse_error),
            )
        }
    };

    let deadline = timeout.map(|t| Instant::now() + t);
    let stem = session_id_from_path(path);
    let default_anchor = anchor_hint_from_filename(path);

    let mut entries: Vec<SessionLogEntry> = Vec::new();
    let mut tracks: Vec<Track> = Vec::new();

    let mut session_index = 0usize;
    let mut session_id = stem.clone();
    let mut current_date: Option<NaiveDate> = None;
    let mut last_played: Option<DateTime<Utc>> = None;
    let mut offset = 0u64;

    // split keeps the terminators so offsets stay byte-accurate for CRLF logs
    for line in text.split_inclusive('\n') {
        let line_offset = offset;
        offset += line.len() as u64;

        if deadline.is_some_and(|d| Instant::now() >= d) {
            error = Some(ParseError::new(
                path,
                line_offset,
                "line within parse timeout",
                "timeout exceeded",
            ));
            break;
        }

        let trimmed = line.trim();

        if let Some(captures) = SESSION_START.captures(trimmed) {
            session_index += 1;
            session_id = if session_index <= 1 {
                stem.clone()
            } else {
                format!("{stem}-{session_index}")
            };
            let start = parse_datetime(&captures["dt"]).or(default_anchor);
            current_date = start.map(|dt| dt.date_naive());
            last_played = None;
            continue;
        }

        let Some(captures) = PLAY_LINE.captures(trimmed) else {
            continue; // chatter between play records
        };

        let Some(time) = parse_wall_clock(&captures["time"]) else {
            // out-of-range wall clock (e.g. 25:61:61); not a real play record
            continue;
        };

        if session_index == 0 {
            // play records before any header still belong to a session
            session_index = 1;
            current_date = default_anchor.map(|dt| dt.date_naive());
        }

        let date = current_date.unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.date_naive());
        let mut played_at = date.and_time(time).and_utc();
        if let Some(last) = last_played {
            if played_at < last {
                // crossed midnight
                played_at = played_at + Days::new(1);
            }
        }
        current_date = Some(played_at.date_naive());
        last_played = Some(played_at);

        let body = captures["body"].trim();
        let (artist, title) = split_artist_title(body);
        let track_key = TrackKey::from_title_artist(&title, &artist);

        entries.push(SessionLogEntry {
            track: track_key.clone(),
            session_id: session_id.clone(),
            deck: Some(captures["deck"].trim().to_string()),
            played_at,
        });

        let mut track = Track::placeholder(track_key, title);
        track.artist = artist;
        tracks.push(track);
    }

    if entries.is_empty() {
        if let Some(e) = error {
            return Err(Error::Parse(e));
        }
    }

    debug!(
        path = %path.display(),
        entries = entries.len(),
        sessions = session_index,
        partial = error.is_some(),
        "parsed session log"
    );

    Ok(LogParseResult {
        log: SessionLog {
            source: path.to_path_buf(),
            entries,
        },
        tracks,
        error,
    })
}

/// Session identifier for a source file: its stem with filesystem-reserved
/// characters replaced.
pub fn session_id_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sanitized: String = stem
        .chars()
        .map(|c| if RESERVED_ID_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let sanitized = sanitized.trim().to_string();
    if sanitized.is_empty() {
        "session".to_string()
    } else {
        sanitized
    }
}

/// Anchor hint from a `YYYY-MM-DD` (or underscore-separated) date embedded in
/// the file name, pinned to 22:00 — the typical start of a night set.
pub fn anchor_hint_from_filename(path: &Path) -> Option<DateTime<Utc>> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    let captures = DATE_IN_NAME.captures(&stem)?;
    let year: i32 = captures[1].parse().ok()?;
    let month: u32 = captures[2].parse().ok()?;
    let day: u32 = captures[3].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(FILENAME_ANCHOR_HOUR, 0, 0)?;
    Some(date.and_time(time).and_utc())
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Wall-clock from an `HH:MM:SS` capture; the digit pattern admits values
/// outside the valid range, so this can still reject.
fn parse_wall_clock(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S").ok()
}

/// Split a play-line body into artist and title on the first `" - "`.
fn split_artist_title(body: &str) -> (String, String) {
    if let Some((artist, title)) = body.split_once(" - ") {
        let title = title.trim();
        (
            artist.trim().to_string(),
            if title.is_empty() {
                "Unknown Track".to_string()
            } else {
                title.to_string()
            },
        )
    } else {
        let title = body.trim();
        (
            String::new(),
            if title.is_empty() {
                "Unknown Track".to_string()
            } else {
                title.to_string()
            },
        )
    }
}
