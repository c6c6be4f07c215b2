//! Serato crate file parser
//!
//! Crate files are a tag-length-value container: each record is a 4-byte
//! ASCII tag, a u32 big-endian payload length, and the payload. Top-level
//! `otrk` records hold one track each as a nested record list (`ttxt` title,
//! `aART` artist, `albm` album, `dura` duration in seconds, `bpmf`, `key`,
//! `path`, `pidx` library id). Unknown tags are skipped by their declared
//! length so newer crate revisions keep parsing.
//!
//! Crates carry play order but no timestamps; callers wanting times must go
//! through the timeline estimator. A malformed trailing record does not
//! discard the file: entries decoded up to that point are returned alongside
//! the structural error.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::debug;

use playlog_common::error::{Error, ParseError, Result};
use playlog_common::models::{CrateEntry, SeratoCrate, Track, TrackKey};

const HEADER_LEN: usize = 8;
const TAG_TRACK: &str = "otrk";

/// Decoded crate plus the track metadata it carried
#[derive(Debug, Clone)]
pub struct CrateParseResult {
    pub crate_file: SeratoCrate,
    /// One track per entry, in entry order (duplicates possible)
    pub tracks: Vec<Track>,
    /// Structural error that truncated the parse, if any
    pub error: Option<ParseError>,
}

impl CrateParseResult {
    /// Whether the result covers only a leading portion of the file
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Parse one crate file from disk.
pub fn parse_crate_file(path: &Path, timeout: Option<Duration>) -> Result<CrateParseResult> {
    let data = std::fs::read(path)?;
    parse_crate_bytes(path, &data, timeout)
}

/// Parse crate bytes already in memory.
///
/// Fails outright when no track record could be decoded at all; otherwise
/// returns the decoded prefix with the error attached.
pub fn parse_crate_bytes(
    path: &Path,
    data: &[u8],
    timeout: Option<Duration>,
) -> Result<CrateParseResult> {
    if data.is_empty() {
        return Err(Error::Parse(ParseError::new(
            path,
            0,
            "at least one record",
            "empty file",
        )));
    }

    let deadline = timeout.map(|t| Instant::now() + t);
    let (records, top_error) = read_records(data, 0, path, deadline);

    let mut entries = Vec::new();
    let mut tracks = Vec::new();
    let mut error = None;
    for record in records {
        if record.tag != TAG_TRACK {
            // version headers, column layouts etc. are skipped wholesale
            continue;
        }
        let (fields, nested_error) =
            read_records(record.payload, record.offset + HEADER_LEN as u64, path, deadline);
        let mut by_tag: HashMap<&str, &[u8]> = HashMap::new();
        for field in &fields {
            by_tag.insert(field.tag.as_str(), field.payload);
        }
        if let Some(e) = nested_error {
            // a corrupt track record poisons the rest of the file
            error = Some(e);
            if by_tag.is_empty() {
                break;
            }
        }
        let track = track_from_fields(&by_tag);
        entries.push(CrateEntry {
            track: track.key.clone(),
        });
        tracks.push(track);
        if error.is_some() {
            break;
        }
    }
    // a truncated tail does not discard the records read before it
    let error = error.or(top_error);

    if entries.is_empty() {
        if let Some(e) = error {
            return Err(Error::Parse(e));
        }
    }

    debug!(
        path = %path.display(),
        entries = entries.len(),
        partial = error.is_some(),
        "parsed crate file"
    );

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "crate".to_string());

    Ok(CrateParseResult {
        crate_file: SeratoCrate {
            source: path.to_path_buf(),
            name,
            entries,
        },
        tracks,
        error,
    })
}

/// One raw TLV record
struct RawRecord<'a> {
    tag: String,
    payload: &'a [u8],
    /// Absolute byte offset of the record header
    offset: u64,
}

/// Read consecutive TLV records out of `data`.
///
/// Stops at the first structural problem and reports it with its absolute
/// offset; records read before that point are kept.
fn read_records<'a>(
    data: &'a [u8],
    base_offset: u64,
    path: &Path,
    deadline: Option<Instant>,
) -> (Vec<RawRecord<'a>>, Option<ParseError>) {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let offset = base_offset + pos as u64;

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return (
                records,
                Some(ParseError::new(
                    path,
                    offset,
                    "record within parse timeout",
                    "timeout exceeded",
                )),
            );
        }

        let remaining = data.len() - pos;
        if remaining < HEADER_LEN {
            return (
                records,
                Some(ParseError::new(
                    path,
                    offset,
                    "record header (8 bytes)",
                    format!("{remaining} trailing bytes"),
                )),
            );
        }

        let tag_bytes = &data[pos..pos + 4];
        if !tag_bytes.iter().all(|b| (0x20..=0x7e).contains(b)) {
            return (
                records,
                Some(ParseError::new(
                    path,
                    offset,
                    "ASCII record tag",
                    format!("bytes {tag_bytes:02x?}"),
                )),
            );
        }
        // tag bytes are printable ASCII at this point
        let tag = String::from_utf8_lossy(tag_bytes).trim().to_string();

        let length = u32::from_be_bytes([
            data[pos + 4],
            data[pos + 5],
            data[pos + 6],
            data[pos + 7],
        ]) as usize;
        if length > remaining - HEADER_LEN {
            return (
                records,
                Some(ParseError::new(
                    path,
                    offset,
                    format!("payload of {length} bytes for tag '{tag}'"),
                    format!("{} bytes before end of file", remaining - HEADER_LEN),
                )),
            );
        }

        records.push(RawRecord {
            tag,
            payload: &data[pos + HEADER_LEN..pos + HEADER_LEN + length],
            offset,
        });
        pos += HEADER_LEN + length;
    }

    (records, None)
}

/// Build a track from the nested fields of one `otrk` record.
///
/// Identity preference: library id, then file path, then an artist/title
/// slug. A reference with no metadata at all still yields a placeholder.
fn track_from_fields(fields: &HashMap<&str, &[u8]>) -> Track {
    let text = |tag: &str| {
        fields
            .get(tag)
            .map(|payload| decode_text(payload))
            .unwrap_or_default()
            .trim()
            .to_string()
    };

    let title = {
        let t = text("ttxt");
        if t.is_empty() {
            "Unknown Track".to_string()
        } else {
            t
        }
    };
    let artist = text("aART");
    let album = text("albm");
    let path = text("path");
    let library_id = text("pidx");
    let duration_secs = fields.get("dura").map(|p| decode_int(p)).unwrap_or(0);
    let bpm = fields.get("bpmf").and_then(|p| decode_float(p));
    let musical_key = {
        let k = text("key");
        if k.is_empty() {
            None
        } else {
            Some(k)
        }
    };

    let key = if !library_id.is_empty() {
        TrackKey::from_library_id(&library_id)
    } else if !path.is_empty() {
        TrackKey::from_path(Path::new(&path))
    } else {
        TrackKey::from_title_artist(&title, &artist)
    };

    Track {
        key,
        title,
        artist,
        album,
        file_path: if path.is_empty() {
            None
        } else {
            Some(path.into())
        },
        duration: if duration_secs > 0 {
            Some(Duration::from_secs(duration_secs))
        } else {
            None
        },
        bpm,
        musical_key,
    }
}

/// Decode a text payload with the fallback chain UTF-8 → UTF-16BE → UTF-16LE
/// → Latin-1, stripping NUL padding.
fn decode_text(payload: &[u8]) -> String {
    if payload.is_empty() {
        return String::new();
    }
    if let Ok(text) = std::str::from_utf8(payload) {
        return text.trim_matches('\0').to_string();
    }
    if let Some(text) = decode_utf16(payload, true).or_else(|| decode_utf16(payload, false)) {
        return text;
    }
    // Latin-1 never fails: every byte maps to the same code point
    payload
        .iter()
        .map(|&b| b as char)
        .collect::<String>()
        .trim_matches('\0')
        .to_string()
}

fn decode_utf16(payload: &[u8], big_endian: bool) -> Option<String> {
    if payload.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units)
        .ok()
        .map(|s| s.trim_matches('\0').to_string())
}

/// Decode an integer payload: decimal text, float text, or a raw big-endian
/// unsigned value of width 2 or 4.
fn decode_int(payload: &[u8]) -> u64 {
    let text = decode_text(payload);
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return n;
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f >= 0.0 {
            return f as u64;
        }
    }
    match payload.len() {
        2 => u16::from_be_bytes([payload[0], payload[1]]) as u64,
        4 => u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as u64,
        _ => 0,
    }
}

fn decode_float(payload: &[u8]) -> Option<f64> {
    decode_text(payload).trim().parse::<f64>().ok()
}
