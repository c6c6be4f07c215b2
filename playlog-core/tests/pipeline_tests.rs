//! End-to-end extraction tests against synthetic Serato libraries on disk.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use playlog_core::{
    extract_timeline, Error, ExtractRequest, Mode, PlayTime, ResolvedMode, TrackKey, WarningKind,
};

// --- fixture helpers -------------------------------------------------------

fn record(tag: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn text_field(tag: &str, value: &str) -> Vec<u8> {
    record(tag, value.as_bytes())
}

fn track_record(fields: &[Vec<u8>]) -> Vec<u8> {
    record("otrk", &fields.concat())
}

fn simple_track(title: &str, artist: &str, path: &str, duration: &str) -> Vec<u8> {
    track_record(&[
        text_field("ttxt", title),
        text_field("aART", artist),
        text_field("path", path),
        text_field("dura", duration),
    ])
}

/// A temporary `_Serato_` library with `History/` and `Logs/` subdirectories.
struct Library {
    root: PathBuf,
    _dir: TempDir,
}

impl Library {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("_Serato_");
        fs::create_dir_all(root.join("History")).unwrap();
        fs::create_dir_all(root.join("Logs")).unwrap();
        Self { root, _dir: dir }
    }

    fn write_crate(&self, name: &str, data: &[u8]) {
        fs::write(self.root.join("History").join(name), data).unwrap();
    }

    fn write_log(&self, name: &str, text: &str) {
        fs::write(self.root.join("Logs").join(name), text).unwrap();
    }

    fn request(&self, mode: Mode, timeline_estimate: bool) -> ExtractRequest {
        ExtractRequest {
            timeline_estimate,
            mode,
            ..ExtractRequest::for_root(&self.root)
        }
    }
}

fn night_crate() -> Vec<u8> {
    let mut data = text_field("vrsn", "1.0/Serato ScratchLive Crate");
    data.extend(simple_track("Loft Intro", "DJ Example", "Music/a.mp3", "180"));
    data.extend(simple_track("Peak Hour", "DJ Example", "Music/b.mp3", "200"));
    data.extend(simple_track("Cooldown", "Someone Else", "Music/c.mp3", "0"));
    data
}

const NIGHT_LOG: &str = "\
Serato DJ Pro 3.0.1
Session Start @ 2025-05-03 22:47:10
22:47:10  Deck 1  DJ Example - Loft Intro
22:51:40  Deck 2  DJ Example - Peak Hour
23:02:05  Deck 1  Someone Else - Cooldown
";

// --- tests -----------------------------------------------------------------

#[test]
fn auto_mode_prefers_logs_when_both_sources_exist() {
    let library = Library::new();
    library.write_crate("night.crate", &night_crate());
    library.write_log("2025-05-03@Loft.log", NIGHT_LOG);

    let timeline = extract_timeline(&library.request(Mode::Auto, true)).unwrap();
    assert_eq!(timeline.resolved_mode, ResolvedMode::UsingLogs);
    assert_eq!(timeline.events.len(), 3);
    assert!(timeline.complete);
    assert!(!timeline.estimated);
    assert!(timeline.warnings.is_empty());

    let first = &timeline.events[0];
    assert_eq!(
        first.time,
        PlayTime::Exact(Utc.with_ymd_and_hms(2025, 5, 3, 22, 47, 10).unwrap())
    );
    assert_eq!(first.confidence, 1.0);
    assert_eq!(first.deck.as_deref(), Some("Deck 1"));

    assert_eq!(timeline.sessions.len(), 1);
    assert_eq!(timeline.sessions[0].events, 3);
    assert_eq!(
        timeline.sessions[0].start,
        Some(Utc.with_ymd_and_hms(2025, 5, 3, 22, 47, 10).unwrap())
    );

    // every event's key resolves in the track table
    for event in &timeline.events {
        assert!(timeline.tracks.contains_key(&event.track));
    }
}

#[test]
fn auto_mode_falls_back_to_crates_when_no_log_has_entries() {
    let library = Library::new();
    library.write_crate("night.crate", &night_crate());
    library.write_log("empty.log", "Serato DJ Pro 3.0.1\n");

    let timeline = extract_timeline(&library.request(Mode::Auto, true)).unwrap();
    assert_eq!(timeline.resolved_mode, ResolvedMode::UsingCrateWithEstimation);
    assert_eq!(timeline.events.len(), 3);
    assert!(timeline.estimated);
    assert!(!timeline.complete);
}

#[test]
fn estimation_walks_durations_from_the_filename_anchor() {
    let library = Library::new();
    library.write_crate("2025-05-03 night.crate", &night_crate());

    let timeline = extract_timeline(&library.request(Mode::Crate, true)).unwrap();
    let anchor = Utc.with_ymd_and_hms(2025, 5, 3, 22, 0, 0).unwrap();
    let starts: Vec<_> = timeline
        .events
        .iter()
        .map(|e| e.time.instant().unwrap())
        .collect();
    // durations [180, 200, unknown->60s default]
    assert_eq!(starts[0], anchor);
    assert_eq!(starts[1], anchor + chrono::Duration::seconds(180));
    assert_eq!(starts[2], anchor + chrono::Duration::seconds(380));

    let confidences: Vec<f64> = timeline.events.iter().map(|e| e.confidence).collect();
    assert_eq!(confidences, vec![0.8, 0.8, 0.5]);
}

#[test]
fn caller_anchor_wins_over_epoch_for_undated_crates() {
    let library = Library::new();
    library.write_crate("night.crate", &night_crate());

    let anchor = Utc.with_ymd_and_hms(2025, 6, 1, 21, 30, 0).unwrap();
    let mut request = library.request(Mode::Crate, true);
    request.anchor = Some(anchor);

    let timeline = extract_timeline(&request).unwrap();
    assert_eq!(timeline.events[0].time.instant(), Some(anchor));
}

#[test]
fn correlated_log_records_pin_exact_times_in_crate_mode() {
    let library = Library::new();
    library.write_crate("night.crate", &night_crate());
    library.write_log(
        "session.log",
        "Session Start @ 2025-05-03 23:00:00\n23:00:00  Deck 1  DJ Example - Loft Intro\n",
    );

    let timeline = extract_timeline(&library.request(Mode::Crate, true)).unwrap();
    assert_eq!(timeline.resolved_mode, ResolvedMode::UsingCrateWithEstimation);

    let at = Utc.with_ymd_and_hms(2025, 5, 3, 23, 0, 0).unwrap();
    let first = &timeline.events[0];
    assert_eq!(first.time, PlayTime::Exact(at));
    assert_eq!(first.confidence, 1.0);
    assert_eq!(first.deck.as_deref(), Some("Deck 1"));
    // the walk re-anchors from the exact hit
    assert_eq!(
        timeline.events[1].time,
        PlayTime::Estimated(at + chrono::Duration::seconds(180))
    );
}

#[test]
fn absurd_crate_duration_does_not_abort_the_run() {
    let library = Library::new();
    let mut data = simple_track("Endless", "A", "Music/a.mp3", "9000000000000");
    data.extend(simple_track("Next", "B", "Music/b.mp3", "0"));
    library.write_crate("night.crate", &data);

    let timeline = extract_timeline(&library.request(Mode::Crate, true)).unwrap();
    assert_eq!(timeline.events.len(), 2);
    // the overflowing step degrades to the 60s default instead of panicking
    let starts: Vec<i64> = timeline
        .events
        .iter()
        .map(|e| e.time.instant().unwrap().timestamp())
        .collect();
    assert_eq!(starts, vec![0, 60]);
}

#[test]
fn disabled_estimation_yields_untimed_events_in_crate_order() {
    let library = Library::new();
    library.write_crate("night.crate", &night_crate());

    let timeline = extract_timeline(&library.request(Mode::Crate, false)).unwrap();
    assert_eq!(timeline.resolved_mode, ResolvedMode::UsingCrate);
    assert!(timeline.events.iter().all(|e| e.time == PlayTime::Unknown));
    assert!(timeline.events.iter().all(|e| e.confidence == 0.0));
    assert_eq!(
        timeline.events[0].track,
        TrackKey::from_path(Path::new("Music/a.mp3"))
    );
    assert!(!timeline.complete);
    assert!(!timeline.estimated);
}

#[test]
fn duplicate_log_records_within_tolerance_collapse_to_one_play() {
    let library = Library::new();
    library.write_log(
        "session.log",
        "\
Session Start @ 2025-05-03 22:00:00
22:00:00  Deck 1  A - One
22:00:03  Deck 1  A - One
22:10:00  Deck 2  B - Two
",
    );

    let timeline = extract_timeline(&library.request(Mode::Logs, false)).unwrap();
    assert_eq!(timeline.events.len(), 2);
    assert_eq!(
        timeline.events[0].time.instant(),
        Some(Utc.with_ymd_and_hms(2025, 5, 3, 22, 0, 0).unwrap())
    );
}

#[test]
fn corrupt_crate_degrades_to_a_warning_not_a_failure() {
    let library = Library::new();
    library.write_crate("good.crate", &night_crate());
    library.write_crate("bad.crate", &[0x00, 0x01, 0x02]);

    let timeline = extract_timeline(&library.request(Mode::Crate, true)).unwrap();
    // the good sibling is unaffected
    assert_eq!(timeline.events.len(), 3);
    assert_eq!(timeline.warnings.len(), 1);
    assert_eq!(timeline.warnings[0].kind, WarningKind::Parse);
    assert!(timeline.warnings[0]
        .path
        .as_ref()
        .is_some_and(|p| p.ends_with("bad.crate")));
}

#[test]
fn truncated_crate_keeps_its_leading_entries() {
    let library = Library::new();
    let mut data = night_crate();
    // trailing record declares a payload past end of file
    data.extend_from_slice(b"otrk");
    data.extend_from_slice(&9999u32.to_be_bytes());

    library.write_crate("night.crate", &data);

    let timeline = extract_timeline(&library.request(Mode::Crate, true)).unwrap();
    assert_eq!(timeline.events.len(), 3);
    assert_eq!(timeline.warnings.len(), 1);
    assert_eq!(timeline.warnings[0].kind, WarningKind::Parse);
    assert!(timeline.warnings[0].offset.is_some());
}

#[test]
fn missing_root_is_a_config_error() {
    let request = ExtractRequest::for_root("/definitely/not/a/serato/library");
    let err = extract_timeline(&request).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let report = err.report();
    assert_eq!(report.kind, "config");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["kind"], "config");
    assert!(json["message"].is_string());
}

#[test]
fn explicit_mode_without_its_source_is_unavailable() {
    let library = Library::new();
    library.write_crate("night.crate", &night_crate());

    let err = extract_timeline(&library.request(Mode::Logs, false)).unwrap_err();
    assert!(matches!(
        err,
        Error::UnavailableSource {
            mode: Mode::Logs,
            missing: "logs"
        }
    ));
    assert_eq!(err.report().mode.as_deref(), Some("logs"));
}

#[test]
fn empty_library_in_auto_mode_is_unavailable() {
    let library = Library::new();
    let err = extract_timeline(&library.request(Mode::Auto, true)).unwrap_err();
    assert!(matches!(err, Error::UnavailableSource { mode: Mode::Auto, .. }));
}

#[test]
fn timeline_serializes_for_the_invocation_boundary() {
    let library = Library::new();
    library.write_log("2025-05-03@Loft.log", NIGHT_LOG);

    let timeline = extract_timeline(&library.request(Mode::Auto, false)).unwrap();
    let json = serde_json::to_value(&timeline).unwrap();

    assert_eq!(json["resolved_mode"], "using_logs");
    assert_eq!(json["complete"], true);
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["time"]["source"], "exact");
    assert!(events[0]["time"]["start"].is_string());
    assert_eq!(events[0]["confidence"], 1.0);
    assert!(json["tracks"].is_object());
    assert!(json["sessions"].as_array().unwrap().len() == 1);
}

#[test]
fn each_crate_gets_its_own_session() {
    let library = Library::new();
    library.write_crate("friday set.crate", &simple_track("One", "A", "Music/1.mp3", "100"));
    library.write_crate("saturday set.crate", &simple_track("Two", "B", "Music/2.mp3", "100"));

    let timeline = extract_timeline(&library.request(Mode::Crate, false)).unwrap();
    assert_eq!(timeline.sessions.len(), 2);
    let ids: Vec<_> = timeline
        .sessions
        .iter()
        .map(|s| s.session_id.as_str())
        .collect();
    assert_eq!(ids, vec!["friday set", "saturday set"]);
}
