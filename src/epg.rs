// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Short EPG handling: timestamp normalization, text decoding and the
//! "now playing / up next" window.
//!
//! Upstream EPG data is inconsistent. Timestamps arrive as unix seconds, unix
//! milliseconds, RFC 3339 or a bare `YYYY-MM-DD HH:MM:SS` in local time, and
//! titles are usually base64. Entries that cannot be placed in time are
//! skipped instead of failing the listing.

use crate::xtream_api::EpgListing;
use base64::Engine;
use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// Lenient like browser atob(): non-zero trailing bits are accepted.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y%m%d%H%M%S %z",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub id: String,
    pub channel_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Start time as sent upstream, not yet normalized
    pub start: String,
    pub stop: String,
}

impl ProgramEntry {
    /// Prefer the unix timestamp fields, falling back to the datetime strings
    pub fn from_listing(listing: EpgListing) -> Self {
        let pick = |primary: Option<String>, fallback: Option<String>| {
            primary
                .filter(|s| !s.trim().is_empty())
                .or(fallback)
                .unwrap_or_default()
        };

        Self {
            id: listing.id.unwrap_or_default(),
            channel_id: listing.channel_id.unwrap_or_default(),
            title: decode_text(listing.title.as_deref()),
            description: decode_text(listing.description.as_deref()),
            start: pick(listing.start_timestamp, listing.start),
            stop: pick(listing.stop_timestamp, listing.end),
        }
    }
}

pub fn entries_from_listings(listings: Vec<EpgListing>) -> Vec<ProgramEntry> {
    listings.into_iter().map(ProgramEntry::from_listing).collect()
}

/// An entry with both ends placed on the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledProgram {
    pub entry: ProgramEntry,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl ScheduledProgram {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.stop
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpgWindow {
    pub current: Option<ScheduledProgram>,
    pub next: Option<ScheduledProgram>,
}

impl EpgWindow {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.next.is_none()
    }
}

/// Normalize an upstream timestamp, reading zone-less datetimes as local time
pub fn normalize_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    normalize_timestamp_in(raw, &Local)
}

/// Normalize an upstream timestamp, reading zone-less datetimes in `tz`
pub fn normalize_timestamp_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let value: i64 = raw.parse().ok()?;
        return match raw.len() {
            10 => DateTime::from_timestamp(value, 0),
            11..=13 => DateTime::from_timestamp_millis(value),
            _ => None,
        };
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // chrono's %z wants a numeric offset
    let zoned = match raw.strip_suffix(['Z', 'z']) {
        Some(rest) => format!("{}+00:00", rest),
        None => raw.to_string(),
    };
    for format in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }

    None
}

/// Entries with a valid start and stop, ordered by start
pub fn schedule_in<Tz: TimeZone>(entries: &[ProgramEntry], tz: &Tz) -> Vec<ScheduledProgram> {
    let mut scheduled: Vec<ScheduledProgram> = entries
        .iter()
        .filter_map(|entry| {
            let start = normalize_timestamp_in(&entry.start, tz);
            let stop = normalize_timestamp_in(&entry.stop, tz);
            match (start, stop) {
                (Some(start), Some(stop)) => Some(ScheduledProgram {
                    entry: entry.clone(),
                    start,
                    stop,
                }),
                _ => {
                    debug!(
                        "Skipping EPG entry {:?} with unusable times {:?} - {:?}",
                        entry.id, entry.start, entry.stop
                    );
                    None
                }
            }
        })
        .collect();

    scheduled.sort_by_key(|p| p.start);
    scheduled
}

/// Find the program airing at `now` and the one after it
pub fn resolve(entries: &[ProgramEntry], now: DateTime<Utc>) -> EpgWindow {
    resolve_in(entries, now, &Local)
}

pub fn resolve_in<Tz: TimeZone>(entries: &[ProgramEntry], now: DateTime<Utc>, tz: &Tz) -> EpgWindow {
    let scheduled = schedule_in(entries, tz);

    // Overlaps resolve to the earliest-starting entry
    if let Some(index) = scheduled.iter().position(|p| p.contains(now)) {
        return EpgWindow {
            current: scheduled.get(index).cloned(),
            next: scheduled.get(index + 1).cloned(),
        };
    }

    EpgWindow {
        current: None,
        next: scheduled.iter().find(|p| p.start > now).cloned(),
    }
}

/// Decode base64 text, keeping the original when it doesn't decode to clean text
pub fn decode_text(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }

    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if !looks_like_base64(&compact) {
        return Some(raw.to_string());
    }

    let bytes = match LENIENT_BASE64.decode(compact.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Failed to decode base64 text {:?}: {}", raw, e);
            return Some(raw.to_string());
        }
    };

    match String::from_utf8(bytes) {
        Ok(decoded) if !has_control_chars(&decoded) => Some(decoded),
        Ok(_) => {
            warn!(
                "Decoded text contains control characters, keeping original: {:?}",
                raw
            );
            Some(raw.to_string())
        }
        Err(_) => Some(raw.to_string()),
    }
}

fn looks_like_base64(s: &str) -> bool {
    if s.is_empty() || s.len() % 4 != 0 {
        return false;
    }

    let body = s.trim_end_matches('=');
    let padding = s.len() - body.len();
    padding <= 2
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

fn has_control_chars(s: &str) -> bool {
    s.chars()
        .any(|c| matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}'))
}

/// `HH:MM` in local time, or `--:--` when the timestamp is unusable
pub fn format_clock(raw: &str) -> String {
    format_clock_in(raw, &Local)
}

pub fn format_clock_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match normalize_timestamp_in(raw, tz) {
        Some(instant) => instant.with_timezone(tz).format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};

    fn entry(id: &str, start: String, stop: String) -> ProgramEntry {
        ProgramEntry {
            id: id.to_string(),
            channel_id: "news.de".to_string(),
            title: Some(format!("Program {}", id)),
            description: None,
            start,
            stop,
        }
    }

    fn secs(instant: DateTime<Utc>) -> String {
        instant.timestamp().to_string()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap()
    }

    #[test]
    fn test_current_and_next() {
        let now = now();
        let entries = vec![
            entry(
                "past",
                secs(now - Duration::seconds(3600)),
                secs(now - Duration::seconds(1800)),
            ),
            entry(
                "live",
                secs(now - Duration::seconds(600)),
                secs(now + Duration::seconds(600)),
            ),
            entry(
                "later",
                secs(now + Duration::seconds(600)),
                secs(now + Duration::seconds(1800)),
            ),
        ];

        let window = resolve_in(&entries, now, &Utc);
        assert_eq!(window.current.unwrap().entry.id, "live");
        assert_eq!(window.next.unwrap().entry.id, "later");
    }

    #[test]
    fn test_unsorted_input_is_ordered() {
        let now = now();
        let entries = vec![
            entry(
                "later",
                secs(now + Duration::seconds(600)),
                secs(now + Duration::seconds(1800)),
            ),
            entry(
                "live",
                secs(now - Duration::seconds(600)),
                secs(now + Duration::seconds(600)),
            ),
        ];

        let window = resolve_in(&entries, now, &Utc);
        assert_eq!(window.current.unwrap().entry.id, "live");
        assert_eq!(window.next.unwrap().entry.id, "later");
    }

    #[test]
    fn test_all_future_picks_earliest() {
        let now = now();
        let entries = vec![
            entry(
                "b",
                secs(now + Duration::seconds(3600)),
                secs(now + Duration::seconds(7200)),
            ),
            entry(
                "a",
                secs(now + Duration::seconds(60)),
                secs(now + Duration::seconds(3600)),
            ),
        ];

        let window = resolve_in(&entries, now, &Utc);
        assert!(window.current.is_none());
        assert_eq!(window.next.unwrap().entry.id, "a");
    }

    #[test]
    fn test_stop_is_exclusive() {
        let now = now();
        let entries = vec![
            entry("ended", secs(now - Duration::seconds(600)), secs(now)),
            entry("starting", secs(now), secs(now + Duration::seconds(600))),
        ];

        let window = resolve_in(&entries, now, &Utc);
        assert_eq!(window.current.unwrap().entry.id, "starting");
        assert!(window.next.is_none());
    }

    #[test]
    fn test_unparseable_entries_are_skipped() {
        let now = now();
        let entries = vec![
            entry("bad", "not-a-date".to_string(), secs(now + Duration::seconds(60))),
            entry(
                "good",
                secs(now + Duration::seconds(60)),
                secs(now + Duration::seconds(120)),
            ),
        ];

        let window = resolve_in(&entries, now, &Utc);
        assert!(window.current.is_none());
        assert_eq!(window.next.unwrap().entry.id, "good");
    }

    #[test]
    fn test_empty_listing() {
        let window = resolve_in(&[], now(), &Utc);
        assert!(window.is_empty());

        let past = vec![entry(
            "past",
            secs(now() - Duration::seconds(120)),
            secs(now() - Duration::seconds(60)),
        )];
        assert!(resolve_in(&past, now(), &Utc).is_empty());
    }

    #[test]
    fn test_overlap_prefers_earliest_start() {
        let now = now();
        let entries = vec![
            entry(
                "inner",
                secs(now - Duration::seconds(60)),
                secs(now + Duration::seconds(60)),
            ),
            entry(
                "outer",
                secs(now - Duration::seconds(600)),
                secs(now + Duration::seconds(600)),
            ),
        ];

        let window = resolve_in(&entries, now, &Utc);
        assert_eq!(window.current.unwrap().entry.id, "outer");
        assert_eq!(window.next.unwrap().entry.id, "inner");
    }

    #[test]
    fn test_normalize_unix_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(normalize_timestamp_in("1735725600", &Utc), Some(expected));
        assert_eq!(normalize_timestamp_in("1735725600000", &Utc), Some(expected));
        assert_eq!(normalize_timestamp_in("12345", &Utc), None);
        assert_eq!(normalize_timestamp_in("", &Utc), None);
        assert_eq!(normalize_timestamp_in("not-a-date", &Utc), None);
    }

    #[test]
    fn test_normalize_iso_with_zone() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(
            normalize_timestamp_in("2025-01-01T10:00:00Z", &Utc),
            Some(expected)
        );
        assert_eq!(
            normalize_timestamp_in("2025-01-01T11:00:00+01:00", &Utc),
            Some(expected)
        );
        assert_eq!(
            normalize_timestamp_in("20250101110000 +0100", &Utc),
            Some(expected)
        );
        assert_eq!(
            normalize_timestamp_in("2025-01-01T10:00Z", &Utc),
            Some(expected)
        );
        assert_eq!(
            normalize_timestamp_in("2025-01-01T11:00+01:00", &Utc),
            Some(expected)
        );
        assert_eq!(
            normalize_timestamp_in("2025-01-01T11:00+0100", &Utc),
            Some(expected)
        );
    }

    #[test]
    fn test_minute_precision_zoned_entry_is_current() {
        let entries = vec![entry(
            "1",
            "2025-01-01T10:00Z".to_string(),
            "2025-01-01T11:00Z".to_string(),
        )];
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 30, 0).unwrap();

        let window = resolve_in(&entries, now, &Utc);
        assert_eq!(window.current.unwrap().entry.id, "1");
        assert!(window.next.is_none());
    }

    #[test]
    fn test_space_separated_is_local_time() {
        let berlin = FixedOffset::east_opt(3600).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(
            normalize_timestamp_in("2025-01-01 10:00:00", &berlin),
            Some(expected)
        );
        assert_eq!(
            normalize_timestamp_in("2025-01-01T10:00", &berlin),
            Some(expected)
        );

        let local = normalize_timestamp("2025-01-01 10:00:00").unwrap();
        assert_eq!(
            local.with_timezone(&Local).format("%H:%M").to_string(),
            "10:00"
        );
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(
            decode_text(Some("VGFnZXNzY2hhdQ==")).as_deref(),
            Some("Tagesschau")
        );
        assert_eq!(
            decode_text(Some("VGFnZXNz\nY2hhdQ==")).as_deref(),
            Some("Tagesschau")
        );
        // Valid alphabet but decodes to invalid UTF-8
        assert_eq!(decode_text(Some("News")).as_deref(), Some("News"));
        assert_eq!(
            decode_text(Some("Evening News!")).as_deref(),
            Some("Evening News!")
        );
        assert_eq!(decode_text(Some("")), None);
        assert_eq!(decode_text(None), None);
    }

    #[test]
    fn test_decode_text_rejects_control_characters() {
        // "\x01\x02\x03" encoded
        assert_eq!(decode_text(Some("AQID")).as_deref(), Some("AQID"));
        // Newlines and tabs are allowed
        assert_eq!(decode_text(Some("YQpi")).as_deref(), Some("a\nb"));
    }

    #[test]
    fn test_from_listing_prefers_unix_fields() {
        let listing: EpgListing = serde_json::from_value(serde_json::json!({
            "id": "77",
            "title": "TmFjaHJpY2h0ZW4=",
            "description": "Plain text, no encoding.",
            "start": "2025-01-01 10:00:00",
            "end": "2025-01-01 11:00:00",
            "channel_id": "news.de",
            "start_timestamp": "1735725600",
            "stop_timestamp": ""
        }))
        .unwrap();

        let entry = ProgramEntry::from_listing(listing);
        assert_eq!(entry.title.as_deref(), Some("Nachrichten"));
        assert_eq!(entry.description.as_deref(), Some("Plain text, no encoding."));
        assert_eq!(entry.start, "1735725600");
        assert_eq!(entry.stop, "2025-01-01 11:00:00");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock_in("1735725600", &Utc), "10:00");
        assert_eq!(format_clock_in("garbage", &Utc), "--:--");
        let berlin = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(format_clock_in("1735725600", &berlin), "11:00");
    }
}
