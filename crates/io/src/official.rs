// Official per-channel schedule feed (one JSON document per channel per day)

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use tvmerge_recon::model::ScheduleSlot;
use tvmerge_recon::timeline::WIRE_FORMAT;

use crate::error::LineupError;

const FEED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct DayFeed {
    #[serde(default)]
    schedules: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    #[serde(default)]
    starttime: Option<String>,
    #[serde(default, rename = "showStarttime")]
    show_starttime: Option<String>,
    #[serde(default)]
    endtime: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// `{server}/schedules/{code}_{YYYYMMDD}.json`
pub fn day_url(server: &str, system_code: &str, date: NaiveDate) -> String {
    format!(
        "{}/schedules/{system_code}_{}.json",
        server.trim_end_matches('/'),
        date.format("%Y%m%d")
    )
}

/// Parse one day of the feed. Entries with unparseable times are skipped;
/// a missing end time falls back to the start time.
pub fn parse_day(json: &str, utc_offset: &str) -> Result<Vec<ScheduleSlot>, LineupError> {
    let feed: DayFeed =
        serde_json::from_str(json).map_err(|e| LineupError::Feed(e.to_string()))?;

    let slots = feed
        .schedules
        .into_iter()
        .filter_map(|entry| {
            let start = entry
                .starttime
                .filter(|s| !s.is_empty())
                .or(entry.show_starttime)?;
            let stop = entry.endtime.filter(|s| !s.is_empty()).unwrap_or_else(|| start.clone());
            Some(ScheduleSlot {
                start: to_wire(&start, utc_offset)?,
                stop: to_wire(&stop, utc_offset)?,
                title: entry.title.unwrap_or_default().trim().to_string(),
            })
        })
        .collect();
    Ok(slots)
}

fn to_wire(value: &str, utc_offset: &str) -> Option<String> {
    let parsed = NaiveDateTime::parse_from_str(value.trim(), FEED_TIME_FORMAT).ok()?;
    Some(format!("{} {utc_offset}", parsed.format(WIRE_FORMAT)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_day_url() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(
            day_url("http://210.13.21.3/", "ch001", date),
            "http://210.13.21.3/schedules/ch001_20250102.json"
        );
    }

    #[test]
    fn parses_slots_into_wire_format() {
        let json = r#"{"schedules": [
            {"starttime": "2025-01-01 08:00:00", "endtime": "2025-01-01 09:00:00", "title": " 朝闻天下 "},
            {"showStarttime": "2025-01-01 09:00:00", "endtime": "2025-01-01 10:00:00"},
            {"starttime": "bogus", "endtime": "2025-01-01 11:00:00", "title": "x"},
            {"starttime": "2025-01-01 11:00:00", "title": "no end"}
        ]}"#;
        let slots = parse_day(json, "+0800").unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].start, "20250101080000 +0800");
        assert_eq!(slots[0].stop, "20250101090000 +0800");
        assert_eq!(slots[0].title, "朝闻天下");
        assert_eq!(slots[1].start, "20250101090000 +0800");
        assert_eq!(slots[1].title, "");
        assert_eq!(slots[2].start, slots[2].stop);
    }

    #[test]
    fn empty_or_invalid_documents() {
        assert!(parse_day("{}", "+0800").unwrap().is_empty());
        assert!(parse_day("<html>", "+0800").is_err());
    }
}
