//! Per-channel interval bookkeeping.
//!
//! The first program to claim a time window on a channel keeps it; any later
//! program overlapping an accepted window on the same channel is dropped.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::model::ProgramEntry;

/// Date-time part of the `YYYYMMDDHHMMSS ±ZZZZ` wire format.
pub const WIRE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Parse the date-time part of a wire timestamp. The offset is ignored.
pub fn parse_wire_timestamp(value: &str) -> Option<NaiveDateTime> {
    let datetime = value.split_whitespace().next()?;
    NaiveDateTime::parse_from_str(datetime, WIRE_FORMAT).ok()
}

/// Half-open overlap: intervals touching at an endpoint do not overlap.
pub fn overlaps(a: (NaiveDateTime, NaiveDateTime), b: (NaiveDateTime, NaiveDateTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleBook {
    intervals: HashMap<String, Vec<(NaiveDateTime, NaiveDateTime)>>,
    programs: Vec<ProgramEntry>,
    rejected: usize,
}

impl ScheduleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the program unless it is malformed or overlaps an accepted
    /// interval on the same channel. Rejection leaves the book unchanged
    /// apart from the rejection counter.
    pub fn try_accept(&mut self, channel: &str, start: &str, stop: &str, title: &str) -> bool {
        if channel.is_empty() {
            self.rejected += 1;
            return false;
        }
        let (Some(s), Some(e)) = (parse_wire_timestamp(start), parse_wire_timestamp(stop)) else {
            self.rejected += 1;
            return false;
        };
        if s >= e {
            self.rejected += 1;
            return false;
        }

        let existing = self.intervals.get(channel).map(Vec::as_slice).unwrap_or(&[]);
        if existing.iter().any(|&iv| overlaps((s, e), iv)) {
            self.rejected += 1;
            return false;
        }

        self.intervals.entry(channel.to_string()).or_default().push((s, e));
        self.programs.push(ProgramEntry {
            channel: channel.to_string(),
            start: start.to_string(),
            stop: stop.to_string(),
            title: title.to_string(),
        });
        true
    }

    pub fn programs(&self) -> &[ProgramEntry] {
        &self.programs
    }

    pub fn into_programs(self) -> Vec<ProgramEntry> {
        self.programs
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Programs refused so far (malformed or overlapping).
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn intervals(&self, channel: &str) -> &[(NaiveDateTime, NaiveDateTime)] {
        self.intervals.get(channel).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn channel_count(&self, channel: &str) -> usize {
        self.intervals(channel).len()
    }
}
