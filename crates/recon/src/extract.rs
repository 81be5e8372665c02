//! Validation of a parsed schedule document into typed records.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::RenameRule;
use crate::model::{DocProgramme, ExternalChannel, LangText, ScheduleDocument, SourceProgram};

pub struct ExtractOptions<'a> {
    pub preferred_langs: &'a [String],
    pub unknown_title: &'a str,
    pub rename: &'a [RenameRule],
}

/// Records discarded at the parse boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub channels_without_id: usize,
    pub programs_incomplete: usize,
    pub programs_unknown_channel: usize,
}

impl DropCounts {
    pub fn total(&self) -> usize {
        self.channels_without_id + self.programs_incomplete + self.programs_unknown_channel
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceSchedule {
    pub channels: Vec<ExternalChannel>,
    pub programs: Vec<SourceProgram>,
    pub dropped: DropCounts,
    rename: Vec<RenameRule>,
}

/// Programs grouped by match key, keys in order of first program.
#[derive(Debug, Clone, Default)]
pub struct ScheduleIndex {
    keys: Vec<String>,
    groups: HashMap<String, Vec<usize>>,
}

impl ScheduleIndex {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Indices into [`SourceSchedule::programs`].
    pub fn programs_for(&self, key: &str) -> &[usize] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub fn extract(doc: &ScheduleDocument, opts: &ExtractOptions<'_>) -> SourceSchedule {
    let mut out = SourceSchedule {
        rename: opts.rename.to_vec(),
        ..SourceSchedule::default()
    };
    let mut position: HashMap<String, usize> = HashMap::new();

    for channel in &doc.channels {
        let Some(id) = channel.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) else {
            out.dropped.channels_without_id += 1;
            continue;
        };
        let aliases: Vec<String> = channel
            .display_names
            .iter()
            .map(|n| n.text.trim())
            .filter(|n| !n.is_empty())
            .map(|n| apply_rename(opts.rename, n).to_string())
            .collect();
        let resolved_name = match aliases.first() {
            Some(first) => first.clone(),
            None => apply_rename(opts.rename, id).to_string(),
        };
        let record = ExternalChannel {
            native_id: id.to_string(),
            resolved_name,
            aliases,
        };
        // A repeated id replaces the earlier definition in place.
        match position.get(id) {
            Some(&idx) => out.channels[idx] = record,
            None => {
                position.insert(id.to_string(), out.channels.len());
                out.channels.push(record);
            }
        }
    }

    for programme in &doc.programmes {
        let (Some(channel), Some(start), Some(stop)) = (
            non_blank(programme.channel.as_deref()),
            non_blank(programme.start.as_deref()),
            non_blank(programme.stop.as_deref()),
        ) else {
            out.dropped.programs_incomplete += 1;
            continue;
        };
        if !position.contains_key(channel) {
            out.dropped.programs_unknown_channel += 1;
            continue;
        }
        out.programs.push(SourceProgram {
            native_channel: channel.to_string(),
            start: start.to_string(),
            stop: stop.to_string(),
            title: pick_title(programme, opts.preferred_langs, opts.unknown_title),
        });
    }

    out
}

impl SourceSchedule {
    pub fn channel(&self, native_id: &str) -> Option<&ExternalChannel> {
        self.channels.iter().find(|c| c.native_id == native_id)
    }

    /// Group programs by native id (`by_id`) or by resolved name. Channels
    /// sharing a resolved name share one group.
    pub fn index(&self, by_id: bool) -> ScheduleIndex {
        let names: HashMap<&str, &str> = self
            .channels
            .iter()
            .map(|c| (c.native_id.as_str(), c.resolved_name.as_str()))
            .collect();

        let mut index = ScheduleIndex::default();
        for (i, program) in self.programs.iter().enumerate() {
            let key = if by_id {
                apply_rename(&self.rename, &program.native_channel)
            } else {
                match names.get(program.native_channel.as_str()) {
                    Some(name) => *name,
                    None => continue,
                }
            };
            match index.groups.get_mut(key) {
                Some(group) => group.push(i),
                None => {
                    index.keys.push(key.to_string());
                    index.groups.insert(key.to_string(), vec![i]);
                }
            }
        }
        index
    }
}

fn apply_rename<'a>(rules: &'a [RenameRule], value: &'a str) -> &'a str {
    rules
        .iter()
        .find(|r| r.from == value)
        .map(|r| r.to.as_str())
        .unwrap_or(value)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn pick_title(programme: &DocProgramme, preferred: &[String], unknown: &str) -> String {
    let usable = |t: &&LangText| !t.text.trim().is_empty();
    let localized = programme.titles.iter().filter(usable).find(|t| {
        t.lang
            .as_deref()
            .map_or(false, |lang| preferred.iter().any(|p| p == lang))
    });
    localized
        .or_else(|| programme.titles.iter().find(usable))
        .map(|t| t.text.trim().to_string())
        .unwrap_or_else(|| unknown.to_string())
}
