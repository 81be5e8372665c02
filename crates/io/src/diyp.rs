// DIYP player JSON view of an XMLTV guide

use std::collections::HashMap;

use serde::Serialize;

use tvmerge_recon::model::{LangText, ScheduleDocument};

const UNKNOWN_CHANNEL: &str = "未知频道";
const UNKNOWN_PROGRAM: &str = "未知节目";
const CHINESE_LANGS: [&str; 2] = ["zh", "zh-CN"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiypGuide {
    pub epg: Vec<DiypChannel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiypChannel {
    pub name: String,
    pub tvgid: String,
    pub logo: String,
    pub program: Vec<DiypProgram>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiypProgram {
    pub start: String,
    pub end: String,
    pub title: String,
}

/// Convert a parsed guide. `filter` keeps channels whose name or id contains
/// it, case-insensitively.
pub fn to_diyp(doc: &ScheduleDocument, filter: Option<&str>) -> DiypGuide {
    let mut channels: Vec<DiypChannel> = Vec::new();
    let mut position: HashMap<&str, usize> = HashMap::new();

    for channel in &doc.channels {
        let Some(id) = channel.id.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        let entry = DiypChannel {
            name: chinese_text(&channel.display_names).unwrap_or_else(|| UNKNOWN_CHANNEL.into()),
            tvgid: id.to_string(),
            logo: channel.icon.clone().unwrap_or_default(),
            program: Vec::new(),
        };
        match position.get(id) {
            Some(&i) => channels[i] = entry,
            None => {
                position.insert(id, channels.len());
                channels.push(entry);
            }
        }
    }

    for p in &doc.programmes {
        let Some(&i) = p.channel.as_deref().and_then(|c| position.get(c)) else {
            continue;
        };
        let start = wire_datetime(p.start.as_deref());
        let end = wire_datetime(p.stop.as_deref());
        if start.is_empty() || end.is_empty() {
            continue;
        }
        channels[i].program.push(DiypProgram {
            start,
            end,
            title: chinese_text(&p.titles).unwrap_or_else(|| UNKNOWN_PROGRAM.into()),
        });
    }

    if let Some(needle) = filter.map(|f| f.trim().to_lowercase()).filter(|f| !f.is_empty()) {
        channels.retain(|c| {
            c.name.to_lowercase().contains(&needle) || c.tvgid.to_lowercase().contains(&needle)
        });
    }

    DiypGuide { epg: channels }
}

/// First text tagged Chinese or untagged; blank text counts as unknown.
fn chinese_text(texts: &[LangText]) -> Option<String> {
    let hit = texts.iter().find(|t| match t.lang.as_deref() {
        None | Some("") => true,
        Some(lang) => CHINESE_LANGS.contains(&lang),
    })?;
    Some(hit.text.trim().to_string()).filter(|t| !t.is_empty())
}

fn wire_datetime(value: Option<&str>) -> String {
    value
        .and_then(|v| v.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}
