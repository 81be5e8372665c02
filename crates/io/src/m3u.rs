// M3U playlist for the lineup, pointing players at the merged guide

use std::collections::HashMap;

use regex::{Captures, Regex};
use serde_json::Value;

use tvmerge_recon::config::{M3uConfig, PlaylistFormat};
use tvmerge_recon::model::{LocalChannel, ReconResult};

use crate::error::LineupError;
use crate::lineup::{entry_uri, nested_str, playlist_entries, scalar};

const EXTINF: &str = "#EXTINF:";

/// One playlist line pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistChannel {
    /// Shown after the comma on the `#EXTINF` line.
    pub name: String,
    pub tvg_name: String,
    pub group: String,
    pub url: String,
    pub number: Option<String>,
    pub tvg_id: Option<String>,
    pub logo: Option<String>,
    /// Timeshift base address; enables catchup.
    pub catchup: Option<String>,
    /// Appended from the supplement playlist.
    pub supplemental: bool,
}

/// An entry read from an existing M3U.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct M3uEntry {
    pub name: String,
    pub tvg_name: String,
    pub url: String,
}

/// Playlist channels in lineup order.
///
/// With a reconciliation result, `tvg-id` is the id the guide uses for the
/// channel (temporary ids included); otherwise the linked permanent id.
pub fn from_lineup(
    lineup: &[LocalChannel],
    result: Option<&ReconResult>,
    default_group: &str,
) -> Vec<PlaylistChannel> {
    lineup
        .iter()
        .enumerate()
        .map(|(i, channel)| {
            let guide_id = result
                .and_then(|r| r.channels.get(i))
                .filter(|c| c.raw_name == channel.raw_name)
                .and_then(|c| c.output_id.clone());
            let group = match channel.category.as_str() {
                "" => default_group.to_string(),
                category => category.to_string(),
            };
            PlaylistChannel {
                name: channel.raw_name.clone(),
                tvg_name: channel.raw_name.clone(),
                group,
                url: channel.playout_uri.clone(),
                tvg_id: guide_id.or_else(|| channel.permanent_id.clone()),
                ..Default::default()
            }
        })
        .collect()
}

/// Read `#EXTINF` entries. An entry needs a url on the following line.
pub fn parse_m3u(text: &str) -> Vec<M3uEntry> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut entries = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(info) = line.strip_prefix(EXTINF) else {
            continue;
        };
        let Some(url) = lines.get(i + 1).filter(|u| !u.is_empty() && !u.starts_with('#')) else {
            log::debug!("m3u line {}: entry without url", i + 1);
            continue;
        };
        let name = info
            .rsplit_once(',')
            .map(|(_, name)| name.trim())
            .unwrap_or_default();
        let tvg_name = attribute(info, "tvg-name").unwrap_or(name);
        entries.push(M3uEntry {
            name: name.to_string(),
            tvg_name: tvg_name.to_string(),
            url: url.to_string(),
        });
    }

    log::info!("m3u: {} entries", entries.len());
    entries
}

fn attribute<'a>(info: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!(" {key}=\"");
    let start = info.find(&marker)? + marker.len();
    let rest = &info[start..];
    let end = rest.find('"')?;
    Some(rest[..end].trim()).filter(|v| !v.is_empty())
}

/// Append supplement entries whose url is not in the lineup.
///
/// Lineup channels always win. Among supplement entries, a repeated url
/// keeps its first position and takes the later names. Returns how many
/// channels were added.
pub fn supplement(channels: &mut Vec<PlaylistChannel>, remote: Vec<M3uEntry>, group: &str) -> usize {
    let lineup_len = channels.len();
    let mut position: HashMap<String, usize> = channels
        .iter()
        .enumerate()
        .map(|(i, c)| (c.url.clone(), i))
        .collect();

    let mut added = Vec::new();
    for entry in remote {
        match position.get(&entry.url) {
            Some(&i) if i < lineup_len => {}
            Some(&i) => {
                channels[i].name = entry.name;
                channels[i].tvg_name = entry.tvg_name;
            }
            None => {
                position.insert(entry.url.clone(), channels.len());
                added.push(entry.name.clone());
                channels.push(PlaylistChannel {
                    name: entry.name,
                    tvg_name: entry.tvg_name,
                    group: group.to_string(),
                    url: entry.url,
                    supplemental: true,
                    ..Default::default()
                });
            }
        }
    }

    if !added.is_empty() {
        log::info!("m3u supplement added {} channels: {}", added.len(), added.join(", "));
    }
    added.len()
}

/// Copy number, tvg-name, logo and timeshift address from the provider
/// playlist onto channels with the same playout uri.
///
/// Returns how many channels matched an entry.
pub fn attach_metadata(
    channels: &mut [PlaylistChannel],
    playlist_json: &str,
    format: &PlaylistFormat,
) -> Result<usize, LineupError> {
    let root: Value =
        serde_json::from_str(playlist_json).map_err(|e| LineupError::Playlist(e.to_string()))?;
    let fields = &format.metadata;

    let mut by_uri: HashMap<String, &Value> = HashMap::new();
    for (_, entry) in playlist_entries(&root, format)? {
        if let Some(uri) = entry_uri(entry, format) {
            by_uri.insert(uri, entry);
        }
    }

    let mut matched = 0;
    for channel in channels.iter_mut() {
        let Some(&entry) = by_uri.get(&channel.url) else {
            continue;
        };
        matched += 1;
        let field = |key: &Option<String>| key.as_deref().and_then(|k| scalar(entry.get(k)));

        channel.number = field(&fields.number);
        channel.logo = field(&fields.logo);
        if let Some(tvg_name) = field(&fields.tvg_name) {
            channel.tvg_name = tvg_name;
        }
        if !fields.catchup_path.is_empty() {
            channel.catchup = nested_str(entry, &fields.catchup_path);
        }
        if channel.tvg_id.is_none() {
            channel.tvg_id = scalar(entry.get(&format.user_id_field));
        }
    }

    log::info!("m3u metadata for {matched} of {} channels", channels.len());
    Ok(matched)
}

/// Renders playlists for one `[m3u]` config.
pub struct M3uWriter<'a> {
    config: &'a M3uConfig,
    generator: &'a str,
    placeholder: Option<Regex>,
}

impl<'a> M3uWriter<'a> {
    pub fn new(config: &'a M3uConfig, generator: &'a str) -> Self {
        Self {
            config,
            generator,
            placeholder: Regex::new(r"\{(\w+)\}").ok(),
        }
    }

    /// Logo URL for a channel, `None` when there is nothing to show.
    pub fn logo(&self, channel: &PlaylistChannel) -> Option<String> {
        let template = self.config.logo_template.as_str();
        let own = channel.logo.as_deref().unwrap_or_default();
        let logo = match &self.placeholder {
            _ if template.is_empty() => own.to_string(),
            Some(re) if re.is_match(template) => re
                .replace_all(template, |caps: &Captures| placeholder_value(channel, &caps[1]).to_string())
                .into_owned(),
            _ if own.is_empty() => template.to_string(),
            _ => format!("{}/{}", template.trim_end_matches('/'), own.trim_start_matches('/')),
        };
        Some(logo).filter(|l| !l.is_empty())
    }

    /// Render the playlist; `generated` is stamped into the header.
    pub fn render(&self, channels: &[PlaylistChannel], generated: &str) -> String {
        let mut out = format!("#EXTM3U name=\"{}\"", escape(self.generator));
        if !self.config.epg_url.is_empty() {
            out.push_str(&format!(" x-tvg-url=\"{}\"", escape(&self.config.epg_url)));
        }
        out.push_str(&format!(" generated-time=\"{}\"\n", escape(generated)));

        let mut with_catchup = 0;
        for channel in channels {
            let mut line = format!("{EXTINF}-1");
            if let Some(number) = &channel.number {
                line.push_str(&format!(" channel-number=\"{}\"", escape(number)));
            }
            if let Some(id) = &channel.tvg_id {
                line.push_str(&format!(" tvg-id=\"{}\"", escape(id)));
            }
            line.push_str(&format!(" tvg-name=\"{}\"", escape(&channel.tvg_name)));
            if let Some(logo) = self.logo(channel) {
                line.push_str(&format!(" tvg-logo=\"{}\"", escape(&logo)));
            }
            line.push_str(&format!(" group-title=\"{}\"", escape(&channel.group)));
            if let Some(addr) = &channel.catchup {
                let source = format!("{addr}{}", self.config.catchup_query);
                line.push_str(&format!(" catchup=\"default\" catchup-source=\"{}\"", escape(&source)));
                with_catchup += 1;
            }

            out.push_str(&line);
            out.push(',');
            out.push_str(&channel.name);
            out.push('\n');
            out.push_str(&channel.url);
            out.push('\n');
            if channel.catchup.is_none() && self.config.note_missing_catchup {
                out.push_str(&format!("# no timeshift address for {}\n", channel.url));
            }
        }

        log::info!(
            "m3u: {} channels, {with_catchup} with catchup, {} supplemental",
            channels.len(),
            channels.iter().filter(|c| c.supplemental).count()
        );
        out
    }
}

fn placeholder_value<'c>(channel: &'c PlaylistChannel, key: &str) -> &'c str {
    match key {
        "name" => &channel.name,
        "tvgname" | "tvg_name" => &channel.tvg_name,
        "chno" => channel.number.as_deref().unwrap_or_default(),
        "tvg_id" => channel.tvg_id.as_deref().unwrap_or_default(),
        "logo" => channel.logo.as_deref().unwrap_or_default(),
        _ => "",
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}
