// Local lineup loading and provider playlist linking

use std::collections::HashMap;

use serde_json::Value;

use tvmerge_recon::config::PlaylistFormat;
use tvmerge_recon::model::LocalChannel;

use crate::error::LineupError;

const GENRE_MARKER: &str = "#genre#";

/// Prefix of permanent ids synthesized from the system code.
pub const SYNTHETIC_ID_PREFIX: &str = "UN_";

/// Parse a genre-grouped channel list:
///
/// ```text
/// 央视频道,#genre#
/// CCTV-1 综合,rtp://239.3.1.29:8000
/// ```
///
/// Channels without a `,` are ignored. A repeated uri keeps the position of
/// its first entry but takes the name and category of the last one.
pub fn parse_channel_list(text: &str) -> Vec<LocalChannel> {
    let mut channels: Vec<LocalChannel> = Vec::new();
    let mut by_uri: HashMap<String, usize> = HashMap::new();
    let mut category = String::new();
    let mut skipped = 0usize;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            skipped += 1;
            continue;
        }
        if line.contains(GENRE_MARKER) {
            category = line
                .replace(GENRE_MARKER, "")
                .trim()
                .trim_end_matches(',')
                .trim()
                .to_string();
            log::debug!("category: {category}");
            continue;
        }
        let Some((name, uri)) = line.split_once(',') else {
            skipped += 1;
            continue;
        };
        let (name, uri) = (name.trim(), uri.trim());
        if name.is_empty() || uri.is_empty() {
            skipped += 1;
            continue;
        }
        if let Some(&pos) = by_uri.get(uri) {
            let earlier = &mut channels[pos];
            log::debug!("{uri}: '{}' replaced by '{name}'", earlier.raw_name);
            earlier.raw_name = name.to_string();
            earlier.category = category.clone();
            skipped += 1;
            continue;
        }
        by_uri.insert(uri.to_string(), channels.len());
        channels.push(LocalChannel {
            raw_name: name.to_string(),
            category: category.clone(),
            playout_uri: uri.to_string(),
            permanent_id: None,
            system_code: None,
        });
    }

    log::info!("lineup: {} channels ({skipped} lines skipped)", channels.len());
    channels
}

pub fn load_channel_list(path: &str) -> Result<Vec<LocalChannel>, LineupError> {
    let text = std::fs::read_to_string(path).map_err(|source| LineupError::Io {
        path: path.to_string(),
        source,
    })?;
    Ok(parse_channel_list(&text))
}

/// Attach provider ids to lineup channels by playout uri.
///
/// Returns how many channels were linked.
pub fn link_playlist(
    channels: &mut [LocalChannel],
    playlist_json: &str,
    format: &PlaylistFormat,
) -> Result<usize, LineupError> {
    let root: Value =
        serde_json::from_str(playlist_json).map_err(|e| LineupError::Playlist(e.to_string()))?;
    let entries = playlist_entries(&root, format)?;

    let by_uri: HashMap<String, usize> = channels
        .iter()
        .enumerate()
        .map(|(i, c)| (c.playout_uri.clone(), i))
        .collect();

    let mut linked = 0;
    for (name, entry) in entries {
        let Some(uri) = entry_uri(entry, format) else {
            log::debug!("playlist entry {name} has no uri");
            continue;
        };
        let Some(&idx) = by_uri.get(&uri) else {
            continue;
        };
        let Some(code) = scalar(entry.get(&format.id_field)) else {
            log::warn!("playlist entry {name} has no {}", format.id_field);
            continue;
        };
        let permanent = scalar(entry.get(&format.user_id_field))
            .unwrap_or_else(|| format!("{SYNTHETIC_ID_PREFIX}{}", code.chars().take(8).collect::<String>()));

        let channel = &mut channels[idx];
        if channel.permanent_id.is_none() {
            linked += 1;
        }
        channel.permanent_id = Some(permanent);
        channel.system_code = Some(code);
    }

    log::info!("playlist linked {linked} of {} channels", channels.len());
    Ok(linked)
}

/// Named entries of a provider playlist, in document order.
pub(crate) fn playlist_entries<'a>(
    root: &'a Value,
    format: &PlaylistFormat,
) -> Result<Vec<(String, &'a Value)>, LineupError> {
    if format.dict_format {
        let map = root
            .as_object()
            .ok_or_else(|| LineupError::Shape("expected an object of channels".into()))?;
        Ok(map.iter().map(|(k, v)| (k.clone(), v)).collect())
    } else {
        let list = root
            .as_array()
            .ok_or_else(|| LineupError::Shape("expected an array of channels".into()))?;
        Ok(list
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("channel_{i}"), v))
            .collect())
    }
}

/// Playout uri of one entry, with the format's prefix rewrite applied.
pub(crate) fn entry_uri(entry: &Value, format: &PlaylistFormat) -> Option<String> {
    let uri = nested_str(entry, &format.uri_path)?;
    match &format.uri_rewrite {
        Some((from, to)) => match uri.strip_prefix(from.as_str()) {
            Some(rest) => Some(format!("{to}{rest}")),
            None => Some(uri),
        },
        None => Some(uri),
    }
}

pub(crate) fn nested_str(entry: &Value, path: &[String]) -> Option<String> {
    let mut current = entry;
    for key in path {
        current = current.get(key.as_str())?;
    }
    current.as_str().map(str::to_string).filter(|s| !s.is_empty())
}

/// Non-empty string or number rendered as text.
pub(crate) fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvmerge_recon::config::ReconConfig;

    const LIST: &str = "\
# exported lineup
央视频道,#genre#
CCTV-1 综合,rtp://239.3.1.29:8000
CCTV-2 财经,rtp://239.3.1.2:8000

卫视频道,#genre#
北京卫视,rtp://239.3.1.241:8000
no comma here
北京卫视 重复,rtp://239.3.1.241:8000
";

    fn formats() -> ReconConfig {
        ReconConfig::from_toml("name = \"t\"\n[lineup]\nchannels = \"x\"\n").unwrap()
    }

    #[test]
    fn parses_categories_and_skips_noise() {
        let channels = parse_channel_list(LIST);
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].raw_name, "CCTV-1 综合");
        assert_eq!(channels[0].category, "央视频道");
        assert_eq!(channels[2].category, "卫视频道");
        assert_eq!(channels[2].raw_name, "北京卫视 重复");
    }

    #[test]
    fn repeated_uri_takes_last_entry_in_first_position() {
        let text = "\
央视频道,#genre#
CCTV-1,rtp://239.3.1.29:8000
CCTV-2,rtp://239.3.1.2:8000
高清频道,#genre#
CCTV-1 高清,rtp://239.3.1.29:8000
";
        let channels = parse_channel_list(text);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].raw_name, "CCTV-1 高清");
        assert_eq!(channels[0].category, "高清频道");
        assert_eq!(channels[0].playout_uri, "rtp://239.3.1.29:8000");
        assert_eq!(channels[1].raw_name, "CCTV-2");
    }

    #[test]
    fn links_dict_playlist_by_uri() {
        let mut channels = parse_channel_list(LIST);
        let playlist = r#"{
            "CCTV1": {"id_sys": "ch00000000000000001", "tvg_id": "1",
                      "live": {"bjunicom-multicast": {"addr": "rtp://239.3.1.29:8000"}}},
            "CCTV2": {"id_sys": "ch00000000000000002",
                      "live": {"bjunicom-multicast": {"addr": "rtp://239.3.1.2:8000"}}},
            "Other": {"id_sys": "x", "tvg_id": 9,
                      "live": {"bjunicom-multicast": {"addr": "rtp://10.0.0.1:1"}}}
        }"#;
        let config = formats();
        let linked = link_playlist(&mut channels, playlist, config.playlist_format().unwrap()).unwrap();
        assert_eq!(linked, 2);
        assert_eq!(channels[0].permanent_id.as_deref(), Some("1"));
        assert_eq!(channels[0].system_code.as_deref(), Some("ch00000000000000001"));
        assert_eq!(channels[1].permanent_id.as_deref(), Some("UN_ch000000"));
        assert_eq!(channels[2].permanent_id, None);
    }

    #[test]
    fn links_array_playlist_with_rewrite() {
        let mut channels = parse_channel_list(LIST);
        let playlist = r#"[
            {"channelID": "c1", "userChannelID": 241, "channelURL": "igmp://239.3.1.241:8000"},
            {"channelURL": "igmp://239.3.1.2:8000"}
        ]"#;
        let config = formats();
        let format = &config.lineup.formats["raw"];
        let linked = link_playlist(&mut channels, playlist, format).unwrap();
        assert_eq!(linked, 1);
        assert_eq!(channels[2].permanent_id.as_deref(), Some("241"));
        assert_eq!(channels[1].permanent_id, None);
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let mut channels = parse_channel_list(LIST);
        let config = formats();
        let err = link_playlist(&mut channels, "[]", config.playlist_format().unwrap()).unwrap_err();
        assert!(matches!(err, LineupError::Shape(_)));
        let err = link_playlist(&mut channels, "{", config.playlist_format().unwrap()).unwrap_err();
        assert!(matches!(err, LineupError::Playlist(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_channel_list("/nonexistent/lineup.txt").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/lineup.txt"));
    }
}
