use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// Offset written on timestamps synthesized from the official feed.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    pub lineup: LineupConfig,
    #[serde(default)]
    pub official: OfficialConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub m3u: M3uConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_utc_offset() -> String {
    "+0800".into()
}

// ---------------------------------------------------------------------------
// Lineup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LineupConfig {
    /// Genre-grouped `name,uri` channel list (path or URL).
    pub channels: String,
    /// Provider playlist used to link lineup entries to permanent ids.
    #[serde(default)]
    pub playlist: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_formats")]
    pub formats: HashMap<String, PlaylistFormat>,
}

/// Field layout of a provider playlist JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaylistFormat {
    /// System channel code; entries without one are left unlinked.
    pub id_field: String,
    /// User-facing channel number, used as the permanent id.
    pub user_id_field: String,
    /// Path of keys leading to the playout uri inside one entry.
    pub uri_path: Vec<String>,
    /// `true` for `{name: entry}` objects, `false` for arrays of entries.
    #[serde(default)]
    pub dict_format: bool,
    /// Prefix rewrite applied to the playout uri, e.g. `igmp://` → `rtp://`.
    #[serde(default)]
    pub uri_rewrite: Option<(String, String)>,
    /// Display metadata copied into the M3U playlist.
    #[serde(default)]
    pub metadata: MetadataFields,
}

/// Where an entry keeps the fields written on `#EXTINF` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetadataFields {
    pub number: Option<String>,
    pub tvg_name: Option<String>,
    pub logo: Option<String>,
    /// Path of keys leading to the timeshift base address.
    pub catchup_path: Vec<String>,
}

fn default_format() -> String {
    "zz".into()
}

fn default_formats() -> HashMap<String, PlaylistFormat> {
    let mut formats = HashMap::new();
    formats.insert(
        "zz".to_string(),
        PlaylistFormat {
            id_field: "id_sys".into(),
            user_id_field: "tvg_id".into(),
            uri_path: vec!["live".into(), "bjunicom-multicast".into(), "addr".into()],
            dict_format: true,
            uri_rewrite: None,
            metadata: MetadataFields {
                number: Some("chno".into()),
                tvg_name: Some("tvg_name".into()),
                logo: Some("logo".into()),
                catchup_path: vec!["timeshift".into(), "bjunicom-rtsp".into(), "addr".into()],
            },
        },
    );
    formats.insert(
        "raw".to_string(),
        PlaylistFormat {
            id_field: "channelID".into(),
            user_id_field: "userChannelID".into(),
            uri_path: vec!["channelURL".into()],
            dict_format: false,
            uri_rewrite: Some(("igmp://".into(), "rtp://".into())),
            metadata: MetadataFields {
                number: Some("userChannelID".into()),
                ..Default::default()
            },
        },
    );
    formats
}

// ---------------------------------------------------------------------------
// Official per-channel feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OfficialConfig {
    pub enabled: bool,
    pub server_url: String,
    /// First day offset relative to today (inclusive).
    pub day_offset_start: i64,
    /// Last day offset relative to today (exclusive).
    pub day_offset_end: i64,
}

impl Default for OfficialConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: String::new(),
            day_offset_start: -1,
            day_offset_end: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Matching cascade data
// ---------------------------------------------------------------------------

/// Keyword data driving the normalizer and the fuzzy-match cascade.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Names returned verbatim by the normalizer.
    pub keep_as_is: Vec<String>,
    /// Names containing one of these (plus the high-res marker) keep their suffix.
    pub protected_markers: Vec<String>,
    /// Trailing quality tokens stripped during normalization.
    pub quality_suffixes: Vec<String>,
    pub high_res_marker: String,
    /// Local channels containing one of these are high-resolution variants.
    pub high_res_channels: Vec<String>,
    /// Channel-numbering pattern; capture group 1 is the family tag.
    pub family_pattern: String,
    pub containment_slack: usize,
    pub modifier: String,
    pub composite: Vec<CompositeRule>,
    pub regional: Vec<RegionalRule>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            keep_as_is: vec!["CCTV4K".into(), "CCTV4k".into(), "爱上4K".into()],
            protected_markers: vec!["CCTV4K".into(), "4K超高清".into(), "爱上4K".into()],
            quality_suffixes: vec!["4K".into(), "SDR".into(), "HDR".into(), "超清".into()],
            high_res_marker: "4K".into(),
            high_res_channels: vec!["CCTV4K".into()],
            family_pattern: r"CCTV(4K|\d+\+?)".into(),
            containment_slack: 10,
            modifier: "+".into(),
            composite: vec![CompositeRule {
                tokens: vec!["CGTN".into(), "纪录".into()],
                preferred: Some("英文".into()),
            }],
            regional: vec![RegionalRule {
                tag: "4".into(),
                regions: vec!["欧洲".into(), "美洲".into()],
            }],
        }
    }
}

/// Co-occurring keywords that identify one channel regardless of the rest
/// of its name.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositeRule {
    pub tokens: Vec<String>,
    #[serde(default)]
    pub preferred: Option<String>,
}

/// A family tag that is broadcast in several regional variants.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionalRule {
    pub tag: String,
    pub regions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Merge policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Categories whose channels accept programs from one source only.
    pub single_contribution_categories: Vec<String>,
    /// Raw channel names that accept programs from one source only.
    pub single_contribution_channels: Vec<String>,
    pub temporary_prefix: String,
    pub external_prefix: String,
    /// Carry every external channel into the full guide.
    pub keep_external_channels: bool,
    pub unknown_title: String,
    pub preferred_title_langs: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            single_contribution_categories: vec!["TS频道".into(), "体验频道".into()],
            single_contribution_channels: Vec::new(),
            temporary_prefix: "unm_".into(),
            external_prefix: "ext_".into(),
            keep_external_channels: true,
            unknown_title: "未知节目".into(),
            preferred_title_langs: vec!["zh".into()],
        }
    }
}

impl PolicyConfig {
    pub fn is_single_contribution(&self, raw_name: &str, category: &str) -> bool {
        self.single_contribution_channels.iter().any(|n| n == raw_name)
            || self.single_contribution_categories.iter().any(|c| c == category)
    }
}

// ---------------------------------------------------------------------------
// Fetch + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// First backoff delay; doubles after every failed attempt.
    pub retry_delay_ms: u64,
    pub cache_dir: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retries: 2,
            retry_delay_ms: 1000,
            cache_dir: "./epg_cache".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub lite: String,
    pub full: String,
    pub gzip: bool,
    pub generator_name: String,
    /// JSON run report (identities, per-source and per-channel outcomes).
    pub report: String,
    pub run_log: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            lite: "./epg.xml".into(),
            full: "./epg_full.xml".into(),
            gzip: true,
            generator_name: "tvmerge".into(),
            report: "./epg_report.json".into(),
            run_log: "./epg_run.log".into(),
        }
    }
}

/// M3U playlist written next to the guides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct M3uConfig {
    /// Also write the playlist at the end of `run`.
    pub enabled: bool,
    pub output: String,
    /// Guide URL advertised as `x-tvg-url`.
    pub epg_url: String,
    /// Logo URL. `{name}`, `{tvgname}`, `{chno}`, `{tvg_id}` and `{logo}`
    /// are substituted; without placeholders it is a base joined with the
    /// playlist logo.
    pub logo_template: String,
    /// Extra M3U (path or URL) whose channels missing from the lineup are appended.
    pub supplement: Option<String>,
    pub supplement_group: String,
    /// Group for lineup channels listed before any category header.
    pub default_group: String,
    /// Appended to the timeshift address to form `catchup-source`.
    pub catchup_query: String,
    /// Write a comment line after channels without a timeshift address.
    pub note_missing_catchup: bool,
}

impl Default for M3uConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output: "./playlist.m3u".into(),
            epg_url: String::new(),
            logo_template: String::new(),
            supplement: None,
            supplement_group: "新增频道".into(),
            default_group: "默认分组".into(),
            catchup_query: "?playseek=${(b)yyyyMMddHHmmss}-${(e)yyyyMMddHHmmss}".into(),
            note_missing_catchup: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    /// Channel ids in this source equal lineup permanent ids.
    #[serde(default)]
    pub authoritative: bool,
    /// Normalize candidate names before fuzzy matching.
    #[serde(default = "default_true")]
    pub clean_names: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub rename: Vec<RenameRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenameRule {
    pub from: String,
    pub to: String,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if !self.lineup.formats.contains_key(&self.lineup.format) {
            let mut known: Vec<String> = self.lineup.formats.keys().cloned().collect();
            known.sort();
            return Err(ReconError::UnknownFormat {
                format: self.lineup.format.clone(),
                known,
            });
        }

        for (name, format) in &self.lineup.formats {
            if format.id_field.is_empty() || format.uri_path.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "playlist format '{name}' needs id_field and uri_path"
                )));
            }
        }

        let policy = &self.policy;
        for entry in policy
            .single_contribution_categories
            .iter()
            .chain(&policy.single_contribution_channels)
        {
            if entry.trim().is_empty() {
                return Err(ReconError::InvalidExclusion(
                    "single-contribution entries must not be blank".into(),
                ));
            }
        }

        if policy.temporary_prefix.is_empty() || policy.external_prefix.is_empty() {
            return Err(ReconError::ConfigValidation(
                "temporary_prefix and external_prefix must not be empty".into(),
            ));
        }
        if policy.temporary_prefix == policy.external_prefix {
            return Err(ReconError::ConfigValidation(format!(
                "temporary_prefix and external_prefix are both '{}'",
                policy.temporary_prefix
            )));
        }

        let pattern = Regex::new(&self.matching.family_pattern).map_err(|e| {
            ReconError::ConfigValidation(format!("family_pattern: {e}"))
        })?;
        if pattern.captures_len() < 2 {
            return Err(ReconError::ConfigValidation(
                "family_pattern must contain a capture group".into(),
            ));
        }
        if self.matching.high_res_marker.is_empty() {
            return Err(ReconError::ConfigValidation(
                "high_res_marker must not be empty".into(),
            ));
        }
        for rule in &self.matching.composite {
            if rule.tokens.is_empty() {
                return Err(ReconError::ConfigValidation(
                    "composite rule needs at least one token".into(),
                ));
            }
        }

        if self.official.enabled {
            if self.official.server_url.is_empty() {
                return Err(ReconError::ConfigValidation(
                    "official.server_url is required when official.enabled = true".into(),
                ));
            }
            if self.official.day_offset_start > self.official.day_offset_end {
                return Err(ReconError::ConfigValidation(format!(
                    "official day offsets are reversed ({} > {})",
                    self.official.day_offset_start, self.official.day_offset_end
                )));
            }
        }

        if !is_valid_offset(&self.utc_offset) {
            return Err(ReconError::ConfigValidation(format!(
                "utc_offset must look like +0800, got '{}'",
                self.utc_offset
            )));
        }

        if self.m3u.output.trim().is_empty() {
            return Err(ReconError::ConfigValidation("m3u.output must not be empty".into()));
        }
        if self.m3u.supplement.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(
                "m3u.supplement must be a path or URL when set".into(),
            ));
        }

        if self.fetch.timeout_secs == 0 {
            return Err(ReconError::ConfigValidation(
                "fetch.timeout_secs must be at least 1".into(),
            ));
        }

        for source in self.sources.iter().filter(|s| s.enabled) {
            if source.url.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "source '{}' has no url",
                    source.name
                )));
            }
        }

        Ok(())
    }

    /// Enabled sources in priority order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn playlist_format(&self) -> Option<&PlaylistFormat> {
        self.lineup.formats.get(&self.lineup.format)
    }
}

fn is_valid_offset(offset: &str) -> bool {
    let bytes = offset.as_bytes();
    bytes.len() == 5
        && (bytes[0] == b'+' || bytes[0] == b'-')
        && bytes[1..].iter().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
