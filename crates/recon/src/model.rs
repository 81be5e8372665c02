use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One channel of the local lineup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalChannel {
    pub raw_name: String,
    pub category: String,
    pub playout_uri: String,
    /// Provider channel number, when the lineup entry was linked to a playlist.
    pub permanent_id: Option<String>,
    /// Provider system code used by the official per-channel feed.
    pub system_code: Option<String>,
}

/// Parsed external schedule document (XMLTV shaped), before validation.
#[derive(Debug, Clone, Default)]
pub struct ScheduleDocument {
    pub channels: Vec<DocChannel>,
    pub programmes: Vec<DocProgramme>,
}

#[derive(Debug, Clone, Default)]
pub struct DocChannel {
    pub id: Option<String>,
    pub display_names: Vec<LangText>,
    /// Logo url from `<icon src>`.
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DocProgramme {
    pub channel: Option<String>,
    pub start: Option<String>,
    pub stop: Option<String>,
    pub titles: Vec<LangText>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LangText {
    pub lang: Option<String>,
    pub text: String,
}

impl LangText {
    pub fn new(lang: Option<&str>, text: &str) -> Self {
        Self {
            lang: lang.map(str::to_string),
            text: text.to_string(),
        }
    }
}

/// One slot from the official per-channel feed, already in wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSlot {
    pub start: String,
    pub stop: String,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Extracted records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalChannel {
    pub native_id: String,
    /// First alias, or the native id when the channel has no display name.
    pub resolved_name: String,
    pub aliases: Vec<String>,
}

/// A program as published by a source, keyed by the source's channel id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProgram {
    pub native_channel: String,
    pub start: String,
    pub stop: String,
    pub title: String,
}

/// Accepted program, keyed by output channel id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramEntry {
    pub channel: String,
    pub start: String,
    pub stop: String,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Channel state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The channel already has programs from an authoritative source.
    AuthoritativeData,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthoritativeData => write!(f, "authoritative_data"),
        }
    }
}

/// Outcome of offering one pending channel to one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Attempt {
    Skipped { reason: SkipReason },
    NoMatch,
    MatchedNothingAccepted,
    Matched { accepted: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Never offered to a source.
    NeedsData,
    /// Has accepted programs and was withdrawn from the pending set.
    Resolved,
    /// Still pending when the run ended (may or may not have programs).
    StillPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityOrigin {
    /// Lineup channel with a provider-assigned id.
    Local,
    /// Lineup channel keyed by a minted temporary id.
    Temporary,
    /// Channel carried over from an external source.
    External,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct IdentityEntry {
    pub output_id: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    pub origin: IdentityOrigin,
    /// Source that first introduced an external channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub raw_name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_id: Option<String>,
    pub status: ChannelStatus,
    pub accepted_programs: usize,
    /// Holds programs from the official feed or an authoritative source.
    pub authoritative: bool,
    /// Seeded from the official per-channel feed.
    pub official: bool,
    pub contributing_sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<Attempt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedChannel {
    pub raw_name: String,
    pub category: String,
    pub playout_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub rank: usize,
    pub name: String,
    pub url: String,
    /// `None` when the source contributed; otherwise why it was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub channels_seen: usize,
    pub programs_seen: usize,
    pub records_dropped: usize,
    pub channels_matched: usize,
    pub programs_accepted: usize,
    pub skipped_authoritative: usize,
    pub pending_after: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub lineup_channels: usize,
    pub linked_channels: usize,
    pub official_channels: usize,
    pub external_matches: usize,
    pub unmatched: usize,
    pub lite_programs: usize,
    pub lite_titled_programs: usize,
    pub external_channels: usize,
    pub full_programs: usize,
    pub sources_consulted: usize,
    pub sources_failed: usize,
    pub rejected_programs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    /// Output id → names, lineup channels first, then external channels.
    pub identities: Vec<IdentityEntry>,
    /// Programs for lineup channels only.
    pub programs: Vec<ProgramEntry>,
    /// Lineup programs plus merged external programs.
    pub full_programs: Vec<ProgramEntry>,
    pub unmatched: Vec<UnmatchedChannel>,
    pub sources: Vec<SourceReport>,
    pub channels: Vec<ChannelReport>,
}
