use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate};

use crate::config::{ReconConfig, SourceConfig};
use crate::error::{ReconError, SourceError};
use crate::evidence::compute_summary;
use crate::extract::{extract, ExtractOptions, ScheduleIndex, SourceSchedule};
use crate::identity::IdentityAllocator;
use crate::matcher::ChannelMatcher;
use crate::model::{
    Attempt, ChannelReport, ChannelStatus, ExternalChannel, IdentityEntry, IdentityOrigin,
    LocalChannel, ProgramEntry, ReconMeta, ReconResult, ScheduleDocument, ScheduleSlot,
    SkipReason, SourceReport, UnmatchedChannel,
};
use crate::timeline::ScheduleBook;

/// Where the engine gets its data. Implementations own transport, retry and
/// caching; the engine only sees documents or failures.
pub trait SourceFetcher {
    fn fetch_source(&mut self, source: &SourceConfig) -> Result<ScheduleDocument, SourceError>;

    /// One day of the official per-channel feed.
    fn fetch_official_day(
        &mut self,
        _system_code: &str,
        _date: NaiveDate,
    ) -> Result<Vec<ScheduleSlot>, SourceError> {
        Err(SourceError::Fetch("official feed not available".into()))
    }
}

/// Run reconciliation for `lineup` against the configured sources.
pub fn run(
    config: &ReconConfig,
    lineup: Vec<LocalChannel>,
    fetcher: &mut dyn SourceFetcher,
    today: NaiveDate,
) -> Result<ReconResult, ReconError> {
    let reconciler = Reconciler::new(config, lineup)?;
    Ok(reconciler.run(fetcher, today))
}

// ---------------------------------------------------------------------------
// Channel state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ChannelState {
    channel: LocalChannel,
    normalized: String,
    output_id: Option<String>,
    temporary: bool,
    single_contribution: bool,
    has_authoritative: bool,
    has_official: bool,
    accepted: usize,
    sources: Vec<String>,
    last_attempt: Option<Attempt>,
}

#[derive(Debug)]
struct ExternalIdentity {
    output_id: String,
    display_name: String,
    aliases: Vec<String>,
    source: String,
}

/// Which index a match was made against.
enum MatchKey {
    Id(String),
    Name(String),
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler<'a> {
    config: &'a ReconConfig,
    matcher: ChannelMatcher,
    channels: Vec<ChannelState>,
    /// Indices into `channels`, lineup order.
    pending: Vec<usize>,
    book: ScheduleBook,
    allocator: IdentityAllocator,
    used_ids: HashSet<String>,
    external: Vec<ExternalIdentity>,
    external_programs: Vec<ProgramEntry>,
    next_temporary: u64,
    reports: Vec<SourceReport>,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a ReconConfig, lineup: Vec<LocalChannel>) -> Result<Self, ReconError> {
        config.validate()?;
        if lineup.is_empty() {
            return Err(ReconError::NoLocalChannels);
        }

        let matcher = ChannelMatcher::new(&config.matching);
        let mut used_ids = HashSet::new();
        let channels: Vec<ChannelState> = lineup
            .into_iter()
            .map(|channel| {
                if let Some(id) = &channel.permanent_id {
                    used_ids.insert(id.clone());
                }
                ChannelState {
                    normalized: matcher.normalizer().normalize(&channel.raw_name),
                    output_id: channel.permanent_id.clone(),
                    temporary: false,
                    single_contribution: config
                        .policy
                        .is_single_contribution(&channel.raw_name, &channel.category),
                    has_authoritative: false,
                    has_official: false,
                    accepted: 0,
                    sources: Vec::new(),
                    last_attempt: None,
                    channel,
                }
            })
            .collect();

        Ok(Self {
            config,
            matcher,
            channels,
            pending: Vec::new(),
            book: ScheduleBook::new(),
            allocator: IdentityAllocator::new(config.policy.external_prefix.clone()),
            used_ids,
            external: Vec::new(),
            external_programs: Vec::new(),
            next_temporary: 1,
            reports: Vec::new(),
        })
    }

    pub fn run(mut self, fetcher: &mut dyn SourceFetcher, today: NaiveDate) -> ReconResult {
        if self.config.official.enabled {
            self.seed_official(fetcher, today);
        }

        self.pending = (0..self.channels.len())
            .filter(|&i| self.channels[i].accepted == 0)
            .collect();
        log::info!(
            "{} of {} channels need data from external sources",
            self.pending.len(),
            self.channels.len()
        );

        let config = self.config;
        for (position, source) in config.enabled_sources().enumerate() {
            if self.pending.is_empty() {
                log::info!("no pending channels left, stopping before '{}'", source.name);
                break;
            }
            self.process_source(position + 1, source, fetcher);
        }

        self.finish()
    }

    /// Pull the official per-channel feed for every linked channel.
    fn seed_official(&mut self, fetcher: &mut dyn SourceFetcher, today: NaiveDate) {
        let config = self.config;
        let official = &config.official;
        let unknown = config.policy.unknown_title.as_str();

        for idx in 0..self.channels.len() {
            let (Some(code), Some(id)) = (
                self.channels[idx].channel.system_code.clone(),
                self.channels[idx].output_id.clone(),
            ) else {
                continue;
            };

            let mut accepted = 0;
            for offset in official.day_offset_start..official.day_offset_end {
                let date = today + Duration::days(offset);
                let slots = match fetcher.fetch_official_day(&code, date) {
                    Ok(slots) => slots,
                    Err(e) => {
                        log::debug!("official feed {code} {date}: {e}");
                        continue;
                    }
                };
                for slot in slots {
                    let title = match slot.title.trim() {
                        "" => unknown,
                        t => t,
                    };
                    if self.book.try_accept(&id, &slot.start, &slot.stop, title) {
                        accepted += 1;
                    }
                }
            }

            let state = &mut self.channels[idx];
            if accepted > 0 {
                state.accepted += accepted;
                state.has_authoritative = true;
                state.has_official = true;
                state.sources.push("official".into());
                log::info!("{} ({id}): {accepted} programs from official feed", state.channel.raw_name);
            } else {
                log::debug!("{} ({id}): official feed had nothing", state.channel.raw_name);
            }
        }
    }

    fn process_source(&mut self, rank: usize, source: &SourceConfig, fetcher: &mut dyn SourceFetcher) {
        log::info!(
            "source #{rank} '{}' ({}), {} channels pending",
            source.name,
            source.url,
            self.pending.len()
        );
        let mut report = SourceReport {
            rank,
            name: source.name.clone(),
            url: source.url.clone(),
            failure: None,
            channels_seen: 0,
            programs_seen: 0,
            records_dropped: 0,
            channels_matched: 0,
            programs_accepted: 0,
            skipped_authoritative: 0,
            pending_after: self.pending.len(),
        };

        let doc = match fetcher.fetch_source(source) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("source '{}' skipped: {e}", source.name);
                report.failure = Some(e.to_string());
                self.reports.push(report);
                return;
            }
        };

        let config = self.config;
        let policy = &config.policy;
        let schedule = extract(
            &doc,
            &ExtractOptions {
                preferred_langs: &policy.preferred_title_langs,
                unknown_title: &policy.unknown_title,
                rename: &source.rename,
            },
        );
        report.channels_seen = schedule.channels.len();
        report.programs_seen = schedule.programs.len();
        report.records_dropped = schedule.dropped.total();

        let by_name = schedule.index(false);
        if by_name.is_empty() {
            log::warn!("source '{}' skipped: no usable programs", source.name);
            report.failure = Some("no usable programs".into());
            self.reports.push(report);
            return;
        }
        let by_id = source.authoritative.then(|| schedule.index(true));

        if policy.keep_external_channels {
            let mut native_to_output = HashMap::new();
            for channel in &schedule.channels {
                let id = self.record_external_channel(&source.name, channel);
                native_to_output.insert(channel.native_id.clone(), id);
            }
            for program in &schedule.programs {
                if let Some(id) = native_to_output.get(&program.native_channel) {
                    self.external_programs.push(ProgramEntry {
                        channel: id.clone(),
                        start: program.start.clone(),
                        stop: program.stop.clone(),
                        title: program.title.clone(),
                    });
                }
            }
        }

        let pending = self.pending.clone();
        for idx in pending {
            let attempt = self.offer(idx, source, &schedule, &by_name, by_id.as_ref());
            let single = self.channels[idx].single_contribution;
            let keep = match attempt {
                Attempt::Skipped { reason: SkipReason::AuthoritativeData } => {
                    report.skipped_authoritative += 1;
                    !single
                }
                Attempt::Matched { accepted } => {
                    report.channels_matched += 1;
                    report.programs_accepted += accepted;
                    !single
                }
                Attempt::NoMatch | Attempt::MatchedNothingAccepted => true,
            };
            self.channels[idx].last_attempt = Some(attempt);
            if !keep {
                self.mark_resolved(idx);
            }
        }

        report.pending_after = self.pending.len();
        log::info!(
            "source '{}' done: {} channels supplemented ({} programs), {} pending",
            source.name,
            report.channels_matched,
            report.programs_accepted,
            report.pending_after
        );
        self.reports.push(report);
    }

    /// Offer one pending channel to one source.
    fn offer(
        &mut self,
        idx: usize,
        source: &SourceConfig,
        schedule: &SourceSchedule,
        by_name: &ScheduleIndex,
        by_id: Option<&ScheduleIndex>,
    ) -> Attempt {
        let state = &self.channels[idx];
        if state.has_authoritative {
            log::debug!("{}: has authoritative programs, skipping '{}'", state.channel.raw_name, source.name);
            return Attempt::Skipped { reason: SkipReason::AuthoritativeData };
        }

        let key = match (by_id, &state.output_id) {
            (Some(by_id), Some(id)) if !state.temporary => {
                (!by_id.programs_for(id).is_empty()).then(|| MatchKey::Id(id.clone()))
            }
            _ => self
                .matcher
                .best_match(&state.normalized, by_name.keys(), source.clean_names)
                .filter(|name| !by_name.programs_for(name).is_empty())
                .map(|name| MatchKey::Name(name.to_string())),
        };
        let indices: &[usize] = match (&key, by_id) {
            (Some(MatchKey::Id(id)), Some(by_id)) => by_id.programs_for(id),
            (Some(MatchKey::Name(name)), _) => by_name.programs_for(name),
            _ => &[],
        };
        if indices.is_empty() {
            return Attempt::NoMatch;
        }

        let output_id = self.ensure_output_id(idx);
        let mut accepted = 0;
        for &i in indices {
            let p = &schedule.programs[i];
            if self.book.try_accept(&output_id, &p.start, &p.stop, &p.title) {
                accepted += 1;
            }
        }

        let state = &mut self.channels[idx];
        if accepted == 0 {
            log::debug!("{} ({output_id}): '{}' matched but every program overlapped", state.channel.raw_name, source.name);
            return Attempt::MatchedNothingAccepted;
        }
        state.accepted += accepted;
        if source.authoritative {
            state.has_authoritative = true;
        }
        state.sources.push(source.name.clone());
        log::info!(
            "{} ({output_id}): {accepted} programs from '{}'",
            state.channel.raw_name,
            source.name
        );
        Attempt::Matched { accepted }
    }

    /// Give a channel an output id, minting a temporary one if it has none.
    fn ensure_output_id(&mut self, idx: usize) -> String {
        if let Some(id) = &self.channels[idx].output_id {
            return id.clone();
        }
        let config = self.config;
        let prefix = &config.policy.temporary_prefix;
        let id = loop {
            let candidate = format!("{prefix}{}", self.next_temporary);
            self.next_temporary += 1;
            if !self.used_ids.contains(&candidate) {
                break candidate;
            }
        };
        self.used_ids.insert(id.clone());
        let state = &mut self.channels[idx];
        state.output_id = Some(id.clone());
        state.temporary = true;
        log::debug!("{}: assigned temporary id {id}", state.channel.raw_name);
        id
    }

    /// Withdraw a channel from further sources.
    fn mark_resolved(&mut self, idx: usize) {
        self.pending.retain(|&i| i != idx);
        let state = &self.channels[idx];
        log::debug!(
            "{} ({}): withdrawn from further sources",
            state.channel.raw_name,
            state.channel.category
        );
    }

    /// Register an external channel, reusing the id of an equally named one.
    fn record_external_channel(&mut self, source: &str, channel: &ExternalChannel) -> String {
        let known = self.allocator.lookup(&channel.resolved_name).is_some();
        let id = self
            .allocator
            .allocate(&channel.native_id, &channel.resolved_name, &self.used_ids);
        if !known {
            self.used_ids.insert(id.clone());
            self.external.push(ExternalIdentity {
                output_id: id.clone(),
                display_name: channel.resolved_name.clone(),
                aliases: channel.aliases.clone(),
                source: source.to_string(),
            });
        }
        id
    }

    fn finish(mut self) -> ReconResult {
        let config = self.config;
        let local_ids: HashSet<String> = self
            .channels
            .iter()
            .filter_map(|c| c.output_id.clone())
            .collect();
        let mut local_by_name: HashMap<&str, &str> = HashMap::new();
        for state in &self.channels {
            if let Some(id) = &state.output_id {
                local_by_name.entry(state.channel.raw_name.trim()).or_insert(id.as_str());
            }
        }

        // External channels named like a lineup channel fold into it; an
        // external id that somehow equals a lineup id gets a fresh one.
        let mut redirect: HashMap<String, String> = HashMap::new();
        let mut kept_external = Vec::new();
        for mut ext in std::mem::take(&mut self.external) {
            if let Some(local_id) = local_by_name.get(ext.display_name.trim()) {
                log::debug!("external '{}' ({}) folded into {local_id}", ext.display_name, ext.output_id);
                redirect.insert(ext.output_id.clone(), local_id.to_string());
                continue;
            }
            if local_ids.contains(&ext.output_id) {
                let fresh = self.allocator.reassign(&ext.display_name, &self.used_ids);
                log::warn!("external id {} collides with a lineup id, reassigned {fresh}", ext.output_id);
                self.used_ids.insert(fresh.clone());
                redirect.insert(ext.output_id.clone(), fresh.clone());
                ext.output_id = fresh;
            }
            kept_external.push(ext);
        }

        let mut full = self.book.clone();
        for program in &self.external_programs {
            let channel = redirect.get(&program.channel).unwrap_or(&program.channel);
            full.try_accept(channel, &program.start, &program.stop, &program.title);
        }

        let mut identities: Vec<IdentityEntry> = self
            .channels
            .iter()
            .filter_map(|state| {
                let id = state.output_id.clone()?;
                Some(IdentityEntry {
                    output_id: id,
                    display_name: state.channel.raw_name.clone(),
                    aliases: Vec::new(),
                    origin: if state.temporary {
                        IdentityOrigin::Temporary
                    } else {
                        IdentityOrigin::Local
                    },
                    source: None,
                })
            })
            .collect();
        identities.extend(kept_external.into_iter().map(|ext| IdentityEntry {
            output_id: ext.output_id,
            display_name: ext.display_name,
            aliases: ext.aliases,
            origin: IdentityOrigin::External,
            source: Some(ext.source),
        }));

        let pending: HashSet<usize> = self.pending.iter().copied().collect();
        let channels: Vec<ChannelReport> = self
            .channels
            .iter()
            .enumerate()
            .map(|(i, state)| ChannelReport {
                raw_name: state.channel.raw_name.clone(),
                category: state.channel.category.clone(),
                output_id: state.output_id.clone(),
                status: if !pending.contains(&i) {
                    ChannelStatus::Resolved
                } else if state.last_attempt.is_none() {
                    ChannelStatus::NeedsData
                } else {
                    ChannelStatus::StillPending
                },
                accepted_programs: state.accepted,
                authoritative: state.has_authoritative,
                official: state.has_official,
                contributing_sources: state.sources.clone(),
                last_attempt: state.last_attempt,
            })
            .collect();

        let unmatched: Vec<UnmatchedChannel> = self
            .channels
            .iter()
            .filter(|state| state.accepted == 0)
            .map(|state| UnmatchedChannel {
                raw_name: state.channel.raw_name.clone(),
                category: state.channel.category.clone(),
                playout_uri: state.channel.playout_uri.clone(),
                output_id: state.output_id.clone(),
            })
            .collect();
        if !unmatched.is_empty() {
            let names: Vec<&str> = unmatched.iter().map(|u| u.raw_name.as_str()).collect();
            log::info!("{} channels without programs: {}", names.len(), names.join(", "));
        }

        let rejected = full.rejected();
        let mut result = ReconResult {
            meta: ReconMeta {
                config_name: config.name.clone(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                run_at: chrono::Utc::now().to_rfc3339(),
            },
            summary: Default::default(),
            identities,
            programs: self.book.into_programs(),
            full_programs: full.into_programs(),
            unmatched,
            sources: self.reports,
            channels,
        };
        result.summary = compute_summary(&result, &config.policy.unknown_title);
        result.summary.rejected_programs = rejected;
        result
    }
}
