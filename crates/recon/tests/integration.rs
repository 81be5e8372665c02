use std::collections::HashMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use tvmerge_recon::config::{ReconConfig, SourceConfig};
use tvmerge_recon::engine::{run, SourceFetcher};
use tvmerge_recon::error::{ReconError, SourceError};
use tvmerge_recon::guide::{build_listing, GuideKind};
use tvmerge_recon::model::{
    Attempt, ChannelStatus, DocChannel, DocProgramme, IdentityOrigin, LangText, LocalChannel,
    ScheduleDocument, ScheduleSlot,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_config() -> ReconConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("two-source.recon.toml")).unwrap();
    ReconConfig::from_toml(&toml).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

// -------------------------------------------------------------------------
// Fixtures
// -------------------------------------------------------------------------

#[derive(Default)]
struct ScriptedFetcher {
    docs: HashMap<String, Result<ScheduleDocument, SourceError>>,
    official: HashMap<(String, NaiveDate), Vec<ScheduleSlot>>,
    calls: Vec<String>,
}

impl ScriptedFetcher {
    fn with(mut self, source: &str, doc: Result<ScheduleDocument, SourceError>) -> Self {
        self.docs.insert(source.to_string(), doc);
        self
    }
}

impl SourceFetcher for ScriptedFetcher {
    fn fetch_source(&mut self, source: &SourceConfig) -> Result<ScheduleDocument, SourceError> {
        self.calls.push(source.name.clone());
        self.docs
            .get(&source.name)
            .cloned()
            .unwrap_or_else(|| Err(SourceError::Fetch("404 Not Found".into())))
    }

    fn fetch_official_day(
        &mut self,
        system_code: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleSlot>, SourceError> {
        self.official
            .get(&(system_code.to_string(), date))
            .cloned()
            .ok_or_else(|| SourceError::Fetch("no schedule".into()))
    }
}

/// Document builder: channels as (id, names), programmes as
/// (channel, start hour, stop hour, title) on 2025-01-01.
struct Doc(ScheduleDocument);

impl Doc {
    fn new() -> Self {
        Doc(ScheduleDocument::default())
    }

    fn channel(mut self, id: &str, names: &[&str]) -> Self {
        self.0.channels.push(DocChannel {
            id: Some(id.into()),
            display_names: names.iter().map(|n| LangText::new(Some("zh"), n)).collect(),
            icon: None,
        });
        self
    }

    fn programme(mut self, channel: &str, start: &str, stop: &str, title: &str) -> Self {
        self.0.programmes.push(DocProgramme {
            channel: Some(channel.into()),
            start: Some(format!("20250101{start} +0800")),
            stop: Some(format!("20250101{stop} +0800")),
            titles: vec![LangText::new(Some("zh"), title)],
        });
        self
    }

    fn ok(self) -> Result<ScheduleDocument, SourceError> {
        Ok(self.0)
    }
}

fn local(name: &str, category: &str, id: Option<&str>) -> LocalChannel {
    LocalChannel {
        raw_name: name.into(),
        category: category.into(),
        playout_uri: format!("rtp://239.3.1.1:8000/{name}"),
        permanent_id: id.map(str::to_string),
        system_code: None,
    }
}

fn cctv5_source() -> Doc {
    Doc::new()
        .channel("s1", &["CCTV5高清"])
        .channel("s2", &["CCTV5+"])
        .channel("s3", &["CCTV5欧洲"])
        .programme("s1", "080000", "090000", "体育新闻")
        .programme("s1", "090000", "100000", "篮球")
        .programme("s1", "100000", "110000", "足球")
        .programme("s2", "080000", "090000", "赛事")
}

// -------------------------------------------------------------------------
// End-to-end scenarios
// -------------------------------------------------------------------------

#[test]
fn single_contribution_channel_takes_shortest_family_candidate() {
    let config = load_config();
    let mut fetcher = ScriptedFetcher::default().with("primary", cctv5_source().ok());
    let lineup = vec![local("CCTV5", "TS频道", None)];

    let result = run(&config, lineup, &mut fetcher, today()).unwrap();

    let titles: Vec<&str> = result.programs.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["体育新闻", "篮球", "足球"]);
    assert!(result.programs.iter().all(|p| p.channel == "unm_1"));
    assert_eq!(result.channels[0].status, ChannelStatus::Resolved);
    // nothing left pending, so the secondary source is never fetched
    assert_eq!(fetcher.calls, vec!["primary"]);
}

#[test]
fn overlapping_program_from_later_source_is_rejected() {
    let config = load_config();
    let secondary = Doc::new()
        .channel("x", &["CCTV5高清"])
        .programme("x", "093000", "094500", "重叠");
    let mut fetcher = ScriptedFetcher::default()
        .with("primary", cctv5_source().ok())
        .with("secondary", secondary.ok());
    let lineup = vec![local("CCTV5", "央视", Some("5"))];

    let result = run(&config, lineup, &mut fetcher, today()).unwrap();

    assert_eq!(result.programs.len(), 3);
    assert!(result.programs.iter().all(|p| p.title != "重叠"));
    assert_eq!(fetcher.calls, vec!["primary", "secondary"]);
    assert_eq!(result.sources[1].programs_accepted, 0);
    assert!(result.summary.rejected_programs >= 1);
}

#[test]
fn same_resolved_name_shares_one_external_id() {
    let config = load_config();
    let primary = Doc::new()
        .channel("1", &["CCTV1"])
        .channel("101", &["北京卫视"])
        .programme("1", "080000", "090000", "新闻")
        .programme("101", "080000", "090000", "养生堂");
    let secondary = Doc::new()
        .channel("xyz", &["北京卫视"])
        .programme("xyz", "090000", "100000", "北京新闻");
    let mut fetcher = ScriptedFetcher::default()
        .with("primary", primary.ok())
        .with("secondary", secondary.ok());
    let lineup = vec![local("CCTV1", "央视", Some("1")), local("东方卫视", "卫视", None)];

    let result = run(&config, lineup, &mut fetcher, today()).unwrap();

    let external: Vec<_> = result
        .identities
        .iter()
        .filter(|i| i.origin == IdentityOrigin::External)
        .collect();
    assert_eq!(external.len(), 1);
    assert_eq!(external[0].display_name, "北京卫视");
    assert_eq!(external[0].source.as_deref(), Some("primary"));

    let beijing: Vec<&str> = result
        .full_programs
        .iter()
        .filter(|p| p.channel == external[0].output_id)
        .map(|p| p.title.as_str())
        .collect();
    assert_eq!(beijing, vec!["养生堂", "北京新闻"]);
    // lite guide never carries external channels
    assert!(result.programs.iter().all(|p| p.channel == "1"));
}

#[test]
fn failed_source_is_skipped_and_next_source_proceeds() {
    let config = load_config();
    let secondary = Doc::new()
        .channel("c1", &["CCTV-1 综合"])
        .programme("c1", "080000", "090000", "朝闻天下");
    let mut fetcher = ScriptedFetcher::default()
        .with("primary", Err(SourceError::Fetch("operation timed out".into())))
        .with("secondary", secondary.ok());
    let lineup = vec![local("CCTV1", "央视", Some("1"))];

    let result = run(&config, lineup, &mut fetcher, today()).unwrap();

    assert_eq!(result.sources.len(), 2);
    assert_eq!(
        result.sources[0].failure.as_deref(),
        Some("fetch failed: operation timed out")
    );
    assert_eq!(result.sources[0].pending_after, 1);
    assert_eq!(result.sources[1].rank, 2);
    assert_eq!(result.programs.len(), 1);
    assert_eq!(result.summary.sources_failed, 1);
}

#[test]
fn inverted_program_is_rejected() {
    let config = load_config();
    let primary = Doc::new()
        .channel("1", &["CCTV1"])
        .programme("1", "080000", "070000", "倒序");
    let mut fetcher = ScriptedFetcher::default().with("primary", primary.ok());
    let lineup = vec![local("CCTV1", "央视", Some("1"))];

    let result = run(&config, lineup, &mut fetcher, today()).unwrap();

    assert!(result.programs.is_empty());
    assert_eq!(result.unmatched.len(), 1);
    assert_eq!(result.unmatched[0].raw_name, "CCTV1");
    assert!(result.summary.rejected_programs >= 1);
}

// -------------------------------------------------------------------------
// Policy
// -------------------------------------------------------------------------

#[test]
fn single_contribution_channel_ignores_lower_priority_sources() {
    let config = load_config();
    let primary = Doc::new()
        .channel("a", &["CCTV5"])
        .programme("a", "080000", "090000", "primary");
    let secondary = Doc::new()
        .channel("b", &["CCTV5"])
        .channel("c", &["CCTV1"])
        .programme("b", "120000", "130000", "secondary")
        .programme("c", "080000", "090000", "朝闻天下");
    let mut fetcher = ScriptedFetcher::default()
        .with("primary", primary.ok())
        .with("secondary", secondary.ok());
    let lineup = vec![local("CCTV5", "体验频道", Some("5")), local("CCTV1", "央视", Some("1"))];

    let result = run(&config, lineup, &mut fetcher, today()).unwrap();

    let cctv5: Vec<&str> = result
        .programs
        .iter()
        .filter(|p| p.channel == "5")
        .map(|p| p.title.as_str())
        .collect();
    assert_eq!(cctv5, vec!["primary"]);
    assert_eq!(result.channels[0].contributing_sources, vec!["primary"]);
    assert_eq!(result.channels[1].contributing_sources, vec!["secondary"]);
    // withdrawn after the first source, so the second never saw it
    assert_eq!(result.channels[0].status, ChannelStatus::Resolved);
    assert_eq!(result.channels[0].last_attempt, Some(Attempt::Matched { accepted: 1 }));
    assert_eq!(result.sources[1].skipped_authoritative, 0);
    assert_eq!(result.sources[1].channels_matched, 1);
}

#[test]
fn disabled_source_is_never_fetched() {
    let config = load_config();
    let mut fetcher = ScriptedFetcher::default();
    let lineup = vec![local("CCTV1", "央视", Some("1"))];

    let result = run(&config, lineup, &mut fetcher, today()).unwrap();

    assert_eq!(fetcher.calls, vec!["primary", "secondary"]);
    let ranks: Vec<usize> = result.sources.iter().map(|s| s.rank).collect();
    assert_eq!(ranks, vec![1, 2]);
    // both sources failed, so the channel was never offered anything
    assert_eq!(result.channels[0].status, ChannelStatus::NeedsData);
}

#[test]
fn configuration_error_stops_before_any_fetch() {
    let mut config = load_config();
    config.policy.single_contribution_channels = vec!["  ".into()];
    let mut fetcher = ScriptedFetcher::default();

    let err = run(&config, vec![local("CCTV1", "央视", None)], &mut fetcher, today()).unwrap_err();

    assert!(matches!(err, ReconError::InvalidExclusion(_)));
    assert!(fetcher.calls.is_empty());
}

#[test]
fn official_feed_satisfies_channels_before_sources() {
    let mut config = load_config();
    config.official.enabled = true;
    config.official.server_url = "http://official.example".into();
    config.official.day_offset_start = 0;
    config.official.day_offset_end = 1;

    let mut fetcher = ScriptedFetcher::default();
    fetcher.official.insert(
        ("ch0001".into(), today()),
        vec![ScheduleSlot {
            start: "20250101080000 +0800".into(),
            stop: "20250101090000 +0800".into(),
            title: "官方节目".into(),
        }],
    );
    let mut cctv1 = local("CCTV1", "央视", Some("1"));
    cctv1.system_code = Some("ch0001".into());

    let result = run(&config, vec![cctv1], &mut fetcher, today()).unwrap();

    assert!(fetcher.calls.is_empty());
    assert_eq!(result.programs.len(), 1);
    assert_eq!(result.channels[0].status, ChannelStatus::Resolved);
    assert!(result.channels[0].authoritative);
    assert!(result.channels[0].official);
    assert_eq!(result.summary.official_channels, 1);
}

#[test]
fn listings_from_a_run() {
    let config = load_config();
    let primary = Doc::new()
        .channel("1", &["CCTV1", "中央一套"])
        .channel("2", &["凤凰卫视"])
        .programme("1", "090000", "100000", "第二档")
        .programme("1", "080000", "090000", "第一档")
        .programme("2", "080000", "090000", "凤凰早班车");
    let mut fetcher = ScriptedFetcher::default().with("primary", primary.ok());
    let lineup = vec![local("CCTV1", "央视", Some("1")), local("无节目频道", "其他", None)];

    let result = run(&config, lineup, &mut fetcher, today()).unwrap();

    let lite = build_listing(&result, GuideKind::Lite);
    // the channel that never got a temporary id is absent
    assert_eq!(lite.channels.len(), 1);
    let titles: Vec<&str> = lite.programmes.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["第一档", "第二档"]);

    let full = build_listing(&result, GuideKind::Full);
    assert_eq!(full.channels.len(), 2);
    assert_eq!(full.channels[1].names, vec!["凤凰卫视"]);
    assert_eq!(full.programmes.len(), 3);
    assert_eq!(result.unmatched.len(), 1);
}
