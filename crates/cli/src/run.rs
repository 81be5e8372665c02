//! `tvmerge run` and `tvmerge validate`.

use std::path::{Path, PathBuf};

use tvmerge_io::lineup::{link_playlist, parse_channel_list};
use tvmerge_io::xmltv::save_listing;
use tvmerge_recon::{build_listing, GuideKind, LocalChannel, ReconConfig, ReconError, ReconResult};

use crate::exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_LINEUP, EXIT_OUTPUT};
use crate::fetch::HttpFetcher;
use crate::logging;
use crate::playlist::write_playlist;
use crate::CliError;

pub struct RunOptions {
    pub config: PathBuf,
    pub out_dir: Option<PathBuf>,
    pub lite_only: bool,
    pub json: bool,
    pub log: Option<PathBuf>,
    pub verbose: bool,
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::new(EXIT_CONFIG, format!("cannot read config {}: {e}", path.display()))
    })?;
    ReconConfig::from_toml(&text).map_err(|e| CliError::new(EXIT_CONFIG, e.to_string()))
}

/// Directory that relative paths in the config are resolved against.
pub(crate) fn config_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let enabled = config.enabled_sources().count();
    eprintln!(
        "{}: ok ({} sources, {} enabled, official feed {})",
        config.name,
        config.sources.len(),
        enabled,
        if config.official.enabled { "on" } else { "off" }
    );
    if enabled == 0 && !config.official.enabled {
        eprintln!("note: no enabled sources; every channel will be reported unmatched");
    }
    Ok(())
}

pub fn cmd_run(opts: RunOptions) -> Result<(), CliError> {
    let config = load_config(&opts.config)?;
    let base_dir = config_dir(&opts.config);
    let out_base = opts.out_dir.clone().unwrap_or_else(|| base_dir.clone());

    let run_log = opts
        .log
        .clone()
        .unwrap_or_else(|| out_base.join(&config.output.run_log));
    logging::init(opts.verbose, Some(run_log.as_path())).map_err(|e| {
        CliError::new(EXIT_OUTPUT, format!("cannot open run log {}: {e}", run_log.display()))
    })?;
    log::info!("run '{}' with {}", config.name, opts.config.display());

    let mut fetcher = HttpFetcher::new(&config, &base_dir)
        .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;

    let lineup = load_lineup(&config, &fetcher)?;
    let today = chrono::Local::now().date_naive();
    let result = tvmerge_recon::run(&config, lineup.channels.clone(), &mut fetcher, today).map_err(|e| {
        let code = match e {
            ReconError::NoLocalChannels => EXIT_LINEUP,
            _ => EXIT_CONFIG,
        };
        CliError::new(code, e.to_string())
    })?;

    write_outputs(&config, &out_base, &result, opts.lite_only)?;
    if config.m3u.enabled {
        let path = out_base.join(&config.m3u.output);
        write_playlist(&config, &fetcher, &lineup, Some(&result), &path)?;
    }

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::new(EXIT_OUTPUT, format!("JSON serialization error: {e}")))?;
    let report = out_base.join(&config.output.report);
    std::fs::write(&report, &json_str).map_err(|e| {
        CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", report.display()))
    })?;
    log::info!("wrote {}", report.display());

    if opts.json {
        println!("{json_str}");
    }

    print_summary(&result);
    Ok(())
}

/// Lineup channels plus the raw provider playlist they were linked with.
pub(crate) struct Lineup {
    pub channels: Vec<LocalChannel>,
    pub playlist: Option<String>,
}

pub(crate) fn load_lineup(config: &ReconConfig, fetcher: &HttpFetcher) -> Result<Lineup, CliError> {
    let bytes = fetcher.fetch(&config.lineup.channels).map_err(|e| {
        CliError::new(EXIT_LINEUP, format!("cannot load lineup: {e}"))
            .with_hint("lineup.channels must be a readable path or URL")
    })?;
    let text = tvmerge_io::decode::decode_payload(&bytes)
        .map_err(|e| CliError::new(EXIT_LINEUP, format!("cannot decode lineup: {e}")))?;
    let mut channels = parse_channel_list(&text);
    if channels.is_empty() {
        return Err(CliError::new(EXIT_LINEUP, "lineup contains no channels")
            .with_hint("expected 'category,#genre#' headers followed by 'name,uri' lines"));
    }

    if let Some(playlist) = &config.lineup.playlist {
        let format = config.playlist_format().ok_or_else(|| {
            CliError::new(EXIT_CONFIG, format!("unknown playlist format '{}'", config.lineup.format))
        })?;
        let bytes = fetcher
            .fetch(playlist)
            .map_err(|e| CliError::new(EXIT_LINEUP, format!("cannot load playlist: {e}")))?;
        let text = tvmerge_io::decode::decode_payload(&bytes)
            .map_err(|e| CliError::new(EXIT_LINEUP, format!("cannot decode playlist: {e}")))?;
        link_playlist(&mut channels, &text, format)
            .map_err(|e| CliError::new(EXIT_LINEUP, e.to_string()))?;
        return Ok(Lineup { channels, playlist: Some(text) });
    }

    Ok(Lineup { channels, playlist: None })
}

fn write_outputs(
    config: &ReconConfig,
    out_base: &Path,
    result: &ReconResult,
    lite_only: bool,
) -> Result<(), CliError> {
    let output = &config.output;
    let mut guides = vec![(GuideKind::Lite, &output.lite)];
    if !lite_only {
        guides.push((GuideKind::Full, &output.full));
    }

    for (kind, path) in guides {
        let path = out_base.join(path);
        let listing = build_listing(result, kind);
        let written = save_listing(&path, &listing, &output.generator_name, output.gzip)
            .map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", path.display())))?;
        for file in written {
            eprintln!("wrote {}", file.display());
        }
    }
    Ok(())
}

fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "{} channels: {} linked, {} from official feed, {} external matches, {} unmatched",
        s.lineup_channels, s.linked_channels, s.official_channels, s.external_matches, s.unmatched,
    );
    eprintln!(
        "lite guide: {} programmes ({} titled); full guide: {} programmes, {} external channels",
        s.lite_programs, s.lite_titled_programs, s.full_programs, s.external_channels,
    );
    eprintln!(
        "sources: {} consulted, {} failed; {} programmes rejected",
        s.sources_consulted, s.sources_failed, s.rejected_programs,
    );
    for source in &result.sources {
        if let Some(failure) = &source.failure {
            eprintln!("  source {} skipped: {failure}", source.name);
        }
    }
}
