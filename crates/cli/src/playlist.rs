//! `tvmerge m3u`, and the playlist `run` writes when `[m3u] enabled = true`.

use std::path::{Path, PathBuf};

use tvmerge_io::m3u::{attach_metadata, from_lineup, parse_m3u, supplement, M3uWriter};
use tvmerge_recon::{ReconConfig, ReconResult};

use crate::exit_codes::{EXIT_ERROR, EXIT_LINEUP, EXIT_OUTPUT};
use crate::fetch::HttpFetcher;
use crate::logging;
use crate::run::{config_dir, load_config, load_lineup, Lineup};
use crate::CliError;

pub fn cmd_m3u(config_path: PathBuf, out: Option<PathBuf>, verbose: bool) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    logging::init(verbose, None)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("cannot set up logging: {e}")))?;
    let base_dir = config_dir(&config_path);
    let fetcher = HttpFetcher::new(&config, &base_dir)
        .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;

    let lineup = load_lineup(&config, &fetcher)?;
    let path = out.unwrap_or_else(|| base_dir.join(&config.m3u.output));
    write_playlist(&config, &fetcher, &lineup, None, &path)
}

/// Build and write the M3U playlist for `lineup`.
///
/// An unavailable supplement is logged and skipped.
pub(crate) fn write_playlist(
    config: &ReconConfig,
    fetcher: &HttpFetcher,
    lineup: &Lineup,
    result: Option<&ReconResult>,
    path: &Path,
) -> Result<(), CliError> {
    let m3u = &config.m3u;
    let mut channels = from_lineup(&lineup.channels, result, &m3u.default_group);

    if let Some(location) = &m3u.supplement {
        let text = fetcher
            .fetch(location)
            .map_err(|e| e.to_string())
            .and_then(|bytes| tvmerge_io::decode::decode_payload(&bytes).map_err(|e| e.to_string()));
        match text {
            Ok(text) => {
                supplement(&mut channels, parse_m3u(&text), &m3u.supplement_group);
            }
            Err(e) => log::warn!("m3u supplement {location} skipped: {e}"),
        }
    }

    if let (Some(json), Some(format)) = (&lineup.playlist, config.playlist_format()) {
        attach_metadata(&mut channels, json, format)
            .map_err(|e| CliError::new(EXIT_LINEUP, e.to_string()))?;
    }

    let writer = M3uWriter::new(m3u, &config.output.generator_name);
    let generated = chrono::Utc::now().format("UTC%Y-%m-%d %H:%M:%S").to_string();
    let text = writer.render(&channels, &generated);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::new(EXIT_OUTPUT, format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    std::fs::write(path, text)
        .map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot write {}: {e}", path.display())))?;
    eprintln!("wrote {} ({} channels)", path.display(), channels.len());
    Ok(())
}
