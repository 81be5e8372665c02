//! `tvmerge normalize` and `tvmerge diyp`.

use std::io::Write;
use std::path::PathBuf;

use tvmerge_io::diyp::to_diyp;
use tvmerge_recon::config::MatchingConfig;
use tvmerge_recon::normalize::NameNormalizer;

use crate::exit_codes::{EXIT_OUTPUT, EXIT_USAGE};
use crate::run::load_config;
use crate::CliError;

pub fn cmd_normalize(names: Vec<String>, config: Option<PathBuf>) -> Result<(), CliError> {
    let matching = match config {
        Some(path) => load_config(&path)?.matching,
        None => MatchingConfig::default(),
    };
    let normalizer = NameNormalizer::new(&matching);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for name in &names {
        writeln!(out, "{name}\t{}", normalizer.normalize(name))
            .map_err(|e| CliError::new(EXIT_OUTPUT, e.to_string()))?;
    }
    Ok(())
}

pub fn cmd_diyp(xml: PathBuf, ch: Option<String>) -> Result<(), CliError> {
    let bytes = std::fs::read(&xml)
        .map_err(|e| CliError::args(format!("cannot read {}: {e}", xml.display())))?;
    let doc = tvmerge_io::read_schedule(&bytes).map_err(|e| {
        CliError::new(EXIT_USAGE, format!("{}: {e}", xml.display()))
            .with_hint("expected an XMLTV document, plain or gzipped")
    })?;

    let guide = to_diyp(&doc, ch.as_deref());
    let json = serde_json::to_string_pretty(&guide)
        .map_err(|e| CliError::new(EXIT_OUTPUT, format!("JSON serialization error: {e}")))?;
    println!("{json}");
    Ok(())
}
