//! Log setup for the `tvmerge` binary.
//!
//! Library crates only use the `log` macros; this installs the sink:
//! `[YYYY-mm-dd HH:MM:SS] [LEVEL] message` on stderr, mirrored into the
//! run log when one is configured. `TVMERGE_LOG` overrides the level with
//! `env_logger` filter syntax (e.g. `TVMERGE_LOG=tvmerge_recon=debug`).

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Builder, Env, Target};

pub const LOG_ENV: &str = "TVMERGE_LOG";

/// Writes every line to stderr and, when present, the run-log file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            // A full disk must not abort the run.
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Install the global logger. `run_log` is truncated first.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init(verbose: bool, run_log: Option<&Path>) -> io::Result<()> {
    let file = match run_log {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Some(File::create(path)?)
        }
        None => None,
    };

    let default_level = if verbose { "debug" } else { "info" };
    let _ = Builder::from_env(Env::new().filter_or(LOG_ENV, default_level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init();
    Ok(())
}
