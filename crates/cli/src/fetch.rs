//! Source transport for `tvmerge run`.
//!
//! `HttpFetcher` resolves a location to bytes: local paths are read directly
//! (relative to the config directory), URLs are downloaded with retry and
//! backoff and cached under `fetch.cache_dir`. When every attempt fails the
//! previous download of the same URL is used instead.
//!
//! Cache layout: `<cache_dir>/<sha256(url)>.cache`, with the prior copy kept
//! as `.bak` while a download is in flight.

use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use tvmerge_io::official::{day_url, parse_day};
use tvmerge_recon::config::{ReconConfig, SourceConfig};
use tvmerge_recon::model::ScheduleSlot;
use tvmerge_recon::{ScheduleDocument, SourceError, SourceFetcher};

const USER_AGENT: &str = concat!("tvmerge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
pub enum FetchError {
    /// Non-retryable HTTP status, or retryable status after the last attempt.
    Status { url: String, status: u16 },
    /// Network / timeout failure after the last attempt.
    Transport { url: String, message: String },
    Io { path: PathBuf, source: std::io::Error },
    Client(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { url, status } => write!(f, "{url}: HTTP {status}"),
            Self::Transport { url, message } => write!(f, "{url}: {message}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Client(msg) => write!(f, "cannot build HTTP client: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Upper bound for the doubled retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

fn next_delay(delay: Duration) -> Duration {
    delay.saturating_mul(2).min(MAX_RETRY_DELAY)
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

pub struct HttpFetcher {
    http: reqwest::blocking::Client,
    base_dir: PathBuf,
    cache_dir: PathBuf,
    retries: u32,
    retry_delay: Duration,
    official_server: String,
    utc_offset: String,
}

impl HttpFetcher {
    pub fn new(config: &ReconConfig, base_dir: &Path) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.fetch.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_dir: base_dir.to_path_buf(),
            cache_dir: base_dir.join(&config.fetch.cache_dir),
            retries: config.fetch.retries,
            retry_delay: Duration::from_millis(config.fetch.retry_delay_ms),
            official_server: config.official.server_url.clone(),
            utc_offset: config.utc_offset.clone(),
        })
    }

    /// Bytes behind `location`, from disk or from the network (cached).
    pub fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        if !is_remote(location) {
            let path = self.base_dir.join(location);
            return std::fs::read(&path).map_err(|source| FetchError::Io { path, source });
        }

        let cache_file = self.cache_path(location);
        let backup = cache_file.with_extension("bak");

        match self.download(location) {
            Ok(bytes) => {
                if let Err(e) = self.store(&cache_file, &backup, &bytes) {
                    log::warn!("cache write failed for {location}: {e}");
                }
                Ok(bytes)
            }
            Err(err) => {
                for candidate in [&cache_file, &backup] {
                    if let Ok(bytes) = std::fs::read(candidate) {
                        log::warn!("{err}; using cached copy {}", candidate.display());
                        return Ok(bytes);
                    }
                }
                Err(err)
            }
        }
    }

    fn cache_path(&self, url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        self.cache_dir.join(format!("{:x}.cache", hasher.finalize()))
    }

    fn store(&self, cache_file: &Path, backup: &Path, bytes: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        if cache_file.exists() {
            std::fs::rename(cache_file, backup)?;
        }
        std::fs::write(cache_file, bytes)?;
        if backup.exists() {
            std::fs::remove_file(backup)?;
        }
        log::debug!("cached {}", cache_file.display());
        Ok(())
    }

    /// GET with retry + exponential backoff.
    ///
    /// 4xx other than 429 fails immediately; 429, 5xx and transport errors
    /// are retried `retries` times.
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut delay = self.retry_delay;

        for attempt in 0..=self.retries {
            let last = attempt == self.retries;
            log::debug!("GET {url} (attempt {}/{})", attempt + 1, self.retries + 1);

            match self.http.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if (400..500).contains(&status) && status != 429 {
                        return Err(FetchError::Status { url: url.to_string(), status });
                    }
                    if status == 429 || status >= 500 {
                        if last {
                            return Err(FetchError::Status { url: url.to_string(), status });
                        }
                        log::warn!(
                            "retry {}/{} in {}ms ({url}: HTTP {status})",
                            attempt + 1,
                            self.retries,
                            delay.as_millis()
                        );
                    } else {
                        match resp.bytes() {
                            Ok(body) => return Ok(body.to_vec()),
                            Err(e) if last => {
                                return Err(FetchError::Transport {
                                    url: url.to_string(),
                                    message: e.to_string(),
                                })
                            }
                            Err(e) => log::warn!("retry {}/{} ({url}: {e})", attempt + 1, self.retries),
                        }
                    }
                }
                Err(e) => {
                    if last {
                        return Err(FetchError::Transport {
                            url: url.to_string(),
                            message: e.to_string(),
                        });
                    }
                    log::warn!(
                        "retry {}/{} in {}ms ({url}: {e})",
                        attempt + 1,
                        self.retries,
                        delay.as_millis()
                    );
                }
            }

            thread::sleep(delay);
            delay = next_delay(delay);
        }

        Err(FetchError::Transport {
            url: url.to_string(),
            message: "no attempts made".into(),
        })
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch_source(&mut self, source: &SourceConfig) -> Result<ScheduleDocument, SourceError> {
        let bytes = self
            .fetch(&source.url)
            .map_err(|e| SourceError::Fetch(e.to_string()))?;
        tvmerge_io::read_schedule(&bytes).map_err(|e| SourceError::Parse(e.to_string()))
    }

    // Day documents are small and date-keyed, so they skip the cache.
    fn fetch_official_day(
        &mut self,
        system_code: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleSlot>, SourceError> {
        let url = day_url(&self.official_server, system_code, date);
        let bytes = self
            .download(&url)
            .map_err(|e| SourceError::Fetch(e.to_string()))?;
        let text = tvmerge_io::decode::decode_payload(&bytes)
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        parse_day(&text, &self.utc_offset).map_err(|e| SourceError::Parse(e.to_string()))
    }
}
