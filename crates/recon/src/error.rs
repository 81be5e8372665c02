use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad pattern, empty prefix, etc.).
    ConfigValidation(String),
    /// `lineup.format` names a playlist format that is not configured.
    UnknownFormat { format: String, known: Vec<String> },
    /// A single-contribution rule that can never match anything.
    InvalidExclusion(String),
    /// The lineup has no channels to reconcile.
    NoLocalChannels,
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownFormat { format, known } => {
                write!(f, "unknown playlist format '{format}' (configured: {})", known.join(", "))
            }
            Self::InvalidExclusion(msg) => write!(f, "invalid exclusion rule: {msg}"),
            Self::NoLocalChannels => write!(f, "lineup contains no channels"),
        }
    }
}

impl std::error::Error for ReconError {}

/// Why a source could not contribute during a run. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Transport failure (timeout, HTTP status, missing file).
    Fetch(String),
    /// The payload could not be decoded into a schedule document.
    Parse(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(msg) => write!(f, "fetch failed: {msg}"),
            Self::Parse(msg) => write!(f, "parse failed: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}
