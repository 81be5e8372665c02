use std::fmt;

/// Errors reading or writing XMLTV documents.
#[derive(Debug)]
pub enum XmltvError {
    /// The payload is not well-formed XML.
    Malformed { position: u64, message: String },
    /// Well-formed, but there is no `<tv>` root.
    NotXmltv,
    Gzip(String),
    Write(String),
    Io(std::io::Error),
}

impl fmt::Display for XmltvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { position, message } => {
                write!(f, "malformed XML at byte {position}: {message}")
            }
            Self::NotXmltv => write!(f, "document has no <tv> element"),
            Self::Gzip(msg) => write!(f, "gzip: {msg}"),
            Self::Write(msg) => write!(f, "cannot serialize XMLTV: {msg}"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for XmltvError {}

impl From<std::io::Error> for XmltvError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors loading the local lineup or the provider playlist.
#[derive(Debug)]
pub enum LineupError {
    Io { path: String, source: std::io::Error },
    /// Playlist JSON could not be parsed.
    Playlist(String),
    /// Playlist shape does not fit the configured format.
    Shape(String),
    /// Official feed document could not be parsed.
    Feed(String),
}

impl fmt::Display for LineupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {path}: {source}"),
            Self::Playlist(msg) => write!(f, "playlist JSON: {msg}"),
            Self::Shape(msg) => write!(f, "playlist layout: {msg}"),
            Self::Feed(msg) => write!(f, "official feed: {msg}"),
        }
    }
}

impl std::error::Error for LineupError {}
