// File and payload I/O for tvmerge

pub mod decode;
pub mod diyp;
pub mod error;
pub mod lineup;
pub mod m3u;
pub mod official;
pub mod xmltv;

pub use error::{LineupError, XmltvError};

/// Decode a fetched payload (gzip or plain) and parse it as XMLTV.
pub fn read_schedule(bytes: &[u8]) -> Result<tvmerge_recon::ScheduleDocument, XmltvError> {
    let text = decode::decode_payload(bytes)?;
    xmltv::parse_document(&text)
}
