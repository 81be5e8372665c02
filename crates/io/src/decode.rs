// Payload decoding: optional gzip, then lossy UTF-8

use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::XmltvError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const UTF8_BOM: &str = "\u{feff}";

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Inflate gzip payloads and decode as UTF-8, replacing invalid sequences.
pub fn decode_payload(bytes: &[u8]) -> Result<String, XmltvError> {
    let raw = if is_gzip(bytes) {
        let mut out = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(|e| XmltvError::Gzip(e.to_string()))?;
        out
    } else {
        bytes.to_vec()
    };
    let text = String::from_utf8_lossy(&raw);
    Ok(text.strip_prefix(UTF8_BOM).unwrap_or(&text).to_string())
}
