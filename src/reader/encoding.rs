//! Turns the bytes of a finished read into the result for each [`ReadMode`].

use super::{ArrayBuffer, ReadMode, ReadResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};

const DEFAULT_DATA_URL_TYPE: &str = "application/octet-stream";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn encode(mode: ReadMode, bytes: Vec<u8>, content_type: &str) -> ReadResult {
    match mode {
        ReadMode::DataUrl => ReadResult::Text(data_url(&bytes, content_type)),
        ReadMode::BinaryString => ReadResult::Text(binary_string(&bytes)),
        ReadMode::Text => ReadResult::Text(utf8_text(&bytes)),
        ReadMode::ArrayBuffer => ReadResult::ArrayBuffer(ArrayBuffer::from(bytes)),
    }
}

pub fn data_url(bytes: &[u8], content_type: &str) -> String {
    let content_type = if content_type.is_empty() {
        DEFAULT_DATA_URL_TYPE
    } else {
        content_type
    };
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

/// One char per byte, code point equal to the byte value
pub fn binary_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

pub fn utf8_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
