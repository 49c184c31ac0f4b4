//! Decoding of corpus files to UTF-8 before parsing.
//!
//! The encoding is taken from the byte order mark, then from the byte
//! pattern of a BOM-less UTF-16 `<`, then from the `encoding` pseudo
//! attribute of the XML declaration. Anything else is read as UTF-8.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

/// How far into the file the XML declaration is searched for.
const DECLARATION_LIMIT: usize = 256;

/// Errors raised while decoding a file.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The XML declaration names an encoding that is not known.
    #[error("unsupported encoding {0:?}")]
    UnknownEncoding(String),
    /// The bytes are not valid in the detected encoding.
    #[error("file is not valid {0}")]
    Malformed(&'static str),
}

/// Decodes `bytes` to text, dropping any byte order mark.
///
/// # Errors
///
/// Fails if the declared encoding is unknown or the bytes do not decode
/// cleanly.
pub fn decode(bytes: &[u8]) -> Result<Cow<'_, str>, DecodeError> {
    let (encoding, body) = detect(bytes)?;
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or(DecodeError::Malformed(encoding.name()))
}

fn detect(bytes: &[u8]) -> Result<(&'static Encoding, &[u8]), DecodeError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return Ok((encoding, &bytes[bom_len..]));
    }

    match bytes {
        [0x00, b'<', ..] => return Ok((UTF_16BE, bytes)),
        [b'<', 0x00, ..] => return Ok((UTF_16LE, bytes)),
        _ => {}
    }

    match declared_encoding(bytes) {
        // A declaration naming UTF-16 was itself read as ASCII, so
        // `output_encoding` maps it back to UTF-8.
        Some(label) => Encoding::for_label(label.as_bytes())
            .map(|encoding| (encoding.output_encoding(), bytes))
            .ok_or(DecodeError::UnknownEncoding(label)),
        None => Ok((UTF_8, bytes)),
    }
}

/// The `encoding` value of a leading `<?xml ...?>` declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(DECLARATION_LIMIT)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&head[..end]).ok()?;

    let rest = &decl[decl.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    let close = value.find(quote)?;
    Some(value[..close].to_owned())
}
