//! Byte-order-mark and prologue based encoding detection

use xdt_traits::{Error, Result};

/// Text encodings a document can be read from and written back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

/// Encoding detected at load time, reused on save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodingInfo {
    pub encoding: TextEncoding,
    /// A byte order mark was present and is written back
    pub bom: bool,
}

/// Decode raw document bytes, sniffing a BOM first and the `encoding`
/// pseudo-attribute of the XML declaration second
pub fn decode(bytes: &[u8]) -> Result<(String, EncodingInfo)> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        let text = std::str::from_utf8(rest).map_err(|e| Error::Encoding(e.to_string()))?;
        return Ok((
            text.to_string(),
            EncodingInfo {
                encoding: TextEncoding::Utf8,
                bom: true,
            },
        ));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return Ok((
            decode_utf16(rest, u16::from_be_bytes)?,
            EncodingInfo {
                encoding: TextEncoding::Utf16Be,
                bom: true,
            },
        ));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return Ok((
            decode_utf16(rest, u16::from_le_bytes)?,
            EncodingInfo {
                encoding: TextEncoding::Utf16Le,
                bom: true,
            },
        ));
    }

    if declared_encoding(bytes).is_some_and(|name| is_latin1(&name)) {
        let text = bytes.iter().map(|&b| b as char).collect();
        return Ok((
            text,
            EncodingInfo {
                encoding: TextEncoding::Latin1,
                bom: false,
            },
        ));
    }

    let text = std::str::from_utf8(bytes).map_err(|e| Error::Encoding(e.to_string()))?;
    Ok((text.to_string(), EncodingInfo::default()))
}

/// Encode serialized text back into bytes
pub fn encode(text: &str, info: EncodingInfo) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() + 3);
    match info.encoding {
        TextEncoding::Utf8 => {
            if info.bom {
                out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
            }
            out.extend_from_slice(text.as_bytes());
        }
        TextEncoding::Utf16Le => {
            if info.bom {
                out.extend_from_slice(&[0xFF, 0xFE]);
            }
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
        }
        TextEncoding::Utf16Be => {
            if info.bom {
                out.extend_from_slice(&[0xFE, 0xFF]);
            }
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
        }
        TextEncoding::Latin1 => {
            for c in text.chars() {
                let code = c as u32;
                if code > 0xFF {
                    return Err(Error::Encoding(format!(
                        "character U+{:04X} cannot be written as ISO-8859-1",
                        code
                    )));
                }
                out.push(code as u8);
            }
        }
    }
    Ok(out)
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::Encoding("odd number of bytes in UTF-16 input".to_string()));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| Error::Encoding(e.to_string()))
}

/// The `encoding` value of a leading `<?xml ...?>` declaration
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    let head: String = head.iter().map(|&b| b as char).collect();
    let decl = head.strip_prefix("<?xml")?;
    let decl = &decl[..decl.find("?>")?];
    let at = decl.find("encoding")?;
    let rest = decl[at + "encoding".len()..].trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|&c| c == '"' || c == '\'')?;
    let rest = &rest[1..];
    Some(rest[..rest.find(quote)?].to_string())
}

fn is_latin1(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "iso-8859-1" | "latin1" | "latin-1" | "l1" | "iso_8859-1"
    )
}
