use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::http::parser::ParseError;

const CRLF: &[u8] = b"\r\n";

/// Case-insensitive header store.
///
/// Field names are canonicalized to lower case on insertion. Setting a name
/// that already exists folds the new value onto the old one joined by `", "`,
/// the RFC list form, so repeated fields are always stored as a single entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    map: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the next CRLF-terminated field line out of `data`.
    ///
    /// Returns `(bytes_consumed, header_block_done)`. A return of `(0, false)`
    /// means no complete line is available yet and the caller should supply
    /// more bytes - that is not an error. A bare CRLF at the front of `data`
    /// terminates the header block and consumes exactly two bytes.
    pub fn parse_line(&mut self, data: &[u8]) -> Result<(usize, bool), ParseError> {
        let Some(idx) = find_crlf(data) else {
            return Ok((0, false));
        };
        if idx == 0 {
            return Ok((2, true));
        }

        let line = std::str::from_utf8(&data[..idx])
            .map_err(|_| ParseError::MalformedHeader("field line is not valid UTF-8"))?;

        let Some((name, value)) = line.split_once(':') else {
            return Err(ParseError::MalformedHeader("missing colon in field line"));
        };
        if name.ends_with(|c: char| c.is_ascii_whitespace()) {
            return Err(ParseError::MalformedHeader(
                "whitespace between field name and colon",
            ));
        }

        let name = name.trim();
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return Err(ParseError::MalformedHeader(
                "field name contains invalid token characters",
            ));
        }

        self.set(name, value.trim());
        Ok((idx + 2, false))
    }

    /// Sets a field, folding onto any existing value for the same name.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.map.entry(name.to_ascii_lowercase()) {
            Entry::Occupied(mut entry) => {
                let folded = entry.get_mut();
                folded.push_str(", ");
                folded.push_str(value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value.to_string());
            }
        }
    }

    /// Sets a field, overwriting any existing value for the same name.
    pub fn replace(&mut self, name: &str, value: &str) {
        self.map.insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) {
        self.map.remove(&name.to_ascii_lowercase());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|window| window == CRLF)
}

// Token alphabet for field names: ASCII letters, digits, and the fixed
// punctuation set. Everything else is rejected.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'`'
                | b'|' | b'~'
        )
}
