//! TXT record type.

use crate::error::{Error, Result};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// TXT record - descriptive text (RFC 1035).
///
/// RDATA is one or more `<len><bytes>` character strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TXT {
    strings: Vec<Vec<u8>>,
}

impl TXT {
    /// Creates a TXT record from one character string.
    pub fn from_string(text: impl Into<Vec<u8>>) -> Self {
        Self {
            strings: vec![text.into()],
        }
    }

    /// Creates a TXT record from multiple character strings.
    pub fn from_strings(strings: Vec<Vec<u8>>) -> Self {
        Self { strings }
    }

    /// Returns the character strings.
    #[inline]
    pub fn strings(&self) -> &[Vec<u8>] {
        &self.strings
    }

    /// Parses a TXT record from wire format.
    pub fn parse(message: &[u8], offset: usize, rdlength: u16) -> Result<Self> {
        let end = offset + rdlength as usize;
        if end > message.len() {
            return Err(Error::unexpected_eof(end));
        }
        let mut strings = Vec::new();
        let mut pos = offset;
        while pos < end {
            let len = usize::from(message[pos]);
            pos += 1;
            if pos + len > end {
                return Err(Error::invalid_rdata("TXT", "string runs past RDATA"));
            }
            strings.push(message[pos..pos + len].to_vec());
            pos += len;
        }
        Ok(Self { strings })
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        self.strings.iter().map(|s| 1 + s.len()).sum()
    }

    /// Writes the record to wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        for s in &self.strings {
            buf.extend_from_slice(&[s.len() as u8]);
            buf.extend_from_slice(s);
        }
    }
}

impl fmt::Display for TXT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.strings.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "\"{}\"", String::from_utf8_lossy(s))?;
        }
        Ok(())
    }
}
