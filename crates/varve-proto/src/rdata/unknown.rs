//! Opaque RDATA for record types without a typed representation.

use crate::error::{Error, Result};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// RDATA preserved as raw bytes (RFC 3597 treatment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unknown {
    data: Vec<u8>,
}

impl Unknown {
    /// Creates an opaque RDATA value.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Returns the raw bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copies the RDATA out of a message buffer.
    pub fn parse(message: &[u8], offset: usize, rdlength: u16) -> Result<Self> {
        let end = offset + rdlength as usize;
        if end > message.len() {
            return Err(Error::unexpected_eof(end));
        }
        Ok(Self {
            data: message[offset..end].to_vec(),
        })
    }

    /// Returns the wire length.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.data.len()
    }

    /// Writes the raw bytes.
    #[inline]
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.data);
    }
}

impl fmt::Display for Unknown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\# {}", self.data.len())?;
        if !self.data.is_empty() {
            f.write_str(" ")?;
            for b in &self.data {
                write!(f, "{b:02x}")?;
            }
        }
        Ok(())
    }
}
