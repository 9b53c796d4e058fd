//! DNS question section.

use crate::class::{Class, RecordClass};
use crate::error::Result;
use crate::name::Name;
use crate::rtype::{RecordType, Type};
use crate::wire::WireReader;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A DNS question: what is being asked of the DNS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Question {
    /// The domain name being queried.
    pub qname: Name,

    /// The type of record being requested.
    pub qtype: Type,

    /// The class of the query (usually IN).
    pub qclass: Class,
}

impl Question {
    /// Creates a new question.
    #[inline]
    pub fn new(qname: Name, qtype: RecordType, qclass: RecordClass) -> Self {
        Self {
            qname,
            qtype: qtype.into(),
            qclass: qclass.into(),
        }
    }

    /// Creates a new question with generic type and class.
    #[inline]
    pub fn new_generic(qname: Name, qtype: Type, qclass: Class) -> Self {
        Self {
            qname,
            qtype,
            qclass,
        }
    }

    /// Parses one question out of a message buffer.
    ///
    /// Returns the question and the number of bytes consumed at `offset`.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (qname, name_len) = Name::parse(message, offset)?;
        let mut reader = WireReader::new(message);
        reader.set_position(offset + name_len);
        let qtype = Type::from_u16(reader.read_u16()?);
        let qclass = Class::from_u16(reader.read_u16()?);
        Ok((
            Self {
                qname,
                qtype,
                qclass,
            },
            reader.position() - offset,
        ))
    }

    /// Writes the question in uncompressed wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.qname.write_wire(buf);
        buf.extend_from_slice(&self.qtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.qclass.to_u16().to_be_bytes());
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.qname, self.qclass, self.qtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_question_roundtrip() {
        let q = Question::new(
            Name::from_str("example.com.").unwrap(),
            RecordType::AAAA,
            RecordClass::IN,
        );
        let mut buf = BytesMut::new();
        q.write_to(&mut buf);
        let (back, used) = Question::parse(&buf, 0).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(back, q);
    }
}
