//! DNS message representation.

use crate::class::RecordClass;
use crate::error::Result;
use crate::header::{Header, HeaderFlags, HEADER_SIZE};
use crate::name::Name;
use crate::question::Question;
use crate::rcode::ResponseCode;
use crate::record::ResourceRecord;
use crate::rtype::Type;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete DNS message: header, question, and the answer, authority,
/// and additional sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    header: Header,
    questions: Vec<Question>,
    answers: Vec<ResourceRecord>,
    authority: Vec<ResourceRecord>,
    additional: Vec<ResourceRecord>,
}

impl Message {
    /// Creates a new empty message with the given ID.
    pub fn new(id: u16) -> Self {
        Self {
            header: Header::new(id),
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Creates a query message.
    pub fn query(id: u16, question: Question) -> Self {
        let mut msg = Self::new(id);
        msg.header.flags = HeaderFlags::RD;
        msg.header.qd_count = 1;
        msg.questions.push(question);
        msg
    }

    /// Resets the message into a fresh response skeleton for one question,
    /// dropping every section. The message ID is preserved.
    pub fn renew(&mut self, qname: Name, qtype: Type) {
        self.header.flags = HeaderFlags::QR;
        self.header.rcode = ResponseCode::NoError;
        self.questions.clear();
        self.questions.push(Question::new_generic(
            qname,
            qtype,
            RecordClass::IN.into(),
        ));
        self.header.qd_count = 1;
        self.answers.clear();
        self.authority.clear();
        self.additional.clear();
        self.sync_counts();
    }

    /// Returns the message header.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns a mutable reference to the header.
    #[inline]
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Returns the message ID.
    #[inline]
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// Sets the message ID.
    #[inline]
    pub fn set_id(&mut self, id: u16) {
        self.header.id = id;
    }

    /// Returns the response code.
    #[inline]
    pub fn rcode(&self) -> ResponseCode {
        self.header.rcode
    }

    /// Sets the response code.
    #[inline]
    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.rcode = rcode;
    }

    /// Returns true if the message was truncated.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.header.is_truncated()
    }

    /// Returns true if checking is disabled (CD flag).
    #[inline]
    pub fn checking_disabled(&self) -> bool {
        self.header.checking_disabled()
    }

    /// Returns the first question, if present.
    #[inline]
    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// Returns the question section.
    #[inline]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Returns the answer section.
    #[inline]
    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    /// Returns the authority section.
    #[inline]
    pub fn authority(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// Returns the additional section.
    #[inline]
    pub fn additional(&self) -> &[ResourceRecord] {
        &self.additional
    }

    /// Appends a record to the answer section.
    pub fn add_answer(&mut self, record: ResourceRecord) {
        self.answers.push(record);
        self.sync_counts();
    }

    /// Appends a record to the authority section.
    pub fn add_authority(&mut self, record: ResourceRecord) {
        self.authority.push(record);
        self.sync_counts();
    }

    /// Appends a record to the additional section.
    pub fn add_additional(&mut self, record: ResourceRecord) {
        self.additional.push(record);
        self.sync_counts();
    }

    /// Ages every record TTL by `elapsed` seconds, saturating at zero.
    pub fn age_ttls(&mut self, elapsed: u32) {
        for record in self
            .answers
            .iter_mut()
            .chain(self.authority.iter_mut())
            .chain(self.additional.iter_mut())
        {
            record.set_ttl(record.ttl().saturating_sub(elapsed));
        }
    }

    /// Caps every record TTL in the message at `max_ttl`.
    pub fn clamp_ttls(&mut self, max_ttl: u32) {
        for record in self
            .answers
            .iter_mut()
            .chain(self.authority.iter_mut())
            .chain(self.additional.iter_mut())
        {
            if record.ttl() > max_ttl {
                record.set_ttl(max_ttl);
            }
        }
    }

    /// Returns the smallest record TTL across all sections, if any.
    pub fn min_ttl(&self) -> Option<u32> {
        self.answers
            .iter()
            .chain(self.authority.iter())
            .chain(self.additional.iter())
            .map(ResourceRecord::ttl)
            .min()
    }

    fn sync_counts(&mut self) {
        self.header.qd_count = self.questions.len() as u16;
        self.header.an_count = self.answers.len() as u16;
        self.header.ns_count = self.authority.len() as u16;
        self.header.ar_count = self.additional.len() as u16;
    }

    /// Parses a message from wire format.
    pub fn parse(wire: &[u8]) -> Result<Self> {
        let header = Header::parse(wire)?;
        let mut pos = HEADER_SIZE;

        let mut questions = Vec::with_capacity(usize::from(header.qd_count));
        for _ in 0..header.qd_count {
            let (q, used) = Question::parse(wire, pos)?;
            questions.push(q);
            pos += used;
        }

        let mut sections = [
            Vec::with_capacity(usize::from(header.an_count)),
            Vec::with_capacity(usize::from(header.ns_count)),
            Vec::with_capacity(usize::from(header.ar_count)),
        ];
        let counts = [header.an_count, header.ns_count, header.ar_count];
        for (section, &count) in sections.iter_mut().zip(counts.iter()) {
            for _ in 0..count {
                let (rr, used) = ResourceRecord::parse(wire, pos)?;
                section.push(rr);
                pos += used;
            }
        }
        let [answers, authority, additional] = sections;

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }

    /// Serializes the message to wire format, uncompressed.
    pub fn to_wire(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(512);
        self.header.write_to(&mut buf);
        for q in &self.questions {
            q.write_to(&mut buf);
        }
        for rr in self
            .answers
            .iter()
            .chain(self.authority.iter())
            .chain(self.additional.iter())
        {
            rr.write_to(&mut buf);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        if let Some(q) = self.question() {
            write!(f, " {q}")?;
        }
        Ok(())
    }
}
