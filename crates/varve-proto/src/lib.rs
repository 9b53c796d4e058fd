//! # Varve DNS Protocol Library
//!
//! DNS protocol types and wire format handling for the varve resolver,
//! trimmed to what the resolver core actually consumes:
//!
//! - **Domain names** with canonical (RFC 4034) ordering, label iteration,
//!   and the reversible label-format encoding used by the cache keys
//! - **Record types, classes, and response codes**
//! - **RDATA** for the record types the resolver stores and serves,
//!   including the DNSSEC types (RRSIG, NSEC)
//! - **Messages** with wire parsing and serialization
//!
//! ## Example
//!
//! ```rust,ignore
//! use varve_proto::{Message, Name, Question, RecordType, RecordClass};
//! use std::str::FromStr;
//!
//! let question = Question::new(
//!     Name::from_str("example.com.")?,
//!     RecordType::A,
//!     RecordClass::IN,
//! );
//! let query = Message::query(0x1234, question);
//! let wire = query.to_wire()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod class;
pub mod error;
pub mod header;
pub mod message;
pub mod name;
pub mod question;
pub mod rcode;
pub mod rdata;
pub mod record;
pub mod rtype;
pub mod wire;

// Re-exports for convenience
pub use class::{Class, RecordClass};
pub use error::{Error, Result};
pub use header::{Header, HeaderFlags};
pub use message::Message;
pub use name::Name;
pub use question::Question;
pub use rcode::ResponseCode;
pub use rdata::RData;
pub use record::{ResourceRecord, RrSet};
pub use rtype::{RecordType, Type};

/// Maximum length of a DNS label (63 bytes per RFC 1035)
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum length of a domain name in wire format (255 bytes per RFC 1035)
pub const MAX_NAME_LENGTH: usize = 255;

/// Size of the fixed DNS message header
pub const HEADER_SIZE: usize = 12;
