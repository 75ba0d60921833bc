//! DNS message codec.
//!
//! Messages are decoded with explicit byte and bit extraction over a
//! `Cursor`. Decoding follows compression pointers; encoding always writes
//! names in full and derives the header counts from the sections.

mod error;
mod header;
mod message;
mod name;
mod question;
mod record_type;
mod resource_record;
mod utils;

pub use error::{DecodeError, EncodeError, NameError};
pub use header::{Flags, Opcode, ResponseCode, HEADER_LEN};
pub use message::Message;
pub use name::{DomainName, MAX_LABEL_LEN, MAX_NAME_LEN};
pub use question::Question;
pub use record_type::{RecordType, CLASS_IN};
pub use resource_record::ResourceRecord;

// https://datatracker.ietf.org/doc/html/rfc1035#section-4.2.1
//
// Messages carried by UDP are restricted to 512 bytes (not counting the IP
// or UDP headers).
pub const MAX_UDP_MESSAGE_SIZE: usize = 512;

pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    Message::parse_from_bytes(bytes)
}

pub fn encode(msg: &Message) -> Result<Vec<u8>, EncodeError> {
    let mut bytes: Vec<u8> = vec![];
    msg.to_bytes(&mut bytes)?;

    Ok(bytes)
}

/// A standard query with recursion desired and a single IN question.
pub fn encode_query(id: u16, name: DomainName, qtype: RecordType) -> Result<Vec<u8>, EncodeError> {
    let msg = Message {
        id,
        flags: Flags {
            recursion_desired: true,
            ..Flags::default()
        },
        questions: vec![Question::new(name, qtype)],
        ..Message::default()
    };

    encode(&msg)
}
