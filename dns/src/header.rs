use crate::error::DecodeError;
use crate::utils::read_u16;
use byteorder::{WriteBytesExt, BE};
use std::io::Cursor;

pub const HEADER_LEN: usize = 12;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Opcode {
    Query,
    InverseQuery,
    Status,
    Notify,
    Update,
    Reserved(u8),
}

impl From<u8> for Opcode {
    fn from(code: u8) -> Self {
        match code & 0x0F {
            0 => Opcode::Query,
            1 => Opcode::InverseQuery,
            2 => Opcode::Status,
            4 => Opcode::Notify,
            5 => Opcode::Update,
            other => Opcode::Reserved(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        match opcode {
            Opcode::Query => 0,
            Opcode::InverseQuery => 1,
            Opcode::Status => 2,
            Opcode::Notify => 4,
            Opcode::Update => 5,
            Opcode::Reserved(code) => code & 0x0F,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ResponseCode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Reserved(u8),
}

impl From<u8> for ResponseCode {
    fn from(code: u8) -> Self {
        match code & 0x0F {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormatError,
            2 => ResponseCode::ServerFailure,
            3 => ResponseCode::NameError,
            4 => ResponseCode::NotImplemented,
            5 => ResponseCode::Refused,
            other => ResponseCode::Reserved(other),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(rcode: ResponseCode) -> Self {
        match rcode {
            ResponseCode::NoError => 0,
            ResponseCode::FormatError => 1,
            ResponseCode::ServerFailure => 2,
            ResponseCode::NameError => 3,
            ResponseCode::NotImplemented => 4,
            ResponseCode::Refused => 5,
            ResponseCode::Reserved(code) => code & 0x0F,
        }
    }
}

//  0  1  2  3  4  5  6  7  8  9 10 11 12 13 14 15
// |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Flags {
    pub is_response: bool,
    pub opcode: Opcode,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    /// The three reserved bits (Z, AD, CD), kept as received.
    pub z: u8,
    pub response_code: ResponseCode,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            is_response: false,
            opcode: Opcode::Query,
            authoritative: false,
            truncated: false,
            recursion_desired: false,
            recursion_available: false,
            z: 0,
            response_code: ResponseCode::NoError,
        }
    }
}

impl Flags {
    pub fn to_u16(&self) -> u16 {
        let mut bits: u16 = 0;

        if self.is_response {
            bits |= 1 << 15;
        }
        bits |= u16::from(u8::from(self.opcode)) << 11;
        if self.authoritative {
            bits |= 1 << 10;
        }
        if self.truncated {
            bits |= 1 << 9;
        }
        if self.recursion_desired {
            bits |= 1 << 8;
        }
        if self.recursion_available {
            bits |= 1 << 7;
        }
        bits |= u16::from(self.z & 0x07) << 4;
        bits |= u16::from(u8::from(self.response_code));

        bits
    }

    pub fn from_u16(bits: u16) -> Self {
        Self {
            is_response: bits & (1 << 15) != 0,
            opcode: Opcode::from(((bits >> 11) & 0x0F) as u8),
            authoritative: bits & (1 << 10) != 0,
            truncated: bits & (1 << 9) != 0,
            recursion_desired: bits & (1 << 8) != 0,
            recursion_available: bits & (1 << 7) != 0,
            z: ((bits >> 4) & 0x07) as u8,
            response_code: ResponseCode::from((bits & 0x0F) as u8),
        }
    }
}

// 12 bytes
#[derive(Debug)]
pub(crate) struct Header {
    pub id: u16,
    pub flags: Flags,
    pub qdcount: u16, // question 数量，一般为 1
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> std::io::Result<()> {
        bytes.write_u16::<BE>(self.id)?;
        bytes.write_u16::<BE>(self.flags.to_u16())?;
        bytes.write_u16::<BE>(self.qdcount)?;
        bytes.write_u16::<BE>(self.ancount)?;
        bytes.write_u16::<BE>(self.nscount)?;
        bytes.write_u16::<BE>(self.arcount)?;

        Ok(())
    }

    pub fn parse_from_reader(rdr: &mut Cursor<&[u8]>) -> Result<Self, DecodeError> {
        let len = rdr.get_ref().len();
        if len < HEADER_LEN {
            return Err(DecodeError::MalformedHeader(format!(
                "{} bytes, header needs {}",
                len, HEADER_LEN
            )));
        }

        let id = read_u16(rdr)?;
        let flags = Flags::from_u16(read_u16(rdr)?);
        let qdcount = read_u16(rdr)?;
        let ancount = read_u16(rdr)?;
        let nscount = read_u16(rdr)?;
        let arcount = read_u16(rdr)?;

        let h = Self {
            id,
            flags,
            qdcount,
            ancount,
            nscount,
            arcount,
        };

        Ok(h)
    }

    pub fn record_count(&self) -> usize {
        usize::from(self.ancount) + usize::from(self.nscount) + usize::from(self.arcount)
    }
}
