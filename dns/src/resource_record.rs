use crate::error::{DecodeError, EncodeError};
use crate::name::DomainName;
use crate::record_type::{RecordType, CLASS_IN};
use crate::utils::{read_bytes, read_i32, read_name, read_u16};
use byteorder::{WriteBytesExt, BE};
use std::convert::TryFrom;
use std::io::Cursor;
use std::net::Ipv4Addr;

/// A resource record. RDATA is kept exactly as received; names inside it
/// are not decompressed.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ResourceRecord {
    pub name: DomainName,
    pub rtype: RecordType,
    pub rclass: u16,
    pub ttl: i32,
    pub rdata: Vec<u8>,
}

impl ResourceRecord {
    pub fn a(name: DomainName, ttl: i32, address: Ipv4Addr) -> Self {
        Self {
            name,
            rtype: RecordType::A,
            rclass: CLASS_IN,
            ttl,
            rdata: address.octets().to_vec(),
        }
    }

    /// The address carried by an IN A record, if this is one.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        if self.rtype != RecordType::A || self.rclass != CLASS_IN {
            return None;
        }

        let octets = <[u8; 4]>::try_from(self.rdata.as_slice()).ok()?;
        Some(Ipv4Addr::from(octets))
    }

    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
        let rdlength =
            u16::try_from(self.rdata.len()).map_err(|_| EncodeError::RdataTooLong(self.rdata.len()))?;

        self.name.to_bytes(bytes);
        bytes.write_u16::<BE>(self.rtype.into())?;
        bytes.write_u16::<BE>(self.rclass)?;
        bytes.write_i32::<BE>(self.ttl)?;
        bytes.write_u16::<BE>(rdlength)?;
        bytes.extend_from_slice(&self.rdata);

        Ok(())
    }

    pub fn parse_from_reader(rdr: &mut Cursor<&[u8]>) -> Result<Self, DecodeError> {
        let name = read_name(rdr)?;
        let rtype = RecordType::from(read_u16(rdr)?);
        let rclass = read_u16(rdr)?;
        let ttl = read_i32(rdr)?;
        let rdlength = read_u16(rdr)?;
        let rdata = read_bytes(rdr, usize::from(rdlength))?;

        let record = Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        };

        Ok(record)
    }
}
