use crate::error::DecodeError;
use crate::name::DomainName;
use crate::record_type::{RecordType, CLASS_IN};
use crate::utils::{read_name, read_u16};
use byteorder::{WriteBytesExt, BE};
use std::io::Cursor;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Question {
    pub name: DomainName,
    pub qtype: RecordType,
    pub qclass: u16,
}

impl Question {
    pub fn new(name: DomainName, qtype: RecordType) -> Self {
        Self {
            name,
            qtype,
            qclass: CLASS_IN,
        }
    }

    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> std::io::Result<()> {
        self.name.to_bytes(bytes);

        bytes.write_u16::<BE>(self.qtype.into())?;
        bytes.write_u16::<BE>(self.qclass)?;

        Ok(())
    }

    pub fn parse_from_reader(rdr: &mut Cursor<&[u8]>) -> Result<Self, DecodeError> {
        let name = read_name(rdr)?;
        let qtype = RecordType::from(read_u16(rdr)?);
        let qclass = read_u16(rdr)?;

        let q = Self {
            name,
            qtype,
            qclass,
        };

        Ok(q)
    }
}
