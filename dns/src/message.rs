use crate::error::{DecodeError, EncodeError};
use crate::header::{Flags, Header, HEADER_LEN};
use crate::question::Question;
use crate::resource_record::ResourceRecord;
use std::convert::TryFrom;
use std::io::Cursor;

// root name (1) + type (2) + class (2)
const MIN_QUESTION_LEN: usize = 5;
// root name (1) + type, class, ttl, rdlength (10)
const MIN_RECORD_LEN: usize = 11;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
    pub id: u16,
    pub flags: Flags,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    pub fn first_question(&self) -> Option<&Question> {
        self.questions.first()
    }

    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Cursor::new(bytes);

        let header = Header::parse_from_reader(&mut reader)?;

        let remaining = bytes.len() - HEADER_LEN;
        let needed = usize::from(header.qdcount) * MIN_QUESTION_LEN
            + header.record_count() * MIN_RECORD_LEN;
        if needed > remaining {
            return Err(DecodeError::MalformedHeader(format!(
                "counts {}/{}/{}/{} need at least {} bytes, {} remain",
                header.qdcount, header.ancount, header.nscount, header.arcount, needed, remaining
            )));
        }

        let mut questions = Vec::with_capacity(usize::from(header.qdcount));
        for _ in 0..header.qdcount {
            questions.push(Question::parse_from_reader(&mut reader)?);
        }

        let answers = parse_records(&mut reader, header.ancount)?;
        let authority = parse_records(&mut reader, header.nscount)?;
        let additional = parse_records(&mut reader, header.arcount)?;

        let msg = Self {
            id: header.id,
            flags: header.flags,
            questions,
            answers,
            authority,
            additional,
        };

        Ok(msg)
    }

    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
        let header = Header {
            id: self.id,
            flags: self.flags,
            qdcount: section_count("question", self.questions.len())?,
            ancount: section_count("answer", self.answers.len())?,
            nscount: section_count("authority", self.authority.len())?,
            arcount: section_count("additional", self.additional.len())?,
        };
        header.to_bytes(bytes)?;

        for question in &self.questions {
            question.to_bytes(bytes)?;
        }
        for record in self
            .answers
            .iter()
            .chain(self.authority.iter())
            .chain(self.additional.iter())
        {
            record.to_bytes(bytes)?;
        }

        Ok(())
    }
}

fn parse_records(
    rdr: &mut Cursor<&[u8]>,
    count: u16,
) -> Result<Vec<ResourceRecord>, DecodeError> {
    let mut records = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        records.push(ResourceRecord::parse_from_reader(rdr)?);
    }

    Ok(records)
}

fn section_count(section: &'static str, len: usize) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::SectionTooLarge { section, len })
}
