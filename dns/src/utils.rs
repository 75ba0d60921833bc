use crate::error::{DecodeError, NameError};
use crate::name::DomainName;
use byteorder::{ReadBytesExt, BE};
use std::io::Cursor;

const POINTER_MASK: u8 = 0b1100_0000;

pub fn read_u16(rdr: &mut Cursor<&[u8]>) -> Result<u16, DecodeError> {
    let offset = rdr.position() as usize;
    rdr.read_u16::<BE>()
        .map_err(|_| DecodeError::TruncatedMessage { offset })
}

pub fn read_i32(rdr: &mut Cursor<&[u8]>) -> Result<i32, DecodeError> {
    let offset = rdr.position() as usize;
    rdr.read_i32::<BE>()
        .map_err(|_| DecodeError::TruncatedMessage { offset })
}

pub fn read_bytes(rdr: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>, DecodeError> {
    let buf = *rdr.get_ref();
    let start = rdr.position() as usize;
    let bytes = buf
        .get(start..start + len)
        .ok_or(DecodeError::TruncatedMessage { offset: start })?;
    rdr.set_position((start + len) as u64);

    Ok(bytes.to_vec())
}

// qname 转换为 DomainName
//
// A name is a run of length-prefixed labels ending either in a zero byte or
// in a two byte pointer (top bits `11`) to an earlier offset. Every pointer
// must land strictly before the run it ends, so offsets only ever decrease
// along a chain and a chain cannot loop.
pub fn read_name(rdr: &mut Cursor<&[u8]>) -> Result<DomainName, DecodeError> {
    let buf = *rdr.get_ref();
    let mut name = DomainName::root();

    let mut pos = rdr.position() as usize;
    let mut run_start = pos;
    // where the reader continues once the name is done, set by the first pointer
    let mut resume_at: Option<usize> = None;

    loop {
        let len_byte = *buf
            .get(pos)
            .ok_or(DecodeError::TruncatedMessage { offset: pos })?;

        match len_byte & POINTER_MASK {
            0 if len_byte == 0 => {
                pos += 1;
                break;
            }
            0 => {
                let start = pos + 1;
                let end = start + len_byte as usize;
                let label = buf
                    .get(start..end)
                    .ok_or(DecodeError::TruncatedMessage { offset: start })?;

                name.push_label(label.to_vec())
                    .map_err(|source| DecodeError::InvalidName { offset: pos, source })?;
                pos = end;
            }
            POINTER_MASK => {
                let low = *buf
                    .get(pos + 1)
                    .ok_or(DecodeError::TruncatedMessage { offset: pos + 1 })?;
                let target = (usize::from(len_byte & !POINTER_MASK) << 8) | usize::from(low);

                if target >= run_start {
                    return Err(DecodeError::BadPointer { offset: pos, target });
                }

                if resume_at.is_none() {
                    resume_at = Some(pos + 2);
                }
                pos = target;
                run_start = target;
            }
            reserved => {
                return Err(DecodeError::InvalidName {
                    offset: pos,
                    source: NameError::ReservedLabelType(reserved),
                });
            }
        }
    }

    rdr.set_position(resume_at.unwrap_or(pos) as u64);
    Ok(name)
}
