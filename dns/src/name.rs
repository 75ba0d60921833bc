use crate::error::NameError;
use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

pub const MAX_LABEL_LEN: usize = 63;
pub const MAX_NAME_LEN: usize = 255;

/// A domain name as a sequence of labels.
///
/// Labels keep the spelling they were received or parsed with, so a name
/// read off the wire encodes back to the same bytes. Comparison and hashing
/// ignore ASCII case, and [`DomainName::canonical`] gives the lower-cased
/// presentation form used as the storage key.
///
/// The wire format allows any byte in a label. Text forms escape a `.` or
/// `\` inside a label with a backslash and any byte outside `!`..=`~` as
/// `\DDD` (decimal), so they never contain whitespace and parse back to the
/// same labels.
#[derive(Clone, Default)]
pub struct DomainName {
    labels: Vec<Vec<u8>>,
}

impl DomainName {
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    pub fn from_labels<I, L>(labels: I) -> Result<Self, NameError>
    where
        I: IntoIterator<Item = L>,
        L: Into<Vec<u8>>,
    {
        let mut name = Self::root();
        for label in labels {
            name.push_label(label.into())?;
        }

        Ok(name)
    }

    pub(crate) fn push_label(&mut self, label: Vec<u8>) -> Result<(), NameError> {
        if label.is_empty() {
            return Err(NameError::EmptyLabel);
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(NameError::LabelTooLong(label.len()));
        }

        let new_len = self.wire_len() + 1 + label.len();
        if new_len > MAX_NAME_LEN {
            return Err(NameError::NameTooLong(new_len));
        }

        self.labels.push(label);
        Ok(())
    }

    pub fn labels(&self) -> impl Iterator<Item = &[u8]> {
        self.labels.iter().map(|l| l.as_slice())
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Encoded length, including the terminating zero label.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Lower-cased, escaped, dot-joined, no trailing dot. The root name is `""`.
    pub fn canonical(&self) -> String {
        let mut out = String::with_capacity(self.wire_len());
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            push_escaped(&mut out, &label.to_ascii_lowercase());
        }

        out
    }

    // length prefixed labels, zero terminated, never compressed
    pub(crate) fn to_bytes(&self, bytes: &mut Vec<u8>) {
        for label in &self.labels {
            bytes.push(label.len() as u8);
            bytes.extend_from_slice(label);
        }
        bytes.push(0);
    }
}

fn push_escaped(out: &mut String, label: &[u8]) {
    for &b in label {
        match b {
            b'.' | b'\\' => {
                out.push('\\');
                out.push(b as char);
            }
            b'!'..=b'~' => out.push(b as char),
            _ => out.push_str(&format!("\\{:03}", b)),
        }
    }
}

// the byte following a backslash, or the three digits of a `\DDD` escape
fn unescape(rest: &mut std::str::Bytes) -> Result<u8, NameError> {
    let first = rest.next().ok_or(NameError::BadEscape)?;
    if !first.is_ascii_digit() {
        return Ok(first);
    }

    let mut value = u32::from(first - b'0');
    for _ in 0..2 {
        match rest.next() {
            Some(d) if d.is_ascii_digit() => value = value * 10 + u32::from(d - b'0'),
            _ => return Err(NameError::BadEscape),
        }
    }

    u8::try_from(value).map_err(|_| NameError::BadEscape)
}

impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for DomainName {}

impl Hash for DomainName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.labels.len());
        for label in &self.labels {
            state.write(&label.to_ascii_lowercase());
            state.write_u8(0);
        }
    }
}

impl FromStr for DomainName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut name = Self::root();
        if s.is_empty() || s == "." {
            return Ok(name);
        }

        let mut label = Vec::new();
        let mut bytes = s.bytes();
        while let Some(b) = bytes.next() {
            match b {
                b'.' => name.push_label(std::mem::take(&mut label))?,
                b'\\' => label.push(unescape(&mut bytes)?),
                _ => label.push(b),
            }
        }

        // empty only after a trailing dot
        if !label.is_empty() {
            name.push_label(label)?;
        }

        Ok(name)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }

        let mut out = String::with_capacity(self.wire_len());
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            push_escaped(&mut out, label);
        }

        f.write_str(&out)
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DomainName({})", self)
    }
}
