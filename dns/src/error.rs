use thiserror::Error;

/// Reasons a domain name is rejected, either when parsed from text or
/// when read off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("empty label")]
    EmptyLabel,

    #[error("label of {0} bytes exceeds 63")]
    LabelTooLong(usize),

    #[error("name of {0} bytes exceeds 255")]
    NameTooLong(usize),

    #[error("reserved label type {0:#04x}")]
    ReservedLabelType(u8),

    #[error("bad escape sequence")]
    BadEscape,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("message truncated at offset {offset}")]
    TruncatedMessage { offset: usize },

    #[error("invalid name at offset {offset}: {source}")]
    InvalidName { offset: usize, source: NameError },

    #[error("compression pointer at offset {offset} targets {target}")]
    BadPointer { offset: usize, target: usize },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{section} section holds {len} entries")]
    SectionTooLarge { section: &'static str, len: usize },

    #[error("rdata of {0} bytes does not fit a 16 bit length")]
    RdataTooLong(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
