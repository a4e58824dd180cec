//
// Errors
//

use std::io;

use thiserror::Error;


pub type Result<T> = std::result::Result<T, Error>;


/// Errors raised while opening a KDB3 database.
#[derive(Error, Debug)]
pub enum Error {
    /// The byte source could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is not a well-formed KeePass 1.x database.
    #[error("invalid database: {0}")]
    Format(#[from] FormatError),

    /// Wrong password or corrupted ciphertext. The two cases are
    /// intentionally reported the same way.
    #[error("failed to decrypt database: wrong password or corrupted data")]
    DecryptDataFail,
}


/// Which kind of record a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Group,
    Entry,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Group => f.write_str("group"),
            RecordKind::Entry => f.write_str("entry"),
        }
    }
}


/// Structural problems with the file. These are deterministic: retrying
/// with the same input always yields the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("signature mismatch ({0:#010x}, {1:#010x})")]
    InvalidSignature(u32, u32),

    #[error("unsupported cipher (flags {0:#x})")]
    UnsupportedCipher(u32),

    #[error("unsupported file version {0:#010x}")]
    UnsupportedVersion(u32),

    #[error("input ends before the database is complete")]
    TruncatedInput,

    #[error("{record} record {index} has no {field} field")]
    MissingField {
        record: RecordKind,
        index: usize,
        field: &'static str,
    },

    #[error("{record} field {field_type:#06x} has invalid size {size}")]
    InvalidFieldSize {
        record: RecordKind,
        field_type: u16,
        size: u32,
    },

    #[error("{record} field {field_type:#06x} is not valid UTF-8")]
    InvalidString { record: RecordKind, field_type: u16 },

    #[error("invalid packed timestamp {0:02x?}")]
    InvalidTimestamp([u8; 5]),

    #[error("group {group_id} at level {level} skips a level (deepest allowed is {allowed})")]
    LevelSkip {
        group_id: u32,
        level: u16,
        allowed: usize,
    },

    #[error("group id {0} is used more than once")]
    DuplicateGroupId(u32),

    #[error("entry {uuid} refers to missing group {group_id}")]
    OrphanedEntry { uuid: uuid::Uuid, group_id: u32 },

    #[error("{0} bytes of trailing data after the last entry")]
    TrailingData(usize),
}
