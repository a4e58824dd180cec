//
// On-disk format
//

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::kdb3::error::FormatError;


pub const KDB3_SIGNATURE_1: u32 = 0x9AA2D903;
pub const KDB3_SIGNATURE_2: u32 = 0xB54BFB65;

// Only the major/minor part of the version is checked
pub const KDB3_VERSION: u32 = 0x00030002;
pub const KDB3_VERSION_MASK: u32 = 0xFFFFFF00;

pub const KDB3_FLAG_SHA2: u32 = 1;
pub const KDB3_FLAG_RIJNDAEL: u32 = 2;
pub const KDB3_FLAG_ARCFOUR: u32 = 4;
pub const KDB3_FLAG_TWOFISH: u32 = 8;

pub const KDB3_HEADER_SIZE: usize = 124;


// Fields valid in both record kinds
pub const KDB3_FIELD_EXT_DATA : u16 = 0x0000;
pub const KDB3_FIELD_END      : u16 = 0xFFFF;

// Group fields
pub const KDB3_GROUP_ID       : u16 = 0x0001;
pub const KDB3_GROUP_TITLE    : u16 = 0x0002;
pub const KDB3_GROUP_CREATED  : u16 = 0x0003;
pub const KDB3_GROUP_MODIFIED : u16 = 0x0004;
pub const KDB3_GROUP_ACCESSED : u16 = 0x0005;
pub const KDB3_GROUP_EXPIRES  : u16 = 0x0006;
pub const KDB3_GROUP_IMAGE_ID : u16 = 0x0007;
pub const KDB3_GROUP_LEVEL    : u16 = 0x0008;
pub const KDB3_GROUP_FLAGS    : u16 = 0x0009;

// Entry fields
pub const KDB3_ENTRY_UUID        : u16 = 0x0001;
pub const KDB3_ENTRY_GROUP_ID    : u16 = 0x0002;
pub const KDB3_ENTRY_IMAGE_ID    : u16 = 0x0003;
pub const KDB3_ENTRY_TITLE       : u16 = 0x0004;
pub const KDB3_ENTRY_URL         : u16 = 0x0005;
pub const KDB3_ENTRY_USERNAME    : u16 = 0x0006;
pub const KDB3_ENTRY_PASSWORD    : u16 = 0x0007;
pub const KDB3_ENTRY_COMMENT     : u16 = 0x0008;
pub const KDB3_ENTRY_CREATED     : u16 = 0x0009;
pub const KDB3_ENTRY_MODIFIED    : u16 = 0x000A;
pub const KDB3_ENTRY_ACCESSED    : u16 = 0x000B;
pub const KDB3_ENTRY_EXPIRES     : u16 = 0x000C;
pub const KDB3_ENTRY_BINARY_DESC : u16 = 0x000D;
pub const KDB3_ENTRY_BINARY      : u16 = 0x000E;


/// Unencrypted file header.
///
/// Layout (little endian):
///
/// | offset | size | field           |
/// |--------|------|-----------------|
/// | 0      | 4    | signature 1     |
/// | 4      | 4    | signature 2     |
/// | 8      | 4    | flags           |
/// | 12     | 4    | version         |
/// | 16     | 16   | master seed     |
/// | 32     | 16   | IV              |
/// | 48     | 4    | group count     |
/// | 52     | 4    | entry count     |
/// | 56     | 32   | content hash    |
/// | 88     | 32   | transform seed  |
/// | 120    | 4    | transform rounds|
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub flags: u32,
    pub version: u32,
    pub master_seed: [u8; 16],
    pub iv: [u8; 16],
    pub group_count: u32,
    pub entry_count: u32,
    pub content_hash: [u8; 32],
    pub transform_seed: [u8; 32],
    pub transform_rounds: u32,
}


fn truncated(_: std::io::Error) -> FormatError {
    FormatError::TruncatedInput
}


/// Parse and validate the fixed-size header at the start of `data`.
///
/// Only structural checks are done here; nothing is decrypted.
pub fn parse_header(data: &[u8]) -> Result<Header, FormatError> {
    if data.len() < KDB3_HEADER_SIZE {
        return Err(FormatError::TruncatedInput);
    }

    let mut rdr = Cursor::new(&data[..KDB3_HEADER_SIZE]);

    let sig1 = rdr.read_u32::<LittleEndian>().map_err(truncated)?;
    let sig2 = rdr.read_u32::<LittleEndian>().map_err(truncated)?;
    if sig1 != KDB3_SIGNATURE_1 || sig2 != KDB3_SIGNATURE_2 {
        return Err(FormatError::InvalidSignature(sig1, sig2));
    }

    let flags = rdr.read_u32::<LittleEndian>().map_err(truncated)?;
    let version = rdr.read_u32::<LittleEndian>().map_err(truncated)?;

    if (version & KDB3_VERSION_MASK) != (KDB3_VERSION & KDB3_VERSION_MASK) {
        return Err(FormatError::UnsupportedVersion(version));
    }

    // Only AES-256-CBC bodies. Twofish and RC4 exist in the wild.
    if flags & KDB3_FLAG_RIJNDAEL == 0 || flags & (KDB3_FLAG_ARCFOUR | KDB3_FLAG_TWOFISH) != 0 {
        return Err(FormatError::UnsupportedCipher(flags));
    }

    let mut header = Header {
        flags,
        version,
        master_seed: [0; 16],
        iv: [0; 16],
        group_count: 0,
        entry_count: 0,
        content_hash: [0; 32],
        transform_seed: [0; 32],
        transform_rounds: 0,
    };

    rdr.read_exact(&mut header.master_seed).map_err(truncated)?;
    rdr.read_exact(&mut header.iv).map_err(truncated)?;
    header.group_count = rdr.read_u32::<LittleEndian>().map_err(truncated)?;
    header.entry_count = rdr.read_u32::<LittleEndian>().map_err(truncated)?;
    rdr.read_exact(&mut header.content_hash).map_err(truncated)?;
    rdr.read_exact(&mut header.transform_seed).map_err(truncated)?;
    header.transform_rounds = rdr.read_u32::<LittleEndian>().map_err(truncated)?;

    debug!(
        version = header.version,
        groups = header.group_count,
        entries = header.entry_count,
        rounds = header.transform_rounds,
        "parsed kdb3 header"
    );

    Ok(header)
}
