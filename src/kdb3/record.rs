//
// Group and entry records
//

use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use crate::kdb3::error::{FormatError, RecordKind};
use crate::kdb3::format::*;
use crate::kdb3::time::{self, Timestamp};
use crate::kdb3::tree::SecretString;


// type + size
const FIELD_HEADER_SIZE: usize = 6;


/// One (type, payload) field from the decrypted body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    pub field_type: u16,
    pub data: &'a [u8],
}

impl<'a> RawField<'a> {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }
}


/// Splits the decrypted body into fields.
pub struct FieldReader<'a> {
    rdr: Cursor<&'a [u8]>,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> FieldReader<'a> {
        FieldReader { rdr: Cursor::new(data) }
    }

    pub fn remaining(&self) -> usize {
        self.rdr.get_ref().len().saturating_sub(self.rdr.position() as usize)
    }

    pub fn next_field(&mut self) -> Result<RawField<'a>, FormatError> {
        let field_type = self.rdr.read_u16::<LittleEndian>().map_err(|_| FormatError::TruncatedInput)?;
        let field_size = self.rdr.read_u32::<LittleEndian>().map_err(|_| FormatError::TruncatedInput)?;

        let buf: &'a [u8] = *self.rdr.get_ref();
        let start = self.rdr.position() as usize;
        let end = start
            .checked_add(field_size as usize)
            .filter(|&end| end <= buf.len())
            .ok_or(FormatError::TruncatedInput)?;

        self.rdr.set_position(end as u64);

        Ok(RawField { field_type, data: &buf[start..end] })
    }

    // Collect fields up to and excluding the end marker
    fn read_record(&mut self, kind: RecordKind) -> Result<Vec<RawField<'a>>, FormatError> {
        let mut fields = Vec::new();
        loop {
            let field = self.next_field()?;
            if field.field_type == KDB3_FIELD_END {
                if !field.data.is_empty() {
                    return Err(FormatError::InvalidFieldSize {
                        record: kind,
                        field_type: field.field_type,
                        size: field.size(),
                    });
                }
                return Ok(fields);
            }
            fields.push(field);
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub id: u32,
    pub title: String,
    pub image_id: u32,
    pub level: u16,
    pub flags: u32,
    pub created: Timestamp,
    pub modified: Timestamp,
    pub accessed: Timestamp,
    pub expires: Timestamp,
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub uuid: [u8; 16],
    pub group_id: u32,
    pub image_id: u32,
    pub title: String,
    pub url: String,
    pub username: String,
    pub password: SecretString,
    pub comment: String,
    pub created: Timestamp,
    pub modified: Timestamp,
    pub accessed: Timestamp,
    pub expires: Timestamp,
    pub binary_desc: String,
    pub binary: Vec<u8>,
}


//
// Field payload decoding
//

fn fixed<const N: usize>(field: &RawField, kind: RecordKind) -> Result<[u8; N], FormatError> {
    field.data.try_into().map_err(|_| FormatError::InvalidFieldSize {
        record: kind,
        field_type: field.field_type,
        size: field.size(),
    })
}

fn read_u32(field: &RawField, kind: RecordKind) -> Result<u32, FormatError> {
    fixed::<4>(field, kind).map(u32::from_le_bytes)
}

fn read_u16(field: &RawField, kind: RecordKind) -> Result<u16, FormatError> {
    fixed::<2>(field, kind).map(u16::from_le_bytes)
}

// KeePass writes group flags as a DWORD. The 2-byte form is accepted too.
fn read_flags(field: &RawField, kind: RecordKind) -> Result<u32, FormatError> {
    match field.data.len() {
        2 => Ok(u32::from(LittleEndian::read_u16(field.data))),
        _ => read_u32(field, kind),
    }
}

fn read_time(field: &RawField, kind: RecordKind) -> Result<Timestamp, FormatError> {
    time::unpack(&fixed::<5>(field, kind)?)
}

// Nul terminated UTF-8. Anything after the first nul is ignored.
fn read_str(field: &RawField, kind: RecordKind) -> Result<String, FormatError> {
    let end = field.data.iter().position(|&b| b == 0).unwrap_or(field.data.len());
    std::str::from_utf8(&field.data[..end])
        .map(str::to_owned)
        .map_err(|_| FormatError::InvalidString { record: kind, field_type: field.field_type })
}

fn unhandled(kind: RecordKind, field: &RawField) {
    warn!(record = %kind, field_type = field.field_type, size = field.data.len(), "unhandled field");
}


// Parse a single group definition
fn parse_group(index: usize, fields: &[RawField]) -> Result<GroupRecord, FormatError> {
    const KIND: RecordKind = RecordKind::Group;

    let mut id = None;
    let mut group = GroupRecord {
        id: 0,
        title: String::new(),
        image_id: 0,
        level: 0,
        flags: 0,
        created: Timestamp::Never,
        modified: Timestamp::Never,
        accessed: Timestamp::Never,
        expires: Timestamp::Never,
    };

    for field in fields {
        match field.field_type {
        KDB3_GROUP_ID       => id              = Some(read_u32(field, KIND)?),
        KDB3_GROUP_TITLE    => group.title     = read_str(field, KIND)?,
        KDB3_GROUP_CREATED  => group.created   = read_time(field, KIND)?,
        KDB3_GROUP_MODIFIED => group.modified  = read_time(field, KIND)?,
        KDB3_GROUP_ACCESSED => group.accessed  = read_time(field, KIND)?,
        KDB3_GROUP_EXPIRES  => group.expires   = read_time(field, KIND)?,
        KDB3_GROUP_IMAGE_ID => group.image_id  = read_u32(field, KIND)?,
        KDB3_GROUP_LEVEL    => group.level     = read_u16(field, KIND)?,
        KDB3_GROUP_FLAGS    => group.flags     = read_flags(field, KIND)?,
        KDB3_FIELD_EXT_DATA => {},
        _ => unhandled(KIND, field),
        }
    }

    group.id = id.ok_or(FormatError::MissingField { record: KIND, index, field: "id" })?;
    Ok(group)
}


// Parse a single entry
fn parse_entry(index: usize, fields: &[RawField]) -> Result<EntryRecord, FormatError> {
    const KIND: RecordKind = RecordKind::Entry;

    let mut uuid = None;
    let mut group_id = None;
    let mut entry = EntryRecord {
        uuid: [0; 16],
        group_id: 0,
        image_id: 0,
        title: String::new(),
        url: String::new(),
        username: String::new(),
        password: SecretString::default(),
        comment: String::new(),
        created: Timestamp::Never,
        modified: Timestamp::Never,
        accessed: Timestamp::Never,
        expires: Timestamp::Never,
        binary_desc: String::new(),
        binary: Vec::new(),
    };

    for field in fields {
        match field.field_type {
        KDB3_ENTRY_UUID        => uuid              = Some(fixed::<16>(field, KIND)?),
        KDB3_ENTRY_GROUP_ID    => group_id          = Some(read_u32(field, KIND)?),
        KDB3_ENTRY_IMAGE_ID    => entry.image_id    = read_u32(field, KIND)?,
        KDB3_ENTRY_TITLE       => entry.title       = read_str(field, KIND)?,
        KDB3_ENTRY_URL         => entry.url         = read_str(field, KIND)?,
        KDB3_ENTRY_USERNAME    => entry.username    = read_str(field, KIND)?,
        KDB3_ENTRY_PASSWORD    => entry.password    = SecretString::new(read_str(field, KIND)?),
        KDB3_ENTRY_COMMENT     => entry.comment     = read_str(field, KIND)?,
        KDB3_ENTRY_CREATED     => entry.created     = read_time(field, KIND)?,
        KDB3_ENTRY_MODIFIED    => entry.modified    = read_time(field, KIND)?,
        KDB3_ENTRY_ACCESSED    => entry.accessed    = read_time(field, KIND)?,
        KDB3_ENTRY_EXPIRES     => entry.expires     = read_time(field, KIND)?,
        KDB3_ENTRY_BINARY_DESC => entry.binary_desc = read_str(field, KIND)?,
        KDB3_ENTRY_BINARY      => entry.binary      = field.data.to_vec(),
        KDB3_FIELD_EXT_DATA => {},
        _ => unhandled(KIND, field),
        }
    }

    entry.uuid = uuid.ok_or(FormatError::MissingField { record: KIND, index, field: "uuid" })?;
    entry.group_id = group_id.ok_or(FormatError::MissingField { record: KIND, index, field: "group id" })?;
    Ok(entry)
}


/// Decode `group_count` group records followed by `entry_count` entry
/// records. The body must end exactly after the last entry.
pub fn parse_records(plaintext: &[u8],
                     group_count: u32,
                     entry_count: u32) -> Result<(Vec<GroupRecord>, Vec<EntryRecord>), FormatError> {
    let mut rdr = FieldReader::new(plaintext);

    // Counts come from the file, don't trust them for allocation
    let bound = plaintext.len() / FIELD_HEADER_SIZE;

    let mut groups = Vec::with_capacity((group_count as usize).min(bound));
    for index in 0..group_count as usize {
        let fields = rdr.read_record(RecordKind::Group)?;
        groups.push(parse_group(index, &fields)?);
    }

    let mut entries = Vec::with_capacity((entry_count as usize).min(bound));
    for index in 0..entry_count as usize {
        let fields = rdr.read_record(RecordKind::Entry)?;
        entries.push(parse_entry(index, &fields)?);
    }

    let trailing = rdr.remaining();
    if trailing != 0 {
        return Err(FormatError::TrailingData(trailing));
    }

    debug!(groups = groups.len(), entries = entries.len(), "parsed records");

    Ok((groups, entries))
}
