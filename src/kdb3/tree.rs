//
// Group hierarchy
//

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::kdb3::error::FormatError;
use crate::kdb3::record::{EntryRecord, GroupRecord};
use crate::kdb3::time::Timestamp;


// KeePass stores UI state in hidden entries with these values
const META_STREAM_TITLE: &str = "Meta-Info";
const META_STREAM_USERNAME: &str = "SYSTEM";


/// A string that is wiped from memory when dropped.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretString(***)")
    }
}


/// File attached to an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub data: Vec<u8>,
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    uuid: Uuid,
    group_id: u32,
    icon_id: u32,
    title: String,
    username: String,
    password: SecretString,
    url: String,
    notes: String,
    created: Timestamp,
    modified: Timestamp,
    accessed: Timestamp,
    expires: Timestamp,
    attachment: Option<Attachment>,
}

impl Entry {
    fn from_record(record: EntryRecord) -> Entry {
        let EntryRecord {
            uuid, group_id, image_id, title, url, username, password, comment,
            created, modified, accessed, expires, binary_desc, binary,
        } = record;

        let attachment = if binary_desc.is_empty() && binary.is_empty() {
            None
        } else {
            Some(Attachment { name: binary_desc, data: binary })
        };

        Entry {
            uuid: Uuid::from_bytes(uuid),
            group_id,
            icon_id: image_id,
            title,
            username,
            password,
            url,
            notes: comment,
            created,
            modified,
            accessed,
            expires,
            attachment,
        }
    }

    pub fn uuid(&self) -> Uuid { self.uuid }

    /// Id of the group this entry belongs to.
    pub fn group_id(&self) -> u32 { self.group_id }

    pub fn icon_id(&self) -> u32 { self.icon_id }

    pub fn title(&self) -> &str { &self.title }

    /// Same as [`Entry::title`].
    pub fn name(&self) -> &str { &self.title }

    pub fn username(&self) -> &str { &self.username }

    pub fn password(&self) -> &str { self.password.as_str() }

    pub fn url(&self) -> &str { &self.url }

    pub fn notes(&self) -> &str { &self.notes }

    pub fn created(&self) -> Timestamp { self.created }

    pub fn modified(&self) -> Timestamp { self.modified }

    pub fn accessed(&self) -> Timestamp { self.accessed }

    pub fn expires(&self) -> Timestamp { self.expires }

    pub fn attachment(&self) -> Option<&Attachment> { self.attachment.as_ref() }

    /// Hidden entry KeePass uses to persist application state.
    pub fn is_meta_stream(&self) -> bool {
        self.title == META_STREAM_TITLE && self.username == META_STREAM_USERNAME
    }

    /// Wipe the password from memory.
    pub fn clear_password(&mut self) {
        self.password.zeroize();
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: u32,
    name: String,
    icon_id: u32,
    flags: u32,
    level: u16,
    created: Timestamp,
    modified: Timestamp,
    accessed: Timestamp,
    expires: Timestamp,
    entries: Vec<Entry>,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl Group {
    fn from_record(record: GroupRecord) -> Group {
        Group {
            id: record.id,
            name: record.title,
            icon_id: record.image_id,
            flags: record.flags,
            level: record.level,
            created: record.created,
            modified: record.modified,
            accessed: record.accessed,
            expires: record.expires,
            entries: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 { self.id }

    pub fn name(&self) -> &str { &self.name }

    pub fn icon_id(&self) -> u32 { self.icon_id }

    pub fn flags(&self) -> u32 { self.flags }

    /// Depth in the tree, 0 for top-level groups.
    pub fn level(&self) -> u16 { self.level }

    pub fn created(&self) -> Timestamp { self.created }

    pub fn modified(&self) -> Timestamp { self.modified }

    pub fn accessed(&self) -> Timestamp { self.accessed }

    pub fn expires(&self) -> Timestamp { self.expires }

    /// Entries of this group in file order, meta-streams excluded.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter().filter(|e| !e.is_meta_stream())
    }
}


/// A decoded database. Only ever built from a complete, verified file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Database {
    // All groups in file order
    groups: Vec<Group>,
    top_level: Vec<usize>,
    by_id: HashMap<u32, usize>,
    // (group index, entry index) in file order
    entry_order: Vec<(usize, usize)>,
}

impl Database {
    /// Top-level groups in file order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> + '_ {
        self.top_level.iter().map(move |&i| &self.groups[i])
    }

    /// Every group, depth first in file order.
    pub fn all_groups(&self) -> impl Iterator<Item = &Group> + '_ {
        self.groups.iter()
    }

    pub fn group(&self, id: u32) -> Option<&Group> {
        self.by_id.get(&id).map(|&i| &self.groups[i])
    }

    /// Direct children of the group with `id`. Empty when this database
    /// has no such group.
    pub fn subgroups(&self, id: u32) -> impl Iterator<Item = &Group> + '_ {
        self.by_id
            .get(&id)
            .into_iter()
            .flat_map(move |&i| self.groups[i].children.iter().map(move |&c| &self.groups[c]))
    }

    /// Parent of the group with `id`, `None` for top-level or unknown ids.
    pub fn parent(&self, id: u32) -> Option<&Group> {
        let &index = self.by_id.get(&id)?;
        self.groups[index].parent.map(|i| &self.groups[i])
    }

    fn all_entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entry_order.iter().map(move |&(g, e)| &self.groups[g].entries[e])
    }

    /// All entries in file order, meta-streams excluded.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.all_entries().filter(|e| !e.is_meta_stream())
    }

    pub fn meta_streams(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.all_entries().filter(|e| e.is_meta_stream())
    }

    /// Wipe every entry password.
    pub fn clear_passwords(&mut self) {
        for group in &mut self.groups {
            for entry in &mut group.entries {
                entry.clear_password();
            }
        }
    }
}


/// Assemble the tree from records in file order.
///
/// Nesting follows each group's level: a group at level `n` is a child of
/// the closest preceding group at level `n - 1`.
pub fn build_tree(group_records: Vec<GroupRecord>,
                  entry_records: Vec<EntryRecord>) -> Result<Database, FormatError> {
    let mut db = Database::default();

    // ancestors[n] is the index of the current group at level n
    let mut ancestors: Vec<usize> = Vec::new();

    for record in group_records {
        let index = db.groups.len();
        let level = record.level;

        if db.by_id.insert(record.id, index).is_some() {
            return Err(FormatError::DuplicateGroupId(record.id));
        }

        if usize::from(level) > ancestors.len() {
            return Err(FormatError::LevelSkip {
                group_id: record.id,
                level,
                allowed: ancestors.len(),
            });
        }
        ancestors.truncate(usize::from(level));

        let mut group = Group::from_record(record);
        match ancestors.last() {
            Some(&parent) => {
                group.parent = Some(parent);
                db.groups[parent].children.push(index);
            }
            None => db.top_level.push(index),
        }

        db.groups.push(group);
        ancestors.push(index);
    }

    for record in entry_records {
        let index = match db.by_id.get(&record.group_id) {
            Some(&i) => i,
            None => {
                return Err(FormatError::OrphanedEntry {
                    uuid: Uuid::from_bytes(record.uuid),
                    group_id: record.group_id,
                })
            }
        };

        let group = &mut db.groups[index];
        db.entry_order.push((index, group.entries.len()));
        group.entries.push(Entry::from_record(record));
    }

    debug!(groups = db.groups.len(), top_level = db.top_level.len(), "built group tree");

    Ok(db)
}
