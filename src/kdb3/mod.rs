//! KeePass 1.x (KDB3) database reader.
//!
//! Opening runs five stages in order, each consuming only the output of
//! the previous one plus header metadata:
//!
//! 1. [`parse_header`] validates the 124 byte plaintext header
//! 2. [`derive_key`] stretches the credential into the body key
//! 3. [`decrypt_body`] decrypts the body and checks its SHA-256
//! 4. [`parse_records`] splits the plaintext into group and entry records
//! 5. [`build_tree`] reassembles the group hierarchy
//!
//! Nothing is returned unless every stage succeeds.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

pub mod cipher;
pub mod error;
pub mod format;
pub mod key;
pub mod record;
pub mod time;
pub mod tree;

pub use crate::kdb3::cipher::decrypt_body;
pub use crate::kdb3::error::{Error, FormatError, RecordKind, Result};
pub use crate::kdb3::format::{parse_header, Header};
pub use crate::kdb3::key::{derive_key, CipherKey, Credential};
pub use crate::kdb3::record::{parse_records, EntryRecord, GroupRecord, RawField};
pub use crate::kdb3::time::Timestamp;
pub use crate::kdb3::tree::{build_tree, Attachment, Database, Entry, Group};

use crate::kdb3::cipher::AES_BLOCK_SIZE;
use crate::kdb3::format::KDB3_HEADER_SIZE;


/// Decode a complete database file held in memory.
pub fn import(data: &[u8], credential: &Credential) -> Result<Database> {
    let header = parse_header(data)?;

    // Cheap structural check before the expensive key transformation
    let body = &data[KDB3_HEADER_SIZE..];
    if body.is_empty() || body.len() % AES_BLOCK_SIZE != 0 {
        return Err(FormatError::TruncatedInput.into());
    }

    let plaintext = {
        let key = derive_key(credential, &header);
        decrypt_body(body, &key, &header)?
    };
    debug!(size = plaintext.len(), "decrypted body");

    let (groups, entries) = parse_records(&plaintext, header.group_count, header.entry_count)?;
    let db = build_tree(groups, entries)?;

    info!(groups = header.group_count, entries = header.entry_count, "opened database");

    Ok(db)
}


/// Options for opening a database, in the style of
/// [`std::fs::OpenOptions`].
///
/// ```no_run
/// use keepass::kdb3::OpenOptions;
///
/// let db = OpenOptions::new().password("abc123").open_path("test/example.kdb")?;
/// for group in db.groups() {
///     println!("{}", group.name());
/// }
/// # Ok::<(), keepass::kdb3::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    credential: Credential,
}

impl OpenOptions {
    /// Starts without a password.
    pub fn new() -> OpenOptions {
        OpenOptions::default()
    }

    pub fn password<P: AsRef<[u8]>>(&mut self, password: P) -> &mut OpenOptions {
        self.credential = Credential::password(password);
        self
    }

    pub fn credential(&mut self, credential: Credential) -> &mut OpenOptions {
        self.credential = credential;
        self
    }

    pub fn open_bytes(&self, data: &[u8]) -> Result<Database> {
        import(data, &self.credential)
    }

    /// Read `reader` to the end and decode what it returned.
    pub fn open_reader<R: Read>(&self, mut reader: R) -> Result<Database> {
        let mut data = zeroize::Zeroizing::new(Vec::new());
        reader.read_to_end(&mut data)?;
        self.open_bytes(&data)
    }

    pub fn open_path<P: AsRef<Path>>(&self, path: P) -> Result<Database> {
        debug!(path = %path.as_ref().display(), "opening database");
        self.open_reader(File::open(path)?)
    }
}


impl Database {
    /// Open the file at `path`. `None` opens without a password.
    pub fn open_path<P: AsRef<Path>>(path: P, password: Option<&str>) -> Result<Database> {
        OpenOptions::new().credential(password.into()).open_path(path)
    }

    /// Same as [`Database::open_path`] for an already open stream
    /// positioned at the start of the file.
    pub fn open_reader<R: Read>(reader: R, password: Option<&str>) -> Result<Database> {
        OpenOptions::new().credential(password.into()).open_reader(reader)
    }
}
