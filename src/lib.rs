//! Read-only access to KeePass 1.x (`.kdb`) password databases.
//!
//! ```no_run
//! let db = keepass::Database::open_path("passwords.kdb", Some("secret"))?;
//! for entry in db.entries() {
//!     println!("{} {}", entry.title(), entry.username());
//! }
//! # Ok::<(), keepass::Error>(())
//! ```

pub mod kdb3;

pub use kdb3::{Credential, Database, Entry, Error, FormatError, Group, OpenOptions, Timestamp};
