//! Test-only writer for KDB3 files.
#![allow(dead_code)]

use std::sync::OnceLock;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};

use keepass::kdb3::format::*;
use keepass::kdb3::time::KDB3_TIME_NEVER;

pub const PASSWORD: &str = "abc123";
pub const WRONG_PASSWORD: &str = "123abc";

// Keep tests fast; real files use tens of thousands
pub const ROUNDS: u32 = 64;


pub fn pack_time(year: u32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> [u8; 5] {
    [
        (year >> 6) as u8,
        (((year & 0x3F) << 2) | (month >> 2)) as u8,
        (((month & 0x03) << 6) | (day << 1) | (hour >> 4)) as u8,
        (((hour & 0x0F) << 4) | (minute >> 2)) as u8,
        (((minute & 0x03) << 6) | second) as u8,
    ]
}


#[derive(Clone)]
pub struct GroupSpec {
    pub id: u32,
    pub title: String,
    pub level: u16,
}

#[derive(Clone)]
pub struct EntrySpec {
    pub uuid: [u8; 16],
    pub group_id: u32,
    pub title: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: String,
    pub attachment: Option<(String, Vec<u8>)>,
}

impl EntrySpec {
    pub fn new(uuid: u8, group_id: u32, title: &str, password: &str) -> EntrySpec {
        EntrySpec {
            uuid: [uuid; 16],
            group_id,
            title: title.to_string(),
            username: format!("user-{}", title.to_lowercase()),
            password: password.to_string(),
            url: format!("https://{}.example.com/", title.to_lowercase()),
            notes: String::new(),
            attachment: None,
        }
    }
}


#[derive(Clone)]
pub struct Fixture {
    pub groups: Vec<GroupSpec>,
    pub entries: Vec<EntrySpec>,
}

fn field(out: &mut Vec<u8>, field_type: u16, data: &[u8]) {
    out.extend_from_slice(&field_type.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
}

fn text(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

impl Fixture {
    /// Two top-level groups, `Test1` holding two entries and a
    /// meta-stream, `Test2` holding a subgroup.
    pub fn example() -> Fixture {
        let mut meta = EntrySpec::new(0xEE, 1, "Meta-Info", "");
        meta.username = "SYSTEM".to_string();
        meta.url = "$".to_string();
        meta.notes = "KPX_GROUP_TREE_STATE".to_string();
        meta.attachment = Some(("bin-stream".to_string(), vec![1, 0, 0, 0, 1]));

        let mut notes = EntrySpec::new(0xA3, 3, "Nested", "n3st3d");
        notes.notes = "line one\nline two".to_string();
        notes.attachment = Some(("readme.txt".to_string(), b"hello".to_vec()));

        Fixture {
            groups: vec![
                GroupSpec { id: 1, title: "Test1".to_string(), level: 0 },
                GroupSpec { id: 2, title: "Test2".to_string(), level: 0 },
                GroupSpec { id: 3, title: "Inner".to_string(), level: 1 },
            ],
            entries: vec![
                EntrySpec::new(0xA2, 1, "Test2", "abcde"),
                meta,
                EntrySpec::new(0xA1, 1, "Test1", "12345"),
                notes,
            ],
        }
    }

    pub fn plaintext(&self) -> Vec<u8> {
        let created = pack_time(2010, 3, 15, 13, 37, 42);
        let modified = pack_time(2011, 1, 2, 3, 4, 5);
        let accessed = pack_time(2012, 12, 31, 23, 59, 58);

        let mut out = Vec::new();
        for g in &self.groups {
            field(&mut out, KDB3_GROUP_ID, &g.id.to_le_bytes());
            field(&mut out, KDB3_GROUP_TITLE, &text(&g.title));
            field(&mut out, KDB3_GROUP_CREATED, &created);
            field(&mut out, KDB3_GROUP_MODIFIED, &modified);
            field(&mut out, KDB3_GROUP_ACCESSED, &accessed);
            field(&mut out, KDB3_GROUP_EXPIRES, &KDB3_TIME_NEVER);
            field(&mut out, KDB3_GROUP_IMAGE_ID, &48u32.to_le_bytes());
            field(&mut out, KDB3_GROUP_LEVEL, &g.level.to_le_bytes());
            field(&mut out, KDB3_GROUP_FLAGS, &0u32.to_le_bytes());
            field(&mut out, KDB3_FIELD_END, &[]);
        }
        for e in &self.entries {
            field(&mut out, KDB3_ENTRY_UUID, &e.uuid);
            field(&mut out, KDB3_ENTRY_GROUP_ID, &e.group_id.to_le_bytes());
            field(&mut out, KDB3_ENTRY_IMAGE_ID, &0u32.to_le_bytes());
            field(&mut out, KDB3_ENTRY_TITLE, &text(&e.title));
            field(&mut out, KDB3_ENTRY_URL, &text(&e.url));
            field(&mut out, KDB3_ENTRY_USERNAME, &text(&e.username));
            field(&mut out, KDB3_ENTRY_PASSWORD, &text(&e.password));
            field(&mut out, KDB3_ENTRY_COMMENT, &text(&e.notes));
            field(&mut out, KDB3_ENTRY_CREATED, &created);
            field(&mut out, KDB3_ENTRY_MODIFIED, &modified);
            field(&mut out, KDB3_ENTRY_ACCESSED, &accessed);
            field(&mut out, KDB3_ENTRY_EXPIRES, &KDB3_TIME_NEVER);
            match &e.attachment {
                Some((name, data)) => {
                    field(&mut out, KDB3_ENTRY_BINARY_DESC, &text(name));
                    field(&mut out, KDB3_ENTRY_BINARY, data);
                }
                None => {
                    field(&mut out, KDB3_ENTRY_BINARY_DESC, &[0]);
                    field(&mut out, KDB3_ENTRY_BINARY, &[]);
                }
            }
            field(&mut out, KDB3_FIELD_END, &[]);
        }
        out
    }

    pub fn build(&self, password: &str) -> Vec<u8> {
        seal(&self.plaintext(), self.groups.len() as u32, self.entries.len() as u32, password)
    }
}


/// Encrypt `plain` into a complete file with the given header counts.
pub fn seal(plain: &[u8], group_count: u32, entry_count: u32, password: &str) -> Vec<u8> {
    let master_seed = [0x5A; 16];
    let iv = [0xC3; 16];
    let transform_seed = [0x3C; 32];

    let key = final_key(password.as_bytes(), &master_seed, &transform_seed, ROUNDS);
    let content_hash: [u8; 32] = Sha256::digest(plain).into();

    let mut out = Vec::new();
    out.extend_from_slice(&KDB3_SIGNATURE_1.to_le_bytes());
    out.extend_from_slice(&KDB3_SIGNATURE_2.to_le_bytes());
    out.extend_from_slice(&(KDB3_FLAG_SHA2 | KDB3_FLAG_RIJNDAEL).to_le_bytes());
    out.extend_from_slice(&KDB3_VERSION.to_le_bytes());
    out.extend_from_slice(&master_seed);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&group_count.to_le_bytes());
    out.extend_from_slice(&entry_count.to_le_bytes());
    out.extend_from_slice(&content_hash);
    out.extend_from_slice(&transform_seed);
    out.extend_from_slice(&ROUNDS.to_le_bytes());
    assert_eq!(out.len(), KDB3_HEADER_SIZE);

    let enc = cbc::Encryptor::<Aes256>::new(GenericArray::from_slice(&key), GenericArray::from_slice(&iv));
    out.extend_from_slice(&enc.encrypt_padded_vec_mut::<Pkcs7>(plain));
    out
}


fn final_key(password: &[u8], master_seed: &[u8; 16], transform_seed: &[u8; 32], rounds: u32) -> [u8; 32] {
    let mut key: [u8; 32] = Sha256::digest(password).into();

    let aes = Aes256::new(GenericArray::from_slice(transform_seed));
    for _ in 0..rounds {
        for block in key.chunks_mut(16) {
            aes.encrypt_block(GenericArray::from_mut_slice(block));
        }
    }
    let transformed: [u8; 32] = Sha256::digest(key).into();

    let mut sha = Sha256::new();
    sha.update(master_seed);
    sha.update(transformed);
    sha.finalize().into()
}


/// The example database encrypted with [`PASSWORD`], built once.
pub fn example_kdb() -> &'static [u8] {
    static DATA: OnceLock<Vec<u8>> = OnceLock::new();
    DATA.get_or_init(|| Fixture::example().build(PASSWORD))
}
