//
// Master key derivation
//

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use crate::kdb3::format::Header;


/// What the user unlocks the database with.
///
/// Key files would be mixed in as a second hash input before the final
/// seed step; they are not supported.
#[derive(Clone, Default)]
pub enum Credential {
    /// Open without a password. Hashes the empty byte string.
    #[default]
    Empty,
    Password(Zeroizing<Vec<u8>>),
}

impl Credential {
    pub fn password<P: AsRef<[u8]>>(password: P) -> Credential {
        Credential::Password(Zeroizing::new(password.as_ref().to_vec()))
    }

    fn as_bytes(&self) -> &[u8] {
        match self {
            Credential::Empty => &[],
            Credential::Password(p) => p.as_slice(),
        }
    }
}

impl<'a> From<Option<&'a str>> for Credential {
    fn from(password: Option<&'a str>) -> Credential {
        password.map_or(Credential::Empty, Credential::password)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Empty => f.write_str("Credential::Empty"),
            Credential::Password(_) => f.write_str("Credential::Password(***)"),
        }
    }
}


/// Final AES-256 body key. Wiped on drop.
pub struct CipherKey(Zeroizing<[u8; 32]>);

impl CipherKey {
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey(***)")
    }
}


// Compute the base master key from a passphrase.
//
// This is the first step in the key transformation phase.
pub fn transform_password(password: &[u8]) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(Sha256::digest(password).into())
}


// KDF algorithm as used by KDB3
//
// Multiple ECB rounds on both halves of the master key. Each round
// depends on the previous one.
pub fn kdf_ecb_rounds(master_key: &[u8; 32],
                      rounds_key: &[u8; 32],
                      rounds: u32) -> Zeroizing<[u8; 32]> {
    let aes = Aes256::new(GenericArray::from_slice(rounds_key));
    let mut out = Zeroizing::new(*master_key);

    {
        let (left, right) = out.split_at_mut(16);
        let left = GenericArray::from_mut_slice(left);
        let right = GenericArray::from_mut_slice(right);
        for _ in 0..rounds {
            aes.encrypt_block(left);
            aes.encrypt_block(right);
        }
    }

    out
}


// Bind the transformed key to this file
pub fn kdf_sha256_final(final_seed: &[u8; 16], transformed: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let mut sha = Sha256::new();
    sha.update(final_seed);
    sha.update(transformed);
    Zeroizing::new(sha.finalize().into())
}


/// Turn a credential into the body key using the seeds and round count
/// stored in `header`.
pub fn derive_key(credential: &Credential, header: &Header) -> CipherKey {
    debug!(rounds = header.transform_rounds, "transforming master key");

    let base = transform_password(credential.as_bytes());
    let rounds = kdf_ecb_rounds(&base, &header.transform_seed, header.transform_rounds);
    let transformed: Zeroizing<[u8; 32]> = Zeroizing::new(Sha256::digest(&rounds[..]).into());

    CipherKey(kdf_sha256_final(&header.master_seed, &transformed))
}
