//
// Body decryption
//

use aes::cipher::generic_array::GenericArray;
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use crate::kdb3::error::{Error, Result};
use crate::kdb3::format::Header;
use crate::kdb3::key::CipherKey;


type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const AES_BLOCK_SIZE: usize = 16;


/// Decrypt the body that follows the header and verify it against the
/// content hash stored in `header`.
///
/// Bad padding and a hash mismatch both come back as
/// [`Error::DecryptDataFail`], so a caller cannot tell a wrong password
/// from a damaged file.
pub fn decrypt_body(body: &[u8], key: &CipherKey, header: &Header) -> Result<Zeroizing<Vec<u8>>> {
    let mut data = Zeroizing::new(body.to_vec());

    let dec = Aes256CbcDec::new(GenericArray::from_slice(key.as_bytes()),
                                GenericArray::from_slice(&header.iv));

    // Fails on a length that is not a block multiple as well as on
    // padding that does not describe itself (0 or > 16, mismatched bytes)
    let size = match dec.decrypt_padded_mut::<Pkcs7>(&mut data[..]) {
        Ok(plain) => plain.len(),
        Err(_) => {
            debug!("body padding rejected");
            return Err(Error::DecryptDataFail);
        }
    };
    data.truncate(size);

    let check: [u8; 32] = Sha256::digest(&data[..]).into();
    if !bool::from(check[..].ct_eq(&header.content_hash[..])) {
        debug!("body hash mismatch");
        return Err(Error::DecryptDataFail);
    }

    Ok(data)
}
