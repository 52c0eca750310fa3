//! The legacy primitives NTLM is built on: MD4, MD5, HMAC-MD5, DES and RC4.
//!
//! These are required for interoperability and are not suitable for anything else. Nothing
//! outside this module touches the primitive crates directly.


use cipher::{BlockEncrypt, KeyInit, StreamCipher};
use cipher::generic_array::GenericArray;
use des::Des;
use digest::Digest;
use hmac::{Hmac, Mac};
use md4::Md4;
use md5::Md5;
use rc4::Rc4;
use rc4::consts::U16;

use crate::error::{Error, Result};


/// Output length of MD4, MD5 and HMAC-MD5.
pub const HASH_SIZE: usize = 16;


/// Computes the MD4 digest of the concatenation of `parts`.
pub fn md4(parts: &[&[u8]]) -> [u8; HASH_SIZE] {
    let mut md4_state = <Md4 as Digest>::new();
    for part in parts {
        md4_state.update(part);
    }
    md4_state.finalize().into()
}

/// Computes the MD5 digest of the concatenation of `parts`.
pub fn md5(parts: &[&[u8]]) -> [u8; HASH_SIZE] {
    let mut md5_state = <Md5 as Digest>::new();
    for part in parts {
        md5_state.update(part);
    }
    md5_state.finalize().into()
}

/// Computes HMAC-MD5 over the concatenation of `parts`.
pub fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Result<[u8; HASH_SIZE]> {
    let mut hmac_state = <Hmac<Md5> as Mac>::new_from_slice(key)
        .map_err(|e| Error::crypto(format!("failed to key HMAC-MD5: {}", e)))?;
    for part in parts {
        hmac_state.update(part);
    }
    Ok(hmac_state.finalize().into_bytes().into())
}


/// Spreads 56 key bits over 8 bytes, leaving the lowest (parity) bit of each byte clear.
fn expand_des_key(key7: &[u8; 7]) -> [u8; 8] {
    [
        key7[0] & 0xFE,
        (key7[0] << 7) | ((key7[1] >> 1) & 0xFE),
        (key7[1] << 6) | ((key7[2] >> 2) & 0xFE),
        (key7[2] << 5) | ((key7[3] >> 3) & 0xFE),
        (key7[3] << 4) | ((key7[4] >> 4) & 0xFE),
        (key7[4] << 3) | ((key7[5] >> 5) & 0xFE),
        (key7[5] << 2) | ((key7[6] >> 6) & 0xFE),
        key7[6] << 1,
    ]
}

/// Encrypts a single block with DES, using a 7-byte key.
pub fn des_encrypt_block(key: &[u8], block: [u8; 8]) -> Result<[u8; 8]> {
    let key7: &[u8; 7] = key.try_into()
        .map_err(|_| Error::crypto(format!("DES key must be 7 bytes, got {}", key.len())))?;
    let des = Des::new_from_slice(&expand_des_key(key7))
        .map_err(|e| Error::crypto(format!("failed to key DES: {}", e)))?;
    let mut buf = GenericArray::from(block);
    des.encrypt_block(&mut buf);
    Ok(buf.into())
}

/// Performs the DESL operation of NTLMv1: the 16-byte key is padded to 21 bytes, split into three
/// 7-byte DES keys, and each of them encrypts `data`.
pub fn des_long(key: &[u8; 16], data: [u8; 8]) -> Result<[u8; 24]> {
    let mut padded = [0u8; 21];
    padded[..16].copy_from_slice(key);

    let mut ret = [0u8; 24];
    for (key_part, out) in padded.chunks_exact(7).zip(ret.chunks_exact_mut(8)) {
        out.copy_from_slice(&des_encrypt_block(key_part, data)?);
    }
    Ok(ret)
}


/// A keyed RC4 stream.
///
/// The keystream position advances with every call, so one instance must be used for exactly one
/// direction of one session.
pub struct Rc4Stream {
    inner: Rc4<U16>,
}
impl Rc4Stream {
    /// Keys the stream. NTLM only ever keys RC4 with 16-byte values.
    pub fn new(key: &[u8]) -> Result<Self> {
        let inner = <Rc4<U16> as KeyInit>::new_from_slice(key)
            .map_err(|_| Error::crypto(format!("RC4 key must be {} bytes, got {}", HASH_SIZE, key.len())))?;
        Ok(Self { inner })
    }

    /// Encrypts (or, equivalently, decrypts) `data` in place.
    pub fn apply(&mut self, data: &mut [u8]) {
        self.inner.apply_keystream(data);
    }

    /// Encrypts a copy of `data`.
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.apply(&mut out);
        out
    }
}
impl std::fmt::Debug for Rc4Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never reveal keystream state
        f.debug_struct("Rc4Stream").finish_non_exhaustive()
    }
}

/// Encrypts `data` with a freshly keyed RC4 stream.
pub fn rc4_oneshot(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    Ok(Rc4Stream::new(key)?.process(data))
}


#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn md4_of_empty_string() {
        assert_eq!(md4(&[]), hex!("31d6cfe0d16ae931b73c59d7e0c089c0"));
    }

    #[test]
    fn md5_of_parts_equals_md5_of_concatenation() {
        assert_eq!(md5(&[b"abc"]), hex!("900150983cd24fb0d6963f7d28e17f72"));
        assert_eq!(md5(&[b"a", b"", b"bc"]), md5(&[b"abc"]));
    }

    #[test]
    fn hmac_md5_rfc2202() {
        let key = [0x0b; 16];
        assert_eq!(hmac_md5(&key, &[b"Hi There"]).unwrap(), hex!("9294727a3638bb1c13f48ef8158bfc9d"));
    }

    #[test]
    fn rc4_is_its_own_inverse() {
        let key = [0x55; 16];
        let ciphertext = rc4_oneshot(&key, b"plaintext").unwrap();
        assert_ne!(ciphertext.as_slice(), b"plaintext");
        assert_eq!(rc4_oneshot(&key, &ciphertext).unwrap().as_slice(), b"plaintext");
    }

    #[test]
    fn rc4_stream_keeps_position() {
        let key = [0x01; 16];
        let mut stream = Rc4Stream::new(&key).unwrap();
        let first = stream.process(&[0; 4]);
        let second = stream.process(&[0; 4]);
        assert_eq!([first, second].concat(), rc4_oneshot(&key, &[0; 8]).unwrap());
    }

    #[test]
    fn rc4_rejects_short_keys() {
        assert!(matches!(Rc4Stream::new(&[0; 5]), Err(Error::CryptoFailure { .. })));
    }

    #[test]
    fn des_key_length_is_checked() {
        assert!(des_encrypt_block(&[0; 8], [0; 8]).is_err());
    }
}
