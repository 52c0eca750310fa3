//! Key derivation: password hashes, challenge responses and the session key hierarchy.
//!
//! The derivation chain is
//!
//! ```plain
//! password ─► NT hash ─► (NTLMv2 hash) ─► session base key ─► key exchange key
//!                                                                   │
//!              random session key (if KEY_EXCH) ─► exported session key
//!                                                                   │
//!                                   ┌──────────────┬────────────────┼───────────────┐
//!                            client sign key  server sign key  client seal key  server seal key
//! ```
//!
//! Every step only runs once all of its inputs exist; lengths are fixed by the types.


use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Flags;
use crate::crypto::{HASH_SIZE, des_encrypt_block, des_long, hmac_md5, md4, md5, rc4_oneshot};
use crate::error::Result;
use crate::messages::utf16_le_bytes;

#[cfg(windows)]
use crate::oem_windows::encode_oem;

#[cfg(not(windows))]
use crate::oem_utf8::encode_oem;


/// A 16-byte NTLM key.
pub type Key = [u8; HASH_SIZE];

/// Length of the server and client challenges.
pub const CHALLENGE_SIZE: usize = 8;

const CLIENT_SIGNING_MAGIC: &[u8] = b"session key to client-to-server signing key magic constant\0";
const SERVER_SIGNING_MAGIC: &[u8] = b"session key to server-to-client signing key magic constant\0";
const CLIENT_SEALING_MAGIC: &[u8] = b"session key to client-to-server sealing key magic constant\0";
const SERVER_SEALING_MAGIC: &[u8] = b"session key to server-to-client sealing key magic constant\0";


/// An NT hash (NTOWFv1 of a password), usable in place of the password.
#[derive(Clone, Copy, Eq, PartialEq, Zeroize)]
pub struct NtlmHash(Key);
impl NtlmHash {
    pub fn from_bytes(hash: Key) -> Self {
        Self(hash)
    }

    /// Hashes a password.
    pub fn from_password(password: &str) -> Self {
        Self(nt_hash_v1(password))
    }

    pub fn as_bytes(&self) -> &Key {
        &self.0
    }
}
impl fmt::Debug for NtlmHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NtlmHash(..)")
    }
}

/// An error parsing an [`NtlmHash`] from its hex representation.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum NtlmHashError {
    /// The string is not 32 characters long.
    StringLength { obtained: usize },

    /// The string contains a character that is not a hex digit.
    InvalidHexDigit,

    /// The byte slice is not 16 bytes long.
    ByteLength { obtained: usize },
}
impl fmt::Display for NtlmHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StringLength { obtained }
                => write!(f, "NT hash must be 32 hex digits long, got {}", obtained),
            Self::InvalidHexDigit
                => write!(f, "NT hash contains a character that is not a hex digit"),
            Self::ByteLength { obtained }
                => write!(f, "NT hash must be {} bytes long, got {}", HASH_SIZE, obtained),
        }
    }
}
impl std::error::Error for NtlmHashError {
}
impl FromStr for NtlmHash {
    type Err = NtlmHashError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.len() != 2 * HASH_SIZE {
            return Err(NtlmHashError::StringLength { obtained: s.len() });
        }
        if !s.is_ascii() {
            return Err(NtlmHashError::InvalidHexDigit);
        }

        let mut hash = [0u8; HASH_SIZE];
        for (i, b) in hash.iter_mut().enumerate() {
            *b = u8::from_str_radix(&s[2 * i..2 * i + 2], 16)
                .or(Err(NtlmHashError::InvalidHexDigit))?;
        }
        Ok(Self(hash))
    }
}
impl TryFrom<&str> for NtlmHash {
    type Error = NtlmHashError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}
impl TryFrom<&[u8]> for NtlmHash {
    type Error = NtlmHashError;

    fn try_from(value: &[u8]) -> std::result::Result<Self, Self::Error> {
        let hash: Key = value.try_into()
            .or(Err(NtlmHashError::ByteLength { obtained: value.len() }))?;
        Ok(Self(hash))
    }
}


/// One of the two directions of the per-message security layer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}
impl Direction {
    fn signing_magic(self) -> &'static [u8] {
        match self {
            Self::ClientToServer => CLIENT_SIGNING_MAGIC,
            Self::ServerToClient => SERVER_SIGNING_MAGIC,
        }
    }

    fn sealing_magic(self) -> &'static [u8] {
        match self {
            Self::ClientToServer => CLIENT_SEALING_MAGIC,
            Self::ServerToClient => SERVER_SEALING_MAGIC,
        }
    }
}


/// Obtains the current time as a Windows FILETIME (100 ns intervals since 1601-01-01 UTC).
pub fn get_ntlm_time() -> u64 {
    let Some(windows_epoch) = NaiveDate::from_ymd_opt(1601, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
    else {
        return 0;
    };
    let delta = Utc::now() - windows_epoch;
    // tenths of a microsecond; microseconds cannot overflow for the next 290 000 years
    delta.num_microseconds()
        .and_then(|us| u64::try_from(us).ok())
        .map(|us| us * 10)
        .unwrap_or(0)
}

/// Generates a random 8-byte client challenge.
pub fn generate_client_challenge() -> [u8; CHALLENGE_SIZE] {
    let mut client_challenge = [0u8; CHALLENGE_SIZE];
    OsRng.fill(&mut client_challenge);
    client_challenge
}

/// Generates a random 16-byte session key for key exchange.
pub fn generate_random_session_key() -> Key {
    let mut key = [0u8; HASH_SIZE];
    OsRng.fill(&mut key);
    key
}


/// Derives the NT hash (NTOWFv1): MD4 over the UTF-16LE password.
pub fn nt_hash_v1(password: &str) -> Key {
    let mut password_bytes = utf16_le_bytes(password);
    let hash = md4(&[&password_bytes]);
    password_bytes.zeroize();
    hash
}

/// Derives the LAN Manager hash (LMOWFv1).
///
/// The uppercased password is encoded in the OEM code page, truncated or zero-padded to 14 bytes,
/// and each 7-byte half is used as a DES key to encrypt `"KGS!@#$%"`. Returns `None` if the
/// password cannot be represented in the OEM code page.
pub fn lm_hash_v1(password: &str) -> Result<Option<Key>> {
    let Some(mut password_bytes) = encode_oem(&password.to_uppercase()) else {
        return Ok(None);
    };
    password_bytes.resize(14, 0x00);

    let mut output = [0u8; HASH_SIZE];
    output[0..8].copy_from_slice(&des_encrypt_block(&password_bytes[0..7], *b"KGS!@#$%")?);
    output[8..16].copy_from_slice(&des_encrypt_block(&password_bytes[7..14], *b"KGS!@#$%")?);
    password_bytes.zeroize();

    Ok(Some(output))
}

/// Derives the NTLMv2 hash (NTOWFv2): HMAC-MD5 keyed with the NT hash over the uppercased user name
/// followed by the domain name as given, both UTF-16LE.
pub fn nt_hash_v2(nt_hash: &NtlmHash, username: &str, domain: &str) -> Result<Key> {
    let upper_user_bytes = utf16_le_bytes(&username.to_uppercase());
    let dom_bytes = utf16_le_bytes(domain);
    hmac_md5(nt_hash.as_bytes(), &[&upper_user_bytes, &dom_bytes])
}


/// The result of answering a server challenge.
#[derive(Clone, Debug, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct ChallengeResponse {
    /// The LAN Manager response.
    pub lm_response: Vec<u8>,

    /// The NT response; for NTLMv2 this is `NTProofStr ‖ temp`.
    pub nt_response: Vec<u8>,

    /// The session base key derived alongside the responses.
    pub session_base_key: Key,
}

/// Assembles the NTLMv2 client blob ("temp"): response versions, timestamp, client challenge and
/// the AV pairs (which must already contain their terminator), followed by four zero bytes.
pub fn ntlm_v2_client_blob(timestamp: u64, client_challenge: &[u8; CHALLENGE_SIZE], av_pairs: &[u8]) -> Vec<u8> {
    let mut temp = Vec::with_capacity(28 + av_pairs.len() + 4);
    temp.push(0x01); // RespType
    temp.push(0x01); // HiRespType
    temp.extend_from_slice(&[0x00; 6]); // Reserved1, Reserved2
    temp.extend_from_slice(&timestamp.to_le_bytes());
    temp.extend_from_slice(client_challenge);
    temp.extend_from_slice(&[0x00; 4]); // Reserved3
    temp.extend_from_slice(av_pairs);
    temp.extend_from_slice(&[0x00; 4]);
    temp
}

/// Calculates the NTLMv2 and LMv2 responses to a server challenge.
///
/// `temp` is the client blob from [`ntlm_v2_client_blob`]. When `zero_lm_response` is set (the
/// server sent a timestamp), the LM response is 24 zero bytes instead of LMv2.
pub fn respond_challenge_ntlm_v2(
    v2_hash: &Key,
    server_challenge: &[u8; CHALLENGE_SIZE],
    client_challenge: &[u8; CHALLENGE_SIZE],
    temp: &[u8],
    zero_lm_response: bool,
) -> Result<ChallengeResponse> {
    let nt_proof_str = hmac_md5(v2_hash, &[server_challenge, temp])?;

    let mut nt_response = Vec::with_capacity(HASH_SIZE + temp.len());
    nt_response.extend_from_slice(&nt_proof_str);
    nt_response.extend_from_slice(temp);

    let lm_response = if zero_lm_response {
        vec![0u8; HASH_SIZE + CHALLENGE_SIZE]
    } else {
        let mut lm = Vec::with_capacity(HASH_SIZE + CHALLENGE_SIZE);
        lm.extend_from_slice(&hmac_md5(v2_hash, &[server_challenge, client_challenge])?);
        lm.extend_from_slice(client_challenge);
        lm
    };

    let session_base_key = hmac_md5(v2_hash, &[&nt_proof_str])?;

    Ok(ChallengeResponse {
        lm_response,
        nt_response,
        session_base_key,
    })
}

/// Calculates the NTLMv1 response to a server challenge.
///
/// The LM response is derived from the LM hash if available; otherwise the NT response is
/// repeated in its place.
pub fn respond_challenge_ntlm_v1(
    nt_hash: &NtlmHash,
    lm_hash: Option<&Key>,
    server_challenge: &[u8; CHALLENGE_SIZE],
) -> Result<ChallengeResponse> {
    let nt_response = Vec::from(des_long(nt_hash.as_bytes(), *server_challenge)?);
    let lm_response = match lm_hash {
        Some(lm_hash) => Vec::from(des_long(lm_hash, *server_challenge)?),
        None => nt_response.clone(),
    };

    Ok(ChallengeResponse {
        lm_response,
        nt_response,
        session_base_key: md4(&[nt_hash.as_bytes()]),
    })
}

/// Calculates the NTLMv1 response with extended session security.
///
/// The NT response encrypts the first half of `MD5(server challenge ‖ client challenge)`; the LM
/// response carries the client challenge padded with zeroes.
pub fn respond_challenge_ntlm_v1_extended(
    nt_hash: &NtlmHash,
    server_challenge: &[u8; CHALLENGE_SIZE],
    client_challenge: &[u8; CHALLENGE_SIZE],
) -> Result<ChallengeResponse> {
    let digest = md5(&[server_challenge, client_challenge]);
    let mut desl_plaintext = [0u8; 8];
    desl_plaintext.copy_from_slice(&digest[0..8]);

    let nt_response = Vec::from(des_long(nt_hash.as_bytes(), desl_plaintext)?);
    let mut lm_response = Vec::with_capacity(24);
    lm_response.extend_from_slice(client_challenge);
    lm_response.resize(24, 0x00);

    Ok(ChallengeResponse {
        lm_response,
        nt_response,
        session_base_key: md4(&[nt_hash.as_bytes()]),
    })
}


/// Derives the key exchange key for NTLMv1.
///
/// For NTLMv2 the key exchange key is the session base key itself.
pub fn key_exchange_key_v1(
    flags: Flags,
    session_base_key: &Key,
    lm_hash: Option<&Key>,
    server_challenge: &[u8; CHALLENGE_SIZE],
    lm_response: &[u8],
) -> Result<Key> {
    if flags.contains(Flags::NEGOTIATE_EXTENDED_SESSIONSECURITY) {
        let lm_challenge = lm_response.get(0..8)
            .ok_or_else(|| crate::Error::crypto("LM response shorter than 8 bytes"))?;
        return hmac_md5(session_base_key, &[server_challenge, lm_challenge]);
    }

    let lm_key_requested = flags.contains(Flags::NEGOTIATE_LANMAN_KEY);
    let non_nt_requested = flags.contains(Flags::REQUEST_NON_NT_SESSION_KEY);
    if !lm_key_requested && !non_nt_requested {
        return Ok(*session_base_key);
    }

    let lm_hash = lm_hash
        .ok_or_else(|| crate::Error::crypto("LM session key requested but no LM hash is available"))?;

    if lm_key_requested {
        let mut block = [0u8; 8];
        block.copy_from_slice(lm_response.get(0..8)
            .ok_or_else(|| crate::Error::crypto("LM response shorter than 8 bytes"))?);

        let mut second_key = [0xBDu8; 7];
        second_key[0] = lm_hash[7];

        let mut kek = [0u8; HASH_SIZE];
        kek[0..8].copy_from_slice(&des_encrypt_block(&lm_hash[0..7], block)?);
        kek[8..16].copy_from_slice(&des_encrypt_block(&second_key, block)?);
        Ok(kek)
    } else {
        let mut kek = [0u8; HASH_SIZE];
        kek[0..8].copy_from_slice(&lm_hash[0..8]);
        Ok(kek)
    }
}

/// Determines the exported session key.
///
/// With key exchange, `random_session_key` becomes the exported session key and is returned along
/// with its RC4 encryption under the key exchange key; otherwise the key exchange key is exported
/// and nothing is sent.
pub fn exported_session_key(flags: Flags, key_exchange_key: &Key, random_session_key: &Key) -> Result<(Key, Vec<u8>)> {
    if flags.contains(Flags::NEGOTIATE_KEY_EXCHANGE) {
        let encrypted = rc4_oneshot(key_exchange_key, random_session_key)?;
        Ok((*random_session_key, encrypted))
    } else {
        Ok((*key_exchange_key, Vec::new()))
    }
}

/// Derives the signing key for one direction.
pub fn signing_key(exported_session_key: &Key, direction: Direction) -> Key {
    md5(&[exported_session_key, direction.signing_magic()])
}

/// Derives the sealing key for one direction.
///
/// Weaker negotiated key strengths shorten the part of the exported session key that enters the
/// hash: 16 bytes for 128-bit, 7 bytes for 56-bit, 5 bytes otherwise.
pub fn sealing_key(flags: Flags, exported_session_key: &Key, direction: Direction) -> Key {
    let key_len = if flags.contains(Flags::NEGOTIATE_128BIT) {
        16
    } else if flags.contains(Flags::NEGOTIATE_56BIT) {
        7
    } else {
        5
    };
    md5(&[&exported_session_key[..key_len], direction.sealing_magic()])
}


/// The complete key set of an established session. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    pub nt_hash: Key,
    pub session_base_key: Key,
    pub key_exchange_key: Key,
    pub exported_session_key: Key,
    pub client_signing_key: Key,
    pub server_signing_key: Key,
    pub client_sealing_key: Key,
    pub server_sealing_key: Key,
}
impl KeyMaterial {
    /// Derives the signing and sealing keys once the exported session key is known.
    pub fn derive(
        flags: Flags,
        nt_hash: Key,
        session_base_key: Key,
        key_exchange_key: Key,
        exported_session_key: Key,
    ) -> Self {
        Self {
            nt_hash,
            session_base_key,
            key_exchange_key,
            exported_session_key,
            client_signing_key: signing_key(&exported_session_key, Direction::ClientToServer),
            server_signing_key: signing_key(&exported_session_key, Direction::ServerToClient),
            client_sealing_key: sealing_key(flags, &exported_session_key, Direction::ClientToServer),
            server_sealing_key: sealing_key(flags, &exported_session_key, Direction::ServerToClient),
        }
    }

    pub fn signing_key(&self, direction: Direction) -> &Key {
        match direction {
            Direction::ClientToServer => &self.client_signing_key,
            Direction::ServerToClient => &self.server_signing_key,
        }
    }

    pub fn sealing_key(&self, direction: Direction) -> &Key {
        match direction {
            Direction::ClientToServer => &self.client_sealing_key,
            Direction::ServerToClient => &self.server_sealing_key,
        }
    }
}
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const USER: &str = "User";
    const DOMAIN: &str = "Domain";
    const PASSWORD: &str = "Password";
    const SERVER_CHALLENGE: [u8; 8] = hex!("0123456789abcdef");
    const CLIENT_CHALLENGE: [u8; 8] = [0xAA; 8];
    const RANDOM_SESSION_KEY: Key = [0x55; 16];

    fn v1_flags() -> Flags {
        Flags::NEGOTIATE_KEY_EXCHANGE | Flags::NEGOTIATE_56BIT | Flags::NEGOTIATE_128BIT
            | Flags::NEGOTIATE_VERSION | Flags::TARGET_TYPE_SERVER | Flags::NEGOTIATE_ALWAYS_SIGN
            | Flags::NEGOTIATE_NTLM | Flags::NEGOTIATE_SEAL | Flags::NEGOTIATE_SIGN
            | Flags::NEGOTIATE_OEM | Flags::NEGOTIATE_UNICODE
    }

    fn v1_extended_flags() -> Flags {
        Flags::NEGOTIATE_56BIT | Flags::NEGOTIATE_VERSION | Flags::NEGOTIATE_EXTENDED_SESSIONSECURITY
            | Flags::TARGET_TYPE_SERVER | Flags::NEGOTIATE_ALWAYS_SIGN | Flags::NEGOTIATE_NTLM
            | Flags::NEGOTIATE_SEAL | Flags::NEGOTIATE_SIGN | Flags::NEGOTIATE_OEM | Flags::NEGOTIATE_UNICODE
    }

    /// AV pairs NbDomainName "Domain" and NbComputerName "Server", terminated.
    fn test_av_pairs() -> Vec<u8> {
        let mut av = Vec::new();
        av.extend_from_slice(&[0x02, 0x00, 0x0c, 0x00]);
        av.extend_from_slice(&utf16_le_bytes("Domain"));
        av.extend_from_slice(&[0x01, 0x00, 0x0c, 0x00]);
        av.extend_from_slice(&utf16_le_bytes("Server"));
        av.extend_from_slice(&[0x00; 4]);
        av
    }

    #[test]
    fn ntlm_v1_hashes() {
        assert_eq!(nt_hash_v1(PASSWORD), hex!("a4f49c406510bdcab6824ee7c30fd852"));
        assert_eq!(lm_hash_v1(PASSWORD).unwrap(), Some(hex!("e52cac67419a9a224a3b108f3fa6cb6d")));
    }

    #[test]
    fn ntlm_v1_responses() {
        let nt_hash = NtlmHash::from_password(PASSWORD);
        let lm_hash = lm_hash_v1(PASSWORD).unwrap().unwrap();
        let resp = respond_challenge_ntlm_v1(&nt_hash, Some(&lm_hash), &SERVER_CHALLENGE).unwrap();

        assert_eq!(resp.nt_response, hex!("67c43011f30298a2ad35ece64f16331c44bdbed927841f94"));
        assert_eq!(resp.lm_response, hex!("98def7b87f88aa5dafe2df779688a172def11c7d5ccdef13"));
        assert_eq!(resp.session_base_key, hex!("d87262b0cde4b1cb7499becccdf10784"));

        let no_lm = respond_challenge_ntlm_v1(&nt_hash, None, &SERVER_CHALLENGE).unwrap();
        assert_eq!(no_lm.lm_response, no_lm.nt_response);
    }

    #[test]
    fn ntlm_v1_key_exchange_keys() {
        let lm_hash = lm_hash_v1(PASSWORD).unwrap().unwrap();
        let session_base_key = hex!("d87262b0cde4b1cb7499becccdf10784");
        let lm_response = hex!("98def7b87f88aa5dafe2df779688a172def11c7d5ccdef13");

        let kek = key_exchange_key_v1(v1_flags(), &session_base_key, Some(&lm_hash), &SERVER_CHALLENGE, &lm_response).unwrap();
        assert_eq!(kek, session_base_key);
        let (_, encrypted) = exported_session_key(v1_flags(), &kek, &RANDOM_SESSION_KEY).unwrap();
        assert_eq!(encrypted, hex!("518822b1b3f350c8958682ecbb3e3cb7"));

        let flags = v1_flags() | Flags::NEGOTIATE_LANMAN_KEY;
        let kek = key_exchange_key_v1(flags, &session_base_key, Some(&lm_hash), &SERVER_CHALLENGE, &lm_response).unwrap();
        assert_eq!(kek, hex!("b09e379f7fbecb1eaf0afdcb0383c8a0"));
        let (_, encrypted) = exported_session_key(flags, &kek, &RANDOM_SESSION_KEY).unwrap();
        assert_eq!(encrypted, hex!("4cd7bb57d697ef9b549f02b8f9b37864"));

        let flags = v1_flags() | Flags::REQUEST_NON_NT_SESSION_KEY;
        let kek = key_exchange_key_v1(flags, &session_base_key, Some(&lm_hash), &SERVER_CHALLENGE, &lm_response).unwrap();
        let (_, encrypted) = exported_session_key(flags, &kek, &RANDOM_SESSION_KEY).unwrap();
        assert_eq!(encrypted, hex!("7452ca55c225a1ca04b48fae32cf56fc"));
    }

    #[test]
    fn ntlm_v1_extended_session_security() {
        let nt_hash = NtlmHash::from_password(PASSWORD);
        let resp = respond_challenge_ntlm_v1_extended(&nt_hash, &SERVER_CHALLENGE, &CLIENT_CHALLENGE).unwrap();
        assert_eq!(resp.lm_response, hex!("aaaaaaaaaaaaaaaa00000000000000000000000000000000"));
        assert_eq!(resp.nt_response, hex!("7537f803ae367128ca458204bde7caf81e97ed2683267232"));

        let flags = v1_extended_flags();
        let kek = key_exchange_key_v1(flags, &resp.session_base_key, None, &SERVER_CHALLENGE, &resp.lm_response).unwrap();
        assert_eq!(kek, hex!("eb93429a8bd952f8b89c55b87f475edc"));

        // no key exchange: the key exchange key is exported directly
        let (esk, encrypted) = exported_session_key(flags, &kek, &RANDOM_SESSION_KEY).unwrap();
        assert_eq!(esk, kek);
        assert!(encrypted.is_empty());

        assert_eq!(sealing_key(flags, &esk, Direction::ClientToServer), hex!("04dd7f014d8504d265a25cc86a3a7c06"));
        assert_eq!(signing_key(&esk, Direction::ClientToServer), hex!("60e799be5c72fc92922ae8ebe961fb8d"));
    }

    #[test]
    fn ntlm_v2_vectors() {
        let nt_hash = NtlmHash::from_password(PASSWORD);
        let v2_hash = nt_hash_v2(&nt_hash, USER, DOMAIN).unwrap();
        assert_eq!(v2_hash, hex!("0c868a403bfd7a93a3001ef22ef02e3f"));

        let temp = ntlm_v2_client_blob(0, &CLIENT_CHALLENGE, &test_av_pairs());
        assert_eq!(&temp[0..8], &[0x01, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&temp[16..24], &CLIENT_CHALLENGE);
        assert_eq!(temp.len(), 28 + test_av_pairs().len() + 4);

        let resp = respond_challenge_ntlm_v2(&v2_hash, &SERVER_CHALLENGE, &CLIENT_CHALLENGE, &temp, false).unwrap();
        assert_eq!(&resp.nt_response[0..16], &hex!("68cd0ab851e51c96aabc927bebef6a1c"));
        assert_eq!(&resp.nt_response[16..], temp.as_slice());
        assert_eq!(resp.session_base_key, hex!("8de40ccadbc14a82f15cb0ad0de95ca3"));
        assert_eq!(resp.lm_response, hex!("86c35097ac9cec102554764a57cccc19aaaaaaaaaaaaaaaa"));

        let zeroed = respond_challenge_ntlm_v2(&v2_hash, &SERVER_CHALLENGE, &CLIENT_CHALLENGE, &temp, true).unwrap();
        assert_eq!(zeroed.lm_response, vec![0u8; 24]);
        assert_eq!(zeroed.nt_response, resp.nt_response);
    }

    #[test]
    fn ntlm_v2_key_hierarchy() {
        let flags = Flags::NEGOTIATE_KEY_EXCHANGE | Flags::NEGOTIATE_128BIT | Flags::NEGOTIATE_56BIT
            | Flags::NEGOTIATE_EXTENDED_SESSIONSECURITY | Flags::NEGOTIATE_SIGN | Flags::NEGOTIATE_SEAL
            | Flags::NEGOTIATE_UNICODE;
        let session_base_key = hex!("8de40ccadbc14a82f15cb0ad0de95ca3");

        let (esk, encrypted) = exported_session_key(flags, &session_base_key, &RANDOM_SESSION_KEY).unwrap();
        assert_eq!(esk, RANDOM_SESSION_KEY);
        assert_eq!(encrypted, hex!("c5dad2544fc9799094ce1ce90bc9d03e"));

        let keys = KeyMaterial::derive(flags, [0; 16], session_base_key, session_base_key, esk);
        assert_eq!(keys.client_signing_key, hex!("4788dc861b4782f35d43fd98fe1a2d39"));
        assert_eq!(keys.client_sealing_key, hex!("59f600973cc4960a25480a7c196e4c58"));
        assert_ne!(keys.server_signing_key, keys.client_signing_key);
        assert_ne!(keys.server_sealing_key, keys.client_sealing_key);
    }

    #[test]
    fn sealing_key_strength() {
        let esk = [0x42; 16];
        let k40 = sealing_key(Flags::empty(), &esk, Direction::ClientToServer);
        let k56 = sealing_key(Flags::NEGOTIATE_56BIT, &esk, Direction::ClientToServer);
        let k128 = sealing_key(Flags::NEGOTIATE_128BIT | Flags::NEGOTIATE_56BIT, &esk, Direction::ClientToServer);
        assert_eq!(k40, md5(&[&esk[..5], CLIENT_SEALING_MAGIC]));
        assert_eq!(k56, md5(&[&esk[..7], CLIENT_SEALING_MAGIC]));
        assert_eq!(k128, md5(&[&esk, CLIENT_SEALING_MAGIC]));
    }

    #[test]
    fn lm_key_requires_lm_hash() {
        let flags = Flags::NEGOTIATE_LANMAN_KEY;
        assert!(key_exchange_key_v1(flags, &[0; 16], None, &SERVER_CHALLENGE, &[0; 24]).is_err());
    }

    #[test]
    fn nt_hash_parsing() {
        let hash: NtlmHash = "A4F49C406510BDCAB6824EE7C30FD852".parse().unwrap();
        assert_eq!(hash, NtlmHash::from_password(PASSWORD));
        assert_eq!("abc".parse::<NtlmHash>(), Err(NtlmHashError::StringLength { obtained: 3 }));
        assert_eq!(
            "zzf49c406510bdcab6824ee7c30fd852".parse::<NtlmHash>(),
            Err(NtlmHashError::InvalidHexDigit),
        );
    }

    #[test]
    fn ntlm_time_is_after_2020() {
        // 2020-01-01 as FILETIME
        assert!(get_ntlm_time() > 132_223_104_000_000_000);
    }
}
