//! The per-message security layer established after authentication: signing (GetMIC), signature
//! verification, sealing and the Message Integrity Code over the handshake.


use std::fmt;

use tracing::trace;

use crate::Flags;
use crate::crypto::{HASH_SIZE, Rc4Stream, hmac_md5};
use crate::error::{Error, Result};
use crate::keys::{Direction, Key, KeyMaterial};


/// Length of a message signature.
pub const SIGNATURE_SIZE: usize = 16;

/// Version number at the start of every signature.
pub const SIGNATURE_VERSION: u32 = 0x0000_0001;


/// The signing state of one direction: its signing key, its RC4 handle and its sequence number.
///
/// Once the signature with sequence number `u32::MAX` has been produced, the channel is spent and
/// refuses to sign anything else; sequence numbers never repeat.
struct Channel {
    signing_key: Key,
    sealing: Rc4Stream,
    seq_num: u32,
    spent: bool,
}
impl Channel {
    fn new(signing_key: &Key, sealing_key: &Key) -> Result<Self> {
        Ok(Self {
            signing_key: *signing_key,
            sealing: Rc4Stream::new(sealing_key)?,
            seq_num: 0,
            spent: false,
        })
    }

    fn ensure_not_spent(&self) -> Result<()> {
        if self.spent {
            return Err(Error::crypto("sequence numbers exhausted; the session must be re-established"));
        }
        Ok(())
    }

    /// Computes the signature over `data` and consumes one sequence number.
    ///
    /// The checksum passes through the RC4 handle when keys were exchanged.
    fn compute_signature(&mut self, key_exchange: bool, data: &[u8]) -> Result<[u8; SIGNATURE_SIZE]> {
        self.ensure_not_spent()?;
        let seq_bytes = self.seq_num.to_le_bytes();
        let digest = hmac_md5(&self.signing_key, &[&seq_bytes, data])?;

        let mut checksum = [0u8; 8];
        checksum.copy_from_slice(&digest[0..8]);
        if key_exchange {
            self.sealing.apply(&mut checksum);
        }

        let mut signature = [0u8; SIGNATURE_SIZE];
        signature[0..4].copy_from_slice(&SIGNATURE_VERSION.to_le_bytes());
        signature[4..12].copy_from_slice(&checksum);
        signature[12..16].copy_from_slice(&seq_bytes);

        trace!(seq_num = self.seq_num, "computed signature");
        match self.seq_num.checked_add(1) {
            Some(next) => self.seq_num = next,
            None => self.spent = true,
        }
        Ok(signature)
    }
}
impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("seq_num", &self.seq_num)
            .finish_non_exhaustive()
    }
}
impl Drop for Channel {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.signing_key);
    }
}


/// Both directions of the security layer of an established session.
#[derive(Debug)]
pub struct SecurityLayer {
    flags: Flags,
    outbound: Channel,
    inbound: Channel,
}
impl SecurityLayer {
    /// Sets up the layer from the session keys. `outbound` names the direction of the messages
    /// this side produces; a client passes [`Direction::ClientToServer`].
    pub fn new(flags: Flags, keys: &KeyMaterial, outbound: Direction) -> Result<Self> {
        let inbound = match outbound {
            Direction::ClientToServer => Direction::ServerToClient,
            Direction::ServerToClient => Direction::ClientToServer,
        };
        Ok(Self {
            flags,
            outbound: Channel::new(keys.signing_key(outbound), keys.sealing_key(outbound))?,
            inbound: Channel::new(keys.signing_key(inbound), keys.sealing_key(inbound))?,
        })
    }

    fn key_exchange(&self) -> bool {
        self.flags.contains(Flags::NEGOTIATE_KEY_EXCHANGE)
    }

    /// The sequence number the next outgoing signature will carry.
    pub fn outbound_sequence_number(&self) -> u32 {
        self.outbound.seq_num
    }

    /// The sequence number the next incoming signature is expected to carry.
    pub fn inbound_sequence_number(&self) -> u32 {
        self.inbound.seq_num
    }

    /// Signs an outgoing message.
    ///
    /// Returns an empty signature (and changes nothing) if signing was not negotiated.
    pub fn sign(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        if !self.flags.contains(Flags::NEGOTIATE_SIGN) {
            return Ok(Vec::new());
        }
        let key_exchange = self.key_exchange();
        Ok(self.outbound.compute_signature(key_exchange, message)?.to_vec())
    }

    /// Verifies the signature of an incoming message.
    ///
    /// Every call consumes one inbound sequence number, whether or not the signature matches.
    pub fn verify(&mut self, message: &[u8], signature: &[u8]) -> Result<()> {
        if !self.flags.contains(Flags::NEGOTIATE_SIGN) {
            return Err(Error::protocol("signing was not negotiated"));
        }
        let key_exchange = self.key_exchange();
        let expected = self.inbound.compute_signature(key_exchange, message)?;
        if expected.as_slice() != signature {
            return Err(Error::protocol("message signature does not match"));
        }
        Ok(())
    }

    /// Encrypts an outgoing message; returns the ciphertext and its signature.
    pub fn seal(&mut self, message: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        if !self.flags.contains(Flags::NEGOTIATE_SEAL) {
            return Err(Error::protocol("sealing was not negotiated"));
        }
        self.outbound.ensure_not_spent()?;
        let ciphertext = self.outbound.sealing.process(message);
        let key_exchange = self.key_exchange();
        let signature = self.outbound.compute_signature(key_exchange, message)?;
        Ok((ciphertext, signature.to_vec()))
    }

    /// Decrypts an incoming message and verifies its signature.
    pub fn unseal(&mut self, ciphertext: &[u8], signature: &[u8]) -> Result<Vec<u8>> {
        if !self.flags.contains(Flags::NEGOTIATE_SEAL) {
            return Err(Error::protocol("sealing was not negotiated"));
        }
        self.inbound.ensure_not_spent()?;
        let plaintext = self.inbound.sealing.process(ciphertext);
        let key_exchange = self.key_exchange();
        let expected = self.inbound.compute_signature(key_exchange, &plaintext)?;
        if expected.as_slice() != signature {
            return Err(Error::protocol("sealed message signature does not match"));
        }
        Ok(plaintext)
    }
}


/// Computes the Message Integrity Code over the three handshake messages.
///
/// `authenticate` must carry zeroes in its MIC field.
pub fn compute_mic(exported_session_key: &Key, negotiate: &[u8], challenge: &[u8], authenticate: &[u8]) -> Result<[u8; HASH_SIZE]> {
    hmac_md5(exported_session_key, &[negotiate, challenge, authenticate])
}
