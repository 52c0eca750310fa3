//! The client side of an NTLM authentication exchange.
//!
//! A [`Session`] walks through `Fresh → Negotiated → Authenticated`:
//!
//! 1. [`Session::init_sec_context`] produces the Negotiate message.
//! 2. [`Session::accept_sec_context`] consumes the server's Challenge message, derives the session
//!    keys and produces the Authenticate message (including its MIC).
//! 3. Afterwards, [`Session::get_mic`], [`Session::verify_mic`], [`Session::seal`] and
//!    [`Session::unseal`] protect application messages, and [`Session::session_key`] exports the
//!    session key.
//!
//! A failed `accept_sec_context` leaves the session in the terminal [`SessionState::Failed`].


use tracing::{debug, instrument, warn};

use crate::Flags;
use crate::av_pair::{
    AV_FLAG_MIC_PRESENT, TargetInfoEntry, TargetInfoType, TargetInformation, encode_av_pairs,
};
use crate::config::{ResponseVersion, SessionConfig};
use crate::crypto::md5;
use crate::error::{Error, Result};
use crate::keys::{
    ChallengeResponse, Direction, Key, KeyMaterial, exported_session_key, generate_client_challenge,
    generate_random_session_key, get_ntlm_time, key_exchange_key_v1, lm_hash_v1, nt_hash_v2,
    ntlm_v2_client_blob, respond_challenge_ntlm_v1, respond_challenge_ntlm_v1_extended,
    respond_challenge_ntlm_v2,
};
use crate::messages::{
    AuthenticateMessage, ChallengeMessage, MIC_LEN, MIC_OFFSET, NegotiateMessage, OsVersion,
};
use crate::security::{SecurityLayer, compute_mic};


/// The stage of the authentication exchange a session is in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SessionState {
    /// Nothing has been sent yet.
    Fresh,

    /// The Negotiate message has been produced; waiting for the Challenge.
    Negotiated,

    /// The Authenticate message has been produced; the security layer is available.
    Authenticated,

    /// Processing the Challenge failed. Terminal.
    Failed,
}


/// Everything accepting a Challenge produces; committed to the session only on success.
struct Established {
    challenge_message: Vec<u8>,
    authenticate_message: Vec<u8>,
    negotiated_flags: Flags,
    target_info: TargetInformation,
    keys: KeyMaterial,
    security: SecurityLayer,
}


/// An NTLM client session.
///
/// A session owns its RC4 handles and sequence counters and therefore cannot be cloned; each
/// authentication needs its own session.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    state: SessionState,
    negotiate_flags: Flags,
    negotiated_flags: Flags,
    negotiate_message: Vec<u8>,
    challenge_message: Vec<u8>,
    authenticate_message: Vec<u8>,
    target_info: Option<TargetInformation>,
    keys: Option<KeyMaterial>,
    security: Option<SecurityLayer>,
}
impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Fresh,
            negotiate_flags: Flags::empty(),
            negotiated_flags: Flags::empty(),
            negotiate_message: Vec::new(),
            challenge_message: Vec::new(),
            authenticate_message: Vec::new(),
            target_info: None,
            keys: None,
            security: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The flags both sides agreed on; empty until a Challenge has been accepted.
    pub fn negotiated_flags(&self) -> Flags {
        self.negotiated_flags
    }

    /// The Negotiate message produced by [`Self::init_sec_context`].
    pub fn negotiate_message(&self) -> &[u8] {
        &self.negotiate_message
    }

    /// The Challenge message consumed by [`Self::accept_sec_context`].
    pub fn challenge_message(&self) -> &[u8] {
        &self.challenge_message
    }

    /// The Authenticate message produced by [`Self::accept_sec_context`].
    pub fn authenticate_message(&self) -> &[u8] {
        &self.authenticate_message
    }

    /// The server's target information, once a Challenge has been accepted.
    pub fn target_info(&self) -> Option<&TargetInformation> {
        self.target_info.as_ref()
    }

    /// The sequence number the next [`Self::get_mic`] or [`Self::seal`] will use.
    pub fn outbound_sequence_number(&self) -> Option<u32> {
        self.security.as_ref().map(|s| s.outbound_sequence_number())
    }

    /// The sequence number the next [`Self::verify_mic`] or [`Self::unseal`] will expect.
    pub fn inbound_sequence_number(&self) -> Option<u32> {
        self.security.as_ref().map(|s| s.inbound_sequence_number())
    }

    fn expect_state(&self, operation: &'static str, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(Error::SequenceError { operation, state: self.state });
        }
        Ok(())
    }

    fn security_mut(&mut self, operation: &'static str) -> Result<&mut SecurityLayer> {
        self.expect_state(operation, SessionState::Authenticated)?;
        let state = self.state;
        self.security.as_mut()
            .ok_or(Error::SequenceError { operation, state })
    }

    /// Produces the Negotiate message.
    #[instrument(level = "debug", skip_all, fields(user = %self.config.username))]
    pub fn init_sec_context(&mut self) -> Result<Vec<u8>> {
        self.expect_state("init_sec_context", SessionState::Fresh)?;

        let flags = self.config.negotiate_flags();
        let negotiate = NegotiateMessage {
            flags,
            supplied_domain: if flags.contains(Flags::NEGOTIATE_DOMAIN_SUPPLIED) {
                self.config.domain.clone()
            } else {
                String::new()
            },
            supplied_workstation: if flags.contains(Flags::NEGOTIATE_WORKSTATION_SUPPLIED) {
                self.config.workstation.clone()
            } else {
                String::new()
            },
            os_version: self.announced_version(flags),
        };
        let bytes = negotiate.to_bytes()?;

        debug!(?flags, len = bytes.len(), "produced NEGOTIATE");
        self.negotiate_flags = flags;
        self.negotiate_message = bytes.clone();
        self.state = SessionState::Negotiated;
        Ok(bytes)
    }

    /// Consumes the server's Challenge message and produces the Authenticate message.
    ///
    /// On failure the session moves to [`SessionState::Failed`] and keeps no key material.
    #[instrument(level = "debug", skip_all, fields(len = challenge.len()))]
    pub fn accept_sec_context(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
        self.expect_state("accept_sec_context", SessionState::Negotiated)?;

        match self.process_challenge(challenge) {
            Ok(established) => {
                debug!(flags = ?established.negotiated_flags, "produced AUTHENTICATE");
                let authenticate = established.authenticate_message.clone();
                self.challenge_message = established.challenge_message;
                self.authenticate_message = established.authenticate_message;
                self.negotiated_flags = established.negotiated_flags;
                self.target_info = Some(established.target_info);
                self.keys = Some(established.keys);
                self.security = Some(established.security);
                self.state = SessionState::Authenticated;
                Ok(authenticate)
            },
            Err(e) => {
                warn!(error = %e, "rejecting CHALLENGE");
                self.state = SessionState::Failed;
                Err(e)
            },
        }
    }

    fn process_challenge(&self, challenge_bytes: &[u8]) -> Result<Established> {
        let challenge = ChallengeMessage::try_from(challenge_bytes)?;

        let required = Flags::REQUEST_TARGET | Flags::NEGOTIATE_TARGET_INFO;
        if !(self.negotiate_flags & challenge.flags).contains(required) {
            return Err(Error::protocol(format!(
                "CHALLENGE does not confirm the target information flags (sent {:?}, received {:?})",
                self.negotiate_flags, challenge.flags,
            )));
        }
        let negotiated_flags = self.negotiate_flags & challenge.flags;
        if !negotiated_flags.intersects(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_OEM) {
            return Err(Error::protocol("no common string encoding"));
        }

        let target_info = TargetInformation::parse(&challenge.target_info)?;
        debug!(
            ?negotiated_flags,
            domain = ?target_info.nb_domain_name,
            server = ?target_info.nb_computer_name,
            "accepted CHALLENGE",
        );

        let nt_hash = self.config.secret.nt_hash();
        let client_challenge = generate_client_challenge();

        let (response, key_exchange_key) = match self.config.response_version {
            ResponseVersion::V2 => {
                let v2_hash = nt_hash_v2(&nt_hash, &self.config.username, &self.config.domain)?;
                let av_pairs = self.client_av_pairs(&target_info)?;
                let timestamp = target_info.timestamp.unwrap_or_else(get_ntlm_time);
                let temp = ntlm_v2_client_blob(timestamp, &client_challenge, &av_pairs);
                let response = respond_challenge_ntlm_v2(
                    &v2_hash,
                    &challenge.challenge,
                    &client_challenge,
                    &temp,
                    target_info.timestamp.is_some(),
                )?;
                let key_exchange_key = response.session_base_key;
                (response, key_exchange_key)
            },
            ResponseVersion::V1 => {
                if !negotiated_flags.contains(Flags::NEGOTIATE_EXTENDED_SESSIONSECURITY)
                        && negotiated_flags.intersects(Flags::NEGOTIATE_SIGN | Flags::NEGOTIATE_SEAL) {
                    return Err(Error::protocol(
                        "signing without extended session security is not supported",
                    ));
                }

                let lm_hash = match self.config.secret.password() {
                    Some(password) => lm_hash_v1(password)?,
                    None => None,
                };
                let response: ChallengeResponse = if negotiated_flags.contains(Flags::NEGOTIATE_EXTENDED_SESSIONSECURITY) {
                    respond_challenge_ntlm_v1_extended(&nt_hash, &challenge.challenge, &client_challenge)?
                } else {
                    respond_challenge_ntlm_v1(&nt_hash, lm_hash.as_ref(), &challenge.challenge)?
                };
                let key_exchange_key = key_exchange_key_v1(
                    negotiated_flags,
                    &response.session_base_key,
                    lm_hash.as_ref(),
                    &challenge.challenge,
                    &response.lm_response,
                )?;
                (response, key_exchange_key)
            },
        };

        let (exported_key, encrypted_session_key) = exported_session_key(
            negotiated_flags,
            &key_exchange_key,
            &generate_random_session_key(),
        )?;
        let keys = KeyMaterial::derive(
            negotiated_flags,
            *nt_hash.as_bytes(),
            response.session_base_key,
            key_exchange_key,
            exported_key,
        );

        let authenticate = AuthenticateMessage {
            lm_response: response.lm_response.clone(),
            nt_response: response.nt_response.clone(),
            domain_name: self.config.domain.clone(),
            user_name: self.config.username.clone(),
            workstation_name: self.config.workstation.clone(),
            encrypted_session_key,
            flags: negotiated_flags,
            os_version: self.announced_version(negotiated_flags),
            mic: None,
        };
        let mut authenticate_message = authenticate.to_bytes()?;
        let mic = compute_mic(&keys.exported_session_key, &self.negotiate_message, challenge_bytes, &authenticate_message)?;
        authenticate_message[MIC_OFFSET..MIC_OFFSET + MIC_LEN].copy_from_slice(&mic);

        let security = SecurityLayer::new(negotiated_flags, &keys, Direction::ClientToServer)?;

        Ok(Established {
            challenge_message: challenge_bytes.to_vec(),
            authenticate_message,
            negotiated_flags,
            target_info,
            keys,
            security,
        })
    }

    /// The AV pairs for the NTLMv2 client blob: the server's pairs with the MIC bit merged into
    /// the flags, plus a timestamp and channel bindings if the server did not send them.
    fn client_av_pairs(&self, target_info: &TargetInformation) -> Result<Vec<u8>> {
        let mut entries: Vec<TargetInfoEntry> = target_info.entries.iter()
            .filter(|e| e.entry_type != TargetInfoType::Terminator)
            .cloned()
            .collect();

        let av_flags = target_info.flags.unwrap_or(0) | AV_FLAG_MIC_PRESENT;
        match entries.iter_mut().find(|e| e.entry_type == TargetInfoType::Flags) {
            Some(entry) => *entry = TargetInfoEntry::from_flags(av_flags),
            None => entries.push(TargetInfoEntry::from_flags(av_flags)),
        }

        if target_info.timestamp.is_none() {
            // an undecodable server timestamp is replaced, not repeated
            entries.retain(|e| e.entry_type != TargetInfoType::Timestamp);
            entries.push(TargetInfoEntry::from_timestamp(get_ntlm_time()));
        }

        if target_info.channel_bindings.is_none() {
            let bindings = match &self.config.channel_bindings {
                Some(token) => md5(&[token]),
                None => [0u8; 16],
            };
            entries.push(TargetInfoEntry {
                entry_type: TargetInfoType::ChannelBindings,
                data: bindings.to_vec(),
            });
        }

        Ok(encode_av_pairs(&entries)?)
    }

    fn announced_version(&self, flags: Flags) -> OsVersion {
        if flags.contains(Flags::NEGOTIATE_VERSION) {
            self.config.os_version
        } else {
            OsVersion::default()
        }
    }

    /// Signs an outgoing message. Returns 16 bytes, or nothing if signing was not negotiated.
    #[instrument(level = "trace", skip_all)]
    pub fn get_mic(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        self.security_mut("get_mic")?.sign(message)
    }

    /// Verifies the signature the server attached to a message.
    #[instrument(level = "trace", skip_all)]
    pub fn verify_mic(&mut self, message: &[u8], signature: &[u8]) -> Result<()> {
        self.security_mut("verify_mic")?.verify(message, signature)
    }

    /// Encrypts and signs an outgoing message; returns the ciphertext and the signature.
    #[instrument(level = "trace", skip_all)]
    pub fn seal(&mut self, message: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        self.security_mut("seal")?.seal(message)
    }

    /// Decrypts an incoming message and verifies its signature.
    #[instrument(level = "trace", skip_all)]
    pub fn unseal(&mut self, ciphertext: &[u8], signature: &[u8]) -> Result<Vec<u8>> {
        self.security_mut("unseal")?.unseal(ciphertext, signature)
    }

    /// The exported session key.
    pub fn session_key(&self) -> Result<Key> {
        self.expect_state("session_key", SessionState::Authenticated)?;
        self.keys.as_ref()
            .map(|k| k.exported_session_key)
            .ok_or(Error::SequenceError { operation: "session_key", state: self.state })
    }
}
