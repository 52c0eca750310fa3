//! Session configuration: credentials, identity and protocol options.


use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Flags;
use crate::keys::NtlmHash;
use crate::messages::OsVersion;


/// How strings are encoded on the wire.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum StringEncoding {
    /// UTF-16LE (`NEGOTIATE_UNICODE`).
    #[default]
    Unicode,

    /// The OEM code page (`NEGOTIATE_OEM`).
    Oem,
}

/// Which generation of challenge responses to send.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ResponseVersion {
    #[default]
    V2,

    /// Legacy NTLMv1 responses, with extended session security if negotiated.
    V1,
}

/// The secret part of the credentials.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub enum Secret {
    Password(String),

    /// A precomputed NT hash; no LM hash can be derived from it.
    Hash(NtlmHash),
}
impl Secret {
    pub fn nt_hash(&self) -> NtlmHash {
        match self {
            Self::Password(password) => NtlmHash::from_password(password),
            Self::Hash(hash) => *hash,
        }
    }

    pub fn password(&self) -> Option<&str> {
        match self {
            Self::Password(password) => Some(password),
            Self::Hash(_) => None,
        }
    }
}
impl Default for Secret {
    fn default() -> Self {
        Self::Password(String::new())
    }
}
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(..)"),
            Self::Hash(_) => f.write_str("Hash(..)"),
        }
    }
}


/// The flags sent in the Negotiate message unless overridden.
pub fn default_negotiate_flags() -> Flags {
    Flags::NEGOTIATE_56BIT
        | Flags::NEGOTIATE_128BIT
        | Flags::NEGOTIATE_KEY_EXCHANGE
        | Flags::NEGOTIATE_TARGET_INFO
        | Flags::NEGOTIATE_EXTENDED_SESSIONSECURITY
        | Flags::NEGOTIATE_ALWAYS_SIGN
        | Flags::NEGOTIATE_NTLM
        | Flags::NEGOTIATE_SIGN
        | Flags::REQUEST_TARGET
        | Flags::NEGOTIATE_UNICODE
        | Flags::NEGOTIATE_VERSION
}


/// Everything a session needs to know before it starts.
///
/// The domain, user and workstation names go on the wire exactly as configured; they are not
/// uppercased. NTOWFv2 still uppercases the user name internally, as MS-NLMP requires.
///
/// ```
/// use ntlmsession::{ResponseVersion, SessionConfig};
///
/// let config = SessionConfig::new("User", "Password")
///     .with_domain("Domain")
///     .with_workstation("WORKSTATION")
///     .with_response_version(ResponseVersion::V2);
/// assert_eq!(config.domain, "Domain");
/// ```
#[derive(Clone, Default)]
pub struct SessionConfig {
    pub username: String,
    pub secret: Secret,

    /// The user's domain; may be empty.
    pub domain: String,

    /// The name of the client machine; may be empty.
    pub workstation: String,

    /// Replaces [`default_negotiate_flags`] if set.
    pub flags: Option<Flags>,

    pub string_encoding: StringEncoding,
    pub response_version: ResponseVersion,

    /// The channel-binding token (e.g. the TLS server endpoint binding) whose MD5 is announced in
    /// the AV pairs.
    pub channel_bindings: Option<Vec<u8>>,

    pub os_version: OsVersion,
}
impl SessionConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Secret::Password(password.into()),
            os_version: OsVersion::CLIENT_DEFAULT,
            ..Default::default()
        }
    }

    /// Authenticates with an NT hash instead of a password.
    pub fn from_hash(username: impl Into<String>, hash: NtlmHash) -> Self {
        Self {
            username: username.into(),
            secret: Secret::Hash(hash),
            os_version: OsVersion::CLIENT_DEFAULT,
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_workstation(mut self, workstation: impl Into<String>) -> Self {
        self.workstation = workstation.into();
        self
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn with_string_encoding(mut self, encoding: StringEncoding) -> Self {
        self.string_encoding = encoding;
        self
    }

    pub fn with_response_version(mut self, version: ResponseVersion) -> Self {
        self.response_version = version;
        self
    }

    pub fn with_channel_bindings(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.channel_bindings = Some(token.into());
        self
    }

    pub fn with_os_version(mut self, os_version: OsVersion) -> Self {
        self.os_version = os_version;
        self
    }

    /// The flags to send in the Negotiate message.
    ///
    /// The string encoding selects `UNICODE` or `OEM`, and `DOMAIN_SUPPLIED`/`WORKSTATION_SUPPLIED`
    /// follow whether those strings are non-empty.
    pub fn negotiate_flags(&self) -> Flags {
        let mut flags = self.flags.unwrap_or_else(default_negotiate_flags);
        if self.string_encoding == StringEncoding::Oem {
            flags.remove(Flags::NEGOTIATE_UNICODE);
            flags.insert(Flags::NEGOTIATE_OEM);
        }
        flags.set(Flags::NEGOTIATE_DOMAIN_SUPPLIED, !self.domain.is_empty());
        flags.set(Flags::NEGOTIATE_WORKSTATION_SUPPLIED, !self.workstation.is_empty());
        flags
    }
}
impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("username", &self.username)
            .field("secret", &self.secret)
            .field("domain", &self.domain)
            .field("workstation", &self.workstation)
            .field("flags", &self.flags)
            .field("string_encoding", &self.string_encoding)
            .field("response_version", &self.response_version)
            .field("channel_bindings", &self.channel_bindings.as_ref().map(|cb| cb.len()))
            .field("os_version", &self.os_version)
            .finish()
    }
}
