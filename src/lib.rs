//! An NTLM client authentication engine for Rust.
//!
//! The crate produces and consumes the three NTLM messages, derives the session keys and provides
//! the signing and sealing layer of an established session. It performs no I/O; the caller moves
//! the tokens between client and server (e.g. in HTTP `Authorization` headers or SPNEGO).
//!
//! Sample usage:
//! ```
//! use ntlmsession::{Session, SessionConfig, SessionState};
//!
//! fn authenticate(exchange: impl Fn(&[u8]) -> Vec<u8>) -> Result<Session, ntlmsession::Error> {
//!     let config = SessionConfig::new("User", "Password")
//!         .with_domain("Domain")
//!         .with_workstation("COMPUTER");
//!     let mut session = Session::new(config);
//!
//!     let negotiate = session.init_sec_context()?;
//!     let challenge = exchange(&negotiate);
//!     let authenticate = session.accept_sec_context(&challenge)?;
//!     exchange(&authenticate);
//!
//!     assert_eq!(session.state(), SessionState::Authenticated);
//!     Ok(session)
//! }
//! ```


pub mod av_pair;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod mechanism;
pub mod messages;
pub mod security;
pub mod session;

#[cfg(windows)]
mod oem_windows;

#[cfg(not(windows))]
mod oem_utf8;


use bitflags::bitflags;

pub use crate::av_pair::{TargetInfoEntry, TargetInfoType, TargetInformation};
pub use crate::config::{ResponseVersion, Secret, SessionConfig, StringEncoding, default_negotiate_flags};
pub use crate::error::{Error, ParsingError, Result, StoringError};
pub use crate::keys::{NtlmHash, NtlmHashError};
pub use crate::mechanism::{Mechanism, NTLM_OID, NTLM_OID_DER};
pub use crate::messages::{AuthenticateMessage, ChallengeMessage, Message, NegotiateMessage, OsVersion, SecurityBuffer};
pub use crate::session::{Session, SessionState};


bitflags! {
    /// NTLM negotiation flags.
    #[derive(Clone, Copy, Debug, Default, Hash, Eq, Ord, PartialEq, PartialOrd)]
    pub struct Flags: u32 {
        const NEGOTIATE_UNICODE = 0x0000_0001;
        const NEGOTIATE_OEM = 0x0000_0002;
        const REQUEST_TARGET = 0x0000_0004;
        const RESERVED_10 = 0x0000_0008;
        const NEGOTIATE_SIGN = 0x0000_0010;
        const NEGOTIATE_SEAL = 0x0000_0020;
        const NEGOTIATE_DATAGRAM = 0x0000_0040;
        const NEGOTIATE_LANMAN_KEY = 0x0000_0080;
        const RESERVED_9 = 0x0000_0100;
        const NEGOTIATE_NTLM = 0x0000_0200;
        const RESERVED_8 = 0x0000_0400;
        const NEGOTIATE_ANONYMOUS = 0x0000_0800;
        const NEGOTIATE_DOMAIN_SUPPLIED = 0x0000_1000;
        const NEGOTIATE_WORKSTATION_SUPPLIED = 0x0000_2000;
        const RESERVED_7 = 0x0000_4000;
        const NEGOTIATE_ALWAYS_SIGN = 0x0000_8000;
        const TARGET_TYPE_DOMAIN = 0x0001_0000;
        const TARGET_TYPE_SERVER = 0x0002_0000;
        const RESERVED_6 = 0x0004_0000;
        const NEGOTIATE_EXTENDED_SESSIONSECURITY = 0x0008_0000;
        const NEGOTIATE_IDENTIFY = 0x0010_0000;
        const RESERVED_5 = 0x0020_0000;
        const REQUEST_NON_NT_SESSION_KEY = 0x0040_0000;
        const NEGOTIATE_TARGET_INFO = 0x0080_0000;
        const RESERVED_4 = 0x0100_0000;
        const NEGOTIATE_VERSION = 0x0200_0000;
        const RESERVED_3 = 0x0400_0000;
        const RESERVED_2 = 0x0800_0000;
        const RESERVED_1 = 0x1000_0000;
        const NEGOTIATE_128BIT = 0x2000_0000;
        const NEGOTIATE_KEY_EXCHANGE = 0x4000_0000;
        const NEGOTIATE_56BIT = 0x8000_0000;
    }
}
