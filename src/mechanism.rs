//! The interface an outer negotiation framework (such as SPNEGO) uses to drive a security
//! mechanism.


use crate::error::Result;
use crate::keys::Key;
use crate::session::Session;


/// The NTLM mechanism OID, 1.3.6.1.4.1.311.2.2.10.
pub const NTLM_OID: &str = "1.3.6.1.4.1.311.2.2.10";

/// [`NTLM_OID`] in DER encoding, without tag and length.
pub const NTLM_OID_DER: [u8; 10] = [0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0a];


/// A client-side security mechanism.
pub trait Mechanism {
    /// The DER-encoded OID identifying the mechanism.
    fn mechanism_oid(&self) -> &'static [u8];

    /// Produces the initial token.
    fn init_sec_context(&mut self) -> Result<Vec<u8>>;

    /// Consumes the peer's token and produces the next one.
    fn accept_sec_context(&mut self, token: &[u8]) -> Result<Vec<u8>>;

    /// Computes the integrity code of a message.
    fn get_mic(&mut self, message: &[u8]) -> Result<Vec<u8>>;

    /// The key established by the mechanism.
    fn session_key(&self) -> Result<Key>;
}

impl Mechanism for Session {
    fn mechanism_oid(&self) -> &'static [u8] {
        &NTLM_OID_DER
    }

    fn init_sec_context(&mut self) -> Result<Vec<u8>> {
        Session::init_sec_context(self)
    }

    fn accept_sec_context(&mut self, token: &[u8]) -> Result<Vec<u8>> {
        Session::accept_sec_context(self, token)
    }

    fn get_mic(&mut self, message: &[u8]) -> Result<Vec<u8>> {
        Session::get_mic(self, message)
    }

    fn session_key(&self) -> Result<Key> {
        Session::session_key(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionConfig;

    fn drive(mechanism: &mut dyn Mechanism) -> Vec<u8> {
        mechanism.init_sec_context().unwrap()
    }

    #[test]
    fn session_as_mechanism() {
        let mut session = Session::new(SessionConfig::new("User", "Password"));
        assert_eq!(session.mechanism_oid(), &NTLM_OID_DER);
        let negotiate = drive(&mut session);
        assert_eq!(&negotiate[0..8], b"NTLMSSP\0");
        assert!(Mechanism::session_key(&session).is_err());
    }
}
