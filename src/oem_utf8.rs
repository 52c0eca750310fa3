//! OEM string conversion for operating systems other than Windows.
//!
//! There is no system-wide OEM code page outside of Windows; practically every such system runs
//! with a UTF-8 locale, so OEM strings are treated as UTF-8.


/// Decodes an OEM-encoded byte string.
pub fn decode_oem(oem_bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(oem_bytes)
        .ok()
        .map(|s| s.to_owned())
}


/// Encodes a string using the OEM encoding.
pub fn encode_oem(string: &str) -> Option<Vec<u8>> {
    Some(string.as_bytes().to_vec())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(encode_oem("WORKSTATION").unwrap(), b"WORKSTATION");
        assert_eq!(decode_oem(b"DOMAIN").unwrap(), "DOMAIN");
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert_eq!(decode_oem(&[0xC3, 0x28]), None);
    }
}
