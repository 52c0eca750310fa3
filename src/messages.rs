//! Encoding and decoding of the three NTLM messages.
//!
//! Every message starts with the `NTLMSSP\0` magic and a 32-bit message type, followed by a fixed
//! header. Variable-length values (strings, responses, target information) live in a payload
//! area after the fixed header and are referenced through [`SecurityBuffer`]s, whose offsets are
//! relative to the start of the message.


use crate::Flags;
use crate::error::{ParsingError, StoringError};

#[cfg(windows)]
use crate::oem_windows::{decode_oem, encode_oem};

#[cfg(not(windows))]
use crate::oem_utf8::{decode_oem, encode_oem};


/// The magic value at the start of every NTLMSSP message.
pub const NTLMSSP_MAGIC: [u8; 8] = *b"NTLMSSP\0";

pub const MESSAGE_TYPE_NEGOTIATE: u32 = 0x0000_0001;
pub const MESSAGE_TYPE_CHALLENGE: u32 = 0x0000_0002;
pub const MESSAGE_TYPE_AUTHENTICATE: u32 = 0x0000_0003;

/// Length of the fixed part of a Negotiate message, including the version field.
pub const NEGOTIATE_HEADER_LEN: usize
    = 8 // magic
    + 4 // message type
    + 4 // flags
    + 8 // supplied domain secbuffer
    + 8 // supplied workstation secbuffer
    + 8 // version
    ;

/// Shortest acceptable Challenge message (no version field).
pub const CHALLENGE_MIN_LEN: usize
    = 8 // magic
    + 4 // message type
    + 8 // target name secbuffer
    + 4 // flags
    + 8 // challenge
    + 8 // reserved
    + 8 // target information secbuffer
    ;

/// Length of the fixed part of a Challenge message, including the version field.
pub const CHALLENGE_HEADER_LEN: usize = CHALLENGE_MIN_LEN + 8;

/// Offset of the version field in an Authenticate message.
const AUTHENTICATE_VERSION_OFFSET: usize
    = 8 // magic
    + 4 // message type
    + 8 // LM response secbuffer
    + 8 // NT response secbuffer
    + 8 // domain name secbuffer
    + 8 // user name secbuffer
    + 8 // workstation name secbuffer
    + 8 // encrypted session key secbuffer
    + 4 // flags
    ;

/// Offset of the Message Integrity Code in an Authenticate message.
pub const MIC_OFFSET: usize = AUTHENTICATE_VERSION_OFFSET + 8;

/// Length of the Message Integrity Code.
pub const MIC_LEN: usize = 16;

/// Length of the fixed part of an Authenticate message, including version and MIC.
pub const AUTHENTICATE_HEADER_LEN: usize = MIC_OFFSET + MIC_LEN;


/// An NTLM message of any type.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Message {
    Negotiate(NegotiateMessage),
    Challenge(ChallengeMessage),
    Authenticate(AuthenticateMessage),
    Other(u32, Vec<u8>),
}
impl Message {
    /// Returns the 32-bit message number identifying the type of this message.
    pub fn message_number(&self) -> u32 {
        match self {
            Self::Negotiate(_) => MESSAGE_TYPE_NEGOTIATE,
            Self::Challenge(_) => MESSAGE_TYPE_CHALLENGE,
            Self::Authenticate(_) => MESSAGE_TYPE_AUTHENTICATE,
            Self::Other(t, _data) => *t,
        }
    }

    /// Serializes the NTLM message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        match self {
            Self::Negotiate(m) => m.to_bytes(),
            Self::Challenge(m) => m.to_bytes(),
            Self::Authenticate(m) => m.to_bytes(),
            Self::Other(msg_num, data) => {
                let mut buf = Vec::with_capacity(12 + data.len());
                buf.extend_from_slice(&NTLMSSP_MAGIC);
                buf.extend_from_slice(&msg_num.to_le_bytes());
                buf.extend_from_slice(data);
                Ok(buf)
            },
        }
    }
}
impl TryFrom<&[u8]> for Message {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let message_type = read_preamble(value, 12)?;
        match message_type {
            MESSAGE_TYPE_NEGOTIATE => NegotiateMessage::try_from(value)
                .map(Message::Negotiate),
            MESSAGE_TYPE_CHALLENGE => ChallengeMessage::try_from(value)
                .map(Message::Challenge),
            MESSAGE_TYPE_AUTHENTICATE => AuthenticateMessage::try_from(value)
                .map(Message::Authenticate),
            other_type => Ok(Message::Other(other_type, Vec::from(&value[12..]))),
        }
    }
}


/// The version of an operating system as well as the NTLM revision used.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct OsVersion {
    pub major_version: u8,
    pub minor_version: u8,
    pub build_number: u16,
    pub reserved: [u8; 3],
    pub ntlm_revision: u8,
}
impl OsVersion {
    /// The NTLMSSP revision defined for Windows Server 2003 and later.
    pub const NTLMSSP_REVISION_W2K3: u8 = 0x0F;

    /// The version announced by default: Windows 10, build 19041.
    pub const CLIENT_DEFAULT: OsVersion = OsVersion {
        major_version: 10,
        minor_version: 0,
        build_number: 19041,
        reserved: [0, 0, 0],
        ntlm_revision: Self::NTLMSSP_REVISION_W2K3,
    };

    /// Serializes the version structure into bytes.
    pub fn to_bytes(&self) -> [u8; 8] {
        let build = self.build_number.to_le_bytes();
        [
            self.major_version,
            self.minor_version,
            build[0],
            build[1],
            self.reserved[0],
            self.reserved[1],
            self.reserved[2],
            self.ntlm_revision,
        ]
    }
}
impl TryFrom<&[u8]> for OsVersion {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != 8 {
            return Err(ParsingError::ItemLengthMismatch { expected: 8, obtained: value.len() });
        }

        Ok(OsVersion {
            major_version: value[0],
            minor_version: value[1],
            build_number: u16::from_le_bytes([value[2], value[3]]),
            reserved: [value[4], value[5], value[6]],
            ntlm_revision: value[7],
        })
    }
}


/// An NTLM security buffer, describing where a value is stored in the payload of a message.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SecurityBuffer {
    pub length: u16,
    pub capacity: u16,
    pub offset: u32,
}
impl SecurityBuffer {
    /// Creates a security buffer describing `len` bytes at `offset`; capacity equals length.
    pub fn new(len: usize, offset: u32) -> Result<Self, StoringError> {
        let length: u16 = len.try_into()
            .or(Err(StoringError::FieldTooLong { length: len }))?;
        Ok(Self {
            length,
            capacity: length,
            offset,
        })
    }

    /// Serializes the security buffer into bytes.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut ret = [0u8; 8];
        ret[0..2].copy_from_slice(&self.length.to_le_bytes());
        ret[2..4].copy_from_slice(&self.capacity.to_le_bytes());
        ret[4..8].copy_from_slice(&self.offset.to_le_bytes());
        ret
    }

    /// Extracts the data described by this security buffer from the complete message.
    ///
    /// `header_len` is the length of the fixed header; a non-empty field may not start within it.
    pub fn apply_to_message<'a>(&self, message: &'a [u8], header_len: usize) -> Result<&'a [u8], ParsingError> {
        if self.length == 0 {
            // short-circuit; empty fields may carry any offset
            return Ok(&message[0..0]);
        }

        let start = usize::try_from(self.offset)
            .or(Err(ParsingError::EndOutOfRange { end: usize::MAX, length: message.len() }))?;
        if start < header_len {
            return Err(ParsingError::OffsetInsideHeader { offset: self.offset, header_len });
        }

        let end = start.checked_add(usize::from(self.length))
            .ok_or(ParsingError::EndOutOfRange { end: usize::MAX, length: message.len() })?;
        if end > message.len() {
            return Err(ParsingError::EndOutOfRange { end, length: message.len() });
        }

        Ok(&message[start..end])
    }
}
impl TryFrom<&[u8]> for SecurityBuffer {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != 8 {
            return Err(ParsingError::ItemLengthMismatch { expected: 8, obtained: value.len() });
        }

        Ok(Self {
            length: u16::from_le_bytes([value[0], value[1]]),
            capacity: u16::from_le_bytes([value[2], value[3]]),
            offset: u32::from_le_bytes([value[4], value[5], value[6], value[7]]),
        })
    }
}


/// Collects security buffers and their payload while a message is being serialized.
///
/// The fixed header is written into `header`; payload data is gathered separately and appended
/// once all header fields are in place.
struct PayloadWriter {
    header: Vec<u8>,
    payload: Vec<u8>,
    next_offset: u32,
}
impl PayloadWriter {
    fn new(message_type: u32, header_len: usize) -> Self {
        let mut header = Vec::with_capacity(header_len);
        header.extend_from_slice(&NTLMSSP_MAGIC);
        header.extend_from_slice(&message_type.to_le_bytes());
        Self {
            header,
            payload: Vec::new(),
            // header lengths are small constants
            next_offset: header_len as u32,
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.header.extend_from_slice(bytes);
    }

    /// Appends a security buffer pointing to `data` and queues `data` for the payload.
    fn append_sec_buffer(&mut self, data: &[u8]) -> Result<(), StoringError> {
        let sb = SecurityBuffer::new(data.len(), self.next_offset)?;
        self.header.extend_from_slice(&sb.to_bytes());
        self.payload.extend_from_slice(data);
        self.next_offset += u32::from(sb.length);
        Ok(())
    }

    /// Like [`Self::append_sec_buffer`], but encodes the string as selected by `flags` first.
    fn append_sec_buffer_string(&mut self, flags: Flags, data: &str) -> Result<(), StoringError> {
        let bs = string_to_ntlm_bytes(flags, data)?;
        self.append_sec_buffer(&bs)
    }

    fn finish(mut self) -> Vec<u8> {
        debug_assert_eq!(self.header.len() as u32 + self.payload.len() as u32, self.next_offset);
        self.header.append(&mut self.payload);
        self.header
    }
}


/// Encodes a string as UTF-16 in little-endian byte order, without a byte order mark.
pub fn utf16_le_bytes(string: &str) -> Vec<u8> {
    string.encode_utf16()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

/// Converts UTF-16 values stored as bytes in little-endian format into a string.
pub fn utf16_le_bytes_to_string(bytes: &[u8]) -> Result<String, ParsingError> {
    if bytes.len() % 2 != 0 {
        return Err(ParsingError::ItemLengthNotDivisible { expected_divisor: 2, obtained_length: bytes.len() });
    }
    let u16s: Vec<u16> = bytes.chunks_exact(2)
        .map(|chk| u16::from_le_bytes([chk[0], chk[1]]))
        .collect();
    String::from_utf16(&u16s)
        .or(Err(ParsingError::InvalidUtf16 { value: u16s }))
}

/// Encodes a string using Unicode or OEM encoding depending on `flags`. Unicode wins if both are
/// set.
pub fn string_to_ntlm_bytes(flags: Flags, data: &str) -> Result<Vec<u8>, StoringError> {
    if flags.contains(Flags::NEGOTIATE_UNICODE) {
        Ok(utf16_le_bytes(data))
    } else if flags.contains(Flags::NEGOTIATE_OEM) {
        encode_oem(data)
            .ok_or_else(|| StoringError::NonOemEncodable { string: data.to_owned() })
    } else {
        Err(StoringError::NeitherUnicodeNorOem)
    }
}

/// Decodes a string using Unicode or OEM encoding depending on `flags`. Empty fields decode to an
/// empty string whatever the flags say.
pub fn ntlm_bytes_to_string(flags: Flags, bytes: &[u8]) -> Result<String, ParsingError> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    if flags.contains(Flags::NEGOTIATE_UNICODE) {
        utf16_le_bytes_to_string(bytes)
    } else if flags.contains(Flags::NEGOTIATE_OEM) {
        decode_oem(bytes)
            .ok_or_else(|| ParsingError::InvalidOemEncoding { value: Vec::from(bytes) })
    } else {
        Err(ParsingError::NeitherUnicodeNorOem)
    }
}


/// Checks magic and length of a message and returns its type.
fn read_preamble(value: &[u8], min_len: usize) -> Result<u32, ParsingError> {
    if value.len() < min_len {
        return Err(ParsingError::ShortHeader { expected_min_len: min_len, obtained_len: value.len() });
    }
    if value[0..8] != NTLMSSP_MAGIC {
        return Err(ParsingError::MagicMismatch { expected: NTLMSSP_MAGIC, obtained: Vec::from(&value[0..8]) });
    }
    Ok(read_u32(value, 8))
}

/// Like [`read_preamble`], but additionally requires a specific message type.
fn expect_preamble(value: &[u8], min_len: usize, expected: u32) -> Result<(), ParsingError> {
    let obtained = read_preamble(value, min_len)?;
    if obtained != expected {
        return Err(ParsingError::MessageTypeMismatch { expected, obtained });
    }
    Ok(())
}

fn read_u32(value: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([value[at], value[at + 1], value[at + 2], value[at + 3]])
}

fn read_sec_buffer(value: &[u8], at: usize) -> Result<SecurityBuffer, ParsingError> {
    SecurityBuffer::try_from(&value[at..at + 8])
}

fn read_flags(value: &[u8], at: usize) -> Flags {
    Flags::from_bits_retain(read_u32(value, at))
}


/// The contents of an NTLM Negotiate message.
///
/// The Negotiate message is the first message in an NTLM challenge-response process and is sent by
/// the client to the server; the server is expected to respond with a Challenge message.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NegotiateMessage {
    /// Stores which information has been specified and which NTLM behavior should be negotiated.
    pub flags: Flags,

    /// The domain against which the client wishes to authenticate.
    pub supplied_domain: String,

    /// The NT hostname of the client.
    pub supplied_workstation: String,

    /// Version information about the client's operating system.
    pub os_version: OsVersion,
}
impl NegotiateMessage {
    /// Serializes the complete Negotiate message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let mut w = PayloadWriter::new(MESSAGE_TYPE_NEGOTIATE, NEGOTIATE_HEADER_LEN);
        w.put(&self.flags.bits().to_le_bytes());
        w.append_sec_buffer_string(self.flags, &self.supplied_domain)?;
        w.append_sec_buffer_string(self.flags, &self.supplied_workstation)?;
        w.put(&self.os_version.to_bytes());
        Ok(w.finish())
    }
}
impl TryFrom<&[u8]> for NegotiateMessage {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        // the version field is optional on the wire
        const MIN_LEN: usize = NEGOTIATE_HEADER_LEN - 8;
        expect_preamble(value, MIN_LEN, MESSAGE_TYPE_NEGOTIATE)?;

        let flags = read_flags(value, 12);
        let supplied_domain_secbuf = read_sec_buffer(value, 16)?;
        let supplied_workstation_secbuf = read_sec_buffer(value, 24)?;
        let has_version = flags.contains(Flags::NEGOTIATE_VERSION) && value.len() >= NEGOTIATE_HEADER_LEN;
        let (os_version, header_len) = if has_version {
            (OsVersion::try_from(&value[32..40])?, NEGOTIATE_HEADER_LEN)
        } else {
            (OsVersion::default(), MIN_LEN)
        };

        let supplied_domain = ntlm_bytes_to_string(flags, supplied_domain_secbuf.apply_to_message(value, header_len)?)?;
        let supplied_workstation = ntlm_bytes_to_string(flags, supplied_workstation_secbuf.apply_to_message(value, header_len)?)?;

        Ok(Self {
            flags,
            supplied_domain,
            supplied_workstation,
            os_version,
        })
    }
}


/// The contents of an NTLM Challenge message.
///
/// The Challenge message is sent by the server in response to the client's Negotiate message; the
/// client is expected to respond with an Authenticate message.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChallengeMessage {
    /// The name of the server or domain against which the client is authenticating.
    pub target_name: String,

    /// Stores which NTLM behavior has been accepted by the server from the client's request.
    pub flags: Flags,

    /// The server challenge.
    pub challenge: [u8; 8],

    /// The reserved field following the challenge.
    pub reserved: [u8; 8],

    /// The raw AV pair list; see [`crate::av_pair`] for decoding it.
    pub target_info: Vec<u8>,

    /// Version information about the server's operating system.
    pub os_version: OsVersion,
}
impl ChallengeMessage {
    /// Serializes the complete Challenge message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let mut w = PayloadWriter::new(MESSAGE_TYPE_CHALLENGE, CHALLENGE_HEADER_LEN);
        w.append_sec_buffer_string(self.flags, &self.target_name)?;
        w.put(&self.flags.bits().to_le_bytes());
        w.put(&self.challenge);
        w.put(&self.reserved);
        w.append_sec_buffer(&self.target_info)?;
        w.put(&self.os_version.to_bytes());
        Ok(w.finish())
    }
}
impl TryFrom<&[u8]> for ChallengeMessage {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        expect_preamble(value, CHALLENGE_MIN_LEN, MESSAGE_TYPE_CHALLENGE)?;

        let target_name_secbuf = read_sec_buffer(value, 12)?;
        let flags = read_flags(value, 20);
        let mut challenge = [0u8; 8];
        challenge.copy_from_slice(&value[24..32]);
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&value[32..40]);
        let target_info_secbuf = read_sec_buffer(value, 40)?;
        let has_version = flags.contains(Flags::NEGOTIATE_VERSION) && value.len() >= CHALLENGE_HEADER_LEN;
        let (os_version, header_len) = if has_version {
            (OsVersion::try_from(&value[48..56])?, CHALLENGE_HEADER_LEN)
        } else {
            (OsVersion::default(), CHALLENGE_MIN_LEN)
        };

        // fields may not overlap the version either once it has been read
        let target_name_bytes = target_name_secbuf.apply_to_message(value, header_len)?;
        let target_info_bytes = target_info_secbuf.apply_to_message(value, header_len)?;

        let target_name = ntlm_bytes_to_string(flags, target_name_bytes)?;

        Ok(Self {
            target_name,
            flags,
            challenge,
            reserved,
            target_info: Vec::from(target_info_bytes),
            os_version,
        })
    }
}


/// The contents of an NTLM Authenticate message.
///
/// The Authenticate message is sent by the client in response to the server's Challenge message;
/// once it is accepted by the server, the authentication has succeeded.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AuthenticateMessage {
    pub lm_response: Vec<u8>,
    pub nt_response: Vec<u8>,
    pub domain_name: String,
    pub user_name: String,
    pub workstation_name: String,
    pub encrypted_session_key: Vec<u8>,
    pub flags: Flags,
    pub os_version: OsVersion,

    /// The Message Integrity Code; `None` is written as zeroes.
    pub mic: Option<[u8; MIC_LEN]>,
}
impl AuthenticateMessage {
    /// Serializes the complete Authenticate message into bytes.
    ///
    /// The version and MIC fields are always present.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let mut w = PayloadWriter::new(MESSAGE_TYPE_AUTHENTICATE, AUTHENTICATE_HEADER_LEN);
        w.append_sec_buffer(&self.lm_response)?;
        w.append_sec_buffer(&self.nt_response)?;
        w.append_sec_buffer_string(self.flags, &self.domain_name)?;
        w.append_sec_buffer_string(self.flags, &self.user_name)?;
        w.append_sec_buffer_string(self.flags, &self.workstation_name)?;
        w.append_sec_buffer(&self.encrypted_session_key)?;
        w.put(&self.flags.bits().to_le_bytes());
        w.put(&self.os_version.to_bytes());
        w.put(&self.mic.unwrap_or([0u8; MIC_LEN]));
        Ok(w.finish())
    }
}
impl TryFrom<&[u8]> for AuthenticateMessage {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        expect_preamble(value, AUTHENTICATE_VERSION_OFFSET, MESSAGE_TYPE_AUTHENTICATE)?;

        let secbufs = [
            read_sec_buffer(value, 12)?,
            read_sec_buffer(value, 20)?,
            read_sec_buffer(value, 28)?,
            read_sec_buffer(value, 36)?,
            read_sec_buffer(value, 44)?,
            read_sec_buffer(value, 52)?,
        ];
        let flags = read_flags(value, 60);

        // version and MIC are only present if the payload leaves room for them
        let payload_start = secbufs.iter()
            .filter(|sb| sb.length > 0)
            .map(|sb| sb.offset as usize)
            .min()
            .unwrap_or(value.len())
            .min(value.len());
        let os_version = if flags.contains(Flags::NEGOTIATE_VERSION) && payload_start >= MIC_OFFSET {
            OsVersion::try_from(&value[AUTHENTICATE_VERSION_OFFSET..MIC_OFFSET])?
        } else {
            OsVersion::default()
        };
        let mic = if payload_start >= AUTHENTICATE_HEADER_LEN {
            let mut mic = [0u8; MIC_LEN];
            mic.copy_from_slice(&value[MIC_OFFSET..AUTHENTICATE_HEADER_LEN]);
            Some(mic)
        } else {
            None
        };

        let header_len = if mic.is_some() {
            AUTHENTICATE_HEADER_LEN
        } else if flags.contains(Flags::NEGOTIATE_VERSION) && payload_start >= MIC_OFFSET {
            MIC_OFFSET
        } else {
            AUTHENTICATE_VERSION_OFFSET
        };

        let mut fields = Vec::with_capacity(secbufs.len());
        for sb in &secbufs {
            fields.push(sb.apply_to_message(value, header_len)?);
        }

        Ok(Self {
            lm_response: Vec::from(fields[0]),
            nt_response: Vec::from(fields[1]),
            domain_name: ntlm_bytes_to_string(flags, fields[2])?,
            user_name: ntlm_bytes_to_string(flags, fields[3])?,
            workstation_name: ntlm_bytes_to_string(flags, fields[4])?,
            encrypted_session_key: Vec::from(fields[5]),
            flags,
            os_version,
            mic,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn unicode_flags() -> Flags {
        Flags::NEGOTIATE_UNICODE | Flags::REQUEST_TARGET | Flags::NEGOTIATE_NTLM | Flags::NEGOTIATE_VERSION
    }

    #[test]
    fn negotiate_layout() {
        let msg = NegotiateMessage {
            flags: unicode_flags() | Flags::NEGOTIATE_DOMAIN_SUPPLIED | Flags::NEGOTIATE_WORKSTATION_SUPPLIED,
            supplied_domain: "DOM".to_owned(),
            supplied_workstation: "WS".to_owned(),
            os_version: OsVersion::CLIENT_DEFAULT,
        };
        let bytes = msg.to_bytes().unwrap();

        assert_eq!(&bytes[0..8], b"NTLMSSP\0");
        assert_eq!(&bytes[8..12], &[1, 0, 0, 0]);
        assert_eq!(bytes.len(), NEGOTIATE_HEADER_LEN + 6 + 4);

        // domain: len 6, maxlen 6, offset 40
        assert_eq!(&bytes[16..24], &[6, 0, 6, 0, 40, 0, 0, 0]);
        // workstation: len 4, maxlen 4, offset 46
        assert_eq!(&bytes[24..32], &[4, 0, 4, 0, 46, 0, 0, 0]);
        assert_eq!(&bytes[32..40], &OsVersion::CLIENT_DEFAULT.to_bytes());
        assert_eq!(&bytes[40..46], &[b'D', 0, b'O', 0, b'M', 0]);

        assert_eq!(NegotiateMessage::try_from(bytes.as_slice()).unwrap(), msg);
    }

    #[test]
    fn negotiate_oem_strings() {
        let msg = NegotiateMessage {
            flags: Flags::NEGOTIATE_OEM | Flags::NEGOTIATE_DOMAIN_SUPPLIED,
            supplied_domain: "CORP".to_owned(),
            supplied_workstation: String::new(),
            os_version: OsVersion::default(),
        };
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(&bytes[40..], b"CORP");
        // empty workstation points at the end of the payload
        assert_eq!(&bytes[24..32], &[0, 0, 0, 0, 44, 0, 0, 0]);
    }

    #[test]
    fn strings_need_an_encoding() {
        let msg = NegotiateMessage {
            flags: Flags::REQUEST_TARGET,
            supplied_domain: String::new(),
            supplied_workstation: String::new(),
            os_version: OsVersion::default(),
        };
        assert_eq!(msg.to_bytes(), Err(StoringError::NeitherUnicodeNorOem));
    }

    #[test]
    fn challenge_round_trip() {
        let msg = ChallengeMessage {
            target_name: "SERVER".to_owned(),
            flags: unicode_flags() | Flags::NEGOTIATE_TARGET_INFO,
            challenge: [1, 2, 3, 4, 5, 6, 7, 8],
            reserved: [0; 8],
            target_info: vec![1, 0, 2, 0, b'S', 0, 0, 0, 0, 0],
            os_version: OsVersion::CLIENT_DEFAULT,
        };
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(&bytes[24..32], &[1, 2, 3, 4, 5, 6, 7, 8]);
        // target name at 56, target info right after it
        assert_eq!(&bytes[12..20], &[12, 0, 12, 0, 56, 0, 0, 0]);
        assert_eq!(&bytes[40..48], &[10, 0, 10, 0, 68, 0, 0, 0]);

        assert_eq!(ChallengeMessage::try_from(bytes.as_slice()).unwrap(), msg);
    }

    #[test]
    fn challenge_too_short() {
        let mut bytes = vec![0u8; CHALLENGE_MIN_LEN - 1];
        bytes[0..8].copy_from_slice(&NTLMSSP_MAGIC);
        bytes[8] = 2;
        assert_eq!(
            ChallengeMessage::try_from(bytes.as_slice()),
            Err(ParsingError::ShortHeader { expected_min_len: CHALLENGE_MIN_LEN, obtained_len: CHALLENGE_MIN_LEN - 1 }),
        );
    }

    #[test]
    fn challenge_wrong_magic_and_type() {
        let mut bytes = vec![0u8; CHALLENGE_MIN_LEN];
        bytes[0..8].copy_from_slice(b"NTLMSSQ\0");
        assert!(matches!(
            ChallengeMessage::try_from(bytes.as_slice()),
            Err(ParsingError::MagicMismatch { .. }),
        ));

        bytes[0..8].copy_from_slice(&NTLMSSP_MAGIC);
        bytes[8] = 3;
        assert_eq!(
            ChallengeMessage::try_from(bytes.as_slice()),
            Err(ParsingError::MessageTypeMismatch { expected: 2, obtained: 3 }),
        );
    }

    #[test]
    fn challenge_field_out_of_bounds() {
        let msg = ChallengeMessage {
            target_name: String::new(),
            flags: unicode_flags(),
            challenge: [0; 8],
            reserved: [0; 8],
            target_info: vec![0, 0, 0, 0],
            os_version: OsVersion::default(),
        };
        let mut bytes = msg.to_bytes().unwrap();
        // claim 32 bytes of target info
        bytes[40] = 32;
        assert_eq!(
            ChallengeMessage::try_from(bytes.as_slice()),
            Err(ParsingError::EndOutOfRange { end: 56 + 32, length: 60 }),
        );

        // point the target info into the fixed header
        bytes[40] = 4;
        bytes[44] = 8;
        assert_eq!(
            ChallengeMessage::try_from(bytes.as_slice()),
            Err(ParsingError::OffsetInsideHeader { offset: 8, header_len: CHALLENGE_HEADER_LEN }),
        );

        // point the target info at the version field that was read
        bytes[40] = 8;
        bytes[44] = 48;
        assert_eq!(
            ChallengeMessage::try_from(bytes.as_slice()),
            Err(ParsingError::OffsetInsideHeader { offset: 48, header_len: CHALLENGE_HEADER_LEN }),
        );

        // without the version flag, the same bytes are payload
        let flags = unicode_flags() - Flags::NEGOTIATE_VERSION;
        bytes[20..24].copy_from_slice(&flags.bits().to_le_bytes());
        let parsed = ChallengeMessage::try_from(bytes.as_slice()).unwrap();
        assert_eq!(parsed.target_info.len(), 8);
        assert_eq!(parsed.os_version, OsVersion::default());
    }

    #[test]
    fn negotiate_field_inside_version() {
        let msg = NegotiateMessage {
            flags: unicode_flags() | Flags::NEGOTIATE_DOMAIN_SUPPLIED,
            supplied_domain: "DOM".to_owned(),
            supplied_workstation: String::new(),
            os_version: OsVersion::CLIENT_DEFAULT,
        };
        let mut bytes = msg.to_bytes().unwrap();
        // domain descriptor: offset 32 (the version field) instead of 40
        bytes[20] = 32;
        assert_eq!(
            NegotiateMessage::try_from(bytes.as_slice()),
            Err(ParsingError::OffsetInsideHeader { offset: 32, header_len: NEGOTIATE_HEADER_LEN }),
        );
    }

    #[test]
    fn authenticate_layout_and_mic_position() {
        let msg = AuthenticateMessage {
            lm_response: vec![0xAA; 24],
            nt_response: vec![0xBB; 24],
            domain_name: "D".to_owned(),
            user_name: "U".to_owned(),
            workstation_name: "W".to_owned(),
            encrypted_session_key: vec![0xCC; 16],
            flags: unicode_flags() | Flags::NEGOTIATE_KEY_EXCHANGE,
            os_version: OsVersion::CLIENT_DEFAULT,
            mic: Some([0x11; MIC_LEN]),
        };
        let bytes = msg.to_bytes().unwrap();

        assert_eq!(bytes.len(), AUTHENTICATE_HEADER_LEN + 24 + 24 + 2 + 2 + 2 + 16);
        assert_eq!(&bytes[12..20], &[24, 0, 24, 0, 88, 0, 0, 0]);
        assert_eq!(&bytes[20..28], &[24, 0, 24, 0, 112, 0, 0, 0]);
        assert_eq!(&bytes[MIC_OFFSET..AUTHENTICATE_HEADER_LEN], &[0x11; MIC_LEN]);
        assert_eq!(&bytes[bytes.len() - 16..], &[0xCC; 16]);

        assert_eq!(AuthenticateMessage::try_from(bytes.as_slice()).unwrap(), msg);
    }

    #[test]
    fn message_dispatch() {
        let msg = NegotiateMessage {
            flags: unicode_flags(),
            supplied_domain: String::new(),
            supplied_workstation: String::new(),
            os_version: OsVersion::default(),
        };
        let bytes = Message::Negotiate(msg.clone()).to_bytes().unwrap();
        assert_eq!(Message::try_from(bytes.as_slice()).unwrap(), Message::Negotiate(msg));

        let other = Message::Other(7, vec![1, 2, 3]);
        let bytes = other.to_bytes().unwrap();
        assert_eq!(Message::try_from(bytes.as_slice()).unwrap(), other);
    }

    #[test]
    fn security_buffer_bounds() {
        let sb = SecurityBuffer::new(4, 10).unwrap();
        let message = [0u8; 14];
        assert_eq!(sb.apply_to_message(&message, 8).unwrap().len(), 4);
        assert!(SecurityBuffer::new(4, 11).unwrap().apply_to_message(&message, 8).is_err());
        assert_eq!(SecurityBuffer::new(70_000, 0), Err(StoringError::FieldTooLong { length: 70_000 }));
    }
}
