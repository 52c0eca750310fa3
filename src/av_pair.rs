//! Attribute-value pairs carried in the target information field of the Challenge message.
//!
//! Each pair is encoded as `type: u16`, `length: u16`, followed by `length` bytes of value; the
//! list is terminated by an entry of type [`TargetInfoType::Terminator`] with length zero.


use crate::error::{ParsingError, StoringError};
use crate::messages::{utf16_le_bytes, utf16_le_bytes_to_string};


/// The type of an AV pair.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TargetInfoType {
    Terminator,
    NtServer,
    NtDomain,
    DnsServer,
    DnsDomain,
    DnsForest,
    Flags,
    Timestamp,
    SingleHost,
    TargetName,
    ChannelBindings,
    Unknown(u16),
}
impl From<TargetInfoType> for u16 {
    fn from(t: TargetInfoType) -> Self {
        match t {
            TargetInfoType::Terminator => 0x0000,
            TargetInfoType::NtServer => 0x0001,
            TargetInfoType::NtDomain => 0x0002,
            TargetInfoType::DnsServer => 0x0003,
            TargetInfoType::DnsDomain => 0x0004,
            TargetInfoType::DnsForest => 0x0005,
            TargetInfoType::Flags => 0x0006,
            TargetInfoType::Timestamp => 0x0007,
            TargetInfoType::SingleHost => 0x0008,
            TargetInfoType::TargetName => 0x0009,
            TargetInfoType::ChannelBindings => 0x000A,
            TargetInfoType::Unknown(w) => w,
        }
    }
}
impl From<u16> for TargetInfoType {
    fn from(w: u16) -> Self {
        match w {
            0x0000 => TargetInfoType::Terminator,
            0x0001 => TargetInfoType::NtServer,
            0x0002 => TargetInfoType::NtDomain,
            0x0003 => TargetInfoType::DnsServer,
            0x0004 => TargetInfoType::DnsDomain,
            0x0005 => TargetInfoType::DnsForest,
            0x0006 => TargetInfoType::Flags,
            0x0007 => TargetInfoType::Timestamp,
            0x0008 => TargetInfoType::SingleHost,
            0x0009 => TargetInfoType::TargetName,
            0x000A => TargetInfoType::ChannelBindings,
            other => TargetInfoType::Unknown(other),
        }
    }
}

/// Bits of the value of a [`TargetInfoType::Flags`] pair.
pub const AV_FLAG_ACCOUNT_CONSTRAINED: u32 = 0x0000_0001;
pub const AV_FLAG_MIC_PRESENT: u32 = 0x0000_0002;
pub const AV_FLAG_UNTRUSTED_SPN_SOURCE: u32 = 0x0000_0004;


/// A single AV pair.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TargetInfoEntry {
    pub entry_type: TargetInfoType,
    pub data: Vec<u8>,
}
impl TargetInfoEntry {
    /// Serializes the entry into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let entry_type_u16: u16 = self.entry_type.into();
        let bytes_len: u16 = self.data.len().try_into()
            .or(Err(StoringError::FieldTooLong { length: self.data.len() }))?;

        let mut ret = Vec::with_capacity(4 + self.data.len());
        ret.extend_from_slice(&entry_type_u16.to_le_bytes());
        ret.extend_from_slice(&bytes_len.to_le_bytes());
        ret.extend_from_slice(&self.data);
        Ok(ret)
    }

    /// Attempts to deserialize an entry from the start of `bytes`. If successful, returns the entry
    /// as well as the bytes following it.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), ParsingError> {
        if bytes.len() < 4 {
            return Err(ParsingError::ItemMinLengthMismatch { expected_at_least: 4, obtained: bytes.len() });
        }

        let entry_type = TargetInfoType::from(u16::from_le_bytes([bytes[0], bytes[1]]));
        let length = usize::from(u16::from_le_bytes([bytes[2], bytes[3]]));

        if length + 4 > bytes.len() {
            return Err(ParsingError::ItemMinLengthMismatch { expected_at_least: length + 4, obtained: bytes.len() });
        }

        let entry = Self {
            entry_type,
            data: Vec::from(&bytes[4..4 + length]),
        };
        Ok((entry, &bytes[4 + length..]))
    }

    /// Creates an entry from an entry type and a string; AV pair strings are always UTF-16.
    pub fn from_string(entry_type: TargetInfoType, string: &str) -> Self {
        Self {
            entry_type,
            data: utf16_le_bytes(string),
        }
    }

    /// Attempts to convert the data within this entry into a string.
    pub fn to_string(&self) -> Result<String, ParsingError> {
        utf16_le_bytes_to_string(&self.data)
    }

    /// Creates a [`TargetInfoType::Flags`] entry.
    pub fn from_flags(flags: u32) -> Self {
        Self {
            entry_type: TargetInfoType::Flags,
            data: flags.to_le_bytes().to_vec(),
        }
    }

    /// Creates a [`TargetInfoType::Timestamp`] entry from a FILETIME value.
    pub fn from_timestamp(filetime: u64) -> Self {
        Self {
            entry_type: TargetInfoType::Timestamp,
            data: filetime.to_le_bytes().to_vec(),
        }
    }

    /// Interprets the data as a little-endian `u32`.
    fn as_u32(&self) -> Result<u32, ParsingError> {
        let arr: [u8; 4] = self.data.as_slice().try_into()
            .or(Err(ParsingError::ItemLengthMismatch { expected: 4, obtained: self.data.len() }))?;
        Ok(u32::from_le_bytes(arr))
    }

    /// Interprets the data as a little-endian `u64`.
    fn as_u64(&self) -> Result<u64, ParsingError> {
        let arr: [u8; 8] = self.data.as_slice().try_into()
            .or(Err(ParsingError::ItemLengthMismatch { expected: 8, obtained: self.data.len() }))?;
        Ok(u64::from_le_bytes(arr))
    }
}


/// Lazily decodes AV pairs from a target information buffer.
///
/// The iterator stops at the terminator or at the end of the buffer, whichever comes first; after
/// yielding an error it is exhausted. Cloning it restarts decoding from the clone's position.
#[derive(Clone, Debug)]
pub struct AvPairIter<'a> {
    rest: &'a [u8],
}
impl<'a> AvPairIter<'a> {
    pub fn new(target_info: &'a [u8]) -> Self {
        Self { rest: target_info }
    }
}
impl<'a> Iterator for AvPairIter<'a> {
    type Item = Result<TargetInfoEntry, ParsingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        match TargetInfoEntry::try_from_bytes(self.rest) {
            Ok((entry, _)) if entry.entry_type == TargetInfoType::Terminator => {
                self.rest = &[];
                None
            },
            Ok((entry, next)) => {
                self.rest = next;
                Some(Ok(entry))
            },
            Err(e) => {
                self.rest = &[];
                Some(Err(e))
            },
        }
    }
}

/// Serializes a list of AV pairs, appending the terminator.
///
/// Terminator entries within `entries` are skipped.
pub fn encode_av_pairs<'a, I: IntoIterator<Item = &'a TargetInfoEntry>>(entries: I) -> Result<Vec<u8>, StoringError> {
    let mut ret = Vec::new();
    for entry in entries {
        if entry.entry_type == TargetInfoType::Terminator {
            continue;
        }
        ret.extend_from_slice(&entry.to_bytes()?);
    }
    ret.extend_from_slice(&[0, 0, 0, 0]);
    Ok(ret)
}


/// The target information sent by the server, with the well-known entries picked out.
///
/// All entries, including unknown ones, are kept in their original order in `entries`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TargetInformation {
    pub nb_computer_name: Option<String>,
    pub nb_domain_name: Option<String>,
    pub dns_computer_name: Option<String>,
    pub dns_domain_name: Option<String>,
    pub dns_tree_name: Option<String>,
    pub flags: Option<u32>,
    pub timestamp: Option<u64>,
    pub single_host: Option<Vec<u8>>,
    pub target_name: Option<String>,
    pub channel_bindings: Option<Vec<u8>>,
    pub entries: Vec<TargetInfoEntry>,
}
impl TargetInformation {
    /// Decodes the target information field of a Challenge message.
    ///
    /// Only a pair that runs past the end of the buffer is an error. A well-known pair whose value
    /// cannot be interpreted (a name that is not UTF-16, flags that are not four bytes) leaves its
    /// field `None` and is kept, undecoded, in `entries`.
    pub fn parse(target_info: &[u8]) -> Result<Self, ParsingError> {
        let mut ti = Self::default();
        for entry in AvPairIter::new(target_info) {
            let entry = entry?;
            match entry.entry_type {
                TargetInfoType::NtServer => ti.nb_computer_name = entry.to_string().ok(),
                TargetInfoType::NtDomain => ti.nb_domain_name = entry.to_string().ok(),
                TargetInfoType::DnsServer => ti.dns_computer_name = entry.to_string().ok(),
                TargetInfoType::DnsDomain => ti.dns_domain_name = entry.to_string().ok(),
                TargetInfoType::DnsForest => ti.dns_tree_name = entry.to_string().ok(),
                TargetInfoType::Flags => ti.flags = entry.as_u32().ok(),
                TargetInfoType::Timestamp => ti.timestamp = entry.as_u64().ok(),
                TargetInfoType::SingleHost => ti.single_host = Some(entry.data.clone()),
                TargetInfoType::TargetName => ti.target_name = entry.to_string().ok(),
                TargetInfoType::ChannelBindings => ti.channel_bindings = Some(entry.data.clone()),
                TargetInfoType::Terminator | TargetInfoType::Unknown(_) => {},
            }
            ti.entries.push(entry);
        }
        Ok(ti)
    }

    /// Serializes the entries, including the terminator.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        encode_av_pairs(&self.entries)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let entries = vec![
            TargetInfoEntry::from_string(TargetInfoType::NtDomain, "Domain"),
            TargetInfoEntry::from_string(TargetInfoType::NtServer, "Server"),
            TargetInfoEntry::from_timestamp(0x01D0_0000_0000_0000),
            TargetInfoEntry { entry_type: TargetInfoType::Unknown(0x00F0), data: vec![1, 2, 3] },
        ];
        encode_av_pairs(&entries).unwrap()
    }

    #[test]
    fn parse_known_and_unknown() {
        let ti = TargetInformation::parse(&sample()).unwrap();
        assert_eq!(ti.nb_domain_name.as_deref(), Some("Domain"));
        assert_eq!(ti.nb_computer_name.as_deref(), Some("Server"));
        assert_eq!(ti.timestamp, Some(0x01D0_0000_0000_0000));
        assert_eq!(ti.flags, None);
        assert_eq!(ti.entries.len(), 4);
        assert_eq!(ti.entries[3].entry_type, TargetInfoType::Unknown(0x00F0));
        assert_eq!(ti.to_bytes().unwrap(), sample());
    }

    #[test]
    fn undecodable_values_stay_opaque() {
        let entries = vec![
            TargetInfoEntry { entry_type: TargetInfoType::NtServer, data: vec![b'S', 0, b'r'] },
            TargetInfoEntry { entry_type: TargetInfoType::DnsDomain, data: vec![0x00, 0xD8, 0x41, 0x00] },
            TargetInfoEntry { entry_type: TargetInfoType::Flags, data: vec![0x02, 0x00, 0x00] },
            TargetInfoEntry::from_string(TargetInfoType::NtDomain, "Domain"),
        ];
        let ti = TargetInformation::parse(&encode_av_pairs(&entries).unwrap()).unwrap();
        assert_eq!(ti.nb_computer_name, None);
        assert_eq!(ti.dns_domain_name, None);
        assert_eq!(ti.flags, None);
        assert_eq!(ti.nb_domain_name.as_deref(), Some("Domain"));
        assert_eq!(ti.entries, entries);
    }

    #[test]
    fn stops_at_terminator() {
        let mut bytes = sample();
        bytes.extend_from_slice(&[1, 0, 2, 0, b'X', 0]);
        assert_eq!(AvPairIter::new(&bytes).count(), 4);
    }

    #[test]
    fn missing_terminator_is_tolerated() {
        let entry = TargetInfoEntry::from_string(TargetInfoType::DnsDomain, "corp.example");
        let bytes = entry.to_bytes().unwrap();
        let decoded: Vec<_> = AvPairIter::new(&bytes).collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded, vec![entry]);
    }

    #[test]
    fn overlong_value_is_an_error() {
        let bytes = [2, 0, 10, 0, b'D', 0, 0, 0];
        let mut iter = AvPairIter::new(&bytes);
        assert_eq!(
            iter.next(),
            Some(Err(ParsingError::ItemMinLengthMismatch { expected_at_least: 14, obtained: 8 })),
        );
        assert_eq!(iter.next(), None);
        assert!(TargetInformation::parse(&bytes).is_err());
    }

    #[test]
    fn iterator_restarts_from_clone() {
        let bytes = sample();
        let iter = AvPairIter::new(&bytes);
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn flags_must_be_four_bytes() {
        let entries = [TargetInfoEntry { entry_type: TargetInfoType::Flags, data: vec![2, 0] }];
        let bytes = encode_av_pairs(&entries).unwrap();
        assert_eq!(
            TargetInformation::parse(&bytes),
            Err(ParsingError::ItemLengthMismatch { expected: 4, obtained: 2 }),
        );
    }
}
