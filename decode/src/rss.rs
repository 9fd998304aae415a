// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Receive-side scaling (RSS) configuration records.

use crate::utils::Reader;
use crate::Error;
use crate::Record;
use std::fmt;

/// The largest hash key the firmware reports.
pub const HASH_KEY_LEN_MAX: usize = 128;

/// The largest redirection table the firmware reports.
pub const RETA_SIZE_MAX: usize = 2048;

/// The number of traffic classes.
pub const MAX_TC_NUM: usize = 8;

/// The size of the buffer a response is reassembled into, set by the largest
/// feature (the redirection table).
pub const FEATURE_INFO_SIZE: usize = 4 + 2 * RETA_SIZE_MAX;

crate::code_enum! {
    name = HashAlgo,
    description = "The RSS hash algorithm.",
    variants = {
        0, Toeplitz, "Toeplitz",
        1, SimpleXor, "Simple-XOR",
        2, SymmetricToeplitz, "Symmetric Toeplitz",
    },
    other = Unknown,
    other_display = "unknown",
}

impl HashAlgo {
    pub fn parse(buf: &[u8]) -> Result<Self, Error> {
        Reader::new(buf).u8().map(HashAlgo::from)
    }
}

/// The RSS hash key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashKey {
    pub key_len: u16,
    pub key: [u8; HASH_KEY_LEN_MAX],
}

impl HashKey {
    /// The bytes of the key, and whether the reported length was truncated.
    pub fn bytes(&self) -> (&[u8], bool) {
        let len = usize::from(self.key_len);
        if len > HASH_KEY_LEN_MAX {
            (&self.key[..], true)
        } else {
            (&self.key[..len], false)
        }
    }
}

impl Record for HashKey {
    const SIZE: usize = 4 + HASH_KEY_LEN_MAX;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let key_len = r.u16()?;
        r.skip(2)?;
        let key = r.array()?;
        Ok(Self { key_len, key })
    }
}

/// The packet types RSS can hash on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    Ipv4Frag,
    Ipv4Tcp,
    Ipv4Udp,
    Ipv4Sctp,
    Ipv4Other,
    Ipv6Frag,
    Ipv6Tcp,
    Ipv6Udp,
    Ipv6Sctp,
    Ipv6Other,
}

impl PacketType {
    pub const ALL: [PacketType; 10] = [
        PacketType::Ipv4Frag,
        PacketType::Ipv4Tcp,
        PacketType::Ipv4Udp,
        PacketType::Ipv4Sctp,
        PacketType::Ipv4Other,
        PacketType::Ipv6Frag,
        PacketType::Ipv6Tcp,
        PacketType::Ipv6Udp,
        PacketType::Ipv6Sctp,
        PacketType::Ipv6Other,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            PacketType::Ipv4Frag => "ipv4-frag",
            PacketType::Ipv4Tcp => "ipv4-tcp",
            PacketType::Ipv4Udp => "ipv4-udp",
            PacketType::Ipv4Sctp => "ipv4-sctp",
            PacketType::Ipv4Other => "ipv4-other",
            PacketType::Ipv6Frag => "ipv6-frag",
            PacketType::Ipv6Tcp => "ipv6-tcp",
            PacketType::Ipv6Udp => "ipv6-udp",
            PacketType::Ipv6Sctp => "ipv6-sctp",
            PacketType::Ipv6Other => "ipv6-other",
        }
    }

    const fn is_ipv6(&self) -> bool {
        matches!(
            self,
            PacketType::Ipv6Frag
                | PacketType::Ipv6Tcp
                | PacketType::Ipv6Udp
                | PacketType::Ipv6Sctp
                | PacketType::Ipv6Other
        )
    }

    /// The field bits of this type, relative to its address family's word.
    const fn fields(&self) -> &'static [(u32, &'static str)] {
        match self {
            PacketType::Ipv4Frag | PacketType::Ipv6Frag => &[(16, "IP_S"), (15, "IP_D")],
            PacketType::Ipv4Tcp | PacketType::Ipv6Tcp => {
                &[(3, "IP_S"), (2, "IP_D"), (1, "TCP_S"), (0, "TCP_D")]
            }
            PacketType::Ipv4Udp | PacketType::Ipv6Udp => {
                &[(7, "IP_S"), (6, "IP_D"), (5, "UDP_S"), (4, "UDP_D")]
            }
            PacketType::Ipv4Sctp | PacketType::Ipv6Sctp => &[
                (11, "IP_S"),
                (10, "IP_D"),
                (9, "SCTP_S"),
                (8, "SCTP_D"),
                (12, "SCTP_VTAG"),
            ],
            PacketType::Ipv4Other | PacketType::Ipv6Other => &[(14, "IP_S"), (13, "IP_D")],
        }
    }

    /// The bits of the tuple word belonging to this packet type.
    pub fn mask(&self) -> u64 {
        let shift = if self.is_ipv6() { 32 } else { 0 };
        self.fields()
            .iter()
            .fold(0u64, |acc, (bit, _)| acc | 1 << (bit + shift))
    }
}

/// The hashed fields per packet type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TupleFields(pub u64);

impl TupleFields {
    pub fn is_disabled(&self) -> bool {
        self.0 == 0
    }

    /// The names of the fields enabled for `ty`, in display order, or `None`
    /// if the type is not hashed at all.
    pub fn enabled(&self, ty: PacketType) -> Option<Vec<&'static str>> {
        if self.0 & ty.mask() == 0 {
            return None;
        }
        let shift = if ty.is_ipv6() { 32 } else { 0 };
        Some(
            ty.fields()
                .iter()
                .map(|(bit, name)| {
                    if self.0 & (1 << (bit + shift)) != 0 {
                        *name
                    } else {
                        ""
                    }
                })
                .collect(),
        )
    }
}

impl Record for TupleFields {
    const SIZE: usize = 16;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let out = r.u64()?;
        r.skip(8)?;
        Ok(Self(out))
    }
}

/// The RSS redirection table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reta {
    pub reta_size: u16,
    pub reta: Vec<u16>,
}

impl Reta {
    /// The entries the firmware reported, and whether the size was truncated.
    pub fn entries(&self) -> (&[u16], bool) {
        let len = usize::from(self.reta_size);
        if len > RETA_SIZE_MAX {
            (&self.reta[..], true)
        } else {
            (&self.reta[..len], false)
        }
    }
}

impl Record for Reta {
    const SIZE: usize = FEATURE_INFO_SIZE;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let reta_size = r.u16()?;
        r.skip(2)?;
        let reta = (0..RETA_SIZE_MAX)
            .map(|_| r.u16())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { reta_size, reta })
    }
}

/// The queue range of one traffic class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TcMode {
    pub tc_offset: u16,
    pub tc_size: u16,
    pub tc_valid: u8,
}

impl Record for TcMode {
    const SIZE: usize = 8;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let tc_offset = r.u16()?;
        let tc_size = r.u16()?;
        let tc_valid = r.u8()?;
        Ok(Self {
            tc_offset,
            tc_size,
            tc_valid,
        })
    }
}

impl fmt::Display for TupleFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::HashAlgo;
    use super::HashKey;
    use super::PacketType;
    use super::Record;
    use super::Reta;
    use super::TcMode;
    use super::TupleFields;
    use super::FEATURE_INFO_SIZE;

    #[test]
    fn test_hash_algo() {
        assert_eq!(HashAlgo::parse(&[1]).unwrap(), HashAlgo::SimpleXor);
        assert_eq!(HashAlgo::from(2).to_string(), "Symmetric Toeplitz");
        assert_eq!(HashAlgo::from(7), HashAlgo::Unknown(7));
    }

    #[test]
    fn test_hash_key_truncated() {
        let mut buf = vec![0u8; HashKey::SIZE];
        buf[0] = 0xff;
        buf[4] = 0xab;
        let key = HashKey::parse(&buf).unwrap();
        let (bytes, truncated) = key.bytes();
        assert!(truncated);
        assert_eq!(bytes.len(), 128);
        assert_eq!(bytes[0], 0xab);
    }

    #[test]
    fn test_tuple_masks() {
        assert_eq!(PacketType::Ipv4Tcp.mask(), 0xf);
        assert_eq!(PacketType::Ipv4Sctp.mask(), 0x1f00);
        assert_eq!(PacketType::Ipv6Frag.mask(), 0x3 << (15 + 32));
        assert_eq!(PacketType::Ipv6Tcp.mask(), 0xf << 32);
    }

    #[test]
    fn test_tuple_enabled() {
        let fields = TupleFields(0b1010 | 1 << (13 + 32));
        assert!(!fields.is_disabled());
        assert_eq!(
            fields.enabled(PacketType::Ipv4Tcp).unwrap(),
            vec!["IP_S", "", "TCP_S", ""]
        );
        assert_eq!(fields.enabled(PacketType::Ipv4Udp), None);
        assert_eq!(
            fields.enabled(PacketType::Ipv6Other).unwrap(),
            vec!["", "IP_D"]
        );
        assert!(TupleFields(0).is_disabled());
    }

    #[test]
    fn test_reta_and_tc_mode() {
        let mut buf = vec![0u8; FEATURE_INFO_SIZE];
        buf[0] = 3;
        buf[4] = 7;
        buf[8] = 9;
        let reta = Reta::parse(&buf).unwrap();
        assert_eq!(reta.entries(), (&[7u16, 0, 9][..], false));

        let tc = TcMode::parse(&[4, 0, 2, 0, 1, 0, 0, 0]).unwrap();
        assert_eq!(
            tc,
            TcMode {
                tc_offset: 4,
                tc_size: 2,
                tc_valid: 1
            }
        );
    }
}
