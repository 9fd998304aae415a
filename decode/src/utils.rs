// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! Utilities to make decoding firmware payloads less terrible.

use crate::Error;

/// Extract a bit from a word.
pub const fn extract_bit(word: u32, bit: u8) -> Result<bool, Error> {
    if bit > 31 {
        return Err(Error::BitOutOfRange);
    }
    Ok((word & (1 << bit)) != 0)
}

/// Return a mask with bits `high` through `low` set, inclusive.
pub const fn genmask(high: u32, low: u32) -> u64 {
    (u64::MAX >> (63 - high)) & (u64::MAX << low)
}

/// Extract the field covered by `mask`, shifted down by `shift`.
pub const fn extract_field(word: u64, mask: u64, shift: u32) -> u64 {
    (word & mask) >> shift
}

/// A cursor over a little-endian firmware payload.
///
/// Each accessor consumes the field and fails with [`Error::ShortBuffer`]
/// rather than panicking when the payload runs out.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The number of bytes consumed so far.
    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self.pos + len;
        let out = self.buf.get(self.pos..end).ok_or(Error::ShortBuffer {
            need: end,
            have: self.buf.len(),
        })?;
        self.pos = end;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.bytes(len).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, Error> {
        self.array::<1>().map(|b| b[0])
    }

    pub fn u16(&mut self) -> Result<u16, Error> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Result<u32, Error> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn u64(&mut self) -> Result<u64, Error> {
        self.array().map(u64::from_le_bytes)
    }
}

/// A helper macro to generate an enum from a firmware code.
///
/// Firmware reports many small codes (hash algorithms, table modes) that map
/// onto a fixed set of values, with anything else preserved verbatim. This
/// generates the enum, a `From<u8>` implementation, the reverse conversion and
/// a `Display` implementation.
///
/// # Example
/// ```ignore
/// hikp_decode::code_enum! {
///     name = Foo,
///     description = "A code describing foo",
///     variants = {
///         0, First, "first",
///         1, Second, "second",
///     },
///     other = Unknown,
///     other_display = "unknown foo",
/// }
/// ```
#[macro_export]
macro_rules! code_enum {
    (
        name = $name:ident,
        description = $docstring:literal,
        variants = { $( $bits:literal, $variant:ident, $display:literal $(,)? ),+ },
        other = $other_variant:ident,
        other_display = $other_display:literal
        $(,)?
    ) => {
        #[doc = $docstring]
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub enum $name {
            $( $variant, )+
            $other_variant(u8),
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                use $name::*;
                match self {
                    $( $variant => write!(f, "{}", $display), )+
                    $other_variant(_) => write!(f, "{}", $other_display),
                }
            }
        }

        impl ::core::convert::From<u8> for $name {
            fn from(x: u8) -> Self {
                use $name::*;
                #[deny(overlapping_range_endpoints)]
                match x {
                    $( $bits => $variant, )+
                    _ => $other_variant(x),
                }
            }
        }

        impl ::core::convert::From<$name> for u8 {
            fn from(x: $name) -> u8 {
                use $name::*;
                match x {
                    $( $variant => $bits, )+
                    $other_variant(x) => x,
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::extract_bit;
    use super::extract_field;
    use super::genmask;
    use super::Reader;
    use crate::Error;

    #[test]
    fn test_extract_bit() {
        for shift in 0..32 {
            let expected = 1 << shift;
            assert!(extract_bit(expected, shift).unwrap());
            for other_shift in 0..32 {
                if shift == other_shift {
                    continue;
                }
                assert!(!extract_bit(expected, other_shift).unwrap());
            }
        }

        for shift in 32..=255 {
            assert!(extract_bit(0, shift).is_err());
        }
    }

    #[test]
    fn test_genmask() {
        assert_eq!(genmask(11, 2), 0xffc);
        assert_eq!(genmask(0, 0), 1);
        assert_eq!(genmask(63, 0), u64::MAX);
        assert_eq!(extract_field(0xabcd, genmask(11, 4), 4), 0xbc);
    }

    #[test]
    fn test_reader() {
        let buf = [1, 2, 0, 3, 0, 0, 0, 4];
        let mut r = Reader::new(&buf);
        assert_eq!(r.u8().unwrap(), 1);
        assert_eq!(r.u8().unwrap(), 2);
        assert_eq!(r.u8().unwrap(), 0);
        assert_eq!(r.u32().unwrap(), 3);
        assert_eq!(r.position(), 7);
        assert_eq!(r.u16(), Err(Error::ShortBuffer { need: 9, have: 8 }));
    }
}
