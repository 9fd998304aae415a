// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2022 Oxide Computer Company

//! Decode the payloads returned by NIC firmware queries.
//!
//! The controller reassembles multi-block responses into a contiguous byte
//! buffer; the types here turn those bytes into typed records. Every record
//! has a fixed little-endian layout agreed with the firmware, described by the
//! [`Record`] trait.

pub mod fd;
pub mod ppp;
pub mod rss;
pub mod utils;

use hikp_messages::Error as MessageError;
use std::fmt;
use thiserror::Error;

/// An error related to decoding a firmware payload.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Payload of {have} bytes is too short, need {need} bytes")]
    ShortBuffer { need: usize, have: usize },

    #[error("Bit index out of range")]
    BitOutOfRange,

    #[error("Illegal function num({0}) from firmware.")]
    IllegalFuncNum(u16),

    #[error("Management or messaging error")]
    Message(#[from] MessageError),
}

/// A fixed-size record in a firmware payload.
pub trait Record: Sized {
    /// The size of one record on the wire, in bytes.
    const SIZE: usize;

    /// Parse one record from the start of `buf`.
    fn parse(buf: &[u8]) -> Result<Self, Error>;

    /// Parse `count` consecutive records.
    fn parse_many(buf: &[u8], count: usize) -> Result<Vec<Self>, Error> {
        let need = count * Self::SIZE;
        if buf.len() < need {
            return Err(Error::ShortBuffer {
                need,
                have: buf.len(),
            });
        }
        buf.chunks_exact(Self::SIZE)
            .take(count)
            .map(Self::parse)
            .collect()
    }
}

/// An Ethernet MAC address, as stored by the PPP tables.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// The number of functions tracked by a [`FuncBitmap`].
pub const FUNC_BITMAP_BITS: u16 = 256;

/// A 256-bit bitmap indexed by absolute function id.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FuncBitmap(pub [u32; 8]);

impl FuncBitmap {
    pub const SIZE: usize = 32;

    /// Return true if the function with this absolute id is set.
    pub fn is_set(&self, abs_func_id: u16) -> bool {
        if abs_func_id >= FUNC_BITMAP_BITS {
            return false;
        }
        let word = self.0[usize::from(abs_func_id / 32)];
        word & (1 << (abs_func_id % 32)) != 0
    }

    fn read(r: &mut utils::Reader<'_>) -> Result<Self, Error> {
        let mut out = [0u32; 8];
        for w in out.iter_mut() {
            *w = r.u32()?;
        }
        Ok(Self(out))
    }
}

impl fmt::Display for FuncBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = self
            .0
            .iter()
            .rev()
            .map(|w| format!("{w:08x}"))
            .collect::<Vec<_>>();
        write!(f, "{}", words.join(":"))
    }
}
