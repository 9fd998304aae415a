// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Request and block-response framing for the NIC commands.
//!
//! A NIC table is usually larger than one response, so the firmware splits it
//! into blocks. Each response starts with a block head describing how many
//! blocks exist and how many payload bytes follow the head. Entry-oriented
//! tables additionally report the index of the next entry to request and the
//! number of entries carried in the block.

use crate::Bdf;
use crate::RSP_DATA_MAX_WORDS;
use crate::WORD_SIZE;
use hubpack::SerializedSize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

/// The payload words following a 12-byte entry block head.
pub const ENTRY_BLOCK_DATA_WORDS: usize = 57;

/// The payload words following a 4-byte block head.
pub const BLOCK_DATA_WORDS: usize = 59;

/// Common view of the heads framing a block response.
pub trait BlockHead: DeserializeOwned + SerializedSize + core::fmt::Debug {
    /// The number of payload words that may follow this head.
    const DATA_WORDS: usize;

    /// The largest payload a single block may carry, in bytes.
    const MAX_BLOCK_SIZE: usize = Self::DATA_WORDS * WORD_SIZE;

    /// The total number of blocks in the response.
    fn total_blocks(&self) -> u8;

    /// The number of valid payload bytes in this block.
    fn block_size(&self) -> u8;

    /// The index of the next entry to request.
    fn next_entry_idx(&self) -> u32 {
        0
    }

    /// The number of entries in this block.
    fn entry_count(&self) -> u32 {
        0
    }
}

// A head and its payload fill exactly one response round.
const _: () = assert!(
    3 + ENTRY_BLOCK_DATA_WORDS == RSP_DATA_MAX_WORDS && 1 + BLOCK_DATA_WORDS == RSP_DATA_MAX_WORDS
);

/// The head of a block response without entry accounting.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, SerializedSize)]
pub struct PlainBlockHead {
    pub total_blk_num: u8,
    pub cur_blk_size: u8,
    pub rsv: u16,
}

impl BlockHead for PlainBlockHead {
    const DATA_WORDS: usize = BLOCK_DATA_WORDS;

    fn total_blocks(&self) -> u8 {
        self.total_blk_num
    }

    fn block_size(&self) -> u8 {
        self.cur_blk_size
    }
}

/// The head of a block response from the PPP tables.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, SerializedSize)]
pub struct EntryBlockHead {
    pub total_blk_num: u8,
    pub cur_blk_size: u8,
    pub rsv: u16,
    pub next_entry_idx: u32,
    pub cur_blk_entry_cnt: u32,
}

impl BlockHead for EntryBlockHead {
    const DATA_WORDS: usize = ENTRY_BLOCK_DATA_WORDS;

    fn total_blocks(&self) -> u8 {
        self.total_blk_num
    }

    fn block_size(&self) -> u8 {
        self.cur_blk_size
    }

    fn next_entry_idx(&self) -> u32 {
        self.next_entry_idx
    }

    fn entry_count(&self) -> u32 {
        self.cur_blk_entry_cnt
    }
}

/// The head of a block response from the flow director.
///
/// Identical in size to [`EntryBlockHead`], but the entry count is 16 bits.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, SerializedSize)]
pub struct FdBlockHead {
    pub total_blk_num: u8,
    pub cur_blk_size: u8,
    pub rsv1: u16,
    pub next_entry_idx: u32,
    pub cur_blk_entry_cnt: u16,
    pub rsv2: u16,
}

impl BlockHead for FdBlockHead {
    const DATA_WORDS: usize = ENTRY_BLOCK_DATA_WORDS;

    fn total_blocks(&self) -> u8 {
        self.total_blk_num
    }

    fn block_size(&self) -> u8 {
        self.cur_blk_size
    }

    fn next_entry_idx(&self) -> u32 {
        self.next_entry_idx
    }

    fn entry_count(&self) -> u32 {
        u32::from(self.cur_blk_entry_cnt)
    }
}

/// Sub-commands of [`crate::NicCmd::Ppp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PppSubCmd {
    HwRes = 0,
    Mac = 1,
    Vlan = 2,
    Mng = 3,
    Promisc = 4,
    VlanOffload = 5,
}

/// A request for one block of a PPP table.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, SerializedSize)]
pub struct PppRequest {
    pub bdf: Bdf,
    pub block_id: u8,
    /// Selects the unicast MAC table, or the port VLAN table.
    pub is_unicast: u8,
    pub rsv: [u8; 2],
    pub cur_entry_idx: u32,
}

bitflags::bitflags! {
    /// VLAN filter enables reported by the PPP VLAN offload table.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct VlanFilter: u16 {
        const INGRESS = 0b01;
        const EGRESS  = 0b10;
    }
}

/// Sub-commands of [`crate::NicCmd::Fd`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum FdSubCmd {
    HwInfo = 0,
    Rules = 1,
    Counter = 2,
}

/// A request for one block of flow director state.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, SerializedSize)]
pub struct FdRequest {
    pub bdf: Bdf,
    pub block_id: u8,
    /// Zero-based stage number.
    pub stage: u8,
    pub query_single_entry: u8,
    pub rsv: u8,
    pub cur_entry_idx: u32,
}

/// Sub-commands of [`crate::NicCmd::Rss`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum RssSubCmd {
    Algo = 0,
    Key = 1,
    Tuple = 2,
    Reta = 3,
    TcMode = 4,
}

/// A request for one block of RSS state.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, SerializedSize)]
pub struct RssRequest {
    pub bdf: Bdf,
    pub block_id: u8,
    pub rsv: [u8; 3],
}
