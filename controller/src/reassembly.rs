// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Reassemble block-chunked responses into one contiguous buffer.
//!
//! A single response carries at most a few hundred bytes, so the firmware
//! splits large tables into blocks, each framed by a [`BlockHead`]. Two shapes
//! of query exist:
//!
//! - Block-indexed queries request blocks `0..total_blocks` of a flat blob,
//!   see [`read_blocks`].
//! - Entry-indexed queries page through a table by entry index, with the
//!   device returning a cursor to the next entry, see [`read_entries`].
//!
//! In both cases a block whose declared size would overflow the destination
//! is rejected before anything is copied, and entry-indexed reads abort on a
//! cursor that fails to advance.

use crate::transport::Response;
use crate::Error;
use hikp_messages::decode_head;
use hikp_messages::nic::BlockHead;
use hikp_messages::Error as MessageError;
use slog::debug;
use slog::Logger;

// Split a response into its head and the payload bytes it declares. The
// declared size must fit both the block and the room left in the destination.
fn block_payload<H: BlockHead>(
    name: &'static str,
    rsp: &Response,
    left: usize,
) -> Result<(H, Vec<u8>), Error> {
    let bytes = rsp.bytes();
    let (head, payload) = decode_head::<H>(&bytes)?;
    let size = usize::from(head.block_size());
    if size > left || size > H::MAX_BLOCK_SIZE {
        return Err(Error::BlockTooLarge {
            name,
            dst: left,
            src: H::MAX_BLOCK_SIZE,
            size,
        });
    }
    let payload = payload
        .get(..size)
        .ok_or(MessageError::ResponseTooShort(bytes.len() as u32))?;
    Ok((head, payload.to_vec()))
}

/// Read a block-indexed response of at most `capacity` bytes.
///
/// `fetch` is called with each block id in turn and must return the checked
/// response for that block. The number of blocks is taken from the first
/// response; a first response reporting zero blocks yields an empty buffer.
/// Errors from `fetch` are returned unchanged.
pub fn read_blocks<H, F>(
    log: &Logger,
    name: &'static str,
    capacity: usize,
    mut fetch: F,
) -> Result<Vec<u8>, Error>
where
    H: BlockHead,
    F: FnMut(u8) -> Result<Response, Error>,
{
    let mut out = Vec::with_capacity(capacity);
    let rsp = fetch(0)?;
    let (head, payload) = block_payload::<H>(name, &rsp, capacity)?;
    let total_blocks = head.total_blocks();
    if total_blocks == 0 {
        debug!(log, "feature reports no blocks"; "name" => name);
        return Ok(out);
    }
    out.extend_from_slice(&payload);

    for block_id in 1..total_blocks {
        let rsp = fetch(block_id)?;
        let (_, payload) = block_payload::<H>(name, &rsp, capacity - out.len())?;
        out.extend_from_slice(&payload);
    }
    debug!(
        log,
        "read blocks";
        "name" => name,
        "total_blocks" => total_blocks,
        "bytes" => out.len(),
    );
    Ok(out)
}

/// The bounds of an entry-indexed read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryQuery {
    /// The entry index of the first request.
    pub start: u32,
    /// Stop after the first block, used to fetch a single entry.
    pub single: bool,
    /// The hardware-advertised number of entries in the table.
    pub max_entries: u32,
    /// The size of one entry on the wire, in bytes.
    pub entry_size: usize,
}

impl EntryQuery {
    /// Read a whole table of `max_entries` entries from index 0.
    pub fn all(max_entries: u32, entry_size: usize) -> Self {
        Self {
            start: 0,
            single: false,
            max_entries,
            entry_size,
        }
    }

    /// Read the block holding entry `index`.
    pub fn single(index: u32, max_entries: u32, entry_size: usize) -> Self {
        Self {
            start: index,
            single: true,
            max_entries,
            entry_size,
        }
    }
}

/// The entries collected by [`read_entries`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entries {
    pub data: Vec<u8>,
    pub count: u32,
}

/// Page through an entry-indexed table.
///
/// `fetch` is called with the entry index to request and must return the
/// checked response. A block is only kept once its cursor is known to
/// advance and its entries fit under `max_entries`, so on error nothing from
/// the offending block is retained. Errors from `fetch` are returned
/// unchanged.
pub fn read_entries<H, F>(
    log: &Logger,
    name: &'static str,
    query: EntryQuery,
    mut fetch: F,
) -> Result<Entries, Error>
where
    H: BlockHead,
    F: FnMut(u32) -> Result<Response, Error>,
{
    let mut out = Entries::default();
    let mut idx = query.start;
    while idx < query.max_entries {
        let left = (query.max_entries - out.count) as usize * query.entry_size;
        let rsp = fetch(idx)?;
        let (head, payload) = block_payload::<H>(name, &rsp, left)?;

        let next = head.next_entry_idx();
        if next <= idx {
            return Err(Error::NonMonotonicEntry { next, cur: idx });
        }
        let sum = out.count.saturating_add(head.entry_count());
        if sum > query.max_entries {
            return Err(Error::EntryOverflow {
                sum,
                block_id: idx,
                max: query.max_entries,
            });
        }
        debug!(
            log,
            "read entry block";
            "name" => name,
            "cur_entry_idx" => idx,
            "next_entry_idx" => next,
            "entries" => head.entry_count(),
        );

        // Entries land at their index; block padding past them is dropped.
        let start = out.count as usize * query.entry_size;
        let keep = head.entry_count() as usize * query.entry_size;
        out.data.resize(start + keep, 0);
        let n = keep.min(payload.len());
        out.data[start..start + n].copy_from_slice(&payload[..n]);
        out.count = sum;
        idx = next;
        if query.single {
            break;
        }
    }
    Ok(out)
}
