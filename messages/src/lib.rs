// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

//! Wire formats for the hikp request / response protocol.
//!
//! Every request is a [`header::CmdHeader`] followed by a small, fixed-layout
//! request struct, packed into at most [`REQ_DATA_MAX_WORDS`] 32-bit words.
//! Responses are a flat array of 32-bit words. Most commands frame that array
//! as a block head followed by payload, so that a large table can be fetched
//! over several requests. The block heads and request structs live in
//! [`nic`].
//!
//! All multi-byte fields are little-endian and structs carry no padding, which
//! is exactly how `hubpack` lays them out.

pub mod bdf;
pub mod header;
pub mod nic;

pub use bdf::Bdf;
pub use bdf::InvalidBdf;
pub use header::CmdHeader;
pub use header::CplStatus;
pub use header::ModuleCode;
pub use header::NicCmd;

use hubpack::SerializedSize;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

/// The size of one protocol word, in bytes.
pub const WORD_SIZE: usize = core::mem::size_of::<u32>();

/// The maximum number of request words following the header.
pub const REQ_DATA_MAX_WORDS: usize = 32;

/// The number of response words transferred in one round.
pub const RSP_DATA_MAX_WORDS: usize = 60;

/// The maximum number of rounds for a single response.
pub const RSP_CYCLE_MAX: usize = 10;

/// The maximum number of words in a complete response.
pub const RSP_ALL_DATA_MAX_WORDS: usize = RSP_DATA_MAX_WORDS * RSP_CYCLE_MAX;

/// An error encoding or decoding a protocol message.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize, SerializedSize)]
#[cfg_attr(any(test, feature = "std"), derive(thiserror::Error))]
pub enum Error {
    /// A request does not fit in the request data words.
    #[cfg_attr(
        any(test, feature = "std"),
        error("request data num({0}) exceeds max size(32)")
    )]
    RequestTooLarge(u32),

    /// A response is shorter than the head that frames it.
    #[cfg_attr(
        any(test, feature = "std"),
        error("response of {0} bytes is too short for its head")
    )]
    ResponseTooShort(u32),

    /// Serialization through hubpack failed.
    #[cfg_attr(any(test, feature = "std"), error("failed to encode message"))]
    Encode,

    /// Deserialization through hubpack failed.
    #[cfg_attr(any(test, feature = "std"), error("failed to decode message"))]
    Decode,
}

/// Return the number of words needed to hold `len` bytes.
pub const fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_SIZE)
}

/// Serialize a request struct into little-endian protocol words.
///
/// The request must fit in [`REQ_DATA_MAX_WORDS`]; trailing bytes of the last
/// word are zero.
#[cfg(any(test, feature = "std"))]
pub fn encode_request<T: Serialize + SerializedSize>(req: &T) -> Result<Vec<u32>, Error> {
    let n_words = words_for(T::MAX_SIZE);
    if n_words > REQ_DATA_MAX_WORDS {
        return Err(Error::RequestTooLarge(n_words as u32));
    }
    let mut buf = vec![0u8; n_words * WORD_SIZE];
    hubpack::serialize(&mut buf, req).map_err(|_| Error::Encode)?;
    Ok(buf
        .chunks_exact(WORD_SIZE)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}

/// Flatten protocol words back into their little-endian bytes.
#[cfg(any(test, feature = "std"))]
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Split a response into its fixed head and the payload following it.
pub fn decode_head<H>(bytes: &[u8]) -> Result<(H, &[u8]), Error>
where
    H: DeserializeOwned + SerializedSize,
{
    if bytes.len() < H::MAX_SIZE {
        return Err(Error::ResponseTooShort(bytes.len() as u32));
    }
    hubpack::deserialize(bytes).map_err(|_| Error::Decode)
}

#[cfg(test)]
mod tests {
    use super::encode_request;
    use super::words_for;
    use super::words_to_bytes;
    use super::Error;
    use hubpack::SerializedSize;
    use serde::Serialize;

    #[derive(Serialize, SerializedSize)]
    struct Odd {
        a: u32,
        b: u8,
    }

    #[derive(Serialize, SerializedSize)]
    struct Huge {
        data: [u32; 32],
        extra: u8,
    }

    #[test]
    fn test_words_for() {
        assert_eq!(words_for(0), 0);
        assert_eq!(words_for(1), 1);
        assert_eq!(words_for(4), 1);
        assert_eq!(words_for(5), 2);
    }

    #[test]
    fn test_encode_request_pads_last_word() {
        let words = encode_request(&Odd { a: 0x0403_0201, b: 0xff }).unwrap();
        assert_eq!(words, vec![0x0403_0201, 0xff]);
        assert_eq!(words_to_bytes(&words), vec![1, 2, 3, 4, 0xff, 0, 0, 0]);
    }

    #[test]
    fn test_encode_request_too_large() {
        let huge = Huge {
            data: [0; 32],
            extra: 0,
        };
        assert_eq!(encode_request(&huge), Err(Error::RequestTooLarge(33)));
    }
}
