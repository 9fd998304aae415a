// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! A scripted transport for tests.

use crate::transport::Response;
use crate::transport::Transport;
use crate::Error;
use hikp_messages::words_to_bytes;
use hikp_messages::CmdHeader;
use hikp_messages::CplStatus;
use hubpack::SerializedSize;
use serde::de::DeserializeOwned;
use serde::Serialize;
use slog::Logger;
use std::collections::VecDeque;

pub(crate) fn test_logger() -> Logger {
    Logger::root(slog::Discard, slog::o!())
}

/// A transport replaying queued responses and recording each request.
///
/// Once the queue is empty, requests fail as if the device timed out.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    responses: VecDeque<Result<Response, Error>>,
    requests: Vec<(CmdHeader, Vec<u32>)>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_response(&mut self, rsp: Response) {
        self.responses.push_back(Ok(rsp));
    }

    pub(crate) fn push_error(&mut self, err: Error) {
        self.responses.push_back(Err(err));
    }

    /// Queue a delivered response with a failing status.
    pub(crate) fn push_status(&mut self, status: i32) {
        self.push_response(Response {
            status,
            ..Default::default()
        });
    }

    /// Queue a successful block response: `head` followed by `payload`.
    pub(crate) fn push_block<H>(&mut self, head: &H, payload: &[u8])
    where
        H: Serialize + SerializedSize,
    {
        self.push_response(Response::new(block_words(head, payload)));
    }

    pub(crate) fn requests(&self) -> &[(CmdHeader, Vec<u32>)] {
        &self.requests
    }

    /// Decode the request struct of the `i`-th request.
    pub(crate) fn request_as<R: DeserializeOwned>(&self, i: usize) -> R {
        let bytes = words_to_bytes(&self.requests[i].1);
        hubpack::deserialize::<R>(&bytes).unwrap().0
    }
}

impl Transport for MockTransport {
    fn request(&mut self, header: &CmdHeader, data: &[u32]) -> Result<Response, Error> {
        self.requests.push((*header, data.to_vec()));
        self.responses
            .pop_front()
            .unwrap_or(Err(Error::Transport(CplStatus::AppWaitTimeout)))
    }
}

/// Pack a block head and its payload into response words.
pub(crate) fn block_words<H>(head: &H, payload: &[u8]) -> Vec<u32>
where
    H: Serialize + SerializedSize,
{
    let mut bytes = vec![0u8; H::MAX_SIZE];
    hubpack::serialize(&mut bytes, head).unwrap();
    bytes.extend_from_slice(payload);
    bytes.resize(bytes.len().next_multiple_of(4), 0);
    bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect()
}
