// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The contract between commands and the channel to firmware.

use crate::Error;
use hikp_messages::encode_request;
use hikp_messages::words_to_bytes;
use hikp_messages::CmdHeader;
use hubpack::SerializedSize;
use serde::Serialize;

/// A response delivered by a [`Transport`].
///
/// A transport that fails before any data arrives returns an error instead of
/// a response. A response may still carry a failing `status`, for example when
/// a later round of a multi-round transfer fails.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub status: i32,
    pub version: u32,
    pub data: Vec<u32>,
}

impl Response {
    /// A successful response carrying `data`.
    pub fn new(data: Vec<u32>) -> Self {
        Self {
            status: 0,
            version: 0,
            data,
        }
    }

    /// Succeed only if the device reported success.
    pub fn normal_check(self) -> Result<Self, Error> {
        if self.status != 0 {
            return Err(Error::Status(self.status));
        }
        Ok(self)
    }

    /// Succeed only if the device reported success with the given version.
    pub fn normal_check_with_version(self, version: u32) -> Result<Self, Error> {
        let rsp = self.normal_check()?;
        if rsp.version != version {
            return Err(Error::VersionMismatch {
                expected: version,
                actual: rsp.version,
            });
        }
        Ok(rsp)
    }

    /// The response data as little-endian bytes.
    pub fn bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.data)
    }
}

/// A synchronous channel exchanging one request for one response.
pub trait Transport {
    /// Send `header` and the request `data` words, and wait for the response.
    fn request(&mut self, header: &CmdHeader, data: &[u32]) -> Result<Response, Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn request(&mut self, header: &CmdHeader, data: &[u32]) -> Result<Response, Error> {
        (**self).request(header, data)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn request(&mut self, header: &CmdHeader, data: &[u32]) -> Result<Response, Error> {
        (**self).request(header, data)
    }
}

/// Serialize `req`, send it, and check the response status.
pub fn query<R>(transport: &mut dyn Transport, header: &CmdHeader, req: &R) -> Result<Response, Error>
where
    R: Serialize + SerializedSize,
{
    let data = encode_request(req)?;
    transport.request(header, &data)?.normal_check()
}
