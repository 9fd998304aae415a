// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Command dispatch and the chunked request / response protocol used to query
//! Hisilicon SoC firmware.
//!
//! A [`Tool`] owns a table of commands. Each command registers its options in
//! an [`options::OptionRegistry`], which parses the command line into the
//! command's own context. The command then talks to firmware through a
//! [`Transport`], usually the [`rciep::Rciep`] device, and reassembles
//! multi-block responses with the helpers in [`reassembly`].

pub mod chip;
pub mod command;
pub mod config;
pub mod feature;
pub mod lock;
#[cfg(test)]
pub(crate) mod mock;
pub mod nic;
pub mod oplog;
pub mod options;
pub mod rciep;
pub mod reassembly;
pub mod target;
pub mod tool;
pub mod transport;

pub use chip::Chip;
pub use command::Command;
pub use command::Env;
pub use config::Config;
pub use config::ConfigBuilder;
pub use tool::Tool;
pub use transport::Response;
pub use transport::Transport;

use hikp_decode::Error as DecodeError;
use hikp_messages::CplStatus;
use hikp_messages::Error as MessageError;
use nix::errno::Errno;

/// The name the tool reports in help and error output.
pub const TOOL_NAME: &str = "hikptool";

/// The version the tool reports.
pub const TOOL_VERSION: &str = "1.1.4";

/// An error running a command.
///
/// Every variant maps onto a negative errno through [`Error::errno`], which is
/// what the tool reports and exits with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Command input too long.")]
    CommandTooLong,

    #[error("Unknown major command, try '{TOOL_NAME} -h' for help.")]
    UnknownCommand,

    #[error("Repeated option {0}.")]
    RepeatedOption(&'static str),

    #[error("{0} option need parameter.")]
    MissingParameter(&'static str),

    #[error("{0} is not option needed.")]
    UnknownOption(String),

    /// A bad option value or combination, reported after the command's help.
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unsupported(String),

    /// An `-i` target that is neither a PCI address nor a usable interface.
    #[error("unknown device!")]
    UnknownDevice(#[source] Option<Box<Error>>),

    #[error("VF does not support query!")]
    VfUnsupported,

    #[error("locking failed.")]
    Lock(#[source] Errno),

    #[error("dev lock by other process:{0}.")]
    DeviceBusy(u32),

    #[error("Cannot find Device {vendor:#06x}:{device:#06x}.")]
    DeviceNotFound { vendor: u16, device: u16 },

    #[error("Failed to init RCiEP")]
    DeviceInit(#[source] Box<Error>),

    #[error("request data num({0}) exceeds max size({max}).", max = hikp_messages::REQ_DATA_MAX_WORDS)]
    RequestTooLarge(usize),

    #[error("Response data num[{0}] out of range[{max}].", max = hikp_messages::RSP_ALL_DATA_MAX_WORDS)]
    ResponseTooLarge(u32),

    /// The first round of a request did not complete; nothing was returned.
    #[error("First round failed. Error code:{}.", u32::from(*.0))]
    Transport(CplStatus),

    /// The device delivered a response with a failing status.
    #[error("device reported status {0}")]
    Status(i32),

    #[error("response version {actual} does not match {expected}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("failed to get block-{block_id} context.")]
    BlockFailed {
        block_id: u32,
        errno: i32,
        #[source]
        source: Box<Error>,
    },

    #[error(
        "{name} block context copy size error, dst buffer size={dst}, \
        src buffer size={src}, data size={size}."
    )]
    BlockTooLarge {
        name: &'static str,
        dst: usize,
        src: usize,
        size: usize,
    },

    #[error("The next entry index ({next}) is less than or equal with the curent({cur}).")]
    NonMonotonicEntry { next: u32, cur: u32 },

    #[error(
        "The sum of entry number ({sum}) after block-{block_id} is over the \
        maximum entry number ({max}) of this stage."
    )]
    EntryOverflow { sum: u32, block_id: u32, max: u32 },

    #[error("failed to query {feature} info, ret = {errno}.")]
    Query {
        feature: &'static str,
        errno: i32,
        #[source]
        source: Box<Error>,
    },

    /// A step of a command failed.
    #[error("{msg}")]
    Failed {
        msg: String,
        errno: i32,
        #[source]
        source: Box<Error>,
    },

    #[error("Error decoding firmware data")]
    Decode(#[from] DecodeError),

    #[error("Error encoding or decoding a message")]
    Message(#[from] MessageError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("System error")]
    Sys(#[from] Errno),
}

const fn neg(e: Errno) -> i32 {
    -(e as i32)
}

impl Error {
    /// The negative errno reported for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Error::CommandTooLong
            | Error::UnknownCommand
            | Error::RepeatedOption(_)
            | Error::MissingParameter(_)
            | Error::UnknownOption(_)
            | Error::Usage(_)
            | Error::InvalidArgument(_)
            | Error::UnknownDevice(_)
            | Error::VfUnsupported
            | Error::RequestTooLarge(_)
            | Error::ResponseTooLarge(_)
            | Error::Status(_)
            | Error::VersionMismatch { .. }
            | Error::BlockTooLarge { .. }
            | Error::NonMonotonicEntry { .. }
            | Error::EntryOverflow { .. }
            | Error::Decode(_)
            | Error::Message(_) => neg(Errno::EINVAL),
            Error::Unsupported(_) => neg(Errno::EOPNOTSUPP),
            Error::Lock(e) | Error::Sys(e) => neg(*e),
            Error::DeviceBusy(_) => neg(Errno::EBUSY),
            Error::DeviceNotFound { .. } => neg(Errno::ENOENT),
            Error::DeviceInit(e) => e.errno(),
            Error::Transport(_) => neg(Errno::ENOSPC),
            Error::BlockFailed { errno, .. }
            | Error::Query { errno, .. }
            | Error::Failed { errno, .. } => *errno,
            Error::Io(e) => e.raw_os_error().map(|e| -e).unwrap_or(neg(Errno::EIO)),
        }
    }

    /// Describe a failed step, keeping the errno of its cause.
    pub fn failed(msg: impl Into<String>, source: Error) -> Self {
        Error::Failed {
            msg: msg.into(),
            errno: source.errno(),
            source: Box::new(source),
        }
    }

    /// Wrap the failure to fetch one block of a response.
    pub fn block(block_id: u32, source: Error) -> Self {
        Error::BlockFailed {
            block_id,
            errno: source.errno(),
            source: Box::new(source),
        }
    }

    /// Wrap a failed feature query, keeping the errno of its cause.
    pub fn query(feature: &'static str, source: Error) -> Self {
        Error::Query {
            feature,
            errno: source.errno(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use hikp_messages::CplStatus;
    use nix::errno::Errno;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(Error::RepeatedOption("-i").errno(), -22);
        assert_eq!(Error::Unsupported(String::new()).errno(), -95);
        assert_eq!(Error::DeviceBusy(7).errno(), -16);
        assert_eq!(Error::Transport(CplStatus::AppWaitTimeout).errno(), -28);
        assert_eq!(Error::Lock(Errno::EACCES).errno(), -13);
        let query = Error::query("mac", Error::Status(-1));
        assert_eq!(query.errno(), -22);
        assert_eq!(query.to_string(), "failed to query mac info, ret = -22.");
        let failed = Error::failed("fail to obtain fd hardware configuration.", Error::DeviceBusy(1));
        assert_eq!(failed.errno(), -16);
        assert_eq!(Error::block(3, failed).to_string(), "failed to get block-3 context.");
    }

    #[test]
    fn test_messages() {
        assert_eq!(Error::RepeatedOption("-i").to_string(), "Repeated option -i.");
        assert_eq!(
            Error::MissingParameter("-du").to_string(),
            "-du option need parameter."
        );
        assert_eq!(
            Error::UnknownOption(String::from("--foo")).to_string(),
            "--foo is not option needed."
        );
        assert_eq!(
            Error::UnknownCommand.to_string(),
            "Unknown major command, try 'hikptool -h' for help."
        );
        assert_eq!(
            Error::DeviceNotFound {
                vendor: 0x19e5,
                device: 0xa12f
            }
            .to_string(),
            "Cannot find Device 0x19e5:0xa12f."
        );
        assert_eq!(
            Error::Transport(CplStatus::ExecuteFailed).to_string(),
            "First round failed. Error code:6."
        );
    }
}
