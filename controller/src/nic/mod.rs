// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The `nic_*` commands, and what they share: the `-i` option, block fetches
//! and output framing.

pub mod fd;
pub mod ppp;
pub mod rss;

use crate::command::Env;
use crate::reassembly::read_blocks;
use crate::reassembly::read_entries;
use crate::reassembly::EntryQuery;
use crate::target::Target;
use crate::target::TargetResolver;
use crate::transport::query;
use crate::Error;
use hikp_decode::Record;
use hikp_messages::nic::BlockHead;
use hikp_messages::CmdHeader;
use hubpack::SerializedSize;
use serde::Serialize;
use std::io::Write;

/// The line closing every dump.
pub const END_BANNER: &str = "#################### END #######################";

const INTERFACE_HELP: &str = "device target or bdf id, e.g. eth0~7 or 0000:35:00.0";

/// The `-i/--interface` argument of a command.
#[derive(Clone, Debug)]
pub struct TargetArg {
    resolver: TargetResolver,
    target: Target,
}

impl TargetArg {
    pub fn new(resolver: TargetResolver) -> Self {
        Self {
            resolver,
            target: Target::default(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn set(&mut self, name: Option<&str>) -> Result<(), Error> {
        let name = name.ok_or(Error::UnknownDevice(None))?;
        self.target = self.resolver.resolve(name)?;
        Ok(())
    }
}

/// A command taking the `-i/--interface` option.
pub trait NicCommand {
    fn target_arg(&mut self) -> &mut TargetArg;
}

/// The `-i/--interface` option handler.
pub fn interface<C: NicCommand>(ctx: &mut C, arg: Option<&str>) -> Result<(), Error> {
    ctx.target_arg().set(arg)
}

/// Write the help line of the `-i` option after `indent`.
pub fn write_interface_option(out: &mut dyn Write, indent: &str) -> std::io::Result<()> {
    writeln!(
        out,
        "{indent}{}, {:<25} {}",
        "-i", "--interface=<interface>", INTERFACE_HELP
    )
}

pub fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Fetch a block-indexed response of at most `capacity` bytes.
///
/// `request` builds the request for a block id. A short answer is padded with
/// zeroes to `capacity`; a failed block is reported by its id.
pub fn read_raw<H, R>(
    env: &mut Env<'_>,
    name: &'static str,
    header: CmdHeader,
    capacity: usize,
    request: impl Fn(u8) -> R,
) -> Result<Vec<u8>, Error>
where
    H: BlockHead,
    R: Serialize + SerializedSize,
{
    let log = env.log;
    let transport = &mut *env.transport;
    let mut data = read_blocks::<H, _>(log, name, capacity, |block_id| {
        query(&mut *transport, &header, &request(block_id))
            .map_err(|e| Error::block(u32::from(block_id), e))
    })?;
    data.resize(capacity, 0);
    Ok(data)
}

/// Fetch a block-indexed record.
pub fn read_record<H, T, R>(
    env: &mut Env<'_>,
    name: &'static str,
    header: CmdHeader,
    request: impl Fn(u8) -> R,
) -> Result<T, Error>
where
    H: BlockHead,
    T: Record,
    R: Serialize + SerializedSize,
{
    let data = read_raw::<H, R>(env, name, header, T::SIZE, request)?;
    Ok(T::parse(&data)?)
}

/// Page through an entry-indexed table and return its raw entries.
pub fn read_table<H, R>(
    env: &mut Env<'_>,
    name: &'static str,
    header: CmdHeader,
    bounds: EntryQuery,
    request: impl Fn(u32) -> R,
) -> Result<(Vec<u8>, usize), Error>
where
    H: BlockHead,
    R: Serialize + SerializedSize,
{
    let log = env.log;
    let transport = &mut *env.transport;
    let entries = read_entries::<H, _>(log, name, bounds, |idx| {
        query(&mut *transport, &header, &request(idx))
    })?;
    Ok((entries.data, entries.count as usize))
}

#[cfg(test)]
mod tests {
    use super::interface;
    use super::on_off;
    use super::write_interface_option;
    use super::NicCommand;
    use super::TargetArg;
    use crate::target::TargetResolver;
    use crate::Error;

    struct Ctx(TargetArg);

    impl NicCommand for Ctx {
        fn target_arg(&mut self) -> &mut TargetArg {
            &mut self.0
        }
    }

    #[test]
    fn test_interface_option() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Ctx(TargetArg::new(TargetResolver::new(dir.path())));
        interface(&mut ctx, Some("0000:35:00.0")).unwrap();
        assert_eq!(ctx.0.target().bdf.bus(), 0x35);

        let err = interface(&mut ctx, Some("eth9")).unwrap_err();
        assert_eq!(err.to_string(), "unknown device!");
        assert!(matches!(interface(&mut ctx, None), Err(Error::UnknownDevice(None))));
    }

    #[test]
    fn test_interface_help_line() {
        let mut out = Vec::new();
        write_interface_option(&mut out, "\t").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\t-i, --interface=<interface>   device target or bdf id, e.g. eth0~7 or 0000:35:00.0\n"
        );
        assert_eq!(on_off(true), "on");
        assert_eq!(on_off(false), "off");
    }
}
