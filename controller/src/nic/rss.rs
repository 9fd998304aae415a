// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! `nic_rss`: show the receive-side scaling configuration of a port.

use super::interface;
use super::read_raw;
use super::write_interface_option;
use super::NicCommand;
use super::TargetArg;
use super::END_BANNER;
use crate::command::write_help_option;
use crate::command::Command;
use crate::command::Env;
use crate::feature;
use crate::feature::Feature;
use crate::options::OptionRegistry;
use crate::target::TargetResolver;
use crate::Config;
use crate::Error;
use hikp_decode::rss::HashAlgo;
use hikp_decode::rss::HashKey;
use hikp_decode::rss::PacketType;
use hikp_decode::rss::Reta;
use hikp_decode::rss::TcMode;
use hikp_decode::rss::TupleFields;
use hikp_decode::rss::FEATURE_INFO_SIZE;
use hikp_decode::rss::MAX_TC_NUM;
use hikp_decode::Record;
use hikp_messages::nic::PlainBlockHead;
use hikp_messages::nic::RssRequest;
use hikp_messages::nic::RssSubCmd;
use hikp_messages::CmdHeader;
use hikp_messages::NicCmd;
use slog::error;
use slog::Logger;
use std::io::Write;

const NAME: &str = "nic_rss";

const GET_HELP: &str = "[-g/--get <options>]
          algo    : get hash algorithm.
          key     : get hash key.
          tuple   : get configuration of tuple
          reta    : get reta table.
          tc_mode : get rss tc mode.
";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RssView {
    Algo,
    Key,
    Tuple,
    Reta,
    TcMode,
}

pub const FEATURES: &[Feature<RssView>] = &[
    Feature {
        name: "algo",
        sub_cmd: RssSubCmd::Algo as u32,
        prequery: false,
        kind: RssView::Algo,
    },
    Feature {
        name: "key",
        sub_cmd: RssSubCmd::Key as u32,
        prequery: false,
        kind: RssView::Key,
    },
    Feature {
        name: "tuple",
        sub_cmd: RssSubCmd::Tuple as u32,
        prequery: false,
        kind: RssView::Tuple,
    },
    Feature {
        name: "reta",
        sub_cmd: RssSubCmd::Reta as u32,
        prequery: false,
        kind: RssView::Reta,
    },
    Feature {
        name: "tc_mode",
        sub_cmd: RssSubCmd::TcMode as u32,
        prequery: false,
        kind: RssView::TcMode,
    },
];

#[derive(Clone, Debug, PartialEq, Eq)]
enum RssData {
    Algo(HashAlgo),
    Key(HashKey),
    Tuple(TupleFields),
    Reta(Reta),
    TcMode(Vec<TcMode>),
}

impl RssData {
    fn parse(view: RssView, buf: &[u8]) -> Result<Self, Error> {
        let data = match view {
            RssView::Algo => RssData::Algo(HashAlgo::parse(buf)?),
            RssView::Key => RssData::Key(HashKey::parse(buf)?),
            RssView::Tuple => RssData::Tuple(TupleFields::parse(buf)?),
            RssView::Reta => RssData::Reta(Reta::parse(buf)?),
            RssView::TcMode => RssData::TcMode(TcMode::parse_many(buf, MAX_TC_NUM)?),
        };
        Ok(data)
    }

    fn show(&self, out: &mut dyn Write, log: &Logger) -> std::io::Result<()> {
        match self {
            RssData::Algo(HashAlgo::Unknown(x)) => writeln!(out, "hash_algo=0x{x:x}"),
            RssData::Algo(algo) => writeln!(out, "RSS hash algo: {algo}."),
            RssData::Key(key) => {
                writeln!(out, "key len: {}", key.key_len)?;
                write!(out, "KEY: ")?;
                let (bytes, truncated) = key.bytes();
                for b in bytes {
                    write!(out, "{b:02X}")?;
                }
                if truncated {
                    error!(log, "The cmd data is truncated.");
                }
                writeln!(out)
            }
            RssData::Tuple(fields) => {
                if fields.is_disabled() {
                    write!(out, "RSS disable")?;
                }
                for ty in PacketType::ALL {
                    if let Some(names) = fields.enabled(ty) {
                        writeln!(out, "{} enable field: {}", ty.name(), names.join(" "))?;
                    }
                }
                writeln!(out)
            }
            RssData::Reta(reta) => {
                let (entries, truncated) = reta.entries();
                for (i, queue) in entries.iter().enumerate() {
                    writeln!(out, "RSS RETA configuration: hash index={i}, queue={queue}")?;
                }
                if truncated {
                    error!(log, "The cmd data is truncated.");
                }
                Ok(())
            }
            RssData::TcMode(tcs) => {
                writeln!(out, "tc_num  | tc_valid | tc_offset | tc_size")?;
                for (tc, mode) in tcs.iter().enumerate() {
                    writeln!(
                        out,
                        "{tc}       |     {}    |    {:04}   |    {}",
                        mode.tc_valid, mode.tc_offset, mode.tc_size
                    )?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
pub struct RssCmd {
    target: TargetArg,
    feature: Option<Feature<RssView>>,
}

impl NicCommand for RssCmd {
    fn target_arg(&mut self) -> &mut TargetArg {
        &mut self.target
    }
}

fn get(ctx: &mut RssCmd, arg: Option<&str>) -> Result<(), Error> {
    ctx.feature = Some(feature::select(FEATURES, arg, "-g/--get param error!!!")?);
    Ok(())
}

impl Command for RssCmd {
    const NAME: &'static str = NAME;
    const HELP_INFO: &'static str = "show rss info of nic!";

    fn new(config: &Config, _log: &Logger) -> Self {
        Self {
            target: TargetArg::new(TargetResolver::new(&config.sysfs_root)),
            feature: None,
        }
    }

    fn register(reg: &mut OptionRegistry<Self>) {
        reg.register_help();
        reg.register("-i", "--interface", true, interface::<Self>);
        reg.register("-g", "--get", true, get);
    }

    fn write_options(out: &mut dyn Write) -> std::io::Result<()> {
        write_help_option(out)?;
        write_interface_option(out, "\t")?;
        writeln!(out, "      {GET_HELP}")
    }

    fn execute(&mut self, env: &mut Env<'_>) -> Result<(), Error> {
        let feature = self
            .feature
            .ok_or_else(|| Error::Usage(String::from("-g/--get param error!")))?;
        let bdf = self.target.target().bdf;
        let header = CmdHeader::nic(NicCmd::Rss, feature.sub_cmd);

        let data = read_raw::<PlainBlockHead, _>(env, NAME, header, FEATURE_INFO_SIZE, |block_id| {
            RssRequest {
                bdf,
                block_id,
                rsv: [0; 3],
            }
        })
        .and_then(|buf| RssData::parse(feature.kind, &buf))
        .map_err(|e| {
            let msg = format!("failed to query {}, ret = {}.", feature.name, e.errno());
            Error::failed(msg, e)
        })?;

        writeln!(env.out, "################### RSS {} ###################", feature.name)?;
        data.show(env.out, env.log)?;
        writeln!(env.out, "{END_BANNER}")?;
        Ok(())
    }
}
