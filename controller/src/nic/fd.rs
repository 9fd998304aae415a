// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! `nic_fd`: dump the flow director configuration, rules and counters.

use super::interface;
use super::read_record;
use super::read_table;
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
use crate::reassembly::EntryQuery;
use crate::target::string_toui;
use crate::target::TargetResolver;
use crate::Config;
use crate::Error;
use hikp_decode::fd::FdCounter;
use hikp_decode::fd::FdHwInfo;
use hikp_decode::fd::FdKeyCfg;
use hikp_decode::fd::FdRule;
use hikp_decode::fd::KeySelect;
use hikp_decode::fd::STAGE_NUM;
use hikp_decode::Record;
use hikp_messages::nic::FdBlockHead;
use hikp_messages::nic::FdRequest;
use hikp_messages::nic::FdSubCmd;
use hikp_messages::Bdf;
use hikp_messages::CmdHeader;
use hikp_messages::NicCmd;
use slog::debug;
use slog::warn;
use slog::Logger;
use std::io::Write;

const NAME: &str = "nic_fd";

const DUMP_HELP: &str = "      [-du/--dump hw_info ]
              dump fd hardware info.
      [-du/--dump rules -st/--stage <stage_no> -id/--index <rule_id> ]
              dump all rules or one rule info of certain stage fd.
      [-du/--dump counter -st/--stage <stage_no> -id/--index <counter_id> ]
              dump all counters or one counter stats of certain stage fd.
";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FdView {
    HwInfo,
    Rules,
    Counter,
}

pub const FEATURES: &[Feature<FdView>] = &[
    Feature {
        name: "hw_info",
        sub_cmd: FdSubCmd::HwInfo as u32,
        prequery: false,
        kind: FdView::HwInfo,
    },
    Feature {
        name: "rules",
        sub_cmd: FdSubCmd::Rules as u32,
        prequery: true,
        kind: FdView::Rules,
    },
    Feature {
        name: "counter",
        sub_cmd: FdSubCmd::Counter as u32,
        prequery: true,
        kind: FdView::Counter,
    },
];

#[derive(Clone, Debug, PartialEq, Eq)]
enum FdData {
    HwInfo(FdHwInfo),
    Rules(Vec<FdRule>),
    Counters(Vec<FdCounter>),
}

#[derive(Debug)]
pub struct FdCmd {
    target: TargetArg,
    feature: Option<Feature<FdView>>,
    /// The single rule or counter to dump.
    id: Option<u16>,
    /// One-based stage number.
    stage: Option<u8>,
}

impl NicCommand for FdCmd {
    fn target_arg(&mut self) -> &mut TargetArg {
        &mut self.target
    }
}

fn dump(ctx: &mut FdCmd, arg: Option<&str>) -> Result<(), Error> {
    ctx.feature = Some(feature::select(
        FEATURES,
        arg,
        "please input valid subfunction.",
    )?);
    Ok(())
}

fn index(ctx: &mut FdCmd, arg: Option<&str>) -> Result<(), Error> {
    let id = string_toui(arg.unwrap_or_default()).map_err(|_| {
        Error::InvalidArgument(String::from("parse --id/--index parameter failed."))
    })?;
    let id = u16::try_from(id).map_err(|_| {
        Error::InvalidArgument(format!(
            "the id is truncated. it should less than {}.",
            u16::MAX
        ))
    })?;
    ctx.id = Some(id);
    Ok(())
}

fn stage(ctx: &mut FdCmd, arg: Option<&str>) -> Result<(), Error> {
    let stage = string_toui(arg.unwrap_or_default()).map_err(|_| {
        Error::InvalidArgument(String::from("parse -stage/--stage_no parameter failed."))
    })?;
    match stage {
        1 => {
            ctx.stage = Some(1);
            Ok(())
        }
        2 => Err(Error::Unsupported(format!(
            "unsupport for querying stage{stage} entry!"
        ))),
        _ => Err(Error::InvalidArgument(String::from(
            "-stage/--stage_no parameter is invalid, please use 1 or 2!",
        ))),
    }
}

// Check the hardware can be dumped by `view`.
fn check_hw_info(log: &Logger, hw: &FdHwInfo, view: FdView) -> Result<(), Error> {
    match view {
        FdView::Rules => {
            if hw.stage_entry_num[0] == 0 {
                return Err(Error::InvalidArgument(String::from(
                    "The stage1's entry number is zero.",
                )));
            }
            if hw.mode.max_key_len().is_none() {
                warn!(
                    log,
                    "Unknown fd mode({}), unsupport for displaying meta data info.",
                    u8::from(hw.mode)
                );
            }
            for i in 0..STAGE_NUM {
                let key_select = hw.key_cfg[i].key_select;
                if hw.stage_entry_num[i] != 0 && KeySelect::from(key_select) != KeySelect::Tuple {
                    return Err(Error::Unsupported(format!(
                        "Only support for displaying the tuple key info, \
                        stage-{} key_select={key_select}",
                        i + 1
                    )));
                }
            }
            let active_key_bits = hw.mode.max_key_len().unwrap_or(0);
            let max_key_bits = hw.max_key_bytes() * 8;
            if active_key_bits > max_key_bits {
                return Err(Error::InvalidArgument(format!(
                    "The active tcam bits({active_key_bits}) is more than \
                    the max key bits({max_key_bits})."
                )));
            }
        }
        FdView::Counter => {
            if hw.stage_counter_num[0] == 0 {
                return Err(Error::InvalidArgument(String::from(
                    "The stage1's counter number is zero.",
                )));
            }
        }
        FdView::HwInfo => {}
    }
    Ok(())
}

fn entry_bounds(id: Option<u16>, max_entries: u32, entry_size: usize) -> EntryQuery {
    match id {
        Some(id) => EntryQuery::single(u32::from(id), max_entries, entry_size),
        None => EntryQuery::all(max_entries, entry_size),
    }
}

impl FdCmd {
    fn check_input(&self) -> Result<Feature<FdView>, Error> {
        self.target.target().check_pf()?;
        let feature = self
            .feature
            .ok_or_else(|| Error::Usage(String::from("-du/--dump parameter error!")))?;
        let is_hw_info = feature.kind == FdView::HwInfo;
        if self.stage.is_none() && !is_hw_info {
            return Err(Error::InvalidArgument(String::from(
                "please input '-st/--stage' parameter.",
            )));
        }
        if is_hw_info && (self.id.is_some() || self.stage.is_some()) {
            return Err(Error::InvalidArgument(String::from(
                "no need '-id/--index' and '-st/--stage' parameter.",
            )));
        }
        Ok(feature)
    }

    // The zero-based stage to query.
    fn stage_idx(&self) -> usize {
        usize::from(self.stage.unwrap_or(1).saturating_sub(1))
    }

    fn check_index(&self, hw: &FdHwInfo, view: FdView) -> Result<(), Error> {
        let Some(id) = self.id else {
            return Ok(());
        };
        let stage = self.stage_idx();
        let hw_entry_size = match view {
            FdView::Rules => hw.stage_entry_num[stage],
            _ => u32::from(hw.stage_counter_num[stage]),
        };
        if u32::from(id) >= hw_entry_size {
            return Err(Error::InvalidArgument(format!(
                "entry id({id}) must be less than hardware specifications({hw_entry_size})."
            )));
        }
        Ok(())
    }

    fn query(
        &self,
        env: &mut Env<'_>,
        feature: &Feature<FdView>,
        bdf: Bdf,
        hw: Option<&FdHwInfo>,
    ) -> Result<FdData, Error> {
        let header = CmdHeader::nic(NicCmd::Fd, feature.sub_cmd);
        let stage = self.stage_idx();
        let request = |cur_entry_idx: u32| FdRequest {
            bdf,
            block_id: 0,
            stage: stage as u8,
            query_single_entry: u8::from(self.id.is_some()),
            rsv: 0,
            cur_entry_idx,
        };
        let data = match (feature.kind, hw) {
            (FdView::Rules, Some(hw)) => {
                let bounds = entry_bounds(self.id, hw.stage_entry_num[stage], hw.rule_size());
                let (data, count) =
                    read_table::<FdBlockHead, _>(env, NAME, header, bounds, request)?;
                let key_bytes = usize::from(hw.max_key_bytes());
                FdData::Rules(FdRule::parse_many(&data, key_bytes, count)?)
            }
            (FdView::Counter, Some(hw)) => {
                let max = u32::from(hw.stage_counter_num[stage]);
                let bounds = entry_bounds(self.id, max, FdCounter::SIZE);
                let (data, count) =
                    read_table::<FdBlockHead, _>(env, NAME, header, bounds, request)?;
                FdData::Counters(FdCounter::parse_many(&data, count)?)
            }
            _ => FdData::HwInfo(read_hw_info(env, header, bdf)?),
        };
        Ok(data)
    }

    fn show(
        &self,
        out: &mut dyn Write,
        hw: Option<&FdHwInfo>,
        data: &FdData,
        log: &Logger,
    ) -> std::io::Result<()> {
        let stage = self.stage.unwrap_or(1);
        match (data, hw) {
            (FdData::HwInfo(hw), _) => show_hw_info(out, hw, log),
            (FdData::Rules(rules), Some(hw)) => {
                show_rules(out, stage, hw, &hw.key_cfg[self.stage_idx()], rules)
            }
            (FdData::Counters(counters), _) => show_counters(out, stage, counters),
            (FdData::Rules(_), None) => Ok(()),
        }
    }
}

// Hardware info covers every stage, so stage 0 is always requested.
fn read_hw_info(env: &mut Env<'_>, header: CmdHeader, bdf: Bdf) -> Result<FdHwInfo, Error> {
    read_record::<FdBlockHead, _, _>(env, NAME, header, |block_id| FdRequest {
        bdf,
        block_id,
        ..Default::default()
    })
}

fn show_hw_info(out: &mut dyn Write, hw: &FdHwInfo, log: &Logger) -> std::io::Result<()> {
    writeln!(out, "fd hardware info:")?;
    writeln!(out, "  fd_mode: {}", hw.mode)?;
    writeln!(
        out,
        "  fd_enable={}",
        if hw.enable != 0 { "enable" } else { "disable" }
    )?;
    writeln!(out, "  max key bit width: {}", hw.key_max_bit)?;
    for i in 0..STAGE_NUM {
        writeln!(out, "  stage{}_entry_num={}", i + 1, hw.stage_entry_num[i])?;
        writeln!(out, "  stage{}_counter_num={}", i + 1, hw.stage_counter_num[i])?;
    }

    for (i, cfg) in hw.key_cfg.iter().enumerate() {
        if hw.stage_entry_num[i] == 0 {
            continue;
        }
        let key_select = cfg.key_select();
        writeln!(out, "fd stage{} key info:", i + 1)?;
        writeln!(
            out,
            "  key_select: {}",
            if key_select == KeySelect::Tuple { "tuple" } else { "packet" }
        )?;
        writeln!(out, "  inner_src_ipv6_word_en: 0x{:x}", cfg.inner_src_ipv6_word_en)?;
        writeln!(out, "  inner_dest_ipv6_word_en: 0x{:x}", cfg.inner_dest_ipv6_word_en)?;
        writeln!(out, "  outer_src_ipv6_word_en: 0x{:x}", cfg.outer_src_ipv6_word_en)?;
        writeln!(out, "  outer_dest_ipv6_word_en: 0x{:x}", cfg.outer_dest_ipv6_word_en)?;
        if key_select == KeySelect::PacketType {
            warn!(log, "Unsupport for parsing packet type key.");
            continue;
        }

        writeln!(out, "  fd enable key info[mask: 0x{:x}]:", cfg.tuple_mask)?;
        for key in cfg.active_tuples() {
            writeln!(out, "    {}", key.name)?;
        }
        writeln!(out, "  fd meta info[mask: 0x{:x}]:", cfg.meta_data_mask)?;
        for (_, name, _) in cfg.active_meta() {
            writeln!(out, "    {name}")?;
        }
    }
    Ok(())
}

fn show_rules(
    out: &mut dyn Write,
    stage: u8,
    hw: &FdHwInfo,
    key_cfg: &FdKeyCfg,
    rules: &[FdRule],
) -> std::io::Result<()> {
    writeln!(out, "fd stage{stage} rules info[rule_num={}]:", rules.len())?;
    for rule in rules {
        writeln!(out, " rule_idx: {}", rule.idx)?;
        if rule.valid == 0 {
            writeln!(out, "\tDriver doesn't configure the rule with this id!")?;
            return Ok(());
        }

        writeln!(out, "\tKey:")?;
        for tuple in rule.tuples(key_cfg) {
            writeln!(out, "\t  {tuple}")?;
        }
        // The meta data position is unknown if the mode is.
        if let Some(meta) = rule.meta_data(hw, key_cfg) {
            writeln!(out, "\t  meta_data[meta_data=0x{:x}]:", meta.raw)?;
            for field in &meta.fields {
                writeln!(out, "\t    {field}")?;
            }
        }

        let action = rule.action();
        write!(out, "\n\tAction[ad data: 0x{:x}]:\n", rule.ad_data())?;
        if action.drop {
            write!(out, "\t  Drop/accecpt: Drop")?;
        }
        if action.direct_qid {
            write!(out, "\t  Direct Queue id: {}", action.qid)?;
        }
        if action.counter_valid {
            write!(out, "\t  Counter id: {}", action.counter_id)?;
        }
        if action.next_valid {
            write!(out, "\t  Next input key: {}", action.next_input_key)?;
        }
        if action.rule_id_valid {
            write!(out, "\t  Rule id: {}", action.rule_id)?;
        }
        if action.queue_region_en {
            write!(
                out,
                "\t  start qid:{}    Queue region size: {}",
                action.qid,
                1u32 << action.queue_region_size
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn show_counters(out: &mut dyn Write, stage: u8, counters: &[FdCounter]) -> std::io::Result<()> {
    writeln!(out, "fd stage{stage} counter info:")?;
    writeln!(out, " idx | hit_cnt")?;
    for c in counters {
        writeln!(out, " {:3} | {}", c.idx, c.value)?;
    }
    Ok(())
}

impl Command for FdCmd {
    const NAME: &'static str = NAME;
    const HELP_INFO: &'static str = "dump fd info of nic!";

    fn new(config: &Config, _log: &Logger) -> Self {
        Self {
            target: TargetArg::new(TargetResolver::new(&config.sysfs_root)),
            feature: None,
            id: None,
            stage: None,
        }
    }

    fn register(reg: &mut OptionRegistry<Self>) {
        reg.register_help();
        reg.register("-i", "--interface", true, interface::<Self>);
        reg.register("-du", "--dump", true, dump);
        reg.register("-id", "--index", true, index);
        reg.register("-st", "--stage", true, stage);
    }

    fn write_options(out: &mut dyn Write) -> std::io::Result<()> {
        write_help_option(out)?;
        write_interface_option(out, "    ")?;
        writeln!(out, "{DUMP_HELP}")?;
        writeln!(out, "    Note: dump all entries without '-id/--index'")
    }

    fn execute(&mut self, env: &mut Env<'_>) -> Result<(), Error> {
        let feature = self.check_input()?;
        let bdf = self.target.target().bdf;

        let hw = if feature.prequery {
            let header = CmdHeader::nic(NicCmd::Fd, FdSubCmd::HwInfo as u32);
            let hw = read_hw_info(env, header, bdf)
                .map_err(|e| Error::failed("fail to obtain fd hardware configuration.", e))?;
            debug!(env.log, "fd hardware info"; "hw" => ?hw);
            check_hw_info(env.log, &hw, feature.kind)?;
            self.check_index(&hw, feature.kind)?;
            Some(hw)
        } else {
            None
        };

        let data = self
            .query(env, &feature, bdf, hw.as_ref())
            .map_err(|e| Error::query(feature.name, e))?;
        writeln!(env.out, "############## NIC FD: {} info ############", feature.name)?;
        self.show(env.out, hw.as_ref(), &data, env.log)?;
        writeln!(env.out, "{END_BANNER}")?;
        Ok(())
    }
}
