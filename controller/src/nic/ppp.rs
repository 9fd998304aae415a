// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! `nic_ppp`: dump the packet processing pipeline tables of a port.

use super::interface;
use super::on_off;
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
use hikp_decode::ppp::func_name;
use hikp_decode::ppp::FuncVlanOffload;
use hikp_decode::ppp::McMacEntry;
use hikp_decode::ppp::MngEntry;
use hikp_decode::ppp::PortVlanEntry;
use hikp_decode::ppp::PppHwResources;
use hikp_decode::ppp::PromiscTable;
use hikp_decode::ppp::UcMacEntry;
use hikp_decode::ppp::VfVlanEntry;
use hikp_decode::ppp::VlanOffloadTable;
use hikp_decode::ppp::MAX_FUNC_NUM;
use hikp_decode::Record;
use hikp_messages::nic::EntryBlockHead;
use hikp_messages::nic::PppRequest;
use hikp_messages::nic::PppSubCmd;
use hikp_messages::nic::VlanFilter;
use hikp_messages::Bdf;
use hikp_messages::CmdHeader;
use hikp_messages::NicCmd;
use itertools::Itertools;
use slog::debug;
use slog::Logger;
use std::io::Write;

const NAME: &str = "nic_ppp";

// VLAN ids printed per line by the per-function views.
const VLAN_IDS_PER_LINE: usize = 6;

const DUMP_HELP: &str = "      [-du/--dump mac -func/--func_id <func_id> -uc/--unicast <1/0>]
              dump MAC table info.
              dump unicast/multicast MAC address for a function.
      [-du/--dump vlan -func/--function <func_no>]
              dump VLAN table info.
              dump VLAN of a function.
      [-du/--dump mng]
              dump manager table info.
      [-du/--dump promisc]
              dump promiscuous info.
      [-du/--dump vlan_offload]
              dump VLAN offload info.
";

/// The tables `-du` selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PppView {
    Mac,
    Vlan,
    Mng,
    Promisc,
    VlanOffload,
}

pub const FEATURES: &[Feature<PppView>] = &[
    Feature {
        name: "mac",
        sub_cmd: PppSubCmd::Mac as u32,
        prequery: true,
        kind: PppView::Mac,
    },
    Feature {
        name: "vlan",
        sub_cmd: PppSubCmd::Vlan as u32,
        prequery: true,
        kind: PppView::Vlan,
    },
    Feature {
        name: "mng",
        sub_cmd: PppSubCmd::Mng as u32,
        prequery: true,
        kind: PppView::Mng,
    },
    Feature {
        name: "promisc",
        sub_cmd: PppSubCmd::Promisc as u32,
        prequery: false,
        kind: PppView::Promisc,
    },
    Feature {
        name: "vlan_offload",
        sub_cmd: PppSubCmd::VlanOffload as u32,
        prequery: false,
        kind: PppView::VlanOffload,
    },
];

/// What a query returned, by view.
#[derive(Clone, Debug, PartialEq, Eq)]
enum PppData {
    Mac {
        uc: Vec<UcMacEntry>,
        mc: Vec<McMacEntry>,
    },
    Vlan {
        vf: Vec<VfVlanEntry>,
        port: Vec<PortVlanEntry>,
    },
    Mng(Vec<MngEntry>),
    Promisc(PromiscTable),
    VlanOffload(VlanOffloadTable),
}

#[derive(Debug)]
pub struct PppCmd {
    target: TargetArg,
    feature: Option<Feature<PppView>>,
    /// The function to show, 0 for the PF and `n` for VF `n - 1`.
    func_id: Option<u16>,
    unicast: Option<bool>,
}

impl NicCommand for PppCmd {
    fn target_arg(&mut self) -> &mut TargetArg {
        &mut self.target
    }
}

fn dump(ctx: &mut PppCmd, arg: Option<&str>) -> Result<(), Error> {
    ctx.feature = Some(feature::select(
        FEATURES,
        arg,
        "please input valid subfunction.",
    )?);
    Ok(())
}

fn func_id(ctx: &mut PppCmd, arg: Option<&str>) -> Result<(), Error> {
    let id = string_toui(arg.unwrap_or_default()).map_err(|_| {
        Error::InvalidArgument(String::from("parse -func/--function parameter failed."))
    })?;
    if id >= u32::from(MAX_FUNC_NUM) {
        return Err(Error::InvalidArgument(String::from(
            "maximum func_id should be less than 256.",
        )));
    }
    ctx.func_id = Some(id as u16);
    Ok(())
}

fn unicast(ctx: &mut PppCmd, arg: Option<&str>) -> Result<(), Error> {
    let value = string_toui(arg.unwrap_or_default()).map_err(|_| {
        Error::InvalidArgument(String::from("parse -un/--unicast parameter failed."))
    })?;
    ctx.unicast = match value {
        0 => Some(false),
        1 => Some(true),
        _ => {
            return Err(Error::InvalidArgument(String::from(
                "please input 0 or 1 for -un/--unicast parameter.",
            )))
        }
    };
    Ok(())
}

fn block_request(bdf: Bdf) -> impl Fn(u8) -> PppRequest {
    move |block_id| PppRequest {
        bdf,
        block_id,
        ..Default::default()
    }
}

// Read a whole entry-indexed table. `is_unicast` selects the unicast MAC or
// the port VLAN table.
fn read_entries_of<T: Record>(
    env: &mut Env<'_>,
    header: CmdHeader,
    bdf: Bdf,
    is_unicast: u8,
    max_entries: u32,
) -> Result<Vec<T>, Error> {
    let bounds = EntryQuery::all(max_entries, T::SIZE);
    let (data, count) = read_table::<EntryBlockHead, _>(env, NAME, header, bounds, |idx| {
        PppRequest {
            bdf,
            block_id: 0,
            is_unicast,
            rsv: [0; 2],
            cur_entry_idx: idx,
        }
    })?;
    Ok(T::parse_many(&data, count)?)
}

fn write_vlan_ids(
    out: &mut dyn Write,
    ids: impl Iterator<Item = u16>,
) -> std::io::Result<()> {
    for (i, id) in ids.enumerate() {
        write!(out, "{id:4} ")?;
        if (i + 1) % VLAN_IDS_PER_LINE == 0 {
            write!(out, "\n\t")?;
        }
    }
    writeln!(out)
}

fn write_mac_tables(
    out: &mut dyn Write,
    uc: &[&UcMacEntry],
    uc_num: usize,
    mc: &[&McMacEntry],
    mc_num: usize,
) -> std::io::Result<()> {
    writeln!(out, "Unicast MAC table[entry number={uc_num}]:")?;
    writeln!(
        out,
        "index | valid | mac_addr          | vlan_id | VMDq1 | mac_en | \
        in_port(mac_id) | E_vPort_type | E_vPort"
    )?;
    for e in uc {
        writeln!(
            out,
            "{:04}  | {}     | {} | {:04}    | {}     | {}      | {}               | {}            | {:06x}",
            e.idx,
            e.valid,
            e.mac,
            e.vlan_id,
            e.vmdq1,
            e.mac_en,
            e.ingress_port,
            e.e_vport_type,
            e.e_vport,
        )?;
    }
    writeln!(out, "Multicast MAC table[entry number={mc_num}]:")?;
    writeln!(out, "index | mac_addr          | func bitMap[255  <--  0]")?;
    for e in mc {
        writeln!(out, "{:04}  | {} | {}", e.idx, e.mac, e.function_bitmap)?;
    }
    Ok(())
}

impl PppCmd {
    fn check_optional(&self, feature: &Feature<PppView>) -> Result<(), Error> {
        let msg = match feature.kind {
            PppView::Mac if self.func_id.is_some() != self.unicast.is_some() => {
                String::from("please input func_id and unicast value at the same time.")
            }
            PppView::Vlan if self.unicast.is_some() => {
                format!("{} cmd no need '-uc/--unicast' parameter", feature.name)
            }
            PppView::Mng | PppView::Promisc | PppView::VlanOffload
                if self.func_id.is_some() || self.unicast.is_some() =>
            {
                format!(
                    "{} cmd no need '-func/--func_id' and '-uc/--unicast' parameter",
                    feature.name
                )
            }
            _ => return Ok(()),
        };
        Err(Error::InvalidArgument(msg))
    }

    fn hw_resources(&self, env: &mut Env<'_>, bdf: Bdf) -> Result<PppHwResources, Error> {
        let header = CmdHeader::nic(NicCmd::Ppp, PppSubCmd::HwRes as u32);
        read_record::<EntryBlockHead, _, _>(env, NAME, header, block_request(bdf))
    }

    fn query(
        &self,
        env: &mut Env<'_>,
        feature: &Feature<PppView>,
        bdf: Bdf,
        hw: &PppHwResources,
    ) -> Result<PppData, Error> {
        let header = CmdHeader::nic(NicCmd::Ppp, feature.sub_cmd);
        let data = match feature.kind {
            PppView::Mac => {
                let max = hw.mac_tbl_size();
                let uc = if self.unicast != Some(false) {
                    read_entries_of(env, header, bdf, 1, max)?
                } else {
                    Vec::new()
                };
                let mc = if self.unicast != Some(true) {
                    read_entries_of(env, header, bdf, 0, max)?
                } else {
                    Vec::new()
                };
                PppData::Mac { uc, mc }
            }
            PppView::Vlan => {
                let vf = read_entries_of(env, header, bdf, 0, u32::from(hw.vf_vlan_tbl_size))?;
                let port =
                    read_entries_of(env, header, bdf, 1, u32::from(hw.port_vlan_tbl_size))?;
                PppData::Vlan { vf, port }
            }
            PppView::Mng => PppData::Mng(read_entries_of(env, header, bdf, 0, hw.mng_tbl_size)?),
            PppView::Promisc => PppData::Promisc(read_record::<EntryBlockHead, _, _>(
                env,
                NAME,
                header,
                block_request(bdf),
            )?),
            PppView::VlanOffload => PppData::VlanOffload(read_record::<EntryBlockHead, _, _>(
                env,
                NAME,
                header,
                block_request(bdf),
            )?),
        };
        Ok(data)
    }

    fn show(
        &self,
        out: &mut dyn Write,
        bdf: Bdf,
        hw: &PppHwResources,
        data: &PppData,
    ) -> std::io::Result<()> {
        match data {
            PppData::Mac { uc, mc } => self.show_mac(out, bdf, hw, uc, mc),
            PppData::Vlan { vf, port } => self.show_vlan(out, bdf, hw, vf, port),
            PppData::Mng(entries) => show_mng(out, hw, entries),
            PppData::Promisc(tbl) => show_promisc(out, tbl),
            PppData::VlanOffload(tbl) => show_vlan_offload(out, tbl),
        }
    }

    fn show_mac(
        &self,
        out: &mut dyn Write,
        bdf: Bdf,
        hw: &PppHwResources,
        uc: &[UcMacEntry],
        mc: &[McMacEntry],
    ) -> std::io::Result<()> {
        let key_mem = hw.max_key_mem_size;
        if let Some(func_id) = self.func_id {
            let abs_func_id = hw.abs_func_id(bdf.fun(), func_id);
            let name = func_name(func_id);
            let unicast = self.unicast == Some(true);
            writeln!(out, "{name}_abs_func_id={abs_func_id}")?;
            writeln!(
                out,
                "{name} {} MAC addrs:",
                if unicast { "unicast" } else { "multicast" }
            )?;
            if unicast {
                for e in uc.iter().take_while(|e| e.idx < key_mem) {
                    if e.pf_id() == bdf.fun() && e.vf_id() == func_id {
                        writeln!(out, "\t{}", e.mac)?;
                    }
                }
            } else {
                for e in mc.iter().take_while(|e| e.idx < key_mem) {
                    if e.function_bitmap.is_set(abs_func_id) {
                        writeln!(out, "\t{}", e.mac)?;
                    }
                }
            }
            return Ok(());
        }

        writeln!(out, "Key mem[total_entry_size={key_mem}]:")?;
        let in_key_mem = uc.iter().filter(|e| e.idx < key_mem).collect::<Vec<_>>();
        let mc_in_key_mem = mc.iter().filter(|e| e.idx < key_mem).collect::<Vec<_>>();
        write_mac_tables(out, &in_key_mem, uc.len(), &mc_in_key_mem, mc.len())?;

        if hw.overflow_cam_size == 0 {
            return Ok(());
        }
        writeln!(out, "Overflow cam[total_entry_size={}]:", hw.overflow_cam_size)?;
        let uc_overflow = uc.iter().filter(|e| e.idx >= key_mem).collect::<Vec<_>>();
        let mc_overflow = mc.iter().filter(|e| e.idx >= key_mem).collect::<Vec<_>>();
        write_mac_tables(
            out,
            &uc_overflow,
            uc_overflow.len(),
            &mc_overflow,
            mc_overflow.len(),
        )
    }

    fn show_vlan(
        &self,
        out: &mut dyn Write,
        bdf: Bdf,
        hw: &PppHwResources,
        vf: &[VfVlanEntry],
        port: &[PortVlanEntry],
    ) -> std::io::Result<()> {
        match self.func_id {
            Some(0) => {
                writeln!(out, "mac_id={}", hw.mac_id)?;
                writeln!(out, "total_func_num={}", hw.total_func_num)?;
                writeln!(out, "abs_func_id_base={}", hw.abs_func_id_base)?;
                write!(out, "port VLAN id:\n\t")?;
                write_vlan_ids(
                    out,
                    port.iter()
                        .filter(|e| e.has_mac_id(hw.mac_id))
                        .map(|e| e.vlan_id),
                )
            }
            Some(func_id) => {
                let abs_func_id = hw.abs_func_id(bdf.fun(), func_id);
                let name = func_name(func_id);
                writeln!(out, "{name}_abs_func_id: {abs_func_id}")?;
                write!(out, "{name} VLAN id:\n\t")?;
                write_vlan_ids(
                    out,
                    vf.iter()
                        .filter(|e| e.func_bitmap.is_set(abs_func_id))
                        .map(|e| e.vlan_id),
                )
            }
            None => {
                writeln!(out, "port_vlan_table_size={}", hw.port_vlan_tbl_size)?;
                writeln!(out, "vf_vlan_table_size={}", hw.vf_vlan_tbl_size)?;
                writeln!(out, "vlan_id | vf filter bitmap[func_255 <--- func_0]")?;
                for e in vf {
                    writeln!(out, " {:04}  | {}", e.vlan_id, e.func_bitmap)?;
                }
                writeln!(out, "vlan_id | port filter bitmap(based on mac_id)")?;
                for e in port {
                    writeln!(out, " {:04}   | {:02x}", e.vlan_id, e.port_bitmap)?;
                }
                Ok(())
            }
        }
    }
}

fn show_mng(out: &mut dyn Write, hw: &PppHwResources, entries: &[MngEntry]) -> std::io::Result<()> {
    writeln!(out, "manager_table_size={}", hw.mng_tbl_size)?;
    writeln!(
        out,
        "entry | mac               | mask | ether | mask | vlan | mask | i_map | i_dir | \
        e_type | pf_id | vf_id | q_id | drop"
    )?;
    for e in entries {
        writeln!(
            out,
            " {:02}   | {} | {}    | {:04x}  | {}    | {:04} | {}    | {:02x}    | {:02x}    | {}      | {:02}    | {:03}   | {:04} | {}",
            e.entry_no,
            e.mac,
            e.mac_mask,
            e.ether_type,
            e.ether_mask,
            e.vlan_id,
            e.vlan_mask,
            e.i_port_bitmap,
            e.i_port_dir,
            e.e_port_type,
            e.pf_id,
            e.vf_id,
            e.q_id,
            e.drop,
        )?;
    }
    Ok(())
}

fn show_promisc(out: &mut dyn Write, tbl: &PromiscTable) -> std::io::Result<()> {
    writeln!(out, "func_id\t uc_en\t mc_en\t bc_en")?;
    for f in &tbl.funcs {
        writeln!(
            out,
            "{}\t {}\t {}\t {}",
            func_name(u16::from(f.func_id)),
            f.uc_en,
            f.mc_en,
            f.bc_en
        )?;
    }
    Ok(())
}

fn show_vlan_offload(out: &mut dyn Write, tbl: &VlanOffloadTable) -> std::io::Result<()> {
    let filter = |fe: VlanFilter, bit: VlanFilter| on_off(fe.contains(bit));
    writeln!(out, "port VLAN filter configuration:")?;
    writeln!(
        out,
        "ingress_port_vlan_filter: {}",
        filter(tbl.port_vlan_fe, VlanFilter::INGRESS)
    )?;
    writeln!(
        out,
        "egress_port_vlan_filter: {}",
        filter(tbl.port_vlan_fe, VlanFilter::EGRESS)
    )?;

    writeln!(out, "func VLAN filter configuration:")?;
    writeln!(
        out,
        "func_id\t ingress_vlan_filter\t egress_vlan_filter\t port_vlan_filter_bypass"
    )?;
    for (i, f) in tbl.funcs.iter().enumerate() {
        let bypass = match f.port_vlan_bypass {
            0 => "off",
            1 => "on",
            _ => "NA",
        };
        writeln!(
            out,
            "{}\t {}\t\t\t {}\t\t\t {}",
            func_name(i as u16),
            filter(f.vlan_fe, VlanFilter::INGRESS),
            filter(f.vlan_fe, VlanFilter::EGRESS),
            bypass,
        )?;
    }

    writeln!(out, "func VLAN offload configuration:")?;
    let columns = FuncVlanOffload::default()
        .switches()
        .iter()
        .map(|(name, _)| *name)
        .join("\t");
    writeln!(out, "func_id\tpvid\t{columns}")?;
    for (i, f) in tbl.funcs.iter().enumerate() {
        let switches = f
            .switches()
            .iter()
            .map(|(_, v)| on_off(*v != 0))
            .join("\t\t");
        writeln!(out, "{}\t{}\t{switches}", func_name(i as u16), f.pvid)?;
    }
    Ok(())
}

impl Command for PppCmd {
    const NAME: &'static str = NAME;
    const HELP_INFO: &'static str = "dump ppp info of nic!";

    fn new(config: &Config, _log: &Logger) -> Self {
        Self {
            target: TargetArg::new(TargetResolver::new(&config.sysfs_root)),
            feature: None,
            func_id: None,
            unicast: None,
        }
    }

    fn register(reg: &mut OptionRegistry<Self>) {
        reg.register_help();
        reg.register("-i", "--interface", true, interface::<Self>);
        reg.register("-du", "--dump", true, dump);
        reg.register("-func", "--func_id", true, func_id);
        reg.register("-uc", "--unicast", true, unicast);
    }

    fn write_options(out: &mut dyn Write) -> std::io::Result<()> {
        write_help_option(out)?;
        write_interface_option(out, "\t")?;
        writeln!(out, "{DUMP_HELP}")
    }

    fn execute(&mut self, env: &mut Env<'_>) -> Result<(), Error> {
        let target = self.target.target().clone();
        target.check_pf()?;
        let feature = self
            .feature
            .ok_or_else(|| Error::Usage(String::from("-du/--dump parameter error!")))?;
        self.check_optional(&feature)?;

        let hw = if feature.prequery {
            let hw = self
                .hw_resources(env, target.bdf)
                .map_err(|e| Error::failed("fail to obtain ppp hardware resources.", e))?;
            debug!(env.log, "ppp hardware resources"; "hw" => ?hw);
            if !hw.is_valid() {
                return Err(Error::InvalidArgument(String::from(
                    "ppp hardware resources obtained is invalid.",
                )));
            }
            hw
        } else {
            PppHwResources::default()
        };
        if let Some(func_id) = self.func_id {
            if func_id >= hw.total_func_num {
                return Err(Error::InvalidArgument(format!(
                    "-func/--func_id parameter is invalid, func_id should be less than {}.",
                    hw.total_func_num
                )));
            }
        }

        let data = self
            .query(env, &feature, target.bdf, &hw)
            .map_err(|e| Error::query(feature.name, e))?;
        writeln!(env.out, "############## NIC PPP: {} info ############", feature.name)?;
        self.show(env.out, target.bdf, &hw, &data)?;
        writeln!(env.out, "{END_BANNER}")?;
        Ok(())
    }
}
