// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Detection of the SoC generation and the commands it supports.

use slog::warn;
use slog::Logger;
use std::path::Path;

/// Where the MIDR of the first CPU is published, relative to sysfs.
pub const MIDR_EL1_PATH: &str = "devices/system/cpu/cpu0/regs/identification/midr_el1";

const PART_NUM_SHIFT: u64 = 4;

/// A Hisilicon SoC generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Chip {
    Hip09 = 0,
    Hip10 = 1,
    Hip10c = 2,
    Hip11 = 3,
    Hip12 = 4,
    Unknown = 5,
}

const CXL: &[&str] = &["cxl_cpa", "cxl_dl", "cxl_membar", "cxl_rcrb"];
const HCCS: &[&str] = &["hccs"];
const INFO_COLLECT: &[&str] = &["info_collect"];
const NIC: &[&str] = &[
    "nic_dfx",
    "nic_fd",
    "nic_fec",
    "nic_gro",
    "nic_info",
    "nic_log",
    "nic_mac",
    "nic_ncsi",
    "nic_notify_pkt",
    "nic_port",
    "nic_port_fault",
    "nic_ppp",
    "nic_qos",
    "nic_queue",
    "nic_rss",
    "nic_torus",
    "nic_xsfp",
];
const PCIE: &[&str] = &["pcie_dumpreg", "pcie_info", "pcie_regrd", "pcie_trace"];
const ROCE: &[&str] = &[
    "roce_bond",
    "roce_caep",
    "roce_dfx_sta",
    "roce_global_cfg",
    "roce_gmv",
    "roce_mdb",
    "roce_pkt",
    "roce_qmm",
    "roce_rst",
    "roce_scc",
    "roce_timer",
    "roce_trp",
    "roce_tsp",
];
const ROH: &[&str] = &["roh_mac", "roh_show_bp", "roh_show_mib"];
const SAS: &[&str] = &[
    "sas_anacq",
    "sas_anadq",
    "sas_dev",
    "sas_dqe",
    "sas_dump",
    "sas_errcode",
];
const SATA: &[&str] = &["sata_dump"];
const SERDES: &[&str] = &["serdes_dump", "serdes_info"];
const SOCIP: &[&str] = &["socip_dumpreg"];
const CPU_RING: &[&str] = &["cpu_ring"];
const SDMA: &[&str] = &["sdma_dump"];
const UB: &[&str] = &["ub_bp", "ub_crd", "ub_dfx", "ub_info", "ub_link", "unic_ppp"];
const RAS: &[&str] = &["bbox_export"];

const HIP09_HIP10_CMDS: &[&[&str]] = &[
    CXL,
    HCCS,
    INFO_COLLECT,
    NIC,
    PCIE,
    ROCE,
    ROH,
    SAS,
    SATA,
    SERDES,
    SOCIP,
];

const HIP11_CMDS: &[&[&str]] = &[
    CPU_RING,
    INFO_COLLECT,
    NIC,
    PCIE,
    ROCE,
    ROH,
    SATA,
    SDMA,
    SERDES,
    SOCIP,
    UB,
];

const HIP12_CMDS: &[&[&str]] = &[RAS, HCCS, INFO_COLLECT, PCIE, SERDES, SOCIP];

impl Chip {
    /// Map a MIDR_EL1 value onto a chip by its part number.
    pub const fn from_midr(midr: u64) -> Self {
        match (midr & 0xffff) >> PART_NUM_SHIFT {
            0xd02 => Chip::Hip09,
            0xd03 => Chip::Hip10,
            0xd45 => Chip::Hip10c,
            0xd22 => Chip::Hip11,
            0xd06 => Chip::Hip12,
            _ => Chip::Unknown,
        }
    }

    /// Read the MIDR of CPU 0 from sysfs.
    ///
    /// Any failure to read or parse it yields [`Chip::Unknown`].
    pub fn detect(sysfs_root: &Path, log: &Logger) -> Self {
        let path = sysfs_root.join(MIDR_EL1_PATH);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(log, "failed to read MIDR"; "path" => path.display(), "reason" => %e);
                return Chip::Unknown;
            }
        };
        let text = contents.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        match u64::from_str_radix(digits, 16) {
            Ok(midr) => Chip::from_midr(midr),
            Err(e) => {
                warn!(log, "failed to parse MIDR"; "contents" => text, "reason" => %e);
                Chip::Unknown
            }
        }
    }

    fn commands(&self) -> Option<&'static [&'static [&'static str]]> {
        match self {
            Chip::Hip09 | Chip::Hip10 | Chip::Hip10c => Some(HIP09_HIP10_CMDS),
            Chip::Hip11 => Some(HIP11_CMDS),
            Chip::Hip12 => Some(HIP12_CMDS),
            Chip::Unknown => None,
        }
    }

    /// Return true if the command `name` is available on this chip.
    ///
    /// An unrecognized chip supports everything.
    pub fn supports(&self, name: &str) -> bool {
        match self.commands() {
            Some(families) => families.iter().any(|cmds| cmds.contains(&name)),
            None => true,
        }
    }

    /// The number reported by `hikptool -v`.
    pub const fn id(&self) -> u32 {
        *self as u32
    }
}

impl std::fmt::Display for Chip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Chip::Hip09 => "HIP09",
            Chip::Hip10 => "HIP10",
            Chip::Hip10c => "HIP10C",
            Chip::Hip11 => "HIP11",
            Chip::Hip12 => "HIP12",
            Chip::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}
