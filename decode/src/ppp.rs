// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Records of the packet pre-processor (PPP) tables.

use crate::utils::extract_field;
use crate::utils::Reader;
use crate::Error;
use crate::FuncBitmap;
use crate::MacAddr;
use crate::Record;
use hikp_messages::nic::VlanFilter;
use static_assertions::const_assert_eq;

/// The most functions a port may expose.
pub const MAX_FUNC_NUM: u16 = 256;

/// The number of MAC ids a port bitmap can address.
pub const MAX_MAC_ID: u32 = 8;

const PF_ID_MASK: u64 = 0x7;
const PF_ID_SHIFT: u32 = 0;
const VF_ID_MASK: u64 = 0x7f8;
const VF_ID_SHIFT: u32 = 3;

/// The table sizes and function layout of one port.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PppHwResources {
    pub max_key_mem_size: u32,
    pub overflow_cam_size: u32,
    pub mng_tbl_size: u32,
    pub port_vlan_tbl_size: u16,
    pub vf_vlan_tbl_size: u16,
    pub total_func_num: u16,
    pub abs_func_id_base: u16,
    pub mac_id: u32,
}

impl PppHwResources {
    /// Return true if every size is usable.
    pub fn is_valid(&self) -> bool {
        self.max_key_mem_size != 0
            && self.max_key_mem_size.checked_add(self.overflow_cam_size).is_some()
            && self.port_vlan_tbl_size != 0
            && self.vf_vlan_tbl_size != 0
            && self.mng_tbl_size != 0
            && self.mac_id < MAX_MAC_ID
            && self.total_func_num != 0
            && self.total_func_num <= MAX_FUNC_NUM
            && self.abs_func_id_base < MAX_FUNC_NUM
    }

    /// The number of entries in the MAC table, key memory plus overflow CAM.
    pub fn mac_tbl_size(&self) -> u32 {
        self.max_key_mem_size.saturating_add(self.overflow_cam_size)
    }

    /// Return the absolute id of a function relative to the port.
    ///
    /// Function 0 is the PF itself, numbered by its PCI function. VFs are
    /// numbered from the port's base.
    pub fn abs_func_id(&self, pf_fun: u8, func_id: u16) -> u16 {
        if func_id == 0 {
            u16::from(pf_fun)
        } else {
            self.abs_func_id_base + func_id - 1
        }
    }
}

impl Record for PppHwResources {
    const SIZE: usize = 68;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let out = Self {
            max_key_mem_size: r.u32()?,
            overflow_cam_size: r.u32()?,
            mng_tbl_size: r.u32()?,
            port_vlan_tbl_size: r.u16()?,
            vf_vlan_tbl_size: r.u16()?,
            total_func_num: r.u16()?,
            abs_func_id_base: r.u16()?,
            mac_id: r.u32()?,
        };
        // Trailing reserved words.
        r.skip(40)?;
        Ok(out)
    }
}

/// Name a function relative to its port: `pf`, or `vfN`.
pub fn func_name(func_id: u16) -> String {
    if func_id > 0 {
        format!("vf{}", func_id - 1)
    } else {
        String::from("pf")
    }
}

/// An entry of the unicast MAC table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UcMacEntry {
    pub idx: u32,
    pub mac: MacAddr,
    pub valid: u16,
    pub ingress_port: u16,
    pub vlan_id: u16,
    pub mac_en: u16,
    pub vmdq1: u16,
    pub u_m: u16,
    pub e_vport_type: u16,
    pub e_vport: u16,
}

impl UcMacEntry {
    /// The PF owning the egress vport.
    pub fn pf_id(&self) -> u8 {
        extract_field(u64::from(self.e_vport), PF_ID_MASK, PF_ID_SHIFT) as u8
    }

    /// The function of the egress vport, relative to its PF.
    pub fn vf_id(&self) -> u16 {
        extract_field(u64::from(self.e_vport), VF_ID_MASK, VF_ID_SHIFT) as u16
    }
}

impl Record for UcMacEntry {
    const SIZE: usize = 28;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let out = Self {
            idx: r.u32()?,
            mac: MacAddr(r.array()?),
            valid: r.u16()?,
            ingress_port: r.u16()?,
            vlan_id: r.u16()?,
            mac_en: r.u16()?,
            vmdq1: r.u16()?,
            u_m: r.u16()?,
            e_vport_type: r.u16()?,
            e_vport: r.u16()?,
        };
        r.skip(2)?;
        Ok(out)
    }
}

/// An entry of the multicast MAC table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct McMacEntry {
    pub idx: u32,
    pub mac: MacAddr,
    pub function_bitmap: FuncBitmap,
}

impl Record for McMacEntry {
    const SIZE: usize = 44;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let idx = r.u32()?;
        let mac = MacAddr(r.array()?);
        r.skip(2)?;
        let function_bitmap = FuncBitmap::read(&mut r)?;
        Ok(Self {
            idx,
            mac,
            function_bitmap,
        })
    }
}

/// An entry of the port VLAN filter table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortVlanEntry {
    pub vlan_id: u16,
    /// One bit per MAC id.
    pub port_bitmap: u8,
}

impl PortVlanEntry {
    pub fn has_mac_id(&self, mac_id: u32) -> bool {
        mac_id < MAX_MAC_ID && self.port_bitmap & (1 << mac_id) != 0
    }
}

impl Record for PortVlanEntry {
    const SIZE: usize = 4;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let vlan_id = r.u16()?;
        let port_bitmap = r.u8()?;
        r.skip(1)?;
        Ok(Self {
            vlan_id,
            port_bitmap,
        })
    }
}

/// An entry of the VF VLAN filter table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VfVlanEntry {
    pub vlan_id: u16,
    pub func_bitmap: FuncBitmap,
}

impl Record for VfVlanEntry {
    const SIZE: usize = 36;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let vlan_id = r.u16()?;
        r.skip(2)?;
        let func_bitmap = FuncBitmap::read(&mut r)?;
        Ok(Self {
            vlan_id,
            func_bitmap,
        })
    }
}

/// An entry of the manager table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MngEntry {
    pub entry_no: u32,
    pub mac: MacAddr,
    pub mac_mask: u8,
    pub ether_mask: u8,
    pub ether_type: u16,
    pub vlan_id: u16,
    pub vlan_mask: u8,
    pub i_port_bitmap: u8,
    pub i_port_dir: u8,
    pub drop: u8,
    pub e_port_type: u8,
    pub pf_id: u8,
    pub vf_id: u16,
    pub q_id: u16,
}

impl Record for MngEntry {
    const SIZE: usize = 28;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let out = Self {
            entry_no: r.u32()?,
            mac: MacAddr(r.array()?),
            mac_mask: r.u8()?,
            ether_mask: r.u8()?,
            ether_type: r.u16()?,
            vlan_id: r.u16()?,
            vlan_mask: r.u8()?,
            i_port_bitmap: r.u8()?,
            i_port_dir: r.u8()?,
            drop: r.u8()?,
            e_port_type: r.u8()?,
            pf_id: r.u8()?,
            vf_id: r.u16()?,
            q_id: r.u16()?,
        };
        r.skip(2)?;
        Ok(out)
    }
}

/// Promiscuous mode switches of one function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FuncPromisc {
    pub func_id: u8,
    pub uc_en: u8,
    pub mc_en: u8,
    pub bc_en: u8,
}

impl Record for FuncPromisc {
    const SIZE: usize = 4;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let [func_id, uc_en, mc_en, bc_en] = Reader::new(buf).array()?;
        Ok(Self {
            func_id,
            uc_en,
            mc_en,
            bc_en,
        })
    }
}

// Read the function count heading a per-function table.
fn check_func_num(func_num: u16) -> Result<usize, Error> {
    if func_num > MAX_FUNC_NUM {
        return Err(Error::IllegalFuncNum(func_num));
    }
    Ok(usize::from(func_num))
}

/// The promiscuous configuration of every function on a port.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromiscTable {
    pub funcs: Vec<FuncPromisc>,
}

impl Record for PromiscTable {
    const SIZE: usize = 4 + FuncPromisc::SIZE * MAX_FUNC_NUM as usize;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let func_num = check_func_num(r.u16()?)?;
        r.skip(2)?;
        let funcs = FuncPromisc::parse_many(&buf[r.position()..], func_num)?;
        Ok(Self { funcs })
    }
}

/// VLAN offload switches of one function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FuncVlanOffload {
    pub vlan_fe: VlanFilter,
    pub pvid: u16,
    pub port_vlan_bypass: u8,
    pub accept_tag1: u8,
    pub accept_tag2: u8,
    pub accept_untag1: u8,
    pub accept_untag2: u8,
    pub insert_tag1: u8,
    pub insert_tag2: u8,
    pub shift_tag: u8,
    pub strip_tag1: u8,
    pub strip_tag2: u8,
    pub drop_tag1: u8,
    pub drop_tag2: u8,
    pub pri_only_tag1: u8,
    pub pri_only_tag2: u8,
}

impl FuncVlanOffload {
    /// The tag switches, in display order, with their column names.
    pub fn switches(&self) -> [(&'static str, u8); 13] {
        [
            ("accept_tag1", self.accept_tag1),
            ("accept_tag2", self.accept_tag2),
            ("accept_untag1", self.accept_untag1),
            ("accept_untag2", self.accept_untag2),
            ("insert_tag1", self.insert_tag1),
            ("insert_tag2", self.insert_tag2),
            ("shift_tag", self.shift_tag),
            ("strip_tag1", self.strip_tag1),
            ("strip_tag2", self.strip_tag2),
            ("drop_tag1", self.drop_tag1),
            ("drop_tag2", self.drop_tag2),
            ("pri_only_tag1", self.pri_only_tag1),
            ("pri_only_tag2", self.pri_only_tag2),
        ]
    }
}

impl Record for FuncVlanOffload {
    const SIZE: usize = 20;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let vlan_fe = VlanFilter::from_bits_truncate(r.u16()?);
        let pvid = r.u16()?;
        let [
            port_vlan_bypass,
            accept_tag1,
            accept_tag2,
            accept_untag1,
            accept_untag2,
            insert_tag1,
            insert_tag2,
            shift_tag,
            strip_tag1,
            strip_tag2,
            drop_tag1,
            drop_tag2,
            pri_only_tag1,
            pri_only_tag2,
        ] = r.array()?;
        r.skip(2)?;
        Ok(Self {
            vlan_fe,
            pvid,
            port_vlan_bypass,
            accept_tag1,
            accept_tag2,
            accept_untag1,
            accept_untag2,
            insert_tag1,
            insert_tag2,
            shift_tag,
            strip_tag1,
            strip_tag2,
            drop_tag1,
            drop_tag2,
            pri_only_tag1,
            pri_only_tag2,
        })
    }
}

/// The VLAN offload configuration of a port and each of its functions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VlanOffloadTable {
    pub port_vlan_fe: VlanFilter,
    pub funcs: Vec<FuncVlanOffload>,
}

impl Record for VlanOffloadTable {
    const SIZE: usize = 4 + FuncVlanOffload::SIZE * MAX_FUNC_NUM as usize;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let port_vlan_fe = VlanFilter::from_bits_truncate(u16::from(r.u8()?));
        r.skip(1)?;
        let func_num = check_func_num(r.u16()?)?;
        let funcs = FuncVlanOffload::parse_many(&buf[r.position()..], func_num)?;
        Ok(Self {
            port_vlan_fe,
            funcs,
        })
    }
}

const_assert_eq!(PromiscTable::SIZE, 1028);
const_assert_eq!(VlanOffloadTable::SIZE, 5124);

#[cfg(test)]
mod tests {
    use super::func_name;
    use super::McMacEntry;
    use super::PppHwResources;
    use super::PromiscTable;
    use super::Record;
    use super::UcMacEntry;
    use super::VlanOffloadTable;
    use crate::Error;
    use hikp_messages::nic::VlanFilter;

    fn hw_res_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&4096u32.to_le_bytes());
        buf.extend_from_slice(&64u32.to_le_bytes());
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&256u16.to_le_bytes());
        buf.extend_from_slice(&4096u16.to_le_bytes());
        buf.extend_from_slice(&9u16.to_le_bytes());
        buf.extend_from_slice(&8u16.to_le_bytes());
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.resize(PppHwResources::SIZE, 0);
        buf
    }

    #[test]
    fn test_parse_hw_resources() {
        let res = PppHwResources::parse(&hw_res_bytes()).unwrap();
        assert_eq!(res.max_key_mem_size, 4096);
        assert_eq!(res.mac_tbl_size(), 4160);
        assert_eq!(res.total_func_num, 9);
        assert_eq!(res.mac_id, 2);
        assert!(res.is_valid());
        assert_eq!(res.abs_func_id(1, 0), 1);
        assert_eq!(res.abs_func_id(1, 3), 10);

        let bad = PppHwResources {
            mac_id: 8,
            ..res
        };
        assert!(!bad.is_valid());
        let bad = PppHwResources {
            total_func_num: 257,
            ..res
        };
        assert!(!bad.is_valid());
        let bad = PppHwResources {
            overflow_cam_size: u32::MAX,
            ..res
        };
        assert!(!bad.is_valid());
        assert_eq!(bad.mac_tbl_size(), u32::MAX);
        assert!(PppHwResources::parse(&hw_res_bytes()[..60]).is_err());
    }

    #[test]
    fn test_uc_entry_vport_fields() {
        let mut buf = vec![0u8; UcMacEntry::SIZE];
        buf[0] = 7;
        buf[4..10].copy_from_slice(&[0, 1, 2, 3, 4, 5]);
        // e_vport: pf 2, vf 5.
        let e_vport: u16 = 2 | (5 << 3);
        buf[24..26].copy_from_slice(&e_vport.to_le_bytes());
        let entry = UcMacEntry::parse(&buf).unwrap();
        assert_eq!(entry.idx, 7);
        assert_eq!(entry.mac.to_string(), "00:01:02:03:04:05");
        assert_eq!(entry.pf_id(), 2);
        assert_eq!(entry.vf_id(), 5);
    }

    #[test]
    fn test_mc_entry_bitmap() {
        let mut buf = vec![0u8; McMacEntry::SIZE];
        buf[12..16].copy_from_slice(&0x10u32.to_le_bytes());
        let entry = McMacEntry::parse(&buf).unwrap();
        assert!(entry.function_bitmap.is_set(4));
        assert!(!entry.function_bitmap.is_set(5));
    }

    #[test]
    fn test_promisc_table() {
        let mut buf = vec![0u8; PromiscTable::SIZE];
        buf[0] = 2;
        buf[4..8].copy_from_slice(&[0, 1, 1, 1]);
        buf[8..12].copy_from_slice(&[1, 0, 1, 1]);
        let tbl = PromiscTable::parse(&buf).unwrap();
        assert_eq!(tbl.funcs.len(), 2);
        assert_eq!(tbl.funcs[1].func_id, 1);
        assert_eq!(tbl.funcs[1].uc_en, 0);

        buf[0..2].copy_from_slice(&257u16.to_le_bytes());
        assert_eq!(
            PromiscTable::parse(&buf).err(),
            Some(Error::IllegalFuncNum(257))
        );
    }

    #[test]
    fn test_vlan_offload_table() {
        let mut buf = vec![0u8; VlanOffloadTable::SIZE];
        buf[0] = 0b01;
        buf[2] = 1;
        buf[4..6].copy_from_slice(&0b10u16.to_le_bytes());
        buf[6..8].copy_from_slice(&100u16.to_le_bytes());
        buf[8] = 2;
        let tbl = VlanOffloadTable::parse(&buf).unwrap();
        assert_eq!(tbl.port_vlan_fe, VlanFilter::INGRESS);
        assert_eq!(tbl.funcs.len(), 1);
        assert_eq!(tbl.funcs[0].vlan_fe, VlanFilter::EGRESS);
        assert_eq!(tbl.funcs[0].pvid, 100);
        assert_eq!(tbl.funcs[0].port_vlan_bypass, 2);
    }

    #[test]
    fn test_func_name() {
        assert_eq!(func_name(0), "pf");
        assert_eq!(func_name(1), "vf0");
        assert_eq!(func_name(12), "vf11");
    }
}
