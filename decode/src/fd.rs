// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Records of the flow director (FD) and decoding of its TCAM keys.

use crate::utils::extract_field;
use crate::utils::genmask;
use crate::utils::Reader;
use crate::Error;
use crate::MacAddr;
use crate::Record;
use std::fmt;

/// The number of FD lookup stages.
pub const STAGE_NUM: usize = 2;

/// The key width of the 400-bit modes.
pub const KEY_LEN_400B: u16 = 400;

/// The key width of the 200-bit modes.
pub const KEY_LEN_200B: u16 = 200;

crate::code_enum! {
    name = FdMode,
    description = "The table geometry the flow director runs in.",
    variants = {
        0, Depth2kWidth400bStage1, "one level mode, 2k * 400b",
        1, Depth1kWidth400bStage2, "two level mode, 1k * 400b per level",
        2, Depth4kWidth200bStage1, "one level mode, 4k * 200b",
        3, Depth2kWidth200bStage2, "two level mode, 2k * 200 per level",
    },
    other = Unknown,
    other_display = "unknown mode",
}

impl FdMode {
    /// The number of active key bits in this mode, if known.
    pub const fn max_key_len(&self) -> Option<u16> {
        match self {
            FdMode::Depth2kWidth400bStage1 | FdMode::Depth1kWidth400bStage2 => Some(KEY_LEN_400B),
            FdMode::Depth4kWidth200bStage1 | FdMode::Depth2kWidth200bStage2 => Some(KEY_LEN_200B),
            FdMode::Unknown(_) => None,
        }
    }
}

/// How a stage builds its lookup key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySelect {
    PacketType,
    Tuple,
    Other(u8),
}

impl From<u8> for KeySelect {
    fn from(x: u8) -> Self {
        match x {
            0 => KeySelect::PacketType,
            1 => KeySelect::Tuple,
            x => KeySelect::Other(x),
        }
    }
}

/// How a key field is rendered once extracted from the TCAM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TupleKind {
    Mac,
    EtherType,
    U16,
    U8,
    Ipv4,
    U32,
    Vni,
}

/// One field that may participate in a lookup key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: &'static str,
    pub bits: u8,
    pub kind: TupleKind,
}

const fn key(name: &'static str, bits: u8, kind: TupleKind) -> KeyInfo {
    KeyInfo { name, bits, kind }
}

/// Tuple fields, indexed by their bit in a stage's tuple mask.
pub const TUPLE_KEYS: [KeyInfo; 30] = [
    key("ot_dmac", 48, TupleKind::Mac),
    key("ot_smac", 48, TupleKind::Mac),
    key("ot_vlan_tag_fst", 16, TupleKind::U16),
    key("ot_vlan_tag_sec", 16, TupleKind::U16),
    key("ot_eth_type", 16, TupleKind::EtherType),
    key("ot_l2_rsv", 16, TupleKind::U16),
    key("ot_ip_tos", 8, TupleKind::U8),
    key("ot_ip_proto", 8, TupleKind::U8),
    key("ot_sip", 32, TupleKind::Ipv4),
    key("ot_dip", 32, TupleKind::Ipv4),
    key("ot_l3_rsv", 16, TupleKind::U16),
    key("ot_sp", 16, TupleKind::U16),
    key("ot_dp", 16, TupleKind::U16),
    key("ot_l4_rsv", 32, TupleKind::U32),
    key("ot_tun_vni", 24, TupleKind::Vni),
    key("ot_tun_flow_id", 8, TupleKind::U8),
    key("in_dmac", 48, TupleKind::Mac),
    key("in_smac", 48, TupleKind::Mac),
    key("in_vlan_tag_fst", 16, TupleKind::U16),
    key("in_vlan_tag_sec", 16, TupleKind::U16),
    key("in_eth_type", 16, TupleKind::EtherType),
    key("in_l2_rsv", 16, TupleKind::U16),
    key("in_ip_tos", 8, TupleKind::U8),
    key("in_ip_proto", 8, TupleKind::U8),
    key("in_sip", 32, TupleKind::Ipv4),
    key("in_dip", 32, TupleKind::Ipv4),
    key("in_l3_rsv", 16, TupleKind::U16),
    key("in_sp", 16, TupleKind::U16),
    key("in_dp", 16, TupleKind::U16),
    key("in_l4_rsv", 32, TupleKind::U32),
];

/// Meta data fields, indexed by their bit in a stage's meta data mask.
pub const META_KEYS: [(&str, u8); 8] = [
    ("packet_type_id", 6),
    ("fragement", 1),
    ("roce_type", 1),
    ("next_key", 5),
    ("vlan_num", 2),
    ("src_port", 12),
    ("des_port", 12),
    ("tunnel_packet", 1),
];

/// The key configuration of one stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FdKeyCfg {
    pub stage: u8,
    pub key_select: u8,
    pub inner_src_ipv6_word_en: u8,
    pub inner_dest_ipv6_word_en: u8,
    pub outer_src_ipv6_word_en: u8,
    pub outer_dest_ipv6_word_en: u8,
    /// A clear bit marks an active tuple field.
    pub tuple_mask: u32,
    /// A clear bit marks an active meta data field.
    pub meta_data_mask: u32,
}

impl FdKeyCfg {
    pub fn key_select(&self) -> KeySelect {
        KeySelect::from(self.key_select)
    }

    /// The tuple fields in the key, in TCAM order.
    pub fn active_tuples(&self) -> impl Iterator<Item = &'static KeyInfo> + '_ {
        TUPLE_KEYS
            .iter()
            .enumerate()
            .filter(|(i, _)| self.tuple_mask & (1 << i) == 0)
            .map(|(_, k)| k)
    }

    /// The meta data fields in the key, with their index.
    pub fn active_meta(&self) -> impl Iterator<Item = (usize, &'static str, u8)> + '_ {
        META_KEYS
            .iter()
            .enumerate()
            .filter(|(i, _)| self.meta_data_mask & (1 << i) == 0)
            .map(|(i, (name, bits))| (i, *name, *bits))
    }

    /// The total width of the active meta data, in bits.
    pub fn active_meta_width(&self) -> u16 {
        self.active_meta().map(|(_, _, bits)| u16::from(bits)).sum()
    }
}

impl Record for FdKeyCfg {
    const SIZE: usize = 16;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let [stage, key_select, inner_src, inner_dest, outer_src, outer_dest] = r.array()?;
        r.skip(2)?;
        Ok(Self {
            stage,
            key_select,
            inner_src_ipv6_word_en: inner_src,
            inner_dest_ipv6_word_en: inner_dest,
            outer_src_ipv6_word_en: outer_src,
            outer_dest_ipv6_word_en: outer_dest,
            tuple_mask: r.u32()?,
            meta_data_mask: r.u32()?,
        })
    }
}

/// The flow director configuration of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FdHwInfo {
    pub mode: FdMode,
    pub enable: u8,
    /// The widest key the hardware supports, unrelated to the mode.
    pub key_max_bit: u16,
    pub stage_entry_num: [u32; STAGE_NUM],
    pub stage_counter_num: [u16; STAGE_NUM],
    pub key_cfg: [FdKeyCfg; STAGE_NUM],
}

impl FdHwInfo {
    /// The bytes of one TCAM key half, rounded up to whole words.
    pub fn max_key_bytes(&self) -> u16 {
        (self.key_max_bit / 8).div_ceil(4) * 4
    }

    /// The size of one rule record, including both key halves.
    pub fn rule_size(&self) -> usize {
        FdRule::HEAD_SIZE + 2 * usize::from(self.max_key_bytes())
    }
}

impl Record for FdHwInfo {
    const SIZE: usize = 48;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let mode = FdMode::from(r.u8()?);
        let enable = r.u8()?;
        let key_max_bit = r.u16()?;
        let stage_entry_num = [r.u32()?, r.u32()?];
        let stage_counter_num = [r.u16()?, r.u16()?];
        let first = FdKeyCfg::parse(r.bytes(FdKeyCfg::SIZE)?)?;
        let second = FdKeyCfg::parse(r.bytes(FdKeyCfg::SIZE)?)?;
        Ok(Self {
            mode,
            enable,
            key_max_bit,
            stage_entry_num,
            stage_counter_num,
            key_cfg: [first, second],
        })
    }
}

/// One TCAM rule: action data plus the x / y key halves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FdRule {
    pub idx: u32,
    pub valid: u8,
    pub ad_data_l: u32,
    pub ad_data_h: u32,
    pub key_x: Vec<u8>,
    pub key_y: Vec<u8>,
}

impl FdRule {
    /// The fixed part of a rule ahead of the TCAM data.
    pub const HEAD_SIZE: usize = 16;

    /// Parse a rule whose key halves are `key_bytes` long each.
    pub fn parse(buf: &[u8], key_bytes: usize) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let idx = r.u32()?;
        let valid = r.u8()?;
        r.skip(3)?;
        let ad_data_l = r.u32()?;
        let ad_data_h = r.u32()?;
        let key_x = r.bytes(key_bytes)?.to_vec();
        let key_y = r.bytes(key_bytes)?.to_vec();
        Ok(Self {
            idx,
            valid,
            ad_data_l,
            ad_data_h,
            key_x,
            key_y,
        })
    }

    /// Parse `count` rules of `key_bytes` key halves.
    pub fn parse_many(buf: &[u8], key_bytes: usize, count: usize) -> Result<Vec<Self>, Error> {
        let size = Self::HEAD_SIZE + 2 * key_bytes;
        let need = size * count;
        if buf.len() < need {
            return Err(Error::ShortBuffer {
                need,
                have: buf.len(),
            });
        }
        buf.chunks_exact(size)
            .take(count)
            .map(|chunk| Self::parse(chunk, key_bytes))
            .collect()
    }

    /// The complete 64-bit action data word.
    pub fn ad_data(&self) -> u64 {
        u64::from(self.ad_data_h) << 32 | u64::from(self.ad_data_l)
    }

    pub fn action(&self) -> FdAction {
        FdAction::from_ad_data(self.ad_data_l, self.ad_data_h)
    }

    /// Decode the active tuples of the key, skipping those with an empty mask.
    pub fn tuples(&self, key_cfg: &FdKeyCfg) -> Vec<TupleValue> {
        let mut out = Vec::new();
        let mut offset = 0;
        for info in key_cfg.active_tuples() {
            let len = usize::from(info.bits / 8);
            if let Some(value) = TupleValue::decode(info, &self.key_x, &self.key_y, offset) {
                out.push(value);
            }
            offset += len;
        }
        out
    }

    /// Decode the meta data at the tail of the active key.
    ///
    /// Returns `None` when the mode leaves the meta data position unknown, or
    /// when the fields don't fit the key.
    pub fn meta_data(&self, hw: &FdHwInfo, key_cfg: &FdKeyCfg) -> Option<MetaData> {
        let active_tcam_size = usize::from(hw.mode.max_key_len()? / 8);
        let meta_bytes = usize::from(key_cfg.active_meta_width().div_ceil(8));
        if meta_bytes > 8 || meta_bytes > active_tcam_size {
            return None;
        }
        let start = active_tcam_size - meta_bytes;
        let bytes = self.key_y.get(start..start + meta_bytes)?;
        let mut raw = [0u8; 8];
        raw[..meta_bytes].copy_from_slice(bytes);
        let raw = u64::from_le_bytes(raw);

        // Fields are packed downward from the top of the meta data region,
        // highest index first.
        let active = key_cfg.active_meta().collect::<Vec<_>>();
        let mut fields = Vec::with_capacity(active.len());
        let mut cur_pos = (meta_bytes * 8) as u32;
        for (index, name, bits) in active.into_iter().rev() {
            let bits = u32::from(bits);
            let Some(low) = cur_pos.checked_sub(bits) else {
                return None;
            };
            let value = extract_field(raw, genmask(cur_pos - 1, low), low) as u32;
            fields.push(MetaField { index, name, value });
            cur_pos = low;
        }
        Some(MetaData { raw, fields })
    }
}

/// One decoded tuple of a rule key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TupleValue {
    pub name: &'static str,
    pub mask: u64,
    pub kind: TupleKind,
    /// The key_y bytes interpreted little-endian.
    pub value: u64,
}

impl TupleValue {
    fn decode(info: &'static KeyInfo, x: &[u8], y: &[u8], offset: usize) -> Option<Self> {
        let len = usize::from(info.bits.div_ceil(8));
        let x = x.get(offset..offset + len)?;
        let y = y.get(offset..offset + len)?;
        let mut mask = 0u64;
        let mut value = 0u64;
        for (i, (bx, by)) in x.iter().zip(y.iter()).enumerate() {
            mask |= u64::from(bx ^ by) << (i * 8);
            value |= u64::from(*by) << (i * 8);
        }
        if mask == 0 {
            return None;
        }
        Some(Self {
            name: info.name,
            mask,
            kind: info.kind,
            value,
        })
    }
}

impl fmt::Display for TupleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[mask=0x{:x}]: ", self.name, self.mask)?;
        let v = self.value;
        match self.kind {
            TupleKind::Mac => {
                let b = v.to_le_bytes();
                let mac = MacAddr([b[5], b[4], b[3], b[2], b[1], b[0]]);
                write!(f, "{mac}")
            }
            TupleKind::EtherType => write!(f, "0x{:x}", v as u16),
            TupleKind::U16 => write!(f, "{}", v as u16),
            TupleKind::U8 => write!(f, "0x{:x}", v as u8),
            TupleKind::Ipv4 => {
                let b = (v as u32).to_le_bytes();
                write!(f, "{}.{}.{}.{}", b[3], b[2], b[1], b[0])
            }
            TupleKind::U32 => write!(f, "{}", v as u32),
            TupleKind::Vni => write!(f, "0x{:x}", v & 0xff_ffff),
        }
    }
}

/// One decoded meta data field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetaField {
    pub index: usize,
    pub name: &'static str,
    pub value: u32,
}

impl fmt::Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const VLAN: [&str; 4] = ["no tag", "tag2 only", "tag1 only", "tag1+tag2"];
        let v = self.value;
        write!(f, "{}: ", self.name)?;
        match self.index {
            0 | 3 => write!(f, "{v}"),
            1 if v == 0 => write!(f, "NON-IP frag packet"),
            1 => write!(f, "IP frag packet"),
            2 if v == 0 => write!(f, "NIC packet"),
            2 => write!(f, "RoCE packet"),
            4 => write!(f, "{}", VLAN[(v & 0x3) as usize]),
            5 | 6 => write!(f, "0x{v:x}"),
            7 if v == 0 => write!(f, "non-tunnel packet"),
            7 => write!(f, "tunnel packet"),
            x => write!(f, "unknown meta type({x})"),
        }
    }
}

/// The meta data region of a rule key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaData {
    pub raw: u64,
    /// Fields from the highest index down.
    pub fields: Vec<MetaField>,
}

const AD_DROP_B: u32 = 0;
const AD_DIRECT_QID_B: u32 = 1;
const AD_QID_S: u32 = 2;
const AD_USE_COUNTER_B: u32 = 12;
const AD_COUNTER_NUM_S: u32 = 13;
const AD_NXT_STEP_B: u32 = 20;
const AD_NXT_KEY_S: u32 = 21;
const AD_WR_RULE_ID_B: u32 = 0;
const AD_RULE_ID_S: u32 = 1;
const AD_QUEUE_REGION_EN_B: u32 = 16;
const AD_QUEUE_REGION_SIZE_S: u32 = 17;
const AD_COUNTER_HIGH_BIT: u32 = 7;
const AD_COUNTER_HIGH_BIT_B: u32 = 26;
const AD_QUEUE_ID_HIGH_BIT: u32 = 10;
const AD_QUEUE_ID_HIGH_BIT_B: u32 = 21;

/// The action of a rule, decoded from its action data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FdAction {
    pub drop: bool,
    pub direct_qid: bool,
    pub qid: u16,
    pub counter_valid: bool,
    pub counter_id: u16,
    pub next_valid: bool,
    pub next_input_key: u16,
    pub rule_id_valid: bool,
    pub rule_id: u16,
    pub queue_region_en: bool,
    pub queue_region_size: u16,
}

impl FdAction {
    pub fn from_ad_data(l: u32, h: u32) -> Self {
        let bit = |w: u32, b: u32| w & (1 << b) != 0;
        let field = |w: u32, hi: u32, lo: u32| extract_field(u64::from(w), genmask(hi, lo), lo) as u16;

        let mut out = Self {
            drop: bit(l, AD_DROP_B),
            counter_valid: bit(l, AD_USE_COUNTER_B),
            next_valid: bit(l, AD_NXT_STEP_B),
            rule_id_valid: bit(h, AD_WR_RULE_ID_B),
            queue_region_en: bit(h, AD_QUEUE_REGION_EN_B),
            direct_qid: bit(l, AD_DIRECT_QID_B),
            ..Default::default()
        };
        if out.counter_valid {
            let high = u16::from(bit(h, AD_COUNTER_HIGH_BIT_B)) << AD_COUNTER_HIGH_BIT;
            out.counter_id = high | field(l, 19, AD_COUNTER_NUM_S);
        }
        if out.next_valid {
            out.next_input_key = field(l, 25, AD_NXT_KEY_S);
        }
        if out.rule_id_valid {
            out.rule_id = field(h, 12, AD_RULE_ID_S);
        }
        if out.queue_region_en {
            out.queue_region_size = field(h, 20, AD_QUEUE_REGION_SIZE_S);
        }
        if out.direct_qid || out.queue_region_en {
            let high = u16::from(bit(h, AD_QUEUE_ID_HIGH_BIT_B)) << AD_QUEUE_ID_HIGH_BIT;
            out.qid = high | field(l, 11, AD_QID_S);
        }
        out
    }
}

/// The hit count of one FD counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FdCounter {
    pub idx: u16,
    pub value: u64,
}

impl Record for FdCounter {
    const SIZE: usize = 16;

    fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf);
        let idx = r.u16()?;
        r.skip(6)?;
        let value = r.u64()?;
        Ok(Self { idx, value })
    }
}

#[cfg(test)]
mod tests {
    use super::FdAction;
    use super::FdCounter;
    use super::FdHwInfo;
    use super::FdKeyCfg;
    use super::FdMode;
    use super::FdRule;
    use super::KeySelect;
    use super::Record;

    fn hw_info_bytes(mode: u8, key_max_bit: u16) -> Vec<u8> {
        let mut buf = vec![mode, 1];
        buf.extend_from_slice(&key_max_bit.to_le_bytes());
        buf.extend_from_slice(&2048u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&128u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        // Stage 1 key: tuple, with only ot_dmac (bit 0) and in_sip (bit 24)
        // active, and the vlan_num meta field (bit 4).
        buf.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0]);
        buf.extend_from_slice(&(!(1u32 | 1 << 24)).to_le_bytes());
        buf.extend_from_slice(&(!(1u32 << 4)).to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        buf
    }

    #[test]
    fn test_parse_hw_info() {
        let hw = FdHwInfo::parse(&hw_info_bytes(0, 400)).unwrap();
        assert_eq!(hw.mode, FdMode::Depth2kWidth400bStage1);
        assert_eq!(hw.mode.to_string(), "one level mode, 2k * 400b");
        assert_eq!(hw.stage_entry_num, [2048, 0]);
        assert_eq!(hw.stage_counter_num, [128, 0]);
        assert_eq!(hw.key_cfg[0].key_select(), KeySelect::Tuple);
        assert_eq!(hw.max_key_bytes(), 52);
        assert_eq!(hw.rule_size(), 16 + 104);
        let names = hw.key_cfg[0]
            .active_tuples()
            .map(|k| k.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["ot_dmac", "in_sip"]);
        assert_eq!(hw.key_cfg[0].active_meta_width(), 2);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(FdMode::from(3).max_key_len(), Some(200));
        assert_eq!(FdMode::from(9), FdMode::Unknown(9));
        assert_eq!(FdMode::from(9).to_string(), "unknown mode");
        assert_eq!(FdMode::from(9).max_key_len(), None);
    }

    #[test]
    fn test_action_decode() {
        // drop, direct qid 0x155 with high bit, counter 0x45 with high bit,
        // next key 3.
        let l = 1 | 1 << 1 | 0x155 << 2 | 1 << 12 | 0x45 << 13 | 1 << 20 | 3 << 21;
        let h = 1 << 21 | 1 << 26 | 1 | 0x7ff << 1;
        let action = FdAction::from_ad_data(l, h);
        assert!(action.drop);
        assert!(action.direct_qid);
        assert_eq!(action.qid, 0x400 | 0x155);
        assert!(action.counter_valid);
        assert_eq!(action.counter_id, 0x80 | 0x45);
        assert!(action.next_valid);
        assert_eq!(action.next_input_key, 3);
        assert!(action.rule_id_valid);
        assert_eq!(action.rule_id, 0x7ff);
        assert!(!action.queue_region_en);
    }

    #[test]
    fn test_rule_tuples_and_meta() {
        let hw = FdHwInfo::parse(&hw_info_bytes(0, 400)).unwrap();
        let key_bytes = usize::from(hw.max_key_bytes());
        let mut x = vec![0u8; key_bytes];
        let mut y = vec![0u8; key_bytes];
        // ot_dmac 00:11:22:33:44:55, stored reversed.
        y[..6].copy_from_slice(&[0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);
        x[..6].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        // in_sip left unmasked, so it's skipped.
        // vlan_num = 3 (tag1+tag2), in the top bits of the single meta byte.
        y[49] = 0b1100_0000;
        let mut buf = vec![0u8; FdRule::HEAD_SIZE];
        buf[0] = 5;
        buf[4] = 1;
        buf.extend_from_slice(&x);
        buf.extend_from_slice(&y);

        let rule = FdRule::parse(&buf, key_bytes).unwrap();
        assert_eq!(rule.idx, 5);
        let tuples = rule.tuples(&hw.key_cfg[0]);
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].to_string(), "ot_dmac[mask=0xffffffffffff]: 00:11:22:33:44:55");

        let meta = rule.meta_data(&hw, &hw.key_cfg[0]).unwrap();
        assert_eq!(meta.fields.len(), 1);
        assert_eq!(meta.fields[0].to_string(), "vlan_num: tag1+tag2");
    }

    #[test]
    fn test_meta_unknown_mode() {
        let hw = FdHwInfo::parse(&hw_info_bytes(7, 400)).unwrap();
        let rule = FdRule::parse(&vec![0u8; hw.rule_size()], 52).unwrap();
        assert!(rule.meta_data(&hw, &hw.key_cfg[0]).is_none());
        let cfg = FdKeyCfg::default();
        assert_eq!(cfg.active_tuples().count(), 30);
    }

    #[test]
    fn test_counter() {
        let mut buf = vec![0u8; FdCounter::SIZE];
        buf[0] = 3;
        buf[8..16].copy_from_slice(&1234u64.to_le_bytes());
        assert_eq!(
            FdCounter::parse(&buf).unwrap(),
            FdCounter { idx: 3, value: 1234 }
        );
    }
}
