// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The command header and the codes it carries.

use hubpack::SerializedSize;
use serde::Deserialize;
use serde::Serialize;

/// The header leading every request.
///
/// The transport writes these four words verbatim ahead of the request data.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, SerializedSize)]
pub struct CmdHeader {
    pub version: u32,
    pub mod_code: u32,
    pub cmd_code: u32,
    pub sub_cmd_code: u32,
}

impl CmdHeader {
    /// Build a zeroed header addressing one command of a module.
    pub const fn new(module: ModuleCode, cmd_code: u32, sub_cmd_code: u32) -> Self {
        Self {
            version: 0,
            mod_code: module as u32,
            cmd_code,
            sub_cmd_code,
        }
    }

    /// Build a header for a NIC command.
    pub const fn nic(cmd: NicCmd, sub_cmd_code: u32) -> Self {
        Self::new(ModuleCode::Nic, cmd as u32, sub_cmd_code)
    }
}

/// The firmware module a request is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ModuleCode {
    Pcie = 0,
    Serdes = 1,
    Nic = 2,
    Socip = 3,
    Roce = 4,
    Roh = 5,
    Sas = 6,
    Sata = 7,
    Mac = 8,
    Dpdk = 9,
    Cxl = 10,
    Ub = 11,
    Hccs = 16,
    Sdma = 17,
}

/// Commands understood by the NIC module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NicCmd {
    GetChipInfo = 1,
    FwLog = 2,
    Dfx = 3,
    Rss = 4,
    Qos = 5,
    Queue = 6,
    Ppp = 7,
    Fd = 8,
    Fec = 9,
    Gro = 0xa,
    Ncsi = 0xb,
    NotifyPkt = 0xc,
    Torus = 0xd,
    PortFault = 0xe,
}

/// The completion status the device reports for one round of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CplStatus {
    Init,
    CompletedByTf,
    CompletedByImu,
    InvalidRequest,
    InvalidRequestParam,
    RequestParamLack,
    ExecuteFailed,
    AppWaitTimeout,
    ImuWaitImpTimeout,
    ImuWaitAppTimeout,
    Unknown(u32),
}

impl CplStatus {
    /// Return true if the round completed and data may be read.
    pub const fn is_complete(&self) -> bool {
        matches!(self, CplStatus::CompletedByTf | CplStatus::CompletedByImu)
    }
}

impl From<u32> for CplStatus {
    fn from(x: u32) -> Self {
        use CplStatus::*;
        match x {
            0 => Init,
            1 => CompletedByTf,
            2 => CompletedByImu,
            3 => InvalidRequest,
            4 => InvalidRequestParam,
            5 => RequestParamLack,
            6 => ExecuteFailed,
            7 => AppWaitTimeout,
            8 => ImuWaitImpTimeout,
            9 => ImuWaitAppTimeout,
            x => Unknown(x),
        }
    }
}

impl From<CplStatus> for u32 {
    fn from(s: CplStatus) -> Self {
        use CplStatus::*;
        match s {
            Init => 0,
            CompletedByTf => 1,
            CompletedByImu => 2,
            InvalidRequest => 3,
            InvalidRequestParam => 4,
            RequestParamLack => 5,
            ExecuteFailed => 6,
            AppWaitTimeout => 7,
            ImuWaitImpTimeout => 8,
            ImuWaitAppTimeout => 9,
            Unknown(x) => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CmdHeader;
    use super::CplStatus;
    use super::NicCmd;
    use hubpack::SerializedSize;

    #[test]
    fn test_header_layout() {
        assert_eq!(CmdHeader::MAX_SIZE, 16);
        let header = CmdHeader::nic(NicCmd::Ppp, 3);
        let mut buf = [0u8; CmdHeader::MAX_SIZE];
        hubpack::serialize(&mut buf, &header).unwrap();
        assert_eq!(&buf[..4], &[0; 4]);
        assert_eq!(&buf[4..8], &[2, 0, 0, 0]);
        assert_eq!(&buf[8..12], &[7, 0, 0, 0]);
        assert_eq!(&buf[12..], &[3, 0, 0, 0]);
    }

    #[test]
    fn test_cpl_status_from_u32() {
        for x in 0..12u32 {
            assert_eq!(u32::from(CplStatus::from(x)), x);
        }
        assert!(CplStatus::from(1).is_complete());
        assert!(CplStatus::from(2).is_complete());
        assert!(!CplStatus::from(7).is_complete());
        assert_eq!(CplStatus::from(42), CplStatus::Unknown(42));
    }
}
