// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The RCiEP device: a shared register window used to exchange requests with
//! firmware.
//!
//! The window is BAR 0 of a root-complex integrated endpoint, mapped through
//! its sysfs `resource0` file. Requests and responses share the window: the
//! request header and data are written, the doorbell is rung, and the
//! completion status is polled until firmware reports it handled the round.
//! Responses longer than one round are read over several rounds.

use crate::config::Config;
use crate::transport::Response;
use crate::transport::Transport;
use crate::Error;
use hikp_messages::CmdHeader;
use hikp_messages::CplStatus;
use hikp_messages::REQ_DATA_MAX_WORDS;
use hikp_messages::RSP_ALL_DATA_MAX_WORDS;
use hikp_messages::RSP_DATA_MAX_WORDS;
use nix::fcntl::Flock;
use nix::fcntl::FlockArg;
use nix::fcntl::OFlag;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;
use slog::debug;
use slog::error;
use slog::warn;
use slog::Logger;
use std::ffi::c_void;
use std::fs::File;
use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::os::unix::fs::FileExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::path::PathBuf;
use std::ptr::NonNull;

/// Dword offsets into the register window.
pub mod reg {
    /// Response version.
    pub const RSP_VERSION: usize = 0;
    /// Number of response words.
    pub const RSP_PARA_NUM: usize = 1;
    /// Response data of the current round.
    pub const RSP_DATA: usize = 2;
    /// Request header: version, module, command and sub-command.
    pub const REQ_HEADER: usize = 4;
    /// Number of request words.
    pub const REQ_PARA_NUM: usize = 8;
    /// The round being executed.
    pub const EXE_ROUND: usize = 9;
    /// Request data.
    pub const REQ_DATA: usize = 10;
    /// The pid of the process holding the device.
    pub const PID_RECORD: usize = 62;
    /// Completion status of the current round.
    pub const CPL_STATUS: usize = 63;
    pub const DB_TRIG: usize = 64;
    pub const DB_CLR: usize = 65;
    pub const DB_MASK: usize = 66;
    pub const DB_STA: usize = 67;
    pub const DB_FLAG: usize = 68;
    /// The size of the window, in dwords.
    pub const WINDOW_DWORDS: usize = 69;
}

// Offset of the PCI command register in config space, and its memory space
// enable bit.
const PCI_COMMAND_REG: u64 = 0x4;
const PCI_COMMAND_MEMORY: u8 = 1 << 1;

/// Access to the dwords of a register window.
pub trait Registers {
    fn read(&self, dw: usize) -> u32;
    fn write(&mut self, dw: usize, val: u32);
}

/// A shared, writable mapping of the device's register window.
#[derive(Debug)]
pub struct Mapping {
    base: NonNull<u32>,
    len: NonZeroUsize,
}

impl Mapping {
    /// Map the register window of the open `resource0` file.
    pub fn new(file: &File) -> Result<Self, Error> {
        let len = NonZeroUsize::MIN.saturating_add(reg::WINDOW_DWORDS * 4 - 1);
        // Safety: a fresh shared mapping of a device file does not alias any
        // Rust-owned memory.
        let base = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                file,
                0,
            )?
        };
        Ok(Self {
            base: base.cast(),
            len,
        })
    }
}

impl Registers for Mapping {
    fn read(&self, dw: usize) -> u32 {
        assert!(dw < reg::WINDOW_DWORDS);
        // Safety: the index is within the mapping, which lives as long as
        // self.
        unsafe { self.base.as_ptr().add(dw).read_volatile() }
    }

    fn write(&mut self, dw: usize, val: u32) {
        assert!(dw < reg::WINDOW_DWORDS);
        // Safety: as in read.
        unsafe { self.base.as_ptr().add(dw).write_volatile(val) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // Safety: the mapping was created in `new` and is not used again.
        let _ = unsafe { munmap(self.base.cast::<c_void>(), self.len.get()) };
    }
}

/// Find the sysfs directory of the RCiEP device.
///
/// A device matches on its vendor and device ids; a revision other than the
/// expected one is only a warning.
pub fn discover(config: &Config, log: &Logger) -> Result<PathBuf, Error> {
    let not_found = Error::DeviceNotFound {
        vendor: config.vendor_id,
        device: config.device_id,
    };
    let root = config.sysfs_root.join("bus/pci/devices");
    let Ok(dir) = std::fs::read_dir(&root) else {
        return Err(not_found);
    };
    let mut devices: Vec<PathBuf> = dir
        .filter_map(|ent| ent.ok())
        .filter(|ent| !ent.file_name().to_string_lossy().starts_with('.'))
        .map(|ent| ent.path())
        .collect();
    devices.sort();

    let vendor = format!("{:#06x}", config.vendor_id);
    let device = format!("{:#06x}", config.device_id);
    let revision = format!("{:#04x}", config.revision_id);
    for path in devices {
        if !id_matches(&path.join("device"), &device) || !id_matches(&path.join("vendor"), &vendor)
        {
            continue;
        }
        if !id_matches(&path.join("revision"), &revision) {
            warn!(log, "Revision id not match {}.", revision; "device" => %path.display());
        }
        debug!(log, "found RCiEP device"; "path" => %path.display());
        return Ok(path);
    }
    Err(not_found)
}

// Compare the start of a sysfs id file against `expected`.
fn id_matches(path: &Path, expected: &str) -> bool {
    std::fs::read_to_string(path)
        .map(|s| s.trim_end().get(..expected.len()) == Some(expected))
        .unwrap_or(false)
}

// Set the memory space enable bit in the device's command register.
fn enable_mem_space(config: &Path) -> Result<(), Error> {
    let file = OpenOptions::new().read(true).write(true).open(config)?;
    let mut val = [0u8; 1];
    file.read_exact_at(&mut val, PCI_COMMAND_REG)?;
    val[0] |= PCI_COMMAND_MEMORY;
    file.write_all_at(&val, PCI_COMMAND_REG)?;
    Ok(())
}

/// The RCiEP device, exclusively held by this process while it exists.
#[derive(Debug)]
pub struct Rciep<R: Registers = Mapping> {
    regs: R,
    _lock: Option<Flock<File>>,
    poll_interval: std::time::Duration,
    wait_polls: u32,
    log: Logger,
}

impl Rciep<Mapping> {
    /// Discover, map and lock the device.
    pub fn open(config: &Config, log: Logger) -> Result<Self, Error> {
        let dir = discover(config, &log)?;
        let resource = dir.join("resource0");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_SYNC.bits())
            .open(&resource)?;
        let regs = Mapping::new(&file)?;
        enable_mem_space(&dir.join("config"))?;

        let mut file = file;
        let mut attempts = config.lock_retries;
        let lock = loop {
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => break lock,
                Err((f, e)) => {
                    attempts = attempts.saturating_sub(1);
                    if attempts == 0 {
                        let pid = regs.read(reg::PID_RECORD);
                        error!(log, "timed out waiting for lock"; "errno" => %e, "pid" => pid);
                        return Err(Error::DeviceBusy(pid));
                    }
                    file = f;
                    std::thread::sleep(config.lock_retry_gap);
                }
            }
        };

        let mut dev = Self::with_registers(regs, config, log);
        dev._lock = Some(lock);
        Ok(dev)
    }
}

impl<R: Registers> Rciep<R> {
    /// Claim an already-locked register window.
    ///
    /// This marks the doorbell as owned by this process and clears the request
    /// area.
    pub fn with_registers(mut regs: R, config: &Config, log: Logger) -> Self {
        regs.write(reg::DB_FLAG, 1);
        regs.write(reg::PID_RECORD, std::process::id());
        regs.write(reg::DB_MASK, 0);
        for dw in 0..reg::DB_TRIG {
            regs.write(dw, 0);
        }
        Self {
            regs,
            _lock: None,
            poll_interval: config.poll_interval,
            wait_polls: config.wait_polls,
            log,
        }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    fn issue(&mut self) {
        self.regs.write(reg::CPL_STATUS, 0);
        self.regs.write(reg::DB_TRIG, 1);
    }

    fn wait_for_completion(&self) -> CplStatus {
        for _ in 0..self.wait_polls {
            let status = CplStatus::from(self.regs.read(reg::CPL_STATUS));
            if status != CplStatus::Init {
                return status;
            }
            std::thread::sleep(self.poll_interval);
        }
        CplStatus::AppWaitTimeout
    }

    fn copy_round(&self, data: &mut Vec<u32>, words: usize) {
        data.extend((0..words).map(|i| self.regs.read(reg::RSP_DATA + i)));
    }
}

impl<R: Registers> Transport for Rciep<R> {
    fn request(&mut self, header: &CmdHeader, data: &[u32]) -> Result<Response, Error> {
        if data.len() > REQ_DATA_MAX_WORDS {
            return Err(Error::RequestTooLarge(data.len()));
        }
        self.regs.write(reg::REQ_PARA_NUM, data.len() as u32);
        let words = [
            header.version,
            header.mod_code,
            header.cmd_code,
            header.sub_cmd_code,
        ];
        for (i, w) in words.into_iter().enumerate() {
            self.regs.write(reg::REQ_HEADER + i, w);
        }
        for i in 0..REQ_DATA_MAX_WORDS {
            self.regs.write(reg::REQ_DATA + i, 0);
        }
        for (i, w) in data.iter().enumerate() {
            self.regs.write(reg::REQ_DATA + i, *w);
        }

        self.regs.write(reg::EXE_ROUND, 0);
        self.issue();
        let first = self.wait_for_completion();
        if !first.is_complete() {
            return Err(Error::Transport(first));
        }

        let rsp_num = self.regs.read(reg::RSP_PARA_NUM);
        if rsp_num as usize > RSP_ALL_DATA_MAX_WORDS {
            return Err(Error::ResponseTooLarge(rsp_num));
        }
        let rsp_num = rsp_num as usize;
        let mut rsp = Response {
            status: 0,
            version: self.regs.read(reg::RSP_VERSION),
            data: Vec::with_capacity(rsp_num),
        };
        debug!(
            self.log,
            "request completed";
            "header" => ?header,
            "status" => ?first,
            "rsp_num" => rsp_num,
        );

        let rounds = rsp_num.div_ceil(RSP_DATA_MAX_WORDS);
        for round in 0..rounds {
            if round != 0 {
                self.regs.write(reg::EXE_ROUND, round as u32);
                if first == CplStatus::CompletedByTf {
                    self.issue();
                } else {
                    self.regs.write(reg::CPL_STATUS, 0);
                }
                let status = self.wait_for_completion();
                if !status.is_complete() {
                    error!(
                        self.log,
                        "multi round failed, Error code:{}.", u32::from(status);
                        "round" => round,
                    );
                    rsp.status = -1;
                    return Ok(rsp);
                }
            }
            let words = RSP_DATA_MAX_WORDS.min(rsp_num - round * RSP_DATA_MAX_WORDS);
            self.copy_round(&mut rsp.data, words);
        }
        Ok(rsp)
    }
}

impl<R: Registers> Drop for Rciep<R> {
    fn drop(&mut self) {
        if self.regs.read(reg::DB_FLAG) == 1 {
            self.regs.write(reg::DB_FLAG, 0);
            self.regs.write(reg::DB_MASK, 1);
        }
    }
}
