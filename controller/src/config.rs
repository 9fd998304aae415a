// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Configuration of the tool.

use crate::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Return the default directory for the operation log.
pub fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/hikp/operation_logs")
}

/// Return the default root of sysfs.
pub fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys")
}

/// Return the PCI vendor ID of the RCiEP device.
pub const fn default_vendor_id() -> u16 {
    0x19e5
}

/// Return the PCI device ID of the RCiEP device.
pub const fn default_device_id() -> u16 {
    0xa12f
}

/// Return the expected PCI revision of the RCiEP device.
pub const fn default_revision_id() -> u8 {
    0x30
}

/// Return the default interval between completion polls.
pub const fn default_poll_interval() -> Duration {
    Duration::from_millis(1)
}

/// Return the default number of completion polls before timing out.
pub const fn default_wait_polls() -> u32 {
    5000
}

/// Return the default number of attempts to take the device lock.
pub const fn default_lock_retries() -> u32 {
    5
}

/// Return the default gap between attempts to take the device lock.
pub const fn default_lock_retry_gap() -> Duration {
    Duration::from_millis(1)
}

/// Return the default limit on the summed length of the command line.
pub const fn default_max_command_len() -> usize {
    512
}

/// Configuration for a [`crate::Tool`].
///
/// The [`ConfigBuilder`] can be used to construct this with defaults that work
/// on a production system.
#[derive(Clone, Debug)]
pub struct Config {
    /// The directory holding the operation log.
    pub log_dir: PathBuf,

    /// The directory holding lock files.
    ///
    /// This is `locks` under the log directory, unless set explicitly.
    pub lock_dir: PathBuf,

    /// The root of sysfs, used for device discovery and chip detection.
    pub sysfs_root: PathBuf,

    /// PCI vendor ID of the RCiEP device.
    pub vendor_id: u16,

    /// PCI device ID of the RCiEP device.
    pub device_id: u16,

    /// Expected PCI revision of the RCiEP device. A mismatch is only a
    /// warning.
    pub revision_id: u8,

    /// The interval between polls of the completion status.
    pub poll_interval: Duration,

    /// The number of completion polls before a round times out.
    pub wait_polls: u32,

    /// The number of attempts to take the device lock.
    pub lock_retries: u32,

    /// The gap between attempts to take the device lock.
    pub lock_retry_gap: Duration,

    /// The limit on the summed byte length of all command-line arguments.
    pub max_command_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        let log_dir = default_log_dir();
        Self {
            lock_dir: log_dir.join("locks"),
            log_dir,
            sysfs_root: default_sysfs_root(),
            vendor_id: default_vendor_id(),
            device_id: default_device_id(),
            revision_id: default_revision_id(),
            poll_interval: default_poll_interval(),
            wait_polls: default_wait_polls(),
            lock_retries: default_lock_retries(),
            lock_retry_gap: default_lock_retry_gap(),
            max_command_len: default_max_command_len(),
        }
    }
}

/// A builder interface for generating tool configuration.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    log_dir: Option<PathBuf>,
    lock_dir: Option<PathBuf>,
    sysfs_root: Option<PathBuf>,
    poll_interval: Option<Duration>,
    wait_polls: Option<u32>,
    lock_retries: Option<u32>,
    lock_retry_gap: Option<Duration>,
    max_command_len: Option<usize>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the directory holding the operation log.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Set the directory holding lock files.
    pub fn lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    /// Set the root of sysfs.
    pub fn sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = Some(root.into());
        self
    }

    /// Set the interval between completion polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the number of completion polls before a round times out.
    pub fn wait_polls(mut self, polls: u32) -> Self {
        self.wait_polls = Some(polls);
        self
    }

    /// Set the number of attempts to take the device lock.
    pub fn lock_retries(mut self, retries: u32) -> Self {
        self.lock_retries = Some(retries);
        self
    }

    /// Set the gap between attempts to take the device lock.
    pub fn lock_retry_gap(mut self, gap: Duration) -> Self {
        self.lock_retry_gap = Some(gap);
        self
    }

    /// Set the limit on the summed length of the command line.
    pub fn max_command_len(mut self, len: usize) -> Self {
        self.max_command_len = Some(len);
        self
    }

    /// Build a `Config` from `self`.
    pub fn build(self) -> Result<Config, Error> {
        if self.wait_polls == Some(0) {
            return Err(Error::InvalidArgument(String::from(
                "completion wait limit must be nonzero",
            )));
        }
        if self.lock_retries == Some(0) {
            return Err(Error::InvalidArgument(String::from(
                "device lock retries must be nonzero",
            )));
        }
        let log_dir = self.log_dir.unwrap_or_else(default_log_dir);
        Ok(Config {
            lock_dir: self.lock_dir.unwrap_or_else(|| log_dir.join("locks")),
            log_dir,
            sysfs_root: self.sysfs_root.unwrap_or_else(default_sysfs_root),
            vendor_id: default_vendor_id(),
            device_id: default_device_id(),
            revision_id: default_revision_id(),
            poll_interval: self.poll_interval.unwrap_or_else(default_poll_interval),
            wait_polls: self.wait_polls.unwrap_or_else(default_wait_polls),
            lock_retries: self.lock_retries.unwrap_or_else(default_lock_retries),
            lock_retry_gap: self.lock_retry_gap.unwrap_or_else(default_lock_retry_gap),
            max_command_len: self
                .max_command_len
                .unwrap_or_else(default_max_command_len),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigBuilder;
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.log_dir, Path::new("/var/log/hikp/operation_logs"));
        assert_eq!(
            config.lock_dir,
            Path::new("/var/log/hikp/operation_logs/locks")
        );
        assert_eq!(config.wait_polls, 5000);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.max_command_len, 512);

        let config = ConfigBuilder::new().log_dir("/tmp/hikp").build().unwrap();
        assert_eq!(config.lock_dir, Path::new("/tmp/hikp/locks"));

        let config = ConfigBuilder::new()
            .log_dir("/tmp/hikp")
            .lock_dir("/run/hikp")
            .build()
            .unwrap();
        assert_eq!(config.lock_dir, Path::new("/run/hikp"));

        assert!(ConfigBuilder::new().wait_polls(0).build().is_err());
        assert!(ConfigBuilder::new().lock_retries(0).build().is_err());
    }
}
