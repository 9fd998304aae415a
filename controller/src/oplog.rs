// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The operation log: one line per invocation recording what was run and
//! how it ended.

use crate::lock::FileLock;
use crate::lock::OP_LOG_LOCK_NAME;
use crate::Config;
use crate::Error;
use chrono::DateTime;
use chrono::Local;
use slog::debug;
use slog::warn;
use slog::Logger;
use std::fs::OpenOptions;
use std::fs::Permissions;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;

/// The name of the current log file.
pub const OP_LOG_FILE_NAME: &str = "operations.log";

/// The name the current file is moved to once it grows too large.
pub const OP_LOG_FILE_BACKUP: &str = "operations.log.old";

/// The size above which the log is rolled over.
pub const OP_LOG_FILE_MAX_SIZE: u64 = 0x40_0000;

const ITEM_END: &str = "\r\n";
const LOG_MODE: u32 = 0o640;

fn epoch_secs(t: &DateTime<Local>) -> f64 {
    t.timestamp_micros() as f64 / 1_000_000.0
}

fn date_time(t: &DateTime<Local>) -> String {
    format!(
        "{} [{:.6}]",
        t.format("[%Y-%m-%d %H:%M:%S]"),
        epoch_secs(t)
    )
}

/// The operation log of the tool.
#[derive(Debug)]
pub struct OpLog {
    path: PathBuf,
    lock_dir: PathBuf,
    start: DateTime<Local>,
    input: String,
    log: Logger,
}

impl OpLog {
    /// Prepare the log directory, rolling the log over if it is too large.
    pub fn initialise(config: &Config, log: &Logger) -> Result<Self, Error> {
        std::fs::create_dir_all(&config.log_dir)?;
        let op_log = Self {
            path: config.log_dir.join(OP_LOG_FILE_NAME),
            lock_dir: config.lock_dir.clone(),
            start: Local::now(),
            input: String::new(),
            log: log.new(slog::o!("component" => "oplog")),
        };
        op_log.rollback(&config.log_dir.join(OP_LOG_FILE_BACKUP))?;
        Ok(op_log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rollback(&self, backup: &Path) -> Result<(), Error> {
        let rolled = match std::fs::metadata(&self.path) {
            Ok(meta) if meta.len() > OP_LOG_FILE_MAX_SIZE => {
                std::fs::rename(&self.path, backup)?;
                true
            }
            Ok(_) => return Ok(()),
            Err(_) => false,
        };
        OpenOptions::new().create(true).append(true).open(&self.path)?;
        std::fs::set_permissions(&self.path, Permissions::from_mode(LOG_MODE))?;
        if rolled {
            debug!(self.log, "rolled over operation log"; "backup" => backup.display());
            self.write(&format!(
                "{}The old operation log has been backed up to {}{ITEM_END}",
                date_time(&Local::now()),
                backup.display(),
            ));
        }
        Ok(())
    }

    /// Remember the command line, to be written with the result.
    pub fn record_input<S: AsRef<str>>(&mut self, args: &[S]) {
        self.start = Local::now();
        let joined = args.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        self.input = format!("{}[{joined}]", date_time(&self.start));
    }

    /// Append the result of the command recorded by [`OpLog::record_input`].
    pub fn record_result(&self, ret: i32) {
        let now = Local::now();
        let elapsed = (now - self.start)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let outcome = if ret == 0 { "SUCCEED" } else { "FAILED" };
        self.write(&format!(
            "{}{} [{elapsed:.6}][{outcome}<{ret}>].{ITEM_END}",
            self.input,
            now.format("[%H:%M:%S]"),
        ));
    }

    /// Append `data` under the log lock.
    ///
    /// Failures are logged and otherwise ignored.
    fn write(&self, data: &str) {
        if let Err(e) = self.try_write(data) {
            warn!(
                self.log,
                "failed to write operation log";
                "path" => self.path.display(),
                "reason" => %e,
            );
        }
    }

    fn try_write(&self, data: &str) -> Result<(), Error> {
        let _lock = FileLock::acquire(&self.lock_dir, OP_LOG_LOCK_NAME)?;
        if !self.path.exists() {
            return Ok(());
        }
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        std::fs::set_permissions(&self.path, Permissions::from_mode(LOG_MODE))?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::OpLog;
    use super::OP_LOG_FILE_BACKUP;
    use super::OP_LOG_FILE_MAX_SIZE;
    use crate::mock::test_logger;
    use crate::ConfigBuilder;
    use std::os::unix::fs::PermissionsExt;

    fn config(dir: &std::path::Path) -> crate::Config {
        ConfigBuilder::new()
            .log_dir(dir.join("operation_logs"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_result_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut op_log = OpLog::initialise(&config, &test_logger()).unwrap();
        let mode = std::fs::metadata(op_log.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);

        op_log.record_input(&["hikptool", "nic_ppp", "-i", "eth0", "-du", "mac"]);
        op_log.record_result(0);
        op_log.record_input(&["hikptool", "nic_fd"]);
        op_log.record_result(-22);

        let contents = std::fs::read_to_string(op_log.path()).unwrap();
        let lines = contents.split_terminator("\r\n").collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[20"));
        assert!(lines[0].contains("][hikptool nic_ppp -i eth0 -du mac]["));
        assert!(lines[0].ends_with("[SUCCEED<0>]."));
        assert!(lines[1].contains("][hikptool nic_fd]["));
        assert!(lines[1].ends_with("[FAILED<-22>]."));
        assert!(contents.ends_with("\r\n"));
        assert!(config.lock_dir.join("op_log").exists());
    }

    #[test]
    fn test_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(&config.log_dir).unwrap();
        let current = config.log_dir.join("operations.log");
        std::fs::write(&current, vec![b'x'; OP_LOG_FILE_MAX_SIZE as usize + 1]).unwrap();

        let op_log = OpLog::initialise(&config, &test_logger()).unwrap();
        let backup = config.log_dir.join(OP_LOG_FILE_BACKUP);
        assert_eq!(
            std::fs::metadata(&backup).unwrap().len(),
            OP_LOG_FILE_MAX_SIZE + 1
        );
        let contents = std::fs::read_to_string(op_log.path()).unwrap();
        assert!(contents.contains(&format!(
            "The old operation log has been backed up to {}\r\n",
            backup.display()
        )));

        // A small log is left alone.
        drop(op_log);
        let op_log = OpLog::initialise(&config, &test_logger()).unwrap();
        assert_eq!(std::fs::read_to_string(op_log.path()).unwrap(), contents);
    }
}
