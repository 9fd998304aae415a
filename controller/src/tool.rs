// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The top-level driver: help, version, command lookup and error reporting.

use crate::chip::Chip;
use crate::command::CommandEntry;
use crate::command::Connect;
use crate::command::Invocation;
use crate::nic;
use crate::oplog::OpLog;
use crate::Config;
use crate::Error;
use crate::TOOL_NAME;
use crate::TOOL_VERSION;
use itertools::Itertools;
use slog::debug;
use slog::error;
use slog::warn;
use slog::Logger;
use std::io::Write;

/// Every command the tool carries, whether or not the chip supports it.
pub const COMMANDS: &[CommandEntry] = &[
    CommandEntry::of::<nic::fd::FdCmd>(),
    CommandEntry::of::<nic::ppp::PppCmd>(),
    CommandEntry::of::<nic::rss::RssCmd>(),
];

fn is_option(arg: &str, short: &str, long: &str) -> bool {
    arg == short || arg == long
}

/// Fail if the command line is longer than `max` bytes in total.
pub fn check_command_length<S: AsRef<str>>(args: &[S], max: usize) -> Result<(), Error> {
    let mut len = 0usize;
    for arg in args {
        len = len.saturating_add(arg.as_ref().len());
        if len > max {
            return Err(Error::CommandTooLong);
        }
    }
    Ok(())
}

/// The `hikptool` program.
#[derive(Debug)]
pub struct Tool {
    config: Config,
    chip: Chip,
    commands: Vec<CommandEntry>,
    log: Logger,
}

impl Tool {
    /// Create a tool for the chip this is running on.
    pub fn new(config: Config, log: Logger) -> Self {
        let chip = Chip::detect(&config.sysfs_root, &log);
        Self::with_chip(config, chip, log)
    }

    pub fn with_chip(config: Config, chip: Chip, log: Logger) -> Self {
        debug!(log, "detected chip"; "chip" => %chip);
        Self {
            config,
            chip,
            commands: COMMANDS.to_vec(),
            log,
        }
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    /// The commands available on this chip, sorted by name.
    pub fn commands(&self) -> impl Iterator<Item = &CommandEntry> + '_ {
        self.commands
            .iter()
            .filter(|cmd| self.chip.supports(cmd.name))
            .sorted_by_key(|cmd| cmd.name)
    }

    fn lookup(&self, name: &str) -> Option<&CommandEntry> {
        self.commands
            .iter()
            .find(|cmd| cmd.name == name && self.chip.supports(cmd.name))
    }

    pub fn write_help(&self, out: &mut dyn Write) -> std::io::Result<()> {
        write!(out, "\n  Usage: {TOOL_NAME} <major_cmd> [option]\n\n")?;
        writeln!(out, "    -h, --help    show help information")?;
        writeln!(out, "    -v, --version show version information")?;
        write!(out, "\n  Major Commands:\n\n")?;
        for cmd in self.commands() {
            writeln!(out, "    {:<23}  {}", cmd.name, cmd.help_info)?;
        }
        writeln!(out)
    }

    pub fn write_version(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            out,
            "{TOOL_NAME} version {TOOL_VERSION} Huawei HW({})",
            self.chip.id()
        )
    }

    // Handle `hikptool`, `hikptool -h` and `hikptool -v`.
    fn help_or_version(&self, args: &[String], out: &mut dyn Write) -> Option<std::io::Result<()>> {
        match args {
            [] | [_] => Some(self.write_help(out)),
            [_, arg] if is_option(arg, "-h", "--help") => Some(self.write_help(out)),
            [_, arg] if is_option(arg, "-v", "--version") => Some(self.write_version(out)),
            _ => None,
        }
    }

    fn dispatch(
        &self,
        args: &[String],
        out: &mut dyn Write,
        connect: Connect<'_>,
    ) -> Result<(), Error> {
        let entry = args
            .get(1)
            .and_then(|name| self.lookup(name))
            .ok_or(Error::UnknownCommand)?;
        check_command_length(args, self.config.max_command_len)?;
        let cmd_args = args.get(2..).unwrap_or_default();
        entry.run(Invocation {
            args: cmd_args,
            config: &self.config,
            log: &self.log,
            out,
            connect,
        })
    }

    /// Print `err` and the errors that led to it.
    pub fn report(&self, out: &mut dyn Write, err: &Error) -> std::io::Result<()> {
        let mut causes = Vec::new();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        for cause in causes.iter().rev() {
            writeln!(out, "[ ERROR ] {cause}")?;
        }
        match err {
            Error::UnknownCommand | Error::DeviceInit(_) => writeln!(out, "[ ERROR ] {err}"),
            _ => writeln!(
                out,
                "[ ERROR ] {TOOL_NAME} command error({}): {err}",
                err.errno()
            ),
        }
    }

    /// Run the command line `args`, including the program name, and return
    /// the errno it ended with.
    ///
    /// `connect` opens the firmware channel; it is only called once a
    /// command is about to execute.
    pub fn run(&self, args: &[String], out: &mut dyn Write, connect: Connect<'_>) -> i32 {
        let mut op_log = match OpLog::initialise(&self.config, &self.log) {
            Ok(op_log) => Some(op_log),
            Err(e) => {
                warn!(self.log, "operation log unavailable"; "reason" => %e);
                None
            }
        };
        if let Some(op_log) = op_log.as_mut() {
            op_log.record_input(args);
        }

        if let Some(result) = self.help_or_version(args, out) {
            return match result {
                Ok(()) => 0,
                Err(e) => Error::from(e).errno(),
            };
        }

        let ret = match self.dispatch(args, &mut *out, connect) {
            Ok(()) => 0,
            Err(e) => {
                debug!(self.log, "command failed"; "error" => ?e);
                if let Err(io) = self.report(out, &e) {
                    error!(self.log, "failed to report error"; "error" => %e, "reason" => %io);
                }
                e.errno()
            }
        };
        if let Some(op_log) = op_log.as_ref() {
            op_log.record_result(ret);
        }
        ret
    }
}
