// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The interface every major command implements, and the glue running one.

use crate::lock::FileLock;
use crate::lock::EXECUTE_LOCK_NAME;
use crate::options::OptionRegistry;
use crate::options::Outcome;
use crate::transport::Transport;
use crate::Config;
use crate::Error;
use nix::errno::Errno;
use slog::debug;
use slog::Logger;
use std::io::Write;

/// What a command executes against.
pub struct Env<'a> {
    pub transport: &'a mut dyn Transport,
    pub out: &'a mut dyn Write,
    pub log: &'a Logger,
}

/// A major command, such as `nic_ppp`.
///
/// A command value is the context its option handlers record into; it is
/// created fresh for each invocation.
pub trait Command: Sized {
    /// The name used to select the command.
    const NAME: &'static str;

    /// The one-line description shown in the tool help.
    const HELP_INFO: &'static str;

    /// The argument synopsis shown in the command help.
    const USAGE: &'static str = "-i <device>";

    fn new(config: &Config, log: &Logger) -> Self;

    /// Register the command's options, usually starting with the help option.
    fn register(reg: &mut OptionRegistry<Self>);

    /// Write the option lines of the command help.
    fn write_options(out: &mut dyn Write) -> std::io::Result<()>;

    fn execute(&mut self, env: &mut Env<'_>) -> Result<(), Error>;

    /// Write the full command help.
    fn write_help(out: &mut dyn Write) -> std::io::Result<()> {
        write!(out, "\n  Usage: {} {}\n", Self::NAME, Self::USAGE)?;
        write!(out, "\n         {}\n", Self::HELP_INFO)?;
        write!(out, "\n  Options:\n\n")?;
        Self::write_options(out)
    }
}

/// Write the usual `-h/--help` option line.
pub fn write_help_option(out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "    {}, {:<25} {}", "-h", "--help", "display this help and exit")
}

/// Opens the channel to firmware, once the command is ready to execute.
pub type Connect<'a> = Box<dyn FnOnce() -> Result<Box<dyn Transport + 'a>, Error> + 'a>;

/// Everything one run of a command needs from the tool.
pub struct Invocation<'a, 'c> {
    /// The tokens after the command name.
    pub args: &'a [String],
    pub config: &'a Config,
    pub log: &'a Logger,
    pub out: &'a mut dyn Write,
    pub connect: Connect<'c>,
}

/// A type-erased entry in the tool's command table.
#[derive(Clone, Copy)]
pub struct CommandEntry {
    pub name: &'static str,
    pub help_info: &'static str,
    run: fn(Invocation<'_, '_>) -> Result<(), Error>,
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name)
            .field("help_info", &self.help_info)
            .finish()
    }
}

impl CommandEntry {
    pub const fn of<C: Command>() -> Self {
        Self {
            name: C::NAME,
            help_info: C::HELP_INFO,
            run: run::<C>,
        }
    }

    pub fn run(&self, inv: Invocation<'_, '_>) -> Result<(), Error> {
        (self.run)(inv)
    }
}

// Usage errors are reported after the command's help.
fn with_help<C: Command>(out: &mut dyn Write, err: Error) -> Error {
    if matches!(err, Error::Usage(_)) {
        if let Err(e) = C::write_help(out) {
            return Error::Io(e);
        }
    }
    err
}

fn run<C: Command>(inv: Invocation<'_, '_>) -> Result<(), Error> {
    let Invocation {
        args,
        config,
        log,
        out,
        connect,
    } = inv;
    let mut cmd = C::new(config, log);
    let mut reg = OptionRegistry::new(log.clone());
    C::register(&mut reg);
    match reg.parse(&mut cmd, args) {
        Ok(Outcome::Continue) => {}
        Ok(Outcome::Help) => return C::write_help(out).map_err(Error::from),
        Err(e) => return Err(with_help::<C>(out, e)),
    }

    let _lock = FileLock::acquire(&config.lock_dir, EXECUTE_LOCK_NAME).map_err(|e| match e {
        Error::Lock(_) => e,
        other => Error::Lock(Errno::from_raw(-other.errno())),
    })?;
    debug!(log, "executing"; "command" => C::NAME, "args" => ?args);
    let mut transport = connect().map_err(|e| Error::DeviceInit(Box::new(e)))?;
    let mut env = Env {
        transport: &mut *transport,
        out: &mut *out,
        log,
    };
    let result = cmd.execute(&mut env);
    drop(env);
    drop(transport);
    result.map_err(|e| with_help::<C>(out, e))
}

#[cfg(test)]
mod tests {
    use super::write_help_option;
    use super::Command;
    use super::CommandEntry;
    use super::Env;
    use super::Invocation;
    use crate::lock::FileLock;
    use crate::lock::EXECUTE_LOCK_NAME;
    use crate::mock::test_logger;
    use crate::mock::MockTransport;
    use crate::options::OptionRegistry;
    use crate::transport::Transport;
    use crate::Config;
    use crate::ConfigBuilder;
    use crate::Error;
    use slog::Logger;
    use std::io::Write;

    #[derive(Debug)]
    struct Probe {
        value: Option<String>,
        fail: bool,
        lock_dir: std::path::PathBuf,
    }

    fn value(ctx: &mut Probe, arg: Option<&str>) -> Result<(), Error> {
        ctx.value = arg.map(String::from);
        Ok(())
    }

    fn fail(ctx: &mut Probe, _: Option<&str>) -> Result<(), Error> {
        ctx.fail = true;
        Ok(())
    }

    impl Command for Probe {
        const NAME: &'static str = "probe";
        const HELP_INFO: &'static str = "probe the device!";

        fn new(config: &Config, _log: &Logger) -> Self {
            Self {
                value: None,
                fail: false,
                lock_dir: config.lock_dir.clone(),
            }
        }

        fn register(reg: &mut OptionRegistry<Self>) {
            reg.register_help();
            reg.register("-v", "--value", true, value);
            reg.register("-f", "--fail", false, fail);
        }

        fn write_options(out: &mut dyn Write) -> std::io::Result<()> {
            write_help_option(out)?;
            writeln!(out, "    {}, {:<25} {}", "-v", "--value=<value>", "a value")
        }

        fn execute(&mut self, env: &mut Env<'_>) -> Result<(), Error> {
            // The execute lock is held while the command runs.
            assert!(FileLock::try_acquire(&self.lock_dir, EXECUTE_LOCK_NAME)
                .unwrap()
                .is_none());
            if self.fail {
                return Err(Error::Usage(String::from("probe failed.")));
            }
            writeln!(env.out, "value={}", self.value.as_deref().unwrap_or("none"))?;
            Ok(())
        }
    }

    fn invoke(
        config: &Config,
        args: &[&str],
        mock: &mut MockTransport,
    ) -> (Result<(), Error>, String, bool) {
        let args = args.iter().map(|s| String::from(*s)).collect::<Vec<_>>();
        let log = test_logger();
        let mut out = Vec::new();
        let mut connected = false;
        let result = CommandEntry::of::<Probe>().run(Invocation {
            args: &args,
            config,
            log: &log,
            out: &mut out,
            connect: Box::new(|| {
                connected = true;
                Ok(Box::new(mock) as Box<dyn Transport + '_>)
            }),
        });
        (result, String::from_utf8(out).unwrap(), connected)
    }

    fn config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::new().log_dir(dir.path()).build().unwrap();
        (dir, config)
    }

    #[test]
    fn test_help_output() {
        let (_dir, config) = config();
        let mut mock = MockTransport::new();
        let (result, out, connected) = invoke(&config, &["-h"], &mut mock);
        result.unwrap();
        assert!(!connected);
        assert_eq!(
            out,
            "\n  Usage: probe -i <device>\n\
            \n         probe the device!\n\
            \n  Options:\n\n\
            \x20   -h, --help                    display this help and exit\n\
            \x20   -v, --value=<value>           a value\n"
        );
    }

    #[test]
    fn test_executes_under_lock() {
        let (_dir, config) = config();
        let mut mock = MockTransport::new();
        let (result, out, connected) = invoke(&config, &["-v", "7"], &mut mock);
        result.unwrap();
        assert!(connected);
        assert_eq!(out, "value=7\n");
        assert!(FileLock::try_acquire(&config.lock_dir, EXECUTE_LOCK_NAME)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_parse_error_skips_execute() {
        let (_dir, config) = config();
        let mut mock = MockTransport::new();
        let (result, out, connected) = invoke(&config, &["-v"], &mut mock);
        assert!(matches!(result, Err(Error::MissingParameter("-v"))));
        assert!(!connected);
        assert!(out.is_empty());
    }

    #[test]
    fn test_usage_error_prints_help_and_releases_lock() {
        let (_dir, config) = config();
        let mut mock = MockTransport::new();
        let (result, out, _) = invoke(&config, &["-f"], &mut mock);
        assert!(matches!(result, Err(Error::Usage(_))));
        assert!(out.starts_with("\n  Usage: probe -i <device>\n"));
        assert!(FileLock::try_acquire(&config.lock_dir, EXECUTE_LOCK_NAME)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_connect_failure() {
        let (_dir, config) = config();
        let log = test_logger();
        let args = Vec::new();
        let mut out = Vec::new();
        let err = CommandEntry::of::<Probe>()
            .run(Invocation {
                args: &args,
                config: &config,
                log: &log,
                out: &mut out,
                connect: Box::new(|| Err(Error::DeviceBusy(42))),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to init RCiEP");
        assert_eq!(err.errno(), -16);
    }
}
