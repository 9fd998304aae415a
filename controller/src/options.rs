// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Registration and parsing of a command's options.
//!
//! Options always come in `-x` / `--xxx` pairs. A token matches an option only
//! if it is exactly equal to one of the two forms; there is no abbreviation
//! and no `--opt=value` syntax. Each option may be given at most once.

use crate::Error;
use slog::error;
use slog::Logger;

/// The maximum number of options a command may register.
pub const MAX_OPTIONS: usize = 64;

/// The short form of the help option.
pub const HELP_SHORT: &str = "-h";

/// The long form of the help option.
pub const HELP_LONG: &str = "--help";

/// A function recording an option into the command context `C`.
pub type Handler<C> = fn(&mut C, Option<&str>) -> Result<(), Error>;

/// One registered option.
pub struct CmdOption<C> {
    pub short: &'static str,
    pub long: &'static str,
    pub takes_param: bool,
    handler: Handler<C>,
}

impl<C> CmdOption<C> {
    /// Return true if `token` is exactly the short or long form.
    pub fn matches(&self, token: &str) -> bool {
        token == self.short || token == self.long
    }

    fn is_help(&self) -> bool {
        self.short == HELP_SHORT || self.long == HELP_LONG
    }
}

impl<C> std::fmt::Debug for CmdOption<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdOption")
            .field("short", &self.short)
            .field("long", &self.long)
            .field("takes_param", &self.takes_param)
            .finish()
    }
}

/// How parsing finished, when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every token was consumed; the command should execute.
    Continue,
    /// The help option was given; its handler ran and nothing else should.
    Help,
}

/// The options of a single command.
#[derive(Debug)]
pub struct OptionRegistry<C> {
    options: Vec<CmdOption<C>>,
    log: Logger,
}

fn noop<C>(_: &mut C, _: Option<&str>) -> Result<(), Error> {
    Ok(())
}

impl<C> OptionRegistry<C> {
    pub fn new(log: Logger) -> Self {
        Self {
            options: Vec::with_capacity(MAX_OPTIONS),
            log,
        }
    }

    /// Register an option.
    ///
    /// Registration into a full registry, or of an option with neither flag,
    /// is logged and ignored.
    pub fn register(
        &mut self,
        short: &'static str,
        long: &'static str,
        takes_param: bool,
        handler: Handler<C>,
    ) {
        if short.is_empty() && long.is_empty() {
            error!(self.log, "Invalid input parameter.");
            return;
        }
        if self.options.len() >= MAX_OPTIONS {
            error!(
                self.log,
                "Do not support more than {} options", MAX_OPTIONS;
                "short" => short,
                "long" => long,
            );
            return;
        }
        self.options.push(CmdOption {
            short,
            long,
            takes_param,
            handler,
        });
    }

    /// Register `-h` / `--help`.
    ///
    /// Matching it stops parsing with [`Outcome::Help`]; the dispatcher prints
    /// the command's help.
    pub fn register_help(&mut self) {
        self.register(HELP_SHORT, HELP_LONG, false, noop::<C>);
    }

    /// The registered options, in registration order.
    pub fn options(&self) -> &[CmdOption<C>] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Parse `args` into `ctx`, invoking each matched option's handler in
    /// order.
    ///
    /// Parsing stops at the first error, which is returned unchanged when it
    /// comes from a handler.
    pub fn parse<S: AsRef<str>>(&self, ctx: &mut C, args: &[S]) -> Result<Outcome, Error> {
        let mut seen = vec![false; self.options.len()];
        let mut tokens = args.iter().map(AsRef::as_ref).peekable();
        while let Some(token) = tokens.next() {
            let Some(index) = self.options.iter().position(|opt| opt.matches(token)) else {
                return Err(Error::UnknownOption(String::from(token)));
            };
            let option = &self.options[index];
            if seen[index] {
                return Err(Error::RepeatedOption(option.short));
            }
            seen[index] = true;

            let param = if option.takes_param {
                match tokens.next_if(|next| !next.starts_with('-')) {
                    Some(param) => Some(param),
                    None => return Err(Error::MissingParameter(option.short)),
                }
            } else {
                None
            };

            (option.handler)(ctx, param)?;
            if option.is_help() {
                return Ok(Outcome::Help);
            }
        }
        Ok(Outcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::OptionRegistry;
    use super::Outcome;
    use super::MAX_OPTIONS;
    use crate::Error;

    #[derive(Debug, Default)]
    struct Ctx {
        interface: Vec<String>,
        dump: Option<String>,
        flag: usize,
    }

    fn interface(ctx: &mut Ctx, arg: Option<&str>) -> Result<(), Error> {
        ctx.interface.push(String::from(arg.unwrap_or_default()));
        Ok(())
    }

    fn dump(ctx: &mut Ctx, arg: Option<&str>) -> Result<(), Error> {
        match arg {
            Some("mac") | Some("vlan") => {
                ctx.dump = arg.map(String::from);
                Ok(())
            }
            _ => Err(Error::Usage(String::from("please input valid subfunction."))),
        }
    }

    fn flag(ctx: &mut Ctx, _: Option<&str>) -> Result<(), Error> {
        ctx.flag += 1;
        Ok(())
    }

    fn registry() -> OptionRegistry<Ctx> {
        let mut reg = OptionRegistry::new(crate::mock::test_logger());
        reg.register_help();
        reg.register("-i", "--interface", true, interface);
        reg.register("-du", "--dump", true, dump);
        reg.register("-f", "--flag", false, flag);
        reg
    }

    #[test]
    fn test_interface_with_value() {
        let mut ctx = Ctx::default();
        let outcome = registry().parse(&mut ctx, &["-i", "eth0"]).unwrap();
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(ctx.interface, vec!["eth0"]);
    }

    #[test]
    fn test_interface_without_value() {
        let mut ctx = Ctx::default();
        let err = registry().parse(&mut ctx, &["-i"]).unwrap_err();
        assert!(matches!(err, Error::MissingParameter("-i")));
        assert_eq!(err.to_string(), "-i option need parameter.");
        assert!(ctx.interface.is_empty());
    }

    #[test]
    fn test_parameter_must_not_look_like_flag() {
        let mut ctx = Ctx::default();
        let err = registry()
            .parse(&mut ctx, &["--interface", "-du", "mac"])
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter("-i")));
        assert!(ctx.dump.is_none());
    }

    #[test]
    fn test_matching_is_exact() {
        let reg = registry();
        for token in ["-", "--", "--inter", "--interfacex", "-ii", "i", "-d", "--dum"] {
            let mut ctx = Ctx::default();
            let err = reg.parse(&mut ctx, &[token, "x"]).unwrap_err();
            assert!(
                matches!(&err, Error::UnknownOption(t) if t == token),
                "token {token} matched: {err:?}"
            );
        }
        let mut ctx = Ctx::default();
        reg.parse(&mut ctx, &["--interface", "eth1", "-du", "vlan"])
            .unwrap();
        assert_eq!(ctx.interface, vec!["eth1"]);
        assert_eq!(ctx.dump.as_deref(), Some("vlan"));
    }

    #[test]
    fn test_repeated_option() {
        let mut ctx = Ctx::default();
        let err = registry()
            .parse(&mut ctx, &["-i", "eth0", "--interface", "eth1"])
            .unwrap_err();
        assert_eq!(err.to_string(), "Repeated option -i.");
        assert_eq!(ctx.interface, vec!["eth0"]);

        let mut ctx = Ctx::default();
        assert!(registry().parse(&mut ctx, &["-f", "-f"]).is_err());
        assert_eq!(ctx.flag, 1);
    }

    #[test]
    fn test_help_stops_parsing() {
        let mut ctx = Ctx::default();
        let outcome = registry()
            .parse(&mut ctx, &["-f", "--help", "-i", "eth0"])
            .unwrap();
        assert_eq!(outcome, Outcome::Help);
        assert_eq!(ctx.flag, 1);
        assert!(ctx.interface.is_empty());
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut ctx = Ctx::default();
        let err = registry()
            .parse(&mut ctx, &["-du", "unknown", "-i", "eth0"])
            .unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert!(ctx.interface.is_empty());

        let mut ctx = Ctx::default();
        registry().parse(&mut ctx, &["-du", "mac"]).unwrap();
        assert_eq!(ctx.dump.as_deref(), Some("mac"));
    }

    #[test]
    fn test_registry_capacity() {
        let mut reg = OptionRegistry::<Ctx>::new(crate::mock::test_logger());
        for _ in 0..MAX_OPTIONS + 3 {
            reg.register("-f", "--flag", false, flag);
        }
        assert_eq!(reg.len(), MAX_OPTIONS);
        reg = OptionRegistry::new(crate::mock::test_logger());
        reg.register("", "", false, flag);
        assert!(reg.is_empty());
    }
}
