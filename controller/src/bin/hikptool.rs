// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

use clap::Parser;
use hikptool::rciep::Rciep;
use hikptool::ConfigBuilder;
use hikptool::Error;
use hikptool::Tool;
use hikptool::Transport;
use hikptool::TOOL_NAME;
use slog::Drain;
use slog::Level;
use std::io::Write;
use std::path::PathBuf;

fn parse_log_level(s: &str) -> Result<Level, String> {
    s.parse().map_err(|_| String::from("invalid log level"))
}

/// Query Hisilicon SoC firmware for NIC state.
///
/// Everything after the tool's own options is the major command and its
/// options, for example `hikptool nic_ppp -i eth0 -du mac`.
#[derive(Parser)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Args {
    /// The log-level.
    #[arg(long, default_value_t = Level::Warning, value_parser = parse_log_level)]
    log_level: Level,

    /// The directory holding the operation log.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// The directory holding the execute lock.
    #[arg(long)]
    lock_dir: Option<PathBuf>,

    /// The root of sysfs, used to find the device and interfaces.
    #[arg(long)]
    sysfs_root: Option<PathBuf>,

    /// The major command and its options.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn run(args: Args) -> i32 {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog::LevelFilter::new(drain, args.log_level).fuse();
    let log = slog::Logger::root(drain, slog::o!());

    let mut builder = ConfigBuilder::new();
    if let Some(dir) = args.log_dir {
        builder = builder.log_dir(dir);
    }
    if let Some(dir) = args.lock_dir {
        builder = builder.lock_dir(dir);
    }
    if let Some(root) = args.sysfs_root {
        builder = builder.sysfs_root(root);
    }
    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            slog::error!(log, "invalid configuration"; "reason" => %e);
            return e.errno();
        }
    };

    let tool = Tool::new(config.clone(), log.clone());
    let argv = std::iter::once(String::from(TOOL_NAME))
        .chain(args.args)
        .collect::<Vec<_>>();
    let mut out = std::io::stdout().lock();
    let connect_log = log.new(slog::o!("name" => "rciep"));
    let ret = tool.run(
        &argv,
        &mut out,
        Box::new(move || -> Result<Box<dyn Transport>, Error> {
            let dev = Rciep::open(&config, connect_log)?;
            Ok(Box::new(dev))
        }),
    );
    let _ = out.flush();
    ret
}

fn main() {
    let ret = run(Args::parse());
    std::process::exit(ret.abs());
}
