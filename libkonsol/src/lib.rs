// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    fs, io,
    sync::{atomic::AtomicBool, Arc, Mutex},
};

use anyhow::{bail, Context};
use clap::Parser;
pub use hooks::{HostRuntime, NoopRuntime};
use tracing::info;

mod casing;
mod config;
mod consts;
mod eval;
mod framing;
mod hooks;
mod server;
mod session;
mod signals;

/// The command line arguments that konsol expects. These can be
/// directly parsed with clap or manually constructed in order to
/// present some other user interface.
///
/// NOTE: You must check `version()` and handle it yourself. Clap
/// won't do a good job with its automatic version support for a
/// library.
#[derive(Parser, Debug)]
#[clap(author, about)]
pub struct Args {
    #[clap(long, action, help = "Print version and exit")]
    pub version: bool,

    #[clap(
        long,
        action,
        help = "Serve the protocol over stdin/stdout",
        long_help = "Serve the protocol over stdin/stdout

The paired process (an editor extension, a tool window) writes framed
requests to the server's stdin and reads framed responses from its
stdout. This is currently the only transport."
    )]
    pub stdio: bool,

    #[clap(
        short,
        long,
        action,
        long_help = "The file to write logs to

By default logs go to stderr, which the paired process is free to
discard or surface. Logs never go to stdout: that stream carries the
protocol."
    )]
    pub log_file: Option<String>,

    #[clap(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Show more in logs, may be provided multiple times",
    )]
    pub verbose: u8,

    #[clap(short, long, action, help = "a toml file containing configuration")]
    pub config_file: Option<String>,
}

impl Args {
    /// Version indicates if the wrapping binary must display the
    /// version then exit.
    pub fn version(&self) -> bool {
        self.version
    }
}

/// Runs the konsol server with the given arguments. If runtime is
/// provided, its boot and wrap hooks are injected around session
/// creation and every evaluation; the plain binary passes None and
/// gets the no-op runtime.
///
/// Returns the process exit code the caller should exit with: 0 after
/// a clean shutdown-then-exit handshake, 1 otherwise.
pub fn run(args: Args, runtime: Option<Box<dyn HostRuntime>>) -> anyhow::Result<i32> {
    let trace_level = if args.verbose == 0 {
        tracing::Level::INFO
    } else if args.verbose == 1 {
        tracing::Level::DEBUG
    } else {
        tracing::Level::TRACE
    };
    if let Some(log_file) = args.log_file.clone() {
        let file = fs::File::create(log_file).context("creating log file")?;
        tracing_subscriber::fmt()
            .with_max_level(trace_level)
            .with_target(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(trace_level)
            .with_target(false)
            .with_writer(io::stderr)
            .init();
    }

    info!("\n\n==================== STARTING KONSOL SERVER ====================\n\n");

    if !args.stdio {
        bail!("no transport selected, pass --stdio");
    }

    let config = config::read_config(&args.config_file)?;
    info!("host environment profile: {}", config.env_profile());

    let term = Arc::new(AtomicBool::new(false));
    signals::register(Arc::clone(&term))?;

    let mut server = server::Server::new(
        config,
        runtime.unwrap_or_else(|| Box::new(NoopRuntime)),
        term,
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    let code = server
        .serve(&mut stdin.lock(), &mut stdout.lock())
        .context("serving the byte stream")?;

    info!("server loop finished, exit code {}", code);
    Ok(code)
}
