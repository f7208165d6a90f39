// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! envstack - Layered Environment Variable Stack CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use envstack::{DiscoveryOptions, Environment, MalformedPolicy, Platform};
use miette::{IntoDiagnostic, Result};

mod cmd_bake;
mod cmd_encrypt;
mod cmd_keygen;
mod cmd_resolve;
mod cmd_show;
mod cmd_sources;
mod cmd_trace;

use cmd_bake::CmdBake;
use cmd_encrypt::CmdEncrypt;
use cmd_keygen::CmdKeygen;
use cmd_resolve::CmdResolve;
use cmd_show::CmdShow;
use cmd_sources::CmdSources;
use cmd_trace::CmdTrace;

#[cfg(test)]
#[path = "./main_test.rs"]
mod main_test;

#[derive(Parser)]
#[clap(
    name = "envstack",
    about = "Layered Environment Variable Stacks",
    version,
    long_about = "Resolve layered, platform aware environment variable stacks"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

/// Flags shared by every command that loads stacks.
#[derive(Parser, Clone, Debug, Default)]
pub struct StackFlags {
    /// Stacks to load, in order (defaults to DEFAULT_ENV_STACK or "default")
    #[clap(value_name = "STACK")]
    pub stacks: Vec<String>,

    /// Search path for stack files, leftmost entries win
    #[clap(long, env = "ENVPATH")]
    pub envpath: Option<String>,

    /// Outermost directory of the scope walk
    #[clap(long, env = "ENVSTACK_SCOPE_ROOT")]
    pub scope_root: Option<PathBuf>,

    /// Start the scope walk here instead of the current directory
    #[clap(long)]
    pub scope: Option<PathBuf>,

    /// Fail when a stack or include matches no files
    #[clap(long)]
    pub strict: bool,

    /// Skip stack files that fail to parse instead of failing
    #[clap(long)]
    pub skip_malformed: bool,

    /// Platform section to load (darwin, linux, windows)
    #[clap(long, env = "ENVSTACK_PLATFORM")]
    pub platform: Option<Platform>,
}

impl StackFlags {
    /// The requested stacks, or the default stack.
    pub fn stacks(&self) -> Vec<String> {
        if self.stacks.is_empty() {
            vec![envstack::environment::default_stack_name()]
        } else {
            self.stacks.clone()
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_default()
    }

    pub fn discovery_options(&self) -> Result<DiscoveryOptions> {
        let mut options = DiscoveryOptions::from_env();
        if let Some(envpath) = &self.envpath {
            options.env_paths = std::env::split_paths(envpath).collect();
        }
        if let Some(root) = &self.scope_root {
            options.scope_root = Some(root.clone());
        }
        if let Some(scope) = &self.scope {
            options.scope = Some(scope.clone());
        } else if options.scope.is_none() {
            options.scope = Some(std::env::current_dir().into_diagnostic()?);
        }
        if self.strict {
            options.ignore_missing = false;
        }
        if self.skip_malformed {
            options.malformed = MalformedPolicy::Skip;
        }
        Ok(options)
    }

    /// Discover and merge the requested stacks without expanding them.
    pub fn load(&self) -> Result<Environment> {
        let options = self.discovery_options()?;
        let stacks = self.stacks();
        tracing::debug!(?stacks, search = ?options.search_dirs(), "loading stacks");
        Ok(envstack::load_environ(stacks.as_slice(), &options, self.platform())?)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Display the merged, unresolved variables
    Show(CmdShow),

    /// Display fully resolved variables
    Resolve(CmdResolve),

    /// List the stack files that make up an environment
    Sources(CmdSources),

    /// Report which stack file sets each variable
    Trace(CmdTrace),

    /// Flatten stacks into a single stack file
    Bake(CmdBake),

    /// Print variables as encrypted stack file entries
    Encrypt(CmdEncrypt),

    /// Generate encryption keys
    Keygen(CmdKeygen),
}

impl Opt {
    fn run(self) -> Result<i32> {
        // Setup logging
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        // Dispatch to command
        match self.cmd {
            Command::Show(mut cmd) => cmd.run(),
            Command::Resolve(mut cmd) => cmd.run(),
            Command::Sources(mut cmd) => cmd.run(),
            Command::Trace(mut cmd) => cmd.run(),
            Command::Bake(mut cmd) => cmd.run(),
            Command::Encrypt(mut cmd) => cmd.run(),
            Command::Keygen(mut cmd) => cmd.run(),
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
