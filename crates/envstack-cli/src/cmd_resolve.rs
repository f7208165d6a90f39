// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envstack resolve` command.

use clap::Args;
use envstack::Expander;
use miette::Result;

use crate::StackFlags;
use crate::cmd_show::print_values;

/// Display fully resolved variables
#[derive(Debug, Args)]
pub struct CmdResolve {
    #[clap(flatten)]
    stack: StackFlags,

    /// Only show these variables
    #[clap(short = 'k', long = "key")]
    keys: Vec<String>,

    /// Output format: table, json
    #[clap(long, default_value = "table")]
    format: String,
}

impl CmdResolve {
    pub fn run(&mut self) -> Result<i32> {
        let env = self.stack.load()?;
        let resolved = Expander::from_env().resolve(&env)?;
        print_values(resolved.values(), &self.keys, &self.format)?;
        Ok(0)
    }
}
