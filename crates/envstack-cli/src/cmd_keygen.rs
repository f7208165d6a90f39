// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `envstack keygen` command.

use clap::Args;
use envstack::codec::{
    FERNET_KEY_VAR, SYMMETRIC_KEY_VAR, generate_fernet_key, generate_symmetric_key,
};
use miette::Result;

/// Generate encryption keys
#[derive(Debug, Args)]
pub struct CmdKeygen {
    /// Generate a Fernet key instead of an AES-GCM key
    #[clap(long)]
    fernet: bool,
}

impl CmdKeygen {
    pub fn run(&mut self) -> Result<i32> {
        if self.fernet {
            println!("{FERNET_KEY_VAR}={}", generate_fernet_key());
        } else {
            println!("{SYMMETRIC_KEY_VAR}={}", generate_symmetric_key()?);
        }
        Ok(0)
    }
}
