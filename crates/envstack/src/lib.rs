// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! envstack - Layered Environment Variable Stacks
//!
//! This crate provides the core library for resolving hierarchical,
//! platform aware sets of environment variables stored in stack files
//! (`<name>.env`).
//!
//! # Overview
//!
//! Stacks are found on `ENVPATH`, include other stacks by name, and are
//! merged in order with later layers overriding earlier ones. Values may
//! reference other variables with `${NAME}` and the bash style modifiers
//! `${NAME:=default}`, `${NAME:-default}` and `${NAME:?message}`, and may
//! be stored encoded or encrypted.
//!
//! # Example
//!
//! ```yaml
//! #!/usr/bin/env envstack
//! include: [default]
//! all: &all
//!   ROOT: ${ROOT:=/mnt/pipe}
//!   PATH: ${ROOT}/bin:${PATH}
//!   DB_PASSWORD: !encrypt cHJvZA==
//! darwin:
//!   <<: *all
//!   ROOT: /Volumes/pipe
//! linux:
//!   <<: *all
//! windows:
//!   <<: *all
//!   ROOT: X:/pipe
//! ```

pub mod bake;
pub mod codec;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod expand;
pub mod node;
pub mod platform;
pub mod stack;
pub mod template;
pub mod value;

pub use bake::{BakeOptions, bake, encrypt_environ, write_stack};
pub use codec::{Codec, KeyContext};
pub use discovery::{DiscoveryOptions, clear_resolve_cache, resolve_sources};
pub use environment::{Environment, load_environ};
pub use error::{Error, Result};
pub use expand::{Expander, expand_str, resolve_mapping};
pub use node::TypedNode;
pub use platform::Platform;
pub use stack::{MalformedPolicy, Source, StackFile};
pub use template::TemplateString;
pub use value::{Mapping, Value};

/// File extension of stack files.
pub const STACK_EXTENSION: &str = "env";

/// First line of every written stack file, so it can run directly.
pub const SHEBANG: &str = "#!/usr/bin/env envstack";

/// Search path for stack files.
pub const ENVPATH_VAR: &str = "ENVPATH";

/// Outermost directory of the scope walk.
pub const SCOPE_ROOT_VAR: &str = "ENVSTACK_SCOPE_ROOT";

/// Set to `0` or `false` to fail on stack names with no files.
pub const IGNORE_MISSING_VAR: &str = "ENVSTACK_IGNORE_MISSING";

/// Stack loaded when none is named.
pub const DEFAULT_STACK: &str = "default";

/// Overrides [`DEFAULT_STACK`].
pub const DEFAULT_STACK_VAR: &str = "DEFAULT_ENV_STACK";

/// Selects the platform section to load instead of the current one.
pub const PLATFORM_VAR: &str = "ENVSTACK_PLATFORM";
