// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Discovery algorithm for finding stack files and ordering their includes.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cached::{Cached, TimedCache};
use once_cell::sync::Lazy;

#[cfg(test)]
#[path = "./discovery_test.rs"]
mod discovery_test;

use crate::stack::{MalformedPolicy, Source};
use crate::{ENVPATH_VAR, IGNORE_MISSING_VAR, SCOPE_ROOT_VAR, STACK_EXTENSION};

/// How long resolved source lists are reused, in seconds.
const RESOLVE_CACHE_LIFESPAN: u64 = 5;

/// Process wide cache of resolved source lists.
static RESOLVE_CACHE: Lazy<Mutex<TimedCache<ResolveKey, Vec<Source>>>> =
    Lazy::new(|| Mutex::new(TimedCache::with_lifespan(RESOLVE_CACHE_LIFESPAN)));

/// Forget all cached resolutions, so newly written files are picked up.
pub fn clear_resolve_cache() {
    let mut cache = RESOLVE_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    cache.cache_clear();
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResolveKey {
    names: Vec<String>,
    search_dirs: Vec<PathBuf>,
    ignore_missing: bool,
    malformed: MalformedPolicy,
}

/// Options for discovery behavior.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Directories from ENVPATH, in the order written there.
    /// Entries on the left override entries on the right.
    pub env_paths: Vec<PathBuf>,

    /// Directory the scope walk starts from.
    pub scope: Option<PathBuf>,

    /// Outermost directory of the scope walk (from ENVSTACK_SCOPE_ROOT).
    /// No scope walk happens without it.
    pub scope_root: Option<PathBuf>,

    /// Skip stack names that match no files instead of failing.
    pub ignore_missing: bool,

    /// Handling of stack files that fail to parse.
    pub malformed: MalformedPolicy,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            env_paths: Vec::new(),
            scope: None,
            scope_root: None,
            ignore_missing: true,
            malformed: MalformedPolicy::default(),
        }
    }
}

impl DiscoveryOptions {
    /// Options from ENVPATH, ENVSTACK_SCOPE_ROOT and ENVSTACK_IGNORE_MISSING,
    /// scoped to the current directory.
    pub fn from_env() -> Self {
        let env_paths = std::env::var_os(ENVPATH_VAR)
            .map(|value| std::env::split_paths(&value).collect())
            .unwrap_or_default();
        let scope_root = std::env::var_os(SCOPE_ROOT_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let ignore_missing = std::env::var(IGNORE_MISSING_VAR)
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        Self {
            env_paths,
            scope: std::env::current_dir().ok(),
            scope_root,
            ignore_missing,
            malformed: MalformedPolicy::default(),
        }
    }

    /// Directories to search, lowest priority first.
    ///
    /// ENVPATH entries come reversed, followed by the scope walk from the
    /// scope root down to the scope itself.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .env_paths
            .iter()
            .rev()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| expand_home(p))
            .collect();
        dirs.extend(self.scope_dirs());
        dirs
    }

    fn scope_dirs(&self) -> Vec<PathBuf> {
        let (Some(scope), Some(root)) = (&self.scope, &self.scope_root) else {
            return Vec::new();
        };
        let scope = expand_home(scope);
        let root = expand_home(root);
        if !scope.starts_with(&root) {
            tracing::debug!(?scope, ?root, "scope is outside of the scope root");
            return Vec::new();
        }
        let mut dirs: Vec<PathBuf> = scope
            .ancestors()
            .take_while(|dir| dir.starts_with(&root))
            .map(Path::to_path_buf)
            .collect();
        dirs.reverse();
        dirs
    }
}

/// Find and order every source needed for the named stacks.
///
/// Includes come before the file that declares them, and each file
/// appears once, at its first position.
pub fn resolve_sources<S: AsRef<str>>(
    names: &[S],
    options: &DiscoveryOptions,
) -> crate::Result<Vec<Source>> {
    let search_dirs = options.search_dirs();
    let key = ResolveKey {
        names: names.iter().map(|n| n.as_ref().to_string()).collect(),
        search_dirs: search_dirs.clone(),
        ignore_missing: options.ignore_missing,
        malformed: options.malformed,
    };

    {
        let mut cache = RESOLVE_CACHE.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sources) = cache.cache_get(&key) {
            tracing::debug!(names = ?key.names, "using cached resolution");
            return Ok(sources.clone());
        }
    }

    let mut context = ResolutionContext::new(search_dirs, options);
    let sources = context.resolve(&key.names)?;

    let mut cache = RESOLVE_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    cache.cache_set(key, sources.clone());
    Ok(sources)
}

/// State for one resolution request.
#[derive(Debug)]
pub struct ResolutionContext {
    search_dirs: Vec<PathBuf>,
    ignore_missing: bool,
    malformed: MalformedPolicy,

    /// Sources by path, so each file is read once.
    sources: HashMap<PathBuf, Source>,

    /// Stack names fully processed.
    seen: HashSet<String>,

    /// Stack names currently being processed, outermost first.
    active: Vec<String>,
}

impl ResolutionContext {
    pub fn new(search_dirs: Vec<PathBuf>, options: &DiscoveryOptions) -> Self {
        Self {
            search_dirs,
            ignore_missing: options.ignore_missing,
            malformed: options.malformed,
            sources: HashMap::new(),
            seen: HashSet::new(),
            active: Vec::new(),
        }
    }

    /// Resolve the named stacks, in order.
    pub fn resolve<S: AsRef<str>>(&mut self, names: &[S]) -> crate::Result<Vec<Source>> {
        let mut ordered = Vec::new();
        for name in names {
            self.visit(name.as_ref(), &mut ordered)?;
        }

        let mut paths = HashSet::new();
        ordered.retain(|source: &Source| paths.insert(source.path().to_path_buf()));
        Ok(ordered)
    }

    fn visit(&mut self, name: &str, ordered: &mut Vec<Source>) -> crate::Result<()> {
        if self.active.iter().any(|active| active == name) {
            let mut chain = self.active.clone();
            chain.push(name.to_string());
            return Err(crate::Error::CyclicInclude {
                name: name.to_string(),
                chain,
            });
        }
        if self.seen.contains(name) {
            return Ok(());
        }

        let paths = self.find_stack_files(name);
        if paths.is_empty() {
            if !self.ignore_missing {
                return Err(crate::Error::TemplateNotFound(name.to_string()));
            }
            tracing::debug!(name, "no stack files found, skipping");
        }

        self.active.push(name.to_string());
        for path in paths {
            let source = self.source(path);
            // Process includes before this source
            for include in source.includes()? {
                self.visit(&include, ordered)?;
            }
            ordered.push(source);
        }
        self.active.pop();
        self.seen.insert(name.to_string());

        Ok(())
    }

    fn source(&mut self, path: PathBuf) -> Source {
        let malformed = self.malformed;
        self.sources
            .entry(path)
            .or_insert_with_key(|path| Source::with_policy(path.clone(), malformed))
            .clone()
    }

    /// Every file providing `name`, lowest priority first.
    fn find_stack_files(&self, name: &str) -> Vec<PathBuf> {
        let direct = expand_home(Path::new(name));
        if direct.extension().is_some_and(|ext| ext == STACK_EXTENSION) && direct.is_file() {
            return vec![canonical(&direct)];
        }

        let file_name = format!("{name}.{STACK_EXTENSION}");
        let mut found = Vec::new();
        for dir in &self.search_dirs {
            let path = dir.join(&file_name);
            if path.is_file() {
                let path = canonical(&path);
                if !found.contains(&path) {
                    found.push(path);
                }
            }
        }
        found
    }
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
