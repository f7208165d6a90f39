// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use rstest::rstest;
use serial_test::serial;
use tempfile::TempDir;

use super::*;
use crate::codec::generate_symmetric_key;
use crate::discovery::{DiscoveryOptions, clear_resolve_cache, resolve_sources};
use crate::environment::STACK_VAR;

const BASE: &str = "all: &all
  ROOT: /mnt/pipe
  PATH: /base/bin:${PATH}
  ENV: prod
darwin:
  <<: *all
  ROOT: /Volumes/pipe
linux:
  <<: *all
windows:
  <<: *all
  ROOT: X:/pipe
";

const SHOW: &str = "include: [base]
all: &all
  PATH: /show/bin:${PATH}
  HELLO: ${ROOT}/hello
  LIST: [a, \"${ENV}\"]
  LOG_LEVEL: ${LOG_LEVEL:=INFO}
darwin:
  <<: *all
linux:
  <<: *all
windows:
  <<: *all
";

fn stack_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("base.env"), BASE).unwrap();
    std::fs::write(tmp.path().join("show.env"), SHOW).unwrap();
    tmp
}

fn show_sources(dir: &Path) -> Vec<Source> {
    clear_resolve_cache();
    let options = DiscoveryOptions {
        env_paths: vec![dir.to_path_buf()],
        ..Default::default()
    };
    resolve_sources(&["show"], &options).unwrap()
}

fn resolved(sources: &[Source], platform: Platform, keys: &KeyContext) -> Mapping {
    let env = Environment::merge(sources, platform, &["show"]).unwrap();
    let mut values = Expander::new()
        .with_keys(keys.clone())
        .resolve(&env)
        .unwrap()
        .into_values();
    values.shift_remove(STACK_VAR);
    values
}

fn write_and_reload(dir: &Path, stack: &StackFile, keys: &KeyContext) -> (PathBuf, Source) {
    let path = dir.join("baked.env");
    write_stack(&path, stack, keys).unwrap();
    (path.clone(), Source::new(path))
}

#[rstest]
#[serial]
fn test_flatten_resolves_identically() {
    let tmp = stack_dir();
    let sources = show_sources(tmp.path());
    assert_eq!(sources.len(), 2);

    let stack = bake_with(&sources, &BakeOptions::default(), &Expander::new()).unwrap();
    assert!(stack.include.is_empty());

    let keys = KeyContext::new();
    let (_, baked) = write_and_reload(tmp.path(), &stack, &keys);
    assert!(baked.includes().unwrap().is_empty());

    for platform in Platform::ALL {
        let original = resolved(&sources, platform, &keys);
        let reloaded = resolved(std::slice::from_ref(&baked), platform, &keys);
        assert_eq!(reloaded, original, "{platform}");
    }
}

#[rstest]
#[serial]
fn test_flatten_inlines_only_layered_self_references() {
    let tmp = stack_dir();
    let sources = show_sources(tmp.path());

    let stack = bake_with(&sources, &BakeOptions::default(), &Expander::new()).unwrap();
    let linux = stack.section(Platform::Linux);
    assert_eq!(linux.get("PATH"), Some(&Value::from("/show/bin:/base/bin")));
    assert_eq!(linux.get("HELLO"), Some(&Value::from("${ROOT}/hello")));
    assert_eq!(linux.get("LOG_LEVEL"), Some(&Value::from("${LOG_LEVEL:=INFO}")));
}

#[rstest]
#[serial]
fn test_depth_keeps_include_of_deepest_layer() {
    let tmp = stack_dir();
    let sources = show_sources(tmp.path());

    let options = BakeOptions {
        depth: 1,
        ..Default::default()
    };
    let stack = bake_with(&sources, &options, &Expander::new()).unwrap();
    assert_eq!(stack.include, vec!["base"]);
    assert!(!stack.all.contains_key("ROOT"));
    assert_eq!(stack.all.get("PATH"), Some(&Value::from("/show/bin:${PATH}")));

    let yaml = to_yaml(&stack, &KeyContext::new()).unwrap();
    assert!(yaml.starts_with("#!/usr/bin/env envstack\ninclude: [base]\nall: &all\n"));
}

#[rstest]
#[serial]
fn test_platform_values_stay_in_platform_sections() {
    let tmp = stack_dir();
    let sources = show_sources(tmp.path());

    let stack = bake_with(&sources, &BakeOptions::default(), &Expander::new()).unwrap();
    assert!(!stack.all.contains_key("ROOT"));
    assert_eq!(stack.all.get("ENV"), Some(&Value::from("prod")));

    let yaml = to_yaml(&stack, &KeyContext::new()).unwrap();
    assert!(yaml.contains("darwin:\n  <<: *all\n  PATH: /show/bin:/base/bin\n  ROOT: /Volumes/pipe\n"));
    assert!(yaml.contains("linux:\n  <<: *all\n  PATH: /show/bin:/base/bin\n  ROOT: /mnt/pipe\n"));
    assert!(yaml.contains("windows:\n  <<: *all\n  PATH: /show/bin;/base/bin\n  ROOT: X:/pipe\n"));
}

#[rstest]
fn test_partition() {
    let section = |root: &str| -> Mapping {
        [("FOO", "bar"), ("ROOT", root)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect()
    };
    let stack = partition(
        vec!["default".to_string()],
        [section("/Volumes"), section("/mnt"), section("X:/")],
    );
    assert_eq!(stack.include, vec!["default"]);
    assert_eq!(stack.all.len(), 1);
    assert_eq!(stack.all.get("FOO"), Some(&Value::from("bar")));
    assert_eq!(
        stack.section(Platform::Windows).get("ROOT"),
        Some(&Value::from("X:/"))
    );
}

#[rstest]
fn test_empty_stack_is_valid() {
    let stack = partition(Vec::new(), Default::default());
    let yaml = to_yaml(&stack, &KeyContext::new()).unwrap();
    assert_eq!(
        yaml,
        "#!/usr/bin/env envstack\ninclude: []\nall: &all {}\ndarwin:\n  <<: *all\nlinux:\n  <<: *all\nwindows:\n  <<: *all\n"
    );
    let reloaded = StackFile::from_yaml(&yaml, Path::new("empty.env")).unwrap();
    assert!(reloaded.section(Platform::Linux).is_empty());
}

#[rstest]
#[case("/mnt/pipe", "/mnt/pipe")]
#[case("${LOG_LEVEL:=INFO}", "${LOG_LEVEL:=INFO}")]
#[case("", "\"\"")]
#[case("5", "\"5\"")]
#[case("true", "\"true\"")]
#[case("a: b", "\"a: b\"")]
#[case("*all", "\"*all\"")]
#[case("value # note", "\"value # note\"")]
fn test_scalar_quoting(#[case] text: &str, #[case] expected: &str) {
    assert_eq!(scalar(text), expected);
}

#[rstest]
#[serial]
fn test_encrypt_without_keys_uses_base64() {
    let tmp = stack_dir();
    let sources = show_sources(tmp.path());

    let options = BakeOptions {
        encrypt: true,
        ..Default::default()
    };
    let keys = KeyContext::new();
    let stack = bake_with(&sources, &options, &Expander::new()).unwrap();
    let (path, baked) = write_and_reload(tmp.path(), &stack, &keys);

    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.contains("  ENV: !encrypt cHJvZA==\n"));
    assert!(!text.contains("/mnt/pipe"));

    let reloaded = resolved(std::slice::from_ref(&baked), Platform::Linux, &keys);
    assert_eq!(reloaded, resolved(&sources, Platform::Linux, &keys));
}

#[rstest]
#[serial]
fn test_encrypt_with_symmetric_key() {
    let tmp = stack_dir();
    let sources = show_sources(tmp.path());

    let options = BakeOptions {
        encrypt: true,
        ..Default::default()
    };
    let keys = KeyContext::new().with_symmetric_key(generate_symmetric_key().unwrap());
    let stack = bake_with(&sources, &options, &Expander::new()).unwrap();
    let (path, baked) = write_and_reload(tmp.path(), &stack, &keys);

    let text = std::fs::read_to_string(path).unwrap();
    assert!(!text.contains("cHJvZA=="));

    let reloaded = resolved(std::slice::from_ref(&baked), Platform::Linux, &keys);
    assert_eq!(reloaded.get("ENV"), Some(&Value::from("prod")));
    assert_eq!(reloaded.get("HELLO"), Some(&Value::from("/mnt/pipe/hello")));

    let without_key = resolved(std::slice::from_ref(&baked), Platform::Linux, &KeyContext::new());
    assert_ne!(without_key.get("ENV"), Some(&Value::from("prod")));
}

#[rstest]
fn test_typed_nodes_pass_through() {
    let mut values = Mapping::new();
    values.insert(
        "SECRET".to_string(),
        Value::Node(TypedNode::stored(Codec::Base64, "c2VjcmV0")),
    );
    values.insert("PLAIN".to_string(), Value::from("prod"));
    let env = Environment::from_mapping(values, Platform::Linux);

    let encrypted = encrypt_environ(&env);
    let secret = encrypted.get("SECRET").and_then(Value::as_node).unwrap();
    assert_eq!(secret.codec(), Codec::Base64);
    assert_eq!(secret.raw(), "c2VjcmV0");

    let plain = encrypted.get("PLAIN").and_then(Value::as_node).unwrap();
    assert_eq!(plain.codec(), Codec::Encrypt);
    assert!(plain.is_pending());

    let stack = partition(
        Vec::new(),
        [
            encrypted.values().clone(),
            encrypted.values().clone(),
            encrypted.values().clone(),
        ],
    );
    let yaml = to_yaml(&stack, &KeyContext::new()).unwrap();
    assert!(yaml.contains("  PLAIN: !encrypt cHJvZA==\n"));
    assert!(yaml.contains("  SECRET: !base64 c2VjcmV0\n"));
}
