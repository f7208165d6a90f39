// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::codec::Codec;

const HELLO: &str = r#"#!/usr/bin/env envstack
include: [default]
all: &all
  HELLO: world
  ROOT: /mnt/pipe
darwin:
  <<: *all
  ROOT: /Volumes/pipe
linux:
  <<: *all
windows:
  <<: *all
  ROOT: X:/pipe
"#;

fn parse(yaml: &str) -> Result<StackFile> {
    StackFile::from_yaml(yaml, Path::new("test.env"))
}

#[rstest]
fn test_parse_platform_sections() {
    let stack = parse(HELLO).unwrap();
    assert_eq!(stack.include, vec!["default"]);
    assert_eq!(stack.all.get("ROOT"), Some(&Value::from("/mnt/pipe")));

    let darwin = stack.section(Platform::Darwin);
    assert_eq!(darwin.get("HELLO"), Some(&Value::from("world")));
    assert_eq!(darwin.get("ROOT"), Some(&Value::from("/Volumes/pipe")));
    assert!(!darwin.contains_key("<<"));

    assert_eq!(stack.section(Platform::Linux).get("ROOT"), Some(&Value::from("/mnt/pipe")));
    assert_eq!(stack.section(Platform::Windows).get("ROOT"), Some(&Value::from("X:/pipe")));
}

#[rstest]
fn test_empty_platform_uses_all() {
    let stack = parse("all:\n  FOO: bar\ndarwin:\nlinux:\nwindows:\n").unwrap();
    assert!(stack.include.is_empty());
    assert_eq!(stack.section(Platform::Linux).get("FOO"), Some(&Value::from("bar")));
}

#[rstest]
fn test_tagged_values_are_nodes() {
    let stack = parse("all:\n  SECRET: !encrypt cHJvZA==\ndarwin:\nlinux:\nwindows:\n").unwrap();
    let node = stack.all.get("SECRET").and_then(Value::as_node).unwrap();
    assert_eq!(node.codec(), Codec::Encrypt);
    assert_eq!(node.raw(), "cHJvZA==");
}

#[rstest]
#[case("all: {}\nlinux: {}\nwindows: {}\n", "darwin")]
#[case("darwin: {}\nlinux: {}\nwindows: {}\n", "all")]
fn test_missing_required_key(#[case] yaml: &str, #[case] key: &str) {
    let err = parse(yaml).unwrap_err();
    let Error::InvalidStack { reason, .. } = err else {
        panic!("expected invalid stack error");
    };
    assert!(reason.contains(key), "{reason}");
}

#[rstest]
fn test_syntax_error_reports_line() {
    let err = parse("all:\n  FOO: [unclosed\ndarwin:\n").unwrap_err();
    let Error::InvalidStack { line, .. } = err else {
        panic!("expected invalid stack error");
    };
    assert!(line.is_some());
}

#[rstest]
fn test_source_loads_once_and_compares_by_path() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("hello.env");
    std::fs::write(&path, HELLO).unwrap();

    let source = Source::new(&path);
    let clone = source.clone();
    assert_eq!(source, clone);
    assert_eq!(source.name(), "hello");
    assert_eq!(source.includes().unwrap(), vec!["default"]);

    // clones share the loaded contents
    std::fs::remove_file(&path).unwrap();
    let linux = clone.load(Platform::Linux).unwrap();
    assert_eq!(linux.get("HELLO"), Some(&Value::from("world")));
}

#[rstest]
fn test_malformed_policy() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.env");
    std::fs::write(&path, "all: [not, a, mapping]\n").unwrap();

    let failing = Source::new(&path);
    assert!(matches!(failing.load(Platform::Linux), Err(Error::InvalidStack { .. })));

    let skipping = Source::with_policy(&path, MalformedPolicy::Skip);
    assert!(skipping.load(Platform::Linux).unwrap().is_empty());
    assert!(skipping.includes().unwrap().is_empty());
}

#[rstest]
fn test_missing_file_is_read_error() {
    let source = Source::with_policy("/does/not/exist.env", MalformedPolicy::Skip);
    assert!(matches!(source.load(Platform::Linux), Err(Error::ReadFailed { .. })));
}
