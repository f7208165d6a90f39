// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

#[derive(Parser)]
struct Harness {
    #[clap(flatten)]
    stack: StackFlags,
}

fn parse(args: &[&str]) -> StackFlags {
    let args = std::iter::once("envstack").chain(args.iter().copied());
    Harness::try_parse_from(args).unwrap().stack
}

#[rstest]
fn test_stack_flags() {
    let flags = parse(&[
        "dev",
        "hello",
        "--envpath",
        "/first:/second",
        "--strict",
        "--platform",
        "windows",
    ]);
    assert_eq!(flags.stacks(), vec!["dev", "hello"]);
    assert_eq!(flags.platform(), Platform::Windows);

    let options = flags.discovery_options().unwrap();
    assert_eq!(
        options.env_paths,
        vec![PathBuf::from("/first"), PathBuf::from("/second")]
    );
    assert!(!options.ignore_missing);
    assert_eq!(options.malformed, MalformedPolicy::Fail);
}

#[rstest]
fn test_unknown_platform_is_rejected() {
    let args = ["envstack", "--platform", "beos"];
    assert!(Harness::try_parse_from(args).is_err());
}

#[rstest]
fn test_load_from_envpath() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("hello.env"),
        "all: &all\n  HELLO: world\ndarwin:\n  <<: *all\nlinux:\n  <<: *all\nwindows:\n  <<: *all\n",
    )
    .unwrap();
    let envpath = tmp.path().to_string_lossy().into_owned();

    let flags = parse(&["hello", "--envpath", &envpath, "--platform", "linux"]);
    let env = flags.load().unwrap();
    assert_eq!(env.get("HELLO"), Some(&envstack::Value::from("world")));
    assert_eq!(env.get("STACK"), Some(&envstack::Value::from("hello")));
}
