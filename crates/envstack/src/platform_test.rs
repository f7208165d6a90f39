// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

#[rstest]
#[case("/a:/b:/a:/c", "/a:/b:/c")]
#[case("/usr/bin:/usr/local/bin:/usr/bin:/usr/local/bin::/usr/local/bin:/some/other/path", "/usr/bin:/usr/local/bin:/some/other/path")]
#[case("/usr/bin", "/usr/bin")]
#[case("/usr/bin:", "/usr/bin")]
#[case("", "")]
fn test_dedupe_posix_paths(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(Platform::Linux.dedupe_paths(input), expected);
    assert_eq!(Platform::Darwin.dedupe_paths(input), expected);
}

#[rstest]
#[case(
    "C:\\Program Files\\Python:D:/path2:E:/path3",
    "C:\\Program Files\\Python;D:/path2;E:/path3"
)]
#[case(
    "C:\\Program Files\\Python:C:\\Program Files\\Python:D:/path2:E:/path3:E:/path3:/usr/local/bin",
    "C:\\Program Files\\Python;D:/path2;E:/path3;/usr/local/bin"
)]
#[case(
    "X:/pipe/prod/env;X:/pipe/prod/env:/home/user/envstack/env",
    "X:/pipe/prod/env;/home/user/envstack/env"
)]
#[case(
    "C:\\Program Files\\Python;D:/path2;E:/path3:/usr/local/bin:/usr/local/bin",
    "C:\\Program Files\\Python;D:/path2;E:/path3;/usr/local/bin"
)]
fn test_dedupe_windows_paths(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(Platform::Windows.dedupe_paths(input), expected);
}

#[rstest]
fn test_split_windows_keeps_drive_letters() {
    let paths = Platform::Windows.split_paths("C:/one;D:\\two:/three");
    assert_eq!(paths, vec!["C:/one", "D:\\two", "/three"]);
}

#[rstest]
#[case("linux", Platform::Linux)]
#[case("Darwin", Platform::Darwin)]
#[case("windows", Platform::Windows)]
fn test_parse_platform(#[case] name: &str, #[case] expected: Platform) {
    assert_eq!(name.parse::<Platform>().unwrap(), expected);
    assert_eq!(expected.to_string(), name.to_ascii_lowercase());
}

#[rstest]
fn test_parse_unknown_platform() {
    assert!("solaris".parse::<Platform>().is_err());
}

#[rstest]
fn test_platform_serializes_as_section_name() {
    let platforms: Vec<Platform> = serde_yaml::from_str("[darwin, linux, windows]").unwrap();
    assert_eq!(platforms, Platform::ALL);
    assert_eq!(serde_json::to_string(&Platform::Windows).unwrap(), "\"windows\"");
}
