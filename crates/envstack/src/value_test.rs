// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;

use super::*;

fn parse(yaml: &str) -> Value {
    Value::from_yaml(serde_yaml::from_str(yaml).unwrap())
}

#[rstest]
#[case("hello", "hello")]
#[case("123", "123")]
#[case("1.5", "1.5")]
#[case("true", "true")]
#[case("~", "")]
fn test_scalars_become_text(#[case] yaml: &str, #[case] expected: &str) {
    assert_eq!(parse(yaml), Value::from(expected));
}

#[rstest]
fn test_tagged_scalar_becomes_stored_node() {
    let value = parse("!base64 cHJvZA==");
    let node = value.as_node().expect("tagged value should be a node");
    assert_eq!(node.codec(), Codec::Base64);
    assert!(!node.is_pending());
    assert_eq!(node.raw(), "cHJvZA==");
}

#[rstest]
fn test_unknown_tag_is_dropped() {
    assert_eq!(parse("!custom value"), Value::from("value"));
}

#[rstest]
fn test_list_and_mapping_text_is_json() {
    let value = parse("[a, b, 1]");
    assert_eq!(value.to_text(), r#"["a","b","1"]"#);

    let value = parse("{b: 1, a: two}");
    assert_eq!(value.to_text(), r#"{"b":"1","a":"two"}"#);
}

#[rstest]
fn test_safe_eval_restores_collections() {
    assert_eq!(
        Value::safe_eval(r#"["a","b"]"#),
        Value::List(vec![Value::from("a"), Value::from("b")])
    );
    assert_eq!(
        Value::safe_eval("['a', 'b', 'c']"),
        Value::List(vec![Value::from("a"), Value::from("b"), Value::from("c")])
    );
    let Value::Map(mapping) = Value::safe_eval(r#"{"key": "value"}"#) else {
        panic!("expected a mapping");
    };
    assert_eq!(mapping.get("key"), Some(&Value::from("value")));
}

#[rstest]
#[case("hello")]
#[case("123")]
#[case("[unterminated")]
#[case("{not: [valid")]
#[case("{token}")]
#[case("[prod]")]
#[case("{a: b}")]
fn test_safe_eval_keeps_text(#[case] text: &str) {
    assert_eq!(Value::safe_eval(text), Value::from(text));
}
