use std::fs;
use std::path::Path;

use tempfile::{tempdir, TempDir};
use toml_compliance::loader::{load_cases, suite_root, DEFAULT_INPUT_EXTENSION};
use toml_compliance::{Category, HarnessError, Kind};

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
}

/// A small suite with subcategories, a flat file and a hidden directory.
fn sample_suite() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    for file in [
        "valid/array/empty.toml",
        "valid/array/empty.json",
        "valid/array/nested.toml",
        "valid/array/nested.json",
        "valid/float/nan.toml",
        "valid/float/nan.json",
        "valid/flat.toml",
        "valid/flat.json",
        "invalid/array/unclosed.toml",
        "invalid/integer/leading-zero.toml",
        "invalid/encoder/bad-tag.json",
        "invalid/.hidden/ignored.toml",
        "valid/array/notes.txt",
    ] {
        touch(root, file);
    }
    dir
}

#[test]
fn decoder_cases_sorted_and_tagged() {
    let suite = sample_suite();
    let cases = load_cases(suite.path(), Kind::Decoder, DEFAULT_INPUT_EXTENSION).unwrap();

    let ids: Vec<String> = cases.iter().map(|c| c.id()).collect();
    assert_eq!(
        ids,
        [
            "invalid/array/unclosed",
            "invalid/integer/leading-zero",
            "valid/array/empty",
            "valid/array/nested",
            "valid/flat",
            "valid/float/nan",
        ]
    );

    for (i, case) in cases.iter().enumerate() {
        assert_eq!(case.index, i);
        assert_eq!(case.kind, Kind::Decoder);
    }

    let nested = &cases[3];
    assert_eq!(nested.category, Category::Valid);
    assert_eq!(nested.subcategory, "array");
    assert_eq!(nested.name, "nested");
    assert!(nested.input_path.ends_with("valid/array/nested.toml"));
    assert!(nested
        .expected_path
        .as_ref()
        .unwrap()
        .ends_with("valid/array/nested.json"));

    // Paths sort component-wise: `flat.toml` < `float/`.
    let flat = &cases[4];
    assert_eq!(flat.subcategory, "");

    let unclosed = &cases[0];
    assert_eq!(unclosed.category, Category::Invalid);
    assert!(unclosed.expected_path.is_none());
}

#[test]
fn encoder_cases_use_json_files() {
    let suite = sample_suite();
    let cases = load_cases(suite.path(), Kind::Encoder, DEFAULT_INPUT_EXTENSION).unwrap();

    let ids: Vec<String> = cases.iter().map(|c| c.id()).collect();
    assert_eq!(
        ids,
        [
            "invalid/encoder/bad-tag",
            "valid/array/empty",
            "valid/array/nested",
            "valid/flat",
            "valid/float/nan",
        ]
    );
    let valid = &cases[1];
    assert_eq!(valid.kind, Kind::Encoder);
    assert_eq!(valid.expected_path.as_ref(), Some(&valid.input_path));
    assert!(cases[0].expected_path.is_none());
}

#[test]
fn cases_follow_path_order_across_categories() {
    let suite = sample_suite();
    let cases = load_cases(suite.path(), Kind::Decoder, "toml").unwrap();
    let paths: Vec<_> = cases.iter().map(|c| c.input_path.clone()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
    assert_eq!(cases[0].category, Category::Invalid);
}

#[test]
fn discovery_is_deterministic() {
    let suite = sample_suite();
    let first = load_cases(suite.path(), Kind::Decoder, "toml").unwrap();
    let second = load_cases(suite.path(), Kind::Decoder, "toml").unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_expected_output_is_config_error() {
    let dir = tempdir().unwrap();
    touch(dir.path(), "valid/string/basic.toml");

    let err = load_cases(dir.path(), Kind::Decoder, "toml").unwrap_err();
    match err {
        HarnessError::Config(message) => assert!(message.contains("basic.json"), "{message}"),
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn missing_root_is_config_error() {
    let dir = tempdir().unwrap();
    let err = load_cases(&dir.path().join("nope"), Kind::Decoder, "toml").unwrap_err();
    assert!(matches!(err, HarnessError::Config(_)));
}

#[test]
fn missing_category_directory_yields_no_cases() {
    let dir = tempdir().unwrap();
    touch(dir.path(), "invalid/table/dup.toml");
    let cases = load_cases(dir.path(), Kind::Decoder, "toml").unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].category, Category::Invalid);
}

#[test]
fn nested_subcategories_are_joined() {
    let dir = tempdir().unwrap();
    touch(dir.path(), "invalid/table/inline/trailing-comma.toml");
    let cases = load_cases(dir.path(), Kind::Decoder, "toml").unwrap();
    assert_eq!(cases[0].subcategory, "table/inline");
    assert_eq!(cases[0].id(), "invalid/table/inline/trailing-comma");
}

#[test]
fn custom_input_extension() {
    let dir = tempdir().unwrap();
    touch(dir.path(), "invalid/misc/a.tml");
    touch(dir.path(), "invalid/misc/b.toml");
    let cases = load_cases(dir.path(), Kind::Decoder, "tml").unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].name, "a");
}

#[test]
fn suite_root_with_version() {
    let base = Path::new("tests");
    assert_eq!(suite_root(base, None), Path::new("tests"));
    assert_eq!(suite_root(base, Some("v1.0.0")), Path::new("tests/v1.0.0"));
}
