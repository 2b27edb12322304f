//! Runs the built `ffi-metrics` binary the way the census pipeline does.

use serde_json::Value;
use std::fs;
use std::process::Command;

const FFI_SOURCE: &str = r#"
#[link(name = "m")]
unsafe extern "C" {
    fn cos(x: f64) -> f64;
}

#[unsafe(no_mangle)]
pub extern "C" fn exported() -> f64 {
    unsafe { cos(0.0) }
}
"#;

#[test]
#[cfg_attr(miri, ignore = "Miri cannot spawn processes")]
fn test_payload_for_source_tree() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(temp_dir.path().join("src")).unwrap();
    fs::create_dir_all(temp_dir.path().join("target/debug")).unwrap();
    fs::write(temp_dir.path().join("src/ffi.rs"), FFI_SOURCE).unwrap();
    fs::write(temp_dir.path().join("src/plain.rs"), "pub fn add(a: u32, b: u32) -> u32 {\n    a + b\n}\n").unwrap();
    fs::write(temp_dir.path().join("target/debug/build.rs"), FFI_SOURCE).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_ffi-metrics"))
        .arg(temp_dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let payload: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["schema"], 1);
    assert_eq!(payload["files_analyzed"], 2);
    assert_eq!(payload["extern_c"], 1);
    assert_eq!(payload["link_attrs"], 1);
    assert_eq!(payload["no_mangle"], 1);
    assert_eq!(payload["unsafe_blocks"], 1);
    assert_eq!(payload["ffi_files"], 1);
    assert_eq!(payload["files_with_errors"], 0);
    assert!(payload["max_syntax_depth"].as_u64().unwrap() > 0);
}

#[test]
#[cfg_attr(miri, ignore = "Miri cannot spawn processes")]
fn test_missing_directory_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_ffi-metrics"))
        .arg(temp_dir.path().join("absent"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a directory"));
}

#[test]
#[cfg_attr(miri, ignore = "Miri cannot spawn processes")]
fn test_missing_argument_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_ffi-metrics")).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}
