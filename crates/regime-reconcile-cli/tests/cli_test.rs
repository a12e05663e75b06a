//! Integration tests executing the `regime-reconcile` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use ndarray::array;
use ndarray_npy::write_npy;
use tempfile::TempDir;

fn regime_reconcile(args: &[&str]) -> Output {
    let output = Command::new(env!("CARGO_BIN_EXE_regime-reconcile"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to spawn regime-reconcile");
    println!("[AFTER] status={:?}", output.status.code());
    println!("[AFTER] stdout={}", String::from_utf8_lossy(&output.stdout));
    println!("[AFTER] stderr={}", String::from_utf8_lossy(&output.stderr));
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_neurons(path: &Path, rows: &[&[f64]]) {
    let mut text = format!("NEURONS\n{} {}\n", rows.len(), rows[0].len());
    for (i, row) in rows.iter().enumerate() {
        let weights: Vec<String> = row.iter().map(|w| w.to_string()).collect();
        text.push_str(&format!("{} {}\n", i, weights.join(" ")));
    }
    fs::write(path, text).unwrap();
}

#[test]
fn test_match_prints_lut() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.labels");
    let b = tmp.path().join("b.labels");
    let lut_path = tmp.path().join("a-b.lut");
    write_neurons(&a, &[&[0.0, 0.0], &[10.0, 0.0], &[0.0, 10.0]]);
    write_neurons(&b, &[&[0.5, 9.5], &[0.2, 0.1], &[9.9, 0.3]]);

    let output = regime_reconcile(&[
        "match",
        a.to_str().unwrap(),
        b.to_str().unwrap(),
        "--write",
        lut_path.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "2,0,1\n");
    assert_eq!(fs::read_to_string(&lut_path).unwrap(), "2,0,1\n");
    println!("[VERIFIED] match prints and writes the lookup table");
}

#[test]
fn test_match_missing_header_exits_two() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.labels");
    let b = tmp.path().join("b.labels");
    write_neurons(&a, &[&[0.0], &[1.0]]);
    fs::write(&b, "0 1.0\n1 2.0\n").unwrap();

    let output = regime_reconcile(&["match", a.to_str().unwrap(), b.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("could not find NEURONS flag"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_diff_output_format() {
    let tmp = TempDir::new().unwrap();
    let reference = tmp.path().join("reference.npy");
    let candidate = tmp.path().join("candidate.npy");
    let lut = tmp.path().join("swap.lut");
    let renders = tmp.path().join("renders");
    write_npy(&reference, &array![[0u8, 1], [1, 1]]).unwrap();
    write_npy(&candidate, &array![[1u8, 0], [0, 1]]).unwrap();
    fs::write(&lut, "1,0\n").unwrap();

    let output = regime_reconcile(&[
        "diff",
        reference.to_str().unwrap(),
        candidate.to_str().unwrap(),
        "--lut",
        lut.to_str().unwrap(),
        "--render-dir",
        renders.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "num of diff pixels=1, % diff=25.00\n");
    assert!(renders.join("diff_pixels.png").is_file());
    assert!(renders.join("transcribed.png").is_file());
}

#[test]
fn test_diff_shape_mismatch_exits_two() {
    let tmp = TempDir::new().unwrap();
    let reference = tmp.path().join("reference.npy");
    let candidate = tmp.path().join("candidate.npy");
    write_npy(&reference, &array![[0u8, 1], [1, 1]]).unwrap();
    write_npy(&candidate, &array![[0u8, 1, 1]]).unwrap();

    let output = regime_reconcile(&[
        "diff",
        reference.to_str().unwrap(),
        candidate.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_search_finds_swap() {
    let tmp = TempDir::new().unwrap();
    let reference = tmp.path().join("reference.npy");
    let candidate = tmp.path().join("candidate.npy");
    write_npy(&reference, &array![[0u8, 1, 2], [2, 1, 0]]).unwrap();
    write_npy(&candidate, &array![[2u8, 1, 0], [0, 1, 2]]).unwrap();

    let output = regime_reconcile(&[
        "search",
        reference.to_str().unwrap(),
        candidate.to_str().unwrap(),
        "--nlabels",
        "3",
    ]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "2,1,0\nnum of diff pixels=0, % diff=0.00\n");
}

#[test]
fn test_search_label_count_above_limit_exits_two() {
    let tmp = TempDir::new().unwrap();
    let reference = tmp.path().join("reference.npy");
    write_npy(&reference, &array![[0u8, 1], [1, 0]]).unwrap();

    let output = regime_reconcile(&[
        "search",
        reference.to_str().unwrap(),
        reference.to_str().unwrap(),
        "--nlabels",
        "100000",
        "--max-labels",
        "18446744073709551615",
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_run_missing_directory_exits_one() {
    let tmp = TempDir::new().unwrap();
    let present = tmp.path().join("SOM_5x5_02");
    fs::create_dir(&present).unwrap();
    let missing = tmp.path().join("SOM_5x5_03");
    let out = tmp.path().join("DIFF1");

    let output = regime_reconcile(&[
        "run",
        "--out",
        out.to_str().unwrap(),
        present.to_str().unwrap(),
        missing.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "{}", stderr);
    assert!(!out.exists(), "nothing is written before directories are checked");
}

#[test]
fn test_run_negative_threshold_exits_one() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("DIFF1");

    let output = regime_reconcile(&[
        "run",
        "--out",
        out.to_str().unwrap(),
        "--threshold=-1",
        tmp.path().to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[retry]"));
}

#[test]
fn test_missing_arguments_fail() {
    let output = regime_reconcile(&["diff"]);
    assert!(!output.status.success());

    let output = regime_reconcile(&["run", "--out", "/tmp/unused"]);
    assert!(!output.status.success());
}
