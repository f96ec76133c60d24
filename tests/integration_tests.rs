use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

fn bytecpu() -> Command {
    Command::cargo_bin("bytecpu").unwrap()
}

#[test]
fn runs_without_arguments() {
    bytecpu()
        .assert()
        .success()
        .stdout(contains("bytecpu v"));
}

#[test]
fn runs_noop() {
    bytecpu()
        .arg("run")
        .arg("tests/files/noop.asm")
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("Halted"))
        .stdout(contains("d0 0\n"))
        .stdout(contains("a7 0\n"))
        .stdout(contains("pc 1\n"))
        .stdout(contains(
            "flags negative=0 zero=0 carry=0 overflow=0 equal=0",
        ));
}

#[test]
fn runs_move() {
    bytecpu()
        .arg("run")
        .arg("tests/files/move.asm")
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("d0 5\n"))
        .stdout(contains("0080: 05 00"))
        .stdout(contains("negative=0 zero=0"));
}

#[test]
fn takes_branch() {
    bytecpu()
        .arg("run")
        .arg("tests/files/branch.asm")
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("d1 0\n"))
        .stdout(contains("pc 17\n"))
        .stdout(contains("equal=1"));
}

#[test]
fn runs_loop() {
    bytecpu()
        .arg("run")
        .arg("tests/files/countdown.asm")
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("d0 0\n"))
        .stdout(contains("d1 15\n"));
}

#[test]
fn runs_path_shorthand() {
    bytecpu()
        .arg("tests/files/countdown.asm")
        .assert()
        .success()
        .stdout(contains("Running"))
        .stdout(contains("Halted"));
}

#[test]
fn runs_with_clock() {
    bytecpu()
        .arg("run")
        .arg("tests/files/noop.asm")
        .arg("--clock")
        .arg("1khz")
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("at 1 kHz"))
        .stdout(contains("Halted"));

    bytecpu()
        .arg("run")
        .arg("tests/files/noop.asm")
        .arg("--clock")
        .arg("0hz")
        .assert()
        .failure();
}

#[test]
fn traces_steps() {
    bytecpu()
        .env("BYTECPU_TRACE", "1")
        .arg("run")
        .arg("tests/files/countdown.asm")
        .arg("--minimal")
        .assert()
        .success()
        .stderr(contains("pc=5"))
        .stderr(contains("halted"));
}

#[test]
fn reports_fault() {
    bytecpu()
        .arg("run")
        .arg("tests/files/divzero.asm")
        .arg("--minimal")
        .assert()
        .failure()
        .stdout(contains("Faulted"))
        // Dump still shows state at the fault
        .stdout(contains("d2 7\n"))
        .stderr(contains("division by zero at pc 5"));
}

#[test]
fn limits_registers() {
    bytecpu()
        .arg("run")
        .arg("tests/files/countdown.asm")
        .arg("--registers")
        .arg("1")
        .arg("--minimal")
        .assert()
        .failure()
        .stderr(contains("register d1 is out of bounds"));
}

#[test]
fn rejects_oversized_register_bank() {
    bytecpu()
        .arg("run")
        .arg("tests/files/noop.asm")
        .arg("--registers")
        .arg("1000")
        .assert()
        .failure()
        .stderr(contains("1000"));

    bytecpu()
        .arg("run")
        .arg("tests/files/noop.asm")
        .arg("--registers")
        .arg("256")
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("d255 0\n"));
}

#[test]
fn checks_source() {
    bytecpu()
        .arg("check")
        .arg("tests/files/countdown.asm")
        .assert()
        .success()
        .stdout(contains("no errors found!"));
}

#[test]
fn rejects_missing_entry() {
    bytecpu()
        .arg("check")
        .arg("tests/files/nostart.asm")
        .assert()
        .failure()
        .stderr(contains("no `start` label"));
}

#[test]
fn missing_entry_writes_nothing() {
    let dest = std::env::temp_dir().join(format!("bytecpu-nostart-{}.bin", std::process::id()));
    bytecpu()
        .arg("compile")
        .arg("tests/files/nostart.asm")
        .arg(&dest)
        .assert()
        .failure()
        .stderr(contains("no `start` label"));
    assert!(!dest.exists());
}

#[test]
fn rejects_undefined_label() {
    bytecpu()
        .arg("check")
        .arg("tests/files/undefined.asm")
        .assert()
        .failure()
        .stderr(contains("`missing` is not a defined label"));
}

#[test]
fn rejects_unknown_extension() {
    bytecpu()
        .arg("run")
        .arg("tests/files/noop.txt")
        .assert()
        .failure();
}

#[test]
fn compiles_then_runs() {
    let dest = std::env::temp_dir().join(format!("bytecpu-countdown-{}.bin", std::process::id()));
    bytecpu()
        .arg("compile")
        .arg("tests/files/countdown.asm")
        .arg(&dest)
        .assert()
        .success()
        .stdout(contains("Saved"));

    let artifact = fs::read_to_string(&dest).unwrap();
    assert!(artifact.starts_with(".DATA\nSTART: 0\nLENGTH: 6\n\n.CODE\n0703050000\n"));

    bytecpu()
        .arg("run")
        .arg(&dest)
        .arg("--minimal")
        .assert()
        .success()
        .stdout(contains("Loading"))
        .stdout(contains("d1 15\n"));

    fs::remove_file(&dest).unwrap();
}

#[test]
fn compiles_next_to_source() {
    let dir = std::env::temp_dir().join(format!("bytecpu-compile-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let src = dir.join("noop.asm");
    fs::copy("tests/files/noop.asm", &src).unwrap();

    bytecpu().arg("compile").arg(&src).assert().success();
    let artifact = fs::read_to_string(dir.join("noop.bin")).unwrap();
    assert_eq!(artifact, ".DATA\nSTART: 0\nLENGTH: 2\n\n.CODE\n06\n0d\n");

    fs::remove_dir_all(&dir).unwrap();
}
