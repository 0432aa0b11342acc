//! Binary smoke tests over piped stdio.

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn runs_to_end_of_input() {
    let mut cmd = Command::cargo_bin("zedmon").unwrap();
    cmd.write_stdin("").assert().success();
}

#[test]
fn assembles_and_dumps_over_stdin() {
    let mut cmd = Command::cargo_bin("zedmon").unwrap();
    cmd.write_stdin("asm 0 LD A,B\nhex 0 1\n")
        .assert()
        .success()
        .stdout(contains(" 0000  78"));
}

#[test]
fn command_argument_runs_before_stdin() {
    let mut cmd = Command::cargo_bin("zedmon").unwrap();
    cmd.arg("--command")
        .arg("fill 0 4 $AA; hex 0 4")
        .write_stdin("")
        .assert()
        .success()
        .stdout(contains("AA AA AA AA"));
}

#[test]
fn disassembles_symbolically() {
    let mut cmd = Command::cargo_bin("zedmon").unwrap();
    cmd.write_stdin("label foo $1234\nasm 0 JP foo\ndasm 0 1\n")
        .assert()
        .success()
        .stdout(contains("JP foo"));
}

#[test]
fn narrow_bus_wraps_addresses() {
    let mut cmd = Command::cargo_bin("zedmon").unwrap();
    cmd.arg("--width")
        .arg("8")
        .write_stdin("set $0100 $55\nhex 0 1\n")
        .assert()
        .success()
        .stdout(contains(" 0000  55"));
}

#[test]
fn rejects_bad_width() {
    let mut cmd = Command::cargo_bin("zedmon").unwrap();
    cmd.arg("--width").arg("17").write_stdin("").assert().failure();
}

#[test]
fn loads_an_image_file() {
    let dir = std::env::temp_dir().join("zedmon-cli-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("image.hex");
    std::fs::write(&path, ":0100100041AE\n:00000001FF\n").unwrap();

    let mut cmd = Command::cargo_bin("zedmon").unwrap();
    cmd.arg("--load")
        .arg(&path)
        .write_stdin("hex $10 1\n")
        .assert()
        .success()
        .stdout(contains("41"))
        .stdout(contains("\"A\""));
}

#[test]
fn unknown_command_lists_help() {
    let mut cmd = Command::cargo_bin("zedmon").unwrap();
    cmd.write_stdin("bogus\n")
        .assert()
        .success()
        .stdout(contains("Commands:"));
}
