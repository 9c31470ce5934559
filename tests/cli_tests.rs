//! End-to-end tests for the `tis` binary.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// A `tis` command running inside `dir` with an isolated config.
fn tis(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tis").unwrap();
    cmd.current_dir(dir.path())
        .env("TIS_CONFIG", dir.path().join("no-config.toml"))
        .env_remove("TIS_INDEX")
        .env_remove("RUST_LOG")
        .env("XDG_CACHE_HOME", dir.path().join(".cache"));
    cmd
}

fn image(dir: &TempDir, name: &str) {
    dir.child(name).write_binary(b"\x89PNG").unwrap();
}

#[test]
fn test_init_creates_index_once() {
    let dir = TempDir::new().unwrap();
    tis(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Index file created"));
    dir.child("index.tis").assert(predicate::path::is_file());

    tis(&dir)
        .arg("init")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_commands_need_an_index() {
    let dir = TempDir::new().unwrap();
    tis(&dir)
        .arg("info")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_add_moves_file_and_lists_it() {
    let dir = TempDir::new().unwrap();
    tis(&dir).arg("init").assert().success();
    image(&dir, "a.png");

    tis(&dir)
        .args(["add-file", "a.png", "cat;outdoor"])
        .assert()
        .success();
    dir.child("a.png").assert(predicate::path::missing());
    dir.child("data/a.png").assert(predicate::path::is_file());

    tis(&dir)
        .args(["list", "cat"])
        .assert()
        .success()
        .stdout("a.png\n");
}

#[test]
fn test_list_exclusive_and_exclude() {
    let dir = TempDir::new().unwrap();
    tis(&dir).arg("init").assert().success();
    image(&dir, "x.png");
    image(&dir, "y.png");
    tis(&dir).args(["add-file", "x.png", "cat;dog"]).assert().success();
    tis(&dir).args(["add-file", "y.png", "cat"]).assert().success();

    tis(&dir)
        .args(["list", "cat;dog", "--exclusive"])
        .assert()
        .success()
        .stdout("x.png\n");
    tis(&dir)
        .args(["list", "cat", "--exclude", "dog"])
        .assert()
        .success()
        .stdout("y.png\n");
    tis(&dir)
        .args(["list", "cat;dog", "--json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"x.png\"").and(predicate::str::contains("\"y.png\"")),
        );
}

#[test]
fn test_no_move_with_random_name() {
    let dir = TempDir::new().unwrap();
    tis(&dir).arg("init").assert().success();
    image(&dir, "holiday.jpeg");

    tis(&dir)
        .args(["add-file", "holiday.jpeg", "beach", "--no-move", "--file-name", "*"])
        .assert()
        .success();
    dir.child("holiday.jpeg").assert(predicate::path::missing());
    dir.child("data").assert(predicate::path::missing());

    let out = tis(&dir).args(["random", "beach"]).assert().success();
    let name = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let name = name.trim();
    assert!(name.ends_with(".jpeg"), "{name}");
    dir.child(name).assert(predicate::path::is_file());
}

#[test]
fn test_random_with_nothing_left_fails() {
    let dir = TempDir::new().unwrap();
    tis(&dir).arg("init").assert().success();
    image(&dir, "x.png");
    tis(&dir).args(["add-file", "x.png", "cat"]).assert().success();

    tis(&dir)
        .args(["random", "--exclude", "cat"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No files found"));
}

#[test]
fn test_info_json_reports_counts() {
    let dir = TempDir::new().unwrap();
    tis(&dir)
        .args(["init", "--data-folder", "pics"])
        .assert()
        .success();
    image(&dir, "x.png");
    tis(&dir).args(["add-file", "x.png", "cat;dog"]).assert().success();
    dir.child("pics/x.png").assert(predicate::path::is_file());

    tis(&dir)
        .args(["info", "--json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"tag_count\": 2")
                .and(predicate::str::contains("\"file_count\": 1"))
                .and(predicate::str::contains("\"data_folder\": \"pics\""))
                .and(predicate::str::contains("index.tis")),
        );
}

#[test]
fn test_invalid_file_name_is_rejected() {
    let dir = TempDir::new().unwrap();
    tis(&dir).arg("init").assert().success();
    image(&dir, "notes.txt");

    tis(&dir)
        .args(["add-file", "notes.txt", "cat"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid file name"));
    dir.child("notes.txt").assert(predicate::path::is_file());
}

#[test]
fn test_index_flag_points_elsewhere() {
    let dir = TempDir::new().unwrap();
    dir.child("catalog").create_dir_all().unwrap();
    tis(&dir)
        .args(["--index", "catalog/pets.tis", "init"])
        .assert()
        .success();
    image(&dir, "a.gif");
    tis(&dir)
        .args(["--index", "catalog/pets.tis", "add-file", "a.gif", "cat"])
        .assert()
        .success();
    dir.child("catalog/data/a.gif").assert(predicate::path::is_file());
}

#[test]
fn test_config_prints_and_saves() {
    let dir = TempDir::new().unwrap();
    tis(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("data_folder = \"data\""));
    dir.child("no-config.toml").assert(predicate::path::missing());

    tis(&dir).args(["config", "--save"]).assert().success();
    dir.child("no-config.toml")
        .assert(predicate::str::contains("[index]"));
}

#[test]
fn test_list_joined_output() {
    let dir = TempDir::new().unwrap();
    tis(&dir).arg("init").assert().success();
    image(&dir, "x.png");
    image(&dir, "y.png");
    tis(&dir).args(["add-file", "x.png", "cat"]).assert().success();
    tis(&dir).args(["add-file", "y.png", "cat"]).assert().success();

    tis(&dir)
        .args(["list", "cat", "--joined"])
        .assert()
        .success()
        .stdout("x.png, y.png\n");
    tis(&dir)
        .args(["list", "cat", "--joined", "--json"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_failed_index_update_puts_file_back() {
    let dir = TempDir::new().unwrap();
    tis(&dir).arg("init").assert().success();
    image(&dir, "x.png");
    tis(&dir).args(["add-file", "x.png", "cat"]).assert().success();

    // Block length of "cat" now claims more bytes than the region holds.
    let index = dir.child("index.tis");
    let mut bytes = std::fs::read(index.path()).unwrap();
    bytes[47..51].copy_from_slice(&[0, 0, 0, 0x7F]);
    std::fs::write(index.path(), bytes).unwrap();

    image(&dir, "y.png");
    tis(&dir)
        .args(["add-file", "y.png", "cat"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Corrupt index"));
    dir.child("y.png").assert(predicate::path::is_file());
    dir.child("data/y.png").assert(predicate::path::missing());
}
