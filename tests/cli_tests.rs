//! Command-line behaviour that needs no ffmpeg

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn beatcut(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("beatcut").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("BEATCUT_WORKERS")
        .env_remove("BEATCUT_SEED")
        .env_remove("BEATCUT_HWACCEL")
        .env_remove("BEATCUT_PRESET")
        .env_remove("BEATCUT_FPS");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    beatcut(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("assemble"));
}

#[test]
fn test_config_prints_effective_toml() {
    let dir = TempDir::new().unwrap();
    beatcut(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[pipeline]"))
        .stdout(predicate::str::contains("workers"));
}

#[test]
fn test_environment_overrides_config() {
    let dir = TempDir::new().unwrap();
    beatcut(&dir)
        .env("BEATCUT_WORKERS", "3")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("workers = 3"));
}

#[test]
fn test_discovered_config_file_is_used() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("beatcut.toml"), "[output]\nfps = 24\n").unwrap();
    beatcut(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("fps = 24"));
}

#[test]
fn test_unknown_config_field_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[planner]\ntempo_magic = true\n").unwrap();
    beatcut(&dir)
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config"));
}

#[test]
fn test_render_requires_library_and_output() {
    let dir = TempDir::new().unwrap();
    beatcut(&dir).arg("render").assert().failure();
}

#[test]
fn test_lyric_start_requires_lyrics() {
    let dir = TempDir::new().unwrap();
    beatcut(&dir)
        .args(["plan", "--library", "clips", "--lyric-start", "3.2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--lyrics"));
}

#[test]
fn test_worker_count_is_range_checked() {
    let dir = TempDir::new().unwrap();
    beatcut(&dir)
        .args(["render", "--library", "clips", "--output", "o.mp4", "--workers", "0"])
        .assert()
        .failure();
}
