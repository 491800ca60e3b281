//! CLI end-to-end tests
//!
//! Tests for the framepipe command-line interface. Playback tests point the
//! config at shell scripts standing in for ffprobe and ffmpeg.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the framepipe binary
#[allow(deprecated)]
fn framepipe_cmd() -> Command {
    Command::cargo_bin("framepipe").unwrap()
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write fake tools plus a config pointing at them; returns the config path
/// and a media file that exists on disk.
#[cfg(unix)]
fn fake_tool_setup(dir: &Path, ffprobe_json: &str, ffmpeg_body: &str) -> (PathBuf, PathBuf) {
    let ffprobe = write_script(dir, "ffprobe", &format!("echo '{ffprobe_json}'"));
    let ffmpeg = write_script(dir, "ffmpeg", ffmpeg_body);

    let config = dir.join("config.json");
    let json = serde_json::json!({
        "tools": { "ffmpeg_path": ffmpeg, "ffprobe_path": ffprobe },
        "playback": { "read_chunk_size": 64, "max_pending_chunks": 4 }
    });
    fs::write(&config, json.to_string()).unwrap();

    let media = dir.join("clip.mp4");
    fs::write(&media, b"not really a video").unwrap();
    (config, media)
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = framepipe_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = framepipe_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("framepipe"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = framepipe_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("framepipe"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = framepipe_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = framepipe_cmd();
    cmd.arg("check-tools").assert().success().stdout(
        predicate::str::contains("ffmpeg").and(predicate::str::contains("ffprobe")),
    );
}

#[test]
fn test_cli_play_help() {
    let mut cmd = framepipe_cmd();
    cmd.args(["play", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Play a file"))
        .stdout(predicate::str::contains("--width"));
}

#[test]
fn test_cli_probe_help() {
    let mut cmd = framepipe_cmd();
    cmd.args(["probe", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Probe a media file"));
}

#[test]
fn test_cli_play_nonexistent_file() {
    let mut cmd = framepipe_cmd();
    cmd.args(["play", "/nonexistent/path/movie.mkv"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = framepipe_cmd();
    cmd.args(["probe", "/nonexistent/path/movie.mkv"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_validate_defaults() {
    let mut cmd = framepipe_cmd();
    cmd.arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"))
        .stdout(predicate::str::contains("1280x720"));
}

#[test]
fn test_cli_validate_config_file() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.json");
    fs::write(
        &config_file,
        r#"{ "playback": { "viewport": { "width": 640, "height": 0 } } }"#,
    )
    .unwrap();

    let mut cmd = framepipe_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("zero dimension"));
}

#[test]
fn test_cli_validate_malformed_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.json");
    fs::write(&config_file, "{ not json").unwrap();

    let mut cmd = framepipe_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config parse error"));
}

#[cfg(unix)]
#[test]
fn test_cli_probe_with_fake_ffprobe() {
    let temp = tempdir().unwrap();
    let (config, media) = fake_tool_setup(
        temp.path(),
        r#"{"streams":[{"width":1920,"height":1080,"avg_frame_rate":"24000/1001"}]}"#,
        "exit 0",
    );

    let mut cmd = framepipe_cmd();
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "probe",
        media.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Video: 1920x1080"))
    .stdout(predicate::str::contains("24000/1001"))
    .stdout(predicate::str::contains("1280x720"));
}

#[cfg(unix)]
#[test]
fn test_cli_probe_json_output() {
    let temp = tempdir().unwrap();
    let (config, media) = fake_tool_setup(
        temp.path(),
        r#"{"streams":[{"width":640,"height":360}]}"#,
        "exit 0",
    );

    let mut cmd = framepipe_cmd();
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "probe",
        "--json",
        media.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"width\": 640"))
    .stdout(predicate::str::contains("\"height\": 360"));
}

#[cfg(unix)]
#[test]
fn test_cli_play_counts_frames() {
    let temp = tempdir().unwrap();
    // 8x6 viewport on a 16x12 source: 8x6 RGBA = 192 bytes per frame.
    let (config, media) = fake_tool_setup(
        temp.path(),
        r#"{"streams":[{"width":16,"height":12}]}"#,
        "head -c 960 /dev/zero",
    );

    let mut cmd = framepipe_cmd();
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "play",
        "--width",
        "8",
        "--height",
        "8",
        media.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("at 8x6"))
    .stdout(predicate::str::contains("Frames: 5"))
    .stdout(predicate::str::contains("Bytes: 960"));
}

#[cfg(unix)]
#[test]
fn test_cli_play_decoder_failure_exit_code() {
    let temp = tempdir().unwrap();
    let (config, media) = fake_tool_setup(
        temp.path(),
        r#"{"streams":[{"width":16,"height":12}]}"#,
        "head -c 400 /dev/zero\nexit 1",
    );

    let mut cmd = framepipe_cmd();
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "play",
        "--width",
        "8",
        "--height",
        "8",
        media.to_str().unwrap(),
    ])
    .assert()
    .code(5)
    .stdout(predicate::str::contains("Frames: 2"))
    .stdout(predicate::str::contains("Trailing bytes dropped: 16"))
    .stderr(predicate::str::contains("Decode error"));
}

#[cfg(unix)]
#[test]
fn test_cli_play_degenerate_source_exit_code() {
    let temp = tempdir().unwrap();
    let (config, media) = fake_tool_setup(
        temp.path(),
        r#"{"streams":[{"width":0,"height":480}]}"#,
        "exit 0",
    );

    let mut cmd = framepipe_cmd();
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "play",
        media.to_str().unwrap(),
    ])
    .assert()
    .code(4)
    .stderr(predicate::str::contains("Invalid geometry"));
}

#[cfg(unix)]
#[test]
fn test_cli_play_probe_failure_exit_code() {
    let temp = tempdir().unwrap();
    let (config, media) = fake_tool_setup(temp.path(), "garbage", "exit 0");

    let mut cmd = framepipe_cmd();
    cmd.args([
        "--config",
        config.to_str().unwrap(),
        "play",
        media.to_str().unwrap(),
    ])
    .assert()
    .code(3)
    .stderr(predicate::str::contains("Probe error"));
}
