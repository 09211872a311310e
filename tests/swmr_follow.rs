//! Cross-process tests against the `frame-appender` binary.
//!
//! The writer runs as a child process; the test attaches as a SWMR reader
//! and follows the growing dataset the way a live viewer would.

use frame_appender::frame::{FrameBuffer, FrameShape};
use frame_appender::SwmrReader;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_frame-appender");

fn appender(dir: &Path) -> Command {
    let mut cmd = Command::new(BIN);
    cmd.current_dir(dir).env("RUST_LOG", "warn");
    cmd
}

fn seed() -> FrameBuffer {
    FrameBuffer::new(FrameShape::default(), vec![1, 2, 3, 4, 5, 6]).unwrap()
}

fn attach(path: &Path, child: &mut Child, deadline: Instant) -> SwmrReader {
    loop {
        if let Ok(reader) = SwmrReader::open(path, "data") {
            return reader;
        }
        if let Ok(Some(status)) = child.try_wait() {
            panic!("writer exited before a reader could attach: {status}");
        }
        assert!(Instant::now() < deadline, "timed out waiting for container");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn reader_follows_a_live_writer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("live.h5");
    let frames = 8;

    let mut child = appender(dir.path())
        .args(["write", "--frames", "8", "--delay", "150ms", "--path"])
        .arg(&path)
        .stdout(Stdio::null())
        .spawn()
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(30);
    let reader = attach(&path, &mut child, deadline);

    let mut observed = Vec::new();
    loop {
        reader.refresh().unwrap();
        let extent = reader.extent();
        assert!(extent <= frames, "extent {extent} beyond frames written");
        if let Some(&last) = observed.last() {
            assert!(extent >= last, "extent went from {last} to {extent}");
        }
        observed.push(extent);

        // Every frame behind the newest one has been flushed in full. The
        // newest frame is left out: its extent can become visible before the
        // flush that publishes its data, so it is checked on a later pass once
        // another frame lands, or after the writer exits.
        reader
            .verify_first(&seed(), extent.saturating_sub(1))
            .unwrap();

        if extent == frames || Instant::now() >= deadline {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    let status = child.wait().unwrap();
    assert!(status.success());
    assert_eq!(observed.last().copied(), Some(frames));
    drop(reader);

    let reader = SwmrReader::open(&path, "data").unwrap();
    assert_eq!(reader.verify_frames(&seed()).unwrap(), frames);
}

#[test]
fn second_writer_process_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.h5");
    let frames = 20;

    let mut first = appender(dir.path())
        .args(["write", "--frames", "20", "--delay", "100ms", "--path"])
        .arg(&path)
        .stdout(Stdio::null())
        .spawn()
        .unwrap();

    // Wait until the first writer is in SWMR mode.
    let deadline = Instant::now() + Duration::from_secs(30);
    drop(attach(&path, &mut first, deadline));

    let second = appender(dir.path())
        .args(["write", "--frames", "3", "--delay", "0s", "--path"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!second.status.success());
    assert!(second.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&second.stderr);
    assert!(stderr.contains("Failed to initialize container"), "{stderr}");

    let status = first.wait().unwrap();
    assert!(status.success());

    let reader = SwmrReader::open(&path, "data").unwrap();
    assert_eq!(reader.extent(), frames);
    assert_eq!(reader.verify_frames(&seed()).unwrap(), frames);
}

#[test]
fn json_log_format_goes_to_stderr() {
    let dir = TempDir::new().unwrap();
    let output = appender(dir.path())
        .env("RUST_LOG", "info")
        .args(["--log-format", "json", "write", "--frames", "2", "--delay", "0s"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "0\n1\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("frame flushed"), "{stderr}");
    assert!(
        stderr.lines().all(|line| line.starts_with('{')),
        "{stderr}"
    );
}

#[test]
fn stdout_carries_iteration_index() {
    let dir = TempDir::new().unwrap();
    let output = appender(dir.path())
        .args(["write", "--frames", "3", "--delay", "0s", "--path", "out.h5"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "0\n1\n2\n");
    assert!(dir.path().join("out.h5").exists());
}

#[test]
fn inspect_verifies_finished_container() {
    let dir = TempDir::new().unwrap();
    let write = appender(dir.path())
        .args(["write", "--frames", "5", "--delay", "0s"])
        .output()
        .unwrap();
    assert!(write.status.success());
    // default container name lands in the working directory
    assert!(dir.path().join("piltest_11416.nxs").exists());

    let inspect = appender(dir.path()).arg("inspect").output().unwrap();
    assert!(inspect.status.success());
    let stdout = String::from_utf8_lossy(&inspect.stdout);
    assert!(stdout.contains("shape: [5, 3, 2]"), "{stdout}");
    assert!(stdout.contains("verified 5 frames"), "{stdout}");
}

#[test]
fn inspect_fails_on_missing_container() {
    let dir = TempDir::new().unwrap();
    let output = appender(dir.path())
        .args(["inspect", "--path", "absent.h5"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn config_file_is_picked_up_from_working_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("frame-appender.toml"),
        "path = \"from_toml.h5\"\nframe_count = 2\ndelay = \"0s\"\n",
    )
    .unwrap();

    let output = appender(dir.path()).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "0\n1\n");
    assert!(dir.path().join("from_toml.h5").exists());
}
