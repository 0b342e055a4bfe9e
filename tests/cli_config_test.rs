use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn sharedeploy(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sharedeploy"));
    cmd.current_dir(cwd)
        .env("XDG_CONFIG_HOME", cwd.join("xdg"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_print_config_applies_flags() {
    let temp_dir = TempDir::new().unwrap();

    let output = sharedeploy(temp_dir.path())
        .args(["--print-config", "--interval", "7", "--no-mount", "--pass", "secret"])
        .output()
        .expect("Failed to run sharedeploy");

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("poll_interval_secs = 7"));
    assert!(stdout.contains("enabled = false"));
    assert!(stdout.contains("mount_point = \"/mnt/agent\""));
    assert!(!stdout.contains("secret"));
}

#[test]
fn test_local_settings_file_is_picked_up() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("sharedeploy.toml"),
        "[supervisor]\ngrace_period_ms = 1234\n",
    )
    .unwrap();

    let output = sharedeploy(temp_dir.path())
        .arg("--print-config")
        .output()
        .expect("Failed to run sharedeploy");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("grace_period_ms = 1234"));
}

#[test]
fn test_missing_deploy_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let share = temp_dir.path().join("share");
    std::fs::create_dir_all(&share).unwrap();

    let output = sharedeploy(temp_dir.path())
        .arg("--no-mount")
        .arg("--mount")
        .arg(&share)
        .output()
        .expect("Failed to run sharedeploy");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("failed to load deploy config"));
}

#[cfg(unix)]
#[test]
fn test_sigterm_stops_watcher_and_child() {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let temp_dir = TempDir::new().unwrap();
    let share = temp_dir.path().join("share");
    let deploy = temp_dir.path().join("deploy");
    std::fs::create_dir_all(share.join("app")).unwrap();
    std::fs::write(share.join("app/run.txt"), "v1").unwrap();

    let config = serde_json::json!({
        "deploy_location": deploy,
        "executable": "sh",
        "args": ["-c", "echo $$ > child.pid; exec sleep 30"],
        "source_location": "app",
    });
    std::fs::write(share.join("deploy.json"), config.to_string()).unwrap();

    let mut child = sharedeploy(temp_dir.path())
        .arg("--no-mount")
        .arg("--deploy-on-start")
        .args(["--interval", "1"])
        .arg("--mount")
        .arg(&share)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn sharedeploy");

    // Wait for the deployed process to report in
    let pid_file = deploy.join("child.pid");
    let deadline = Instant::now() + Duration::from_secs(10);
    let deployed_pid = loop {
        if let Some(pid) = std::fs::read_to_string(&pid_file)
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
        {
            break pid;
        }
        assert!(Instant::now() < deadline, "deployed process never started");
        std::thread::sleep(Duration::from_millis(50));
    };

    std::thread::sleep(Duration::from_millis(300));
    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        assert!(Instant::now() < deadline, "watcher did not exit after SIGTERM");
        std::thread::sleep(Duration::from_millis(50));
    };

    assert!(status.success());
    assert!(kill(Pid::from_raw(deployed_pid), None::<Signal>).is_err());
}
