use std::{fs, path::Path, process::Command};

use tempfile::TempDir;

const CONFIG: &str = r#"
version = 1

[container]
id = "locker-1"
kind = "locker"
columns = 6
rows = 4

[[templates]]
id = "rifle"
size = { width = 4, height = 1 }

[[templates]]
id = "ammo"
size = { width = 1, height = 1 }
quantity = 30
"#;

fn stowage(args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_stowage"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to invoke stowage binary");
    assert!(
        output.status.success(),
        "stowage {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout is utf-8")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are utf-8")
}

#[test]
fn spawn_take_and_respawn_cycle() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("spawn.toml");
    let layout = dir.path().join("locker.layout");
    let state = dir.path().join("state");
    fs::write(&config, CONFIG).expect("config written");

    let spawn_args = [
        "spawn",
        "--config",
        path_arg(&config),
        "--state",
        path_arg(&state),
        "--layout",
        path_arg(&layout),
    ];

    let first = stowage(&spawn_args);
    assert!(first.contains("rifle: spawned `rifle#1` at (0, 0)"), "{first}");
    assert!(first.contains("ammo: spawned"), "{first}");
    assert!(fs::read_to_string(&layout)
        .expect("layout written")
        .starts_with("stowage:v1:6x4:"));
    assert!(state.join("spawn_state.json").exists());

    let second = stowage(&spawn_args);
    assert!(second.contains("rifle: already present"), "{second}");

    let _ = stowage(&["take", "--layout", path_arg(&layout), "--item", "rifle#1"]);
    let third = stowage(&spawn_args);
    assert!(third.contains("rifle: exhausted"), "{third}");
    assert!(third.contains("ammo: already present"), "{third}");

    let _ = stowage(&["reset", "--state", path_arg(&state), "--container", "locker-1"]);
    let fourth = stowage(&spawn_args);
    assert!(fourth.contains("rifle: spawned"), "{fourth}");
    assert!(fourth.contains("ammo: spawned"), "{fourth}");
}

#[test]
fn analyze_prints_bitmap_and_regions() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("spawn.toml");
    let layout = dir.path().join("locker.layout");
    fs::write(&config, CONFIG).expect("config written");

    let _ = stowage(&[
        "spawn",
        "--config",
        path_arg(&config),
        "--state",
        path_arg(&dir.path().join("state")),
        "--layout",
        path_arg(&layout),
    ]);

    let report = stowage(&["analyze", "--layout", path_arg(&layout)]);
    let mut lines = report.lines();
    assert_eq!(lines.next(), Some("#####."));
    assert_eq!(lines.next(), Some("......"));
    assert!(report.contains("19 of 24 cells free"), "{report}");
    assert!(report.contains("region 1: origin (0, 0) bounds 6x4 free cells 19"), "{report}");
}
