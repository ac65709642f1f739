use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

fn gpu_tests_enabled() -> bool {
    if std::env::var("PIXELTRAIL_RUN_GPU_TESTS").ok().as_deref() != Some("1") {
        eprintln!("skipping (set PIXELTRAIL_RUN_GPU_TESTS=1 to enable)");
        return false;
    }
    true
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "pixeltrail_{tag}_{:016x}",
        rand::random::<u64>()
    ));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn read_png_dimensions(path: &Path) -> (u32, u32) {
    let mut file = fs::File::open(path).expect("open png");
    let mut header = [0u8; 24];
    file.read_exact(&mut header).expect("read png header");

    let signature = b"\x89PNG\r\n\x1a\n";
    assert_eq!(&header[0..8], signature, "png signature mismatch");
    assert_eq!(&header[12..16], b"IHDR", "png IHDR missing");

    let width = u32::from_be_bytes(header[16..20].try_into().unwrap());
    let height = u32::from_be_bytes(header[20..24].try_into().unwrap());
    (width, height)
}

fn run_headless(config: &Path, extra: &[&str]) -> std::process::ExitStatus {
    Command::new(env!("CARGO_BIN_EXE_pixeltrail"))
        .arg("--config")
        .arg(config)
        .arg("--headless")
        .args(extra)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .status()
        .expect("spawn pixeltrail")
}

#[test]
fn headless_run_writes_screenshot() {
    if !gpu_tests_enabled() {
        return;
    }

    let dir = scratch_dir("shot");
    let config = dir.join("pixeltrail.toml");
    fs::write(&config, "seed = 3\nstatic_per_tick = 8\n").expect("write config");
    let shot = dir.join("frames").join("last.png");

    let status = run_headless(
        &config,
        &[
            "--frames",
            "30",
            "--resolution",
            "96x64",
            "--screenshot",
            shot.to_str().unwrap(),
        ],
    );
    assert!(status.success(), "pixeltrail exited with {status}");
    assert!(shot.exists(), "screenshot missing: {}", shot.display());
    assert_eq!(read_png_dimensions(&shot), (96, 64));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn write_config_persists_resolution() {
    if !gpu_tests_enabled() {
        return;
    }

    let dir = scratch_dir("cfg");
    let config = dir.join("nested").join("pixeltrail.toml");

    let status = run_headless(
        &config,
        &["--frames", "1", "--resolution", "40x30", "--write-config"],
    );
    assert!(status.success(), "pixeltrail exited with {status}");

    let written = fs::read_to_string(&config).expect("config written");
    assert!(written.contains("width = 40"), "unexpected config:\n{written}");
    assert!(written.contains("height = 30"), "unexpected config:\n{written}");

    let _ = fs::remove_dir_all(&dir);
}
