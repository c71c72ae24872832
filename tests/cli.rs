use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sanimal-exif"))
        .arg("--config")
        .arg(dir.join("config.json"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn unreadable_image_halts_with_message() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.jpg");
    fs::write(&path, b"this is not a jpeg").unwrap();

    let out = run(
        dir.path(),
        &[path.to_str().unwrap(), "--species", "Deer, Odocoileus, 2"],
    );

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(1));
    assert!(
        stderr.contains("Error writing metadata to the image broken.jpg!"),
        "{stderr}"
    );
    assert_eq!(fs::read(&path).unwrap(), b"this is not a jpeg");
}

#[test]
fn species_written_then_shown() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("photo.jpg");
    image::RgbImage::from_pixel(8, 8, image::Rgb([40, 90, 30]))
        .save(&path)
        .unwrap();

    let out = run(
        dir.path(),
        &[path.to_str().unwrap(), "--species", "Deer, Odocoileus, 2"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = run(dir.path(), &[path.to_str().unwrap(), "--show", "--json"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Odocoileus"), "{stdout}");
}
