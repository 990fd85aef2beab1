//! CLI integration tests that stay off the network.

use assert_cmd::Command;
use image::{imageops, imageops::FilterType, GrayImage, Luma};
use predicates::prelude::*;

use polyptych::marker::{build_payload, render_marker};
use polyptych::{PanelPlacement, Point, Size};

fn bin() -> Command {
    Command::cargo_bin("polyptych").expect("binary")
}

fn paste_panel(
    photo: &mut GrayImage,
    device_id: &str,
    screen_type: &str,
    native: (u32, u32),
    shown: (u32, u32),
    half_turn: bool,
    at: (i64, i64),
) {
    let payload = build_payload(device_id, screen_type, native.0, native.1);
    let marker = render_marker(&payload).expect("render marker");
    let mut shown_img = imageops::resize(&marker, shown.0, shown.1, FilterType::Nearest);
    if half_turn {
        shown_img = imageops::rotate180(&shown_img);
    }
    imageops::replace(photo, &shown_img, at.0, at.1);
}

fn placement(id: &str, screen: &str, pos: (f64, f64), size: (f64, f64), rot: f64) -> PanelPlacement {
    PanelPlacement {
        device_id: id.into(),
        screen_type: screen.into(),
        position: Point::new(pos.0, pos.1),
        rotation_deg: rot,
        detected_size: Size {
            width: size.0,
            height: size.1,
        },
    }
}

#[test]
fn help_lists_all_operations() {
    bin().arg("--help").assert().success().stdout(
        predicate::str::contains("marker")
            .and(predicate::str::contains("calibrate"))
            .and(predicate::str::contains("send"))
            .and(predicate::str::contains("clear"))
            .and(predicate::str::contains("info")),
    );
}

#[test]
fn marker_renders_offline_to_png() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("marker.png");
    bin()
        .args([
            "marker",
            "--device-id",
            "10.0.0.21",
            "--screen-type",
            "ED097TC2",
            "--width",
            "480",
            "--height",
            "360",
            "--out",
        ])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("marker written"));

    let rendered = image::open(&out).expect("open rendered marker");
    assert_eq!(rendered.width(), 480);
    assert_eq!(rendered.height(), 360);
}

#[test]
fn marker_dimensions_default_to_the_registry_natives() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("marker.png");
    bin()
        .args([
            "marker",
            "--device-id",
            "10.0.0.30",
            "--screen-type",
            "ED060XC3",
            "--out",
        ])
        .arg(&out)
        .assert()
        .success();

    let rendered = image::open(&out).expect("open rendered marker");
    assert_eq!((rendered.width(), rendered.height()), (1024, 758));
}

#[test]
fn marker_with_unknown_screen_type_needs_explicit_dimensions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("marker.png");
    bin()
        .args([
            "marker",
            "--device-id",
            "10.0.0.99",
            "--screen-type",
            "GDEW042T2",
            "--out",
        ])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown screen type"));
}

#[test]
fn marker_too_small_for_its_payload_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("marker.png");
    bin()
        .args([
            "marker",
            "--device-id",
            "10.0.0.21",
            "--screen-type",
            "ED097TC2",
            "--width",
            "100",
            "--height",
            "80",
            "--out",
        ])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("too small"));
}

#[test]
fn calibrate_writes_layout_for_a_synthetic_wall() {
    let dir = tempfile::tempdir().expect("tempdir");
    let photo_path = dir.path().join("wall.png");
    let layout_path = dir.path().join("layout.json");

    let mut photo = GrayImage::from_pixel(1600, 800, Luma([255]));
    paste_panel(
        &mut photo,
        "10.0.0.21",
        "ED097TC2",
        (1200, 825),
        (812, 558),
        true,
        (100, 100),
    );
    paste_panel(
        &mut photo,
        "10.0.0.30",
        "ED060XC3",
        (1024, 758),
        (490, 362),
        false,
        (1012, 324),
    );
    photo.save(&photo_path).expect("save photo");

    bin()
        .args(["calibrate", "--photo"])
        .arg(&photo_path)
        .arg("--out")
        .arg(&layout_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("10.0.0.21").and(predicate::str::contains("10.0.0.30")));

    let layout = polyptych::layout::read_layout(&layout_path).expect("read layout");
    assert_eq!(layout.len(), 2);
    let big = &layout["10.0.0.21"];
    assert_eq!(big.rotation_deg, 180.0);
    assert!((big.position.x - 20.0).abs() < 5.0, "big x = {}", big.position.x);
    let small = &layout["10.0.0.30"];
    assert_eq!(small.rotation_deg, 0.0);
    assert!(
        (small.position.x - 248.0).abs() < 5.0,
        "small x = {}",
        small.position.x
    );
}

#[test]
fn calibrate_reports_a_missing_photo() {
    bin()
        .args(["calibrate", "--photo", "/nonexistent/wall.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn send_dry_run_writes_one_tile_per_panel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("art.png");
    let layout_path = dir.path().join("layout.json");
    let tiles_dir = dir.path().join("tiles");

    GrayImage::from_fn(800, 400, |x, y| Luma([((x + y) % 251) as u8]))
        .save(&image_path)
        .expect("save image");

    let mut layout = polyptych::Layout::new();
    layout.insert(
        "10.0.0.21".into(),
        placement("10.0.0.21", "ED097TC2", (20.0, 20.0), (203.0, 139.5), 180.0),
    );
    layout.insert(
        "10.0.0.30".into(),
        placement("10.0.0.30", "ED060XC3", (248.0, 76.0), (122.4, 90.6), 0.0),
    );
    polyptych::layout::write_layout(&layout_path, &layout).expect("write layout");

    bin()
        .args(["send", "--dry-run", "--image"])
        .arg(&image_path)
        .arg("--layout")
        .arg(&layout_path)
        .arg("--out-dir")
        .arg(&tiles_dir)
        .assert()
        .success();

    for id in ["10.0.0.21", "10.0.0.30"] {
        let tile_path = tiles_dir.join(format!("{id}.png"));
        assert!(tile_path.exists(), "{id} tile missing");
        assert!(image::open(&tile_path).expect("open tile").width() > 0);
    }
}

#[test]
fn send_rejects_an_empty_layout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let image_path = dir.path().join("art.png");
    let layout_path = dir.path().join("layout.json");
    GrayImage::from_pixel(64, 64, Luma([255]))
        .save(&image_path)
        .expect("save image");
    std::fs::write(&layout_path, "{}").expect("write layout");

    bin()
        .args(["send", "--dry-run", "--image"])
        .arg(&image_path)
        .arg("--layout")
        .arg(&layout_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("layout has no panels"));
}
