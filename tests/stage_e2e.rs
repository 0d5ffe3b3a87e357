use std::{path::PathBuf, time::Duration};

use scrollreel::{
    FitMode, HostEvent, MediaConfig, MediaCursor, MediaKind, ScrollProgress, SiteConfig, Size,
    pipeline,
};

const GRAYS: [u8; 5] = [20, 60, 100, 140, 180];

fn write_frames(name: &str, skip: &[usize]) -> PathBuf {
    let dir = PathBuf::from("target").join(name);
    let frames = dir.join("frames");
    let _ = std::fs::remove_dir_all(&frames);
    std::fs::create_dir_all(&frames).unwrap();
    for (i, g) in GRAYS.iter().enumerate() {
        if skip.contains(&i) {
            continue;
        }
        let img = image::RgbaImage::from_pixel(16, 12, image::Rgba([*g, *g, *g, 255]));
        img.save(frames.join(format!("ezgif-frame-{:03}.png", i + 1)))
            .unwrap();
    }
    dir
}

fn config_for(dir: &std::path::Path) -> SiteConfig {
    SiteConfig {
        asset_root: Some(dir.to_string_lossy().into_owned()),
        media: MediaConfig::Frames {
            template: "/frames/ezgif-frame-{index}.png".to_string(),
            count: GRAYS.len(),
            fit: FitMode::Contain,
        },
        preload_threads: Some(2),
        ..SiteConfig::default()
    }
}

fn center_gray(frame: &scrollreel::FrameRGBA) -> u8 {
    let px = frame.pixel(frame.width / 2, frame.height / 2).unwrap();
    assert_eq!(px[3], 255);
    px[0]
}

fn close_to(a: u8, b: u8) -> bool {
    a.abs_diff(b) <= 2
}

#[test]
fn scrolling_selects_rounded_frame() {
    let dir = write_frames("stage_e2e_all", &[]);
    let cfg = config_for(&dir);
    let mut stage =
        pipeline::mount_ready(&cfg, Size::new(32, 24), Duration::from_secs(30)).unwrap();

    let hud = stage.hud();
    assert!(!hud.loading);
    assert_eq!(hud.images_needed, 5);
    assert_eq!(hud.images_loaded, 5);
    assert_eq!(hud.images_failed, 0);

    for (p, expect) in [(0.0, 0), (0.5, 2), (0.6, 2), (0.7, 3), (1.0, 4)] {
        let frame = pipeline::render_at_progress(&mut stage, ScrollProgress::new(p)).unwrap();
        let got = center_gray(&frame);
        assert!(
            close_to(got, GRAYS[expect]),
            "p={p}: got {got}, want {}",
            GRAYS[expect]
        );
        assert_eq!(stage.hud().frame_index, Some(expect));
    }
    assert_eq!(stage.media_kind(), MediaKind::Frames);
}

#[test]
fn missing_frame_keeps_previous_on_canvas() {
    let dir = write_frames("stage_e2e_gap", &[3]);
    let cfg = config_for(&dir);
    let mut stage =
        pipeline::mount_ready(&cfg, Size::new(32, 24), Duration::from_secs(30)).unwrap();
    assert_eq!(stage.hud().images_failed, 1);

    let frame = pipeline::render_at_progress(&mut stage, ScrollProgress::new(0.5)).unwrap();
    assert!(close_to(center_gray(&frame), GRAYS[2]));

    let frame = pipeline::render_at_progress(&mut stage, ScrollProgress::new(0.75)).unwrap();
    assert!(close_to(center_gray(&frame), GRAYS[2]));
    assert_eq!(stage.media_stats().cursor, MediaCursor::Frame(3));
}

#[test]
fn letterbox_shows_theme_background() {
    let dir = write_frames("stage_e2e_letterbox", &[]);
    let cfg = config_for(&dir);
    // 16x12 frames in a 32x48 viewport: 32x24 image centered, 12px bars top and bottom.
    let mut stage =
        pipeline::mount_ready(&cfg, Size::new(32, 48), Duration::from_secs(30)).unwrap();
    let frame = pipeline::render_at_progress(&mut stage, ScrollProgress::START).unwrap();
    assert_eq!(frame.pixel(16, 2).unwrap(), [5, 5, 5, 255]);
    assert!(close_to(center_gray(&frame), GRAYS[0]));
}

#[test]
fn resize_updates_viewport_and_progress() {
    let dir = write_frames("stage_e2e_resize", &[]);
    let cfg = config_for(&dir);
    let mut stage =
        pipeline::mount_ready(&cfg, Size::new(32, 24), Duration::from_secs(30)).unwrap();

    // 400vh region at 24px: 72px of travel.
    stage.handle(HostEvent::Scroll { y: 36.0 }).unwrap();
    assert_eq!(stage.progress().get(), 0.5);

    // Same offset against a 48px viewport: 144px of travel.
    stage
        .handle(HostEvent::Resize {
            viewport: Size::new(32, 48),
        })
        .unwrap();
    assert_eq!(stage.progress().get(), 0.25);
    assert_eq!(stage.canvas().size(), Size::new(32, 48));

    stage.handle(HostEvent::AnimationFrame).unwrap();
    let frame = stage.compose().unwrap();
    assert_eq!((frame.width, frame.height), (32, 48));
    assert!(close_to(center_gray(&frame), GRAYS[1]));
}

#[test]
fn write_png_round_trips_dimensions() {
    let dir = write_frames("stage_e2e_png", &[]);
    let cfg = config_for(&dir);
    let mut stage =
        pipeline::mount_ready(&cfg, Size::new(32, 24), Duration::from_secs(30)).unwrap();
    let frame = pipeline::render_at_progress(&mut stage, ScrollProgress::END).unwrap();
    let out = dir.join("out").join("end.png");
    pipeline::write_png(&frame, &out).unwrap();
    let img = image::open(&out).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (32, 24));
}
