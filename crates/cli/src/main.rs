use std::path::PathBuf;
use std::process;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;

use person_locator_core::capture::domain::camera_device::CaptureConfig;
use person_locator_core::capture::infrastructure::synthetic_camera::SyntheticCamera;
use person_locator_core::capture::session::CaptureSession;
use person_locator_core::detection::domain::detection_result::DetectionResult;
use person_locator_core::detection::domain::object_detector::Detection;
use person_locator_core::detection::domain::projection_area::ProjectionArea;
use person_locator_core::detection::infrastructure::scripted_detector::ScriptedDetector;
use person_locator_core::detection::session::{DetectionConfig, DetectionSession};
use person_locator_core::shared::bounding_box::BoundingBox;
use person_locator_core::shared::point::Point;
use person_locator_core::shared::resolution::Resolution;

/// Headless person-location demo: runs the capture/detection pipeline with a
/// synthetic camera and a scripted detector in place of real hardware.
#[derive(Parser)]
#[command(name = "person-locator")]
struct Cli {
    /// Camera index to report in logs.
    #[arg(long, default_value = "0")]
    camera_index: u32,

    /// Capture width in pixels.
    #[arg(long, default_value = "640")]
    width: u32,

    /// Capture height in pixels.
    #[arg(long, default_value = "480")]
    height: u32,

    /// Flat-view width in pixels.
    #[arg(long, default_value = "400")]
    flat_width: u32,

    /// Flat-view height in pixels.
    #[arg(long, default_value = "400")]
    flat_height: u32,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Non-maximum-suppression threshold (0.0-1.0).
    #[arg(long, default_value = "0.4")]
    nms: f64,

    /// Number of detection results to collect before exiting.
    #[arg(long, default_value = "30")]
    frames: usize,

    /// Save each flat-view frame as a PNG into this directory.
    #[arg(long)]
    save_flat_view: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let resolution = Resolution::new(cli.width, cli.height);

    if let Some(ref dir) = cli.save_flat_view {
        std::fs::create_dir_all(dir)?;
    }

    let area = projection_area(resolution, Resolution::new(cli.flat_width, cli.flat_height));
    let detector = walking_person_detector(resolution, cli.frames);

    let (result_tx, result_rx) = mpsc::channel::<DetectionResult>();
    let mut detection = DetectionSession::new();
    let frame_sender = detection.start(
        DetectionConfig {
            detector: Box::new(detector),
            person_class_id: 0,
            confidence_threshold: cli.confidence,
            nms_threshold: cli.nms,
        },
        &area,
        move |result| {
            let _ = result_tx.send(result);
        },
    )?;

    let (init_tx, init_rx) = mpsc::channel::<bool>();
    let mut capture = CaptureSession::new();
    capture.start(
        CaptureConfig {
            camera_index: cli.camera_index,
            resolution,
        },
        Box::new(SyntheticCamera::new(Duration::from_millis(15))),
        move |ok| {
            let _ = init_tx.send(ok);
        },
        |_frame| {},
    )?;
    if !init_rx.recv()? {
        return Err("camera failed to initialize".into());
    }
    capture.attach_detection_channel(frame_sender)?;

    for collected in 0..cli.frames {
        let result = result_rx.recv()?;
        log_result(&result);
        if let Some(ref dir) = cli.save_flat_view {
            save_flat_view(dir, collected, &result)?;
        }
    }

    capture.stop()?;
    detection.stop()?;
    Ok(())
}

/// A floor trapezoid covering the lower middle of the camera view, picked
/// clockwise from the top-right corner.
fn projection_area(camera: Resolution, flat: Resolution) -> ProjectionArea {
    let w = camera.width as f64;
    let h = camera.height as f64;
    ProjectionArea::new(
        [
            Point::new(w * 0.90, h * 0.25),
            Point::new(w * 0.95, h * 0.90),
            Point::new(w * 0.05, h * 0.90),
            Point::new(w * 0.10, h * 0.25),
        ],
        flat,
    )
}

/// Scripts one person walking left to right through the projection area.
fn walking_person_detector(camera: Resolution, steps: usize) -> ScriptedDetector {
    let w = camera.width as f64;
    let h = camera.height as f64;
    let box_width = (w * 0.05) as i32;
    let box_height = (h * 0.25) as i32;
    let anchor_y = (h * 0.75) as i32;

    let mut script = Vec::with_capacity(steps.max(1));
    for step in 0..steps.max(1) {
        let progress = step as f64 / steps.max(2) as f64;
        let anchor_x = (w * (0.15 + 0.7 * progress)) as i32;
        script.push(vec![Detection {
            class_id: 0,
            confidence: 0.85,
            bounding_box: BoundingBox::new(
                anchor_x - box_width / 2,
                anchor_y - box_height,
                box_width,
                box_height,
            ),
        }]);
    }
    ScriptedDetector::new(script)
}

fn log_result(result: &DetectionResult) {
    let locations: Vec<String> = result
        .person_locations
        .iter()
        .map(|p| format!("({:.1}, {:.1})", p.x, p.y))
        .collect();
    log::info!(
        "frame {}: {:.1} fps, {} person(s) at [{}]",
        result.frame.index(),
        result.inference_fps,
        result.persons.len(),
        locations.join(", ")
    );
}

fn save_flat_view(
    dir: &std::path::Path,
    sequence: usize,
    result: &DetectionResult,
) -> Result<(), Box<dyn std::error::Error>> {
    let warped = &result.warped_frame;
    let image = image::RgbImage::from_raw(
        warped.width(),
        warped.height(),
        warped.data().to_vec(),
    )
    .ok_or("flat-view frame has unexpected dimensions")?;
    image.save(dir.join(format!("flat_view_{sequence:04}.png")))?;
    Ok(())
}
