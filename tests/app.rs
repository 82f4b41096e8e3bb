mod common;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use common::*;
use image::RgbImage;
use yolo_studio::app::{ModelLoader, StatusLevel};
use yolo_studio::models::Model;
use yolo_studio::{AppConfig, AppError, DetectionApp, Notice, NoticeLevel, VideoWorker};

fn fake_loader() -> ModelLoader {
    Box::new(
        |_path: &Path, _config: &AppConfig| -> Result<Box<dyn Model>, AppError> {
            Ok(Box::new(FakeModel::two_boxes()))
        },
    )
}

fn failing_loader() -> ModelLoader {
    Box::new(
        |_path: &Path, _config: &AppConfig| -> Result<Box<dyn Model>, AppError> {
            Err(AppError::ModelLoad("corrupt graph".to_string()))
        },
    )
}

fn new_app(dir: &Path, frames: usize, loader: ModelLoader) -> DetectionApp {
    let config = test_config(dir);
    let worker =
        VideoWorker::with_openers(config.clone(), memory_opener(frames), recording_opener().0);
    DetectionApp::with_parts(config, worker, loader)
}

fn loaded_app(dir: &Path, frames: usize) -> DetectionApp {
    let mut app = new_app(dir, frames, fake_loader());
    app.browse_model(PathBuf::from("/models/yolov8n.onnx"));
    app.load_model();
    app.take_notices();
    app
}

fn write_png(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    frame(90).save(&path).unwrap();
    path
}

/// 轮询直到检测线程结束
fn poll_until_finished(app: &mut DetectionApp) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        app.poll_worker();
        if app.stats == "Detection finished" {
            return;
        }
        assert!(Instant::now() < deadline, "still running: {}", app.stats);
        thread::sleep(Duration::from_millis(2));
    }
}

fn warning(message: &str) -> Notice {
    Notice {
        level: NoticeLevel::Warning,
        title: "Warning".to_string(),
        message: message.to_string(),
    }
}

#[test]
fn initial_labels() {
    let dir = tempfile::tempdir().unwrap();
    let app = new_app(dir.path(), 0, fake_loader());
    assert_eq!(app.model_label, "No model selected");
    assert_eq!(app.model_status, "Status: No model loaded");
    assert_eq!(app.model_status_level, StatusLevel::Error);
    assert_eq!(app.stats, "Ready...");
    assert_eq!(app.confidence_label, "0.50");
    assert_eq!(app.confidence_value(), 50);
    assert!(!app.save_video);
    assert!(app.display().is_none());
}

#[test]
fn load_without_selection_warns() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = new_app(dir.path(), 0, fake_loader());
    app.load_model();
    assert_eq!(
        app.take_notices(),
        vec![warning("Please select a model file first")]
    );
    assert!(!app.has_model());
}

#[test]
fn load_model_success() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = new_app(dir.path(), 0, fake_loader());
    app.browse_model(PathBuf::from("/models/yolov8n.onnx"));
    assert_eq!(app.model_label, "Selected: yolov8n.onnx");
    assert_eq!(app.config().model_dir.as_deref(), Some(Path::new("/models")));

    app.load_model();
    assert!(app.has_model());
    assert_eq!(app.model_status, "Status: Model loaded successfully");
    assert_eq!(app.model_status_level, StatusLevel::Ok);
    let notices = app.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Success");
    assert_eq!(notices[0].message, "Model loaded successfully!");
}

#[test]
fn load_model_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = new_app(dir.path(), 0, failing_loader());
    app.browse_model(PathBuf::from("broken.onnx"));
    app.load_model();

    assert!(!app.has_model());
    assert_eq!(app.model_status, "Status: Failed to load model");
    assert_eq!(app.model_status_level, StatusLevel::Error);
    let notices = app.take_notices();
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].title, "Error");
    assert_eq!(notices[0].message, "Failed to load model: corrupt graph");
}

#[test]
fn confidence_slider_is_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = new_app(dir.path(), 0, fake_loader());
    app.update_confidence(73);
    assert_eq!(app.confidence_label, "0.73");
    assert!((app.confidence() - 0.73).abs() < 1e-6);

    app.update_confidence(3);
    assert_eq!(app.confidence_value(), 10);
    assert_eq!(app.confidence_label, "0.10");

    app.update_confidence(250);
    assert_eq!(app.confidence_label, "1.00");
}

#[test]
fn image_needs_a_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = new_app(dir.path(), 0, fake_loader());
    let path = write_png(dir.path(), "street.png");
    app.select_image(path);
    assert_eq!(app.take_notices(), vec![warning("Please load a model first")]);
    assert!(app.display().is_none());
}

#[test]
fn detect_and_save_image() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = loaded_app(dir.path(), 0);

    app.detect_image();
    assert_eq!(app.take_notices(), vec![warning("Please select an image first")]);

    let path = write_png(dir.path(), "street.png");
    app.select_image(path);
    assert_eq!(app.stats, "Image loaded: street.png");
    let generation = app.display_generation();
    let original = app.display().cloned().unwrap();

    app.detect_image();
    assert_eq!(app.stats, "Detection complete: 2 objects found");
    assert!(app.display_generation() > generation);
    assert_ne!(app.display().unwrap(), &original);
    let notices = app.take_notices();
    assert_eq!(notices[0].title, "Detection Complete");
    assert_eq!(notices[0].message, "Found 2 objects");

    let out = dir.path().join("result.png");
    app.save_image(out.clone());
    assert!(out.exists());
    assert_eq!(app.take_notices()[0].message, "Image saved successfully!");
}

#[test]
fn detection_uses_slider_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = loaded_app(dir.path(), 0);
    app.select_image(write_png(dir.path(), "a.png"));
    app.update_confidence(70);
    app.detect_image();
    assert_eq!(app.stats, "Detection complete: 1 objects found");
}

#[test]
fn save_without_image_warns() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = loaded_app(dir.path(), 0);
    app.save_image(dir.path().join("out.jpg"));
    assert_eq!(app.take_notices(), vec![warning("No image to save")]);
}

#[test]
fn bad_image_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = loaded_app(dir.path(), 0);
    let path = dir.path().join("notes.png");
    std::fs::write(&path, "not an image").unwrap();
    app.select_image(path);
    let notices = app.take_notices();
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.starts_with("Failed to load image: "));
}

#[test]
fn oversized_image_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = loaded_app(dir.path(), 0);
    let path = dir.path().join("panorama.png");
    RgbImage::new(65_536, 1).save(&path).unwrap();

    app.select_image(path);
    let notices = app.take_notices();
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(
        notices[0].message,
        "Failed to load image: image too large: 65536x1 (max 65535)"
    );
    assert!(!app.has_image());
    assert!(app.display().is_none());
}

#[test]
fn video_detection_flow() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = loaded_app(dir.path(), 3);

    app.start_video_detection();
    assert_eq!(
        app.take_notices(),
        vec![warning("Please select a video file first")]
    );

    app.select_video(PathBuf::from("/videos/traffic.mp4"));
    assert_eq!(app.stats, "Video selected: traffic.mp4");

    app.start_video_detection();
    assert!(app.notices().is_empty());
    assert_eq!(app.stats, "Processing video... Please wait.");

    poll_until_finished(&mut app);
    assert!(app.display().is_some());
    assert!(!app.is_running());
}

#[test]
fn video_needs_a_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = new_app(dir.path(), 1, fake_loader());
    app.select_video(PathBuf::from("clip.mp4"));
    assert_eq!(app.take_notices(), vec![warning("Please load a model first")]);
    assert_eq!(app.stats, "Ready...");
}

#[test]
fn live_detection_start_and_stop() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = loaded_app(dir.path(), 0);
    app.camera_index = 1;

    app.start_live_detection();
    assert_eq!(app.stats, "Live detection started...");
    assert!(app.is_running());

    app.start_live_detection();
    assert_eq!(app.take_notices(), vec![warning("Detection is already running")]);

    thread::sleep(Duration::from_millis(30));
    app.stop_detection();
    assert_eq!(app.stats, "Detection stopped");
    assert!(!app.is_running());

    poll_until_finished(&mut app);
    assert!(app.display().is_some());
}

#[test]
fn live_save_follows_checkbox() {
    for save in [false, true] {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let (writer, recording) = recording_opener();
        let worker = VideoWorker::with_openers(config.clone(), memory_opener(0), writer);
        let mut app = DetectionApp::with_parts(config, worker, fake_loader());
        app.browse_model(PathBuf::from("/models/yolov8n.onnx"));
        app.load_model();
        app.save_video = save;

        app.start_live_detection();
        thread::sleep(Duration::from_millis(30));
        app.stop_detection();
        poll_until_finished(&mut app);

        let rec = recording.lock().unwrap();
        assert_eq!(rec.path.is_some(), save);
        assert_eq!(rec.finished, save);
    }
}

#[test]
fn video_file_always_saves() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (writer, recording) = recording_opener();
    let worker = VideoWorker::with_openers(config.clone(), memory_opener(2), writer);
    let mut app = DetectionApp::with_parts(config, worker, fake_loader());
    app.browse_model(PathBuf::from("/models/yolov8n.onnx"));
    app.load_model();
    assert!(!app.save_video);

    app.select_video(PathBuf::from("clip.mp4"));
    app.start_video_detection();
    poll_until_finished(&mut app);

    let rec = recording.lock().unwrap();
    assert_eq!(rec.frames, 2);
    assert!(rec.finished);
}

#[test]
fn live_detection_needs_a_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = new_app(dir.path(), 0, fake_loader());
    app.start_live_detection();
    assert_eq!(app.take_notices(), vec![warning("Please load a model first")]);
    assert!(!app.is_running());
}

#[test]
fn stop_when_idle_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = loaded_app(dir.path(), 0);
    app.stop_detection();
    assert_eq!(app.stats, "Ready...");
}

#[test]
fn shutdown_persists_settings() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let mut app = loaded_app(dir.path(), 0);
    app.set_config_path(config_path.clone());
    app.update_confidence(65);
    app.camera_index = 2;
    app.start_live_detection();

    app.shutdown();
    assert!(!app.is_running());

    let saved = AppConfig::load(&config_path);
    assert!((saved.confidence - 0.65).abs() < 1e-6);
    assert_eq!(saved.camera_index, 2);
    assert_eq!(saved.model_dir.as_deref(), Some(Path::new("/models")));
}
