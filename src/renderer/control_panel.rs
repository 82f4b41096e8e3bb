use egui_macroquad::egui;

use super::file_browser::BrowsePurpose;
use crate::app::{DetectionApp, StatusLevel, CONFIDENCE_MAX, CONFIDENCE_MIN};
use crate::input::{get_video_devices, VideoDevice};

pub const PANEL_WIDTH: f32 = 320.0;
pub const CONFIDENCE_LABEL: &str = "Confidence Threshold:";

/// 控制面板状态
#[derive(Default)]
pub struct ControlPanel {
    // 设备列表 (首次展开实时检测时扫描)
    pub video_devices: Vec<VideoDevice>,
    pub devices_loaded: bool,
}

impl ControlPanel {
    fn set_style(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.fg_stroke =
            egui::Stroke::new(1.0, egui::Color32::from_rgb(200, 210, 220));
        visuals.selection.bg_fill = egui::Color32::from_rgba_premultiplied(100, 150, 255, 100);
        ctx.set_visuals(visuals);
    }

    /// 左侧面板; 返回需要打开的文件选择窗口
    pub fn show(&mut self, ctx: &egui::Context, app: &mut DetectionApp) -> Option<BrowsePurpose> {
        self.set_style(ctx);

        let actions = egui::SidePanel::left("control_panel")
            .resizable(false)
            .exact_width(PANEL_WIDTH)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false; 2])
                    .show(ui, |ui| self.ui(ui, app))
                    .inner
            })
            .inner;

        if let Some(value) = actions.confidence {
            app.update_confidence(value);
        }
        if let Some(index) = actions.camera {
            app.camera_index = index;
        }
        if actions.load_model {
            app.load_model();
        }
        if actions.detect_image {
            app.detect_image();
        }
        if actions.start_video {
            app.start_video_detection();
        }
        if actions.start_live {
            app.start_live_detection();
        }
        if actions.stop {
            app.stop_detection();
        }
        if actions.refresh_devices {
            self.video_devices = get_video_devices();
            self.devices_loaded = true;
        }

        actions.browse
    }

    /// 绘制控制面板UI
    fn ui(&mut self, ui: &mut egui::Ui, app: &mut DetectionApp) -> ControlPanelActions {
        let mut actions = ControlPanelActions::default();
        let running = app.is_running();

        ui.style_mut().visuals.collapsing_header_frame = false;

        // --- 模型 ---
        egui::CollapsingHeader::new("Model Selection")
            .default_open(true)
            .show(ui, |ui| {
                ui.label(&app.model_label);
                ui.horizontal(|ui| {
                    if ui.button("Browse Model").clicked() {
                        actions.browse = Some(BrowsePurpose::Model);
                    }
                    if ui.button("Load Model").clicked() {
                        actions.load_model = true;
                    }
                });
                let color = match app.model_status_level {
                    StatusLevel::Ok => egui::Color32::GREEN,
                    StatusLevel::Error => egui::Color32::RED,
                };
                ui.colored_label(color, &app.model_status);
            });

        ui.separator();

        // --- 参数 ---
        egui::CollapsingHeader::new("Detection Settings")
            .default_open(true)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(CONFIDENCE_LABEL);
                    let mut value = app.confidence_value();
                    let slider = egui::Slider::new(&mut value, CONFIDENCE_MIN..=CONFIDENCE_MAX)
                        .show_value(false);
                    if ui.add(slider).changed() {
                        actions.confidence = Some(value);
                    }
                    ui.label(&app.confidence_label);
                });
            });

        ui.separator();

        // --- 图片 ---
        egui::CollapsingHeader::new("Image Detection")
            .default_open(true)
            .show(ui, |ui| {
                if ui.button("Select Image").clicked() {
                    actions.browse = Some(BrowsePurpose::Image);
                }
                if ui.button("Detect Objects").clicked() {
                    actions.detect_image = true;
                }
                if ui.button("Save Result").clicked() {
                    actions.browse = Some(BrowsePurpose::SaveImage);
                }
            });

        ui.separator();

        // --- 视频 ---
        egui::CollapsingHeader::new("Video Detection")
            .default_open(true)
            .show(ui, |ui| {
                if ui.button("Select Video File").clicked() {
                    actions.browse = Some(BrowsePurpose::Video);
                }
                if ui
                    .add_enabled(!running, egui::Button::new("Start Video Detection"))
                    .clicked()
                {
                    actions.start_video = true;
                }
                if ui
                    .add_enabled(running, egui::Button::new("Stop Video Detection"))
                    .clicked()
                {
                    actions.stop = true;
                }
            });

        ui.separator();

        // --- 摄像头 ---
        egui::CollapsingHeader::new("Live Detection")
            .default_open(true)
            .show(ui, |ui| {
                if !self.devices_loaded {
                    if ui.button("🔄 Scan cameras").clicked() {
                        actions.refresh_devices = true;
                    }
                } else if self.video_devices.is_empty() {
                    ui.label("No camera found");
                    if ui.button("🔄 Retry").clicked() {
                        actions.refresh_devices = true;
                    }
                } else {
                    let selected = self
                        .video_devices
                        .iter()
                        .find(|d| d.index == app.camera_index)
                        .map(|d| d.name.clone())
                        .unwrap_or_else(|| format!("Camera {}", app.camera_index));
                    let mut index = app.camera_index;
                    egui::ComboBox::from_id_salt("camera")
                        .selected_text(selected)
                        .show_ui(ui, |ui| {
                            for device in &self.video_devices {
                                ui.selectable_value(&mut index, device.index, &device.name);
                            }
                        });
                    if index != app.camera_index {
                        actions.camera = Some(index);
                    }
                }

                // 视频文件总是保存, 只有实时检测可选
                ui.checkbox(&mut app.save_video, "Save video output");

                if ui
                    .add_enabled(!running, egui::Button::new("Start Live Detection"))
                    .clicked()
                {
                    actions.start_live = true;
                }
                if ui
                    .add_enabled(running, egui::Button::new("Stop Detection"))
                    .clicked()
                {
                    actions.stop = true;
                }
            });

        ui.separator();

        // --- 统计 ---
        egui::CollapsingHeader::new("Detection Statistics")
            .default_open(true)
            .show(ui, |ui| {
                ui.add(egui::Label::new(&app.stats).wrap());
            });

        actions
    }
}

/// 控制面板操作返回值
#[derive(Default)]
pub struct ControlPanelActions {
    pub browse: Option<BrowsePurpose>,
    pub load_model: bool,
    pub confidence: Option<i32>,
    pub detect_image: bool,
    pub start_video: bool,
    pub start_live: bool,
    pub stop: bool,
    pub camera: Option<usize>,
    pub refresh_devices: bool,
}
