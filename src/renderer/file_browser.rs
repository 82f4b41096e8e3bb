//! 应用内文件选择窗口 (egui)
//!
//! 每种用途有固定的扩展名过滤, 目录优先列出, 也可以直接在输入框中填写路径.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use egui_macroquad::egui;
use phf::phf_map;

/// 文件选择用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowsePurpose {
    Model,
    Image,
    Video,
    SaveImage,
}

/// 各用途的扩展名, 空格分隔
static FILTERS: phf::Map<&'static str, &'static str> = phf_map! {
    "model" => "onnx",
    "image" => "jpg jpeg png bmp tiff",
    "video" => "mp4 avi mov mkv",
    "save" => "jpg png",
};

impl BrowsePurpose {
    fn key(self) -> &'static str {
        match self {
            BrowsePurpose::Model => "model",
            BrowsePurpose::Image => "image",
            BrowsePurpose::Video => "video",
            BrowsePurpose::SaveImage => "save",
        }
    }

    pub fn extensions(self) -> Vec<&'static str> {
        FILTERS
            .get(self.key())
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn title(self) -> &'static str {
        match self {
            BrowsePurpose::Model => "Select YOLO Model",
            BrowsePurpose::Image => "Select Image",
            BrowsePurpose::Video => "Select Video",
            BrowsePurpose::SaveImage => "Save Result",
        }
    }

    /// 保存对话框允许输入不存在的文件
    pub fn is_save(self) -> bool {
        self == BrowsePurpose::SaveImage
    }
}

/// 扩展名过滤 (不区分大小写)
pub fn matches_filter(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// 列出目录: 子目录在前, 其余为符合过滤的文件, 各自按名称排序; 隐藏文件跳过
pub fn list_dir(dir: &Path, extensions: &[&str]) -> Result<Vec<Entry>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("{}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            dirs.push(Entry { name, path, is_dir: true });
        } else if matches_filter(&path, extensions) {
            files.push(Entry { name, path, is_dir: false });
        }
    }

    dirs.sort_by_key(|e| e.name.to_lowercase());
    files.sort_by_key(|e| e.name.to_lowercase());
    dirs.extend(files);
    Ok(dirs)
}

pub struct FileBrowser {
    purpose: Option<BrowsePurpose>,
    dir: PathBuf,
    entries: Vec<Entry>,
    path_text: String,
    error: Option<String>,
}

impl Default for FileBrowser {
    fn default() -> Self {
        Self {
            purpose: None,
            dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            entries: Vec::new(),
            path_text: String::new(),
            error: None,
        }
    }
}

impl FileBrowser {
    pub fn is_open(&self) -> bool {
        self.purpose.is_some()
    }

    pub fn open(&mut self, purpose: BrowsePurpose, start_dir: Option<&Path>) {
        self.purpose = Some(purpose);
        self.path_text.clear();
        self.error = None;
        let dir = start_dir
            .filter(|d| d.is_dir())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.dir.clone());
        self.change_dir(dir);
    }

    fn close(&mut self) {
        self.purpose = None;
        self.entries.clear();
    }

    fn change_dir(&mut self, dir: PathBuf) {
        let extensions = self.purpose.map(|p| p.extensions()).unwrap_or_default();
        match list_dir(&dir, &extensions) {
            Ok(entries) => {
                self.entries = entries;
                self.dir = dir;
                self.error = None;
            }
            Err(e) => {
                log::warn!("⚠️ 无法读取目录: {:#}", e);
                self.error = Some(format!("Cannot open folder: {e}"));
            }
        }
    }

    /// 输入框内容解析为路径 (相对路径基于当前目录)
    fn typed_path(&self) -> Option<PathBuf> {
        let text = self.path_text.trim();
        if text.is_empty() {
            return None;
        }
        let path = PathBuf::from(text);
        Some(if path.is_absolute() { path } else { self.dir.join(path) })
    }

    fn accept(&mut self, path: PathBuf) -> Option<(BrowsePurpose, PathBuf)> {
        let purpose = self.purpose?;
        if path.is_dir() {
            self.change_dir(path);
            self.path_text.clear();
            return None;
        }
        if !purpose.is_save() && !path.is_file() {
            self.error = Some(format!("File not found: {}", path.display()));
            return None;
        }
        self.close();
        Some((purpose, path))
    }

    /// 绘制窗口, 用户确认后返回 (用途, 路径)
    pub fn show(&mut self, ctx: &egui::Context) -> Option<(BrowsePurpose, PathBuf)> {
        let purpose = self.purpose?;
        let mut chosen: Option<PathBuf> = None;
        let mut enter_dir: Option<PathBuf> = None;
        let mut confirm = false;
        let mut cancel = false;

        egui::Window::new(purpose.title())
            .id(egui::Id::new("file_browser"))
            .collapsible(false)
            .resizable(true)
            .default_size(egui::vec2(520.0, 420.0))
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("⬆ Up").clicked() {
                        if let Some(parent) = self.dir.parent() {
                            enter_dir = Some(parent.to_path_buf());
                        }
                    }
                    ui.label(self.dir.display().to_string());
                });
                ui.label(format!("Filter: {}", purpose.extensions().join(", ")));
                ui.separator();

                egui::ScrollArea::vertical()
                    .max_height(280.0)
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        for entry in &self.entries {
                            let text = if entry.is_dir {
                                format!("📁 {}", entry.name)
                            } else {
                                format!("📄 {}", entry.name)
                            };
                            let selected = !entry.is_dir && self.path_text == entry.name;
                            let response = ui.selectable_label(selected, text);
                            if entry.is_dir {
                                if response.clicked() {
                                    enter_dir = Some(entry.path.clone());
                                }
                            } else if response.double_clicked() {
                                chosen = Some(entry.path.clone());
                            } else if response.clicked() {
                                self.path_text = entry.name.clone();
                            }
                        }
                    });

                ui.separator();
                let edit = ui.add(
                    egui::TextEdit::singleline(&mut self.path_text)
                        .desired_width(ui.available_width())
                        .hint_text("File name or full path"),
                );
                let enter = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

                if let Some(error) = &self.error {
                    ui.colored_label(egui::Color32::RED, error);
                }

                ui.horizontal(|ui| {
                    let ok = if purpose.is_save() { "Save" } else { "Open" };
                    if ui.button(ok).clicked() || enter {
                        confirm = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                });
            });

        if cancel {
            self.close();
            return None;
        }
        if let Some(dir) = enter_dir {
            self.change_dir(dir);
            return None;
        }
        if confirm {
            chosen = self.typed_path();
        }
        chosen.and_then(|path| self.accept(path))
    }
}
