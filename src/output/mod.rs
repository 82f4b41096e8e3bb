/// 结果输出 (Result persistence)
///
/// - VideoWriter: 检测视频保存 (ffmpeg-next)
/// - save_image / load_image: 静态图片读写
mod video_writer;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

pub use video_writer::VideoWriter;

/// 帧写入器
pub trait FrameWriter {
    /// 写入一帧
    fn write_frame(&mut self, image: &RgbImage) -> Result<()>;

    /// 完成写入
    fn finish(&mut self) -> Result<()>;
}

/// 检测视频输出路径: detection_output_YYYYmmdd_HHMMSS.mp4
pub fn output_video_path(dir: &Path) -> PathBuf {
    dir.join(format!("detection_output_{}.mp4", crate::gen_time_string()))
}

/// 保存图片, 格式由扩展名决定; 无扩展名时追加 .jpg
pub fn save_image(path: &Path, image: &RgbImage) -> Result<PathBuf> {
    let path = if path.extension().is_none() {
        path.with_extension("jpg")
    } else {
        path.to_path_buf()
    };
    image
        .save(&path)
        .with_context(|| format!("{}", path.display()))?;
    log::info!("💾 图片已保存: {}", path.display());
    Ok(path)
}

/// 读取任意支持格式的图片为 RGB
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let image = image::open(path).with_context(|| format!("{}", path.display()))?;
    Ok(image.to_rgb8())
}
