//! 面向用户的错误 (对话框文本)

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Please select a model file first")]
    NoModelSelected,

    #[error("Please load a model first")]
    NoModelLoaded,

    #[error("Please select an image first")]
    NoImageSelected,

    #[error("Please select a video file first")]
    NoVideoSelected,

    #[error("Detection is already running")]
    AlreadyRunning,

    #[error("No image to save")]
    NothingToSave,

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Failed to save image: {0}")]
    ImageSave(String),

    #[error("Could not open video source: {0}")]
    SourceOpen(String),
}

impl AppError {
    /// 前置条件未满足 (警告) 还是操作失败 (错误)
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            AppError::NoModelSelected
                | AppError::NoModelLoaded
                | AppError::NoImageSelected
                | AppError::NoVideoSelected
                | AppError::AlreadyRunning
                | AppError::NothingToSave
        )
    }
}
