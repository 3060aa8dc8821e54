//! File Output - 文件系统音频输出实现
//!
//! 实现 AudioOutputPort trait：先写入同目录的临时文件，再原子重命名到目标路径

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::application::ports::{AudioOutputError, AudioOutputPort};

/// 文件系统音频输出
#[derive(Debug, Clone, Default)]
pub struct FileAudioOutput;

impl FileAudioOutput {
    pub fn new() -> Self {
        Self
    }

    /// 目标文件旁的临时文件路径
    fn temp_path(path: &Path) -> Result<PathBuf, AudioOutputError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| AudioOutputError::InvalidPath(path.display().to_string()))?;

        let mut temp_name = std::ffi::OsString::from(".");
        temp_name.push(file_name);
        temp_name.push(format!(".{}.part", Uuid::new_v4()));

        Ok(path.with_file_name(temp_name))
    }

    async fn write_file(path: &Path, audio: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(audio).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl AudioOutputPort for FileAudioOutput {
    async fn commit(&self, path: &Path, audio: &[u8]) -> Result<PathBuf, AudioOutputError> {
        let temp_path = Self::temp_path(path)?;

        // 确保目标目录存在
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AudioOutputError::IoError(e.to_string()))?;
        }

        if let Err(e) = Self::write_file(&temp_path, audio).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AudioOutputError::IoError(e.to_string()));
        }

        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AudioOutputError::IoError(e.to_string()));
        }

        tracing::debug!(path = %path.display(), size = audio.len(), "Audio committed");

        Ok(path.to_path_buf())
    }
}
