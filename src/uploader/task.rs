// 上传请求与结果定义

use crate::error::UploadStage;
use crate::mime;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// 上传请求
///
/// 创建后不可变。文件名、内容类型、大小均在构造时确定，
/// 上传过程中如文件大小发生变化按 IO 错误处理。
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// 请求ID（用于日志关联）
    pub id: String,
    /// 本地文件路径
    pub local_path: PathBuf,
    /// 文件名
    pub filename: String,
    /// 内容类型（由扩展名推断，不可由调用方编辑）
    pub content_type: String,
    /// 文件大小（字节）
    pub size_bytes: u64,
    /// 目标目录
    pub folder: String,
    /// 创建时间 (Unix timestamp)
    pub created_at: i64,
}

impl UploadRequest {
    /// 从本地文件构造上传请求
    ///
    /// 读取文件元数据确定大小，按扩展名推断内容类型。
    pub async fn from_path(
        path: impl AsRef<Path>,
        folder: impl Into<String>,
    ) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;

        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("不是普通文件: {:?}", path),
            ));
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("无法从路径提取文件名: {:?}", path),
                )
            })?;

        let content_type = mime::resolve_content_type(&filename).to_string();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            local_path: path.to_path_buf(),
            filename,
            content_type,
            size_bytes: metadata.len(),
            folder: folder.into(),
            created_at: chrono::Utc::now().timestamp(),
        })
    }
}

/// 上传阶段
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadPhase {
    /// 空闲
    Idle,
    /// 预签名中
    Presigning,
    /// 上传中（简单路径）
    Uploading,
    /// 分片上传中（携带分片序号）
    Part(u32),
    /// 合并分片中
    Completing,
    /// 已完成
    Done,
    /// 失败
    Failed,
}

/// 上传进度
///
/// 仅由上传引擎更新，通过回调推送给调用方。
/// fraction 在一次上传内单调不减，且只在成功终态时等于 1.0。
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct UploadProgress {
    /// 完成比例，取值 [0.0, 1.0]
    pub fraction: f64,
    /// 当前阶段
    pub phase: UploadPhase,
}

/// 上传终态
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadResult {
    /// 上传成功
    Success {
        /// 对象键
        object_key: String,
        /// 公开访问 URL
        public_url: Option<String>,
    },
    /// 上传失败
    Failure {
        /// 失败阶段
        stage: UploadStage,
        /// 错误信息
        message: String,
    },
}

impl UploadResult {
    /// 是否成功
    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success { .. })
    }
}
