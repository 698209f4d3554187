// Media Upload Rust Library
// 媒体文件预签名直传核心库

// 配置管理模块
pub mod config;

// 日志系统模块
pub mod logging;

// 错误类型模块
pub mod error;

// 内容类型推断模块
pub mod mime;

// 后端预签名API模块
pub mod backend;

// 上传引擎模块
pub mod uploader;

// 导出常用类型
pub use backend::{CompletedPart, MultipartSession, PresignClient, PresignedTarget};
pub use config::{BackendConfig, LogConfig, UploaderConfig};
pub use error::{UploadError, UploadStage};
pub use uploader::{
    ChunkReader, FileChunk, TransferExecutor, UploadEngine, UploadPhase, UploadProgress,
    UploadRequest, UploadResult, DEFAULT_MULTIPART_THRESHOLD,
};
