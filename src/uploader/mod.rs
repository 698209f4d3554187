// 上传模块
//
// - task: 上传请求 / 进度 / 终态定义
// - chunk: 顺序分片读取
// - transfer: 存储端 PUT 传输
// - engine: 上传编排（简单路径 / 分片路径）

pub mod chunk;
pub mod engine;
pub mod task;
pub mod transfer;

pub use chunk::{calculate_ranges, chunk_count, ChunkReader, FileChunk};
pub use engine::{ProgressCallback, UploadEngine, DEFAULT_MULTIPART_THRESHOLD};
pub use task::{UploadPhase, UploadProgress, UploadRequest, UploadResult};
pub use transfer::{ProgressFn, PutOutcome, TransferExecutor};
