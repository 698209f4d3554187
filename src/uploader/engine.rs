// 上传引擎
//
// 编排一次完整上传：按文件大小选择简单路径或分片路径，
// 驱动预签名、传输、合并，聚合进度并产出终态结果。
//
// 引擎无内部状态，可并发用于多次上传；单次上传内部严格串行。

use crate::backend::{CompletedPart, PresignClient};
use crate::config::BackendConfig;
use crate::error::UploadError;
use crate::uploader::chunk::{chunk_count, ChunkReader};
use crate::uploader::task::{UploadPhase, UploadProgress, UploadRequest, UploadResult};
use crate::uploader::transfer::{ProgressFn, TransferExecutor};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 简单上传与分片上传的默认阈值（80 MB）
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 80 * 1024 * 1024;

/// 进度回调
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// 非终态进度的上限
///
/// 传输字节全部发出不等于上传完成（分片还需要合并），
/// 因此 1.0 只在成功终态时上报一次。
const NON_TERMINAL_CEILING: f64 = 0.999;

/// 进度上报器
///
/// 保证单次上传内 fraction 单调不减，且 1.0 只出现在成功终态。
/// 可克隆，克隆体共享同一条单调水位线，供传输层的 'static 回调持有。
#[derive(Clone)]
struct ProgressReporter {
    callback: Option<ProgressCallback>,
    /// 已上报的最大 fraction，按 1e-6 定点存储
    last_millionths: Arc<AtomicU64>,
}

impl ProgressReporter {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last_millionths: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 上报一个非终态进度值，自动夹紧到单调不减且低于 1.0
    fn report(&self, fraction: f64, phase: UploadPhase) {
        if let Some(ref callback) = self.callback {
            let clamped = fraction.clamp(0.0, NON_TERMINAL_CEILING);
            let millionths = (clamped * 1_000_000.0) as u64;
            let previous = self.last_millionths.fetch_max(millionths, Ordering::SeqCst);
            let monotonic = std::cmp::max(previous, millionths) as f64 / 1_000_000.0;
            callback(UploadProgress {
                fraction: monotonic,
                phase,
            });
        }
    }

    /// 上报成功终态，fraction 固定为 1.0
    fn report_done(&self) {
        if let Some(ref callback) = self.callback {
            self.last_millionths.store(1_000_000, Ordering::SeqCst);
            callback(UploadProgress {
                fraction: 1.0,
                phase: UploadPhase::Done,
            });
        }
    }

    /// 上报失败终态，fraction 冻结在最后一次上报的值
    fn report_failed(&self) {
        if let Some(ref callback) = self.callback {
            let frozen = self.last_millionths.load(Ordering::SeqCst) as f64 / 1_000_000.0;
            callback(UploadProgress {
                fraction: frozen,
                phase: UploadPhase::Failed,
            });
        }
    }
}

/// 上传引擎
pub struct UploadEngine {
    backend: PresignClient,
    transfer: TransferExecutor,
    /// 达到该大小（含）时走分片路径
    multipart_threshold: u64,
}

impl UploadEngine {
    /// 创建上传引擎
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let backend = PresignClient::new(config)?;
        let transfer = TransferExecutor::new(Duration::from_secs(config.connect_timeout_secs))?;

        Ok(Self {
            backend,
            transfer,
            multipart_threshold: config.multipart_threshold_bytes,
        })
    }

    /// 执行一次上传
    ///
    /// 错误不向外抛出，统一折叠为 `UploadResult::Failure` 并带上失败阶段。
    /// 任一阶段失败立即终止，已上传的分片不做清理。
    pub async fn start_upload(
        &self,
        request: &UploadRequest,
        on_progress: Option<ProgressCallback>,
    ) -> UploadResult {
        let reporter = ProgressReporter::new(on_progress);
        reporter.report(0.0, UploadPhase::Idle);

        info!(
            "开始上传: id={}, file={}, size={} bytes, folder={}",
            request.id, request.filename, request.size_bytes, request.folder
        );

        let outcome = if request.size_bytes >= self.multipart_threshold {
            self.upload_multipart(request, &reporter).await
        } else {
            self.upload_simple(request, &reporter).await
        };

        match outcome {
            Ok((object_key, public_url)) => {
                reporter.report_done();
                info!(
                    "上传成功: id={}, key={}, public_url={:?}",
                    request.id, object_key, public_url
                );
                UploadResult::Success {
                    object_key,
                    public_url,
                }
            }
            Err(e) => {
                reporter.report_failed();
                error!(
                    "上传失败: id={}, stage={:?}, error={}",
                    request.id,
                    e.stage(),
                    e
                );
                UploadResult::Failure {
                    stage: e.stage(),
                    message: e.to_string(),
                }
            }
        }
    }

    // ===== 简单路径 =====

    /// 简单上传：单次预签名 + 单次 PUT
    async fn upload_simple(
        &self,
        request: &UploadRequest,
        reporter: &ProgressReporter,
    ) -> Result<(String, Option<String>), UploadError> {
        reporter.report(0.0, UploadPhase::Presigning);
        let target = self
            .backend
            .presign_simple(&request.filename, &request.content_type, &request.folder)
            .await?;

        let data = tokio::fs::read(&request.local_path).await?;
        if data.len() as u64 != request.size_bytes {
            return Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "文件大小发生变化: 期望 {} bytes, 实际 {} bytes",
                    request.size_bytes,
                    data.len()
                ),
            )));
        }

        reporter.report(0.0, UploadPhase::Uploading);

        let total = request.size_bytes.max(1);
        let sent = Arc::new(AtomicU64::new(0));
        let progress: ProgressFn = {
            let sent = Arc::clone(&sent);
            let reporter = reporter.clone();
            Arc::new(move |delta, _| {
                let cumulative = sent.fetch_add(delta, Ordering::SeqCst) + delta;
                reporter.report(cumulative as f64 / total as f64, UploadPhase::Uploading);
            })
        };

        self.transfer
            .put_bytes(
                &target.put_url,
                &target.required_headers,
                data,
                Some(progress),
            )
            .await?;

        Ok((target.object_key, target.public_url))
    }

    // ===== 分片路径 =====

    /// 分片上传：创建会话，逐片预签名并 PUT，最后合并
    async fn upload_multipart(
        &self,
        request: &UploadRequest,
        reporter: &ProgressReporter,
    ) -> Result<(String, Option<String>), UploadError> {
        reporter.report(0.0, UploadPhase::Presigning);
        let session = self
            .backend
            .multipart_start(&request.filename, &request.content_type, &request.folder)
            .await?;

        let total_parts = chunk_count(request.size_bytes, session.part_size_bytes);
        info!(
            "分片上传: id={}, key={}, part_size={} bytes, 共 {} 片",
            request.id, session.object_key, session.part_size_bytes, total_parts
        );

        let mut reader = ChunkReader::open(
            &request.local_path,
            request.size_bytes,
            session.part_size_bytes,
        )
        .await?;

        let total = request.size_bytes.max(1);
        let uploaded = Arc::new(AtomicU64::new(0));
        let mut completed_parts: Vec<CompletedPart> = Vec::with_capacity(total_parts as usize);
        let mut expected_part = 1u32;

        while let Some(chunk) = reader.next_chunk().await? {
            // 分片序号必须连续，读取器出错时在这里兜底
            if chunk.part_number != expected_part {
                return Err(UploadError::ProtocolInvariant(format!(
                    "分片序号不连续: 期望 #{}, 实际 #{}",
                    expected_part, chunk.part_number
                )));
            }

            let part_url = self
                .backend
                .multipart_part_url(&session, chunk.part_number)
                .await?;

            let part_number = chunk.part_number;
            let progress: ProgressFn = {
                let uploaded = Arc::clone(&uploaded);
                let reporter = reporter.clone();
                Arc::new(move |delta, _| {
                    let cumulative = uploaded.fetch_add(delta, Ordering::SeqCst) + delta;
                    reporter.report(
                        cumulative as f64 / total as f64,
                        UploadPhase::Part(part_number),
                    );
                })
            };

            let chunk_size = chunk.size();
            let outcome = self
                .transfer
                .put_bytes(&part_url, &HashMap::new(), chunk.data, Some(progress))
                .await?;

            let etag = outcome.etag.ok_or(UploadError::MissingEtag {
                part_number: chunk.part_number,
            })?;

            info!(
                "分片 #{}/{} 上传完成: {} bytes, ETag={}",
                chunk.part_number, total_parts, chunk_size, etag
            );

            completed_parts.push(CompletedPart {
                etag,
                part_number: chunk.part_number,
            });
            expected_part += 1;
        }

        if completed_parts.len() as u64 != total_parts {
            warn!(
                "分片数量不符: 期望 {} 片, 实际 {} 片",
                total_parts,
                completed_parts.len()
            );
            return Err(UploadError::ProtocolInvariant(format!(
                "分片数量不符: 期望 {} 片, 实际 {} 片",
                total_parts,
                completed_parts.len()
            )));
        }

        reporter.report(
            uploaded.load(Ordering::SeqCst) as f64 / total as f64,
            UploadPhase::Completing,
        );
        let public_url = self
            .backend
            .multipart_complete(&session, &completed_parts)
            .await?;

        Ok((session.object_key, public_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting_callback() -> (ProgressCallback, Arc<Mutex<Vec<UploadProgress>>>) {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let callback: ProgressCallback = Arc::new(move |p| {
            sink.lock().unwrap().push(p);
        });
        (callback, collected)
    }

    #[test]
    fn test_reporter_monotonic() {
        let (callback, collected) = collecting_callback();
        let reporter = ProgressReporter::new(Some(callback));

        reporter.report(0.2, UploadPhase::Uploading);
        reporter.report(0.5, UploadPhase::Uploading);
        // 回退被夹紧到已上报的最大值
        reporter.report(0.3, UploadPhase::Uploading);
        reporter.report(0.8, UploadPhase::Uploading);

        let values: Vec<f64> = collected.lock().unwrap().iter().map(|p| p.fraction).collect();
        assert_eq!(values.len(), 4);
        for window in values.windows(2) {
            assert!(window[1] >= window[0]);
        }
        assert!((values[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_reporter_caps_below_one_until_done() {
        let (callback, collected) = collecting_callback();
        let reporter = ProgressReporter::new(Some(callback));

        // 字节全部发出也不等于完成
        reporter.report(1.0, UploadPhase::Completing);
        reporter.report_done();

        let progresses = collected.lock().unwrap();
        assert!(progresses[0].fraction < 1.0);
        assert_eq!(progresses[0].phase, UploadPhase::Completing);
        assert_eq!(progresses[1].fraction, 1.0);
        assert_eq!(progresses[1].phase, UploadPhase::Done);
    }

    #[test]
    fn test_reporter_failed_freezes_last_value() {
        let (callback, collected) = collecting_callback();
        let reporter = ProgressReporter::new(Some(callback));

        reporter.report(0.4, UploadPhase::Part(2));
        reporter.report_failed();

        let progresses = collected.lock().unwrap();
        let last = progresses.last().unwrap();
        assert_eq!(last.phase, UploadPhase::Failed);
        assert!((last.fraction - 0.4).abs() < 1e-6);
        assert!(last.fraction < 1.0);
    }

    #[test]
    fn test_reporter_without_callback_is_noop() {
        let reporter = ProgressReporter::new(None);
        reporter.report(0.5, UploadPhase::Uploading);
        reporter.report_done();
    }
}
