// 存储端 PUT 传输
//
// 向预签名 URL 直传字节，与后端 API 客户端完全分离：
// 这里只认识 URL、请求头和字节，不认识预签名协议。
//
// 进度通过把内存缓冲切成小块包装为请求体流来上报，
// Content-Length 始终显式设置，不使用 chunked 编码。

use crate::error::UploadError;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 传输进度回调：(本次已发送字节数, 本次总字节数)
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// 进度上报的切块大小
const PROGRESS_SLICE_BYTES: usize = 64 * 1024;

/// 单次 PUT 的结果
#[derive(Debug)]
pub struct PutOutcome {
    /// 响应中的 ETag（已去除两侧引号），存储端可能不返回
    pub etag: Option<String>,
}

/// 存储端 PUT 执行器
#[derive(Debug, Clone)]
pub struct TransferExecutor {
    client: reqwest::Client,
}

impl TransferExecutor {
    /// 创建执行器
    ///
    /// 只设置连接超时，不设置整体请求超时：
    /// 大文件整体传输时长无法预先约定上限。
    pub fn new(connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("创建 HTTP 客户端失败: {}", e))?;

        Ok(Self { client })
    }

    /// 向预签名 URL PUT 一段字节
    ///
    /// # 参数
    /// * `url` - 预签名 PUT URL
    /// * `headers` - 必须附带的请求头（来自预签名响应）
    /// * `body` - 待上传字节
    /// * `on_progress` - 进度回调，按发送切块调用
    pub async fn put_bytes(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
        on_progress: Option<ProgressFn>,
    ) -> Result<PutOutcome, UploadError> {
        let total = body.len() as u64;

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                UploadError::TransferSend {
                    message: format!("非法请求头名称 {}: {}", name, e),
                }
            })?;
            let value =
                HeaderValue::from_str(value).map_err(|e| UploadError::TransferSend {
                    message: format!("非法请求头值: {}", e),
                })?;
            header_map.insert(name, value);
        }
        // 显式声明长度，存储端预签名校验通常要求精确的 Content-Length
        header_map.insert(CONTENT_LENGTH, HeaderValue::from(total));

        // 切块包装为流，在每块发出时上报进度
        let payload = Bytes::from(body);
        let mut slices = Vec::with_capacity(payload.len().div_ceil(PROGRESS_SLICE_BYTES).max(1));
        let mut offset = 0usize;
        while offset < payload.len() {
            let end = std::cmp::min(offset + PROGRESS_SLICE_BYTES, payload.len());
            slices.push(payload.slice(offset..end));
            offset = end;
        }

        let stream = futures::stream::iter(slices.into_iter().map(move |slice| {
            let sent = slice.len() as u64;
            if let Some(ref callback) = on_progress {
                callback(sent, total);
            }
            Ok::<Bytes, std::io::Error>(slice)
        }));

        let response = self
            .client
            .put(url)
            .headers(header_map)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| UploadError::TransferSend {
                message: e.to_string(),
            })?;

        let status = response.status();
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!("存储端 PUT 失败: HTTP {} - {}", status.as_u16(), body_text);
            return Err(UploadError::Transfer {
                status: status.as_u16(),
                body: body_text,
            });
        }

        debug!(
            "存储端 PUT 成功: {} bytes, ETag={:?}",
            total,
            etag.as_deref().unwrap_or("(无)")
        );

        Ok(PutOutcome { etag })
    }
}
