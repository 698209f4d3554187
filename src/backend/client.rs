// 后端预签名客户端实现

use crate::backend::types::{
    CompleteRequest, CompleteResponse, CompletedPart, MultipartSession, MultipartStartResponse,
    PartUrlRequest, PartUrlResponse, PresignRequest, PresignResponse, PresignedTarget,
};
use crate::config::BackendConfig;
use crate::error::UploadError;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};

/// 后端预签名客户端
///
/// 封装四个后端接口：简单上传预签名、分片会话创建、
/// 分片URL获取、分片合并。所有调用均为单次往返，不重试。
#[derive(Debug, Clone)]
pub struct PresignClient {
    /// HTTP客户端
    client: Client,
    /// 后端基础 URL（不含尾部斜杠）
    base_url: String,
}

impl PresignClient {
    /// 创建新的预签名客户端
    ///
    /// # 参数
    /// * `config` - 后端配置（基础 URL 与连接超时）
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        info!("初始化预签名客户端: base_url={}", base_url);

        Ok(Self { client, base_url })
    }

    /// 发送 POST 请求并严格解码响应
    ///
    /// 非成功状态码或响应结构不符都映射为预签名错误。
    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, UploadError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| UploadError::presign(format!("{} 请求发送失败: {}", path, e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| UploadError::presign(format!("{} 读取响应失败: {}", path, e)))?;

        debug!("{} 响应: status={}, body={}", path, status, response_text);

        if !status.is_success() {
            error!("{} 返回非成功状态: {} - {}", path, status, response_text);
            return Err(UploadError::presign(format!(
                "{} 返回 HTTP {}: {}",
                path, status, response_text
            )));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            error!("{} 响应解析失败: {}, body={}", path, e, response_text);
            UploadError::presign(format!("{} 响应格式错误: {}", path, e))
        })
    }

    /// 获取简单上传的预签名目标
    ///
    /// # 参数
    /// * `filename` - 文件名
    /// * `content_type` - 内容类型
    /// * `folder` - 目标目录
    pub async fn presign_simple(
        &self,
        filename: &str,
        content_type: &str,
        folder: &str,
    ) -> Result<PresignedTarget, UploadError> {
        info!("请求简单上传预签名: filename={}, folder={}", filename, folder);

        let response: PresignResponse = self
            .post_json(
                "/uploads/presign",
                &PresignRequest {
                    filename,
                    content_type,
                    folder,
                },
            )
            .await?;

        info!("预签名成功: key={}", response.key);
        Ok(PresignedTarget::from(response))
    }

    /// 创建分片上传会话
    ///
    /// 后端返回的 `part_size` 必须为正整数，否则视为预签名失败。
    pub async fn multipart_start(
        &self,
        filename: &str,
        content_type: &str,
        folder: &str,
    ) -> Result<MultipartSession, UploadError> {
        info!("创建分片上传会话: filename={}, folder={}", filename, folder);

        let response: MultipartStartResponse = self
            .post_json(
                "/uploads/multipart/start",
                &PresignRequest {
                    filename,
                    content_type,
                    folder,
                },
            )
            .await?;

        if response.part_size == 0 {
            return Err(UploadError::presign(
                "分片会话创建失败: part_size 必须为正整数",
            ));
        }

        info!(
            "分片会话创建成功: key={}, upload_id={}, part_size={} bytes",
            response.key, response.upload_id, response.part_size
        );

        Ok(MultipartSession {
            object_key: response.key,
            upload_id: response.upload_id,
            part_size_bytes: response.part_size,
        })
    }

    /// 获取指定分片的一次性 PUT URL
    ///
    /// # 参数
    /// * `session` - 分片上传会话
    /// * `part_number` - 分片序号（从 1 开始）
    pub async fn multipart_part_url(
        &self,
        session: &MultipartSession,
        part_number: u32,
    ) -> Result<String, UploadError> {
        debug!(
            "请求分片 URL: key={}, part={}",
            session.object_key, part_number
        );

        let response: PartUrlResponse = self
            .post_json(
                "/uploads/multipart/part-url",
                &PartUrlRequest {
                    key: &session.object_key,
                    upload_id: &session.upload_id,
                    part_number,
                },
            )
            .await?;

        Ok(response.url)
    }

    /// 合并分片，完成上传
    ///
    /// # 参数
    /// * `session` - 分片上传会话
    /// * `parts` - 已上传分片列表（必须按 PartNumber 升序）
    ///
    /// # 返回
    /// 后端返回的公开访问 URL（可能为空）
    pub async fn multipart_complete(
        &self,
        session: &MultipartSession,
        parts: &[CompletedPart],
    ) -> Result<Option<String>, UploadError> {
        info!(
            "合并分片: key={}, upload_id={}, parts={}",
            session.object_key,
            session.upload_id,
            parts.len()
        );

        let response: CompleteResponse = self
            .post_json(
                "/uploads/multipart/complete",
                &CompleteRequest {
                    key: &session.object_key,
                    upload_id: &session.upload_id,
                    parts,
                },
            )
            .await?;

        info!("分片合并成功: key={}", session.object_key);
        Ok(response.public_url)
    }
}
