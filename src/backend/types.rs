// 后端预签名API数据类型
//
// 响应一律按固定结构严格解码，缺少必需字段即视为预签名失败，
// 不做宽松的动态 JSON 解析。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =====================================================
// 请求体
// =====================================================

/// 预签名请求体（简单上传与分片会话创建共用）
#[derive(Debug, Serialize)]
pub struct PresignRequest<'a> {
    /// 文件名
    pub filename: &'a str,
    /// 内容类型
    pub content_type: &'a str,
    /// 目标目录
    pub folder: &'a str,
}

/// 分片URL请求体
#[derive(Debug, Serialize)]
pub struct PartUrlRequest<'a> {
    /// 对象键
    pub key: &'a str,
    /// 上传会话ID
    pub upload_id: &'a str,
    /// 分片序号（从 1 开始）
    pub part_number: u32,
}

/// 合并分片请求体
#[derive(Debug, Serialize)]
pub struct CompleteRequest<'a> {
    /// 对象键
    pub key: &'a str,
    /// 上传会话ID
    pub upload_id: &'a str,
    /// 已上传分片列表（按 PartNumber 升序）
    pub parts: &'a [CompletedPart],
}

// =====================================================
// 响应体
// =====================================================

/// 简单上传预签名响应
///
/// `url` 和 `key` 为必需字段，缺失时解码直接失败。
#[derive(Debug, Deserialize)]
pub struct PresignResponse {
    /// 预签名 PUT URL
    pub url: String,
    /// 对象键
    pub key: String,
    /// PUT 时必须附带的请求头
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// 上传完成后的公开访问 URL
    #[serde(default)]
    pub public_url: Option<String>,
}

/// 分片会话创建响应
#[derive(Debug, Deserialize)]
pub struct MultipartStartResponse {
    /// 对象键
    pub key: String,
    /// 上传会话ID
    pub upload_id: String,
    /// 后端指定的分片大小（字节）
    pub part_size: u64,
}

/// 分片URL响应
#[derive(Debug, Deserialize)]
pub struct PartUrlResponse {
    /// 该分片的一次性 PUT URL
    pub url: String,
}

/// 合并分片响应
#[derive(Debug, Deserialize)]
pub struct CompleteResponse {
    /// 上传完成后的公开访问 URL
    #[serde(default)]
    pub public_url: Option<String>,
}

// =====================================================
// 领域类型
// =====================================================

/// 简单上传目标
///
/// 生命周期为一次上传尝试，不跨上传复用。
#[derive(Debug, Clone)]
pub struct PresignedTarget {
    /// 预签名 PUT URL
    pub put_url: String,
    /// 对象键
    pub object_key: String,
    /// PUT 时必须附带的请求头
    pub required_headers: HashMap<String, String>,
    /// 公开访问 URL
    pub public_url: Option<String>,
}

impl From<PresignResponse> for PresignedTarget {
    fn from(resp: PresignResponse) -> Self {
        Self {
            put_url: resp.url,
            object_key: resp.key,
            required_headers: resp.headers,
            public_url: resp.public_url,
        }
    }
}

/// 分片上传会话
///
/// 由上传引擎独占持有，出错时仅丢弃本地状态（不通知后端中止）。
#[derive(Debug, Clone)]
pub struct MultipartSession {
    /// 对象键
    pub object_key: String,
    /// 上传会话ID
    pub upload_id: String,
    /// 分片大小（字节）
    pub part_size_bytes: u64,
}

/// 已完成分片
///
/// 序列化为后端合并接口要求的 `{"ETag", "PartNumber"}` 形式，
/// ETag 已去除首尾引号。
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompletedPart {
    /// 分片 ETag
    #[serde(rename = "ETag")]
    pub etag: String,
    /// 分片序号（从 1 开始）
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
}
