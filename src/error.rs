// 上传错误类型
//
// 每个错误变体对应上传流程中的一个阶段，任一阶段出错都会
// 立即终止整次上传，并以阶段标签的形式返回给调用方。
// 各层均不做自动重试，调用方需重新发起整次上传。

use serde::Serialize;
use thiserror::Error;

/// 上传失败所处的阶段
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    /// 后端预签名接口失败（拒绝或响应格式错误）
    Presign,
    /// 存储端 PUT 失败（非成功状态码、发送失败或缺少 ETag）
    Transfer,
    /// 本地文件读取失败
    Io,
    /// 分片协议不变量被破坏（防御性检查，正常流程不应触发）
    Protocol,
}

/// 上传错误
#[derive(Debug, Error)]
pub enum UploadError {
    /// 预签名接口被拒绝或响应格式错误
    #[error("预签名请求失败: {message}")]
    Presign { message: String },

    /// 存储端 PUT 返回非成功状态码
    #[error("存储端 PUT 失败: HTTP {status} - {body}")]
    Transfer { status: u16, body: String },

    /// 存储端 PUT 请求在传输层失败（连接/超时等，无状态码）
    #[error("存储端 PUT 发送失败: {message}")]
    TransferSend { message: String },

    /// 分片上传响应缺少 ETag（合并分片必须提供 ETag）
    #[error("分片 #{part_number} 响应缺少 ETag")]
    MissingEtag { part_number: u32 },

    /// 本地文件无法打开、读取，或在上传过程中大小发生变化
    #[error("本地文件读取失败: {0}")]
    Io(#[from] std::io::Error),

    /// 分片序号不连续等协议不变量违例
    #[error("分片协议不变量被破坏: {0}")]
    ProtocolInvariant(String),
}

impl UploadError {
    /// 映射到失败阶段标签
    pub fn stage(&self) -> UploadStage {
        match self {
            UploadError::Presign { .. } => UploadStage::Presign,
            UploadError::Transfer { .. }
            | UploadError::TransferSend { .. }
            | UploadError::MissingEtag { .. } => UploadStage::Transfer,
            UploadError::Io(_) => UploadStage::Io,
            UploadError::ProtocolInvariant(_) => UploadStage::Protocol,
        }
    }

    /// 构造预签名错误
    pub fn presign(message: impl Into<String>) -> Self {
        UploadError::Presign {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(
            UploadError::presign("后端拒绝").stage(),
            UploadStage::Presign
        );
        assert_eq!(
            UploadError::Transfer {
                status: 500,
                body: "internal".to_string()
            }
            .stage(),
            UploadStage::Transfer
        );
        assert_eq!(
            UploadError::TransferSend {
                message: "connection reset".to_string()
            }
            .stage(),
            UploadStage::Transfer
        );
        assert_eq!(
            UploadError::MissingEtag { part_number: 3 }.stage(),
            UploadStage::Transfer
        );
        assert_eq!(
            UploadError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no file")).stage(),
            UploadStage::Io
        );
        assert_eq!(
            UploadError::ProtocolInvariant("分片序号不连续".to_string()).stage(),
            UploadStage::Protocol
        );
    }

    #[test]
    fn test_error_message_contains_status() {
        let err = UploadError::Transfer {
            status: 403,
            body: "AccessDenied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("AccessDenied"));
    }

    #[test]
    fn test_stage_serialization() {
        assert_eq!(
            serde_json::to_string(&UploadStage::Transfer).unwrap(),
            "\"transfer\""
        );
        assert_eq!(
            serde_json::to_string(&UploadStage::Presign).unwrap(),
            "\"presign\""
        );
    }
}
