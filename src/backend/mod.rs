// 后端预签名API模块

pub mod client;
pub mod types;

pub use client::PresignClient;
pub use types::{CompletedPart, MultipartSession, PresignedTarget};
