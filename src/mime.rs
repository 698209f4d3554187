// 内容类型推断
//
// 录制产物只有固定几种容器格式，按扩展名查表即可，
// 未知扩展名统一回落到 application/octet-stream。

/// 根据文件名推断内容类型
///
/// 扩展名匹配不区分大小写，无匹配时返回 `application/octet-stream`。
pub fn resolve_content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}
