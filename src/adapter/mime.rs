//! Content-Type lookup for served objects / 响应 Content-Type 查询

use crate::utils::get_ext;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Extension -> MIME, extensions lowercase without dot / 扩展名映射表
const CONTENT_TYPES: &[(&str, &str)] = &[
    // Image types / 图片
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    // Media types / 音视频
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("ogg", "video/ogg"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("m4a", "audio/mp4"),
    // File types / 文件
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("zip", "application/zip"),
    ("json", "application/json"),
    ("txt", "text/plain"),
];

/// Content-Type for a key, case-insensitive on extension / 按扩展名获取 Content-Type
pub fn content_type_for(key: &str) -> &'static str {
    let ext = get_ext(key);
    CONTENT_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type_for("2024/03/a.png"), "image/png");
        assert_eq!(content_type_for("a.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("clip.ogg"), "video/ogg");
        assert_eq!(content_type_for("voice.m4a"), "audio/mp4");
        assert_eq!(
            content_type_for("report.docx"),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
    }

    #[test]
    fn test_unknown_extensions_fall_back() {
        assert_eq!(content_type_for("archive.tar.gz"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for("README"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for(".png"), DEFAULT_CONTENT_TYPE);
    }
}
