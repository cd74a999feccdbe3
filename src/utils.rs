/// Key processing utility functions / 对象键处理工具函数

/// Replace backslashes with forward slashes / 将反斜杠替换为正斜杠
pub fn normalize_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Join path parts into an object key / 拼接对象键
/// 1. Skip empty parts / 跳过空片段
/// 2. Replace backslashes with forward slashes / 将反斜杠替换为正斜杠
/// 3. Clean . and .. and duplicate / / 清理 . 和 .. 和重复的 /
pub fn join_key(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");

    clean_key(&normalize_slashes(&joined))
}

/// Clean key, keeps a leading / only if the input had one / 清理对象键
fn clean_key(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if parts.last().map(|p| *p != "..").unwrap_or(false) {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }

    if absolute {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

/// Get file extension (lowercase) / 获取文件扩展名
pub fn get_ext(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
