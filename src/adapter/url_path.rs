//! Public URL -> object key / 公开链接转对象键
//!
//! 按顺序尝试解析策略，第一个返回 Some 的策略生效：
//! 1. 标准 URL 解析
//! 2. 正则提取 `<host>/<bucket>/` 之后的部分
//! 3. 最后一段路径

use regex::Regex;
use url::Url;

type Strategy = fn(&UrlResolver, &str) -> Option<String>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("parsed-url", UrlResolver::from_parsed_url),
    ("bucket-pattern", UrlResolver::from_bucket_pattern),
    ("last-segment", UrlResolver::from_last_segment),
];

/// Resolves object keys from URLs for one public host / 针对某个公开域名解析对象键
#[derive(Debug, Clone)]
pub struct UrlResolver {
    host: String,
}

impl UrlResolver {
    pub fn new(host: &str) -> Self {
        Self { host: host.to_string() }
    }

    /// Resolve a key, degrading through the strategies / 逐级降级解析
    pub fn resolve(&self, url: &str) -> String {
        for (name, strategy) in STRATEGIES {
            if let Some(path) = strategy(self, url) {
                return path;
            }
            tracing::warn!("URL strategy {} failed for {}, falling back", name, url);
        }
        url.to_string()
    }

    fn from_parsed_url(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;

        if parsed.host_str() == Some(self.host.as_str()) {
            // 去掉第一段（bucket 名称），其余逐段解码
            let parts = parsed
                .path()
                .split('/')
                .filter(|p| !p.is_empty())
                .skip(1)
                .map(decode_component)
                .collect::<Option<Vec<String>>>()?;
            Some(parts.join("/"))
        } else {
            decode_component(parsed.path().trim_start_matches('/'))
        }
    }

    fn from_bucket_pattern(&self, url: &str) -> Option<String> {
        let decoded = decode_component(strip_query(url))?;
        let pattern = Regex::new(&format!(r"{}/[^/]+/(.+)$", regex::escape(&self.host))).ok()?;
        pattern
            .captures(&decoded)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn from_last_segment(&self, url: &str) -> Option<String> {
        let without_query = strip_query(url);
        let last = without_query.rsplit('/').next().unwrap_or(without_query);
        Some(decode_component(last).unwrap_or_else(|| last.to_string()))
    }
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Strict percent-decoding: malformed escapes or invalid UTF-8 yield None
/// 严格解码：非法转义或非 UTF-8 返回 None
pub fn decode_component(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() || !bytes[i + 1].is_ascii_hexdigit() || !bytes[i + 2].is_ascii_hexdigit() {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    urlencoding::decode(s).ok().map(|d| d.into_owned())
}
