//! Download-link guard
//!
//! Posts must never promise a download the reader cannot reach. Without a
//! recognised cloud-drive link every "get the resource here" phrasing is
//! replaced by a coming-soon notice.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

pub const COMING_SOON: &str = "资源链接即将更新，敬请关注。";

lazy_static! {
    static ref KNOWN_HOST: Regex = Regex::new(
        r"(?i)^(?:[a-z0-9-]+\.)*(?:pan\.[a-z0-9.-]+|aliyundrive\.com|alipan\.com|115\.com|lanzou[a-z]*\.com|123pan\.com|cloud\.189\.cn)$"
    )
    .unwrap();
    static ref DOWNLOAD_LINE: Regex = Regex::new(
        r"^\s*(?:[-*]\s*)?(?:\*\*)?(?:下载链接|资源链接|网盘链接|获取链接|下载地址)(?:\*\*)?\s*[：:]"
    )
    .unwrap();
    static ref CLICK_TO_GET: Regex =
        Regex::new(r"点击(?:下方)?链接(?:获取|下载)(?:资源)?").unwrap();
    static ref PLACEHOLDER_LINK: Regex = Regex::new(r"\[([^\]]*)\]\(#\)").unwrap();
}

/// An http(s) URL on a cloud-drive host the site links to
pub fn is_known_resource_link(link: &str) -> bool {
    let Ok(url) = Url::parse(link.trim()) else {
        return false;
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }
    url.host_str().map(|h| KNOWN_HOST.is_match(h)).unwrap_or(false)
}

fn is_http_url(link: &str) -> bool {
    Url::parse(link)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Rewrite download wording in `markdown` to match what `link` allows
pub fn guard_links(markdown: &str, link: Option<&str>) -> String {
    match link.filter(|l| is_known_resource_link(l)) {
        Some(link) => PLACEHOLDER_LINK
            .replace_all(markdown, |caps: &regex::Captures| {
                format!("[{}]({})", &caps[1], link)
            })
            .into_owned(),
        None => {
            if let Some(bad) = link.map(str::trim).filter(|l| !l.is_empty()) {
                tracing::warn!("Download link {} is not on a known host, hiding it", bad);
            }
            // only a real URL is scrubbed from the body; free text like "无" is left alone
            let bad_url = link.map(str::trim).filter(|l| is_http_url(l));
            let mut lines = Vec::new();
            for line in markdown.lines() {
                let line = match bad_url {
                    Some(bad) => line.replace(bad, COMING_SOON),
                    None => line.to_string(),
                };
                if DOWNLOAD_LINE.is_match(&line) {
                    lines.push(COMING_SOON.to_string());
                    continue;
                }
                let line = PLACEHOLDER_LINK.replace_all(&line, "$1");
                lines.push(CLICK_TO_GET.replace_all(&line, COMING_SOON).into_owned());
            }
            lines.join("\n")
        }
    }
}
