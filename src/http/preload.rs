//! `Link: rel=preload` header from the assets referenced by an HTML page.
//!
//! Scripts are listed first, then stylesheets and fonts, then images; each
//! group keeps document order.

use std::sync::LazyLock;

use regex::Regex;

/// Upper bound on preload entries per page.
pub const MAX_PRELOADS: usize = 20;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|link|img)\b([^>]*)>").expect("preload tag pattern is valid")
});

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("preload attribute pattern is valid")
});

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    ATTR.captures_iter(attrs).find_map(|caps| {
        let key = caps.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str())
    })
}

/// Build the `Link` header value, or `None` when the page references nothing.
pub fn link_header(html: &str) -> Option<String> {
    let mut scripts = Vec::new();
    let mut links = Vec::new();
    let mut images = Vec::new();

    for caps in TAG.captures_iter(html) {
        let (Some(tag), Some(attrs)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let attrs = attrs.as_str();

        match tag.as_str().to_ascii_lowercase().as_str() {
            "script" => scripts.extend(
                attribute(attrs, "src")
                    .filter(|src| src.ends_with(".js"))
                    .map(|src| (src, "script")),
            ),
            "link" => {
                let href = attribute(attrs, "href");
                let entry = match attribute(attrs, "rel").map(str::to_ascii_lowercase).as_deref() {
                    Some("stylesheet") => href.filter(|h| h.ends_with(".css")).map(|h| (h, "style")),
                    Some("font") => href.map(|h| (h, "font")),
                    _ => None,
                };
                links.extend(entry);
            }
            "img" => images.extend(
                attribute(attrs, "src")
                    .filter(|src| !src.contains("data:") && !src.ends_with(".ico"))
                    .map(|src| (src, "image")),
            ),
            _ => {}
        }
    }

    let entries: Vec<String> = scripts
        .into_iter()
        .chain(links)
        .chain(images)
        .take(MAX_PRELOADS)
        .map(|(url, kind)| format!("<{url}>; rel=preload; as={kind}; nopush"))
        .collect();

    if entries.is_empty() {
        None
    } else {
        Some(entries.join(", "))
    }
}
