//! Open and click tracking for campaign email
//!
//! Opens are detected with a 1x1 image that loads `/track/open?t=<id>`.
//! Links are rewritten to `/track/click?t=<id>&url=<target>`, which records
//! the click and redirects. Mail, phone and fragment links are left alone.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const OPEN_PATH: &str = "/track/open";
pub const CLICK_PATH: &str = "/track/click";

/// A transparent 1x1 GIF served for open tracking
pub const TRACKING_PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href=["']([^"']+)["']"#).expect("valid href regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));
static STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(style|script)[^>]*>.*?</(style|script)>").expect("valid style regex"));
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(\s*\n)+").expect("valid blank line regex"));

pub fn open_url(base_url: &str, tracking_id: &str) -> String {
    format!("{}{}?t={}", base_url.trim_end_matches('/'), OPEN_PATH, tracking_id)
}

pub fn click_url(base_url: &str, tracking_id: &str, target: &str) -> String {
    format!(
        "{}{}?t={}&url={}",
        base_url.trim_end_matches('/'),
        CLICK_PATH,
        tracking_id,
        urlencoding::encode(target)
    )
}

/// Wraps plain content in an HTML document, adds the open pixel and
/// rewrites links through the click tracker
pub fn add_tracking(content: &str, tracking_id: &str, base_url: &str) -> String {
    let pixel = format!(
        r#"<img src="{}" width="1" height="1" alt="" style="border:0" />"#,
        open_url(base_url, tracking_id)
    );

    let lower = content.to_ascii_lowercase();
    let html = if !lower.contains("<html") && !lower.contains("<body") {
        format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"UTF-8\"></head>\n<body>\n{}\n{}\n</body>\n</html>",
            content.replace('\n', "<br>\n"),
            pixel
        )
    } else if let Some(at) = lower.rfind("</body>").or_else(|| lower.rfind("</html>")) {
        format!("{}{}\n{}", &content[..at], pixel, &content[at..])
    } else {
        format!("{}\n{}", content, pixel)
    };

    let tracker = format!("{}{}", base_url.trim_end_matches('/'), CLICK_PATH);
    HREF_RE
        .replace_all(&html, |caps: &Captures| {
            let target = &caps[1];
            if target.starts_with("mailto:")
                || target.starts_with("tel:")
                || target.starts_with('#')
                || target.starts_with(&tracker)
            {
                caps[0].to_string()
            } else {
                format!(r#"href="{}""#, click_url(base_url, tracking_id, target))
            }
        })
        .into_owned()
}

/// Text alternative for an HTML body
pub fn plain_text(html: &str) -> String {
    let without_blocks = STYLE_RE.replace_all(html, "");
    let with_breaks = without_blocks
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p>", "</p>\n");
    let text = TAG_RE
        .replace_all(&with_breaks, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    BLANK_LINES_RE.replace_all(&text, "\n\n").trim().to_string()
}
