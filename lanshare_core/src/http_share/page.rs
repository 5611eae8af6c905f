//! HTML listing page and URL helpers

use crate::catalog::{CatalogItem, ItemKind};
use crate::constants::DOWNLOAD_PREFIX;
use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt::Write;

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>LanShare</title>
    <style>
        body { font-family: -apple-system, system-ui, sans-serif; background: #f4f5f7; color: #222; margin: 0; }
        main { max-width: 640px; margin: 0 auto; padding: 16px; }
        h1 { font-size: 22px; }
        .meta { color: #666; font-size: 13px; margin-bottom: 16px; }
        ul { list-style: none; padding: 0; margin: 0; }
        li { background: #fff; border-radius: 10px; margin-bottom: 10px; padding: 12px 14px; box-shadow: 0 1px 2px rgba(0,0,0,.08); }
        a { color: #0b66d6; text-decoration: none; font-weight: 600; word-break: break-all; }
        .size { color: #777; font-size: 13px; margin-top: 4px; }
        .empty { color: #777; }
    </style>
</head>
<body>
<main>
"#;

const PAGE_TAIL: &str = "</main>\n</body>\n</html>\n";

/// Everything outside the RFC 3986 unreserved set
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a single path segment or query value
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Link to an item, each path segment encoded, token appended when set
pub fn download_href(name: &str, token: Option<&str>) -> String {
    let path = name
        .split('/')
        .map(encode_component)
        .collect::<Vec<_>>()
        .join("/");
    match token {
        Some(token) => format!("{}{}?token={}", DOWNLOAD_PREFIX, path, encode_component(token)),
        None => format!("{}{}", DOWNLOAD_PREFIX, path),
    }
}

/// Render the listing shown at `/`
pub fn render_index(items: &[CatalogItem], token: Option<&str>, uptime: &str) -> String {
    let mut html = String::from(PAGE_HEAD);
    html.push_str("<h1>Shared files</h1>\n");
    let _ = writeln!(
        html,
        "<div class=\"meta\">{} item(s) &middot; up {}</div>",
        items.len(),
        encode_text(uptime)
    );

    if items.is_empty() {
        html.push_str("<p class=\"empty\">Nothing is shared.</p>\n");
    } else {
        html.push_str("<ul>\n");
        for item in items {
            let detail = match (item.kind, item.file_count) {
                (ItemKind::ZippedFolder, Some(count)) => {
                    format!("{} &middot; folder, {} files", item.size_human, count)
                }
                _ => item.size_human.clone(),
            };
            let _ = writeln!(
                html,
                "<li><a href=\"{}\" download>{}</a><div class=\"size\">{}</div></li>",
                encode_double_quoted_attribute(&download_href(&item.name, token)),
                encode_text(&item.name),
                detail
            );
        }
        html.push_str("</ul>\n");
    }

    html.push_str(PAGE_TAIL);
    html
}
