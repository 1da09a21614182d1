//! Notification formatting.
//!
//! Every notification is produced in two forms because destinations may
//! render either: a rich (HTML anchor) form and a plain-text form.
//!
//! ```text
//! rich:  <a href="https://twitter.com/myaccount/status/123">Twitter myaccount</a>: hello world
//! plain: Twitter myaccount: hello world - https://twitter.com/myaccount/status/123
//! ```

use crate::source::FeedItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub rich: String,
    pub plain: String,
}

impl Message {
    /// Format `item` as fetched from `account` on `service`.
    pub fn for_item(service: &str, account: &str, item: &FeedItem) -> Self {
        let rich = format!(
            r#"<a href="{}">{} {}</a>: {}"#,
            escape_html(&item.url),
            escape_html(service),
            escape_html(account),
            escape_html(&item.text),
        );
        let plain = format!("{service} {account}: {} - {}", item.text, item.url);
        Self { rich, plain }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
