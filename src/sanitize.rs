//! Best-effort HTML to plain text. Pattern substitution, not a parser:
//! unrecognized tags or entities pass through literally. Callers only ever see
//! [`strip_html`] so the implementation can be swapped out wholesale.

use once_cell::sync::Lazy;
use regex::Regex;

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

pub fn strip_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let without_tags = TAGS.replace_all(html, "");
    let collapsed = SPACES.replace_all(&without_tags, " ");
    collapsed
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .trim()
        .to_string()
}
