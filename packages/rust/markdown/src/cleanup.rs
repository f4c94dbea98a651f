//! Post-conversion cleanup passes for scraped Markdown.
//!
//! Each pass is `&str -> String` and they run in a fixed order.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Run every cleanup pass on raw `htmd` output.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let md = fix_code_fence_languages(md);
    let md = strip_wrapper_tags(&md);
    let md = resolve_links(&md, base_url);
    let md = trim_line_ends(&md);
    let md = collapse_blank_lines(&md);
    finish(&md)
}

/// `language-js` / `lang-js` / `highlight-js` fence hints become plain `js`.
fn fix_code_fence_languages(md: &str) -> String {
    static FENCE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(\s*)```(?:language-|lang-|highlight-)([\w+-]+)").expect("valid regex")
    });

    FENCE.replace_all(md, "$1```$2").into_owned()
}

/// Drop layout-only tags `htmd` passes through, keeping their text.
/// Fenced code is left verbatim.
fn strip_wrapper_tags(md: &str) -> String {
    static WRAPPER: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|main|picture|source)(?:\s[^>]*)?/?>")
            .expect("valid regex")
    });

    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence {
                line.to_string()
            } else {
                WRAPPER.replace_all(line, "").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Make relative link targets absolute against the page URL. Images, anchors,
/// and already-absolute targets are left as they are.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    static LINK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    let Some(base) = base_url else {
        return md.to_string();
    };

    LINK.replace_all(md, |caps: &regex::Captures| {
        let (bang, text, href) = (&caps[1], &caps[2], &caps[3]);
        let keep = !bang.is_empty()
            || href.starts_with('#')
            || href.contains("://")
            || href.starts_with("mailto:")
            || href.starts_with("tel:");
        if keep {
            return caps[0].to_string();
        }
        match base.join(href) {
            Ok(abs) => format!("[{text}]({abs})"),
            Err(_) => caps[0].to_string(),
        }
    })
    .into_owned()
}

fn trim_line_ends(md: &str) -> String {
    md.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// At most one empty line between blocks.
fn collapse_blank_lines(md: &str) -> String {
    static BLANKS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    BLANKS.replace_all(md, "\n\n").into_owned()
}

/// Strip leading blank lines and end with exactly one newline.
/// Output with no content is the empty string.
fn finish(md: &str) -> String {
    let body = md.trim_start_matches('\n').trim_end_matches('\n');
    if body.trim().is_empty() {
        return String::new();
    }
    format!("{body}\n")
}
