//! Syntactic repairs applied to a candidate JSON block before strict parsing.
//!
//! The steps run in a fixed order and the whole chain is idempotent:
//! `clean_json_block(clean_json_block(x)) == clean_json_block(x)`.

use std::sync::LazyLock;

use regex::Regex;

/// A product image URL, possibly cut off, plus any closing quote and comma.
static PRODUCT_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""product_image"\s*:\s*"https:[^",\n]*"?[ \t]*,?"#).expect("valid regex")
});

/// One or more commas directly before a closing bracket or brace.
static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(?:\s*,)*\s*([\]}])").expect("valid regex"));

pub fn clean_json_block(block: &str) -> String {
    let cleaned = strip_line_comments(block);
    let cleaned = PRODUCT_IMAGE_RE.replace_all(&cleaned, r#""product_image": null,"#);
    let cleaned = cleaned.replace(r#""N/A""#, "null").replace(r#""n/a""#, "null");
    let cleaned = TRAILING_COMMA_RE.replace_all(&cleaned, "$1");
    cleaned.trim().to_string()
}

/// Drop `// ...` comments that start outside a string literal, line by line.
pub fn strip_line_comments(block: &str) -> String {
    block
        .lines()
        .map(|line| match comment_start(line) {
            Some(idx) => line[..idx].trim_end(),
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn comment_start(line: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    let mut prev_slash = false;

    for (idx, ch) in line.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                prev_slash = false;
            }
            '/' if prev_slash => return Some(idx - 1),
            '/' => prev_slash = true,
            _ => prev_slash = false,
        }
    }
    None
}
