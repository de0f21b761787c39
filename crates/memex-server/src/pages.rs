//! Generated pages: the `generate_page` chat side-effect tool converts
//! Markdown into a standalone HTML page under `pages_dir`, addressable by
//! slug (§4.10, §6). This tool has no JSON-RPC surface — it only exists
//! on the chat orchestrator's tool list (§4.10 supplement).

use std::path::{Path, PathBuf};

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  body { font-family: -apple-system, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; line-height: 1.6; }
  pre { background: #f4f4f4; padding: 0.75rem; overflow-x: auto; }
  code { background: #f4f4f4; padding: 0.1rem 0.3rem; }
</style>
</head>
<body>
{body}
</body>
</html>
"#;

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("invalid slug")]
    InvalidSlug,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Normalize a title into a `[a-z0-9-]` slug: lowercase, non-alphanumerics
/// collapsed to single dashes, leading/trailing dashes trimmed.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_dash = false;
    for ch in title.to_ascii_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            out.push('-');
            last_was_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Reject any filename component that isn't a bare `[a-z0-9-]+` segment —
/// no `/`, no `..`, no empty string.
pub fn validate_slug(slug: &str) -> Result<(), PageError> {
    if slug.is_empty() || slug.contains('/') || slug.contains("..") || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(PageError::InvalidSlug);
    }
    Ok(())
}

/// Render `markdown` under `title` into the fixed template.
pub fn render_html(title: &str, markdown: &str) -> String {
    let parser = pulldown_cmark::Parser::new(markdown);
    let mut body = String::new();
    pulldown_cmark::html::push_html(&mut body, parser);
    TEMPLATE.replace("{title}", &html_escape(title)).replace("{body}", &body)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Write `markdown` as a new page under `title`, resolving slug
/// collisions with a numeric suffix (`hello-world`, `hello-world-1`, ...).
/// Returns the final slug used.
pub fn generate_page(pages_dir: &Path, title: &str, markdown: &str) -> Result<String, PageError> {
    std::fs::create_dir_all(pages_dir)?;
    let base = slugify(title);
    validate_slug(&base)?;

    let mut slug = base.clone();
    let mut suffix = 0u32;
    loop {
        let path = page_path(pages_dir, &slug)?;
        if !path.exists() {
            let html = render_html(title, markdown);
            std::fs::write(&path, html)?;
            return Ok(slug);
        }
        suffix += 1;
        slug = format!("{base}-{suffix}");
    }
}

/// Resolve a slug to its on-disk path, rejecting path traversal.
pub fn page_path(pages_dir: &Path, slug: &str) -> Result<PathBuf, PageError> {
    validate_slug(slug)?;
    Ok(pages_dir.join(format!("{slug}.html")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_non_alnum_and_trims() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  -- Hello, World!! --  "), "hello-world");
    }

    #[test]
    fn validate_slug_rejects_traversal() {
        assert!(validate_slug("../etc/passwd").is_err());
        assert!(validate_slug("a/b").is_err());
        assert!(validate_slug("hello-world").is_ok());
    }

    #[test]
    fn generate_page_resolves_collisions_with_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let slug1 = generate_page(dir.path(), "Hello World", "# hi").unwrap();
        let slug2 = generate_page(dir.path(), "Hello World", "# hi again").unwrap();
        assert_eq!(slug1, "hello-world");
        assert_eq!(slug2, "hello-world-1");
        assert!(dir.path().join("hello-world.html").exists());
        assert!(dir.path().join("hello-world-1.html").exists());
    }

    #[test]
    fn render_html_escapes_title_and_converts_markdown() {
        let html = render_html("A & B", "**bold**");
        assert!(html.contains("A &amp; B"));
        assert!(html.contains("<strong>bold</strong>"));
    }
}
