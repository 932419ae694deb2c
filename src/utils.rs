//! Utility functions for HTML stripping, date parsing, vector math, and
//! log-friendly string handling.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Html};

/// Strip HTML tags from a fragment, joining text nodes with single spaces.
///
/// Feed summaries routinely arrive as HTML; the engine stores plain text
/// only. Script and style contents are dropped along with the markup.
pub fn strip_html(fragment: &str) -> String {
    if !fragment.contains('<') {
        return fragment.trim().to_string();
    }
    let doc = Html::parse_fragment(fragment);
    element_text(doc.root_element())
}

/// Visible text of an element: descendant text nodes joined with single
/// spaces, with `<script>` and `<style>` subtrees dropped entirely. The
/// parser emits their raw contents as ordinary text nodes, so a plain
/// `.text()` walk would leak JS and CSS into summaries.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();
    collect_text(element, &mut parts);
    parts.join(" ")
}

fn collect_text(element: ElementRef<'_>, parts: &mut Vec<String>) {
    if matches!(element.value().name(), "script" | "style") {
        return;
    }
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            collect_text(el, parts);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
    }
}

/// Replace angle brackets in a title so it cannot smuggle markup into the
/// rendered briefing.
pub fn sanitize_title(title: &str) -> String {
    title.replace('<', "_").replace('>', "_")
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte count
/// indicator appended. Truncation happens on a char boundary.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Parse a feed timestamp into naive UTC.
///
/// Feeds use RFC 2822 (`Tue, 07 Jan 2025 12:00:00 GMT`), RFC 3339
/// (`2025-01-07T12:00:00Z`), and the occasional bare date. Returns `None`
/// when nothing matches; callers treat that as "published now, flagged".
pub fn parse_feed_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.to_utc().naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.to_utc().naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}

/// Scale a vector to unit L2 norm in place. A zero vector is left untouched
/// (it has no direction); returns the original norm.
pub fn l2_normalize(v: &mut [f32]) -> f32 {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

/// Host part of a url, when it parses as one.
pub fn host_of(raw: &str) -> Option<String> {
    url::Url::parse(raw)
        .ok()?
        .host_str()
        .map(str::to_string)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory when missing, then probes it with a create-delete
/// round trip. Used for the output directories before any ingest starts, so
/// misconfiguration fails fast.
pub fn ensure_writable_dir(path: &std::path::Path) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(path)?;
    let probe = path.join("..__probe_write__");
    std::fs::File::create(&probe)?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_removes_tags() {
        assert_eq!(
            strip_html("<p>Hello <b>world</b></p>"),
            "Hello world"
        );
    }

    #[test]
    fn test_strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("  plain text  "), "plain text");
    }

    #[test]
    fn test_strip_html_drops_scripts() {
        assert_eq!(
            strip_html("<div>keep<script>var x = 1;</script></div>"),
            "keep"
        );
    }

    #[test]
    fn test_strip_html_drops_styles() {
        assert_eq!(
            strip_html("<div><style>.a { color: red; }</style>styled</div>"),
            "styled"
        );
    }

    #[test]
    fn test_element_text_skips_nested_script_subtrees() {
        let doc = Html::parse_fragment(
            "<div>before<span>inner<script>let x = 0;</script></span>after</div>",
        );
        assert_eq!(element_text(doc.root_element()), "before inner after");
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("a <b> c"), "a _b_ c");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_parse_feed_date_rfc2822() {
        let dt = parse_feed_date("Tue, 07 Jan 2025 12:30:00 GMT").unwrap();
        assert_eq!(dt.to_string(), "2025-01-07 12:30:00");
    }

    #[test]
    fn test_parse_feed_date_rfc3339_with_offset() {
        let dt = parse_feed_date("2025-01-07T06:30:00-06:00").unwrap();
        assert_eq!(dt.to_string(), "2025-01-07 12:30:00");
    }

    #[test]
    fn test_parse_feed_date_bare_date() {
        let dt = parse_feed_date("2025-01-07").unwrap();
        assert_eq!(dt.to_string(), "2025-01-07 00:00:00");
    }

    #[test]
    fn test_parse_feed_date_garbage_is_none() {
        assert!(parse_feed_date("yesterday-ish").is_none());
        assert!(parse_feed_date("").is_none());
    }

    #[test]
    fn test_l2_normalize_unit_result() {
        let mut v = vec![3.0, 4.0];
        let norm = l2_normalize(&mut v);
        assert!((norm - 5.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_untouched() {
        let mut v = vec![0.0, 0.0, 0.0];
        let norm = l2_normalize(&mut v);
        assert_eq!(norm, 0.0);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://export.arxiv.org/rss/cs.AI").as_deref(),
            Some("export.arxiv.org")
        );
        assert_eq!(host_of("not a url"), None);
    }
}
