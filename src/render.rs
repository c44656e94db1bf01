//! Snapshot rendering
//!
//! [`render_snapshot`] turns a URL-rewritten [`PostDetail`] and its comments into
//! one self-contained HTML document. It is a pure function: no I/O, no clock, no
//! randomness, so the same input always renders to the same bytes.

use crate::config::Theme;
use crate::post::{Comment, MediaItem, MediaKind, Metrics, PostDetail};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;

/// Rendering switches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Render the comment list (when non-empty)
    pub include_comments: bool,
    /// Color theme
    pub theme: Theme,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_comments: true,
            theme: Theme::Auto,
        }
    }
}

const BASE_CSS: &str = "\
body{margin:0;padding:24px;font-family:-apple-system,BlinkMacSystemFont,\"Segoe UI\",Roboto,sans-serif;line-height:1.45}\
article{max-width:600px;margin:0 auto}\
header{display:flex;align-items:center;gap:12px;margin-bottom:12px}\
header img{width:48px;height:48px;border-radius:50%}\
.name{font-weight:700}\
.handle{opacity:.65}\
.text{font-size:1.1em;white-space:normal;word-wrap:break-word}\
.media{display:grid;gap:4px;margin-top:12px}\
.media img,.media video{width:100%;border-radius:12px}\
blockquote{margin:12px 0 0;padding:12px;border-radius:12px}\
footer{margin-top:12px;font-size:.9em;opacity:.75}\
footer span{margin-right:12px}\
.comments{margin-top:16px;padding:0;list-style:none}\
.comments li{padding:8px 0}";

const LIGHT_CSS: &str = "body{background:#fff;color:#0f1419}blockquote,.comments li{border:1px solid #cfd9de}";
const DARK_CSS: &str = "body{background:#15202b;color:#f7f9f9}blockquote,.comments li{border:1px solid #38444d}";

/// Render a post snapshot as a standalone HTML document
///
/// Missing author, media, quoted post and metrics are simply left out.
pub fn render_snapshot(post: &PostDetail, comments: &[Comment], options: &RenderOptions) -> String {
    let mut html = String::with_capacity(4096);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    let _ = writeln!(html, "<title>{}</title>", encode_text(&title(post)));
    let _ = writeln!(html, "<style>{}{}</style>", BASE_CSS, theme_css(options.theme));
    html.push_str("</head>\n<body>\n<article class=\"post\">\n");

    render_post_body(&mut html, post);

    if let Some(quoted) = &post.quoted {
        html.push_str("<blockquote class=\"quoted\">\n");
        render_post_body(&mut html, quoted);
        html.push_str("</blockquote>\n");
    }

    render_footer(&mut html, post);

    if options.include_comments && !comments.is_empty() {
        render_comments(&mut html, comments);
    }

    html.push_str("</article>\n</body>\n</html>\n");
    html
}

fn title(post: &PostDetail) -> String {
    match &post.author {
        Some(author) if !author.screen_name.is_empty() => {
            format!("@{} - post {}", author.screen_name, post.id)
        }
        _ => format!("post {}", post.id),
    }
}

fn theme_css(theme: Theme) -> String {
    match theme {
        Theme::Light => LIGHT_CSS.to_string(),
        Theme::Dark => DARK_CSS.to_string(),
        Theme::Auto => format!(
            "{}@media (prefers-color-scheme: dark){{{}}}",
            LIGHT_CSS, DARK_CSS
        ),
    }
}

fn render_post_body(html: &mut String, post: &PostDetail) {
    if let Some(author) = &post.author {
        html.push_str("<header>\n");
        if let Some(avatar) = author.profile_image_url.as_deref().and_then(web_url) {
            let _ = writeln!(
                html,
                "<img class=\"avatar\" src=\"{}\" alt=\"\">",
                encode_double_quoted_attribute(avatar)
            );
        }
        let _ = writeln!(
            html,
            "<div><div class=\"name\">{}</div><div class=\"handle\">@{}</div></div>",
            encode_text(&author.name),
            encode_text(&author.screen_name)
        );
        html.push_str("</header>\n");
    }

    if !post.text.is_empty() {
        let _ = writeln!(html, "<p class=\"text\">{}</p>", text_with_breaks(&post.text));
    }

    if !post.media.is_empty() {
        html.push_str("<div class=\"media\">\n");
        for item in &post.media {
            render_media(html, item);
        }
        html.push_str("</div>\n");
    }
}

fn text_with_breaks(text: &str) -> String {
    text.lines()
        .map(|line| encode_text(line).into_owned())
        .collect::<Vec<_>>()
        .join("<br>")
}

/// `url` when it is an absolute http(s) URL; other schemes never reach an attribute
fn web_url(url: &str) -> Option<&str> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(url),
        _ => None,
    }
}

fn render_media(html: &mut String, item: &MediaItem) {
    let Some(src) = web_url(&item.url) else {
        tracing::debug!(url = %item.url, "Dropping media item without a web URL");
        return;
    };
    let src = encode_double_quoted_attribute(src);
    let size = match (item.width, item.height) {
        (Some(w), Some(h)) => format!(" width=\"{}\" height=\"{}\"", w, h),
        _ => String::new(),
    };

    match item.kind {
        MediaKind::Photo => {
            let _ = writeln!(html, "<img src=\"{}\"{} alt=\"\" loading=\"lazy\">", src, size);
        }
        MediaKind::Video | MediaKind::AnimatedGif => {
            let poster = item
                .preview_url
                .as_deref()
                .and_then(web_url)
                .map(|p| format!(" poster=\"{}\"", encode_double_quoted_attribute(p)))
                .unwrap_or_default();
            let playback = if item.kind == MediaKind::AnimatedGif {
                " loop muted autoplay playsinline"
            } else {
                ""
            };
            let _ = writeln!(
                html,
                "<video controls{}{}{} src=\"{}\"></video>",
                playback, poster, size, src
            );
        }
    }
}

fn render_footer(html: &mut String, post: &PostDetail) {
    let has_metrics = post.metrics.is_some();
    let original = post.url.as_deref().and_then(web_url);
    if !has_metrics && post.created_at.is_none() && original.is_none() {
        return;
    }

    html.push_str("<footer>\n");
    if let Some(Metrics {
        replies,
        reposts,
        likes,
        views,
    }) = &post.metrics
    {
        let _ = write!(
            html,
            "<span class=\"replies\">{} replies</span><span class=\"reposts\">{} reposts</span><span class=\"likes\">{} likes</span>",
            replies, reposts, likes
        );
        if let Some(views) = views {
            let _ = write!(html, "<span class=\"views\">{} views</span>", views);
        }
        html.push('\n');
    }
    if let Some(created_at) = &post.created_at {
        let _ = writeln!(html, "<time>{}</time>", encode_text(created_at));
    }
    if let Some(url) = original {
        let _ = writeln!(
            html,
            "<a class=\"original\" href=\"{}\">View original</a>",
            encode_double_quoted_attribute(url)
        );
    }
    html.push_str("</footer>\n");
}

fn render_comments(html: &mut String, comments: &[Comment]) {
    html.push_str("<ul class=\"comments\">\n");
    for comment in comments {
        let _ = write!(
            html,
            "<li><div class=\"name\">{}</div><div class=\"text\">{}</div>",
            encode_text(&comment.author),
            text_with_breaks(&comment.text)
        );
        if let Some(created_at) = &comment.created_at {
            let _ = write!(html, "<time>{}</time>", encode_text(created_at));
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul>\n");
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(value: serde_json::Value) -> PostDetail {
        PostDetail::from_value(value).unwrap()
    }

    fn full_post() -> PostDetail {
        post(json!({
            "id": "1",
            "text": "line one\nline <two> & \"three\"",
            "author": {"name": "Alice", "screen_name": "alice",
                       "profile_image_url": "https://cdn/images/1/avatar/a_bigger.jpg"},
            "media": [
                {"type": "photo", "url": "https://cdn/images/1/media/p.jpg", "width": 10, "height": 20},
                {"type": "animated_gif", "url": "https://cdn/videos/1/g.mp4",
                 "preview_url": "https://cdn/images/1/media/g.jpg"}
            ],
            "quoted": {"id": "2", "text": "inner", "author": {"name": "Bob", "screen_name": "bob"}},
            "metrics": {"replies": 1, "reposts": 2, "likes": 3, "views": 4},
            "created_at": "2024-01-01T00:00:00Z",
            "url": "https://x.com/alice/status/1?a=1&b=2"
        }))
    }

    #[test]
    fn test_render_is_deterministic() {
        let p = full_post();
        let comments = vec![Comment {
            author: "carol".into(),
            text: "nice".into(),
            created_at: None,
        }];
        let options = RenderOptions::default();
        assert_eq!(
            render_snapshot(&p, &comments, &options),
            render_snapshot(&p, &comments, &options)
        );
    }

    #[test]
    fn test_text_is_escaped_with_line_breaks() {
        let html = render_snapshot(&full_post(), &[], &RenderOptions::default());
        assert!(html.contains("line one<br>line &lt;two&gt; &amp; \"three\""));
        assert!(!html.contains("<two>"));
        assert!(html.contains("href=\"https://x.com/alice/status/1?a=1&amp;b=2\""));
    }

    #[test]
    fn test_media_and_quoted_post() {
        let html = render_snapshot(&full_post(), &[], &RenderOptions::default());
        assert!(html.contains(
            "<img src=\"https://cdn/images/1/media/p.jpg\" width=\"10\" height=\"20\""
        ));
        assert!(html.contains(
            "<video controls loop muted autoplay playsinline poster=\"https://cdn/images/1/media/g.jpg\""
        ));
        assert!(html.contains("<blockquote class=\"quoted\">"));
        assert!(html.contains("@bob"));
        assert!(html.contains("4 views"));
        assert!(html.contains("src=\"https://cdn/images/1/avatar/a_bigger.jpg\""));
    }

    #[test]
    fn test_minimal_post_renders() {
        let html = render_snapshot(&post(json!({"id": "9"})), &[], &RenderOptions::default());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>post 9</title>"));
        assert!(!html.contains("<header>"));
        assert!(!html.contains("<blockquote"));
        assert!(!html.contains("<footer>"));
        assert!(!html.contains("class=\"comments\""));
    }

    #[test]
    fn test_non_web_urls_are_dropped() {
        let p = post(json!({
            "id": "7",
            "author": {"name": "Eve", "screen_name": "eve",
                       "profile_image_url": "javascript:alert(1)"},
            "media": [
                {"type": "photo", "url": "javascript:alert(2)"},
                {"type": "video", "url": "https://cdn/videos/7/v.mp4",
                 "preview_url": "data:text/html,<script>alert(3)</script>"}
            ],
            "url": "JavaScript:alert(4)"
        }));
        let html = render_snapshot(&p, &[], &RenderOptions::default());
        assert!(!html.to_ascii_lowercase().contains("javascript:"));
        assert!(!html.contains("data:text/html"));
        assert!(!html.contains("<img"));
        assert!(!html.contains("poster="));
        assert!(html.contains("src=\"https://cdn/videos/7/v.mp4\""));
        assert!(!html.contains("<footer>"));
    }

    #[test]
    fn test_web_url() {
        assert_eq!(web_url("https://x.com/a"), Some("https://x.com/a"));
        assert_eq!(web_url("http://cdn/p.jpg"), Some("http://cdn/p.jpg"));
        assert_eq!(web_url("javascript:alert(1)"), None);
        assert_eq!(web_url("/relative/path.jpg"), None);
        assert_eq!(web_url(""), None);
    }

    #[test]
    fn test_comments_respect_option() {
        let comments = vec![Comment {
            author: "<script>".into(),
            text: "hi".into(),
            created_at: Some("yesterday".into()),
        }];
        let p = full_post();

        let shown = render_snapshot(&p, &comments, &RenderOptions::default());
        assert!(shown.contains("<ul class=\"comments\">"));
        assert!(shown.contains("&lt;script&gt;"));

        let hidden = render_snapshot(
            &p,
            &comments,
            &RenderOptions {
                include_comments: false,
                theme: Theme::Auto,
            },
        );
        assert!(!hidden.contains("class=\"comments\""));
    }

    #[test]
    fn test_theme_css() {
        let p = full_post();
        let auto = render_snapshot(&p, &[], &RenderOptions::default());
        assert!(auto.contains("prefers-color-scheme: dark"));

        let dark = render_snapshot(
            &p,
            &[],
            &RenderOptions {
                include_comments: true,
                theme: Theme::Dark,
            },
        );
        assert!(dark.contains("#15202b"));
        assert!(!dark.contains("prefers-color-scheme"));
    }
}
