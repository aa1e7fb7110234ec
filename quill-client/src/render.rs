//! Tag-to-content rendering.
//!
//! Converts recognized tags in the accumulated response text into
//! structured segments, leaving all other text untouched for a separate
//! markdown pass. The parser tracks open/close delimiter completeness:
//! once a tag's closing delimiter has arrived, the segments before and
//! including it are committed and never re-parsed; the tail after the last
//! complete tag is re-rendered on each update. A tag whose closing
//! delimiter never arrives stays visible as literal markup - that is the
//! documented contract, not an accident of parsing.
//!
//! Rendering depends only on the accumulated buffer, never on how it was
//! chunked during arrival.

use quill_core::TagKind;

/// Contextual call-to-action attached to error banners
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionLink {
    /// Billing/subscription settings
    BillingSettings,
    /// Gemini credential setup
    ConnectGemini,
}

impl ActionLink {
    pub const fn href(&self) -> &'static str {
        match self {
            ActionLink::BillingSettings => "/settings/subscription",
            ActionLink::ConnectGemini => "/connect?service=gemini",
        }
    }

    pub const fn label(&self) -> &'static str {
        "Check Now"
    }
}

/// One structured block of rendered output
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    /// Unrecognized text, handed to the markdown pass verbatim
    Markdown(String),
    /// Generated image card
    Image { url: String },
    /// Web-search result block
    WebSearch { content: String },
    /// Tool-processing indicator, shown with a spinner
    ToolProcessing { message: String },
    /// Error banner with an optional originating-service prefix
    ErrorBanner {
        service: Option<String>,
        message: String,
        action: ActionLink,
    },
}

fn render_tag(kind: TagKind, inner: &str) -> Segment {
    match kind {
        TagKind::Image => Segment::Image {
            url: inner.trim().to_string(),
        },
        TagKind::WebSearch => Segment::WebSearch {
            content: inner.to_string(),
        },
        TagKind::InitTool => Segment::ToolProcessing {
            message: inner.to_string(),
        },
        TagKind::Error => {
            let (service, message) = match inner.split_once(": ") {
                Some((service, message)) => (Some(service.to_string()), message.to_string()),
                None => (None, inner.to_string()),
            };
            Segment::ErrorBanner {
                service,
                message,
                action: ActionLink::BillingSettings,
            }
        }
        TagKind::Gemini => Segment::ErrorBanner {
            service: None,
            message: inner.to_string(),
            action: ActionLink::ConnectGemini,
        },
    }
}

fn push_markdown(text: &str, out: &mut Vec<Segment>) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Markdown(existing)) = out.last_mut() {
        existing.push_str(text);
    } else {
        out.push(Segment::Markdown(text.to_string()));
    }
}

/// Append plain text, honoring `\r` clear markers: each one removes the
/// most recent processing indicator and is dropped from the output.
fn emit_text(text: &str, out: &mut Vec<Segment>) {
    let mut rest = text;
    while let Some(idx) = rest.find('\r') {
        push_markdown(&rest[..idx], out);
        if let Some(pos) = out
            .iter()
            .rposition(|s| matches!(s, Segment::ToolProcessing { .. }))
        {
            out.remove(pos);
        }
        rest = &rest[idx + 1..];
    }
    push_markdown(rest, out);
}

fn find_earliest_open(text: &str) -> Option<(usize, TagKind)> {
    TagKind::ALL
        .iter()
        .filter_map(|kind| text.find(kind.open()).map(|idx| (idx, *kind)))
        .min_by_key(|(idx, _)| *idx)
}

/// Incremental renderer over the accumulated response buffer.
#[derive(Default)]
pub struct TagRenderer {
    buffer: String,
    committed: Vec<Segment>,
    /// Byte offset into `buffer` covered by `committed`
    committed_end: usize,
}

impl TagRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffer with a fresh accumulated snapshot.
    ///
    /// Snapshots grow monotonically during one response; a shorter snapshot
    /// starts a new response and resets the parse state.
    pub fn set_text(&mut self, text: &str) {
        if let Some(suffix) = text.strip_prefix(self.buffer.as_str()) {
            let suffix = suffix.to_string();
            self.push_str(&suffix);
        } else {
            self.buffer.clear();
            self.committed.clear();
            self.committed_end = 0;
            self.push_str(text);
        }
    }

    /// Append newly arrived text and commit any tags it completes.
    pub fn push_str(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        self.advance();
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    fn advance(&mut self) {
        loop {
            let tail = &self.buffer[self.committed_end..];
            let Some((open_idx, kind)) = find_earliest_open(tail) else {
                break;
            };
            let inner_start = open_idx + kind.open().len();
            // An open delimiter without its close is pending: nothing past
            // it can be committed, it may become tag content later.
            let Some(rel_close) = tail[inner_start..].find(kind.close()) else {
                break;
            };
            let close_idx = inner_start + rel_close;

            let (before, inner) = (&tail[..open_idx], &tail[inner_start..close_idx]);
            let segment = render_tag(kind, inner);
            emit_text(before, &mut self.committed);
            self.committed.push(segment);
            self.committed_end += close_idx + kind.close().len();
        }
    }

    /// The structured view of the current buffer. Pending or unterminated
    /// tags appear as literal text.
    pub fn segments(&self) -> Vec<Segment> {
        let mut out = self.committed.clone();
        emit_text(&self.buffer[self.committed_end..], &mut out);
        out
    }
}

/// One-shot rendering of a complete buffer.
pub fn render(text: &str) -> Vec<Segment> {
    let mut renderer = TagRenderer::new();
    renderer.push_str(text);
    renderer.segments()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_has_zero_tags() {
        assert_eq!(
            render("Hi there"),
            vec![Segment::Markdown("Hi there".to_string())]
        );
    }

    #[test]
    fn test_code_fences_stay_untouched() {
        let text = "Use this:\n```rust\nfn main() {}\n```\ndone";
        assert_eq!(render(text), vec![Segment::Markdown(text.to_string())]);
    }

    #[test]
    fn test_image_tag_renders_card() {
        let url = "https://res.cloudinary.com/dmmqpvdnb/image/upload/v1/gen.png";
        let segments = render(&format!("Here you go: <t3-image>{}</t3-image> enjoy", url));
        assert_eq!(
            segments,
            vec![
                Segment::Markdown("Here you go: ".to_string()),
                Segment::Image {
                    url: url.to_string()
                },
                Segment::Markdown(" enjoy".to_string()),
            ]
        );
    }

    #[test]
    fn test_websearch_tag_renders_block() {
        let segments = render("<t3-websearch>1. Rust - rust-lang.org</t3-websearch>");
        assert_eq!(
            segments,
            vec![Segment::WebSearch {
                content: "1. Rust - rust-lang.org".to_string()
            }]
        );
    }

    #[test]
    fn test_error_tag_splits_service_prefix() {
        let segments = render("<t3-error>OpenRouter: Rate limit exceeded</t3-error>");
        assert_eq!(
            segments,
            vec![Segment::ErrorBanner {
                service: Some("OpenRouter".to_string()),
                message: "Rate limit exceeded".to_string(),
                action: ActionLink::BillingSettings,
            }]
        );
    }

    #[test]
    fn test_gemini_tag_links_to_credential_setup() {
        let segments = render("<t3-gemini>Gemini API key is not provided</t3-gemini>");
        match &segments[0] {
            Segment::ErrorBanner {
                message, action, ..
            } => {
                assert_eq!(message, "Gemini API key is not provided");
                assert_eq!(action.href(), "/connect?service=gemini");
            }
            other => panic!("expected banner, got {:?}", other),
        }
    }

    #[test]
    fn test_pending_tag_stays_literal_until_closed() {
        let mut renderer = TagRenderer::new();
        renderer.push_str("wait <t3-image>https://example.com/a.pn");
        assert_eq!(
            renderer.segments(),
            vec![Segment::Markdown(
                "wait <t3-image>https://example.com/a.pn".to_string()
            )]
        );

        renderer.push_str("g</t3-image>");
        assert_eq!(
            renderer.segments(),
            vec![
                Segment::Markdown("wait ".to_string()),
                Segment::Image {
                    url: "https://example.com/a.png".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_unterminated_tag_stays_literal_at_stream_end() {
        // Documented contract: truncated streams leave raw markup visible
        let segments = render("done <t3-websearch>half of the resul");
        assert_eq!(
            segments,
            vec![Segment::Markdown(
                "done <t3-websearch>half of the resul".to_string()
            )]
        );
    }

    #[test]
    fn test_clear_marker_removes_processing_indicator() {
        let text = "\n\n<t3-init-tool>Searching web...</t3-init-tool>\n\n\rThe answer is 42.";
        let segments = render(text);
        assert!(!segments
            .iter()
            .any(|s| matches!(s, Segment::ToolProcessing { .. })));
        assert_eq!(
            segments.last(),
            Some(&Segment::Markdown("\n\n\n\nThe answer is 42.".to_string()))
        );
    }

    #[test]
    fn test_indicator_visible_before_clear_marker_arrives() {
        let mut renderer = TagRenderer::new();
        renderer.push_str("\n\n<t3-init-tool>Generating image...</t3-init-tool>\n\n");
        assert!(renderer
            .segments()
            .iter()
            .any(|s| matches!(s, Segment::ToolProcessing { .. })));

        renderer.push_str("\r");
        assert!(!renderer
            .segments()
            .iter()
            .any(|s| matches!(s, Segment::ToolProcessing { .. })));
    }

    #[test]
    fn test_surplus_clear_marker_is_noop() {
        let segments = render("a\r\rb");
        assert_eq!(segments, vec![Segment::Markdown("ab".to_string())]);
    }

    #[test]
    fn test_chunking_invariance_over_all_two_way_splits() {
        let text = "intro <t3-init-tool>Searching web...</t3-init-tool>\r<t3-websearch>Rust - rust-lang.org</t3-websearch> and <t3-image>https://e.com/x.png</t3-image> outro <t3-error>Gemini AI: API quota exceeded</t3-error> tail";
        let expected = render(text);

        for (split, _) in text.char_indices() {
            let mut renderer = TagRenderer::new();
            renderer.push_str(&text[..split]);
            renderer.push_str(&text[split..]);
            assert_eq!(renderer.segments(), expected, "split at byte {}", split);
        }
    }

    #[test]
    fn test_chunking_invariance_char_by_char() {
        let text = "a <t3-gemini>key missing</t3-gemini> b <t3-image>u</t3-image>";
        let expected = render(text);

        let mut renderer = TagRenderer::new();
        for ch in text.chars() {
            renderer.push_str(&ch.to_string());
        }
        assert_eq!(renderer.segments(), expected);
    }

    #[test]
    fn test_set_text_with_growing_snapshots() {
        let mut renderer = TagRenderer::new();
        renderer.set_text("Hi ");
        renderer.set_text("Hi there <t3-image>u</t3-image>");
        assert_eq!(
            renderer.segments(),
            vec![
                Segment::Markdown("Hi there ".to_string()),
                Segment::Image {
                    url: "u".to_string()
                },
            ]
        );

        // A non-prefix snapshot resets state for a new response
        renderer.set_text("fresh");
        assert_eq!(
            renderer.segments(),
            vec![Segment::Markdown("fresh".to_string())]
        );
    }

    #[test]
    fn test_multiple_tags_same_kind() {
        let segments = render("<t3-image>a</t3-image><t3-image>b</t3-image>");
        assert_eq!(
            segments,
            vec![
                Segment::Image {
                    url: "a".to_string()
                },
                Segment::Image {
                    url: "b".to_string()
                },
            ]
        );
    }
}
