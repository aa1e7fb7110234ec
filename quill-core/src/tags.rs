//! The in-band tag vocabulary.
//!
//! Structured content travels inside the plain-text response body as
//! fixed-delimiter tags. The server builds them here; the client renderer
//! recognizes exactly this closed set.

use crate::error::Service;

/// Closed set of recognized tags
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    /// Hosted URL of a generated image
    Image,
    /// Pre-formatted web search results
    WebSearch,
    /// Tool-processing indicator, rendered with a spinner
    InitTool,
    /// Error banner, "Service: message", linked to billing settings
    Error,
    /// Gemini-specific error banner, linked to credential setup
    Gemini,
}

impl TagKind {
    pub const ALL: [TagKind; 5] = [
        TagKind::Image,
        TagKind::WebSearch,
        TagKind::InitTool,
        TagKind::Error,
        TagKind::Gemini,
    ];

    pub const fn open(&self) -> &'static str {
        match self {
            TagKind::Image => "<t3-image>",
            TagKind::WebSearch => "<t3-websearch>",
            TagKind::InitTool => "<t3-init-tool>",
            TagKind::Error => "<t3-error>",
            TagKind::Gemini => "<t3-gemini>",
        }
    }

    pub const fn close(&self) -> &'static str {
        match self {
            TagKind::Image => "</t3-image>",
            TagKind::WebSearch => "</t3-websearch>",
            TagKind::InitTool => "</t3-init-tool>",
            TagKind::Error => "</t3-error>",
            TagKind::Gemini => "</t3-gemini>",
        }
    }
}

/// Error tag shown as a banner: `<t3-error>Service: message</t3-error>`
pub fn error_tag(service: Service, message: &str) -> String {
    format!(
        "{}{}: {}{}",
        TagKind::Error.open(),
        service,
        message,
        TagKind::Error.close()
    )
}

/// Tool-processing tag: `<t3-init-tool>message</t3-init-tool>`
pub fn info_tag(message: &str) -> String {
    format!(
        "{}{}{}",
        TagKind::InitTool.open(),
        message,
        TagKind::InitTool.close()
    )
}

/// Image result tag wrapping the hosted URL byte-for-byte
pub fn image_tag(url: &str) -> String {
    format!("{}{}{}", TagKind::Image.open(), url, TagKind::Image.close())
}

/// Gemini failure tag: `<t3-gemini>message</t3-gemini>`
pub fn gemini_tag(message: &str) -> String {
    format!(
        "{}{}{}",
        TagKind::Gemini.open(),
        message,
        TagKind::Gemini.close()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiters_are_fixed() {
        assert_eq!(TagKind::Image.open(), "<t3-image>");
        assert_eq!(TagKind::Image.close(), "</t3-image>");
        assert_eq!(TagKind::WebSearch.open(), "<t3-websearch>");
        assert_eq!(TagKind::InitTool.open(), "<t3-init-tool>");
        assert_eq!(TagKind::Error.open(), "<t3-error>");
        assert_eq!(TagKind::Gemini.open(), "<t3-gemini>");
    }

    #[test]
    fn test_error_tag_includes_service_name() {
        assert_eq!(
            error_tag(Service::Tavily, "Rate limit exceeded"),
            "<t3-error>Tavily Search: Rate limit exceeded</t3-error>"
        );
    }

    #[test]
    fn test_image_tag_preserves_url_bytes() {
        let url = "https://res.cloudinary.com/dmmqpvdnb/image/upload/v1/abc%20def.png";
        assert_eq!(
            image_tag(url),
            format!("<t3-image>{}</t3-image>", url)
        );
    }
}
