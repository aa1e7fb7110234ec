//! Failure classification
//!
//! Upstream SDKs and HTTP services fail with loosely-typed errors. Every
//! external-call boundary normalizes its failure into a [`RawFailure`] and
//! [`classify`] maps that to one member of a closed taxonomy. Classification
//! is pure and total: it always returns a value and never fails itself,
//! which keeps the stream encoder free of provider-specific branching.

use serde::{Deserialize, Serialize};

/// Originating service, used to tag error output shown to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    OpenRouter,
    Gemini,
    Cloudinary,
    Tavily,
    System,
    Authentication,
}

impl Service {
    /// Human-readable name rendered inside error tags
    pub const fn as_str(&self) -> &'static str {
        match self {
            Service::OpenRouter => "OpenRouter",
            Service::Gemini => "Gemini AI",
            Service::Cloudinary => "Cloudinary",
            Service::Tavily => "Tavily Search",
            Service::System => "System",
            Service::Authentication => "Authentication",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Service {
    fn default() -> Self {
        Service::System
    }
}

/// Closed failure taxonomy. Every upstream or tool failure maps to exactly
/// one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Credential,
    RateLimit,
    InsufficientCredits,
    Payment,
    QuotaExceeded,
    Network,
    Timeout,
    Validation,
    SafetyPolicy,
    ModelUnavailable,
    ToolService,
    Unknown,
}

/// A failure as observed at an external-call boundary, before classification
#[derive(Clone, Debug, Default)]
pub struct RawFailure {
    pub message: String,
    pub status: Option<u16>,
    pub code: Option<String>,
    /// The service the failed call was addressed to, when the caller knows it
    pub service_hint: Option<Service>,
    /// Service attributed to failures no rule claims
    pub default_service: Service,
}

impl RawFailure {
    pub fn new(message: impl Into<String>) -> Self {
        RawFailure {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_service_hint(mut self, service: Service) -> Self {
        self.service_hint = Some(service);
        self
    }

    pub fn with_default_service(mut self, service: Service) -> Self {
        self.default_service = service;
        self
    }

    pub fn from_error(error: &anyhow::Error) -> Self {
        RawFailure::new(format!("{:#}", error))
    }
}

/// The classification result: one taxonomy member, the service it is
/// attributed to, a short actionable message, and an HTTP-ish status code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub service: Service,
    pub user_message: String,
    pub status_code: u16,
}

impl ClassifiedError {
    pub fn new(
        kind: ErrorKind,
        service: Service,
        user_message: impl Into<String>,
        status_code: u16,
    ) -> Self {
        ClassifiedError {
            kind,
            service,
            user_message: user_message.into(),
            status_code,
        }
    }

    /// Missing-credential failure raised before any network call
    pub fn authentication(user_message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Authentication,
            Service::Authentication,
            user_message,
            401,
        )
    }

    /// Malformed-request failure raised during validation
    pub fn validation(user_message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, Service::System, user_message, 400)
    }

    /// The in-band tag form of this error
    pub fn error_tag(&self) -> String {
        crate::tags::error_tag(self.service, &self.user_message)
    }
}

fn classify_gemini(message: &str, status: Option<u16>) -> ClassifiedError {
    if message.contains("api key") || message.contains("unauthorized") || status == Some(401) {
        return ClassifiedError::new(
            ErrorKind::Credential,
            Service::Gemini,
            "Invalid or missing API key",
            401,
        );
    }
    if message.contains("quota") || message.contains("limit") || status == Some(429) {
        return ClassifiedError::new(
            ErrorKind::QuotaExceeded,
            Service::Gemini,
            "API quota exceeded",
            429,
        );
    }
    if message.contains("safety") || message.contains("content policy") {
        return ClassifiedError::new(
            ErrorKind::SafetyPolicy,
            Service::Gemini,
            "Content violates safety guidelines",
            400,
        );
    }
    if message.contains("model") || message.contains("not found") {
        return ClassifiedError::new(
            ErrorKind::ModelUnavailable,
            Service::Gemini,
            "Model not found or unavailable",
            status.unwrap_or(404),
        );
    }
    ClassifiedError::new(
        ErrorKind::Unknown,
        Service::Gemini,
        "Service error occurred",
        status.unwrap_or(500),
    )
}

fn classify_openrouter(message: &str, status: Option<u16>) -> ClassifiedError {
    if message.contains("insufficient credits")
        || message.contains("credit limit")
        || message.contains("credits")
    {
        return ClassifiedError::new(
            ErrorKind::InsufficientCredits,
            Service::OpenRouter,
            "Insufficient credits in your account",
            402,
        );
    }
    if message.contains("payment") || message.contains("billing") || status == Some(402) {
        return ClassifiedError::new(
            ErrorKind::Payment,
            Service::OpenRouter,
            "Payment required or billing issue",
            402,
        );
    }
    if message.contains("rate limit") || status == Some(429) {
        return ClassifiedError::new(
            ErrorKind::RateLimit,
            Service::OpenRouter,
            "Rate limit exceeded",
            429,
        );
    }
    if message.contains("api key") || message.contains("unauthorized") || status == Some(401) {
        return ClassifiedError::new(
            ErrorKind::Credential,
            Service::OpenRouter,
            "Invalid or missing API key",
            401,
        );
    }
    if message.contains("model") || message.contains("not found") || status == Some(404) {
        return ClassifiedError::new(
            ErrorKind::ModelUnavailable,
            Service::OpenRouter,
            "Model not found or unavailable",
            404,
        );
    }
    ClassifiedError::new(
        ErrorKind::Unknown,
        Service::OpenRouter,
        "Service error occurred",
        status.unwrap_or(500),
    )
}

/// Map a raw failure to the closed taxonomy.
///
/// Rule priority: the hinted service's keyword/status rules first, then
/// transport-level rules, then generic authentication detection, then
/// `Unknown`. Deterministic for any given input.
pub fn classify(failure: &RawFailure) -> ClassifiedError {
    let message = failure.message.to_lowercase();
    let status = failure.status;
    let code = failure.code.as_deref().unwrap_or("");

    match failure.service_hint {
        Some(Service::Gemini) => return classify_gemini(&message, status),
        Some(Service::OpenRouter) => return classify_openrouter(&message, status),
        Some(service @ (Service::Tavily | Service::Cloudinary)) => {
            return ClassifiedError::new(
                ErrorKind::ToolService,
                service,
                if failure.message.is_empty() {
                    "Service error occurred".to_string()
                } else {
                    failure.message.clone()
                },
                status.unwrap_or(500),
            );
        }
        _ => {}
    }

    // Transport-level failures, relevant for any service
    if message.contains("network") || message.contains("econnrefused") || code == "ECONNREFUSED" {
        return ClassifiedError::new(
            ErrorKind::Network,
            failure.default_service,
            "Network connection failed",
            503,
        );
    }
    if message.contains("timeout") || message.contains("timed out") || code == "ECONNABORTED" {
        return ClassifiedError::new(
            ErrorKind::Timeout,
            failure.default_service,
            "Request timeout",
            408,
        );
    }

    if message.contains("authentication") || message.contains("forbidden") || status == Some(403) {
        return ClassifiedError::new(
            ErrorKind::Authentication,
            Service::Authentication,
            "Authentication failed",
            403,
        );
    }

    ClassifiedError::new(
        ErrorKind::Unknown,
        failure.default_service,
        if failure.message.is_empty() {
            "An unexpected error occurred".to_string()
        } else {
            failure.message.clone()
        },
        status.unwrap_or(500),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_api_key_error() {
        let failure = RawFailure::new("API key not valid").with_service_hint(Service::Gemini);
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::Credential);
        assert_eq!(classified.service, Service::Gemini);
        assert_eq!(classified.status_code, 401);
    }

    #[test]
    fn test_gemini_quota_by_status() {
        let failure = RawFailure::new("resource exhausted")
            .with_status(429)
            .with_service_hint(Service::Gemini);
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::QuotaExceeded);
        assert_eq!(classified.user_message, "API quota exceeded");
    }

    #[test]
    fn test_gemini_safety() {
        let failure =
            RawFailure::new("Blocked by safety settings").with_service_hint(Service::Gemini);
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::SafetyPolicy);
        assert_eq!(classified.status_code, 400);
    }

    #[test]
    fn test_openrouter_credits() {
        let failure = RawFailure::new("Insufficient credits to complete request")
            .with_service_hint(Service::OpenRouter);
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::InsufficientCredits);
        assert_eq!(classified.status_code, 402);
    }

    #[test]
    fn test_openrouter_rate_limit_beats_generic() {
        let failure = RawFailure::new("rate limit exceeded, retry later")
            .with_status(429)
            .with_service_hint(Service::OpenRouter);
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::RateLimit);
    }

    #[test]
    fn test_openrouter_generic_keeps_service_attribution() {
        let failure = RawFailure::new("internal server error")
            .with_status(500)
            .with_service_hint(Service::OpenRouter);
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::Unknown);
        assert_eq!(classified.service, Service::OpenRouter);
    }

    #[test]
    fn test_tool_service_errors() {
        let failure = RawFailure::new("Tavily authentication failed: Invalid API key")
            .with_service_hint(Service::Tavily);
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::ToolService);
        assert_eq!(classified.service, Service::Tavily);
    }

    #[test]
    fn test_network_without_hint() {
        let failure = RawFailure::new("network unreachable");
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::Network);
        assert_eq!(classified.service, Service::System);
        assert_eq!(classified.status_code, 503);
    }

    #[test]
    fn test_timeout_by_code() {
        let failure = RawFailure::new("request aborted").with_code("ECONNABORTED");
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::Timeout);
        assert_eq!(classified.status_code, 408);
    }

    #[test]
    fn test_auth_fallback() {
        let failure = RawFailure::new("forbidden").with_status(403);
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::Authentication);
        assert_eq!(classified.service, Service::Authentication);
    }

    #[test]
    fn test_unknown_preserves_message() {
        let failure = RawFailure::new("something odd happened");
        let classified = classify(&failure);
        assert_eq!(classified.kind, ErrorKind::Unknown);
        assert_eq!(classified.user_message, "something odd happened");
        assert_eq!(classified.status_code, 500);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let cases = [
            RawFailure::new("api key missing").with_service_hint(Service::Gemini),
            RawFailure::new("billing problem").with_service_hint(Service::OpenRouter),
            RawFailure::new("network down"),
            RawFailure::new("weird"),
        ];

        for failure in &cases {
            let first = classify(failure);
            for _ in 0..10 {
                assert_eq!(classify(failure), first);
            }
        }
    }

    #[test]
    fn test_error_tag_format() {
        let classified = ClassifiedError::authentication(
            "Please log in and configure your OpenRouter API key",
        );
        assert_eq!(
            classified.error_tag(),
            "<t3-error>Authentication: Please log in and configure your OpenRouter API key</t3-error>"
        );
    }
}
