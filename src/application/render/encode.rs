use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::domain::request::OutputFormat;

use super::{error::RenderFailure, extract::Artifact};

/// Artifact payload embedded in a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub format: OutputFormat,
    pub mimetype: String,
    /// SVG text as-is, or base64 of the PNG bytes.
    pub content: String,
}

/// Uniform envelope returned for every render outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ImagePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RenderResponse {
    pub fn success(payload: ImagePayload) -> Self {
        Self {
            success: true,
            data: Some(payload),
            message: None,
            details: None,
        }
    }

    pub fn failure(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            details,
        }
    }

    /// Liveness-style acknowledgement carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            details: None,
        }
    }
}

impl From<RenderFailure> for RenderResponse {
    fn from(failure: RenderFailure) -> Self {
        RenderResponse::failure(failure.message, failure.details)
    }
}

/// Package an artifact for the text-only envelope: vector text verbatim, raster bytes
/// as base64.
pub fn encode(artifact: &Artifact, format: OutputFormat) -> ImagePayload {
    let content = match artifact {
        Artifact::Text(text) => text.clone(),
        Artifact::Binary(bytes) => STANDARD.encode(bytes),
    };
    ImagePayload {
        format,
        mimetype: format.mimetype().to_string(),
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::error::ErrorKind;
    use axum::http::StatusCode;

    #[test]
    fn svg_content_is_embedded_verbatim() {
        let svg = "<svg xmlns=\"http://www.w3.org/2000/svg\"/>";
        let payload = encode(&Artifact::Text(svg.to_string()), OutputFormat::Svg);
        assert_eq!(payload.content, svg);
        assert_eq!(payload.mimetype, "image/svg+xml");
    }

    #[test]
    fn png_content_is_base64() {
        let bytes = b"\x89PNG\r\n\x1a\nrest".to_vec();
        let payload = encode(&Artifact::Binary(bytes.clone()), OutputFormat::Png);
        assert_eq!(payload.mimetype, "image/png");
        assert_eq!(STANDARD.decode(&payload.content).expect("base64"), bytes);
    }

    #[test]
    fn success_envelope_omits_failure_fields() {
        let payload = encode(&Artifact::Text("<svg/>".to_string()), OutputFormat::Svg);
        let json = serde_json::to_value(RenderResponse::success(payload)).expect("json");
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "data": {
                    "format": "svg",
                    "mimetype": "image/svg+xml",
                    "content": "<svg/>"
                }
            })
        );
    }

    #[test]
    fn failure_envelope_carries_message_and_details() {
        let failure = RenderFailure {
            kind: ErrorKind::Compilation,
            status: StatusCode::BAD_REQUEST,
            message: "LaTeX compilation failed. Check your LaTeX syntax.".to_string(),
            details: Some("Stderr: boom".to_string()),
        };
        let json = serde_json::to_value(RenderResponse::from(failure)).expect("json");
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["details"], "Stderr: boom");
    }
}
