use chrono::{DateTime, Utc};
use project::{GenerationResult, ResultSource};
use serde::Deserialize;
use sse::StreamFrame;

/// Domain view of one stream frame, decoded at the framing boundary
/// so nothing downstream branches on raw event-name strings.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Result(ResultPayload),
    Error(ErrorPayload),
    Done,
    /// Forward-compatible no-op for event names we do not know.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultPayload {
    pub id: String,
    #[serde(alias = "image_url")]
    pub image: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl ResultPayload {
    pub fn into_result(self, source: ResultSource) -> GenerationResult {
        GenerationResult {
            id: self.id,
            image: self.image,
            description: self.description,
            created_at: self.created_at,
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl GenerationEvent {
    /// Decoding only fails for a malformed `result` payload; an
    /// `error` frame with an unreadable body still terminates the
    /// session, just with a generic message.
    pub fn decode(frame: &StreamFrame) -> Result<Self, serde_json::Error> {
        match frame.event.as_str() {
            "result" => Ok(Self::Result(serde_json::from_str(&frame.data)?)),
            "error" => Ok(Self::Error(serde_json::from_str(&frame.data).unwrap_or(
                ErrorPayload {
                    message: "generation failed".to_string(),
                },
            ))),
            "done" => Ok(Self::Done),
            _ => Ok(Self::Unknown),
        }
    }
}
