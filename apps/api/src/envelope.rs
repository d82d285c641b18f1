use serde::Serialize;

use crate::models::creation::CreationRow;

/// Uniform JSON body returned by every action endpoint.
///
/// Success carries `content`; failure carries `message`. Clients branch on
/// `success`, never on the HTTP status.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: Some(content.into()),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            message: Some(message.into()),
        }
    }
}

/// Envelope for the creation listing endpoints.
#[derive(Debug, Serialize)]
pub struct CreationsResponse {
    pub success: bool,
    pub creations: Vec<CreationRow>,
}

impl CreationsResponse {
    pub fn new(creations: Vec<CreationRow>) -> Self {
        Self {
            success: true,
            creations,
        }
    }
}
