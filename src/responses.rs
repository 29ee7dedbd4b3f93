//! JSON envelopes for API responses.
//!
//! Every envelope wraps its body in a `response` field (`responseBody` for
//! [`DynamicResponse`]), with camelCase member names:
//!
//! ```rust
//! use db_access::responses::ErrorResponse;
//!
//! let json = serde_json::to_value(ErrorResponse::new(404, "not found")).unwrap();
//! assert_eq!(json, serde_json::json!({"response": {"code": 404, "message": "not found"}}));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An arbitrary JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicResponse {
    pub response_body: JsonValue,
}

impl DynamicResponse {
    #[must_use]
    pub fn new(data: impl Into<JsonValue>) -> Self {
        Self {
            response_body: data.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponseBody {
    pub code: i16,
    /// The message to show the caller.
    pub message: String,
}

/// The response sent when a request failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub response: ErrorResponseBody,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(code: i16, message: impl Into<String>) -> Self {
        Self {
            response: ErrorResponseBody {
                code,
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponseBody<T> {
    pub message: String,
    pub data: T,
}

/// A message and one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse<T> {
    pub response: ModelResponseBody<T>,
}

impl<T> ModelResponse<T> {
    #[must_use]
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            response: ModelResponseBody {
                message: message.into(),
                data,
            },
        }
    }
}

/// Older name of [`ModelResponse`].
pub type BaseResponse<T> = ModelResponse<T>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelListResponseBody<T> {
    pub message: String,
    pub model_list: Vec<T>,
}

/// A message and a list of models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelListResponse<T> {
    pub response: ModelListResponseBody<T>,
}

impl<T> ModelListResponse<T> {
    #[must_use]
    pub fn new(message: impl Into<String>, model_list: impl IntoIterator<Item = T>) -> Self {
        Self {
            response: ModelListResponseBody {
                message: message.into(),
                model_list: model_list.into_iter().collect(),
            },
        }
    }
}
