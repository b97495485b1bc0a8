//! Wire types shared between the Letterbox archive API and its clients.
//!
//! Every successful read is wrapped in an [`Envelope`]; failed requests carry an
//! [`ErrorBody`]. Field names follow the API's camelCase JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response wrapper for reads. List reads may carry a pagination cursor.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T = Value> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<String>,
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Letter {
    pub letter_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correspondence_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub recipient_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
}

/// A correspondence with the letters and recipients embedded in its detail view.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Correspondence {
    pub correspondence_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub letters: Vec<Letter>,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}
