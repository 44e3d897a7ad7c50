//! Data models for the promotion code generator
//!
//! This module defines the generation request submitted by the browser, the
//! in-memory batch of generated codes, and the JSON messages exchanged over
//! the WebSocket connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Request payload for a generation job
///
/// # Example
/// ```json
/// {
///   "coupon": "SUMMER25",
///   "count": 10,
///   "prefix": "SUM",
///   "minimumAmount": "5000",
///   "minimumAmountCurrency": "eur",
///   "user": "Xavier"
/// }
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Stripe coupon ID the promotion codes are minted against
    pub coupon: String,

    /// Number of codes to generate; blank or negative input means none
    #[serde(default, deserialize_with = "count_or_zero")]
    pub count: u64,

    /// Optional code prefix; when absent Stripe chooses the code
    #[serde(default, deserialize_with = "optional_text")]
    pub prefix: Option<String>,

    /// Minimum order amount in minor units, as typed in the form
    #[serde(default, deserialize_with = "optional_text")]
    pub minimum_amount: Option<String>,

    /// Currency of the minimum amount (e.g. "eur")
    #[serde(default, deserialize_with = "optional_text")]
    pub minimum_amount_currency: Option<String>,

    /// Operator who requested the batch, written into every export row
    #[serde(default)]
    pub user: String,
}

/// Codes generated within one job, waiting to be exported
#[derive(Debug, Clone)]
pub struct CodeBatch {
    pub codes: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub user: String,
}

impl CodeBatch {
    pub fn new(generated_at: DateTime<Utc>, user: impl Into<String>) -> Self {
        Self {
            codes: Vec::new(),
            generated_at,
            user: user.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Messages sent by the browser client
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    StartGeneration(GenerationRequest),
    CancelGeneration,
}

/// Messages sent to the browser client
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    ProgressUpdate {
        generated: u64,
        total: u64,
    },
    PartialFileGenerated {
        file_contents: String,
        file_name: String,
    },
    /// `file_contents` is null when the job ended with nothing left to export
    GenerationComplete {
        file_contents: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
    GenerationCancelled,
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// Form inputs arrive either as JSON numbers or as the raw input string
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

/// A cleared or negative count field runs zero iterations
fn count_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let n = match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) => n,
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => 0,
        Some(NumberOrString::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom)?,
        None => 0,
    };
    Ok(n.max(0) as u64)
}

/// Empty strings, null and missing fields all count as "not provided"
fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(match value {
        Some(NumberOrString::Number(n)) => Some(n.to_string()),
        Some(NumberOrString::Text(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start_generation() {
        let raw = json!({
            "type": "START_GENERATION",
            "payload": {
                "coupon": "SUMMER25",
                "count": "12",
                "prefix": "",
                "minimumAmount": 5000,
                "minimumAmountCurrency": "eur",
                "user": "Ilan"
            }
        });

        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        let ClientMessage::StartGeneration(req) = msg else {
            panic!("expected START_GENERATION");
        };
        assert_eq!(req.coupon, "SUMMER25");
        assert_eq!(req.count, 12);
        assert_eq!(req.prefix, None);
        assert_eq!(req.minimum_amount.as_deref(), Some("5000"));
        assert_eq!(req.minimum_amount_currency.as_deref(), Some("eur"));
        assert_eq!(req.user, "Ilan");
    }

    #[test]
    fn test_parse_cancel_generation() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"CANCEL_GENERATION"}"#).unwrap();
        assert_eq!(msg, ClientMessage::CancelGeneration);
    }

    #[test]
    fn test_blank_or_negative_count_is_zero() {
        for count in [json!(""), json!("  "), json!(-3), json!("-3"), json!(null)] {
            let raw = json!({
                "type": "START_GENERATION",
                "payload": { "coupon": "SUMMER25", "count": count, "user": "Ilan" }
            });
            let msg: ClientMessage = serde_json::from_value(raw).unwrap();
            let ClientMessage::StartGeneration(req) = msg else {
                panic!("expected START_GENERATION");
            };
            assert_eq!(req.count, 0, "count input {count}");
        }

        let raw = json!({"type": "START_GENERATION", "payload": {"coupon": "SUMMER25"}});
        let ClientMessage::StartGeneration(req) = serde_json::from_value::<ClientMessage>(raw).unwrap()
        else {
            panic!("expected START_GENERATION");
        };
        assert_eq!(req.count, 0);
    }

    #[test]
    fn test_non_numeric_count_fails() {
        let raw = json!({
            "type": "START_GENERATION",
            "payload": { "coupon": "SUMMER25", "count": "ten" }
        });
        assert!(serde_json::from_value::<ClientMessage>(raw).is_err());
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"SHUTDOWN"}"#).is_err());
    }

    #[test]
    fn test_server_message_wire_format() {
        let progress = serde_json::to_value(ServerMessage::ProgressUpdate {
            generated: 3,
            total: 10,
        })
        .unwrap();
        assert_eq!(
            progress,
            json!({"type": "PROGRESS_UPDATE", "payload": {"generated": 3, "total": 10}})
        );

        let partial = serde_json::to_value(ServerMessage::PartialFileGenerated {
            file_contents: "UEsDBA==".into(),
            file_name: "promo-codes-part-1-2026-10-19.xlsx".into(),
        })
        .unwrap();
        assert_eq!(partial["type"], "PARTIAL_FILE_GENERATED");
        assert_eq!(partial["payload"]["fileContents"], "UEsDBA==");
        assert_eq!(partial["payload"]["fileName"], "promo-codes-part-1-2026-10-19.xlsx");

        let empty = serde_json::to_value(ServerMessage::GenerationComplete {
            file_contents: None,
            file_name: None,
        })
        .unwrap();
        assert_eq!(
            empty,
            json!({"type": "GENERATION_COMPLETE", "payload": {"fileContents": null}})
        );

        let cancelled = serde_json::to_value(ServerMessage::GenerationCancelled).unwrap();
        assert_eq!(cancelled, json!({"type": "GENERATION_CANCELLED"}));

        let error = serde_json::to_value(ServerMessage::error("No such coupon")).unwrap();
        assert_eq!(
            error,
            json!({"type": "ERROR", "payload": {"message": "No such coupon"}})
        );
    }
}
