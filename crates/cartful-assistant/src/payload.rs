//! Inbound turn payloads.
//!
//! The upstream channel adapter is loose about shape: a turn may arrive
//! as a structured record, a bare string, or a single-element list
//! wrapping either. Parsing tolerates all three and falls back to
//! alternate field names used by older adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cartful_core::error::{CartfulError, Result};

/// What kind of turn this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionTag {
    #[serde(rename = "TEXT_MESSAGE")]
    TextMessage,
    #[serde(rename = "PROCESS_IMAGE")]
    ProcessImage,
    #[serde(other)]
    Unknown,
}

/// Reference to externally stored media.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    pub bucket: String,
    pub key: String,
}

/// One inbound conversational turn.
#[derive(Debug, Clone)]
pub struct InvocationPayload {
    pub customer_id: String,
    pub action: ActionTag,
    pub message: Option<String>,
    pub grocery_items: Vec<String>,
    pub media: Option<MediaRef>,
    pub instruction: Option<String>,
}

impl InvocationPayload {
    /// Convenience constructor for a plain text turn.
    pub fn text(customer_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            action: ActionTag::TextMessage,
            message: Some(message.into()),
            grocery_items: Vec::new(),
            media: None,
            instruction: None,
        }
    }

    /// Parse a payload from whatever shape the channel adapter sent.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self::text("unknown", s.clone())),
            // Some adapters wrap the record in a single-element list.
            Value::Array(items) => match items.first() {
                Some(inner) => Self::from_value(inner),
                None => Err(CartfulError::Payload("empty payload list".into())),
            },
            Value::Object(_) => Self::from_object(value),
            other => Err(CartfulError::Payload(format!(
                "unsupported payload shape: {}",
                type_name(other)
            ))),
        }
    }

    fn from_object(value: &Value) -> Result<Self> {
        let customer_id = str_field(value, &["customer_id", "customerId", "from"])
            .unwrap_or("unknown")
            .to_string();

        let action = value
            .get("action")
            .cloned()
            .map(serde_json::from_value::<ActionTag>)
            .transpose()
            .map_err(|e| CartfulError::Payload(format!("bad action tag: {}", e)))?
            .unwrap_or(ActionTag::TextMessage);

        let message = str_field(value, &["message", "prompt", "inputText"]).map(str::to_string);

        let grocery_items: Vec<String> = value
            .get("grocery_items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let media = match (
            str_field(value, &["s3_bucket", "bucket"]),
            str_field(value, &["s3_key", "key"]),
        ) {
            (Some(bucket), Some(key)) => Some(MediaRef {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => None,
        };

        let instruction = str_field(value, &["instruction"]).map(str::to_string);

        if message.is_none() && grocery_items.is_empty() && media.is_none() {
            return Err(CartfulError::Payload(
                "payload carries neither message, items, nor media".into(),
            ));
        }

        Ok(Self {
            customer_id,
            action,
            message,
            grocery_items,
            media,
            instruction,
        })
    }

    /// Build the prompt handed to the entry node, folding in carried
    /// context from a prior turn when present.
    pub fn build_initial_prompt(&self, carried_context: Option<&str>) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!("Customer id: {}\n", self.customer_id));

        if let Some(context) = carried_context {
            if !context.is_empty() {
                prompt.push_str(&format!("Earlier in this session:\n{}\n\n", context));
            }
        }

        match self.action {
            ActionTag::ProcessImage => {
                prompt.push_str("The customer sent an image of a grocery list. route_to_image\n");
                if let Some(media) = &self.media {
                    prompt.push_str(&format!("Media: {}/{}\n", media.bucket, media.key));
                }
            }
            ActionTag::TextMessage | ActionTag::Unknown => {}
        }

        if !self.grocery_items.is_empty() {
            prompt.push_str(&format!(
                "Extracted grocery items: {}\n",
                self.grocery_items.join(", ")
            ));
        }

        if let Some(instruction) = &self.instruction {
            prompt.push_str(&format!("{}\n", instruction));
        }

        if let Some(message) = &self.message {
            prompt.push_str(&format!("Customer message: {}", message));
        }

        prompt.trim_end().to_string()
    }
}

fn str_field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|n| value.get(n).and_then(Value::as_str))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
