use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Listener feedback on a set of recommendations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "genero", default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    /// 1..=5 from the UI; anything not positive is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub items: Vec<FeedbackItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: String,
    #[serde(rename = "titulo", default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
}

impl FeedbackItem {
    pub fn vote(id: impl Into<String>, liked: Option<bool>) -> Self {
        Self {
            id: id.into(),
            liked,
            ..Default::default()
        }
    }
}

fn bool_field(object: &Value, name: &str) -> Option<bool> {
    object.get(name).and_then(Value::as_bool)
}

impl FeedbackPayload {
    /// Payload tagged with a fresh session id.
    pub fn new_session() -> Self {
        Self {
            session_id: Some(uuid::Uuid::new_v4().simple().to_string()),
            ..Default::default()
        }
    }

    /// Lenient reading of an untrusted feedback body.
    ///
    /// Fields of the wrong JSON type are treated as absent, ratings must be
    /// integers that fit in an `i32`, and items with a blank id are dropped.
    /// Returns `None` when the root is not an object.
    pub fn from_json(root: &Value) -> Option<Self> {
        if !root.is_object() {
            return None;
        }

        let rating = root
            .get("rating")
            .and_then(Value::as_i64)
            .and_then(|r| i32::try_from(r).ok());

        let items = root
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let id = item.get("id").and_then(Value::as_str)?;
                        if id.trim().is_empty() {
                            return None;
                        }
                        Some(FeedbackItem {
                            id: id.to_string(),
                            title: item
                                .get("titulo")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            liked: bool_field(item, "liked"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            session_id: root
                .get("sessionId")
                .and_then(Value::as_str)
                .map(str::to_string),
            genre: root.get("genero").and_then(Value::as_str).map(str::to_string),
            liked: bool_field(root, "liked"),
            rating,
            comment: root
                .get("comment")
                .and_then(Value::as_str)
                .map(str::to_string),
            items,
        })
    }
}
