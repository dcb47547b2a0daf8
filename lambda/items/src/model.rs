use aws_sdk_dynamodb::types::AttributeValue;
use serde::Deserialize;
use serde_json::Value;
use shared::store::{CREATED_AT_ATTR, ID_ATTR, PARTITION_ATTR};
use shared::{ApiError, Record};

/// Collection tag every item carries in `pk`.
pub(crate) const ITEM_PARTITION: &str = "ITEM";

pub(crate) const TITLE: &str = "title";
pub(crate) const DESCRIPTION: &str = "description";
pub(crate) const COMPLETED: &str = "completed";
pub(crate) const UPDATED_AT: &str = "updated_at";

/// Body of `POST /items`.
#[derive(Debug, Deserialize)]
pub(crate) struct NewItem {
    title: Option<String>,
    description: Option<String>,
}

/// Body of `PUT /items/{id}`. Unrecognised fields are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ItemPatch {
    title: Option<String>,
    description: Option<String>,
    completed: Option<bool>,
}

fn invalid_json(e: serde_json::Error) -> ApiError {
    ApiError::validation(format!("Invalid JSON: {}", e))
}

impl NewItem {
    pub(crate) fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let new_item: NewItem = serde_json::from_slice(body).map_err(invalid_json)?;
        match new_item.title.as_deref() {
            Some(title) if !title.trim().is_empty() => Ok(new_item),
            _ => Err(ApiError::validation("Title is required")),
        }
    }

    /// Full record for a fresh item with the given identity and timestamp.
    pub(crate) fn into_record(self, id: String, now: String) -> Record {
        let mut item = Record::new();
        item.insert(ID_ATTR.to_string(), AttributeValue::S(id));
        item.insert(
            PARTITION_ATTR.to_string(),
            AttributeValue::S(ITEM_PARTITION.to_string()),
        );
        item.insert(
            TITLE.to_string(),
            AttributeValue::S(self.title.unwrap_or_default()),
        );
        item.insert(
            DESCRIPTION.to_string(),
            AttributeValue::S(self.description.unwrap_or_default()),
        );
        item.insert(COMPLETED.to_string(), AttributeValue::Bool(false));
        item.insert(CREATED_AT_ATTR.to_string(), AttributeValue::S(now.clone()));
        item.insert(UPDATED_AT.to_string(), AttributeValue::S(now));
        item
    }
}

impl ItemPatch {
    pub(crate) fn parse(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::validation("No data provided"));
        }
        let raw: Value = serde_json::from_slice(body).map_err(invalid_json)?;
        match &raw {
            Value::Object(fields) if fields.is_empty() => {
                return Err(ApiError::validation("No data provided"))
            }
            Value::Object(_) => {}
            _ => return Err(ApiError::validation("Request body must be a JSON object")),
        }

        let patch: ItemPatch = serde_json::from_value(raw).map_err(invalid_json)?;
        if matches!(patch.title.as_deref(), Some(title) if title.trim().is_empty()) {
            return Err(ApiError::validation("Title must not be empty"));
        }
        Ok(patch)
    }

    /// Attributes to overwrite, always including a fresh `updated_at`.
    pub(crate) fn into_changes(self, now: String) -> Record {
        let mut changes = Record::new();
        changes.insert(UPDATED_AT.to_string(), AttributeValue::S(now));
        if let Some(title) = self.title {
            changes.insert(TITLE.to_string(), AttributeValue::S(title));
        }
        if let Some(description) = self.description {
            changes.insert(DESCRIPTION.to_string(), AttributeValue::S(description));
        }
        if let Some(completed) = self.completed {
            changes.insert(COMPLETED.to_string(), AttributeValue::Bool(completed));
        }
        changes
    }
}

/// Aggregate over a collection, as served by `GET /items/stats`.
#[derive(Debug, PartialEq, serde::Serialize)]
pub(crate) struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub completion_rate: f64,
}

impl Stats {
    pub(crate) fn from_records(records: &[Record]) -> Self {
        let total = records.len();
        let completed = records
            .iter()
            .filter(|r| matches!(r.get(COMPLETED), Some(AttributeValue::Bool(true))))
            .count();
        let completion_rate = if total > 0 {
            let rate = completed as f64 / total as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate,
        }
    }
}
