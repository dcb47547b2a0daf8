//! Storage seam.
//!
//! Handlers talk to a [`Table`]: point operations addressed by `id`, and one
//! chronological range query over the `pk`/`created_at` index. [`DynamoTable`] is
//! the production implementation; tests use `memory::MemoryTable`.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use tracing::debug;

use crate::config::Config;
use crate::error::StoreError;

/// One stored item, attribute name to value.
pub type Record = HashMap<String, AttributeValue>;

/// Primary key attribute.
pub const ID_ATTR: &str = "id";
/// Index partition attribute holding the constant collection tag.
pub const PARTITION_ATTR: &str = "pk";
/// Index sort attribute.
pub const CREATED_AT_ATTR: &str = "created_at";

#[async_trait]
pub trait Table: Send + Sync {
    /// Point lookup by `id`.
    async fn get(&self, id: &str) -> Result<Option<Record>, StoreError>;

    /// Unconditional write of a full record.
    async fn put(&self, record: Record) -> Result<(), StoreError>;

    /// Overwrite the given attributes of an existing record.
    ///
    /// Returns the full record after the update, or `None` if no record with this
    /// `id` exists. Never creates a record.
    async fn update(&self, id: &str, changes: Record) -> Result<Option<Record>, StoreError>;

    /// Delete an existing record. Returns `false` if there was nothing to delete.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Records of one collection, newest first, optionally capped at `limit`.
    async fn query_partition(
        &self,
        partition: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Table status as reported by the storage service, e.g. `ACTIVE`.
    async fn status(&self) -> Result<String, StoreError>;
}

/// DynamoDB-backed [`Table`].
///
/// Built once per process and shared by reference across invocations.
#[derive(Clone)]
pub struct DynamoTable {
    client: Client,
    table_name: String,
    index_name: String,
}

impl DynamoTable {
    pub fn new(client: Client, table_name: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            index_name: index_name.into(),
        }
    }

    /// Create the SDK client from `config` and wrap it.
    pub async fn connect(config: &Config) -> Self {
        let client = config.dynamodb_client().await;
        Self::new(client, config.table_name.clone(), config.index_name.clone())
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn key(id: &str) -> Record {
        let mut key = HashMap::new();
        key.insert(ID_ATTR.to_string(), AttributeValue::S(id.to_string()));
        key
    }
}

fn sdk_error<E>(err: E) -> StoreError
where
    E: std::error::Error,
{
    StoreError::Sdk(DisplayErrorContext(err).to_string())
}

/// `SET #a0 = :v0, #a1 = :v1, ...` plus its name and value maps.
fn set_expression(changes: Record) -> (String, HashMap<String, String>, Record) {
    let mut clauses = Vec::with_capacity(changes.len());
    let mut names = HashMap::new();
    let mut values = HashMap::new();
    for (i, (attr, value)) in changes.into_iter().enumerate() {
        let name = format!("#a{i}");
        let placeholder = format!(":v{i}");
        clauses.push(format!("{name} = {placeholder}"));
        names.insert(name, attr);
        values.insert(placeholder, value);
    }
    (format!("SET {}", clauses.join(", ")), names, values)
}

#[async_trait]
impl Table for DynamoTable {
    async fn get(&self, id: &str) -> Result<Option<Record>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(id)))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output.item)
    }

    async fn put(&self, record: Record) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn update(&self, id: &str, changes: Record) -> Result<Option<Record>, StoreError> {
        let (expression, names, values) = set_expression(changes);

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(id)))
            .update_expression(expression)
            .condition_expression("attribute_exists(#id)")
            .set_expression_attribute_names(Some(names))
            .expression_attribute_names("#id", ID_ATTR)
            .set_expression_attribute_values(Some(values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => output
                .attributes
                .map(Some)
                .ok_or_else(|| StoreError::Malformed("update returned no attributes".to_string())),
            Err(err) => match err.into_service_error() {
                UpdateItemError::ConditionalCheckFailedException(_) => {
                    debug!(id, "update on missing item");
                    Ok(None)
                }
                other => Err(StoreError::Sdk(format!(
                    "{}: {}",
                    other.code().unwrap_or("UpdateItem"),
                    DisplayErrorContext(&other)
                ))),
            },
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(id)))
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", ID_ATTR)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => match err.into_service_error() {
                DeleteItemError::ConditionalCheckFailedException(_) => {
                    debug!(id, "delete on missing item");
                    Ok(false)
                }
                other => Err(StoreError::Sdk(format!(
                    "{}: {}",
                    other.code().unwrap_or("DeleteItem"),
                    DisplayErrorContext(&other)
                ))),
            },
        }
    }

    async fn query_partition(
        &self,
        partition: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, StoreError> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        let mut start_key: Option<Record> = None;

        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(&self.index_name)
                .key_condition_expression("#pk = :pk")
                .expression_attribute_names("#pk", PARTITION_ATTR)
                .expression_attribute_values(":pk", AttributeValue::S(partition.to_string()))
                .scan_index_forward(false)
                .set_exclusive_start_key(start_key.take());

            if let Some(limit) = limit {
                let remaining = limit.saturating_sub(records.len());
                request = request.limit(i32::try_from(remaining).unwrap_or(i32::MAX));
            }

            let output = request.send().await.map_err(sdk_error)?;
            records.extend(output.items.unwrap_or_default());

            let exhausted = limit.is_some_and(|limit| records.len() >= limit);
            match output.last_evaluated_key {
                Some(key) if !exhausted => start_key = Some(key),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            records.truncate(limit);
        }
        debug!(partition, count = records.len(), "queried index partition");
        Ok(records)
    }

    async fn status(&self) -> Result<String, StoreError> {
        let output = self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .map_err(sdk_error)?;

        output
            .table
            .and_then(|table| table.table_status)
            .map(|status| status.as_str().to_string())
            .ok_or_else(|| StoreError::Malformed("table description has no status".to_string()))
    }
}
