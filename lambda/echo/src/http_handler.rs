use aws_sdk_dynamodb::types::AttributeValue;
use lambda_http::http::header::{HeaderValue, CONTENT_TYPE};
use lambda_http::{Body, Error, Request, Response};
use serde::Deserialize;
use shared::convert::{record_to_json, records_to_json};
use shared::response::{self, Cors, TEXT_HTML};
use shared::store::{CREATED_AT_ATTR, ID_ATTR, PARTITION_ATTR};
use shared::{ApiError, Record, Table};
use tracing::info;

pub(crate) const CORS: Cors = Cors {
    allow_origin: "*",
    allow_methods: "GET, POST, OPTIONS",
    allow_headers: "Content-Type",
};

const MESSAGE_PARTITION: &str = "MESSAGE";
const MAX_TEXT_CHARS: usize = 100;
const LATEST_LIMIT: usize = 10;

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Deserialize)]
struct Submission {
    text: Option<String>,
}

impl Submission {
    /// Validated, trimmed text of a `POST /submit` body.
    fn validated_text(body: &[u8]) -> Result<String, ApiError> {
        let submission: Submission = serde_json::from_slice(body)
            .map_err(|e| ApiError::validation(format!("Invalid JSON: {}", e)))?;

        let text = submission.text.as_deref().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(ApiError::validation("Text is required"));
        }
        if text.chars().count() > MAX_TEXT_CHARS {
            return Err(ApiError::validation(format!(
                "Text must be at most {} characters",
                MAX_TEXT_CHARS
            )));
        }
        Ok(text.to_string())
    }
}

fn message_record(text: String) -> Record {
    let mut item = Record::new();
    item.insert(ID_ATTR.to_string(), AttributeValue::S(shared::new_id()));
    item.insert(
        PARTITION_ATTR.to_string(),
        AttributeValue::S(MESSAGE_PARTITION.to_string()),
    );
    item.insert("text".to_string(), AttributeValue::S(text));
    item.insert(
        CREATED_AT_ATTR.to_string(),
        AttributeValue::S(shared::timestamp()),
    );
    item
}

fn index_page() -> Result<Response<Body>, ApiError> {
    Ok(Response::builder()
        .status(200)
        .header(CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML))
        .body(Body::Text(INDEX_HTML.to_string()))?)
}

async fn submit<T: Table>(table: &T, body: &[u8]) -> Result<Response<Body>, ApiError> {
    let record = message_record(Submission::validated_text(body)?);
    let stored = record_to_json(&record)?;

    table.put(record).await?;
    info!(id = %stored["id"], "stored message");
    Ok(response::created(&stored))
}

async fn latest<T: Table>(table: &T) -> Result<Response<Body>, ApiError> {
    let records = table
        .query_partition(MESSAGE_PARTITION, Some(LATEST_LIMIT))
        .await?;
    Ok(response::ok(&records_to_json(&records)?))
}

async fn route<T: Table>(table: &T, event: &Request) -> Result<Response<Body>, ApiError> {
    let path = event.uri().path().trim_end_matches('/');
    let method = event.method().as_str();
    info!(method, path, "handling request");

    match (method, path) {
        ("OPTIONS", _) => Ok(CORS.preflight()),
        ("GET", "") => index_page(),
        ("POST", "/submit") => submit(table, event.body().as_ref()).await,
        ("GET", "/latest") => latest(table).await,
        _ => Err(ApiError::Unrouted),
    }
}

pub(crate) async fn function_handler<T: Table>(
    table: &T,
    event: Request,
) -> Result<Response<Body>, Error> {
    Ok(response::respond(&CORS, route(table, &event)).await)
}
