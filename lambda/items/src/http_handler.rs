use lambda_http::http::StatusCode;
use lambda_http::{Body, Error, Request, Response};
use serde_json::json;
use shared::convert::{record_to_json, records_to_json};
use shared::response::{self, Cors};
use shared::{ApiError, Table};
use tracing::{error, info};

use crate::model::{ItemPatch, NewItem, Stats, ITEM_PARTITION};

pub(crate) const CORS: Cors = Cors {
    allow_origin: "*",
    allow_methods: "GET,POST,PUT,DELETE,OPTIONS",
    allow_headers: "Content-Type,X-Amz-Date,Authorization,X-Api-Key",
};

fn item_not_found() -> ApiError {
    ApiError::not_found("Item not found")
}

/// `/items/{id}` -> `id`. Nested paths are not items.
fn item_id(path: &str) -> Option<&str> {
    path.strip_prefix("/items/")
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

fn home() -> Result<Response<Body>, ApiError> {
    Ok(response::ok(&json!({
        "message": "Items API with DynamoDB is running!",
        "version": env!("CARGO_PKG_VERSION"),
        "database": "DynamoDB",
    })))
}

async fn health<T: Table>(table: &T) -> Result<Response<Body>, ApiError> {
    match table.status().await {
        Ok(table_status) => Ok(response::ok(&json!({
            "status": "healthy",
            "database": "DynamoDB",
            "table_status": table_status,
        }))),
        Err(e) => {
            error!(error = %e, "health check failed");
            Ok(response::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "status": "unhealthy", "error": e.to_string() }),
            ))
        }
    }
}

async fn list_items<T: Table>(table: &T) -> Result<Response<Body>, ApiError> {
    let records = table.query_partition(ITEM_PARTITION, None).await?;
    Ok(response::ok(&records_to_json(&records)?))
}

async fn create_item<T: Table>(table: &T, body: &[u8]) -> Result<Response<Body>, ApiError> {
    let new_item = NewItem::parse(body)?;
    let record = new_item.into_record(shared::new_id(), shared::timestamp());
    let created = record_to_json(&record)?;

    table.put(record).await?;
    info!(id = %created["id"], "created item");
    Ok(response::created(&created))
}

async fn get_item<T: Table>(table: &T, id: &str) -> Result<Response<Body>, ApiError> {
    let record = table.get(id).await?.ok_or_else(item_not_found)?;
    Ok(response::ok(&record_to_json(&record)?))
}

async fn update_item<T: Table>(table: &T, id: &str, body: &[u8]) -> Result<Response<Body>, ApiError> {
    let changes = ItemPatch::parse(body)?.into_changes(shared::timestamp());
    let record = table.update(id, changes).await?.ok_or_else(item_not_found)?;
    Ok(response::ok(&record_to_json(&record)?))
}

async fn delete_item<T: Table>(table: &T, id: &str) -> Result<Response<Body>, ApiError> {
    if !table.delete(id).await? {
        return Err(item_not_found());
    }
    info!(id, "deleted item");
    Ok(response::message(StatusCode::OK, "Item deleted successfully"))
}

async fn stats<T: Table>(table: &T) -> Result<Response<Body>, ApiError> {
    let records = table.query_partition(ITEM_PARTITION, None).await?;
    let stats = Stats::from_records(&records);
    Ok(response::ok(&serde_json::to_value(stats)?))
}

async fn route<T: Table>(table: &T, event: &Request) -> Result<Response<Body>, ApiError> {
    let path = event.uri().path().trim_end_matches('/');
    let method = event.method().as_str();
    info!(method, path, "handling request");

    match (method, path) {
        ("OPTIONS", _) => Ok(CORS.preflight()),
        ("GET", "") => home(),
        ("GET", "/health") => health(table).await,
        ("GET", "/items") => list_items(table).await,
        ("POST", "/items") => create_item(table, event.body().as_ref()).await,
        ("GET", "/items/stats") => stats(table).await,
        (_, p) => match (method, item_id(p)) {
            ("GET", Some(id)) => get_item(table, id).await,
            ("PUT", Some(id)) => update_item(table, id, event.body().as_ref()).await,
            ("DELETE", Some(id)) => delete_item(table, id).await,
            _ => Err(ApiError::Unrouted),
        },
    }
}

pub(crate) async fn function_handler<T: Table>(
    table: &T,
    event: Request,
) -> Result<Response<Body>, Error> {
    Ok(response::respond(&CORS, route(table, &event)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use shared::memory::MemoryTable;

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request {
        let body = body.map_or(Body::Empty, |v| Body::Text(v.to_string()));
        lambda_http::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .unwrap()
    }

    async fn call(
        table: &MemoryTable,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = function_handler(table, request(method, uri, body))
            .await
            .unwrap();
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let status = response.status();
        let body = match response.body() {
            Body::Empty => Value::Null,
            other => serde_json::from_slice(other.as_ref()).unwrap(),
        };
        (status, body)
    }

    async fn create(table: &MemoryTable, body: Value) -> Value {
        let (status, item) = call(table, "POST", "/items", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        item
    }

    #[tokio::test]
    async fn test_home() {
        let table = MemoryTable::new();
        let (status, body) = call(&table, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "DynamoDB");
        assert_eq!(table.accesses(), 0);
    }

    #[tokio::test]
    async fn test_health() {
        let table = MemoryTable::new();
        let (status, body) = call(&table, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["table_status"], "ACTIVE");
    }

    #[tokio::test]
    async fn test_health_failure() {
        let table = MemoryTable::new();
        table.fail_all();
        let (status, body) = call(&table, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_create_item() {
        let table = MemoryTable::new();
        let item = create(&table, json!({ "title": "Buy milk", "description": "2L" })).await;

        assert!(!item["id"].as_str().unwrap().is_empty());
        assert_eq!(item["title"], "Buy milk");
        assert_eq!(item["description"], "2L");
        assert_eq!(item["completed"], false);
        assert_eq!(item["pk"], "ITEM");
        assert_eq!(item["created_at"], item["updated_at"]);
        assert_eq!(table.writes(), 1);
    }

    #[tokio::test]
    async fn test_created_ids_are_unique() {
        let table = MemoryTable::new();
        let a = create(&table, json!({ "title": "a" })).await;
        let b = create(&table, json!({ "title": "b" })).await;
        assert_ne!(a["id"], b["id"]);
    }

    #[tokio::test]
    async fn test_create_without_title_is_rejected() {
        let table = MemoryTable::new();
        for body in [json!({ "description": "x" }), json!({ "title": "" })] {
            let (status, body) = call(&table, "POST", "/items", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Title is required");
        }
        assert_eq!(table.accesses(), 0);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_create_with_malformed_json() {
        let table = MemoryTable::new();
        let response = function_handler(
            &table,
            lambda_http::http::Request::builder()
                .method("POST")
                .uri("/items")
                .body(Body::Text("{not json".to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(table.accesses(), 0);
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let table = MemoryTable::new();
        let item = create(&table, json!({ "title": "Read", "description": "a book" })).await;
        let id = item["id"].as_str().unwrap();

        let (status, fetched) = call(&table, "GET", &format!("/items/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, item);
    }

    #[tokio::test]
    async fn test_get_missing_item() {
        let table = MemoryTable::new();
        let (status, body) = call(&table, "GET", "/items/does-not-exist", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Item not found");
    }

    #[tokio::test]
    async fn test_update_completed_only() {
        let table = MemoryTable::new();
        let item = create(&table, json!({ "title": "Run", "description": "5k" })).await;
        let id = item["id"].as_str().unwrap();

        let (status, updated) = call(
            &table,
            "PUT",
            &format!("/items/{id}"),
            Some(json!({ "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["completed"], true);
        assert_eq!(updated["title"], "Run");
        assert_eq!(updated["description"], "5k");
        assert_eq!(updated["created_at"], item["created_at"]);
        assert!(updated["updated_at"].as_str().unwrap() >= item["updated_at"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_item() {
        let table = MemoryTable::new();
        let (status, _) = call(
            &table,
            "PUT",
            "/items/ghost",
            Some(json!({ "title": "new" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_update_without_data() {
        let table = MemoryTable::new();
        let (status, body) = call(&table, "PUT", "/items/any", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No data provided");
        assert_eq!(table.accesses(), 0);
    }

    #[tokio::test]
    async fn test_delete_then_get() {
        let table = MemoryTable::new();
        let item = create(&table, json!({ "title": "Temp" })).await;
        let uri = format!("/items/{}", item["id"].as_str().unwrap());

        let (status, body) = call(&table, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Item deleted successfully");

        let (status, _) = call(&table, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_missing_item() {
        let table = MemoryTable::new();
        let (status, _) = call(&table, "DELETE", "/items/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let table = MemoryTable::new();
        let (_, empty) = call(&table, "GET", "/items", None).await;
        assert_eq!(empty, json!([]));

        let mut ids = Vec::new();
        for title in ["first", "second", "third"] {
            ids.push(create(&table, json!({ "title": title })).await["id"].clone());
        }

        let (status, listed) = call(&table, "GET", "/items/", None).await;
        assert_eq!(status, StatusCode::OK);
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 3);

        let created: Vec<&str> = listed
            .iter()
            .map(|item| item["created_at"].as_str().unwrap())
            .collect();
        assert!(created.windows(2).all(|w| w[0] >= w[1]));

        let listed_ids: Vec<Value> = listed.iter().map(|item| item["id"].clone()).collect();
        ids.reverse();
        assert_eq!(listed_ids, ids);
    }

    #[tokio::test]
    async fn test_stats() {
        let table = MemoryTable::new();
        let first = create(&table, json!({ "title": "one" })).await;
        create(&table, json!({ "title": "two" })).await;
        create(&table, json!({ "title": "three" })).await;
        call(
            &table,
            "PUT",
            &format!("/items/{}", first["id"].as_str().unwrap()),
            Some(json!({ "completed": true })),
        )
        .await;

        let (status, stats) = call(&table, "GET", "/items/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            stats,
            json!({ "total": 3, "completed": 1, "pending": 2, "completion_rate": 33.33 })
        );
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let table = MemoryTable::new();
        table.fail_all();
        for (method, uri) in [("GET", "/items"), ("GET", "/items/x"), ("DELETE", "/items/x")] {
            let (status, body) = call(&table, method, uri, None).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body["error"].as_str().unwrap().contains("injected failure"));
        }
    }

    #[tokio::test]
    async fn test_options_never_touches_storage() {
        let table = MemoryTable::new();
        for uri in ["/", "/items", "/items/abc", "/nowhere"] {
            let response = function_handler(&table, request("OPTIONS", uri, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()["access-control-allow-methods"],
                "GET,POST,PUT,DELETE,OPTIONS"
            );
        }
        assert_eq!(table.accesses(), 0);
    }

    #[tokio::test]
    async fn test_unrouted() {
        let table = MemoryTable::new();
        for (method, uri) in [
            ("GET", "/nowhere"),
            ("PATCH", "/items/abc"),
            ("POST", "/items/abc"),
            ("GET", "/items/a/b"),
            ("DELETE", "/items"),
        ] {
            let (status, body) = call(&table, method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
            assert_eq!(body["error"], "Not found");
        }
        assert_eq!(table.accesses(), 0);
    }

    #[test]
    fn test_item_id() {
        assert_eq!(item_id("/items/abc"), Some("abc"));
        assert_eq!(item_id("/items/"), None);
        assert_eq!(item_id("/items/a/b"), None);
        assert_eq!(item_id("/other/abc"), None);
    }
}
