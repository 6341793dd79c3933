use anyhow::Result;
use api_ingest::domain::ports::PaginationClient;
use api_ingest::{GraphQLPaginationClient, IngestError, NoAuth, PaginationType, Source};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;

const REPOS_QUERY: &str =
    "query($first: Int, $after: String) { repos(first: $first, after: $after) { edges { node { id } } pageInfo { hasNextPage endCursor } } }";

fn client() -> GraphQLPaginationClient {
    GraphQLPaginationClient::new(reqwest::Client::new(), Arc::new(NoAuth))
}

fn graphql_source(server: &MockServer, pagination_type: PaginationType) -> Source {
    let mut source = Source::new("repos", "GRAPHQL", server.url("/graphql"));
    source.graphql_query = Some(REPOS_QUERY.to_string());
    source.response_path = Some("repos.edges".to_string());
    source.pagination_type = pagination_type;
    source.pagination.delay_ms = 0;
    source
}

fn body_has_after(req: &HttpMockRequest) -> bool {
    let body = req.body.as_deref().unwrap_or_default();
    String::from_utf8_lossy(body).contains("\"after\":")
}

fn edges(ids: &[u32]) -> serde_json::Value {
    json!(ids
        .iter()
        .map(|id| json!({ "node": { "id": id } }))
        .collect::<Vec<_>>())
}

#[tokio::test]
async fn test_single_page_when_has_next_page_is_false() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_contains("\"first\":100");
        then.status(200).json_body(json!({
            "data": { "repos": {
                "edges": edges(&[1, 2, 3]),
                "pageInfo": { "hasNextPage": false, "endCursor": "c1" }
            }}
        }));
    });

    let source = graphql_source(&server, PaginationType::Cursor);
    let result = client()
        .fetch_all_pages(&source, source.pagination_type, &source.pagination)
        .await?;

    mock.assert_hits(1);
    assert!(result.success);
    assert_eq!(result.total_pages, 1);
    assert_eq!(result.total_records, 3);
    // Relay edges 已展開成 node
    assert_eq!(result.pages[0].records[0], json!({ "id": 1 }));
    Ok(())
}

#[tokio::test]
async fn test_relay_cursor_follows_end_cursor() -> Result<()> {
    let server = MockServer::start();
    let page1 = server.mock(|when, then| {
        when.method(POST)
            .path("/graphql")
            .body_contains("\"first\":2")
            .matches(|req: &HttpMockRequest| !body_has_after(req));
        then.status(200).json_body(json!({
            "data": { "repos": {
                "edges": edges(&[1, 2]),
                "pageInfo": { "hasNextPage": true, "endCursor": "c1" }
            }}
        }));
    });
    let page2 = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_contains("\"after\":\"c1\"");
        then.status(200).json_body(json!({
            "data": { "repos": {
                "edges": edges(&[3]),
                "pageInfo": { "hasNextPage": false, "endCursor": "c2" }
            }}
        }));
    });

    let mut source = graphql_source(&server, PaginationType::Cursor);
    source.pagination.limit = 2;
    // 分頁變數覆蓋同名的靜態變數
    source.graphql_variables.insert("first".to_string(), json!(999));
    source.graphql_variables.insert("owner".to_string(), json!("acme"));

    let result = client()
        .fetch_all_pages(&source, source.pagination_type, &source.pagination)
        .await?;

    page1.assert_hits(1);
    page2.assert_hits(1);
    assert!(result.success);
    assert_eq!(result.total_pages, 2);
    assert_eq!(result.total_records, 3);
    assert!(!result.max_pages_reached);
    Ok(())
}

#[tokio::test]
async fn test_cursor_respects_max_pages() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(json!({
            "data": { "repos": {
                "edges": edges(&[1]),
                "pageInfo": { "hasNextPage": true, "endCursor": "always-new" }
            }}
        }));
    });

    let mut source = graphql_source(&server, PaginationType::Cursor);
    source.pagination.max_pages = 1;

    let result = client()
        .fetch_all_pages(&source, source.pagination_type, &source.pagination)
        .await?;

    mock.assert_hits(1);
    assert_eq!(result.total_pages, 1);
    assert!(result.max_pages_reached);
    Ok(())
}

#[tokio::test]
async fn test_graphql_errors_fail_the_fetch() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(json!({
            "data": { "repos": null },
            "errors": [
                { "message": "Field 'repos' requires authentication" },
                { "message": "rate limited" }
            ]
        }));
    });

    let source = graphql_source(&server, PaginationType::Cursor);
    let result = client()
        .fetch_all_pages(&source, source.pagination_type, &source.pagination)
        .await?;

    assert!(!result.success);
    assert_eq!(result.total_pages, 0);
    let message = result.error_message.unwrap_or_default();
    assert!(message.contains("requires authentication"));
    assert!(message.contains("rate limited"));
    Ok(())
}

#[tokio::test]
async fn test_graphql_offset_pagination() -> Result<()> {
    let server = MockServer::start();
    let page1 = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_contains("\"offset\":0");
        then.status(200).json_body(json!({
            "data": { "users": { "items": [{ "id": 1 }, { "id": 2 }] } }
        }));
    });
    let page2 = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_contains("\"offset\":2");
        then.status(200).json_body(json!({
            "data": { "users": { "items": [{ "id": 3 }] } }
        }));
    });

    let mut source = graphql_source(&server, PaginationType::Offset);
    source.graphql_query =
        Some("query($offset: Int, $limit: Int) { users(offset: $offset, limit: $limit) { items { id } } }".to_string());
    source.response_path = Some("users.items".to_string());
    source.pagination.limit = 2;

    let result = client()
        .fetch_all_pages(&source, source.pagination_type, &source.pagination)
        .await?;

    page1.assert_hits(1);
    page2.assert_hits(1);
    assert_eq!(result.total_pages, 2);
    assert_eq!(result.total_records, 3);
    Ok(())
}

#[tokio::test]
async fn test_graphql_offset_respects_max_pages() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_contains("\"offset\":");
        then.status(200).json_body(json!({
            "data": { "users": { "items": [{ "id": 1 }, { "id": 2 }] } }
        }));
    });

    let mut source = graphql_source(&server, PaginationType::Offset);
    source.graphql_query =
        Some("query($offset: Int, $limit: Int) { users(offset: $offset, limit: $limit) { items { id } } }".to_string());
    source.response_path = Some("users.items".to_string());
    source.pagination.limit = 2;
    source.pagination.max_pages = 3;

    let result = client()
        .fetch_all_pages(&source, source.pagination_type, &source.pagination)
        .await?;

    mock.assert_hits(3);
    assert!(result.success);
    assert_eq!(result.total_pages, 3);
    assert_eq!(result.total_records, 6);
    assert!(result.max_pages_reached);
    Ok(())
}

#[tokio::test]
async fn test_unsupported_pagination_and_missing_query() {
    let server = MockServer::start();

    let source = graphql_source(&server, PaginationType::Page);
    let err = client()
        .fetch_all_pages(&source, source.pagination_type, &source.pagination)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedPagination { .. }));

    let mut source = graphql_source(&server, PaginationType::None);
    source.graphql_query = None;
    let err = client()
        .fetch_all_pages(&source, source.pagination_type, &source.pagination)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::MissingConfigError { .. }));
}

#[tokio::test]
async fn test_connection_uses_introspection_query() -> Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_contains("__typename");
        then.status(200)
            .json_body(json!({ "data": { "__typename": "Query" } }));
    });

    let source = graphql_source(&server, PaginationType::Cursor);
    assert!(client().test_connection(&source).await?);
    mock.assert_hits(1);
    Ok(())
}
