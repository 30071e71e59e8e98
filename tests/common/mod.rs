#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use botwit::{NotionClient, TokenCache, TwitterClient};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DATABASE_ID: &str = "db";

pub fn twitter_client(server: &MockServer) -> TwitterClient {
    TwitterClient::builder()
        .consumer_key("key")
        .consumer_secret("secret")
        .base_url(server.uri())
        .token_cache(Arc::new(TokenCache::new(Duration::from_secs(60))))
        .build()
}

pub fn notion_client(server: &MockServer) -> NotionClient {
    NotionClient::builder()
        .token("notion-token")
        .base_url(server.uri())
        .build()
}

pub async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token_type": "bearer", "access_token": "bearer-token" })),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub fn user_json(id: u64, username: &str) -> Value {
    json!({ "id": id.to_string(), "name": username.to_uppercase(), "username": username })
}

pub fn tweet_json(id: u64, author_id: u64, text: &str, created_at: &str) -> Value {
    json!({
        "id": id.to_string(),
        "author_id": author_id.to_string(),
        "text": text,
        "created_at": created_at,
        "edit_history_tweet_ids": [id.to_string()],
    })
}

pub fn with_conversation(mut tweet: Value, conversation_id: u64) -> Value {
    tweet["conversation_id"] = json!(conversation_id.to_string());
    tweet
}

pub fn replying_to(mut tweet: Value, parents: &[u64]) -> Value {
    tweet["referenced_tweets"] = parents
        .iter()
        .map(|id| json!({ "type": "replied_to", "id": id.to_string() }))
        .collect();
    tweet
}

pub fn notion_row(tweet_id: u64) -> Value {
    json!({
        "object": "page",
        "id": format!("page-{}", tweet_id),
        "properties": { "tweet_id": { "id": "abc", "type": "number", "number": tweet_id } }
    })
}

pub fn notion_query_response(rows: Vec<Value>, next_cursor: Option<&str>) -> Value {
    json!({
        "object": "list",
        "results": rows,
        "has_more": next_cursor.is_some(),
        "next_cursor": next_cursor,
    })
}
