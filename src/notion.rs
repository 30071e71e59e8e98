use std::collections::VecDeque;

use futures_util::Stream;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::error::BotwitError;
use crate::memo::TweetMemo;

pub const NOTION_API_URL: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";
const QUERY_PAGE_SIZE: u32 = 100;

/// Notion rejects text objects longer than this, counted in UTF-16 units.
const RICH_TEXT_MAX_LEN: usize = 2000;

/// Numeric property holding the mention id of an archived memo.
pub const TWEET_ID_PROPERTY: &str = "tweet_id";

/// The value `id` reads back as once stored in a number property.
///
/// Notion numbers are doubles, so snowflake ids above 2^53 lose their low
/// bits. Ids are only comparable with stored values after this rounding.
pub fn notion_number(id: u64) -> u64 {
    id as f64 as u64
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Page {
    pub fn number_property(&self, name: &str) -> Option<u64> {
        let number = self.properties.get(name)?.get("number")?;
        if let Some(n) = number.as_u64() {
            return Some(n);
        }
        // Whole numbers may come back in float notation
        number
            .as_f64()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u64)
    }

    pub fn tweet_id(&self) -> Option<u64> {
        self.number_property(TWEET_ID_PROPERTY)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<Page>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    code: String,
    message: String,
}

#[derive(Default, Debug)]
struct QueryState {
    pages: VecDeque<Page>,
    cursor: Option<String>,
    exhausted: bool,
    errored: bool,
}

#[derive(TypedBuilder)]
pub struct NotionClient {
    #[builder(default)]
    client: Client,

    #[builder(setter(into))]
    token: String,

    #[builder(setter(into), default = NOTION_API_URL.to_owned())]
    base_url: String,
}

impl NotionClient {
    /// Every row of a database, fetching further result pages as needed.
    ///
    /// The stream ends after the first error.
    pub fn query_database<'a>(
        &'a self,
        database_id: &'a str,
    ) -> impl Stream<Item = Result<Page, BotwitError>> + 'a {
        futures_util::stream::unfold(
            (self, QueryState::default()),
            move |(client, mut state)| async move {
                loop {
                    // Stop if previously errored
                    if state.errored {
                        return None;
                    }

                    if let Some(page) = state.pages.pop_front() {
                        return Some((Ok(page), (client, state)));
                    }

                    if state.exhausted {
                        return None;
                    }

                    match client.query_page(database_id, state.cursor.take()).await {
                        Ok(response) => {
                            state.exhausted = !response.has_more || response.next_cursor.is_none();
                            state.cursor = response.next_cursor;
                            state.pages.extend(response.results);
                        }
                        Err(e) => {
                            state.errored = true;
                            return Some((Err(e), (client, state)));
                        }
                    }
                }
            },
        )
    }

    pub async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
    ) -> Result<Page, BotwitError> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });
        self.post("/v1/pages", &body).await
    }

    async fn query_page(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<QueryResponse, BotwitError> {
        let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor);
        }
        self.post(&format!("/v1/databases/{}/query", database_id), &body)
            .await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, BotwitError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "notion request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(match serde_json::from_str::<NotionErrorBody>(&text) {
                Ok(error) => BotwitError::Notion {
                    status: status.as_u16(),
                    code: error.code,
                    message: error.message,
                },
                Err(_) => BotwitError::Status {
                    status: status.as_u16(),
                    body: text,
                },
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Database row properties for an archived memo.
pub fn memo_properties(memo: &TweetMemo) -> Result<Value, BotwitError> {
    let content: Vec<Value> = chunk_text(&memo.thread_text(), RICH_TEXT_MAX_LEN)
        .into_iter()
        .map(|chunk| json!({ "text": { "content": chunk } }))
        .collect();
    let tags: Vec<Value> = memo
        .tags()
        .into_iter()
        .map(|tag| json!({ "name": tag }))
        .collect();

    Ok(json!({
        "Name": { "title": [{ "text": { "content": format!("@{}", memo.author.username) } }] },
        "URL": { "url": memo.url() },
        "Content": { "rich_text": content },
        TWEET_ID_PROPERTY: { "number": memo.my_tweet.id },
        "Tags": { "multi_select": tags },
        "tweet_date": { "date": { "start": memo.date()? } },
    }))
}

/// Split `text` in pieces of at most `max_units` UTF-16 code units, never
/// inside a character.
fn chunk_text(text: &str, max_units: usize) -> Vec<String> {
    let mut chunks = vec![];
    let mut current = String::new();
    let mut units = 0;

    for c in text.chars() {
        if units + c.len_utf16() > max_units {
            chunks.push(std::mem::take(&mut current));
            units = 0;
        }
        current.push(c);
        units += c.len_utf16();
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
