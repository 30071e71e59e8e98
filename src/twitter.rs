use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::auth::TokenCache;
use crate::error::{ApiErrors, ApiProblem, BotwitError};
use crate::tweet::{Tweet, TweetListPayload, TweetPayload, User, UserPayload};

pub const TWITTER_API_URL: &str = "https://api.twitter.com";

/// Largest page the recent search endpoint returns.
const SEARCH_MAX_RESULTS: u32 = 100;

/// Values accepted by the `tweet.fields` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetField {
    Attachments,
    AuthorId,
    ContextAnnotations,
    ConversationId,
    CreatedAt,
    EditControls,
    Entities,
    Geo,
    Id,
    InReplyToUserId,
    Lang,
    NonPublicMetrics,
    PublicMetrics,
    OrganicMetrics,
    PromotedMetrics,
    PossiblySensitive,
    ReferencedTweets,
    ReplySettings,
    Source,
    Text,
    Withheld,
}

impl TweetField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attachments => "attachments",
            Self::AuthorId => "author_id",
            Self::ContextAnnotations => "context_annotations",
            Self::ConversationId => "conversation_id",
            Self::CreatedAt => "created_at",
            Self::EditControls => "edit_controls",
            Self::Entities => "entities",
            Self::Geo => "geo",
            Self::Id => "id",
            Self::InReplyToUserId => "in_reply_to_user_id",
            Self::Lang => "lang",
            Self::NonPublicMetrics => "non_public_metrics",
            Self::PublicMetrics => "public_metrics",
            Self::OrganicMetrics => "organic_metrics",
            Self::PromotedMetrics => "promoted_metrics",
            Self::PossiblySensitive => "possibly_sensitive",
            Self::ReferencedTweets => "referenced_tweets",
            Self::ReplySettings => "reply_settings",
            Self::Source => "source",
            Self::Text => "text",
            Self::Withheld => "withheld",
        }
    }
}

/// Values accepted by the `expansions` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweetExpansion {
    AttachmentsPollIds,
    AttachmentsMediaKeys,
    AuthorId,
    EditHistoryTweetIds,
    EntitiesMentionsUsername,
    GeoPlaceId,
    InReplyToUserId,
    ReferencedTweetsId,
    ReferencedTweetsIdAuthorId,
}

impl TweetExpansion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttachmentsPollIds => "attachments.poll_ids",
            Self::AttachmentsMediaKeys => "attachments.media_keys",
            Self::AuthorId => "author_id",
            Self::EditHistoryTweetIds => "edit_history_tweet_ids",
            Self::EntitiesMentionsUsername => "entities.mentions.username",
            Self::GeoPlaceId => "geo.place_id",
            Self::InReplyToUserId => "in_reply_to_user_id",
            Self::ReferencedTweetsId => "referenced_tweets.id",
            Self::ReferencedTweetsIdAuthorId => "referenced_tweets.id.author_id",
        }
    }
}

pub const DEFAULT_TWEET_FIELDS: &[TweetField] = &[
    TweetField::Id,
    TweetField::AuthorId,
    TweetField::CreatedAt,
    TweetField::Text,
];

fn join_fields(fields: &[TweetField]) -> String {
    fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(",")
}

fn join_expansions(expansions: &[TweetExpansion]) -> String {
    expansions
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

/// App-only client for the Twitter v2 API.
///
/// Authenticates with the OAuth2 client credentials flow; the bearer token is
/// kept in the injected [`TokenCache`].
#[derive(TypedBuilder)]
pub struct TwitterClient {
    #[builder(default)]
    client: Client,

    #[builder(setter(into))]
    consumer_key: String,

    #[builder(setter(into))]
    consumer_secret: String,

    #[builder(setter(into), default = TWITTER_API_URL.to_owned())]
    base_url: String,

    #[builder(default)]
    token_cache: Arc<TokenCache>,
}

impl TwitterClient {
    pub async fn get_user(&self, username: &str) -> Result<User, BotwitError> {
        let username = username.trim_start_matches('@');
        let path = format!("/2/users/by/username/{}", urlencoding::encode(username));
        let payload: UserPayload = self.get(&path, &[]).await?;
        Ok(payload.data)
    }

    pub async fn get_user_by_id(&self, user_id: u64) -> Result<User, BotwitError> {
        let payload: UserPayload = self.get(&format!("/2/users/{}", user_id), &[]).await?;
        Ok(payload.data)
    }

    /// <https://developer.twitter.com/en/docs/twitter-api/tweets/lookup/api-reference/get-tweets>
    ///
    /// The returned tweets are not ordered like `ids`.
    pub async fn get_tweets(
        &self,
        ids: &[u64],
        fields: &[TweetField],
    ) -> Result<Vec<Tweet>, BotwitError> {
        let ids = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let params = [("ids", ids), ("tweet.fields", join_fields(fields))];
        let payload: TweetListPayload = self.get("/2/tweets", &params).await?;
        Ok(unpack_list(payload))
    }

    /// <https://developer.twitter.com/en/docs/twitter-api/tweets/lookup/api-reference/get-tweets-id>
    pub async fn get_tweet(
        &self,
        id: u64,
        fields: &[TweetField],
        expansions: &[TweetExpansion],
    ) -> Result<Tweet, BotwitError> {
        let mut params = vec![("tweet.fields", join_fields(fields))];
        if !expansions.is_empty() {
            params.push(("expansions", join_expansions(expansions)));
        }
        let payload: TweetPayload = self.get(&format!("/2/tweets/{}", id), &params).await?;
        Ok(Tweet::from_payload(payload))
    }

    /// <https://developer.twitter.com/en/docs/twitter-api/tweets/timelines/api-reference/get-users-id-tweets>
    pub async fn get_user_tweets(
        &self,
        user_id: u64,
        fields: &[TweetField],
    ) -> Result<Vec<Tweet>, BotwitError> {
        let params = [("tweet.fields", join_fields(fields))];
        let payload: TweetListPayload = self
            .get(&format!("/2/users/{}/tweets", user_id), &params)
            .await?;
        Ok(unpack_list(payload))
    }

    /// <https://developer.twitter.com/en/docs/twitter-api/tweets/timelines/api-reference/get-users-id-mentions>
    pub async fn get_user_mentions(
        &self,
        user_id: u64,
        fields: &[TweetField],
    ) -> Result<Vec<Tweet>, BotwitError> {
        let params = [("tweet.fields", join_fields(fields))];
        let payload: TweetListPayload = self
            .get(&format!("/2/users/{}/mentions", user_id), &params)
            .await?;
        Ok(unpack_list(payload))
    }

    /// <https://developer.twitter.com/en/docs/twitter-api/tweets/search/api-reference/get-tweets-search-recent>
    pub async fn search_tweets(
        &self,
        query: &str,
        fields: &[TweetField],
        expansions: &[TweetExpansion],
    ) -> Result<Vec<Tweet>, BotwitError> {
        let mut params = vec![
            ("query", query.to_owned()),
            ("tweet.fields", join_fields(fields)),
            ("max_results", SEARCH_MAX_RESULTS.to_string()),
        ];
        if !expansions.is_empty() {
            params.push(("expansions", join_expansions(expansions)));
        }
        let payload: TweetListPayload = self.get("/2/tweets/search/recent", &params).await?;
        Ok(unpack_list(payload))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, BotwitError> {
        let token = self.bearer_token().await?;

        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "twitter request");
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // HTTP failures take precedence over errors reported in the body
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.token_cache.invalidate().await;
            }
            return Err(BotwitError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
            if !envelope.errors.is_empty() {
                return Err(BotwitError::Twitter(ApiErrors(envelope.errors)));
            }
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn bearer_token(&self) -> Result<String, BotwitError> {
        self.token_cache
            .get_or_refresh(|| self.exchange_token())
            .await
    }

    /// OAuth2 client credentials exchange.
    ///
    /// <https://developer.twitter.com/en/docs/authentication/api-reference/token>
    async fn exchange_token(&self) -> Result<String, BotwitError> {
        debug!("requesting a new bearer token");
        let response = self
            .client
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BotwitError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(BotwitError::Auth(format!(
                "unexpected token type: {}",
                token.token_type
            )));
        }

        Ok(token.access_token)
    }
}

fn unpack_list(payload: TweetListPayload) -> Vec<Tweet> {
    match payload.includes {
        Some(includes) => payload
            .data
            .into_iter()
            .map(|t| t.with_includes(&includes))
            .collect(),
        None => payload.data,
    }
}
