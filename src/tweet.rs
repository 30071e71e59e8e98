use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(deserialize_with = "twitter_id::one")]
    pub id: u64,
    pub name: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    RepliedTo,
    Quoted,
    Retweeted,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    #[serde(deserialize_with = "twitter_id::one")]
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Tweet {
    #[serde(deserialize_with = "twitter_id::one")]
    pub id: u64,
    #[serde(deserialize_with = "twitter_id::one")]
    pub author_id: u64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    // Always sent by the API, even when not asked for
    #[serde(default, deserialize_with = "twitter_id::many")]
    pub edit_history_tweet_ids: Vec<u64>,

    #[serde(default, deserialize_with = "twitter_id::optional")]
    pub conversation_id: Option<u64>,

    #[serde(default)]
    pub referenced_tweets: Option<Vec<ReferencedTweet>>,

    /// Users embedded by the response's `includes`
    #[serde(default)]
    pub users: Option<Vec<User>>,

    /// Tweets embedded by the response's `includes`
    #[serde(default)]
    pub tweets: Option<Vec<Tweet>>,
}

/// Entities a response embeds next to its `data` when expansions are requested.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Includes {
    #[serde(default)]
    pub users: Option<Vec<User>>,
    #[serde(default)]
    pub tweets: Option<Vec<Tweet>>,
}

/// Single-resource response, e.g. `GET /2/tweets/:id`.
#[derive(Debug, Deserialize)]
pub struct TweetPayload {
    pub data: Tweet,
    #[serde(default)]
    pub includes: Option<Includes>,
}

/// List response, e.g. search or timelines. `data` is absent when nothing matched.
#[derive(Debug, Deserialize)]
pub struct TweetListPayload {
    #[serde(default)]
    pub data: Vec<Tweet>,
    #[serde(default)]
    pub includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub data: User,
}

impl Tweet {
    pub fn from_payload(payload: TweetPayload) -> Tweet {
        let mut tweet = payload.data;
        if let Some(includes) = payload.includes {
            tweet.users = includes.users;
            tweet.tweets = includes.tweets;
        }
        tweet
    }

    /// Attach a list response's shared `includes` to this tweet.
    pub fn with_includes(mut self, includes: &Includes) -> Tweet {
        if includes.users.is_some() {
            self.users = includes.users.clone();
        }
        if includes.tweets.is_some() {
            self.tweets = includes.tweets.clone();
        }
        self
    }

    pub fn author(&self) -> Option<&User> {
        self.included_user(self.author_id)
    }

    pub fn included_user(&self, id: u64) -> Option<&User> {
        self.users
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|u| u.id == id)
    }

    pub fn references(&self) -> &[ReferencedTweet] {
        self.referenced_tweets.as_deref().unwrap_or_default()
    }

    /// Look up a tweet embedded through the `referenced_tweets.id` expansion.
    pub fn included_tweet(&self, id: u64) -> Option<&Tweet> {
        self.tweets
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|t| t.id == id)
    }
}

impl std::fmt::Display for Tweet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const TEXT_PEEK_MAX_LEN: usize = 30;

        write!(f, "<Tweet n°{}", self.id)?;
        if let Some(author) = self.author() {
            write!(f, " - {}", author.username)?;
        }
        write!(f, "> ")?;

        if self.text.chars().count() > TEXT_PEEK_MAX_LEN {
            let peek: String = self.text.chars().take(TEXT_PEEK_MAX_LEN).collect();
            write!(f, "{}...", peek)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

/// Twitter sends snowflake ids as JSON strings; accept numbers too.
mod twitter_id {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Str(String),
        Num(u64),
    }

    impl Repr {
        fn into_id<E: Error>(self) -> Result<u64, E> {
            match self {
                Repr::Num(n) => Ok(n),
                Repr::Str(s) => s
                    .parse()
                    .map_err(|_| E::custom(format!("invalid tweet id: {:?}", s))),
            }
        }
    }

    pub fn one<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        Repr::deserialize(d)?.into_id()
    }

    pub fn optional<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Option::<Repr>::deserialize(d)?
            .map(Repr::into_id)
            .transpose()
    }

    pub fn many<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u64>, D::Error> {
        Vec::<Repr>::deserialize(d)?
            .into_iter()
            .map(Repr::into_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_payload_merges_includes() {
        let payload: TweetPayload = serde_json::from_value(json!({
            "data": {
                "id": "1",
                "author_id": "7",
                "text": "hello there",
                "created_at": "2022-11-20T10:00:00.000Z",
                "edit_history_tweet_ids": ["1"],
                "referenced_tweets": [{"type": "replied_to", "id": "10"}]
            },
            "includes": {
                "users": [
                    {"id": "7", "name": "Author", "username": "author"},
                    {"id": "8", "name": "Other", "username": "other"}
                ]
            }
        }))
        .unwrap();

        let tweet = Tweet::from_payload(payload);
        let users = tweet.users.as_ref().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(tweet.author().unwrap().username, "author");
        assert_eq!(tweet.tweets, None);
        assert_eq!(
            tweet.references(),
            &[ReferencedTweet {
                kind: ReferenceKind::RepliedTo,
                id: 10
            }]
        );
        assert_eq!(tweet.edit_history_tweet_ids, vec![1]);
    }

    #[test]
    fn payload_without_includes() {
        let payload: TweetPayload = serde_json::from_value(json!({
            "data": {
                "id": 3,
                "author_id": 4,
                "text": "plain",
                "created_at": "2022-11-20T10:00:00Z",
                "edit_history_tweet_ids": [3],
                "conversation_id": "3"
            }
        }))
        .unwrap();

        let tweet = Tweet::from_payload(payload);
        assert_eq!(tweet.conversation_id, Some(3));
        assert!(tweet.author().is_none());
        assert!(tweet.references().is_empty());
    }

    #[test]
    fn invalid_id_is_rejected() {
        let result: Result<User, _> =
            serde_json::from_value(json!({"id": "abc", "name": "n", "username": "u"}));
        assert!(result.is_err());
    }

    #[test]
    fn display_peeks_text() {
        let tweet: Tweet = serde_json::from_value(json!({
            "id": "5",
            "author_id": "7",
            "text": "a very long tweet that goes well past thirty characters",
            "created_at": "2022-11-20T10:00:00Z",
            "users": [{"id": "7", "name": "Author", "username": "author"}]
        }))
        .unwrap();
        assert_eq!(
            tweet.to_string(),
            "<Tweet n°5 - author> a very long tweet that goes we..."
        );
    }
}
