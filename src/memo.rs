use once_cell::sync::Lazy;
use regex::Regex;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::UtcOffset;
use tracing::{debug, info};

use crate::error::BotwitError;
use crate::tweet::{Tweet, User};
use crate::twitter::{TweetExpansion, TweetField, TwitterClient};

pub const MEMO_TWEET_FIELDS: &[TweetField] = &[
    TweetField::Id,
    TweetField::AuthorId,
    TweetField::CreatedAt,
    TweetField::Text,
    TweetField::ConversationId,
    TweetField::ReferencedTweets,
];

/// Word that marks a mention as an archiving trigger; never a tag.
const TRIGGER_WORD: &str = "notion";

/// A mention paired with the conversation it points at.
#[derive(Debug, Clone)]
pub struct TweetMemo {
    pub me: User,
    pub author: User,
    pub my_tweet: Tweet,
    conversation: Vec<Tweet>,
    utc_offset: UtcOffset,
}

impl TweetMemo {
    /// `conversation` falls back to `[parent]` when empty.
    pub fn new(
        me: User,
        author: User,
        my_tweet: Tweet,
        parent: Tweet,
        conversation: Vec<Tweet>,
        utc_offset: UtcOffset,
    ) -> Self {
        let conversation = if conversation.is_empty() {
            vec![parent]
        } else {
            conversation
        };

        Self {
            me,
            author,
            my_tweet,
            conversation,
            utc_offset,
        }
    }

    pub fn conversation(&self) -> &[Tweet] {
        &self.conversation
    }

    pub fn tags(&self) -> Vec<String> {
        static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://").unwrap());

        let mut tags: Vec<String> = vec![];
        for word in self.my_tweet.text.split_whitespace() {
            if LINK_RE.is_match(word) {
                continue;
            }

            let tag = word.trim_start_matches('#');
            if tag.is_empty() || tag.starts_with('@') || tag.eq_ignore_ascii_case(TRIGGER_WORD) {
                continue;
            }
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_owned());
            }
        }
        tags
    }

    pub fn thread_text(&self) -> String {
        self.conversation
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Creation day of the mention, `YYYY-MM-DD`, in the configured offset.
    pub fn date(&self) -> Result<String, BotwitError> {
        static DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

        let date = self
            .my_tweet
            .created_at
            .to_offset(self.utc_offset)
            .format(DATE_FORMAT)?;
        Ok(date)
    }

    /// Link to the first tweet of the archived conversation.
    pub fn url(&self) -> String {
        format!(
            "https://twitter.com/{}/status/{}",
            self.author.username, self.conversation[0].id
        )
    }
}

pub fn mentions_query(me: &User) -> String {
    format!("from:{0} is:reply @{0}", me.username)
}

pub fn conversation_query(conversation_id: u64, author_id: u64) -> String {
    format!("conversation_id:{} from:{}", conversation_id, author_id)
}

/// Build one memo per reply in which `me` mentions themself.
///
/// Fails the whole batch on the first mention that cannot be resolved.
pub async fn get_recent_memos(
    client: &TwitterClient,
    me: &User,
    utc_offset: UtcOffset,
) -> Result<Vec<TweetMemo>, BotwitError> {
    let mentions = client
        .search_tweets(
            &mentions_query(me),
            MEMO_TWEET_FIELDS,
            &[
                TweetExpansion::ReferencedTweetsId,
                TweetExpansion::ReferencedTweetsIdAuthorId,
            ],
        )
        .await?;
    info!(count = mentions.len(), user = %me.username, "found mentions");

    let mut memos = Vec::with_capacity(mentions.len());
    for mention in mentions {
        memos.push(build_memo(client, me, mention, utc_offset).await?);
    }
    Ok(memos)
}

fn parent_id(mention: &Tweet) -> Result<u64, BotwitError> {
    match mention.references() {
        [] => Err(BotwitError::MissingReference {
            tweet_id: mention.id,
        }),
        [parent] => Ok(parent.id),
        references => Err(BotwitError::AmbiguousReference {
            tweet_id: mention.id,
            count: references.len(),
        }),
    }
}

async fn build_memo(
    client: &TwitterClient,
    me: &User,
    mention: Tweet,
    utc_offset: UtcOffset,
) -> Result<TweetMemo, BotwitError> {
    let parent_id = parent_id(&mention)?;

    // Prefer the copy embedded by the search expansion
    let parent = match mention.included_tweet(parent_id) {
        Some(parent) if parent.conversation_id.is_some() => parent.clone(),
        _ => {
            client
                .get_tweet(parent_id, MEMO_TWEET_FIELDS, &[TweetExpansion::AuthorId])
                .await?
        }
    };
    let conversation_id = parent
        .conversation_id
        .ok_or(BotwitError::MissingConversation {
            tweet_id: parent.id,
        })?;

    let author = match parent
        .author()
        .or_else(|| mention.included_user(parent.author_id))
    {
        Some(author) => author.clone(),
        None => client.get_user_by_id(parent.author_id).await?,
    };

    let mut conversation = client
        .search_tweets(
            &conversation_query(conversation_id, parent.author_id),
            MEMO_TWEET_FIELDS,
            &[],
        )
        .await?;
    conversation.sort_by_key(|t| (t.created_at, t.id));
    debug!(
        mention = %mention,
        conversation_id,
        tweets = conversation.len(),
        "resolved conversation"
    );

    Ok(TweetMemo::new(
        me.clone(),
        author,
        mention,
        parent,
        conversation,
        utc_offset,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::offset;

    fn tweet(id: u64, text: &str, created_at: &str) -> Tweet {
        serde_json::from_value(json!({
            "id": id.to_string(),
            "author_id": "7",
            "text": text,
            "created_at": created_at,
            "edit_history_tweet_ids": [id.to_string()],
        }))
        .unwrap()
    }

    fn user(id: u64, username: &str) -> User {
        User {
            id,
            name: username.to_uppercase(),
            username: username.to_owned(),
        }
    }

    fn memo(text: &str, conversation: Vec<Tweet>) -> TweetMemo {
        TweetMemo::new(
            user(1, "gjeusel"),
            user(7, "author"),
            tweet(42, text, "2022-11-20T23:30:00Z"),
            tweet(10, "parent", "2022-11-20T09:00:00Z"),
            conversation,
            offset!(+1),
        )
    }

    #[test]
    fn tags_skip_mentions_and_trigger_word() {
        let m = memo("@gjeusel notion recipe", vec![]);
        assert_eq!(m.tags(), vec!["recipe"]);

        let m = memo(
            "@gjeusel @someone Notion #rust async rust https://t.co/abc",
            vec![],
        );
        assert_eq!(m.tags(), vec!["rust", "async"]);

        let m = memo("@gjeusel notion", vec![]);
        assert!(m.tags().is_empty());
    }

    #[test]
    fn tags_never_contain_mentions() {
        for text in ["@a @b", "x @y z", "@@ @ notion", "#notion @notion notion", "#@sneaky tag"] {
            let tags = memo(text, vec![]).tags();
            assert!(tags.iter().all(|t| !t.starts_with('@')), "{:?}", tags);
            assert!(tags.iter().all(|t| t != "notion"), "{:?}", tags);
        }
    }

    #[test]
    fn empty_conversation_falls_back_to_parent() {
        let m = memo("@gjeusel notion", vec![]);
        assert_eq!(m.conversation().len(), 1);
        assert_eq!(m.conversation()[0].id, 10);
        assert_eq!(m.thread_text(), "parent");
        assert_eq!(m.url(), "https://twitter.com/author/status/10");
    }

    #[test]
    fn thread_text_splits_back_into_tweets() {
        let conversation = vec![
            tweet(10, "first", "2022-11-20T09:00:00Z"),
            tweet(11, "second\nline", "2022-11-20T09:01:00Z"),
            tweet(12, "third", "2022-11-20T09:02:00Z"),
        ];
        let m = memo("@gjeusel notion", conversation);
        let text = m.thread_text();
        assert_eq!(text, "first\n\nsecond\nline\n\nthird");
        assert_eq!(text.split("\n\n").count(), 3);
    }

    #[test]
    fn date_uses_configured_offset() {
        // 23:30 UTC is already the next day at +01:00
        let m = memo("@gjeusel notion", vec![]);
        assert_eq!(m.date().unwrap(), "2022-11-21");
    }

    #[test]
    fn date_is_zero_padded() {
        let m = TweetMemo::new(
            user(1, "gjeusel"),
            user(7, "author"),
            tweet(42, "@gjeusel notion", "2023-01-04T12:00:00Z"),
            tweet(10, "parent", "2023-01-04T09:00:00Z"),
            vec![],
            offset!(-5),
        );
        assert_eq!(m.date().unwrap(), "2023-01-04");
    }

    #[test]
    fn parent_must_be_unique() {
        let mut mention = tweet(42, "@gjeusel notion", "2022-11-20T10:00:00Z");
        assert!(matches!(
            parent_id(&mention),
            Err(BotwitError::MissingReference { tweet_id: 42 })
        ));

        mention.referenced_tweets = Some(
            serde_json::from_value(json!([
                {"type": "replied_to", "id": "10"},
                {"type": "quoted", "id": "11"}
            ]))
            .unwrap(),
        );
        assert!(matches!(
            parent_id(&mention),
            Err(BotwitError::AmbiguousReference {
                tweet_id: 42,
                count: 2
            })
        ));

        mention.referenced_tweets.as_mut().unwrap().truncate(1);
        assert_eq!(parent_id(&mention).unwrap(), 10);
    }

    #[test]
    fn queries() {
        let me = user(1, "gjeusel");
        assert_eq!(mentions_query(&me), "from:gjeusel is:reply @gjeusel");
        assert_eq!(conversation_query(100, 7), "conversation_id:100 from:7");
    }
}
