pub mod auth;
pub mod error;
pub mod memo;
pub mod notion;
pub mod tweet;
pub mod twitter;

use std::collections::HashSet;

use futures_util::StreamExt;
use time::UtcOffset;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

pub use crate::auth::TokenCache;
pub use crate::error::{ApiErrors, ApiProblem, BotwitError};
pub use crate::memo::{get_recent_memos, TweetMemo};
pub use crate::notion::{memo_properties, notion_number, NotionClient};
pub use crate::tweet::{ReferenceKind, ReferencedTweet, Tweet, User};
pub use crate::twitter::{TweetExpansion, TweetField, TwitterClient};

/// Outcome of one archiving run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Memos built from the mention search
    pub seen: usize,
    /// Memos whose mention was already in the database
    pub skipped: usize,
    /// Pages created, or that would have been in dry-run mode
    pub created: usize,
}

/// Archives the conversations a user flagged by mentioning themself into a
/// Notion database.
#[derive(TypedBuilder)]
pub struct Archiver<'a> {
    twitter: &'a TwitterClient,

    notion: &'a NotionClient,

    #[builder(setter(into))]
    database_id: String,

    #[builder(setter(into))]
    username: String,

    #[builder(default = UtcOffset::UTC)]
    utc_offset: UtcOffset,

    #[builder(default)]
    dry_run: bool,
}

impl<'a> Archiver<'a> {
    pub async fn archive_recent_memos(&self) -> Result<ArchiveReport, BotwitError> {
        let me = self.twitter.get_user(&self.username).await?;
        debug!(id = me.id, username = %me.username, "resolved user");

        let memos = get_recent_memos(self.twitter, &me, self.utc_offset).await?;
        self.publish_new_memos(memos).await
    }

    /// Create a page for every memo not recorded yet, in order.
    ///
    /// Pages created before a failure stay in the database.
    pub async fn publish_new_memos(
        &self,
        memos: Vec<TweetMemo>,
    ) -> Result<ArchiveReport, BotwitError> {
        let stored = self.stored_tweet_ids().await?;
        let seen = memos.len();
        let new_memos = filter_new_memos(memos, &stored);

        let mut report = ArchiveReport {
            seen,
            skipped: seen - new_memos.len(),
            created: 0,
        };

        for memo in new_memos {
            let properties = memo_properties(&memo)?;
            if self.dry_run {
                info!(tweet_id = memo.my_tweet.id, url = %memo.url(), "dry run, skipping page creation");
                debug!(%properties, "page properties");
            } else {
                let page = self.notion.create_page(&self.database_id, properties).await?;
                info!(tweet_id = memo.my_tweet.id, page = %page.id, "archived conversation");
            }
            report.created += 1;
        }

        Ok(report)
    }

    /// Mention ids already recorded in the database.
    pub async fn stored_tweet_ids(&self) -> Result<HashSet<u64>, BotwitError> {
        let rows = self.notion.query_database(&self.database_id);
        futures_util::pin_mut!(rows);

        let mut ids = HashSet::new();
        while let Some(page) = rows.next().await {
            let page = page?;
            match page.tweet_id() {
                Some(id) => {
                    ids.insert(notion_number(id));
                }
                None => warn!(page = %page.id, "row has no tweet_id"),
            }
        }
        Ok(ids)
    }
}

/// Keep memos whose mention id is not in `stored`.
///
/// `stored` holds ids as read back from Notion, see [`notion_number`].
pub fn filter_new_memos(memos: Vec<TweetMemo>, stored: &HashSet<u64>) -> Vec<TweetMemo> {
    memos
        .into_iter()
        .filter(|memo| !stored.contains(&notion_number(memo.my_tweet.id)))
        .collect()
}
