use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum BotwitError {
    #[error("unable to send request: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("twitter api error: {0}")]
    Twitter(ApiErrors),

    #[error("notion api error ({status} {code}): {message}")]
    Notion {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unable to authenticate: {0}")]
    Auth(String),

    #[error("unable to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unable to format date: {0}")]
    Format(#[from] time::error::Format),

    #[error("tweet {tweet_id} does not reference any tweet")]
    MissingReference { tweet_id: u64 },

    #[error("tweet {tweet_id} references {count} tweets, only one is supported")]
    AmbiguousReference { tweet_id: u64, count: usize },

    #[error("tweet {tweet_id} has no conversation id")]
    MissingConversation { tweet_id: u64 },
}

/// One entry of the `errors` array Twitter puts in a response body, e.g.
///
/// ```json
/// {
///     "value": "trashh_devowejr",
///     "detail": "Could not find user with username: [trashh_devowejr].",
///     "title": "Not Found Error",
///     "resource_type": "user",
///     "parameter": "username",
///     "resource_id": "trashh_devowejr",
///     "type": "https://api.twitter.com/2/problems/resource-not-found"
/// }
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiProblem {
    pub title: Option<String>,
    pub detail: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub parameter: Option<String>,
    pub value: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl std::fmt::Display for ApiProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resource = self
            .resource_type
            .as_deref()
            .or(self.kind.as_deref())
            .unwrap_or("unknown");
        let title = self.title.as_deref().unwrap_or("Error");
        let detail = self.detail.as_deref().unwrap_or("no detail");
        write!(f, "{} '{}': {}", resource, title, detail)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrors(pub Vec<ApiProblem>);

impl std::fmt::Display for ApiErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "twitter api reported an error");
        }
        for (i, problem) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", problem)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(value: &str) -> ApiProblem {
        serde_json::from_value(serde_json::json!({
            "value": value,
            "detail": format!("Could not find user with username: [{}].", value),
            "title": "Not Found Error",
            "resource_type": "user",
            "parameter": "username",
            "resource_id": value,
            "type": "https://api.twitter.com/2/problems/resource-not-found"
        }))
        .unwrap()
    }

    #[test]
    fn single_problem() {
        let errors = ApiErrors(vec![not_found("trashh_devowejr")]);
        assert_eq!(
            errors.to_string(),
            "user 'Not Found Error': Could not find user with username: [trashh_devowejr]."
        );
    }

    #[test]
    fn several_problems_are_joined() {
        let errors = ApiErrors(vec![not_found("a"), not_found("b")]);
        let s = errors.to_string();
        assert_eq!(s.matches("Not Found Error").count(), 2);
        assert!(s.contains("[a].; user"));
    }

    #[test]
    fn sparse_problem_falls_back_to_type() {
        let problem: ApiProblem = serde_json::from_value(serde_json::json!({
            "type": "https://api.twitter.com/2/problems/invalid-request"
        }))
        .unwrap();
        assert_eq!(
            problem.to_string(),
            "https://api.twitter.com/2/problems/invalid-request 'Error': no detail"
        );
        assert_eq!(
            ApiErrors::default().to_string(),
            "twitter api reported an error"
        );
    }
}
