//! Contains the webhook ingress of the bot and the GitHub payload types it understands.
use std::fmt::{Display, Formatter};

pub mod event;
pub mod meta;
pub mod server;
pub mod webhook;

pub use event::WebhookEvent;
pub use webhook::{GitHubWebhook, ReceivedWebhook};

/// Value of the `X-GitHub-Event` header for the events that the bot handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Issues,
    IssueComment,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    WorkflowRun,
}

impl EventKind {
    /// Returns `None` for event kinds without notification rules (`ping`, `push`, ...).
    pub fn from_header(value: &str) -> Option<Self> {
        let kind = match value {
            "issues" => Self::Issues,
            "issue_comment" => Self::IssueComment,
            "pull_request" => Self::PullRequest,
            "pull_request_review" => Self::PullRequestReview,
            "pull_request_review_comment" => Self::PullRequestReviewComment,
            "workflow_run" => Self::WorkflowRun,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issues => "issues",
            Self::IssueComment => "issue_comment",
            Self::PullRequest => "pull_request",
            Self::PullRequestReview => "pull_request_review",
            Self::PullRequestReviewComment => "pull_request_review_comment",
            Self::WorkflowRun => "workflow_run",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GithubUser {
    pub login: String,
}
