use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::github::{EventKind, GithubUser};

/// A webhook event that the bot knows how to turn into a notification.
///
/// Each variant keeps only the parts of the GitHub payload that the notification rules look at.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Issue(IssuesPayload),
    IssueComment(IssueCommentPayload),
    PullRequest(PullRequestPayload),
    PullRequestReview(PullRequestReviewPayload),
    PullRequestReviewComment(PullRequestReviewCommentPayload),
    WorkflowRun(WorkflowRunPayload),
}

impl WebhookEvent {
    /// Interprets `payload` according to the declared event `kind`.
    pub fn parse(kind: EventKind, payload: &serde_json::Value) -> serde_json::Result<Self> {
        let event = match kind {
            EventKind::Issues => Self::Issue(IssuesPayload::deserialize(payload)?),
            EventKind::IssueComment => {
                Self::IssueComment(IssueCommentPayload::deserialize(payload)?)
            }
            EventKind::PullRequest => Self::PullRequest(PullRequestPayload::deserialize(payload)?),
            EventKind::PullRequestReview => {
                Self::PullRequestReview(PullRequestReviewPayload::deserialize(payload)?)
            }
            EventKind::PullRequestReviewComment => Self::PullRequestReviewComment(
                PullRequestReviewCommentPayload::deserialize(payload)?,
            ),
            EventKind::WorkflowRun => Self::WorkflowRun(WorkflowRunPayload::deserialize(payload)?),
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Issue(_) => EventKind::Issues,
            Self::IssueComment(_) => EventKind::IssueComment,
            Self::PullRequest(_) => EventKind::PullRequest,
            Self::PullRequestReview(_) => EventKind::PullRequestReview,
            Self::PullRequestReviewComment(_) => EventKind::PullRequestReviewComment,
            Self::WorkflowRun(_) => EventKind::WorkflowRun,
        }
    }

    pub fn action(&self) -> &str {
        match self {
            Self::Issue(payload) => &payload.action,
            Self::IssueComment(payload) => &payload.action,
            Self::PullRequest(payload) => &payload.action,
            Self::PullRequestReview(payload) => &payload.action,
            Self::PullRequestReviewComment(payload) => &payload.action,
            Self::WorkflowRun(payload) => &payload.action,
        }
    }

    /// Login of the GitHub user that triggered the event.
    pub fn sender(&self) -> &str {
        let sender = match self {
            Self::Issue(payload) => &payload.sender,
            Self::IssueComment(payload) => &payload.sender,
            Self::PullRequest(payload) => &payload.sender,
            Self::PullRequestReview(payload) => &payload.sender,
            Self::PullRequestReviewComment(payload) => &payload.sender,
            Self::WorkflowRun(payload) => &payload.sender,
        };
        &sender.login
    }
}

/// https://docs.github.com/en/webhooks/webhook-events-and-payloads#issues
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IssuesPayload {
    pub action: String,
    pub issue: Issue,
    /// The user that was (un)assigned, only present for `assigned` and `unassigned`.
    #[serde(default)]
    pub assignee: Option<GithubUser>,
    pub sender: GithubUser,
}

/// https://docs.github.com/en/webhooks/webhook-events-and-payloads#issue_comment
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IssueCommentPayload {
    pub action: String,
    pub issue: Issue,
    pub comment: Comment,
    pub sender: GithubUser,
}

/// https://docs.github.com/en/webhooks/webhook-events-and-payloads#pull_request
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PullRequestPayload {
    pub action: String,
    pub pull_request: PullRequest,
    /// Only present for `review_requested` events that target a single user (not a team).
    #[serde(default)]
    pub requested_reviewer: Option<GithubUser>,
    pub sender: GithubUser,
}

/// https://docs.github.com/en/webhooks/webhook-events-and-payloads#pull_request_review
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PullRequestReviewPayload {
    pub action: String,
    pub review: Review,
    pub pull_request: PullRequest,
    pub sender: GithubUser,
}

/// https://docs.github.com/en/webhooks/webhook-events-and-payloads#pull_request_review_comment
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PullRequestReviewCommentPayload {
    pub action: String,
    pub comment: ReviewComment,
    pub pull_request: PullRequest,
    pub sender: GithubUser,
}

/// https://docs.github.com/en/webhooks/webhook-events-and-payloads#workflow_run
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowRunPayload {
    pub action: String,
    pub workflow_run: WorkflowRun,
    pub sender: GithubUser,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Issue {
    pub title: String,
    pub html_url: Url,
    pub body: Option<String>,
    pub user: GithubUser,
    #[serde(default)]
    pub assignee: Option<GithubUser>,
    #[serde(default)]
    pub assignees: Vec<GithubUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Logins of all assignees, the legacy `assignee` field is appended if it is not listed.
    pub fn assignee_logins(&self) -> Vec<&str> {
        assignee_logins(&self.assignees, self.assignee.as_ref())
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Comment {
    pub html_url: Url,
    pub body: Option<String>,
    pub user: GithubUser,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub title: String,
    pub html_url: Url,
    pub body: Option<String>,
    pub user: GithubUser,
    #[serde(default)]
    pub requested_reviewers: Vec<GithubUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Review {
    /// `approved`, `changes_requested` or `commented`.
    pub state: String,
    pub html_url: Url,
    pub body: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ReviewComment {
    pub html_url: Url,
    pub body: Option<String>,
    pub user: GithubUser,
    /// Set when the comment was submitted as a part of a review.
    pub pull_request_review_id: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    pub name: String,
    pub display_title: String,
    pub html_url: Url,
    pub conclusion: Option<String>,
}

fn assignee_logins<'a>(assignees: &'a [GithubUser], assignee: Option<&'a GithubUser>) -> Vec<&'a str> {
    let mut logins: Vec<&str> = assignees.iter().map(|user| user.login.as_str()).collect();
    if let Some(assignee) = assignee {
        if !logins.contains(&assignee.login.as_str()) {
            logins.push(&assignee.login);
        }
    }
    logins
}
