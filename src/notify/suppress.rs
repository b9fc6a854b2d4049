use std::fmt::{Display, Formatter};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::github::WebhookEvent;
use crate::notify::ClassifiedEvent;

/// Why was a notification not sent for an event?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nobody gets notified about this action.
    IgnoredAction,
    /// The event does not involve anybody.
    NobodyInvolved,
    /// The event was emitted together with the event that created the issue or pull request,
    /// which was already notified.
    CorrelatedWithCreation,
    /// The comment belongs to a review, which has its own notification.
    CoveredByReview,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::IgnoredAction => "action is not notified",
            Self::NobodyInvolved => "nobody is involved",
            Self::CorrelatedWithCreation => "correlated with the creation event",
            Self::CoveredByReview => "covered by the review notification",
        };
        f.write_str(reason)
    }
}

pub fn should_skip(event: &ClassifiedEvent, correlation_window: Duration) -> bool {
    skip_reason(event, correlation_window).is_some()
}

/// Returns the reason why no notification should be sent for `event`, if there is one.
pub fn skip_reason(event: &ClassifiedEvent, correlation_window: Duration) -> Option<SkipReason> {
    let action = event.action();
    match event.event() {
        WebhookEvent::Issue(payload) => {
            if matches!(action, "milestoned" | "labeled" | "closed" | "pinned") {
                return Some(SkipReason::IgnoredAction);
            }
            if action == "edited" && event.involved_users().is_empty() {
                return Some(SkipReason::NobodyInvolved);
            }
            if action == "assigned"
                && within_window(
                    payload.issue.created_at,
                    payload.issue.updated_at,
                    correlation_window,
                )
            {
                return Some(SkipReason::CorrelatedWithCreation);
            }
            None
        }
        WebhookEvent::IssueComment(_) => {
            (!matches!(action, "created" | "edited")).then_some(SkipReason::IgnoredAction)
        }
        WebhookEvent::PullRequest(payload) => {
            if event.involved_users().is_empty() {
                return Some(SkipReason::NobodyInvolved);
            }
            if matches!(action, "assigned" | "labeled") {
                return Some(SkipReason::IgnoredAction);
            }
            if action == "review_requested"
                && within_window(
                    payload.pull_request.created_at,
                    payload.pull_request.updated_at,
                    correlation_window,
                )
            {
                return Some(SkipReason::CorrelatedWithCreation);
            }
            None
        }
        WebhookEvent::PullRequestReview(_) => {
            (action != "submitted").then_some(SkipReason::IgnoredAction)
        }
        WebhookEvent::PullRequestReviewComment(payload) => {
            let covered = payload.comment.pull_request_review_id.is_some()
                && action == "created"
                && event.involved_users().len() == 1;
            covered.then_some(SkipReason::CoveredByReview)
        }
        WebhookEvent::WorkflowRun(_) => {
            (action != "completed").then_some(SkipReason::IgnoredAction)
        }
    }
}

/// Was the object updated at most `window` after it was created?
fn within_window(created_at: DateTime<Utc>, updated_at: DateTime<Utc>, window: Duration) -> bool {
    let elapsed = (updated_at - created_at).num_milliseconds();
    let window = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    elapsed <= window
}
