use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;

use crate::github::event::{
    IssueCommentPayload, IssuesPayload, PullRequestPayload, PullRequestReviewCommentPayload,
    PullRequestReviewPayload, WorkflowRunPayload,
};
use crate::github::WebhookEvent;

/// Why is a user relevant to an event?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvolvementReason {
    /// Author of the issue or pull request.
    Creator,
    /// Mentioned in the issue or pull request description.
    MentionedInBody,
    /// Mentioned in a comment.
    MentionedInComment,
    Assignee,
    /// Requested to review a pull request, or mentioned in its description.
    Reviewer,
    Sender,
    /// The user triggered a workflow run that has finished.
    WorkflowComplete,
}

impl InvolvementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::MentionedInBody => "mentioned_in_body",
            Self::MentionedInComment => "mentioned_in_comment",
            Self::Assignee => "assignee",
            Self::Reviewer => "reviewer",
            Self::Sender => "sender",
            Self::WorkflowComplete => "workflow_complete",
        }
    }
}

impl Display for InvolvementReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Users involved in an event, each with the reasons of their involvement.
///
/// Users and reasons are kept in the order in which they were discovered. A user found for the
/// same reason twice has that reason listed twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvolvementMap {
    users: Vec<(String, Vec<InvolvementReason>)>,
}

impl InvolvementMap {
    pub fn add<'a>(&mut self, logins: impl IntoIterator<Item = &'a str>, reason: InvolvementReason) {
        for login in logins {
            match self.users.iter_mut().find(|(user, _)| user == login) {
                Some((_, reasons)) => reasons.push(reason),
                None => self.users.push((login.to_string(), vec![reason])),
            }
        }
    }

    pub fn remove(&mut self, login: &str) -> Option<Vec<InvolvementReason>> {
        let index = self.users.iter().position(|(user, _)| user == login)?;
        Some(self.users.remove(index).1)
    }

    pub fn get(&self, login: &str) -> Option<&[InvolvementReason]> {
        self.users
            .iter()
            .find(|(user, _)| user == login)
            .map(|(_, reasons)| reasons.as_slice())
    }

    pub fn contains(&self, login: &str) -> bool {
        self.get(login).is_some()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[InvolvementReason])> {
        self.users
            .iter()
            .map(|(user, reasons)| (user.as_str(), reasons.as_slice()))
    }

    pub fn logins(&self) -> impl Iterator<Item = &str> {
        self.users.iter().map(|(user, _)| user.as_str())
    }
}

// Logins are letters, digits and underscores, joined by single hyphens.
static MENTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z0-9_]+(?:-[A-Za-z0-9_]+)*)").expect("valid mention regex")
});

/// Returns the logins `@`-mentioned in `text`, in order of appearance.
pub fn find_mentions(text: Option<&str>) -> Vec<&str> {
    let Some(text) = text else {
        return vec![];
    };
    MENTION_REGEX
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|login| login.as_str())
        .collect()
}

/// Computes the users involved in `event`.
pub fn involved_users(event: &WebhookEvent) -> InvolvementMap {
    match event {
        WebhookEvent::Issue(payload) => issue_involvement(payload),
        WebhookEvent::IssueComment(payload) => issue_comment_involvement(payload),
        WebhookEvent::PullRequest(payload) => pull_request_involvement(payload),
        WebhookEvent::PullRequestReview(payload) => review_involvement(payload),
        WebhookEvent::PullRequestReviewComment(payload) => review_comment_involvement(payload),
        WebhookEvent::WorkflowRun(payload) => workflow_run_involvement(payload),
    }
}

fn issue_involvement(payload: &IssuesPayload) -> InvolvementMap {
    let mut users = InvolvementMap::default();
    let sender = payload.sender.login.as_str();
    match payload.action.as_str() {
        "opened" | "reopened" | "edited" => {
            users.add(payload.issue.assignee_logins(), InvolvementReason::Assignee);
            users.add(
                find_mentions(payload.issue.body.as_deref()),
                InvolvementReason::MentionedInBody,
            );
        }
        "assigned" | "unassigned" => {
            if let Some(assignee) = &payload.assignee {
                if assignee.login != sender {
                    users.add([assignee.login.as_str()], InvolvementReason::Assignee);
                }
            }
        }
        _ => {}
    }

    // The sender knows what they just did
    users.remove(sender);
    users
}

fn issue_comment_involvement(payload: &IssueCommentPayload) -> InvolvementMap {
    let mut users = InvolvementMap::default();
    if !matches!(payload.action.as_str(), "created" | "edited") {
        return users;
    }

    users.add(payload.issue.assignee_logins(), InvolvementReason::Assignee);
    users.add(
        find_mentions(payload.issue.body.as_deref()),
        InvolvementReason::MentionedInBody,
    );
    users.add(
        find_mentions(payload.comment.body.as_deref()),
        InvolvementReason::MentionedInComment,
    );
    users
}

fn pull_request_involvement(payload: &PullRequestPayload) -> InvolvementMap {
    let mut users = InvolvementMap::default();
    let pull_request = &payload.pull_request;
    match payload.action.as_str() {
        "opened" | "reopened" | "edited" | "synchronize" => {
            users.add(
                pull_request
                    .requested_reviewers
                    .iter()
                    .map(|user| user.login.as_str()),
                InvolvementReason::Reviewer,
            );
            users.add(
                find_mentions(pull_request.body.as_deref()),
                InvolvementReason::Reviewer,
            );
        }
        "review_requested" => {
            if let Some(reviewer) = &payload.requested_reviewer {
                users.add([reviewer.login.as_str()], InvolvementReason::Reviewer);
            }
        }
        _ => {}
    }
    users
}

fn review_involvement(payload: &PullRequestReviewPayload) -> InvolvementMap {
    let mut users = InvolvementMap::default();
    if payload.action == "submitted" {
        users.add(
            [payload.pull_request.user.login.as_str()],
            InvolvementReason::Creator,
        );
    }
    users
}

fn review_comment_involvement(payload: &PullRequestReviewCommentPayload) -> InvolvementMap {
    let mut users = InvolvementMap::default();
    users.add(
        [payload.pull_request.user.login.as_str()],
        InvolvementReason::Creator,
    );
    users.add(
        find_mentions(payload.comment.body.as_deref()),
        InvolvementReason::MentionedInComment,
    );
    users
}

fn workflow_run_involvement(payload: &WorkflowRunPayload) -> InvolvementMap {
    let mut users = InvolvementMap::default();
    users.add(
        [payload.sender.login.as_str()],
        InvolvementReason::WorkflowComplete,
    );
    users
}

#[cfg(test)]
mod tests {
    use crate::notify::involvement::{find_mentions, InvolvementMap, InvolvementReason};
    use crate::notify::ClassifiedEvent;
    use crate::tests::payload::{
        issue_comment_event, issue_event, pull_request_event, review_comment_event, review_event,
        workflow_run_event,
    };

    use InvolvementReason::*;

    #[test]
    fn mentions_in_order() {
        assert_eq!(
            find_mentions(Some("ping @alice and @bob-2")),
            vec!["alice", "bob-2"]
        );
    }

    #[test]
    fn mentions_absent_body() {
        assert!(find_mentions(None).is_empty());
    }

    #[test]
    fn mentions_keep_duplicates() {
        assert_eq!(
            find_mentions(Some("@carol, see above @carol")),
            vec!["carol", "carol"]
        );
    }

    #[test]
    fn mentions_stop_at_punctuation() {
        assert_eq!(
            find_mentions(Some("thanks @dave! also @erin_x. and @frank-")),
            vec!["dave", "erin_x", "frank"]
        );
    }

    #[test]
    fn mentions_stop_at_double_hyphen() {
        assert_eq!(
            find_mentions(Some("@a--b and @mona-lisa-2")),
            vec!["a", "mona-lisa-2"]
        );
    }

    #[test]
    fn mentions_without_login() {
        assert!(find_mentions(Some("mail me @ work, or @-mention")).is_empty());
    }

    #[test]
    fn map_accumulates_reasons() {
        let mut map = InvolvementMap::default();
        map.add(["bob", "carol"], Assignee);
        map.add(["bob", "bob"], MentionedInBody);
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get("bob"),
            Some([Assignee, MentionedInBody, MentionedInBody].as_slice())
        );
        assert_eq!(map.logins().collect::<Vec<_>>(), vec!["bob", "carol"]);
        assert_eq!(map.remove("bob").map(|r| r.len()), Some(3));
        assert!(!map.contains("bob"));
    }

    #[test]
    fn issue_opened() {
        let event = issue_event("opened")
            .sender("alice")
            .body("cc @bob")
            .assignees(&["carol"])
            .classified();
        let users = event.involved_users();
        assert_eq!(users.len(), 2);
        assert_eq!(users.get("bob"), Some([MentionedInBody].as_slice()));
        assert_eq!(users.get("carol"), Some([Assignee].as_slice()));
    }

    #[test]
    fn issue_opened_never_contains_sender() {
        for action in ["opened", "reopened"] {
            let event = issue_event(action)
                .sender("alice")
                .body("note to self @alice, cc @bob")
                .assignees(&["alice"])
                .classified();
            let users = event.involved_users();
            assert!(!users.contains("alice"));
            assert_eq!(users.get("bob"), Some([MentionedInBody].as_slice()));
        }
    }

    #[test]
    fn issue_assigned_to_other() {
        let event = issue_event("assigned")
            .sender("alice")
            .assignee("bob")
            .classified();
        assert_eq!(event.involved_users().get("bob"), Some([Assignee].as_slice()));
    }

    #[test]
    fn issue_self_assigned() {
        let event = issue_event("unassigned")
            .sender("alice")
            .assignee("alice")
            .classified();
        assert!(event.involved_users().is_empty());
    }

    #[test]
    fn issue_other_action() {
        let event = issue_event("labeled")
            .body("@bob")
            .assignees(&["carol"])
            .classified();
        assert!(event.involved_users().is_empty());
    }

    #[test]
    fn involved_users_idempotent() {
        let event = issue_event("edited")
            .body("@bob @carol @bob")
            .assignees(&["dave"])
            .classified();
        let first = event.involved_users().clone();
        let second = event.involved_users();
        assert_eq!(&first, second);
        assert_eq!(
            second.logins().collect::<Vec<_>>(),
            vec!["dave", "bob", "carol"]
        );
    }

    #[test]
    fn issue_comment_created() {
        let event = issue_comment_event("created")
            .assignees(&["carol"])
            .issue_body("@bob please check")
            .comment_body("@carol @erin any update?")
            .classified();
        let users = event.involved_users();
        assert_eq!(
            users.get("carol"),
            Some([Assignee, MentionedInComment].as_slice())
        );
        assert_eq!(users.get("bob"), Some([MentionedInBody].as_slice()));
        assert_eq!(users.get("erin"), Some([MentionedInComment].as_slice()));
    }

    #[test]
    fn issue_comment_deleted() {
        let event = issue_comment_event("deleted")
            .assignees(&["carol"])
            .comment_body("@bob")
            .classified();
        assert!(event.involved_users().is_empty());
    }

    #[test]
    fn pull_request_opened() {
        let event = pull_request_event("opened")
            .requested_reviewers(&["bob"])
            .body("@carol can you also take a look? @bob")
            .classified();
        let users = event.involved_users();
        assert_eq!(users.get("bob"), Some([Reviewer, Reviewer].as_slice()));
        assert_eq!(users.get("carol"), Some([Reviewer].as_slice()));
    }

    #[test]
    fn pull_request_review_requested() {
        let event = pull_request_event("review_requested")
            .requested_reviewers(&["bob", "carol"])
            .requested_reviewer("carol")
            .classified();
        let users = event.involved_users();
        assert_eq!(users.len(), 1);
        assert_eq!(users.get("carol"), Some([Reviewer].as_slice()));
    }

    #[test]
    fn pull_request_team_review_requested() {
        let event = pull_request_event("review_requested").classified();
        assert!(event.involved_users().is_empty());
    }

    #[test]
    fn pull_request_closed() {
        let event = pull_request_event("closed")
            .requested_reviewers(&["bob"])
            .classified();
        assert!(event.involved_users().is_empty());
    }

    #[test]
    fn review_submitted() {
        let event = review_event("submitted").author("erin").classified();
        let users = event.involved_users();
        assert_eq!(users.len(), 1);
        assert_eq!(users.get("erin"), Some([Creator].as_slice()));
    }

    #[test]
    fn review_dismissed() {
        let event = review_event("dismissed").author("erin").classified();
        assert!(event.involved_users().is_empty());
    }

    #[test]
    fn review_comment() {
        let event = review_comment_event("created")
            .author("erin")
            .body("@frank what do you think?")
            .classified();
        let users = event.involved_users();
        assert_eq!(users.get("erin"), Some([Creator].as_slice()));
        assert_eq!(users.get("frank"), Some([MentionedInComment].as_slice()));
    }

    #[test]
    fn workflow_run() {
        let event: ClassifiedEvent = workflow_run_event("completed").sender("dave").classified();
        assert_eq!(
            event.involved_users().get("dave"),
            Some([WorkflowComplete].as_slice())
        );
    }
}
