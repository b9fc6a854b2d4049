use url::Url;

use crate::github::event::{
    IssueCommentPayload, IssuesPayload, PullRequestPayload, PullRequestReviewCommentPayload,
    PullRequestReviewPayload, WorkflowRunPayload,
};
use crate::github::WebhookEvent;
use crate::utils::text::{humanize_action, truncate};

/// A message ready to be posted to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub link_title: String,
    pub link_url: Url,
    pub message: String,
}

/// Rendered form of an event. A missing message means that the action is not notified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEvent {
    pub title: String,
    pub link_title: String,
    pub link_url: Url,
    pub message: Option<String>,
}

impl RenderedEvent {
    pub fn into_notification(self) -> Option<Notification> {
        let RenderedEvent {
            title,
            link_title,
            link_url,
            message,
        } = self;
        Some(Notification {
            title,
            link_title,
            link_url,
            message: message?,
        })
    }
}

/// Renders `event`, copying at most `body_limit` characters of free text into the message.
pub fn render(event: &WebhookEvent, body_limit: usize) -> RenderedEvent {
    match event {
        WebhookEvent::Issue(payload) => render_issue(payload, body_limit),
        WebhookEvent::IssueComment(payload) => render_issue_comment(payload, body_limit),
        WebhookEvent::PullRequest(payload) => render_pull_request(payload, body_limit),
        WebhookEvent::PullRequestReview(payload) => render_review(payload, body_limit),
        WebhookEvent::PullRequestReviewComment(payload) => {
            render_review_comment(payload, body_limit)
        }
        WebhookEvent::WorkflowRun(payload) => render_workflow_run(payload),
    }
}

fn render_issue(payload: &IssuesPayload, body_limit: usize) -> RenderedEvent {
    let action = payload.action.as_str();
    let sender = &payload.sender.login;
    let title = match action {
        "opened" => "New Issue".to_string(),
        _ => format!("Issue {}", humanize_action(action)),
    };
    let message = match action {
        "opened" | "reopened" => Some(with_text(
            format!("{sender} {action} issue."),
            payload.issue.body.as_deref(),
            body_limit,
        )),
        "edited" | "assigned" | "unassigned" => Some(format!("{sender} {action} issue.")),
        _ => None,
    };
    RenderedEvent {
        title,
        link_title: payload.issue.title.clone(),
        link_url: payload.issue.html_url.clone(),
        message,
    }
}

fn render_issue_comment(payload: &IssueCommentPayload, body_limit: usize) -> RenderedEvent {
    let action = payload.action.as_str();
    let title = match action {
        "created" => "New Comment".to_string(),
        _ => format!("Issue Comment {}", humanize_action(action)),
    };
    let message = matches!(action, "created" | "edited").then(|| {
        with_text(
            format!("{} {action} a comment.", payload.comment.user.login),
            payload.comment.body.as_deref(),
            body_limit,
        )
    });
    RenderedEvent {
        title,
        link_title: format!("Comment on {}", payload.issue.title),
        link_url: payload.comment.html_url.clone(),
        message,
    }
}

fn render_pull_request(payload: &PullRequestPayload, body_limit: usize) -> RenderedEvent {
    let action = payload.action.as_str();
    let sender = &payload.sender.login;
    let title = match action {
        "opened" => "New PR".to_string(),
        "review_requested" => "Review Requested".to_string(),
        _ => format!("PR {}", humanize_action(action)),
    };
    let message = match action {
        "opened" | "edited" => {
            let mut message = format!("{sender} {action} PR.");
            if let Some(body) = non_empty(payload.pull_request.body.as_deref()) {
                message.push_str("\n\n**Content**\n");
                message.push_str(&truncate(body, body_limit));
            }
            Some(message)
        }
        "synchronize" | "reopened" => Some(format!("{sender} {action} PR.")),
        "review_requested" => Some(format!("{sender} requested review.")),
        _ => None,
    };
    RenderedEvent {
        title,
        link_title: payload.pull_request.title.clone(),
        link_url: payload.pull_request.html_url.clone(),
        message,
    }
}

fn render_review(payload: &PullRequestReviewPayload, body_limit: usize) -> RenderedEvent {
    let state = payload.review.state.as_str();
    let message = with_text(
        format!("{} {}.", payload.sender.login, state.replace('_', " ")),
        payload.review.body.as_deref(),
        body_limit,
    );
    RenderedEvent {
        title: format!("PR {} by Review", humanize_action(state)),
        link_title: payload.pull_request.title.clone(),
        link_url: payload.review.html_url.clone(),
        message: Some(message),
    }
}

fn render_review_comment(
    payload: &PullRequestReviewCommentPayload,
    body_limit: usize,
) -> RenderedEvent {
    let action = payload.action.as_str();
    let summary = format!("{} {action} comment.", payload.sender.login);
    let message = match action {
        "deleted" => summary,
        _ => with_text(summary, payload.comment.body.as_deref(), body_limit),
    };
    RenderedEvent {
        title: format!("PR Comment {}", humanize_action(action)),
        link_title: format!("Comment on {}", payload.pull_request.title),
        link_url: payload.comment.html_url.clone(),
        message: Some(message),
    }
}

fn render_workflow_run(payload: &WorkflowRunPayload) -> RenderedEvent {
    let run = &payload.workflow_run;
    let conclusion = run.conclusion.as_deref().unwrap_or("unknown");
    RenderedEvent {
        title: "Workflow Run Complete".to_string(),
        link_title: format!("{} for {}", run.name, run.display_title),
        link_url: run.html_url.clone(),
        message: Some(format!(
            "Workflow \"{}\" ended with status: **{conclusion}**",
            run.name
        )),
    }
}

/// Appends a (possibly shortened) copy of `text` as a separate paragraph.
fn with_text(summary: String, text: Option<&str>, body_limit: usize) -> String {
    match non_empty(text) {
        Some(text) => format!("{summary}\n\n{}", truncate(text, body_limit)),
        None => summary,
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|text| !text.is_empty())
}
