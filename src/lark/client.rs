use std::time::Duration;

use axum::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::NotifySettings;
use crate::lark::{ChatNotifier, DeliveryError};
use crate::notify::directory::LarkUserId;
use crate::notify::render::Notification;

const POST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client of a Lark custom bot webhook.
///
/// Messages are sent as interactive cards built from a template of the Lark card builder
/// (https://open.larksuite.com/tool/cardbuilder).
#[derive(Debug, Clone)]
pub struct LarkBotClient {
    client: reqwest::Client,
    url: Url,
    template_id: String,
    title_prefix: String,
}

impl LarkBotClient {
    pub fn new(url: Url, settings: &NotifySettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(POST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            template_id: settings.lark_template_id.clone(),
            title_prefix: settings.lark_title_prefix.clone(),
        })
    }

    fn create_message<'a>(
        &'a self,
        notification: &'a Notification,
        recipients: &[LarkUserId],
    ) -> CardMessage<'a> {
        let mentions = recipients
            .iter()
            .map(|id| format!("<at id={id}></at>"))
            .collect::<Vec<_>>()
            .join(" ");
        CardMessage {
            msg_type: "interactive",
            card: Card {
                kind: "template",
                data: CardData {
                    template_id: &self.template_id,
                    template_variable: TemplateVariables {
                        notification_title: format!("{}{}", self.title_prefix, notification.title),
                        mentions,
                        link_title: &notification.link_title,
                        link_url: notification.link_url.as_str(),
                        message: &notification.message,
                    },
                },
            },
        }
    }
}

#[async_trait]
impl ChatNotifier for LarkBotClient {
    async fn post(
        &self,
        notification: &Notification,
        recipients: &[LarkUserId],
    ) -> Result<(), DeliveryError> {
        tracing::debug!(
            "Posting `{}` to Lark for {} recipient(s)",
            notification.title,
            recipients.len()
        );
        let message = self.create_message(notification, recipients);
        let response = self
            .client
            .post(self.url.clone())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DeliveryError::Status { status, body });
        }

        // Lark answers errors in the body with a 200 status as well
        if let Ok(LarkResponse { code, msg }) = serde_json::from_str::<LarkResponse>(&body) {
            if code != 0 {
                return Err(DeliveryError::Rejected { code, msg });
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Debug)]
struct CardMessage<'a> {
    msg_type: &'static str,
    card: Card<'a>,
}

#[derive(Serialize, Debug)]
struct Card<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: CardData<'a>,
}

#[derive(Serialize, Debug)]
struct CardData<'a> {
    template_id: &'a str,
    template_variable: TemplateVariables<'a>,
}

#[derive(Serialize, Debug)]
struct TemplateVariables<'a> {
    notification_title: String,
    mentions: String,
    link_title: &'a str,
    link_url: &'a str,
    message: &'a str,
}

#[derive(Deserialize, Debug)]
struct LarkResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}
