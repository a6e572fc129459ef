use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Form;
use serde::Deserialize;
use tracing::{info, warn};

use crate::intake::{InboundMessage, MediaAttachment, APOLOGY};

use super::AppState;

/// Form fields the messaging transport posts for each inbound message.
#[derive(Debug, Default, Deserialize)]
pub struct InboundForm {
    #[serde(rename = "Body", default)]
    body: String,
    #[serde(rename = "From", default)]
    from: String,
    #[serde(rename = "MessageSid", default)]
    message_sid: Option<String>,
    #[serde(rename = "NumMedia", default)]
    num_media: Option<String>,
    #[serde(rename = "MediaUrl0", default)]
    media_url: Option<String>,
    #[serde(rename = "MediaContentType0", default)]
    media_content_type: Option<String>,
}

impl InboundForm {
    fn into_message(self) -> InboundMessage {
        let has_media = self
            .num_media
            .as_deref()
            .and_then(|n| n.trim().parse::<u32>().ok())
            .is_some_and(|n| n > 0);
        let media = match (has_media, self.media_url, self.media_content_type) {
            (true, Some(url), Some(content_type)) => Some(MediaAttachment { url, content_type }),
            _ => None,
        };
        InboundMessage {
            from: self.from,
            text: self.body,
            message_id: self.message_sid.filter(|sid| !sid.is_empty()),
            media,
        }
    }
}

pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn twiml(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(message)
    )
}

pub async fn health() -> &'static str {
    "Webhook endpoint is working!"
}

/// Always answers with TwiML, even when the form cannot be read, so the
/// sender hears back.
pub async fn inbound(
    State(state): State<AppState>,
    form: Result<Form<InboundForm>, FormRejection>,
) -> impl IntoResponse {
    let msg = match form {
        Ok(Form(form)) => form.into_message(),
        Err(rejection) => {
            warn!("unreadable webhook form: {rejection}");
            return ([(header::CONTENT_TYPE, "text/xml")], twiml(APOLOGY));
        }
    };
    info!(
        "message from {} ({} chars{})",
        msg.from,
        msg.text.len(),
        if msg.media.is_some() { ", with media" } else { "" }
    );
    let reply = state.intake.handle(msg).await;
    ([(header::CONTENT_TYPE, "text/xml")], twiml(&reply.text))
}
