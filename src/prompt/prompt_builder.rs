//! Prompt builder for phone conversations.

use crate::common::session::{Session, TurnRole};
use crate::llm::completion::{ChatMessage, ChatRole};

/// Fixed behavioral preamble for every call.
const PHONE_PREAMBLE: &str = "You are a friendly voice assistant talking with a caller on the phone.
Keep the tone warm and conversational.
Answer in one to three short sentences.
Everything you write is read aloud: no lists, markdown, emojis or links.
If you did not understand the caller, politely ask them to repeat.";

/// Build the system instruction for the next completion.
///
/// Deterministic in the session's context and metrics. A known caller name takes
/// precedence over the topic; only one of them is added.
#[must_use]
pub fn build_system_prompt(session: &Session) -> String {
    let mut out = String::with_capacity(PHONE_PREAMBLE.len() + 128);
    out.push_str(PHONE_PREAMBLE);

    if let Some(name) = non_blank(session.context.subject_name.as_deref()) {
        out.push_str("\nThe caller's name is ");
        out.push_str(name);
        out.push_str(". Use it naturally from time to time.");
    } else if let Some(topic) = non_blank(session.context.topic.as_deref()) {
        out.push_str("\nThe conversation is currently about ");
        out.push_str(topic);
        out.push('.');
    }

    if session.metrics.turn_count > 0 {
        out.push_str("\nExchanges so far on this call: ");
        out.push_str(&session.metrics.turn_count.to_string());
        out.push('.');
    }

    out
}

/// Build the ordered message list: system prompt, then history oldest first.
#[must_use]
pub fn build_messages(session: &Session) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(session.history.len() + 1);
    messages.push(ChatMessage::new(ChatRole::System, build_system_prompt(session)));
    messages.extend(session.history.iter().map(|turn| {
        let role = match turn.role {
            TurnRole::User => ChatRole::User,
            TurnRole::Assistant => ChatRole::Assistant,
        };
        ChatMessage::new(role, turn.content.clone())
    }));
    messages
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
