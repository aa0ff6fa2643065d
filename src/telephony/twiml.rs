//! Telephony response adapter: directives to provider call-flow markup.

use std::fmt::Write as _;

use quick_xml::escape::escape;

use crate::common::config::TelephonyConfig;
use crate::common::directive::Directive;

/// Spoken when nothing was heard.
pub const REPROMPT_TEXT: &str = "Sorry, I didn't catch that. Could you say it again?";

/// Spoken before hanging up after an unexpected failure.
pub const FAREWELL_APOLOGY_TEXT: &str =
    "I'm sorry, something went wrong on our end. Please call back in a moment. Goodbye.";

/// Renders call-flow primitives for the telephony provider.
pub trait TelephonyRenderer: Send + Sync {
    /// Greeting issued once at call start, followed by listening.
    fn greeting(&self) -> String;

    /// Render an orchestrator directive.
    fn render(&self, directive: &Directive) -> String;

    /// Listen without speaking.
    fn listen(&self) -> String;

    /// End the call.
    fn hangup(&self) -> String;
}

/// TwiML renderer.
#[derive(Clone, Debug)]
pub struct TwimlRenderer {
    action_url: String,
    voice: String,
    language: String,
    greeting: String,
}

impl TwimlRenderer {
    /// Create a renderer posting speech results back to the configured gather path.
    #[must_use]
    pub fn new(config: &TelephonyConfig) -> Self {
        let base = config.public_base_url.trim_end_matches('/');
        let path = config.gather_path.trim_start_matches('/');
        Self {
            action_url: format!("{base}/{path}"),
            voice: config.voice.clone(),
            language: config.language.clone(),
            greeting: config.greeting.clone(),
        }
    }

    fn say(&self, text: &str) -> String {
        format!(
            r#"<Say voice="{}" language="{}">{}</Say>"#,
            escape(self.voice.as_str()),
            escape(self.language.as_str()),
            escape(text)
        )
    }

    fn play(url: &str) -> String {
        format!("<Play>{}</Play>", escape(url))
    }

    /// Wrap `inner` in a speech gather, then redirect back when the caller stays silent.
    fn gather(&self, inner: &str) -> String {
        let action = escape(self.action_url.as_str());
        let mut body = String::new();
        let _ = write!(
            body,
            r#"<Gather input="speech" action="{action}" method="POST" "#,
        );
        let _ = write!(
            body,
            r#"speechTimeout="auto" language="{}">{inner}</Gather>"#,
            escape(self.language.as_str())
        );
        let _ = write!(body, r#"<Redirect method="POST">{action}</Redirect>"#);
        document(&body)
    }
}

impl TelephonyRenderer for TwimlRenderer {
    fn greeting(&self) -> String {
        self.gather(&self.say(&self.greeting))
    }

    fn render(&self, directive: &Directive) -> String {
        match directive {
            Directive::Reprompt => self.gather(&self.say(REPROMPT_TEXT)),
            Directive::Audio { url, .. } => self.gather(&Self::play(url)),
            Directive::Text { text } => self.gather(&self.say(text)),
            Directive::Error => {
                let body = format!("{}<Hangup/>", self.say(FAREWELL_APOLOGY_TEXT));
                document(&body)
            }
        }
    }

    fn listen(&self) -> String {
        self.gather("")
    }

    fn hangup(&self) -> String {
        document("<Hangup/>")
    }
}

fn document(body: &str) -> String {
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><Response>{body}</Response>"#)
}
