//! HTTP route handlers for the telephony webhooks.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use tracing::{debug, error, info, warn};

use crate::common::directive::Directive;
use crate::session::StoreStats;
use crate::telephony::{CallStartEvent, SpeechEvent, StatusEvent};

use super::state::AppState;

/// Create the router with all routes.
#[must_use]
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/voice/incoming", post(incoming_call))
        .route("/voice/process", post(process_speech))
        .route("/voice/status", post(call_status))
        .route("/api/stats", get(stats))
        .route("/audio/{id}", get(audio_clip))
        .with_state(state)
}

fn twiml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "voxline-agent",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Call start: greet once, then listen.
async fn incoming_call(
    State(state): State<Arc<AppState>>,
    Form(event): Form<CallStartEvent>,
) -> Response {
    info!(
        call_id = %event.call_id,
        from = event.from_number.as_deref().unwrap_or("unknown"),
        to = event.to_number.as_deref().unwrap_or("unknown"),
        "Incoming call"
    );

    if state.store.mark_greeted(&event.call_id) {
        twiml(state.renderer.greeting())
    } else {
        debug!(call_id = %event.call_id, "Repeated call start, listening without greeting");
        twiml(state.renderer.listen())
    }
}

/// Speech result: run one turn and render the directive.
async fn process_speech(
    State(state): State<Arc<AppState>>,
    Form(event): Form<SpeechEvent>,
) -> Response {
    let confidence = event.confidence();
    let call_id = event.call_id.clone();
    let orchestrator = Arc::clone(&state.orchestrator);

    let turn = tokio::spawn(async move {
        orchestrator
            .process_turn(&event.call_id, event.utterance.as_deref(), confidence)
            .await
    });

    let directive = match turn.await {
        Ok(Ok(directive)) => directive,
        Ok(Err(err)) => {
            error!(call_id = %call_id, error = %err, "Turn processing failed");
            Directive::Error
        }
        Err(err) => {
            error!(call_id = %call_id, error = %err, "Turn processing task aborted");
            Directive::Error
        }
    };

    twiml(state.renderer.render(&directive))
}

/// Status change: end the session on a terminal status.
async fn call_status(
    State(state): State<Arc<AppState>>,
    Form(event): Form<StatusEvent>,
) -> Response {
    let Some(status) = event.call_status() else {
        warn!(call_id = %event.call_id, status = %event.status, "Unknown call status");
        return StatusCode::NO_CONTENT.into_response();
    };

    if !status.is_terminal() {
        debug!(call_id = %event.call_id, %status, "Call status update");
        return StatusCode::NO_CONTENT.into_response();
    }

    state.store.end(&event.call_id);
    info!(
        call_id = %event.call_id,
        %status,
        duration_seconds = event.duration(),
        "Call ended"
    );
    twiml(state.renderer.hangup())
}

/// Active session statistics.
async fn stats(State(state): State<Arc<AppState>>) -> Json<StoreStats> {
    Json(state.store.stats())
}

/// Serve a synthesized clip.
async fn audio_clip(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.audio.get(&id).await {
        Some(clip) => (
            [(header::CONTENT_TYPE, "audio/mpeg")],
            clip.to_vec(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::common::config::TelephonyConfig;
    use crate::common::session::ContextAnalysis;
    use crate::conversation::test_support::{FakeAnalyzer, FakeCompletion, FakeSynthesis};
    use crate::conversation::{ConversationDeps, ConversationOrchestrator, TurnSettings};
    use crate::server::app;
    use crate::session::SessionStore;
    use crate::telephony::TwimlRenderer;
    use crate::voice::{AudioStore, InMemoryAudioStore};

    fn state_with(
        completion: &Arc<FakeCompletion>,
        synthesis: &Arc<FakeSynthesis>,
    ) -> Arc<AppState> {
        let store = Arc::new(SessionStore::with_history_limit(10));
        let audio: Arc<dyn AudioStore> =
            Arc::new(InMemoryAudioStore::new("https://calls.example.com", 8).unwrap());
        let deps = ConversationDeps {
            completion: completion.clone(),
            analyzer: FakeAnalyzer::ok(ContextAnalysis::fallback()),
            synthesis: synthesis.clone(),
            audio: Arc::clone(&audio),
        };
        let orchestrator =
            ConversationOrchestrator::new(store, deps, TurnSettings::default()).unwrap();
        let renderer = TwimlRenderer::new(&TelephonyConfig {
            public_base_url: "https://calls.example.com".to_string(),
            ..TelephonyConfig::default()
        });
        AppState::with_components(Arc::new(orchestrator), Arc::new(renderer), audio)
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, String) {
        let response = app(Arc::clone(state)).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_health() {
        let state = state_with(&FakeCompletion::replying(&[]), &FakeSynthesis::ok());
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_greeting_is_issued_once() {
        let state = state_with(&FakeCompletion::replying(&[]), &FakeSynthesis::ok());

        let start = form(
            "/voice/incoming",
            "CallSid=c1&From=%2B15550001&To=%2B15550002",
        );
        let (status, first) = send(&state, start).await;
        assert_eq!(status, StatusCode::OK);
        assert!(first.contains("Thanks for calling"));

        let (_, second) = send(&state, form("/voice/incoming", "CallSid=c1")).await;
        assert!(!second.contains("Thanks for calling"));
        assert!(second.contains("<Gather"));
        assert_eq!(state.store.len(), 1);
    }

    #[tokio::test]
    async fn test_speech_result_plays_audio() {
        let completion = FakeCompletion::replying(&["Sure, I can help with that"]);
        let synthesis = FakeSynthesis::ok();
        let state = state_with(&completion, &synthesis);

        let (status, body) = send(
            &state,
            form("/voice/process", "CallSid=c1&SpeechResult=Hi+there&Confidence=0.92"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<Play>https://calls.example.com/audio/"));
        assert_eq!(synthesis.texts(), vec!["Sure, I can help with that.".to_string()]);
        let session = state.store.get("c1").unwrap();
        assert_eq!(session.history.len(), 2);
        assert!((session.history[0].metadata.confidence.unwrap() - 0.92).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_missing_speech_reprompts() {
        let completion = FakeCompletion::replying(&[]);
        let state = state_with(&completion, &FakeSynthesis::ok());

        let (_, body) = send(&state, form("/voice/process", "CallSid=c1")).await;

        assert!(body.contains("catch that"));
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_synthesis_failure_speaks_text() {
        let state = state_with(&FakeCompletion::replying(&["Hello"]), &FakeSynthesis::failing());

        let (_, body) = send(&state, form("/voice/process", "CallSid=c1&SpeechResult=Hi")).await;

        assert!(body.contains("<Say voice=\"Polly.Joanna\" language=\"en-US\">Hello.</Say>"));
        assert!(!body.contains("<Play>"));
    }

    #[tokio::test]
    async fn test_failed_turn_apologizes_and_hangs_up() {
        let state = state_with(&FakeCompletion::replying(&[]), &FakeSynthesis::ok());

        let request = form("/voice/process", "CallSid=+&SpeechResult=Hi");
        let (status, body) = send(&state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<Hangup/>"));
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_panicked_turn_apologizes_and_hangs_up() {
        let completion = FakeCompletion::replying(&["never spoken"]);
        completion.on_call(|| panic!("completion client blew up"));
        let state = state_with(&completion, &FakeSynthesis::ok());

        let request = form("/voice/process", "CallSid=c1&SpeechResult=Hello");
        let (status, body) = send(&state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("something went wrong"));
        assert!(body.ends_with("</Say><Hangup/></Response>"));
        assert!(!body.contains("<Gather"));
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_terminal_status_ends_session() {
        let state = state_with(&FakeCompletion::replying(&["Hello"]), &FakeSynthesis::ok());
        let _ = send(&state, form("/voice/process", "CallSid=c1&SpeechResult=Hi")).await;
        assert_eq!(state.store.len(), 1);

        let update = form("/voice/status", "CallSid=c1&CallStatus=in-progress");
        let (status, _) = send(&state, update).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.store.len(), 1);

        let (status, body) = send(
            &state,
            form("/voice/status", "CallSid=c1&CallStatus=completed&CallDuration=37"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<Hangup/>"));
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_stats_lists_active_calls() {
        let state = state_with(&FakeCompletion::replying(&["One", "Two"]), &FakeSynthesis::ok());
        let _ = send(&state, form("/voice/process", "CallSid=b&SpeechResult=Hi")).await;
        let _ = send(&state, form("/voice/process", "CallSid=a&SpeechResult=Hi")).await;

        let request = Request::builder().uri("/api/stats").body(Body::empty()).unwrap();
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);

        let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(stats["active_sessions"], 2);
        assert_eq!(stats["sessions"][0]["call_id"], "a");
        assert_eq!(stats["sessions"][0]["turn_count"], 1);
    }

    #[tokio::test]
    async fn test_audio_clip_is_served() {
        let state = state_with(&FakeCompletion::replying(&[]), &FakeSynthesis::ok());
        let clip = state.audio.put(vec![7, 7, 7]).await.unwrap();

        let request = Request::builder()
            .uri(format!("/audio/{}", clip.id))
            .body(Body::empty())
            .unwrap();
        let response = app(Arc::clone(&state)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), &[7, 7, 7]);

        let request = Request::builder().uri("/audio/missing").body(Body::empty()).unwrap();
        let (status, _) = send(&state, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
