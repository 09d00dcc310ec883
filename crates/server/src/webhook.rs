use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tickety_slack::events::{CallbackEnvelope, RETRY_COUNT_HEADER};
use tickety_slack::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};

use crate::invocation::InvocationSink;

#[derive(Clone)]
pub struct WebhookState {
    pub verifier: Arc<SignatureVerifier>,
    pub sink: Arc<dyn InvocationSink>,
    pub bot_user_id: String,
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/slack/events", post(receive)).with_state(state)
}

/// Events API endpoint.
///
/// Ordering contract: the `url_verification` probe is answered before any
/// authenticity check; everything else must carry a valid signature; a
/// redelivery (retry-count header) is acknowledged without processing so a
/// slow invocation cannot create duplicate tickets. Accepted events are
/// acknowledged immediately and processed on a spawned task.
async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let envelope: CallbackEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(
                event_name = "ingress.webhook.unparseable",
                error = %error,
                "webhook payload could not be parsed"
            );
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if let CallbackEnvelope::UrlVerification { challenge } = &envelope {
        info!(event_name = "ingress.webhook.url_verification", "answering endpoint probe");
        return Json(json!({ "challenge": challenge })).into_response();
    }

    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    let signature = header_str(&headers, SIGNATURE_HEADER);
    let verified = match (timestamp, signature) {
        (Some(timestamp), Some(signature)) => state.verifier.verify(timestamp, &body, signature),
        _ => {
            warn!(event_name = "ingress.webhook.missing_headers", "signature headers absent");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };
    if let Err(error) = verified {
        warn!(
            event_name = "ingress.webhook.rejected",
            error = %error,
            "signature verification failed"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if headers.contains_key(RETRY_COUNT_HEADER) {
        info!(
            event_name = "ingress.webhook.retry_acknowledged",
            "redelivery acknowledged without processing"
        );
        return StatusCode::OK.into_response();
    }

    if let CallbackEnvelope::EventCallback { event } = envelope {
        match event.conversation(&state.bot_user_id) {
            Some(conversation) => {
                let correlation_id = Uuid::new_v4().to_string();
                info!(
                    event_name = "ingress.webhook.accepted",
                    correlation_id = %correlation_id,
                    thread_id = %conversation.thread_ts,
                    "event accepted for processing"
                );

                let sink = Arc::clone(&state.sink);
                tokio::spawn(async move {
                    sink.handle(conversation, correlation_id).await;
                });
            }
            None => {
                debug!(event_name = "ingress.webhook.ignored", "event is not actionable");
            }
        }
    }

    StatusCode::OK.into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use tickety_slack::events::Conversation;
    use tickety_slack::signature::{sign, SignatureVerifier};

    use crate::invocation::InvocationSink;

    use super::{router, WebhookState};

    const SECRET: &str = "test-signing-secret";

    #[derive(Default)]
    struct CountingSink {
        handled: AtomicUsize,
        conversations: Mutex<Vec<Conversation>>,
    }

    #[async_trait]
    impl InvocationSink for CountingSink {
        async fn handle(&self, conversation: Conversation, _correlation_id: String) {
            self.handled.fetch_add(1, Ordering::SeqCst);
            self.conversations.lock().await.push(conversation);
        }
    }

    fn state_with(sink: Arc<CountingSink>) -> WebhookState {
        WebhookState {
            verifier: Arc::new(SignatureVerifier::new(SECRET.to_owned().into())),
            sink,
            bot_user_id: "U0BOT".to_owned(),
        }
    }

    fn now_string() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs().to_string())
            .unwrap_or_default()
    }

    fn signed_request(body: &str, retry: bool) -> Request<Body> {
        let timestamp = now_string();
        let signature = sign(SECRET, &timestamp, body.as_bytes());

        let mut builder = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json")
            .header("x-slack-request-timestamp", timestamp)
            .header("x-slack-signature", signature);
        if retry {
            builder = builder.header("x-slack-retry-num", "1");
        }
        builder.body(Body::from(body.to_owned())).expect("request")
    }

    fn mention_payload() -> String {
        r#"{
            "type": "event_callback",
            "event": {
                "type": "app_mention",
                "channel": "C1",
                "user": "U1",
                "text": "<@U0BOT> checkout broken",
                "ts": "1730000000.1000"
            }
        }"#
        .to_owned()
    }

    async fn wait_for_handled(sink: &CountingSink, expected: usize) {
        for _ in 0..100 {
            if sink.handled.load(Ordering::SeqCst) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("sink never reached {expected} handled events");
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge_without_signature() {
        let sink = Arc::new(CountingSink::default());
        let app = router(state_with(sink.clone()));

        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"type":"url_verification","challenge":"c-42"}"#))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.expect("body");
        assert_eq!(body.as_ref(), br#"{"challenge":"c-42"}"#);
        assert_eq!(sink.handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tampered_body_is_rejected_with_401() {
        let sink = Arc::new(CountingSink::default());
        let app = router(state_with(sink.clone()));

        let timestamp = now_string();
        let signature = sign(SECRET, &timestamp, mention_payload().as_bytes());
        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json")
            .header("x-slack-request-timestamp", timestamp)
            .header("x-slack-signature", signature)
            .body(Body::from(
                r#"{"type":"event_callback","event":{"type":"app_mention","channel":"C1","user":"U1","text":"forged","ts":"1.0"}}"#,
            ))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(sink.handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_signature_headers_are_rejected() {
        let sink = Arc::new(CountingSink::default());
        let app = router(state_with(sink.clone()));

        let request = Request::builder()
            .method("POST")
            .uri("/slack/events")
            .header("content-type", "application/json")
            .body(Body::from(mention_payload()))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn accepted_mention_is_dispatched_to_the_sink() {
        let sink = Arc::new(CountingSink::default());
        let app = router(state_with(sink.clone()));

        let response =
            app.oneshot(signed_request(&mention_payload(), false)).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        wait_for_handled(&sink, 1).await;
        let conversations = sink.conversations.lock().await;
        assert_eq!(conversations[0].channel, "C1");
        assert_eq!(conversations[0].thread_ts, "1730000000.1000");
    }

    #[tokio::test]
    async fn redelivery_is_acknowledged_but_not_reprocessed() {
        let sink = Arc::new(CountingSink::default());
        let app = router(state_with(sink.clone()));

        let response =
            app.oneshot(signed_request(&mention_payload(), true)).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unparseable_payload_is_a_bad_request() {
        let sink = Arc::new(CountingSink::default());
        let app = router(state_with(sink));

        let response = app.oneshot(signed_request("{not json", false)).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
