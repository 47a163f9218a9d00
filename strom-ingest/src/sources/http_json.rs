use std::{net::SocketAddr, pin::Pin, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use futures::Stream;
use strom_client::{names::Language, ReadingBatch};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    config::HttpSourceConfig,
    pipeline::{Envelope, PipelineError, Source},
};

use super::message::TransportMessage;

type Item = Result<Envelope<ReadingBatch>, PipelineError>;

#[derive(Clone)]
struct SharedState {
    tx: mpsc::Sender<Item>,
    auth_bearer_token: Option<Arc<str>>,
    language: Language,
}

/// Accepts decoded readings pushed by a decoder running elsewhere
/// (`POST /ingest/readings`, one transport message per request).
pub struct HttpReadingSource {
    receiver: tokio::sync::Mutex<Option<mpsc::Receiver<Item>>>,
}

impl HttpReadingSource {
    pub async fn new(cfg: &HttpSourceConfig, language: Language) -> Result<Self, PipelineError> {
        let addr: SocketAddr = cfg
            .http_bind_addr
            .parse()
            .map_err(|e| PipelineError::Source(format!("invalid bind addr: {e}")))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| PipelineError::Source(format!("failed to bind HTTP reading source: {e}")))?;

        let (app, source) = Self::build(cfg, language);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                tracing::error!(error = %e, "HTTP reading source server error");
            }
        });
        tracing::info!(%addr, "HTTP reading source listening");

        Ok(source)
    }

    fn build(cfg: &HttpSourceConfig, language: Language) -> (Router, Self) {
        let (tx, rx) = mpsc::channel(cfg.channel_capacity.max(1));
        let state = SharedState {
            tx,
            auth_bearer_token: cfg.auth_bearer_token.as_deref().map(Arc::from),
            language,
        };

        let app = Router::new()
            .route("/ingest/readings", post(ingest_readings))
            .layer(DefaultBodyLimit::max(cfg.max_body_bytes))
            .with_state(state);

        let source = Self {
            receiver: tokio::sync::Mutex::new(Some(rx)),
        };
        (app, source)
    }
}

#[async_trait::async_trait]
impl Source<ReadingBatch> for HttpReadingSource {
    async fn stream(&self) -> Pin<Box<dyn Stream<Item = Item> + Send>> {
        let Some(rx) = self.receiver.lock().await.take() else {
            return Box::pin(futures::stream::once(async {
                Err(PipelineError::Source(
                    "HTTP reading source already consumed; only one consumer supported".to_string(),
                ))
            }));
        };

        Box::pin(ReceiverStream::new(rx))
    }
}

fn authorized(state: &SharedState, headers: &HeaderMap) -> bool {
    let Some(expected) = &state.auth_bearer_token else {
        return true;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected.as_ref())
}

async fn ingest_readings(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    metrics::counter!("http_ingest_requests_total").increment(1);

    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED;
    }

    let message: TransportMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting undecodable reading batch");
            return StatusCode::BAD_REQUEST;
        }
    };

    // A reported decoder failure still reaches the driver as a skipped cycle;
    // a malformed code is rejected here.
    let item = match message {
        TransportMessage::Failure(f) => Err(PipelineError::Transport(f.error)),
        message => match message.into_batch(state.language) {
            Ok(batch) => Ok(Envelope::now(batch)),
            Err(e) => {
                tracing::warn!(error = %e, "rejecting reading batch");
                return StatusCode::BAD_REQUEST;
            }
        },
    };

    if state.tx.send(item).await.is_err() {
        metrics::counter!("http_ingest_failed_total").increment(1);
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use futures::StreamExt;
    use tower::ServiceExt;

    fn config(token: Option<&str>) -> HttpSourceConfig {
        HttpSourceConfig {
            http_bind_addr: "127.0.0.1:0".to_string(),
            channel_capacity: 4,
            auth_bearer_token: token.map(str::to_string),
            max_body_bytes: 1024,
        }
    }

    fn post(body: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::post("/ingest/readings").header("content-type", "application/json");
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {t}"));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn accepted_batch_reaches_the_stream() {
        let (app, source) = HttpReadingSource::build(&config(None), Language::De);

        let res = app
            .oneshot(post(r#"{"1-0:16.7.0*255":{"values":[{"value":500,"unit":"W"}]}}"#, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);

        let mut stream = source.stream().await;
        let env = stream.next().await.unwrap().unwrap();
        let point = env.payload.iter().next().unwrap();
        assert_eq!(point.code.to_string(), "1-0:16.7.0*255");
        assert_eq!(point.single_value(), Some(500.0));
    }

    #[tokio::test]
    async fn decoder_failure_is_forwarded_as_transport_error() {
        let (app, source) = HttpReadingSource::build(&config(None), Language::De);

        let res = app.oneshot(post(r#"{"error":"no answer from meter"}"#, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);

        let mut stream = source.stream().await;
        assert!(matches!(stream.next().await, Some(Err(PipelineError::Transport(_)))));
    }

    #[tokio::test]
    async fn malformed_code_is_rejected() {
        let (app, _source) = HttpReadingSource::build(&config(None), Language::De);

        let res = app.oneshot(post(r#"{"garbage":{"values":[]}}"#, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bearer_token_is_enforced() {
        let (app, _source) = HttpReadingSource::build(&config(Some("s3cret")), Language::De);

        let res = app.clone().oneshot(post("{}", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app.clone().oneshot(post("{}", Some("wrong"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app.oneshot(post("{}", Some("s3cret"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn token_is_checked_before_the_body_is_parsed() {
        let (app, _source) = HttpReadingSource::build(&config(Some("s3cret")), Language::De);

        let res = app.clone().oneshot(post("not json", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = app.oneshot(post("not json", Some("s3cret"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn closed_driver_yields_service_unavailable() {
        let (app, source) = HttpReadingSource::build(&config(None), Language::De);
        drop(source);

        let res = app.oneshot(post("{}", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn stream_can_only_be_taken_once() {
        let (_app, source) = HttpReadingSource::build(&config(None), Language::De);
        let _first = source.stream().await;

        let mut second = source.stream().await;
        assert!(matches!(second.next().await, Some(Err(PipelineError::Source(_)))));
    }
}
