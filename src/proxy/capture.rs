//! Response capture: mirrors every byte handed to the client into the
//! exchange record without holding the stream back

use crate::domain::exchange::{decode_body, record_headers, ExchangeRecord, RecordedHeaders};
use crate::infrastructure::log_messages::audit;
use crate::proxy::audit_path::AuditLogger;
use crate::proxy::error_response::gateway_error_response;
use crate::proxy::headers::X_REQUEST_ID;
use crate::proxy::middleware::duration_ms;
use crate::proxy::types::{BodySizeLimit, GatewayError, ProviderTag, RequestId};
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header::CONTENT_LENGTH, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use http_body::{Frame, SizeHint};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use pin_project_lite::pin_project;
use std::fmt::Display;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Instant;
use tracing::warn;

/// Request half of an exchange, fixed before the request is dispatched
#[derive(Debug, Clone)]
pub struct ExchangeDraft {
    pub request_id: RequestId,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub remote_addr: Option<String>,
    pub request_headers: RecordedHeaders,
    pub request_body: serde_json::Value,
}

/// Accumulates response bytes and submits the finished record exactly once
pub struct ResponseMirror {
    draft: ExchangeDraft,
    status: u16,
    provider: ProviderTag,
    buffer: BytesMut,
    started: Instant,
    logger: AuditLogger,
}

impl ResponseMirror {
    pub fn new(
        draft: ExchangeDraft,
        status: u16,
        provider: ProviderTag,
        started: Instant,
        logger: AuditLogger,
    ) -> Self {
        Self {
            draft,
            status,
            provider,
            buffer: BytesMut::new(),
            started,
            logger,
        }
    }

    fn observe(&mut self, data: &Bytes) {
        self.buffer.extend_from_slice(data);
    }

    fn delivered(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn finish(self, completed: bool) {
        let ExchangeDraft {
            request_id,
            timestamp,
            method,
            path,
            remote_addr,
            request_headers,
            request_body,
        } = self.draft;

        if !completed {
            warn!(
                request_id = %request_id,
                bytes_delivered = self.buffer.len(),
                "{}",
                audit::STREAM_ABORTED
            );
        }

        self.logger.submit(ExchangeRecord {
            request_id,
            timestamp,
            method,
            path,
            remote_addr,
            request_headers,
            request_body,
            response_status: self.status,
            response_body: decode_body(&self.buffer),
            response_size: self.buffer.len() as u64,
            duration_ms: duration_ms(self.started.elapsed()),
            provider: self.provider,
            completed,
        });
    }
}

pin_project! {
    /// Body decorator that copies each data frame into a [`ResponseMirror`]
    /// in the same poll that yields it to the connection
    ///
    /// The record is finalized when the inner body reports its end, when
    /// the declared length has been handed out, when it yields an error, or
    /// when the wrapper is dropped early because the client went away.
    ///
    /// hyper stops polling a body once `Content-Length` bytes are written,
    /// so reaching the declared length counts as completion.
    pub struct CapturingBody<B> {
        #[pin]
        inner: B,
        mirror: Option<ResponseMirror>,
        expected_len: Option<u64>,
    }

    impl<B> PinnedDrop for CapturingBody<B> {
        fn drop(this: Pin<&mut Self>) {
            if let Some(mirror) = this.project().mirror.take() {
                mirror.finish(false);
            }
        }
    }
}

impl<B> CapturingBody<B> {
    pub fn new(inner: B, mirror: ResponseMirror) -> Self {
        Self {
            inner,
            mirror: Some(mirror),
            expected_len: None,
        }
    }

    /// Treat the body as complete once `len` bytes have been handed out.
    /// A zero length completes the record immediately, since the
    /// connection never polls an empty body.
    pub fn with_expected_len(mut self, len: Option<u64>) -> Self {
        self.expected_len = len;
        if len == Some(0) {
            finish(&mut self.mirror, true);
        }
        self
    }
}

fn finish(mirror: &mut Option<ResponseMirror>, completed: bool) {
    if let Some(mirror) = mirror.take() {
        mirror.finish(completed);
    }
}

impl<B> http_body::Body for CapturingBody<B>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Display,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        match ready!(this.inner.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => {
                let mut delivered = None;
                if let Some(mirror) = this.mirror.as_mut() {
                    if let Some(data) = frame.data_ref() {
                        mirror.observe(data);
                    }
                    delivered = Some(mirror.delivered());
                }
                let reached_len = matches!(
                    (delivered, *this.expected_len),
                    (Some(delivered), Some(expected)) if delivered >= expected
                );
                if reached_len || this.inner.is_end_stream() {
                    finish(this.mirror, true);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                warn!(error = %e, "Upstream response stream failed");
                finish(this.mirror, false);
                Poll::Ready(Some(Err(e)))
            }
            None => {
                finish(this.mirror, true);
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Shared state for [`capture_middleware`]
#[derive(Clone, Debug)]
pub struct CaptureState {
    pub logger: AuditLogger,
    pub max_body: BodySizeLimit,
}

/// Read a request body into memory, enforcing the configured limit
pub async fn read_body(body: Body, limit: BodySizeLimit) -> Result<Bytes, GatewayError> {
    match Limited::new(body, limit.bytes()).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(GatewayError::RequestTooLarge { limit })
        }
        Err(e) => Err(GatewayError::BodyRead(e.to_string())),
    }
}

/// Buffer the request body, dispatch, and wrap the response in a
/// [`CapturingBody`] that submits the exchange when the body finishes
pub async fn capture_middleware(
    State(state): State<CaptureState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let timestamp = Utc::now();
    let (parts, body) = request.into_parts();

    let request_id = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(RequestId::parse)
        .unwrap_or_default();

    let body = read_body(body, state.max_body).await;
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());

    let draft = ExchangeDraft {
        request_id,
        timestamp,
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        remote_addr,
        request_headers: record_headers(&parts.headers),
        request_body: body
            .as_ref()
            .map_or(serde_json::Value::Null, |body| decode_body(body)),
    };
    let is_head = parts.method == Method::HEAD;

    let response = match body {
        Ok(body) => next.run(Request::from_parts(parts, Body::from(body))).await,
        Err(e) => gateway_error_response(&e, Some(request_id.to_string())),
    };

    let provider = response
        .extensions()
        .get::<ProviderTag>()
        .copied()
        .unwrap_or(ProviderTag::Unknown);
    let (parts, body) = response.into_parts();
    let expected_len = if is_head
        || parts.status == StatusCode::NO_CONTENT
        || parts.status == StatusCode::NOT_MODIFIED
    {
        Some(0)
    } else {
        parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .or_else(|| http_body::Body::size_hint(&body).exact())
    };
    let mirror = ResponseMirror::new(
        draft,
        parts.status.as_u16(),
        provider,
        started,
        state.logger,
    );

    let capturing = CapturingBody::new(body, mirror).with_expected_len(expected_len);
    Response::from_parts(parts, Body::new(capturing))
}
