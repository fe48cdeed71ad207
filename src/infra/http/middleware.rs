use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Per-request identity, visible to handlers and copied onto the response.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Log every 4xx/5xx with the `ErrorReport` the handler attached, if any.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started_at = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        FailedRequest {
            status,
            method,
            uri,
            request_id,
            elapsed_ms: started_at.elapsed().as_millis(),
            report: response.extensions_mut().remove::<ErrorReport>(),
        }
        .emit();
    }

    response
}

struct FailedRequest {
    status: StatusCode,
    method: Method,
    uri: Uri,
    request_id: String,
    elapsed_ms: u128,
    report: Option<ErrorReport>,
}

impl FailedRequest {
    fn emit(self) {
        let (source, chain) = match self.report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = chain
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available");
        let path = self.uri.path();
        let query = self.uri.query().unwrap_or("");

        if self.status.is_server_error() {
            error!(
                target = "atrium::http::response",
                status = self.status.as_u16(),
                method = %self.method,
                path,
                query,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                chain = ?chain,
                request_id = %self.request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "atrium::http::response",
                status = self.status.as_u16(),
                method = %self.method,
                path,
                query,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                chain = ?chain,
                request_id = %self.request_id,
                "client request error",
            );
        }
    }
}
