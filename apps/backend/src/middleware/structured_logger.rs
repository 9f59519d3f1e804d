use std::future::{ready, Ready};
use std::time::Instant;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::{header, StatusCode};
use actix_web::Error as ActixError;
use futures_util::future::LocalBoxFuture;
use tracing::{debug, error, info, warn};

/// One structured line per HTTP request, levelled by response status.
/// Socket upgrades also carry the room and player they asked for.
pub struct StructuredLogger;

impl<S, B> Transform<S, ServiceRequest> for StructuredLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type InitError = ();
    type Transform = StructuredLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(StructuredLoggerMiddleware { service }))
    }
}

pub struct StructuredLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for StructuredLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let line = RequestLine::from_request(&req);

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;

            let status = match &result {
                Ok(res) => res.status(),
                Err(err) => err.as_response_error().status_code(),
            };
            line.emit(status, start.elapsed().as_micros());

            result
        })
    }
}

/// Request fields captured before the inner service consumes the request.
struct RequestLine {
    method: String,
    path: String,
    // Set only for socket upgrades, taken from the query string.
    room_id: Option<String>,
    player_id: Option<String>,
}

impl RequestLine {
    fn from_request(req: &ServiceRequest) -> Self {
        let is_upgrade = req.headers().contains_key(header::UPGRADE);
        let (room_id, player_id) = if is_upgrade {
            query_ids(req.query_string())
        } else {
            (None, None)
        };
        Self {
            method: req.method().to_string(),
            path: req.path().to_string(),
            room_id,
            player_id,
        }
    }

    fn emit(&self, status: StatusCode, elapsed_us: u128) {
        let status_code = status.as_u16();
        let duration_us = u64::try_from(elapsed_us).unwrap_or(u64::MAX);
        let room_id = self.room_id.as_deref().unwrap_or("");
        let player_id = self.player_id.as_deref().unwrap_or("");
        let (method, path) = (&self.method, &self.path);

        if status.is_server_error() {
            error!(http.method = %method, url.path = %path, http.status_code = status_code, duration_us, room_id, player_id, "request completed");
        } else if status.is_client_error() {
            warn!(http.method = %method, url.path = %path, http.status_code = status_code, duration_us, room_id, player_id, "request completed");
        } else if path == "/health" {
            // Probes hit this every few seconds.
            debug!(http.method = %method, url.path = %path, http.status_code = status_code, duration_us, "request completed");
        } else {
            info!(http.method = %method, url.path = %path, http.status_code = status_code, duration_us, room_id, player_id, "request completed");
        }
    }
}

fn query_ids(query: &str) -> (Option<String>, Option<String>) {
    let mut room_id = None;
    let mut player_id = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("roomID", v)) if !v.is_empty() => room_id = Some(v.to_string()),
            Some(("playerID", v)) if !v.is_empty() => player_id = Some(v.to_string()),
            _ => {}
        }
    }
    (room_id, player_id)
}
