use actix_cors::Cors;
use actix_web::http::header;

/// Browser clients fetch room codes cross-origin; the WebSocket upgrade is
/// not subject to CORS. With no configured origins only local development
/// servers are allowed.
pub fn cors_middleware(allowed_origins: &[String]) -> Cors {
    let local = [
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ];
    let origins = if allowed_origins.is_empty() {
        &local[..]
    } else {
        allowed_origins
    };

    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "OPTIONS"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600);

    for origin in origins {
        cors = cors.allowed_origin(origin);
    }

    cors
}
