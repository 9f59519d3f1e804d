use actix_web::web;

pub mod health;
pub mod realtime;
pub mod rooms;

/// Register every route. `main.rs` adds middleware around the same tree;
/// tests mount it bare.
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Health check: /health
    cfg.configure(health::configure_routes);

    // Room codes: /api/v1/room
    cfg.service(web::scope("/api/v1").configure(rooms::configure_routes));

    // WebSocket upgrade: /ws
    cfg.configure(realtime::configure_routes);
}
