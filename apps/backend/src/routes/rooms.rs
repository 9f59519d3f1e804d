use actix_web::{web, HttpResponse};
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::state::app_state::AppState;
use crate::utils::room_code::generate_room_code;

#[derive(Debug, Serialize)]
struct RoomResponse {
    #[serde(rename = "roomID")]
    room_id: String,
}

/// Mint a fresh room code. The code is only recorded; the match itself is
/// created when the second player connects.
async fn create_room(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let room_id = generate_room_code();
    app_state.repo.register_room(&room_id).await?;
    info!(room_id = %room_id, "room created");

    Ok(HttpResponse::Created().json(RoomResponse { room_id }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/room").route(web::get().to(create_room)));
}
