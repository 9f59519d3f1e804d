use std::sync::Arc;

use actix_http::Request;
use actix_web::body::BoxBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App, Error};
use broadside::config::Config;
use broadside::store::CoordinationStore;
use broadside::{build_state, routes, AppState, MemoryStore};

/// Config for an in-process node named `server_id`.
pub fn test_config(server_id: &str) -> Config {
    let server_id = server_id.to_string();
    Config::from_lookup(move |name| match name {
        "REDIS_URL" => Some("memory://".to_string()),
        "SERVER_ID" => Some(server_id.clone()),
        _ => None,
    })
    .expect("test config is valid")
}

/// Full application state over `store`; several states built on the same
/// store behave like several processes.
pub async fn test_state_on(store: Arc<dyn CoordinationStore>, server_id: &str) -> AppState {
    build_state(test_config(server_id))
        .with_store(store)
        .build()
        .await
        .expect("state builds over memory store")
}

pub async fn test_state() -> AppState {
    test_state_on(Arc::new(MemoryStore::new()), "node-test").await
}

/// Production routes without the production middleware.
pub async fn create_test_app(
    state: AppState,
) -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure),
    )
    .await
}
