use actix_web::{web, App, HttpServer};
use broadside::config::Config;
use broadside::infra::state::build_state;
use broadside::middleware::{cors_middleware, StructuredLogger};
use broadside::routes;

mod telemetry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    // Environment variables must be set by the runtime environment.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    println!(
        "🚀 Starting Broadside on http://{}:{} (server {})",
        config.host, config.port, config.server_id
    );

    let host = config.host.clone();
    let port = config.port;
    let origins = config.cors_allowed_origins.clone();

    let app_state = match build_state(config).build().await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("❌ Failed to reach the coordination store: {e}");
            std::process::exit(1);
        }
    };

    println!("✅ Coordination store connected");

    let shutdown = app_state.shutdown.clone();
    let data = web::Data::new(app_state);

    let result = HttpServer::new(move || {
        App::new()
            .wrap(cors_middleware(&origins))
            .wrap(StructuredLogger)
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await;

    shutdown.cancel();
    result
}
