use actix_web::dev::Server;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, http::header::ContentType};
use sink_config::shared::HealthConfig;
use tracing::info;
use tracing_actix_web::TracingLogger;

const HEALTH_PAGE: &str =
    "<!DOCTYPE html><html><head><title>sink</title></head><body><h1>sink is running</h1></body></html>";

/// Confirms the process is alive. Consumer state is not reflected.
#[get("/")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(HEALTH_PAGE)
}

/// Binds the health endpoint.
///
/// Process signals are left to the caller, the server stops through its handle.
pub fn run_health_server(config: &HealthConfig) -> std::io::Result<Server> {
    let server = HttpServer::new(|| {
        App::new()
            .wrap(TracingLogger::default())
            .service(health_check)
    })
    .workers(1)
    .disable_signals()
    .bind((config.host.as_str(), config.port))?
    .run();

    info!(host = %config.host, port = config.port, "health endpoint listening");

    Ok(server)
}
