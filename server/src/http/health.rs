//! Simple liveness / readiness probe

use crate::game::registry::Registry;
use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

#[get("/healthz")]
pub async fn healthz(registry: web::Data<Registry>) -> impl Responder {
    // Check the rank store
    if let Err(e) = registry.store().ping().await {
        log::warn!("health check: rank store unavailable: {e:#}");
        return HttpResponse::ServiceUnavailable().body("db");
    }

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "rooms": registry.room_count(),
    }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz);
}
