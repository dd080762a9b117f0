//! Manual ingestion of a game result that never reached its room, e.g. after
//! the room was stopped while the game was still running.

use crate::game::{
    ranking::{self, IngestError},
    registry::Registry,
};
use actix_web::{error, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    #[serde(default)]
    pub server: String,
    /// Raw end-of-game report, as the client would have sent it.
    pub data: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackfillResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BackfillResponse {
    fn rejected(message: impl Into<String>) -> Self {
        BackfillResponse {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// POST /api/backfill
#[post("/backfill")]
pub async fn backfill(
    req: web::Json<BackfillRequest>,
    registry: web::Data<Registry>,
) -> Result<HttpResponse, actix_web::Error> {
    let BackfillRequest { server, data } = req.into_inner();
    let server = if server.is_empty() {
        registry.settings().default_server.clone()
    } else {
        server
    };

    match data.get("gameId") {
        None | Some(Value::Null) => {
            return Ok(HttpResponse::Ok().json(BackfillResponse::rejected("missing game id")))
        }
        Some(id) if *id == 0 => {
            return Ok(HttpResponse::Ok().json(BackfillResponse::rejected("missing game id")))
        }
        Some(_) => {}
    }

    match ranking::ingest_payload(registry.store().as_ref(), registry.formula(), data, &server)
        .await
    {
        Ok(changes) => {
            log::info!("backfill on {server}: {} rank score(s) updated", changes.len());
            Ok(HttpResponse::Ok().json(BackfillResponse {
                success: true,
                message: None,
            }))
        }
        Err(IngestError::DuplicateGame { .. }) => {
            Ok(HttpResponse::Ok().json(BackfillResponse::rejected("game already recorded")))
        }
        Err(e @ IngestError::Malformed(_)) => {
            Ok(HttpResponse::BadRequest().json(BackfillResponse::rejected(e.to_string())))
        }
        Err(IngestError::Store(e)) => {
            log::error!("backfill on {server} failed: {e:#}");
            Err(error::ErrorInternalServerError("rank store"))
        }
    }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(backfill);
}
