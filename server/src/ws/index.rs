//! WebSocket endpoint: one socket per player, seated in exactly one room.

use actix_web::{error, web, Error, HttpRequest, HttpResponse};
use actix_ws::{handle, Message, Session};
use futures::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

use crate::connection::Connection;
use crate::game::registry::{JoinRequest, Registry};
use crate::game::types::{Participant, RoomOptions};
use crate::protocol::{self, Inbound, ServerMsg};

/// Handshake query string.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectParams {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "gameID", default)]
    pub game_id: String,
    /// Comma separated list of owned champion ids.
    #[serde(default)]
    pub champions: String,
    #[serde(rename = "roomID")]
    pub room_id: Option<String>,
    #[serde(rename = "roomName")]
    pub room_name: Option<String>,
    #[serde(rename = "waitingTime")]
    pub waiting_time: Option<u32>,
    pub server: Option<String>,
    pub password: Option<String>,
}

impl ConnectParams {
    pub fn champions(&self) -> Result<Vec<u32>, std::num::ParseIntError> {
        self.champions
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::parse)
            .collect()
    }

    /// Where to seat the player; an unknown room id falls back to creating a
    /// room from the remaining parameters.
    pub fn join_request(&self, server: &str, default_waiting_time: u32) -> JoinRequest {
        let password = self.password.clone().filter(|p| !p.is_empty());
        JoinRequest {
            room_id: self
                .room_id
                .as_deref()
                .and_then(|id| Uuid::parse_str(id).ok()),
            password: password.clone(),
            create: Some(RoomOptions {
                name: self.room_name.clone().unwrap_or_default(),
                waiting_time: self.waiting_time.unwrap_or(default_waiting_time),
                server: server.to_owned(),
                password,
            }),
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    params: web::Query<ConnectParams>,
    registry: web::Data<Registry>,
) -> Result<HttpResponse, Error> {
    let params = params.into_inner();
    if params.id.is_empty() {
        return Err(error::ErrorBadRequest("id missing"));
    }
    let owned_champions = params
        .champions()
        .map_err(|_| error::ErrorBadRequest("bad champion list"))?;
    let server = params
        .server
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| registry.settings().default_server.clone());

    // 1 · rank record (created on first contact)
    let user = registry
        .store()
        .upsert_user(&params.id, &server, &params.name)
        .await
        .map_err(|e| {
            log::error!("upsert of {} failed: {e:#}", params.id);
            error::ErrorInternalServerError("rank store")
        })?;

    // 2 · handshake
    let (response, mut session, mut ws_stream) = handle(&req, body)?;
    let (conn, mut outbox) = Connection::new();

    // 3 · seat the player
    let player_id = params.id.clone();
    let participant = Participant {
        id: params.id.clone(),
        name: params.name.clone(),
        game_name: params.game_id.clone(),
        owned_champions,
        rank_score: user.rank_score,
    };
    let join = params.join_request(&server, registry.settings().default_waiting_time);
    let room_id = match registry.join_room(join, participant, conn.clone()) {
        Ok(id) => id,
        Err(e) => {
            log::info!("{player_id} could not join: {e}");
            send(&mut session, &ServerMsg::Error { message: e.to_string() }).await;
            let _ = session.close(None).await;
            return Ok(response);
        }
    };

    log::info!("WS opened for player {player_id} (connection {})", conn.id());
    let registry = registry.into_inner();
    actix::spawn(async move {
        loop {
            tokio::select! {
                // client → server
                frame = ws_stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => on_text(&registry, room_id, &player_id, &conn, &text),
                    Some(Ok(Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                // room → client
                Some(msg) = outbox.recv() => {
                    if !send(&mut session, &msg).await {
                        log::warn!("WS send failed for {player_id}");
                        break;
                    }
                }
            }
        }

        // On disconnect …
        conn.close();
        if let Err(e) = registry.quit_room(room_id, &player_id) {
            log::debug!("{player_id} quit {room_id}: {e}");
        }
        let _ = session.close(None).await;
        log::info!("WS closed for player {player_id}");
    });

    Ok(response)
}

fn on_text(registry: &Registry, room_id: Uuid, player_id: &str, conn: &Connection, text: &str) {
    match protocol::decode(text) {
        Ok(Inbound::Reply(topic, reply)) => {
            if !conn.deliver(topic, reply) {
                log::debug!("unsolicited {topic:?} from {player_id}");
            }
        }
        Ok(Inbound::Command(cmd)) => {
            if let Err(e) = registry.handle(room_id, player_id, cmd) {
                conn.emit(ServerMsg::Error {
                    message: e.to_string(),
                });
            }
        }
        Err(e) => {
            log::debug!("bad frame from {player_id}: {e}");
            conn.emit(ServerMsg::Error {
                message: format!("bad frame: {e}"),
            });
        }
    }
}

async fn send(session: &mut Session, msg: &ServerMsg) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => session.text(json).await.is_ok(),
        Err(e) => {
            log::error!("could not encode {msg:?}: {e}");
            true
        }
    }
}
