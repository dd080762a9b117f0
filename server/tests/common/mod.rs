// tests/common/mod.rs
#![allow(dead_code)]

use aram_lobby_server::{
    config::Settings,
    connection::Connection,
    db::{MemoryRankStore, RankStore},
    game::{
        registry::{Context, JoinRequest, Registry},
        types::{Participant, RoomOptions},
    },
    protocol::{ActionKind, Reply, ServerMsg, Topic},
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::UnboundedReceiver;

/// Settings with every timer shrunk to milliseconds.
pub fn fast_settings() -> Settings {
    Settings {
        action_timeout: Duration::from_millis(150),
        action_attempts: 3,
        retry_backoff: Duration::from_millis(5),
        barrier_timeout: Duration::from_millis(150),
        settle_delay: Duration::from_millis(5),
        tick: Duration::from_millis(5),
        result_timeout: Duration::from_secs(2),
        ..Settings::default()
    }
}

pub fn registry_with(settings: Settings) -> (Registry, Arc<MemoryRankStore>) {
    let store = Arc::new(MemoryRankStore::new());
    let ctx = Context::new(settings, store.clone() as Arc<dyn RankStore>);
    (Registry::new(ctx), store)
}

pub fn player(id: &str, score: i32, champions: &[u32]) -> Participant {
    Participant {
        id: id.into(),
        name: format!("name-{id}"),
        game_name: format!("game-{id}"),
        owned_champions: champions.to_vec(),
        rank_score: score,
    }
}

pub fn create(name: &str) -> JoinRequest {
    JoinRequest {
        room_id: None,
        password: None,
        create: Some(RoomOptions {
            name: name.into(),
            waiting_time: 5,
            server: "euw".into(),
            password: None,
        }),
    }
}

pub fn join(room_id: uuid::Uuid) -> JoinRequest {
    JoinRequest {
        room_id: Some(room_id),
        ..JoinRequest::default()
    }
}

/// Decides the answer to one request; `None` stays silent.
pub type Responder = Arc<dyn Fn(ActionKind, &ServerMsg) -> Option<Reply> + Send + Sync>;

pub fn kind_of(msg: &ServerMsg) -> Option<ActionKind> {
    match msg {
        ServerMsg::PrepareExecute => Some(ActionKind::PrepareExecute),
        ServerMsg::CreateRoom(_) => Some(ActionKind::CreateRoom),
        ServerMsg::JoinRoom(_) => Some(ActionKind::JoinRoom),
        ServerMsg::StartGame => Some(ActionKind::StartGame),
        ServerMsg::Pick(_) => Some(ActionKind::Pick),
        _ => None,
    }
}

/// A well-behaved game driver.
pub fn cooperative() -> Responder {
    Arc::new(|kind, _| {
        Some(Ok(match kind {
            ActionKind::CreateRoom => json!({ "roomName": "lobby", "password": "secret" }),
            _ => Value::Null,
        }))
    })
}

/// Fails every `failing` request, cooperates otherwise.
pub fn failing_on(failing: ActionKind) -> Responder {
    let inner = cooperative();
    Arc::new(move |kind, msg| {
        if kind == failing {
            Some(Err("boom".into()))
        } else {
            inner(kind, msg)
        }
    })
}

/// Fake client: records every frame and answers requests.
pub struct FakeClient {
    pub conn: Connection,
    pub seen: Arc<Mutex<Vec<ServerMsg>>>,
}

impl FakeClient {
    pub fn spawn(responder: Responder) -> Self {
        let (conn, rx) = Connection::new();
        Self::drive(conn, rx, responder)
    }

    pub fn drive(conn: Connection, mut rx: UnboundedReceiver<ServerMsg>, responder: Responder) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (log, peer) = (seen.clone(), conn.clone());
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                log.lock().push(msg.clone());
                if let Some(kind) = kind_of(&msg) {
                    if let Some(reply) = responder(kind, &msg) {
                        // the coordinator listens before it emits
                        peer.deliver(Topic::Action(kind), reply);
                    }
                }
            }
        });
        FakeClient { conn, seen }
    }

    pub fn frames(&self) -> Vec<ServerMsg> {
        self.seen.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&ServerMsg) -> bool) -> usize {
        self.seen.lock().iter().filter(|m| pred(m)).count()
    }

    pub fn requests(&self, kind: ActionKind) -> usize {
        self.count(|m| kind_of(m) == Some(kind))
    }

    /// Keep offering the end-of-game report until somebody listens for it.
    pub fn report_result(&self, payload: Value) {
        let conn = self.conn.clone();
        tokio::spawn(async move {
            for _ in 0..400 {
                if conn.deliver(Topic::EndOfGame, Ok(payload.clone())) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });
    }
}

/// Poll `cond` until it holds or `limit` elapses.
pub async fn eventually(limit: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

pub fn is_finish(msg: &ServerMsg) -> bool {
    matches!(msg, ServerMsg::Finish(_))
}
