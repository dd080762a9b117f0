//! Wire-protocol shared by the websocket layer, the room registry and the
//! execution pipeline.
//!
//! Every frame is a JSON text message `{"event": <name>, "data": <payload>}`.

use crate::game::types::{RoomStatus, Team};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Remote actions the server asks a client's game driver to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    PrepareExecute,
    CreateRoom,
    JoinRoom,
    StartGame,
    Pick,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::PrepareExecute,
        ActionKind::CreateRoom,
        ActionKind::JoinRoom,
        ActionKind::StartGame,
        ActionKind::Pick,
    ];

    /// Event name of the request; acks are `<name>:success` / `<name>:fail`.
    pub fn event_name(self) -> &'static str {
        match self {
            ActionKind::PrepareExecute => "prepareExecute",
            ActionKind::CreateRoom => "createRoom",
            ActionKind::JoinRoom => "joinRoom",
            ActionKind::StartGame => "startGame",
            ActionKind::Pick => "pick",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.event_name() == name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// Inbound events a listener can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Action(ActionKind),
    EndOfGame,
}

/// Outcome reported by a client: result payload or error detail.
pub type Reply = Result<Value, String>;

/// Failure detail a client reports when asked to join an external lobby it
/// is already sitting in.
pub const ALREADY_IN_GAME: &str = "alreadyInGame";

// ---------- client → server ----------

/// Room commands a seated player can issue.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMsg {
    ChangeSeat { seat: usize },
    Play,
    AutoArrange,
    Random,
    Pick { champion: u32 },
    End,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Command(ClientMsg),
    /// Answer to a pending request (or the end-of-game report).
    Reply(Topic, Reply),
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct SeatArgs {
    seat: usize,
}

#[derive(Deserialize)]
struct PickArgs {
    champion: u32,
}

fn error_detail(data: Value) -> String {
    match data {
        Value::Null => "unknown error".into(),
        Value::String(s) => s,
        Value::Object(ref map) => map
            .get("error")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| data.to_string()),
        other => other.to_string(),
    }
}

/// Parse one client text frame.
pub fn decode(text: &str) -> Result<Inbound, serde_json::Error> {
    let Frame { event, data } = serde_json::from_str(text)?;

    match event.as_str() {
        "end-of-game" => return Ok(Inbound::Reply(Topic::EndOfGame, Ok(data))),
        // the barrier signal may arrive bare or as an ack
        "prepareExecute" => {
            return Ok(Inbound::Reply(
                Topic::Action(ActionKind::PrepareExecute),
                Ok(data),
            ))
        }
        _ => {}
    }

    if let Some((name, outcome)) = event.rsplit_once(':') {
        if let Some(kind) = ActionKind::from_event_name(name) {
            let reply = match outcome {
                "success" => Ok(data),
                "fail" => Err(error_detail(data)),
                _ => return Err(unknown_event(&event)),
            };
            return Ok(Inbound::Reply(Topic::Action(kind), reply));
        }
        return Err(unknown_event(&event));
    }

    let cmd = match event.as_str() {
        "changeSeat" => {
            let SeatArgs { seat } = serde_json::from_value(data)?;
            ClientMsg::ChangeSeat { seat }
        }
        "play" => ClientMsg::Play,
        "autoarrange" => ClientMsg::AutoArrange,
        "random" => ClientMsg::Random,
        "pick" => {
            let PickArgs { champion } = serde_json::from_value(data)?;
            ClientMsg::Pick { champion }
        }
        "end" => ClientMsg::End,
        _ => return Err(unknown_event(&event)),
    };
    Ok(Inbound::Command(cmd))
}

fn unknown_event(event: &str) -> serde_json::Error {
    <serde_json::Error as serde::de::Error>::custom(format!("unknown event `{event}`"))
}

// ---------- server → client ----------

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerMsg {
    #[serde(rename = "roomUpdated")]
    RoomUpdated(RoomView),
    #[serde(rename = "time")]
    Time { time: u32 },
    #[serde(rename = "executeProgress")]
    ExecuteProgress(Progress),
    /// Last view of a finished execution, sent right before the reset.
    #[serde(rename = "finish")]
    Finish(RoomView),
    #[serde(rename = "play")]
    Play,
    #[serde(rename = "end")]
    End,
    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "prepareExecute")]
    PrepareExecute,
    #[serde(rename = "createRoom")]
    CreateRoom(CreateRoomRequest),
    #[serde(rename = "joinRoom")]
    JoinRoom(JoinRoomRequest),
    #[serde(rename = "startGame")]
    StartGame,
    #[serde(rename = "pick")]
    Pick(PickRequest),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_name: String,
    pub password: String,
    pub team: Team,
}

/// What the creating client reports back; the joiners receive it verbatim.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResult {
    pub room_name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_name: String,
    pub password: String,
    pub team: Team,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PickRequest {
    pub champion: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Success,
    Failure,
}

/// One line of the execution log; updates reuse the same `id`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Progress {
    pub id: u32,
    pub message: String,
    pub status: ProgressStatus,
}

/// Participant-scoped projection of a room.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: String,
    pub name: String,
    pub status: RoomStatus,
    pub server: String,
    pub has_password: bool,
    /// Countdown length in seconds.
    pub total_time: u32,
    /// Pick pool of the viewer's team.
    pub available_champions: Vec<u32>,
    pub users: Vec<Option<UserView>>,
}

pub const HIDDEN_ID: &str = "<hidden>";

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    #[serde(rename = "gameID")]
    pub game_id: String,
    pub game_data: Option<GameDataView>,
    pub rank_score: i32,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameDataView {
    pub champion: u32,
    pub remain_random: u8,
}
