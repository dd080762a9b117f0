use aram_lobby_server::protocol::{
    decode, ActionKind, ClientMsg, Inbound, Progress, ProgressStatus, ServerMsg, Topic,
};
use serde_json::json;

#[test]
fn commands_decode() {
    assert_eq!(
        decode(r#"{"event":"changeSeat","data":{"seat":7}}"#).unwrap(),
        Inbound::Command(ClientMsg::ChangeSeat { seat: 7 })
    );
    assert_eq!(
        decode(r#"{"event":"pick","data":{"champion":22}}"#).unwrap(),
        Inbound::Command(ClientMsg::Pick { champion: 22 })
    );
    assert_eq!(
        decode(r#"{"event":"autoarrange"}"#).unwrap(),
        Inbound::Command(ClientMsg::AutoArrange)
    );
}

#[test]
fn acknowledgements_decode_to_replies() {
    assert_eq!(
        decode(r#"{"event":"createRoom:success","data":{"roomName":"x","password":"y"}}"#).unwrap(),
        Inbound::Reply(
            Topic::Action(ActionKind::CreateRoom),
            Ok(json!({"roomName":"x","password":"y"}))
        )
    );
    assert_eq!(
        decode(r#"{"event":"joinRoom:fail","data":{"error":"alreadyInGame"}}"#).unwrap(),
        Inbound::Reply(Topic::Action(ActionKind::JoinRoom), Err("alreadyInGame".into()))
    );
    assert_eq!(
        decode(r#"{"event":"prepareExecute"}"#).unwrap(),
        Inbound::Reply(Topic::Action(ActionKind::PrepareExecute), Ok(json!(null)))
    );
    assert!(matches!(
        decode(r#"{"event":"end-of-game","data":{"gameId":1}}"#).unwrap(),
        Inbound::Reply(Topic::EndOfGame, Ok(_))
    ));
}

#[test]
fn garbage_is_rejected() {
    assert!(decode("not json").is_err());
    assert!(decode(r#"{"event":"teleport"}"#).is_err());
    assert!(decode(r#"{"event":"createRoom:maybe"}"#).is_err());
    assert!(decode(r#"{"event":"changeSeat","data":{}}"#).is_err());
}

#[test]
fn server_frames_use_event_and_data() {
    let time = serde_json::to_value(ServerMsg::Time { time: 3 }).unwrap();
    assert_eq!(time, json!({ "event": "time", "data": { "time": 3 } }));

    let progress = serde_json::to_value(ServerMsg::ExecuteProgress(Progress {
        id: 2,
        message: "Game started".into(),
        status: ProgressStatus::Success,
    }))
    .unwrap();
    assert_eq!(
        progress,
        json!({
            "event": "executeProgress",
            "data": { "id": 2, "message": "Game started", "status": "success" }
        })
    );

    let play = serde_json::to_value(ServerMsg::Play).unwrap();
    assert_eq!(play, json!({ "event": "play" }));
}
