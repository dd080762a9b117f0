use aram_lobby_server::{
    connection::Connection,
    error::RoomError,
    game::{
        draft,
        room::{Occupant, Room},
        types::{Participant, RoomOptions, RoomStatus, Team},
    },
};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashSet;
use uuid::Uuid;

fn player(id: &str, champions: &[u32]) -> Participant {
    Participant {
        id: id.into(),
        name: id.into(),
        game_name: id.into(),
        owned_champions: champions.to_vec(),
        rank_score: 1200,
    }
}

fn room_with(players: &[Participant]) -> Room {
    let mut room = Room::new(
        Uuid::new_v4(),
        RoomOptions {
            name: "draft".into(),
            waiting_time: 5,
            server: "euw".into(),
            password: None,
        },
    );
    for p in players {
        let (conn, _rx) = Connection::new();
        room.seat(Occupant::new(p.clone(), conn)).unwrap();
    }
    room
}

fn started(players: &[Participant], rng: &mut StdRng) -> Room {
    let mut room = room_with(players);
    draft::start(&mut room, rng).unwrap();
    room.status = RoomStatus::Playing;
    room
}

fn champion_of(room: &Room, id: &str) -> u32 {
    let seat = room.seat_of(id).unwrap();
    room.seats[seat].as_ref().unwrap().assignment.unwrap().champion
}

#[test]
fn start_hands_out_distinct_owned_champions() {
    let mut rng = StdRng::seed_from_u64(1);
    let shared = [1, 2, 3, 4, 5, 6];
    let players: Vec<_> = (0..5).map(|i| player(&format!("p{i}"), &shared)).collect();
    let room = started(&players, &mut rng);

    let mut seen = HashSet::new();
    for (_, o) in room.occupants() {
        let a = o.assignment.expect("assigned");
        assert!(shared.contains(&a.champion));
        assert_eq!(a.rerolls_remaining, 2);
        assert!(seen.insert(a.champion), "champion handed out twice");
        assert!(room.draft.as_ref().unwrap().is_consumed(a.champion));
    }
}

#[test]
fn start_is_atomic_when_someone_cannot_roll() {
    let mut rng = StdRng::seed_from_u64(2);
    let players = [player("a", &[7]), player("b", &[7])];
    let mut room = room_with(&players);

    assert_eq!(draft::start(&mut room, &mut rng), Err(RoomError::RollFailed));
    assert!(room.draft.is_none());
    assert!(room.occupants().all(|(_, o)| o.assignment.is_none()));
}

#[test]
fn reroll_exhaustion_always_errors() {
    let mut rng = StdRng::seed_from_u64(3);
    let players = [player("a", &(1..=20).collect::<Vec<_>>())];
    let mut room = started(&players, &mut rng);

    let first = champion_of(&room, "a");
    let second = draft::reroll(&mut room, "a", &mut rng).unwrap();
    let third = draft::reroll(&mut room, "a", &mut rng).unwrap();
    assert_ne!(first, second);
    assert_ne!(second, third);

    for _ in 0..3 {
        assert_eq!(
            draft::reroll(&mut room, "a", &mut rng),
            Err(RoomError::NoRerollsRemaining)
        );
    }
    assert_eq!(champion_of(&room, "a"), third);
    assert_eq!(room.draft.as_ref().unwrap().pool(Team::Blue), &[first, second]);
}

#[test]
fn reroll_without_eligible_champion_fails() {
    let mut rng = StdRng::seed_from_u64(4);
    let players = [player("a", &[9])];
    let mut room = started(&players, &mut rng);

    assert_eq!(draft::reroll(&mut room, "a", &mut rng), Err(RoomError::RollFailed));
    let seat = room.seat_of("a").unwrap();
    let a = room.seats[seat].as_ref().unwrap().assignment.unwrap();
    assert_eq!((a.champion, a.rerolls_remaining), (9, 2));
}

#[test]
fn pick_swaps_with_the_team_pool() {
    let mut rng = StdRng::seed_from_u64(5);
    // a rolls 1 for sure, b rolls one of 2..=4
    let players = [player("a", &[1]), player("b", &[1, 2, 3, 4])];
    let mut room = started(&players, &mut rng);
    let before = champion_of(&room, "b");

    let rolled = draft::reroll(&mut room, "b", &mut rng).unwrap();
    assert_eq!(room.draft.as_ref().unwrap().pool(Team::Blue), &[before]);

    draft::pick(&mut room, "b", before).unwrap();
    assert_eq!(champion_of(&room, "b"), before);
    assert_eq!(room.draft.as_ref().unwrap().pool(Team::Blue), &[rolled]);
}

#[test]
fn pick_rejects_unknown_and_unowned_champions() {
    let mut rng = StdRng::seed_from_u64(6);
    let players = [player("a", &[1, 2]), player("b", &[3, 4])];
    let mut room = started(&players, &mut rng);

    // b rerolls, putting one of b's champions in the shared blue pool
    let old = champion_of(&room, "b");
    draft::reroll(&mut room, "b", &mut rng).unwrap();

    assert_eq!(draft::pick(&mut room, "a", 99), Err(RoomError::InvalidChampion(99)));
    assert_eq!(draft::pick(&mut room, "a", old), Err(RoomError::ChampionNotOwned(old)));
}

#[test]
fn draft_actions_need_a_playing_room() {
    let mut rng = StdRng::seed_from_u64(7);
    let players = [player("a", &[1, 2, 3])];
    let mut room = room_with(&players);

    assert_eq!(draft::reroll(&mut room, "a", &mut rng), Err(RoomError::GameNotStarted));
    assert_eq!(draft::pick(&mut room, "a", 1), Err(RoomError::GameNotStarted));

    let mut room = started(&players, &mut rng);
    room.status = RoomStatus::Executing;
    assert_eq!(draft::reroll(&mut room, "a", &mut rng), Err(RoomError::GameNotStarted));
}

#[test]
fn draft_rejects_strangers() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut room = started(&[player("a", &[1, 2, 3])], &mut rng);
    assert_eq!(draft::reroll(&mut room, "zz", &mut rng), Err(RoomError::UserNotInRoom));
}
