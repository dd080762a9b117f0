use aram_lobby_server::game::scoring::{score_delta, DefaultFormula, ScoreFormula};

#[test]
fn win_against_stronger_team_as_newcomer() {
    // 20 + 80/4 + 500/50
    assert_eq!(score_delta(true, 0, 500), 50);
}

#[test]
fn win_against_weaker_team_is_clamped() {
    // 20 + 20 + max(-5, -10)
    assert_eq!(score_delta(true, 0, -500), 35);
}

#[test]
fn veteran_win_on_even_teams() {
    // 20 + 80/8
    assert_eq!(score_delta(true, 4, 0), 30);
    // 20 + 80/6 = 33.33…
    assert_eq!(score_delta(true, 2, 0), 33);
}

#[test]
fn loss_against_stronger_team_is_softened_up_to_five() {
    assert_eq!(score_delta(false, 10, 500), -15);
    assert_eq!(score_delta(false, 10, 100), -18);
}

#[test]
fn loss_against_weaker_team_is_not_clamped() {
    // -20 + min(5, -10)
    assert_eq!(score_delta(false, 0, -500), -30);
}

#[test]
fn halves_round_up() {
    // -20 - 2.5 = -22.5 → -22
    assert_eq!(score_delta(false, 3, -125), -22);
    // 20 + 80/4 + 2.5 = 42.5 → 43
    assert_eq!(score_delta(true, 0, 125), 43);
}

#[test]
fn formula_is_pluggable() {
    struct Flat;
    impl ScoreFormula for Flat {
        fn delta(&self, win: bool, _: u32, _: i64) -> i32 {
            if win { 1 } else { -1 }
        }
    }
    let formulas: [&dyn ScoreFormula; 2] = [&DefaultFormula, &Flat];
    assert_eq!(formulas[0].delta(true, 0, 0), 40);
    assert_eq!(formulas[1].delta(false, 0, 0), -1);
}
