use gambit_engine::errors::TableError;
use gambit_engine::player::PlayerAction as A;
use gambit_engine::rules::{validate_action, ValidatedAction};

#[test]
fn bet_zero_is_invalid() {
    let err = validate_action(10_000, 0, /*table_bet*/ 0, /*min_raise*/ 100, A::Bet(0)).unwrap_err();
    match err {
        TableError::InvalidBetAmount { .. } => {}
        _ => panic!("expected InvalidBetAmount"),
    }
}

#[test]
fn bet_of_whole_stack_becomes_allin() {
    let va = validate_action(50, 0, 0, 100, A::Bet(50)).unwrap();
    assert_eq!(va, ValidatedAction::AllIn(50));
}

#[test]
fn call_with_insufficient_stack_is_allin_call() {
    let va = validate_action(60, 0, 100, 100, A::Call).unwrap();
    assert_eq!(va, ValidatedAction::AllIn(60));
}

#[test]
fn call_only_pays_the_shortfall() {
    let va = validate_action(1000, 40, 100, 60, A::Call).unwrap();
    assert_eq!(va, ValidatedAction::Call(60));
}

#[test]
fn check_facing_bet_is_bet_pending() {
    assert_eq!(
        validate_action(1000, 0, 100, 100, A::Check),
        Err(TableError::BetPending { to_call: 100 })
    );
}

#[test]
fn call_with_nothing_owed_is_rejected() {
    assert_eq!(
        validate_action(1000, 100, 100, 100, A::Call),
        Err(TableError::NothingToCall)
    );
}

#[test]
fn raise_must_reach_table_bet_plus_min_raise() {
    assert_eq!(
        validate_action(1000, 0, 100, 100, A::Raise(199)),
        Err(TableError::InvalidBetAmount {
            amount: 199,
            minimum: 200
        })
    );
    assert_eq!(
        validate_action(1000, 0, 100, 100, A::Raise(200)),
        Ok(ValidatedAction::Raise(200))
    );
}

#[test]
fn all_in_commits_entire_stack() {
    assert_eq!(
        validate_action(130, 20, 100, 100, A::AllIn),
        Ok(ValidatedAction::AllIn(130))
    );
}
