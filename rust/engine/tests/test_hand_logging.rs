use std::fs;
use std::path::PathBuf;

use gambit_engine::cards::{Card, Rank as R, Suit as S};
use gambit_engine::deck::Deck;
use gambit_engine::logger::{ActionRecord, HandLogger, HandRecord, Street};
use gambit_engine::player::PlayerAction;
use gambit_engine::table::{Blinds, WageringTable};

fn tmp_path(name: &str) -> PathBuf {
    let mut p = PathBuf::from("target");
    p.push(format!("{}_{}.jsonl", name, std::process::id()));
    p
}

fn sample(hand_id: &str) -> HandRecord {
    HandRecord {
        hand_id: hand_id.to_string(),
        table_id: "t1".to_string(),
        actions: vec![ActionRecord {
            player_id: "p0".to_string(),
            street: Street::Preflop,
            action: PlayerAction::Check,
        }],
        board: vec![Card {
            suit: S::Clubs,
            rank: R::Ace,
        }],
        awards: vec![],
        ts: None,
        showdown: None,
    }
}

#[test]
fn writes_jsonl_with_lf_only() {
    let path = tmp_path("handlog");
    let mut logger = HandLogger::create(&path).expect("create logger");
    logger.write(&sample("t1-000001")).expect("write");
    let bytes = fs::read(&path).expect("read file");
    assert!(bytes.ends_with(b"\n"));
    assert!(!bytes.contains(&b'\r'));
    assert_eq!(logger.written(), 1);
}

#[test]
fn ts_is_generated_when_missing_and_preserved_when_present() {
    let path = tmp_path("handlog_ts");
    let mut logger = HandLogger::create(&path).expect("create logger");
    let rec = sample("t1-000010");
    logger.write(&rec).expect("write");
    let line = String::from_utf8(fs::read(&path).unwrap()).unwrap();
    assert!(line.contains("\"ts\":\""), "ts should be injected");

    let preset = "2030-01-01T00:00:00Z".to_string();
    let rec2 = HandRecord {
        ts: Some(preset.clone()),
        ..rec
    };
    logger.write(&rec2).expect("write2");
    let content = String::from_utf8(fs::read(&path).unwrap()).unwrap();
    assert!(content.contains(&preset), "preset ts must be kept");
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn table_hand_record_parses_back() {
    let mut t = WageringTable::new("t9");
    t.seat_player("a", 100).unwrap();
    t.seat_player("b", 100).unwrap();
    t.start_hand_with_deck(Blinds::new(1, 2), Deck::new_with_seed(8))
        .unwrap();
    t.act("a", PlayerAction::Call).unwrap();
    t.act("b", PlayerAction::Check).unwrap();
    t.act("b", PlayerAction::Bet(4)).unwrap();
    t.act("a", PlayerAction::Fold).unwrap();
    let res = t.resolve_showdown().unwrap();

    assert_eq!(res.record.hand_id, "t9-000001");
    assert_eq!(res.record.actions.len(), 4);
    assert_eq!(res.record.actions[2].street, Street::Flop);
    assert_eq!(res.record.awards[0].winners, vec!["b".to_string()]);
    assert!(res.record.showdown.is_none());

    let path = tmp_path("handlog_table");
    let mut logger = HandLogger::create(&path).unwrap();
    logger.write(&res.record).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    let back: HandRecord = serde_json::from_str(text.trim_end()).unwrap();
    assert_eq!(back.actions, res.record.actions);
    assert!(back.ts.is_some());
}
