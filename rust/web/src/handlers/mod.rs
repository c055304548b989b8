pub mod encounters;
pub mod health;
pub mod sse;
pub mod tables;

pub use encounters::{
    EncounterResponse, finish_encounter, get_encounter, next_round, start_encounter, submit_action,
};
pub use health::health;
pub use sse::stream_events;
pub use tables::{
    CreateTableRequest, TableResponse, ViewerQuery, act, create_table, get_table, seat_player,
    start_hand,
};
