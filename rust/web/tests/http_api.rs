use gambit_web::server::{AppContext, WebServer};
use serde_json::{json, Value};
use warp::http::StatusCode;

fn body<B: AsRef<[u8]>>(response: &warp::http::Response<B>) -> Value {
    serde_json::from_slice(response.body().as_ref()).expect("json body")
}

#[tokio::test]
async fn health_reports_enforcer_counters() {
    let ctx = AppContext::for_tests().expect("context");
    let routes = WebServer::routes(&ctx);

    let response = warp::test::request().path("/health").reply(&routes).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body(&response);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["instance_id"], ctx.enforcer().instance_id());
    assert_eq!(json["enforcer"]["sweeps_run"], 0);
}

#[tokio::test]
async fn encounter_lifecycle() {
    let ctx = AppContext::for_tests().expect("context");
    let routes = WebServer::routes(&ctx);

    let created = warp::test::request()
        .method("POST")
        .path("/api/encounters")
        .json(&json!({
            "character_id": "hero",
            "player_hp": 1000,
            "opponent_hp": 1000,
            "opponent": "easy"
        }))
        .reply(&routes)
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = body(&created);
    let id = created["encounter_id"].as_str().expect("id").to_string();
    assert_eq!(created["opponent"], "easy");
    assert_eq!(created["version"], 1);
    assert_eq!(created["round"]["phase"], "hold");
    assert_eq!(created["round"]["hand"].as_array().map(Vec::len), Some(5));
    // the deck never leaves the server
    assert!(created["round"].get("deck").is_none());
    assert!(created["round"]["hold"].get("deck").is_none());

    let toggled = warp::test::request()
        .method("POST")
        .path(&format!("/api/encounters/{id}/actions"))
        .json(&json!({ "action": "toggle_hold", "index": 1 }))
        .reply(&routes)
        .await;
    assert_eq!(toggled.status(), StatusCode::OK);
    let toggled = body(&toggled);
    assert_eq!(toggled["round"]["held"], json!([1]));
    assert_eq!(toggled["version"], 2);

    let confirmed = warp::test::request()
        .method("POST")
        .path(&format!("/api/encounters/{id}/actions"))
        .json(&json!({ "action": "confirm_hold" }))
        .reply(&routes)
        .await;
    assert_eq!(confirmed.status(), StatusCode::OK);
    let confirmed = body(&confirmed);
    assert_eq!(confirmed["round"]["phase"], "resolved");
    assert_eq!(confirmed["round"]["result"]["timed_out"], false);

    let again = warp::test::request()
        .method("POST")
        .path(&format!("/api/encounters/{id}/actions"))
        .json(&json!({ "action": "confirm_hold" }))
        .reply(&routes)
        .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert_eq!(body(&again)["error"], "already_resolved");

    let next = warp::test::request()
        .method("POST")
        .path(&format!("/api/encounters/{id}/rounds"))
        .reply(&routes)
        .await;
    assert_eq!(next.status(), StatusCode::CREATED);
    let next = body(&next);
    assert_eq!(next["round"]["round_number"], 2);
    assert_eq!(next["round"]["phase"], "hold");

    let fetched = warp::test::request()
        .path(&format!("/api/encounters/{id}"))
        .reply(&routes)
        .await;
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(body(&fetched)["round"]["round_number"], 2);

    // round two is still holding, so the encounter cannot close yet
    let early = warp::test::request()
        .method("DELETE")
        .path(&format!("/api/encounters/{id}"))
        .reply(&routes)
        .await;
    assert_eq!(early.status(), StatusCode::CONFLICT);

    warp::test::request()
        .method("POST")
        .path(&format!("/api/encounters/{id}/actions"))
        .json(&json!({ "action": "confirm_hold" }))
        .reply(&routes)
        .await;
    let finished = warp::test::request()
        .method("DELETE")
        .path(&format!("/api/encounters/{id}"))
        .reply(&routes)
        .await;
    assert_eq!(finished.status(), StatusCode::OK);
    let summary = body(&finished);
    assert_eq!(summary["rounds"].as_array().map(Vec::len), Some(2));

    let gone = warp::test::request()
        .path(&format!("/api/encounters/{id}"))
        .reply(&routes)
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn encounter_errors_map_to_status_codes() {
    let ctx = AppContext::for_tests().expect("context");
    let routes = WebServer::routes(&ctx);

    let missing = warp::test::request()
        .path("/api/encounters/nope")
        .reply(&routes)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&missing)["error"], "not_found");

    let unknown = warp::test::request()
        .method("POST")
        .path("/api/encounters")
        .json(&json!({
            "character_id": "hero",
            "player_hp": 10,
            "opponent_hp": 10,
            "opponent": "grandmaster"
        }))
        .reply(&routes)
        .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&unknown)["error"], "unknown_opponent");

    let created = warp::test::request()
        .method("POST")
        .path("/api/encounters")
        .json(&json!({ "character_id": "hero", "player_hp": 10, "opponent_hp": 10 }))
        .reply(&routes)
        .await;
    let id = body(&created)["encounter_id"].as_str().expect("id").to_string();

    let bad_index = warp::test::request()
        .method("POST")
        .path(&format!("/api/encounters/{id}/actions"))
        .json(&json!({ "action": "toggle_hold", "index": 5 }))
        .reply(&routes)
        .await;
    assert_eq!(bad_index.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&bad_index)["error"], "invalid_index");

    let peek = warp::test::request()
        .method("POST")
        .path(&format!("/api/encounters/{id}/actions"))
        .json(&json!({ "action": "use_peek" }))
        .reply(&routes)
        .await;
    assert_eq!(peek.status(), StatusCode::OK);
    assert!(body(&peek)["round"]["hold"]["peeked"].is_object());

    let second_peek = warp::test::request()
        .method("POST")
        .path(&format!("/api/encounters/{id}/actions"))
        .json(&json!({ "action": "use_peek" }))
        .reply(&routes)
        .await;
    assert_eq!(second_peek.status(), StatusCode::CONFLICT);
    assert_eq!(body(&second_peek)["error"], "no_peeks_remaining");

    let early_next = warp::test::request()
        .method("POST")
        .path(&format!("/api/encounters/{id}/rounds"))
        .reply(&routes)
        .await;
    assert_eq!(early_next.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn heads_up_table_over_http() {
    let ctx = AppContext::for_tests().expect("context");
    let routes = WebServer::routes(&ctx);

    let created = warp::test::request()
        .method("POST")
        .path("/api/tables")
        .json(&json!({ "table_id": "felt" }))
        .reply(&routes)
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(body(&created)["table_id"], "felt");

    for player in ["p1", "p2"] {
        let seated = warp::test::request()
            .method("POST")
            .path("/api/tables/felt/seats")
            .json(&json!({ "player_id": player, "stack": 1000 }))
            .reply(&routes)
            .await;
        assert_eq!(seated.status(), StatusCode::OK);
    }

    let started = warp::test::request()
        .method("POST")
        .path("/api/tables/felt/hands")
        .json(&json!({ "small_blind": 5, "big_blind": 10 }))
        .reply(&routes)
        .await;
    assert_eq!(started.status(), StatusCode::OK);
    let started = body(&started);
    assert_eq!(started["table"]["pot_total"], 15);
    let to_act = started["table"]["to_act"].as_str().expect("to_act").to_string();
    let other = if to_act == "p1" { "p2" } else { "p1" };
    // nobody's hole cards are in the public view
    for seat in started["table"]["players"].as_array().expect("players") {
        assert!(seat["hole"].is_null());
    }

    let viewer = warp::test::request()
        .path(&format!("/api/tables/felt?player={to_act}"))
        .reply(&routes)
        .await;
    let viewer = body(&viewer);
    let seats = viewer["table"]["players"].as_array().expect("players");
    for seat in seats {
        if seat["id"] == to_act.as_str() {
            assert_eq!(seat["hole"].as_array().map(Vec::len), Some(2));
        } else {
            assert!(seat["hole"].is_null());
        }
    }

    let wrong_turn = warp::test::request()
        .method("POST")
        .path("/api/tables/felt/actions")
        .json(&json!({ "player_id": other, "action": "check" }))
        .reply(&routes)
        .await;
    assert_eq!(wrong_turn.status(), StatusCode::CONFLICT);
    assert_eq!(body(&wrong_turn)["error"], "not_your_turn");

    let folded = warp::test::request()
        .method("POST")
        .path("/api/tables/felt/actions")
        .json(&json!({ "player_id": to_act, "action": "fold" }))
        .reply(&routes)
        .await;
    assert_eq!(folded.status(), StatusCode::OK);
    let folded = body(&folded);
    let showdown = &folded["showdown"];
    assert_eq!(showdown["uncontested"], true);
    assert_eq!(showdown["payouts"][0]["player_id"], other);

    let stacks: u64 = folded["table"]["players"]
        .as_array()
        .expect("players")
        .iter()
        .filter_map(|p| p["stack"].as_u64())
        .sum();
    assert_eq!(stacks, 2000);
}

#[tokio::test]
async fn seating_past_the_chip_limit_is_a_bad_request() {
    let ctx = AppContext::for_tests().expect("context");
    let routes = WebServer::routes(&ctx);

    warp::test::request()
        .method("POST")
        .path("/api/tables")
        .json(&json!({ "table_id": "whales" }))
        .reply(&routes)
        .await;

    let first = warp::test::request()
        .method("POST")
        .path("/api/tables/whales/seats")
        .json(&json!({ "player_id": "p1", "stack": 3_000_000_000u32 }))
        .reply(&routes)
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = warp::test::request()
        .method("POST")
        .path("/api/tables/whales/seats")
        .json(&json!({ "player_id": "p2", "stack": 3_000_000_000u32 }))
        .reply(&routes)
        .await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&second)["error"], "chip_limit");

    let table = warp::test::request()
        .path("/api/tables/whales")
        .reply(&routes)
        .await;
    assert_eq!(body(&table)["table"]["players"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn unknown_channel_is_not_found() {
    let ctx = AppContext::for_tests().expect("context");
    let routes = WebServer::routes(&ctx);

    let response = warp::test::request()
        .path("/api/channels/ghost/events")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(ctx.event_bus().subscriber_count(), 0);
}

#[tokio::test]
async fn server_binds_ephemeral_port_and_shuts_down() {
    let ctx = AppContext::for_tests().expect("context");
    let handle = WebServer::from_context(ctx).start().await.expect("start server");
    assert_ne!(handle.address().port(), 0);
    handle.shutdown().await.expect("shutdown");
}
