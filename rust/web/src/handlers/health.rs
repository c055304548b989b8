use crate::enforcer::TimeoutEnforcer;
use crate::metrics::EnforcerSnapshot;
use serde::Serialize;
use std::sync::Arc;
use warp::reply::Json;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    instance_id: String,
    enforcer: EnforcerSnapshot,
}

pub fn health(enforcer: Arc<TimeoutEnforcer>) -> Json {
    warp::reply::json(&HealthBody {
        status: "ok",
        instance_id: enforcer.instance_id().to_string(),
        enforcer: enforcer.metrics().snapshot(),
    })
}
