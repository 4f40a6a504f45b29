//! Inbound admin/sync HTTP surface (spec §6).
//!
//! Grounded on the teacher's `conway::handle_http_server` method/path
//! match (`POST /unlock`, `GET /`), generalized from hand-parsed request
//! lines to an `axum` router (the HTTP server crate the wider example pack
//! reaches for) with `serde` request bodies. Every handler only ever
//! touches [`CoreState`](crate::engine::CoreState) by sending an
//! [`EngineCommand`] and awaiting its reply — the single-task ownership
//! rule (spec §9) applies here too, just crossing a task boundary instead
//! of a core boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::controller::ControllerClient;
use crate::engine::EngineCommand;
use crate::model::{DoorConfig, DoorId, DoorScheduleEntry, Override, ScheduleInterval, Snapshot, TempCode, User};
use crate::wiegand::{Edge, KeyPress};

#[derive(Clone)]
pub struct AppState {
    pub commands: mpsc::Sender<EngineCommand>,
    pub controller: Arc<Mutex<ControllerClient>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sync", post(sync))
        .route("/api/emergency-lock", post(emergency_lock))
        .route("/api/emergency-unlock", post(emergency_unlock))
        .route("/api/emergency-reset", post(emergency_reset))
        .route("/api/door-override", post(door_override))
        .route("/api/set-controller", post(set_controller))
        .route("/api/unlock", post(manual_unlock))
        .route("/api/edge-event", post(edge_event))
        .route("/api/keypad-event", post(keypad_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct SuccessBody {
    success: bool,
}

fn ok() -> impl IntoResponse {
    (StatusCode::OK, Json(SuccessBody { success: true }))
}

/// Wire shape of the `/api/sync` body (spec §6): keeps `door_names` and
/// `unlock_durations` as the two separate maps the wire protocol names,
/// merged into this crate's single `doors: HashMap<DoorId, DoorConfig>`
/// category at the boundary (see DESIGN.md).
#[derive(Debug, Deserialize, Default)]
struct SyncRequestBody {
    /// `Option` so a present-but-empty array (`"users": []`) is told apart
    /// from the field being absent entirely, matching `Snapshot`'s
    /// replace-per-present-category semantics (spec §6).
    #[serde(default)]
    users: Option<Vec<User>>,
    #[serde(default)]
    door_schedules: Option<HashMap<DoorId, Vec<DoorScheduleEntry>>>,
    #[serde(default)]
    user_schedules: Option<HashMap<String, Vec<ScheduleInterval>>>,
    #[serde(default)]
    temp_codes: Option<Vec<TempCode>>,
    #[serde(default)]
    door_names: HashMap<DoorId, String>,
    #[serde(default)]
    unlock_durations: Option<UnlockDurations>,
}

#[derive(Debug, Deserialize)]
struct UnlockDurations {
    door1: u64,
    door2: u64,
}

impl SyncRequestBody {
    fn into_snapshot(self) -> Snapshot {
        let mut doors: HashMap<DoorId, DoorConfig> = HashMap::new();
        for door in DoorId::ALL {
            let name = self.door_names.get(&door).cloned();
            let momentary_unlock_ms = self.unlock_durations.as_ref().map(|d| match door {
                DoorId::One => d.door1,
                DoorId::Two => d.door2,
            });
            if name.is_some() || momentary_unlock_ms.is_some() {
                doors.insert(
                    door,
                    DoorConfig {
                        name: name.unwrap_or_else(|| door.to_string()),
                        momentary_unlock_ms: momentary_unlock_ms.unwrap_or(5_000),
                    },
                );
            }
        }
        Snapshot {
            users: self.users,
            temp_codes: self.temp_codes,
            door_schedules: self.door_schedules,
            user_schedules: self.user_schedules,
            doors,
        }
    }
}

/// `POST /api/sync` — spec §6: "Response: `{"success":true}` on 200; 500 on
/// parse error." Parsed manually (rather than via axum's `Json` extractor,
/// which rejects malformed bodies with 400) so a schema mismatch produces
/// exactly the status code the spec names.
async fn sync(State(state): State<AppState>, body: axum::body::Bytes) -> impl IntoResponse {
    let parsed: SyncRequestBody = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "api: /api/sync payload did not match the expected schema");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(SuccessBody { success: false }));
        }
    };
    let snapshot = parsed.into_snapshot();
    let (respond_to, reply) = oneshot::channel();
    if state
        .commands
        .send(EngineCommand::Sync { snapshot: Box::new(snapshot), respond_to })
        .await
        .is_err()
    {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(SuccessBody { success: false }));
    }
    match reply.await {
        Ok(Ok(())) => (StatusCode::OK, Json(SuccessBody { success: true })),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(SuccessBody { success: false })),
    }
}

#[derive(Debug, Deserialize, Default)]
struct EmergencyDurationBody {
    duration: Option<u64>,
}

async fn emergency_lock(State(state): State<AppState>) -> impl IntoResponse {
    let (respond_to, reply) = oneshot::channel();
    let _ = state.commands.send(EngineCommand::EmergencyLock { respond_to }).await;
    let _ = reply.await;
    ok()
}

async fn emergency_unlock(
    State(state): State<AppState>,
    body: Option<Json<EmergencyDurationBody>>,
) -> impl IntoResponse {
    let auto_reset_after = body.and_then(|Json(b)| b.duration).map(Duration::from_secs);
    let (respond_to, reply) = oneshot::channel();
    let _ = state
        .commands
        .send(EngineCommand::EmergencyUnlock { auto_reset_after, respond_to })
        .await;
    let _ = reply.await;
    ok()
}

async fn emergency_reset(State(state): State<AppState>) -> impl IntoResponse {
    let (respond_to, reply) = oneshot::channel();
    let _ = state.commands.send(EngineCommand::EmergencyReset { respond_to }).await;
    let _ = reply.await;
    ok()
}

#[derive(Debug, Deserialize)]
struct DoorOverrideBody {
    door_number: u8,
    #[serde(rename = "override")]
    override_: String,
}

async fn door_override(
    State(state): State<AppState>,
    Json(body): Json<DoorOverrideBody>,
) -> impl IntoResponse {
    let Some(door) = DoorId::from_number(body.door_number) else {
        return (StatusCode::BAD_REQUEST, Json(SuccessBody { success: false }));
    };
    let override_state = match body.override_.as_str() {
        "lock" => Override::Lock,
        "unlock" => Override::Unlock,
        "" => Override::None,
        _ => return (StatusCode::BAD_REQUEST, Json(SuccessBody { success: false })),
    };
    let (respond_to, reply) = oneshot::channel();
    let _ = state
        .commands
        .send(EngineCommand::DoorOverride { door, state: override_state, respond_to })
        .await;
    let _ = reply.await;
    (StatusCode::OK, Json(SuccessBody { success: true }))
}

#[derive(Debug, Deserialize)]
struct ManualUnlockBody {
    door_number: u8,
}

/// `POST /api/unlock` — mirrors the teacher's `/unlock` admin handler,
/// mapped onto a manual/REX-equivalent grant (spec §4.5).
async fn manual_unlock(
    State(state): State<AppState>,
    Json(body): Json<ManualUnlockBody>,
) -> impl IntoResponse {
    let Some(door) = DoorId::from_number(body.door_number) else {
        return (StatusCode::BAD_REQUEST, Json(SuccessBody { success: false }));
    };
    let (respond_to, reply) = oneshot::channel();
    let _ = state.commands.send(EngineCommand::ManualUnlock { door, respond_to }).await;
    let _ = reply.await;
    (StatusCode::OK, Json(SuccessBody { success: true }))
}

#[derive(Debug, Deserialize)]
struct EdgeEventBody {
    door_number: u8,
    line: String,
}

/// `POST /api/edge-event` — the wired-ISR source for this hosted rewrite
/// (spec §4.1, §9): a real deployment would feed [`EngineCommand::EdgeEvent`]
/// from a GPIO interrupt handler, which this process has none of, so the
/// admin HTTP surface doubles as the simulated reader/bench-test source.
async fn edge_event(State(state): State<AppState>, Json(body): Json<EdgeEventBody>) -> impl IntoResponse {
    let Some(door) = DoorId::from_number(body.door_number) else {
        return (StatusCode::BAD_REQUEST, Json(SuccessBody { success: false }));
    };
    let edge = match body.line.as_str() {
        "d0" => Edge::D0,
        "d1" => Edge::D1,
        _ => return (StatusCode::BAD_REQUEST, Json(SuccessBody { success: false })),
    };
    let at = Duration::from_millis(crate::clock::monotonic_ms());
    let _ = state.commands.send(EngineCommand::EdgeEvent { door, edge, at }).await;
    (StatusCode::OK, Json(SuccessBody { success: true }))
}

#[derive(Debug, Deserialize)]
struct KeypadEventBody {
    door_number: u8,
    key: String,
}

/// `POST /api/keypad-event` — the simulated source for
/// [`EngineCommand::KeypadEvent`], mirroring `edge_event`'s role for the
/// keypad side of the same reader (spec §4.2, §9).
async fn keypad_event(State(state): State<AppState>, Json(body): Json<KeypadEventBody>) -> impl IntoResponse {
    let Some(door) = DoorId::from_number(body.door_number) else {
        return (StatusCode::BAD_REQUEST, Json(SuccessBody { success: false }));
    };
    let key = match body.key.as_str() {
        "0" => KeyPress::Digit(0),
        "1" => KeyPress::Digit(1),
        "2" => KeyPress::Digit(2),
        "3" => KeyPress::Digit(3),
        "4" => KeyPress::Digit(4),
        "5" => KeyPress::Digit(5),
        "6" => KeyPress::Digit(6),
        "7" => KeyPress::Digit(7),
        "8" => KeyPress::Digit(8),
        "9" => KeyPress::Digit(9),
        "*" => KeyPress::Star,
        "#" => KeyPress::Hash,
        _ => return (StatusCode::BAD_REQUEST, Json(SuccessBody { success: false })),
    };
    let _ = state.commands.send(EngineCommand::KeypadEvent { door, key }).await;
    (StatusCode::OK, Json(SuccessBody { success: true }))
}

#[derive(Debug, Deserialize)]
struct SetControllerBody {
    controller_ip: String,
    controller_port: u16,
}

async fn set_controller(
    State(state): State<AppState>,
    Json(body): Json<SetControllerBody>,
) -> impl IntoResponse {
    let mut controller = state.controller.lock().await;
    controller.set_base_url(format!("http://{}:{}", body.controller_ip, body.controller_port));
    ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_body_merges_names_and_durations_into_one_door_category() {
        let mut door_names = HashMap::new();
        door_names.insert(DoorId::One, "Front Door".to_string());
        let body = SyncRequestBody {
            door_names,
            unlock_durations: Some(UnlockDurations { door1: 7_000, door2: 9_000 }),
            ..Default::default()
        };
        let snapshot = body.into_snapshot();
        let front = snapshot.doors.get(&DoorId::One).unwrap();
        assert_eq!(front.name, "Front Door");
        assert_eq!(front.momentary_unlock_ms, 7_000);
        let back = snapshot.doors.get(&DoorId::Two).unwrap();
        assert_eq!(back.momentary_unlock_ms, 9_000);
    }

    #[test]
    fn sync_body_with_nothing_present_yields_no_door_category() {
        let snapshot = SyncRequestBody::default().into_snapshot();
        assert!(snapshot.doors.is_empty());
    }

    #[test]
    fn door_override_body_parses_the_three_wire_variants() {
        for (raw, expected) in [("lock", Override::Lock), ("unlock", Override::Unlock), ("", Override::None)] {
            let json = format!(r#"{{"door_number":1,"override":"{raw}"}}"#);
            let body: DoorOverrideBody = serde_json::from_str(&json).unwrap();
            let parsed = match body.override_.as_str() {
                "lock" => Override::Lock,
                "unlock" => Override::Unlock,
                "" => Override::None,
                other => panic!("unexpected override {other:?}"),
            };
            assert_eq!(parsed, expected);
        }
    }
}
