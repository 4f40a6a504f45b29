//! Access control node entry point (spec §1, §9).
//!
//! Replaces the teacher's `#[main] fn main() -> !` dual-core ESP32 bring-up
//! (heap init, WiFi, Core 1 spawn) with a hosted `tokio` current-thread
//! runtime: one task owns [`access_controller::engine::CoreState`]
//! exclusively (the [`access_controller::scheduler::run`] loop), a second
//! serves the admin/sync HTTP surface, and the two communicate over the
//! `EngineCommand` channel — the single-task rewrite spec §9 calls for in
//! place of the teacher's two physical cores.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

use access_controller::config::Config;
use access_controller::controller::{BoardIdentity, ControllerClient};
use access_controller::engine::CoreState;
use access_controller::model::{DoorConfig, DoorId};
use access_controller::{api, scheduler};

/// Command channel depth: generous enough that a burst of HTTP admin calls
/// or edge-capture events never blocks waiting for the engine loop to drain
/// it under normal load.
const COMMAND_CHANNEL_CAPACITY: usize = 256;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("access-controller starting");

    let config = Config::from_env();

    let mut door_configs = HashMap::new();
    door_configs.insert(
        DoorId::One,
        DoorConfig { name: DoorId::One.to_string(), momentary_unlock_ms: config.door_one_momentary_ms },
    );
    door_configs.insert(
        DoorId::Two,
        DoorConfig { name: DoorId::Two.to_string(), momentary_unlock_ms: config.door_two_momentary_ms },
    );
    let state = CoreState::new(door_configs);

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

    let controller = Arc::new(Mutex::new(ControllerClient::new(config.controller_base_url())));
    let identity = BoardIdentity {
        board_ip: local_ip_guess(&config),
        mac_address: mac_address_guess(),
        board_name: "access-controller".to_string(),
        door1_name: DoorId::One.to_string(),
        door2_name: DoorId::Two.to_string(),
    };

    let app = api::router(api::AppState { commands: commands_tx, controller: controller.clone() });
    let listen_addr = format!("{}:{}", config.listen_addr, config.listen_port);

    let http_server = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&listen_addr)
            .await
            .unwrap_or_else(|e| panic!("failed to bind {listen_addr}: {e}"));
        info!(addr = %listener.local_addr().unwrap(), "api: listening");
        axum::serve(listener, app).await.expect("http server exited");
    });

    let scheduler_config = config.clone();
    let scheduler_task =
        tokio::spawn(async move { scheduler::run(state, commands_rx, controller, identity, scheduler_config).await });

    tokio::select! {
        _ = http_server => info!("api: server task ended"),
        _ = scheduler_task => info!("scheduler: engine task ended"),
        _ = tokio::signal::ctrl_c() => info!("received ctrl-c, shutting down"),
    }
}

/// Best-effort local IP for the controller announce/heartbeat bodies (spec
/// §4.8). The teacher reads this off its smoltcp interface once DHCP
/// completes; a hosted process has no single authoritative "my IP" without
/// picking a route, so this falls back to the configured listen address
/// when it's not the wildcard.
fn local_ip_guess(config: &Config) -> String {
    if config.listen_addr == "0.0.0.0" {
        "0.0.0.0".to_string()
    } else {
        config.listen_addr.clone()
    }
}

/// Placeholder board identity field (spec §6 `mac_address`). Real hardware
/// enumeration is host-specific and out of scope for this core (spec §1
/// Non-goals); operators are expected to override `board_name`/identity via
/// `/api/set-controller` and controller-side configuration instead.
fn mac_address_guess() -> String {
    "00:00:00:00:00:00".to_string()
}
