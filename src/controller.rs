//! Outbound controller sync client (spec §4.8, §6).
//!
//! Grounded on the teacher's `conway::sync_with_conway` (connect, send,
//! parse response, commit on success, retain on failure) and `core1.rs`'s
//! WiFi-state online/offline bookkeeping, generalized from a single
//! raw-TCP fob-list fetch to the multi-endpoint JSON API spec §6 describes,
//! using `reqwest` (the HTTP client the wider example pack reaches for)
//! in place of the teacher's hand-rolled smoltcp TCP client, which exists
//! only because `no_std` has no `reqwest`.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::error::CoreError;
use crate::model::AccessLogEntry;

/// Reference timeout from spec §4.8 ("each attempt bounded by a short
/// timeout, reference 5-10s").
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Serialize)]
struct AnnounceBody<'a> {
    board_ip: &'a str,
    mac_address: &'a str,
    board_name: &'a str,
    door1_name: &'a str,
    door2_name: &'a str,
}

#[derive(Serialize)]
struct HeartbeatBody<'a> {
    ip_address: &'a str,
    board_name: &'a str,
}

#[derive(Serialize)]
struct TempCodeUsageBody<'a> {
    code: &'a str,
    current_uses: u32,
}

/// This node's identity, as announced to the controller (spec §6
/// `board-announce`/`heartbeat` bodies).
#[derive(Debug, Clone)]
pub struct BoardIdentity {
    pub board_ip: String,
    pub mac_address: String,
    pub board_name: String,
    pub door1_name: String,
    pub door2_name: String,
}

/// Outbound HTTP client to the upstream controller. Holds no access-control
/// state of its own — every method is a stateless request/response pair,
/// called from the single owning engine task.
pub struct ControllerClient {
    http: reqwest::Client,
    base_url: String,
}

impl ControllerClient {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static TLS config");
        Self { http, base_url }
    }

    /// `POST /api/set-controller` (spec §6): repoints this client at a new
    /// controller address without restarting the process.
    pub fn set_base_url(&mut self, base_url: String) {
        info!(base_url = %base_url, "controller: address updated");
        self.base_url = base_url;
    }

    /// Sent at boot and after a reconnect (spec §4.8 "Announce").
    pub async fn announce(&self, identity: &BoardIdentity) -> Result<(), CoreError> {
        let body = AnnounceBody {
            board_ip: &identity.board_ip,
            mac_address: &identity.mac_address,
            board_name: &identity.board_name,
            door1_name: &identity.door1_name,
            door2_name: &identity.door2_name,
        };
        self.post("/api/board-announce", &body).await?;
        info!("controller: announced");
        Ok(())
    }

    /// Every 60s (spec §4.8 "Heartbeat"). Returns whether the controller is
    /// reachable — the caller is responsible for logging the
    /// online/offline transition, since only it knows the previous state.
    pub async fn heartbeat(&self, ip_address: &str, board_name: &str) -> bool {
        let body = HeartbeatBody { ip_address, board_name };
        self.post("/api/heartbeat", &body).await.is_ok()
    }

    /// Delivers one access-log entry. Returns `Ok(())` iff HTTP 200, so the
    /// caller's log queue only commits on an actual acknowledgment (spec
    /// §4.7: never pop-then-retry).
    pub async fn post_access_log(&self, entry: &AccessLogEntry) -> Result<(), CoreError> {
        self.post("/api/access-log", entry).await
    }

    /// Reports this node's per-door usage count for `code` (spec §4.8,
    /// §6 — field name `current_uses` is historical, semantics are
    /// per-door here, not global).
    pub async fn post_temp_code_usage(&self, code: &str, current_uses: u32) -> Result<(), CoreError> {
        let body = TempCodeUsageBody { code, current_uses };
        self.post("/api/temp-code-usage", &body).await
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), CoreError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::ControllerUnreachable(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CoreError::ControllerUnreachable(format!(
                "{} returned {}",
                path,
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_base_url() {
        let client = ControllerClient::new("http://127.0.0.1:8080".to_string());
        assert_eq!(client.base_url, "http://127.0.0.1:8080");
    }
}
