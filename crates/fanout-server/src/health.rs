//! `/ping` and `/health` bodies.

use std::time::Instant;

use fanout_hub::HubSnapshot;
use serde::Serialize;

/// `/ping` response body.
#[derive(Debug, Clone, Serialize)]
pub struct PingResponse {
    /// Always `"pong"`.
    pub message: &'static str,
}

impl Default for PingResponse {
    fn default() -> Self {
        Self { message: "pong" }
    }
}

/// `/health` response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"shutting_down"` once shutdown has begun.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current hub members.
    pub connections: usize,
    /// Registrations since start.
    pub registrations: u64,
    /// Backpressure evictions since start.
    pub evictions: u64,
    /// Broadcasts processed since start.
    pub broadcasts: u64,
}

/// Build a health response from hub counters.
pub fn health_check(start_time: Instant, stats: &HubSnapshot, shutting_down: bool) -> HealthResponse {
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.active,
        registrations: stats.registrations,
        evictions: stats.evictions,
        broadcasts: stats.broadcasts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), &HubSnapshot::default(), false);
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn reports_shutdown() {
        let resp = health_check(Instant::now(), &HubSnapshot::default(), true);
        assert_eq!(resp.status, "shutting_down");
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, &HubSnapshot::default(), false);
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn serialization() {
        let stats = HubSnapshot {
            active: 2,
            registrations: 5,
            evictions: 1,
            broadcasts: 7,
            ..HubSnapshot::default()
        };
        let json = serde_json::to_value(health_check(Instant::now(), &stats, false)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connections"], 2);
        assert_eq!(json["registrations"], 5);
        assert_eq!(json["evictions"], 1);
        assert_eq!(json["broadcasts"], 7);
        assert!(json["uptime_secs"].is_number());
    }

    #[test]
    fn ping_says_pong() {
        let json = serde_json::to_value(PingResponse::default()).unwrap();
        assert_eq!(json, serde_json::json!({"message": "pong"}));
    }
}
