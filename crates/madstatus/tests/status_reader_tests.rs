//! StatusReader tests against an in-memory transport
//!
//! These tests verify that reading both status services, building the
//! snapshot and evaluating the reboot decision work together.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::TimeDelta;
use madstatus::staleness::parse_local;
use madstatus::{
    Credentials, DeviceError, Endpoint, FetchError, RebootDecision, RebootPolicy, RebootReason,
    RetryPolicy, Service, StatusClient, StatusReader, StatusTransport,
};
use serde_json::{Value, json};

type RequestLog = Arc<Mutex<Vec<String>>>;

/// Serves canned bodies by URL; the first `madmin_failures` madmin calls fail
struct FakeServices {
    mitm: Value,
    madmin: Value,
    madmin_failures: Mutex<u32>,
    requests: RequestLog,
}

impl FakeServices {
    fn new(mitm: Value, madmin: Value) -> Self {
        Self { mitm, madmin, madmin_failures: Mutex::new(0), requests: RequestLog::default() }
    }

    fn failing_madmin(mut self, failures: u32) -> Self {
        self.madmin_failures = Mutex::new(failures);
        self
    }
}

#[async_trait::async_trait]
impl StatusTransport for FakeServices {
    async fn get_json(&self, endpoint: &Endpoint) -> Result<Value, FetchError> {
        let url = endpoint.url().to_string();
        self.requests.lock().unwrap().push(url.clone());

        if url.ends_with("/status/") {
            return Ok(self.mitm.clone());
        }

        let mut failures = self.madmin_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(FetchError::HttpStatus(500));
        }
        Ok(self.madmin.clone())
    }
}

/// Build a reader over `services`, returning it with the shared request log
fn reader(services: FakeServices) -> (StatusReader<FakeServices>, RequestLog) {
    let log = services.requests.clone();
    let mitm =
        Endpoint::from_parts("http", "mitm", 8000, "status", true, Credentials::new("m", "p"))
            .unwrap();
    let madmin = Endpoint::from_parts(
        "http",
        "madmin",
        5000,
        "get_status",
        false,
        Credentials::new("a", "b"),
    )
    .unwrap();

    let client = StatusClient::new(services, RetryPolicy::default());
    (StatusReader::new(client, mitm, madmin), log)
}

fn requests(log: &RequestLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn mitm_page(latest: f64) -> Value {
    json!({
        "origin_status": {
            "atv01": {"injection_status": false, "latest_data": latest},
            "atv02": {"injection_status": true, "latest_data": null}
        }
    })
}

fn madmin_page() -> Value {
    json!([
        {
            "origin": "atv01",
            "routemanager": "mon_quest",
            "lastPogoReboot": "2024-01-15 08:00:00",
            "lastPogoRestart": "2024-01-15 11:30:00",
            "lastProtoDateTime": "2024-01-15 11:58:00",
            "init": false
        },
        {
            "origin": "atv02",
            "routemanager": "mon_raids",
            "lastPogoReboot": "",
            "lastPogoRestart": null,
            "lastProtoDateTime": "2024-01-15 11:00:00",
            "init": true
        }
    ])
}

#[tokio::test]
async fn test_snapshot_reads_each_service_once() {
    let now = parse_local("2024-01-15 12:00:00").unwrap();
    let latest = (now - TimeDelta::seconds(15 * 60)).timestamp() as f64;
    let (reader, log) = reader(FakeServices::new(mitm_page(latest), madmin_page()));

    let snapshot = reader.snapshot("atv01").await.unwrap();

    assert_eq!(
        requests(&log),
        vec![
            "http://mitm:8000/status/".to_string(),
            "http://madmin:5000/get_status".to_string()
        ]
    );
    assert!(!snapshot.injection_status);
    assert_eq!(snapshot.route_manager.as_deref(), Some("mon_quest"));
    assert_eq!(snapshot.route_init, Some(false));

    let staleness = snapshot.staleness(now).unwrap();
    assert_eq!(staleness.data_minutes, 15);
    assert_eq!(staleness.proto_minutes, 2);
    assert_eq!(staleness.restart_minutes, 30);
    assert_eq!(staleness.reboot_minutes, 240);

    assert_eq!(
        RebootPolicy::default().evaluate_staleness(snapshot.injection_status, &staleness),
        RebootDecision::Reboot(RebootReason::NoInjectionAndStaleData)
    );
}

#[tokio::test]
async fn test_injecting_device_with_stale_proto_is_rebooted() {
    let now = parse_local("2024-01-15 12:00:00").unwrap();
    let (reader, _) = reader(FakeServices::new(mitm_page(0.0), madmin_page()));

    let snapshot = reader.snapshot("atv02").await.unwrap();
    let staleness = snapshot.staleness(now).unwrap();

    assert_eq!(staleness.data_seen, "unknown");
    assert_eq!(staleness.proto_minutes, 60);
    assert_eq!(
        RebootPolicy::default().evaluate_staleness(snapshot.injection_status, &staleness),
        RebootDecision::Reboot(RebootReason::StaleProto)
    );
}

#[tokio::test]
async fn test_unknown_origin_in_mitm_status() {
    let (reader, log) = reader(FakeServices::new(mitm_page(0.0), madmin_page()));

    let err = reader.snapshot("atv99").await.unwrap_err();

    assert!(matches!(err, DeviceError::OriginNotFound { service: Service::Mitm, .. }));
    // madmin is not consulted once the mitm lookup fails
    assert_eq!(requests(&log).len(), 1);
}

#[tokio::test]
async fn test_unknown_origin_in_madmin_status() {
    let mut mitm = mitm_page(0.0);
    mitm["origin_status"]["atv03"] = json!({"injection_status": true, "latest_data": null});
    let (reader, _) = reader(FakeServices::new(mitm, madmin_page()));

    let err = reader.read_mad_status_values("atv03").await.unwrap_err();

    assert!(matches!(err, DeviceError::OriginNotFound { service: Service::Madmin, .. }));
    assert_eq!(err.to_string(), "Origin 'atv03' not found in madmin status");
}

#[tokio::test(start_paused = true)]
async fn test_madmin_errors_are_retried() {
    let services = FakeServices::new(mitm_page(0.0), madmin_page()).failing_madmin(2);
    let (reader, log) = reader(services);

    let start = tokio::time::Instant::now();
    let worker = reader.read_mad_status_values("atv02").await.unwrap();

    assert_eq!(worker.route_manager.as_deref(), Some("mon_raids"));
    assert_eq!(requests(&log).len(), 3);
    assert!(start.elapsed() >= Duration::from_secs(20));
}

#[tokio::test]
async fn test_broken_record_of_another_worker_does_not_block_lookup() {
    let mut madmin = madmin_page();
    madmin
        .as_array_mut()
        .unwrap()
        .insert(0, json!({"origin": null, "lastPogoReboot": 1700000000, "init": "yes"}));
    let (reader, _) = reader(FakeServices::new(mitm_page(0.0), madmin));

    let worker = reader.read_mad_status_values("atv01").await.unwrap();

    assert_eq!(worker.route_manager.as_deref(), Some("mon_quest"));
    assert_eq!(worker.last_proto_date_time.as_deref(), Some("2024-01-15 11:58:00"));
}
