//! Load tests against a live harness server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use load_harness::client::{ApiRequester, LoadDriver};
use load_harness::config::HarnessConfig;
use load_harness::http::{ErrorBody, StatsBody};
use load_harness::observability::Counters;
use load_harness::work::WorkReceipt;

mod common;

fn server_config(workers: usize, admission: usize, shedding: bool) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.server.worker_threads = workers;
    config.server.admission_capacity = admission;
    config.server.load_shedding = shedding;
    config
}

#[tokio::test]
async fn test_shedding_rejects_excess_concurrency() {
    let addr: SocketAddr = "127.0.0.1:28481".parse().unwrap();
    let work = Arc::new(common::SlowWork(Duration::from_millis(300)));
    let shutdown = common::start_harness_server(addr, server_config(2, 2, true), Some(work)).await;

    let client = common::test_client();
    let url = format!("http://{}/json", addr);
    let requests = (0..8).map(|_| {
        let client = client.clone();
        let url = url.clone();
        async move {
            let res = client.get(&url).send().await.expect("Server unreachable");
            let status = res.status().as_u16();
            (status, res.text().await.unwrap())
        }
    });

    let stats_probe = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client
            .get(format!("http://{}/stats", addr))
            .send()
            .await
            .unwrap()
            .json::<StatsBody>()
            .await
            .unwrap()
    };

    let (results, during) = tokio::join!(join_all(requests), stats_probe);

    assert!(during.in_flight <= 2, "In-flight must never exceed admission capacity");

    let mut ok = 0;
    let mut shed = 0;
    for (status, body) in results {
        match status {
            200 => {
                let receipt: WorkReceipt = serde_json::from_str(&body).unwrap();
                assert!(receipt.key.starts_with("slow-"));
                ok += 1;
            }
            503 => {
                let error: ErrorBody = serde_json::from_str(&body).unwrap();
                assert_eq!(error.error, "overloaded");
                shed += 1;
            }
            other => panic!("unexpected status {}", other),
        }
    }
    assert!(ok >= 2, "Admitted requests should complete, got {}", ok);
    assert!(shed >= 1, "Some requests should be shed");

    let after: StatsBody = client
        .get(format!("http://{}/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after.service_unavailable, shed);
    assert_eq!(after.in_flight, 0);
    assert_eq!(after.requests_seen, 8);

    shutdown.trigger();
}

#[tokio::test]
async fn test_no_shedding_serves_everything() {
    let addr: SocketAddr = "127.0.0.1:28482".parse().unwrap();
    let work = Arc::new(common::SlowWork(Duration::from_millis(50)));
    let shutdown = common::start_harness_server(addr, server_config(2, 1, false), Some(work)).await;

    let client = common::test_client();
    let url = format!("http://{}/json", addr);
    let statuses = join_all((0..6).map(|_| {
        let client = client.clone();
        let url = url.clone();
        async move { client.get(&url).send().await.unwrap().status().as_u16() }
    }))
    .await;

    assert!(statuses.iter().all(|s| *s == 200), "statuses: {:?}", statuses);

    shutdown.trigger();
}

#[tokio::test]
async fn test_health_and_prometheus_endpoints() {
    let addr: SocketAddr = "127.0.0.1:28483".parse().unwrap();
    let work = Arc::new(common::SlowWork(Duration::from_millis(1)));
    let shutdown = common::start_harness_server(addr, server_config(1, 1, true), Some(work)).await;

    let client = common::test_client();
    let health = client.get(format!("http://{}/health", addr)).send().await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "ok");

    let res = client.get(format!("http://{}/json", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let body = client
        .get(format!("http://{}/prometheus", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("harness_processing_time_seconds"), "metrics: {}", body);

    shutdown.trigger();
}

#[tokio::test]
async fn test_driver_against_keypair_server() {
    let addr: SocketAddr = "127.0.0.1:28484".parse().unwrap();
    let mut config = server_config(4, 16, false);
    config.work.min_rounds = 1;
    config.work.max_rounds = 1;
    let shutdown = common::start_harness_server(addr, config.clone(), None).await;

    config.client.target_url = format!("http://{}", addr);
    config.client.workers = 4;
    config.client.queue_capacity = 32;
    config.client.total_requests = 20;
    config.client.submit_interval_ms = 0;
    config.client.shutdown_timeout_secs = 30;

    let counters = Arc::new(Counters::detached());
    let requester = Arc::new(ApiRequester::from_config(&config, counters.clone()).unwrap());
    let report = LoadDriver::new(config.client.clone(), requester, counters).run().await;

    assert_eq!(report.submitted, 20);
    assert_eq!(report.rejected, 0);
    assert_eq!(report.succeeded, 20);
    assert_eq!(report.short_circuited, 0);
    assert!(!report.timed_out);

    shutdown.trigger();
}

#[tokio::test]
async fn test_driver_rejects_on_full_queue() {
    let addr: SocketAddr = "127.0.0.1:28485".parse().unwrap();
    let work = Arc::new(common::SlowWork(Duration::from_millis(200)));
    let shutdown = common::start_harness_server(addr, server_config(1, 1, false), Some(work)).await;

    let mut config = HarnessConfig::default();
    config.client.target_url = format!("http://{}", addr);
    config.client.workers = 1;
    config.client.queue_capacity = 1;
    config.client.total_requests = 5;
    config.client.submit_interval_ms = 0;
    config.client.shutdown_timeout_secs = 30;

    let counters = Arc::new(Counters::detached());
    let requester = Arc::new(ApiRequester::from_config(&config, counters.clone()).unwrap());
    let report = LoadDriver::new(config.client.clone(), requester, counters.clone()).run().await;

    assert!(report.rejected >= 3, "report: {:?}", report);
    assert_eq!(report.submitted + report.rejected, 5);
    assert_eq!(counters.rejected(), report.rejected);

    shutdown.trigger();
}
