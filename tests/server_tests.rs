//! Server facade tests: info, get, set and JSON-RPC dispatch

use pretty_assertions::assert_eq;
use rip_server::{RipError, RipServer, ServerConfig, SimulatedDriver};
use rstest::*;
use serde_json::{json, Value};
use std::sync::Arc;

mod common;
use common::{generic_config, pendulum_config, SequenceDriver};

fn pendulum_server() -> (Arc<RipServer>, Arc<SequenceDriver>) {
    let driver = Arc::new(
        SequenceDriver::new()
            .with_values("time", vec![1.25])
            .with_values("angle", vec![-3.5])
            .with_values("speed", vec![0.0]),
    );
    let server = Arc::new(RipServer::new(pendulum_config(), driver.clone()));
    (server, driver)
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

#[rstest]
#[tokio::test]
async fn test_get_time_on_generic_server(generic_config: ServerConfig) {
    let driver = Arc::new(SimulatedDriver::new(&generic_config.registry));
    let server = RipServer::new(generic_config, driver);

    let values = server.get("RIP Generic", &names(&["time"])).await.unwrap();
    assert_eq!(values.len(), 1);
    assert!(values[0].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_get_returns_values_in_request_order() {
    let (server, _) = pendulum_server();
    let values = server
        .get("Pendulum", &names(&["angle", "time"]))
        .await
        .unwrap();
    assert_eq!(values, vec![json!(-3.5), json!(1.25)]);
}

#[rstest]
#[case::unknown(&["bogus"])]
#[case::unknown_after_known(&["time", "bogus"])]
#[case::writable_is_not_readable(&["torque"])]
#[tokio::test]
async fn test_get_rejects_before_reading(#[case] requested: &[&str]) {
    let (server, driver) = pendulum_server();

    let result = server.get("Pendulum", &names(requested)).await;
    assert!(matches!(result, Err(RipError::UnknownVariable(_))));
    assert!(driver.reads().is_empty());
}

#[tokio::test]
async fn test_set_writes_in_order() {
    let (server, driver) = pendulum_server();
    server
        .set(
            "Pendulum",
            &names(&["torque", "mode", "enabled"]),
            &[json!(0.5), json!("manual"), json!(true)],
        )
        .await
        .unwrap();

    assert_eq!(
        driver.writes(),
        vec![
            ("torque".to_string(), json!(0.5)),
            ("mode".to_string(), json!("manual")),
            ("enabled".to_string(), json!(true)),
        ]
    );
}

#[rstest]
#[case::out_of_bounds(&["torque"], vec![json!(1.5)])]
#[case::wrong_type(&["enabled"], vec![json!("yes")])]
#[case::length_mismatch(&["torque", "mode"], vec![json!(0.1)])]
#[tokio::test]
async fn test_set_rejects_invalid_values(#[case] requested: &[&str], #[case] values: Vec<Value>) {
    let (server, driver) = pendulum_server();

    let result = server.set("Pendulum", &names(requested), &values).await;
    assert!(matches!(result, Err(RipError::InvalidInput(_))));
    assert!(driver.writes().is_empty());
}

#[tokio::test]
async fn test_set_rejects_readables() {
    let (server, driver) = pendulum_server();
    let result = server.set("Pendulum", &names(&["angle"]), &[json!(1.0)]).await;
    assert!(matches!(result, Err(RipError::UnknownVariable(name)) if name == "angle"));
    assert!(driver.writes().is_empty());
}

#[tokio::test]
async fn test_info_is_memoized_per_address() {
    let (server, _) = pendulum_server();

    let first = server.info("lab.local:9000").await.unwrap();
    let second = server.info("lab.local:9000").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(server.info_cache().build_count(), 1);

    let moved = server.info("10.1.2.3:80").await.unwrap();
    assert_eq!(server.info_cache().build_count(), 2);
    assert_eq!(first.json.replace("lab.local:9000", "10.1.2.3:80"), moved.json);
}

#[tokio::test]
async fn test_info_document_content() {
    let (server, _) = pendulum_server();
    let info = server.default_info().await.unwrap();
    let document: Value = serde_json::from_str(&info.json).unwrap();

    assert_eq!(document["name"], json!("Pendulum"));
    assert_eq!(document["description"], json!("Inverted pendulum"));
    assert_eq!(document["readables"]["list"].as_array().unwrap().len(), 3);
    assert_eq!(document["readables"]["list"][0]["max"], json!("Inf"));
    assert_eq!(document["readables"]["list"][1]["min"], json!(-180.0));
    assert_eq!(document["writables"]["list"][1]["type"], json!("string"));
    assert_eq!(document["readables"]["read_notwrite"], json!(true));
    assert_eq!(
        document["readables"]["methods"][0]["url"],
        json!("lab.local:9000/RIP/SSE")
    );
    assert_eq!(
        document["writables"]["methods"][0]["example"]["lab.local:9000/RIP/POST"]["body"]["params"],
        json!(["Pendulum", ["torque", "mode", "enabled"], [-1.0, "", false]])
    );
}

#[tokio::test]
async fn test_documented_set_example_is_accepted() {
    let (server, driver) = pendulum_server();
    let info = server.default_info().await.unwrap();
    let document: Value = serde_json::from_str(&info.json).unwrap();
    let body = document["writables"]["methods"][0]["example"]["lab.local:9000/RIP/POST"]["body"].clone();

    let response = server.rpc_methods().dispatch(body).await.unwrap();
    assert!(!response.is_error(), "example rejected: {:?}", response.error);
    assert_eq!(response.result, Some(json!(true)));
    assert_eq!(
        driver.writes(),
        vec![
            ("torque".to_string(), json!(-1.0)),
            ("mode".to_string(), json!("")),
            ("enabled".to_string(), json!(false)),
        ]
    );
}

#[tokio::test]
async fn test_info_cache_is_bounded_for_arbitrary_hosts() {
    let (server, _) = pendulum_server();

    for i in 0..5000 {
        server.info(&format!("10.0.{}.{}:80", i / 256, i % 256)).await.unwrap();
        assert!(server.info(&format!("bad host {i}")).await.is_err());
    }

    let stats = server.info_cache().stats();
    assert!(stats.entry_count <= rip_server::metadata::DEFAULT_MAX_ENTRIES);
    assert!(stats.evictions > 0);
}

#[tokio::test]
async fn test_info_invalidation_rebuilds() {
    let (server, _) = pendulum_server();
    server.info("a:1").await.unwrap();
    assert!(server.invalidate_info("a:1"));
    server.info("a:1").await.unwrap();
    assert_eq!(server.info_cache().build_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_info_requests_build_once() {
    let (server, _) = pendulum_server();

    let tasks: Vec<_> = (0..24)
        .map(|_| {
            let server = server.clone();
            tokio::spawn(async move { server.info("lab.local:9000").await.map(|i| i.json.clone()) })
        })
        .collect();

    let mut documents = Vec::new();
    for task in tasks {
        documents.push(task.await.unwrap().unwrap());
    }
    assert!(documents.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(server.info_cache().build_count(), 1);
}

#[tokio::test]
async fn test_json_rpc_round_trip() {
    let (server, driver) = pendulum_server();
    let methods = server.rpc_methods();

    let get = methods
        .dispatch_str(r#"{"jsonrpc": "2.0", "method": "get", "params": ["Pendulum", ["angle"]], "id": "1"}"#)
        .await
        .unwrap();
    assert_eq!(get.result, Some(json!([-3.5])));
    assert_eq!(get.id, json!("1"));

    let set = methods
        .dispatch(json!({
            "jsonrpc": "2.0",
            "method": "set",
            "params": ["Pendulum", ["torque"], [0.25]],
            "id": 2
        }))
        .await
        .unwrap();
    assert!(!set.is_error());
    assert_eq!(driver.writes(), vec![("torque".to_string(), json!(0.25))]);
}

#[rstest]
#[case::unknown_variable(json!(["Pendulum", ["bogus"]]), -32001)]
#[case::bad_names(json!(["Pendulum", "angle"]), -32602)]
#[case::missing_param(json!({"expId": "Pendulum"}), -32602)]
#[tokio::test]
async fn test_json_rpc_get_errors(#[case] params: Value, #[case] code: i64) {
    let (server, driver) = pendulum_server();
    let response = server
        .rpc_methods()
        .dispatch(json!({"jsonrpc": "2.0", "method": "get", "params": params, "id": 9}))
        .await
        .unwrap();

    assert_eq!(response.error.unwrap().code, code);
    assert_eq!(response.id, json!(9));
    assert!(driver.reads().is_empty());
}

#[tokio::test]
async fn test_status_reflects_lifecycle() {
    let (server, _) = pendulum_server();
    assert!(!server.status().running);

    server.start();
    let status = server.status();
    assert!(status.running);
    assert_eq!(status.address, "lab.local:9000");
    assert_eq!((status.readables, status.writables), (3, 3));

    server.stop();
    assert!(!server.is_running());
}
