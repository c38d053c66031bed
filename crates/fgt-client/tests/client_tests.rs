//! Integration tests for the raw and typed client calls

use fgt_client::testing::{MockDevice, MockFortiGate};
use fgt_client::{FgtError, ReleaseType, DEFAULT_ROUTE_DST};

#[tokio::test]
async fn test_non_success_status_is_returned_not_raised() {
    let mock = MockFortiGate::new().device("tok", MockDevice::new().failing("vdom", 503));
    let server = mock.start().await.unwrap();
    let client = server.client("tok").unwrap();

    let response = client.get("cmdb/system/vdom").await.unwrap();
    assert_eq!(response.status.as_u16(), 503);
    assert!(!response.is_success());

    let err = client.list_vdoms().await.unwrap_err();
    assert!(matches!(err, FgtError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_bearer_token_sent() {
    let mock = MockFortiGate::new().device("s3cr3t", MockDevice::new());
    let server = mock.start().await.unwrap();

    server.client("s3cr3t").unwrap().list_vdoms().await.unwrap();
    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].token, "s3cr3t");
}

#[tokio::test]
async fn test_raw_verbs_scoped_to_vdom() {
    let mock = MockFortiGate::new().device(
        "tok",
        MockDevice::new().with_route(5, DEFAULT_ROUTE_DST),
    );
    let server = mock.start().await.unwrap();
    let client = server.client("tok").unwrap().in_vdom("traffic");

    let put = client
        .put("cmdb/system/sdwan", &serde_json::json!({"zone": []}))
        .await
        .unwrap();
    assert!(put.is_success());

    let post = client
        .post("cmdb/router/static", &serde_json::json!({"dst": "10.0.0.0 255.0.0.0"}))
        .await
        .unwrap();
    assert_eq!(post.json::<serde_json::Value>().unwrap()["mkey"], 6);

    let deleted = client.delete("cmdb/router/static/5").await.unwrap();
    assert!(deleted.is_success());
    let missing = client.delete("cmdb/router/static/5").await.unwrap();
    assert_eq!(missing.status.as_u16(), 404);

    assert!(mock
        .calls()
        .iter()
        .all(|c| c.vdom.as_deref() == Some("traffic")));
}

#[tokio::test]
async fn test_firmware_catalog() {
    let mock = MockFortiGate::new().device(
        "tok",
        MockDevice::new().offering(&["v7.2.5", "v7.4.1"]),
    );
    let server = mock.start().await.unwrap();

    let catalog = server.client("tok").unwrap().firmware().await.unwrap();
    assert_eq!(catalog.current.as_deref(), Some("v7.2.4"));
    assert_eq!(catalog.available.len(), 2);
    assert_eq!(catalog.available[0].release_type, ReleaseType::Ga);
    assert_eq!(catalog.available[1].build, 1001);
}

#[tokio::test]
async fn test_static_routes_and_backup() {
    let mock = MockFortiGate::new().device(
        "tok",
        MockDevice::new()
            .with_route(1, "10.0.0.0 255.0.0.0")
            .with_route(2, DEFAULT_ROUTE_DST),
    );
    let server = mock.start().await.unwrap();
    let client = server.client("tok").unwrap();

    let routes = client.list_static_routes().await.unwrap();
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[1].seq_num, 2);
    assert_eq!(routes[1].dst, DEFAULT_ROUTE_DST);

    let config = client.backup_config().await.unwrap();
    assert!(config.starts_with("#config-version="));
}
