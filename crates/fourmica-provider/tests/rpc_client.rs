//! JSON-RPC client tests against a local mock HTTP server

use fourmica_provider::{ProviderConfig, ProviderError, RpcClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> RpcClient {
    RpcClient::new(ProviderConfig::new(server.uri()).without_rate_limit()).unwrap()
}

#[tokio::test]
async fn test_rpc_call_returns_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_chainId" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": "0xaa36a7"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let chain_id: String = client.rpc_call("eth_chainId", json!([])).await.unwrap();
    assert_eq!(chain_id, "0xaa36a7");
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_rpc_call_null_result_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let value: serde_json::Value = client
        .rpc_call("wallet_switchEthereumChain", json!([{ "chainId": "0x13882" }]))
        .await
        .unwrap();
    assert!(value.is_null());
}

#[tokio::test]
async fn test_rpc_call_surfaces_error_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 3, "message": "execution reverted: paused" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .rpc_call::<_, serde_json::Value>("eth_call", json!([]))
        .await
        .unwrap_err();
    match &err {
        ProviderError::RpcError { code, message } => {
            assert_eq!(*code, 3);
            assert!(message.contains("paused"));
        }
        other => panic!("expected RpcError, got {other:?}"),
    }
    let mapped = err.into_error("eth_call");
    assert_eq!(mapped.user_message(), "Transaction reverted: paused");
}

#[tokio::test]
async fn test_rpc_call_unreachable_endpoint() {
    let client = RpcClient::new(ProviderConfig::new("http://127.0.0.1:59999").without_rate_limit()).unwrap();
    let result = client.rpc_call::<_, serde_json::Value>("eth_chainId", json!([])).await;
    assert!(matches!(result, Err(ProviderError::Http(_))));
}
