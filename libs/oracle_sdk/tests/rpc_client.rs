//! JSON-RPC client against a local mock node

mod common;

use common::*;
use oracle_sdk::{
    ClientError, ContractClient, OracleSdk, PriceFeedSdk, RpcContractClient, TransactionStatus,
    TxHash,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;

/// Start a mock node; `handler` maps (method, params) to a result or an error
async fn spawn_node<F>(handler: F) -> (SocketAddr, Arc<Mutex<Vec<Value>>>)
where
    F: Fn(&str, &Value) -> Result<Value, (i64, String)> + Send + Sync + 'static,
{
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);
    let log = requests.clone();

    let route = warp::post()
        .and(warp::body::json())
        .map(move |request: Value| {
            log.lock().push(request.clone());
            let method = request["method"].as_str().unwrap_or_default();
            let body = match handler(method, &request["params"]) {
                Ok(result) => json!({"jsonrpc": "2.0", "id": request["id"], "result": result}),
                Err((code, message)) => json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "error": {"code": code, "message": message}
                }),
            };
            warp::reply::json(&body)
        });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (addr, requests)
}

fn client_for(addr: SocketAddr) -> RpcContractClient {
    RpcContractClient::new(&format!("http://{addr}/api"), Some(ACCOUNT.to_string()))
        .unwrap()
        .with_receipt_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn test_read_sends_gen_call() {
    let (addr, requests) = spawn_node(|method, _| match method {
        "gen_call" => Ok(status_json("3050.00", "27.5", 2)),
        other => Err((-32601, format!("unknown method {other}"))),
    })
    .await;

    let sdk = OracleSdk::new(Arc::new(client_for(addr)), address(ORACLE_ADDRESS));
    let status = sdk.get_status().await.unwrap();
    assert_eq!(status.price.eth_usd, "3050.00");

    let requests = requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["method"], "gen_call");
    assert_eq!(requests[0]["params"][0]["function"], "get_status");
    assert_eq!(requests[0]["params"][0]["to"], ORACLE_ADDRESS);
    assert_eq!(requests[0]["params"][0]["from"], ACCOUNT);
}

#[tokio::test]
async fn test_rpc_error_is_surfaced() {
    let (addr, _) = spawn_node(|_, _| Err((-32000, "contract not found".to_string()))).await;

    let client = client_for(addr);
    let sdk = PriceFeedSdk::new(Arc::new(client), address(PRICE_FEED_ADDRESS));
    let err = sdk.get_price().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to get price: rpc error -32000: contract not found"
    );
}

#[tokio::test]
async fn test_write_and_wait_for_finalization() {
    let polls = Arc::new(Mutex::new(0u32));
    let seen = polls.clone();
    let (addr, requests) = spawn_node(move |method, _| match method {
        "eth_sendTransaction" => Ok(json!("0xfeed")),
        "eth_getTransactionByHash" => {
            let mut polls = seen.lock();
            *polls += 1;
            Ok(match *polls {
                1 => Value::Null,
                2 => json!({"hash": "0xfeed", "status": "PENDING"}),
                3 => json!({"hash": "0xfeed", "status": "ACCEPTED"}),
                _ => json!({"hash": "0xfeed", "status": "FINALIZED"}),
            })
        }
        other => Err((-32601, format!("unknown method {other}"))),
    })
    .await;

    let sdk = PriceFeedSdk::new(Arc::new(client_for(addr)), address(PRICE_FEED_ADDRESS));
    let hash = sdk.update_price().await.unwrap();
    assert_eq!(hash, TxHash("0xfeed".to_string()));

    let receipt = sdk.wait_for_finalization(&hash).await.unwrap();
    assert_eq!(receipt.status, TransactionStatus::Finalized);
    assert_eq!(receipt.raw["hash"], "0xfeed");
    assert_eq!(*polls.lock(), 4);

    let requests = requests.lock();
    let send = &requests[0]["params"][0];
    assert_eq!(send["function"], "update_price");
    assert_eq!(send["from"], ACCOUNT);
    assert_eq!(send["value"], "0x0");
}

#[tokio::test]
async fn test_canceled_transaction_fails_wait() {
    let (addr, _) = spawn_node(|method, _| match method {
        "eth_getTransactionByHash" => Ok(json!({"hash": "0xdead", "status": "CANCELED"})),
        other => Err((-32601, format!("unknown method {other}"))),
    })
    .await;

    let client = client_for(addr);
    let err = client
        .wait_for_transaction_receipt(&TxHash("0xdead".to_string()), TransactionStatus::Finalized)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::TransactionFailed { ref status, .. } if status == "canceled"));
}

#[tokio::test]
async fn test_unreachable_node_is_transport_error() {
    // Port 9 (discard) on localhost is not expected to run an HTTP server
    let client = RpcContractClient::new("http://127.0.0.1:9/api", None).unwrap();
    let err = client
        .read_contract(oracle_sdk::ReadCall::new(address(ORACLE_ADDRESS), "get_status"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
