//! End-to-end tests running the client facades against a real server on an
//! ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use wirecall_client::blocking::BlockingRpcClient;
use wirecall_client::{Arguments, Error, Params, RpcClient};
use wirecall_server::{ExecutionMode, HandlerError, ProcedureRegistry, RpcServer};

async fn spawn_server() -> SocketAddr {
    let mut registry = ProcedureRegistry::new(ExecutionMode::Suspending);

    registry
        .unary("sayhi", Params::new().required("name"), |args| async move {
            let name: String = args.get("name")?;
            Ok(json!(format!("hi {name}")))
        })
        .unwrap();

    registry
        .streaming(
            "yield_data",
            Params::new().required("max_num"),
            |args| {
                async_stream::stream! {
                    let max_num: u64 = match args.get("max_num") {
                        Ok(n) => n,
                        Err(cause) => {
                            yield Err(HandlerError::from(cause));
                            return;
                        }
                    };
                    for i in 0..max_num {
                        tokio::time::sleep(Duration::from_millis(25)).await;
                        yield Ok(json!(i));
                    }
                }
            },
        )
        .unwrap();

    registry
        .streaming("fail_after_one", Params::new(), |_args| {
            async_stream::stream! {
                yield Ok(json!("Message"));
                yield Err(HandlerError::new("ValueError", "stream broke"));
            }
        })
        .unwrap();

    registry
        .unary("explode", Params::new(), |_args| async {
            Err(HandlerError::new("RuntimeError", "kaput"))
        })
        .unwrap();

    let server = RpcServer::new(registry).with_heartbeat(Duration::from_millis(10));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server.into_router()).await.unwrap();
    });
    addr
}

async fn client() -> RpcClient {
    let addr = spawn_server().await;
    RpcClient::new(format!("http://{addr}"))
}

#[tokio::test]
async fn test_unary_call_round_trip() {
    let client = client().await;
    let greeting: String = client
        .call("sayhi", Arguments::new().with("name", "Aber").unwrap())
        .await
        .unwrap();
    assert_eq!(greeting, "hi Aber");
}

#[tokio::test]
async fn test_streaming_call_preserves_order() {
    let client = client().await;
    let values: Vec<u64> = client
        .call_streaming::<u64>("yield_data", Arguments::new().with("max_num", 5).unwrap())
        .map(Result::unwrap)
        .collect()
        .await;
    assert_eq!(values, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_streaming_failure_terminates_iteration() {
    let client = client().await;
    let mut stream = client.call_streaming::<String>("fail_after_one", Arguments::new());

    assert_eq!(stream.next().await.unwrap().unwrap(), "Message");
    let failure = stream.next().await.unwrap();
    assert!(matches!(
        failure,
        Err(Error::Remote(description)) if description == "ValueError: stream broke"
    ));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_unary_failure_surfaces_description() {
    let client = client().await;
    let result = client.call::<serde_json::Value>("explode", Arguments::new()).await;
    assert!(matches!(
        result,
        Err(Error::Remote(description)) if description == "RuntimeError: kaput"
    ));
}

#[tokio::test]
async fn test_unknown_procedure_is_rejected() {
    let client = client().await;
    let result = client.call::<String>("nope", Arguments::new()).await;
    assert!(matches!(result, Err(Error::Status { status: 404, .. })));
}

#[tokio::test]
async fn test_binding_violations_are_rejected() {
    let client = client().await;

    let missing = client.call::<String>("sayhi", Arguments::new()).await;
    assert!(matches!(missing, Err(Error::Status { status: 422, .. })));

    let unexpected = client
        .call::<String>(
            "sayhi",
            Arguments::new()
                .with("name", "Aber")
                .unwrap()
                .with("extra", 1)
                .unwrap(),
        )
        .await;
    assert!(matches!(unexpected, Err(Error::Status { status: 422, .. })));
}

#[tokio::test]
async fn test_request_without_codec_headers_is_rejected() {
    let addr = spawn_server().await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/sayhi"))
        .body(r#"{"name": "Aber"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 415);
}

#[tokio::test]
async fn test_stub_binds_before_sending() {
    let client = client().await;
    let stub = client.stub("sayhi", Params::new().required("name"));

    let greeting: String = stub
        .call(Arguments::new().with("name", "Aber").unwrap())
        .await
        .unwrap();
    assert_eq!(greeting, "hi Aber");

    // No request goes out for a signature violation.
    let missing = stub.call::<String>(Arguments::new()).await;
    assert!(matches!(missing, Err(Error::Bind(_))));

    let mut stream = stub.call_streaming::<u64>(Arguments::new().with("bogus", 1).unwrap());
    assert!(matches!(stream.next().await, Some(Err(Error::Bind(_)))));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_cbor_requests_interoperate() {
    let client = client()
        .await
        .with_request_serializer(Arc::new(wirecall_serializers::CborSerializer));
    let greeting: String = client
        .call("sayhi", Arguments::new().with("name", "Aber").unwrap())
        .await
        .unwrap();
    assert_eq!(greeting, "hi Aber");
}

#[test]
fn test_blocking_client_round_trip() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let addr = runtime.block_on(spawn_server());

    let client = BlockingRpcClient::new(format!("http://{addr}"));

    let greeting: String = client
        .call("sayhi", Arguments::new().with("name", "Aber").unwrap())
        .unwrap();
    assert_eq!(greeting, "hi Aber");

    let values: Vec<u64> = client
        .call_streaming("yield_data", Arguments::new().with("max_num", 3).unwrap())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(values, vec![0, 1, 2]);

    let mut failing = client
        .call_streaming::<String>("fail_after_one", Arguments::new())
        .unwrap();
    assert_eq!(failing.next().unwrap().unwrap(), "Message");
    assert!(matches!(
        failing.next(),
        Some(Err(Error::Remote(description))) if description == "ValueError: stream broke"
    ));
    assert!(failing.next().is_none());
}
