use serde_json::{json, Value};
use taplo_core::protocol::methods;
use taplo_core::relay::{paste_as_toml, RelayOutcome};
use taplo_core::session::{read_message, write_message};
use taplo_core::{AppError, LspSession, Session};
use tokio::io::{duplex, BufReader, DuplexStream, ReadHalf, WriteHalf};

/// Minimal in-process server: answers requests by method name until the client hangs up.
async fn serve(stream: DuplexStream) {
    let (read, mut write): (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>) =
        tokio::io::split(stream);
    let mut reader = BufReader::new(read);

    while let Ok(Some(body)) = read_message(&mut reader).await {
        let message: Value = serde_json::from_slice(&body).unwrap();
        let Some(id) = message.get("id").cloned() else {
            continue;
        };
        let method = message["method"].as_str().unwrap_or_default().to_string();

        let reply = match method.as_str() {
            "initialize" => {
                // exercise the client's handling of server-initiated requests first
                let probe = json!({
                    "jsonrpc": "2.0",
                    "id": 900,
                    "method": "workspace/configuration",
                    "params": {"items": [{"section": "evenBetterToml"}]}
                });
                write_message(&mut write, &serde_json::to_vec(&probe).unwrap())
                    .await
                    .unwrap();
                let answer = read_message(&mut reader).await.unwrap().unwrap();
                let answer: Value = serde_json::from_slice(&answer).unwrap();
                assert_eq!(answer["id"], 900);
                assert_eq!(answer["result"], json!([null]));

                json!({"jsonrpc": "2.0", "id": id, "result": {
                    "capabilities": {},
                    "echo": message["params"]["initializationOptions"]
                }})
            }
            methods::CONVERT_TO_TOML => {
                let text = message["params"]["text"].as_str().unwrap_or_default();
                json!({"jsonrpc": "2.0", "id": id, "result": {"text": format!("converted = {:?}\n", text)}})
            }
            _ => json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "unknown"}}),
        };

        let log = json!({"jsonrpc": "2.0", "method": "window/logMessage", "params": {"type": 4, "message": "handled"}});
        write_message(&mut write, &serde_json::to_vec(&log).unwrap())
            .await
            .unwrap();
        write_message(&mut write, &serde_json::to_vec(&reply).unwrap())
            .await
            .unwrap();
    }
}

fn connect() -> LspSession {
    let (client, server) = duplex(64 * 1024);
    tokio::spawn(serve(server));
    let (read, write) = tokio::io::split(client);
    LspSession::from_streams(read, write)
}

#[tokio::test]
async fn handshake_passes_initialization_options() {
    let session = connect();
    let result = session
        .initialize(None, json!({"cachePath": "/tmp/taplo-cache"}))
        .await
        .unwrap();
    assert_eq!(result["echo"], json!({"cachePath": "/tmp/taplo-cache"}));
}

#[tokio::test]
async fn server_errors_surface_as_rpc_errors() {
    let session = connect();
    match session.request("taplo/unknown", json!({})).await {
        Err(AppError::Rpc { code, message }) => {
            assert_eq!(code, -32601);
            assert_eq!(message, "unknown");
        }
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_requests_are_matched_by_id() {
    let session = connect();
    let (a, b) = tokio::join!(
        session.request(methods::CONVERT_TO_TOML, json!({"text": "a"})),
        session.request(methods::CONVERT_TO_TOML, json!({"text": "b"})),
    );
    assert_eq!(a.unwrap()["text"], "converted = \"a\"\n");
    assert_eq!(b.unwrap()["text"], "converted = \"b\"\n");
}

#[tokio::test]
async fn relay_runs_over_a_real_session() {
    let session = std::sync::Arc::new(connect());
    let mut host = taplo_test::RecordingHost::new(Some(session));
    host.clipboard_in = "  {\"x\": 1}\n".into();

    assert_eq!(paste_as_toml(&host).await, RelayOutcome::Applied);
    assert_eq!(
        host.inserted.lock().as_slice(),
        ["converted = \"{\\\"x\\\": 1}\"\n"]
    );
}

#[tokio::test]
async fn requests_fail_after_server_hangs_up() {
    let (client, server) = duplex(1024);
    drop(server);
    let (read, write) = tokio::io::split(client);
    let session = LspSession::from_streams(read, write);

    let result = session.request("initialize", json!({})).await;
    assert!(result.is_err());
}
