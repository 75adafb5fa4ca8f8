use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use livepad::compiler::strip_types;
use livepad::config::ServerConfig;
use livepad::router;
use livepad::state::AppState;
use livepad_protocol::{ClientMessage, ServerMessage};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(config: ServerConfig) -> SocketAddr {
    let state = Arc::new(AppState::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

async fn send(ws: &mut Socket, msg: &ClientMessage) {
    ws.send(Message::Text(msg.to_json().into())).await.unwrap();
}

async fn send_raw(ws: &mut Socket, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

async fn recv(ws: &mut Socket) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("timed out waiting for server message")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return ServerMessage::from_json(text.as_str()).unwrap();
        }
    }
}

fn edit(user: &str, lines: &[&str]) -> ClientMessage {
    ClientMessage::Edit {
        user: user.into(),
        source_lines: lines.iter().map(|l| l.to_string()).collect(),
    }
}

fn resume(user: &str) -> ClientMessage {
    ClientMessage::Resume {
        user_id: user.into(),
    }
}

fn content(lines: &[&str]) -> ServerMessage {
    ServerMessage::Resume {
        content: lines.iter().map(|l| l.to_string()).collect(),
    }
}

#[tokio::test]
async fn edit_reload_resume_and_preview() {
    let tmp = tempfile::tempdir().unwrap();
    let addr = spawn_server(ServerConfig::with_data_dir(tmp.path())).await;
    let preview_url = format!("http://{addr}/preview/u1/index.js");

    let missing = reqwest::get(&preview_url).await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let (mut ws, response) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("livepad_session="));
    assert!(cookie.contains("SameSite=Strict"));

    send(&mut ws, &edit("u1", &["console.log(1)"])).await;
    assert_eq!(recv(&mut ws).await, ServerMessage::Reload);

    send(&mut ws, &resume("u1")).await;
    assert_eq!(recv(&mut ws).await, content(&["console.log(1)"]));

    let published = reqwest::get(&preview_url).await.unwrap();
    assert_eq!(published.status(), reqwest::StatusCode::OK);
    assert_eq!(
        published.headers()["content-type"],
        "text/javascript; charset=utf-8"
    );
    let expected = strip_types("console.log(1)").unwrap();
    assert_eq!(published.text().await.unwrap(), expected);

    // A broken edit is saved but never signals a reload.
    send(&mut ws, &edit("u1", &["console.log(", "  ((("])).await;
    send(&mut ws, &resume("u1")).await;
    assert_eq!(recv(&mut ws).await, content(&["console.log(", "  ((("]));
    assert_eq!(reqwest::get(&preview_url).await.unwrap().text().await.unwrap(), expected);
}

#[cfg(unix)]
#[tokio::test]
async fn compile_in_flight_when_client_drops_still_publishes() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::with_data_dir(tmp.path());
    config.compiler_command = Some("sleep 1; cat".into());
    let addr = spawn_server(config).await;
    let preview_url = format!("http://{addr}/preview/u5/index.js");

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    send(&mut ws, &edit("u5", &["console.log('late')"])).await;
    // Let the frame reach the server before the socket goes away.
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(ws);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let response = reqwest::get(&preview_url).await.unwrap();
        if response.status() == reqwest::StatusCode::OK {
            assert_eq!(response.text().await.unwrap(), "console.log('late')");
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "artifact never published after client disconnect"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn preview_never_serves_hidden_files() {
    let tmp = tempfile::tempdir().unwrap();
    let addr = spawn_server(ServerConfig::with_data_dir(tmp.path())).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    send(&mut ws, &edit("u6", &["console.log(6)"])).await;
    assert_eq!(recv(&mut ws).await, ServerMessage::Reload);

    let staging = tmp
        .path()
        .join("workspaces")
        .join("u6")
        .join(".index.js.deadbeef.tmp");
    std::fs::write(&staging, "half-written").unwrap();

    let hidden = reqwest::get(format!("http://{addr}/preview/u6/.index.js.deadbeef.tmp"))
        .await
        .unwrap();
    assert_eq!(hidden.status(), reqwest::StatusCode::NOT_FOUND);
    let visible = reqwest::get(format!("http://{addr}/preview/u6/index.js"))
        .await
        .unwrap();
    assert_eq!(visible.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn broken_first_edit_leaves_preview_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let addr = spawn_server(ServerConfig::with_data_dir(tmp.path())).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    send(&mut ws, &edit("u2", &["let = ;("])).await;
    send(&mut ws, &resume("u2")).await;
    assert_eq!(recv(&mut ws).await, content(&["let = ;("]));

    let preview = reqwest::get(format!("http://{addr}/preview/u2/index.js"))
        .await
        .unwrap();
    assert_eq!(preview.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_and_unknown_frames_keep_connection_open() {
    let tmp = tempfile::tempdir().unwrap();
    let addr = spawn_server(ServerConfig::with_data_dir(tmp.path())).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    send_raw(&mut ws, "not json").await;
    send_raw(&mut ws, r#"{"hello":"world"}"#).await;
    send_raw(&mut ws, r#"{"user":"u3"}"#).await;
    send(&mut ws, &resume("fresh-user")).await;
    assert_eq!(recv(&mut ws).await, content(&[]));
}

#[tokio::test]
async fn workspace_outlives_connection() {
    let tmp = tempfile::tempdir().unwrap();
    let addr = spawn_server(ServerConfig::with_data_dir(tmp.path())).await;

    let (mut first, response) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let cookie = response.headers()["set-cookie"].to_str().unwrap().to_string();
    let pair = cookie.split(';').next().unwrap().to_string();

    send(&mut first, &edit("u4", &["const a: number = 1", "console.log(a)"])).await;
    assert_eq!(recv(&mut first).await, ServerMessage::Reload);
    first.close(None).await.unwrap();

    // Reconnect presenting the session cookie: no new session is minted.
    let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
    request
        .headers_mut()
        .insert("cookie", HeaderValue::from_str(&pair).unwrap());
    let (mut second, response) = connect_async(request).await.unwrap();
    assert!(response.headers().get("set-cookie").is_none());

    send(&mut second, &resume("u4")).await;
    assert_eq!(
        recv(&mut second).await,
        content(&["const a: number = 1", "console.log(a)"])
    );
}

#[tokio::test]
async fn single_workspace_mode_shares_one_workspace() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::with_data_dir(tmp.path());
    config.single_workspace = Some("shared".into());
    let addr = spawn_server(config).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    send(&mut ws, &edit("alice", &["console.log('hi')"])).await;
    assert_eq!(recv(&mut ws).await, ServerMessage::Reload);
    send(&mut ws, &resume("bob")).await;
    assert_eq!(recv(&mut ws).await, content(&["console.log('hi')"]));

    let preview = reqwest::get(format!("http://{addr}/preview/anyone/index.js"))
        .await
        .unwrap();
    assert_eq!(preview.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn session_endpoint_sets_cookie_once() {
    let tmp = tempfile::tempdir().unwrap();
    let addr = spawn_server(ServerConfig::with_data_dir(tmp.path())).await;
    let client = reqwest::Client::new();

    let first = client
        .get(format!("http://{addr}/session"))
        .send()
        .await
        .unwrap();
    let cookie = first.headers()["set-cookie"].to_str().unwrap().to_string();
    let body: serde_json::Value = first.json().await.unwrap();
    assert_eq!(body["new"], true);

    let pair = cookie.split(';').next().unwrap().to_string();
    let again = client
        .get(format!("http://{addr}/session"))
        .header("cookie", pair)
        .send()
        .await
        .unwrap();
    assert!(again.headers().get("set-cookie").is_none());
    let body: serde_json::Value = again.json().await.unwrap();
    assert_eq!(body["new"], false);

    let health = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.text().await.unwrap(), "OK");
}
