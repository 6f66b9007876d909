//! WebSocket connection handlers.
//!
//! 1 接続につき、受信タスク（コマンドの解釈）と送信タスク（配信とハートビート）の 2 つを動かす。
//! どちらかが終了したらもう一方も止め、切断処理を行う。

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};

use crate::{
    config::HeartbeatConfig,
    domain::{AuthenticatedUser, Command, Connection},
    infrastructure::dto::{http::ErrorResponse, websocket::ClientCommand},
    ui::state::AppState,
    usecase::{CommandError, ConnectError},
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// `GET /ws`
///
/// 資格情報はアップグレード前に検証し、失敗時は 401 を返す（接続の状態は何も作られない）。
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let token = query.token.or_else(|| bearer_token(&headers));

    let user = state
        .coordinator
        .connect_user()
        .authenticate(token.as_deref())
        .await
        .map_err(|e| {
            let status = match e {
                ConnectError::Auth(_) => StatusCode::UNAUTHORIZED,
                ConnectError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, Json(ErrorResponse { error: e.to_string() }))
        })?;

    tracing::info!(user_id = %user.user_id, "Authenticated, upgrading to WebSocket");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: AuthenticatedUser) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = match state.coordinator.connect_user().establish(user, tx).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Dropping upgraded socket: {}", e);
            return;
        }
    };

    let (sender, mut receiver) = socket.split();
    let (activity_tx, activity_rx) = watch::channel(Instant::now());

    let reader_state = state.clone();
    let reader_connection = connection.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %reader_connection.id,
                        "WebSocket error: {}",
                        e
                    );
                    break;
                }
            };
            // Pong を含め、何か届けば生存とみなす
            activity_tx.send_replace(Instant::now());

            match frame {
                Message::Text(text) => {
                    handle_text(&reader_state, &reader_connection, text.as_str()).await;
                }
                Message::Binary(_) => {
                    let error =
                        CommandError::InvalidCommand("binary frames are not supported".to_string());
                    reader_state
                        .coordinator
                        .handle_command()
                        .report_error(&reader_connection.id, &error)
                        .await;
                }
                Message::Close(_) => {
                    tracing::debug!(connection_id = %reader_connection.id, "Client requested close");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender, activity_rx, state.heartbeat);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.coordinator.disconnect_user().execute(connection).await;
}

async fn handle_text(state: &AppState, connection: &Connection, text: &str) {
    let command = serde_json::from_str::<ClientCommand>(text)
        .map_err(|e| e.to_string())
        .and_then(|dto| Command::try_from(dto).map_err(|e| e.to_string()));

    match command {
        // 失敗は execute の中で要求元に返している
        Ok(command) => {
            let _ = state
                .coordinator
                .handle_command()
                .execute(connection, command)
                .await;
        }
        Err(reason) => {
            tracing::warn!(
                connection_id = %connection.id,
                "Invalid command frame: {}",
                reason
            );
            state
                .coordinator
                .handle_command()
                .report_error(&connection.id, &CommandError::InvalidCommand(reason))
                .await;
        }
    }
}

/// 配信とハートビート
///
/// 送信チャンネルのフレームをソケットに書き出し、`heartbeat.interval` ごとに Ping を送る。
/// `heartbeat.idle_limit()` の間何も受信しなければ 1001 で閉じる。
/// 送信チャンネルが閉じられた（コーディネーターの停止）場合も 1001 で閉じる。
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
    activity: watch::Receiver<Instant>,
    heartbeat: HeartbeatConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ping =
            tokio::time::interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let deadline = *activity.borrow() + heartbeat.idle_limit();
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        close(&mut sender, "server shutting down").await;
                        break;
                    }
                },
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    // 待っている間に受信していれば期限を延ばす
                    if activity.borrow().elapsed() < heartbeat.idle_limit() {
                        continue;
                    }
                    tracing::warn!("Heartbeat timed out, closing connection");
                    close(&mut sender, "heartbeat timeout").await;
                    break;
                }
            }
        }
    })
}

async fn close(sender: &mut SplitSink<WebSocket, Message>, reason: &'static str) {
    let frame = CloseFrame {
        code: close_code::AWAY,
        reason: Utf8Bytes::from_static(reason),
    };
    if let Err(e) = sender.send(Message::Close(Some(frame))).await {
        tracing::debug!("Failed to send close frame: {}", e);
    }
}
