//! 门店看板的实时推送
//!
//! 每条连接订阅一个门店房间，收到的 `BranchEvent` 以 JSON 文本帧转发；
//! 连接关闭即离开房间。

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use routing_core::models::branch_room;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::routes::AppState;

/// 加入门店房间
pub async fn branch_room_handler(
    ws: WebSocketUpgrade,
    Path(branch_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, branch_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, branch_id: String) {
    let room = branch_room(&branch_id);
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.events.subscribe(&branch_id);
    info!("看板连接加入 {}", room);

    let send_room = room.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{} 的连接落后，跳过 {} 条事件", send_room, skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize branch event: {}", e);
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                other => debug!("忽略看板消息: {:?}", other),
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("看板连接离开 {}", room);
}
