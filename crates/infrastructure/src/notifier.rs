use async_trait::async_trait;
use metrics::counter;
use routing_core::models::{branch_room, BranchEvent};
use routing_core::traits::{BranchEventSource, DispatchNotifier};
use routing_core::RoutingResult;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_ROOM_CAPACITY: usize = 256;

/// 基于 `tokio::sync::broadcast` 的门店房间
///
/// 每个门店一个房间，房间在第一次订阅或发布时创建。没有订阅者时发布直接丢弃，
/// 看板断线期间的事件不补发。
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    rooms: Arc<RwLock<HashMap<String, broadcast::Sender<BranchEvent>>>>,
    capacity: usize,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ROOM_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn room(&self, branch_id: &str) -> broadcast::Sender<BranchEvent> {
        if let Ok(rooms) = self.rooms.read() {
            if let Some(sender) = rooms.get(branch_id) {
                return sender.clone();
            }
        }

        let mut rooms = match self.rooms.write() {
            Ok(rooms) => rooms,
            Err(poisoned) => poisoned.into_inner(),
        };
        rooms
            .entry(branch_id.to_string())
            .or_insert_with(|| {
                debug!("创建门店房间 {}", branch_room(branch_id));
                broadcast::channel(self.capacity).0
            })
            .clone()
    }

    /// 当前订阅该门店的连接数
    pub fn subscriber_count(&self, branch_id: &str) -> usize {
        self.rooms
            .read()
            .ok()
            .and_then(|rooms| rooms.get(branch_id).map(|s| s.receiver_count()))
            .unwrap_or(0)
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchNotifier for BroadcastNotifier {
    async fn publish(&self, branch_id: &str, event: BranchEvent) -> RoutingResult<()> {
        let name = event.name();
        match self.room(branch_id).send(event) {
            Ok(receivers) => {
                debug!(
                    "事件 {} 已推送到 {} ({} 个连接)",
                    name,
                    branch_room(branch_id),
                    receivers
                );
                counter!("routing_notifications_total", "event" => name).increment(1);
            }
            Err(_) => {
                warn!("{} 当前没有连接，事件 {} 被丢弃", branch_room(branch_id), name);
                counter!("routing_notifications_dropped_total", "event" => name).increment(1);
            }
        }
        Ok(())
    }
}

impl BranchEventSource for BroadcastNotifier {
    fn subscribe(&self, branch_id: &str) -> broadcast::Receiver<BranchEvent> {
        self.room(branch_id).subscribe()
    }
}
