use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::RoutingResult;
use crate::models::BranchEvent;

/// 门店通知发布端
///
/// 尽力而为：调用方记录并吞掉错误，已落库的路由结果不会因通知失败回滚。
#[async_trait]
pub trait DispatchNotifier: Send + Sync {
    async fn publish(&self, branch_id: &str, event: BranchEvent) -> RoutingResult<()>;
}

/// 门店房间订阅端，供看板连接使用
pub trait BranchEventSource: Send + Sync {
    fn subscribe(&self, branch_id: &str) -> broadcast::Receiver<BranchEvent>;
}
