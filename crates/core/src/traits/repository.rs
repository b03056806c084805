//! 数据仓储层接口定义
//!
//! - `OrderRepository` - 订单读取与路由结果的条件写入
//! - `BranchDirectory` - 门店目录快照
//! - `BranchAdmin` - 门店维护（新增、暂停/恢复接单）
//!
//! 所有实现都必须是 `Send + Sync`，以 `Arc<dyn Trait>` 的形式注入。

use async_trait::async_trait;

use crate::errors::RoutingResult;
use crate::models::{Branch, Order, RoutingUpdate};

/// 订单仓储
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 新建订单
    async fn create(&self, order: &Order) -> RoutingResult<Order>;

    /// 按ID查询订单
    async fn find_by_id(&self, id: &str) -> RoutingResult<Option<Order>>;

    /// 以比较并交换的方式写入一次路由决策
    ///
    /// 当前版本号不等于 `expected_version` 时返回
    /// `RoutingError::ConcurrentModification`，订单不存在时返回
    /// `RoutingError::OrderNotFound`。成功时返回写入后的订单。
    async fn apply_routing_update(
        &self,
        order_id: &str,
        expected_version: i64,
        update: &RoutingUpdate,
    ) -> RoutingResult<Order>;
}

/// 门店目录
#[async_trait]
pub trait BranchDirectory: Send + Sync {
    /// 返回所有 `is_active = true` 的门店（包含暂停接单的门店）
    async fn list_active_branches(&self) -> RoutingResult<Vec<Branch>>;
}

/// 门店维护
#[async_trait]
pub trait BranchAdmin: Send + Sync {
    /// 新增或覆盖门店
    async fn upsert_branch(&self, branch: &Branch) -> RoutingResult<()>;

    /// 切换暂停接单状态，门店不存在时返回 `RoutingError::BranchNotFound`
    async fn set_closed(&self, branch_id: &str, is_closed: bool) -> RoutingResult<()>;
}
