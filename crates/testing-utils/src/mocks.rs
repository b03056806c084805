//! Mock implementations of the repository, directory, notifier and queue traits
//!
//! All mocks are cheap to clone and share state between clones, so a test can
//! hand one copy to the engine and keep another for assertions.

use async_trait::async_trait;
use routing_core::errors::{RoutingError, RoutingResult};
use routing_core::models::{Branch, BranchEvent, Message, Order, RoutingUpdate};
use routing_core::traits::{
    BranchAdmin, BranchDirectory, DispatchNotifier, MessageQueue, OrderRepository,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock implementation of OrderRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockOrderRepository {
    orders: Arc<Mutex<HashMap<String, Order>>>,
    find_failures: Arc<Mutex<u32>>,
    update_conflicts: Arc<Mutex<u32>>,
    update_calls: Arc<Mutex<u32>>,
}

impl MockOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: Vec<Order>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.orders.lock().unwrap();
            for order in orders {
                map.insert(order.id.clone(), order);
            }
        }
        repo
    }

    /// The next `count` reads fail with a transient database error
    pub fn fail_next_finds(&self, count: u32) {
        *self.find_failures.lock().unwrap() = count;
    }

    /// The next `count` conditional writes lose the version race
    pub fn conflict_next_updates(&self, count: u32) {
        *self.update_conflicts.lock().unwrap() = count;
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        self.orders.lock().unwrap().get(id).cloned()
    }

    /// Overwrite an order directly, e.g. to simulate a concurrent writer
    pub fn put(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id.clone(), order);
    }

    /// Number of successful conditional writes
    pub fn update_calls(&self) -> u32 {
        *self.update_calls.lock().unwrap()
    }

    pub fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderRepository for MockOrderRepository {
    async fn create(&self, order: &Order) -> RoutingResult<Order> {
        let mut orders = self.orders.lock().unwrap();
        if orders.contains_key(&order.id) {
            return Err(RoutingError::invalid_request(format!(
                "订单已存在: {}",
                order.id
            )));
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(order.clone())
    }

    async fn find_by_id(&self, id: &str) -> RoutingResult<Option<Order>> {
        {
            let mut failures = self.find_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(RoutingError::Database("injected read failure".to_string()));
            }
        }
        Ok(self.orders.lock().unwrap().get(id).cloned())
    }

    async fn apply_routing_update(
        &self,
        order_id: &str,
        expected_version: i64,
        update: &RoutingUpdate,
    ) -> RoutingResult<Order> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| RoutingError::order_not_found(order_id))?;

        {
            let mut conflicts = self.update_conflicts.lock().unwrap();
            if *conflicts > 0 {
                *conflicts -= 1;
                return Err(RoutingError::concurrent_modification(
                    order_id,
                    expected_version,
                ));
            }
        }

        if order.version != expected_version {
            return Err(RoutingError::concurrent_modification(
                order_id,
                expected_version,
            ));
        }

        update.apply_to(order);
        *self.update_calls.lock().unwrap() += 1;
        Ok(order.clone())
    }
}

/// Mock implementation of BranchDirectory for testing
#[derive(Debug, Clone, Default)]
pub struct MockBranchDirectory {
    branches: Arc<Mutex<Vec<Branch>>>,
    failures: Arc<Mutex<u32>>,
    list_calls: Arc<Mutex<u32>>,
}

impl MockBranchDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branches(branches: Vec<Branch>) -> Self {
        let directory = Self::new();
        *directory.branches.lock().unwrap() = branches;
        directory
    }

    pub fn set_branches(&self, branches: Vec<Branch>) {
        *self.branches.lock().unwrap() = branches;
    }

    /// The next `count` listings fail as if the directory were unreachable
    pub fn fail_next(&self, count: u32) {
        *self.failures.lock().unwrap() = count;
    }

    pub fn branches(&self) -> Vec<Branch> {
        self.branches.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> u32 {
        *self.list_calls.lock().unwrap()
    }
}

#[async_trait]
impl BranchDirectory for MockBranchDirectory {
    async fn list_active_branches(&self) -> RoutingResult<Vec<Branch>> {
        *self.list_calls.lock().unwrap() += 1;
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(RoutingError::directory_unavailable("injected outage"));
            }
        }
        Ok(self
            .branches
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BranchAdmin for MockBranchDirectory {
    async fn upsert_branch(&self, branch: &Branch) -> RoutingResult<()> {
        let mut branches = self.branches.lock().unwrap();
        match branches.iter_mut().find(|b| b.id == branch.id) {
            Some(existing) => *existing = branch.clone(),
            None => branches.push(branch.clone()),
        }
        Ok(())
    }

    async fn set_closed(&self, branch_id: &str, is_closed: bool) -> RoutingResult<()> {
        let mut branches = self.branches.lock().unwrap();
        let branch = branches
            .iter_mut()
            .find(|b| b.id == branch_id)
            .ok_or_else(|| RoutingError::branch_not_found(branch_id))?;
        branch.is_closed = is_closed;
        Ok(())
    }
}

/// Mock DispatchNotifier that records every published event
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    events: Arc<Mutex<Vec<(String, BranchEvent)>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail (the event is not recorded)
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn events(&self) -> Vec<(String, BranchEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, branch_id: &str) -> Vec<BranchEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == branch_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl DispatchNotifier for MockNotifier {
    async fn publish(&self, branch_id: &str, event: BranchEvent) -> RoutingResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(RoutingError::Notification(format!(
                "branch-{branch_id} unreachable"
            )));
        }
        self.events
            .lock()
            .unwrap()
            .push((branch_id.to_string(), event));
        Ok(())
    }
}

/// Mock MessageQueue that records acks/nacks and can refuse publishes
#[derive(Debug, Clone, Default)]
pub struct MockMessageQueue {
    queues: Arc<Mutex<HashMap<String, Vec<Message>>>>,
    delayed: Arc<Mutex<Vec<(String, Message, Duration)>>>,
    acked_messages: Arc<Mutex<Vec<String>>>,
    nacked_messages: Arc<Mutex<Vec<(String, bool)>>>,
    publish_failures: Arc<Mutex<u32>>,
}

impl MockMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` publishes (immediate or delayed) fail like an unconfirmed broker write
    pub fn fail_next_publishes(&self, count: u32) {
        *self.publish_failures.lock().unwrap() = count;
    }

    pub fn add_message_to_queue(&self, queue: &str, message: Message) {
        let mut queues = self.queues.lock().unwrap();
        queues.entry(queue.to_string()).or_default().push(message);
    }

    pub fn get_queue_messages(&self, queue: &str) -> Vec<Message> {
        self.queues
            .lock()
            .unwrap()
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_delayed_messages(&self) -> Vec<(String, Message, Duration)> {
        self.delayed.lock().unwrap().clone()
    }

    pub fn get_acked_messages(&self) -> Vec<String> {
        self.acked_messages.lock().unwrap().clone()
    }

    /// `(message_id, requeue)` for every nack
    pub fn get_nacked_messages(&self) -> Vec<(String, bool)> {
        self.nacked_messages.lock().unwrap().clone()
    }

    fn take_publish_failure(&self) -> RoutingResult<()> {
        let mut failures = self.publish_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(RoutingError::MessageQueue(
                "broker did not confirm the publish".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for MockMessageQueue {
    async fn publish_message(&self, queue: &str, message: &Message) -> RoutingResult<()> {
        self.take_publish_failure()?;
        self.add_message_to_queue(queue, message.clone());
        Ok(())
    }

    async fn publish_delayed(
        &self,
        queue: &str,
        message: &Message,
        delay: Duration,
    ) -> RoutingResult<()> {
        self.take_publish_failure()?;
        self.delayed
            .lock()
            .unwrap()
            .push((queue.to_string(), message.clone(), delay));
        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> RoutingResult<Vec<Message>> {
        let mut queues = self.queues.lock().unwrap();
        Ok(queues.remove(queue).unwrap_or_default())
    }

    async fn ack_message(&self, message_id: &str) -> RoutingResult<()> {
        self.acked_messages
            .lock()
            .unwrap()
            .push(message_id.to_string());
        Ok(())
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> RoutingResult<()> {
        self.nacked_messages
            .lock()
            .unwrap()
            .push((message_id.to_string(), requeue));
        Ok(())
    }

    async fn create_queue(&self, queue: &str, _durable: bool) -> RoutingResult<()> {
        let mut queues = self.queues.lock().unwrap();
        queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn get_queue_size(&self, queue: &str) -> RoutingResult<u32> {
        let queues = self.queues.lock().unwrap();
        Ok(queues.get(queue).map(|q| q.len()).unwrap_or(0) as u32)
    }

    async fn purge_queue(&self, queue: &str) -> RoutingResult<()> {
        let mut queues = self.queues.lock().unwrap();
        if let Some(messages) = queues.get_mut(queue) {
            messages.clear();
        }
        Ok(())
    }
}
