use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use routing_api::{create_app, AppState, OrderPlacementService, RoutingIntakeService};
use routing_core::config::ApiConfig;
use routing_core::models::{BranchEvent, OrderStatus, RetryPolicy};
use routing_core::traits::{BranchEventSource, MessageQueue};
use routing_infrastructure::{BroadcastNotifier, InMemoryMessageQueue};
use routing_testing_utils::{
    BranchBuilder, MockBranchDirectory, MockMessageQueue, MockOrderRepository, OrderBuilder,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const ROUTING_QUEUE: &str = "order-routing";

struct TestApp {
    router: Router,
    orders: MockOrderRepository,
    directory: MockBranchDirectory,
    notifier: BroadcastNotifier,
    queue: InMemoryMessageQueue,
}

fn test_app() -> TestApp {
    let orders = MockOrderRepository::new();
    let directory = MockBranchDirectory::with_branches(vec![BranchBuilder::new("B1").build()]);
    let notifier = BroadcastNotifier::new();
    let queue = InMemoryMessageQueue::new();

    let intake = Arc::new(RoutingIntakeService::new(
        Arc::new(queue.clone()),
        ROUTING_QUEUE,
        RetryPolicy::default(),
    ));
    let placement = Arc::new(OrderPlacementService::new(
        Arc::new(orders.clone()),
        Arc::new(notifier.clone()),
        intake.clone(),
    ));

    let state = AppState {
        orders: Arc::new(orders.clone()),
        branches: Arc::new(directory.clone()),
        branch_admin: Arc::new(directory.clone()),
        events: Arc::new(notifier.clone()),
        queue: Arc::new(queue.clone()),
        intake,
        placement,
    };

    TestApp {
        router: create_app(state, &ApiConfig::default()),
        orders,
        directory,
        notifier,
        queue,
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_routing_trigger_is_accepted_and_enqueued() {
    let app = test_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/routing",
        Some(json!({
            "orderId": "o-1",
            "customerLatitude": 25.2,
            "customerLongitude": 55.27,
            "isReassign": true
        })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "ROUTING");
    assert_eq!(body["data"]["orderId"], "o-1");

    let messages = app.queue.consume_messages(ROUTING_QUEUE).await.unwrap();
    assert_eq!(messages.len(), 1);
    let request = messages[0].as_routing_request().unwrap();
    assert!(request.is_reassign);
    assert_eq!(messages[0].retry_policy.max_attempts, 3);
    assert_eq!(messages[0].retry_policy.base_delay_ms, 1000);
}

#[tokio::test]
async fn test_routing_trigger_rejects_invalid_coordinates() {
    let app = test_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/routing",
        Some(json!({
            "orderId": "o-1",
            "customerLatitude": 91.0,
            "customerLongitude": 55.27
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "INVALID_REQUEST");
    assert_eq!(app.queue.get_queue_size(ROUTING_QUEUE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_routing_trigger_rejects_blank_order_id() {
    let app = test_app();
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/routing",
        Some(json!({
            "orderId": "  ",
            "customerLatitude": 25.0,
            "customerLongitude": 55.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delivery_order_is_stored_routing_and_enqueued() {
    let app = test_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(json!({
            "orderId": "o-del",
            "mode": "DELIVERY",
            "customerLatitude": 25.2,
            "customerLongitude": 55.27
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "ROUTING");

    let stored = app.orders.get("o-del").unwrap();
    assert_eq!(stored.status, OrderStatus::Routing);
    assert!(stored.branch_id.is_none());
    assert_eq!(app.queue.get_queue_size(ROUTING_QUEUE).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delivery_retry_after_failed_enqueue_requeues_order() {
    let orders = MockOrderRepository::new();
    let directory = MockBranchDirectory::new();
    let notifier = BroadcastNotifier::new();
    let queue = MockMessageQueue::new();
    let intake = Arc::new(RoutingIntakeService::new(
        Arc::new(queue.clone()),
        ROUTING_QUEUE,
        RetryPolicy::default(),
    ));
    let placement = Arc::new(OrderPlacementService::new(
        Arc::new(orders.clone()),
        Arc::new(notifier.clone()),
        intake.clone(),
    ));
    let router = create_app(
        AppState {
            orders: Arc::new(orders.clone()),
            branches: Arc::new(directory.clone()),
            branch_admin: Arc::new(directory),
            events: Arc::new(notifier),
            queue: Arc::new(queue.clone()),
            intake,
            placement,
        },
        &ApiConfig::default(),
    );
    let order = json!({
        "orderId": "o-stranded",
        "mode": "DELIVERY",
        "customerLatitude": 25.2,
        "customerLongitude": 55.27
    });

    queue.fail_next_publishes(1);
    let (status, body) = send(&router, "POST", "/api/orders", Some(order.clone())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["type"], "SERVICE_UNAVAILABLE");
    assert_eq!(orders.get("o-stranded").unwrap().status, OrderStatus::Routing);
    assert!(queue.get_queue_messages(ROUTING_QUEUE).is_empty());

    let (status, body) = send(&router, "POST", "/api/orders", Some(order.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "ROUTING");
    let queued = queue.get_queue_messages(ROUTING_QUEUE);
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].as_routing_request().unwrap().order_id, "o-stranded");

    // 已经路由过的订单不再接受重复下单
    let mut routed = orders.get("o-stranded").unwrap();
    routed.status = OrderStatus::Pending;
    routed.routing_attempts = 1;
    orders.put(routed);
    let (status, _) = send(&router, "POST", "/api/orders", Some(order)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(queue.get_queue_messages(ROUTING_QUEUE).len(), 1);
}

#[tokio::test]
async fn test_pickup_order_binds_branch_and_notifies_room() {
    let app = test_app();
    let mut room = app.notifier.subscribe("B1");

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(json!({
            "orderId": "o-pick",
            "mode": "PICKUP",
            "branchId": "B1"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(body["data"]["branchId"], "B1");

    let stored = app.orders.get("o-pick").unwrap();
    assert_eq!(stored.branch_id_original.as_deref(), Some("B1"));
    assert_eq!(app.queue.get_queue_size(ROUTING_QUEUE).await.unwrap(), 0);

    match room.try_recv().unwrap() {
        BranchEvent::NewOrderAssigned(dispatch) => assert_eq!(dispatch.order_id, "o-pick"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_dine_in_without_branch_is_rejected() {
    let app = test_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/orders",
        Some(json!({ "mode": "DINE_IN" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "MISSING_BRANCH");
    assert_eq!(app.orders.count(), 0);
}

#[tokio::test]
async fn test_duplicate_order_id_is_rejected() {
    let app = test_app();
    let order = json!({ "orderId": "o-dup", "mode": "PICKUP", "branchId": "B1" });

    let (first, _) = send(&app.router, "POST", "/api/orders", Some(order.clone())).await;
    let (second, _) = send(&app.router, "POST", "/api/orders", Some(order)).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_order() {
    let app = test_app();
    app.orders.put(
        OrderBuilder::new()
            .with_id("o-get")
            .with_status(OrderStatus::Scheduled)
            .with_branch("B1")
            .build(),
    );

    let (status, body) = send(&app.router, "GET", "/api/orders/o-get", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "SCHEDULED");
    assert_eq!(body["data"]["branchId"], "B1");
    assert!(body["data"]["routingLog"].is_array());

    let (status, body) = send(&app.router, "GET", "/api/orders/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_branch_administration() {
    let app = test_app();

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/branches",
        Some(json!({
            "id": "B2",
            "name": "Marina",
            "latitude": 25.08,
            "longitude": 55.14
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        "PUT",
        "/api/branches/B2/availability",
        Some(json!({ "isClosed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isClosed"], true);

    let stored = app
        .directory
        .branches()
        .into_iter()
        .find(|b| b.id == "B2")
        .unwrap();
    assert!(stored.is_closed);

    let (status, body) = send(&app.router, "GET", "/api/branches", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app.router,
        "PUT",
        "/api/branches/nope/availability",
        Some(json!({ "isClosed": false })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "BRANCH_NOT_FOUND");
}

#[tokio::test]
async fn test_branch_with_invalid_coordinates_is_rejected() {
    let app = test_app();
    let (status, _) = send(
        &app.router,
        "POST",
        "/api/branches",
        Some(json!({ "id": "B9", "name": "Nowhere", "latitude": 120.0, "longitude": 0.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_queue_depth() {
    let app = test_app();
    send(
        &app.router,
        "POST",
        "/api/routing",
        Some(json!({ "orderId": "o-1", "customerLatitude": 1.0, "customerLongitude": 1.0 })),
    )
    .await;

    let (status, body) = send(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["routingQueueDepth"], 1);
}

#[tokio::test]
async fn test_branch_room_requires_websocket_upgrade() {
    let app = test_app();
    let (status, _) = send(&app.router, "GET", "/ws/branches/B1", None).await;
    assert!(status.is_client_error());
}
