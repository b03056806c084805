pub mod intake;
pub mod placement;

pub use intake::{RoutingAck, RoutingIntakeService, RoutingTrigger};
pub use placement::{OrderPlacementService, PlaceOrderRequest, PlacedOrder};
