//! Test helper utilities and geo fixtures

use routing_core::geo::{GeoPoint, EARTH_RADIUS_KM};
use std::time::Duration;
use tokio::time::sleep;

/// Reference point all fixtures are laid out around
pub const CITY_CENTRE: GeoPoint = GeoPoint {
    latitude: 25.2048,
    longitude: 55.2708,
};

/// Kilometres per degree of latitude on the haversine sphere
pub fn km_per_degree() -> f64 {
    EARTH_RADIUS_KM * std::f64::consts::PI / 180.0
}

/// A point exactly `km` kilometres due north of `origin`
pub fn point_north_of(origin: GeoPoint, km: f64) -> GeoPoint {
    GeoPoint::new(origin.latitude + km / km_per_degree(), origin.longitude)
}

/// A point `km` kilometres north of the city centre
pub fn customer_at(km: f64) -> GeoPoint {
    point_north_of(CITY_CENTRE, km)
}

pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }

        false
    }
}
