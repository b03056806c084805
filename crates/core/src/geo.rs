//! 大圆距离计算
//!
//! 使用 haversine 公式计算两个经纬度坐标之间的球面距离（公里）。

use serde::{Deserialize, Serialize};

/// 地球平均半径（公里）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 经纬度坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// 坐标是否为有限值且在合法范围内
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance_km(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// 计算两点间的大圆距离（公里）
///
/// 输入为 NaN 属于调用方违约，结果同样为 NaN，不做运行时恢复。
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // 浮点误差可能让 a 略微超过 1，钳制后 sqrt(1 - a) 不会出现 NaN
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    #[test]
    fn test_identical_points_are_zero() {
        assert_eq!(distance_km(25.20, 55.27, 25.20, 55.27), 0.0);
        assert_eq!(distance_km(-33.86, 151.2, -33.86, 151.2), 0.0);
    }

    #[test]
    fn test_antipodal_points() {
        let expected = PI * EARTH_RADIUS_KM;
        let d = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - expected).abs() < 1e-3, "got {d}, expected {expected}");

        let d = distance_km(25.20, 55.27, -25.20, 55.27 - 180.0);
        assert!((d - expected).abs() < 1e-3, "got {d}, expected {expected}");
    }

    #[test]
    fn test_known_distance() {
        // 沿经线移动 1 度 = R * π / 180
        let one_degree = EARTH_RADIUS_KM * PI / 180.0;
        let d = distance_km(25.0, 55.0, 26.0, 55.0);
        assert!((d - one_degree).abs() < 1e-9);
    }

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(25.2, 55.27).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(90.1, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_valid());
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric_and_bounded(
            lat1 in -90.0f64..=90.0,
            lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0,
            lon2 in -180.0f64..=180.0,
        ) {
            let forward = distance_km(lat1, lon1, lat2, lon2);
            let backward = distance_km(lat2, lon2, lat1, lon1);

            prop_assert!(forward >= 0.0);
            prop_assert!(forward <= PI * EARTH_RADIUS_KM + 1e-6);
            prop_assert!((forward - backward).abs() < 1e-6);
        }

        #[test]
        fn prop_same_point_is_zero(
            lat in -90.0f64..=90.0,
            lon in -180.0f64..=180.0,
        ) {
            prop_assert_eq!(distance_km(lat, lon, lat, lon), 0.0);
        }
    }
}
