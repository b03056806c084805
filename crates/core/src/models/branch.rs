use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// 门店
///
/// `is_active = false` 的门店完全不参与路由；`is_closed` 表示门店存在但暂停接单。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_active: bool,
    pub is_closed: bool,
}

impl Branch {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_open(&self) -> bool {
        self.is_active && !self.is_closed
    }
}
