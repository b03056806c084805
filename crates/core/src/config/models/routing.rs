use serde::{Deserialize, Serialize};

/// 路由半径配置（公里）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub primary_radius_km: f64,
    pub expanded_radius_km: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            primary_radius_km: 20.0,
            expanded_radius_km: 35.0,
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.primary_radius_km.is_finite() || self.primary_radius_km <= 0.0 {
            return Err(anyhow::anyhow!("主半径必须为正数"));
        }

        if !self.expanded_radius_km.is_finite()
            || self.expanded_radius_km <= self.primary_radius_km
        {
            return Err(anyhow::anyhow!("扩展半径必须大于主半径"));
        }

        Ok(())
    }
}
