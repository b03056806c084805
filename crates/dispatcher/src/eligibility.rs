//! 门店资格判定
//!
//! 按距离升序（同距离按门店ID升序）排序，然后依次尝试主半径、扩展半径，
//! 都没有命中时退化为不限距离的最近门店。关闭状态不在这里判断。

use std::cmp::Ordering;

use routing_core::config::RoutingConfig;
use routing_core::geo::GeoPoint;
use routing_core::models::Branch;
use routing_core::{RoutingError, RoutingResult};

/// 半径升级策略（公里）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusPolicy {
    pub primary_km: f64,
    pub expanded_km: f64,
}

impl Default for RadiusPolicy {
    fn default() -> Self {
        Self {
            primary_km: 20.0,
            expanded_km: 35.0,
        }
    }
}

impl From<&RoutingConfig> for RadiusPolicy {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            primary_km: config.primary_radius_km,
            expanded_km: config.expanded_radius_km,
        }
    }
}

/// 命中的半径层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusTier {
    Primary,
    Expanded,
    NearestFallback,
}

/// 带距离的候选门店
#[derive(Debug, Clone, PartialEq)]
pub struct BranchCandidate {
    pub branch: Branch,
    pub distance_km: f64,
}

/// 一次资格判定的结果，`candidates` 已排序且非空
#[derive(Debug, Clone, PartialEq)]
pub struct Eligibility {
    pub tier: RadiusTier,
    pub radius_used_km: f64,
    pub candidates: Vec<BranchCandidate>,
}

impl Eligibility {
    pub fn nearest(&self) -> &BranchCandidate {
        &self.candidates[0]
    }

    /// 候选中第一个营业的门店
    pub fn first_open(&self) -> Option<&BranchCandidate> {
        self.candidates.iter().find(|c| !c.branch.is_closed)
    }
}

fn compare_candidates(a: &BranchCandidate, b: &BranchCandidate) -> Ordering {
    a.distance_km
        .total_cmp(&b.distance_km)
        .then_with(|| a.branch.id.cmp(&b.branch.id))
}

/// 计算每个门店到顾客的距离并排序
pub fn rank_branches(customer: GeoPoint, branches: Vec<Branch>) -> Vec<BranchCandidate> {
    let mut ranked: Vec<BranchCandidate> = branches
        .into_iter()
        .map(|branch| {
            let distance_km = customer.distance_to(&branch.location());
            BranchCandidate {
                branch,
                distance_km,
            }
        })
        .collect();
    ranked.sort_by(compare_candidates);
    ranked
}

/// 半径内（含边界）的候选，保持原有顺序
pub fn eligible_within(ranked: &[BranchCandidate], radius_km: f64) -> Vec<BranchCandidate> {
    ranked
        .iter()
        .filter(|c| c.distance_km <= radius_km)
        .cloned()
        .collect()
}

/// 按半径升级规则选出候选集合
///
/// 门店列表为空时返回 `RoutingError::NoActiveBranches`。
pub fn select_eligible(
    customer: GeoPoint,
    branches: Vec<Branch>,
    policy: &RadiusPolicy,
) -> RoutingResult<Eligibility> {
    let ranked = rank_branches(customer, branches);
    let Some(nearest) = ranked.first().cloned() else {
        return Err(RoutingError::NoActiveBranches);
    };

    let primary = eligible_within(&ranked, policy.primary_km);
    if !primary.is_empty() {
        return Ok(Eligibility {
            tier: RadiusTier::Primary,
            radius_used_km: policy.primary_km,
            candidates: primary,
        });
    }

    let expanded = eligible_within(&ranked, policy.expanded_km);
    if !expanded.is_empty() {
        return Ok(Eligibility {
            tier: RadiusTier::Expanded,
            radius_used_km: policy.expanded_km,
            candidates: expanded,
        });
    }

    Ok(Eligibility {
        tier: RadiusTier::NearestFallback,
        radius_used_km: nearest.distance_km,
        candidates: vec![nearest],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use routing_testing_utils::{customer_at, point_north_of, BranchBuilder, CITY_CENTRE};

    fn branch_at(id: &str, km: f64) -> Branch {
        BranchBuilder::new(id).at(customer_at(km)).build()
    }

    #[test]
    fn test_rank_orders_by_distance_then_id() {
        let ranked = rank_branches(
            CITY_CENTRE,
            vec![branch_at("C", 10.0), branch_at("B", 3.0), branch_at("A", 3.0)],
        );
        let ids: Vec<&str> = ranked.iter().map(|c| c.branch.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert!((ranked[2].distance_km - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_primary_radius_hit() {
        let eligibility = select_eligible(
            CITY_CENTRE,
            vec![branch_at("B40", 40.0), branch_at("B5", 5.0), branch_at("B22", 22.0)],
            &RadiusPolicy::default(),
        )
        .unwrap();

        assert_eq!(eligibility.tier, RadiusTier::Primary);
        assert_eq!(eligibility.radius_used_km, 20.0);
        assert_eq!(eligibility.candidates.len(), 1);
        assert_eq!(eligibility.nearest().branch.id, "B5");
    }

    #[test]
    fn test_expanded_radius_hit() {
        let eligibility = select_eligible(
            CITY_CENTRE,
            vec![branch_at("B25", 25.0), branch_at("B40", 40.0)],
            &RadiusPolicy::default(),
        )
        .unwrap();

        assert_eq!(eligibility.tier, RadiusTier::Expanded);
        assert_eq!(eligibility.radius_used_km, 35.0);
        assert_eq!(eligibility.nearest().branch.id, "B25");
    }

    #[test]
    fn test_nearest_fallback_uses_actual_distance() {
        let eligibility = select_eligible(
            CITY_CENTRE,
            vec![branch_at("B50", 50.0), branch_at("B80", 80.0)],
            &RadiusPolicy::default(),
        )
        .unwrap();

        assert_eq!(eligibility.tier, RadiusTier::NearestFallback);
        assert!((eligibility.radius_used_km - 50.0).abs() < 1e-6);
        assert_eq!(eligibility.candidates.len(), 1);
    }

    #[test]
    fn test_boundary_distance_is_inclusive() {
        let ranked = rank_branches(CITY_CENTRE, vec![branch_at("B", 5.0)]);
        let exact = ranked[0].distance_km;
        assert_eq!(eligible_within(&ranked, exact).len(), 1);
    }

    #[test]
    fn test_empty_directory() {
        let result = select_eligible(CITY_CENTRE, vec![], &RadiusPolicy::default());
        assert!(matches!(result, Err(RoutingError::NoActiveBranches)));
    }

    #[test]
    fn test_first_open_skips_closed() {
        let eligibility = select_eligible(
            CITY_CENTRE,
            vec![
                BranchBuilder::new("near").at(customer_at(2.0)).closed().build(),
                branch_at("far", 8.0),
            ],
            &RadiusPolicy::default(),
        )
        .unwrap();

        assert_eq!(eligibility.nearest().branch.id, "near");
        assert_eq!(eligibility.first_open().unwrap().branch.id, "far");
    }

    proptest! {
        #[test]
        fn prop_expanded_set_contains_primary_set(
            distances in proptest::collection::vec(0.0f64..120.0, 1..12),
        ) {
            let branches: Vec<Branch> = distances
                .iter()
                .enumerate()
                .map(|(i, km)| {
                    BranchBuilder::new(&format!("B{i:02}"))
                        .at(point_north_of(CITY_CENTRE, *km))
                        .build()
                })
                .collect();
            let policy = RadiusPolicy::default();
            let ranked = rank_branches(CITY_CENTRE, branches.clone());

            let primary = eligible_within(&ranked, policy.primary_km);
            let expanded = eligible_within(&ranked, policy.expanded_km);
            for candidate in &primary {
                prop_assert!(expanded.iter().any(|c| c.branch.id == candidate.branch.id));
            }

            let eligibility = select_eligible(CITY_CENTRE, branches, &policy).unwrap();
            prop_assert_eq!(&eligibility.nearest().branch.id, &ranked[0].branch.id);
            for candidate in &eligibility.candidates {
                prop_assert!(candidate.distance_km <= eligibility.radius_used_km);
            }
        }
    }
}
