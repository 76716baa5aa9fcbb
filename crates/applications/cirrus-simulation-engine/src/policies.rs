//! Allocation-strategy state machine
//!
//! The manager cycles through three strategies, one step per redistribute
//! signal:
//! - RoundRobin -> LoadBalanced
//! - LoadBalanced -> PerformanceOptimized
//! - PerformanceOptimized -> RoundRobin
//!
//! Choosing the label is all that happens here. Acting on it is up to the
//! execution collaborator (`ExecutionService::apply_strategy`).

use cirrus_core::{AllocationStrategy, EntityId};
use serde::{Deserialize, Serialize};

/// Outcome of one redistribute signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedistributionPlan {
    pub previous: AllocationStrategy,
    pub strategy: AllocationStrategy,
    /// Every managed subordinate, in creation order
    pub affected: Vec<EntityId>,
}

/// Advance `current` and list the subordinates the new strategy applies to
pub fn on_redistribute(current: AllocationStrategy, subordinates: &[EntityId]) -> RedistributionPlan {
    RedistributionPlan {
        previous: current,
        strategy: current.next(),
        affected: subordinates.to_vec(),
    }
}

/// Strategy owned by one manager, plus a count of switches
#[derive(Debug, Clone, Default)]
pub struct StrategyCycle {
    current: AllocationStrategy,
    pub total_switches: usize,
}

impl StrategyCycle {
    pub fn new(initial: AllocationStrategy) -> Self {
        StrategyCycle {
            current: initial,
            total_switches: 0,
        }
    }

    pub fn current(&self) -> AllocationStrategy {
        self.current
    }

    pub fn redistribute(&mut self, subordinates: &[EntityId]) -> RedistributionPlan {
        let plan = on_redistribute(self.current, subordinates);
        self.current = plan.strategy;
        self.total_switches += 1;
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_advances_strategy() {
        let subs = [EntityId(1), EntityId(2)];
        let plan = on_redistribute(AllocationStrategy::LoadBalanced, &subs);

        assert_eq!(plan.previous, AllocationStrategy::LoadBalanced);
        assert_eq!(plan.strategy, AllocationStrategy::PerformanceOptimized);
        assert_eq!(plan.affected, subs.to_vec());
    }

    #[test]
    fn test_cycle_returns_to_start_after_three() {
        let mut cycle = StrategyCycle::default();
        assert_eq!(cycle.current(), AllocationStrategy::RoundRobin);

        let seen: Vec<AllocationStrategy> = (0..3).map(|_| cycle.redistribute(&[]).strategy).collect();

        assert_eq!(
            seen,
            vec![
                AllocationStrategy::LoadBalanced,
                AllocationStrategy::PerformanceOptimized,
                AllocationStrategy::RoundRobin,
            ]
        );
        assert_eq!(cycle.current(), AllocationStrategy::RoundRobin);
        assert_eq!(cycle.total_switches, 3);
    }

    #[test]
    fn test_empty_manager_still_switches() {
        let mut cycle = StrategyCycle::new(AllocationStrategy::PerformanceOptimized);
        let plan = cycle.redistribute(&[]);
        assert!(plan.affected.is_empty());
        assert_eq!(plan.strategy, AllocationStrategy::RoundRobin);
    }
}
