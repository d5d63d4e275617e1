//! Strategy configuration parameters.

use std::time::Duration;

/// Configuration for the alpha-beta strategy.
#[derive(Debug, Clone)]
pub struct MinimaxConfig {
    /// Search depth in plies. Fixed per move, not adaptive.
    pub depth: u32,
}

impl Default for MinimaxConfig {
    fn default() -> Self {
        Self { depth: 7 }
    }
}

impl MinimaxConfig {
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }
}

/// Configuration for Monte Carlo tree search.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Wall-clock budget per move. Checked between iterations, so an
    /// in-flight rollout always completes.
    pub budget: Duration,

    /// UCT exploration constant. Higher explores more.
    pub exploration: f64,

    /// Hard iteration cap. `None` means budget-only; tests set this to get
    /// runs that do not depend on the clock.
    pub max_iterations: Option<u32>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(1),
            exploration: std::f64::consts::SQRT_2,
            max_iterations: None,
        }
    }
}

impl MctsConfig {
    /// A fast, clock-independent config for tests.
    pub fn for_testing() -> Self {
        Self {
            budget: Duration::from_millis(50),
            exploration: std::f64::consts::SQRT_2,
            max_iterations: Some(500),
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration = c;
        self
    }

    pub fn with_max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = Some(n);
        self
    }
}

/// Configuration for the rollout-memoized hybrid strategy.
#[derive(Debug, Clone)]
pub struct HybridConfig {
    /// Alpha-beta depth in plies.
    pub depth: u32,
    /// Random rollouts per evaluated leaf.
    pub rollouts: u32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            depth: 7,
            rollouts: 10,
        }
    }
}

impl HybridConfig {
    /// The alpha-beta layer's view of this config.
    pub fn minimax(&self) -> MinimaxConfig {
        MinimaxConfig { depth: self.depth }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_rollouts(mut self, rollouts: u32) -> Self {
        self.rollouts = rollouts;
        self
    }
}
