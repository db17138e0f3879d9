//! Configuration for the convergence stress test.

/// Shape of one stress run.
#[derive(Clone, Debug, PartialEq)]
pub struct StressConfig {
    /// Number of simulated replicas.
    pub replicas: usize,
    /// Local adds performed by each replica.
    pub ops_per_replica: usize,
    /// Random pairwise state exchanges before the final round.
    pub syncs: usize,
    /// Probability that an add is followed by removing an older element.
    pub remove_ratio: f64,
    /// Seed for the schedule; `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            replicas: 4,
            ops_per_replica: 100,
            syncs: 200,
            remove_ratio: 0.3,
            seed: None,
        }
    }
}

impl StressConfig {
    pub fn builder() -> StressConfigBuilder {
        StressConfigBuilder::new()
    }
}

/// Builder for stress configuration.
pub struct StressConfigBuilder {
    config: StressConfig,
}

impl StressConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StressConfig::default(),
        }
    }

    pub fn replicas(mut self, count: usize) -> Self {
        self.config.replicas = count;
        self
    }

    pub fn ops_per_replica(mut self, count: usize) -> Self {
        self.config.ops_per_replica = count;
        self
    }

    pub fn syncs(mut self, count: usize) -> Self {
        self.config.syncs = count;
        self
    }

    /// Clamped to `[0, 1]`.
    pub fn remove_ratio(mut self, ratio: f64) -> Self {
        self.config.remove_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn build(self) -> StressConfig {
        self.config
    }
}

impl Default for StressConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = StressConfig::builder()
            .replicas(8)
            .syncs(10)
            .remove_ratio(3.0)
            .seed(Some(9))
            .build();

        assert_eq!(config.replicas, 8);
        assert_eq!(config.ops_per_replica, StressConfig::default().ops_per_replica);
        assert_eq!(config.syncs, 10);
        assert_eq!(config.remove_ratio, 1.0);
        assert_eq!(config.seed, Some(9));
    }
}
