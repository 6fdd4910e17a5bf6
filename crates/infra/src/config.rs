use chrono::Duration;

use innkeep_billing::PricingPolicy;

/// Engine tuning shared by every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// A line unchecked for longer than this puts the room in `inspection_required`.
    pub staleness: Duration,
    /// Attempts per operation when the store reports a version conflict.
    pub commit_retries: u32,
    pub pricing: PricingPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staleness: Duration::hours(24),
            commit_retries: 5,
            pricing: PricingPolicy::standard(),
        }
    }
}

impl EngineConfig {
    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_commit_retries(mut self, retries: u32) -> Self {
        self.commit_retries = retries.max(1);
        self
    }

    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }
}
