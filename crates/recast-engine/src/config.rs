//! Engine and campaign configuration
//!
//! All tuning constants live here as config fields with defaults and
//! builder methods; nothing is hard-coded at use sites. Adaptive state is
//! an explicit struct recomputed from batch history, never ambient
//! global state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How aggressively edits are admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyLevel {
    /// Growing batches, healthy history
    Relaxed,
    /// Default posture
    Standard,
    /// Shrinking batches after poor outcomes
    Strict,
}

/// Mutable per-campaign strategy, recomputed after every batch
///
/// Derived purely from batch history plus [`AdaptiveBounds`]; readers
/// receive an immutable snapshot per batch. Reset to defaults at campaign
/// start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Files per batch
    pub max_files_per_batch: usize,
    /// Minimum classification confidence admitted to a batch
    pub confidence_threshold: f64,
    /// Current posture
    pub safety_level: SafetyLevel,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            max_files_per_batch: 5,
            confidence_threshold: 0.7,
            safety_level: SafetyLevel::Standard,
        }
    }
}

/// Fixed bounds the adaptive strategy must respect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveBounds {
    /// Floor for `max_files_per_batch`
    pub min_files_per_batch: usize,
    /// Hard cap for `max_files_per_batch`
    pub hard_cap: usize,
    /// How many recent batches the adaptation looks at
    pub window: usize,
    /// Average safety below this shrinks batches
    pub low_watermark: f64,
    /// Average safety above this (with zero rollbacks) grows batches
    pub high_watermark: f64,
    /// Step by which the confidence threshold is raised
    pub threshold_step: f64,
    /// Ceiling for the confidence threshold
    pub max_confidence_threshold: f64,
}

impl Default for AdaptiveBounds {
    fn default() -> Self {
        Self {
            min_files_per_batch: 1,
            hard_cap: 20,
            window: 5,
            low_watermark: 0.7,
            high_watermark: 0.9,
            threshold_step: 0.1,
            max_confidence_threshold: 0.95,
        }
    }
}

/// Engine-level configuration (batching and verification)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout for batch-level and phase-level verification
    pub verify_timeout: Duration,
    /// Run the extended (test-suite) check after each batch
    pub extended_batch_check: bool,
    /// Bounds for strategy adaptation
    pub adaptive_bounds: AdaptiveBounds,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With verification timeout
    #[inline]
    #[must_use]
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// With extended batch checks
    #[inline]
    #[must_use]
    pub fn with_extended_batch_check(mut self, enabled: bool) -> Self {
        self.extended_batch_check = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_timeout: Duration::from_secs(300),
            extended_batch_check: false,
            adaptive_bounds: AdaptiveBounds::default(),
        }
    }
}

/// Campaign-level configuration (phase gates and targets)
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Default reduction target in percent
    pub target_reduction_pct: f64,
    /// Confidence floor for the high-confidence pass
    pub high_confidence_floor: f64,
    /// How much the medium-risk pass tightens the safety policy
    pub medium_risk_tightening: f64,
    /// Batches with near-zero success over this window flag stagnation
    pub stagnation_window: usize,
    /// Success rate at or below which progress counts as stagnant
    pub stagnation_rate: f64,
    /// Comment prefix for documentation-pass annotations
    pub annotation_prefix: String,
}

impl CampaignConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With reduction target
    #[inline]
    #[must_use]
    pub fn with_target(mut self, pct: f64) -> Self {
        self.target_reduction_pct = pct.max(0.0);
        self
    }

    /// With high-confidence floor
    #[inline]
    #[must_use]
    pub fn with_high_confidence_floor(mut self, floor: f64) -> Self {
        self.high_confidence_floor = floor.clamp(0.0, 1.0);
        self
    }
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            target_reduction_pct: 25.0,
            high_confidence_floor: 0.8,
            medium_risk_tightening: 0.2,
            stagnation_window: 5,
            stagnation_rate: 0.05,
            annotation_prefix: "// rationale:".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_defaults() {
        let config = AdaptiveConfig::default();
        assert_eq!(config.max_files_per_batch, 5);
        assert_eq!(config.safety_level, SafetyLevel::Standard);
    }

    #[test]
    fn campaign_builder() {
        let config = CampaignConfig::new()
            .with_target(40.0)
            .with_high_confidence_floor(0.85);
        assert_eq!(config.target_reduction_pct, 40.0);
        assert_eq!(config.high_confidence_floor, 0.85);
    }

    #[test]
    fn negative_target_clamped() {
        let config = CampaignConfig::new().with_target(-5.0);
        assert_eq!(config.target_reduction_pct, 0.0);
    }
}
