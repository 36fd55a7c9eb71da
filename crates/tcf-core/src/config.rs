//! Forge settings
//!
//! One TOML document with four sections; every key is optional.
//!
//! ```toml
//! [deployment]
//! prefer_enhanced = false
//! fallback_enabled = true
//! fallback_target = "basic"
//! default_network = "testnet"
//!
//! [rate_limits]
//! per_hour = 10
//! per_day = 50
//!
//! [complexity]
//! transaction_ceiling = 10000000
//!
//! [batch]
//! preflight_validation = false
//! ```

use crate::error::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tcf_deploy::{ComplexitySettings, FallbackTarget, RateLimitSettings, SelectorSettings};
use tcf_model::Standard;

/// Deployment section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentSettings {
    /// Upgrade automatic `basic` picks to `enhanced`
    pub prefer_enhanced: bool,
    /// Feature count above which `enhanced` is picked
    pub feature_threshold: usize,
    /// Allow one fallback after a failed non-basic strategy
    pub fallback_enabled: bool,
    /// Fallback strategy
    pub fallback_target: FallbackTarget,
    /// Standards accepted by create and deploy
    pub supported_standards: Vec<Standard>,
    /// Pause between chunk submissions
    pub inter_chunk_delay_ms: u64,
    /// Network used when a deploy request names none
    pub default_network: String,
    /// Recommendation cache capacity
    pub recommendation_cache_capacity: u64,
    /// Recommendation time to live
    pub recommendation_ttl_secs: u64,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        let selector = SelectorSettings::default();
        Self {
            prefer_enhanced: selector.prefer_enhanced,
            feature_threshold: selector.feature_threshold,
            fallback_enabled: selector.fallback_enabled,
            fallback_target: selector.fallback_target,
            supported_standards: Standard::ALL.to_vec(),
            inter_chunk_delay_ms: 1_000,
            default_network: "testnet".to_string(),
            recommendation_cache_capacity: 1_024,
            recommendation_ttl_secs: 300,
        }
    }
}

impl DeploymentSettings {
    /// Selector view of this section
    #[must_use]
    pub fn selector(&self) -> SelectorSettings {
        SelectorSettings {
            prefer_enhanced: self.prefer_enhanced,
            feature_threshold: self.feature_threshold,
            fallback_enabled: self.fallback_enabled,
            fallback_target: self.fallback_target,
        }
    }

    /// Pause between chunk submissions
    #[inline]
    #[must_use]
    pub fn inter_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.inter_chunk_delay_ms)
    }

    /// Recommendation time to live
    #[inline]
    #[must_use]
    pub fn recommendation_ttl(&self) -> Duration {
        Duration::from_secs(self.recommendation_ttl_secs)
    }

    /// Check if a standard is enabled
    #[inline]
    #[must_use]
    pub fn supports(&self, standard: Standard) -> bool {
        self.supported_standards.contains(&standard)
    }
}

/// Batch section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Run the pre-flight validation pass before any item
    pub preflight_validation: bool,
}

/// All settings injected into the service and orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeSettings {
    /// Strategy selection, fallback, and networks
    pub deployment: DeploymentSettings,
    /// Admission windows
    pub rate_limits: RateLimitSettings,
    /// Cost model and level thresholds
    pub complexity: ComplexitySettings,
    /// Batch behaviour
    pub batch: BatchSettings,
}

impl ForgeSettings {
    /// Parse settings from TOML
    ///
    /// # Errors
    /// Returns [`ForgeError::Config`] for malformed TOML or values that fail
    /// [`ForgeSettings::validate`].
    pub fn from_toml_str(raw: &str) -> ForgeResult<Self> {
        let settings: Self = toml::from_str(raw).map_err(|e| ForgeError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    ///
    /// # Errors
    /// Returns [`ForgeError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> ForgeResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ForgeError::Config(format!("{}: {e}", path.display())))?;
        let settings = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Reject values no component can work with
    ///
    /// # Errors
    /// Returns [`ForgeError::Config`] naming the offending key.
    pub fn validate(&self) -> ForgeResult<()> {
        if self.deployment.supported_standards.is_empty() {
            return Err(ForgeError::Config(
                "deployment.supported_standards must not be empty".into(),
            ));
        }
        if self.complexity.transaction_ceiling == 0 {
            return Err(ForgeError::Config(
                "complexity.transaction_ceiling must be positive".into(),
            ));
        }
        if self.complexity.records_per_point == 0 {
            return Err(ForgeError::Config(
                "complexity.records_per_point must be positive".into(),
            ));
        }
        if self.deployment.recommendation_cache_capacity == 0 {
            return Err(ForgeError::Config(
                "deployment.recommendation_cache_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}
