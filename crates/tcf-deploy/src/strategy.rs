//! Strategy selection and the deployment run state machine

use crate::complexity::{ComplexityLevel, ComplexityScore};
use crate::error::DeployError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Deployment strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStrategy {
    /// Let the selector decide
    #[default]
    Auto,
    /// One transaction, plain template
    Basic,
    /// One transaction, enhanced template
    Enhanced,
    /// Base contract, then configuration chunks
    Chunked,
    /// Retired path kept as a fallback target; always fails
    Legacy,
}

impl DeploymentStrategy {
    /// Canonical name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Basic => "basic",
            Self::Enhanced => "enhanced",
            Self::Chunked => "chunked",
            Self::Legacy => "legacy",
        }
    }
}

impl std::fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "basic" | "foundry" => Ok(Self::Basic),
            "enhanced" | "optimized" => Ok(Self::Enhanced),
            "chunked" => Ok(Self::Chunked),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unknown deployment strategy: {other}")),
        }
    }
}

/// Target used when a non-basic strategy fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTarget {
    /// Retry with the basic strategy
    #[default]
    Basic,
    /// Retry with the legacy strategy (always fails)
    Legacy,
}

impl From<FallbackTarget> for DeploymentStrategy {
    fn from(target: FallbackTarget) -> Self {
        match target {
            FallbackTarget::Basic => Self::Basic,
            FallbackTarget::Legacy => Self::Legacy,
        }
    }
}

/// Selector and fallback knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    /// Upgrade automatic `basic` picks to `enhanced`
    pub prefer_enhanced: bool,
    /// Feature count above which `enhanced` is picked
    pub feature_threshold: usize,
    /// Allow one fallback attempt after a failed non-basic strategy
    pub fallback_enabled: bool,
    /// Fallback strategy
    pub fallback_target: FallbackTarget,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            prefer_enhanced: false,
            feature_threshold: 5,
            fallback_enabled: true,
            fallback_target: FallbackTarget::Basic,
        }
    }
}

/// Which rule produced the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Caller named a strategy
    ExplicitOverride,
    /// Cost or level requires chunking
    RequiresChunking,
    /// Level is `high`
    HighComplexity,
    /// Feature count above threshold
    FeatureThreshold,
    /// Basic upgraded by settings
    PreferEnhanced,
    /// Nothing calls for more than basic
    LowComplexity,
}

/// Selector output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySelection {
    /// Strategy to run
    pub strategy: DeploymentStrategy,
    /// Rule that chose it
    pub reason: SelectionReason,
}

/// Maps complexity plus an optional override to a strategy
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    settings: SelectorSettings,
}

impl StrategySelector {
    /// Selector with explicit settings
    #[inline]
    #[must_use]
    pub fn new(settings: SelectorSettings) -> Self {
        Self { settings }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &SelectorSettings {
        &self.settings
    }

    /// Pick a strategy
    ///
    /// In order: explicit non-auto override verbatim; chunked when chunking
    /// is required or the level is extreme; enhanced for high complexity or
    /// a feature count above the threshold; otherwise basic, upgraded to
    /// enhanced when `prefer_enhanced` is set.
    #[must_use]
    pub fn select(&self, score: &ComplexityScore, requested: DeploymentStrategy) -> StrategySelection {
        let (strategy, reason) = if requested != DeploymentStrategy::Auto {
            (requested, SelectionReason::ExplicitOverride)
        } else if score.requires_chunking || score.level == ComplexityLevel::Extreme {
            (DeploymentStrategy::Chunked, SelectionReason::RequiresChunking)
        } else if score.level == ComplexityLevel::High {
            (DeploymentStrategy::Enhanced, SelectionReason::HighComplexity)
        } else if score.feature_count > self.settings.feature_threshold {
            (DeploymentStrategy::Enhanced, SelectionReason::FeatureThreshold)
        } else if self.settings.prefer_enhanced {
            (DeploymentStrategy::Enhanced, SelectionReason::PreferEnhanced)
        } else {
            (DeploymentStrategy::Basic, SelectionReason::LowComplexity)
        };

        tracing::debug!(%strategy, ?reason, level = %score.level, "strategy selected");
        StrategySelection { strategy, reason }
    }

    /// Fallback for a failed strategy, if one applies
    #[must_use]
    pub fn fallback_for(&self, failed: DeploymentStrategy) -> Option<DeploymentStrategy> {
        let target = DeploymentStrategy::from(self.settings.fallback_target);
        if !self.settings.fallback_enabled
            || failed == DeploymentStrategy::Basic
            || failed == target
        {
            None
        } else {
            Some(target)
        }
    }
}

/// State of one deployment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Admitted, nothing chosen yet
    Pending,
    /// Strategy chosen
    StrategySelected,
    /// Primary strategy running
    Executing,
    /// Fallback strategy running after the primary failed
    FallbackExecuting,
    /// Deployed
    Succeeded,
    /// Gave up
    Failed,
}

impl RunState {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: RunState) -> Vec<RunState> {
    use RunState::*;
    match from {
        Pending => vec![StrategySelected, Failed],
        StrategySelected => vec![Executing, Failed],
        Executing => vec![Succeeded, Failed, FallbackExecuting],
        FallbackExecuting => vec![Succeeded, Failed],
        Succeeded | Failed => vec![],
    }
}

/// Validate one run transition
///
/// # Errors
/// Returns [`DeployError::IllegalTransition`] if `to` is not reachable from `from`.
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), DeployError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(DeployError::IllegalTransition { from, to })
    }
}

/// Tracks one run through the state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRun {
    state: RunState,
    history: Vec<RunState>,
    primary: Option<DeploymentStrategy>,
    fallback: Option<DeploymentStrategy>,
}

impl Default for StrategyRun {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRun {
    /// New run in `pending`
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RunState::Pending,
            history: vec![RunState::Pending],
            primary: None,
            fallback: None,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state visited, in order
    #[must_use]
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Strategy chosen by the selector
    #[must_use]
    pub fn primary(&self) -> Option<DeploymentStrategy> {
        self.primary
    }

    /// Fallback strategy, if one ran
    #[must_use]
    pub fn fallback(&self) -> Option<DeploymentStrategy> {
        self.fallback
    }

    /// Strategy currently or last executing
    #[must_use]
    pub fn active_strategy(&self) -> Option<DeploymentStrategy> {
        self.fallback.or(self.primary)
    }

    /// Record the selected strategy
    ///
    /// # Errors
    /// Returns an error unless the run is `pending`.
    pub fn select(&mut self, strategy: DeploymentStrategy) -> Result<(), DeployError> {
        self.advance(RunState::StrategySelected)?;
        self.primary = Some(strategy);
        Ok(())
    }

    /// Start the primary strategy
    ///
    /// # Errors
    /// Returns an error unless a strategy was selected.
    pub fn execute(&mut self) -> Result<(), DeployError> {
        self.advance(RunState::Executing)
    }

    /// Switch to the fallback strategy after the primary failed
    ///
    /// # Errors
    /// Returns an error unless the primary is executing; a run falls back at
    /// most once.
    pub fn fall_back(&mut self, strategy: DeploymentStrategy) -> Result<(), DeployError> {
        self.advance(RunState::FallbackExecuting)?;
        self.fallback = Some(strategy);
        Ok(())
    }

    /// Finish successfully
    ///
    /// # Errors
    /// Returns an error unless a strategy is executing.
    pub fn succeed(&mut self) -> Result<(), DeployError> {
        self.advance(RunState::Succeeded)
    }

    /// Finish with failure
    ///
    /// # Errors
    /// Returns an error if the run already finished.
    pub fn fail(&mut self) -> Result<(), DeployError> {
        self.advance(RunState::Failed)
    }

    fn advance(&mut self, to: RunState) -> Result<(), DeployError> {
        validate_transition(self.state, to)?;
        tracing::trace!(from = ?self.state, ?to, "run transition");
        self.state = to;
        self.history.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::{ChunkPlan, ComplexityLevel};
    use proptest::prelude::*;

    fn score(level: ComplexityLevel, feature_count: usize, requires_chunking: bool) -> ComplexityScore {
        ComplexityScore {
            level,
            score: 0,
            feature_count,
            heavy_feature_count: 0,
            record_count: 0,
            requires_chunking,
            base_cost: 0,
            estimated_cost: 0,
            chunk_plan: ChunkPlan::default(),
            reasons: Vec::new(),
        }
    }

    #[test]
    fn decision_table() {
        let selector = StrategySelector::default();
        let auto = DeploymentStrategy::Auto;

        assert_eq!(selector.select(&score(ComplexityLevel::Low, 0, false), auto).strategy, DeploymentStrategy::Basic);
        assert_eq!(selector.select(&score(ComplexityLevel::High, 6, false), auto).strategy, DeploymentStrategy::Enhanced);
        assert_eq!(selector.select(&score(ComplexityLevel::Medium, 4, true), auto).strategy, DeploymentStrategy::Chunked);
        assert_eq!(selector.select(&score(ComplexityLevel::Extreme, 0, false), auto).strategy, DeploymentStrategy::Chunked);
    }

    #[test]
    fn explicit_override_wins() {
        let selector = StrategySelector::default();
        let selection = selector.select(&score(ComplexityLevel::Extreme, 9, true), DeploymentStrategy::Basic);
        assert_eq!(selection.strategy, DeploymentStrategy::Basic);
        assert_eq!(selection.reason, SelectionReason::ExplicitOverride);
    }

    #[test]
    fn feature_threshold_alone_picks_enhanced() {
        let selector = StrategySelector::default();
        let selection = selector.select(&score(ComplexityLevel::Medium, 6, false), DeploymentStrategy::Auto);
        assert_eq!(selection.reason, SelectionReason::FeatureThreshold);
    }

    #[test]
    fn prefer_enhanced_upgrades_basic() {
        let selector = StrategySelector::new(SelectorSettings {
            prefer_enhanced: true,
            ..SelectorSettings::default()
        });
        let selection = selector.select(&score(ComplexityLevel::Low, 0, false), DeploymentStrategy::Auto);
        assert_eq!(selection.strategy, DeploymentStrategy::Enhanced);
        assert_eq!(selection.reason, SelectionReason::PreferEnhanced);
    }

    #[test]
    fn fallback_rules() {
        let selector = StrategySelector::default();
        assert_eq!(selector.fallback_for(DeploymentStrategy::Enhanced), Some(DeploymentStrategy::Basic));
        assert_eq!(selector.fallback_for(DeploymentStrategy::Chunked), Some(DeploymentStrategy::Basic));
        assert_eq!(selector.fallback_for(DeploymentStrategy::Basic), None);

        let disabled = StrategySelector::new(SelectorSettings {
            fallback_enabled: false,
            ..SelectorSettings::default()
        });
        assert_eq!(disabled.fallback_for(DeploymentStrategy::Enhanced), None);

        let legacy = StrategySelector::new(SelectorSettings {
            fallback_target: FallbackTarget::Legacy,
            ..SelectorSettings::default()
        });
        assert_eq!(legacy.fallback_for(DeploymentStrategy::Chunked), Some(DeploymentStrategy::Legacy));
        assert_eq!(legacy.fallback_for(DeploymentStrategy::Legacy), None);
    }

    #[test]
    fn run_happy_path() {
        let mut run = StrategyRun::new();
        run.select(DeploymentStrategy::Enhanced).unwrap();
        run.execute().unwrap();
        run.fall_back(DeploymentStrategy::Basic).unwrap();
        run.succeed().unwrap();

        assert_eq!(run.active_strategy(), Some(DeploymentStrategy::Basic));
        assert_eq!(
            run.history(),
            &[
                RunState::Pending,
                RunState::StrategySelected,
                RunState::Executing,
                RunState::FallbackExecuting,
                RunState::Succeeded
            ]
        );
    }

    #[test]
    fn run_falls_back_at_most_once() {
        let mut run = StrategyRun::new();
        run.select(DeploymentStrategy::Chunked).unwrap();
        run.execute().unwrap();
        run.fall_back(DeploymentStrategy::Basic).unwrap();
        assert!(matches!(
            run.fall_back(DeploymentStrategy::Basic),
            Err(DeployError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn strategy_parses_aliases() {
        assert_eq!("Foundry".parse::<DeploymentStrategy>().unwrap(), DeploymentStrategy::Basic);
        assert_eq!("chunked".parse::<DeploymentStrategy>().unwrap(), DeploymentStrategy::Chunked);
        assert!("turbo".parse::<DeploymentStrategy>().is_err());
    }

    fn any_state() -> impl Strategy<Value = RunState> {
        prop_oneof![
            Just(RunState::Pending),
            Just(RunState::StrategySelected),
            Just(RunState::Executing),
            Just(RunState::FallbackExecuting),
            Just(RunState::Succeeded),
            Just(RunState::Failed),
        ]
    }

    proptest! {
        #[test]
        fn prop_terminal_states_are_final(from in any_state(), to in any_state()) {
            if from.is_terminal() {
                prop_assert!(validate_transition(from, to).is_err());
            }
        }

        #[test]
        fn prop_random_walk_respects_machine(steps in proptest::collection::vec(any_state(), 0..12)) {
            let mut run = StrategyRun::new();
            for to in steps {
                let _ = run.advance(to);
            }
            let history = run.history();
            for pair in history.windows(2) {
                prop_assert!(allowed_transitions(pair[0]).contains(&pair[1]));
            }
            let fallbacks = history.iter().filter(|s| **s == RunState::FallbackExecuting).count();
            prop_assert!(fallbacks <= 1);
            if run.state() == RunState::Succeeded {
                prop_assert!(history.contains(&RunState::Executing));
            }
        }
    }
}
