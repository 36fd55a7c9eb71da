//! Complexity analysis
//!
//! Scores a configuration from its feature flags and child record volume,
//! estimates deployment cost, and plans chunks when the deployment cannot fit
//! in one transaction.

use crate::chain::{ChunkSlice, ConfigurationChunk, DeploymentPayload};
use serde::{Deserialize, Serialize};
use tcf_model::{profile, FeatureSet, Standard, StandardConfig};

/// Scoring and cost parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexitySettings {
    /// Gas for the core contract without features or records
    pub base_deployment_cost: u64,
    /// Gas per feature, multiplied by the feature's weight
    pub per_feature_cost: u64,
    /// Per-transaction gas ceiling
    pub transaction_ceiling: u64,
    /// Child records per magnitude point
    pub records_per_point: usize,
    /// Feature count above which a configuration is `high`
    pub high_feature_count: usize,
    /// Feature count at which a configuration is `medium`
    pub medium_feature_count: usize,
    /// Record count above which a configuration is `medium`
    pub medium_record_count: usize,
    /// Heavy features that together make a configuration `extreme`
    pub extreme_heavy_count: usize,
}

impl Default for ComplexitySettings {
    fn default() -> Self {
        Self {
            base_deployment_cost: 2_500_000,
            per_feature_cost: 250_000,
            transaction_ceiling: 10_000_000,
            records_per_point: 5,
            high_feature_count: 5,
            medium_feature_count: 3,
            medium_record_count: 20,
            extreme_heavy_count: 3,
        }
    }
}

impl ComplexitySettings {
    /// Gas attributed to enabled features
    #[must_use]
    pub fn feature_cost(&self, features: &FeatureSet) -> u64 {
        features
            .iter()
            .map(|f| self.per_feature_cost * f.weight() as u64)
            .sum()
    }

    /// Core contract plus features
    #[must_use]
    pub fn base_cost(&self, features: &FeatureSet) -> u64 {
        self.base_deployment_cost + self.feature_cost(features)
    }

    /// Gas for one collection's records, zero for unknown collections
    #[must_use]
    pub fn records_cost(&self, standard: Standard, collection: &str, count: usize) -> u64 {
        profile(standard)
            .collection(collection)
            .map_or(0, |spec| spec.unit_cost * count as u64)
    }

    /// Single-transaction gas for a whole payload
    #[must_use]
    pub fn payload_cost(&self, payload: &DeploymentPayload) -> u64 {
        let records: u64 = payload
            .collections
            .iter()
            .map(|(name, rows)| self.records_cost(payload.standard, name, rows.len()))
            .sum();
        self.base_cost(&payload.features) + records
    }
}

/// Complexity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    /// Few features, few records
    Low,
    /// Several features or many records
    Medium,
    /// Many features or any heavy feature
    High,
    /// Base contract alone too large, or several heavy features
    Extreme,
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Extreme => "extreme",
        };
        f.write_str(s)
    }
}

/// Contiguous run of one collection's records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRange {
    /// Collection name
    pub collection: String,
    /// First record index
    pub start: usize,
    /// Record count
    pub len: usize,
}

/// One planned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedChunk {
    /// Position in the plan
    pub index: usize,
    /// Record ranges (empty for the base chunk)
    pub ranges: Vec<ChunkRange>,
    /// Estimated gas
    pub estimated_cost: u64,
}

impl PlannedChunk {
    /// Records covered by this chunk
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.ranges.iter().map(|r| r.len).sum()
    }
}

/// Ordered chunk plan; chunk 0 is always the base contract
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkPlan {
    /// Chunks in submission order
    pub chunks: Vec<PlannedChunk>,
}

impl ChunkPlan {
    /// Number of transactions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check if the plan is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks after the base contract
    #[must_use]
    pub fn record_chunks(&self) -> &[PlannedChunk] {
        self.chunks.get(1..).unwrap_or(&[])
    }

    /// Cut the payload's records along the plan
    #[must_use]
    pub fn materialize(&self, payload: &DeploymentPayload) -> Vec<ConfigurationChunk> {
        self.record_chunks()
            .iter()
            .map(|planned| ConfigurationChunk {
                index: planned.index,
                slices: planned
                    .ranges
                    .iter()
                    .map(|range| ChunkSlice {
                        collection: range.collection.clone(),
                        records: payload
                            .collections
                            .get(&range.collection)
                            .and_then(|rows| rows.get(range.start..range.start + range.len))
                            .map(<[_]>::to_vec)
                            .unwrap_or_default(),
                    })
                    .collect(),
                estimated_cost: planned.estimated_cost,
            })
            .collect()
    }
}

/// Derived complexity of a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityScore {
    /// Level
    pub level: ComplexityLevel,
    /// Weighted feature count plus one point per `records_per_point` records
    pub score: u32,
    /// Enabled features
    pub feature_count: usize,
    /// Enabled heavy features
    pub heavy_feature_count: usize,
    /// Child records across collections
    pub record_count: usize,
    /// Whether a single transaction cannot carry the deployment
    pub requires_chunking: bool,
    /// Core contract plus features
    pub base_cost: u64,
    /// Base plus every record
    pub estimated_cost: u64,
    /// Transaction plan
    pub chunk_plan: ChunkPlan,
    /// Human-readable drivers of the level
    pub reasons: Vec<String>,
}

/// Scores configurations
#[derive(Debug, Clone, Default)]
pub struct ComplexityAnalyzer {
    settings: ComplexitySettings,
}

impl ComplexityAnalyzer {
    /// Analyzer with explicit settings
    #[inline]
    #[must_use]
    pub fn new(settings: ComplexitySettings) -> Self {
        Self { settings }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ComplexitySettings {
        &self.settings
    }

    /// Analyze a standard configuration
    #[must_use]
    pub fn analyze(&self, config: &StandardConfig) -> ComplexityScore {
        let counts = config
            .collections()
            .into_iter()
            .map(|(name, rows)| (name, rows.map_or(0, Vec::len)))
            .collect::<Vec<_>>();
        self.analyze_parts(config.standard(), config.features(), &counts)
    }

    /// Analyze a deployment payload
    #[must_use]
    pub fn analyze_payload(&self, payload: &DeploymentPayload) -> ComplexityScore {
        let counts = payload
            .ordered_collections()
            .map(|(name, rows)| (name, rows.len()))
            .collect::<Vec<_>>();
        self.analyze_parts(payload.standard, &payload.features, &counts)
    }

    fn analyze_parts(
        &self,
        standard: Standard,
        features: &FeatureSet,
        counts: &[(&'static str, usize)],
    ) -> ComplexityScore {
        let s = &self.settings;
        let feature_count = features.len();
        let heavy_feature_count = features.iter().filter(|f| f.is_heavy()).count();
        let record_count: usize = counts.iter().map(|(_, n)| n).sum();

        let weighted: u32 = features.iter().map(|f| f.weight() as u32).sum();
        let magnitude = u32::try_from(record_count / s.records_per_point.max(1)).unwrap_or(u32::MAX);
        let score = weighted.saturating_add(magnitude);

        let base_cost = s.base_cost(features);
        let records_cost: u64 = counts
            .iter()
            .map(|(name, n)| s.records_cost(standard, name, *n))
            .sum();
        let estimated_cost = base_cost + records_cost;

        let mut reasons = Vec::new();
        let level = if base_cost > s.transaction_ceiling {
            reasons.push(format!(
                "base contract cost {base_cost} exceeds transaction ceiling {}",
                s.transaction_ceiling
            ));
            ComplexityLevel::Extreme
        } else if heavy_feature_count >= s.extreme_heavy_count {
            reasons.push(format!("{heavy_feature_count} heavy features combined"));
            ComplexityLevel::Extreme
        } else if feature_count > s.high_feature_count {
            reasons.push(format!("{feature_count} features enabled"));
            ComplexityLevel::High
        } else if heavy_feature_count > 0 {
            reasons.push("heavy feature enabled".to_string());
            ComplexityLevel::High
        } else if feature_count >= s.medium_feature_count {
            reasons.push(format!("{feature_count} features enabled"));
            ComplexityLevel::Medium
        } else if record_count > s.medium_record_count {
            reasons.push(format!("{record_count} child records"));
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::Low
        };

        let over_ceiling = estimated_cost > s.transaction_ceiling;
        if over_ceiling && level != ComplexityLevel::Extreme {
            reasons.push(format!(
                "estimated cost {estimated_cost} exceeds transaction ceiling {}",
                s.transaction_ceiling
            ));
        }
        let requires_chunking = level == ComplexityLevel::Extreme || over_ceiling;

        ComplexityScore {
            level,
            score,
            feature_count,
            heavy_feature_count,
            record_count,
            requires_chunking,
            base_cost,
            estimated_cost,
            chunk_plan: self.plan_chunks(standard, base_cost, counts),
            reasons,
        }
    }

    /// Greedy packing in declared order, each chunk bounded by the ceiling
    ///
    /// A record that alone exceeds the ceiling still gets its own chunk.
    fn plan_chunks(
        &self,
        standard: Standard,
        base_cost: u64,
        counts: &[(&'static str, usize)],
    ) -> ChunkPlan {
        let ceiling = self.settings.transaction_ceiling;
        let mut chunks = vec![PlannedChunk {
            index: 0,
            ranges: Vec::new(),
            estimated_cost: base_cost,
        }];
        let mut current = PlannedChunk {
            index: 1,
            ranges: Vec::new(),
            estimated_cost: 0,
        };

        for &(name, count) in counts {
            let unit = self.settings.records_cost(standard, name, 1);
            for idx in 0..count {
                if !current.ranges.is_empty() && current.estimated_cost + unit > ceiling {
                    let next = PlannedChunk {
                        index: current.index + 1,
                        ranges: Vec::new(),
                        estimated_cost: 0,
                    };
                    chunks.push(std::mem::replace(&mut current, next));
                }
                match current.ranges.last_mut() {
                    Some(range) if range.collection == name => range.len += 1,
                    _ => current.ranges.push(ChunkRange {
                        collection: name.to_string(),
                        start: idx,
                        len: 1,
                    }),
                }
                current.estimated_cost += unit;
            }
        }
        if !current.ranges.is_empty() {
            chunks.push(current);
        }
        ChunkPlan { chunks }
    }
}
