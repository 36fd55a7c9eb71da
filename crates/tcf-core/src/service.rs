//! Token service
//!
//! Whole-token operations: create, read, update, delete, status changes,
//! template import, and clone, each in a single and a batch form. The main
//! row lives in `tokens`; the property record and collections are written
//! through the [`RecordReconciler`].

use crate::batch::{BatchExecutor, BatchResult};
use crate::config::ForgeSettings;
use crate::error::{ForgeError, ForgeResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tcf_deploy::DeploymentOutcome;
use tcf_model::mapping::map_standard;
use tcf_model::{
    profile, Clock, ModelError, ProjectId, Record, TemplateId, Token, TokenConfig, TokenId,
    TokenPatch, TokenSnapshot, TokenStatus, TOKENS_TABLE,
};
use tcf_reconcile::{EmptyListMode, RecordReconciler, SyncReport};
use tcf_store::{Filter, Query, StructuredStore};

/// Table of reusable configurations
pub const TOKEN_TEMPLATES_TABLE: &str = "token_templates";

/// Deployment status written on success
pub const DEPLOYED: &str = "deployed";

/// Pre-flight check for batch creation
pub trait ConfigValidator: Send + Sync + std::fmt::Debug {
    /// Reject a configuration with a message
    ///
    /// # Errors
    /// Returns a human-readable reason when the configuration is invalid.
    fn validate(&self, config: &TokenConfig) -> Result<(), String>;
}

/// Token row plus the sync report of its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenWrite {
    /// Main row as stored
    pub token: Token,
    /// Property and collection results; `None` when no configuration was written
    pub sync: Option<SyncReport>,
}

impl TokenWrite {
    /// Check if every child write landed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.sync.as_ref().map_or(true, SyncReport::is_success)
    }

    /// Turn child failures into an error
    ///
    /// # Errors
    /// [`ForgeError::ConstraintViolation`] when the conflict ladder was
    /// exhausted, otherwise [`ForgeError::IncompleteSync`].
    pub fn ensure_complete(self) -> ForgeResult<Self> {
        let Some(report) = self.sync.as_ref().filter(|r| !r.is_success()) else {
            return Ok(self);
        };
        if let Some(conflict) = report.unresolved_conflict() {
            return Err(ForgeError::ConstraintViolation {
                collection: conflict.collection.clone(),
                detail: conflict.error.clone().unwrap_or_default(),
            });
        }
        Err(ForgeError::IncompleteSync {
            token: self.token.id,
            summary: report.failure_summary(),
        })
    }
}

/// Per-table outcome of a delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    /// Deleted token
    pub token_id: TokenId,
    /// Main row removed
    pub token_deleted: bool,
    /// Property record and collection results
    pub children: SyncReport,
}

impl DeleteReport {
    /// Check if every table was cleared
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.token_deleted && self.children.is_success()
    }
}

/// Import request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Template to instantiate
    pub template_id: TemplateId,
    /// Name override
    #[serde(default)]
    pub name: Option<String>,
    /// Symbol override
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Clone request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneRequest {
    /// Token to copy
    pub source: TokenId,
    /// Name of the copy (defaults to "<name> (Copy)")
    #[serde(default)]
    pub name: Option<String>,
    /// Symbol of the copy
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Token service
#[derive(Debug, Clone)]
pub struct TokenService {
    store: Arc<dyn StructuredStore>,
    reconciler: RecordReconciler,
    clock: Arc<dyn Clock>,
    settings: Arc<ForgeSettings>,
    validator: Option<Arc<dyn ConfigValidator>>,
}

impl TokenService {
    /// Service over a store
    #[must_use]
    pub fn new(store: Arc<dyn StructuredStore>, clock: Arc<dyn Clock>, settings: Arc<ForgeSettings>) -> Self {
        Self {
            reconciler: RecordReconciler::new(store.clone()),
            store,
            clock,
            settings,
            validator: None,
        }
    }

    /// Install a pre-flight validator for batch creation
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn ConfigValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StructuredStore> {
        &self.store
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ForgeSettings {
        &self.settings
    }

    fn batch(&self) -> BatchExecutor {
        BatchExecutor::new(self.settings.batch.preflight_validation)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Main row of a token
    ///
    /// # Errors
    /// [`ForgeError::NotFound`] if no row exists.
    pub async fn load_token(&self, token_id: TokenId) -> ForgeResult<Token> {
        let rows = self
            .store
            .select(TOKENS_TABLE, &Query::new(id_filter(token_id)).limit(1))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ForgeError::not_found("token", token_id))?;
        Ok(Token::from_record(row)?)
    }

    /// Token row, property record, and non-empty collections
    ///
    /// # Errors
    /// [`ForgeError::NotFound`] for an unknown token, or the store error.
    pub async fn get_token(&self, token_id: TokenId) -> ForgeResult<TokenSnapshot> {
        let token = self.load_token(token_id).await?;
        let profile = profile(token.standard);
        let by_token = Query::new(token_filter(token_id));

        let properties = self
            .store
            .select(profile.property_table, &by_token)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut collections = BTreeMap::new();
        for spec in profile.collections {
            let rows = self.store.select(spec.table, &by_token).await?;
            if !rows.is_empty() {
                collections.insert(spec.name.to_string(), rows);
            }
        }

        Ok(TokenSnapshot {
            token,
            properties,
            collections,
        })
    }

    /// Token that must belong to `project`
    pub(crate) async fn owned_token(&self, project: ProjectId, token_id: TokenId) -> ForgeResult<Token> {
        let token = self.load_token(token_id).await?;
        if token.project_id != project {
            return Err(ForgeError::OwnershipMismatch {
                token: token_id,
                project,
            });
        }
        Ok(token)
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a token and write its property record and collections
    ///
    /// Child failures are reported in [`TokenWrite::sync`] and do not undo
    /// the main row.
    ///
    /// # Errors
    /// [`ForgeError::UnsupportedStandard`] for a disabled standard, or the
    /// store error if the main row cannot be inserted.
    pub async fn create_token(&self, project: ProjectId, config: TokenConfig) -> ForgeResult<TokenWrite> {
        let standard = config.standard();
        if !self.settings.deployment.supports(standard) {
            return Err(ForgeError::UnsupportedStandard(standard));
        }

        let token = Token::from_config(project, &config, self.clock.now());
        self.store.insert(TOKENS_TABLE, vec![token.to_record()?]).await?;
        tracing::info!(token_id = %token.id, %project, %standard, "token created");

        let sync = self
            .reconciler
            .sync_token(&token.id.to_string(), &map_standard(&config.standard), EmptyListMode::Ignore)
            .await;
        Ok(TokenWrite {
            token,
            sync: Some(sync),
        })
    }

    /// Create several tokens; an item with failed children counts as failed
    pub async fn create_tokens(&self, project: ProjectId, configs: Vec<TokenConfig>) -> BatchResult<TokenWrite> {
        self.batch()
            .run(
                configs,
                |config| self.validate_config(config),
                move |_, config| async move { self.create_token(project, config).await?.ensure_complete() },
            )
            .await
    }

    fn validate_config(&self, config: &TokenConfig) -> Result<(), String> {
        match &self.validator {
            Some(validator) => validator.validate(config),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a patch
    ///
    /// With `standard_config` present, the property record and collections
    /// are synced: omitted collections stay untouched and explicit empty
    /// lists wipe the collection.
    ///
    /// # Errors
    /// [`ForgeError::StandardImmutable`] when the patch carries another
    /// standard, [`ForgeError::NotFound`], or the store error.
    pub async fn update_token(&self, token_id: TokenId, patch: TokenPatch) -> ForgeResult<TokenWrite> {
        let mut token = self.load_token(token_id).await?;
        if let Some(config) = &patch.standard_config {
            if config.standard() != token.standard {
                return Err(ForgeError::StandardImmutable {
                    token: token_id,
                    current: token.standard,
                    requested: config.standard(),
                });
            }
        }

        let TokenPatch {
            name,
            symbol,
            decimals,
            total_supply,
            description,
            blocks,
            metadata,
            status,
            standard_config,
        } = patch;
        if let Some(name) = name {
            token.name = name;
        }
        if let Some(symbol) = symbol {
            token.symbol = symbol;
        }
        if let Some(decimals) = decimals {
            token.decimals = decimals;
        }
        if total_supply.is_some() {
            token.total_supply = total_supply;
        }
        if description.is_some() {
            token.description = description;
        }
        if let Some(blocks) = blocks {
            token.blocks = blocks;
        }
        if let Some(metadata) = metadata {
            token.metadata = metadata;
        }
        if let Some(status) = status {
            token.status = status;
        }

        self.save_token(&mut token).await?;

        let sync = match standard_config {
            Some(config) => Some(
                self.reconciler
                    .sync_token(&token_id.to_string(), &map_standard(&config), EmptyListMode::Wipe)
                    .await,
            ),
            None => None,
        };
        tracing::info!(%token_id, synced = sync.is_some(), "token updated");
        Ok(TokenWrite { token, sync })
    }

    /// Update several tokens
    pub async fn update_tokens(&self, updates: Vec<(TokenId, TokenPatch)>) -> BatchResult<TokenWrite> {
        self.batch()
            .run(
                updates,
                |_| Ok(()),
                move |_, (token_id, patch)| async move { self.update_token(token_id, patch).await?.ensure_complete() },
            )
            .await
    }

    /// Change the lifecycle status
    ///
    /// # Errors
    /// [`ForgeError::NotFound`] or the store error.
    pub async fn update_status(&self, token_id: TokenId, status: TokenStatus) -> ForgeResult<Token> {
        let write = self
            .update_token(token_id, TokenPatch::new().with_status(status))
            .await?;
        Ok(write.token)
    }

    /// Change the status of several tokens
    pub async fn update_statuses(&self, updates: Vec<(TokenId, TokenStatus)>) -> BatchResult<Token> {
        self.batch()
            .run(
                updates,
                |_| Ok(()),
                move |_, (token_id, status)| self.update_status(token_id, status),
            )
            .await
    }

    /// Attach a successful deployment to the token and mark it deployed
    ///
    /// # Errors
    /// [`ForgeError::NotFound`] or the store error.
    pub async fn record_deployment(
        &self,
        token_id: TokenId,
        outcome: &DeploymentOutcome,
        deployed_at: DateTime<Utc>,
    ) -> ForgeResult<Token> {
        let mut token = self.load_token(token_id).await?;
        token.address = Some(outcome.address.clone());
        token.tx_hash = Some(outcome.tx_hash.clone());
        token.deployment_status = Some(DEPLOYED.to_string());
        token.deployed_at = Some(deployed_at);
        token.status = TokenStatus::Deployed;
        self.save_token(&mut token).await?;
        Ok(token)
    }

    /// Write the main row with a fresh `updated_at`
    ///
    /// `updated_at` always moves forward so cached recommendations keyed on
    /// it go stale even when the clock has not advanced.
    async fn save_token(&self, token: &mut Token) -> ForgeResult<()> {
        let now = self.clock.now();
        token.updated_at = if now > token.updated_at {
            now
        } else {
            token.updated_at + Duration::milliseconds(1)
        };

        let mut row = token.to_record()?;
        row.remove("id");
        let updated = self
            .store
            .update(TOKENS_TABLE, &row, &id_filter(token.id))
            .await?;
        if updated == 0 {
            return Err(ForgeError::not_found("token", token.id));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a token with its property record and every collection
    ///
    /// Child tables are cleared independently and reported per table; the
    /// main row is removed even when some of them fail.
    ///
    /// # Errors
    /// [`ForgeError::NotFound`], [`ForgeError::OwnershipMismatch`], or the
    /// store error when the main row cannot be removed.
    pub async fn delete_token(&self, project: ProjectId, token_id: TokenId) -> ForgeResult<DeleteReport> {
        let token = self.owned_token(project, token_id).await?;
        let children = self
            .reconciler
            .purge_token(&token_id.to_string(), token.standard)
            .await;
        if !children.is_success() {
            tracing::warn!(%token_id, failures = %children.failure_summary(), "child rows left behind");
        }

        let deleted = self.store.delete(TOKENS_TABLE, &id_filter(token_id)).await?;
        tracing::info!(%token_id, %project, "token deleted");
        Ok(DeleteReport {
            token_id,
            token_deleted: deleted > 0,
            children,
        })
    }

    /// Delete several tokens; an item succeeds once its main row is gone
    pub async fn delete_tokens(&self, project: ProjectId, token_ids: Vec<TokenId>) -> BatchResult<DeleteReport> {
        self.batch()
            .run(
                token_ids,
                |_| Ok(()),
                move |_, token_id| self.delete_token(project, token_id),
            )
            .await
    }

    // ------------------------------------------------------------------
    // Templates and clones
    // ------------------------------------------------------------------

    /// Store a configuration as a template
    ///
    /// A template without a project is visible to every project.
    ///
    /// # Errors
    /// Returns the store or serialization error.
    pub async fn save_template(
        &self,
        project: Option<ProjectId>,
        name: &str,
        config: &TokenConfig,
    ) -> ForgeResult<TemplateId> {
        let id = TemplateId::new();
        let mut row = Record::new();
        row.insert("id".into(), Value::String(id.to_string()));
        row.insert(
            "project_id".into(),
            project.map_or(Value::Null, |p| Value::String(p.to_string())),
        );
        row.insert("name".into(), Value::String(name.to_string()));
        row.insert(
            "configuration".into(),
            serde_json::to_value(config).map_err(ModelError::from)?,
        );
        self.store.insert(TOKEN_TEMPLATES_TABLE, vec![row]).await?;
        Ok(id)
    }

    /// Create a token from a stored template
    ///
    /// # Errors
    /// [`ForgeError::NotFound`] if the template is missing or belongs to
    /// another project, or any [`create_token`](Self::create_token) error.
    pub async fn import_from_template(&self, project: ProjectId, request: ImportRequest) -> ForgeResult<TokenWrite> {
        let rows = self
            .store
            .select(
                TOKEN_TEMPLATES_TABLE,
                &Query::new(Filter::new().eq("id", request.template_id.to_string())).limit(1),
            )
            .await?;
        let template = rows
            .into_iter()
            .next()
            .filter(|row| match row.get("project_id") {
                None | Some(Value::Null) => true,
                Some(owner) => owner.as_str() == Some(project.to_string().as_str()),
            })
            .ok_or_else(|| ForgeError::not_found("template", request.template_id))?;

        let raw = template
            .get("configuration")
            .cloned()
            .ok_or_else(|| ForgeError::invalid_config("template has no configuration"))?;
        let mut config: TokenConfig = serde_json::from_value(raw).map_err(ModelError::from)?;
        if let Some(name) = request.name {
            config.name = name;
        }
        if let Some(symbol) = request.symbol {
            config.symbol = symbol;
        }

        tracing::debug!(template_id = %request.template_id, %project, "importing template");
        self.create_token(project, config).await
    }

    /// Import several templates
    pub async fn import_from_templates(&self, project: ProjectId, requests: Vec<ImportRequest>) -> BatchResult<TokenWrite> {
        self.batch()
            .run(
                requests,
                |_| Ok(()),
                move |_, request| async move {
                    self.import_from_template(project, request).await?.ensure_complete()
                },
            )
            .await
    }

    /// Copy a token's configuration into a new draft token
    ///
    /// Deployment fields are not copied.
    ///
    /// # Errors
    /// [`ForgeError::NotFound`], [`ForgeError::OwnershipMismatch`], or any
    /// [`create_token`](Self::create_token) error.
    pub async fn clone_token(&self, project: ProjectId, request: CloneRequest) -> ForgeResult<TokenWrite> {
        self.owned_token(project, request.source).await?;
        let snapshot = self.get_token(request.source).await?;
        let mut config = snapshot.to_config()?;
        config.name = request
            .name
            .unwrap_or_else(|| format!("{} (Copy)", snapshot.token.name));
        if let Some(symbol) = request.symbol {
            config.symbol = symbol;
        }
        self.create_token(project, config).await
    }

    /// Clone several tokens
    pub async fn clone_tokens(&self, project: ProjectId, requests: Vec<CloneRequest>) -> BatchResult<TokenWrite> {
        self.batch()
            .run(
                requests,
                |_| Ok(()),
                move |_, request| async move { self.clone_token(project, request).await?.ensure_complete() },
            )
            .await
    }
}

fn id_filter(token_id: TokenId) -> Filter {
    Filter::new().eq("id", token_id.to_string())
}

fn token_filter(token_id: TokenId) -> Filter {
    Filter::new().eq("token_id", token_id.to_string())
}
