//! QueryEngine state, lifecycle and transactions.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError, RwLock};

use crate::feature::{Feature, FeatureSourceColumn};
use crate::observability::{log_event, log_event_with_fields, Event, MetricsRegistry, ObservationScope};
use crate::store::{FeatureStore, StoreError};
use crate::transaction::{TransactionBuffer, TransactionResult};

use super::cache::{CacheStats, FeatureCache};
use super::config::EngineConfig;
use super::errors::{EngineError, EngineResult};
use super::hooks::EngineHooks;
use super::projection::Projection;

/// Uniform query and edit surface over one [`FeatureStore`].
///
/// Mutating calls (lifecycle, transaction) take `&mut self`; reads take
/// `&self` and may run concurrently when the store allows it.
///
/// ```ignore
/// let mut engine = QueryEngine::new(MemoryFeatureStore::new(columns));
/// engine.open()?;
/// engine.begin_transaction()?;
/// engine.add_feature(Feature::new("a", point(0.0, 0.0)))?;
/// let result = engine.commit_transaction()?;
/// ```
pub struct QueryEngine<S: FeatureStore> {
    pub(super) store: S,
    pub(super) config: EngineConfig,
    pub(super) projection: Option<Box<dyn Projection>>,
    pub(super) hooks: EngineHooks,
    pub(super) is_open: bool,
    pub(super) in_transaction: bool,
    pub(super) buffer: TransactionBuffer,
    /// Lazily loaded native column list.
    pub(super) columns: RwLock<Option<Vec<FeatureSourceColumn>>>,
    pub(super) excluded_ids: HashSet<String>,
    pub(super) cache: Option<Mutex<FeatureCache>>,
    pub(super) metrics: MetricsRegistry,
}

impl<S: FeatureStore> QueryEngine<S> {
    /// Closed engine over `store` with the default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            projection: None,
            hooks: EngineHooks::new(),
            is_open: false,
            in_transaction: false,
            buffer: TransactionBuffer::new(),
            columns: RwLock::new(None),
            excluded_ids: HashSet::new(),
            cache: None,
            metrics: MetricsRegistry::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.cache = config
            .read_cache_enabled
            .then(|| Mutex::new(FeatureCache::new(config.read_cache_max_entries)));
        self.config = config;
        self
    }

    pub fn with_projection(mut self, projection: Box<dyn Projection>) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hooks_mut(&mut self) -> &mut EngineHooks {
        &mut self.hooks
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| {
            c.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .stats()
                .clone()
        })
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// The pending buffer of the active transaction.
    pub fn buffer(&self) -> &TransactionBuffer {
        &self.buffer
    }

    pub fn is_live_transaction(&self) -> bool {
        self.config.live_transaction
    }

    /// Toggle whether reads see the pending buffer. Takes effect on the next
    /// read, also in the middle of a transaction.
    pub fn set_live_transaction(&mut self, live: bool) {
        self.config.live_transaction = live;
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the store and the projection. A second call is a no-op.
    pub fn open(&mut self) -> EngineResult<()> {
        if self.is_open {
            return Ok(());
        }
        self.hooks.fire_opening();
        self.store.open()?;
        if let Some(projection) = &self.projection {
            if let Err(e) = projection.open() {
                let _ = self.store.close();
                return Err(e);
            }
        }
        self.is_open = true;
        self.hooks.fire_opened();
        log_event(Event::EngineOpen);
        Ok(())
    }

    /// Close the store and reset all session state. Closing a closed engine
    /// is a no-op.
    ///
    /// Session state is reset even when the store fails to close, so a
    /// reopen never sees the previous session's buffer or cache.
    pub fn close(&mut self) -> EngineResult<()> {
        if !self.is_open {
            return Ok(());
        }
        self.hooks.fire_closing();
        let store_closed = self.store.close();
        let projection_closed = match &self.projection {
            Some(projection) => projection.close(),
            None => Ok(()),
        };

        self.is_open = false;
        self.in_transaction = false;
        self.buffer.clear();
        self.clear_cache();
        self.invalidate_columns();

        self.hooks.fire_closed();
        log_event(Event::EngineClose);
        store_closed?;
        projection_closed
    }

    // =========================================================================
    // Columns and exclusions
    // =========================================================================

    /// Native columns of the store, loaded once and cached.
    pub fn get_columns(&self) -> EngineResult<Vec<FeatureSourceColumn>> {
        self.ensure_open()?;
        if let Some(columns) = self.columns.read().map_err(StoreError::from)?.as_ref() {
            return Ok(columns.clone());
        }
        let loaded = self.store.get_columns()?;
        *self.columns.write().map_err(StoreError::from)? = Some(loaded.clone());
        Ok(loaded)
    }

    /// Drop the cached column list and the read cache.
    pub fn refresh_columns(&mut self) {
        self.invalidate_columns();
        self.clear_cache();
    }

    /// Hide these ids from every read until cleared.
    pub fn exclude_ids<I, T>(&mut self, ids: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.excluded_ids.extend(ids.into_iter().map(Into::into));
    }

    pub fn clear_excluded_ids(&mut self) {
        self.excluded_ids.clear();
    }

    pub fn excluded_ids(&self) -> &HashSet<String> {
        &self.excluded_ids
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn begin_transaction(&mut self) -> EngineResult<()> {
        self.ensure_open()?;
        if !self.store.is_editable() {
            return Err(EngineError::not_editable());
        }
        if self.in_transaction {
            return Err(EngineError::already_in_transaction());
        }
        self.buffer.clear();
        self.in_transaction = true;
        self.metrics.increment_transactions_begun();
        log_event(Event::TransactionBegin);
        Ok(())
    }

    /// Buffer an add. An empty id is replaced by a generated one; the id the
    /// feature is buffered under is returned.
    pub fn add_feature(&mut self, feature: Feature) -> EngineResult<String> {
        self.ensure_in_transaction()?;
        let feature = if feature.id().is_empty() {
            feature.with_id(uuid::Uuid::new_v4().to_string())
        } else {
            feature
        };
        let feature = self.buffered_form(feature)?;
        let id = feature.id().to_string();
        self.buffer.add_feature(feature);
        Ok(id)
    }

    /// Buffer an edit; a later edit of the same id replaces it.
    pub fn update_feature(&mut self, feature: Feature) -> EngineResult<()> {
        self.ensure_in_transaction()?;
        if feature.id().is_empty() {
            return Err(EngineError::validation("feature id is required for update"));
        }
        let feature = self.buffered_form(feature)?;
        self.buffer.edit_feature(feature);
        Ok(())
    }

    pub fn delete_feature(&mut self, id: &str) -> EngineResult<()> {
        self.ensure_in_transaction()?;
        if id.is_empty() {
            return Err(EngineError::validation("feature id is required for delete"));
        }
        self.buffer.delete_feature(id);
        Ok(())
    }

    /// Commit the pending buffer.
    ///
    /// A veto from a pre-commit observer returns a `Cancel` result and
    /// leaves the transaction open with its buffer intact. Otherwise the
    /// transaction ends, post-commit observers see the buffer and the buffer
    /// is cleared, whatever the store reports.
    pub fn commit_transaction(&mut self) -> EngineResult<TransactionResult> {
        self.ensure_in_transaction()?;

        if self.hooks.fire_committing(&self.buffer) {
            self.metrics.increment_commits_cancelled();
            let pending = self.buffer.len().to_string();
            log_event_with_fields(Event::TransactionCancelled, &[("pending", pending.as_str())]);
            return Ok(TransactionResult::cancelled());
        }

        let operations = self.buffer.len().to_string();
        let scope = ObservationScope::with_fields("COMMIT", &[("operations", operations.as_str())]);
        let outcome = self.store.commit_transaction(&self.buffer);
        self.in_transaction = false;

        let outcome = match outcome {
            Ok(result) => {
                self.report_commit(&result);
                let successes = result.success_count.to_string();
                let failures = result.failure_count.to_string();
                scope.complete_with_fields(&[
                    ("failure_count", failures.as_str()),
                    ("success_count", successes.as_str()),
                ]);
                Ok(result)
            }
            Err(e) => {
                let reason = e.to_string();
                log_event_with_fields(Event::CommitFailed, &[("reason", reason.as_str())]);
                scope.fail(&reason);
                Err(e.into())
            }
        };

        self.hooks.fire_committed(&self.buffer);
        self.buffer.clear();
        self.clear_cache();
        outcome
    }

    /// Discard the pending buffer without touching the store.
    pub fn rollback_transaction(&mut self) -> EngineResult<()> {
        self.ensure_in_transaction()?;
        let discarded = self.buffer.len().to_string();
        self.buffer.clear();
        self.in_transaction = false;
        self.metrics.increment_rollbacks();
        log_event_with_fields(Event::TransactionRollback, &[("discarded", discarded.as_str())]);
        Ok(())
    }

    fn report_commit(&self, result: &TransactionResult) {
        self.metrics.increment_commits();
        self.metrics
            .add_commit_item_failures(result.failure_count as u64);
        for (id, reason) in &result.failure_reasons {
            log_event_with_fields(
                Event::CommitItemFailed,
                &[("id", id.as_str()), ("reason", reason.as_str())],
            );
        }
        let status = result.status().to_string();
        log_event_with_fields(Event::TransactionCommit, &[("status", status.as_str())]);
    }

    /// Validate and convert a feature into the form kept in the buffer:
    /// internal coordinates with a decodable geometry.
    fn buffered_form(&self, feature: Feature) -> EngineResult<Feature> {
        let geometry = feature
            .geometry()
            .ok_or_else(|| EngineError::validation(format!("feature {} has no geometry", feature.id())))?;
        let internal = self.geometry_to_internal(geometry)?;
        self.store
            .geometry()
            .validate(&internal)
            .map_err(|e| EngineError::validation(e.to_string()))?;
        Ok(feature.with_geometry(internal))
    }

    // =========================================================================
    // Shared state checks
    // =========================================================================

    pub(super) fn ensure_open(&self) -> EngineResult<()> {
        if self.is_open {
            Ok(())
        } else {
            Err(EngineError::not_open())
        }
    }

    fn ensure_in_transaction(&self) -> EngineResult<()> {
        self.ensure_open()?;
        if self.in_transaction {
            Ok(())
        } else {
            Err(EngineError::not_in_transaction())
        }
    }

    /// Reads merge the pending buffer.
    pub(super) fn overlay_active(&self) -> bool {
        self.in_transaction && self.config.live_transaction
    }

    pub(super) fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    fn invalidate_columns(&self) {
        let mut columns = self.columns.write().unwrap_or_else(PoisonError::into_inner);
        *columns = None;
    }

    pub(super) fn geometry_to_internal(&self, geometry: &[u8]) -> EngineResult<Vec<u8>> {
        match &self.projection {
            Some(projection) => projection
                .to_internal(geometry)
                .map_err(|e| EngineError::validation(e.to_string())),
            None => Ok(geometry.to_vec()),
        }
    }
}

impl<S: FeatureStore> Drop for QueryEngine<S> {
    fn drop(&mut self) {
        if self.is_open {
            let _ = self.close();
        }
    }
}

impl<S: FeatureStore> std::fmt::Debug for QueryEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("config", &self.config)
            .field("is_open", &self.is_open)
            .field("in_transaction", &self.in_transaction)
            .field("pending", &self.buffer.len())
            .field("excluded_ids", &self.excluded_ids.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}
