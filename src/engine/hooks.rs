//! Observer hook points.
//!
//! Each hook point is an ordered list of callbacks invoked synchronously in
//! registration order. An empty list is a no-op.

use crate::transaction::TransactionBuffer;

type LifecycleHook = Box<dyn Fn() + Send + Sync>;
type CommittingHook = Box<dyn Fn(&TransactionBuffer) -> bool + Send + Sync>;
type CommittedHook = Box<dyn Fn(&TransactionBuffer) + Send + Sync>;
type CustomColumnHook = Box<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;
type ProgressHook = Box<dyn Fn(&ScanProgress) -> bool + Send + Sync>;

/// Progress of a long scan, passed to progress observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanProgress {
    /// Percentage of items processed, 0..=100.
    pub percent_done: u8,
    pub remaining: usize,
    pub done: usize,
}

/// All registered observers of one engine.
#[derive(Default)]
pub struct EngineHooks {
    opening: Vec<LifecycleHook>,
    opened: Vec<LifecycleHook>,
    closing: Vec<LifecycleHook>,
    closed: Vec<LifecycleHook>,
    committing: Vec<CommittingHook>,
    committed: Vec<CommittedHook>,
    custom_column: Vec<CustomColumnHook>,
    progress: Vec<ProgressHook>,
}

impl EngineHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_opening(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.opening.push(Box::new(f));
    }

    pub fn on_opened(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.opened.push(Box::new(f));
    }

    pub fn on_closing(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.closing.push(Box::new(f));
    }

    pub fn on_closed(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.closed.push(Box::new(f));
    }

    /// Pre-commit veto point. Returning `true` cancels the commit.
    pub fn on_committing_transaction(
        &mut self,
        f: impl Fn(&TransactionBuffer) -> bool + Send + Sync + 'static,
    ) {
        self.committing.push(Box::new(f));
    }

    pub fn on_committed_transaction(
        &mut self,
        f: impl Fn(&TransactionBuffer) + Send + Sync + 'static,
    ) {
        self.committed.push(Box::new(f));
    }

    /// Virtual column resolver, called as `(column_name, feature_id)`.
    pub fn on_custom_column_fetch(
        &mut self,
        f: impl Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    ) {
        self.custom_column.push(Box::new(f));
    }

    /// Progress observer for long scans. Returning `true` requests an early
    /// stop.
    pub fn on_progress_changed(&mut self, f: impl Fn(&ScanProgress) -> bool + Send + Sync + 'static) {
        self.progress.push(Box::new(f));
    }

    pub(crate) fn fire_opening(&self) {
        self.opening.iter().for_each(|f| f());
    }

    pub(crate) fn fire_opened(&self) {
        self.opened.iter().for_each(|f| f());
    }

    pub(crate) fn fire_closing(&self) {
        self.closing.iter().for_each(|f| f());
    }

    pub(crate) fn fire_closed(&self) {
        self.closed.iter().for_each(|f| f());
    }

    /// Every observer sees the buffer; any one of them may cancel.
    pub(crate) fn fire_committing(&self, buffer: &TransactionBuffer) -> bool {
        let mut cancel = false;
        for f in &self.committing {
            cancel |= f(buffer);
        }
        cancel
    }

    pub(crate) fn fire_committed(&self, buffer: &TransactionBuffer) {
        self.committed.iter().for_each(|f| f(buffer));
    }

    pub(crate) fn has_custom_column_resolver(&self) -> bool {
        !self.custom_column.is_empty()
    }

    /// First non-`None` answer wins; later resolvers are not called.
    pub(crate) fn fetch_custom_column(&self, column: &str, feature_id: &str) -> Option<String> {
        self.custom_column.iter().find_map(|f| f(column, feature_id))
    }

    /// Every observer sees the progress; any one of them may request a stop.
    pub(crate) fn fire_progress(&self, progress: &ScanProgress) -> bool {
        let mut stop = false;
        for f in &self.progress {
            stop |= f(progress);
        }
        stop
    }
}

impl std::fmt::Debug for EngineHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHooks")
            .field("opening", &self.opening.len())
            .field("opened", &self.opened.len())
            .field("closing", &self.closing.len())
            .field("closed", &self.closed.len())
            .field("committing", &self.committing.len())
            .field("committed", &self.committed.len())
            .field("custom_column", &self.custom_column.len())
            .field("progress", &self.progress.len())
            .finish()
    }
}
