//! File-backed store.
//!
//! The whole store lives in one JSON document wrapped in an envelope carrying a
//! CRC32 of the document. Writes go to a temp file that is fsynced and renamed
//! over the original, so a crash leaves either the old or the new document.
//!
//! Opening verifies the checksum and builds the bounding-box index over a
//! bounded pool of scoped worker threads. `open` returns only after every
//! worker has finished; a partially built index is never visible.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::feature::{BoundingBox, Feature, FeatureSourceColumn};
use crate::geometry::{GeometryEngine, WktGeometry};
use crate::observability::{log_event_with_fields, Event};
use crate::transaction::{TransactionBuffer, TransactionResult};

use super::contract::FeatureStore;
use super::errors::{StoreError, StoreResult};
use super::table::{entry_for, FeatureTable, TableEntry};

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on index-building threads.
pub const MAX_INDEX_WORKERS: usize = 8;

/// Minimum features per worker before another thread is spawned.
const MIN_FEATURES_PER_WORKER: usize = 256;

/// Stored document body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    columns: Vec<FeatureSourceColumn>,
    features: Vec<Feature>,
}

/// Envelope written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct StoreEnvelope {
    format_version: u32,
    checksum: u32,
    saved_at: DateTime<Utc>,
    document: Value,
}

/// Editable store persisted to a single JSON file.
pub struct FileFeatureStore {
    path: PathBuf,
    columns: RwLock<Vec<FeatureSourceColumn>>,
    table: RwLock<FeatureTable>,
    geometry: Arc<dyn GeometryEngine>,
    open: AtomicBool,
    read_only: bool,
    workers: usize,
}

impl FileFeatureStore {
    /// Store backed by `path`. Nothing is read until [`FeatureStore::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(MAX_INDEX_WORKERS);
        Self {
            path: path.into(),
            columns: RwLock::new(Vec::new()),
            table: RwLock::new(FeatureTable::new()),
            geometry: Arc::new(WktGeometry),
            open: AtomicBool::new(false),
            read_only: false,
            workers,
        }
    }

    pub fn with_geometry_engine(mut self, geometry: Arc<dyn GeometryEngine>) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Cap the index-building pool. Zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, MAX_INDEX_WORKERS);
        self
    }

    /// Write a new store file with the given columns and features.
    ///
    /// Fails if the file already exists.
    pub fn create(
        path: impl AsRef<Path>,
        columns: Vec<FeatureSourceColumn>,
        features: Vec<Feature>,
    ) -> StoreResult<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }
        write_document(path, &StoreDocument { columns, features })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotOpen)
        }
    }

    /// Compute every row's bounding box on the worker pool and wait for all.
    fn build_index(&self, features: Vec<Feature>) -> StoreResult<FeatureTable> {
        let wanted = features.len().div_ceil(MIN_FEATURES_PER_WORKER).max(1);
        let workers = wanted.min(self.workers).max(1);
        let chunk_size = features.len().div_ceil(workers).max(1);
        let geometry = self.geometry.as_ref();

        let chunks: Vec<Result<Vec<TableEntry>, String>> = thread::scope(|scope| {
            let handles: Vec<_> = features
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|f| {
                                entry_for(f, geometry)
                                    .map_err(|reason| format!("feature '{}': {}", f.id(), reason))
                            })
                            .collect::<Result<Vec<_>, _>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err("index worker panicked".to_string()))
                })
                .collect()
        });

        let mut entries = Vec::with_capacity(features.len());
        for chunk in chunks {
            entries.extend(chunk.map_err(StoreError::Corrupted)?);
        }
        Ok(FeatureTable::from_entries(entries))
    }

    fn persist(&self, table: &FeatureTable) -> StoreResult<()> {
        let document = StoreDocument {
            columns: self.columns.read()?.clone(),
            features: table.features().cloned().collect(),
        };
        write_document(&self.path, &document)?;
        let count = document.features.len().to_string();
        log_event_with_fields(
            Event::StoreSaved,
            &[
                ("features", count.as_str()),
                ("path", &*self.path.to_string_lossy()),
            ],
        );
        Ok(())
    }
}

fn write_document(path: &Path, document: &StoreDocument) -> StoreResult<()> {
    let value = serde_json::to_value(document)?;
    let envelope = StoreEnvelope {
        format_version: FORMAT_VERSION,
        checksum: crc32fast::hash(&serde_json::to_vec(&value)?),
        saved_at: Utc::now(),
        document: value,
    };

    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, &envelope)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_document(path: &Path) -> StoreResult<StoreDocument> {
    let content = fs::read(path)?;
    let envelope: StoreEnvelope = serde_json::from_slice(&content)
        .map_err(|e| StoreError::Corrupted(format!("unreadable store envelope: {}", e)))?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(StoreError::Corrupted(format!(
            "unsupported format version {}",
            envelope.format_version
        )));
    }

    let actual = crc32fast::hash(&serde_json::to_vec(&envelope.document)?);
    if actual != envelope.checksum {
        return Err(StoreError::Corrupted(format!(
            "checksum mismatch: expected {:08x}, found {:08x}",
            envelope.checksum, actual
        )));
    }

    serde_json::from_value(envelope.document)
        .map_err(|e| StoreError::Corrupted(format!("invalid store document: {}", e)))
}

impl FeatureStore for FileFeatureStore {
    fn geometry(&self) -> &dyn GeometryEngine {
        self.geometry.as_ref()
    }

    fn open(&self) -> StoreResult<()> {
        let document = read_document(&self.path)?;
        let count = document.features.len();
        let table = self.build_index(document.features)?;

        *self.columns.write()? = document.columns;
        *self.table.write()? = table;
        self.open.store(true, Ordering::Release);

        let count = count.to_string();
        log_event_with_fields(
            Event::StoreLoaded,
            &[
                ("features", count.as_str()),
                ("path", &*self.path.to_string_lossy()),
            ],
        );
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.open.store(false, Ordering::Release);
        self.table.write()?.clear();
        Ok(())
    }

    fn is_editable(&self) -> bool {
        !self.read_only
    }

    fn get_columns(&self) -> StoreResult<Vec<FeatureSourceColumn>> {
        self.ensure_open()?;
        Ok(self.columns.read()?.clone())
    }

    fn get_all_features(&self, columns: &[String]) -> StoreResult<Vec<Feature>> {
        self.ensure_open()?;
        Ok(self.table.read()?.all(columns))
    }

    fn get_features_inside_bounding_box(
        &self,
        bbox: &BoundingBox,
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        self.ensure_open()?;
        Ok(self.table.read()?.inside(bbox, columns))
    }

    fn get_features_by_ids(
        &self,
        ids: &[String],
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        self.ensure_open()?;
        Ok(self.table.read()?.by_ids(ids, columns))
    }

    /// Apply and persist under the write lock. If persisting fails the
    /// in-memory table is rolled back to the state before the commit.
    fn commit_transaction(&self, buffer: &TransactionBuffer) -> StoreResult<TransactionResult> {
        self.ensure_open()?;
        if self.read_only {
            return Err(StoreError::NotSupported(
                "commit on a read-only store".to_string(),
            ));
        }
        let mut table = self.table.write()?;
        let before = table.clone();
        let result = table.apply(buffer, self.geometry.as_ref());
        if let Err(e) = self.persist(&table) {
            *table = before;
            return Err(e);
        }
        Ok(result)
    }

    fn get_count(&self) -> StoreResult<usize> {
        self.ensure_open()?;
        Ok(self.table.read()?.valid_len())
    }

    fn get_features_outside_bounding_box(
        &self,
        bbox: &BoundingBox,
        columns: &[String],
    ) -> StoreResult<Vec<Feature>> {
        self.ensure_open()?;
        Ok(self.table.read()?.outside(bbox, columns))
    }

    fn get_bounding_box(&self) -> StoreResult<Option<BoundingBox>> {
        self.ensure_open()?;
        Ok(self.table.read()?.bounding_box())
    }
}
