//! CLI command implementations
//!
//! Each command loads the config, opens the store through a `QueryEngine`,
//! serves exactly one request and exits. Engine errors become error
//! responses on stdout; config, I/O and store-open failures are CLI errors.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::{EngineConfig, EngineError, EngineResult, QueryEngine};
use crate::feature::{BoundingBox, Feature, FeatureSourceColumn};
use crate::geometry::SpatialPredicate;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::store::{FeatureStore, FileFeatureStore};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store file (required)
    pub store_path: String,

    /// Columns declared by `init` (optional, default none)
    #[serde(default)]
    pub columns: Vec<FeatureSourceColumn>,

    /// Open the store read-only (optional, default false)
    #[serde(default)]
    pub read_only: bool,

    /// Engine tunables (optional, all fields defaulted)
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        let shown = path.display().to_string();
        log_event_with_fields(Event::ConfigLoaded, &[("path", shown.as_str())]);
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.store_path.trim().is_empty() {
            return Err(CliError::config_error("store_path must not be empty"));
        }
        if let Some(column) = self.columns.iter().find(|c| c.name.is_empty()) {
            return Err(CliError::config_error(format!(
                "column names must not be empty (type '{}')",
                column.type_name
            )));
        }
        self.engine
            .validate()
            .map_err(|e| CliError::config_error(e.message().to_string()))
    }

    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.store_path)
    }

    fn open_engine(&self) -> CliResult<QueryEngine<FileFeatureStore>> {
        let path = self.store_path();
        if !path.exists() {
            return Err(CliError::not_initialized());
        }
        let mut store = FileFeatureStore::new(path);
        if self.read_only {
            store = store.read_only();
        }
        let mut engine = QueryEngine::new(store).with_config(self.engine.clone());
        engine.open()?;
        Ok(engine)
    }
}

/// One read request, selected by `op`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueryRequest {
    All {
        #[serde(default)]
        columns: Vec<String>,
    },
    Inside {
        bbox: BoundingBox,
        #[serde(default)]
        columns: Vec<String>,
    },
    Outside {
        bbox: BoundingBox,
        #[serde(default)]
        columns: Vec<String>,
    },
    Ids {
        ids: Vec<String>,
        #[serde(default)]
        columns: Vec<String>,
    },
    ColumnValue {
        column: String,
        value: String,
        #[serde(default)]
        columns: Vec<String>,
    },
    Spatial {
        /// WKT geometry
        geometry: String,
        predicate: SpatialPredicate,
        #[serde(default)]
        columns: Vec<String>,
    },
    Nearest {
        geometry: String,
        k: usize,
        #[serde(default)]
        columns: Vec<String>,
    },
    Within {
        geometry: String,
        distance: f64,
        #[serde(default)]
        columns: Vec<String>,
    },
    Count,
    Bbox,
}

/// One transaction: adds, then edits, then deletes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub add: Vec<Feature>,
    #[serde(default)]
    pub edit: Vec<Feature>,
    #[serde(default)]
    pub delete: Vec<String>,
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    Logger::set_min_severity(cli.log_level);
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Query { config } => query(&config),
        Command::Edit { config } => edit(&config),
    }
}

/// Create an empty store file with the configured columns.
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let path = config.store_path();

    if path.exists() {
        return Err(CliError::already_initialized());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            CliError::config_error(format!("Failed to create directory {:?}: {}", parent, e))
        })?;
    }

    FileFeatureStore::create(&path, config.columns.clone(), Vec::new())?;

    write_response(json!({
        "initialized": true,
        "store_path": config.store_path,
    }))
}

/// Run one query read from stdin.
pub fn query(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let mut engine = config.open_engine()?;
    let request = read_request()?;

    let outcome = serde_json::from_value::<QueryRequest>(request)
        .map_err(|e| EngineError::validation(format!("Invalid query request: {}", e)))
        .and_then(|request| execute_query(&engine, request));

    let written = respond(outcome);
    close_engine(&mut engine)?;
    written
}

/// Commit one transaction read from stdin.
pub fn edit(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let mut engine = config.open_engine()?;
    let request = read_request()?;

    let outcome = serde_json::from_value::<EditRequest>(request)
        .map_err(|e| EngineError::validation(format!("Invalid edit request: {}", e)))
        .and_then(|request| execute_edit(&mut engine, request));

    let written = respond(outcome);
    close_engine(&mut engine)?;
    written
}

/// Execute one query against an open engine.
pub fn execute_query<S: FeatureStore>(
    engine: &QueryEngine<S>,
    request: QueryRequest,
) -> EngineResult<Value> {
    let features = match request {
        QueryRequest::All { columns } => engine.get_all_features(&columns)?,
        QueryRequest::Inside { bbox, columns } => {
            engine.get_features_inside_bounding_box(&bbox, &columns)?
        }
        QueryRequest::Outside { bbox, columns } => {
            engine.get_features_outside_bounding_box(&bbox, &columns)?
        }
        QueryRequest::Ids { ids, columns } => engine.get_features_by_ids(&ids, &columns)?,
        QueryRequest::ColumnValue {
            column,
            value,
            columns,
        } => engine.get_features_by_column_value(&column, &value, &columns)?,
        QueryRequest::Spatial {
            geometry,
            predicate,
            columns,
        } => engine.spatial_query(geometry.as_bytes(), predicate, &columns)?,
        QueryRequest::Nearest {
            geometry,
            k,
            columns,
        } => engine.get_features_nearest_to(geometry.as_bytes(), k, &columns)?,
        QueryRequest::Within {
            geometry,
            distance,
            columns,
        } => engine.get_features_within_distance_of(geometry.as_bytes(), distance, &columns)?,
        QueryRequest::Count => return Ok(json!({ "count": engine.get_count()? })),
        QueryRequest::Bbox => return Ok(json!({ "bbox": engine.get_bounding_box()? })),
    };
    Ok(json!({ "features": features }))
}

/// Buffer and commit one transaction. A buffering error rolls the
/// transaction back before it is returned.
pub fn execute_edit<S: FeatureStore>(
    engine: &mut QueryEngine<S>,
    request: EditRequest,
) -> EngineResult<Value> {
    engine.begin_transaction()?;
    if let Err(e) = buffer_edit(engine, request) {
        engine.rollback_transaction()?;
        return Err(e);
    }
    let result = engine.commit_transaction()?;
    serde_json::to_value(&result).map_err(|e| EngineError::store_failed(e.to_string()))
}

fn buffer_edit<S: FeatureStore>(
    engine: &mut QueryEngine<S>,
    request: EditRequest,
) -> EngineResult<()> {
    for feature in request.add {
        engine.add_feature(feature)?;
    }
    for feature in request.edit {
        engine.update_feature(feature)?;
    }
    for id in &request.delete {
        engine.delete_feature(id)?;
    }
    Ok(())
}

fn respond(outcome: EngineResult<Value>) -> CliResult<()> {
    match outcome {
        Ok(data) => write_response(data),
        Err(e) => write_error(e.code().code(), e.message()),
    }
}

fn close_engine<S: FeatureStore>(engine: &mut QueryEngine<S>) -> CliResult<()> {
    engine.close()?;
    Ok(())
}
