mod save;
mod update;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Subcommand};
use regstep_operations::providers::{
    ColumnMapper, InMemoryStore, RequiredColumnsChecker, RequiredFieldsValidator, StoredEntity,
};
use regstep_operations::traits::{EntityLoader, StatusUpdater};
use regstep_operations::{StepConfig, StepReport, StepServices};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{CliError, Result};

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Save a new customer from a step input file
    Save(StepArgs),
    /// Update an existing customer from a step input file
    Update(StepArgs),
}

#[derive(Args)]
pub(crate) struct StepArgs {
    /// JSON file with `user` and the submitted form `fields`
    input: PathBuf,

    /// JSON array of stored rows to load before the step runs
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Print the store contents next to the report
    #[arg(long)]
    dump_store: bool,
}

impl Commands {
    pub(crate) fn execute(self, config: &StepConfig) -> Result<()> {
        match self {
            Self::Save(args) => save::run(&args, config),
            Self::Update(args) => update::run(&args, config),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CliError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

fn open_store(seed: Option<&Path>) -> Result<Arc<InMemoryStore>> {
    let Some(seed) = seed else {
        return Ok(Arc::new(InMemoryStore::new()));
    };
    let rows: Vec<StoredEntity> = read_json(seed)?;
    info!(rows = rows.len(), path = %seed.display(), "store seeded");
    Ok(Arc::new(InMemoryStore::from_snapshot(rows)))
}

fn services(store: &Arc<InMemoryStore>, config: &StepConfig) -> StepServices<StoredEntity> {
    StepServices {
        validator: Arc::new(RequiredFieldsValidator::from_config(config)),
        mapper: Arc::new(ColumnMapper::from_config(config)),
        checker: Arc::new(RequiredColumnsChecker::from_config(config)),
        status_updater: Arc::clone(store) as Arc<dyn StatusUpdater>,
        loader: Arc::clone(store) as Arc<dyn EntityLoader<StoredEntity>>,
        registry: store.registry(),
    }
}

#[derive(Serialize)]
struct ReportWithStore<'a> {
    report: &'a StepReport,
    store: Vec<StoredEntity>,
}

fn print_report(report: &StepReport, store: &InMemoryStore, dump_store: bool) -> Result<()> {
    let rendered = if dump_store {
        serde_json::to_string_pretty(&ReportWithStore {
            report,
            store: store.snapshot(),
        })
    } else {
        serde_json::to_string_pretty(report)
    }
    .map_err(CliError::Render)?;

    println!("{rendered}");
    Ok(())
}
