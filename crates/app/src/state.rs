//! Server state: resolved configuration and the open database

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;
use draft_core::{Database, DraftConfig, Error, Result};
use draft_engine::SharedStore;
use tracing::info;

use crate::Args;

pub struct AppState {
    pub config: DraftConfig,
    pub db: Arc<Mutex<Database>>,
    pub db_path: PathBuf,
}

impl AppState {
    pub fn new(args: &Args) -> Result<Self> {
        let config = resolve_config(args)?;

        let db_path = match &config.storage.database {
            Some(path) => path.clone(),
            None => Self::data_path()?.join("draft.db"),
        };

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        info!(path = %db_path.display(), schema = db.schema_version(), "Database opened");

        Ok(Self {
            config,
            db: Arc::new(Mutex::new(db)),
            db_path,
        })
    }

    /// Storage handle shared by the workers and the persister
    pub fn storage(&self) -> SharedStore {
        self.db.clone()
    }

    fn data_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "onyx", "draft").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;

        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Config file (or defaults) with command-line overrides applied
pub fn resolve_config(args: &Args) -> Result<DraftConfig> {
    let mut config = match &args.config {
        Some(path) => DraftConfig::load(path)?,
        None => DraftConfig::default(),
    };

    if let Some(workers) = args.workers {
        config.server.workers = workers;
    }
    if let Some(port) = args.port {
        config.server.base_port = port;
    }
    if let Some(database) = &args.database {
        config.storage.database = Some(database.clone());
    }

    config.validate()?;
    Ok(config)
}
