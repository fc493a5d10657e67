use serde::Deserialize;

use crate::error::Error;
use crate::store::sqlite::DEFAULT_TABLE_NAME;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Path of the SQLite database file. `None` selects an in-memory
    /// database, which only makes sense for tests and experiments.
    pub db_path: Option<String>,

    /// Name of the monitor table, for databases shared between
    /// applications.
    pub table_name: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        Ok(envy::prefixed("PULSEMQ_").from_env::<Self>()?)
    }

    pub fn db_path(&self) -> Option<&str> {
        self.db_path.as_deref()
    }

    pub fn table_name(&self) -> &str {
        self.table_name.as_deref().unwrap_or(DEFAULT_TABLE_NAME)
    }
}
