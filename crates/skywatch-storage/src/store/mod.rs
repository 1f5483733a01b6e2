use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::error::Result;

mod aggregate;
mod alert;
mod location;
mod metric;

pub use alert::{NewAlarmLog, ThresholdRow, ALARM_STATUS_ACTIVE, ALARM_STATUS_CLEARED};
pub use location::LocationRow;
pub use metric::NewRawMetric;

/// Unified access layer over the pipeline's PostgreSQL database.
///
/// All methods are `async fn` on a pooled SeaORM connection. Schema is
/// managed by the `migration` crate and applied on connect.
pub struct WeatherStore {
    pub(crate) db: DatabaseConnection,
}

impl WeatherStore {
    /// Connect, size the pool (25 open / 5 idle) and run pending migrations.
    pub async fn connect(db_url: &str) -> Result<Self> {
        let mut options = ConnectOptions::new(db_url.to_string());
        options.max_connections(25).min_connections(5);

        let db = Database::connect(options).await?;
        Migrator::up(&db, None).await?;
        tracing::info!("connected to database, migrations applied");

        Ok(Self { db })
    }

    /// Wrap an already-established connection (tests, embedded use).
    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
