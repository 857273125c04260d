//! Plain `.sql` migrations tracked in the `migrations` table.
//!
//! Forward files are named `<timestamp>_<name>.sql`; an optional
//! `<timestamp>_<name>.rollback.sql` next to it undoes the change.

pub mod files;
pub mod runner;
pub mod store;

pub use runner::{DownReport, MigrationStatus, Migrator};
pub use store::{MigrationStore, PgMigrationStore};

use sqlx::PgPool;
use std::path::Path;

/// Migrator over the Postgres tracking table.
pub fn postgres(db: PgPool, dir: &Path) -> Migrator<PgMigrationStore> {
    Migrator::new(PgMigrationStore::new(db), dir)
}
