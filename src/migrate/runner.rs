use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use super::{
    files::{self, rollback_filename},
    store::{AppliedMigration, MigrationStore},
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<String>,
    /// Recorded as applied but no longer on disk.
    pub missing: Vec<String>,
    /// Applied files whose contents changed since they ran.
    pub drifted: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DownReport {
    pub reverted: Vec<String>,
    /// Migration whose rollback file was missing; nothing older was touched.
    pub stopped_at: Option<String>,
}

pub struct Migrator<S> {
    store: S,
    dir: PathBuf,
}

impl<S: MigrationStore> Migrator<S> {
    pub fn new(store: S, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            dir: dir.into(),
        }
    }

    /// Applies pending files in filename order, at most `limit` of them.
    /// Stops at the first failure; earlier files stay applied.
    pub async fn up(&self, limit: Option<usize>) -> anyhow::Result<Vec<String>> {
        self.store.ensure_table().await?;
        let applied: HashSet<String> = self
            .store
            .applied()
            .await?
            .into_iter()
            .map(|m| m.filename)
            .collect();

        let pending = files::list_files(&self.dir)?
            .into_iter()
            .filter(|f| !applied.contains(&f.filename))
            .take(limit.unwrap_or(usize::MAX));

        let mut done = Vec::new();
        for file in pending {
            let sql = file.read_sql()?;
            let ran = self
                .store
                .apply(&file.filename, &file.checksum, &sql)
                .await
                .with_context(|| format!("apply migration {}", file.filename))?;
            if ran {
                info!(filename = %file.filename, checksum = %file.checksum, "migration applied");
                done.push(file.filename);
            } else {
                info!(filename = %file.filename, "migration already applied by another run");
            }
        }
        if done.is_empty() {
            info!("no pending migrations");
        }
        Ok(done)
    }

    /// Reverts the `steps` most recent migrations, newest first. A missing
    /// rollback file stops the walk with a warning.
    pub async fn down(&self, steps: usize) -> anyhow::Result<DownReport> {
        self.store.ensure_table().await?;
        let applied = self.store.applied().await?;

        let mut report = DownReport::default();
        for migration in applied.iter().rev().take(steps) {
            let rollback = self.dir.join(rollback_filename(&migration.filename));
            if !rollback.is_file() {
                warn!(
                    filename = %migration.filename,
                    rollback = %rollback.display(),
                    "rollback file missing, stopping"
                );
                report.stopped_at = Some(migration.filename.clone());
                break;
            }
            let sql = std::fs::read_to_string(&rollback)
                .with_context(|| format!("read {}", rollback.display()))?;
            self.store
                .revert(&migration.filename, &sql)
                .await
                .with_context(|| format!("revert migration {}", migration.filename))?;
            info!(filename = %migration.filename, "migration reverted");
            report.reverted.push(migration.filename.clone());
        }
        Ok(report)
    }

    pub async fn status(&self) -> anyhow::Result<MigrationStatus> {
        self.store.ensure_table().await?;
        let applied = self.store.applied().await?;
        let on_disk = files::list_files(&self.dir)?;

        let disk: HashMap<&str, &str> = on_disk
            .iter()
            .map(|f| (f.filename.as_str(), f.checksum.as_str()))
            .collect();
        let recorded: HashSet<&str> = applied.iter().map(|m| m.filename.as_str()).collect();

        let pending = on_disk
            .iter()
            .filter(|f| !recorded.contains(f.filename.as_str()))
            .map(|f| f.filename.clone())
            .collect();
        let missing = applied
            .iter()
            .filter(|m| !disk.contains_key(m.filename.as_str()))
            .map(|m| m.filename.clone())
            .collect();
        let drifted = applied
            .iter()
            .filter(|m| matches!(disk.get(m.filename.as_str()), Some(sum) if *sum != m.checksum))
            .map(|m| m.filename.clone())
            .collect();

        Ok(MigrationStatus {
            applied,
            pending,
            missing,
            drifted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    /// Tracking table kept in memory; `executed` logs every SQL body that ran.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<AppliedMigration>>,
        executed: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl MigrationStore for MemoryStore {
        async fn ensure_table(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn applied(&self) -> anyhow::Result<Vec<AppliedMigration>> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn apply(&self, filename: &str, checksum: &str, sql: &str) -> anyhow::Result<bool> {
            if self.fail_on.as_deref() == Some(filename) {
                anyhow::bail!("syntax error in {filename}");
            }
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|r| r.filename == filename) {
                return Ok(false);
            }
            self.executed.lock().unwrap().push(sql.to_string());
            let id = rows.len() as i64 + 1;
            rows.push(AppliedMigration {
                id,
                filename: filename.to_string(),
                checksum: checksum.to_string(),
                applied_at: OffsetDateTime::now_utc(),
            });
            Ok(true)
        }

        async fn revert(&self, filename: &str, sql: &str) -> anyhow::Result<()> {
            self.executed.lock().unwrap().push(sql.to_string());
            self.rows.lock().unwrap().retain(|r| r.filename != filename);
            Ok(())
        }
    }

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn migrations_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "0001_roles.sql", "CREATE TABLE roles ();");
        write(dir.path(), "0001_roles.rollback.sql", "DROP TABLE roles;");
        write(dir.path(), "0002_users.sql", "CREATE TABLE users ();");
        write(dir.path(), "0002_users.rollback.sql", "DROP TABLE users;");
        write(dir.path(), "0003_projects.sql", "CREATE TABLE projects ();");
        dir
    }

    #[tokio::test]
    async fn up_applies_in_order_and_is_idempotent() {
        let dir = migrations_dir();
        let migrator = Migrator::new(MemoryStore::default(), dir.path());

        let first = migrator.up(None).await.unwrap();
        assert_eq!(first, ["0001_roles.sql", "0002_users.sql", "0003_projects.sql"]);

        let second = migrator.up(None).await.unwrap();
        assert!(second.is_empty());

        let rows = migrator.store.applied().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(migrator.store.executed.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn up_respects_limit() {
        let dir = migrations_dir();
        let migrator = Migrator::new(MemoryStore::default(), dir.path());

        assert_eq!(migrator.up(Some(1)).await.unwrap(), ["0001_roles.sql"]);
        assert_eq!(migrator.up(Some(1)).await.unwrap(), ["0002_users.sql"]);
        assert_eq!(migrator.status().await.unwrap().pending, ["0003_projects.sql"]);
    }

    #[tokio::test]
    async fn failure_stops_later_files() {
        let dir = migrations_dir();
        let store = MemoryStore {
            fail_on: Some("0002_users.sql".into()),
            ..Default::default()
        };
        let migrator = Migrator::new(store, dir.path());

        assert!(migrator.up(None).await.is_err());
        let status = migrator.status().await.unwrap();
        assert_eq!(status.applied.len(), 1);
        assert_eq!(status.pending, ["0002_users.sql", "0003_projects.sql"]);
    }

    #[tokio::test]
    async fn down_stops_at_missing_rollback() {
        let dir = migrations_dir();
        let migrator = Migrator::new(MemoryStore::default(), dir.path());
        migrator.up(None).await.unwrap();

        // 0003 has no rollback file.
        let report = migrator.down(2).await.unwrap();
        assert!(report.reverted.is_empty());
        assert_eq!(report.stopped_at.as_deref(), Some("0003_projects.sql"));
        assert_eq!(migrator.store.applied().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn down_reverts_newest_first() {
        let dir = migrations_dir();
        let migrator = Migrator::new(MemoryStore::default(), dir.path());
        migrator.up(Some(2)).await.unwrap();

        let report = migrator.down(5).await.unwrap();
        assert_eq!(report.reverted, ["0002_users.sql", "0001_roles.sql"]);
        assert_eq!(report.stopped_at, None);
        assert!(migrator.store.applied().await.unwrap().is_empty());

        let executed = migrator.store.executed.lock().unwrap().clone();
        assert_eq!(executed[2], "DROP TABLE users;");
        assert_eq!(executed[3], "DROP TABLE roles;");
    }

    #[tokio::test]
    async fn status_reports_missing_and_drift() {
        let dir = migrations_dir();
        let migrator = Migrator::new(MemoryStore::default(), dir.path());
        migrator.up(Some(2)).await.unwrap();

        write(dir.path(), "0001_roles.sql", "CREATE TABLE roles (id INT);");
        std::fs::remove_file(dir.path().join("0002_users.sql")).unwrap();

        let status = migrator.status().await.unwrap();
        assert_eq!(status.applied.len(), 2);
        assert_eq!(status.pending, ["0003_projects.sql"]);
        assert_eq!(status.missing, ["0002_users.sql"]);
        assert_eq!(status.drifted, ["0001_roles.sql"]);
    }
}
