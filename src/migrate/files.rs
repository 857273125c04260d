use std::path::{Path, PathBuf};

use anyhow::Context;
use md5::{Digest, Md5};

pub const ROLLBACK_SUFFIX: &str = ".rollback.sql";

/// A forward migration found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub filename: String,
    pub path: PathBuf,
    pub checksum: String,
}

impl MigrationFile {
    pub fn read_sql(&self) -> anyhow::Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("read migration {}", self.path.display()))
    }
}

/// Lowercase hex MD5 of the file contents.
pub fn checksum(contents: &[u8]) -> String {
    hex::encode(Md5::digest(contents))
}

fn is_forward_migration(name: &str) -> bool {
    name.ends_with(".sql") && !name.ends_with(ROLLBACK_SUFFIX)
}

/// `0001_init.sql` → `0001_init.rollback.sql`, next to the forward file.
pub fn rollback_filename(filename: &str) -> String {
    let stem = filename.strip_suffix(".sql").unwrap_or(filename);
    format!("{stem}{ROLLBACK_SUFFIX}")
}

/// Every forward `.sql` file in `dir`, sorted by filename.
pub fn list_files(dir: &Path) -> anyhow::Result<Vec<MigrationFile>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("read migrations dir {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_forward_migration(&filename) {
            continue;
        }
        let path = entry.path();
        let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        files.push(MigrationFile {
            checksum: checksum(&bytes),
            filename,
            path,
        });
    }
    files.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_hex() {
        assert_eq!(checksum(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(checksum(b"SELECT 1;"), hex::encode(Md5::digest(b"SELECT 1;")));
    }

    #[test]
    fn rollback_name_sits_next_to_forward_file() {
        assert_eq!(
            rollback_filename("20240101000000_roles.sql"),
            "20240101000000_roles.rollback.sql"
        );
    }

    #[test]
    fn lists_forward_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0002_b.sql"), "SELECT 2;").unwrap();
        std::fs::write(dir.path().join("0001_a.sql"), "SELECT 1;").unwrap();
        std::fs::write(dir.path().join("0001_a.rollback.sql"), "SELECT 0;").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        std::fs::create_dir(dir.path().join("nested.sql")).unwrap();

        let files = list_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, ["0001_a.sql", "0002_b.sql"]);
        assert_eq!(files[0].checksum, checksum(b"SELECT 1;"));
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_files(&dir.path().join("nope")).is_err());
    }
}
