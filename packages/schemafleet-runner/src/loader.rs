//! Filesystem loading of migration definitions
//!
//! A migrations directory holds one `<name>.up.sql` and one
//! `<name>.down.sql` per migration. Names order the migrations, so a
//! sortable prefix convention (`m1_`, `m2_`, ...) is expected.

use crate::Migration;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

#[derive(Debug, Error)]
pub enum MigrationLoadError {
    #[error("failed to read migrations directory {path}: {cause}")]
    ReadDir {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    #[error("failed to read migration file {path}: {cause}")]
    ReadFile {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    /// Every migration must be revertible, a missing down file is
    /// refused up front rather than failing at rollback time
    #[error("migration {name} is missing its {DOWN_SUFFIX} file")]
    MissingDown { name: String },
}

/// Load all migrations from `dir`, ordered by name
pub fn load_migrations(dir: &Path) -> Result<Vec<Migration>, MigrationLoadError> {
    let entries = std::fs::read_dir(dir).map_err(|cause| MigrationLoadError::ReadDir {
        path: dir.to_path_buf(),
        cause,
    })?;

    let mut names: Vec<String> = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|cause| MigrationLoadError::ReadDir {
            path: dir.to_path_buf(),
            cause,
        })?;

        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();

        if let Some(name) = file_name.strip_suffix(UP_SUFFIX) {
            names.push(name.to_string());
        }
    }

    names.sort();

    let mut migrations = Vec::with_capacity(names.len());

    for name in names {
        let up_path = dir.join(format!("{name}{UP_SUFFIX}"));
        let down_path = dir.join(format!("{name}{DOWN_SUFFIX}"));

        if !down_path.exists() {
            return Err(MigrationLoadError::MissingDown { name });
        }

        let up = read_sql(&up_path)?;
        let down = read_sql(&down_path)?;

        migrations.push(Migration { name, up, down });
    }

    Ok(migrations)
}

fn read_sql(path: &Path) -> Result<String, MigrationLoadError> {
    std::fs::read_to_string(path).map_err(|cause| MigrationLoadError::ReadFile {
        path: path.to_path_buf(),
        cause,
    })
}
