//! Persistence for the editable `.env` file.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// Header written at the top of every rewritten `.env` file.
pub const ENV_FILE_HEADER: &str =
    "# Nexus Configuration\n# Generated automatically - do not edit manually\n\n";

/// Errors that can occur while reading or writing the `.env` file.
#[derive(Debug, Error)]
pub enum EnvFileError {
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: dotenvy::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid variable name: {0:?}")]
    InvalidKey(String),
}

/// A `KEY=value` file that is rewritten wholesale on every update.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    /// Creates a handle for the file at `path`. Nothing is read yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all variables in file order. A missing file reads as empty.
    pub fn read(&self) -> Result<Vec<(String, String)>, EnvFileError> {
        let iter = match dotenvy::from_path_iter(&self.path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(Vec::new()),
            Err(source) => {
                return Err(EnvFileError::Parse {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        iter.collect::<Result<Vec<_>, _>>()
            .map_err(|source| EnvFileError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Sets `key` to `value`, keeping every other variable, and rewrites the file.
    pub fn set(&self, key: &str, value: &str) -> Result<(), EnvFileError> {
        if !is_valid_key(key) {
            return Err(EnvFileError::InvalidKey(key.to_owned()));
        }

        let mut vars = self.read()?;
        match vars.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => value.clone_into(v),
            None => vars.push((key.to_owned(), value.to_owned())),
        }

        self.write(&vars)?;
        info!("Updated {} in {}", key, self.path.display());
        Ok(())
    }

    /// Writes `vars` with the fixed header, replacing the whole file.
    pub fn write(&self, vars: &[(String, String)]) -> Result<(), EnvFileError> {
        let mut content = String::from(ENV_FILE_HEADER);
        for (key, value) in vars {
            content.push_str(key);
            content.push('=');
            content.push_str(&quote(value));
            content.push('\n');
        }

        std::fs::write(&self.path, content).map_err(|source| EnvFileError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quotes a value so that dotenv parsers read it back verbatim.
fn quote(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/' | '@' | ','));

    if plain {
        value.to_owned()
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        let mut quoted = String::with_capacity(value.len() + 2);
        quoted.push('"');
        for c in value.chars() {
            if matches!(c, '"' | '\\' | '$') {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));
        assert!(env.read().unwrap().is_empty());
    }

    #[test]
    fn test_set_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));

        env.set("BOT_TOKEN", "123:abc").unwrap();

        let content = std::fs::read_to_string(env.path()).unwrap();
        assert!(content.starts_with(ENV_FILE_HEADER));
        assert!(content.contains("BOT_TOKEN=123:abc\n"));
    }

    #[test]
    fn test_set_keeps_other_keys_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "# hand written\nAPI_ID=12345\nAPI_HASH=deadbeef\n").unwrap();

        let env = EnvFile::new(&path);
        env.set("API_ID", "54321").unwrap();
        env.set("OWNER_NAME", "Jane Doe").unwrap();

        let vars = env.read().unwrap();
        assert_eq!(
            vars,
            vec![
                ("API_ID".to_owned(), "54321".to_owned()),
                ("API_HASH".to_owned(), "deadbeef".to_owned()),
                ("OWNER_NAME".to_owned(), "Jane Doe".to_owned()),
            ]
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("hand written"));
        assert!(content.starts_with(ENV_FILE_HEADER));
    }

    #[test]
    fn test_values_survive_quoting() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));

        let session = "AQID+/w==";
        env.set("SESSION_STRING", session).unwrap();
        env.set("BOT_NAME", "it's $HOME").unwrap();

        let vars = env.read().unwrap();
        assert_eq!(vars[0].1, session);
        assert_eq!(vars[1].1, "it's $HOME");
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));
        assert!(matches!(env.set("BAD KEY", "x"), Err(EnvFileError::InvalidKey(_))));
        assert!(matches!(env.set("1ABC", "x"), Err(EnvFileError::InvalidKey(_))));
    }
}
