use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use routecss_rt::config as rt_config;
use serde::Deserialize;
use thiserror::Error;

pub const MANIFEST_FILE: &str = "routecss.toml";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value `{value}` for {key}")]
    Override { key: String, value: String },
    #[error("missing entry: pass a stylesheet path or set package.entry in {MANIFEST_FILE}")]
    MissingEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub serve: ServeSection,
    #[serde(default)]
    pub database: DatabaseSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct PackageConfig {
    #[serde(alias = "main")]
    pub entry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServeSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_requests: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseSection {
    pub url: Option<String>,
}

/// A manifest plus the directory relative paths resolve against.
#[derive(Debug, Default)]
pub struct Project {
    pub manifest: Manifest,
    pub dir: Option<PathBuf>,
}

impl Project {
    /// Loads `routecss.toml` from `manifest_path` (a file or a directory), or
    /// from the nearest parent of the working directory. No manifest is not
    /// an error.
    pub fn load(manifest_path: Option<&Path>) -> Result<Self, ManifestError> {
        let path = match manifest_path {
            Some(path) if path.is_dir() => Some(path.join(MANIFEST_FILE)),
            Some(path) => Some(path.to_path_buf()),
            None => env::current_dir().ok().and_then(|cwd| find_manifest(&cwd)),
        };
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        let manifest: Manifest = toml::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.clone(),
            source,
        })?;
        let dir = path.parent().map(Path::to_path_buf);
        Ok(Self { manifest, dir })
    }

    pub fn resolve_entry(&self, explicit: Option<&Path>) -> Result<PathBuf, ManifestError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        let entry = self
            .manifest
            .package
            .entry
            .as_deref()
            .ok_or(ManifestError::MissingEntry)?;
        let path = PathBuf::from(entry);
        match &self.dir {
            Some(dir) if path.is_relative() => Ok(dir.join(path)),
            _ => Ok(path),
        }
    }

    /// `ROUTECSS_DATABASE_URL`, then `[database] url`. Relative sqlite paths
    /// in the manifest resolve against the manifest directory.
    pub fn database_url(&self) -> Option<String> {
        if let Some(url) = rt_config::env_override("database", "url") {
            return Some(url);
        }
        let url = self.manifest.database.url.as_deref()?;
        Some(self.relative_sqlite_url(url))
    }

    fn relative_sqlite_url(&self, url: &str) -> String {
        let Some(dir) = &self.dir else {
            return url.to_string();
        };
        let Some(path) = url.strip_prefix("sqlite://") else {
            return url.to_string();
        };
        if path.starts_with(':') || Path::new(path).is_absolute() {
            return url.to_string();
        }
        format!("sqlite://{}", dir.join(path).display())
    }

    pub fn host(&self) -> String {
        rt_config::env_override("serve", "host")
            .or_else(|| self.manifest.serve.host.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    pub fn port(&self) -> Result<u16, ManifestError> {
        match parsed_override("serve", "port")? {
            Some(port) => Ok(port),
            None => Ok(self.manifest.serve.port.unwrap_or(3000)),
        }
    }

    pub fn max_requests(&self) -> Result<usize, ManifestError> {
        match parsed_override("serve", "max_requests")? {
            Some(count) => Ok(count),
            None => Ok(self.manifest.serve.max_requests.unwrap_or(0)),
        }
    }

    /// Reads `KEY=value` lines from `.env` next to the manifest (or in the
    /// working directory). Variables already set win.
    pub fn apply_dotenv(&self) {
        let path = match &self.dir {
            Some(dir) => dir.join(".env"),
            None => PathBuf::from(".env"),
        };
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read .env");
                return;
            }
        };
        for (key, value) in parse_dotenv(&contents) {
            if env::var_os(&key).is_some() {
                continue;
            }
            // Runs before any thread is spawned.
            unsafe {
                env::set_var(key, value);
            }
        }
    }
}

fn parsed_override<T: std::str::FromStr>(section: &str, field: &str) -> Result<Option<T>, ManifestError> {
    let Some(raw) = rt_config::env_override(section, field) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ManifestError::Override {
            key: rt_config::env_key(section, field),
            value: raw,
        })
}

fn find_manifest(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        let candidate = dir.join(MANIFEST_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

pub fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let bytes = value.as_bytes();
        let value = if bytes.len() >= 2
            && (bytes[0] == b'"' || bytes[0] == b'\'')
            && bytes[bytes.len() - 1] == bytes[0]
        {
            &value[1..value.len() - 1]
        } else {
            value
        };
        out.push((key.to_string(), value.to_string()));
    }
    out
}
