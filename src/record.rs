//! Persistence of installation records as JSON files.
//!
//! Every record field is a [`Field`]: either a value or an explicit
//! "uninitialized" state, which survives a round-trip to disk as
//! [`UNINITIALIZED_MARKER`]. Partial records can then be merged onto the
//! existing file with [`update_record`] without clobbering the fields they
//! leave unset.

use crate::errors::HubError;
use anyhow::{Context, Result};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const UNINITIALIZED_MARKER: &str = "<%Uninitialized%>";

/// Snapshot of environment variables used to resolve `$VAR` references.
pub type Environ = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Uninitialized,
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Uninitialized
    }
}

impl<T> Field<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Field::Set(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Field::Set(value) => Some(value),
            Field::Uninitialized => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Field::Set(value) => Some(value),
            Field::Uninitialized => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Set(value) => Some(value),
            Field::Uninitialized => None,
        }
    }

    /// Replace `self` with `other` only when `other` holds a value.
    pub fn overlay(&mut self, other: Field<T>) {
        if let Field::Set(value) = other {
            *self = Field::Set(value);
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Set(value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Set(value) => value.serialize(serializer),
            Field::Uninitialized => serializer.serialize_str(UNINITIALIZED_MARKER),
        }
    }
}

struct Marker;

impl<'de> Deserialize<'de> for Marker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        if value == UNINITIALIZED_MARKER {
            Ok(Marker)
        } else {
            Err(D::Error::custom("not the uninitialized marker"))
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // The marker must be tried first so a `Field<String>` never swallows it.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<V> {
            Marker(Marker),
            Value(V),
        }

        Ok(match Repr::<T>::deserialize(deserializer)? {
            Repr::Marker(_) => Field::Uninitialized,
            Repr::Value(value) => Field::Set(value),
        })
    }
}

/// A structure persisted with [`read_record`], [`write_record`] and [`update_record`].
pub trait Record: Serialize + DeserializeOwned {
    /// Copy every initialized field of `other` onto `self`.
    fn overlay(&mut self, other: Self);

    /// Resolve environment references stored in path fields.
    fn expand_environ(&mut self, _environ: &Environ) {}
}

/// Resolve `$VAR` and `${VAR}` references from `environ`.
///
/// `$$` produces a literal `$`. Unknown variables are left untouched.
pub fn expand_envvars(src: &str, environ: &Environ) -> String {
    let mut expanded = String::with_capacity(src.len());
    let mut chars = src.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if c != '$' {
            expanded.push(c);
            continue;
        }

        match chars.peek().map(|(_, next)| *next) {
            Some('$') => {
                chars.next();
                expanded.push('$');
            }
            Some('{') => {
                let name_start = index + 2;
                let Some(length) = src[name_start..].find('}') else {
                    expanded.push(c);
                    continue;
                };
                let closing = name_start + length;
                let name = &src[name_start..closing];
                match environ.get(name) {
                    Some(value) => expanded.push_str(value),
                    None => expanded.push_str(&src[index..=closing]),
                }
                for (position, _) in chars.by_ref() {
                    if position == closing {
                        break;
                    }
                }
            }
            Some(next) if next == '_' || next.is_ascii_alphanumeric() => {
                let name_start = index + 1;
                let mut name_end = name_start;
                while let Some(&(position, next)) = chars.peek() {
                    if next != '_' && !next.is_ascii_alphanumeric() {
                        break;
                    }
                    name_end = position + next.len_utf8();
                    chars.next();
                }
                let name = &src[name_start..name_end];
                match environ.get(name) {
                    Some(value) => expanded.push_str(value),
                    None => {
                        expanded.push('$');
                        expanded.push_str(name);
                    }
                }
            }
            _ => expanded.push(c),
        }
    }

    expanded
}

pub fn expand_path(path: &Path, environ: &Environ) -> PathBuf {
    PathBuf::from(expand_envvars(&path.to_string_lossy(), environ))
}

fn read_record_raw<R: Record>(path: &Path) -> Result<R> {
    if !path.exists() {
        return Err(HubError::RecordNotFound(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read record file at {}", path.display()))?;

    serde_json::from_str(&content).map_err(|e| {
        HubError::RecordCorrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Read a record, resolving environment references against `environ`.
pub fn read_record<R: Record>(path: &Path, environ: &Environ) -> Result<R> {
    let mut record: R = read_record_raw(path)?;
    record.expand_environ(environ);
    Ok(record)
}

/// Like [`read_record`] but a missing or corrupted file yields `None`.
pub fn read_record_or_none<R: Record>(path: &Path, environ: &Environ) -> Result<Option<R>> {
    match read_record(path, environ) {
        Ok(record) => Ok(Some(record)),
        Err(e) => match e.downcast_ref::<HubError>() {
            Some(HubError::RecordNotFound(_)) => Ok(None),
            Some(HubError::RecordCorrupted { .. }) => {
                tracing::warn!("{}; treating it as absent", e);
                Ok(None)
            }
            _ => Err(e),
        },
    }
}

/// Serialize every field, uninitialized ones included, and atomically replace `path`.
pub fn write_record<R: Record>(record: &R, path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let content = serde_json::to_string_pretty(record)?;

    let mut staging = NamedTempFile::new_in(parent)
        .with_context(|| format!("Could not create a temporary file in {}", parent.display()))?;
    staging.write_all(content.as_bytes())?;
    staging.as_file().sync_all()?;
    staging
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Could not write record file at {}", path.display()))?;

    tracing::debug!("Wrote record {}", path.display());
    Ok(())
}

/// Merge the initialized fields of `record` onto the file at `path`.
///
/// Writes `record` as-is when the file is missing or cannot be parsed.
pub fn update_record<R: Record>(record: R, path: &Path) -> Result<()> {
    let merged = match read_record_raw::<R>(path) {
        Ok(mut existing) => {
            existing.overlay(record);
            existing
        }
        Err(e) => match e.downcast_ref::<HubError>() {
            Some(HubError::RecordNotFound(_)) => record,
            Some(HubError::RecordCorrupted { .. }) => {
                tracing::warn!("{}; overwriting it", e);
                record
            }
            _ => return Err(e),
        },
    };

    write_record(&merged, path)
}
