//! Shared dictionary loading with a process-wide cache
//!
//! Dictionary files are hashed once per process. Entries are keyed by
//! canonical path and dropped when the file's length or modification time
//! changes, so a rewritten dictionary is picked up on the next load.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::SystemTime;

use ahash::AHashMap;
use bytes::Bytes;
use jsonz_codec::SharedDictionary;
use jsonz_format::{Limits, Result};
use tracing::{debug, trace};

struct CacheEntry {
    len: u64,
    modified: Option<SystemTime>,
    dictionary: SharedDictionary,
}

type Cache = Mutex<AHashMap<PathBuf, CacheEntry>>;

fn cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(AHashMap::new()))
}

/// Load and verify a shared dictionary file, reusing a cached parse when the
/// file is unchanged
pub fn load_dictionary(path: impl AsRef<Path>, limits: &Limits) -> Result<SharedDictionary> {
    let path = fs::canonicalize(path.as_ref())?;
    let metadata = fs::metadata(&path)?;
    let len = metadata.len();
    let modified = metadata.modified().ok();

    {
        let cache = cache().lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = cache.get(&path) {
            if entry.len == len && entry.modified == modified {
                trace!(path = %path.display(), digest = %entry.dictionary.digest(), "dictionary cache hit");
                return Ok(entry.dictionary.clone());
            }
        }
    }

    let bytes = Bytes::from(fs::read(&path)?);
    let dictionary = SharedDictionary::from_bytes(bytes, limits)?;
    debug!(
        path = %path.display(),
        digest = %dictionary.digest(),
        strings = dictionary.len(),
        "cached shared dictionary"
    );

    let mut cache = cache().lock().unwrap_or_else(PoisonError::into_inner);
    cache.insert(
        path,
        CacheEntry {
            len,
            modified,
            dictionary: dictionary.clone(),
        },
    );
    Ok(dictionary)
}

/// Load several dictionaries, keeping their order
pub fn load_dictionaries<P: AsRef<Path>>(
    paths: &[P],
    limits: &Limits,
) -> Result<Vec<SharedDictionary>> {
    paths
        .iter()
        .map(|path| load_dictionary(path, limits))
        .collect()
}

/// Forget every cached dictionary
pub fn clear_cache() {
    cache()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

/// Number of cached dictionaries
pub fn cache_len() -> usize {
    cache().lock().unwrap_or_else(PoisonError::into_inner).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonz_codec::{DictionaryBuilder, StringMapMode, Value};
    use serde_json::json;

    fn dictionary_bytes(words: &[&str]) -> Vec<u8> {
        let mut builder = DictionaryBuilder::new().min_occurrences(1);
        let array: Vec<serde_json::Value> = words.iter().map(|w| json!(w)).collect();
        builder
            .add(&Value::from_json(&json!(array)).unwrap())
            .unwrap();
        builder.build(StringMapMode::SizeOptimized, None).unwrap()
    }

    #[test]
    fn test_reload_hits_cache_until_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.jsonzd");
        fs::write(&path, dictionary_bytes(&["alpha", "beta"])).unwrap();

        let first = load_dictionary(&path, &Limits::default()).unwrap();
        let second = load_dictionary(&path, &Limits::default()).unwrap();
        assert_eq!(first.digest(), second.digest());
        assert_eq!(first.len(), 2);

        fs::write(&path, dictionary_bytes(&["alpha", "beta", "gamma"])).unwrap();
        let third = load_dictionary(&path, &Limits::default()).unwrap();
        assert_ne!(third.digest(), first.digest());
        assert_eq!(third.len(), 3);
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dictionary(dir.path().join("absent"), &Limits::default()).unwrap_err();
        assert!(matches!(err, jsonz_format::JsonzError::Io(_)));
    }
}
