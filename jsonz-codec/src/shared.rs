//! Shared dictionaries
//!
//! A shared dictionary is a standalone string section reused across many
//! containers. Containers list the digests of the dictionaries they import,
//! in load order; a reader verifies each digest before trusting any ID the
//! dictionary provides.

use std::sync::{Arc, OnceLock};

use ahash::AHashMap;
use bytes::Bytes;
use indexmap::IndexMap;
use jsonz_format::{hash128, Digest, DictionaryHeader, JsonzError, Limits, Result, StringMapMode};
use tracing::{debug, warn};

use crate::compression::Codec;
use crate::registry::TagRegistry;
use crate::strings::{encode_strings, visit_strings, StringStore};
use crate::value::Value;

struct SharedInner {
    digest: Digest,
    header: DictionaryHeader,
    store: StringStore,
    index: OnceLock<AHashMap<Arc<str>, u64>>,
}

/// Verified, immutable shared dictionary; cheap to clone
#[derive(Clone)]
pub struct SharedDictionary {
    inner: Arc<SharedInner>,
}

impl std::fmt::Debug for SharedDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDictionary")
            .field("digest", &self.inner.digest.to_hex())
            .field("strings", &self.inner.header.string_count)
            .field("keys", &self.inner.header.key_string_count)
            .finish()
    }
}

impl SharedDictionary {
    /// Parse a dictionary file, hashing its bytes
    pub fn from_bytes(bytes: impl Into<Bytes>, limits: &Limits) -> Result<Self> {
        let bytes = bytes.into();
        let digest = hash128(&bytes);
        Self::with_digest(bytes, digest, limits)
    }

    /// Parse a dictionary file whose digest is already known
    pub fn with_digest(bytes: impl Into<Bytes>, digest: Digest, limits: &Limits) -> Result<Self> {
        let bytes = bytes.into();
        let header = DictionaryHeader::decode(&bytes, limits)?;
        let data_start = DictionaryHeader::LEN;
        let (data_size, map_start) = usize::try_from(header.string_data_size)
            .ok()
            .and_then(|size| Some((size, data_start.checked_add(size)?)))
            .filter(|(_, map_start)| *map_start <= bytes.len())
            .ok_or_else(|| {
                JsonzError::truncated(
                    data_start,
                    usize::try_from(header.string_data_size).unwrap_or(usize::MAX),
                    bytes.len().saturating_sub(data_start),
                )
            })?;
        let map_size = bytes.len() - map_start;

        let store = StringStore::open(
            bytes,
            data_start,
            data_size,
            map_start,
            map_size,
            header.mode,
            limits,
        )?;
        if store.len() != header.string_count {
            return Err(JsonzError::MalformedHeader(format!(
                "dictionary declares {} strings but its map holds {}",
                header.string_count,
                store.len()
            )));
        }
        debug!(digest = %digest, strings = header.string_count, "loaded shared dictionary");

        Ok(Self {
            inner: Arc::new(SharedInner {
                digest,
                header,
                store,
                index: OnceLock::new(),
            }),
        })
    }

    /// Digest of the dictionary file bytes
    pub fn digest(&self) -> Digest {
        self.inner.digest
    }

    /// Parsed file header
    pub fn header(&self) -> &DictionaryHeader {
        &self.inner.header
    }

    /// Number of strings
    pub fn len(&self) -> u64 {
        self.inner.store.len()
    }

    /// True when the dictionary holds no strings
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Leading strings that are object keys
    pub fn key_count(&self) -> u64 {
        self.inner.header.key_string_count
    }

    /// String at position `index`
    pub fn get(&self, index: u64) -> Result<Arc<str>> {
        self.inner.store.get(index)
    }

    /// Every string in ID order
    pub fn strings(&self) -> Result<Vec<Arc<str>>> {
        (0..self.len()).map(|idx| self.get(idx)).collect()
    }

    /// Position of `text`, if the dictionary holds it
    pub fn index_of(&self, text: &str) -> Result<Option<u64>> {
        if let Some(index) = self.inner.index.get() {
            return Ok(index.get(text).copied());
        }
        let mut index = AHashMap::with_capacity(self.len() as usize);
        for (idx, text) in self.strings()?.into_iter().enumerate() {
            index.entry(text).or_insert(idx as u64);
        }
        let index = self.inner.index.get_or_init(|| index);
        Ok(index.get(text).copied())
    }
}

/// Match supplied dictionaries against the digests a container requires
///
/// With verification on, dictionaries are matched by digest, so the caller
/// may supply them in any order. With verification off they are taken
/// positionally and the caller is responsible for the order.
pub fn resolve_imports(
    required: &[Digest],
    supplied: &[SharedDictionary],
    verify: bool,
) -> Result<Vec<SharedDictionary>> {
    let mut resolved = Vec::with_capacity(required.len());
    for (index, digest) in required.iter().enumerate() {
        if !verify {
            let dictionary = supplied.get(index).ok_or_else(|| JsonzError::MissingDictionary {
                index,
                digest: digest.to_hex(),
            })?;
            if dictionary.digest() != *digest {
                warn!(index, expected = %digest, actual = %dictionary.digest(), "using unverified shared dictionary");
            }
            resolved.push(dictionary.clone());
            continue;
        }

        match supplied.iter().find(|d| d.digest() == *digest) {
            Some(dictionary) => resolved.push(dictionary.clone()),
            None => {
                return Err(match supplied.get(index) {
                    Some(other) => JsonzError::DictionaryHashMismatch {
                        index,
                        expected: digest.to_hex(),
                        actual: other.digest().to_hex(),
                    },
                    None => JsonzError::MissingDictionary {
                        index,
                        digest: digest.to_hex(),
                    },
                })
            }
        }
    }
    Ok(resolved)
}

/// Builds a shared dictionary from a corpus of documents
#[derive(Debug)]
pub struct DictionaryBuilder {
    seen: IndexMap<String, (u64, bool), ahash::RandomState>,
    documents: usize,
    min_occurrences: u64,
    max_strings: usize,
    max_depth: usize,
    registry: TagRegistry,
}

impl Default for DictionaryBuilder {
    fn default() -> Self {
        Self {
            seen: IndexMap::default(),
            documents: 0,
            min_occurrences: 2,
            max_strings: 65_536,
            max_depth: Limits::default().max_depth,
            registry: TagRegistry::default(),
        }
    }
}

impl DictionaryBuilder {
    /// Builder with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only strings seen at least `count` times across the corpus
    pub fn min_occurrences(mut self, count: u64) -> Self {
        self.min_occurrences = count.max(1);
        self
    }

    /// Cap the number of strings in the dictionary
    pub fn max_strings(mut self, count: usize) -> Self {
        self.max_strings = count;
        self
    }

    /// Skip values claimed by these custom codecs
    pub fn registry(mut self, registry: TagRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Documents added so far
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Count the strings of one document
    pub fn add(&mut self, value: &Value) -> Result<()> {
        let seen = &mut self.seen;
        visit_strings(value, &self.registry, self.max_depth, &mut |text, is_key| {
            let entry = seen.entry(text.into_owned()).or_insert((0, false));
            entry.0 += 1;
            entry.1 |= is_key;
        })?;
        self.documents += 1;
        Ok(())
    }

    /// Selected strings: keys first, each partition most-frequent first
    pub fn selected(&self) -> (Vec<&str>, Vec<&str>) {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for (text, (count, is_key)) in &self.seen {
            if *count < self.min_occurrences {
                continue;
            }
            if *is_key {
                keys.push((text.as_str(), *count));
            } else {
                values.push((text.as_str(), *count));
            }
        }
        keys.sort_by(|a, b| b.1.cmp(&a.1));
        values.sort_by(|a, b| b.1.cmp(&a.1));
        keys.truncate(self.max_strings);
        values.truncate(self.max_strings - keys.len());
        (
            keys.into_iter().map(|(text, _)| text).collect(),
            values.into_iter().map(|(text, _)| text).collect(),
        )
    }

    /// Serialize the dictionary file
    pub fn build(&self, mode: StringMapMode, codec: Option<&Codec>) -> Result<Vec<u8>> {
        let (keys, values) = self.selected();
        let key_string_count = keys.len() as u64;
        let string_count = key_string_count + values.len() as u64;
        let encoded = encode_strings(keys.into_iter().chain(values), mode, codec)?;

        let header = DictionaryHeader {
            mode,
            string_count,
            key_string_count,
            string_data_size: encoded.data.len() as u64,
        };
        let mut out = header.encode();
        out.reserve(encoded.data.len() + encoded.map.len());
        out.extend_from_slice(&encoded.data);
        out.extend_from_slice(&encoded.map);
        debug!(
            documents = self.documents,
            strings = string_count,
            keys = key_string_count,
            bytes = out.len(),
            "built shared dictionary"
        );
        Ok(out)
    }
}
