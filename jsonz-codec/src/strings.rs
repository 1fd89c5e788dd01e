//! String dictionary
//!
//! Write side: every object key, string value and decimal text reachable from
//! the value tree is counted once per occurrence, partitioned into keys and
//! values, and ordered by descending frequency (first occurrence breaks
//! ties). Keys take the lowest local IDs. Strings found in an imported shared
//! dictionary keep that dictionary's ID and are not stored locally.
//!
//! Read side: [`StringStore`] resolves one string section lazily, caching
//! each decoded string; [`StringDictionary`] stitches shared dictionaries and
//! the local section into one dense ID space.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use ahash::AHashMap;
use bytes::Bytes;
use indexmap::IndexMap;
use jsonz_format::constants::ACCESS_RECORD_BYTES;
use jsonz_format::varint::encode_signed_varint;
use jsonz_format::{JsonzError, Limits, Result, StringMapMode};
use tracing::{debug, trace};

use crate::compression::{decompress_zstd, Codec};
use crate::cursor::Cursor;
use crate::registry::TagRegistry;
use crate::shared::SharedDictionary;
use crate::value::Value;

/// Visit every dictionary-bound string under `value`
///
/// The callback receives the text and whether it was used as an object key.
/// Values claimed by a custom tag codec are opaque and not descended into.
pub fn visit_strings<'a, F>(
    value: &'a Value,
    registry: &TagRegistry,
    max_depth: usize,
    visit: &mut F,
) -> Result<()>
where
    F: FnMut(Cow<'a, str>, bool),
{
    visit_inner(value, registry, max_depth, 0, visit)
}

fn visit_inner<'a, F>(
    value: &'a Value,
    registry: &TagRegistry,
    max_depth: usize,
    depth: usize,
    visit: &mut F,
) -> Result<()>
where
    F: FnMut(Cow<'a, str>, bool),
{
    if depth > max_depth {
        return Err(JsonzError::ResourceLimitExceeded(format!(
            "nesting depth exceeds {}",
            max_depth
        )));
    }
    if registry.find_for(value).is_some() {
        return Ok(());
    }
    match value {
        Value::String(s) => visit(Cow::Borrowed(s.as_str()), false),
        Value::Decimal(d) => visit(Cow::Owned(d.to_canonical_string()), false),
        Value::Array(items) => {
            for item in items {
                visit_inner(item, registry, max_depth, depth + 1, visit)?;
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                visit(Cow::Borrowed(key.as_str()), true);
                visit_inner(item, registry, max_depth, depth + 1, visit)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
struct Occurrence {
    count: u64,
    is_key: bool,
}

/// Occurrence counts in first-seen order
#[derive(Debug, Default)]
pub struct StringCollector<'a> {
    seen: IndexMap<Cow<'a, str>, Occurrence, ahash::RandomState>,
}

impl<'a> StringCollector<'a> {
    /// Empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence
    pub fn add(&mut self, text: Cow<'a, str>, is_key: bool) {
        let occurrence = self.seen.entry(text).or_default();
        occurrence.count += 1;
        occurrence.is_key |= is_key;
    }

    /// Count every string under `value`
    pub fn collect(
        &mut self,
        value: &'a Value,
        registry: &TagRegistry,
        max_depth: usize,
    ) -> Result<()> {
        visit_strings(value, registry, max_depth, &mut |text, is_key| {
            self.add(text, is_key)
        })
    }

    /// Distinct strings seen
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True when nothing was collected
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Occurrence count of `text`
    pub fn count(&self, text: &str) -> u64 {
        self.seen.get(text).map_or(0, |o| o.count)
    }

    /// Split into `(keys, values)`, each most-frequent first
    pub fn into_partitions(self) -> (Vec<Cow<'a, str>>, Vec<Cow<'a, str>>) {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for (text, occurrence) in self.seen {
            if occurrence.is_key {
                keys.push((text, occurrence.count));
            } else {
                values.push((text, occurrence.count));
            }
        }
        // stable: equal counts keep first-seen order
        keys.sort_by(|a, b| b.1.cmp(&a.1));
        values.sort_by(|a, b| b.1.cmp(&a.1));
        (
            keys.into_iter().map(|(text, _)| text).collect(),
            values.into_iter().map(|(text, _)| text).collect(),
        )
    }
}

/// Writer-side ID assignment
#[derive(Debug, Default)]
pub struct StringTable<'a> {
    ids: AHashMap<Cow<'a, str>, u64>,
    local: Vec<Cow<'a, str>>,
    key_count: u64,
    external_count: u64,
}

impl<'a> StringTable<'a> {
    /// Assign IDs for collected strings after the given shared dictionaries
    pub fn build(collector: StringCollector<'a>, externals: &[SharedDictionary]) -> Result<Self> {
        let external_count = externals.iter().map(SharedDictionary::len).sum::<u64>();
        let mut ids = AHashMap::with_capacity(collector.len());

        let (keys, values) = collector.into_partitions();
        let mut local_keys = Vec::with_capacity(keys.len());
        let mut local_values = Vec::with_capacity(values.len());
        for (texts, local) in [(keys, &mut local_keys), (values, &mut local_values)] {
            for text in texts {
                match external_id(externals, &text)? {
                    Some(id) => {
                        ids.insert(text, id);
                    }
                    None => local.push(text),
                }
            }
        }

        let key_count = local_keys.len() as u64;
        let mut local = local_keys;
        local.append(&mut local_values);
        for (idx, text) in local.iter().enumerate() {
            ids.insert(text.clone(), external_count + idx as u64);
        }
        debug!(
            external = external_count,
            local = local.len(),
            keys = key_count,
            reused = ids.len() - local.len(),
            "assigned string ids"
        );

        Ok(Self {
            ids,
            local,
            key_count,
            external_count,
        })
    }

    /// ID of a collected string
    pub fn id_of(&self, text: &str) -> Result<u64> {
        self.ids
            .get(text)
            .copied()
            .ok_or_else(|| JsonzError::Internal(format!("string {:?} was never collected", text)))
    }

    /// Strings stored in this file, in ID order
    pub fn local(&self) -> &[Cow<'a, str>] {
        &self.local
    }

    /// Local strings used as keys
    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    /// IDs taken by shared dictionaries
    pub fn external_count(&self) -> u64 {
        self.external_count
    }
}

fn external_id(externals: &[SharedDictionary], text: &str) -> Result<Option<u64>> {
    let mut base = 0;
    for dictionary in externals {
        if let Some(idx) = dictionary.index_of(text)? {
            return Ok(Some(base + idx));
        }
        base += dictionary.len();
    }
    Ok(None)
}

/// Encoded string data and string map
#[derive(Debug, Default)]
pub struct EncodedStrings {
    /// Concatenated string bytes
    pub data: Vec<u8>,
    /// Mode-specific size list
    pub map: Vec<u8>,
    /// Strings stored compressed
    pub compressed: usize,
}

/// Lay out strings in ID order, compressing each one that shrinks
pub fn encode_strings<'s, I>(texts: I, mode: StringMapMode, codec: Option<&Codec>) -> Result<EncodedStrings>
where
    I: IntoIterator<Item = &'s str>,
{
    let mut out = EncodedStrings::default();
    for text in texts {
        let raw = text.as_bytes();
        let (stored, compressed): (Cow<'_, [u8]>, bool) =
            match codec.map(|c| c.compress_if_smaller(raw)).transpose()?.flatten() {
                Some(packed) => (Cow::Owned(packed), true),
                None => (Cow::Borrowed(raw), false),
            };
        let size = stored.len() as u64;
        match mode {
            StringMapMode::SizeOptimized => {
                out.map
                    .extend_from_slice(&encode_signed_varint(compressed, size));
            }
            StringMapMode::AccessOptimized => {
                let signed = if compressed {
                    -(size as i64)
                } else {
                    size as i64
                };
                out.map.extend_from_slice(&signed.to_le_bytes());
                out.map
                    .extend_from_slice(&(out.data.len() as u64).to_le_bytes());
            }
        }
        out.compressed += usize::from(compressed);
        out.data.extend_from_slice(&stored);
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy)]
struct Span {
    offset: u64,
    len: u64,
    compressed: bool,
}

#[derive(Debug)]
enum Layout {
    Sized(Vec<Span>),
    Indexed { map_start: usize },
}

/// One string section (a file's local strings or a shared dictionary)
#[derive(Debug)]
pub struct StringStore {
    bytes: Bytes,
    data_start: usize,
    data_size: usize,
    layout: Layout,
    cache: Vec<OnceLock<Arc<str>>>,
    max_string_len: u64,
}

impl StringStore {
    /// Index the section at `data_start` (data) and `map_start` (map)
    ///
    /// Size-optimized maps are parsed here, bounded by `limits`;
    /// access-optimized maps are only sized.
    pub fn open(
        bytes: Bytes,
        data_start: usize,
        data_size: usize,
        map_start: usize,
        map_size: usize,
        mode: StringMapMode,
        limits: &Limits,
    ) -> Result<Self> {
        let map_end = map_start
            .checked_add(map_size)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| {
                JsonzError::truncated(map_start, map_size, bytes.len().saturating_sub(map_start))
            })?;
        if data_start
            .checked_add(data_size)
            .map_or(true, |data_end| data_end > map_start)
        {
            return Err(JsonzError::MalformedHeader(
                "string data overlaps the string map".to_string(),
            ));
        }

        let (layout, count) = match mode {
            StringMapMode::SizeOptimized => {
                Limits::check(
                    "string map bytes",
                    map_size as u64,
                    limits.max_string_map_bytes,
                )?;
                let spans = parse_size_map(
                    &bytes[map_start..map_end],
                    map_start,
                    data_size as u64,
                    limits,
                )?;
                let count = spans.len();
                (Layout::Sized(spans), count)
            }
            StringMapMode::AccessOptimized => {
                let count = map_size / ACCESS_RECORD_BYTES;
                Limits::check("string count", count as u64, limits.max_string_count)?;
                (Layout::Indexed { map_start }, count)
            }
        };
        trace!(count, ?mode, "indexed string section");

        Ok(Self {
            bytes,
            data_start,
            data_size,
            layout,
            cache: (0..count).map(|_| OnceLock::new()).collect(),
            max_string_len: limits.max_string_len,
        })
    }

    /// Number of strings
    pub fn len(&self) -> u64 {
        self.cache.len() as u64
    }

    /// True when the section holds no strings
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// String at position `index` within this section
    pub fn get(&self, index: u64) -> Result<Arc<str>> {
        let idx = usize::try_from(index)
            .ok()
            .filter(|idx| *idx < self.cache.len())
            .ok_or(JsonzError::BoundsViolation {
                offset: index,
                size: self.len(),
            })?;
        if let Some(text) = self.cache[idx].get() {
            return Ok(Arc::clone(text));
        }
        let decoded = self.decode(idx)?;
        Ok(Arc::clone(self.cache[idx].get_or_init(|| decoded)))
    }

    /// True if string `index` is stored compressed
    pub fn is_compressed(&self, index: u64) -> Result<bool> {
        let idx = usize::try_from(index).unwrap_or(usize::MAX);
        if idx >= self.cache.len() {
            return Err(JsonzError::BoundsViolation {
                offset: index,
                size: self.len(),
            });
        }
        Ok(self.span(idx)?.compressed)
    }

    fn span(&self, idx: usize) -> Result<Span> {
        match &self.layout {
            Layout::Sized(spans) => Ok(spans[idx]),
            Layout::Indexed { map_start } => {
                let at = idx
                    .checked_mul(ACCESS_RECORD_BYTES)
                    .and_then(|rel| map_start.checked_add(rel))
                    .ok_or(JsonzError::BoundsViolation {
                        offset: idx as u64,
                        size: self.len(),
                    })?;
                let record = at
                    .checked_add(ACCESS_RECORD_BYTES)
                    .and_then(|end| self.bytes.get(at..end))
                    .ok_or_else(|| {
                        JsonzError::truncated(
                            at,
                            ACCESS_RECORD_BYTES,
                            self.bytes.len().saturating_sub(at),
                        )
                    })?;
                let mut cursor = Cursor::stream(record, at);
                let signed = cursor.read_u64()? as i64;
                let offset = cursor.read_u64()?;
                Ok(Span {
                    offset,
                    len: signed.unsigned_abs(),
                    compressed: signed < 0,
                })
            }
        }
    }

    fn decode(&self, idx: usize) -> Result<Arc<str>> {
        let span = self.span(idx)?;
        let end = span
            .offset
            .checked_add(span.len)
            .filter(|end| *end <= self.data_size as u64)
            .ok_or(JsonzError::BoundsViolation {
                offset: span.offset.saturating_add(span.len),
                size: self.data_size as u64,
            })?;
        // The data region was checked to lie inside `bytes` on open
        let raw = self
            .bytes
            .get(self.data_start + span.offset as usize..self.data_start + end as usize)
            .ok_or(JsonzError::BoundsViolation {
                offset: end,
                size: self.data_size as u64,
            })?;

        let owned = if span.compressed {
            decompress_zstd(raw, self.max_string_len)?
        } else {
            Limits::check("string length", span.len, self.max_string_len)?;
            raw.to_vec()
        };
        let text = String::from_utf8(owned).map_err(|_| JsonzError::InvalidUtf8(idx as u64))?;
        Ok(Arc::from(text))
    }
}

fn parse_size_map(map: &[u8], origin: usize, data_size: u64, limits: &Limits) -> Result<Vec<Span>> {
    let mut cursor = Cursor::declared(map, origin);
    let mut spans = Vec::new();
    let mut offset = 0u64;
    while !cursor.is_empty() {
        Limits::check("string count", spans.len() as u64 + 1, limits.max_string_count)?;
        let (compressed, len) = cursor.read_signed_varint()?;
        spans.push(Span {
            offset,
            len,
            compressed,
        });
        offset = offset
            .checked_add(len)
            .filter(|end| *end <= data_size)
            .ok_or_else(|| {
                JsonzError::MalformedHeader(format!(
                    "string sizes exceed the declared string data size {}",
                    data_size
                ))
            })?;
    }
    Ok(spans)
}

/// Dense ID space over shared dictionaries followed by local strings
#[derive(Debug, Default)]
pub struct StringDictionary {
    externals: Vec<SharedDictionary>,
    bases: Vec<u64>,
    external_count: u64,
    local: Option<StringStore>,
    key_count: u64,
}

impl StringDictionary {
    /// Dictionary with no strings at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stitch imports (in load order) and a local section together
    pub fn new(
        externals: Vec<SharedDictionary>,
        local: Option<StringStore>,
        key_count: u64,
    ) -> Result<Self> {
        let mut bases = Vec::with_capacity(externals.len());
        let mut external_count = 0u64;
        for dictionary in &externals {
            bases.push(external_count);
            external_count = external_count.checked_add(dictionary.len()).ok_or_else(|| {
                JsonzError::ResourceLimitExceeded("shared dictionary ID space overflow".to_string())
            })?;
        }
        let local_count = local.as_ref().map_or(0, StringStore::len);
        if key_count > local_count {
            return Err(JsonzError::MalformedHeader(format!(
                "key count {} exceeds {} local strings",
                key_count, local_count
            )));
        }
        Ok(Self {
            externals,
            bases,
            external_count,
            local,
            key_count,
        })
    }

    /// IDs provided by shared dictionaries; also the first local ID
    pub fn external_count(&self) -> u64 {
        self.external_count
    }

    /// Strings stored in the file itself
    pub fn local_count(&self) -> u64 {
        self.local.as_ref().map_or(0, StringStore::len)
    }

    /// Local strings used as keys
    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    /// Total IDs
    pub fn len(&self) -> u64 {
        self.external_count + self.local_count()
    }

    /// True when no ID resolves
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Imported dictionaries in load order
    pub fn externals(&self) -> &[SharedDictionary] {
        &self.externals
    }

    /// Local string section, if any
    pub fn local(&self) -> Option<&StringStore> {
        self.local.as_ref()
    }

    /// Resolve a string ID
    pub fn resolve(&self, id: u64) -> Result<Arc<str>> {
        if id >= self.external_count {
            return match &self.local {
                Some(store) if id - self.external_count < store.len() => {
                    store.get(id - self.external_count).map_err(|e| match e {
                        JsonzError::InvalidUtf8(_) => JsonzError::InvalidUtf8(id),
                        other => other,
                    })
                }
                _ => Err(JsonzError::BoundsViolation {
                    offset: id,
                    size: self.len(),
                }),
            };
        }
        let slot = self.bases.partition_point(|base| *base <= id) - 1;
        self.externals[slot].get(id - self.bases[slot])
    }

    /// Decode the key partition up front
    pub fn prefetch_keys(&self) -> Result<()> {
        for offset in 0..self.key_count {
            self.resolve(self.external_count + offset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    fn store_for(texts: &[&str], mode: StringMapMode, codec: Option<&Codec>) -> StringStore {
        let encoded = encode_strings(texts.iter().copied(), mode, codec).unwrap();
        let data_size = encoded.data.len();
        let map_size = encoded.map.len();
        let mut bytes = encoded.data;
        bytes.extend_from_slice(&encoded.map);
        StringStore::open(
            Bytes::from(bytes),
            0,
            data_size,
            data_size,
            map_size,
            mode,
            &Limits::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_collector_orders_by_frequency_then_first_seen() {
        let mut map = Map::new();
        map.insert("b".into(), Value::from("y"));
        map.insert("a".into(), Value::from("x"));
        map.insert(
            "list".into(),
            Value::Array(vec![Value::from("x"), Value::from("z"), Value::from("x")]),
        );
        let value = Value::Object(map);

        let mut collector = StringCollector::new();
        collector.collect(&value, &TagRegistry::new(), 64).unwrap();
        assert_eq!(collector.count("x"), 3);
        let (keys, values) = collector.into_partitions();
        assert_eq!(keys, vec!["b", "a", "list"]);
        assert_eq!(values, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_string_used_as_key_and_value_lands_in_key_partition() {
        let mut map = Map::new();
        map.insert("id".into(), Value::from("id"));
        let value = Value::Object(map);
        let mut collector = StringCollector::new();
        collector.collect(&value, &TagRegistry::new(), 64).unwrap();
        let table = StringTable::build(collector, &[]).unwrap();
        assert_eq!(table.key_count(), 1);
        assert_eq!(table.local().len(), 1);
        assert_eq!(table.id_of("id").unwrap(), 0);
    }

    #[test]
    fn test_size_optimized_store_roundtrip() {
        let texts = ["alpha", "", "gamma ray", "δ"];
        let store = store_for(&texts, StringMapMode::SizeOptimized, None);
        assert_eq!(store.len(), 4);
        for (idx, text) in texts.iter().enumerate() {
            assert_eq!(&*store.get(idx as u64).unwrap(), *text);
        }
        assert!(matches!(
            store.get(4),
            Err(JsonzError::BoundsViolation { offset: 4, size: 4 })
        ));
    }

    #[test]
    fn test_interleaved_compressed_and_raw_strings() {
        let long_a = "compressible ".repeat(40);
        let long_b = "0123456789".repeat(50);
        let texts = ["short", long_a.as_str(), "tiny", long_b.as_str()];
        let codec = Codec::default();
        for mode in [StringMapMode::SizeOptimized, StringMapMode::AccessOptimized] {
            let store = store_for(&texts, mode, Some(&codec));
            let flags: Vec<bool> = (0..4).map(|i| store.is_compressed(i).unwrap()).collect();
            assert_eq!(flags, vec![false, true, false, true]);
            for (idx, text) in texts.iter().enumerate() {
                assert_eq!(&*store.get(idx as u64).unwrap(), *text);
            }
        }
    }

    #[test]
    fn test_access_optimized_records() {
        let encoded =
            encode_strings(["ab", "cde"], StringMapMode::AccessOptimized, None).unwrap();
        assert_eq!(encoded.map.len(), 2 * ACCESS_RECORD_BYTES);
        assert_eq!(&encoded.map[0..8], &2i64.to_le_bytes());
        assert_eq!(&encoded.map[8..16], &0u64.to_le_bytes());
        assert_eq!(&encoded.map[16..24], &3i64.to_le_bytes());
        assert_eq!(&encoded.map[24..32], &2u64.to_le_bytes());
    }

    #[test]
    fn test_size_map_limits() {
        let encoded = encode_strings(["a", "b", "c"], StringMapMode::SizeOptimized, None).unwrap();
        let data_size = encoded.data.len();
        let mut bytes = encoded.data;
        bytes.extend_from_slice(&encoded.map);
        let bytes = Bytes::from(bytes);
        let limits = Limits {
            max_string_count: 2,
            ..Limits::default()
        };
        let result = StringStore::open(
            bytes.clone(),
            0,
            data_size,
            data_size,
            bytes.len() - data_size,
            StringMapMode::SizeOptimized,
            &limits,
        );
        assert!(matches!(result, Err(JsonzError::ResourceLimitExceeded(_))));

        let limits = Limits {
            max_string_map_bytes: 2,
            ..Limits::default()
        };
        let result = StringStore::open(
            bytes.clone(),
            0,
            data_size,
            data_size,
            bytes.len() - data_size,
            StringMapMode::SizeOptimized,
            &limits,
        );
        assert!(matches!(result, Err(JsonzError::ResourceLimitExceeded(_))));
    }

    #[test]
    fn test_data_size_past_address_space_is_malformed() {
        let bytes = Bytes::from_static(b"abcd");
        let result = StringStore::open(
            bytes,
            2,
            usize::MAX - 1,
            4,
            0,
            StringMapMode::SizeOptimized,
            &Limits::default(),
        );
        assert!(matches!(result, Err(JsonzError::MalformedHeader(_))));
    }

    #[test]
    fn test_sizes_beyond_data_are_malformed() {
        let mut bytes = b"ab".to_vec();
        bytes.extend_from_slice(&encode_signed_varint(false, 5));
        let result = StringStore::open(
            Bytes::from(bytes),
            0,
            2,
            2,
            2,
            StringMapMode::SizeOptimized,
            &Limits::default(),
        );
        assert!(matches!(result, Err(JsonzError::MalformedHeader(_))));
    }

    #[test]
    fn test_invalid_utf8_is_reported_per_string() {
        let mut bytes = vec![b'o', b'k', 0xFF, 0xFE];
        bytes.extend_from_slice(&encode_signed_varint(false, 2));
        bytes.extend_from_slice(&encode_signed_varint(false, 2));
        let store = StringStore::open(
            Bytes::from(bytes),
            0,
            4,
            4,
            4,
            StringMapMode::SizeOptimized,
            &Limits::default(),
        )
        .unwrap();
        assert_eq!(&*store.get(0).unwrap(), "ok");
        assert!(matches!(store.get(1), Err(JsonzError::InvalidUtf8(1))));
        assert_eq!(&*store.get(0).unwrap(), "ok");
    }

    #[test]
    fn test_dictionary_key_count_validated() {
        let store = store_for(&["a"], StringMapMode::SizeOptimized, None);
        assert!(matches!(
            StringDictionary::new(Vec::new(), Some(store), 2),
            Err(JsonzError::MalformedHeader(_))
        ));
    }
}
