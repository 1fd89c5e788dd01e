//! Reader sessions
//!
//! A [`Document`] owns the container bytes, the resolved string dictionary
//! and the skeleton caches for every container visited so far. Opening
//! validates the header, indexes the string section and decodes the key
//! partition; everything below the root is parsed the first time a path
//! reaches it.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use ahash::AHashMap;
use bytes::Bytes;
use jsonz_format::constants::TAG_ROOT_STRING;
use jsonz_format::types::is_custom_tag;
use jsonz_format::{ContainerHeader, Decimal, JsonzError, Limits, Result, TypeTag};
use tracing::{debug, trace};

use crate::compression::decompress_zstd;
use crate::cursor::Cursor;
use crate::path::{Path, PathSegment};
use crate::registry::TagRegistry;
use crate::shared::{resolve_imports, SharedDictionary};
use crate::skeleton::{parse_entry, Entry, LazyArray, LazyObject, ParseContext, Slot};
use crate::strings::{StringDictionary, StringStore};
use crate::value::{Map, Value};

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Match imported dictionaries by digest; when off they are taken in order
    pub verify_dictionaries: bool,
    /// Decode bytes payloads instead of failing on access
    pub allow_bytes: bool,
    /// Build every skeleton and resolve every string during `open`
    pub eager: bool,
    /// Resource limits for untrusted input
    pub limits: Limits,
    /// Custom tag codecs
    pub registry: TagRegistry,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_dictionaries: true,
            allow_bytes: false,
            eager: false,
            limits: Limits::default(),
            registry: TagRegistry::default(),
        }
    }
}

struct Session {
    bytes: Bytes,
    header: ContainerHeader,
    strings: StringDictionary,
    root: Entry,
    options: ReadOptions,
    objects: RwLock<AHashMap<usize, Arc<LazyObject>>>,
    arrays: RwLock<AHashMap<usize, Arc<LazyArray>>>,
}

enum Container {
    Object(Arc<LazyObject>),
    Array(Arc<LazyArray>),
}

/// Open container with lazily built skeletons
///
/// Cloning is cheap; clones share the session and its caches.
#[derive(Clone)]
pub struct Document {
    session: Arc<Session>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("bytes", &self.session.bytes.len())
            .field("header", &self.session.header)
            .field("strings", &self.session.strings.len())
            .finish()
    }
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        JsonzError::ResourceLimitExceeded(format!("size {} does not fit in memory", value))
    })
}

impl Document {
    /// Open a container
    ///
    /// `dictionaries` supplies the shared dictionaries the header imports.
    /// Structural problems (header, string section, root framing) fail here;
    /// problems inside nested entries surface when those entries are read.
    pub fn open(
        bytes: impl Into<Bytes>,
        dictionaries: &[SharedDictionary],
        options: ReadOptions,
    ) -> Result<Self> {
        let bytes = bytes.into();
        let (header, mut pos) = ContainerHeader::decode(&bytes, &options.limits)?;

        let strings = match &header.strings {
            Some(section) => {
                let data_size = to_usize(section.string_data_size)?;
                let map_size = to_usize(section.string_map_size)?;
                let data_start = pos;
                let map_start = data_start.checked_add(data_size);
                let end = map_start.and_then(|start| start.checked_add(map_size));
                let (map_start, end) = match (map_start, end) {
                    (Some(map_start), Some(end)) if end <= bytes.len() => (map_start, end),
                    _ => {
                        return Err(JsonzError::truncated(
                            data_start,
                            data_size.saturating_add(map_size),
                            bytes.len() - data_start,
                        ))
                    }
                };

                let externals = resolve_imports(
                    &section.dictionaries,
                    dictionaries,
                    options.verify_dictionaries,
                )?;
                let local = StringStore::open(
                    bytes.clone(),
                    data_start,
                    data_size,
                    map_start,
                    map_size,
                    section.mode,
                    &options.limits,
                )?;
                let strings = StringDictionary::new(externals, Some(local), section.key_count)?;
                strings.prefetch_keys()?;
                pos = end;
                strings
            }
            None => StringDictionary::empty(),
        };

        let mut cursor = Cursor::stream(&bytes[pos..], pos);
        let root = if header.root_tag == TAG_ROOT_STRING {
            let offset = cursor.absolute();
            let (_, len) = cursor.read_signed_varint()?;
            cursor.skip(to_usize(len)?)?;
            Entry {
                tag: TAG_ROOT_STRING,
                slot: Slot::Range {
                    offset,
                    len: cursor.absolute() - offset,
                },
            }
        } else {
            let ctx = ParseContext {
                registry: &options.registry,
                allow_bytes: options.allow_bytes,
                max_array_len: options.limits.max_array_len,
            };
            parse_entry(&mut cursor, header.root_tag, &ctx)?
        };
        if !cursor.is_empty() {
            return Err(JsonzError::MalformedHeader(format!(
                "{} trailing bytes after the root value",
                cursor.remaining()
            )));
        }

        debug!(
            root_tag = header.root_tag,
            bytes = bytes.len(),
            local_strings = strings.local_count(),
            shared_strings = strings.external_count(),
            dictionaries = strings.externals().len(),
            "opened container"
        );

        let eager = options.eager;
        let document = Self {
            session: Arc::new(Session {
                bytes,
                header,
                strings,
                root,
                options,
                objects: RwLock::new(AHashMap::new()),
                arrays: RwLock::new(AHashMap::new()),
            }),
        };
        if eager {
            document.prefetch()?;
        }
        Ok(document)
    }

    /// Decoded header
    pub fn header(&self) -> &ContainerHeader {
        &self.session.header
    }

    /// Tag of the root value
    pub fn root_tag(&self) -> u8 {
        self.session.header.root_tag
    }

    /// String IDs visible to this document
    pub fn strings(&self) -> &StringDictionary {
        &self.session.strings
    }

    /// Options the document was opened with
    pub fn options(&self) -> &ReadOptions {
        &self.session.options
    }

    /// Value at `path`
    pub fn get(&self, path: &Path) -> Result<Value> {
        let entry = self.locate(path)?;
        self.value_of(&entry, path.len())
    }

    /// Value at JSON Pointer `pointer`
    pub fn get_pointer(&self, pointer: &str) -> Result<Value> {
        self.get(&Path::parse(pointer)?)
    }

    /// The whole document as a value tree
    pub fn materialize(&self) -> Result<Value> {
        self.value_of(&self.session.root, 0)
    }

    /// Build every skeleton and resolve every string now
    pub fn prefetch(&self) -> Result<()> {
        self.materialize().map(drop)
    }

    /// Tag of the value at `path`
    pub fn tag_at(&self, path: &Path) -> Result<u8> {
        Ok(self.locate(path)?.tag)
    }

    /// Keys of the object at `path`, in stored order
    pub fn keys(&self, path: &Path) -> Result<Vec<String>> {
        match self.container(&self.locate(path)?)? {
            Container::Object(object) => Ok(object.keys().map(|key| key.to_string()).collect()),
            Container::Array(_) => Err(JsonzError::TypeMismatch(format!(
                "{} is an array, not an object",
                path
            ))),
        }
    }

    /// Number of keys or elements of the container at `path`
    pub fn len_at(&self, path: &Path) -> Result<usize> {
        Ok(match self.container(&self.locate(path)?)? {
            Container::Object(object) => object.len(),
            Container::Array(array) => array.len(),
        })
    }

    /// Child names and tags of the container at `path`
    ///
    /// Object children are named by key, array children by index.
    pub fn entries(&self, path: &Path) -> Result<Vec<(String, u8)>> {
        match self.container(&self.locate(path)?)? {
            Container::Object(object) => Ok(object
                .iter()
                .map(|(key, entry)| (key.to_string(), entry.tag))
                .collect()),
            Container::Array(array) => (0..array.len())
                .map(|idx| {
                    let entry = array.entry(idx, &self.session.bytes)?.ok_or(
                        JsonzError::BoundsViolation {
                            offset: idx as u64,
                            size: array.len() as u64,
                        },
                    )?;
                    Ok((idx.to_string(), entry.tag))
                })
                .collect(),
        }
    }

    fn parse_context(&self) -> ParseContext<'_> {
        ParseContext {
            registry: &self.session.options.registry,
            allow_bytes: self.session.options.allow_bytes,
            max_array_len: self.session.options.limits.max_array_len,
        }
    }

    fn locate(&self, path: &Path) -> Result<Entry> {
        Limits::check(
            "path depth",
            path.len() as u64,
            self.session.options.limits.max_depth as u64,
        )?;
        let mut entry = self.session.root.clone();
        for (depth, segment) in path.segments().iter().enumerate() {
            entry = self
                .child(&entry, segment)?
                .ok_or_else(|| JsonzError::PathNotFound(path.prefix(depth + 1).to_string()))?;
        }
        Ok(entry)
    }

    fn child(&self, entry: &Entry, segment: &PathSegment) -> Result<Option<Entry>> {
        match self.container(entry)? {
            Container::Object(object) => Ok(object.get(&segment.as_key()).cloned()),
            Container::Array(array) => match segment.as_index() {
                Some(idx) if idx >= array.len() => Err(JsonzError::BoundsViolation {
                    offset: idx as u64,
                    size: array.len() as u64,
                }),
                Some(idx) => array.entry(idx, &self.session.bytes),
                None => Ok(None),
            },
        }
    }

    fn container(&self, entry: &Entry) -> Result<Container> {
        if let Slot::Unsupported(reason) = &entry.slot {
            return Err(JsonzError::UnsupportedType(reason.clone()));
        }
        let kind = if is_custom_tag(entry.tag) {
            None
        } else {
            TypeTag::from_u8(entry.tag).ok()
        };
        match (kind, &entry.slot) {
            (Some(TypeTag::Object), Slot::Range { offset, len }) => {
                Ok(Container::Object(self.object(*offset, *len)?))
            }
            (Some(kind), Slot::Range { offset, len }) if kind.is_array() => {
                Ok(Container::Array(self.array(kind, *offset, *len)?))
            }
            _ => Err(JsonzError::TypeMismatch(format!(
                "tag {} is not a container",
                entry.tag
            ))),
        }
    }

    fn body(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.session.bytes.get(offset..end))
            .ok_or(JsonzError::BoundsViolation {
                offset: offset as u64 + len as u64,
                size: self.session.bytes.len() as u64,
            })
    }

    fn object(&self, offset: usize, len: usize) -> Result<Arc<LazyObject>> {
        if let Some(hit) = self
            .session
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&offset)
        {
            return Ok(Arc::clone(hit));
        }
        let parsed = LazyObject::parse(
            self.body(offset, len)?,
            offset,
            &self.session.strings,
            &self.parse_context(),
        )?;
        trace!(offset, keys = parsed.len(), "built object skeleton");
        let mut cache = self
            .session
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(offset).or_insert_with(|| Arc::new(parsed))))
    }

    fn array(&self, kind: TypeTag, offset: usize, len: usize) -> Result<Arc<LazyArray>> {
        if let Some(hit) = self
            .session
            .arrays
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&offset)
        {
            return Ok(Arc::clone(hit));
        }
        let parsed = LazyArray::parse(kind, self.body(offset, len)?, offset, &self.parse_context())?;
        trace!(offset, ?kind, elements = parsed.len(), "built array skeleton");
        let mut cache = self
            .session
            .arrays
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(offset).or_insert_with(|| Arc::new(parsed))))
    }

    /// Signed length (negative when compressed) plus stored bytes
    fn payload_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let limits = &self.session.options.limits;
        let mut cursor = Cursor::declared(self.body(offset, len)?, offset);
        let (compressed, stored) = cursor.read_signed_varint()?;
        let data = cursor.read_bytes(to_usize(stored)?)?;
        if compressed {
            decompress_zstd(data, limits.max_string_len)
        } else {
            Limits::check("payload length", stored, limits.max_string_len)?;
            Ok(data.to_vec())
        }
    }

    fn value_of(&self, entry: &Entry, depth: usize) -> Result<Value> {
        let limits = &self.session.options.limits;
        if depth > limits.max_depth {
            return Err(JsonzError::ResourceLimitExceeded(format!(
                "nesting depth exceeds {}",
                limits.max_depth
            )));
        }
        let (offset, len) = match &entry.slot {
            Slot::Value(value) => return Ok(value.clone()),
            Slot::StringId(id) => {
                return Ok(Value::String(self.session.strings.resolve(*id)?.to_string()))
            }
            Slot::DecimalId(id) => {
                let text = self.session.strings.resolve(*id)?;
                return Ok(Value::Decimal(Decimal::from_str_with_limit(
                    &text,
                    limits.max_decimal_digits,
                )?));
            }
            Slot::Unsupported(reason) => return Err(JsonzError::UnsupportedType(reason.clone())),
            Slot::Range { offset, len } => (*offset, *len),
        };

        if is_custom_tag(entry.tag) {
            let codec = self.session.options.registry.get(entry.tag).ok_or_else(|| {
                JsonzError::UnsupportedType(format!("unregistered custom tag {}", entry.tag))
            })?;
            return codec.decode(self.body(offset, len)?);
        }

        match TypeTag::from_u8(entry.tag)? {
            TypeTag::Bytes => Ok(Value::Bytes(self.payload_bytes(offset, len)?)),
            TypeTag::RootString => String::from_utf8(self.payload_bytes(offset, len)?)
                .map(Value::String)
                .map_err(|_| JsonzError::InvalidUtf8(0)),
            TypeTag::Object => {
                let object = self.object(offset, len)?;
                let mut map = Map::with_capacity(object.len());
                for (key, child) in object.iter() {
                    map.insert(key.to_string(), self.value_of(child, depth + 1)?);
                }
                Ok(Value::Object(map))
            }
            kind if kind.is_array() => {
                let array = self.array(kind, offset, len)?;
                let mut items = Vec::with_capacity(array.len());
                for idx in 0..array.len() {
                    if let Some(child) = array.entry(idx, &self.session.bytes)? {
                        items.push(self.value_of(&child, depth + 1)?);
                    }
                }
                Ok(Value::Array(items))
            }
            kind => Err(JsonzError::InvalidTagContext(kind.as_u8())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{encode, WriteOptions};
    use jsonz_format::constants::*;
    use serde_json::json;

    fn document(json: serde_json::Value) -> Document {
        let value = Value::from_json(&json).unwrap();
        let bytes = encode(&value, &WriteOptions::default(), &[]).unwrap();
        Document::open(bytes, &[], ReadOptions::default()).unwrap()
    }

    #[test]
    fn test_document_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Document>();
    }

    #[test]
    fn test_get_walks_objects_and_arrays() {
        let doc = document(json!({
            "users": [{"name": "ada", "tags": ["x", "y"]}, {"name": "bob"}],
            "count": 2
        }));
        assert_eq!(doc.get_pointer("/users/1/name").unwrap(), Value::from("bob"));
        assert_eq!(doc.get_pointer("/users/0/tags/1").unwrap(), Value::from("y"));
        assert_eq!(doc.get(&Path::root().key("count")).unwrap(), Value::from(2i64));
        assert_eq!(doc.len_at(&Path::root().key("users")).unwrap(), 2);
        assert_eq!(doc.keys(&Path::root()).unwrap(), vec!["users", "count"]);
    }

    #[test]
    fn test_missing_paths_name_the_failing_prefix() {
        let doc = document(json!({"a": {"b": 1}}));
        match doc.get_pointer("/a/c/d") {
            Err(JsonzError::PathNotFound(prefix)) => assert_eq!(prefix, "/a/c"),
            other => panic!("expected PathNotFound, got {:?}", other),
        }
        assert!(matches!(
            doc.get_pointer("/a/b/c"),
            Err(JsonzError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_array_index_out_of_range() {
        let doc = document(json!([1, 2, 3]));
        assert_eq!(doc.root_tag(), TAG_POS_U8_ARRAY);
        assert_eq!(doc.get_pointer("/2").unwrap(), Value::from(3i64));
        match doc.get_pointer("/3") {
            Err(JsonzError::BoundsViolation { offset, size }) => {
                assert_eq!(offset, 3);
                assert_eq!(size, 3);
            }
            other => panic!("expected BoundsViolation, got {:?}", other),
        }
        assert!(matches!(
            doc.get_pointer("/first"),
            Err(JsonzError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_scalar_and_string_roots() {
        assert_eq!(document(json!(null)).materialize().unwrap(), Value::Null);
        assert_eq!(
            document(json!("plain")).materialize().unwrap(),
            Value::from("plain")
        );
        let decimal = document(json!(12.5)).materialize().unwrap();
        assert_eq!(decimal.to_json().unwrap(), json!(12.5));
    }

    #[test]
    fn test_compressed_root_string() {
        let text = "abcdefgh".repeat(64);
        let doc = document(json!(text.clone()));
        assert!(doc.session.bytes.len() < text.len());
        assert_eq!(doc.materialize().unwrap(), Value::String(text));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = encode(&Value::from(7i64), &WriteOptions::default(), &[]).unwrap();
        bytes.push(0);
        assert!(matches!(
            Document::open(bytes, &[], ReadOptions::default()),
            Err(JsonzError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_truncated_string_section() {
        let value = Value::from_json(&json!({"key": "value"})).unwrap();
        let bytes = encode(&value, &WriteOptions::default(), &[]).unwrap();
        let (_, header_len) = ContainerHeader::decode(&bytes, &Limits::default()).unwrap();
        let cut = bytes[..header_len + 2].to_vec();
        assert!(matches!(
            Document::open(cut, &[], ReadOptions::default()),
            Err(JsonzError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_bytes_entry_fails_alone_without_capability() {
        let mut map = Map::new();
        map.insert("blob".to_string(), Value::Bytes(vec![9; 4]));
        map.insert("name".to_string(), Value::from("n"));
        let options = WriteOptions {
            allow_bytes: true,
            ..WriteOptions::default()
        };
        let bytes = encode(&Value::Object(map), &options, &[]).unwrap();

        let doc = Document::open(bytes.clone(), &[], ReadOptions::default()).unwrap();
        assert_eq!(doc.get_pointer("/name").unwrap(), Value::from("n"));
        assert!(matches!(
            doc.get_pointer("/blob"),
            Err(JsonzError::UnsupportedType(_))
        ));
        assert_eq!(doc.tag_at(&Path::root().key("blob")).unwrap(), TAG_BYTES);

        let read = ReadOptions {
            allow_bytes: true,
            ..ReadOptions::default()
        };
        let doc = Document::open(bytes, &[], read).unwrap();
        assert_eq!(doc.get_pointer("/blob").unwrap(), Value::Bytes(vec![9; 4]));
    }

    #[test]
    fn test_entries_lists_children_with_tags() {
        let doc = document(json!({"a": 1, "b": [true, false], "c": "s"}));
        assert_eq!(
            doc.entries(&Path::root()).unwrap(),
            vec![
                ("a".to_string(), TAG_POS_U8),
                ("b".to_string(), TAG_BOOL_ARRAY),
                ("c".to_string(), TAG_STRING),
            ]
        );
        assert_eq!(
            doc.entries(&Path::root().key("b")).unwrap(),
            vec![("0".to_string(), TAG_TRUE), ("1".to_string(), TAG_FALSE)]
        );
    }

    #[test]
    fn test_skeletons_are_cached() {
        let doc = document(json!({"outer": {"inner": [1, "two"]}}));
        doc.get_pointer("/outer/inner/1").unwrap();
        doc.get_pointer("/outer/inner/0").unwrap();
        // root and "outer"
        assert_eq!(doc.session.objects.read().unwrap().len(), 2);
        assert_eq!(doc.session.arrays.read().unwrap().len(), 1);
    }
}
