//! JSONZ I/O - Sources, sinks and high-level APIs
//!
//! This crate connects the JSONZ codec to files and streams:
//!
//! - Random-access byte sources and sinks
//! - Shared dictionary loading with a process-wide cache
//! - Atomic container writes
//! - JSON text pack/unpack and dictionary building

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod dictionary;
pub mod source;

// Re-export commonly used types
pub use dictionary::{cache_len, clear_cache, load_dictionaries, load_dictionary};
pub use jsonz_codec::{
    encode, Codec, DictionaryBuilder, Document, Path, ReadOptions, SharedDictionary, Value,
    WriteOptions,
};
pub use jsonz_format::{JsonzError, Limits, Result, StringMapMode};
pub use source::{ByteSink, ByteSource};

use std::fs::File;
use std::io::{BufWriter, Read, Write};

use tempfile::NamedTempFile;
use tracing::debug;

/// Open a container held by `source`
///
/// The whole container is read into memory; every access afterwards is
/// served from that buffer.
pub fn open<S: ByteSource>(
    source: S,
    dictionaries: &[SharedDictionary],
    options: ReadOptions,
) -> Result<Document> {
    let bytes = source.read_all()?;
    Document::open(bytes, dictionaries, options)
}

/// Open a container file
pub fn open_path(
    path: impl AsRef<std::path::Path>,
    dictionaries: &[SharedDictionary],
    options: ReadOptions,
) -> Result<Document> {
    let file = File::open(path.as_ref())?;
    debug!(path = %path.as_ref().display(), "opening container file");
    open(&file, dictionaries, options)
}

/// Read the value at a JSON Pointer without keeping the session
pub fn get<S: ByteSource>(
    source: S,
    pointer: &str,
    dictionaries: &[SharedDictionary],
    options: ReadOptions,
) -> Result<Value> {
    let path = Path::parse(pointer)?;
    open(source, dictionaries, options)?.get(&path)
}

/// Encode `value` and replace the contents of `sink` with it
///
/// Returns the container length.
pub fn write<K: ByteSink + ?Sized>(
    value: &Value,
    sink: &mut K,
    dictionaries: &[SharedDictionary],
    options: &WriteOptions,
) -> Result<u64> {
    let bytes = jsonz_codec::encode(value, options, dictionaries)?;
    let len = bytes.len() as u64;
    sink.write_at(0, &bytes)?;
    sink.truncate(len)?;
    sink.flush()?;
    debug!(bytes = len, "container written");
    Ok(len)
}

/// Encode `value` into the file at `path`, replacing it atomically
///
/// The container is written to a temporary file beside `path` and renamed
/// over it, so readers never observe a partial container. The temporary
/// file is removed if any step fails.
pub fn write_to_path(
    value: &Value,
    path: impl AsRef<std::path::Path>,
    dictionaries: &[SharedDictionary],
    options: &WriteOptions,
) -> Result<u64> {
    let path = path.as_ref();
    let bytes = jsonz_codec::encode(value, options, dictionaries)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => std::path::Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    debug!(path = %path.display(), bytes = bytes.len(), "container persisted");
    Ok(bytes.len() as u64)
}

/// Parse one JSON document from `input`
pub fn read_json<R: Read>(input: R) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_reader(input)?;
    Value::from_json(&json)
}

/// Convert JSON text to a container written into `sink`
pub fn pack<R: Read, K: ByteSink + ?Sized>(
    input: R,
    sink: &mut K,
    dictionaries: &[SharedDictionary],
    options: &WriteOptions,
) -> Result<u64> {
    let value = read_json(input)?;
    write(&value, sink, dictionaries, options)
}

/// Convert the container held by `source` back to JSON text
///
/// Values with no JSON form (NaN, infinities, bytes, custom payloads)
/// fail with `TypeMismatch`.
pub fn unpack<S: ByteSource, W: Write>(
    source: S,
    output: W,
    dictionaries: &[SharedDictionary],
    options: ReadOptions,
    pretty: bool,
) -> Result<()> {
    let value = open(source, dictionaries, options)?.materialize()?;
    let json = value.to_json()?;

    let mut writer = BufWriter::new(output);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, &json)?;
    } else {
        serde_json::to_writer(&mut writer, &json)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Build a shared dictionary file from JSON corpora
///
/// Each input may hold one document or a stream of documents (NDJSON or
/// concatenated JSON); every document is counted separately.
pub fn build_dictionary<R: Read>(
    inputs: impl IntoIterator<Item = R>,
    mut builder: DictionaryBuilder,
    mode: StringMapMode,
    codec: Option<&Codec>,
) -> Result<Vec<u8>> {
    for input in inputs {
        let stream = serde_json::Deserializer::from_reader(input).into_iter::<serde_json::Value>();
        for document in stream {
            builder.add(&Value::from_json(&document?)?)?;
        }
    }
    debug!(documents = builder.documents(), "corpus scanned");
    builder.build(mode, codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_then_get() {
        let mut sink: Vec<u8> = Vec::new();
        let len = pack(
            &br#"{"a":1,"b":"x","c":[1,2,3]}"#[..],
            &mut sink,
            &[],
            &WriteOptions::default(),
        )
        .unwrap();
        assert_eq!(len, sink.len() as u64);

        let value = get(&sink, "/c/2", &[], ReadOptions::default()).unwrap();
        assert_eq!(value, Value::from(3i64));
    }

    #[test]
    fn test_write_truncates_longer_sink() {
        let mut sink = vec![0xAA; 4096];
        let len = write(&Value::from("short"), &mut sink, &[], &WriteOptions::default()).unwrap();
        assert_eq!(sink.len() as u64, len);
        let doc = open(&sink, &[], ReadOptions::default()).unwrap();
        assert_eq!(doc.materialize().unwrap(), Value::from("short"));
    }

    #[test]
    fn test_unpack_compact_and_pretty() {
        let mut sink: Vec<u8> = Vec::new();
        pack(&br#"{"k":[true,null]}"#[..], &mut sink, &[], &WriteOptions::default()).unwrap();

        let mut compact = Vec::new();
        unpack(&sink, &mut compact, &[], ReadOptions::default(), false).unwrap();
        assert_eq!(compact, b"{\"k\":[true,null]}\n");

        let mut pretty = Vec::new();
        unpack(&sink, &mut pretty, &[], ReadOptions::default(), true).unwrap();
        assert!(String::from_utf8(pretty).unwrap().contains("\n  \"k\": [\n"));
    }

    #[test]
    fn test_pack_rejects_invalid_json() {
        let mut sink: Vec<u8> = Vec::new();
        let err = pack(&b"{\"a\":"[..], &mut sink, &[], &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, JsonzError::Json(_)));
        assert!(sink.is_empty());
    }
}
