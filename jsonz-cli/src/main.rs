//! JSONZ CLI - Command-line tool for JSONZ containers
//!
//! This binary provides command-line interfaces for:
//! - pack: JSON → .jsonz
//! - unpack: .jsonz → JSON
//! - get: print the value at a JSON Pointer
//! - ls: show the header, dictionary digests and a container's entries
//! - dict: build a shared dictionary from a JSON/NDJSON corpus

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use jsonz_codec::compression::DEFAULT_ZSTD_LEVEL;
use jsonz_format::types::is_custom_tag;
use jsonz_format::TypeTag;
use jsonz_io::{
    Codec, DictionaryBuilder, Document, Limits, Path, ReadOptions, SharedDictionary,
    StringMapMode, WriteOptions,
};
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonz")]
#[command(about = "Binary JSON container tool")]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// TOML file with default options
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Shared dictionary file, in import order (repeatable)
    #[arg(long = "dict", global = true)]
    dictionaries: Vec<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON document to a .jsonz container
    Pack {
        /// Input JSON file ("-" for stdin)
        input: PathBuf,
        /// Output file (.jsonz)
        #[arg(short, long)]
        output: PathBuf,
        /// String map layout
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Zstd compression level for long strings
        #[arg(long)]
        zstd_level: Option<i32>,
        /// Store every string raw
        #[arg(long)]
        no_compress: bool,
        /// Fixed 32-bit IDs for string and decimal arrays
        #[arg(long)]
        fast_arrays: bool,
    },
    /// Convert a .jsonz container back to JSON
    Unpack {
        /// Input file (.jsonz)
        input: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Indent the output
        #[arg(long)]
        pretty: bool,
        /// Take dictionaries in the given order without checking digests
        #[arg(long)]
        no_verify: bool,
    },
    /// Print the value at a JSON Pointer
    ///
    /// Examples:
    ///   jsonz get data.jsonz /users/0/name
    ///   jsonz get data.jsonz ""
    Get {
        /// Input file (.jsonz)
        input: PathBuf,
        /// JSON Pointer ("" for the root)
        pointer: String,
        /// Indent the output
        #[arg(long)]
        pretty: bool,
    },
    /// Show the header and the entries of a container value
    ///
    /// Examples:
    ///   jsonz ls data.jsonz
    ///   jsonz ls data.jsonz --pointer /users --format json
    Ls {
        /// Input file (.jsonz)
        input: PathBuf,
        /// Container to list
        #[arg(long, default_value = "")]
        pointer: String,
        /// Output format (table, json)
        #[arg(long, value_enum, default_value_t = LsFormat::Table)]
        format: LsFormat,
    },
    /// Build a shared dictionary from JSON or NDJSON files
    Dict {
        /// Corpus files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output dictionary file
        #[arg(short, long)]
        output: PathBuf,
        /// Keep strings seen at least this many times
        #[arg(long, default_value = "2")]
        min_occurrences: u64,
        /// Cap on dictionary size
        #[arg(long, default_value = "65536")]
        max_strings: usize,
        /// String map layout
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Store every string raw
        #[arg(long)]
        no_compress: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ModeArg {
    Size,
    Access,
}

impl From<ModeArg> for StringMapMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Size => StringMapMode::SizeOptimized,
            ModeArg::Access => StringMapMode::AccessOptimized,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LsFormat {
    Table,
    Json,
}

/// Defaults loaded from `--config`; command-line flags win
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CliConfig {
    mode: Option<ModeArg>,
    zstd_level: Option<i32>,
    compress_strings: Option<bool>,
    fast_string_arrays: Option<bool>,
    verify_dictionaries: Option<bool>,
    dictionaries: Vec<PathBuf>,
    limits: LimitsConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LimitsConfig {
    max_string_count: Option<u64>,
    max_string_map_bytes: Option<u64>,
    max_string_len: Option<u64>,
    max_depth: Option<usize>,
    max_decimal_digits: Option<usize>,
    max_dictionaries: Option<u64>,
    max_array_len: Option<u64>,
}

impl CliConfig {
    fn load(path: Option<&PathBuf>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
        let config: CliConfig = toml::from_str(&text)
            .map_err(|e| format!("invalid config {}: {}", path.display(), e))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        let l = &self.limits;
        if let Some(v) = l.max_string_count {
            limits.max_string_count = v;
        }
        if let Some(v) = l.max_string_map_bytes {
            limits.max_string_map_bytes = v;
        }
        if let Some(v) = l.max_string_len {
            limits.max_string_len = v;
        }
        if let Some(v) = l.max_depth {
            limits.max_depth = v;
        }
        if let Some(v) = l.max_decimal_digits {
            limits.max_decimal_digits = v;
        }
        if let Some(v) = l.max_dictionaries {
            limits.max_dictionaries = v;
        }
        if let Some(v) = l.max_array_len {
            limits.max_array_len = v;
        }
        limits
    }

    fn mode(&self, flag: Option<ModeArg>) -> StringMapMode {
        flag.or(self.mode)
            .map(StringMapMode::from)
            .unwrap_or_default()
    }

    fn codec(&self, level: Option<i32>) -> Codec {
        Codec::Zstd(level.or(self.zstd_level).unwrap_or(DEFAULT_ZSTD_LEVEL))
    }

    fn compress(&self, no_compress: bool) -> bool {
        !no_compress && self.compress_strings.unwrap_or(true)
    }

    fn read_options(&self, no_verify: bool) -> ReadOptions {
        ReadOptions {
            verify_dictionaries: !no_verify && self.verify_dictionaries.unwrap_or(true),
            limits: self.limits(),
            ..ReadOptions::default()
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    // Surface the Display text; `main` prints errors with Debug
    run(cli).map_err(|err| err.to_string().into())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = CliConfig::load(cli.config.as_ref())?;
    let mut dictionary_paths = config.dictionaries.clone();
    dictionary_paths.extend(cli.dictionaries.iter().cloned());
    let limits = config.limits();

    match cli.command {
        Commands::Pack {
            input,
            output,
            mode,
            zstd_level,
            no_compress,
            fast_arrays,
        } => {
            let dictionaries = jsonz_io::load_dictionaries(&dictionary_paths, &limits)?;
            let options = WriteOptions {
                mode: config.mode(mode),
                codec: config.codec(zstd_level),
                compress_strings: config.compress(no_compress),
                fast_string_arrays: fast_arrays || config.fast_string_arrays.unwrap_or(false),
                limits,
                ..WriteOptions::default()
            };
            handle_pack(input, output, &dictionaries, &options)?;
        }
        Commands::Unpack {
            input,
            output,
            pretty,
            no_verify,
        } => {
            let dictionaries = jsonz_io::load_dictionaries(&dictionary_paths, &limits)?;
            let options = config.read_options(no_verify);
            let file = File::open(&input)?;
            match output {
                Some(path) => {
                    jsonz_io::unpack(&file, File::create(&path)?, &dictionaries, options, pretty)?
                }
                None => jsonz_io::unpack(&file, io::stdout().lock(), &dictionaries, options, pretty)?,
            }
        }
        Commands::Get {
            input,
            pointer,
            pretty,
        } => {
            let dictionaries = jsonz_io::load_dictionaries(&dictionary_paths, &limits)?;
            let doc = jsonz_io::open_path(&input, &dictionaries, config.read_options(false))?;
            let json = doc.get(&Path::parse(&pointer)?)?.to_json()?;
            let mut out = BufWriter::new(io::stdout().lock());
            if pretty {
                serde_json::to_writer_pretty(&mut out, &json)?;
            } else {
                serde_json::to_writer(&mut out, &json)?;
            }
            writeln!(out)?;
            out.flush()?;
        }
        Commands::Ls {
            input,
            pointer,
            format,
        } => {
            let dictionaries = jsonz_io::load_dictionaries(&dictionary_paths, &limits)?;
            let doc = jsonz_io::open_path(&input, &dictionaries, config.read_options(false))?;
            handle_ls(&doc, &Path::parse(&pointer)?, format)?;
        }
        Commands::Dict {
            inputs,
            output,
            min_occurrences,
            max_strings,
            mode,
            no_compress,
        } => {
            let builder = DictionaryBuilder::new()
                .min_occurrences(min_occurrences)
                .max_strings(max_strings);
            let codec = config.codec(None);
            let codec = config.compress(no_compress).then_some(&codec);
            let files = inputs
                .iter()
                .map(File::open)
                .collect::<Result<Vec<_>, _>>()?;
            let bytes = jsonz_io::build_dictionary(files, builder, config.mode(mode), codec)?;
            fs::write(&output, &bytes)?;
            let dictionary = SharedDictionary::from_bytes(bytes, &limits)?;
            eprintln!(
                "wrote {} ({} strings, {} keys, digest {})",
                output.display(),
                dictionary.len(),
                dictionary.key_count(),
                dictionary.digest()
            );
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn handle_pack(
    input: PathBuf,
    output: PathBuf,
    dictionaries: &[SharedDictionary],
    options: &WriteOptions,
) -> Result<(), Box<dyn Error>> {
    let value = if input.as_os_str() == "-" {
        let mut text = Vec::new();
        io::stdin().lock().read_to_end(&mut text)?;
        jsonz_io::read_json(text.as_slice())?
    } else {
        jsonz_io::read_json(io::BufReader::new(File::open(&input)?))?
    };
    let written = jsonz_io::write_to_path(&value, &output, dictionaries, options)?;
    info!(output = %output.display(), bytes = written, "packed");
    Ok(())
}

fn tag_name(tag: u8) -> String {
    if is_custom_tag(tag) {
        return format!("Custom({:#04x})", tag);
    }
    match TypeTag::from_u8(tag) {
        Ok(known) => format!("{:?}", known),
        Err(_) => format!("Reserved({})", tag),
    }
}

fn handle_ls(doc: &Document, path: &Path, format: LsFormat) -> Result<(), Box<dyn Error>> {
    let header = doc.header();
    let tag = doc.tag_at(path)?;
    let is_container = TypeTag::from_u8(tag)
        .map(TypeTag::is_container)
        .unwrap_or(false)
        && !is_custom_tag(tag);
    let entries = if is_container {
        doc.entries(path)?
    } else {
        Vec::new()
    };

    let mut out = BufWriter::new(io::stdout().lock());
    match format {
        LsFormat::Json => {
            let strings = header.strings.as_ref().map(|section| {
                json!({
                    "mode": format!("{:?}", section.mode),
                    "key_count": section.key_count,
                    "string_data_size": section.string_data_size,
                    "string_map_size": section.string_map_size,
                    "dictionaries": section
                        .dictionaries
                        .iter()
                        .map(|digest| digest.to_hex())
                        .collect::<Vec<_>>(),
                })
            });
            let listing = json!({
                "root": tag_name(header.root_tag),
                "strings": strings,
                "path": path.to_string(),
                "type": tag_name(tag),
                "entries": entries
                    .iter()
                    .map(|(name, tag)| json!({"name": name, "tag": tag, "type": tag_name(*tag)}))
                    .collect::<Vec<_>>(),
            });
            serde_json::to_writer_pretty(&mut out, &listing)?;
            writeln!(out)?;
        }
        LsFormat::Table => {
            writeln!(out, "root: {}", tag_name(header.root_tag))?;
            match &header.strings {
                Some(section) => {
                    writeln!(out, "string map: {:?}", section.mode)?;
                    writeln!(
                        out,
                        "strings: {} key strings, {} data bytes, {} map bytes",
                        section.key_count, section.string_data_size, section.string_map_size
                    )?;
                    writeln!(out, "dictionaries: {}", section.dictionaries.len())?;
                    for (index, digest) in section.dictionaries.iter().enumerate() {
                        writeln!(out, "  #{} {}", index, digest)?;
                    }
                }
                None => writeln!(out, "strings: none")?,
            }
            writeln!(out, "{} ({})", path, tag_name(tag))?;
            let width = entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            for (name, tag) in &entries {
                writeln!(out, "  {:<width$}  {}", name, tag_name(*tag), width = width)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
