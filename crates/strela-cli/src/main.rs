//! strela - Inspect Protocol Buffer payloads against compiled schema sets
//!
//! This tool loads a `FileDescriptorSet` (as written by `protoc
//! --descriptor_set_out`) and uses the runtime's reflection layer to
//! describe the schema and decode binary payloads into text.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use strela_core::descriptor::{walk_file, DescriptorVisitor};
use strela_core::io::{DEFAULT_RECURSION_LIMIT, DEFAULT_SIZE_LIMIT};
use strela_core::{
    CodedInputStream, Descriptor, DynamicMessage, ExtensionRegistry, FieldDescriptor,
    FileDescriptor, InputConfig, Label, MergeFromCodedStream, StatsVisitor, TextPrinter,
    UnknownFieldSet,
};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect Protocol Buffer payloads against compiled schema sets
#[derive(Parser, Debug)]
#[command(name = "strela")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    limits: LimitArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the files, messages, fields and extensions of a schema set
    Describe {
        /// Compiled schema set (FileDescriptorSet)
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Decode payloads as a message type and print them as text
    Decode(DecodeArgs),

    /// Dump a payload without a schema
    Raw {
        /// Payload file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Compiled schema set (FileDescriptorSet)
    #[arg(short, long)]
    schema: PathBuf,

    /// Fully-qualified message type, e.g. `pkg.Record`
    #[arg(short, long)]
    message: String,

    #[command(flatten)]
    input: InputMode,

    /// Print enum values as numbers
    #[arg(long)]
    numeric_enums: bool,

    /// Omit fields that matched no declared field or extension
    #[arg(long)]
    hide_unknown: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single payload
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of payloads
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LimitArgs {
    /// Maximum nesting of sub-messages and groups
    #[arg(long, global = true, default_value_t = DEFAULT_RECURSION_LIMIT)]
    recursion_limit: u32,

    /// Maximum payload size in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_SIZE_LIMIT)]
    size_limit: usize,

    /// Replace invalid UTF-8 in string fields instead of failing
    #[arg(long, global = true)]
    lossy_utf8: bool,
}

impl LimitArgs {
    fn input_config(&self) -> InputConfig {
        InputConfig::new()
            .recursion_limit(self.recursion_limit)
            .size_limit(self.size_limit)
            .strict_utf8(!self.lossy_utf8)
    }
}

/// A loaded schema set plus every extension it declares
struct Schema {
    files: Vec<FileDescriptor>,
    registry: ExtensionRegistry,
}

impl Schema {
    fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read schema set: {}", path.display()))?;
        let files = FileDescriptor::decode_set(&data)
            .with_context(|| format!("Failed to load schema set: {}", path.display()))?;

        let mut registry = ExtensionRegistry::new();
        for file in &files {
            registry
                .add_file(file)
                .with_context(|| format!("Conflicting extensions in {}", file.name()))?;
        }

        debug!(
            "Loaded {} file(s) and {} extension(s) from {}",
            files.len(),
            registry.len(),
            path.display()
        );
        Ok(Self { files, registry })
    }

    fn message_type(&self, full_name: &str) -> Result<Descriptor> {
        let name = full_name.trim_start_matches('.');
        match self.files.iter().find_map(|f| f.find_message_type(name)) {
            Some(descriptor) => Ok(descriptor),
            None => bail!("Message type not found in schema set: {}", name),
        }
    }
}

/// Decode counters and content fingerprints for directory mode
#[derive(Default)]
struct PayloadRegistry {
    /// Maps content hash -> first path seen with it
    seen: HashMap<String, PathBuf>,
    /// Statistics
    stats: PayloadStats,
}

#[derive(Default)]
struct PayloadStats {
    total_found: usize,
    duplicates_skipped: usize,
    decoded: usize,
    failed: usize,
}

impl PayloadRegistry {
    fn new() -> Self {
        Self::default()
    }

    /// Full blake3 hex digest of the content
    fn content_hash(content: &[u8]) -> String {
        blake3::hash(content).to_hex().to_string()
    }

    /// Records a payload; returns the earlier path if the content was seen before
    fn register(&mut self, path: &Path, content_hash: &str) -> Option<PathBuf> {
        self.stats.total_found += 1;
        if let Some(first) = self.seen.get(content_hash) {
            debug!(
                "Skipping duplicate: {} (same as {})",
                path.display(),
                first.display()
            );
            self.stats.duplicates_skipped += 1;
            return Some(first.clone());
        }
        self.seen
            .insert(content_hash.to_string(), path.to_path_buf());
        None
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} found, {} duplicates skipped, {} decoded, {} failed",
            self.stats.total_found,
            self.stats.duplicates_skipped,
            self.stats.decoded,
            self.stats.failed
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let config = cli.limits.input_config();
    match &cli.command {
        Command::Describe { schema } => {
            let schema = Schema::load(schema)?;
            print!("{}", describe(&schema.files));
            Ok(())
        }
        Command::Decode(args) => run_decode(args, config),
        Command::Raw { file } => {
            let data = read_payload(file)?;
            let fields = decode_raw(&data, config)
                .with_context(|| format!("Failed to decode {}", file.display()))?;
            print!("{}", TextPrinter::new().print_unknown(&fields));
            Ok(())
        }
    }
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        bail!("Input path is not a file: {}", path.display());
    }
    trace!("Reading {}", path.display());
    fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
}

fn run_decode(args: &DecodeArgs, config: InputConfig) -> Result<()> {
    let schema = Schema::load(&args.schema)?;
    let descriptor = schema.message_type(&args.message)?;
    let printer = TextPrinter::new().with_config(
        strela_core::TextFormatConfig::new()
            .enum_names(!args.numeric_enums)
            .print_unknown_fields(!args.hide_unknown),
    );

    if let Some(ref file) = args.input.file {
        let data = read_payload(file)?;
        let message = decode_payload(&descriptor, &data, &schema.registry, config)
            .with_context(|| format!("Failed to decode {}", file.display()))?;
        print!("{}", printer.print(&message));
        return Ok(());
    }

    let Some(ref directory) = args.input.directory else {
        bail!("Either --file or --directory must be specified")
    };
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());
    let mut registry = PayloadRegistry::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || is_hidden(path) {
            continue;
        }

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Error reading {}: {}", path.display(), e);
                continue;
            }
        };

        let hash = PayloadRegistry::content_hash(&data);
        if let Some(first) = registry.register(path, &hash) {
            println!("# {} (same as {})", path.display(), first.display());
            continue;
        }

        println!("# {} ({})", path.display(), &hash[..16]);
        match decode_payload(&descriptor, &data, &schema.registry, config.clone()) {
            Ok(message) => {
                print!("{}", printer.print(&message));
                registry.stats.decoded += 1;
            }
            // Malformed payloads are reported and skipped; anything else is fatal
            Err(e) if e.is_decode_error() => {
                warn!("Error decoding {}: {}", path.display(), e);
                registry.stats.failed += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to decode {}", path.display()));
            }
        }
    }

    registry.print_summary();
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Decodes one payload with the configured limits.
fn decode_payload(
    descriptor: &Descriptor,
    data: &[u8],
    registry: &ExtensionRegistry,
    config: InputConfig,
) -> strela_core::Result<DynamicMessage> {
    let mut input = CodedInputStream::from_bytes_with_config(data, config);
    let mut message = DynamicMessage::new(descriptor.clone());
    message.merge_from_coded_stream(&mut input, registry)?;
    input.check_last_tag_was(0)?;
    Ok(message)
}

fn decode_raw(data: &[u8], config: InputConfig) -> strela_core::Result<UnknownFieldSet> {
    let mut input = CodedInputStream::from_bytes_with_config(data, config);
    let mut fields = UnknownFieldSet::new();
    fields.merge_from_coded_stream(&mut input, ExtensionRegistry::empty())?;
    input.check_last_tag_was(0)?;
    Ok(fields)
}

/// Collects a line-per-element listing of a schema set
#[derive(Default)]
struct SchemaListing {
    output: String,
}

impl SchemaListing {
    fn line(&mut self, indent: usize, text: std::fmt::Arguments<'_>) {
        // Writing into a String cannot fail
        let _ = writeln!(self.output, "{:width$}{}", "", text, width = indent * 2);
    }
}

fn label_str(field: &FieldDescriptor) -> &'static str {
    match field.label() {
        Label::Optional => "optional",
        Label::Required => "required",
        Label::Repeated => "repeated",
    }
}

fn type_str(field: &FieldDescriptor) -> String {
    if let Some(message_type) = field.message_type() {
        return message_type.full_name().to_string();
    }
    if let Some(enum_type) = field.enum_type() {
        return enum_type.full_name().to_string();
    }
    field.field_type().as_str().to_string()
}

impl DescriptorVisitor for SchemaListing {
    fn visit_file(&mut self, file: &FileDescriptor) {
        self.line(
            0,
            format_args!(
                "file {} (package {}, {})",
                file.name(),
                file.package(),
                file.syntax().as_str()
            ),
        );
    }

    fn visit_message(&mut self, message: &Descriptor) {
        self.line(1, format_args!("message {}", message.full_name()));
    }

    fn visit_field(&mut self, field: &FieldDescriptor) {
        let packed = if field.is_packed() { " [packed]" } else { "" };
        self.line(
            2,
            format_args!(
                "{} = {}: {} {}{}",
                field.name(),
                field.number(),
                label_str(field),
                type_str(field),
                packed
            ),
        );
    }

    fn visit_extension(&mut self, extension: &FieldDescriptor) {
        let extendee = extension
            .containing_type()
            .map(|d| d.full_name().to_string())
            .unwrap_or_default();
        self.line(
            1,
            format_args!(
                "extend {}: {} = {}: {} {}",
                extendee,
                extension.full_name(),
                extension.number(),
                label_str(extension),
                type_str(extension)
            ),
        );
    }

    fn visit_enum(&mut self, enum_type: &strela_core::EnumDescriptor) {
        self.line(1, format_args!("enum {}", enum_type.full_name()));
    }

    fn visit_enum_value(&mut self, value: &strela_core::EnumValueDescriptor) {
        self.line(2, format_args!("{} = {}", value.name(), value.number()));
    }

    fn visit_service(&mut self, service: &strela_core::ServiceDescriptor) {
        self.line(1, format_args!("service {}", service.full_name()));
    }

    fn visit_method(&mut self, method: &strela_core::MethodDescriptor) {
        let type_name = |d: Option<Descriptor>| d.map(|d| d.full_name().to_string()).unwrap_or_default();
        let stream = |streaming: bool| if streaming { "stream " } else { "" };
        self.line(
            2,
            format_args!(
                "rpc {}({}{}) returns ({}{})",
                method.name(),
                stream(method.is_client_streaming()),
                type_name(method.input_type()),
                stream(method.is_server_streaming()),
                type_name(method.output_type())
            ),
        );
    }
}

/// Renders every file of a schema set, followed by summary counts
fn describe(files: &[FileDescriptor]) -> String {
    let mut listing = SchemaListing::default();
    let mut stats = StatsVisitor::default();
    for file in files {
        walk_file(file, &mut listing);
        walk_file(file, &mut stats);
    }
    listing.line(
        0,
        format_args!(
            "{} file(s), {} message(s), {} field(s), {} extension(s), {} enum(s), {} service(s)",
            files.len(),
            stats.message_count,
            stats.field_count,
            stats.extension_count,
            stats.enum_count,
            stats.service_count
        ),
    );
    listing.output
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;
    use prost_types::field_descriptor_proto::{Label as L, Type as T};
    use prost_types::{
        descriptor_proto::ExtensionRange, DescriptorProto, EnumDescriptorProto,
        EnumValueDescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    };
    use tempfile::TempDir;

    fn field(name: &str, number: i32, label: L, ty: T) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            ..Default::default()
        }
    }

    fn schema_set() -> FileDescriptorSet {
        let mut level = field("level", 2, L::Optional, T::Enum);
        level.type_name = Some(".cli.Level".to_string());
        let mut score = field("score", 100, L::Optional, T::Int32);
        score.extendee = Some(".cli.Event".to_string());

        FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("cli.proto".to_string()),
                package: Some("cli".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("Event".to_string()),
                    field: vec![field("name", 1, L::Optional, T::String), level],
                    extension_range: vec![ExtensionRange {
                        start: Some(100),
                        end: Some(200),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                enum_type: vec![EnumDescriptorProto {
                    name: Some("Level".to_string()),
                    value: vec![
                        EnumValueDescriptorProto {
                            name: Some("LOW".to_string()),
                            number: Some(0),
                            ..Default::default()
                        },
                        EnumValueDescriptorProto {
                            name: Some("HIGH".to_string()),
                            number: Some(1),
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                }],
                extension: vec![score],
                ..Default::default()
            }],
        }
    }

    fn write_schema(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("set.pb");
        fs::write(&path, schema_set().encode_to_vec()).unwrap();
        path
    }

    // name: "up", level: HIGH, [cli.score]: 7
    const EVENT: [u8; 8] = [0x0A, 0x02, 0x75, 0x70, 0x10, 0x01, 0xA0, 0x06];

    fn event_payload() -> Vec<u8> {
        let mut data = EVENT.to_vec();
        data.push(0x07);
        data
    }

    #[test]
    fn test_decode_payload_with_extensions() {
        let dir = TempDir::new().unwrap();
        let schema = Schema::load(&write_schema(&dir)).unwrap();
        let descriptor = schema.message_type("cli.Event").unwrap();

        let message =
            decode_payload(&descriptor, &event_payload(), &schema.registry, InputConfig::new())
                .unwrap();
        assert_eq!(
            TextPrinter::new().print(&message),
            "name: \"up\"\nlevel: HIGH\n[cli.score]: 7\n"
        );
    }

    #[test]
    fn test_decode_payload_respects_limits() {
        let dir = TempDir::new().unwrap();
        let schema = Schema::load(&write_schema(&dir)).unwrap();
        let descriptor = schema.message_type(".cli.Event").unwrap();

        let err = decode_payload(&descriptor, &[0x0A, 0x01, 0xFF], &schema.registry, InputConfig::new())
            .unwrap_err();
        assert!(err.is_decode_error());

        let lossy = LimitArgs {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            size_limit: DEFAULT_SIZE_LIMIT,
            lossy_utf8: true,
        };
        let message =
            decode_payload(&descriptor, &[0x0A, 0x01, 0xFF], &schema.registry, lossy.input_config())
                .unwrap();
        assert_eq!(TextPrinter::new().print(&message), "name: \"\u{FFFD}\"\n");
    }

    #[test]
    fn test_unknown_message_type() {
        let dir = TempDir::new().unwrap();
        let schema = Schema::load(&write_schema(&dir)).unwrap();
        assert!(schema.message_type("cli.Missing").is_err());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.pb");
        fs::write(&path, [0xFF, 0xFF]).unwrap();
        assert!(Schema::load(&path).is_err());
        assert!(Schema::load(&dir.path().join("missing.pb")).is_err());
    }

    #[test]
    fn test_decode_raw() {
        let fields = decode_raw(&event_payload(), InputConfig::new()).unwrap();
        assert_eq!(
            TextPrinter::new().print_unknown(&fields),
            "1: \"up\"\n2: 1\n100: 7\n"
        );
    }

    #[test]
    fn test_describe_listing() {
        let files = FileDescriptor::from_set(schema_set()).unwrap();
        let listing = describe(&files);
        assert!(listing.contains("file cli.proto (package cli, proto2)\n"));
        assert!(listing.contains("  message cli.Event\n"));
        assert!(listing.contains("    level = 2: optional cli.Level\n"));
        assert!(listing.contains("  extend cli.Event: cli.score = 100: optional int32\n"));
        assert!(listing.contains("    HIGH = 1\n"));
        assert!(listing.ends_with(
            "1 file(s), 1 message(s), 2 field(s), 1 extension(s), 1 enum(s), 0 service(s)\n"
        ));
    }

    #[test]
    fn test_payload_registry_deduplication() {
        let mut registry = PayloadRegistry::new();
        let hash = PayloadRegistry::content_hash(&EVENT);

        assert!(registry.register(Path::new("a.bin"), &hash).is_none());
        assert_eq!(
            registry.register(Path::new("b.bin"), &hash),
            Some(PathBuf::from("a.bin"))
        );

        let other = PayloadRegistry::content_hash(&[0x08, 0x01]);
        assert!(registry.register(Path::new("c.bin"), &other).is_none());

        assert_eq!(registry.stats.total_found, 3);
        assert_eq!(registry.stats.duplicates_skipped, 1);
    }

    #[test]
    fn test_content_hash() {
        let hash1 = PayloadRegistry::content_hash(b"hello");
        let hash2 = PayloadRegistry::content_hash(b"hello");
        let hash3 = PayloadRegistry::content_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new("/tmp/.cache")));
        assert!(!is_hidden(Path::new("/tmp/payload.bin")));
    }

    #[test]
    fn test_limit_flags() {
        let cli = Cli::try_parse_from([
            "strela",
            "raw",
            "-f",
            "x.bin",
            "--recursion-limit",
            "8",
            "--lossy-utf8",
        ])
        .unwrap();
        let config = cli.limits.input_config();
        assert_eq!(config.recursion_limit, 8);
        assert_eq!(config.size_limit, DEFAULT_SIZE_LIMIT);
        assert!(!config.strict_utf8);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
