//! Purpose: `facetmap` CLI entry point and command definitions.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable JSON on stdout; errors are JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All image mutations hold the exclusive image lock.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod registry_paths;

use command_dispatch::dispatch_command;
use facetmap::api::{
    BootstrapSet, Error, ErrorKind, FacetAddr, Image, Registry, Selector, bytes_to_hex,
    decode_batch, hex_to_bytes, packed_entries, packed_facets, packed_owner, packed_selectors,
    report, to_exit_code,
};
use registry_paths::{RegistryNameResolveError, default_registry_dir, resolve_named_image_path};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    init_tracing();
    let cli = Cli::parse();
    let registry_dir = cli.dir.clone().unwrap_or_else(default_registry_dir);
    dispatch_command(cli.command, registry_dir)
}

#[derive(Parser)]
#[command(
    name = "facetmap",
    version,
    about = "Function-selector dispatch registry with packed batch updates"
)]
struct Cli {
    /// Directory holding registry images (default: ~/.facetmap)
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a registry image with the three bootstrap facets installed
    Init {
        name: String,
        /// Address of the facet carrying the batch-apply entry point
        #[arg(long)]
        admin: String,
        /// Address of the facet carrying the four enumeration functions
        #[arg(long)]
        introspect: String,
        /// Address of the facet carrying the capability probe
        #[arg(long)]
        probe: String,
    },
    /// Apply packed update records to a registry as one atomic batch
    Apply {
        name: String,
        /// Hex records, each `owner || selector...`; all-zero owner removes
        #[arg(required = true)]
        records: Vec<String>,
    },
    /// List facet addresses in first-introduction order
    Facets { name: String },
    /// List the selectors currently owned by one facet
    Selectors { name: String, facet: String },
    /// Resolve the facet owning a selector
    Owner { name: String, selector: String },
    /// Enumerate every facet with its owned selectors
    Entries { name: String },
    /// Emit a full audit report for a registry image
    Audit { name: String },
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print version information as JSON
    Version,
}

fn resolve_image_path(name: &str, registry_dir: &Path) -> Result<PathBuf, Error> {
    resolve_named_image_path(name, registry_dir).map_err(|err| match err {
        RegistryNameResolveError::ContainsPathSeparator => Error::new(ErrorKind::Usage)
            .with_message(format!("registry name must not contain '/': {name}"))
            .with_hint("Use a bare name; the image lives under the --dir directory."),
    })
}

fn load_registry(name: &str, registry_dir: &Path) -> Result<Registry, Error> {
    let path = resolve_image_path(name, registry_dir)?;
    Image::open(&path)?.load()
}

fn parse_facet_addr(text: &str) -> Result<FacetAddr, Error> {
    text.parse()
}

fn parse_selector(text: &str) -> Result<Selector, Error> {
    text.parse()
}

fn emit_json(value: Value) {
    let is_tty = io::stdout().is_terminal();
    let json = if is_tty {
        serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {err}");
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    if let Some(message) = err.message() {
        inner.insert("message".to_string(), json!(message));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(record) = err.record() {
        inner.insert("record".to_string(), json!(record));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    causes
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
