use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use anyhow::{Context, Result};
use astcanon_core::{parse_dump, tokens_to_node, CanonicalConfig, Canonicalizer, Node};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, info};

mod logging;

const EXIT_OK: i32 = 0;
const EXIT_MISMATCH: i32 = 1;
const EXIT_ERROR: i32 = 2;

/// Deep ASTs recurse once per level while reading and canonicalizing
const WORKER_STACK_BYTES: usize = 256 * 1024 * 1024;

/// astcanon: canonical form for compiler AST dumps
///
/// Strips volatile fields (ids, addresses, source locations, parent links)
/// and orders child lists so that dumps of the same program compare equal.
#[derive(Parser)]
#[command(name = "astcanon", version, about, long_about = None)]
struct Cli {
    /// Print nothing but the requested document or hash
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log filter such as `debug` or `astcanon_core=trace` (default: RUST_LOG, then `warn`)
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Also drop this field wherever it appears (repeatable)
    #[arg(long = "drop", global = true, value_name = "FIELD")]
    drop: Vec<String>,

    /// Also treat this field's list as order-insensitive (repeatable)
    #[arg(long = "unordered", global = true, value_name = "FIELD")]
    unordered: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Canonicalize a JSON AST dump (reads stdin when FILE is omitted)
    Normalize {
        /// Path to a .json AST dump
        file: Option<PathBuf>,
    },

    /// Convert a clang token dump into JSON
    Tokens {
        /// Path to a token dump
        file: Option<PathBuf>,
    },

    /// Compute the semantic hash (SHA-256) of a dump
    Hash {
        /// Path to a .json AST dump
        file: Option<PathBuf>,
    },

    /// Check whether two dumps are canonically equivalent
    Check {
        /// First .json AST dump
        file_a: PathBuf,
        /// Second .json AST dump
        file_b: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    logging::init_logger(cli.log_level.as_deref(), cli.no_color);

    let worker = thread::Builder::new()
        .name("astcanon".into())
        .stack_size(WORKER_STACK_BYTES)
        .spawn(move || run(cli));

    let exit_code = match worker {
        Ok(handle) => handle.join().unwrap_or_else(|_| {
            report_error(&anyhow::anyhow!("worker thread panicked"));
            EXIT_ERROR
        }),
        Err(e) => {
            report_error(&anyhow::Error::new(e).context("cannot start worker thread"));
            EXIT_ERROR
        }
    };

    process::exit(exit_code);
}

fn run(cli: Cli) -> i32 {
    let canonicalizer = build_canonicalizer(&cli.drop, &cli.unordered);

    let result = match &cli.command {
        Commands::Normalize { file } => cmd_normalize(&canonicalizer, file.as_deref()),
        Commands::Tokens { file } => cmd_tokens(file.as_deref()),
        Commands::Hash { file } => cmd_hash(&canonicalizer, file.as_deref()),
        Commands::Check {
            file_a,
            file_b,
            json,
        } => cmd_check(&canonicalizer, file_a, file_b, *json, cli.quiet),
        Commands::Version => {
            println!(
                "astcanon {} (astcanon-core {})",
                env!("CARGO_PKG_VERSION"),
                astcanon_core::VERSION
            );
            Ok(EXIT_OK)
        }
    };

    result.unwrap_or_else(|e| {
        report_error(&e);
        EXIT_ERROR
    })
}

fn build_canonicalizer(drop: &[String], unordered: &[String]) -> Canonicalizer {
    let config = drop
        .iter()
        .fold(CanonicalConfig::default(), |c, f| c.with_volatile_field(f.as_str()));
    let config = unordered
        .iter()
        .fold(config, |c, f| c.with_child_container(f.as_str()));
    debug!(
        volatile = ?config.volatile_fields,
        child_containers = ?config.child_containers,
        "canonicalizer configuration"
    );
    Canonicalizer::new(config)
}

// ── Commands ──────────────────────────────────────────────

fn cmd_normalize(canonicalizer: &Canonicalizer, file: Option<&Path>) -> Result<i32> {
    let node = read_node(file)?;
    let canonical = canonicalizer.canonical_json(&node)?;
    write_line(&canonical)?;
    Ok(EXIT_OK)
}

fn cmd_tokens(file: Option<&Path>) -> Result<i32> {
    let label = input_label(file);
    let tokens = parse_dump(open_input(file)?).with_context(|| format!("reading {}", label))?;
    info!(input = %label, tokens = tokens.len(), "converted token dump");
    let json = serde_json::to_string(&tokens_to_node(&tokens))?;
    write_line(&json)?;
    Ok(EXIT_OK)
}

fn cmd_hash(canonicalizer: &Canonicalizer, file: Option<&Path>) -> Result<i32> {
    let node = read_node(file)?;
    write_line(&canonicalizer.semantic_hash(&node))?;
    Ok(EXIT_OK)
}

fn cmd_check(
    canonicalizer: &Canonicalizer,
    file_a: &Path,
    file_b: &Path,
    json: bool,
    quiet: bool,
) -> Result<i32> {
    let a = read_node(Some(file_a))?;
    let b = read_node(Some(file_b))?;
    let equivalent = canonicalizer.equivalent(&a, &b);

    if json {
        let report = serde_json::json!({
            "equivalent": equivalent,
            "hash_a": canonicalizer.semantic_hash(&a),
            "hash_b": canonicalizer.semantic_hash(&b),
        });
        write_line(&serde_json::to_string_pretty(&report)?)?;
    } else if !quiet {
        if equivalent {
            println!(
                "{} {} and {} are canonically equivalent",
                "✓".green(),
                file_a.display(),
                file_b.display()
            );
        } else {
            println!(
                "{} {} and {} differ",
                "✗".red(),
                file_a.display(),
                file_b.display()
            );
        }
    }

    Ok(if equivalent { EXIT_OK } else { EXIT_MISMATCH })
}

// ── Helpers ───────────────────────────────────────────────

fn input_label(file: Option<&Path>) -> String {
    file.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string())
}

fn open_input(file: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match file {
        Some(path) => {
            let f = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            Ok(Box::new(BufReader::new(f)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn read_node(file: Option<&Path>) -> Result<Node> {
    let label = input_label(file);
    let node = Node::from_reader(open_input(file)?).with_context(|| format!("reading {}", label))?;
    info!(input = %label, shape = node.kind_name(), "read document");
    Ok(node)
}

fn write_line(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    stdout.flush()?;
    Ok(())
}

fn report_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "error:".red().bold(), err);
}
