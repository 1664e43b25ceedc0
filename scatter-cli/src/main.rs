use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSetBuilder};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use scatter_core::audit;
use scatter_core::config::ScatterConfig;
use scatter_core::placement::{ChunkPlacer, RetrieveOutcome};

#[derive(Parser)]
#[command(
    name = "scatter",
    version,
    about = "Split files into chunks spread round-robin over storage nodes"
)]
struct Cli {
    /// JSON config file (nodes, metadata_path, chunk_size)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Storage node directory; repeat for each node (overrides the config)
    #[arg(long = "node", global = true)]
    nodes: Vec<PathBuf>,
    /// Metadata document path
    #[arg(long, global = true)]
    metadata: Option<PathBuf>,
    /// Chunk size in bytes, K/M/G suffixes accepted
    #[arg(long, global = true, value_parser = parse_size)]
    chunk_size: Option<usize>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Split files and distribute their chunks across the nodes
    Store {
        #[arg(long)]
        include: Vec<String>,
        #[arg(long)]
        exclude: Vec<String>,
        /// Store a single file under this name instead of its base name
        #[arg(long = "as")]
        name: Option<String>,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Reassemble a stored file
    Retrieve { name: String, output: PathBuf },
    /// List stored file names
    List,
    /// Check that every chunk of a stored file is present
    Check { name: String },
    /// Print the metadata entry of a stored file
    Show { name: String },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cfg = resolve_config(&cli)?;
    let mut placer = ChunkPlacer::from_config(&cfg).context("open storage nodes")?;
    tracing::info!(
        nodes = placer.nodes().len(),
        chunk_size = placer.chunk_size(),
        metadata = %placer.metadata().path().display(),
        "opened storage"
    );
    match cli.cmd {
        Cmd::Store { include, exclude, name, inputs } => {
            store(&mut placer, &inputs, &include, &exclude, name.as_deref())?
        }
        Cmd::Retrieve { name, output } => return Ok(retrieve(&placer, &name, &output)),
        Cmd::List => {
            for name in placer.list_files() {
                println!("{}", name);
            }
        }
        Cmd::Check { name } => return check(&placer, &name),
        Cmd::Show { name } => {
            let entry = placer
                .entry(&name)
                .ok_or_else(|| anyhow!("File '{}' not found in metadata.", name))?;
            println!("{}", serde_json::to_string_pretty(entry)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn resolve_config(cli: &Cli) -> Result<ScatterConfig> {
    let mut cfg = match &cli.config {
        Some(p) => ScatterConfig::from_json_file(p)?,
        None => ScatterConfig::default(),
    };
    if !cli.nodes.is_empty() {
        cfg.nodes = cli.nodes.clone();
    }
    if let Some(m) = &cli.metadata {
        cfg.metadata_path = m.clone();
    }
    if let Some(cs) = cli.chunk_size {
        cfg.chunk_size = cs;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn store(
    placer: &mut ChunkPlacer,
    inputs: &[PathBuf],
    includes: &[String],
    excludes: &[String],
    name: Option<&str>,
) -> Result<()> {
    if let Some(name) = name {
        let [input] = inputs else { bail!("--as takes exactly one input file") };
        if !input.is_file() {
            bail!("--as requires a file, got {}", input.display());
        }
        let report = placer.store_as(input, name)?;
        println!("Stored file '{}' in {} chunks.", report.name, report.chunks);
        return Ok(());
    }
    let (inc, exc) = build_globset(includes, excludes)?;
    let paths = list_inputs(inputs, &inc, &exc)?;
    tracing::debug!(files = paths.len(), "resolved store inputs");
    check_unique_names(&paths)?;
    for path in paths {
        let report = placer.store(&path).with_context(|| format!("store {}", path.display()))?;
        println!("Stored file '{}' in {} chunks.", report.name, report.chunks);
    }
    Ok(())
}

/// Files are keyed by base name, so two inputs sharing one would overwrite
/// each other. Refuse the whole batch before anything is written.
fn check_unique_names(paths: &[PathBuf]) -> Result<()> {
    let mut by_name: BTreeMap<String, Vec<&Path>> = BTreeMap::new();
    for p in paths {
        let name = p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        by_name.entry(name).or_default().push(p.as_path());
    }
    let clashes: Vec<String> = by_name
        .iter()
        .filter(|(_, ps)| ps.len() > 1)
        .map(|(name, ps)| {
            let list: Vec<String> = ps.iter().map(|p| p.display().to_string()).collect();
            format!("'{}' from {}", name, list.join(", "))
        })
        .collect();
    if !clashes.is_empty() {
        bail!(
            "inputs share a stored name: {}; store them one at a time with --as",
            clashes.join("; ")
        );
    }
    Ok(())
}

fn retrieve(placer: &ChunkPlacer, name: &str, output: &Path) -> ExitCode {
    match placer.retrieve(name, output) {
        RetrieveOutcome::Retrieved { .. } => {
            println!("Retrieved file '{}' to '{}'", name, output.display());
            ExitCode::SUCCESS
        }
        RetrieveOutcome::NotRegistered => {
            eprintln!("File '{}' not found in metadata.", name);
            ExitCode::FAILURE
        }
        other => {
            eprintln!("Failed to retrieve '{}': {}", name, other);
            ExitCode::FAILURE
        }
    }
}

fn check(placer: &ChunkPlacer, name: &str) -> Result<ExitCode> {
    let report = audit::check(placer, name)
        .ok_or_else(|| anyhow!("File '{}' not found in metadata.", name))?;
    if report.is_complete() {
        println!("OK {} ({} chunks, {} bytes)", report.name, report.chunks_present, report.size);
        return Ok(ExitCode::SUCCESS);
    }
    for rec in &report.missing {
        println!("MISSING {}", Path::new(&rec.node).join(&rec.chunk_name).display());
    }
    Ok(ExitCode::FAILURE)
}

fn build_globset(
    includes: &[String],
    excludes: &[String],
) -> Result<(globset::GlobSet, globset::GlobSet)> {
    let mut incb = GlobSetBuilder::new();
    let mut excb = GlobSetBuilder::new();
    if includes.is_empty() {
        incb.add(Glob::new("**/*")?);
    }
    for g in includes {
        incb.add(Glob::new(g)?);
    }
    for g in excludes {
        excb.add(Glob::new(g)?);
    }
    Ok((incb.build()?, excb.build()?))
}

/// Expand directories into their regular files; explicit file arguments are
/// taken as given. Glob filters apply to walked files only.
fn list_inputs(
    inputs: &[PathBuf],
    inc: &globset::GlobSet,
    exc: &globset::GlobSet,
) -> Result<Vec<PathBuf>> {
    let mut v = vec![];
    for p in inputs {
        let md = fs::metadata(p).with_context(|| format!("stat {}", p.display()))?;
        if md.is_dir() {
            let mut walked = vec![];
            for e in WalkDir::new(p).into_iter().filter_map(|e| e.ok()) {
                if !e.file_type().is_file() {
                    continue;
                }
                let rel = e.path().strip_prefix(p).unwrap_or(e.path());
                let rel = rel.to_string_lossy().replace('\\', "/");
                if inc.is_match(&rel) && !exc.is_match(&rel) {
                    walked.push(e.path().to_path_buf());
                }
            }
            walked.sort();
            v.extend(walked);
        } else {
            v.push(p.clone());
        }
    }
    Ok(v)
}

fn parse_size(spec: &str) -> Result<usize> {
    let s = spec.trim().to_uppercase();
    let (num, mul) = if let Some(n) = s.strip_suffix('K') {
        (n, 1usize << 10)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1 << 20)
    } else if let Some(n) = s.strip_suffix('G') {
        (n, 1 << 30)
    } else {
        (s.as_str(), 1)
    };
    let v: usize = num.trim().parse().map_err(|_| anyhow!("bad size {}", spec))?;
    let bytes = v.checked_mul(mul).ok_or_else(|| anyhow!("size too large {}", spec))?;
    if bytes == 0 {
        bail!("size must be non-zero");
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_accept_suffixes() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("64k").unwrap(), 64 * 1024);
        assert_eq!(parse_size("1M").unwrap(), 1 << 20);
        assert_eq!(parse_size("2G").unwrap(), 2 << 30);
        assert!(parse_size("0").is_err());
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
