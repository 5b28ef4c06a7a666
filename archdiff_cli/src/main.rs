use anyhow::Context;
use archdiff_common::{load_options, CompareOptions};
use archdiff_core::{check, BodyMode, DiffEngine, NameCache, Reporter, TreeBuilder};
use clap::Parser;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "archdiff")]
#[command(author = "archdiff Contributors")]
#[command(version)]
#[command(about = "Compare file metadata between directories and archives", long_about = None)]
struct Cli {
    /// Source container (directory, .tar, .tar.gz/.tgz, .tar.xz, .zip, .7z or .rpm)
    source: PathBuf,

    /// Target container
    target: PathBuf,

    /// Only compare directories
    #[arg(short = 'd', long, conflicts_with = "files_only")]
    dirs_only: bool,

    /// Only compare files and symlinks
    #[arg(short = 'f', long)]
    files_only: bool,

    /// Only compare permissions and the sticky bit
    #[arg(short = 'p', long, conflicts_with = "owner_only")]
    perm_only: bool,

    /// Only compare owner, group, uid and gid
    #[arg(short = 'o', long)]
    owner_only: bool,

    /// Only keep paths matching this regex
    #[arg(short = 'i', long, value_name = "REGEX")]
    include: Option<String>,

    /// Drop paths matching this regex
    #[arg(short = 'e', long, value_name = "REGEX")]
    exclude: Option<String>,

    /// Remove every match of this regex from paths before comparing
    #[arg(short = 'c', long, value_name = "REGEX")]
    cut: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Do not read file bodies inside archives
    #[arg(long)]
    skip_bodies: bool,

    /// Read options from this TOML file instead of the per-user config
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn options(&self) -> CompareOptions {
        CompareOptions {
            dirs_only: self.dirs_only,
            files_only: self.files_only,
            perm_only: self.perm_only,
            owner_only: self.owner_only,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            cut: self.cut.clone(),
        }
    }

    fn body_mode(&self) -> BodyMode {
        if self.skip_bodies {
            BodyMode::Skip
        } else {
            BodyMode::Buffer
        }
    }
}

fn main() {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let options = load_options(cli.config.as_deref())
        .context("failed to load configuration")?
        .merge(cli.options());
    let config = options.validate()?;

    // Reject unsupported inputs before any walking starts
    check(&cli.source)?;
    check(&cli.target)?;

    info!("Comparing {} -> {}", cli.source.display(), cli.target.display());

    let equivalence = config.equivalence;
    let builder =
        TreeBuilder::new(config, Arc::new(NameCache::new())).with_body_mode(cli.body_mode());
    let (source, target) = builder.build_pair(&cli.source, &cli.target)?;

    let result = DiffEngine::new(equivalence).compare(&source, &target);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if cli.json {
        Reporter::write_json(&mut out, &result, &cli.source, &cli.target)?;
    } else {
        Reporter::write_text(&mut out, &result, &cli.source, &cli.target)?;
    }
    out.flush()?;

    Ok(())
}
