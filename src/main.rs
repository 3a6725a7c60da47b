//! code-index CLI - incremental code indexing and hybrid search.

mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use code_index::application::{
    parse_range, DiffSource, HybridIndex, HybridRanker, IncrementalIndexer, RankingConfig,
    SearchUseCase, SymbolIndex,
};
use code_index::connector::embedding::{
    HardwareSnapshot, MockEmbeddingProvider, OrtEmbeddingProvider, UnavailableEmbeddingProvider,
};
use code_index::connector::parser::{FileAnalyzer, GrammarRegistry};
use code_index::connector::store::{AstStore, IndexStore};
use code_index::connector::GitDiffSource;
use code_index::application::EmbeddingProvider;
use code_index::domain::{IndexError, ProjectLayout};

use cli::{doctor, hooks, Commands, HooksAction};

/// code-index - incremental repository indexing with hybrid search
#[derive(Parser)]
#[command(name = "code-index")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

const EXIT_OK: u8 = 0;
const EXIT_PARTIAL: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let layout = ProjectLayout::new(
        cli.project
            .canonicalize()
            .unwrap_or_else(|_| cli.project.clone()),
    );

    let _log_guard = setup_logging(&layout, cli.verbose);

    match run(cli.command, layout).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            let code = match e.downcast_ref::<IndexError>() {
                Some(err) if err.is_fatal() => EXIT_FATAL,
                Some(_) => EXIT_PARTIAL,
                None => EXIT_FATAL,
            };
            ExitCode::from(code)
        }
    }
}

/// Stderr logging, plus an append-only file layer once the state directory
/// exists.
fn setup_logging(
    layout: &ProjectLayout,
    verbose: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,code_index={}", level)));

    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if layout.logs_dir().is_dir() {
        let appender = tracing_appender::rolling::never(layout.logs_dir(), "code-index.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        None
    }
}

fn build_provider(snapshot: &HardwareSnapshot) -> Arc<dyn EmbeddingProvider> {
    if std::env::var("CODE_INDEX_MOCK_EMBEDDINGS").is_ok() {
        return Arc::new(MockEmbeddingProvider::new());
    }

    match OrtEmbeddingProvider::for_profile(snapshot.profile) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            warn!("Embedding provider unavailable, lexical search only: {}", e);
            // The light profile's dimension keeps the store schema stable
            // until the provider loads again.
            Arc::new(UnavailableEmbeddingProvider::new(e.to_string(), 384))
        }
    }
}

struct App {
    layout: ProjectLayout,
    indexer: IncrementalIndexer,
    hybrid: Arc<HybridIndex>,
    symbol_index: Arc<SymbolIndex>,
}

impl App {
    async fn open(layout: ProjectLayout, show_progress: bool) -> Result<Self> {
        Self::open_with_batch_size(layout, show_progress, None).await
    }

    async fn open_with_batch_size(
        layout: ProjectLayout,
        show_progress: bool,
        batch_size: Option<usize>,
    ) -> Result<Self> {
        if !layout.is_initialized() {
            anyhow::bail!(
                "{} is not initialized; run `code-index init` first",
                layout.root().display()
            );
        }

        let snapshot = HardwareSnapshot::read_or_detect(&layout.config_path());
        let provider = build_provider(&snapshot);
        let store = Arc::new(IndexStore::open(&layout.db_path(), provider.dim()).await?);
        let ast_store = Arc::new(AstStore::new(layout.ast_dir()));
        let symbol_index = Arc::new(SymbolIndex::new());
        let hybrid = Arc::new(HybridIndex::new(
            store.clone(),
            provider,
            batch_size.unwrap_or_else(|| snapshot.profile.batch_size()),
        ));
        let analyzer = Arc::new(FileAnalyzer::new(Arc::new(GrammarRegistry::new())));
        let indexer = IncrementalIndexer::new(
            layout.clone(),
            store.clone(),
            ast_store,
            symbol_index.clone(),
            hybrid.clone(),
            analyzer,
        )
        .with_progress(show_progress);

        Ok(Self {
            layout,
            indexer,
            hybrid,
            symbol_index,
        })
    }
}

async fn run(command: Commands, layout: ProjectLayout) -> Result<u8> {
    match command {
        Commands::Init { force } => {
            if layout.is_initialized() && !force {
                println!(
                    "{} is already initialized (use --force to recreate)",
                    layout.root().display()
                );
                return Ok(EXIT_PARTIAL);
            }

            layout.ensure_dirs()?;
            let snapshot = HardwareSnapshot::detect();
            snapshot.write_to(&layout.config_path())?;

            // Create the store and bring the schema to the current version.
            let dim = 384;
            IndexStore::open(&layout.db_path(), dim).await?;

            println!(
                "Initialized {} (profile: {})",
                layout.state_dir().display(),
                snapshot.profile.as_str()
            );
            Ok(EXIT_OK)
        }

        Commands::Index { batch_size } => {
            let app = App::open_with_batch_size(layout, true, Some(batch_size)).await?;
            let outcome = app.indexer.full_index().await?;
            println!(
                "Indexed {} files ({} skipped, {} errors, {:.1} files/s)",
                outcome.files_added,
                outcome.files_skipped,
                outcome.errors.len(),
                outcome.per_second
            );
            Ok(if outcome.errors.is_empty() {
                EXIT_OK
            } else {
                EXIT_PARTIAL
            })
        }

        Commands::Refresh {
            changed,
            git_range,
            dry_run,
        } => {
            let app = App::open(layout, false).await?;

            let diff = if let Some(range) = git_range.as_deref() {
                let range = parse_range(range)
                    .ok_or_else(|| IndexError::InvalidRef(range.to_string()))?;
                let source = GitDiffSource::open(app.layout.root())?;
                source.range_changes(&range.from, &range.to)?
            } else if changed {
                let source = GitDiffSource::open(app.layout.root())?;
                source.last_commit_changes()?
            } else {
                None
            };

            if dry_run {
                let plan = match &diff {
                    Some(diff) => app.indexer.plan_diff(diff),
                    None => app.indexer.plan_mtime().await?,
                };
                for op in plan {
                    println!("{:?}", op);
                }
                return Ok(EXIT_OK);
            }

            let outcome = match diff {
                Some(diff) => app.indexer.refresh_diff(&diff).await?,
                None if changed || git_range.is_some() => {
                    println!("No changes in the requested range.");
                    return Ok(EXIT_OK);
                }
                None => app.indexer.refresh_mtime().await?,
            };

            println!(
                "Refresh: +{} ~{} -{} ({} skipped, {} errors)",
                outcome.files_added,
                outcome.files_updated,
                outcome.files_deleted,
                outcome.files_skipped,
                outcome.errors.len()
            );
            Ok(if outcome.errors.is_empty() {
                EXIT_OK
            } else {
                EXIT_PARTIAL
            })
        }

        Commands::Search {
            query,
            limit,
            sla_ms,
            dense_weight,
            sparse_weight,
            json,
        } => {
            let app = App::open(layout, false).await?;
            app.indexer.hydrate_symbol_index()?;

            let ranker = Arc::new(HybridRanker::new(RankingConfig::load_or_default(
                &app.layout.ranking_config_path(),
            )));
            let use_case = SearchUseCase::new(
                app.hybrid.clone(),
                ranker,
                app.symbol_index.clone(),
            );

            let response = use_case
                .execute_weighted(&query, limit, sla_ms, dense_weight, sparse_weight)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else if response.results.is_empty() {
                println!("No results.");
            } else {
                for (i, result) in response.results.iter().enumerate() {
                    println!(
                        "{}. {}:{} (score: {:.4})",
                        i + 1,
                        result.file_path,
                        result.line_number,
                        result.final_score
                    );
                    if let Some(name) = &result.symbol_name {
                        println!("   {}", name);
                    }
                    for line in result.snippet.lines().take(3) {
                        println!("   | {}", line);
                    }
                }
                if let Some(mode) = response.fallback_mode {
                    println!("(fallback: {:?})", mode);
                }
                info!(
                    "query took {}ms (sla violation: {})",
                    response.timings.total_time_ms, response.sla_violation
                );
            }
            Ok(EXIT_OK)
        }

        Commands::Symbol {
            name,
            mode,
            limit,
            max_distance,
            json,
        } => {
            let app = App::open(layout, false).await?;
            app.indexer.hydrate_symbol_index()?;

            let entries = match mode.as_str() {
                "prefix" => app.symbol_index.prefix(&name, limit),
                "substring" => app.symbol_index.substring(&name, limit),
                "fuzzy" => app.symbol_index.fuzzy(&name, max_distance, limit),
                _ => app.symbol_index.exact(&name),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No symbols matched '{}'.", name);
            } else {
                for entry in &entries {
                    println!(
                        "{} {}:{}:{} ({})",
                        entry.name,
                        entry.file_path,
                        entry.line,
                        entry.column,
                        entry.kind
                    );
                }
            }
            Ok(EXIT_OK)
        }

        Commands::Doctor { fix, json } => {
            // All current profiles share the 384-dim model family.
            let report = doctor::run(&layout, 384, fix).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for check in &report.checks {
                    let mark = if check.ok { "ok " } else { "FAIL" };
                    let fixed = if check.fixed { " (fixed)" } else { "" };
                    println!("[{}] {}: {}{}", mark, check.name, check.detail, fixed);
                }
            }
            Ok(if report.success { EXIT_OK } else { EXIT_PARTIAL })
        }

        Commands::Hooks { action } => {
            let default_hooks: Vec<String> =
                hooks::DEFAULT_HOOKS.iter().map(|s| s.to_string()).collect();
            match action {
                HooksAction::Install { hooks: which, force } => {
                    let which = which.unwrap_or(default_hooks);
                    let statuses = hooks::install(layout.root(), &which, force)?;
                    for status in statuses {
                        println!("installed {} -> {}", status.hook, status.path);
                    }
                }
                HooksAction::Uninstall { hooks: which } => {
                    let which = which.unwrap_or(default_hooks);
                    hooks::uninstall(layout.root(), &which)?;
                    println!("hooks removed");
                }
                HooksAction::Status => {
                    for status in hooks::status(layout.root(), &default_hooks) {
                        println!(
                            "{}: {}",
                            status.hook,
                            if status.installed { "installed" } else { "absent" }
                        );
                    }
                }
            }
            Ok(EXIT_OK)
        }

        Commands::Uninstall { yes } => {
            if !yes {
                println!(
                    "This removes {} and installed hooks. Re-run with --yes to confirm.",
                    layout.state_dir().display()
                );
                return Ok(EXIT_PARTIAL);
            }

            let default_hooks: Vec<String> =
                hooks::DEFAULT_HOOKS.iter().map(|s| s.to_string()).collect();
            // Hook removal is best-effort; a missing .git is fine.
            let _ = hooks::uninstall(layout.root(), &default_hooks);

            if layout.state_dir().exists() {
                std::fs::remove_dir_all(layout.state_dir())?;
            }
            println!("Removed {}", layout.state_dir().display());
            Ok(EXIT_OK)
        }
    }
}
