//! Reconcile map-extract rows with the stored gazetteer records.
//!
//! Every input file is reconciled by its own worker, rows strictly in file
//! order. Workers share the store, the id generator and the search index.

mod reader;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use larch::config::Config;
use larch::discord::DiscordWebhook;
use larch::elasticsearch::{
    ensure_index, BulkIndexer, EsCandidateSearch, EsClient, EsIndexMirror,
};
use larch::engine::{Capabilities, ReconciliationEngine, RunSummary};
use larch::ids::SledIdGenerator;
use larch::labels::DefaultLabelGenerator;
use larch::store::{FeatureStore, IndexedStore, SledStore};

#[derive(Parser, Debug)]
#[command(name = "reconcile")]
#[command(about = "Reconcile map-extract rows with gazetteer records")]
struct Args {
    /// Tab-separated input files (.tsv or .tsv.gz)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Elasticsearch URL
    #[arg(long)]
    es_url: Option<String>,

    /// Elasticsearch index name
    #[arg(long)]
    index: Option<String>,

    /// Sled database holding the records
    #[arg(long)]
    store_path: Option<PathBuf>,

    /// Drop and recreate the feature index before the run
    #[arg(long)]
    create_index: bool,

    /// Rows between store flushes
    #[arg(long)]
    batch_size: Option<usize>,

    /// Files reconciled at the same time
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Query the index but write into a throw-away store
    #[arg(long)]
    dry_run: bool,

    /// Discord webhook URL for notifications (optional)
    #[arg(long)]
    discord_webhook: Option<String>,
}

impl Args {
    /// Command line flags win over the configuration file.
    fn apply_to(&self, config: &mut Config) {
        if let Some(es_url) = &self.es_url {
            config.search.es_url = es_url.clone();
        }
        if let Some(index) = &self.index {
            config.search.index = index.clone();
        }
        if let Some(path) = &self.store_path {
            config.store.path = path.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.engine.batch_size = batch_size.max(1);
        }
        if self.discord_webhook.is_some() {
            config.notify.discord_webhook = self.discord_webhook.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    args.apply_to(&mut config);

    let run_id = Uuid::new_v4();
    info!("Larch reconciliation run {}", run_id);
    info!("{} input file(s)", args.files.len());

    let es_client = EsClient::connect(&config.search)?;
    if !es_client.health_check().await? {
        anyhow::bail!("Elasticsearch cluster is not healthy");
    }
    info!("Connected to Elasticsearch");

    if !args.dry_run {
        ensure_index(&es_client, args.create_index).await?;
    }

    let discord = config
        .notify
        .discord_webhook
        .as_ref()
        .map(|url| DiscordWebhook::new(url.clone()));
    if let Some(ref dw) = discord {
        let _ = dw
            .send_notification(
                "Reconciliation Started",
                &format!("Run `{}` over **{}** file(s)", run_id, args.files.len()),
                true,
            )
            .await;
    }

    // keeps the throw-away store alive until the end of a dry run
    let scratch = if args.dry_run {
        let dir = tempfile::tempdir().context("Failed to create dry-run directory")?;
        info!("Dry run, writing into {}", dir.path().display());
        Some(dir)
    } else {
        None
    };
    let store_path = scratch
        .as_ref()
        .map(|dir| dir.path().to_path_buf())
        .unwrap_or_else(|| config.store.path.clone());

    let sled_store = SledStore::open(&store_path, config.engine.limits())
        .with_context(|| format!("Failed to open store {}", store_path.display()))?;
    let ids = Arc::new(SledIdGenerator::new(
        sled_store.db().clone(),
        config.store.id_offset,
    ));

    let mirror = (!args.dry_run).then(|| {
        Arc::new(EsIndexMirror::new(BulkIndexer::new(
            es_client.clone(),
            config.engine.batch_size,
        )))
    });
    let sled_store = Arc::new(sled_store);
    let indexed = mirror
        .as_ref()
        .map(|mirror| Arc::new(IndexedStore::new(sled_store.clone(), mirror.clone())));
    let store: Arc<dyn FeatureStore> = match &indexed {
        Some(indexed) => indexed.clone(),
        None => sled_store,
    };

    let caps = Capabilities {
        ids,
        store: store.clone(),
        search: Arc::new(EsCandidateSearch::new(
            es_client.clone(),
            config.search.es_score_scale,
        )),
        detector: Arc::new(config.municipality.clone()),
        labels: Arc::new(DefaultLabelGenerator),
        policy: Arc::new(config.levels.clone()),
    };

    let multi = MultiProgress::new();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {prefix}: {pos} rows ({per_sec}) {msg}")?;
    let semaphore = Arc::new(Semaphore::new(args.workers.max(1)));

    let mut handles = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(style.clone());
        pb.set_prefix(file_label(path));

        let engine = ReconciliationEngine::new(caps.clone(), &config.engine, &config.search);
        let semaphore = semaphore.clone();
        let path = path.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            reconcile_file(engine, &path, pb).await
        }));
    }

    let mut total = RunSummary::default();
    let mut failed_files = 0;
    let results = futures::future::join_all(handles).await;
    for (result, path) in results.into_iter().zip(&args.files) {
        match result {
            Ok(Ok(summary)) => total.merge(&summary),
            Ok(Err(e)) => {
                failed_files += 1;
                error!("Failed to reconcile {}: {:#}", path.display(), e);
            }
            Err(e) => {
                failed_files += 1;
                error!("Worker for {} panicked: {}", path.display(), e);
            }
        }
    }

    store.flush().await.context("Final store flush failed")?;
    if let (Some(mirror), Some(indexed_store)) = (&mirror, &indexed) {
        let (indexed, deleted, errors) = mirror.stats().await;
        info!(
            "Index updates: {} indexed, {} deleted, {} errors",
            indexed, deleted, errors
        );
        if indexed_store.mirror_errors() > 0 {
            warn!(
                "{} index updates failed, the index is behind the store",
                indexed_store.mirror_errors()
            );
        }
        let pending = mirror.pending().await;
        if pending > 0 {
            error!("{} index operations could not be sent", pending);
        }
        es_client.refresh().await?;
        info!(
            "Index {} holds {} documents",
            es_client.index(),
            es_client.doc_count().await?
        );
    }

    info!("Run {} complete: {}", run_id, total);
    if failed_files > 0 {
        warn!("{} file(s) could not be reconciled", failed_files);
    }

    if let Some(ref dw) = discord {
        let _ = dw
            .send_summary(&format!("Reconciliation Finished ({})", run_id), &total)
            .await;
    }

    drop(scratch);
    Ok(())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.tsv")
        .to_string()
}

/// Feed every row of one file to its engine, in order.
async fn reconcile_file(
    mut engine: ReconciliationEngine,
    path: &Path,
    pb: ProgressBar,
) -> Result<RunSummary> {
    info!("Reconciling {}", path.display());
    let mut rows = reader::open_rows(path)?;
    let mut record = csv::StringRecord::new();

    loop {
        match rows.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if e.is_io_error() => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
            Err(e) => {
                warn!("Unreadable row in {}: {}", path.display(), e);
                continue;
            }
        }
        let fields: Vec<&str> = record.iter().collect();
        engine.process_fields(&fields).await;
        pb.inc(1);
    }

    let summary = engine.finish().await?;
    pb.finish_with_message(summary.to_string());
    info!("{}: {}", path.display(), summary);
    Ok(summary)
}
