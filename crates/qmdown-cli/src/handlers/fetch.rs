//! `qmdown fetch`: resolve every manifest song to its best available
//! quality and download the results.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use qmdown_core::download::BatchSummary;
use qmdown_core::ports::{HttpClientPort, NoopProgressSink, ProgressSinkPort};
use qmdown_download::{
    CachedUrlLookup, DownloadEngine, QualityResolver, TerminalProgressSink, plan_target,
};
use qmdown_http::{HttpClientConfig, ReqwestHttpClient};

use crate::commands::FetchArgs;
use crate::error::CliError;
use crate::manifest::{Manifest, ManifestLookup};

/// Outcome of one fetch run.
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// Engine summary for the downloads that were attempted.
    pub summary: BatchSummary,
    /// Songs with no URL at any tier.
    pub unresolved: Vec<String>,
    /// Distinct songs in the manifest.
    pub total: usize,
}

impl FetchReport {
    /// Songs that did not end up on disk.
    pub fn missing(&self) -> usize {
        self.summary.failed.len() + self.unresolved.len()
    }
}

/// Execute the fetch command with the production adapters.
pub async fn execute(args: FetchArgs) -> Result<(), CliError> {
    let http_config =
        HttpClientConfig::default().with_connect_timeout(Duration::from_secs(args.timeout));
    let http = Arc::new(ReqwestHttpClient::new(&http_config)?);
    let sink: Arc<dyn ProgressSinkPort> = if args.no_progress {
        Arc::new(NoopProgressSink)
    } else {
        Arc::new(TerminalProgressSink::new())
    };

    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let report = run_fetch(&args, http, sink, interrupted).await?;
    print_report(&report);

    match report.missing() {
        0 => Ok(()),
        failed => Err(CliError::PartialFailure {
            failed,
            total: report.total,
        }),
    }
}

/// Resolve and download everything in `args.manifest`.
///
/// When `shutdown` completes first, queued downloads are cancelled and the
/// ones already running finish their current attempt.
pub async fn run_fetch(
    args: &FetchArgs,
    http: Arc<dyn HttpClientPort>,
    sink: Arc<dyn ProgressSinkPort>,
    shutdown: impl Future<Output = ()>,
) -> Result<FetchReport, CliError> {
    let manifest = Manifest::load(&args.manifest)?;
    let ids = manifest.ids();

    let lookup = CachedUrlLookup::with_default_ttl(ManifestLookup::new(&manifest));
    let resolver = QualityResolver::new(Arc::new(lookup));
    let resolution = resolver.resolve(&ids, &args.tiers()).await;

    for mid in &resolution.unresolved {
        tracing::warn!(
            mid = %mid,
            name = manifest.name_of(mid).unwrap_or_default(),
            "No URL available at any quality"
        );
    }

    let engine = DownloadEngine::new(args.engine_config(), http, sink)?;
    for (mid, resolved) in &resolution.resolved {
        let name = manifest.name_of(mid).unwrap_or(mid);
        let target = plan_target(&engine.config().save_dir, name, &resolved.tier.extension);
        tracing::debug!(mid = %mid, tier = %resolved.tier, target = %target.display(), "Queueing");
        engine.enqueue(resolved.url.clone(), target).await;
    }
    let summary = tokio::select! {
        summary = engine.drain() => summary,
        () = shutdown => {
            tracing::warn!("Interrupted, cancelling remaining downloads");
            engine.cancel().await;
            engine.drain().await
        }
    };

    Ok(FetchReport {
        summary,
        total: resolution.resolved.len() + resolution.unresolved.len(),
        unresolved: resolution.unresolved,
    })
}

fn print_report(report: &FetchReport) {
    let summary = &report.summary;
    println!(
        "Downloaded {}, skipped {}, failed {}, unavailable {} ({} bytes)",
        summary.completed,
        summary.skipped,
        summary.failed.len(),
        report.unresolved.len(),
        summary.bytes_transferred
    );
    for failed in &summary.failed {
        eprintln!("  ✗ {}: {}", failed.target_path.display(), failed.error);
    }
}
