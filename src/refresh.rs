// Refresh pipeline (the uploader)
//
// fetch hot links -> replace the candidate set -> wait for popular-link
// broadcasts. The first error aborts the remaining steps. Count mismatches
// are logged as anomalies and never change control flow.

use crate::error::RefreshError;
use crate::notify::Notifier;
use crate::popular::{BroadcastSummary, PopularityRegistrar};
use crate::ranking::RankingFetcher;
use crate::store::{LinkStore, ReplaceReport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of one completed refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub links: Vec<String>,
    pub replace: ReplaceReport,
    pub broadcasts: BroadcastSummary,
}

/// Run one refresh cycle against `store`.
///
/// The candidate set is replaced with delete-then-insert, which is not
/// atomic: the webhook server may pick from an empty or partial set while
/// the replacement is in flight.
pub async fn run_refresh(
    fetcher: &RankingFetcher,
    store: &LinkStore,
    notifier: Arc<dyn Notifier>,
    broadcast_delay: Duration,
) -> Result<RefreshReport, RefreshError> {
    let target_count = fetcher.target_count();
    info!(target_count, key = %store.keys().candidates, "Refreshing hot links");

    let mut registrar = PopularityRegistrar::new(store.clone(), notifier, broadcast_delay);

    let links = match fetcher.fetch(&mut registrar).await {
        Ok(links) => links,
        Err(e) => {
            // Broadcasts already scheduled for this cycle still go out
            registrar.finish().await;
            return Err(e.into());
        }
    };

    if links.len() != target_count {
        warn!(
            got = links.len(),
            expected = target_count,
            "Installing a candidate set of unexpected size"
        );
    }

    let replace = match store.replace_candidates(&links).await {
        Ok(replace) => replace,
        Err(e) => {
            registrar.finish().await;
            return Err(e);
        }
    };
    log_replace(&replace, links.len());

    let broadcasts = registrar.finish().await;
    info!(
        sent = broadcasts.sent,
        failed = broadcasts.failed,
        "Popular link broadcasts done"
    );

    Ok(RefreshReport {
        links,
        replace,
        broadcasts,
    })
}

fn log_replace(report: &ReplaceReport, expected: usize) {
    info!(
        deleted = report.deleted,
        added = report.added,
        cardinality = report.cardinality,
        "Replaced candidate set"
    );

    if report.deleted != 1 {
        warn!(deleted = report.deleted, "Delete did not remove exactly one key");
    }
    if report.added != expected {
        warn!(
            added = report.added,
            expected,
            "Insert added an unexpected number of links"
        );
    }
    if report.cardinality != expected {
        warn!(
            cardinality = report.cardinality,
            expected,
            "Candidate set size differs from the installed batch"
        );
    }
}
