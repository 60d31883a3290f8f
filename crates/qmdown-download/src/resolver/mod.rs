//! Quality fallback resolution.
//!
//! Turns a set of song identifiers and a ranked list of quality tiers into
//! download URLs, asking the lookup port one tier at a time.
//!
//! # Rules
//!
//! 1. Tiers are walked head to tail, strictly sequentially; a tier's lookup
//!    only ever sees identifiers no earlier tier resolved.
//! 2. An identifier leaves the pending set the first time a tier returns a
//!    non-empty URL for it, and is never asked about again.
//! 3. A failed lookup call is logged and skipped; its identifiers carry
//!    forward unchanged to the next tier.
//! 4. The walk stops early once nothing is pending.
//!
//! Every input identifier ends up in exactly one of `resolved` or
//! `unresolved`.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use qmdown_core::download::QualityTier;
use qmdown_core::ports::UrlLookupPort;

/// A URL resolved at a specific tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    /// Download URL.
    pub url: String,
    /// The tier it was found at.
    pub tier: QualityTier,
}

/// What happened at one tier of the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierReport {
    /// The tier that was queried.
    pub tier: QualityTier,
    /// How many identifiers were still pending when it was queried.
    pub requested: usize,
    /// How many of them resolved.
    pub resolved: usize,
    /// Lookup failure, if the call itself failed.
    pub error: Option<String>,
}

/// Outcome of a full tier walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionResult {
    /// Resolved identifiers in input order of resolution.
    pub resolved: IndexMap<String, ResolvedUrl>,
    /// Identifiers no tier could resolve, in input order.
    pub unresolved: Vec<String>,
    /// One report per tier actually queried.
    pub tiers: Vec<TierReport>,
}

impl ResolutionResult {
    /// True when every identifier resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Look up the resolution for one identifier.
    pub fn get(&self, id: &str) -> Option<&ResolvedUrl> {
        self.resolved.get(id)
    }
}

/// Resolver bound to a lookup port.
pub struct QualityResolver {
    lookup: Arc<dyn UrlLookupPort>,
}

impl QualityResolver {
    /// Create a new resolver with the given lookup.
    pub fn new(lookup: Arc<dyn UrlLookupPort>) -> Self {
        Self { lookup }
    }

    /// Resolve `ids` against `tiers`, highest priority first.
    pub async fn resolve(&self, ids: &[String], tiers: &[QualityTier]) -> ResolutionResult {
        resolve(ids, tiers, self.lookup.as_ref()).await
    }
}

/// Walk `tiers` in order, resolving as many of `ids` as possible.
///
/// Duplicate identifiers are collapsed; the first occurrence fixes the
/// order.
pub async fn resolve(
    ids: &[String],
    tiers: &[QualityTier],
    lookup: &dyn UrlLookupPort,
) -> ResolutionResult {
    let mut pending: Vec<String> = ids
        .iter()
        .cloned()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect();
    let total = pending.len();
    let mut resolved = IndexMap::with_capacity(total);
    let mut reports = Vec::with_capacity(tiers.len());

    for tier in tiers {
        if pending.is_empty() {
            break;
        }

        let requested = pending.len();
        let mut urls = match lookup.lookup_urls(&pending, tier).await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!(
                    target: "qmdown.resolver",
                    tier = %tier,
                    pending = requested,
                    error = %e,
                    "URL lookup failed, trying next tier"
                );
                reports.push(TierReport {
                    tier: tier.clone(),
                    requested,
                    resolved: 0,
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        let mut still_pending = Vec::with_capacity(requested);
        let mut succeeded = 0;
        for id in std::mem::take(&mut pending) {
            match urls.remove(&id).flatten().filter(|url| !url.is_empty()) {
                Some(url) => {
                    resolved.insert(
                        id,
                        ResolvedUrl {
                            url,
                            tier: tier.clone(),
                        },
                    );
                    succeeded += 1;
                }
                None => still_pending.push(id),
            }
        }
        pending = still_pending;

        tracing::info!(
            target: "qmdown.resolver",
            tier = %tier,
            resolved = succeeded,
            remaining = pending.len(),
            "Resolved URLs at tier"
        );
        reports.push(TierReport {
            tier: tier.clone(),
            requested,
            resolved: succeeded,
            error: None,
        });
    }

    tracing::info!(
        target: "qmdown.resolver",
        resolved = resolved.len(),
        total,
        "URL resolution finished"
    );
    if !pending.is_empty() {
        tracing::warn!(
            target: "qmdown.resolver",
            unresolved = ?pending,
            "Some identifiers could not be resolved at any tier"
        );
    }

    ResolutionResult {
        resolved,
        unresolved: pending,
        tiers: reports,
    }
}
