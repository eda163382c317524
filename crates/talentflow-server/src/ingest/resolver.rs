//! Mapping resolution against the cache, heuristics and oracle
//!
//! Resolution order for a header set: cached mapping by signature, then
//! the deterministic synonym heuristics, then the configured oracle (only
//! when the heuristics mapped nothing at all), and finally the manual
//! workflow. Whatever succeeds is persisted so the same header layout is
//! never resolved twice.

use std::collections::BTreeMap;
use std::sync::Arc;

use talentflow_common::header_signature;
use talentflow_ingest::mapping::{self, CanonicalField};
use talentflow_ingest::oracle::MappingOracle;
use tracing::{debug, info, warn};

use crate::models::{HeaderMapping, MappingSource};
use crate::store::{MappingStore, StoreError};

/// What resolution produced for a header set.
#[derive(Debug, Clone)]
pub enum MappingOutcome {
    Resolved(HeaderMapping),
    /// Nothing could be mapped; the caller must collect explicit choices
    /// from the user and confirm them via [`MappingResolver::confirm`].
    NeedsManualMapping { headers: Vec<String> },
}

pub struct MappingResolver {
    mappings: Arc<dyn MappingStore>,
    oracle: Option<Arc<dyn MappingOracle>>,
}

impl MappingResolver {
    pub fn new(mappings: Arc<dyn MappingStore>, oracle: Option<Arc<dyn MappingOracle>>) -> Self {
        Self { mappings, oracle }
    }

    /// Resolve a header set, consulting the cache first.
    pub async fn resolve(&self, headers: &[String]) -> Result<MappingOutcome, StoreError> {
        let signature = header_signature(headers);

        if let Some(cached) = self.mappings.find_by_signature(&signature).await? {
            debug!(signature, "header mapping cache hit");
            return Ok(MappingOutcome::Resolved(rekey_to_headers(headers, cached)));
        }

        let resolution = mapping::resolve_headers(headers);
        if !resolution.is_fully_unmapped() {
            info!(
                signature,
                mapped = resolution.mapped_count(),
                total = headers.len(),
                "headers resolved heuristically"
            );
            let stored = self
                .mappings
                .upsert_mapping(
                    &signature,
                    headers,
                    &resolution.per_header,
                    MappingSource::Heuristic,
                )
                .await?;
            return Ok(MappingOutcome::Resolved(stored));
        }

        if let Some(oracle) = &self.oracle {
            match oracle.suggest_mapping(headers).await {
                Ok(suggested) => {
                    let suggested = align_to_headers(headers, suggested);
                    if suggested.values().any(|f| f.is_some()) {
                        info!(signature, "headers resolved by oracle");
                        let stored = self
                            .mappings
                            .upsert_mapping(&signature, headers, &suggested, MappingSource::Oracle)
                            .await?;
                        return Ok(MappingOutcome::Resolved(stored));
                    }
                    debug!(signature, "oracle mapped nothing");
                }
                Err(e) => {
                    warn!(signature, error = %e, "oracle unavailable, falling back");
                }
            }
        }

        Ok(MappingOutcome::NeedsManualMapping {
            headers: headers.to_vec(),
        })
    }

    /// Persist a user-confirmed mapping. Re-confirming the same headers
    /// overwrites the cache entry.
    pub async fn confirm(
        &self,
        headers: &[String],
        mapping: &BTreeMap<String, Option<CanonicalField>>,
    ) -> Result<HeaderMapping, StoreError> {
        let signature = header_signature(headers);
        self.mappings
            .upsert_mapping(&signature, headers, mapping, MappingSource::Manual)
            .await
    }
}

/// Re-key a cached mapping onto the incoming file's header spellings.
///
/// Signatures are computed over normalized headers, so a cache hit can
/// carry original strings that differ from the incoming ones in case or
/// whitespace. Row extraction matches headers literally, so the cached
/// per-header fields must be moved onto the spellings this file uses.
fn rekey_to_headers(headers: &[String], cached: HeaderMapping) -> HeaderMapping {
    let by_normalized: BTreeMap<String, Option<CanonicalField>> = cached
        .mapping
        .iter()
        .map(|(header, field)| (mapping::normalize_header(header), *field))
        .collect();

    let mapping = headers
        .iter()
        .map(|header| {
            let field = by_normalized
                .get(&mapping::normalize_header(header))
                .copied()
                .flatten();
            (header.clone(), field)
        })
        .collect();

    HeaderMapping { mapping, ..cached }
}

/// Constrain an oracle suggestion to the headers actually in the file and
/// fill in any the oracle skipped.
fn align_to_headers(
    headers: &[String],
    suggested: BTreeMap<String, Option<CanonicalField>>,
) -> BTreeMap<String, Option<CanonicalField>> {
    headers
        .iter()
        .map(|h| (h.clone(), suggested.get(h).copied().flatten()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use talentflow_ingest::oracle::OracleError;

    use crate::store::Stores;

    struct FixedOracle {
        mapping: BTreeMap<String, Option<CanonicalField>>,
    }

    #[async_trait]
    impl MappingOracle for FixedOracle {
        async fn suggest_mapping(
            &self,
            _headers: &[String],
        ) -> Result<BTreeMap<String, Option<CanonicalField>>, OracleError> {
            Ok(self.mapping.clone())
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl MappingOracle for FailingOracle {
        async fn suggest_mapping(
            &self,
            _headers: &[String],
        ) -> Result<BTreeMap<String, Option<CanonicalField>>, OracleError> {
            Err(OracleError::RetriesExhausted(3))
        }
    }

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_heuristic_resolution_is_cached() {
        let stores = Stores::in_memory();
        let resolver = MappingResolver::new(stores.mappings.clone(), None);

        let outcome = resolver
            .resolve(&headers(&["Email", "Phone"]))
            .await
            .unwrap();
        let MappingOutcome::Resolved(stored) = outcome else {
            panic!("expected resolution");
        };
        assert_eq!(stored.source, MappingSource::Heuristic);

        // A second file with the same headers in another order hits the
        // cache instead of re-resolving.
        let outcome = resolver
            .resolve(&headers(&["Phone", "Email"]))
            .await
            .unwrap();
        let MappingOutcome::Resolved(cached) = outcome else {
            panic!("expected cache hit");
        };
        assert_eq!(cached.id, stored.id);
    }

    #[tokio::test]
    async fn test_cache_hit_rekeys_onto_incoming_spellings() {
        let stores = Stores::in_memory();
        let resolver = MappingResolver::new(stores.mappings.clone(), None);

        let mut confirmed = BTreeMap::new();
        confirmed.insert("Col A".to_string(), Some(CanonicalField::Phone));
        let stored = resolver
            .confirm(&headers(&["Col A"]), &confirmed)
            .await
            .unwrap();

        // Same signature, different spelling: the cached field must come
        // back keyed by the header string this file actually uses.
        let outcome = resolver.resolve(&headers(&["COL A"])).await.unwrap();
        let MappingOutcome::Resolved(cached) = outcome else {
            panic!("expected cache hit");
        };
        assert_eq!(cached.id, stored.id);
        assert_eq!(cached.mapping["COL A"], Some(CanonicalField::Phone));
        assert!(!cached.mapping.contains_key("Col A"));
    }

    #[tokio::test]
    async fn test_oracle_consulted_only_when_fully_unmapped() {
        let stores = Stores::in_memory();
        let mut suggestion = BTreeMap::new();
        suggestion.insert("Col A".to_string(), Some(CanonicalField::Email));
        let resolver = MappingResolver::new(
            stores.mappings.clone(),
            Some(Arc::new(FixedOracle {
                mapping: suggestion,
            })),
        );

        let outcome = resolver
            .resolve(&headers(&["Col A", "Col B"]))
            .await
            .unwrap();
        let MappingOutcome::Resolved(stored) = outcome else {
            panic!("expected oracle resolution");
        };
        assert_eq!(stored.source, MappingSource::Oracle);
        assert_eq!(stored.mapping["Col A"], Some(CanonicalField::Email));
        assert_eq!(stored.mapping["Col B"], None);
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_back_to_manual() {
        let stores = Stores::in_memory();
        let resolver =
            MappingResolver::new(stores.mappings.clone(), Some(Arc::new(FailingOracle)));

        let outcome = resolver
            .resolve(&headers(&["Col A", "Col B"]))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            MappingOutcome::NeedsManualMapping { ref headers } if headers.len() == 2
        ));
    }

    #[tokio::test]
    async fn test_confirm_overwrites() {
        let stores = Stores::in_memory();
        let resolver = MappingResolver::new(stores.mappings.clone(), None);
        let hs = headers(&["Col A"]);

        let mut first = BTreeMap::new();
        first.insert("Col A".to_string(), Some(CanonicalField::Phone));
        let stored_first = resolver.confirm(&hs, &first).await.unwrap();

        let mut second = BTreeMap::new();
        second.insert("Col A".to_string(), Some(CanonicalField::Email));
        let stored_second = resolver.confirm(&hs, &second).await.unwrap();

        assert_eq!(stored_first.id, stored_second.id);
        let outcome = resolver.resolve(&hs).await.unwrap();
        let MappingOutcome::Resolved(cached) = outcome else {
            panic!("expected cache hit");
        };
        assert_eq!(cached.mapping["Col A"], Some(CanonicalField::Email));
    }
}
