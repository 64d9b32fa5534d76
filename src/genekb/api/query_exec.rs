use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::api::cache::{cache_key, CacheBackend, SearchCache};
use crate::api::facets::FacetSet;
use crate::api::gene_data;
use crate::api::search::search;
use crate::api::search_utils::{normalize_query, Pagination};
use crate::data_types::*;
use crate::db::{open_read_only, read_freshness};
use crate::types::{GeneId, TaxonId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearCacheOutcome {
    Cleared,
    Unauthorized,
}

/// Runs read queries against the gene database.  Every call opens its own
/// read-only connection, the cache is the only shared state.
pub struct QueryExec {
    db_path: PathBuf,
    cache: CacheBackend,
    admin_token: Option<String>,
}

impl QueryExec {
    pub fn new(db_path: &Path, cache: CacheBackend, admin_token: Option<String>) -> QueryExec {
        QueryExec {
            db_path: db_path.to_owned(),
            cache,
            admin_token,
        }
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        open_read_only(&self.db_path)
    }

    pub fn get_cache(&self) -> &CacheBackend {
        &self.cache
    }

    // cached, keyed by the corpus freshness so a rebuild invalidates old
    // responses
    pub async fn search(&self, q: &str, facets: &FacetSet, pagination: Pagination)
                        -> anyhow::Result<SearchResponse>
    {
        let query = normalize_query(q);

        if query.is_empty() {
            return Ok(SearchResponse::empty(&query, pagination.page, pagination.per_page));
        }

        let marker = {
            let conn = self.open()?;
            read_freshness(&conn, Some(&self.db_path))?
        };

        let key = cache_key(&marker, &query, facets, pagination);

        match self.cache.get(&key).await {
            Ok(Some(payload)) => {
                match serde_json::from_str::<SearchResponse>(&payload) {
                    Ok(response) => {
                        tracing::debug!(key = %key, "search cache hit");
                        return Ok(response);
                    },
                    Err(err) => {
                        tracing::warn!(key = %key, "discarding unreadable cache entry: {}", err);
                    }
                }
            },
            Ok(None) => (),
            Err(err) => {
                tracing::warn!(backend = self.cache.name(), "cache read failed: {}", err);
            }
        }

        let response = {
            let conn = self.open()?;
            search(&conn, &query, facets, pagination)?
        };

        match serde_json::to_string(&response) {
            Ok(payload) => {
                if let Err(err) = self.cache.set(&key, &payload).await {
                    tracing::warn!(backend = self.cache.name(), "cache write failed: {}", err);
                }
            },
            Err(err) => {
                tracing::warn!("failed to serialise search response: {}", err);
            }
        }

        Ok(response)
    }

    pub fn gene_detail(&self, gene_id: GeneId) -> anyhow::Result<Option<GeneDetails>> {
        let conn = self.open()?;
        Ok(gene_data::gene_detail(&conn, gene_id)?)
    }

    pub fn species(&self) -> anyhow::Result<Vec<Species>> {
        let conn = self.open()?;
        Ok(gene_data::list_species(&conn)?)
    }

    pub fn chromosomes(&self, tax_id: TaxonId) -> anyhow::Result<Vec<ChromosomeGeneCount>> {
        let conn = self.open()?;
        Ok(gene_data::list_chromosomes(&conn, tax_id)?)
    }

    pub fn chromosome_genes(&self, chromosome: &str, tax_id: TaxonId)
                            -> anyhow::Result<Vec<ChromosomeGene>>
    {
        let conn = self.open()?;
        Ok(gene_data::chromosome_genes(&conn, chromosome, tax_id)?)
    }

    pub fn chromosome_region(&self, chromosome: &str, tax_id: TaxonId, region: &str)
                             -> anyhow::Result<Vec<ChromosomeGene>>
    {
        let conn = self.open()?;
        Ok(gene_data::chromosome_region(&conn, chromosome, tax_id, region)?)
    }

    /// Remove every cached response.  When an admin token is configured the
    /// caller must supply the same token, otherwise nothing is changed.
    pub async fn admin_clear_cache(&self, token: Option<&str>) -> ClearCacheOutcome {
        if let Some(ref expected) = self.admin_token {
            if token != Some(expected.as_str()) {
                tracing::warn!("rejected cache clear without a valid admin token");
                return ClearCacheOutcome::Unauthorized;
            }
        }

        match self.cache.clear().await {
            Ok(()) => tracing::info!(backend = self.cache.name(), "search cache cleared"),
            Err(err) => tracing::warn!(backend = self.cache.name(), "cache clear failed: {}", err),
        }

        ClearCacheOutcome::Cleared
    }
}
