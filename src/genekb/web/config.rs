use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use serde::{Serialize, Deserialize};

use crate::constants::*;
use crate::types::TaxonId;

// one allow-listed species of the gene catalog
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SpeciesConfig {
    pub tax_id: TaxonId,
    pub name: String,
    #[serde(skip_serializing_if="Option::is_none", default)]
    pub common_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendConfig {
    #[default]
    Local,
    Redis {
        url: String,
        #[serde(default = "default_redis_prefix")]
        prefix: String,
    },
}

fn default_redis_prefix() -> String {
    DEFAULT_REDIS_PREFIX.to_owned()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub backend: CacheBackendConfig,
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

impl Default for CacheConfig {
    fn default() -> CacheConfig {
        CacheConfig {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            backend: CacheBackendConfig::Local,
        }
    }
}

// source file names, relative to the data directory given to the build
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct DataFiles {
    pub gene_info: String,
    pub gene_ontology: String,
    pub clinical_gene_summary: String,
    pub clinical_variants: String,
    pub constraint_v4_1: String,
    pub constraint_v2_1_1: String,
    pub trait_associations: String,
    pub gene_summaries: String,
}

impl Default for DataFiles {
    fn default() -> DataFiles {
        DataFiles {
            gene_info: "gene_info.gz".into(),
            gene_ontology: "gene2go.gz".into(),
            clinical_gene_summary: "gene_specific_summary.txt".into(),
            clinical_variants: "variant_summary.txt.gz".into(),
            constraint_v4_1: "gnomad_v4_constraint.tsv".into(),
            constraint_v2_1_1: "gnomad_v2_lof_metrics.txt".into(),
            trait_associations: "gwas_catalog.tsv".into(),
            gene_summaries: "gene_summary.gz".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_species")]
    pub species: Vec<SpeciesConfig>,
    // external sources are matched against this species' symbols only
    #[serde(default = "default_resolver_taxonid")]
    pub resolver_taxonid: TaxonId,
    #[serde(default = "default_load_batch_size")]
    pub load_batch_size: usize,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(skip_serializing_if="Option::is_none", default)]
    pub admin_token: Option<String>,
    #[serde(default)]
    pub data_files: DataFiles,
}

fn default_resolver_taxonid() -> TaxonId {
    DEFAULT_RESOLVER_TAXONID
}

fn default_load_batch_size() -> usize {
    DEFAULT_LOAD_BATCH_SIZE
}

fn species(tax_id: TaxonId, name: &str, common_name: &str) -> SpeciesConfig {
    SpeciesConfig {
        tax_id,
        name: name.into(),
        common_name: Some(common_name.into()),
    }
}

pub fn default_species() -> Vec<SpeciesConfig> {
    vec![
        species(9606, "Homo sapiens", "Human"),
        species(10090, "Mus musculus", "Mouse"),
        species(10116, "Rattus norvegicus", "Rat"),
        species(7955, "Danio rerio", "Zebrafish"),
        species(7227, "Drosophila melanogaster", "Fruit fly"),
        species(6239, "Caenorhabditis elegans", "Roundworm"),
        species(9615, "Canis lupus familiaris", "Dog"),
        species(9685, "Felis catus", "Cat"),
        species(9913, "Bos taurus", "Cattle"),
        species(9823, "Sus scrofa", "Pig"),
        species(9031, "Gallus gallus", "Chicken"),
        species(559292, "Saccharomyces cerevisiae S288C", "Yeast"),
        species(3702, "Arabidopsis thaliana", "Thale cress"),
        species(9544, "Macaca mulatta", "Rhesus macaque"),
        species(9598, "Pan troglodytes", "Chimpanzee"),
    ]
}

impl Default for Config {
    fn default() -> Config {
        Config {
            species: default_species(),
            resolver_taxonid: DEFAULT_RESOLVER_TAXONID,
            load_batch_size: DEFAULT_LOAD_BATCH_SIZE,
            cache: CacheConfig::default(),
            admin_token: None,
            data_files: DataFiles::default(),
        }
    }
}

impl Config {
    pub fn read(config_file_name: &Path) -> anyhow::Result<Config> {
        let file = File::open(config_file_name)
            .with_context(|| format!("failed to read {}", config_file_name.display()))?;
        let reader = BufReader::new(file);

        let config = serde_json::from_reader(reader)
            .with_context(|| format!("failed to parse {}", config_file_name.display()))?;

        Ok(config)
    }

    /// The shared secret for administrative operations.  The environment
    /// variable wins over the file, an empty value means none.
    pub fn admin_token(&self) -> Option<String> {
        std::env::var(ADMIN_TOKEN_ENV_VAR).ok()
            .or_else(|| self.admin_token.clone())
            .filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config() {
        let config: Config = serde_json::from_str(r#"{
            "species": [{"tax_id": 9606, "name": "Homo sapiens"}],
            "cache": {"backend": {"redis": {"url": "redis://127.0.0.1/"}}}
        }"#).unwrap();

        assert_eq!(config.species.len(), 1);
        assert_eq!(config.species[0].common_name, None);
        assert_eq!(config.resolver_taxonid, 9606);
        assert_eq!(config.load_batch_size, DEFAULT_LOAD_BATCH_SIZE);
        assert_eq!(config.cache.ttl_secs, DEFAULT_CACHE_TTL_SECS);
        assert_eq!(config.cache.backend,
                   CacheBackendConfig::Redis {
                       url: "redis://127.0.0.1/".into(),
                       prefix: DEFAULT_REDIS_PREFIX.into(),
                   });
        assert_eq!(config.data_files, DataFiles::default());
    }

    #[test]
    fn defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.species.len(), 15);
        assert_eq!(config.cache.backend, CacheBackendConfig::Local);

        let local: CacheConfig = serde_json::from_str(r#"{"backend": "local", "ttl_secs": 5}"#).unwrap();
        assert_eq!(local.ttl_secs, 5);
    }
}
