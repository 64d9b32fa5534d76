pub const DEFAULT_LOAD_BATCH_SIZE: usize = 5000;
pub const CORPUS_BATCH_SIZE: usize = 1000;

// the species whose symbols external sources are resolved against
pub const DEFAULT_RESOLVER_TAXONID: u32 = 9606;

pub const MAX_GENE_NAME_LENGTH: usize = 500;
pub const MAX_GENE_DESCRIPTION_LENGTH: usize = 2000;
pub const MAX_VARIANT_NAME_LENGTH: usize = 500;
pub const MAX_CLINICAL_SIGNIFICANCE_LENGTH: usize = 200;
pub const MAX_REVIEW_STATUS_LENGTH: usize = 100;
pub const MAX_PHENOTYPE_LIST_LENGTH: usize = 500;
pub const MAX_ALLELE_LENGTH: usize = 100;

pub const MIN_FUNCTIONAL_SUMMARY_LENGTH: usize = 50;

pub const GENE_INFO_MIN_FIELDS: usize = 10;
pub const GENE2GO_MIN_FIELDS: usize = 8;
pub const CLINICAL_VARIANT_MIN_FIELDS: usize = 20;
pub const GENE_SUMMARY_MIN_FIELDS: usize = 4;

// clinical significance classes kept by the variant loader
pub const PATHOGENIC_TERMS: [&str; 5] = [
    "Pathogenic",
    "Likely pathogenic",
    "Pathogenic/Likely pathogenic",
    "Pathogenic, low penetrance",
    "Likely pathogenic, low penetrance",
];

// review tiers, most confident first
pub const REVIEW_STATUS_TIERS: [&str; 4] = [
    "practice guideline",
    "reviewed by expert panel",
    "criteria provided, multiple submitters, no conflicts",
    "criteria provided, single submitter",
];

// constraint releases, most recent first
pub const CONSTRAINT_RELEASE_PRECEDENCE: [&str; 2] = ["v4.1", "v2.1.1"];

pub const ESSENTIAL_PLI_THRESHOLD: f64 = 0.9;
pub const TOLERANT_PLI_THRESHOLD: f64 = 0.5;
pub const CONSTRAINED_LOEUF_THRESHOLD: f64 = 0.35;

// separators tried in order when a trait row names several genes
pub const TRAIT_GENE_SEPARATORS: [&str; 4] = [", ", " - ", "; ", " x "];
pub const TRAIT_GENE_PLACEHOLDERS: [&str; 2] = ["NR", "INTERGENIC"];

pub const DEFAULT_PER_PAGE: usize = 50;
pub const MAX_PER_PAGE: usize = 100;
pub const MAX_QUERY_LENGTH: usize = 200;

pub const DETAIL_TRAIT_LIMIT: usize = 20;
pub const DETAIL_VARIANT_LIMIT: usize = 20;
pub const CHROMOSOME_REGION_LIMIT: usize = 500;

pub const DEFAULT_BROWSE_TAXONID: u32 = 9606;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_REDIS_PREFIX: &str = "genekb:";
pub const ADMIN_TOKEN_ENV_VAR: &str = "GENEKB_ADMIN_TOKEN";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

pub const SNIPPET_OPEN: &str = "<mark>";
pub const SNIPPET_CLOSE: &str = "</mark>";
pub const SNIPPET_ELLIPSIS: &str = "...";
pub const SNIPPET_TOKENS: usize = 32;
