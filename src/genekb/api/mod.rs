pub mod search_utils;
pub mod facets;
pub mod search;
pub mod gene_data;
pub mod cache;
pub mod query_exec;
