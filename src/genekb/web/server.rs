use std::sync::Arc;

use axum::{
    extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, response::IntoResponse,
    routing::{get, post}, Json, Router
};

use serde::Deserialize;
use serde_json::{json, Value};

use tower_http::trace::TraceLayer;

use crate::api::facets::FacetSet;
use crate::api::query_exec::{ClearCacheOutcome, QueryExec};
use crate::api::search_utils::Pagination;
use crate::constants::{ADMIN_TOKEN_HEADER, DEFAULT_BROWSE_TAXONID};
use crate::types::{GeneId, TaxonId};

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct AllState {
    pub query_exec: QueryExec,
}

#[derive(Deserialize, Debug, Default)]
pub struct SearchParams {
    q: Option<String>,
    species: Option<String>,
    chromosome: Option<String>,
    constraint: Option<String>,
    clinical: Option<String>,
    gene_type: Option<String>,
    go_category: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct BrowseParams {
    species: Option<String>,
    region: Option<String>,
}

impl BrowseParams {
    // an absent or unparsable species falls back to human
    fn tax_id(&self) -> TaxonId {
        self.species.as_deref()
            .and_then(|species| species.trim().parse::<TaxonId>().ok())
            .unwrap_or(DEFAULT_BROWSE_TAXONID)
    }
}

type JsonResult = Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)>;

fn internal_error(err: anyhow::Error) -> (StatusCode, Json<Value>) {
    tracing::error!("request failed: {:#}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal server error" })))
}

fn option_json_to_result<T: serde::Serialize>(opt: Option<T>) -> JsonResult {
    match opt {
        Some(res) => Ok((StatusCode::OK, Json(json!(res)))),
        None => Err((StatusCode::NOT_FOUND, Json(json!({ "error": "Gene not found" })))),
    }
}

async fn search(Query(params): Query<SearchParams>, State(all_state): State<Arc<AllState>>)
   -> impl IntoResponse
{
    let facets = FacetSet::from_params(params.species.as_deref(), params.chromosome.as_deref(),
                                       params.constraint.as_deref(), params.clinical.as_deref(),
                                       params.gene_type.as_deref(), params.go_category.as_deref());
    let pagination = Pagination::from_params(params.page.as_deref(), params.per_page.as_deref());
    let q = params.q.unwrap_or_default();

    let res: JsonResult =
        match all_state.query_exec.search(&q, &facets, pagination).await {
            Ok(response) => Ok((StatusCode::OK, Json(json!(response)))),
            Err(err) => Err(internal_error(err)),
        };

    res
}

async fn get_gene(Path(id): Path<String>, State(all_state): State<Arc<AllState>>)
   -> impl IntoResponse
{
    // a non-numeric id can't name a gene
    let Ok(gene_id) = id.trim().parse::<GeneId>() else {
        return option_json_to_result::<Value>(None);
    };

    match all_state.query_exec.gene_detail(gene_id) {
        Ok(details) => option_json_to_result(details),
        Err(err) => Err(internal_error(err)),
    }
}

async fn get_species(State(all_state): State<Arc<AllState>>) -> impl IntoResponse {
    let res: JsonResult =
        match all_state.query_exec.species() {
            Ok(species) => Ok((StatusCode::OK, Json(json!({ "species": species })))),
            Err(err) => Err(internal_error(err)),
        };
    res
}

async fn get_chromosomes(Query(params): Query<BrowseParams>,
                         State(all_state): State<Arc<AllState>>)
   -> impl IntoResponse
{
    let tax_id = params.tax_id();

    let res: JsonResult =
        match all_state.query_exec.chromosomes(tax_id) {
            Ok(chromosomes) => Ok((StatusCode::OK,
                                   Json(json!({ "chromosomes": chromosomes, "tax_id": tax_id })))),
            Err(err) => Err(internal_error(err)),
        };
    res
}

async fn get_chromosome_genes(Path(chromosome): Path<String>, Query(params): Query<BrowseParams>,
                              State(all_state): State<Arc<AllState>>)
   -> impl IntoResponse
{
    let tax_id = params.tax_id();

    let res: JsonResult =
        match all_state.query_exec.chromosome_genes(&chromosome, tax_id) {
            Ok(genes) => Ok((StatusCode::OK,
                             Json(json!({ "chromosome": chromosome, "genes": genes, "tax_id": tax_id })))),
            Err(err) => Err(internal_error(err)),
        };
    res
}

async fn get_chromosome_region(Path(chromosome): Path<String>, Query(params): Query<BrowseParams>,
                               State(all_state): State<Arc<AllState>>)
   -> impl IntoResponse
{
    let tax_id = params.tax_id();
    let region = params.region.clone().unwrap_or_default();

    let res: JsonResult =
        match all_state.query_exec.chromosome_region(&chromosome, tax_id, &region) {
            Ok(genes) => Ok((StatusCode::OK,
                             Json(json!({ "chromosome": chromosome, "region": region, "genes": genes })))),
            Err(err) => Err(internal_error(err)),
        };
    res
}

async fn clear_cache(headers: HeaderMap, State(all_state): State<Arc<AllState>>)
   -> impl IntoResponse
{
    let token = headers.get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match all_state.query_exec.admin_clear_cache(token).await {
        ClearCacheOutcome::Cleared =>
            (StatusCode::OK, Json(json!({ "status": "ok", "message": "Cache cleared" }))),
        ClearCacheOutcome::Unauthorized =>
            (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))),
    }
}

async fn ping() -> String {
    String::from("OK") + " " + PKG_NAME + " " + VERSION
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({
        "status": "error",
        "reason": "Resource was not found."
    })))
}

pub fn build_router(all_state: Arc<AllState>) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/gene/{id}", get(get_gene))
        .route("/species", get(get_species))
        .route("/chromosomes", get(get_chromosomes))
        .route("/chromosome/{chrom}", get(get_chromosome_genes))
        .route("/chromosome/{chrom}/region", get(get_chromosome_region))
        .route("/_admin/clear_cache", post(clear_cache))
        .route("/ping", get(ping))
        .fallback(not_found)
        .with_state(all_state)
        .layer(TraceLayer::new_for_http())
}
