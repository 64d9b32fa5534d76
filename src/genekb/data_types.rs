use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use flexstr::SharedStr as FlexStr;

use crate::types::*;

// rows written by the loaders

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Species {
    pub tax_id: TaxonId,
    pub name: String,
    pub common_name: Option<String>,
    pub gene_count: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Gene {
    pub gene_id: GeneId,
    pub tax_id: TaxonId,
    pub symbol: String,
    pub name: Option<String>,
    pub chromosome: Option<String>,
    pub map_location: Option<String>,
    pub description: Option<String>,
    pub gene_type: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Synonym {
    pub gene_id: GeneId,
    pub synonym: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OntologyCategory {
    Function,
    Process,
    Component,
}

impl OntologyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OntologyCategory::Function => "Function",
            OntologyCategory::Process => "Process",
            OntologyCategory::Component => "Component",
        }
    }
}

impl FromStr for OntologyCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Function" => Ok(OntologyCategory::Function),
            "Process" => Ok(OntologyCategory::Process),
            "Component" => Ok(OntologyCategory::Component),
            _ => Err(format!("unknown ontology category: {}", s)),
        }
    }
}

impl fmt::Display for OntologyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OntologyTerm {
    pub gene_id: GeneId,
    pub go_id: String,
    pub go_term: String,
    pub category: OntologyCategory,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConstraintRecord {
    pub gene_id: Option<GeneId>,
    pub gene_symbol: String,
    pub transcript: Option<String>,
    pub pli: Option<f64>,
    pub loeuf: Option<f64>,
    pub loeuf_lower: Option<f64>,
    pub loeuf_upper: Option<f64>,
    pub oe_lof: Option<f64>,
    pub oe_mis: Option<f64>,
    pub oe_mis_lower: Option<f64>,
    pub oe_mis_upper: Option<f64>,
    pub mis_z: Option<f64>,
    pub oe_syn: Option<f64>,
    pub syn_z: Option<f64>,
    pub release: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClinicalGeneSummary {
    pub gene_id: Option<GeneId>,
    pub gene_symbol: String,
    pub total_submissions: i64,
    pub total_alleles: i64,
    pub pathogenic_alleles: i64,
    pub uncertain_alleles: i64,
    pub conflicting_alleles: i64,
    pub gene_mim_number: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClinicalVariant {
    pub allele_id: i64,
    pub variation_id: Option<i64>,
    pub gene_id: Option<GeneId>,
    pub gene_symbol: Option<String>,
    pub variant_name: Option<String>,
    pub variant_type: Option<String>,
    pub clinical_significance: Option<String>,
    pub review_status: Option<String>,
    pub phenotype_list: Option<String>,
    pub chromosome: Option<String>,
    pub start_pos: Option<i64>,
    pub stop_pos: Option<i64>,
    pub reference_allele: Option<String>,
    pub alternate_allele: Option<String>,
    pub rs_id: Option<i64>,
    pub last_evaluated: Option<String>,
    pub origin: Option<String>,
    pub assembly: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Trait {
    pub trait_id: i64,
    pub efo_trait: String,
    pub reported_trait: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Study {
    pub study_id: String,
    pub pubmed_id: Option<String>,
    pub first_author: Option<String>,
    pub publication_date: Option<String>,
    pub journal: Option<String>,
    pub title: Option<String>,
    pub initial_sample_size: Option<String>,
    pub replication_sample_size: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GeneTraitAssociation {
    pub gene_id: Option<GeneId>,
    pub gene_symbol: String,
    pub trait_id: i64,
    pub reported_trait: String,
    pub efo_trait: String,
    pub p_value: Option<f64>,
    pub p_value_text: Option<String>,
    pub risk_allele: Option<String>,
    pub risk_allele_freq: Option<f64>,
    pub odds_ratio: Option<f64>,
    pub ci_text: Option<String>,
    pub chromosome: Option<String>,
    pub position: Option<i64>,
    pub snp_id: Option<String>,
    pub study_id: Option<String>,
    pub pubmed_id: Option<String>,
    pub sample_description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FunctionalSummary {
    pub gene_id: GeneId,
    pub summary: String,
    pub source: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SearchDocument {
    pub gene_id: GeneId,
    pub searchable_text: String,
}

// query API results

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GeneSearchResult {
    pub gene_id: GeneId,
    pub tax_id: TaxonId,
    pub symbol: GeneSymbol,
    pub name: Option<GeneName>,
    pub chromosome: Option<ChromosomeName>,
    pub map_location: Option<MapLocation>,
    pub description: Option<FlexStr>,
    pub gene_type: Option<GeneTypeName>,
    pub species_name: Option<FlexStr>,
    // highlighted excerpt, only present for ranked results
    #[serde(skip_serializing_if="Option::is_none", default)]
    pub matched_text: Option<String>,
    pub trait_count: i64,
    pub pli: Option<f64>,
    pub loeuf: Option<f64>,
    pub clinvar_pathogenic: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<GeneSearchResult>,
    pub query: String,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    // false when the full-text index could not be used
    pub ranked: bool,
}

impl SearchResponse {
    pub fn empty(query: &str, page: usize, per_page: usize) -> SearchResponse {
        SearchResponse {
            results: vec![],
            query: query.to_owned(),
            page,
            per_page,
            total: 0,
            ranked: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChromosomeGeneCount {
    pub chromosome: ChromosomeName,
    pub gene_count: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChromosomeGene {
    pub gene_id: GeneId,
    pub symbol: GeneSymbol,
    pub name: Option<GeneName>,
    pub map_location: Option<MapLocation>,
    pub description: Option<FlexStr>,
    pub gene_type: Option<GeneTypeName>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FunctionalSummaryDetails {
    pub text: FlexStr,
    pub source: Option<FlexStr>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TraitAssociationDetails {
    pub reported_trait: TraitName,
    pub p_value: Option<f64>,
    pub snp_id: Option<FlexStr>,
    pub risk_allele: Option<FlexStr>,
    pub odds_ratio: Option<f64>,
    pub pubmed_id: Option<FlexStr>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConstraintDetails {
    pub pli: Option<f64>,
    pub loeuf: Option<f64>,
    pub oe_lof: Option<f64>,
    pub oe_mis: Option<f64>,
    pub mis_z: Option<f64>,
    pub gnomad_version: ReleaseVersion,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClinicalSummaryDetails {
    pub pathogenic_alleles: i64,
    pub uncertain_alleles: i64,
    pub conflicting_alleles: i64,
    pub total_alleles: i64,
    pub gene_mim_number: Option<FlexStr>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClinicalVariantDetails {
    pub allele_id: i64,
    pub variant_name: Option<FlexStr>,
    pub variant_type: Option<FlexStr>,
    pub clinical_significance: Option<FlexStr>,
    pub review_status: Option<FlexStr>,
    pub phenotype_list: Option<FlexStr>,
    pub chromosome: Option<ChromosomeName>,
    pub start_pos: Option<i64>,
    pub rs_id: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OntologyTermShort {
    pub go_id: OntologyId,
    pub go_term: OntologyTermName,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct OntologyTermsByCategory {
    #[serde(rename = "Function")]
    pub function: Vec<OntologyTermShort>,
    #[serde(rename = "Process")]
    pub process: Vec<OntologyTermShort>,
    #[serde(rename = "Component")]
    pub component: Vec<OntologyTermShort>,
}

impl OntologyTermsByCategory {
    pub fn push(&mut self, category: OntologyCategory, term: OntologyTermShort) {
        match category {
            OntologyCategory::Function => self.function.push(term),
            OntologyCategory::Process => self.process.push(term),
            OntologyCategory::Component => self.component.push(term),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GeneDetails {
    pub gene_id: GeneId,
    pub tax_id: TaxonId,
    pub symbol: GeneSymbol,
    pub name: Option<GeneName>,
    pub chromosome: Option<ChromosomeName>,
    pub map_location: Option<MapLocation>,
    pub description: Option<FlexStr>,
    pub gene_type: Option<GeneTypeName>,
    pub species_name: Option<FlexStr>,
    pub species_scientific: Option<FlexStr>,
    pub synonyms: Vec<GeneSymbol>,
    pub functional_summary: Option<FunctionalSummaryDetails>,
    pub traits: Vec<TraitAssociationDetails>,
    pub trait_count: i64,
    pub constraint: Option<ConstraintDetails>,
    pub clinvar_summary: Option<ClinicalSummaryDetails>,
    pub clinvar_variants: Vec<ClinicalVariantDetails>,
    pub go_terms: OntologyTermsByCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ontology_category_parse() {
        assert_eq!("Process".parse::<OntologyCategory>(), Ok(OntologyCategory::Process));
        assert_eq!(" Component ".parse::<OntologyCategory>(), Ok(OntologyCategory::Component));
        assert!("process".parse::<OntologyCategory>().is_err());
        assert_eq!(OntologyCategory::Function.to_string(), "Function");
    }
}
