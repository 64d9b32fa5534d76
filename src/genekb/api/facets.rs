use std::fmt;

use rusqlite::types::Value;
use serde::{Serialize, Deserialize};

use crate::constants::*;
use crate::types::TaxonId;

lazy_static! {
    // release precedence as an ORDER BY expression, most recent first
    static ref RELEASE_RANK_SQL: String = {
        let cases: Vec<String> = CONSTRAINT_RELEASE_PRECEDENCE.iter().enumerate()
            .map(|(idx, release)| format!("WHEN '{}' THEN {}", release, idx))
            .collect();
        format!("CASE c.gnomad_version {} ELSE {} END",
                cases.join(" "), CONSTRAINT_RELEASE_PRECEDENCE.len())
    };

    // best-available value of one metric: the first non-null value in
    // release precedence order
    pub static ref BEST_PLI_SQL: String = best_metric_sql("pli");
    pub static ref BEST_LOEUF_SQL: String = best_metric_sql("loeuf");

    static ref ESSENTIAL_SQL: String = format!("({}) > ?", *BEST_PLI_SQL);
    static ref CONSTRAINED_SQL: String = format!("({}) < ?", *BEST_LOEUF_SQL);
    static ref TOLERANT_SQL: String = format!("COALESCE(({}), 0) <= ?", *BEST_PLI_SQL);
}

fn best_metric_sql(column: &str) -> String {
    format!("SELECT c.{column} FROM gene_constraints c
             WHERE c.gene_id = g.gene_id AND c.{column} IS NOT NULL
             ORDER BY {}, c.id LIMIT 1", *RELEASE_RANK_SQL)
}

const HAS_PATHOGENIC_SQL: &str =
    "EXISTS (SELECT 1 FROM clinvar_gene_summary cv WHERE cv.gene_id = g.gene_id AND cv.pathogenic_alleles > 0)";
const HAS_TRAITS_SQL: &str =
    "EXISTS (SELECT 1 FROM gene_traits gt WHERE gt.gene_id = g.gene_id)";
const HAS_DISEASE_SQL: &str =
    "(EXISTS (SELECT 1 FROM clinvar_gene_summary cv WHERE cv.gene_id = g.gene_id AND cv.pathogenic_alleles > 0)
      OR EXISTS (SELECT 1 FROM gene_traits gt WHERE gt.gene_id = g.gene_id))";

const PROTEIN_CODING_SQL: &str = "g.gene_type = 'protein-coding'";
const PSEUDO_SQL: &str = "g.gene_type LIKE '%pseudo%'";
const NCRNA_SQL: &str = "g.gene_type LIKE '%RNA%'";
const OTHER_TYPE_SQL: &str =
    "(g.gene_type != 'protein-coding' AND g.gene_type NOT LIKE '%pseudo%' AND g.gene_type NOT LIKE '%RNA%')";

const GO_CATEGORY_SQL: &str =
    "EXISTS (SELECT 1 FROM gene_go_terms ggo WHERE ggo.gene_id = g.gene_id AND ggo.category = ?)";
const GO_ANY_SQL: &str =
    "EXISTS (SELECT 1 FROM gene_go_terms ggo WHERE ggo.gene_id = g.gene_id)";

const SPECIES_SQL: &str = "g.tax_id = ?";
const CHROMOSOME_SQL: &str = "g.chromosome = ?";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintClass {
    Essential,
    Constrained,
    Tolerant,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClinicalClass {
    Pathogenic,
    Gwas,
    Disease,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeneTypeClass {
    #[serde(rename = "protein-coding")]
    ProteinCoding,
    #[serde(rename = "pseudo")]
    Pseudo,
    #[serde(rename = "ncRNA")]
    NcRna,
    #[serde(rename = "other")]
    Other,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OntologyFacet {
    Function,
    Process,
    Component,
    Any,
}

impl ConstraintClass {
    pub fn parse(value: &str) -> Option<ConstraintClass> {
        match value.trim() {
            "essential" => Some(ConstraintClass::Essential),
            "constrained" => Some(ConstraintClass::Constrained),
            "tolerant" => Some(ConstraintClass::Tolerant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintClass::Essential => "essential",
            ConstraintClass::Constrained => "constrained",
            ConstraintClass::Tolerant => "tolerant",
        }
    }
}

impl ClinicalClass {
    pub fn parse(value: &str) -> Option<ClinicalClass> {
        match value.trim() {
            "pathogenic" => Some(ClinicalClass::Pathogenic),
            "gwas" => Some(ClinicalClass::Gwas),
            "disease" => Some(ClinicalClass::Disease),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClinicalClass::Pathogenic => "pathogenic",
            ClinicalClass::Gwas => "gwas",
            ClinicalClass::Disease => "disease",
        }
    }
}

impl GeneTypeClass {
    pub fn parse(value: &str) -> Option<GeneTypeClass> {
        match value.trim() {
            "protein-coding" => Some(GeneTypeClass::ProteinCoding),
            "pseudo" => Some(GeneTypeClass::Pseudo),
            "ncRNA" => Some(GeneTypeClass::NcRna),
            "other" => Some(GeneTypeClass::Other),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeneTypeClass::ProteinCoding => "protein-coding",
            GeneTypeClass::Pseudo => "pseudo",
            GeneTypeClass::NcRna => "ncRNA",
            GeneTypeClass::Other => "other",
        }
    }
}

impl OntologyFacet {
    pub fn parse(value: &str) -> Option<OntologyFacet> {
        match value.trim() {
            "function" => Some(OntologyFacet::Function),
            "process" => Some(OntologyFacet::Process),
            "component" => Some(OntologyFacet::Component),
            "any" => Some(OntologyFacet::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OntologyFacet::Function => "function",
            OntologyFacet::Process => "process",
            OntologyFacet::Component => "component",
            OntologyFacet::Any => "any",
        }
    }
}

/// One compiled facet: a fixed SQL template over the genes table (aliased
/// `g`) and the values bound to its placeholders.
#[derive(Clone, Debug, PartialEq)]
pub struct FacetPredicate {
    pub sql: &'static str,
    pub params: Vec<Value>,
}

impl FacetPredicate {
    fn fixed(sql: &'static str) -> FacetPredicate {
        FacetPredicate {
            sql,
            params: vec![],
        }
    }

    fn bound(sql: &'static str, param: Value) -> FacetPredicate {
        FacetPredicate {
            sql,
            params: vec![param],
        }
    }
}

/// The recognised filters of a search.  Every field is optional and the
/// selected ones are combined with AND.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FacetSet {
    pub species: Option<TaxonId>,
    pub chromosome: Option<String>,
    pub constraint: Option<ConstraintClass>,
    pub clinical: Option<ClinicalClass>,
    pub gene_type: Option<GeneTypeClass>,
    pub go_category: Option<OntologyFacet>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl FacetSet {
    /// Build from raw request values.  Values that aren't recognised are
    /// dropped.
    pub fn from_params(species: Option<&str>, chromosome: Option<&str>,
                       constraint: Option<&str>, clinical: Option<&str>,
                       gene_type: Option<&str>, go_category: Option<&str>)
                       -> FacetSet
    {
        FacetSet {
            species: non_empty(species).and_then(|v| v.parse::<TaxonId>().ok()),
            chromosome: non_empty(chromosome).map(str::to_owned),
            constraint: non_empty(constraint).and_then(ConstraintClass::parse),
            clinical: non_empty(clinical).and_then(ClinicalClass::parse),
            gene_type: non_empty(gene_type).and_then(GeneTypeClass::parse),
            go_category: non_empty(go_category).and_then(OntologyFacet::parse),
        }
    }

    pub fn predicates(&self) -> Vec<FacetPredicate> {
        let mut predicates = vec![];

        if let Some(tax_id) = self.species {
            predicates.push(FacetPredicate::bound(SPECIES_SQL, Value::Integer(tax_id.into())));
        }

        if let Some(ref chromosome) = self.chromosome {
            predicates.push(FacetPredicate::bound(CHROMOSOME_SQL, Value::Text(chromosome.clone())));
        }

        if let Some(constraint) = self.constraint {
            predicates.push(match constraint {
                ConstraintClass::Essential =>
                    FacetPredicate::bound(&ESSENTIAL_SQL, Value::Real(ESSENTIAL_PLI_THRESHOLD)),
                ConstraintClass::Constrained =>
                    FacetPredicate::bound(&CONSTRAINED_SQL, Value::Real(CONSTRAINED_LOEUF_THRESHOLD)),
                ConstraintClass::Tolerant =>
                    FacetPredicate::bound(&TOLERANT_SQL, Value::Real(TOLERANT_PLI_THRESHOLD)),
            });
        }

        if let Some(clinical) = self.clinical {
            predicates.push(FacetPredicate::fixed(match clinical {
                ClinicalClass::Pathogenic => HAS_PATHOGENIC_SQL,
                ClinicalClass::Gwas => HAS_TRAITS_SQL,
                ClinicalClass::Disease => HAS_DISEASE_SQL,
            }));
        }

        if let Some(gene_type) = self.gene_type {
            predicates.push(FacetPredicate::fixed(match gene_type {
                GeneTypeClass::ProteinCoding => PROTEIN_CODING_SQL,
                GeneTypeClass::Pseudo => PSEUDO_SQL,
                GeneTypeClass::NcRna => NCRNA_SQL,
                GeneTypeClass::Other => OTHER_TYPE_SQL,
            }));
        }

        if let Some(go_category) = self.go_category {
            let category = match go_category {
                OntologyFacet::Function => Some("Function"),
                OntologyFacet::Process => Some("Process"),
                OntologyFacet::Component => Some("Component"),
                OntologyFacet::Any => None,
            };
            predicates.push(match category {
                Some(category) => FacetPredicate::bound(GO_CATEGORY_SQL, Value::Text(category.into())),
                None => FacetPredicate::fixed(GO_ANY_SQL),
            });
        }

        predicates
    }

    /// Stable text form of every facet value, used in cache keys.
    pub fn cache_key_part(&self) -> String {
        format!("species={}|chromosome={}|constraint={}|clinical={}|gene_type={}|go_category={}",
                self.species.map(|s| s.to_string()).unwrap_or_default(),
                self.chromosome.as_deref().unwrap_or(""),
                self.constraint.map(|c| c.as_str()).unwrap_or(""),
                self.clinical.map(|c| c.as_str()).unwrap_or(""),
                self.gene_type.map(|t| t.as_str()).unwrap_or(""),
                self.go_category.map(|c| c.as_str()).unwrap_or(""))
    }
}

impl fmt::Display for FacetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key_part())
    }
}

/// The facet predicates as SQL fragments to AND onto a WHERE clause, and
/// their parameters in placeholder order.
pub fn compile(predicates: &[FacetPredicate]) -> (Vec<&'static str>, Vec<Value>) {
    let clauses = predicates.iter().map(|p| p.sql).collect();
    let params = predicates.iter().flat_map(|p| p.params.iter().cloned()).collect();
    (clauses, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_values_ignored() {
        let facets = FacetSet::from_params(Some("human"), Some(""), Some("1; DROP TABLE genes"),
                                           Some("rare"), Some("lncRNA"), Some("all"));
        assert_eq!(facets, FacetSet::default());
        assert!(facets.predicates().is_empty());
    }

    #[test]
    fn recognised_values() {
        let facets = FacetSet::from_params(Some("9606"), Some("17"), Some("essential"),
                                           Some("disease"), Some("ncRNA"), Some("any"));
        assert_eq!(facets.species, Some(9606));
        assert_eq!(facets.chromosome.as_deref(), Some("17"));
        assert_eq!(facets.constraint, Some(ConstraintClass::Essential));
        assert_eq!(facets.clinical, Some(ClinicalClass::Disease));
        assert_eq!(facets.gene_type, Some(GeneTypeClass::NcRna));
        assert_eq!(facets.go_category, Some(OntologyFacet::Any));

        let predicates = facets.predicates();
        assert_eq!(predicates.len(), 6);

        let (clauses, params) = compile(&predicates);
        assert_eq!(clauses.len(), 6);
        assert_eq!(params, vec![Value::Integer(9606), Value::Text("17".into()),
                                Value::Real(ESSENTIAL_PLI_THRESHOLD)]);
    }

    #[test]
    fn user_values_never_in_sql() {
        let facets = FacetSet::from_params(None, Some("1' OR '1'='1"), None, None, None, None);
        let predicates = facets.predicates();
        assert_eq!(predicates[0].sql, CHROMOSOME_SQL);
        assert_eq!(predicates[0].params, vec![Value::Text("1' OR '1'='1".into())]);
    }

    #[test]
    fn best_metric_uses_precedence() {
        assert!(BEST_PLI_SQL.contains("WHEN 'v4.1' THEN 0 WHEN 'v2.1.1' THEN 1 ELSE 2"));
        assert!(BEST_LOEUF_SQL.contains("c.loeuf IS NOT NULL"));
    }

    #[test]
    fn cache_key_part_distinguishes_facets() {
        let a = FacetSet::from_params(Some("9606"), None, None, None, None, None);
        let b = FacetSet::from_params(None, None, None, None, None, None);
        let c = FacetSet::from_params(Some("9606"), None, Some("tolerant"), None, None, None);
        assert_ne!(a.cache_key_part(), b.cache_key_part());
        assert_ne!(a.cache_key_part(), c.cache_key_part());
    }
}
