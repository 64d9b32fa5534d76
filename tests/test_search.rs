extern crate genekb;

mod util;

use std::collections::BTreeSet;

use genekb::api::facets::FacetSet;
use genekb::api::search::search;
use genekb::api::search_utils::Pagination;
use genekb::data_types::SearchResponse;

use util::*;

fn facets(species: Option<&str>, chromosome: Option<&str>, constraint: Option<&str>,
          clinical: Option<&str>, gene_type: Option<&str>, go_category: Option<&str>)
          -> FacetSet
{
    FacetSet::from_params(species, chromosome, constraint, clinical, gene_type, go_category)
}

fn constraint(value: &str) -> FacetSet {
    facets(None, None, Some(value), None, None, None)
}

fn run(kb: &TestKb, q: &str, facets: &FacetSet) -> SearchResponse {
    search(&kb.connection(), q, facets, Pagination::new(None, Some(100))).unwrap()
}

fn gene_ids(response: &SearchResponse) -> BTreeSet<i64> {
    response.results.iter().map(|result| result.gene_id).collect()
}

#[test]
fn test_exact_symbol() {
    let kb = TestKb::built();

    let response = run(&kb, "TP53", &FacetSet::default());

    assert!(response.ranked);
    assert_eq!(response.total, 1);
    assert_eq!(response.query, "TP53");

    let result = &response.results[0];
    assert_eq!(result.gene_id, TP53);
    assert_eq!(result.trait_count, 1);
    assert_eq!(result.pli, Some(0.2));
    assert_eq!(result.loeuf, Some(0.8));
    assert_eq!(result.clinvar_pathogenic, Some(400));
    assert!(result.matched_text.as_deref().unwrap_or_default().contains("<mark>"));

    let brca1 = run(&kb, "BRCA1", &FacetSet::default());
    let result = brca1.results.iter().find(|result| result.gene_id == BRCA1).unwrap();
    assert_eq!(result.symbol.as_str(), "BRCA1");

    let lower_case = run(&kb, "  brca2 ", &FacetSet::default());
    assert_eq!(gene_ids(&lower_case), BTreeSet::from([BRCA2]));
    assert_eq!(lower_case.query, "brca2");
}

#[test]
fn test_species_filter() {
    let kb = TestKb::built();

    let everywhere = run(&kb, "breast cancer", &FacetSet::default());
    assert_eq!(gene_ids(&everywhere), BTreeSet::from([BRCA1, BRCA2, MOUSE_BRCA1]));

    let human = run(&kb, "breast cancer", &facets(Some("9606"), None, None, None, None, None));
    assert_eq!(gene_ids(&human), BTreeSet::from([BRCA1, BRCA2]));
    assert!(human.results.iter().all(|result| result.tax_id == 9606));

    let mouse = run(&kb, "breast cancer", &facets(Some("10090"), None, None, None, None, None));
    assert_eq!(gene_ids(&mouse), BTreeSet::from([MOUSE_BRCA1]));
}

#[test]
fn test_constraint_filters() {
    let kb = TestKb::built();

    // BRCA2 has no pLI in the newest release, so the older release counts
    assert_eq!(gene_ids(&run(&kb, "DNA", &constraint("essential"))),
               BTreeSet::from([BRCA1, BRCA2]));
    assert_eq!(gene_ids(&run(&kb, "DNA", &constraint("constrained"))),
               BTreeSet::from([BRCA1]));
    assert_eq!(gene_ids(&run(&kb, "DNA", &constraint("tolerant"))),
               BTreeSet::from([TP53]));

    let human_essential = facets(Some("9606"), None, Some("essential"), None, None, None);
    let response = run(&kb, "gene", &human_essential);
    assert_eq!(gene_ids(&response), BTreeSet::from([BRCA1]));
    assert!(response.results.iter().all(|result| result.pli.unwrap_or(0.0) > 0.9));

    // genes without any constraint record count as tolerant
    assert_eq!(gene_ids(&run(&kb, "BRCA1", &constraint("tolerant"))),
               BTreeSet::from([BRCA1P1, MOUSE_BRCA1]));
}

#[test]
fn test_clinical_type_and_ontology_filters() {
    let kb = TestKb::built();

    let pathogenic = facets(None, None, None, Some("pathogenic"), None, None);
    assert_eq!(gene_ids(&run(&kb, "DNA", &pathogenic)), BTreeSet::from([BRCA1, TP53]));

    let gwas = facets(None, None, None, Some("gwas"), None, None);
    assert_eq!(gene_ids(&run(&kb, "DNA", &gwas)), BTreeSet::from([BRCA1, BRCA2, TP53]));

    let pseudo = facets(None, None, None, None, Some("pseudo"), None);
    assert_eq!(gene_ids(&run(&kb, "BRCA1", &pseudo)), BTreeSet::from([BRCA1P1]));

    let ncrna = facets(None, None, None, None, Some("ncRNA"), None);
    assert_eq!(gene_ids(&run(&kb, "RNA", &ncrna)), BTreeSet::from([LINC00001]));

    let process = facets(None, None, None, None, None, Some("process"));
    assert_eq!(gene_ids(&run(&kb, "DNA", &process)), BTreeSet::from([BRCA1]));

    let function = facets(None, None, None, None, None, Some("function"));
    assert_eq!(gene_ids(&run(&kb, "DNA", &function)), BTreeSet::from([TP53]));

    let any = facets(None, None, None, None, None, Some("any"));
    assert_eq!(gene_ids(&run(&kb, "DNA", &any)), BTreeSet::from([BRCA1, TP53]));

    let chromosome = facets(None, Some("17"), None, None, None, None);
    assert_eq!(gene_ids(&run(&kb, "DNA", &chromosome)), BTreeSet::from([BRCA1, TP53]));
}

#[test]
fn test_unknown_facet_values_ignored() {
    let kb = TestKb::built();

    let unfiltered = run(&kb, "DNA", &FacetSet::default());
    let bogus = facets(Some("human"), Some(""), Some("bogus"), Some("all"), Some("gene"),
                       Some("everything"));

    assert_eq!(bogus, FacetSet::default());
    assert_eq!(gene_ids(&run(&kb, "DNA", &bogus)), gene_ids(&unfiltered));
}

#[test]
fn test_facets_only_narrow() {
    let kb = TestKb::built();

    let unfiltered = run(&kb, "DNA", &FacetSet::default());
    let unfiltered_ids = gene_ids(&unfiltered);

    let narrowed = [
        facets(Some("9606"), None, None, None, None, None),
        facets(None, Some("17"), None, None, None, None),
        constraint("essential"),
        facets(None, None, None, Some("disease"), None, None),
        facets(None, None, None, None, Some("protein-coding"), None),
        facets(Some("9606"), Some("17"), Some("essential"), Some("pathogenic"),
               Some("protein-coding"), Some("process")),
    ];

    for facet_set in &narrowed {
        let response = run(&kb, "DNA", facet_set);
        assert!(response.total <= unfiltered.total, "{}", facet_set);
        assert!(gene_ids(&response).is_subset(&unfiltered_ids), "{}", facet_set);
    }
}

#[test]
fn test_pagination_covers_every_result_once() {
    let kb = TestKb::built();
    let conn = kb.connection();
    let no_facets = FacetSet::default();

    let all = search(&conn, "DNA", &no_facets, Pagination::new(None, Some(100))).unwrap();
    assert_eq!(all.total, 3);

    let mut paged = vec![];

    for page in 1..=3 {
        let response = search(&conn, "DNA", &no_facets, Pagination::new(Some(page), Some(1))).unwrap();
        assert_eq!(response.total, 3);
        assert_eq!(response.page, page as usize);
        assert_eq!(response.results.len(), 1);
        paged.extend(response.results.into_iter().map(|result| result.gene_id));
    }

    let all_ids: Vec<i64> = all.results.iter().map(|result| result.gene_id).collect();
    assert_eq!(paged, all_ids);

    let past_end = search(&conn, "DNA", &no_facets, Pagination::new(Some(4), Some(1))).unwrap();
    assert_eq!(past_end.total, 3);
    assert!(past_end.results.is_empty());

    // an offset beyond i64::MAX must not wrap round to the first page
    let huge = search(&conn, "DNA", &no_facets,
                      Pagination::from_params(Some("9223372036854775807"), Some("100"))).unwrap();
    assert_eq!(huge.total, 3);
    assert!(huge.results.is_empty());
}

#[test]
fn test_query_syntax_is_literal() {
    let kb = TestKb::built();

    for q in ["BRCA1\" OR \"TP53", "TP53*", "NEAR(BRCA1 TP53)", "-DNA", "a:b"] {
        let response = run(&kb, q, &FacetSet::default());
        assert!(response.ranked, "{}", q);
    }

    assert_eq!(run(&kb, "   ", &FacetSet::default()).total, 0);
}

#[test]
fn test_substring_fallback() {
    let kb = TestKb::built();

    kb.connection().execute("DROP TABLE gene_fts", ()).unwrap();

    let response = run(&kb, "DNA repair", &FacetSet::default());
    assert!(!response.ranked);
    let ids: Vec<i64> = response.results.iter().map(|result| result.gene_id).collect();
    assert_eq!(ids, vec![BRCA1, BRCA2]);
    assert!(response.results.iter().all(|result| result.matched_text.is_none()));
    assert_eq!(response.results[0].pli, Some(0.95));

    let constrained = run(&kb, "DNA repair", &constraint("constrained"));
    assert_eq!(gene_ids(&constrained), BTreeSet::from([BRCA1]));
}
