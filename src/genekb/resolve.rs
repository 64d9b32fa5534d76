use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde::Serialize;

use crate::types::{GeneId, TaxonId};

/// Outcome of matching one source row against the gene catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    BySymbol(GeneId),
    ById(GeneId),
    Unmatched,
}

impl Resolution {
    pub fn gene_id(&self) -> Option<GeneId> {
        match self {
            Resolution::BySymbol(gene_id) | Resolution::ById(gene_id) => Some(*gene_id),
            Resolution::Unmatched => None,
        }
    }
}

/// Maps source symbols and numeric ids to catalog gene ids.
///
/// Symbols are only looked up among the genes of one species (the resolver
/// species).  Rows for other species that share a symbol with a gene of the
/// resolver species will match that gene.  When two genes of the resolver
/// species share a symbol (case-insensitively) the lowest gene id wins.
///
/// The numeric id fallback accepts any id present in the catalog,
/// regardless of species.
pub struct SymbolMap {
    tax_id: TaxonId,
    symbols: HashMap<String, GeneId>,
    gene_ids: HashSet<GeneId>,
}

fn normalise_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

impl SymbolMap {
    pub fn new<'a>(tax_id: TaxonId,
                   symbols: impl IntoIterator<Item = (GeneId, &'a str)>,
                   gene_ids: impl IntoIterator<Item = GeneId>)
                   -> SymbolMap
    {
        let mut sorted_symbols: Vec<_> = symbols.into_iter().collect();
        sorted_symbols.sort_by_key(|(gene_id, _)| *gene_id);

        let mut symbol_map = HashMap::new();
        for (gene_id, symbol) in sorted_symbols {
            symbol_map.entry(normalise_symbol(symbol)).or_insert(gene_id);
        }

        SymbolMap {
            tax_id,
            symbols: symbol_map,
            gene_ids: gene_ids.into_iter().collect(),
        }
    }

    pub fn load(conn: &Connection, tax_id: TaxonId) -> rusqlite::Result<SymbolMap> {
        let mut stmt = conn.prepare("SELECT gene_id, symbol FROM genes WHERE tax_id = ?1 ORDER BY gene_id")?;
        let symbol_rows = stmt.query_map([tax_id], |row| Ok((row.get::<_, GeneId>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare("SELECT gene_id FROM genes")?;
        let gene_ids = stmt.query_map((), |row| row.get::<_, GeneId>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let symbol_map = SymbolMap::new(tax_id,
                                        symbol_rows.iter().map(|(id, symbol)| (*id, symbol.as_str())),
                                        gene_ids);

        tracing::debug!(tax_id = symbol_map.tax_id, symbols = symbol_map.symbols.len(),
                        genes = symbol_map.gene_ids.len(), "built symbol map");

        Ok(symbol_map)
    }

    /// Match by case-insensitive symbol first, then by numeric id.
    pub fn resolve(&self, symbol: Option<&str>, gene_id: Option<&str>) -> Resolution {
        if let Some(symbol) = symbol {
            if let Some(gene_id) = self.symbols.get(&normalise_symbol(symbol)) {
                return Resolution::BySymbol(*gene_id);
            }
        }

        let id = gene_id
            .and_then(|id| id.trim().parse::<GeneId>().ok())
            .filter(|id| *id > 0 && self.gene_ids.contains(id));

        match id {
            Some(id) => Resolution::ById(id),
            None => Resolution::Unmatched,
        }
    }
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub by_symbol: usize,
    pub by_id: usize,
    pub unmatched: usize,
}

impl MatchStats {
    pub fn record(&mut self, resolution: &Resolution) {
        match resolution {
            Resolution::BySymbol(_) => self.by_symbol += 1,
            Resolution::ById(_) => self.by_id += 1,
            Resolution::Unmatched => self.unmatched += 1,
        }
    }

    pub fn matched(&self) -> usize {
        self.by_symbol + self.by_id
    }

    pub fn total(&self) -> usize {
        self.matched() + self.unmatched
    }

    pub fn match_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.matched() as f64 / self.total() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_map() -> SymbolMap {
        SymbolMap::new(9606,
                       vec![(672, "BRCA1"), (7157, "TP53"), (9999, "brca1")],
                       vec![672, 7157, 9999, 12189])
    }

    #[test]
    fn symbol_first() {
        let map = make_map();
        assert_eq!(map.resolve(Some("tp53"), None), Resolution::BySymbol(7157));
        assert_eq!(map.resolve(Some(" TP53 "), Some("12189")), Resolution::BySymbol(7157));
    }

    #[test]
    fn lowest_id_wins_collisions() {
        let map = make_map();
        assert_eq!(map.resolve(Some("Brca1"), None), Resolution::BySymbol(672));
    }

    #[test]
    fn id_fallback() {
        let map = make_map();
        // a mouse gene id is accepted even though its symbol is not in the map
        assert_eq!(map.resolve(Some("Brca1-ps"), Some("12189")), Resolution::ById(12189));
        assert_eq!(map.resolve(None, Some("12189")), Resolution::ById(12189));
        assert_eq!(map.resolve(Some("NOPE"), Some("-1")), Resolution::Unmatched);
        assert_eq!(map.resolve(Some("NOPE"), Some("424242")), Resolution::Unmatched);
        assert_eq!(map.resolve(None, Some("abc")), Resolution::Unmatched);
    }

    #[test]
    fn stats() {
        let map = make_map();
        let mut stats = MatchStats::default();
        for (symbol, id) in [(Some("BRCA1"), None), (None, Some("12189")), (Some("X"), None), (Some("Y"), None)] {
            stats.record(&map.resolve(symbol, id));
        }
        assert_eq!(stats.matched(), 2);
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.match_rate(), 0.5);
        assert_eq!(MatchStats::default().match_rate(), 0.0);
    }
}
