use regex::Regex;

use crate::constants::{DEFAULT_PER_PAGE, MAX_PER_PAGE, MAX_QUERY_LENGTH};

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Trim, collapse runs of whitespace and cap the length of a free-text
/// query.
pub fn normalize_query(q: &str) -> String {
    let substring = |s: &str, len: usize| s.chars().take(len).collect::<String>();
    let collapsed = WHITESPACE_RE.replace_all(q.trim(), " ");
    substring(&collapsed, MAX_QUERY_LENGTH).trim_end().to_owned()
}

/// Quote the query as one FTS5 string and make it a prefix match.  Double
/// quotes inside the query are doubled, so it can't reach the FTS5 query
/// syntax.
pub fn fts_prefix_query(q: &str) -> String {
    format!("\"{}\"*", q.replace('"', "\"\""))
}

/// Escape LIKE metacharacters, for use with `ESCAPE '!'`.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '!' | '%' | '_' => {
                out.push('!');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Default for Pagination {
    fn default() -> Pagination {
        Pagination {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Pagination {
    /// `per_page` outside (0, 100] or absent falls back to the default or
    /// is capped, `page` is at least 1.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Pagination {
        let page = match page {
            Some(page) if page >= 1 => page as usize,
            _ => 1,
        };
        let per_page = match per_page {
            Some(per_page) if per_page > MAX_PER_PAGE as i64 => MAX_PER_PAGE,
            Some(per_page) if per_page > 0 => per_page as usize,
            _ => DEFAULT_PER_PAGE,
        };
        Pagination {
            page,
            per_page,
        }
    }

    pub fn from_params(page: Option<&str>, per_page: Option<&str>) -> Pagination {
        let parse = |value: Option<&str>| value.and_then(|v| v.trim().parse::<i64>().ok());
        Pagination::new(parse(page), parse(per_page))
    }

    /// Row offset of the first result on this page, saturating at
    /// `i64::MAX` so it always binds as a non-negative SQLite integer.
    pub fn offset(&self) -> i64 {
        let page = i64::try_from(self.page).unwrap_or(i64::MAX);
        let per_page = i64::try_from(self.per_page).unwrap_or(i64::MAX);
        (page - 1).saturating_mul(per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_normalisation() {
        assert_eq!(normalize_query("  breast\t\tcancer \n"), "breast cancer");
        assert_eq!(normalize_query("   "), "");
        let long = "a".repeat(500);
        assert_eq!(normalize_query(&long).len(), MAX_QUERY_LENGTH);
    }

    #[test]
    fn fts_quoting() {
        assert_eq!(fts_prefix_query("BRCA1"), "\"BRCA1\"*");
        assert_eq!(fts_prefix_query("a\" OR b"), "\"a\"\" OR b\"*");
        assert_eq!(fts_prefix_query("NEAR(x y)"), "\"NEAR(x y)\"*");
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_a!"), "50!%!_a!!");
        assert_eq!(escape_like("p13.2"), "p13.2");
    }

    #[test]
    fn pagination_clamping() {
        assert_eq!(Pagination::new(None, None), Pagination { page: 1, per_page: 50 });
        assert_eq!(Pagination::new(Some(0), Some(0)), Pagination { page: 1, per_page: 50 });
        assert_eq!(Pagination::new(Some(-4), Some(-1)), Pagination { page: 1, per_page: 50 });
        assert_eq!(Pagination::new(Some(3), Some(500)), Pagination { page: 3, per_page: 100 });
        assert_eq!(Pagination::new(Some(2), Some(10)).offset(), 10);
        assert_eq!(Pagination::new(Some(i64::MAX), Some(100)).offset(), i64::MAX);
        assert_eq!(Pagination::from_params(Some("9223372036854775807"), Some("1")).offset(),
                   i64::MAX - 1);
        assert_eq!(Pagination::from_params(Some("x"), Some("20")), Pagination { page: 1, per_page: 20 });
    }
}
