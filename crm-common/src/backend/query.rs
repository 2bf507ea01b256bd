//! Query builder shared by the REST and in-memory backends

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `"desc"` (any case) is descending, anything else ascending
    pub fn parse_lenient(text: &str) -> Self {
        if text.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    Gte(String, Value),
    Lte(String, Value),
    /// `true` = column is null, `false` = column is not null
    IsNull(String, bool),
    /// Case-insensitive substring match on any of the columns
    Search(Vec<String>, String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub columns: Option<Vec<String>>,
    pub filters: Vec<Filter>,
    pub order: Vec<(String, SortOrder)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn in_list<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter::In(
            column.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.into(), value.into()));
        self
    }

    pub fn lte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(column.into(), value.into()));
        self
    }

    pub fn is_null(mut self, column: impl Into<String>, null: bool) -> Self {
        self.filters.push(Filter::IsNull(column.into(), null));
        self
    }

    /// Free-text search; a blank term adds no filter
    pub fn search(mut self, columns: &[&str], term: &str) -> Self {
        let term = term.trim();
        if !term.is_empty() && !columns.is_empty() {
            self.filters.push(Filter::Search(
                columns.iter().map(|c| c.to_string()).collect(),
                term.to_string(),
            ));
        }
        self
    }

    pub fn order(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn range(mut self, offset: usize, count: usize) -> Self {
        self.offset = Some(offset);
        self.limit = Some(count);
        self
    }

    /// Same filters, no ordering or paging (used for counts)
    pub fn filters_only(&self) -> Query {
        Query {
            filters: self.filters.clone(),
            ..Query::default()
        }
    }

    /// Query-string parameters in the REST dialect (`col=eq.value`, `order=..`)
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        let select = self
            .columns
            .as_ref()
            .map(|cols| cols.join(","))
            .unwrap_or_else(|| "*".to_string());
        params.push(("select".to_string(), select));

        for filter in &self.filters {
            params.push(match filter {
                Filter::Eq(col, v) => (col.clone(), format!("eq.{}", literal(v))),
                Filter::In(col, values) => {
                    let items: Vec<String> = values.iter().map(quoted_literal).collect();
                    (col.clone(), format!("in.({})", items.join(",")))
                }
                Filter::Gte(col, v) => (col.clone(), format!("gte.{}", literal(v))),
                Filter::Lte(col, v) => (col.clone(), format!("lte.{}", literal(v))),
                Filter::IsNull(col, true) => (col.clone(), "is.null".to_string()),
                Filter::IsNull(col, false) => (col.clone(), "not.is.null".to_string()),
                Filter::Search(cols, term) => {
                    let term = sanitize_pattern(term);
                    let clauses: Vec<String> = cols
                        .iter()
                        .map(|c| format!("{}.ilike.*{}*", c, term))
                        .collect();
                    ("or".to_string(), format!("({})", clauses.join(",")))
                }
            });
        }

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(col, dir)| format!("{}.{}", col, dir.as_str()))
                .collect();
            params.push(("order".to_string(), order.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }

        params
    }
}

/// Scalar rendered for a filter operand
pub(crate) fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn quoted_literal(value: &Value) -> String {
    let text = literal(value);
    if text.contains(',') || text.contains('(') || text.contains(')') || text.contains('"') {
        format!("\"{}\"", text.replace('"', "\\\""))
    } else {
        text
    }
}

/// Characters with meaning inside an `or=(..)` group are dropped from search terms
fn sanitize_pattern(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_for_filtered_sorted_page() {
        let query = Query::new()
            .eq("stage", "proposal")
            .search(&["title", "notes"], "acme")
            .order("created_at", SortOrder::Desc)
            .range(50, 50);

        let params = query.to_params();
        assert_eq!(params[0], ("select".to_string(), "*".to_string()));
        assert!(params.contains(&("stage".to_string(), "eq.proposal".to_string())));
        assert!(params.contains(&(
            "or".to_string(),
            "(title.ilike.*acme*,notes.ilike.*acme*)".to_string()
        )));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "50".to_string())));
        assert!(params.contains(&("offset".to_string(), "50".to_string())));
    }

    #[test]
    fn test_search_term_is_sanitized() {
        let params = Query::new().search(&["name"], "a,b(c)*").to_params();
        assert_eq!(params[1].1, "(name.ilike.*abc*)");
    }

    #[test]
    fn test_blank_search_adds_nothing() {
        assert!(Query::new().search(&["name"], "  ").filters.is_empty());
    }

    #[test]
    fn test_in_list_quotes_commas() {
        let params = Query::new().in_list("name", ["Acme, Inc.", "Globex"]).to_params();
        assert_eq!(params[1].1, "in.(\"Acme, Inc.\",Globex)");
    }

    #[test]
    fn test_filters_only_drops_paging() {
        let query = Query::new().eq("status", "new").limit(5).order("id", SortOrder::Asc);
        let counted = query.filters_only();
        assert_eq!(counted.filters.len(), 1);
        assert!(counted.limit.is_none());
        assert!(counted.order.is_empty());
    }
}
