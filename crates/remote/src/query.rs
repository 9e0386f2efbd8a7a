use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    Gt(String, Value),
    Gte(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Declarative row selector shared by every table implementation. Mirrors the
/// generic primitives the hosted backend exposes: equality/set/range filters,
/// an order clause, a row range and an exactly-one-row expectation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, SortDirection)>,
    pub range: Option<(usize, usize)>,
    pub single: bool,
    /// Ask the backend to report an exact row count alongside the rows.
    pub count: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn in_(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.filters.push(Filter::In(column.into(), values));
        self
    }

    pub fn gt(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gt(column.into(), value.into()));
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((column.into(), direction));
        self
    }

    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.range = Some((from, to));
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| match filter {
            Filter::Eq(column, value) => row.get(column) == Some(value),
            Filter::In(column, values) => row
                .get(column)
                .map(|v| values.contains(v))
                .unwrap_or(false),
            Filter::Gt(column, value) => {
                row.get(column).is_some_and(|v| compare(v, value) == Some(std::cmp::Ordering::Greater))
            }
            Filter::Gte(column, value) => row.get(column).is_some_and(|v| {
                matches!(
                    compare(v, value),
                    Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                )
            }),
        })
    }
}

/// Orders two JSON scalars the way the backend orders column values. Numbers
/// compare numerically, strings lexically; mixed types do not compare.
pub fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn eq_and_in_filters_match() {
        let row = json!({"id": "a", "order": 2});
        assert!(Query::new().eq("id", "a").matches(&row));
        assert!(Query::new().in_("id", vec![json!("a"), json!("b")]).matches(&row));
        assert!(!Query::new().eq("id", "b").matches(&row));
    }

    #[test]
    fn gte_compares_numbers_numerically() {
        let row = json!({"order": 10});
        assert!(Query::new().gte("order", 10).matches(&row));
        assert!(Query::new().gt("order", 9).matches(&row));
        assert!(!Query::new().gt("order", 10).matches(&row));
    }
}
