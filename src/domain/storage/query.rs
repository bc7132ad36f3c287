//! Query model for document collections: filters, sorting and pagination

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::Document;

/// Comparison operators for document filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to (also matches documents without the field)
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal to
    Gte,
    /// Less than
    Lt,
    /// Less than or equal to
    Lte,
    /// Field is present
    Exists,
    /// Field is absent
    NotExists,
}

impl FilterOperator {
    /// Parse the operator suffix used in query strings (`field[gte]=...`)
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }

    fn is_range(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "!="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Exists => write!(f, "exists"),
            Self::NotExists => write!(f, "not_exists"),
        }
    }
}

/// A single field condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

/// Filter tree evaluated against top-level document fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Condition(FilterCondition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn condition(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self::Condition(FilterCondition {
            field: field.into(),
            operator,
            value: value.into(),
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, FilterOperator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::condition(field, FilterOperator::Ne, value)
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::condition(field, FilterOperator::Exists, Value::Null)
    }

    pub fn not_exists(field: impl Into<String>) -> Self {
        Self::condition(field, FilterOperator::NotExists, Value::Null)
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Self::Or(filters)
    }

    /// Matches every document
    pub fn all() -> Self {
        Self::And(Vec::new())
    }

    /// Evaluate the filter against a document
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::Condition(condition) => condition.matches(document),
            Self::And(filters) => filters.iter().all(|f| f.matches(document)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(document)),
        }
    }
}

impl FilterCondition {
    fn matches(&self, document: &Document) -> bool {
        let actual = document.get(&self.field);

        match self.operator {
            FilterOperator::Exists => actual.is_some(),
            FilterOperator::NotExists => actual.is_none(),
            FilterOperator::Eq => values_equal(actual, &self.value),
            FilterOperator::Ne => !values_equal(actual, &self.value),
            op => {
                debug_assert!(op.is_range());

                let Some(actual) = actual else {
                    return false;
                };

                match compare_same_type(actual, &self.value) {
                    Some(ordering) => match op {
                        FilterOperator::Gt => ordering == Ordering::Greater,
                        FilterOperator::Gte => ordering != Ordering::Less,
                        FilterOperator::Lt => ordering == Ordering::Less,
                        FilterOperator::Lte => ordering != Ordering::Greater,
                        _ => false,
                    },
                    None => false,
                }
            }
        }
    }
}

/// Equality where a null filter value also matches a missing field
fn values_equal(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(a), b) => a == b,
    }
}

/// Range comparison only between values of the same kind
fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Sort direction for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "asc" | "ascending" | "1" => Some(Self::Asc),
            "desc" | "descending" | "-1" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Field to order results by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Compare two documents by the sort field. Missing fields sort as null.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ordering = compare_for_sort(a.get(&self.field), b.get(&self.field));

        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Rank of a value's kind in sort order: null, numbers, strings, objects, arrays, booleans
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));

    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Some(a), Some(b)) => compare_same_type(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// A find query: filter, optional sort, skip and limit
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Option<SortOrder>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort: None,
            skip: 0,
            limit: None,
        }
    }

    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortOrder::new(field, direction));
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run the query over documents already in insertion order.
    /// The sort is stable, so ties keep insertion order.
    pub fn apply<'a, I>(&self, documents: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut matched: Vec<&Document> = documents
            .into_iter()
            .filter(|d| self.filter.matches(d))
            .collect();

        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| sort.compare(a, b));
        }

        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = self
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        matched.into_iter().skip(skip).take(limit).cloned().collect()
    }
}
