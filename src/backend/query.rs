//! Query and sort evaluation for the in-memory backend
//!
//! Supports the clause subset exports use in practice: `match_all`, `term`,
//! `range` and `bool` (`must`, `filter`, `should`, `must_not`). Sort clauses
//! accept `"field"`, `{"field": "desc"}`, `{"field": {"order": "asc"}}` and
//! arrays of those; `_id` sorts by record id.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::{BackendError, Result};
use crate::model::Record;

/// Compiled query clause
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    Term {
        path: String,
        value: Value,
    },
    Range {
        path: String,
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
    Bool {
        must: Vec<Query>,
        should: Vec<Query>,
        must_not: Vec<Query>,
    },
}

/// One side of a range
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub value: Value,
    pub inclusive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl Query {
    /// Compile a query clause; `None` means match-all
    pub fn parse(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Query::MatchAll),
            Some(Value::Object(clause)) => Self::parse_clause(clause),
            Some(other) => Err(BackendError::QueryFailed(format!(
                "query must be an object, got {other}"
            ))
            .into()),
        }
    }

    fn parse_clause(clause: &Map<String, Value>) -> Result<Self> {
        if clause.len() != 1 {
            return Err(BackendError::QueryFailed(format!(
                "query clause must have exactly one key, got {}",
                clause.len()
            ))
            .into());
        }
        let Some((kind, body)) = clause.iter().next() else {
            return Ok(Query::MatchAll);
        };

        match kind.as_str() {
            "match_all" => Ok(Query::MatchAll),
            "term" => Self::parse_term(body),
            "range" => Self::parse_range(body),
            "bool" => Self::parse_bool(body),
            other => Err(BackendError::UnsupportedQuery(other.to_string()).into()),
        }
    }

    fn single_field(body: &Value, kind: &str) -> Result<(String, Value)> {
        match body {
            Value::Object(map) if map.len() == 1 => {
                let (field, inner) = map
                    .iter()
                    .next()
                    .ok_or_else(|| BackendError::QueryFailed(format!("empty {kind} clause")))?;
                Ok((field.clone(), inner.clone()))
            }
            _ => Err(BackendError::QueryFailed(format!(
                "{kind} clause must name exactly one field"
            ))
            .into()),
        }
    }

    fn parse_term(body: &Value) -> Result<Self> {
        let (path, inner) = Self::single_field(body, "term")?;
        let value = match inner {
            Value::Object(mut map) => map
                .remove("value")
                .ok_or_else(|| BackendError::QueryFailed("term clause without value".into()))?,
            scalar => scalar,
        };
        Ok(Query::Term { path, value })
    }

    fn parse_range(body: &Value) -> Result<Self> {
        let (path, inner) = Self::single_field(body, "range")?;
        let Value::Object(opts) = inner else {
            return Err(BackendError::QueryFailed(format!(
                "range on '{path}' must be an object"
            ))
            .into());
        };

        let include_lower = opts
            .get("include_lower")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let include_upper = opts
            .get("include_upper")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let mut lower = None;
        let mut upper = None;
        for (key, value) in &opts {
            if value.is_null() {
                continue;
            }
            let bound = |inclusive| Some(Bound { value: value.clone(), inclusive });
            match key.as_str() {
                "gt" => lower = bound(false),
                "gte" => lower = bound(true),
                "from" => lower = bound(include_lower),
                "lt" => upper = bound(false),
                "lte" => upper = bound(true),
                "to" => upper = bound(include_upper),
                "include_lower" | "include_upper" | "format" | "boost" => {}
                other => {
                    return Err(BackendError::UnsupportedQuery(format!("range.{other}")).into());
                }
            }
        }

        Ok(Query::Range { path, lower, upper })
    }

    fn parse_bool(body: &Value) -> Result<Self> {
        let Value::Object(opts) = body else {
            return Err(BackendError::QueryFailed("bool clause must be an object".into()).into());
        };

        let mut must = Vec::new();
        let mut should = Vec::new();
        let mut must_not = Vec::new();
        for (occur, clauses) in opts {
            let target = match occur.as_str() {
                "must" | "filter" => &mut must,
                "should" => &mut should,
                "must_not" => &mut must_not,
                "minimum_should_match" | "boost" => continue,
                other => {
                    return Err(BackendError::UnsupportedQuery(format!("bool.{other}")).into());
                }
            };
            match clauses {
                Value::Array(items) => {
                    for item in items {
                        target.push(Self::parse(Some(item))?);
                    }
                }
                single @ Value::Object(_) => target.push(Self::parse(Some(single))?),
                _ => {
                    return Err(BackendError::QueryFailed(format!(
                        "bool.{occur} must be an object or array"
                    ))
                    .into());
                }
            }
        }

        Ok(Query::Bool {
            must,
            should,
            must_not,
        })
    }

    /// Evaluate the clause against a record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Term { path, value } => resolve(record, path)
                .is_some_and(|v| compare_values(v, value) == Some(Ordering::Equal)),
            Query::Range { path, lower, upper } => {
                let Some(v) = resolve(record, path) else {
                    return false;
                };
                let above = lower.as_ref().is_none_or(|b| match compare_values(v, &b.value) {
                    Some(Ordering::Greater) => true,
                    Some(Ordering::Equal) => b.inclusive,
                    _ => false,
                });
                let below = upper.as_ref().is_none_or(|b| match compare_values(v, &b.value) {
                    Some(Ordering::Less) => true,
                    Some(Ordering::Equal) => b.inclusive,
                    _ => false,
                });
                above && below
            }
            Query::Bool {
                must,
                should,
                must_not,
            } => {
                must.iter().all(|q| q.matches(record))
                    && !must_not.iter().any(|q| q.matches(record))
                    && (should.is_empty()
                        || !must.is_empty()
                        || should.iter().any(|q| q.matches(record)))
            }
        }
    }
}

/// Parse a sort clause
pub fn parse_sort(sort: Option<&Value>) -> Result<Vec<SortSpec>> {
    let Some(sort) = sort else {
        return Ok(Vec::new());
    };

    let items: Vec<&Value> = match sort {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    };

    let mut specs = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(field) => specs.push(SortSpec {
                field: field.clone(),
                order: Order::Asc,
            }),
            Value::Object(map) => {
                for (field, opts) in map {
                    let order = match opts {
                        Value::String(o) => parse_order(o)?,
                        Value::Object(o) => match o.get("order") {
                            Some(Value::String(s)) => parse_order(s)?,
                            _ => Order::Asc,
                        },
                        _ => {
                            return Err(BackendError::QueryFailed(format!(
                                "invalid sort options for '{field}'"
                            ))
                            .into());
                        }
                    };
                    specs.push(SortSpec {
                        field: field.clone(),
                        order,
                    });
                }
            }
            other => {
                return Err(BackendError::QueryFailed(format!("invalid sort clause: {other}")).into());
            }
        }
    }
    Ok(specs)
}

fn parse_order(order: &str) -> Result<Order> {
    match order.to_ascii_lowercase().as_str() {
        "asc" => Ok(Order::Asc),
        "desc" => Ok(Order::Desc),
        other => Err(BackendError::QueryFailed(format!("invalid sort order '{other}'")).into()),
    }
}

/// Compare two records under a sort specification
///
/// Records missing a sort value go last in either direction. Present values
/// follow [`sort_cmp`], which is a total order.
pub fn compare_records(a: &Record, b: &Record, sort: &[SortSpec]) -> Ordering {
    for spec in sort {
        let ord = if spec.field == "_id" {
            let (x, y) = (Value::String(a.id.clone()), Value::String(b.id.clone()));
            apply_order(sort_cmp(&x, &y), spec.order)
        } else {
            match (resolve(a, &spec.field), resolve(b, &spec.field)) {
                (Some(x), Some(y)) => apply_order(sort_cmp(x, y), spec.order),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Total order over JSON values for sorting
///
/// Values rank by kind first: numbers and numeric strings, then other
/// strings, booleans, null, and finally arrays and objects by their JSON
/// text. Within a kind, numbers compare numerically and strings lexically.
pub fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    let (rank_a, rank_b) = (sort_rank(a), sort_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_rank(value: &Value) -> u8 {
    if numeric(value).is_some() {
        return 0;
    }
    match value {
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        Value::Null => 3,
        Value::Array(_) | Value::Object(_) => 4,
        Value::Number(_) => 0,
    }
}

fn apply_order(ord: Ordering, order: Order) -> Ordering {
    match order {
        Order::Asc => ord,
        Order::Desc => ord.reverse(),
    }
}

/// Resolve a dotted path inside a record's source
///
/// A leading `<doc_type>.` segment is accepted, so `item.bbb` finds `bbb`
/// on records of type `item`.
pub fn resolve<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    if let Some(found) = get_path(&record.source, path) {
        return Some(found);
    }
    let doc_type = record.doc_type.as_deref()?;
    let rest = path.strip_prefix(doc_type)?.strip_prefix('.')?;
    get_path(&record.source, rest)
}

fn get_path<'a>(source: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = source.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Compare two JSON scalars for query matching
///
/// Numbers and numeric strings compare numerically; other strings compare
/// lexically. Values of unrelated kinds are unordered. Not a total order, so
/// sorting goes through [`sort_cmp`].
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::String(y)) | (Value::String(y), Value::Bool(x))
            if y.parse::<bool>().ok() == Some(*x) =>
        {
            Some(Ordering::Equal)
        }
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}
