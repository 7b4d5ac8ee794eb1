//! Changelist computation
//!
//! Rows arrive as JSON objects; foreign keys are nested objects carrying a
//! `display` key. Everything here is pure so it can be tested without a
//! database.

use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::ModelAdmin;
use crate::models::{ListParams, PagedResult};

/// Reserved query keys; everything else is a filter
const SEARCH_VAR: &str = "q";
const ORDER_VAR: &str = "o";
const PAGE_VAR: &str = "p";

static NULL: Value = Value::Null;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangelistError {
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Cannot order by: {0}")]
    UnknownOrdering(String),
}

/// Query string of a changelist request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangelistParams {
    pub search: Option<String>,
    pub filters: Vec<(String, String)>,
    pub order: Option<String>,
    pub page: Option<String>,
}

impl ChangelistParams {
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let mut filters: Vec<(String, String)> = query
            .iter()
            .filter(|(key, _)| ![SEARCH_VAR, ORDER_VAR, PAGE_VAR].contains(&key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        filters.sort();

        Self {
            search: query.get(SEARCH_VAR).cloned(),
            filters,
            order: query.get(ORDER_VAR).cloned(),
            page: query.get(PAGE_VAR).cloned(),
        }
    }
}

/// One page of a model's changelist
#[derive(Debug, Clone, Serialize)]
pub struct Changelist {
    pub model: &'static str,
    pub columns: Vec<&'static str>,
    pub ordering: Vec<String>,
    /// Rows matching search and filters
    pub count: usize,
    /// Rows before search and filters
    pub total: usize,
    /// Set when the model had more rows than the admin loads, so `count`
    /// and `total` cover only the newest ones
    pub truncated: bool,
    pub page: u32,
    pub num_pages: u32,
    pub results: Vec<Value>,
}

/// Search, filter, order and paginate `rows` the way `admin` describes
pub fn changelist(
    admin: &ModelAdmin,
    rows: Vec<Value>,
    params: &ChangelistParams,
) -> Result<Changelist, ChangelistError> {
    let total = rows.len();

    for (field, _) in &params.filters {
        if !admin.filterable(field) {
            return Err(ChangelistError::UnknownFilter(field.clone()));
        }
    }
    let ordering = resolve_ordering(admin, params.order.as_deref())?;

    let terms: Vec<String> = params
        .search
        .as_deref()
        .unwrap_or("")
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let mut matched: Vec<Value> = rows
        .into_iter()
        .filter(|row| matches_search(row, admin.search_fields, &terms))
        .filter(|row| {
            params.filters.iter().all(|(field, wanted)| {
                let is_date = admin.date_hierarchy == Some(field.as_str());
                matches_filter(lookup(row, field), wanted, is_date)
            })
        })
        .collect();

    matched.sort_by(|a, b| compare_rows(a, b, &ordering));

    let count = matched.len();
    let list = ListParams::from_query(params.page.as_deref(), admin.list_per_page)
        .clamp_to(count as i64);
    let results = matched
        .iter()
        .skip(list.offset() as usize)
        .take(list.limit() as usize)
        .map(|row| project(row, admin.list_display))
        .collect();
    let page = PagedResult::new(results, count as i64, &list);

    Ok(Changelist {
        model: admin.model.name(),
        columns: admin.list_display.to_vec(),
        ordering,
        count,
        total,
        truncated: false,
        page: page.page,
        num_pages: page.total_pages(),
        results: page.items,
    })
}

/// Requested ordering, else the admin's, else newest id first. `-id` is
/// appended as a tie-breaker so pages are stable.
fn resolve_ordering(
    admin: &ModelAdmin,
    requested: Option<&str>,
) -> Result<Vec<String>, ChangelistError> {
    let mut ordering: Vec<String> = match requested.filter(|o| !o.trim().is_empty()) {
        Some(raw) => {
            let mut fields = Vec::new();
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let field = part.trim_start_matches('-');
                if field != "id" && !admin.list_display.contains(&field) {
                    return Err(ChangelistError::UnknownOrdering(part.to_string()));
                }
                fields.push(part.to_string());
            }
            fields
        }
        None => admin.ordering.iter().map(|f| f.to_string()).collect(),
    };

    if !ordering.iter().any(|f| f.trim_start_matches('-') == "id") {
        ordering.push("-id".to_string());
    }
    Ok(ordering)
}

/// Follow a `__`-separated path through nested objects
fn lookup<'a>(row: &'a Value, path: &str) -> &'a Value {
    path.split("__")
        .try_fold(row, |value, key| value.get(key))
        .unwrap_or(&NULL)
}

/// Every term must be found in at least one search field
fn matches_search(row: &Value, fields: &[&str], terms: &[String]) -> bool {
    terms.iter().all(|term| {
        fields.iter().any(|field| match lookup(row, field) {
            Value::String(s) => s.to_lowercase().contains(term.as_str()),
            Value::Number(n) => n.to_string().contains(term.as_str()),
            _ => false,
        })
    })
}

fn matches_filter(value: &Value, wanted: &str, is_date: bool) -> bool {
    match value {
        Value::Object(related) => related
            .get("id")
            .map(|id| id.to_string() == wanted)
            .unwrap_or(false),
        Value::String(s) if is_date => s.starts_with(wanted),
        Value::String(s) => s == wanted,
        Value::Null => wanted.is_empty(),
        other => other.to_string() == wanted,
    }
}

fn compare_rows(a: &Value, b: &Value, ordering: &[String]) -> Ordering {
    for key in ordering {
        let (field, descending) = match key.strip_prefix('-') {
            Some(field) => (field, true),
            None => (key.as_str(), false),
        };
        let ord = compare_values(lookup(a, field), lookup(b, field));
        let ord = if descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Object(_), Value::Object(_)) => compare_values(display(a), display(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn display(value: &Value) -> &Value {
    value.get("display").unwrap_or(value)
}

/// Keep `id` plus the listed columns, related objects shown by name
fn project(row: &Value, columns: &[&str]) -> Value {
    let mut out = Map::new();
    out.insert("id".to_string(), lookup(row, "id").clone());
    for column in columns {
        out.insert(column.to_string(), display(lookup(row, column)).clone());
    }
    Value::Object(out)
}
