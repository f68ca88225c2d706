use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::validate_field_name;
use super::types::FilterData;
use crate::config::FilterConfig;

const RESERVED: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Translate URL query parameters into a [`FilterData`].
///
/// `field=value` is equality, `field[op]=value` applies `$op`
/// (`gt`, `gte`, `lt`, `lte`, `ne`, `in`). Fields listed in `protected`
/// cannot be filtered or sorted on.
pub fn from_query(
    params: &HashMap<String, String>,
    config: &FilterConfig,
    protected: &[&str],
) -> Result<FilterData, FilterError> {
    let mut where_clause = Map::new();

    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();

    for key in keys {
        if RESERVED.contains(&key.as_str()) {
            continue;
        }
        let raw = &params[key];
        let (field, op) = split_operator(key)?;
        validate_field_name(field)?;
        if protected.contains(&field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }

        let value = match op {
            None => coerce(raw),
            Some("in") => Value::Array(raw.split(',').map(|v| coerce(v.trim())).collect()),
            Some("gt" | "gte" | "lt" | "lte" | "ne") => coerce(raw),
            Some(other) => return Err(FilterError::UnsupportedOperator(other.to_string())),
        };

        match op {
            None => {
                where_clause.insert(field.to_string(), value);
            }
            Some(op) => {
                let entry = where_clause
                    .entry(field.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                match entry {
                    Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) => {
                        ops.insert(format!("${}", op), value);
                    }
                    _ => {
                        return Err(FilterError::InvalidWhereClause(format!(
                            "{} cannot combine equality with operators",
                            field
                        )))
                    }
                }
            }
        }
    }

    let order = match params.get("sort") {
        Some(sort) => {
            let order = Value::String(sort.clone());
            for info in FilterOrder::validate_and_parse(&order)? {
                if protected.contains(&info.column.as_str()) {
                    return Err(FilterError::InvalidColumn(info.column));
                }
            }
            Some(order)
        }
        None => None,
    };

    let limit = match params.get("limit") {
        Some(limit) => limit
            .parse::<i64>()
            .ok()
            .filter(|l| *l > 0)
            .ok_or_else(|| FilterError::InvalidLimit(limit.clone()))?,
        None => config.default_limit as i64,
    }
    .min(config.max_limit as i64);

    let page = match params.get("page") {
        Some(page) => page
            .parse::<i64>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| FilterError::InvalidPage(page.clone()))?,
        None => 1,
    };

    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| FilterError::InvalidPage(page.to_string()))?;

    Ok(FilterData {
        select: select_from_query(params)?,
        where_clause: if where_clause.is_empty() { None } else { Some(Value::Object(where_clause)) },
        order,
        limit: Some(limit),
        offset: Some(offset),
    })
}

/// `fields=a,b` or `fields=+hidden`; names are checked but not restricted
pub fn select_from_query(params: &HashMap<String, String>) -> Result<Option<Vec<String>>, FilterError> {
    let Some(fields) = params.get("fields") else {
        return Ok(None);
    };

    let list: Vec<String> = fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();
    for field in &list {
        validate_field_name(field.trim_start_matches('+'))?;
    }
    Ok(Some(list))
}

fn split_operator(key: &str) -> Result<(&str, Option<&str>), FilterError> {
    match key.find('[') {
        None => Ok((key, None)),
        Some(open) => {
            let op = key[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| FilterError::InvalidColumn(key.to_string()))?;
            Ok((&key[..open], Some(op)))
        }
    }
}

fn coerce(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                return Value::Number(i.into());
            }
            match raw.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) if raw.chars().any(|c| c.is_ascii_digit()) => Value::Number(n),
                _ => Value::String(raw.to_string()),
            }
        }
    }
}
