use serde_json::Value;

use super::error::FilterError;
use super::filter_where::validate_field_name;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"-name,email"`, `"name desc"`, arrays of those, or
    /// `{ "name": "desc" }`.
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        other => {
                            return Err(FilterError::InvalidOperatorData(format!(
                                "sort entries must be strings, got {}",
                                other
                            )))
                        }
                    }
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    validate_field_name(k)?;
                    let sort = match v.as_str().unwrap_or("asc").to_ascii_lowercase().as_str() {
                        "desc" => SortDirection::Desc,
                        _ => SortDirection::Asc,
                    };
                    out.push(FilterOrderInfo { column: k.clone(), sort });
                }
                Ok(out)
            }
            _ => Err(FilterError::InvalidOperatorData("unsupported sort format".to_string())),
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            let Some(token) = it.next() else { continue };

            let (column, mut sort) = match token.strip_prefix('-') {
                Some(column) => (column, SortDirection::Desc),
                None => (token, SortDirection::Asc),
            };
            if let Some(dir) = it.next() {
                if dir.eq_ignore_ascii_case("desc") {
                    sort = SortDirection::Desc;
                }
            }

            validate_field_name(column)?;
            out.push(FilterOrderInfo { column: column.to_string(), sort });
        }
        Ok(out)
    }

    /// ORDER BY over the `body` column; insertion order breaks ties
    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        let mut parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"body\"->'{}' {}", i.column, i.sort.to_sql()))
            .collect();
        parts.push("\"seq\" ASC".to_string());
        format!("ORDER BY {}", parts.join(", "))
    }
}
