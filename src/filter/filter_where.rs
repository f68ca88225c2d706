use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOp, FilterWhereInfo};

static FIELD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field name pattern"));

/// Parsed condition tree shared by the SQL generator and the in-memory matcher
#[derive(Debug, Clone)]
pub enum Condition {
    Field(FilterWhereInfo),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

pub fn validate_field_name(field: &str) -> Result<(), FilterError> {
    if FIELD_NAME.is_match(field) {
        Ok(())
    } else {
        Err(FilterError::InvalidColumn(field.to_string()))
    }
}

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Generate a SQL predicate over the `body` JSONB column. Placeholders are
    /// numbered after `starting_param_index`.
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let condition = Self::parse(where_data)?;
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build_sql(&condition)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn parse(where_data: &Value) -> Result<Condition, FilterError> {
        match where_data {
            Value::Null => Ok(Condition::And(vec![])),
            Value::Object(obj) => {
                let mut conditions = Vec::with_capacity(obj.len());
                for (key, value) in obj {
                    if key.starts_with('$') {
                        conditions.push(Self::parse_logical_operator(key, value)?);
                    } else {
                        conditions.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(match conditions.len() {
                    1 => conditions.remove(0),
                    _ => Condition::And(conditions),
                })
            }
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Condition, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let children = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { Condition::And(children) } else { Condition::Or(children) })
            }
            "$not" => Ok(Condition::Not(Box::new(Self::parse(value)?))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Condition>, FilterError> {
        validate_field_name(field)?;

        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                let mut out = Vec::with_capacity(obj.len());
                for (op_key, op_val) in obj {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    if operator == FilterOp::In && !op_val.is_array() {
                        return Err(FilterError::InvalidOperatorData("$in requires array".to_string()));
                    }
                    out.push(Condition::Field(FilterWhereInfo {
                        column: field.to_string(),
                        operator,
                        data: op_val.clone(),
                    }));
                }
                Ok(out)
            }
            // Implicit equality: { field: value }
            _ => Ok(vec![Condition::Field(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            })]),
        }
    }

    fn build_sql(&mut self, condition: &Condition) -> Result<String, FilterError> {
        match condition {
            Condition::And(children) if children.is_empty() => Ok("TRUE".to_string()),
            Condition::Or(children) if children.is_empty() => Ok("FALSE".to_string()),
            Condition::And(children) | Condition::Or(children) => {
                let joiner = if matches!(condition, Condition::And(_)) { " AND " } else { " OR " };
                let parts = children
                    .iter()
                    .map(|child| self.build_sql(child).map(|sql| format!("({})", sql)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(parts.join(joiner))
            }
            // Missing fields evaluate to NULL; treat them as non-matching before negating
            Condition::Not(child) => Ok(format!("NOT COALESCE(({}), FALSE)", self.build_sql(child)?)),
            Condition::Field(info) => self.build_field_sql(info),
        }
    }

    fn build_field_sql(&mut self, info: &FilterWhereInfo) -> Result<String, FilterError> {
        validate_field_name(&info.column)?;
        let column = format!("\"body\"->'{}'", info.column);

        Ok(match info.operator {
            FilterOp::Eq if info.data.is_null() => {
                format!("({} IS NULL OR {} = 'null'::jsonb)", column, column)
            }
            FilterOp::Eq => format!("{} = {}", column, self.param(info.data.clone())),
            FilterOp::Ne if info.data.is_null() => {
                format!("({} IS NOT NULL AND {} <> 'null'::jsonb)", column, column)
            }
            FilterOp::Ne => format!("{} IS DISTINCT FROM {}", column, self.param(info.data.clone())),
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let op = match info.operator {
                    FilterOp::Gt => ">",
                    FilterOp::Gte => ">=",
                    FilterOp::Lt => "<",
                    _ => "<=",
                };
                let param = self.param(info.data.clone());
                // jsonb orders across types; only compare like with like
                format!(
                    "(jsonb_typeof({}) = jsonb_typeof({}) AND {} {} {})",
                    column, param, column, op, param
                )
            }
            FilterOp::In => match &info.data {
                Value::Array(values) if values.is_empty() => "FALSE".to_string(),
                Value::Array(values) => {
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                    format!("{} IN ({})", column, params.join(", "))
                }
                _ => return Err(FilterError::InvalidOperatorData("$in requires array".to_string())),
            },
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}::jsonb", self.param_index)
    }
}
