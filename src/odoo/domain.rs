//! Search domains
//!
//! A domain is a conjunction of `(field, operator, value)` conditions.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    Ilike,
    In,
    NotIn,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
            Operator::In => "in",
            Operator::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    conditions: Vec<Condition>,
}

impl Domain {
    /// The empty domain, matching every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Wire form: `[[field, op, value], ...]`
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.conditions
                .iter()
                .map(|c| {
                    Value::Array(vec![
                        Value::String(c.field.clone()),
                        Value::String(c.operator.as_str().to_string()),
                        c.value.clone(),
                    ])
                })
                .collect(),
        )
    }
}
