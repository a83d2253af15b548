//! Constraints collected during a conversation.
//!
//! Each constrained column of each alias carries a list of conditions. A
//! condition whose only value is [`DONT_CARE`] records that the user has no
//! preference: the column counts as answered but never filters rows.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::alias::{Alias, Slot};
use crate::db::Value;
use crate::error::{Error, Result};

/// Sentinel value meaning "no preference".
pub const DONT_CARE: &str = "__DONT_CARE__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::In => "IN",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "=" => Ok(Operator::Eq),
            "IN" => Ok(Operator::In),
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Gte),
            "<=" => Ok(Operator::Lte),
            other => Err(Error::InvalidOperation(format!("unknown operator '{other}'"))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintValue {
    DontCare,
    Value(Value),
    /// Another column, compared against instead of a bound parameter.
    Reference(Slot),
}

impl ConstraintValue {
    /// A value that actually restricts rows.
    pub fn is_real(&self) -> bool {
        match self {
            ConstraintValue::DontCare => false,
            ConstraintValue::Value(v) => !v.is_null(),
            ConstraintValue::Reference(_) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub values: Vec<ConstraintValue>,
    pub operator: Operator,
}

impl Constraint {
    /// Build a constraint from raw values.
    ///
    /// Text equal to [`DONT_CARE`] becomes the don't-care marker. With
    /// `is_reference`, text values naming a slot (`alias__column`) compare
    /// against that column.
    pub fn build(values: Vec<Value>, operator: Operator, is_reference: bool) -> Self {
        let values = values
            .into_iter()
            .map(|value| match value {
                Value::Text(ref s) if s == DONT_CARE => ConstraintValue::DontCare,
                Value::Text(ref s) if is_reference => match Slot::parse(s) {
                    Some(slot) => ConstraintValue::Reference(slot),
                    None => ConstraintValue::Value(value),
                },
                other => ConstraintValue::Value(other),
            })
            .collect();
        Self { values, operator }
    }

    pub fn eq(value: impl Into<Value>) -> Self {
        Self::build(vec![value.into()], Operator::Eq, false)
    }

    pub fn in_list(values: Vec<Value>) -> Self {
        Self::build(values, Operator::In, false)
    }

    pub fn dont_care() -> Self {
        Self {
            values: vec![ConstraintValue::DontCare],
            operator: Operator::Eq,
        }
    }

    /// True when the values are exactly the don't-care marker.
    pub fn is_dont_care(&self) -> bool {
        matches!(self.values.as_slice(), [ConstraintValue::DontCare])
    }

    pub fn has_real_value(&self) -> bool {
        self.values.iter().any(ConstraintValue::is_real)
    }
}

/// Constraints keyed by alias, then column, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constraints(IndexMap<Alias, IndexMap<String, Vec<Constraint>>>);

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, alias: Alias, column: &str, constraint: Constraint) -> &mut Self {
        self.0
            .entry(alias)
            .or_default()
            .entry(column.to_string())
            .or_default()
            .push(constraint);
        self
    }

    pub fn with(mut self, alias: Alias, column: &str, constraint: Constraint) -> Self {
        self.add(alias, column, constraint);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables().next().is_none()
    }

    /// Aliases with at least one constrained column.
    pub fn tables(&self) -> impl Iterator<Item = &Alias> {
        self.0
            .iter()
            .filter(|(_, columns)| !columns.is_empty())
            .map(|(alias, _)| alias)
    }

    pub fn columns(&self, alias: &Alias) -> impl Iterator<Item = &str> {
        self.0
            .get(alias)
            .into_iter()
            .flat_map(|columns| columns.keys().map(String::as_str))
    }

    pub fn get(&self, alias: &Alias, column: &str) -> &[Constraint] {
        self.0
            .get(alias)
            .and_then(|columns| columns.get(column))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the column has been answered, don't-care included.
    pub fn is_constrained(&self, alias: &Alias, column: &str) -> bool {
        !self.get(alias, column).is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Alias, &str, &[Constraint])> {
        self.0.iter().flat_map(|(alias, columns)| {
            columns
                .iter()
                .map(move |(column, list)| (alias, column.as_str(), list.as_slice()))
        })
    }

    /// Slot keys of every constrained column.
    pub fn slot_keys(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, _, list)| !list.is_empty())
            .map(|(alias, column, _)| alias.slot(column))
            .collect()
    }

    /// Tables holding at least one value other than don't-care.
    pub fn real(&self) -> Constraints {
        Constraints(
            self.0
                .iter()
                .filter(|(_, columns)| {
                    columns
                        .values()
                        .flatten()
                        .any(Constraint::has_real_value)
                })
                .map(|(alias, columns)| (alias.clone(), columns.clone()))
                .collect(),
        )
    }

    /// Aliases whose columns are compared against, first-mention order.
    pub fn referenced_aliases(&self) -> impl Iterator<Item = &Alias> {
        self.0
            .values()
            .flat_map(|columns| columns.values().flatten())
            .flat_map(|constraint| constraint.values.iter())
            .filter_map(|value| match value {
                ConstraintValue::Reference(slot) => Some(&slot.alias),
                _ => None,
            })
    }

    pub fn has_real(&self) -> bool {
        self.0
            .values()
            .flat_map(|columns| columns.values().flatten())
            .any(Constraint::has_real_value)
    }
}
