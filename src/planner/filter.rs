//! WHERE clause construction.
//!
//! Conditions are emitted in alias → column → constraint order and joined
//! with AND. Values are never inlined: each constraint binds one parameter,
//! named `param0`, `param1`, ... in emission order, and each bound value gets
//! its own placeholder.

use serde::Serialize;

use crate::alias::Alias;
use crate::constraint::{Constraint, ConstraintValue, Constraints, Operator};
use crate::db::Value;
use crate::sql::{placeholder, table_col, BinaryOperator, Expr, ExprExt};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BoundValue {
    Scalar(Value),
    /// IN lists and multi-value conditions; one placeholder per element.
    List(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundParam {
    pub name: String,
    pub value: BoundValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub condition: Option<Expr>,
    pub params: Vec<BoundParam>,
}

impl WhereClause {
    pub fn values(&self) -> Vec<Value> {
        flatten(&self.params)
    }
}

pub(crate) fn flatten(params: &[BoundParam]) -> Vec<Value> {
    params
        .iter()
        .flat_map(|p| match &p.value {
            BoundValue::Scalar(v) => vec![v.clone()],
            BoundValue::List(vs) => vs.clone(),
        })
        .collect()
}

/// Build the WHERE condition for the constraints on `joined` aliases.
///
/// Constraints on aliases outside the join are ignored, as are don't-care
/// constraints and constraints referencing a column of an alias outside the
/// join.
pub fn build_where(constraints: &Constraints, joined: &[Alias]) -> WhereClause {
    let mut clause = WhereClause::default();
    let mut next_placeholder = 1;

    for (alias, column, list) in constraints.iter() {
        if !joined.contains(alias) {
            continue;
        }
        for constraint in list {
            if let Some(missing) = unjoined_reference(constraint, joined) {
                tracing::debug!(
                    %alias,
                    column,
                    reference = %missing,
                    "skipping constraint that references an unjoined alias"
                );
                continue;
            }
            if let Some(condition) = condition(
                alias,
                column,
                constraint,
                &mut clause.params,
                &mut next_placeholder,
            ) {
                clause.condition = Some(match clause.condition.take() {
                    Some(existing) => existing.and(condition),
                    None => condition,
                });
            }
        }
    }

    clause
}

fn unjoined_reference<'c>(constraint: &'c Constraint, joined: &[Alias]) -> Option<&'c Alias> {
    constraint.values.iter().find_map(|value| match value {
        ConstraintValue::Reference(slot) if !joined.contains(&slot.alias) => Some(&slot.alias),
        _ => None,
    })
}

fn condition(
    alias: &Alias,
    column: &str,
    constraint: &Constraint,
    params: &mut Vec<BoundParam>,
    next_placeholder: &mut usize,
) -> Option<Expr> {
    if constraint.is_dont_care() {
        return None;
    }

    let mut operands = vec![];
    let mut values = vec![];
    for value in &constraint.values {
        match value {
            ConstraintValue::DontCare => {}
            ConstraintValue::Reference(slot) => {
                operands.push(table_col(&slot.alias.to_string(), &slot.column));
            }
            ConstraintValue::Value(v) => {
                operands.push(placeholder(*next_placeholder));
                *next_placeholder += 1;
                values.push(v.clone());
            }
        }
    }
    if operands.is_empty() {
        return None;
    }

    let is_list = constraint.operator == Operator::In || operands.len() > 1;
    if !values.is_empty() {
        let value = if is_list {
            BoundValue::List(values)
        } else {
            BoundValue::Scalar(values.remove(0))
        };
        params.push(BoundParam {
            name: format!("param{}", params.len()),
            value,
        });
    }

    let lhs = table_col(&alias.to_string(), column);
    let expr = match constraint.operator {
        Operator::In => lhs.in_list(operands),
        op => {
            let rhs = if is_list {
                Expr::Tuple(operands)
            } else {
                operands.remove(0)
            };
            lhs.binary(binary_operator(op), rhs)
        }
    };
    Some(expr)
}

fn binary_operator(op: Operator) -> BinaryOperator {
    match op {
        Operator::Eq | Operator::In => BinaryOperator::Eq,
        Operator::Gt => BinaryOperator::Gt,
        Operator::Lt => BinaryOperator::Lt,
        Operator::Gte => BinaryOperator::Gte,
        Operator::Lte => BinaryOperator::Lte,
    }
}
