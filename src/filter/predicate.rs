//! Client-side residual predicate
//!
//! Clauses the upstream cannot evaluate are compiled against their registry
//! descriptors and run over decoded records after each page is fetched.

use super::error::FilterError;
use super::model::{parse_bool, Comparator, FilterClause, MatchMode, Scalar};
use super::registry::{FieldType, KindDef};
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone)]
struct CompiledClause {
    clause: FilterClause,
    field_type: FieldType,
    /// One compiled pattern per operand of a `regex` clause
    patterns: Vec<Regex>,
}

// Patterns are derived from the clause operands
impl PartialEq for CompiledClause {
    fn eq(&self, other: &Self) -> bool {
        self.clause == other.clause && self.field_type == other.field_type
    }
}

impl Eq for CompiledClause {}

/// Conjunction of residual clauses; empty means constant-true
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientPredicate {
    clauses: Vec<CompiledClause>,
}

impl ClientPredicate {
    /// Predicate that accepts every record
    pub fn always() -> Self {
        Self::default()
    }

    pub fn compile(clauses: &[FilterClause], kind: &KindDef) -> Result<Self, FilterError> {
        let clauses = clauses
            .iter()
            .enumerate()
            .map(|(index, clause)| {
                let field_type = check_clause(index, clause, kind)?;
                Ok(CompiledClause {
                    clause: clause.clone(),
                    field_type,
                    patterns: compile_patterns(index, clause)?,
                })
            })
            .collect::<Result<Vec<_>, FilterError>>()?;

        Ok(Self { clauses })
    }

    /// True when no residual clause remains
    pub fn is_trivial(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> impl Iterator<Item = &FilterClause> {
        self.clauses.iter().map(|c| &c.clause)
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Evaluate the predicate against one decoded record
    pub fn evaluate(&self, record: &Value) -> Result<bool, FilterError> {
        for compiled in &self.clauses {
            if !clause_matches(compiled, record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Validate a clause against the kind and return the field's type
pub(crate) fn check_clause(index: usize, clause: &FilterClause, kind: &KindDef) -> Result<FieldType, FilterError> {
    let attribute = format!("filter[{}]", index);

    let Some(field) = kind.get_field(&clause.name) else {
        return Err(FilterError::UnknownField {
            field: clause.name.clone(),
            attribute,
            valid: kind.filterable_names(),
        });
    };

    if clause.values.is_empty() {
        return Err(FilterError::EmptyValues {
            field: clause.name.clone(),
            attribute,
        });
    }

    if let Some(bad) = clause.values.iter().find(|v| v.field_type() != field.field_type) {
        return Err(FilterError::TypeMismatch {
            field: clause.name.clone(),
            value: bad.to_string(),
            expected: field.field_type,
            attribute,
        });
    }

    if !clause.comparator.allowed_for(field.field_type) {
        return Err(FilterError::OperatorNotSupported {
            field: clause.name.clone(),
            comparator: clause.comparator.to_string(),
            reason: format!("not valid for {} fields", field.field_type),
            attribute,
        });
    }

    Ok(field.field_type)
}

/// Compile the operands of a `regex` clause; other clauses have no patterns
pub(crate) fn compile_patterns(index: usize, clause: &FilterClause) -> Result<Vec<Regex>, FilterError> {
    if clause.comparator != Comparator::Regex {
        return Ok(Vec::new());
    }

    clause
        .values
        .iter()
        .enumerate()
        .map(|(position, operand)| {
            let pattern = operand.to_string();
            Regex::new(&pattern).map_err(|_| FilterError::TypeMismatch {
                field: clause.name.clone(),
                value: pattern,
                expected: FieldType::String,
                attribute: format!("filter[{}].values[{}]", index, position),
            })
        })
        .collect()
}

fn clause_matches(compiled: &CompiledClause, record: &Value) -> Result<bool, FilterError> {
    let clause = &compiled.clause;
    let field = match record.get(&clause.name) {
        None | Some(Value::Null) => return Ok(false),
        Some(field) => field,
    };

    let operand_matches = |position: usize, operand: &Scalar| -> Result<bool, FilterError> {
        let expected = Operand {
            comparator: clause.comparator,
            value: operand,
            pattern: compiled.patterns.get(position),
        };
        match field {
            // Set-valued fields (tags, capabilities) match when any element does
            Value::Array(items) => {
                for item in items {
                    if value_matches(&clause.name, compiled.field_type, item, &expected)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            scalar => value_matches(&clause.name, compiled.field_type, scalar, &expected),
        }
    };

    match clause.match_mode {
        MatchMode::AnyOf => {
            for (position, operand) in clause.values.iter().enumerate() {
                if operand_matches(position, operand)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        MatchMode::AllOf => {
            for (position, operand) in clause.values.iter().enumerate() {
                if !operand_matches(position, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

struct Operand<'a> {
    comparator: Comparator,
    value: &'a Scalar,
    pattern: Option<&'a Regex>,
}

fn value_matches(name: &str, field_type: FieldType, value: &Value, operand: &Operand<'_>) -> Result<bool, FilterError> {
    if value.is_null() {
        return Ok(false);
    }

    let Some(actual) = coerce_value(value, field_type) else {
        return Err(FilterError::TypeMismatch {
            field: name.to_string(),
            value: value.to_string(),
            expected: field_type,
            attribute: "filter".to_string(),
        });
    };

    let comparator = operand.comparator;
    let matched = match (&actual, operand.value) {
        (Scalar::String(actual), Scalar::String(expected)) => match comparator {
            Comparator::Contains => actual.contains(expected.as_str()),
            Comparator::Regex => operand.pattern.is_some_and(|re| re.is_match(actual)),
            other => other.holds(actual.as_str().cmp(expected.as_str())),
        },
        (Scalar::Int(actual), Scalar::Int(expected)) => comparator.holds(actual.cmp(expected)),
        (Scalar::Bool(actual), Scalar::Bool(expected)) => comparator.holds(actual.cmp(expected)),
        _ => false,
    };

    Ok(matched)
}

/// Interpret a record value as the registered scalar type
fn coerce_value(value: &Value, field_type: FieldType) -> Option<Scalar> {
    match (field_type, value) {
        (FieldType::String, Value::String(s)) => Some(Scalar::String(s.clone())),
        (FieldType::String, Value::Number(n)) => Some(Scalar::String(n.to_string())),
        (FieldType::String, Value::Bool(b)) => Some(Scalar::String(b.to_string())),
        (FieldType::Int, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Scalar::Int),
        (FieldType::Int, Value::String(s)) => s.trim().parse().ok().map(Scalar::Int),
        (FieldType::Bool, Value::Bool(b)) => Some(Scalar::Bool(*b)),
        (FieldType::Bool, Value::String(s)) => parse_bool(s.trim()).map(Scalar::Bool),
        _ => None,
    }
}
