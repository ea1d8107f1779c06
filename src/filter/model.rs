//! Filter Model
//!
//! Typed representation of a user's filter blocks and order attributes.
//! Raw blocks arrive as strings; [`FilterExpression::parse`] checks each one
//! against the kind's registry entry and coerces operands to their
//! registered scalar type.

use super::error::FilterError;
use super::predicate::compile_patterns;
use super::registry::{FieldType, KindDef};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A typed filter operand
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    String(String),
    Bool(bool),
}

impl Scalar {
    /// Coerce a raw operand to the given field type
    pub fn parse(raw: &str, field_type: FieldType) -> Option<Scalar> {
        match field_type {
            FieldType::String => Some(Scalar::String(raw.to_string())),
            FieldType::Int => raw.trim().parse().ok().map(Scalar::Int),
            FieldType::Bool => parse_bool(raw.trim()).map(Scalar::Bool),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Scalar::Int(_) => FieldType::Int,
            Scalar::String(_) => FieldType::String,
            Scalar::Bool(_) => FieldType::Bool,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::String(v) => f.write_str(v),
            Scalar::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&Scalar> for serde_json::Value {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Int(v) => serde_json::Value::from(*v),
            Scalar::String(v) => serde_json::Value::from(v.as_str()),
            Scalar::Bool(v) => serde_json::Value::from(*v),
        }
    }
}

/// Boolean spellings accepted in filter values
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Clause comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Comparator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "regex")]
    Regex,
}

impl Comparator {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "=" | "==" => Some(Comparator::Eq),
            "!=" => Some(Comparator::NotEq),
            ">" => Some(Comparator::Gt),
            ">=" => Some(Comparator::Gte),
            "<" => Some(Comparator::Lt),
            "<=" => Some(Comparator::Lte),
            "contains" => Some(Comparator::Contains),
            "regex" | "re" => Some(Comparator::Regex),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::NotEq => "!=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Contains => "contains",
            Comparator::Regex => "regex",
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Comparator::Gt | Comparator::Gte | Comparator::Lt | Comparator::Lte
        )
    }

    /// Whether the comparator is legal for a field of the given type
    pub fn allowed_for(self, field_type: FieldType) -> bool {
        match field_type {
            FieldType::String => !self.is_relational(),
            FieldType::Int => !matches!(self, Comparator::Contains | Comparator::Regex),
            FieldType::Bool => matches!(self, Comparator::Eq | Comparator::NotEq),
        }
    }

    /// Evaluate an ordering-based comparator; `contains` and `regex` never hold here
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparator::Eq => ordering == Ordering::Equal,
            Comparator::NotEq => ordering != Ordering::Equal,
            Comparator::Gt => ordering == Ordering::Greater,
            Comparator::Gte => ordering != Ordering::Less,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Lte => ordering != Ordering::Greater,
            Comparator::Contains | Comparator::Regex => false,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a clause combines its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    AnyOf,
    AllOf,
}

impl MatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMode::AnyOf => "any_of",
            MatchMode::AllOf => "all_of",
        }
    }
}

/// One filter block exactly as the user wrote it
///
/// Operands are kept as strings; unquoted numbers and booleans in YAML or
/// JSON input are accepted and stringified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFilter {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_operands")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOperand {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn deserialize_operands<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let operands = Vec::<RawOperand>::deserialize(deserializer)?;
    Ok(operands
        .into_iter()
        .map(|operand| match operand {
            RawOperand::String(v) => v,
            RawOperand::Int(v) => v.to_string(),
            RawOperand::Float(v) => v.to_string(),
            RawOperand::Bool(v) => v.to_string(),
        })
        .collect())
}

impl RawFilter {
    pub fn new<I, S>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            match_by: None,
            comparator: None,
        }
    }

    pub fn match_by(mut self, match_by: &str) -> Self {
        self.match_by = Some(match_by.to_string());
        self
    }

    pub fn comparator(mut self, comparator: &str) -> Self {
        self.comparator = Some(comparator.to_string());
        self
    }
}

/// A typed, validated filter clause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterClause {
    pub name: String,
    pub comparator: Comparator,
    pub values: Vec<Scalar>,
    pub match_mode: MatchMode,
}

impl FilterClause {
    pub fn new(name: &str, comparator: Comparator, values: Vec<Scalar>, match_mode: MatchMode) -> Self {
        Self {
            name: name.to_string(),
            comparator,
            values,
            match_mode,
        }
    }

    /// Shorthand for an `any_of` equality clause
    pub fn eq(name: &str, values: Vec<Scalar>) -> Self {
        Self::new(name, Comparator::Eq, values, MatchMode::AnyOf)
    }

    fn operand_strings(&self) -> Vec<String> {
        self.values.iter().map(Scalar::to_string).collect()
    }

    fn sort_key(&self) -> (&str, &'static str, Vec<String>, &'static str) {
        (
            &self.name,
            self.comparator.as_str(),
            self.operand_strings(),
            self.match_mode.as_str(),
        )
    }

    fn canonical(&self) -> FilterClause {
        let mut values = self.values.clone();
        values.sort_by_key(Scalar::to_string);
        values.dedup();

        let match_mode = if values.len() == 1 {
            MatchMode::AnyOf
        } else {
            self.match_mode
        };

        FilterClause {
            name: self.name.clone(),
            comparator: self.comparator,
            values,
            match_mode,
        }
    }
}

/// Ordered list of clauses, implicitly AND-ed
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterExpression {
    clauses: Vec<FilterClause>,
}

impl FilterExpression {
    pub fn new(clauses: Vec<FilterClause>) -> Self {
        Self { clauses }
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Parse raw filter blocks against a kind definition
    pub fn parse(raw: &[RawFilter], kind: &KindDef) -> Result<Self, FilterError> {
        raw.iter()
            .enumerate()
            .map(|(index, block)| parse_clause(index, block, kind))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Deterministic normal form used for identity hashing
    ///
    /// Operands are sorted by their string form and deduplicated, single
    /// operand `all_of` becomes `any_of`, and clauses are sorted by field
    /// name, comparator and operand list with exact duplicates removed.
    pub fn canonicalize(&self) -> FilterExpression {
        let mut clauses: Vec<FilterClause> = self.clauses.iter().map(FilterClause::canonical).collect();
        clauses.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        clauses.dedup();
        FilterExpression { clauses }
    }
}

fn parse_clause(index: usize, block: &RawFilter, kind: &KindDef) -> Result<FilterClause, FilterError> {
    let Some(field) = kind.get_field(&block.name) else {
        return Err(FilterError::UnknownField {
            field: block.name.clone(),
            attribute: format!("filter[{}].name", index),
            valid: kind.filterable_names(),
        });
    };

    let (match_mode, implied) = match block.match_by.as_deref().map(str::trim) {
        None | Some("") | Some("any_of") => (MatchMode::AnyOf, None),
        Some("all_of") => (MatchMode::AllOf, None),
        Some("exact") => (MatchMode::AnyOf, Some(Comparator::Eq)),
        Some("substring") | Some("sub") => (MatchMode::AnyOf, Some(Comparator::Contains)),
        Some("regex") | Some("re") => (MatchMode::AnyOf, Some(Comparator::Regex)),
        Some(other) => {
            return Err(FilterError::OperatorNotSupported {
                field: block.name.clone(),
                comparator: other.to_string(),
                reason: "match_by must be one of any_of, all_of, exact, substring, regex".to_string(),
                attribute: format!("filter[{}].match_by", index),
            })
        }
    };

    let comparator = match block.comparator.as_deref() {
        None => implied.unwrap_or(Comparator::Eq),
        Some(raw) => {
            let Some(comparator) = Comparator::parse(raw) else {
                return Err(FilterError::OperatorNotSupported {
                    field: block.name.clone(),
                    comparator: raw.to_string(),
                    reason: "unknown comparator".to_string(),
                    attribute: format!("filter[{}].comparator", index),
                });
            };
            if implied.is_some_and(|implied| implied != comparator) {
                return Err(FilterError::OperatorNotSupported {
                    field: block.name.clone(),
                    comparator: raw.to_string(),
                    reason: format!("conflicts with match_by {:?}", block.match_by.as_deref().unwrap_or("")),
                    attribute: format!("filter[{}].comparator", index),
                });
            }
            comparator
        }
    };

    if !comparator.allowed_for(field.field_type) {
        return Err(FilterError::OperatorNotSupported {
            field: block.name.clone(),
            comparator: comparator.to_string(),
            reason: format!("not valid for {} fields", field.field_type),
            attribute: format!("filter[{}].comparator", index),
        });
    }

    if block.values.is_empty() {
        return Err(FilterError::EmptyValues {
            field: block.name.clone(),
            attribute: format!("filter[{}].values", index),
        });
    }

    let values = block
        .values
        .iter()
        .enumerate()
        .map(|(position, raw)| {
            Scalar::parse(raw, field.field_type).ok_or_else(|| FilterError::TypeMismatch {
                field: block.name.clone(),
                value: raw.clone(),
                expected: field.field_type,
                attribute: format!("filter[{}].values[{}]", index, position),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let clause = FilterClause::new(&block.name, comparator, values, match_mode);
    compile_patterns(index, &clause)?;
    Ok(clause)
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Result<Self, FilterError> {
        match raw.trim() {
            "" | "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(FilterError::InvalidOrder {
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// The `order_by` / `order` attributes of a list data source
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SortDirective {
    pub order_by: Option<String>,
    pub order: SortOrder,
}

impl SortDirective {
    pub fn new(order_by: Option<&str>, order: SortOrder) -> Self {
        Self {
            order_by: order_by.map(str::to_string),
            order,
        }
    }

    pub fn parse(order_by: Option<&str>, order: Option<&str>) -> Result<Self, FilterError> {
        let order = order.map(SortOrder::parse).transpose()?.unwrap_or_default();
        let order_by = order_by.map(str::trim).filter(|s| !s.is_empty());
        Ok(Self::new(order_by, order))
    }
}
