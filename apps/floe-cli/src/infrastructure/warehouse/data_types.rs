//! Warehouse data-type parsing and equivalence.
//!
//! The control plane reports column types in whatever spelling it prefers
//! (`NUMBER(38,0)`), while configuration may carry any synonym
//! (`DECIMAL`, `NUMERIC`, `INT`). Comparing the raw strings would produce
//! endless spurious diffs, so type expressions are parsed into a
//! [`TypedValueSpec`] and compared with synonym resolution and default
//! parameter filling.
//!
//! Everything here is pure: no I/O, total over any input string. An
//! expression that does not parse yields [`TypeEquivalence::Indeterminate`]
//! rather than an error, and boolean callers treat that as "not equivalent".

use lazy_static::lazy_static;
use std::collections::HashMap;
use thiserror::Error;

/// Default precision applied when a numeric type omits it: `NUMBER` means
/// `NUMBER(38,0)`.
pub const DEFAULT_NUMERIC_PRECISION: u32 = 38;

/// Default scale applied when a numeric type omits it.
pub const DEFAULT_NUMERIC_SCALE: u32 = 0;

/// Default length applied when a text type omits it: `VARCHAR` means
/// `VARCHAR(16777216)`.
pub const DEFAULT_TEXT_LENGTH: u32 = 16_777_216;

/// The parameter shape of a type family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    /// Optional precision and scale (`NUMBER(38,0)`).
    Numeric,
    /// Optional length (`VARCHAR(30)`).
    Text,
    /// No parameters (`BOOLEAN`, `FLOAT`, `DATE`, ...).
    Scalar,
}

lazy_static! {
    /// Synonym table: alternate spelling -> (canonical base name, family).
    /// Keys are uppercase; lookups case-fold first.
    static ref TYPE_SYNONYMS: HashMap<&'static str, (&'static str, TypeFamily)> = {
        let mut table = HashMap::new();
        // Numeric family: every spelling denotes the same fixed-point type.
        for name in ["NUMBER", "DECIMAL", "NUMERIC", "DEC"] {
            table.insert(name, ("NUMBER", TypeFamily::Numeric));
        }
        for name in ["INT", "INTEGER", "BIGINT", "SMALLINT", "TINYINT", "BYTEINT"] {
            table.insert(name, ("NUMBER", TypeFamily::Numeric));
        }
        // Text family.
        for name in ["VARCHAR", "STRING", "TEXT", "CHAR", "CHARACTER"] {
            table.insert(name, ("VARCHAR", TypeFamily::Text));
        }
        // Parameterless scalar families, one canonical name per alias group.
        for name in ["FLOAT", "FLOAT4", "FLOAT8", "DOUBLE", "REAL"] {
            table.insert(name, ("FLOAT", TypeFamily::Scalar));
        }
        for name in ["BOOLEAN", "BOOL"] {
            table.insert(name, ("BOOLEAN", TypeFamily::Scalar));
        }
        for name in ["TIMESTAMP", "DATETIME", "TIMESTAMP_NTZ"] {
            table.insert(name, ("TIMESTAMP_NTZ", TypeFamily::Scalar));
        }
        table.insert("TIMESTAMP_LTZ", ("TIMESTAMP_LTZ", TypeFamily::Scalar));
        table.insert("TIMESTAMP_TZ", ("TIMESTAMP_TZ", TypeFamily::Scalar));
        table.insert("DATE", ("DATE", TypeFamily::Scalar));
        table.insert("TIME", ("TIME", TypeFamily::Scalar));
        for name in ["BINARY", "VARBINARY"] {
            table.insert(name, ("BINARY", TypeFamily::Scalar));
        }
        table.insert("VARIANT", ("VARIANT", TypeFamily::Scalar));
        table.insert("OBJECT", ("OBJECT", TypeFamily::Scalar));
        table.insert("ARRAY", ("ARRAY", TypeFamily::Scalar));
        table
    };
}

/// Errors produced while parsing a type expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TypeParseError {
    #[error("empty type expression")]
    Empty,

    #[error("unknown base type name '{0}'")]
    UnknownBaseName(String),

    #[error("type '{type_name}' takes at most {max} parameter(s), found {found}")]
    TooManyParameters {
        type_name: String,
        max: usize,
        found: usize,
    },

    #[error("invalid parameter '{value}' in '{type_name}'")]
    InvalidParameter { type_name: String, value: String },

    #[error("malformed type expression '{0}'")]
    Malformed(String),
}

/// A parsed textual type expression: canonical synonym-group name plus any
/// explicit numeric parameters. Never mutated after parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedValueSpec {
    pub canonical_name: &'static str,
    pub family: TypeFamily,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub length: Option<u32>,
}

impl TypedValueSpec {
    /// Precision with the family default applied.
    pub fn resolved_precision(&self) -> u32 {
        self.precision.unwrap_or(DEFAULT_NUMERIC_PRECISION)
    }

    /// Scale with the family default applied.
    pub fn resolved_scale(&self) -> u32 {
        self.scale.unwrap_or(DEFAULT_NUMERIC_SCALE)
    }

    /// Length with the family default applied.
    pub fn resolved_length(&self) -> u32 {
        self.length.unwrap_or(DEFAULT_TEXT_LENGTH)
    }
}

/// Outcome of comparing two type expressions.
///
/// `Indeterminate` means at least one side did not parse; callers that only
/// care about diff suppression fold it into "not equivalent", but callers
/// that report to users can distinguish "proven different" from "could not
/// determine".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeEquivalence {
    Equivalent,
    Different,
    Indeterminate,
}

/// Parses a type expression such as `NUMBER`, `DECIMAL(30,2)` or
/// `VARCHAR(30)` into a [`TypedValueSpec`].
pub fn parse_type_expression(expr: &str) -> Result<TypedValueSpec, TypeParseError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(TypeParseError::Empty);
    }

    let (base, params) = match expr.find('(') {
        None => {
            if expr.contains(')') {
                return Err(TypeParseError::Malformed(expr.to_string()));
            }
            (expr, Vec::new())
        }
        Some(open) => {
            let base = expr[..open].trim_end();
            let rest = &expr[open + 1..];
            let close = rest
                .rfind(')')
                .ok_or_else(|| TypeParseError::Malformed(expr.to_string()))?;
            if !rest[close + 1..].trim().is_empty() {
                return Err(TypeParseError::Malformed(expr.to_string()));
            }
            let inner = rest[..close].trim();
            if inner.is_empty() {
                return Err(TypeParseError::Malformed(expr.to_string()));
            }
            let params = inner
                .split(',')
                .map(|p| {
                    let p = p.trim();
                    p.parse::<u32>().map_err(|_| TypeParseError::InvalidParameter {
                        type_name: base.to_string(),
                        value: p.to_string(),
                    })
                })
                .collect::<Result<Vec<u32>, TypeParseError>>()?;
            (base, params)
        }
    };

    let upper = base.to_ascii_uppercase();
    let (canonical_name, family) = TYPE_SYNONYMS
        .get(upper.as_str())
        .copied()
        .ok_or_else(|| TypeParseError::UnknownBaseName(base.to_string()))?;

    let max_params = match family {
        TypeFamily::Numeric => 2,
        TypeFamily::Text => 1,
        TypeFamily::Scalar => 0,
    };
    if params.len() > max_params {
        return Err(TypeParseError::TooManyParameters {
            type_name: base.to_string(),
            max: max_params,
            found: params.len(),
        });
    }

    Ok(match family {
        TypeFamily::Numeric => TypedValueSpec {
            canonical_name,
            family,
            precision: params.first().copied(),
            scale: params.get(1).copied(),
            length: None,
        },
        TypeFamily::Text => TypedValueSpec {
            canonical_name,
            family,
            precision: None,
            scale: None,
            length: params.first().copied(),
        },
        TypeFamily::Scalar => TypedValueSpec {
            canonical_name,
            family,
            precision: None,
            scale: None,
            length: None,
        },
    })
}

/// Compares two type expressions for equivalence.
///
/// Synonyms resolve to one canonical base name per group; missing numeric
/// precision/scale and text length fall back to the documented defaults.
/// Expressions that do not parse yield `Indeterminate`, never an error.
pub fn compare_type_expressions(old_expr: &str, new_expr: &str) -> TypeEquivalence {
    let (old, new) = match (parse_type_expression(old_expr), parse_type_expression(new_expr)) {
        (Ok(old), Ok(new)) => (old, new),
        _ => return TypeEquivalence::Indeterminate,
    };

    if old.canonical_name != new.canonical_name {
        return TypeEquivalence::Different;
    }

    let matches = match old.family {
        TypeFamily::Numeric => {
            old.resolved_precision() == new.resolved_precision()
                && old.resolved_scale() == new.resolved_scale()
        }
        TypeFamily::Text => old.resolved_length() == new.resolved_length(),
        TypeFamily::Scalar => true,
    };

    if matches {
        TypeEquivalence::Equivalent
    } else {
        TypeEquivalence::Different
    }
}

/// Boolean view of [`compare_type_expressions`] for diff suppression.
///
/// A `false` result can mean "proven different" or "could not determine";
/// callers that need the distinction should use the three-valued form.
pub fn are_equivalent(old_expr: &str, new_expr: &str) -> bool {
    compare_type_expressions(old_expr, new_expr) == TypeEquivalence::Equivalent
}
