//! Deferred assertion engine.
//!
//! Verification code builds an [`AssertionSet`] bound to one remote object,
//! appends any number of per-attribute checks, and evaluates them once
//! against a freshly fetched [`AttributeSnapshot`]. Evaluation never
//! short-circuits: every check runs and all violations come back together,
//! so one pass shows every mismatch instead of a fix-and-rerun cycle.
//!
//! Checks are plain data until evaluation (the registered list can be
//! inspected before any snapshot exists), and evaluation is stateless:
//! running the same set twice against the same snapshot yields identical
//! reports.

use std::fmt;

use tracing::trace;

use crate::core::snapshot::AttributeSnapshot;
use crate::infrastructure::warehouse::data_types::{compare_type_expressions, TypeEquivalence};

/// Identifies the object an assertion set is bound to, for failure
/// reporting: `WAREHOUSE "LOADER"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    pub kind: String,
    pub name: String,
}

impl ObjectReference {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.kind, self.name)
    }
}

/// A single named check against one attribute path.
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    path: String,
    check: Check,
}

impl Assertion {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Human-readable description, used when listing registered checks.
    pub fn describe(&self) -> String {
        match &self.check {
            Check::ValueSet { expected } => format!("{} == {:?}", self.path, expected),
            Check::ValueNotSet => format!("{} is not set", self.path),
            Check::ValuePresent => format!("{} is present and non-empty", self.path),
            Check::IntValueSet { expected } => format!("{} == {} (int)", self.path, expected),
            Check::BoolValueSet { expected } => format!("{} == {} (bool)", self.path, expected),
            Check::FloatValueSet { expected } => format!("{} == {} (float)", self.path, expected),
            Check::DataTypeValueSet { expected } => {
                format!("{} denotes type {:?}", self.path, expected)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Check {
    ValueSet { expected: String },
    ValueNotSet,
    ValuePresent,
    IntValueSet { expected: i64 },
    BoolValueSet { expected: bool },
    FloatValueSet { expected: f64 },
    DataTypeValueSet { expected: String },
}

/// One failed assertion. `Mismatch` and the absence kinds are reported
/// distinctly so "wrong value" and "wrong shape" read differently;
/// `ParseFailure` marks a stored string that could not be interpreted as the
/// target type, which is a hard failure of that assertion but does not abort
/// its siblings.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    Mismatch { expected: String, actual: String },
    UnexpectedlyAbsent { expected: String },
    UnexpectedlyPresent { actual: String },
    ParseFailure {
        target_type: &'static str,
        raw: String,
        message: String,
    },
}

/// A violation anchored to the attribute path it was found at.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Mismatch { expected, actual } => write!(
                f,
                "{}: expected {:?}, found {:?}",
                self.path, expected, actual
            ),
            ViolationKind::UnexpectedlyAbsent { expected } => write!(
                f,
                "{}: expected {:?}, found absent",
                self.path, expected
            ),
            ViolationKind::UnexpectedlyPresent { actual } => write!(
                f,
                "{}: expected absent, found {:?}",
                self.path, actual
            ),
            ViolationKind::ParseFailure {
                target_type,
                raw,
                message,
            } => write!(
                f,
                "{}: cannot parse {:?} as {}: {}",
                self.path, raw, target_type, message
            ),
        }
    }
}

/// Aggregated outcome of evaluating one assertion set against one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    object: ObjectReference,
    violations: Vec<Violation>,
    checks_run: usize,
}

impl EvaluationReport {
    pub fn object(&self) -> &ObjectReference {
        &self.object
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn checks_run(&self) -> usize {
        self.checks_run
    }

    pub fn is_passing(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_passing() {
            return write!(f, "{}: all {} checks passed", self.object, self.checks_run);
        }
        writeln!(
            f,
            "{}: {} of {} checks failed",
            self.object,
            self.violations.len(),
            self.checks_run
        )?;
        for violation in &self.violations {
            writeln!(f, "  - {violation}")?;
        }
        Ok(())
    }
}

/// An ordered sequence of assertions bound to one logical object.
///
/// Builder calls append checks in registration order; composite builders
/// expand into their constituent checks at build time so the full list is
/// inspectable before evaluation.
#[derive(Debug, Clone)]
pub struct AssertionSet {
    object: ObjectReference,
    assertions: Vec<Assertion>,
}

impl AssertionSet {
    pub fn new(object: ObjectReference) -> Self {
        Self {
            object,
            assertions: Vec::new(),
        }
    }

    pub fn object(&self) -> &ObjectReference {
        &self.object
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    fn push(&mut self, path: impl Into<String>, check: Check) -> &mut Self {
        self.assertions.push(Assertion {
            path: path.into(),
            check,
        });
        self
    }

    /// Passes iff the snapshot has `path` and its value equals `expected`
    /// by string comparison.
    pub fn value_set(&mut self, path: impl Into<String>, expected: impl Into<String>) -> &mut Self {
        self.push(
            path,
            Check::ValueSet {
                expected: expected.into(),
            },
        )
    }

    /// Passes iff the snapshot has no entry at `path`.
    pub fn value_not_set(&mut self, path: impl Into<String>) -> &mut Self {
        self.push(path, Check::ValueNotSet)
    }

    /// Passes iff the snapshot has `path` and its value is non-empty.
    pub fn value_present(&mut self, path: impl Into<String>) -> &mut Self {
        self.push(path, Check::ValuePresent)
    }

    /// Passes iff the stored string parses as an integer equal to `expected`.
    pub fn int_value_set(&mut self, path: impl Into<String>, expected: i64) -> &mut Self {
        self.push(path, Check::IntValueSet { expected })
    }

    /// Passes iff the stored string parses as a boolean equal to `expected`.
    pub fn bool_value_set(&mut self, path: impl Into<String>, expected: bool) -> &mut Self {
        self.push(path, Check::BoolValueSet { expected })
    }

    /// Passes iff the stored string parses as a float equal to `expected`.
    pub fn float_value_set(&mut self, path: impl Into<String>, expected: f64) -> &mut Self {
        self.push(path, Check::FloatValueSet { expected })
    }

    /// Passes iff the stored string is a type expression equivalent to
    /// `expected` under synonym and default-parameter resolution, so
    /// `NUMBER(38,0)` observed matches `DECIMAL` declared.
    pub fn data_type_value_set(
        &mut self,
        path: impl Into<String>,
        expected: impl Into<String>,
    ) -> &mut Self {
        self.push(
            path,
            Check::DataTypeValueSet {
                expected: expected.into(),
            },
        )
    }

    /// Composite: asserts a repeated block has exactly `values.len()`
    /// elements with the given values in order. Expands at build time into a
    /// `path.#` count check plus one indexed check per element.
    pub fn string_list_set<S: AsRef<str>>(
        &mut self,
        path: impl Into<String>,
        values: &[S],
    ) -> &mut Self {
        let path = path.into();
        self.int_value_set(format!("{path}.#"), values.len() as i64);
        for (index, value) in values.iter().enumerate() {
            self.value_set(format!("{path}.{index}"), value.as_ref());
        }
        self
    }

    /// Runs every registered assertion against `snapshot`, in registration
    /// order, collecting all violations.
    pub fn evaluate(&self, snapshot: &AttributeSnapshot) -> EvaluationReport {
        let mut violations = Vec::new();
        for assertion in &self.assertions {
            trace!(check = %assertion.describe(), "evaluating");
            if let Some(kind) = check_one(&assertion.check, assertion.path(), snapshot) {
                violations.push(Violation {
                    path: assertion.path.clone(),
                    kind,
                });
            }
        }
        EvaluationReport {
            object: self.object.clone(),
            violations,
            checks_run: self.assertions.len(),
        }
    }
}

fn check_one(check: &Check, path: &str, snapshot: &AttributeSnapshot) -> Option<ViolationKind> {
    let actual = snapshot.get(path);
    match check {
        Check::ValueSet { expected } => match actual {
            None => Some(ViolationKind::UnexpectedlyAbsent {
                expected: expected.clone(),
            }),
            Some(actual) if actual.as_ref() != expected.as_str() => {
                Some(ViolationKind::Mismatch {
                    expected: expected.clone(),
                    actual: actual.into_owned(),
                })
            }
            Some(_) => None,
        },
        Check::ValueNotSet => actual.map(|actual| ViolationKind::UnexpectedlyPresent {
            actual: actual.into_owned(),
        }),
        Check::ValuePresent => match actual {
            None => Some(ViolationKind::UnexpectedlyAbsent {
                expected: "<non-empty value>".to_string(),
            }),
            Some(actual) if actual.is_empty() => Some(ViolationKind::Mismatch {
                expected: "<non-empty value>".to_string(),
                actual: String::new(),
            }),
            Some(_) => None,
        },
        Check::IntValueSet { expected } => typed_check(actual, "integer", *expected, |raw| {
            raw.parse::<i64>().map_err(|e| e.to_string())
        }),
        Check::BoolValueSet { expected } => typed_check(actual, "boolean", *expected, |raw| {
            raw.parse::<bool>().map_err(|e| e.to_string())
        }),
        Check::FloatValueSet { expected } => typed_check(actual, "float", *expected, |raw| {
            raw.parse::<f64>().map_err(|e| e.to_string())
        }),
        Check::DataTypeValueSet { expected } => match actual {
            None => Some(ViolationKind::UnexpectedlyAbsent {
                expected: expected.clone(),
            }),
            Some(actual) => match compare_type_expressions(actual.as_ref(), expected) {
                TypeEquivalence::Equivalent => None,
                TypeEquivalence::Different => Some(ViolationKind::Mismatch {
                    expected: expected.clone(),
                    actual: actual.into_owned(),
                }),
                TypeEquivalence::Indeterminate => Some(ViolationKind::ParseFailure {
                    target_type: "data type expression",
                    raw: actual.into_owned(),
                    message: "not a recognized type expression".to_string(),
                }),
            },
        },
    }
}

/// Shared shape of the typed-equals checks: absent is reported against the
/// expected value, an unparseable stored string is a parse failure distinct
/// from a plain mismatch.
fn typed_check<T, F>(
    actual: Option<std::borrow::Cow<'_, str>>,
    target_type: &'static str,
    expected: T,
    parse: F,
) -> Option<ViolationKind>
where
    T: PartialEq + fmt::Display,
    F: Fn(&str) -> Result<T, String>,
{
    let actual = match actual {
        None => {
            return Some(ViolationKind::UnexpectedlyAbsent {
                expected: expected.to_string(),
            })
        }
        Some(actual) => actual,
    };
    match parse(actual.as_ref()) {
        Err(message) => Some(ViolationKind::ParseFailure {
            target_type,
            raw: actual.into_owned(),
            message,
        }),
        Ok(parsed) if parsed != expected => Some(ViolationKind::Mismatch {
            expected: expected.to_string(),
            actual: actual.into_owned(),
        }),
        Ok(_) => None,
    }
}
