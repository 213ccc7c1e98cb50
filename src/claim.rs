//! Claims: named tuples of arguments.
//!
//! A claim name is a template string in which every `@` marks an argument
//! position, e.g. `"@ is father of @"`. A claim whose arguments are all
//! constants is a ground fact; otherwise it is a pattern.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Prefix that turns a variable into a capture slot.
pub const CAPTURE_SLOT_PREFIX: char = '?';

/// Placeholder marking an argument position inside a claim name.
pub const ARG_PLACEHOLDER: char = '@';

/// Identifier of the program that owns a claim or rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(String);

impl ProgramId {
    /// Source id of facts supplied by the engine itself.
    pub const CORE: &'static str = "core";

    /// Creates a program id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id attributed to base facts and engine diagnostics.
    #[must_use]
    pub fn core() -> Self {
        Self(Self::CORE.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProgramId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for ProgramId {
    fn from(v: String) -> Self {
        Self(v)
    }
}

impl From<u32> for ProgramId {
    fn from(v: u32) -> Self {
        Self(v.to_string())
    }
}

impl From<&ProgramId> for Value {
    fn from(v: &ProgramId) -> Self {
        Self::String(v.0.clone())
    }
}

/// A claim argument: a constant or a named variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Arg {
    Constant(Value),
    Variable(String),
}

impl Arg {
    /// Creates a constant argument.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    /// Creates a variable argument. Prefix the name with `?` for a capture slot.
    #[must_use]
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub const fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    pub const fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// True for variables whose name starts with `?`.
    #[must_use]
    pub fn is_capture_slot(&self) -> bool {
        matches!(self, Self::Variable(name) if name.starts_with(CAPTURE_SLOT_PREFIX))
    }

    pub const fn as_constant(&self) -> Option<&Value> {
        match self {
            Self::Constant(v) => Some(v),
            Self::Variable(_) => None,
        }
    }

    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            Self::Constant(_) => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "{v}"),
            Self::Variable(name) => write!(f, "{{{name}}}"),
        }
    }
}

/// Shorthand for [`Arg::variable`].
#[must_use]
pub fn var(name: impl Into<String>) -> Arg {
    Arg::variable(name)
}

/// Shorthand for [`Arg::constant`].
#[must_use]
pub fn val(value: impl Into<Value>) -> Arg {
    Arg::constant(value)
}

/// A named tuple of arguments owned by a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub name: String,
    pub args: Vec<Arg>,
    pub source: ProgramId,
    #[serde(default)]
    pub is_dynamic: bool,
}

impl Claim {
    /// Creates a static claim owned by `core`.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            name: name.into(),
            args,
            source: ProgramId::core(),
            is_dynamic: false,
        }
    }

    /// Creates a ground fact from plain values.
    #[must_use]
    pub fn fact<V: Into<Value>>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(name, values.into_iter().map(Arg::constant).collect())
    }

    /// Creates a wish: `"@ wishes " + name`, with the wishing program as first argument.
    #[must_use]
    pub fn wish(source: &ProgramId, name: &str, args: Vec<Arg>) -> Self {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(Arg::constant(source));
        all.extend(args);
        Self::new(format!("{ARG_PLACEHOLDER} wishes {name}"), all).with_source(source.clone())
    }

    /// Sets the owning program.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<ProgramId>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the persistence class.
    #[must_use]
    pub fn dynamic(mut self, is_dynamic: bool) -> Self {
        self.is_dynamic = is_dynamic;
        self
    }

    /// True when every argument is a constant.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.args.iter().all(Arg::is_constant)
    }

    /// Number of variable arguments.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.args.iter().filter(|a| a.is_variable()).count()
    }

    /// True when at least one argument is a capture slot.
    #[must_use]
    pub fn has_capture_slot(&self) -> bool {
        self.args.iter().any(Arg::is_capture_slot)
    }

    /// The constant values of a ground claim.
    #[must_use]
    pub fn values(&self) -> Option<Vec<Value>> {
        self.args.iter().map(|a| a.as_constant().cloned()).collect()
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let placeholders = self.name.matches(ARG_PLACEHOLDER).count();
        if placeholders != self.args.len() {
            write!(f, "{}(", self.name)?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            return f.write_str(")");
        }

        let mut args = self.args.iter();
        for (i, part) in self.name.split(ARG_PLACEHOLDER).enumerate() {
            if i > 0 {
                if let Some(arg) = args.next() {
                    write!(f, "{arg}")?;
                }
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_capture_slot() {
        assert!(var("?n").is_capture_slot());
        assert!(!var("n").is_capture_slot());
        assert!(!val("?n").is_capture_slot());
    }

    #[test]
    fn test_claim_fact_is_ground() {
        let fact = Claim::fact("@ is father of @", ["Abe", "Homer"]);
        assert!(fact.is_ground());
        assert_eq!(fact.source, ProgramId::core());
        assert!(!fact.is_dynamic);
        assert_eq!(
            fact.values(),
            Some(vec![Value::from("Abe"), Value::from("Homer")])
        );
    }

    #[test]
    fn test_claim_pattern_is_not_ground() {
        let pattern = Claim::new("@ is father of @", vec![val("Homer"), var("child")]);
        assert!(!pattern.is_ground());
        assert_eq!(pattern.variable_count(), 1);
        assert!(pattern.values().is_none());
    }

    #[test]
    fn test_claim_wish() {
        let me = ProgramId::from(7u32);
        let wish = Claim::wish(&me, "@ has canvas with name @", vec![val("7"), val("whiskers")]);
        assert_eq!(wish.name, "@ wishes @ has canvas with name @");
        assert_eq!(wish.args[0], val("7"));
        assert_eq!(wish.args.len(), 3);
        assert_eq!(wish.source, me);
    }

    #[test]
    fn test_claim_display_substitutes_placeholders() {
        let fact = Claim::fact("@ is father of @", ["Homer", "Bart"]);
        assert_eq!(fact.to_string(), "Homer is father of Bart");

        let pattern = Claim::new("@ likes person @", vec![var("x"), var("x")]);
        assert_eq!(pattern.to_string(), "{x} likes person {x}");
    }

    #[test]
    fn test_claim_display_functional_form() {
        let fact = Claim::new("father", vec![val("Abe"), var("y")]);
        assert_eq!(fact.to_string(), "father(Abe, {y})");
    }

    #[test]
    fn test_program_id() {
        assert_eq!(ProgramId::from("12").as_str(), "12");
        assert_eq!(ProgramId::from(12u32), ProgramId::new("12"));
        assert_eq!(format!("{}", ProgramId::core()), "core");
    }
}
