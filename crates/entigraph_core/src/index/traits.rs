//! Index traits and key types.

use std::fmt;

use entigraph_codec::Value;

use crate::entity::{Entity, EntityId};
use crate::schema::IndexDef;
use crate::types::SequenceNumber;

/// Tuple of field values identifying an index entry.
///
/// Keys order like their values, left to right.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey(Vec<Value>);

impl IndexKey {
    /// Reads the key fields of an entity; missing fields become null.
    #[must_use]
    pub fn extract(entity: &Entity, fields: &[String]) -> Self {
        Self(fields.iter().map(|f| entity.field(f).clone()).collect())
    }

    /// Builds a key from explicit values.
    #[must_use]
    pub fn from_values(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The key components.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Returns true if any component is null.
    #[must_use]
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// Comparison operator shared by predicates and sort-index ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Equal.
    Eq,
    /// Strictly less.
    Lt,
    /// Less or equal.
    Le,
    /// Strictly greater.
    Gt,
    /// Greater or equal.
    Ge,
}

impl Comparison {
    /// Evaluates `value <op> operand`.
    ///
    /// Ordering operators only hold between values of the same kind, so
    /// `null < 5` is false.
    #[must_use]
    pub fn holds(self, value: &Value, operand: &Value) -> bool {
        if self == Self::Eq {
            return value == operand;
        }
        if value.kind() != operand.kind() {
            return false;
        }
        match self {
            Self::Eq => value == operand,
            Self::Lt => value < operand,
            Self::Le => value <= operand,
            Self::Gt => value > operand,
            Self::Ge => value >= operand,
        }
    }
}

/// Behavior common to every secondary index kind.
///
/// Indexes are derived state: after any sequence of `upsert`/`remove`
/// calls, an index equals one built from scratch over the same entities.
pub trait SecondaryIndex {
    /// The declaration this index implements.
    fn def(&self) -> &IndexDef;

    /// Indexes an entity, moving it away from any previous position.
    fn upsert(&mut self, entity: &Entity, seq: SequenceNumber);

    /// Removes an entity. Returns true if it was indexed.
    fn remove(&mut self, id: &EntityId) -> bool;

    /// Number of indexed entities.
    fn len(&self) -> usize;

    /// Returns true if nothing is indexed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    fn clear(&mut self);
}
