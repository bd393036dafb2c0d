//! Global variable storage

use crate::symbol::{GlobalId, GlobalScope};
use crate::value::{RuntimeError, Value};

/// Values of every global slot of a program
///
/// Owned by the host and lent to each VM run, so several VMs over the same
/// program can share one set of globals between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Globals {
    values: Vec<Value>,
}

impl Globals {
    /// One slot per declared global, holding its type's null value
    pub fn new(scope: &GlobalScope) -> Self {
        Self {
            values: scope.globals().iter().map(|g| g.ty.null_value()).collect(),
        }
    }

    pub fn get(&self, id: GlobalId) -> Option<&Value> {
        self.values.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: GlobalId) -> Result<&mut Value, RuntimeError> {
        self.values
            .get_mut(id.0)
            .ok_or(RuntimeError::InvalidSlot { slot: id.0 })
    }

    pub fn set(&mut self, id: GlobalId, value: Value) -> Result<(), RuntimeError> {
        *self.get_mut(id)? = value;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
