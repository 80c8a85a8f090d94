//! "All items" flag vs. explicit subset list
//!
//! Several resources pair a boolean such as `all_spaces` with a list such as
//! `spaces`. When the flag is left unset it is derived from the list; an
//! explicit flag is never overridden, and contradictory combinations are
//! rejected with both field names.

use crate::error::ConstraintError;
use serde::{Deserialize, Serialize};

/// A boolean that distinguishes "not set by the caller" from `false`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// Absent or not yet known
    #[default]
    Unset,
    Set(bool),
}

impl Flag {
    pub fn is_set(&self) -> bool {
        matches!(self, Flag::Set(_))
    }

    pub fn value(&self) -> Option<bool> {
        match self {
            Flag::Unset => None,
            Flag::Set(v) => Some(*v),
        }
    }
}

impl From<Option<bool>> for Flag {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(v) => Flag::Set(v),
            None => Flag::Unset,
        }
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Flag::Set(value)
    }
}

/// Interdependent flag/list pair together with the names of its two fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintPair<T> {
    pub flag_field: String,
    pub list_field: String,
    pub all_items: Flag,
    pub specific_items: Option<Vec<T>>,
}

impl<T> ConstraintPair<T> {
    pub fn new(flag_field: impl Into<String>, list_field: impl Into<String>) -> Self {
        Self {
            flag_field: flag_field.into(),
            list_field: list_field.into(),
            all_items: Flag::Unset,
            specific_items: None,
        }
    }

    pub fn with_flag(mut self, flag: impl Into<Flag>) -> Self {
        self.all_items = flag.into();
        self
    }

    pub fn with_items(mut self, items: Vec<T>) -> Self {
        self.specific_items = Some(items);
        self
    }

    fn has_items(&self) -> bool {
        self.specific_items.as_ref().is_some_and(|v| !v.is_empty())
    }

    fn mutually_exclusive(&self) -> ConstraintError {
        ConstraintError::MutuallyExclusive {
            flag_field: self.flag_field.clone(),
            list_field: self.list_field.clone(),
        }
    }

    fn empty_selection(&self) -> ConstraintError {
        ConstraintError::EmptySelection {
            flag_field: self.flag_field.clone(),
            list_field: self.list_field.clone(),
        }
    }

    /// Resolve a pair into what it selects
    ///
    /// Normalizes first, so an unset flag is derived the same way as in [`normalize`].
    pub fn scope(self) -> Result<Scope<T>, ConstraintError> {
        let normalized = normalize(self)?;
        match normalized.all_items {
            Flag::Set(true) => Ok(Scope::All),
            _ => Ok(Scope::Specific(normalized.specific_items.unwrap_or_default())),
        }
    }
}

/// What a normalized pair selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope<T> {
    All,
    Specific(Vec<T>),
}

/// Validate a pair and derive its flag when the caller left it unset
///
/// After a successful call the flag is always [`Flag::Set`] and exactly one of
/// "all items" or "a non-empty subset" holds.
pub fn normalize<T>(pair: ConstraintPair<T>) -> Result<ConstraintPair<T>, ConstraintError> {
    match pair.all_items {
        Flag::Set(true) if pair.has_items() => Err(pair.mutually_exclusive()),
        Flag::Set(false) if !pair.has_items() => Err(pair.empty_selection()),
        Flag::Set(_) => Ok(pair),
        Flag::Unset => {
            let derived = !pair.has_items();
            tracing::debug!(
                flag_field = %pair.flag_field,
                list_field = %pair.list_field,
                derived,
                "Derived unset flag from list"
            );
            Ok(ConstraintPair {
                all_items: Flag::Set(derived),
                ..pair
            })
        }
    }
}
