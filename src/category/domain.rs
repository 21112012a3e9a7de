//! Core category domain types.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The display name of a category.
///
/// Names are stored trimmed and are never empty. Uniqueness is enforced by
/// the database and is case sensitive, so "Food" and "food" are different
/// categories, while " Food " collides with "Food" once trimmed.
///
/// Deserializing goes through the same checks as [CategoryName::new].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name from user input, trimming surrounding whitespace.
    ///
    /// # Errors
    /// Returns [Error::EmptyCategoryName] if nothing is left after trimming.
    pub fn new(name: impl AsRef<str>) -> Result<Self, Error> {
        match name.as_ref().trim() {
            "" => Err(Error::EmptyCategoryName),
            trimmed => Ok(Self(trimmed.to_owned())),
        }
    }

    /// Wrap a name read back from the `categories` table, which only ever
    /// holds names that passed [CategoryName::new].
    pub(crate) fn from_stored(name: String) -> Self {
        Self(name)
    }
}

impl TryFrom<&str> for CategoryName {
    type Error = Error;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl TryFrom<String> for CategoryName {
    type Error = Error;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<CategoryName> for String {
    fn from(name: CategoryName) -> Self {
        name.0
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Database identifier for a category.
pub type CategoryId = i64;

/// A spending bucket such as 'Food' or 'Transport'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The ID assigned by the database.
    pub id: CategoryId,
    /// The unique display name.
    pub name: CategoryName,
    /// A hex color token used when displaying the category, e.g. `#FF6B6B`.
    pub color: String,
}
