//! Category names used to group tools for discovery.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_CATEGORY_LEN: usize = 48;

/// Category assigned to tools that do not declare one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Validated category name such as `filesystem` or `web-search`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    /// Creates a category after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCategory`] if the name is empty, too long, or
    /// contains characters other than lowercase alphanumerics, dash,
    /// underscore, or dot.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_category(&name)?;
        Ok(Self(name))
    }

    /// Returns the category assigned to tools without explicit categories.
    #[must_use]
    pub fn general() -> Self {
        Self(DEFAULT_CATEGORY.to_owned())
    }

    /// Returns the category name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Category {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.0
    }
}

impl TryFrom<String> for Category {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Category {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

fn validate_category(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidCategory {
            name: String::new(),
            reason: "category cannot be empty".into(),
        });
    }

    if name.len() > MAX_CATEGORY_LEN {
        return Err(Error::InvalidCategory {
            name: name.into(),
            reason: format!("category length must be <= {MAX_CATEGORY_LEN}"),
        });
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | '.'))
    {
        return Err(Error::InvalidCategory {
            name: name.into(),
            reason: "category must contain lowercase alphanumeric, dash, underscore, or dot"
                .into(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_lowercase_names() {
        let category = Category::new("web-search").expect("valid");
        assert_eq!(category.as_str(), "web-search");
        assert_eq!(category.to_string(), "web-search");
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(matches!(
            Category::new(""),
            Err(Error::InvalidCategory { .. })
        ));
        assert!(matches!(
            Category::new("FileSystem"),
            Err(Error::InvalidCategory { .. })
        ));
        assert!(Category::new("x".repeat(MAX_CATEGORY_LEN + 1)).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: Category = serde_json::from_str("\"io\"").expect("valid");
        assert_eq!(ok, Category::new("io").unwrap());
        assert!(serde_json::from_str::<Category>("\"Bad Name\"").is_err());
    }

    #[test]
    fn general_is_default_category() {
        assert_eq!(Category::general().as_str(), DEFAULT_CATEGORY);
    }
}
