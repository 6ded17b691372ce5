use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::errors::{ErrorCategory, ValidationError};

/// Accumulated outcome of one validation pass.
///
/// `match_count` counts the sub-validators that applied and passed. It only
/// exists to rank failing `anyOf`/`oneOf` branches: the branch that got
/// furthest is the most useful one to report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
    #[serde(skip)]
    match_count: usize,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_error(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
            match_count: 0,
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    /// Fold `other` into `self`. Errors are appended, match counts summed.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.match_count += other.match_count;
    }

    #[must_use]
    pub fn merged(mut self, other: ValidationResult) -> Self {
        self.merge(other);
        self
    }

    pub fn inc(&mut self) {
        self.match_count += 1;
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_category(&self, category: ErrorCategory) -> bool {
        self.errors.iter().any(|e| e.category() == category)
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    pub fn match_count(&self) -> usize {
        self.match_count
    }

    /// `Ok(())` when valid, otherwise the result itself as the error value.
    pub fn into_result(self) -> Result<(), ValidationResult> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for ValidationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(&error.message)?;
        }
        Ok(())
    }
}

impl FromIterator<ValidationError> for ValidationResult {
    fn from_iter<T: IntoIterator<Item = ValidationError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
            match_count: 0,
        }
    }
}

impl Extend<ValidationError> for ValidationResult {
    fn extend<T: IntoIterator<Item = ValidationError>>(&mut self, iter: T) {
        self.errors.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationErrorKind;

    fn err(path: &str) -> ValidationError {
        ValidationError::new(ValidationErrorKind::Maximum, path, None, format!("{path} too big"))
    }

    fn result(paths: &[&str], matches: usize) -> ValidationResult {
        let mut r: ValidationResult = paths.iter().map(|p| err(p)).collect();
        for _ in 0..matches {
            r.inc();
        }
        r
    }

    #[test]
    fn test_merge_is_associative() {
        let (a, b, c) = (result(&["a"], 1), result(&["b", "bb"], 2), result(&[], 3));
        let left = a.clone().merged(b.clone()).merged(c.clone());
        let right = a.merged(b.merged(c));
        assert_eq!(left, right);
        assert_eq!(left.match_count(), 6);
        assert_eq!(left.errors().len(), 3);
    }

    #[test]
    fn test_merge_empty_is_noop() {
        let a = result(&["x"], 2);
        assert_eq!(a.clone().merged(ValidationResult::new()), a);
        assert_eq!(ValidationResult::new().merged(a.clone()), a);
    }

    #[test]
    fn test_display_joins_messages() {
        let r = result(&["a", "b"], 0);
        assert_eq!(r.to_string(), "a too big; b too big");
        assert!(r.into_result().is_err());
        assert!(ValidationResult::new().into_result().is_ok());
    }
}
