use std::fmt;

/// A rule broken by one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Field violations of a rejected step input (never empty).
///
/// Only built when validation fails; use [`ValidationErrorCollector`] while
/// validating and convert once every rule has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::len_without_is_empty)]
pub struct ValidationErrors {
    first: FieldViolation,
    rest: Vec<FieldViolation>,
}

impl ValidationErrors {
    #[must_use]
    pub fn single(violation: FieldViolation) -> Self {
        Self {
            first: violation,
            rest: Vec::new(),
        }
    }

    /// Returns `None` if `violations` is empty.
    #[must_use]
    pub fn try_from_vec(mut violations: Vec<FieldViolation>) -> Option<Self> {
        if violations.is_empty() {
            return None;
        }
        let first = violations.remove(0);
        Some(Self {
            first,
            rest: violations,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldViolation> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    /// Names of the offending fields, in the order they were reported.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.iter().map(|v| v.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step data failed validation with {} error(s)", self.len())?;
        for violation in self.iter() {
            write!(f, "; {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldViolation;
    type IntoIter = Box<dyn Iterator<Item = &'a FieldViolation> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[derive(Debug, Default)]
pub struct ValidationErrorCollector {
    violations: Vec<FieldViolation>,
}

impl ValidationErrorCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: FieldViolation) {
        self.violations.push(violation);
    }

    /// # Errors
    ///
    /// Returns the collected violations if any were pushed.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        match ValidationErrors::try_from_vec(self.violations) {
            Some(errors) => Err(errors),
            None => Ok(()),
        }
    }
}
