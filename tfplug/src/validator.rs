//! Attribute validators
//!
//! Validators run during config validation, before any API call is made.
//! Each reports problems into the shared diagnostics list so that every
//! violation surfaces in a single plan.

use crate::types::{Diagnostic, Dynamic};

pub trait Validator: Send + Sync {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Vec<Diagnostic>);
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_str() {
            if let Some(min) = self.min {
                if s.len() < min {
                    diagnostics.push(Diagnostic::error(
                        format!("{} must have minimum length of {}", attribute_path, min),
                        format!("Got length {}", s.len()),
                    ));
                }
            }
            if let Some(max) = self.max {
                if s.len() > max {
                    diagnostics.push(Diagnostic::error(
                        format!("{} must have maximum length of {}", attribute_path, max),
                        format!("Got length {}", s.len()),
                    ));
                }
            }
        }
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl Validator for StringPatternValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_str() {
            if !self.pattern.is_match(s) {
                diagnostics.push(Diagnostic::error(
                    format!("{} must match {}", attribute_path, self.description),
                    format!("Value '{}' does not match pattern", s),
                ));
            }
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for NumberRangeValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(n) = value.as_number() {
            if let Some(min) = self.min {
                if n < min {
                    diagnostics.push(Diagnostic::error(
                        format!("{} must be at least {}", attribute_path, min),
                        format!("Got {}", n),
                    ));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    diagnostics.push(Diagnostic::error(
                        format!("{} must be at most {}", attribute_path, max),
                        format!("Got {}", n),
                    ));
                }
            }
        }
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for ListLengthValidator {
    fn validate(&self, value: &Dynamic, attribute_path: &str, diagnostics: &mut Vec<Diagnostic>) {
        if let Dynamic::List(items) = value {
            if let Some(min) = self.min {
                if items.len() < min {
                    diagnostics.push(Diagnostic::error(
                        format!("{} must have at least {} items", attribute_path, min),
                        format!("Got {} items", items.len()),
                    ));
                }
            }
            if let Some(max) = self.max {
                if items.len() > max {
                    diagnostics.push(Diagnostic::error(
                        format!("{} must have at most {} items", attribute_path, max),
                        format!("Got {} items", items.len()),
                    ));
                }
            }
        }
    }
}
