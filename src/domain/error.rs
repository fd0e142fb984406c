use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;

/// Field name to the messages collected for it
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("invalid fields: {}", .errors.keys().join(", "))]
pub struct ValidationErrors {
    pub errors: BTreeMap<&'static str, Vec<String>>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("container backend failure: {0:#}")]
    Backend(#[from] anyhow::Error),
}
