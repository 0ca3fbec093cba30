use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque id of an observed browser target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}
}

impl fmt::Display for TargetId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TargetId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for TargetId {
	fn from(id: String) -> Self {
		Self(id)
	}
}
