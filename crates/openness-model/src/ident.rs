use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

pub const ID_MAX_LEN: usize = 100;
pub const NAME_MAX_LEN: usize = 100;

fn parse_opaque_id(kind: &str, input: &str) -> Result<String, ValidationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ValidationError(format!("{kind} id must not be empty")));
    }
    if s.len() > ID_MAX_LEN {
        return Err(ValidationError(format!(
            "{kind} id exceeds max length {ID_MAX_LEN}"
        )));
    }
    if !s.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ValidationError(format!(
            "{kind} id must be printable ASCII without whitespace"
        )));
    }
    Ok(s.to_string())
}

fn parse_slug(kind: &str, input: &str) -> Result<String, ValidationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ValidationError(format!("{kind} name must not be empty")));
    }
    if s.len() > NAME_MAX_LEN {
        return Err(ValidationError(format!(
            "{kind} name exceeds max length {NAME_MAX_LEN}"
        )));
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ValidationError(format!(
            "{kind} name must match [a-z0-9_-]+"
        )));
    }
    if s.starts_with('-') || s.ends_with('-') || s.starts_with('_') || s.ends_with('_') {
        return Err(ValidationError(format!(
            "{kind} name must not start or end with a separator"
        )));
    }
    Ok(s.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct ResourceId(String);

impl ResourceId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        parse_opaque_id("resource", input).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct DatasetId(String);

impl DatasetId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        parse_opaque_id("dataset", input).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for DatasetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        parse_opaque_id("organization", input).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for OrganizationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct DatasetName(String);

impl DatasetName {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        parse_slug("dataset", input).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for DatasetName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct OrganizationName(String);

impl OrganizationName {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        parse_slug("organization", input).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for OrganizationName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EntityState {
    Active,
    Deleted,
}

impl EntityState {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim() {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            other => Err(ValidationError(format!("unknown entity state: {other}"))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl Display for EntityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
