//! Principals: the things a secret can be granted to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::types::{PrincipalName, PublicKey};
use crate::core::validation::validate_name;
use crate::error::{AccessError, Error, Result};

/// Kind of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    User,
    Machine,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKind::User => write!(f, "user"),
            IdentityKind::Machine => write!(f, "machine"),
        }
    }
}

/// A user or machine with exactly one public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: PrincipalName,
    pub kind: IdentityKind,
    pub public_key: PublicKey,
}

impl Identity {
    pub fn principal(&self) -> Principal {
        Principal::identity(self.kind, self.name.clone())
    }
}

/// Grant target, written `user:NAME`, `machine:NAME` or `group:NAME`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Principal {
    User(PrincipalName),
    Machine(PrincipalName),
    Group(PrincipalName),
}

impl Principal {
    pub fn identity(kind: IdentityKind, name: impl Into<String>) -> Self {
        match kind {
            IdentityKind::User => Principal::User(name.into()),
            IdentityKind::Machine => Principal::Machine(name.into()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Principal::User(n) | Principal::Machine(n) | Principal::Group(n) => n,
        }
    }

    /// Identity kind, or `None` for groups.
    pub fn kind(&self) -> Option<IdentityKind> {
        match self {
            Principal::User(_) => Some(IdentityKind::User),
            Principal::Machine(_) => Some(IdentityKind::Machine),
            Principal::Group(_) => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::User(n) => write!(f, "user:{}", n),
            Principal::Machine(n) => write!(f, "machine:{}", n),
            Principal::Group(n) => write!(f, "group:{}", n),
        }
    }
}

impl FromStr for Principal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| AccessError::InvalidPrincipal(s.to_string()))?;
        let principal = match kind {
            "user" => Principal::User(name.to_string()),
            "machine" => Principal::Machine(name.to_string()),
            "group" => Principal::Group(name.to_string()),
            _ => return Err(AccessError::InvalidPrincipal(s.to_string()).into()),
        };
        validate_name("principal", name)?;
        Ok(principal)
    }
}

impl TryFrom<String> for Principal {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Principal> for String {
    fn from(p: Principal) -> String {
        p.to_string()
    }
}
