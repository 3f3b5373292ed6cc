//! Registry data: identities, groups and grants.
//!
//! Pure data plus recipient resolution. Persistence and re-encryption are
//! handled by [`super::AccessControl`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::principal::{Identity, IdentityKind, Principal};
use crate::core::cipher;
use crate::core::types::{PrincipalName, PublicKey, SecretRef};
use crate::core::validation::validate_name;
use crate::error::{suggestions, AccessError, Result};

/// Contents of `vars/access.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Principals granted to every newly created secret.
    #[serde(default)]
    pub default_grants: BTreeSet<Principal>,
    #[serde(default)]
    pub users: BTreeMap<PrincipalName, PublicKey>,
    #[serde(default)]
    pub machines: BTreeMap<PrincipalName, PublicKey>,
    #[serde(default)]
    pub groups: BTreeMap<PrincipalName, BTreeSet<Principal>>,
    #[serde(default)]
    pub grants: BTreeMap<SecretRef, BTreeSet<Principal>>,
}

impl Registry {
    fn identities_of(&self, kind: IdentityKind) -> &BTreeMap<PrincipalName, PublicKey> {
        match kind {
            IdentityKind::User => &self.users,
            IdentityKind::Machine => &self.machines,
        }
    }

    fn identities_of_mut(&mut self, kind: IdentityKind) -> &mut BTreeMap<PrincipalName, PublicKey> {
        match kind {
            IdentityKind::User => &mut self.users,
            IdentityKind::Machine => &mut self.machines,
        }
    }

    /// Look up an identity.
    pub fn identity(&self, kind: IdentityKind, name: &str) -> Option<Identity> {
        self.identities_of(kind).get(name).map(|key| Identity {
            name: name.to_string(),
            kind,
            public_key: key.clone(),
        })
    }

    /// All identities of one kind, sorted by name.
    pub fn identities(&self, kind: IdentityKind) -> Vec<Identity> {
        self.identities_of(kind)
            .iter()
            .map(|(name, key)| Identity {
                name: name.clone(),
                kind,
                public_key: key.clone(),
            })
            .collect()
    }

    /// Whether a principal refers to something registered.
    pub fn contains(&self, principal: &Principal) -> bool {
        match principal {
            Principal::Group(name) => self.groups.contains_key(name),
            other => other
                .kind()
                .map(|kind| self.identities_of(kind).contains_key(other.name()))
                .unwrap_or(false),
        }
    }

    /// Fail with `NotFound` unless the principal is registered.
    pub fn require(&self, principal: &Principal) -> Result<()> {
        if self.contains(principal) {
            return Ok(());
        }
        let err = match principal {
            Principal::Group(name) => {
                let available: Vec<String> = self.groups.keys().cloned().collect();
                AccessError::UnknownGroup {
                    name: name.clone(),
                    suggestions: suggestions(name, &available),
                }
            }
            other => {
                let kind = other.kind().unwrap_or(IdentityKind::User);
                let available: Vec<String> =
                    self.identities_of(kind).keys().cloned().collect();
                AccessError::UnknownIdentity {
                    name: other.to_string(),
                    suggestions: suggestions(other.name(), &available)
                        .into_iter()
                        .map(|n| Principal::identity(kind, n).to_string())
                        .collect(),
                }
            }
        };
        Err(err.into())
    }

    /// Register or replace an identity.
    ///
    /// Returns `true` if anything changed.
    pub fn set_identity(
        &mut self,
        kind: IdentityKind,
        name: &str,
        key: &str,
        force: bool,
    ) -> Result<bool> {
        validate_name("identity", name)?;
        cipher::parse_recipient(key)?;
        let key = key.trim().to_string();

        let entries = self.identities_of_mut(kind);
        match entries.get(name) {
            Some(existing) if *existing == key => Ok(false),
            Some(_) if !force => Err(AccessError::IdentityExists(name.to_string()).into()),
            _ => {
                entries.insert(name.to_string(), key);
                Ok(true)
            }
        }
    }

    /// Remove an identity together with its group memberships and grants.
    pub fn remove_identity(&mut self, principal: &Principal) -> Result<()> {
        self.require(principal)?;
        let kind = principal
            .kind()
            .ok_or_else(|| AccessError::InvalidPrincipal(principal.to_string()))?;
        self.identities_of_mut(kind).remove(principal.name());

        for members in self.groups.values_mut() {
            members.remove(principal);
        }
        self.groups.retain(|_, members| !members.is_empty());
        self.drop_principal(principal);
        Ok(())
    }

    /// Add an identity to a group, creating the group if needed.
    ///
    /// Returns `true` if the membership is new.
    pub fn add_member(&mut self, group: &str, member: &Principal) -> Result<bool> {
        validate_name("group", group)?;
        if member.kind().is_none() {
            return Err(AccessError::InvalidPrincipal(member.to_string()).into());
        }
        self.require(member)?;
        Ok(self
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(member.clone()))
    }

    /// Remove an identity from a group. Empty groups are deleted along with
    /// their grants.
    pub fn remove_member(&mut self, group: &str, member: &Principal) -> Result<()> {
        let group_principal = Principal::Group(group.to_string());
        self.require(&group_principal)?;

        let now_empty = match self.groups.get_mut(group) {
            Some(members) => {
                if !members.remove(member) {
                    return Err(AccessError::UnknownIdentity {
                        name: member.to_string(),
                        suggestions: members.iter().map(|m| m.to_string()).collect(),
                    }
                    .into());
                }
                members.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.groups.remove(group);
            self.drop_principal(&group_principal);
        }
        Ok(())
    }

    /// Remove a principal from every grant and from the default grants.
    fn drop_principal(&mut self, principal: &Principal) {
        for principals in self.grants.values_mut() {
            principals.remove(principal);
        }
        self.default_grants.remove(principal);
    }

    /// Principals granted on a secret.
    pub fn grants(&self, secret: &str) -> BTreeSet<Principal> {
        self.grants.get(secret).cloned().unwrap_or_default()
    }

    pub fn has_grants(&self, secret: &str) -> bool {
        self.grants.get(secret).map(|g| !g.is_empty()).unwrap_or(false)
    }

    /// Public keys of a set of principals; groups expand to their members.
    pub fn keys_of<'a>(
        &self,
        principals: impl IntoIterator<Item = &'a Principal>,
    ) -> BTreeSet<PublicKey> {
        let mut keys = BTreeSet::new();
        for principal in principals {
            match principal {
                Principal::Group(name) => {
                    if let Some(members) = self.groups.get(name) {
                        keys.extend(self.keys_of(members));
                    }
                }
                other => {
                    if let Some(key) = other
                        .kind()
                        .and_then(|kind| self.identities_of(kind).get(other.name()))
                    {
                        keys.insert(key.clone());
                    }
                }
            }
        }
        keys
    }

    /// Recipient set of a secret: keys of direct grants plus group members.
    pub fn resolve(&self, secret: &str) -> BTreeSet<PublicKey> {
        match self.grants.get(secret) {
            Some(principals) => self.keys_of(principals),
            None => BTreeSet::new(),
        }
    }

    /// Seed the grants of a new secret from the default grants and its
    /// registered `owners`. A secret that already has grants is left alone,
    /// so a revoked owner stays revoked.
    ///
    /// Returns `true` if the grants changed.
    pub fn ensure_grants(&mut self, secret: &str, owners: &[Principal]) -> bool {
        if self.has_grants(secret) {
            return false;
        }
        let seeded: BTreeSet<Principal> = owners
            .iter()
            .chain(self.default_grants.iter())
            .filter(|p| self.contains(p))
            .cloned()
            .collect();
        if seeded.is_empty() {
            return false;
        }
        self.grants.insert(secret.to_string(), seeded);
        true
    }
}
