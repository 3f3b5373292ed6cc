//! Access commands: users, machines, groups, grants.
//!
//! Every change goes through the registry, which re-encrypts affected
//! secrets before it saves.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::json;
use tracing::info;

use crate::cli::output;
use crate::cli::{GroupAction, IdentityAction};
use crate::core::access::{IdentityKind, Principal};
use crate::core::domain::VarKey;
use crate::error::{Error, Result};

fn print_json(value: &serde_json::Value) -> Result<()> {
    let out = serde_json::to_string_pretty(value).map_err(|e| Error::Other(e.to_string()))?;
    output::data(&out);
    Ok(())
}

/// `users ...` and `machines ...`.
pub fn identities(config: &Path, kind: IdentityKind, action: IdentityAction) -> Result<()> {
    let fleet = super::open(config)?;
    let access = fleet.access();

    match action {
        IdentityAction::Add { name, key, force } => {
            if access.add_identity(kind, &name, &key, force, fleet.reencryptor())? {
                output::success(&format!("added {} {}", kind, output::key(&name)));
            } else {
                output::dimmed(&format!("{} {} already registered", kind, name));
            }
        }
        IdentityAction::Rm { name } => {
            access.remove_identity(&Principal::identity(kind, name.as_str()), fleet.reencryptor())?;
            output::success(&format!("removed {} {}", kind, output::key(&name)));
        }
        IdentityAction::List { json } => {
            let identities = access.snapshot().identities(kind);
            if json {
                let list: Vec<_> = identities
                    .iter()
                    .map(|i| json!({ "name": i.name, "public_key": i.public_key }))
                    .collect();
                return print_json(&json!(list));
            }
            if identities.is_empty() {
                output::dimmed(&format!("no {}s registered", kind));
            }
            for identity in identities {
                output::kv(&identity.name, &identity.public_key);
            }
        }
    }
    Ok(())
}

/// `groups ...`.
pub fn groups(config: &Path, action: GroupAction) -> Result<()> {
    let fleet = super::open(config)?;
    let access = fleet.access();

    match action {
        GroupAction::AddMember { group, member } => {
            let member: Principal = member.parse()?;
            if access.add_member(&group, &member, fleet.reencryptor())? {
                output::success(&format!("added {} to {}", member, output::key(&group)));
            } else {
                output::dimmed(&format!("{} is already in {}", member, group));
            }
        }
        GroupAction::RmMember { group, member } => {
            let member: Principal = member.parse()?;
            access.remove_member(&group, &member, fleet.reencryptor())?;
            output::success(&format!("removed {} from {}", member, output::key(&group)));
        }
        GroupAction::List { json } => {
            let registry = access.snapshot();
            if json {
                let groups: serde_json::Map<_, _> = registry
                    .groups
                    .iter()
                    .map(|(name, members)| {
                        let members: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                        (name.clone(), json!(members))
                    })
                    .collect();
                return print_json(&serde_json::Value::Object(groups));
            }
            if registry.groups.is_empty() {
                output::dimmed("no groups");
            }
            for (name, members) in &registry.groups {
                output::header(name);
                for member in members {
                    output::list_item(&member.to_string());
                }
            }
        }
    }
    Ok(())
}

/// `grant SECRET PRINCIPAL`.
pub fn grant(config: &Path, secret: &str, principal: &str) -> Result<()> {
    let fleet = super::open(config)?;
    let key: VarKey = secret.parse()?;
    let principal: Principal = principal.parse()?;
    fleet.config().declared(&key)?;

    fleet
        .access()
        .grant(&key.secret_ref(), &principal, fleet.reencryptor())?;
    output::success(&format!("granted {} on {}", principal, output::key(&key.secret_ref())));
    Ok(())
}

/// `revoke SECRET PRINCIPAL`.
pub fn revoke(config: &Path, secret: &str, principal: &str) -> Result<()> {
    let fleet = super::open(config)?;
    let key: VarKey = secret.parse()?;
    let principal: Principal = principal.parse()?;

    fleet
        .access()
        .revoke(&key.secret_ref(), &principal, fleet.reencryptor())?;
    output::success(&format!("revoked {} on {}", principal, output::key(&key.secret_ref())));
    output::hint("values the revoked key already read are not protected; regenerate to rotate");
    Ok(())
}

/// `defaults [PRINCIPAL...]`.
pub fn defaults(config: &Path, principals: &[String]) -> Result<()> {
    let fleet = super::open(config)?;

    if principals.is_empty() {
        let current = fleet.access().snapshot().default_grants;
        if current.is_empty() {
            output::dimmed("no default grants");
        }
        for principal in current {
            output::list_item(&principal.to_string());
        }
        return Ok(());
    }

    let parsed = principals
        .iter()
        .map(|p| p.parse::<Principal>())
        .collect::<Result<BTreeSet<_>>>()?;
    info!(count = parsed.len(), "setting default grants");
    fleet.access().set_default_grants(parsed)?;
    output::success("default grants updated");
    Ok(())
}
