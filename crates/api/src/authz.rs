//! API-side authorization guard for commands and queries.
//!
//! This enforces authorization at the request boundary (before dispatch),
//! while keeping domain aggregates and infra auth-agnostic. Roles come from
//! the verified token; the role -> permission mapping below is the policy
//! source for the four account roles the deployment knows.

use siteops_auth::{AuthzError, CommandAuthorization, Permission, Principal, authorize};

use crate::context::PrincipalContext;

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let resolved = resolve_principal(principal);

    for perm in command.required_permissions() {
        authorize(&resolved, perm)?;
    }

    Ok(())
}

/// Check a single permission (used by query routes).
pub fn require(principal: &PrincipalContext, permission: &'static str) -> Result<(), AuthzError> {
    authorize(&resolve_principal(principal), &Permission::new(permission))
}

fn resolve_principal(principal: &PrincipalContext) -> Principal {
    Principal {
        principal_id: principal.principal_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    }
}

/// Role -> permission mapping for the deployment's account roles.
///
/// - `admin`: everything.
/// - `engineer`: day-to-day site operations; cannot decide material requests,
///   manage the project/vendor registries, or set prices.
/// - `client`: read access to their projects and the ability to raise tickets.
/// - `vendor`: read access to the procurement surface.
fn permissions_from_roles(roles: &[siteops_auth::Role]) -> Vec<Permission> {
    let mut perms: Vec<&'static str> = Vec::new();

    for role in roles {
        match role.as_str() {
            "admin" => return vec![Permission::new("*")],
            "engineer" => perms.extend([
                "materials.read",
                "materials.manage",
                "materials.transactions.record",
                "materials.requests.submit",
                "vendors.read",
                "procurement.read",
                "procurement.orders.manage",
                "procurement.orders.receive",
                "projects.read",
                "tasks.manage",
                "issues.read",
                "tickets.open",
                "tickets.manage",
                "ncrs.manage",
                "equipment.read",
                "equipment.manage",
            ]),
            "client" => perms.extend(["projects.read", "issues.read", "tickets.open"]),
            "vendor" => perms.extend(["vendors.read", "procurement.read"]),
            _ => {}
        }
    }

    perms.sort_unstable();
    perms.dedup();
    perms.into_iter().map(Permission::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteops_auth::{PrincipalId, Role};

    fn ctx(role: &'static str) -> PrincipalContext {
        PrincipalContext::new(PrincipalId::new(), vec![Role::new(role)])
    }

    #[test]
    fn admin_passes_everything() {
        assert!(require(&ctx("admin"), "materials.requests.decide").is_ok());
    }

    #[test]
    fn engineer_records_transactions_but_does_not_decide_requests() {
        let engineer = ctx("engineer");
        assert!(require(&engineer, "materials.transactions.record").is_ok());
        assert!(require(&engineer, "materials.requests.decide").is_err());
    }

    #[test]
    fn client_can_raise_tickets_only() {
        let client = ctx("client");
        assert!(require(&client, "tickets.open").is_ok());
        assert!(require(&client, "materials.read").is_err());
    }

    #[test]
    fn unknown_role_gets_nothing() {
        assert!(require(&ctx("visitor"), "projects.read").is_err());
    }
}
