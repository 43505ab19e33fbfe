//! Pure role-membership predicates. No hierarchy is stored on the wire
//! (admin does not structurally imply user); everything here is plain
//! membership over the role list.

use crate::models::Role;

pub fn has_role(roles: &[Role], role: Role) -> bool {
    roles.contains(&role)
}

/// Admin shortcut: either admin tier passes.
pub fn is_admin(roles: &[Role]) -> bool {
    has_role(roles, Role::Admin) || has_role(roles, Role::SuperAdmin)
}

pub fn is_super_admin(roles: &[Role]) -> bool {
    has_role(roles, Role::SuperAdmin)
}
