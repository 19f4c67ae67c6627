//! Capability checks shared by every write path.
//!
//! All role handling lives here: services ask the policy whether an actor
//! may touch a record and never compare roles themselves.

use serde::{Deserialize, Serialize};

use crate::model::MemberId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Admin,
    SuperAdmin,
}

/// The caller of an operation: who they are and what they may do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: MemberId,
    pub role: Role,
}

impl Actor {
    pub fn member(id: MemberId) -> Self {
        Self {
            id,
            role: Role::Member,
        }
    }

    pub fn admin(id: MemberId) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    pub fn super_admin(id: MemberId) -> Self {
        Self {
            id,
            role: Role::SuperAdmin,
        }
    }
}

/// How far a plain admin can see past the members they registered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminVisibility {
    /// Admins act only on members carrying their registered-by reference.
    #[default]
    Registered,
    /// Admins act on any member's records.
    Unrestricted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub admin_visibility: AdminVisibility,
}

/// Record filter for list operations, derived once per call from the actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListScope {
    All,
    RegisteredBy(MemberId),
    Own(MemberId),
}

impl ListScope {
    /// Whether a record owned by `owner` (registered by `registrar`) is
    /// visible under this scope.
    pub fn admits(self, owner: MemberId, registrar: Option<MemberId>) -> bool {
        match self {
            Self::All => true,
            Self::RegisteredBy(admin) => owner == admin || registrar == Some(admin),
            Self::Own(member) => owner == member,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AccessPolicy {
    config: PolicyConfig,
}

impl AccessPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn is_admin(&self, actor: &Actor) -> bool {
        matches!(actor.role, Role::Admin | Role::SuperAdmin)
    }

    /// The ownership-or-admin gate: may `actor` act on a record owned by
    /// `owner`, whose registering admin is `registrar`?
    pub fn can_act_on(&self, actor: &Actor, owner: MemberId, registrar: Option<MemberId>) -> bool {
        match actor.role {
            Role::SuperAdmin => true,
            Role::Admin => {
                actor.id == owner
                    || match self.config.admin_visibility {
                        AdminVisibility::Unrestricted => true,
                        AdminVisibility::Registered => registrar == Some(actor.id),
                    }
            }
            Role::Member => actor.id == owner,
        }
    }

    /// The administrative gate: like [`can_act_on`](Self::can_act_on), but
    /// ownership alone is not enough — members are always refused.
    pub fn can_administer(
        &self,
        actor: &Actor,
        owner: MemberId,
        registrar: Option<MemberId>,
    ) -> bool {
        self.is_admin(actor) && self.can_act_on(actor, owner, registrar)
    }

    pub fn list_scope(&self, actor: &Actor) -> ListScope {
        match actor.role {
            Role::SuperAdmin => ListScope::All,
            Role::Admin => match self.config.admin_visibility {
                AdminVisibility::Unrestricted => ListScope::All,
                AdminVisibility::Registered => ListScope::RegisteredBy(actor.id),
            },
            Role::Member => ListScope::Own(actor.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const OWNER: MemberId = MemberId(10);
    const REGISTRAR: MemberId = MemberId(2);
    const STRANGER: MemberId = MemberId(3);

    #[rstest]
    #[case::owner_member(Actor::member(OWNER), true)]
    #[case::other_member(Actor::member(STRANGER), false)]
    #[case::registering_admin(Actor::admin(REGISTRAR), true)]
    #[case::unrelated_admin(Actor::admin(STRANGER), false)]
    #[case::super_admin(Actor::super_admin(STRANGER), true)]
    fn scoped_can_act_on(#[case] actor: Actor, #[case] expected: bool) {
        let policy = AccessPolicy::default();
        assert_eq!(policy.can_act_on(&actor, OWNER, Some(REGISTRAR)), expected);
    }

    #[test]
    fn unrestricted_visibility_opens_admin_scope() {
        let policy = AccessPolicy::new(PolicyConfig {
            admin_visibility: AdminVisibility::Unrestricted,
        });

        assert!(policy.can_act_on(&Actor::admin(STRANGER), OWNER, Some(REGISTRAR)));
        // Member scope is unaffected by the visibility knob.
        assert!(!policy.can_act_on(&Actor::member(STRANGER), OWNER, Some(REGISTRAR)));
    }

    #[test]
    fn admin_acts_on_own_records_regardless_of_registrar() {
        let policy = AccessPolicy::default();
        let admin = Actor::admin(MemberId(7));
        assert!(policy.can_act_on(&admin, MemberId(7), None));
    }

    #[test]
    fn administer_refuses_owning_member() {
        let policy = AccessPolicy::default();
        assert!(!policy.can_administer(&Actor::member(OWNER), OWNER, None));
        assert!(policy.can_administer(&Actor::admin(REGISTRAR), OWNER, Some(REGISTRAR)));
        assert!(!policy.can_administer(&Actor::admin(STRANGER), OWNER, Some(REGISTRAR)));
    }

    #[rstest]
    #[case::super_admin(Actor::super_admin(MemberId(1)), ListScope::All)]
    #[case::admin(Actor::admin(MemberId(2)), ListScope::RegisteredBy(MemberId(2)))]
    #[case::member(Actor::member(MemberId(3)), ListScope::Own(MemberId(3)))]
    fn scopes_follow_roles(#[case] actor: Actor, #[case] expected: ListScope) {
        assert_eq!(AccessPolicy::default().list_scope(&actor), expected);
    }

    #[test]
    fn registered_scope_admits_own_and_registered() {
        let scope = ListScope::RegisteredBy(REGISTRAR);
        assert!(scope.admits(OWNER, Some(REGISTRAR)));
        assert!(scope.admits(REGISTRAR, None));
        assert!(!scope.admits(OWNER, Some(STRANGER)));
        assert!(!scope.admits(OWNER, None));
    }
}
