//! Role-scoped record visibility
//!
//! Narrows a record population to what an actor may analyze:
//! - members only ever see their own records
//! - trainers, staff and admins may select any member on the roster, and see
//!   their own records when they select nobody

use crate::error::ProgressError;
use crate::types::{Actor, MemberId, ProgressRecord, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Lookup of known members, provided by the storage collaborator
pub trait MemberRoster {
    fn contains(&self, member: MemberId) -> bool;
}

impl MemberRoster for HashSet<MemberId> {
    fn contains(&self, member: MemberId) -> bool {
        HashSet::contains(self, &member)
    }
}

impl MemberRoster for BTreeSet<MemberId> {
    fn contains(&self, member: MemberId) -> bool {
        BTreeSet::contains(self, &member)
    }
}

impl MemberRoster for Vec<MemberId> {
    fn contains(&self, member: MemberId) -> bool {
        self.iter().any(|m| *m == member)
    }
}

/// What to do when a member actor asks for someone else's records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignRequestPolicy {
    /// Drop the selection and answer with the actor's own records
    #[default]
    Ignore,
    /// Fail with [`ProgressError::Forbidden`], whether or not the member exists
    Reject,
}

/// Resolver applying the role visibility rule
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityResolver {
    policy: ForeignRequestPolicy,
}

impl VisibilityResolver {
    pub fn new(policy: ForeignRequestPolicy) -> Self {
        Self { policy }
    }

    /// Decide whose records the actor will see.
    ///
    /// `Ok(None)` means the actor has no member profile and selected nobody,
    /// so the scope is empty.
    pub fn resolve_target(
        &self,
        actor: &Actor,
        requested: Option<MemberId>,
        roster: &dyn MemberRoster,
    ) -> Result<Option<MemberId>, ProgressError> {
        match actor.role {
            Role::Member => match requested {
                Some(member) if !actor.owns(member) => match self.policy {
                    ForeignRequestPolicy::Ignore => {
                        tracing::debug!(user = %actor.user_id, "foreign member selection ignored");
                        Ok(actor.member_id)
                    }
                    ForeignRequestPolicy::Reject => Err(ProgressError::Forbidden),
                },
                _ => Ok(actor.member_id),
            },
            Role::Trainer | Role::Staff | Role::Admin => match requested {
                Some(member) if roster.contains(member) => Ok(Some(member)),
                Some(member) => Err(ProgressError::MemberNotFound(member)),
                None => Ok(actor.member_id),
            },
        }
    }

    /// Records of the resolved member, in input order.
    pub fn scope<'a>(
        &self,
        actor: &Actor,
        records: &'a [ProgressRecord],
        requested: Option<MemberId>,
        roster: &dyn MemberRoster,
    ) -> Result<Vec<&'a ProgressRecord>, ProgressError> {
        let target = self.resolve_target(actor, requested, roster)?;
        let scoped: Vec<&ProgressRecord> = match target {
            Some(member) => records.iter().filter(|r| r.member == member).collect(),
            None => Vec::new(),
        };
        tracing::debug!(
            role = actor.role.as_str(),
            member = ?target,
            visible = scoped.len(),
            "records scoped"
        );
        Ok(scoped)
    }

    /// Owned variant of [`VisibilityResolver::scope`]
    pub fn scope_owned(
        &self,
        actor: &Actor,
        records: &[ProgressRecord],
        requested: Option<MemberId>,
        roster: &dyn MemberRoster,
    ) -> Result<Vec<ProgressRecord>, ProgressError> {
        Ok(self
            .scope(actor, records, requested, roster)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// Every record the actor may read across members (facility dashboards).
    /// Members get their own records only.
    pub fn scope_all<'a>(
        &self,
        actor: &Actor,
        records: &'a [ProgressRecord],
    ) -> Vec<&'a ProgressRecord> {
        match actor.role {
            Role::Member => records.iter().filter(|r| actor.owns(r.member)).collect(),
            Role::Trainer | Role::Staff | Role::Admin => records.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Measurements, RecordId, UserId};
    use chrono::{NaiveDate, Utc};

    fn make_record(member: u64, day: u32) -> ProgressRecord {
        let now = Utc::now();
        ProgressRecord {
            id: RecordId::new_v4(),
            member: MemberId(member),
            registered_by: None,
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            measurements: Measurements {
                weight: Some(70.0 + day as f64),
                ..Default::default()
            },
            notes: String::new(),
            bmi: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn population() -> Vec<ProgressRecord> {
        vec![
            make_record(1, 1),
            make_record(2, 2),
            make_record(2, 3),
            make_record(2, 4),
            make_record(1, 5),
        ]
    }

    fn roster() -> Vec<MemberId> {
        vec![MemberId(1), MemberId(2), MemberId(3)]
    }

    fn member_a() -> Actor {
        Actor::new(UserId(100), Role::Member, Some(MemberId(1)))
    }

    #[test]
    fn test_member_sees_only_own_records() {
        let records = population();
        let scoped = VisibilityResolver::default()
            .scope(&member_a(), &records, None, &roster())
            .unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|r| r.member == MemberId(1)));
    }

    #[test]
    fn test_member_request_for_other_member_is_ignored() {
        let records = population();
        let scoped = VisibilityResolver::default()
            .scope(&member_a(), &records, Some(MemberId(2)), &roster())
            .unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|r| r.member == MemberId(1)));
    }

    #[test]
    fn test_reject_policy_does_not_leak_existence() {
        let records = population();
        let resolver = VisibilityResolver::new(ForeignRequestPolicy::Reject);

        let existing = resolver
            .scope(&member_a(), &records, Some(MemberId(2)), &roster())
            .unwrap_err();
        let missing = resolver
            .scope(&member_a(), &records, Some(MemberId(404)), &roster())
            .unwrap_err();

        assert!(existing.is_authorization());
        assert!(missing.is_authorization());
        assert_eq!(existing.to_string(), missing.to_string());

        // Asking for oneself is always fine
        assert!(resolver
            .scope(&member_a(), &records, Some(MemberId(1)), &roster())
            .is_ok());
    }

    #[test]
    fn test_trainer_selects_member() {
        let records = population();
        let trainer = Actor::new(UserId(7), Role::Trainer, None);
        let scoped = VisibilityResolver::default()
            .scope(&trainer, &records, Some(MemberId(2)), &roster())
            .unwrap();
        assert_eq!(scoped.len(), 3);
    }

    #[test]
    fn test_trainer_without_selection_sees_own_state() {
        let records = population();
        let trainer = Actor::new(UserId(7), Role::Trainer, None);
        let scoped = VisibilityResolver::default()
            .scope(&trainer, &records, None, &roster())
            .unwrap();
        assert!(scoped.is_empty());

        let admin_member = Actor::new(UserId(8), Role::Admin, Some(MemberId(2)));
        let scoped = VisibilityResolver::default()
            .scope(&admin_member, &records, None, &roster())
            .unwrap();
        assert_eq!(scoped.len(), 3);
    }

    #[test]
    fn test_privileged_unknown_member_is_not_found() {
        let records = population();
        for role in [Role::Trainer, Role::Staff, Role::Admin] {
            let actor = Actor::new(UserId(7), role, None);
            let err = VisibilityResolver::default()
                .scope(&actor, &records, Some(MemberId(404)), &roster())
                .unwrap_err();
            assert!(matches!(err, ProgressError::MemberNotFound(MemberId(404))));
        }
    }

    #[test]
    fn test_known_member_without_records_is_empty() {
        let records = population();
        let staff = Actor::new(UserId(7), Role::Staff, None);
        let scoped = VisibilityResolver::default()
            .scope(&staff, &records, Some(MemberId(3)), &roster())
            .unwrap();
        assert!(scoped.is_empty());
    }

    #[test]
    fn test_scope_preserves_input_order() {
        let records = population();
        let scoped = VisibilityResolver::default()
            .scope(&member_a(), &records, None, &roster())
            .unwrap();
        assert_eq!(scoped[0].id, records[0].id);
        assert_eq!(scoped[1].id, records[4].id);
    }

    #[test]
    fn test_scope_all() {
        let records = population();
        let resolver = VisibilityResolver::default();
        assert_eq!(resolver.scope_all(&member_a(), &records).len(), 2);
        let admin = Actor::new(UserId(1), Role::Admin, None);
        assert_eq!(resolver.scope_all(&admin, &records).len(), 5);
    }

    #[test]
    fn test_set_rosters() {
        let set: HashSet<MemberId> = roster().into_iter().collect();
        assert!(MemberRoster::contains(&set, MemberId(2)));
        let tree: BTreeSet<MemberId> = roster().into_iter().collect();
        assert!(!MemberRoster::contains(&tree, MemberId(9)));
    }
}
