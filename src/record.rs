//! Record lifecycle
//!
//! Creation, amendment and deletion rules applied where a raw record enters
//! or changes in the system. Persistence itself belongs to the storage
//! collaborator; this module only decides what a valid record looks like and
//! who may touch it.

use crate::derivation::MetricDeriver;
use crate::error::ProgressError;
use crate::types::{Actor, Measurements, MemberId, ProgressRecord, RecordId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound for body fat percentage
const MAX_BODY_FAT_PERCENTAGE: f64 = 100.0;

/// Input for a new progress record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDraft {
    pub member: MemberId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub measurements: Measurements,
    #[serde(default)]
    pub notes: String,
}

impl RecordDraft {
    /// Reject drafts that carry no measurement or an impossible value.
    pub fn validate(&self) -> Result<(), ProgressError> {
        if self.measurements.is_empty() {
            return Err(ProgressError::EmptyRecord);
        }
        validate_measurements(&self.measurements)
    }
}

fn validate_measurements(measurements: &Measurements) -> Result<(), ProgressError> {
    for (field, value) in measurements.fields() {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                return Err(ProgressError::InvalidMeasurement { field, value });
            }
        }
    }
    if let Some(fat) = measurements.body_fat_percentage {
        if fat > MAX_BODY_FAT_PERCENTAGE {
            return Err(ProgressError::InvalidMeasurement {
                field: "body_fat_percentage",
                value: fat,
            });
        }
    }
    Ok(())
}

/// Check that `actor` may register or amend records owned by `member`.
pub fn authorize_write(actor: &Actor, member: MemberId) -> Result<(), ProgressError> {
    if actor.owns(member) || actor.role.records_for_others() {
        Ok(())
    } else {
        Err(ProgressError::Forbidden)
    }
}

/// Check that `actor` may delete `record`.
pub fn authorize_delete(actor: &Actor, record: &ProgressRecord) -> Result<(), ProgressError> {
    authorize_write(actor, record.member)
}

impl ProgressRecord {
    /// Create a record from a validated draft, registered by `actor`.
    pub fn create(draft: RecordDraft, actor: &Actor) -> Result<Self, ProgressError> {
        Self::create_at(draft, actor, Utc::now())
    }

    /// Like [`ProgressRecord::create`] with an explicit creation timestamp.
    pub fn create_at(
        draft: RecordDraft,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        authorize_write(actor, draft.member)?;
        draft.validate()?;

        let record = ProgressRecord {
            id: RecordId::new_v4(),
            member: draft.member,
            registered_by: Some(actor.user_id),
            date: draft.date,
            measurements: draft.measurements,
            notes: draft.notes,
            bmi: None,
            created_at: now,
            updated_at: now,
        };
        tracing::debug!(record = %record.id, member = %record.member, "progress record created");
        Ok(MetricDeriver::derive(record))
    }

    /// Apply a field-level amendment. Identity, owner and date never change.
    pub fn amend(
        &mut self,
        patch: &MeasurementPatch,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(), ProgressError> {
        authorize_write(actor, self.member)?;

        let mut measurements = self.measurements;
        patch.apply(&mut measurements);
        if measurements.is_empty() {
            return Err(ProgressError::EmptyRecord);
        }
        validate_measurements(&measurements)?;

        self.measurements = measurements;
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        self.updated_at = now;
        MetricDeriver::derive_in_place(self);
        Ok(())
    }
}

/// Change to a single optional field
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldPatch {
    #[default]
    Keep,
    Set(f64),
    Clear,
}

impl FieldPatch {
    fn apply(&self, field: &mut Option<f64>) {
        match self {
            FieldPatch::Keep => {}
            FieldPatch::Set(value) => *field = Some(*value),
            FieldPatch::Clear => *field = None,
        }
    }
}

/// Amendment of individual measurement fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementPatch {
    pub weight: FieldPatch,
    pub height: FieldPatch,
    pub body_fat_percentage: FieldPatch,
    pub muscle_mass: FieldPatch,
    pub chest: FieldPatch,
    pub waist: FieldPatch,
    pub hips: FieldPatch,
    pub notes: Option<String>,
}

impl MeasurementPatch {
    fn apply(&self, m: &mut Measurements) {
        self.weight.apply(&mut m.weight);
        self.height.apply(&mut m.height);
        self.body_fat_percentage.apply(&mut m.body_fat_percentage);
        self.muscle_mass.apply(&mut m.muscle_mass);
        self.chest.apply(&mut m.chest);
        self.waist.apply(&mut m.waist);
        self.hips.apply(&mut m.hips);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, UserId};

    fn member_actor() -> Actor {
        Actor::new(UserId(10), Role::Member, Some(MemberId(1)))
    }

    fn draft(member: u64) -> RecordDraft {
        RecordDraft {
            member: MemberId(member),
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            measurements: Measurements {
                weight: Some(80.0),
                height: Some(180.0),
                ..Default::default()
            },
            notes: "first check-in".to_string(),
        }
    }

    #[test]
    fn test_create_derives_bmi_and_registrar() {
        let record = ProgressRecord::create(draft(1), &member_actor()).unwrap();
        assert_eq!(record.registered_by, Some(UserId(10)));
        assert!(record.bmi.is_some());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_empty_draft_rejected() {
        let mut d = draft(1);
        d.measurements = Measurements::default();
        assert!(matches!(
            ProgressRecord::create(d, &member_actor()),
            Err(ProgressError::EmptyRecord)
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut d = draft(1);
        d.measurements.body_fat_percentage = Some(120.0);
        assert!(matches!(
            d.validate(),
            Err(ProgressError::InvalidMeasurement { field: "body_fat_percentage", .. })
        ));

        let mut d = draft(1);
        d.measurements.waist = Some(-3.0);
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_zero_height_is_stored_without_bmi() {
        let mut d = draft(1);
        d.measurements.height = Some(0.0);
        let record = ProgressRecord::create(d, &member_actor()).unwrap();
        assert!(record.bmi.is_none());
    }

    #[test]
    fn test_member_cannot_create_for_someone_else() {
        let result = ProgressRecord::create(draft(2), &member_actor());
        assert!(matches!(result, Err(ProgressError::Forbidden)));
    }

    #[test]
    fn test_authorization_checked_before_validation() {
        let mut d = draft(2);
        d.measurements = Measurements::default();
        let result = ProgressRecord::create(d, &member_actor());
        assert!(matches!(result, Err(ProgressError::Forbidden)));
    }

    #[test]
    fn test_trainer_creates_on_behalf_of_member() {
        let trainer = Actor::new(UserId(99), Role::Trainer, None);
        let record = ProgressRecord::create(draft(2), &trainer).unwrap();
        assert_eq!(record.member, MemberId(2));
        assert_eq!(record.registered_by, Some(UserId(99)));
    }

    #[test]
    fn test_staff_is_read_only() {
        let staff = Actor::new(UserId(50), Role::Staff, None);
        assert!(ProgressRecord::create(draft(2), &staff).is_err());
    }

    #[test]
    fn test_amend_recomputes_bmi() {
        let actor = member_actor();
        let mut record = ProgressRecord::create(draft(1), &actor).unwrap();
        let before = record.bmi.unwrap();

        let patch = MeasurementPatch {
            weight: FieldPatch::Set(75.0),
            ..Default::default()
        };
        let later = record.created_at + chrono::Duration::hours(1);
        record.amend(&patch, &actor, later).unwrap();

        assert!(record.bmi.unwrap() < before);
        assert_eq!(record.updated_at, later);
        assert_eq!(record.notes, "first check-in");

        let clear_height = MeasurementPatch {
            height: FieldPatch::Clear,
            ..Default::default()
        };
        record.amend(&clear_height, &actor, later).unwrap();
        assert!(record.bmi.is_none());
    }

    #[test]
    fn test_amend_cannot_empty_record() {
        let actor = member_actor();
        let mut record = ProgressRecord::create(draft(1), &actor).unwrap();
        let patch = MeasurementPatch {
            weight: FieldPatch::Clear,
            height: FieldPatch::Clear,
            ..Default::default()
        };
        let original = record.clone();
        assert!(record.amend(&patch, &actor, Utc::now()).is_err());
        assert_eq!(record, original);
    }

    #[test]
    fn test_delete_authorization() {
        let record = ProgressRecord::create(draft(1), &member_actor()).unwrap();
        assert!(authorize_delete(&member_actor(), &record).is_ok());

        let other = Actor::new(UserId(11), Role::Member, Some(MemberId(2)));
        assert!(authorize_delete(&other, &record).is_err());

        let admin = Actor::new(UserId(1), Role::Admin, None);
        assert!(authorize_delete(&admin, &record).is_ok());
    }

    #[test]
    fn test_patch_json() {
        let patch: MeasurementPatch = serde_json::from_str(
            r#"{"waist": {"op": "set", "value": 84.5}, "hips": {"op": "clear"}}"#,
        )
        .unwrap();
        assert_eq!(patch.waist, FieldPatch::Set(84.5));
        assert_eq!(patch.hips, FieldPatch::Clear);
        assert_eq!(patch.weight, FieldPatch::Keep);
    }
}
