//! Core types for the progress engine
//!
//! This module defines the data structures that flow through every stage:
//! identities and roles, raw measurements, the progress record itself and the
//! metric catalogue used by the evolution, comparison and summary stages.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a member profile (the owner of progress records)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an authenticated user account (who registered a record)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single progress record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new_v4() -> Self {
        RecordId(Uuid::new_v4())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(RecordId)
    }
}

/// Facility role of an authenticated actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Trainer,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Trainer => "trainer",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Roles that browse the member roster and may select any member.
    pub fn browses_roster(&self) -> bool {
        match self {
            Role::Member => false,
            Role::Trainer | Role::Staff | Role::Admin => true,
        }
    }

    /// Roles that may register or amend records on behalf of another member.
    pub fn records_for_others(&self) -> bool {
        match self {
            Role::Member | Role::Staff => false,
            Role::Trainer | Role::Admin => true,
        }
    }
}

/// An authenticated actor, as handed over by the auth collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User account of the actor
    pub user_id: UserId,
    /// Role of the actor
    pub role: Role,
    /// Member profile of the actor, if they have one
    #[serde(default)]
    pub member_id: Option<MemberId>,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, member_id: Option<MemberId>) -> Self {
        Self {
            user_id,
            role,
            member_id,
        }
    }

    /// Whether this actor owns records of `member`
    pub fn owns(&self, member: MemberId) -> bool {
        self.member_id == Some(member)
    }
}

/// Raw body measurements; every field is independently optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    /// Body weight (kg)
    #[serde(default)]
    pub weight: Option<f64>,
    /// Height (cm)
    #[serde(default)]
    pub height: Option<f64>,
    /// Body fat (percentage, 0-100)
    #[serde(default)]
    pub body_fat_percentage: Option<f64>,
    /// Muscle mass (kg)
    #[serde(default)]
    pub muscle_mass: Option<f64>,
    /// Chest circumference (cm)
    #[serde(default)]
    pub chest: Option<f64>,
    /// Waist circumference (cm)
    #[serde(default)]
    pub waist: Option<f64>,
    /// Hip circumference (cm)
    #[serde(default)]
    pub hips: Option<f64>,
}

impl Measurements {
    /// True when no measurement field is populated
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_none())
    }

    /// Field name and value pairs, in declaration order
    pub fn fields(&self) -> [(&'static str, Option<f64>); 7] {
        [
            ("weight", self.weight),
            ("height", self.height),
            ("body_fat_percentage", self.body_fat_percentage),
            ("muscle_mass", self.muscle_mass),
            ("chest", self.chest),
            ("waist", self.waist),
            ("hips", self.hips),
        ]
    }
}

/// One measurement snapshot for one member on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: RecordId,
    /// Owner of the record
    pub member: MemberId,
    /// Who registered it; may differ from the owner for trainer-entered data
    #[serde(default)]
    pub registered_by: Option<UserId>,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub measurements: Measurements,
    #[serde(default)]
    pub notes: String,
    /// Derived body mass index; recomputed from this record's own weight/height
    #[serde(default)]
    pub bmi: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Current value of `metric` on this record
    pub fn value(&self, metric: Metric) -> Option<f64> {
        let m = &self.measurements;
        match metric {
            Metric::Weight => m.weight,
            Metric::Bmi => self.bmi,
            Metric::BodyFat => m.body_fat_percentage,
            Metric::MuscleMass => m.muscle_mass,
            Metric::Chest => m.chest,
            Metric::Waist => m.waist,
            Metric::Hips => m.hips,
        }
    }

    /// True when the record carries at least one measurement
    pub fn has_measurements(&self) -> bool {
        !self.measurements.is_empty()
    }
}

impl AsRef<ProgressRecord> for ProgressRecord {
    fn as_ref(&self) -> &ProgressRecord {
        self
    }
}

/// Which way a metric has to move to count as progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavorableDirection {
    Lower,
    Higher,
    /// Reported as a plain signed change, without an improvement judgment
    Unjudged,
}

/// Tracked metrics, in the order every series and report lists them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Weight,
    Bmi,
    BodyFat,
    MuscleMass,
    Chest,
    Waist,
    Hips,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Weight,
        Metric::Bmi,
        Metric::BodyFat,
        Metric::MuscleMass,
        Metric::Chest,
        Metric::Waist,
        Metric::Hips,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Weight => "weight",
            Metric::Bmi => "bmi",
            Metric::BodyFat => "body_fat",
            Metric::MuscleMass => "muscle_mass",
            Metric::Chest => "chest",
            Metric::Waist => "waist",
            Metric::Hips => "hips",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Weight | Metric::MuscleMass => "kg",
            Metric::Bmi => "",
            Metric::BodyFat => "%",
            Metric::Chest | Metric::Waist | Metric::Hips => "cm",
        }
    }

    /// Fixed progress policy per metric. Weight and BMI are never judged
    /// since losing weight is not every member's goal.
    pub fn favorable_direction(&self) -> FavorableDirection {
        match self {
            Metric::Weight | Metric::Bmi => FavorableDirection::Unjudged,
            Metric::BodyFat | Metric::Waist => FavorableDirection::Lower,
            Metric::MuscleMass | Metric::Chest | Metric::Hips => FavorableDirection::Higher,
        }
    }

    pub fn lower_is_better(&self) -> bool {
        self.favorable_direction() == FavorableDirection::Lower
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_table() {
        assert!(Metric::BodyFat.lower_is_better());
        assert!(Metric::Waist.lower_is_better());
        assert!(!Metric::MuscleMass.lower_is_better());
        assert_eq!(Metric::Chest.favorable_direction(), FavorableDirection::Higher);
        assert_eq!(Metric::Hips.favorable_direction(), FavorableDirection::Higher);
        assert_eq!(Metric::Weight.favorable_direction(), FavorableDirection::Unjudged);
        assert_eq!(Metric::Bmi.favorable_direction(), FavorableDirection::Unjudged);
    }

    #[test]
    fn test_role_capabilities() {
        assert!(!Role::Member.browses_roster());
        assert!(Role::Staff.browses_roster());
        assert!(!Role::Staff.records_for_others());
        assert!(Role::Trainer.records_for_others());
        assert!(Role::Admin.records_for_others());
    }

    #[test]
    fn test_empty_measurements() {
        assert!(Measurements::default().is_empty());
        let m = Measurements {
            waist: Some(80.0),
            ..Default::default()
        };
        assert!(!m.is_empty());
    }

    #[test]
    fn test_record_json_keeps_null_distinct_from_zero() {
        let json = r#"{
            "id": "6f1c2d34-5b6a-4c1e-9a0b-1d2e3f4a5b6c",
            "member": 7,
            "date": "2024-03-01",
            "weight": 0.0,
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }"#;
        let record: ProgressRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.member, MemberId(7));
        assert_eq!(record.value(Metric::Weight), Some(0.0));
        assert_eq!(record.value(Metric::Waist), None);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["weight"], 0.0);
        assert!(value["waist"].is_null());
    }

    #[test]
    fn test_record_id_parse() {
        let id: RecordId = "6f1c2d34-5b6a-4c1e-9a0b-1d2e3f4a5b6c".parse().unwrap();
        assert_eq!(id.to_string(), "6f1c2d34-5b6a-4c1e-9a0b-1d2e3f4a5b6c");
        assert!("not-a-uuid".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_role_serde() {
        let role: Role = serde_json::from_str("\"trainer\"").unwrap();
        assert_eq!(role, Role::Trainer);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
