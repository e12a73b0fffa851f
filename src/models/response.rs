//! Survey responses: respondent attributes plus one rating per design.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
};
use thiserror::Error;
use uuid::Uuid;

/// Field name → human readable message, as shown next to the form field.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("score `{0}` must be between 1 and 5")]
pub struct InvalidScore(pub i64);

/// A star score in `1..=5`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = InvalidScore;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(InvalidScore(value))
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// One respondent's rating of one design.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rating {
    pub design_quality: Score,
    pub buy_intention: Score,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::PreferNotToSay => "prefer-not-to-say",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "prefer-not-to-say" => Ok(Gender::PreferNotToSay),
            other => Err(format!("unknown gender `{}`", other)),
        }
    }
}

/// Validated respondent attributes embedded in a response.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RespondentAttributes {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// A complete, persisted survey submission.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Response {
    pub id: Uuid,
    pub user_data: RespondentAttributes,
    pub ratings: HashMap<Uuid, Rating>,
    pub submitted_at: DateTime<Utc>,
}

/// Respondent attributes as typed into the form, before validation.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct RespondentForm {
    #[serde(default)]
    pub name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub contact: Option<String>,
}

impl RespondentForm {
    /// Validate every field, collecting one message per offending field.
    pub fn validate(&self) -> Result<RespondentAttributes, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.insert("name".into(), "Name is required".into());
        }

        let age = match self.age {
            Some(age) if age >= 1 => u32::try_from(age).ok(),
            _ => None,
        };
        if age.is_none() {
            errors.insert("age".into(), "Please enter a valid age".into());
        }

        let gender = self
            .gender
            .as_deref()
            .filter(|g| !g.is_empty())
            .and_then(|g| g.parse::<Gender>().ok());
        if gender.is_none() {
            errors.insert("gender".into(), "Please select your gender".into());
        }

        match (age, gender) {
            (Some(age), Some(gender)) if errors.is_empty() => Ok(RespondentAttributes {
                name: name.to_string(),
                age,
                gender,
                contact: self
                    .contact
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
            }),
            _ => Err(errors),
        }
    }
}

/// A rating as submitted; either score may still be missing.
#[derive(Deserialize, Clone, Copy, Debug, Default)]
pub struct RatingForm {
    pub design_quality: Option<i64>,
    pub buy_intention: Option<i64>,
}

impl RatingForm {
    /// A rating counts only when both scores are present and in range.
    pub fn complete(&self) -> Option<Rating> {
        let design_quality = Score::try_from(self.design_quality?).ok()?;
        let buy_intention = Score::try_from(self.buy_intention?).ok()?;
        Some(Rating {
            design_quality,
            buy_intention,
        })
    }
}

/// Body of `POST /api/responses`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ResponseSubmission {
    #[serde(default)]
    pub user_data: RespondentForm,
    #[serde(default)]
    pub ratings: HashMap<Uuid, RatingForm>,
}

impl ResponseSubmission {
    /// Check the submission against the designs currently offered for rating.
    ///
    /// Every listed design needs a complete rating and no rating may reference
    /// a design outside the list.
    pub fn validate(
        &self,
        design_ids: &[Uuid],
    ) -> Result<(RespondentAttributes, HashMap<Uuid, Rating>), FieldErrors> {
        let (attributes, mut errors) = match self.user_data.validate() {
            Ok(attributes) => (Some(attributes), FieldErrors::new()),
            Err(errors) => (None, errors),
        };

        if design_ids.is_empty() {
            errors.insert("ratings".into(), "No designs are available to rate".into());
        }

        let mut ratings = HashMap::with_capacity(design_ids.len());
        for id in design_ids {
            match self.ratings.get(id).and_then(RatingForm::complete) {
                Some(rating) => {
                    ratings.insert(*id, rating);
                }
                None => {
                    errors.insert(
                        format!("ratings.{}", id),
                        "Both ratings are required".into(),
                    );
                }
            }
        }

        for id in self.ratings.keys() {
            if !design_ids.contains(id) {
                errors.insert(format!("ratings.{}", id), "Unknown design".into());
            }
        }

        match attributes {
            Some(attributes) if errors.is_empty() => Ok((attributes, ratings)),
            _ => Err(errors),
        }
    }
}
