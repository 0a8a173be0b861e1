use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PatientId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// One of the five numeric inputs accepted by the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiomarkerField {
    Age,
    Cholesterol,
    BloodPressure,
    Glucose,
    Bmi,
}

impl BiomarkerField {
    /// Form display order.
    pub const ALL: [BiomarkerField; 5] = [
        BiomarkerField::Age,
        BiomarkerField::Cholesterol,
        BiomarkerField::BloodPressure,
        BiomarkerField::Glucose,
        BiomarkerField::Bmi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BiomarkerField::Age => "age",
            BiomarkerField::Cholesterol => "cholesterol",
            BiomarkerField::BloodPressure => "blood_pressure",
            BiomarkerField::Glucose => "glucose",
            BiomarkerField::Bmi => "bmi",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BiomarkerField::Age => "Age",
            BiomarkerField::Cholesterol => "Cholesterol",
            BiomarkerField::BloodPressure => "Blood Pressure",
            BiomarkerField::Glucose => "Glucose",
            BiomarkerField::Bmi => "BMI",
        }
    }

    fn index(self) -> usize {
        match self {
            BiomarkerField::Age => 0,
            BiomarkerField::Cholesterol => 1,
            BiomarkerField::BloodPressure => 2,
            BiomarkerField::Glucose => 3,
            BiomarkerField::Bmi => 4,
        }
    }
}

impl fmt::Display for BiomarkerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiomarkerField {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BiomarkerField::ALL
            .into_iter()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| UnknownVariant {
                kind: "biomarker field",
                value: s.to_string(),
            })
    }
}

/// Raw, unvalidated form values keyed by [`BiomarkerField`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BiomarkerInput {
    values: [String; 5],
}

impl BiomarkerInput {
    pub fn get(&self, field: BiomarkerField) -> &str {
        &self.values[field.index()]
    }

    pub fn set(&mut self, field: BiomarkerField, value: impl Into<String>) {
        self.values[field.index()] = value.into();
    }

    pub fn with(mut self, field: BiomarkerField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|value| !value.trim().is_empty())
    }

    pub fn missing_fields(&self) -> Vec<BiomarkerField> {
        BiomarkerField::ALL
            .into_iter()
            .filter(|field| self.get(*field).trim().is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    PatientId,
    Age,
    Bmi,
    Cholesterol,
    BloodPressure,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::PatientId,
        SortField::Age,
        SortField::Bmi,
        SortField::Cholesterol,
        SortField::BloodPressure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::PatientId => "patient_id",
            SortField::Age => "age",
            SortField::Bmi => "bmi",
            SortField::Cholesterol => "cholesterol",
            SortField::BloodPressure => "blood_pressure",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortField::ALL
            .into_iter()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| UnknownVariant {
                kind: "sort field",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(UnknownVariant {
                kind: "sort direction",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PageSize {
    #[default]
    Fifteen,
    Thirty,
    Fifty,
}

impl PageSize {
    pub const ALL: [PageSize; 3] = [PageSize::Fifteen, PageSize::Thirty, PageSize::Fifty];

    pub fn get(self) -> u32 {
        match self {
            PageSize::Fifteen => 15,
            PageSize::Thirty => 30,
            PageSize::Fifty => 50,
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl TryFrom<u32> for PageSize {
    type Error = UnknownVariant;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        PageSize::ALL
            .into_iter()
            .find(|size| size.get() == value)
            .ok_or_else(|| UnknownVariant {
                kind: "page size",
                value: value.to_string(),
            })
    }
}

impl From<PageSize> for u32 {
    fn from(value: PageSize) -> Self {
        value.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Table,
    Card,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Table => ViewMode::Card,
            ViewMode::Card => ViewMode::Table,
        }
    }
}

impl FromStr for ViewMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(ViewMode::Table),
            "card" | "cards" => Ok(ViewMode::Card),
            _ => Err(UnknownVariant {
                kind: "view mode",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biomarker_input_tracks_missing_fields() {
        let input = BiomarkerInput::default()
            .with(BiomarkerField::Age, "45")
            .with(BiomarkerField::Bmi, "  ");
        assert!(!input.is_complete());
        assert_eq!(
            input.missing_fields(),
            vec![
                BiomarkerField::Cholesterol,
                BiomarkerField::BloodPressure,
                BiomarkerField::Glucose,
                BiomarkerField::Bmi,
            ]
        );
    }

    #[test]
    fn page_size_only_accepts_supported_values() {
        assert_eq!(PageSize::try_from(30), Ok(PageSize::Thirty));
        let err = PageSize::try_from(20).expect_err("20 is not offered");
        assert_eq!(err.to_string(), "unknown page size '20'");
    }

    #[test]
    fn wire_names_round_through_from_str() {
        assert_eq!(
            "blood_pressure".parse::<BiomarkerField>(),
            Ok(BiomarkerField::BloodPressure)
        );
        assert_eq!("patient_id".parse::<SortField>(), Ok(SortField::PatientId));
        assert_eq!("DESC".parse::<SortDirection>(), Ok(SortDirection::Desc));
        assert_eq!("cards".parse::<ViewMode>(), Ok(ViewMode::Card));
        assert!("height".parse::<BiomarkerField>().is_err());
    }
}
