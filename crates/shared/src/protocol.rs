use std::fmt;

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::domain::{PageSize, PatientId, SortDirection, SortField};

/// Class names used by backends that answer with integer codes instead of labels.
pub const DISEASE_LABELS: [&str; 4] = ["Healthy", "Diabetes", "Heart Disease", "Lung Disease"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: PatientId,
    pub age: f64,
    pub bmi: f64,
    pub cholesterol: f64,
    pub blood_pressure: f64,
    pub glucose: f64,
}

/// Body of `POST /predict`. Field order follows the model's feature order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub cholesterol: f64,
    pub blood_pressure: f64,
    pub age: f64,
    pub glucose: f64,
    pub bmi: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearPrediction {
    pub year: String,
    pub label: String,
}

impl YearPrediction {
    pub fn new(year: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            label: label.into(),
        }
    }
}

/// Year → label mapping kept in the order the server enumerated it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionTimeline(pub Vec<YearPrediction>);

impl PredictionTimeline {
    pub fn entries(&self) -> &[YearPrediction] {
        &self.0
    }

    pub fn into_entries(self) -> Vec<YearPrediction> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Numeric years ascending; anything that is not a number keeps its
    /// relative position after them.
    pub fn sort_by_year(&mut self) {
        self.0.sort_by_key(|entry| match entry.year.trim().parse::<i64>() {
            Ok(year) => (0, year),
            Err(_) => (1, 0),
        });
    }
}

impl From<Vec<YearPrediction>> for PredictionTimeline {
    fn from(value: Vec<YearPrediction>) -> Self {
        Self(value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Text(String),
    Code(i64),
}

impl RawLabel {
    fn into_label(self) -> String {
        match self {
            RawLabel::Text(text) => text,
            RawLabel::Code(code) => usize::try_from(code)
                .ok()
                .and_then(|index| DISEASE_LABELS.get(index))
                .map(|label| label.to_string())
                .unwrap_or_else(|| format!("Unknown ({code})")),
        }
    }
}

struct TimelineVisitor;

impl<'de> Visitor<'de> for TimelineVisitor {
    type Value = PredictionTimeline;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map from year to disease label")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((year, label)) = access.next_entry::<String, RawLabel>()? {
            entries.push(YearPrediction {
                year,
                label: label.into_label(),
            });
        }
        Ok(PredictionTimeline(entries))
    }
}

impl<'de> Deserialize<'de> for PredictionTimeline {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(TimelineVisitor)
    }
}

impl Serialize for PredictionTimeline {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.year, &entry.label)?;
        }
        map.end()
    }
}

/// Body of a successful `POST /predict`. Accepts both `{"predictions": {..}}`
/// and a bare year map at the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PredictBody")]
pub struct PredictResponse {
    pub predictions: PredictionTimeline,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PredictBody {
    Wrapped { predictions: PredictionTimeline },
    Bare(PredictionTimeline),
}

impl From<PredictBody> for PredictResponse {
    fn from(body: PredictBody) -> Self {
        match body {
            PredictBody::Wrapped { predictions } | PredictBody::Bare(predictions) => {
                Self { predictions }
            }
        }
    }
}

/// Query string of `GET /patients`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: u32,
    pub page_size: PageSize,
    pub sort_by: SortField,
    pub sort_dir: SortDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: PageSize::default(),
            sort_by: SortField::default(),
            sort_dir: SortDirection::default(),
            q: None,
        }
    }
}

impl ListQuery {
    /// Stores the search text, treating blank input as "no filter".
    pub fn set_search(&mut self, q: impl Into<String>) {
        let q = q.into();
        let trimmed = q.trim();
        self.q = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientPage {
    pub patients: Vec<PatientRecord>,
    pub total_pages: u32,
}
