use serde::{Deserialize, Serialize};

use crate::structs::drink_entry::{DrinkEntry, DrinkType, Unit};

/// A preset drink from the shared catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub id: String,

    #[serde(alias = "name")]
    pub label: String,

    #[serde(rename = "type", alias = "category")]
    pub drink_type: DrinkType,

    pub default_qty: f64,

    #[serde(default, alias = "unit")]
    pub default_unit: Unit,

    #[serde(alias = "standard_drinks")]
    pub default_std: f64,
}

impl CatalogItem {
    /// Starts a log entry prefilled with this preset's pour.
    pub fn to_entry(&self) -> DrinkEntry {
        DrinkEntry::new(self.drink_type, self.default_qty, self.default_unit)
            .notes(self.label.clone())
    }
}

/// What the photo classifier thinks is in the glass.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Classification {
    #[serde(rename = "type")]
    pub drink_type: DrinkType,
    pub qty: f64,
    #[serde(default)]
    pub unit: Unit,
    pub std_drinks: f64,
    pub confidence: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Classification {
    /// Returned whenever the classifier is disabled or unreachable.
    pub fn mock() -> Self {
        Self {
            drink_type: DrinkType::Beer,
            qty: 12.0,
            unit: Unit::Oz,
            std_drinks: 1.0,
            confidence: 0.65,
            notes: Some("Mock classification, classifier unavailable".to_string()),
        }
    }

    /// Turns the guess into a log entry. Millilitres are converted to ounces
    /// and the standard-drink count is re-derived from the pour.
    pub fn into_entry(self, photo_path: Option<String>) -> DrinkEntry {
        let mut entry = DrinkEntry::new(self.drink_type, self.qty, self.unit);
        entry.ai_confidence = Some(self.confidence);
        entry.notes = self.notes;
        entry.photo_url = photo_path;
        entry
    }
}
