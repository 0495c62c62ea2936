use std::{fmt, str::FromStr};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::estimate::{estimate, normalize_from_guess};

/// Category of a logged drink. Anything unrecognized is `Other`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DrinkType {
    Beer,
    Wine,
    Spirits,
    Cocktail,
    Seltzer,
    #[default]
    #[serde(other)]
    Other,
}

impl DrinkType {
    pub const ALL: [DrinkType; 6] = [
        DrinkType::Beer,
        DrinkType::Wine,
        DrinkType::Spirits,
        DrinkType::Cocktail,
        DrinkType::Seltzer,
        DrinkType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DrinkType::Beer => "beer",
            DrinkType::Wine => "wine",
            DrinkType::Spirits => "spirits",
            DrinkType::Cocktail => "cocktail",
            DrinkType::Seltzer => "seltzer",
            DrinkType::Other => "other",
        }
    }

    /// Lenient parse, never fails.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "beer" => DrinkType::Beer,
            "wine" => DrinkType::Wine,
            "spirits" => DrinkType::Spirits,
            "cocktail" => DrinkType::Cocktail,
            "seltzer" => DrinkType::Seltzer,
            _ => DrinkType::Other,
        }
    }
}

impl FromStr for DrinkType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lossy(s))
    }
}

impl fmt::Display for DrinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurement unit of `DrinkEntry::quantity`.
///
/// Ounces are canonical. The container units are accepted for rows written by
/// older clients and pass through normalization untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Ml,
    Bottle,
    Can,
    Glass,
    Shot,
    Pint,
    Cup,
    #[default]
    #[serde(other)]
    Oz,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Oz => "oz",
            Unit::Ml => "ml",
            Unit::Bottle => "bottle",
            Unit::Can => "can",
            Unit::Glass => "glass",
            Unit::Shot => "shot",
            Unit::Pint => "pint",
            Unit::Cup => "cup",
        }
    }

    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ml" => Unit::Ml,
            "bottle" => Unit::Bottle,
            "can" => Unit::Can,
            "glass" => Unit::Glass,
            "shot" => Unit::Shot,
            "pint" => Unit::Pint,
            "cup" => Unit::Cup,
            _ => Unit::Oz,
        }
    }
}

impl FromStr for Unit {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lossy(s))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DrinkEntry {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type")]
    pub drink_type: DrinkType,

    /// Amount consumed, in `unit`
    pub quantity: f64,

    #[serde(default)]
    pub unit: Unit,

    /// Derived from type and quantity, stored so aggregation is a plain sum
    pub standard_drinks: f64,

    /// When the drink was consumed, not when it was recorded
    pub logged_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,
}

impl Default for DrinkEntry {
    fn default() -> Self {
        Self::new(DrinkType::Beer, 12.0, Unit::Oz)
    }
}

impl DrinkEntry {
    pub fn new(drink_type: DrinkType, quantity: f64, unit: Unit) -> Self {
        let (drink_type, quantity, unit) = normalize_from_guess(drink_type, quantity, unit);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            drink_type,
            quantity,
            unit,
            standard_drinks: estimate(drink_type, quantity, unit),
            logged_at: Utc::now(),
            notes: None,
            photo_url: None,
            ai_confidence: None,
        }
    }

    pub fn logged_at(mut self, at: DateTime<Utc>) -> Self {
        self.logged_at = at;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Applies an edit. `standard_drinks` follows type, quantity and unit.
    pub fn apply(&mut self, patch: &DrinkPatch) {
        let drink_type = patch.drink_type.unwrap_or(self.drink_type);
        let quantity = patch.quantity.unwrap_or(self.quantity);
        let unit = patch.unit.unwrap_or(self.unit);

        if patch.touches_estimate() {
            let (drink_type, quantity, unit) = normalize_from_guess(drink_type, quantity, unit);
            self.drink_type = drink_type;
            self.quantity = quantity;
            self.unit = unit;
            self.standard_drinks = estimate(drink_type, quantity, unit);
        }

        if let Some(at) = patch.logged_at {
            self.logged_at = at;
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
    }
}

/// Partial update of a `DrinkEntry`. `standard_drinks` is not patchable.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DrinkPatch {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub drink_type: Option<DrinkType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DrinkPatch {
    pub fn touches_estimate(&self) -> bool {
        self.drink_type.is_some() || self.quantity.is_some() || self.unit.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.touches_estimate() && self.logged_at.is_none() && self.notes.is_none()
    }
}
