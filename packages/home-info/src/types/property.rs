//! Property record types - the fixed field set, quality scoring and merging.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::types::source::Source;

/// One attribute of the fixed property field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyField {
    HomeType,
    HeatingTypes,
    CoolingTypes,
    InteriorAreaSqft,
    LotSizeSqft,
    Bedrooms,
    Bathrooms,
    ParkingOptions,
    YearBuilt,
    FinishedBasement,
    HasPatio,
    FlooringTypes,
    AppliancesIncluded,
    HoaFee,
    PropertyTax,
}

/// JSON type of a field in the extraction schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    List,
    Integer,
    Number,
    Flag,
}

impl PropertyField {
    /// Every field, in schema order.
    pub const ALL: [PropertyField; 15] = [
        PropertyField::HomeType,
        PropertyField::HeatingTypes,
        PropertyField::CoolingTypes,
        PropertyField::InteriorAreaSqft,
        PropertyField::LotSizeSqft,
        PropertyField::Bedrooms,
        PropertyField::Bathrooms,
        PropertyField::ParkingOptions,
        PropertyField::YearBuilt,
        PropertyField::FinishedBasement,
        PropertyField::HasPatio,
        PropertyField::FlooringTypes,
        PropertyField::AppliancesIncluded,
        PropertyField::HoaFee,
        PropertyField::PropertyTax,
    ];

    /// Fields whose absence makes a record hard to use.
    pub const CRITICAL: [PropertyField; 4] = [
        PropertyField::Bedrooms,
        PropertyField::Bathrooms,
        PropertyField::InteriorAreaSqft,
        PropertyField::HomeType,
    ];

    /// Field name as it appears in JSON.
    pub fn name(&self) -> &'static str {
        match self {
            PropertyField::HomeType => "home_type",
            PropertyField::HeatingTypes => "heating_types",
            PropertyField::CoolingTypes => "cooling_types",
            PropertyField::InteriorAreaSqft => "interior_area_sqft",
            PropertyField::LotSizeSqft => "lot_size_sqft",
            PropertyField::Bedrooms => "bedrooms",
            PropertyField::Bathrooms => "bathrooms",
            PropertyField::ParkingOptions => "parking_options",
            PropertyField::YearBuilt => "year_built",
            PropertyField::FinishedBasement => "finished_basement",
            PropertyField::HasPatio => "has_patio",
            PropertyField::FlooringTypes => "flooring_types",
            PropertyField::AppliancesIncluded => "appliances_included",
            PropertyField::HoaFee => "hoa_fee",
            PropertyField::PropertyTax => "property_tax",
        }
    }

    /// Guidance for the extraction provider.
    pub fn description(&self) -> &'static str {
        match self {
            PropertyField::HomeType => "Property type: Single Family, Multi Family, Apartment, Townhouse, Condo, Duplex, Mobile/Manufactured, Land, or Other",
            PropertyField::HeatingTypes => "Heating systems: Central, Forced Air, Baseboard, Radiant, Heat Pump, Gas, Electric, Oil, Solar",
            PropertyField::CoolingTypes => "Cooling systems: Central Air, Window Units, Evaporative, Heat Pump, None",
            PropertyField::InteriorAreaSqft => "Total finished interior living area in square feet",
            PropertyField::LotSizeSqft => "Lot size in square feet",
            PropertyField::Bedrooms => "Number of bedrooms",
            PropertyField::Bathrooms => "Number of bathrooms, fractional allowed (2.5)",
            PropertyField::ParkingOptions => "Parking: Garage, Carport, Driveway, Off-street, On-street, Covered, Uncovered",
            PropertyField::YearBuilt => "Year the property was constructed",
            PropertyField::FinishedBasement => "Whether the basement is finished",
            PropertyField::HasPatio => "Whether the property has a patio, deck, or other outdoor space",
            PropertyField::FlooringTypes => "Flooring materials: Hardwood, Carpet, Tile, Laminate, Vinyl",
            PropertyField::AppliancesIncluded => "Included appliances: Dishwasher, Refrigerator, Washer, Dryer, Microwave",
            PropertyField::HoaFee => "Monthly HOA fee amount",
            PropertyField::PropertyTax => "Annual property tax amount",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            PropertyField::HomeType => FieldKind::Text,
            PropertyField::HeatingTypes
            | PropertyField::CoolingTypes
            | PropertyField::ParkingOptions
            | PropertyField::FlooringTypes
            | PropertyField::AppliancesIncluded => FieldKind::List,
            PropertyField::InteriorAreaSqft
            | PropertyField::LotSizeSqft
            | PropertyField::Bedrooms
            | PropertyField::YearBuilt => FieldKind::Integer,
            PropertyField::Bathrooms | PropertyField::HoaFee | PropertyField::PropertyTax => {
                FieldKind::Number
            }
            PropertyField::FinishedBasement | PropertyField::HasPatio => FieldKind::Flag,
        }
    }

    fn json_schema(&self) -> Value {
        let ty = match self.kind() {
            FieldKind::Text => "string",
            FieldKind::List => "array",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Flag => "boolean",
        };
        let mut schema = json!({
            "type": [ty, "null"],
            "description": self.description(),
        });
        if self.kind() == FieldKind::List {
            schema["items"] = json!({ "type": "string" });
        }
        schema
    }
}

impl fmt::Display for PropertyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether an optional field value carries information.
///
/// Blank strings and empty lists count as absent.
trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for Option<String> {
    fn is_present(&self) -> bool {
        self.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

impl Presence for Option<Vec<String>> {
    fn is_present(&self) -> bool {
        self.as_ref()
            .is_some_and(|items| items.iter().any(|s| !s.trim().is_empty()))
    }
}

macro_rules! scalar_presence {
    ($($ty:ty),+) => {
        $(impl Presence for Option<$ty> {
            fn is_present(&self) -> bool {
                self.is_some()
            }
        })+
    };
}

scalar_presence!(u32, u64, i32, f64, bool);

macro_rules! fill_missing {
    ($target:expr, $other:expr; $($field:ident),+ $(,)?) => {
        $(
            if !$target.$field.is_present() && $other.$field.is_present() {
                $target.$field = $other.$field.clone();
            }
        )+
    };
}

/// Structured property attributes extracted from listing pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub home_type: Option<String>,
    pub heating_types: Option<Vec<String>>,
    pub cooling_types: Option<Vec<String>>,
    pub interior_area_sqft: Option<u32>,
    pub lot_size_sqft: Option<u64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub parking_options: Option<Vec<String>>,
    pub year_built: Option<i32>,
    pub finished_basement: Option<bool>,
    pub has_patio: Option<bool>,
    pub flooring_types: Option<Vec<String>>,
    pub appliances_included: Option<Vec<String>>,
    pub hoa_fee: Option<f64>,
    pub property_tax: Option<f64>,
}

impl PropertyRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a field carries a value.
    pub fn is_filled(&self, field: PropertyField) -> bool {
        match field {
            PropertyField::HomeType => self.home_type.is_present(),
            PropertyField::HeatingTypes => self.heating_types.is_present(),
            PropertyField::CoolingTypes => self.cooling_types.is_present(),
            PropertyField::InteriorAreaSqft => self.interior_area_sqft.is_present(),
            PropertyField::LotSizeSqft => self.lot_size_sqft.is_present(),
            PropertyField::Bedrooms => self.bedrooms.is_present(),
            PropertyField::Bathrooms => self.bathrooms.is_present(),
            PropertyField::ParkingOptions => self.parking_options.is_present(),
            PropertyField::YearBuilt => self.year_built.is_present(),
            PropertyField::FinishedBasement => self.finished_basement.is_present(),
            PropertyField::HasPatio => self.has_patio.is_present(),
            PropertyField::FlooringTypes => self.flooring_types.is_present(),
            PropertyField::AppliancesIncluded => self.appliances_included.is_present(),
            PropertyField::HoaFee => self.hoa_fee.is_present(),
            PropertyField::PropertyTax => self.property_tax.is_present(),
        }
    }

    /// Number of populated fields.
    pub fn filled_count(&self) -> usize {
        PropertyField::ALL
            .iter()
            .filter(|f| self.is_filled(**f))
            .count()
    }

    /// Whether no field is populated.
    pub fn is_empty(&self) -> bool {
        self.filled_count() == 0
    }

    /// Fraction of the fixed field set that is populated.
    pub fn quality(&self) -> QualityScore {
        QualityScore::new(self.filled_count(), PropertyField::ALL.len())
    }

    /// Fill every absent field from `other`; present fields are kept.
    pub fn fill_missing_from(&mut self, other: &PropertyRecord) {
        fill_missing!(self, other;
            home_type,
            heating_types,
            cooling_types,
            interior_area_sqft,
            lot_size_sqft,
            bedrooms,
            bathrooms,
            parking_options,
            year_built,
            finished_basement,
            has_patio,
            flooring_types,
            appliances_included,
            hoa_fee,
            property_tax,
        );
    }

    /// Merge `other` under `self`: `self` wins on conflicts.
    pub fn merged_with(mut self, other: &PropertyRecord) -> PropertyRecord {
        self.fill_missing_from(other);
        self
    }

    /// Which fields are filled and which are missing.
    pub fn gaps(&self) -> RecordGaps {
        let (filled, missing): (Vec<_>, Vec<_>) =
            PropertyField::ALL.iter().partition(|f| self.is_filled(**f));
        let missing_critical = PropertyField::CRITICAL
            .iter()
            .copied()
            .filter(|f| missing.contains(f))
            .collect();

        RecordGaps {
            filled,
            missing,
            missing_critical,
        }
    }

    /// Build a record from a provider's JSON object, field by field.
    ///
    /// A field with an unusable value is dropped; the rest are kept.
    /// Numbers given as strings ("2,150", "$350") are accepted.
    pub fn from_json(object: &Map<String, Value>) -> PropertyRecord {
        let text = |f: PropertyField| object.get(f.name()).and_then(as_text);
        let list = |f: PropertyField| object.get(f.name()).and_then(as_list);
        let number = |f: PropertyField| object.get(f.name()).and_then(as_number);
        let flag = |f: PropertyField| object.get(f.name()).and_then(as_flag);
        let whole = |f: PropertyField| number(f).filter(|n| *n >= 0.0).map(f64::round);

        PropertyRecord {
            home_type: text(PropertyField::HomeType),
            heating_types: list(PropertyField::HeatingTypes),
            cooling_types: list(PropertyField::CoolingTypes),
            interior_area_sqft: whole(PropertyField::InteriorAreaSqft)
                .filter(|n| *n <= u32::MAX as f64)
                .map(|n| n as u32),
            lot_size_sqft: whole(PropertyField::LotSizeSqft).map(|n| n as u64),
            bedrooms: whole(PropertyField::Bedrooms)
                .filter(|n| *n <= u32::MAX as f64)
                .map(|n| n as u32),
            bathrooms: number(PropertyField::Bathrooms).filter(|n| *n >= 0.0),
            parking_options: list(PropertyField::ParkingOptions),
            year_built: whole(PropertyField::YearBuilt)
                .filter(|n| *n <= i32::MAX as f64)
                .map(|n| n as i32),
            finished_basement: flag(PropertyField::FinishedBasement),
            has_patio: flag(PropertyField::HasPatio),
            flooring_types: list(PropertyField::FlooringTypes),
            appliances_included: list(PropertyField::AppliancesIncluded),
            hoa_fee: number(PropertyField::HoaFee).filter(|n| *n >= 0.0),
            property_tax: number(PropertyField::PropertyTax).filter(|n| *n >= 0.0),
        }
    }
}

fn as_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn as_list(value: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => return None,
    };
    (!items.is_empty()).then_some(items)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Populated fraction of the fixed field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityScore {
    pub filled: usize,
    pub total: usize,
}

impl QualityScore {
    pub fn new(filled: usize, total: usize) -> Self {
        Self { filled, total }
    }

    /// Fraction in `[0, 1]`; an empty field set scores zero.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.filled as f64 / self.total as f64
        }
    }

    /// Whether the score reaches `threshold` (inclusive).
    pub fn meets(&self, threshold: f64) -> bool {
        self.fraction() >= threshold
    }
}

impl fmt::Display for QualityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.1}%)",
            self.filled,
            self.total,
            self.fraction() * 100.0
        )
    }
}

// Serialized with its derived fraction for reports.
impl Serialize for QualityScore {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("QualityScore", 3)?;
        state.serialize_field("filled", &self.filled)?;
        state.serialize_field("total", &self.total)?;
        state.serialize_field("fraction", &self.fraction())?;
        state.end()
    }
}

/// Filled/missing breakdown of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordGaps {
    pub filled: Vec<PropertyField>,
    pub missing: Vec<PropertyField>,
    pub missing_critical: Vec<PropertyField>,
}

/// JSON schema and prompt sent with every extract call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSchema {
    pub schema: Value,
    pub prompt: String,
}

impl ExtractionSchema {
    /// Schema for the fixed field set with a prompt naming the target address.
    pub fn for_address(address: &str) -> Self {
        let properties: Map<String, Value> = PropertyField::ALL
            .iter()
            .map(|f| (f.name().to_string(), f.json_schema()))
            .collect();

        Self {
            schema: json!({ "type": "object", "properties": properties }),
            prompt: extraction_prompt(address),
        }
    }
}

fn extraction_prompt(address: &str) -> String {
    format!(
        "Extract property facts for the listing at {address}.\n\
         Read the overview (beds, baths, square footage, lot size, year built, property type), \
         the facts and features tables (heating, cooling, flooring, appliances, basement, \
         patio or deck, parking) and the financial section (monthly HOA fee, annual property tax).\n\
         Copy exact numbers without rounding. List every applicable item for list fields. \
         Use standard terms such as \"Central Air\". Return null when a fact is not on the page; \
         do not guess from the description."
    )
}

/// A merged record together with the sources that contributed to it.
///
/// This is the payload of the extraction cache layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProperty {
    pub record: PropertyRecord,
    pub sources: Vec<Source>,
}
