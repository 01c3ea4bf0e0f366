//! Inventory records exchanged with the browser UI (camelCase JSON).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

pub const MAX_PART_NUMBER_LEN: usize = 255;
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Part number is required")]
    MissingPartNumber,

    #[error("Part number must be at most {MAX_PART_NUMBER_LEN} characters")]
    PartNumberTooLong,

    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    #[error("cost must be a finite number")]
    InvalidCost,

    #[error("{field} is not a valid http(s) URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("Part type name is required")]
    MissingPartTypeName,
}

/// Fields supplied when adding inventory
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPart {
    pub part_number: String,
    pub quantity: i64,
    pub low_stock_threshold: i64,
    pub part_type: Option<String>,
    #[serde(deserialize_with = "deserialize_keywords")]
    pub keywords: Vec<String>,
    pub description: Option<String>,
    pub datasheet_url: Option<String>,
    pub digikey_part_number: Option<String>,
    pub mouser_part_number: Option<String>,
    pub location: Option<String>,
    pub bin_number: Option<String>,
    pub bin_number2: Option<String>,
    pub cost: f64,
    pub lowest_cost_supplier: Option<String>,
    pub lowest_cost_supplier_url: Option<String>,
    pub product_url: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturer_part_number: Option<String>,
    pub image_url: Option<String>,
    pub project_id: Option<i64>,
}

/// Stored inventory record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub part_id: i64,
    #[serde(flatten)]
    pub fields: NewPart,
    /// Set on insert; ignored by updates
    #[serde(default = "Utc::now")]
    pub date_created_utc: DateTime<Utc>,
}

/// Keywords arrive either as a list or as one space/comma separated string
fn deserialize_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keywords {
        List(Vec<String>),
        Text(String),
        Missing(Option<()>),
    }

    Ok(match Keywords::deserialize(deserializer)? {
        Keywords::List(list) => normalize_keywords(list.iter().map(String::as_str)),
        Keywords::Text(text) => split_keywords(&text),
        Keywords::Missing(_) => Vec::new(),
    })
}

/// Lower-case, split on whitespace/commas, drop duplicates (order kept)
pub fn split_keywords(text: &str) -> Vec<String> {
    normalize_keywords(text.split(|c: char| c.is_whitespace() || c == ','))
}

fn normalize_keywords<'a>(words: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in words {
        for piece in word.split(|c: char| c.is_whitespace() || c == ',') {
            let piece = piece.trim().to_lowercase();
            if !piece.is_empty() && !out.contains(&piece) {
                out.push(piece);
            }
        }
    }
    out
}

fn normalize_text(value: &mut Option<String>) {
    if let Some(text) = value {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            *value = None;
        } else if trimmed.len() != text.len() {
            *value = Some(trimmed.to_string());
        }
    }
}

/// Accepts "www.ti.com/x.pdf" (the UI strips the scheme) as https
fn normalize_url(field: &'static str, value: &mut Option<String>) -> Result<(), ValidationError> {
    normalize_text(value);
    let Some(raw) = value.as_ref() else {
        return Ok(());
    };

    let candidate = if raw.contains("://") {
        raw.clone()
    } else {
        format!("https://{}", raw.trim_start_matches('/'))
    };

    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {
            *value = Some(url.to_string());
            Ok(())
        }
        _ => Err(ValidationError::InvalidUrl {
            field,
            value: raw.clone(),
        }),
    }
}

impl NewPart {
    /// Trim and normalize fields, then check them
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.part_number = self.part_number.trim().to_string();
        if self.part_number.is_empty() {
            return Err(ValidationError::MissingPartNumber);
        }
        if self.part_number.chars().count() > MAX_PART_NUMBER_LEN {
            return Err(ValidationError::PartNumberTooLong);
        }
        if self.quantity < 0 {
            return Err(ValidationError::Negative { field: "quantity" });
        }
        if self.low_stock_threshold < 0 {
            return Err(ValidationError::Negative { field: "lowStockThreshold" });
        }
        if !self.cost.is_finite() {
            return Err(ValidationError::InvalidCost);
        }
        if self.cost < 0.0 {
            return Err(ValidationError::Negative { field: "cost" });
        }

        for text in [
            &mut self.part_type,
            &mut self.description,
            &mut self.digikey_part_number,
            &mut self.mouser_part_number,
            &mut self.location,
            &mut self.bin_number,
            &mut self.bin_number2,
            &mut self.lowest_cost_supplier,
            &mut self.manufacturer,
            &mut self.manufacturer_part_number,
        ] {
            normalize_text(text);
        }

        normalize_url("datasheetUrl", &mut self.datasheet_url)?;
        normalize_url("lowestCostSupplierUrl", &mut self.lowest_cost_supplier_url)?;
        normalize_url("productUrl", &mut self.product_url)?;
        normalize_url("imageUrl", &mut self.image_url)?;

        self.keywords = normalize_keywords(self.keywords.iter().map(String::as_str));
        Ok(())
    }
}

impl Part {
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.fields.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartType {
    pub part_type_id: i64,
    pub name: String,
}

/// Sortable columns for the part list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartOrderBy {
    #[default]
    PartNumber,
    Quantity,
    DateCreatedUtc,
    Location,
    Manufacturer,
    Cost,
}

impl PartOrderBy {
    pub fn column(&self) -> &'static str {
        match self {
            PartOrderBy::PartNumber => "part_number",
            PartOrderBy::Quantity => "quantity",
            PartOrderBy::DateCreatedUtc => "date_created_utc",
            PartOrderBy::Location => "location",
            PartOrderBy::Manufacturer => "manufacturer",
            PartOrderBy::Cost => "cost",
        }
    }
}

impl FromStr for PartOrderBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "partnumber" | "part_number" => Ok(PartOrderBy::PartNumber),
            "quantity" => Ok(PartOrderBy::Quantity),
            "datecreatedutc" | "date_created_utc" => Ok(PartOrderBy::DateCreatedUtc),
            "location" => Ok(PartOrderBy::Location),
            "manufacturer" => Ok(PartOrderBy::Manufacturer),
            "cost" => Ok(PartOrderBy::Cost),
            other => Err(format!("unknown orderBy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "Ascending"),
            SortDirection::Descending => write!(f, "Descending"),
        }
    }
}

/// Paging and ordering for `/part/list`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartListQuery {
    pub order_by: PartOrderBy,
    pub direction: SortDirection,
    pub results: u32,
    pub page: u32,
}

impl Default for PartListQuery {
    fn default() -> Self {
        Self {
            order_by: PartOrderBy::default(),
            direction: SortDirection::default(),
            results: DEFAULT_PAGE_SIZE,
            page: 1,
        }
    }
}

impl PartListQuery {
    pub fn limit(&self) -> u32 {
        self.results.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit())
    }
}

/// Metadata suggested for a part number by a supplier lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartMetadata {
    pub part_number: String,
    pub part_type: Option<String>,
    pub keywords: Vec<String>,
    pub description: Option<String>,
    pub detailed_description: Option<String>,
    pub datasheet_url: Option<String>,
    pub digikey_part_number: Option<String>,
    pub mouser_part_number: Option<String>,
    pub cost: f64,
    pub lowest_cost_supplier: Option<String>,
    pub lowest_cost_supplier_url: Option<String>,
    pub product_url: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturer_part_number: Option<String>,
    pub image_url: Option<String>,
    pub quantity_available: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_normalizes_fields() {
        let mut part = NewPart {
            part_number: "  LM358 ".to_string(),
            quantity: 10,
            location: Some("   ".to_string()),
            manufacturer: Some(" Texas Instruments ".to_string()),
            datasheet_url: Some("www.ti.com/lit/ds/symlink/lm2904-n.pdf".to_string()),
            keywords: vec!["Op Amp".to_string(), "op".to_string()],
            ..Default::default()
        };

        part.validate().unwrap();
        assert_eq!(part.part_number, "LM358");
        assert_eq!(part.location, None);
        assert_eq!(part.manufacturer.as_deref(), Some("Texas Instruments"));
        assert_eq!(
            part.datasheet_url.as_deref(),
            Some("https://www.ti.com/lit/ds/symlink/lm2904-n.pdf")
        );
        assert_eq!(part.keywords, vec!["op", "amp"]);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut missing = NewPart::default();
        assert_eq!(missing.validate(), Err(ValidationError::MissingPartNumber));

        let mut negative = NewPart {
            part_number: "R1".to_string(),
            quantity: -1,
            ..Default::default()
        };
        assert_eq!(
            negative.validate(),
            Err(ValidationError::Negative { field: "quantity" })
        );

        let mut nan_cost = NewPart {
            part_number: "R1".to_string(),
            cost: f64::NAN,
            ..Default::default()
        };
        assert_eq!(nan_cost.validate(), Err(ValidationError::InvalidCost));

        let mut bad_url = NewPart {
            part_number: "R1".to_string(),
            product_url: Some("ftp://example.com/file".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            bad_url.validate(),
            Err(ValidationError::InvalidUrl { field: "productUrl", .. })
        ));

        let mut long = NewPart {
            part_number: "x".repeat(MAX_PART_NUMBER_LEN + 1),
            ..Default::default()
        };
        assert_eq!(long.validate(), Err(ValidationError::PartNumberTooLong));
    }

    #[test]
    fn test_keywords_accept_string_or_list() {
        let from_text: NewPart =
            serde_json::from_str(r#"{"partNumber":"LM358","keywords":"Op Amp, dual"}"#).unwrap();
        assert_eq!(from_text.keywords, vec!["op", "amp", "dual"]);

        let from_list: NewPart =
            serde_json::from_str(r#"{"partNumber":"LM358","keywords":["OP","amp"]}"#).unwrap();
        assert_eq!(from_list.keywords, vec!["op", "amp"]);

        let from_null: NewPart =
            serde_json::from_str(r#"{"partNumber":"LM358","keywords":null}"#).unwrap();
        assert!(from_null.keywords.is_empty());
    }

    #[test]
    fn test_part_serializes_flat_camel_case() {
        let part = Part {
            part_id: 7,
            fields: NewPart {
                part_number: "LM358".to_string(),
                bin_number2: Some("14".to_string()),
                ..Default::default()
            },
            date_created_utc: Utc::now(),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["partId"], 7);
        assert_eq!(json["partNumber"], "LM358");
        assert_eq!(json["binNumber2"], "14");
        assert!(json.get("fields").is_none());
    }

    #[test]
    fn test_list_query_paging() {
        let query = PartListQuery {
            results: 10,
            page: 3,
            ..Default::default()
        };
        assert_eq!(query.limit(), 10);
        assert_eq!(query.offset(), 20);

        let clamped = PartListQuery {
            results: 0,
            page: 0,
            ..Default::default()
        };
        assert_eq!(clamped.limit(), 1);
        assert_eq!(clamped.offset(), 0);
    }

    #[test]
    fn test_order_and_direction_parse() {
        assert_eq!("DateCreatedUtc".parse::<PartOrderBy>(), Ok(PartOrderBy::DateCreatedUtc));
        assert_eq!("descending".parse::<SortDirection>(), Ok(SortDirection::Descending));
        assert!("bogus".parse::<PartOrderBy>().is_err());
    }
}
