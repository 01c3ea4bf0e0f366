//! Suggest part details from a supplier search.

use crate::digikey::error::DigikeyError;
use crate::digikey::models::Product;
use crate::digikey::PartSearchProvider;
use crate::models::{split_keywords, PartMetadata};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const DIGIKEY_SUPPLIER: &str = "DigiKey";

const MAX_KEYWORDS: usize = 16;

/// Runs of anything that is not a letter or digit
static WORD_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}]+").unwrap());

/// Types that describe a broad family; tried after the specific ones
const GENERIC_TYPES: &[&str] = &["ic", "module", "other"];

/// Extra spellings seen in vendor categories for the default part types
const TYPE_ALIASES: &[(&str, &[&str])] = &[
    ("opamp", &["op amp", "op amps", "operational amplifier"]),
    ("led", &["led", "leds", "light emitting"]),
    ("ic", &["integrated circuit", "ics"]),
    ("crystal", &["crystals", "oscillator", "resonator"]),
    ("transistor", &["transistors", "fets", "mosfet", "bjt"]),
    ("connector", &["connectors", "headers", "terminal"]),
    ("switch", &["switches"]),
    ("sensor", &["sensors", "transducers"]),
];

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Part number is required")]
    MissingPartNumber,

    #[error("No results found for '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Supplier(#[from] DigikeyError),
}

pub struct PartMetadataService {
    provider: Arc<dyn PartSearchProvider>,
}

impl PartMetadataService {
    pub fn new(provider: Arc<dyn PartSearchProvider>) -> Self {
        Self { provider }
    }

    /// Look up `part_number` and map the best product. `part_types` are the
    /// names a suggested type may take.
    pub async fn lookup_part_metadata(
        &self,
        part_number: &str,
        part_types: &[String],
    ) -> Result<PartMetadata, MetadataError> {
        let part_number = part_number.trim();
        if part_number.is_empty() {
            return Err(MetadataError::MissingPartNumber);
        }

        let products = self.provider.search(part_number).await?;
        debug!(part_number, results = products.len(), "supplier search complete");

        let product = best_product(part_number, &products)
            .ok_or_else(|| MetadataError::NotFound(part_number.to_string()))?;

        let metadata = map_product(part_number, product, part_types);
        info!(
            part_number,
            digikey_part_number = metadata.digikey_part_number.as_deref().unwrap_or(""),
            part_type = metadata.part_type.as_deref().unwrap_or(""),
            "part metadata resolved"
        );
        Ok(metadata)
    }
}

/// Exact manufacturer part number match wins, otherwise the first result
pub fn best_product<'a>(part_number: &str, products: &'a [Product]) -> Option<&'a Product> {
    products
        .iter()
        .find(|p| p.manufacturer_part_number.eq_ignore_ascii_case(part_number))
        .or_else(|| products.first())
}

pub fn map_product(part_number: &str, product: &Product, part_types: &[String]) -> PartMetadata {
    let product_url = vendor_url(&product.product_url);
    let cost = if product.unit_price > 0.0 {
        product.unit_price
    } else {
        product
            .standard_pricing
            .first()
            .map(|p| p.unit_price)
            .unwrap_or_default()
    };

    PartMetadata {
        part_number: part_number.to_string(),
        part_type: infer_part_type(product, part_types),
        keywords: product_keywords(product),
        description: non_empty(&product.product_description),
        detailed_description: non_empty(&product.detailed_description),
        datasheet_url: vendor_url(&product.primary_datasheet),
        digikey_part_number: non_empty(&product.digi_key_part_number),
        mouser_part_number: None,
        cost,
        lowest_cost_supplier: Some(DIGIKEY_SUPPLIER.to_string()),
        lowest_cost_supplier_url: product_url.clone(),
        product_url,
        manufacturer: non_empty(&product.manufacturer.value),
        manufacturer_part_number: non_empty(&product.manufacturer_part_number),
        image_url: vendor_url(&product.primary_photo),
        quantity_available: product.quantity_available,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// DigiKey hands out protocol-relative links (`//media.digikey.com/...`)
fn vendor_url(value: &str) -> Option<String> {
    let value = non_empty(value)?;
    if value.starts_with("//") {
        Some(format!("https:{}", value))
    } else {
        Some(value)
    }
}

/// Description words, manufacturer and parameter values, lower-cased and deduplicated
fn product_keywords(product: &Product) -> Vec<String> {
    let mut text = vec![
        product.product_description.as_str(),
        product.manufacturer.value.as_str(),
    ];
    text.extend(product.parameters.iter().map(|p| p.value.as_str()));

    split_keywords(&text.join(" "))
        .into_iter()
        .filter(|word| word.chars().any(|c| c.is_alphabetic()) && word.len() > 1)
        .take(MAX_KEYWORDS)
        .collect()
}

fn normalize_words(text: &str) -> String {
    let words = WORD_SEPARATOR.replace_all(text.trim(), " ");
    format!(" {} ", words.trim().to_lowercase())
}

fn type_matches(haystack: &str, type_name: &str) -> bool {
    let key = type_name.to_lowercase();
    let mut needles = vec![normalize_words(type_name).trim().to_string()];
    if let Some((_, aliases)) = TYPE_ALIASES.iter().find(|(name, _)| *name == key) {
        needles.extend(aliases.iter().map(|a| a.to_string()));
    }
    needles
        .iter()
        .filter(|n| !n.is_empty())
        .any(|needle| haystack.contains(&format!(" {}", needle)))
}

/// Family is the most specific vendor field, then category, then description
pub fn infer_part_type(product: &Product, part_types: &[String]) -> Option<String> {
    let mut ordered: Vec<&String> = part_types.iter().collect();
    ordered.sort_by_key(|name| GENERIC_TYPES.contains(&name.to_lowercase().as_str()));

    [
        product.family.value.as_str(),
        product.category.value.as_str(),
        product.product_description.as_str(),
    ]
    .iter()
    .map(|field| normalize_words(field))
    .find_map(|haystack| {
        ordered
            .iter()
            .find(|name| type_matches(&haystack, name))
            .map(|name| name.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digikey::models::{PidVid, PriceBreak};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeProvider {
        products: Vec<Product>,
        unauthorized: bool,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PartSearchProvider for FakeProvider {
        async fn search(&self, part_number: &str) -> Result<Vec<Product>, DigikeyError> {
            self.queries.lock().unwrap().push(part_number.to_string());
            if self.unauthorized {
                return Err(DigikeyError::Unauthorized("consent timed out".to_string()));
            }
            Ok(self.products.clone())
        }
    }

    fn service(products: Vec<Product>) -> (Arc<FakeProvider>, PartMetadataService) {
        let provider = Arc::new(FakeProvider {
            products,
            unauthorized: false,
            queries: Mutex::new(Vec::new()),
        });
        (provider.clone(), PartMetadataService::new(provider))
    }

    fn pid(value: &str) -> PidVid {
        PidVid {
            value: value.to_string(),
            ..Default::default()
        }
    }

    fn default_types() -> Vec<String> {
        crate::storage::part_types::DEFAULT_PART_TYPES
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn lm358() -> Product {
        Product {
            digi_key_part_number: "296-1395-5-ND".to_string(),
            manufacturer_part_number: "LM358P".to_string(),
            manufacturer: pid("Texas Instruments"),
            product_description: "IC OPAMP GP 2 CIRCUIT 8DIP".to_string(),
            detailed_description: "General Purpose Amplifier 2 Circuit 8-PDIP".to_string(),
            primary_datasheet: "//www.ti.com/general/docs/suppproductinfo.tsp?partId=LM358".to_string(),
            primary_photo: "https://media.digikey.com/photos/lm358.jpg".to_string(),
            product_url: "https://www.digikey.ca/product-detail/en/LM358P".to_string(),
            unit_price: 0.52,
            quantity_available: 12000,
            category: pid("Integrated Circuits (ICs)"),
            family: pid("Linear - Amplifiers - Instrumentation, OP Amps, Buffer Amps"),
            parameters: vec![pid("General Purpose"), pid("8-DIP (0.300\", 7.62mm)")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lookup_maps_exact_match() {
        let other = Product {
            manufacturer_part_number: "LM358DR".to_string(),
            ..lm358()
        };
        let (provider, service) = service(vec![other, lm358()]);

        let metadata = service
            .lookup_part_metadata(" lm358p ", &default_types())
            .await
            .unwrap();

        assert_eq!(provider.queries.lock().unwrap().as_slice(), ["lm358p"]);
        assert_eq!(metadata.manufacturer_part_number.as_deref(), Some("LM358P"));
        assert_eq!(metadata.part_type.as_deref(), Some("OpAmp"));
        assert_eq!(metadata.lowest_cost_supplier.as_deref(), Some("DigiKey"));
        assert_eq!(metadata.lowest_cost_supplier_url, metadata.product_url);
        assert_eq!(
            metadata.datasheet_url.as_deref(),
            Some("https://www.ti.com/general/docs/suppproductinfo.tsp?partId=LM358")
        );
        assert_eq!(metadata.cost, 0.52);
        assert!(metadata.keywords.contains(&"opamp".to_string()));
        assert!(metadata.keywords.contains(&"texas".to_string()));
        assert!(!metadata.keywords.contains(&"2".to_string()));
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_first_product() {
        let (_provider, service) = service(vec![lm358()]);
        let metadata = service
            .lookup_part_metadata("LM358", &default_types())
            .await
            .unwrap();
        assert_eq!(metadata.part_number, "LM358");
        assert_eq!(metadata.digikey_part_number.as_deref(), Some("296-1395-5-ND"));
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let (_provider, service) = service(Vec::new());
        let err = service
            .lookup_part_metadata("NOPE", &default_types())
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));

        let err = service.lookup_part_metadata("  ", &[]).await.unwrap_err();
        assert!(matches!(err, MetadataError::MissingPartNumber));
    }

    #[tokio::test]
    async fn test_supplier_errors_propagate() {
        let service = PartMetadataService::new(Arc::new(FakeProvider {
            products: Vec::new(),
            unauthorized: true,
            queries: Mutex::new(Vec::new()),
        }));
        let err = service
            .lookup_part_metadata("LM358", &default_types())
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Supplier(e) if e.is_unauthorized()));
    }

    #[test]
    fn test_infer_part_type() {
        let types = default_types();
        let resistor = Product {
            category: pid("Resistors"),
            family: pid("Through Hole Resistors"),
            ..Default::default()
        };
        assert_eq!(infer_part_type(&resistor, &types).as_deref(), Some("Resistor"));

        let generic_ic = Product {
            category: pid("Integrated Circuits (ICs)"),
            family: pid("Clock/Timing - Programmable Timers"),
            ..Default::default()
        };
        assert_eq!(infer_part_type(&generic_ic, &types).as_deref(), Some("IC"));

        let unknown = Product {
            category: pid("Tools"),
            ..Default::default()
        };
        assert_eq!(infer_part_type(&unknown, &types), None);
    }

    #[test]
    fn test_cost_falls_back_to_price_breaks() {
        let product = Product {
            unit_price: 0.0,
            standard_pricing: vec![PriceBreak {
                break_quantity: 1,
                unit_price: 0.1,
                total_price: 0.1,
            }],
            ..lm358()
        };
        assert_eq!(map_product("LM358", &product, &[]).cost, 0.1);
    }
}
