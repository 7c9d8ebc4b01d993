//! Wire format of the drug-label source and its decoding into records.
//!
//! The source returns pages shaped like the openFDA drug-label endpoint:
//! a `results` array where identity fields live in a nested `openfda`
//! object as single-element (occasionally multi-element) string lists, and
//! the label texts sit at the top level as single-element lists.

use serde::Deserialize;

use medharvest_shared::RawRecord;

/// Brand-name placeholder. An item whose brand name is missing or equal to
/// this sentinel cannot be addressed by key downstream and is discarded.
pub const BRAND_PLACEHOLDER: &str = "Unknown";

/// Placeholder for absent generic/substance names. Kept on the record,
/// since these fields are informational, not addressing.
pub const NAME_PLACEHOLDER: &str = "UNKNOWN";

/// One page of results from the source.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub results: Vec<PageItem>,
}

/// One undecoded item within a page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageItem {
    #[serde(default)]
    pub openfda: OpenFda,
    #[serde(default)]
    pub purpose: Vec<String>,
    #[serde(default)]
    pub indications_and_usage: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub adverse_reactions: Vec<String>,
    #[serde(default)]
    pub dosage_and_administration: Vec<String>,
}

/// The nested identity object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenFda {
    #[serde(default)]
    pub brand_name: Vec<String>,
    #[serde(default)]
    pub generic_name: Vec<String>,
    #[serde(default)]
    pub substance_name: Vec<String>,
}

impl PageItem {
    /// Decode this item into a keyed record.
    ///
    /// Returns `None` when the brand name is absent or the placeholder;
    /// such items are unaddressable and the engine drops them.
    pub fn into_record(self) -> Option<(String, RawRecord)> {
        let name = first_or(&self.openfda.brand_name, BRAND_PLACEHOLDER);
        if name.is_empty() || name == BRAND_PLACEHOLDER {
            return None;
        }

        let record = RawRecord {
            name: name.clone(),
            generic_name: first_or(&self.openfda.generic_name, NAME_PLACEHOLDER),
            substance_name: first_or(&self.openfda.substance_name, NAME_PLACEHOLDER),
            purpose: first_or(&self.purpose, ""),
            indications_and_usage: first_or(&self.indications_and_usage, ""),
            warnings: first_or(&self.warnings, ""),
            adverse_reactions: first_or(&self.adverse_reactions, ""),
            dosage: first_or(&self.dosage_and_administration, ""),
        };

        Some((name, record))
    }
}

/// First element of a list-valued field, or the given default.
fn first_or(values: &[String], default: &str) -> String {
    values
        .first()
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_item() {
        let json = serde_json::json!({
            "openfda": {
                "brand_name": ["Aspirin"],
                "generic_name": ["aspirin"],
                "substance_name": ["ASPIRIN"]
            },
            "purpose": ["Pain reliever"],
            "indications_and_usage": ["temporarily relieves minor aches"],
            "warnings": ["Reye's syndrome warning"],
            "adverse_reactions": ["stomach bleeding"],
            "dosage_and_administration": ["take with a full glass of water"]
        });

        let item: PageItem = serde_json::from_value(json).unwrap();
        let (key, record) = item.into_record().expect("addressable item");
        assert_eq!(key, "Aspirin");
        assert_eq!(record.generic_name, "aspirin");
        assert_eq!(record.dosage, "take with a full glass of water");
    }

    #[test]
    fn uses_first_element_of_multi_valued_lists() {
        let json = serde_json::json!({
            "openfda": { "brand_name": ["Tylenol", "Tylenol Extra"] },
            "purpose": ["Fever reducer", "Pain reliever"]
        });

        let item: PageItem = serde_json::from_value(json).unwrap();
        let (key, record) = item.into_record().unwrap();
        assert_eq!(key, "Tylenol");
        assert_eq!(record.purpose, "Fever reducer");
    }

    #[test]
    fn absent_fields_get_placeholders() {
        let json = serde_json::json!({
            "openfda": { "brand_name": ["Ibuprofen"] }
        });

        let item: PageItem = serde_json::from_value(json).unwrap();
        let (_, record) = item.into_record().unwrap();
        assert_eq!(record.generic_name, "UNKNOWN");
        assert_eq!(record.substance_name, "UNKNOWN");
        assert_eq!(record.purpose, "");
        assert_eq!(record.warnings, "");
    }

    #[test]
    fn missing_brand_name_is_dropped() {
        let json = serde_json::json!({
            "purpose": ["Antacid"]
        });
        let item: PageItem = serde_json::from_value(json).unwrap();
        assert!(item.into_record().is_none());
    }

    #[test]
    fn placeholder_brand_name_is_dropped() {
        let json = serde_json::json!({
            "openfda": { "brand_name": ["Unknown"] }
        });
        let item: PageItem = serde_json::from_value(json).unwrap();
        assert!(item.into_record().is_none());
    }

    #[test]
    fn empty_brand_name_is_dropped() {
        let json = serde_json::json!({
            "openfda": { "brand_name": [""] }
        });
        let item: PageItem = serde_json::from_value(json).unwrap();
        assert!(item.into_record().is_none());
    }

    #[test]
    fn page_without_results_decodes_empty() {
        let page: Page = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(page.results.is_empty());
    }
}
