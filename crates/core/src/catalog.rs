//! Static treatment table.
//!
//! The table is parsed once at startup, either from the copy embedded in the binary or from a
//! replacement file named in the configuration, and is read-only afterwards. Lookups are total:
//! an unknown label yields [`TreatmentRecord::EMPTY`] instead of an error.

use crate::label::DiseaseLabel;
use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const EMBEDDED_TREATMENTS: &str = include_str!("../data/treatments.yaml");

static EMPTY_RECORD: TreatmentRecord = TreatmentRecord::EMPTY;

/// A product or preparation with a reference link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Remedy {
    pub name: String,
    pub link: String,
}

/// Remedies and prevention tips for one label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreatmentRecord {
    #[serde(default)]
    pub chemical: Vec<Remedy>,
    #[serde(default)]
    pub organic: Vec<Remedy>,
    #[serde(default)]
    pub prevention: Vec<String>,
}

impl TreatmentRecord {
    pub const EMPTY: TreatmentRecord = TreatmentRecord {
        chemical: Vec::new(),
        organic: Vec::new(),
        prevention: Vec::new(),
    };

    pub fn is_empty(&self) -> bool {
        self.chemical.is_empty() && self.organic.is_empty() && self.prevention.is_empty()
    }
}

/// Read-only mapping from label to [`TreatmentRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatmentCatalog {
    records: BTreeMap<DiseaseLabel, TreatmentRecord>,
}

impl TreatmentCatalog {
    /// Parse the table compiled into the binary.
    pub fn embedded() -> CoreResult<Self> {
        Self::from_yaml_str(EMBEDDED_TREATMENTS)
    }

    /// Parse a replacement table from disk.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(CoreError::CatalogRead)?;
        Self::from_yaml_str(&text)
    }

    /// Parse a table from YAML text.
    ///
    /// Keys must be exact label strings and every label must be present, so that any label the
    /// classifier can produce has a record (possibly empty).
    ///
    /// # Errors
    ///
    /// Returns `CoreError::CatalogParse` with the failing field path when the YAML does not match
    /// the schema, or `CoreError::CatalogMissingLabel` when a label has no entry.
    pub fn from_yaml_str(yaml_text: &str) -> CoreResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let records: BTreeMap<DiseaseLabel, TreatmentRecord> =
            serde_path_to_error::deserialize(deserializer).map_err(|err| {
                let path = err.path().to_string();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                CoreError::CatalogParse {
                    path,
                    source: err.into_inner(),
                }
            })?;

        if let Some(missing) = DiseaseLabel::ALL
            .into_iter()
            .find(|label| !records.contains_key(label))
        {
            return Err(CoreError::CatalogMissingLabel(missing));
        }

        Ok(Self { records })
    }

    /// Look up by label string. Unknown strings get the empty record.
    pub fn lookup(&self, label: &str) -> &TreatmentRecord {
        match label.parse::<DiseaseLabel>() {
            Ok(label) => self.get(label),
            Err(_) => &EMPTY_RECORD,
        }
    }

    pub fn get(&self, label: DiseaseLabel) -> &TreatmentRecord {
        self.records.get(&label).unwrap_or(&EMPTY_RECORD)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TreatmentCatalog {
        TreatmentCatalog::embedded().expect("embedded table should parse")
    }

    #[test]
    fn embedded_table_covers_every_label() {
        let catalog = catalog();
        assert_eq!(catalog.len(), DiseaseLabel::ALL.len());
        for label in DiseaseLabel::ALL {
            let record = catalog.lookup(label.as_str());
            for remedy in record.chemical.iter().chain(record.organic.iter()) {
                assert!(!remedy.name.trim().is_empty(), "{label}: blank remedy name");
                assert!(remedy.link.starts_with("https://"), "{label}: bad link");
            }
            assert!(record.prevention.iter().all(|tip| !tip.trim().is_empty()));
        }
    }

    #[test]
    fn unknown_label_yields_empty_record() {
        let catalog = catalog();
        let record = catalog.lookup("Powdery Mildew");
        assert!(record.is_empty());
        assert_eq!(record, &TreatmentRecord::EMPTY);
        assert!(catalog.lookup("").is_empty());
    }

    #[test]
    fn lookup_is_idempotent() {
        let catalog = catalog();
        for label in DiseaseLabel::ALL {
            let first = catalog.lookup(label.as_str()).clone();
            let second = catalog.lookup(label.as_str()).clone();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn early_blight_chemicals_are_in_order() {
        let catalog = catalog();
        let names: Vec<&str> = catalog
            .get(DiseaseLabel::EarlyBlight)
            .chemical
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["Chlorothalonil", "Mancozeb", "Copper-based fungicides"]
        );
    }

    #[test]
    fn healthy_has_only_prevention_tips() {
        let catalog = catalog();
        let record = catalog.get(DiseaseLabel::Healthy);
        assert!(record.chemical.is_empty());
        assert!(record.organic.is_empty());
        assert_eq!(
            record.prevention,
            vec!["Maintain regular plant care", "Monitor for pests and diseases"]
        );
    }

    #[test]
    fn missing_label_is_rejected() {
        let yaml = r#"
"Healthy leaf":
  prevention: ["Water in the morning"]
"#;
        let err = TreatmentCatalog::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(
            err,
            CoreError::CatalogMissingLabel(DiseaseLabel::EarlyBlight)
        ));
    }

    #[test]
    fn unknown_field_reports_path() {
        let yaml = r#"
"Healthy leaf":
  chemical:
    - name: Sulfur
      url: https://example.com
"#;
        match TreatmentCatalog::from_yaml_str(yaml).unwrap_err() {
            CoreError::CatalogParse { path, .. } => {
                assert!(path.contains("chemical"), "path was {path}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn from_path_reads_replacement_table() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("treatments.yaml");
        std::fs::write(&file, EMBEDDED_TREATMENTS).unwrap();

        let catalog = TreatmentCatalog::from_path(&file).unwrap();
        assert_eq!(catalog, TreatmentCatalog::embedded().unwrap());

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            TreatmentCatalog::from_path(&missing),
            Err(CoreError::CatalogRead(_))
        ));
    }
}
