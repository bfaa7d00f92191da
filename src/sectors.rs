use crate::types::{CompanyProfile, ValidationReport};
use crate::{CrawlerError, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Keyword hints mapped to sector search terms, used for description-based
/// recommendations.
const KEYWORD_HINTS: &[(&str, &[&str])] = &[
    ("software", &["Information Technology", "Software Development"]),
    ("ai", &["Artificial Intelligence", "Machine Learning"]),
    ("blockchain", &["Blockchain", "Cryptocurrency"]),
    ("fintech", &["Finance", "Banking"]),
    ("healthcare", &["Healthcare", "Medical Services"]),
    ("ecommerce", &["E-Commerce", "Retail"]),
    ("logistics", &["Logistics", "Transportation"]),
    ("marketing", &["Marketing", "Digital Marketing"]),
    ("education", &["Education", "E-Learning"]),
    ("gaming", &["Gaming", "Entertainment"]),
];

/// The `SectorCatalog` struct holds the allowed industry, sub-industry, and
/// solution area names, loaded from a semicolon-delimited CSV. Extracted
/// sector fields are validated against it and corrected to the closest
/// catalog entry when the model strays.
pub struct SectorCatalog {
    industries: Vec<String>,
    sub_industries: Vec<String>,
    solution_areas: Vec<String>,
}

/// Search results across all three sector axes.
#[derive(Debug, Clone, Serialize)]
pub struct SectorMatches {
    pub industries: Vec<String>,
    pub sub_industries: Vec<String>,
    pub solution_areas: Vec<String>,
}

/// Description-based sector recommendations with the reasoning that produced
/// them.
#[derive(Debug, Clone, Serialize)]
pub struct SectorRecommendations {
    pub industries: Vec<String>,
    pub sub_industries: Vec<String>,
    pub solution_areas: Vec<String>,
    pub reasoning: Vec<String>,
}

impl SectorCatalog {
    /// Loads the catalog from a CSV file.
    ///
    /// The file is semicolon-delimited with a header row; industries come
    /// from column 1, sub-industries from column 3, solution areas from
    /// column 5.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the CSV file.
    ///
    /// # Returns
    ///
    /// A `Result` containing the loaded catalog, or an error if the file
    /// cannot be read or holds no usable rows.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CrawlerError::CatalogError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_csv_str(&raw)
    }

    /// Parses the catalog from CSV text. See [`SectorCatalog::from_csv_path`]
    /// for the expected layout.
    pub fn from_csv_str(raw: &str) -> Result<Self> {
        let mut industries = Vec::new();
        let mut sub_industries = Vec::new();
        let mut solution_areas = Vec::new();

        for line in raw.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let columns: Vec<&str> = line.split(';').collect();
            if columns.len() < 6 {
                continue;
            }

            push_unique(&mut industries, columns[1]);
            push_unique(&mut sub_industries, columns[3]);
            push_unique(&mut solution_areas, columns[5]);
        }

        if industries.is_empty() && sub_industries.is_empty() && solution_areas.is_empty() {
            return Err(CrawlerError::CatalogError(
                "catalog contains no sectors".to_string(),
            ));
        }

        industries.sort();
        sub_industries.sort();
        solution_areas.sort();

        info!(
            "Loaded {} industries, {} sub-industries, {} solution areas",
            industries.len(),
            sub_industries.len(),
            solution_areas.len()
        );

        Ok(Self {
            industries,
            sub_industries,
            solution_areas,
        })
    }

    /// The valid industry names, sorted.
    pub fn industries(&self) -> &[String] {
        &self.industries
    }

    /// The valid sub-industry names, sorted.
    pub fn sub_industries(&self) -> &[String] {
        &self.sub_industries
    }

    /// The valid solution area names, sorted.
    pub fn solution_areas(&self) -> &[String] {
        &self.solution_areas
    }

    /// Searches all three axes for the given keywords. Exact matches rank
    /// before partial and word-overlap matches; result counts are bounded.
    pub fn search(&self, keywords: &str) -> SectorMatches {
        SectorMatches {
            industries: search_axis(&self.industries, keywords, 3),
            sub_industries: search_axis(&self.sub_industries, keywords, 5),
            solution_areas: search_axis(&self.solution_areas, keywords, 5),
        }
    }

    /// Produces sector recommendations from a free-text company description
    /// by matching known keyword hints against the catalog.
    pub fn recommend(&self, description: &str) -> SectorRecommendations {
        let mut rec = SectorRecommendations {
            industries: Vec::new(),
            sub_industries: Vec::new(),
            solution_areas: Vec::new(),
            reasoning: Vec::new(),
        };

        if description.is_empty() {
            return rec;
        }

        let description = description.to_lowercase();
        for (keyword, terms) in KEYWORD_HINTS {
            if !description.contains(keyword) {
                continue;
            }
            for term in *terms {
                let industries = search_axis(&self.industries, term, 2);
                if let Some(first) = industries.first() {
                    rec.reasoning.push(format!(
                        "Found '{}' in description, suggesting {} industry",
                        keyword, first
                    ));
                }
                extend_unique(&mut rec.industries, industries);
                extend_unique(&mut rec.sub_industries, search_axis(&self.sub_industries, term, 3));
                extend_unique(&mut rec.solution_areas, search_axis(&self.solution_areas, term, 3));
            }
        }

        rec
    }

    /// Validates and corrects the sector fields of a profile in place.
    ///
    /// Each non-empty industry, sub-industry, and solution area on the
    /// company and on every product must be a catalog entry. A stray value is
    /// replaced by the closest catalog entry when one exists; otherwise it is
    /// left in place, reported as an issue, and the report is marked invalid.
    ///
    /// # Arguments
    ///
    /// * `profile` - The extracted profile to validate.
    ///
    /// # Returns
    ///
    /// The `ValidationReport` describing corrections and unresolved issues.
    pub fn validate_profile(&self, profile: &mut CompanyProfile) -> ValidationReport {
        let mut report = ValidationReport::default();

        let info = &mut profile.company_info;
        self.check_field(&self.industries, &mut info.industry, "Industry", &mut report);
        self.check_field(&self.sub_industries, &mut info.sub_industry, "Sub-industry", &mut report);
        self.check_field(&self.solution_areas, &mut info.solution_area, "Solution area", &mut report);

        for (i, product) in profile.products.iter_mut().enumerate() {
            let label = format!("Product {}", i + 1);
            self.check_field(
                &self.industries,
                &mut product.industry,
                &format!("{} industry", label),
                &mut report,
            );
            self.check_field(
                &self.sub_industries,
                &mut product.sub_industry,
                &format!("{} sub-industry", label),
                &mut report,
            );
            self.check_field(
                &self.solution_areas,
                &mut product.solution_area,
                &format!("{} solution area", label),
                &mut report,
            );
        }

        for correction in &report.corrections {
            info!("Applied sector correction: {}", correction);
        }
        for issue in &report.issues {
            warn!("Sector validation issue: {}", issue);
        }

        report
    }

    /// Validates one sector field against one axis, correcting it to the
    /// closest catalog entry when possible.
    fn check_field(
        &self,
        axis: &[String],
        field: &mut Option<String>,
        label: &str,
        report: &mut ValidationReport,
    ) {
        let value = match field.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            // null and empty values are allowed
            _ => return,
        };

        if axis.iter().any(|entry| entry == &value) {
            return;
        }

        match find_closest(axis, &value) {
            Some(closest) => {
                report
                    .corrections
                    .push(format!("{} '{}' corrected to '{}'", label, value, closest));
                *field = Some(closest);
            }
            None => {
                report
                    .issues
                    .push(format!("{} '{}' not found in valid categories", label, value));
                report.valid = false;
            }
        }
    }
}

/// Adds a trimmed, non-empty value to `values` if it is not already present.
fn push_unique(values: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Extends `target` with values not already present, preserving order.
fn extend_unique(target: &mut Vec<String>, values: Vec<String>) {
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

/// Finds the closest catalog entry for a stray value: exact case-insensitive
/// match first, then substring containment in either direction.
fn find_closest(axis: &[String], value: &str) -> Option<String> {
    let value_lower = value.to_lowercase();

    for entry in axis {
        if entry.to_lowercase() == value_lower {
            return Some(entry.clone());
        }
    }

    for entry in axis {
        let entry_lower = entry.to_lowercase();
        if entry_lower.contains(&value_lower) || value_lower.contains(&entry_lower) {
            return Some(entry.clone());
        }
    }

    None
}

/// Searches one axis by keywords: exact match first, then substring
/// containment, then word overlap. Returns at most `limit` entries.
fn search_axis(axis: &[String], keywords: &str, limit: usize) -> Vec<String> {
    let keywords_lower = keywords.to_lowercase();
    if keywords_lower.is_empty() {
        return Vec::new();
    }
    let keyword_words: Vec<&str> = keywords_lower.split_whitespace().collect();

    let mut matches = Vec::new();
    for entry in axis {
        let entry_lower = entry.to_lowercase();
        if entry_lower == keywords_lower {
            matches.insert(0, entry.clone());
        } else if entry_lower.contains(&keywords_lower) || keywords_lower.contains(&entry_lower) {
            matches.push(entry.clone());
        } else {
            let entry_words: Vec<&str> = entry_lower.split_whitespace().collect();
            if keyword_words.iter().any(|w| entry_words.contains(w)) {
                matches.push(entry.clone());
            }
        }
    }

    matches.truncate(limit);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CSV: &str = "\
Id;Industry;Code;Sub-Industry;Code;Solution Area
1;Finance;F1;Digital Banking;D1;Fraud Detection
2;Finance;F1;Payments;P1;Process Automation
3;Healthcare;H1;Telemedicine;T1;Patient Analytics
4;Information Technology;I1;Software Development;S1;Machine Learning
";

    fn catalog() -> SectorCatalog {
        SectorCatalog::from_csv_str(CSV).unwrap()
    }

    /// Tests catalog loading and deduplication.
    #[test]
    fn test_catalog_loading() {
        let catalog = catalog();

        assert_eq!(
            catalog.industries(),
            &["Finance", "Healthcare", "Information Technology"]
        );
        assert_eq!(catalog.sub_industries().len(), 4);
        assert_eq!(catalog.solution_areas().len(), 4);
    }

    /// Tests that an empty catalog is rejected.
    #[test]
    fn test_empty_catalog_rejected() {
        assert!(SectorCatalog::from_csv_str("Id;Industry\n").is_err());
    }

    /// Tests the closest-match lookup.
    #[test]
    fn test_find_closest() {
        let catalog = catalog();

        assert_eq!(
            find_closest(&catalog.industries, "finance").as_deref(),
            Some("Finance")
        );
        assert_eq!(
            find_closest(&catalog.industries, "Financial Services in Finance").as_deref(),
            Some("Finance")
        );
        assert_eq!(find_closest(&catalog.industries, "Agriculture"), None);
    }

    /// Tests keyword search ordering and bounds.
    #[test]
    fn test_search() {
        let catalog = catalog();
        let matches = catalog.search("finance");

        assert_eq!(matches.industries, vec!["Finance".to_string()]);

        let matches = catalog.search("software");
        assert_eq!(
            matches.sub_industries,
            vec!["Software Development".to_string()]
        );
    }

    /// Tests validation: exact values pass, stray values are corrected,
    /// unknown values are reported and invalidate the profile.
    #[test]
    fn test_validate_profile() {
        let catalog = catalog();
        let mut profile = CompanyProfile::default();
        profile.company_info.industry = Some("finance".to_string());
        profile.company_info.sub_industry = Some("Payments".to_string());
        profile.company_info.solution_area = Some("Quantum Tourism".to_string());

        let report = catalog.validate_profile(&mut profile);

        assert_eq!(profile.company_info.industry.as_deref(), Some("Finance"));
        assert_eq!(profile.company_info.sub_industry.as_deref(), Some("Payments"));
        assert_eq!(report.corrections.len(), 1);
        assert_eq!(report.issues.len(), 1);
        assert!(!report.valid);
    }

    /// Tests that product sector fields are validated too.
    #[test]
    fn test_validate_products() {
        let catalog = catalog();
        let mut profile = CompanyProfile::default();
        profile.products.push(crate::types::Product {
            industry: Some("healthcare".to_string()),
            ..Default::default()
        });

        let report = catalog.validate_profile(&mut profile);

        assert_eq!(profile.products[0].industry.as_deref(), Some("Healthcare"));
        assert!(report.valid);
        assert_eq!(report.corrections.len(), 1);
    }

    /// Tests null and empty sector fields are accepted untouched.
    #[test]
    fn test_validate_null_fields() {
        let catalog = catalog();
        let mut profile = CompanyProfile::default();
        profile.company_info.industry = None;
        profile.company_info.sub_industry = Some("  ".to_string());

        let report = catalog.validate_profile(&mut profile);
        assert!(report.valid);
        assert!(report.corrections.is_empty());
    }

    /// Tests description-based recommendations.
    #[test]
    fn test_recommendations() {
        let catalog = catalog();
        let rec = catalog.recommend("We build AI software for banks");

        assert!(rec.industries.contains(&"Information Technology".to_string()));
        assert!(!rec.reasoning.is_empty());
    }
}
