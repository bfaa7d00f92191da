use crate::sectors::SectorCatalog;
use crate::types::SiteDocument;

/// The JSON shape the model is asked to return. Field names line up with
/// `CompanyProfile` so the response deserializes directly.
const EXPECTED_STRUCTURE: &str = r#"{
    "company_info": {
        "logo": "string or null",
        "name": "string or null",
        "headline": "string or null",
        "description": "string or null",
        "company_type": "string or null",
        "service_or_product": "string or null",
        "video_url": "string or null",
        "headquarter": "string or null",
        "city": "string or null",
        "employee_count": "string or null",
        "founded_year": "string or null",
        "business_model": "string or null",
        "women_founded": "string or null",
        "industry": "string or null",
        "sub_industry": "string or null",
        "solution_area": "string or null",
        "tags": "string or null",
        "active_customers": "string or null",
        "available_countries": "string or null"
    },
    "services": [
        {
            "name": "string or null",
            "description": "string or null"
        }
    ],
    "products": [
        {
            "logo": "string or null",
            "name": "string or null",
            "headline": "string or null",
            "description": "string or null",
            "video": "string or null",
            "employee_count": "string or null",
            "founded_year": "string or null",
            "business_model": "string or null",
            "industry": "string or null",
            "sub_industry": "string or null",
            "solution_area": "string or null",
            "screenshots": "string or null",
            "how_it_works": "string or null",
            "value_proposition": "string or null",
            "use_case_title": "string or null",
            "use_case_description": "string or null",
            "case_study_title": "string or null",
            "customer_name": "string or null",
            "case_study_description": "string or null",
            "statistics_title": "string or null",
            "statistics_value": "string or null",
            "active_customers": "string or null",
            "customer_logos": "string or null",
            "available_countries": "string or null",
            "integrations": "string or null",
            "partnerships": "string or null"
        }
    ]
}"#;

/// The `PromptBuilder` struct constructs the system and user prompts for
/// company profile extraction from an aggregated site document. The valid
/// sector names can be embedded so the model picks from the allowed lists
/// instead of inventing categories.
pub struct PromptBuilder<'a> {
    /// The aggregated site content to analyze.
    document: &'a SiteDocument,
    /// The sector catalog, when sector lists should be embedded.
    catalog: Option<&'a SectorCatalog>,
}

impl<'a> PromptBuilder<'a> {
    /// Creates a new `PromptBuilder` for the given site document.
    ///
    /// # Arguments
    ///
    /// * `document` - The aggregated site content to analyze.
    ///
    /// # Returns
    ///
    /// A new instance of `PromptBuilder`.
    pub fn new(document: &'a SiteDocument) -> Self {
        Self {
            document,
            catalog: None,
        }
    }

    /// Embeds the valid sector names into the instructions.
    ///
    /// # Arguments
    ///
    /// * `catalog` - The sector catalog to embed.
    ///
    /// # Returns
    ///
    /// The updated `PromptBuilder` instance.
    pub fn with_catalog(mut self, catalog: &'a SectorCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Builds the system prompt: analyst role, extraction requirements,
    /// sector lists, and the strict JSON output rules.
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are an expert company information extraction analyst. You analyze website \
             content and extract comprehensive, structured company information with precision.\n\n\
             You will receive content crawled from multiple pages of a company's website. \
             Analyze ALL of it and extract the following:\n\n\
             1. COMPANY INFORMATION: official company name, headline/tagline, description \
             (mission, core activities, target market), company type, whether the company is \
             product-based or service-based or both, introduction video URL, headquarters \
             country, city, employee count, founded year, business model (B2B, B2C, B2B2C, \
             C2C), whether any founders are women, industry, sub-industry, solution area, \
             tags, well-known active customers, countries where the company operates, and a \
             logo reference if the content mentions one.\n\n\
             2. SERVICES: for each service offered, its official name and a description of \
             what it does and the value it provides.\n\n\
             3. PRODUCTS: for each product, its name, headline, description, video, founded \
             year, business model, industry, sub-industry, solution area, screenshots, how it \
             works, value proposition, use case, case study, statistics, active customers, \
             customer logos, available countries, integrations, and partnerships.\n\n\
             ANALYSIS GUIDELINES:\n\
             - Cross-reference information across pages; prefer official statements.\n\
             - Extract exact text when possible rather than paraphrasing.\n\
             - Pay special attention to About, Products, Services, and Contact pages.\n\
             - When a field has multiple values, separate them with commas in one string.\n\
             - Use null for anything the content does not state.\n\n",
        );

        if let Some(catalog) = self.catalog {
            prompt.push_str(&format!(
                "SECTOR SELECTION: pick industry, sub-industry, and solution area values \
                 ONLY from these lists. Do not invent categories.\n\n\
                 VALID INDUSTRIES ({}): {}\n\n\
                 VALID SUB-INDUSTRIES ({}): {}\n\n\
                 VALID SOLUTION AREAS ({}): {}\n\n",
                catalog.industries().len(),
                catalog.industries().join(", "),
                catalog.sub_industries().len(),
                catalog.sub_industries().join(", "),
                catalog.solution_areas().len(),
                catalog.solution_areas().join(", "),
            ));
        }

        prompt.push_str(&format!(
            "OUTPUT RULES:\n\
             - Respond with valid JSON only. No markdown, no explanations, no comments.\n\
             - Property names and string values in double quotes; null without quotes.\n\
             - No trailing commas, no HTML tags, no backticks inside string values.\n\n\
             Return a JSON object with exactly this structure:\n{}",
            EXPECTED_STRUCTURE
        ));

        prompt
    }

    /// Builds the user prompt: the cleaned site content followed by the
    /// extraction request.
    ///
    /// # Returns
    ///
    /// A formatted prompt string.
    pub fn build(&self) -> String {
        format!(
            "Analyze the following website content and extract the company profile.\n\n\
             WEBSITE CONTENT TO ANALYZE:\n{}\n\n\
             Return only the JSON object described in the instructions.",
            Self::clean_text(&self.document.combined_text())
        )
    }

    /// Cleans the given text by removing blank lines and normalizing
    /// whitespace.
    ///
    /// # Arguments
    ///
    /// * `text` - The text to be cleaned.
    ///
    /// # Returns
    ///
    /// The cleaned text.
    fn clean_text(text: &str) -> String {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.split_whitespace()
                    .collect::<Vec<&str>>()
                    .join(" ")
            })
            .collect::<Vec<String>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CrawledPage;
    use chrono::Utc;

    fn document() -> SiteDocument {
        SiteDocument {
            seed_url: "https://acme.test".to_string(),
            pages: vec![CrawledPage {
                url: "https://acme.test".to_string(),
                title: "Acme".to_string(),
                meta_description: String::new(),
                headings: vec![],
                content: "Acme   builds    widgets.".to_string(),
                links: vec![],
                fetched_at: Utc::now(),
            }],
        }
    }

    /// Tests that the user prompt carries the site content, cleaned.
    #[test]
    fn test_prompt_builder() {
        let doc = document();
        let prompt = PromptBuilder::new(&doc).build();

        assert!(prompt.contains("=== PAGE: https://acme.test ==="));
        assert!(prompt.contains("Acme builds widgets."));
        assert!(!prompt.contains("   "));
    }

    /// Tests that the system prompt embeds catalog sectors when given.
    #[test]
    fn test_system_prompt_with_catalog() {
        let catalog = SectorCatalog::from_csv_str(
            "Id;Industry;X;Sub-Industry;Y;Solution Area\n1;Finance;;Payments;;Fraud Detection\n",
        )
        .unwrap();

        let doc = document();
        let prompt = PromptBuilder::new(&doc).with_catalog(&catalog).system_prompt();

        assert!(prompt.contains("VALID INDUSTRIES (1): Finance"));
        assert!(prompt.contains("Payments"));
        assert!(prompt.contains("Fraud Detection"));
        assert!(prompt.contains("\"company_info\""));
    }
}
