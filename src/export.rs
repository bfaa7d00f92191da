use crate::types::ProcessingOutcome;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// CSV column order for exported outcomes.
const CSV_HEADER: &[&str] = &[
    "url",
    "success",
    "timestamp",
    "processing_time",
    "pages_crawled",
    "company_name",
    "headline",
    "description",
    "industry",
    "sub_industry",
    "solution_area",
    "business_model",
    "headquarter",
    "city",
    "founded_year",
    "employee_count",
    "services_count",
    "products_count",
    "error",
];

/// Writes the outcomes as a pretty-printed JSON array.
///
/// # Arguments
///
/// * `outcomes` - The processing outcomes to export.
/// * `path` - The output file, or `None` for a timestamped default name.
///
/// # Returns
///
/// A `Result` containing the path written to.
pub fn export_json(outcomes: &[ProcessingOutcome], path: Option<&Path>) -> Result<PathBuf> {
    let path = resolve_path(path, "json");
    let json = serde_json::to_string_pretty(outcomes)
        .map_err(|e| crate::CrawlerError::ProfileError(e.to_string()))?;
    std::fs::write(&path, json)?;

    info!("Exported {} results to {}", outcomes.len(), path.display());
    Ok(path)
}

/// Writes the outcomes as CSV, one row per site with flattened company
/// fields and service/product counts.
///
/// # Arguments
///
/// * `outcomes` - The processing outcomes to export.
/// * `path` - The output file, or `None` for a timestamped default name.
///
/// # Returns
///
/// A `Result` containing the path written to.
pub fn export_csv(outcomes: &[ProcessingOutcome], path: Option<&Path>) -> Result<PathBuf> {
    let path = resolve_path(path, "csv");

    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push('\n');

    for outcome in outcomes {
        let info = outcome.company.as_ref().map(|c| &c.company_info);
        fn field(value: Option<&String>) -> &str {
            value.map(String::as_str).unwrap_or("")
        }

        let row: Vec<String> = vec![
            outcome.url.clone(),
            outcome.success.to_string(),
            outcome.timestamp.to_rfc3339(),
            format!("{:.2}", outcome.processing_time),
            outcome.pages_crawled.to_string(),
            field(info.and_then(|i| i.name.as_ref())).to_string(),
            field(info.and_then(|i| i.headline.as_ref())).to_string(),
            field(info.and_then(|i| i.description.as_ref())).to_string(),
            field(info.and_then(|i| i.industry.as_ref())).to_string(),
            field(info.and_then(|i| i.sub_industry.as_ref())).to_string(),
            field(info.and_then(|i| i.solution_area.as_ref())).to_string(),
            field(info.and_then(|i| i.business_model.as_ref())).to_string(),
            field(info.and_then(|i| i.headquarter.as_ref())).to_string(),
            field(info.and_then(|i| i.city.as_ref())).to_string(),
            field(info.and_then(|i| i.founded_year.as_ref())).to_string(),
            field(info.and_then(|i| i.employee_count.as_ref())).to_string(),
            outcome
                .company
                .as_ref()
                .map(|c| c.services.len())
                .unwrap_or(0)
                .to_string(),
            outcome
                .company
                .as_ref()
                .map(|c| c.products.len())
                .unwrap_or(0)
                .to_string(),
            field(outcome.error.as_ref()).to_string(),
        ];

        let escaped: Vec<String> = row.iter().map(|f| escape_csv_field(f)).collect();
        out.push_str(&escaped.join(","));
        out.push('\n');
    }

    std::fs::write(&path, out)?;
    info!("Exported {} results to {}", outcomes.len(), path.display());
    Ok(path)
}

/// Resolves the output path, generating a timestamped default filename when
/// none was given.
fn resolve_path(path: Option<&Path>, extension: &str) -> PathBuf {
    match path {
        Some(path) => path.to_path_buf(),
        None => {
            let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
            PathBuf::from(format!(
                "company_extraction_results_{}.{}",
                timestamp, extension
            ))
        }
    }
}

/// Quotes a CSV field when it contains a delimiter, quote, or newline.
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
