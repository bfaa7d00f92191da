use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sitescout::export::{export_csv, export_json};
use sitescout::sectors::SectorCatalog;
use sitescout::service::ExtractionService;
use sitescout::store::CompanyStore;
use sitescout::types::ProcessingOutcome;
use sitescout::CrawlerConfig;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitescout", version, about = "Crawl a company website and extract a structured company profile")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl one company website and extract its profile
    Crawl {
        /// The company website URL
        url: String,
        /// Maximum number of pages to crawl
        #[arg(long)]
        max_pages: Option<usize>,
        /// LLM model to use for extraction
        #[arg(long)]
        model: Option<String>,
        /// Export the results after processing
        #[arg(long, value_enum)]
        export: Option<ExportFormat>,
        /// Output file for the export
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Process a file of website URLs, one per line
    Batch {
        /// File containing URLs, one per line
        file: PathBuf,
        /// Maximum number of pages to crawl per site
        #[arg(long)]
        max_pages: Option<usize>,
        /// LLM model to use for extraction
        #[arg(long)]
        model: Option<String>,
        /// Export the results after processing
        #[arg(long, value_enum)]
        export: Option<ExportFormat>,
        /// Output file for the export
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show recent processing results from the database
    History {
        /// Number of results to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Search stored companies by name, description, or industry
    Search {
        /// The search query
        query: String,
    },
    /// Search the sector catalog by keywords
    Sectors {
        /// Keywords, or a company description with --describe
        query: String,
        /// Treat the query as a company description and recommend sectors
        #[arg(long)]
        describe: bool,
    },
    /// Show aggregate statistics over stored data
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,html5ever=error,selectors=error,sqlx=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = CrawlerConfig::load().context("failed to load configuration")?;

    match cli.command {
        Command::Crawl {
            url,
            max_pages,
            model,
            export,
            output,
        } => {
            apply_overrides(&mut config, max_pages, model);
            let mut service = build_service(&config).await?;

            let start = Instant::now();
            let outcome = service.process_site(&url).await;

            print_outcome(&outcome);
            println!("Total time: {:.2?}", start.elapsed());

            export_outcomes(&[outcome], export, output)?;
        }
        Command::Batch {
            file,
            max_pages,
            model,
            export,
            output,
        } => {
            apply_overrides(&mut config, max_pages, model);

            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let urls: Vec<String> = raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect();
            anyhow::ensure!(!urls.is_empty(), "{} contains no URLs", file.display());

            let mut service = build_service(&config).await?;
            let outcomes = service.process_batch(&urls).await;

            let succeeded = outcomes.iter().filter(|o| o.success).count();
            println!(
                "\nProcessed {} websites: {} succeeded, {} failed",
                outcomes.len(),
                succeeded,
                outcomes.len() - succeeded
            );
            for outcome in &outcomes {
                print_outcome(outcome);
            }

            export_outcomes(&outcomes, export, output)?;
        }
        Command::History { limit } => {
            let store = CompanyStore::open(&config.database_path).await?;
            let results = store.recent_results(limit).await?;

            if results.is_empty() {
                println!("No processing results stored yet.");
            }
            for result in results {
                let status = if result.success { "ok" } else { "failed" };
                println!(
                    "{}  {:<6} {:>3} pages  {:.2}s  {}{}",
                    result.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    status,
                    result.pages_crawled,
                    result.processing_time,
                    result.url,
                    result
                        .error
                        .map(|e| format!("  ({})", e))
                        .unwrap_or_default()
                );
            }
        }
        Command::Search { query } => {
            let store = CompanyStore::open(&config.database_path).await?;
            let companies = store.search_companies(&query).await?;

            if companies.is_empty() {
                println!("No companies match '{}'.", query);
            }
            for company in companies {
                println!(
                    "{}  {}  [{}]",
                    company.url,
                    company.name.unwrap_or_else(|| "(unnamed)".to_string()),
                    company.industry.unwrap_or_else(|| "no industry".to_string())
                );
            }
        }
        Command::Sectors { query, describe } => {
            let catalog = SectorCatalog::from_csv_path(&config.sectors_path).with_context(
                || format!("failed to load sector catalog from {}", config.sectors_path),
            )?;

            if describe {
                let rec = catalog.recommend(&query);
                print_sector_list("Recommended industries", &rec.industries);
                print_sector_list("Recommended sub-industries", &rec.sub_industries);
                print_sector_list("Recommended solution areas", &rec.solution_areas);
                for reason in &rec.reasoning {
                    println!("  note: {}", reason);
                }
            } else {
                let matches = catalog.search(&query);
                print_sector_list("Industries", &matches.industries);
                print_sector_list("Sub-industries", &matches.sub_industries);
                print_sector_list("Solution areas", &matches.solution_areas);
            }
        }
        Command::Stats => {
            let store = CompanyStore::open(&config.database_path).await?;
            let stats = store.statistics().await?;

            println!("Companies stored:    {}", stats.total_companies);
            println!("Processing results:  {}", stats.total_results);
            println!(
                "Success rate:        {:.1}% ({} of {})",
                stats.success_rate * 100.0,
                stats.successful_results,
                stats.total_results
            );
            if !stats.top_industries.is_empty() {
                println!("Top industries:");
                for (industry, count) in stats.top_industries {
                    println!("  {:<40} {}", industry, count);
                }
            }
        }
    }

    Ok(())
}

/// Applies CLI flags on top of the loaded configuration.
fn apply_overrides(config: &mut CrawlerConfig, max_pages: Option<usize>, model: Option<String>) {
    if let Some(max_pages) = max_pages {
        config.max_pages = max_pages;
    }
    if let Some(model) = model {
        config.llm.model = model;
    }
}

/// Builds the extraction service: sector catalog plus sqlite store.
async fn build_service(config: &CrawlerConfig) -> anyhow::Result<ExtractionService> {
    let catalog = SectorCatalog::from_csv_path(&config.sectors_path)
        .with_context(|| format!("failed to load sector catalog from {}", config.sectors_path))?;
    let store = CompanyStore::open(&config.database_path)
        .await
        .with_context(|| format!("failed to open database {}", config.database_path))?;

    Ok(ExtractionService::new(config.clone(), catalog).with_store(store))
}

/// Writes the outcomes to the requested export format, if any.
fn export_outcomes(
    outcomes: &[ProcessingOutcome],
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let path = match format {
        Some(ExportFormat::Json) => Some(export_json(outcomes, output.as_deref())?),
        Some(ExportFormat::Csv) => Some(export_csv(outcomes, output.as_deref())?),
        None => None,
    };

    if let Some(path) = path {
        println!("Exported results to {}", path.display());
    }
    Ok(())
}

/// Prints one sector axis of a search or recommendation result.
fn print_sector_list(label: &str, values: &[String]) {
    if values.is_empty() {
        println!("{}: (none)", label);
    } else {
        println!("{}: {}", label, values.join(", "));
    }
}

/// Prints a human-readable summary of one processing outcome.
fn print_outcome(outcome: &ProcessingOutcome) {
    println!("\n=== {} ===", outcome.url);

    if !outcome.success {
        println!(
            "Processing failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    println!(
        "Pages crawled: {} ({:.2}s)",
        outcome.pages_crawled, outcome.processing_time
    );

    let Some(company) = &outcome.company else {
        return;
    };
    let info = &company.company_info;

    let line = |label: &str, value: &Option<String>| {
        if let Some(value) = value {
            println!("{:<16} {}", label, value);
        }
    };

    line("Name:", &info.name);
    line("Headline:", &info.headline);
    line("Industry:", &info.industry);
    line("Sub-industry:", &info.sub_industry);
    line("Solution area:", &info.solution_area);
    line("Business model:", &info.business_model);
    line("Headquarters:", &info.headquarter);
    line("City:", &info.city);
    line("Founded:", &info.founded_year);
    line("Employees:", &info.employee_count);
    println!(
        "Services: {}, products: {}",
        company.services.len(),
        company.products.len()
    );

    if let Some(validation) = &company.validation {
        for correction in &validation.corrections {
            println!("  corrected: {}", correction);
        }
        for issue in &validation.issues {
            println!("  issue: {}", issue);
        }
    }
}
