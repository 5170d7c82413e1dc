use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use literature_scout::config::{find_config_file, get_config, load_config, Config};
use literature_scout::models::{AggregatedResult, PublicationRecord, SearchRequest, SourceType};
use literature_scout::session::{RecordFilter, SearchSession};
use literature_scout::sources::{
    ConnectionProbe, Source, SourceCapabilities, SourceError, SourceRegistry,
};
use literature_scout::SearchAggregator;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Literature Scout - search several scholarly literature APIs at once
#[derive(Parser, Debug)]
#[command(name = "literature-scout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search PubMed, Europe PMC, CORE, OpenAlex, Google Scholar and Semantic Scholar at once", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the enabled providers for a query
    #[command(alias = "s")]
    Search {
        /// Search query, passed to every provider as written
        query: String,

        /// Providers to search, in result order (default: every configured provider)
        #[arg(long, short, value_delimiter = ',')]
        providers: Vec<SourceType>,

        /// Records requested from each provider
        #[arg(long, short)]
        limit: Option<usize>,

        /// Only show records whose title or abstract contains this text
        #[arg(long)]
        contains: Option<String>,

        /// Only show records published in or after this year
        #[arg(long)]
        since: Option<u16>,

        /// Only show records published in or before this year
        #[arg(long)]
        until: Option<u16>,

        /// Write the shown records to a .csv or .json file
        #[arg(long, short)]
        export: Option<PathBuf>,
    },

    /// Fetch the abstract of one record
    Abstract {
        /// Provider the record came from
        provider: SourceType,

        /// Provider identifier of the record (PMID, OpenAlex id, ...)
        id: String,
    },

    /// Check which providers are reachable
    Probe {
        /// Providers to probe (default: all)
        #[arg(long, short, value_delimiter = ',')]
        providers: Vec<SourceType>,
    },

    /// List providers and whether they are configured
    Providers,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("literature_scout={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from file if specified or found in default locations
    let config = if let Some(config_path) = &cli.config {
        load_config(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else if let Some(config_path) = find_config_file() {
        tracing::info!("Using config file: {}", config_path.display());
        load_config(&config_path)?
    } else {
        get_config()?
    };

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let registry = SourceRegistry::from_config(&config)?;

    match command {
        Commands::Search {
            query,
            providers,
            limit,
            contains,
            since,
            until,
            export,
        } => {
            let providers = if providers.is_empty() {
                configured_providers(&registry)
            } else {
                providers
            };

            let request = SearchRequest::new(query)
                .providers(providers)
                .limit(limit.unwrap_or(config.search.default_limit));

            let aggregator = SearchAggregator::from_config(registry, &config.search);
            let mut session = SearchSession::new();
            let result = session.search(&aggregator, &request).await;

            if !cli.quiet {
                report_outcomes(result);
            }

            let filter = RecordFilter {
                text: contains,
                year_from: since,
                year_to: until,
                ..Default::default()
            };
            let shown: Vec<&PublicationRecord> = if filter == RecordFilter::default() {
                session.records().iter().collect()
            } else {
                session.select_matching(&filter);
                session.selected()
            };

            output_records(&shown, cli.output);

            if let Some(path) = export {
                if filter != RecordFilter::default() && shown.is_empty() {
                    anyhow::bail!("No records match the filter; nothing exported");
                }
                session
                    .export(&path)
                    .with_context(|| format!("Failed to export to {}", path.display()))?;
                if !cli.quiet {
                    eprintln!("Exported {} records to {}", shown.len(), path.display());
                }
            }
        }

        Commands::Abstract { provider, id } => {
            let aggregator = SearchAggregator::from_config(registry, &config.search);
            let text = aggregator
                .fetch_abstract(provider, &id)
                .await
                .with_context(|| format!("Failed to fetch abstract {} from {}", id, provider))?;
            println!("{}", text);
        }

        Commands::Probe { providers } => {
            let probe = ConnectionProbe::new(Duration::from_secs(config.search.probe_timeout_secs));
            let sources: Vec<Arc<dyn Source>> = if providers.is_empty() {
                registry.all().into_iter().cloned().collect()
            } else {
                providers
                    .iter()
                    .map(|p| registry.get_required(*p).cloned())
                    .collect::<Result<_, _>>()?
            };

            let checks = probe.diagnose_all(&sources).await;
            output_probe(&checks, cli.output);
        }

        Commands::Providers => {
            output_providers(&registry, cli.output);
        }

        Commands::Config => {
            print!("{}", redacted(&config).to_toml_string()?);
        }
    }

    Ok(())
}

/// Providers that can be searched without further setup
fn configured_providers(registry: &SourceRegistry) -> Vec<SourceType> {
    registry
        .all()
        .into_iter()
        .filter(|s| s.is_configured().is_ok())
        .map(|s| s.source_type())
        .collect()
}

fn redacted(config: &Config) -> Config {
    let mask = |key: &Option<String>| key.as_ref().map(|_| "********".to_string());
    let mut config = config.clone();
    config.api_keys.core = mask(&config.api_keys.core);
    config.api_keys.semantic_scholar = mask(&config.api_keys.semantic_scholar);
    config.api_keys.ncbi = mask(&config.api_keys.ncbi);
    config
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn report_outcomes(result: &AggregatedResult) {
    for outcome in &result.outcomes {
        match &outcome.failure {
            None => eprintln!("Found {} records from {}", outcome.records, outcome.source),
            Some(failure) => eprintln!(
                "No results from {} ({}): {}",
                outcome.source, failure.kind, failure.message
            ),
        }
    }
}

fn output_records(records: &[&PublicationRecord], format: OutputFormat) {
    match resolve_format(format) {
        OutputFormat::Json => match serde_json::to_string_pretty(records) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to serialize records: {}", e),
        },
        OutputFormat::Plain => {
            for record in records {
                println!("{} - {} ({}, {})", record.title, record.authors, record.source, record.year);
                println!("  Venue: {}", record.venue);
                println!("  ID: {}", record.identifier);
                if record.has_doi() {
                    println!("  DOI: {}", record.doi);
                }
                println!("  URL: {}", record.url);
                println!();
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Source", "ID", "Year", "Title", "Authors", "Venue"]);

            for record in records {
                table.add_row(vec![
                    Cell::new(record.source.to_string()),
                    Cell::new(&record.identifier),
                    Cell::new(&record.year),
                    Cell::new(truncate(&record.title, 50)).add_attribute(Attribute::Bold),
                    Cell::new(truncate(&record.authors, 30)),
                    Cell::new(truncate(&record.venue, 25)),
                ]);
            }
            println!("{table}");
        }
    }
}

/// Provider id, reachability and failure reason per probed source
fn probe_rows(checks: &[(SourceType, Result<(), SourceError>)]) -> Vec<(&'static str, bool, String)> {
    checks
        .iter()
        .map(|(source, check)| match check {
            Ok(()) => (source.id(), true, String::new()),
            Err(e) => (source.id(), false, e.to_string()),
        })
        .collect()
}

fn output_probe(checks: &[(SourceType, Result<(), SourceError>)], format: OutputFormat) {
    let rows = probe_rows(checks);

    match resolve_format(format) {
        OutputFormat::Json => {
            let value: Vec<serde_json::Value> = rows
                .iter()
                .map(|(id, ok, error)| serde_json::json!({"provider": id, "reachable": ok, "error": error}))
                .collect();
            println!("{}", serde_json::Value::Array(value));
        }
        OutputFormat::Plain => {
            for (id, ok, error) in &rows {
                let marker = if *ok { "●" } else { "○" };
                println!("{} {} {}", marker, id, error);
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Cell, Color, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Provider", "Status", "Detail"]);
            for (id, ok, error) in &rows {
                let status = if *ok {
                    Cell::new("OK").fg(Color::Green)
                } else {
                    Cell::new("UNREACHABLE").fg(Color::Red)
                };
                table.add_row(vec![Cell::new(id), status, Cell::new(truncate(error, 60))]);
            }
            println!("{table}");
        }
    }
}

fn output_providers(registry: &SourceRegistry, format: OutputFormat) {
    let describe = |caps: SourceCapabilities| {
        let mut names = Vec::new();
        if caps.contains(SourceCapabilities::SEARCH) {
            names.push("search");
        }
        if caps.contains(SourceCapabilities::ABSTRACT) {
            names.push("abstract");
        }
        if caps.contains(SourceCapabilities::PROBE) {
            names.push("probe");
        }
        if caps.contains(SourceCapabilities::REQUIRES_API_KEY) {
            names.push("api-key");
        }
        names.join(", ")
    };

    let sources = registry.all();
    match resolve_format(format) {
        OutputFormat::Json => {
            let value: Vec<serde_json::Value> = sources
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "id": s.id(),
                        "name": s.name(),
                        "capabilities": describe(s.capabilities()),
                        "max_results": s.max_results(),
                        "configured": s.is_configured().is_ok(),
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(value));
        }
        OutputFormat::Plain => {
            for s in &sources {
                let state = match s.is_configured() {
                    Ok(()) => "ready".to_string(),
                    Err(e) => e.to_string(),
                };
                println!("{} ({}) - {} [{}]", s.name(), s.id(), describe(s.capabilities()), state);
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["ID", "Name", "Capabilities", "Max results", "Status"]);
            for s in &sources {
                let state = match s.is_configured() {
                    Ok(()) => "ready".to_string(),
                    Err(e) => e.to_string(),
                };
                table.add_row(vec![
                    Cell::new(s.id()),
                    Cell::new(s.name()),
                    Cell::new(describe(s.capabilities())),
                    Cell::new(s.max_results()),
                    Cell::new(state),
                ]);
            }
            println!("{table}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["literature-scout"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Auto);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["literature-scout", "-vv"]);
        assert_eq!(cli.verbose, 2);

        let cli = Cli::parse_from(["literature-scout", "--verbose"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_output_format() {
        let cli = Cli::parse_from(["literature-scout", "-o", "json"]);
        assert_eq!(cli.output, OutputFormat::Json);

        let cli = Cli::parse_from(["literature-scout", "providers", "--output", "plain"]);
        assert_eq!(cli.output, OutputFormat::Plain);
    }

    #[test]
    fn test_cli_config_flag() {
        let cli = Cli::parse_from(["literature-scout", "--config", "/path/to/config.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
    }

    #[test]
    fn test_search_command() {
        let cli = Cli::parse_from([
            "literature-scout",
            "search",
            "cancer",
            "-p",
            "pubmed,europe-pmc",
            "-l",
            "10",
            "--since",
            "2015",
            "--export",
            "out.csv",
        ]);

        match cli.command {
            Some(Commands::Search {
                query,
                providers,
                limit,
                since,
                export,
                ..
            }) => {
                assert_eq!(query, "cancer");
                assert_eq!(providers, vec![SourceType::PubMed, SourceType::EuropePmc]);
                assert_eq!(limit, Some(10));
                assert_eq!(since, Some(2015));
                assert_eq!(export, Some(PathBuf::from("out.csv")));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_search_rejects_unknown_provider() {
        let result = Cli::try_parse_from(["literature-scout", "search", "q", "-p", "arxiv"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_abstract_command() {
        let cli = Cli::parse_from(["literature-scout", "abstract", "semantic", "649def34"]);
        match cli.command {
            Some(Commands::Abstract { provider, id }) => {
                assert_eq!(provider, SourceType::SemanticScholar);
                assert_eq!(id, "649def34");
            }
            _ => panic!("Expected Abstract command"),
        }
    }

    #[test]
    fn test_probe_command() {
        let cli = Cli::parse_from(["literature-scout", "probe", "-p", "openalex,core"]);
        match cli.command {
            Some(Commands::Probe { providers }) => {
                assert_eq!(providers, vec![SourceType::OpenAlex, SourceType::Core]);
            }
            _ => panic!("Expected Probe command"),
        }
    }

    #[test]
    fn test_probe_rows_keep_reasons() {
        let checks = vec![
            (SourceType::PubMed, Ok(())),
            (
                SourceType::Core,
                Err(SourceError::MissingApiKey("CORE_API_KEY".to_string())),
            ),
        ];
        let rows = probe_rows(&checks);
        assert_eq!(rows[0], ("pubmed", true, String::new()));
        assert_eq!(rows[1].0, "core");
        assert!(!rows[1].1);
        assert!(rows[1].2.contains("CORE_API_KEY"));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Ünïcödé títle here", 8), "Ünïcö...");
    }

    #[test]
    fn test_redacted_hides_keys() {
        let mut config = Config::default();
        config.api_keys.core = Some("secret".to_string());
        config.api_keys.ncbi = None;
        let shown = redacted(&config);
        assert_eq!(shown.api_keys.core.as_deref(), Some("********"));
        assert!(shown.api_keys.ncbi.is_none());
    }
}
