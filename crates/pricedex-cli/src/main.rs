use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use pricedex::scraper::WebScraper;
use pricedex::tracker::{
    DEFAULT_CONCURRENCY, DEFAULT_FILE_NAME, DEFAULT_SHEET_NAME, PriceTracker, StoreConfig,
};
use pricedex::types::{Column, Grade};
use pricedex::utils::{RecordStats, RecordTable, SortSpec};

#[derive(Parser)]
#[command(name = "pricedex")]
#[command(about = "A PriceCharting price scraper that keeps a spreadsheet up to date", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(
        short = 'f',
        long = "file",
        default_value = DEFAULT_FILE_NAME,
        global = true,
        help = "Spreadsheet holding the tracked prices"
    )]
    file: PathBuf,

    #[arg(
        long,
        default_value = DEFAULT_SHEET_NAME,
        global = true,
        help = "Name of the sheet holding the price table"
    )]
    sheet: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a product page and add it as a new row
    Add {
        #[arg(help = "URL of the product page")]
        url: String,
    },
    /// Re-fetch every stored URL and overwrite its prices
    Update {
        #[arg(
            long,
            default_value_t = DEFAULT_CONCURRENCY,
            help = "Number of pages fetched at once",
            value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
        )]
        concurrency: usize,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Show the stored price table
    List {
        #[arg(
            long,
            value_parser = parse_column,
            help = "Sort by column: item, url, ungraded, 7, 8, 9, 9.5 or 10"
        )]
        sort: Option<Column>,

        #[arg(long, requires = "sort", help = "Sort in descending order")]
        reverse: bool,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Scrape a product page and print it without storing anything
    Fetch {
        #[arg(help = "URL of the product page")]
        url: String,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn parse_column(s: &str) -> Result<Column, String> {
    Column::from_str(s).map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let scraper = WebScraper::new().unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    let mut config = StoreConfig {
        path: cli.file,
        sheet_name: cli.sheet,
        ..StoreConfig::default()
    };

    match cli.command {
        Commands::Add { url } => {
            let tracker = PriceTracker::new(scraper, config);

            let record = tracker.add_url(&url).await.unwrap_or_else(|e| {
                log::error!("Error: {}", e);
                process::exit(1);
            });

            println!("New URL added successfully!");
            print!("{}", RecordTable(std::slice::from_ref(&record)));
        }

        Commands::Update {
            concurrency,
            format,
        } => {
            config.concurrency = concurrency;
            let tracker = PriceTracker::new(scraper, config);

            log::info!(
                "Updating all prices in {}...",
                tracker.config().path.display()
            );

            let report = tracker.update_all(|_| {}).await.unwrap_or_else(|e| {
                log::error!("Error: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&report),
                OutputFormat::Text => {
                    println!("All prices updated successfully!");
                    print!("{}", report);
                }
            }
        }

        Commands::List {
            sort,
            reverse,
            format,
        } => {
            let tracker = PriceTracker::new(scraper, config);

            let mut records = tracker.records().unwrap_or_else(|e| {
                log::error!("Error reading spreadsheet: {}", e);
                process::exit(1);
            });

            if let Some(column) = sort {
                SortSpec { column, reverse }.apply(&mut records);
            }

            match format {
                OutputFormat::Json => serialize_json(&records),
                OutputFormat::Text => {
                    if records.is_empty() {
                        println!("No entries to display.");
                    } else {
                        print!("{}", RecordTable(&records));
                        print!("{}", RecordStats::from_records(&records));
                    }
                }
            }
        }

        Commands::Fetch { url, format } => {
            let tracker = PriceTracker::new(scraper, config);

            let item = tracker.preview(&url).await.unwrap_or_else(|e| {
                log::error!("Error: {}", e);
                process::exit(1);
            });

            match format {
                OutputFormat::Json => serialize_json(&item),
                OutputFormat::Text => {
                    println!("{}", item.name);
                    for grade in Grade::ALL {
                        println!(
                            "  {:<10} {}",
                            grade.to_string(),
                            item.prices.get(grade).unwrap_or("-")
                        );
                    }
                }
            }
        }
    }
}
