mod parser;
pub mod scraper;
pub mod store;
pub mod tracker;
pub mod types;
pub mod utils;

pub use parser::{clean_price, parse_product_page};
pub use scraper::{PriceSource, ScraperError, WebScraper};
pub use store::{PriceBook, StoreError};
pub use tracker::{PriceTracker, RefreshProgress, RefreshReport, StoreConfig, TrackerError};
