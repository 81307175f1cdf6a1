use std::sync::LazyLock;

use crate::types::{Grade, GradePrices, ScrapedItem, UNKNOWN_ITEM};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static RE_NUMERIC_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("invalid regex: numeric price"));

static PRODUCT_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#product_name").expect("invalid selector: product name"));

static GRADE_PRICES: LazyLock<Vec<(Grade, Selector)>> = LazyLock::new(|| {
    Grade::ALL
        .into_iter()
        .map(|grade| {
            let selector = Selector::parse(&format!("#{} span.price", grade.element_id()))
                .expect("invalid selector: grade price");
            (grade, selector)
        })
        .collect()
});

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips the currency sign and thousands separators: `"$1,234.56"` becomes `"1234.56"`.
pub fn clean_price(text: &str) -> String {
    text.trim().trim_start_matches('$').replace(',', "")
}

/// True for cleaned prices that can be stored as numbers.
pub fn is_numeric_price(text: &str) -> bool {
    RE_NUMERIC_PRICE.is_match(text)
}

pub fn parse_product_page(html: &str) -> ScrapedItem {
    let document = Html::parse_document(html);

    let prices = GRADE_PRICES
        .iter()
        .map(|(grade, selector)| {
            let price = document
                .select(selector)
                .next()
                .map(|span| clean_price(&elem_text(span)));
            if price.is_none() {
                log::debug!("No price found for {} ({})", grade, grade.element_id());
            }
            (*grade, price)
        })
        .collect::<GradePrices>();

    ScrapedItem {
        name: parse_item_name(&document),
        prices,
    }
}

// Only the heading's own text nodes; nested links carry the console/set name.
fn parse_item_name(document: &Html) -> String {
    let Some(element) = document.select(&PRODUCT_NAME).next() else {
        log::warn!("Product name element not found");
        return UNKNOWN_ITEM.to_string();
    };

    let own_text = element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect::<String>();

    let name = normalize_whitespace(&own_text);
    if name.is_empty() {
        UNKNOWN_ITEM.to_string()
    } else {
        name
    }
}
