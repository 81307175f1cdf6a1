use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Header row of the data sheet, in column order.
pub const HEADERS: [&str; 8] = [
    "Item",
    "Ungraded",
    "Grade 7",
    "Grade 8",
    "Grade 9",
    "Grade 9.5",
    "Grade 10",
    "URL",
];

pub const UNKNOWN_ITEM: &str = "Unknown Item";

#[derive(Debug, thiserror::Error)]
#[error("Invalid grade '{0}'. Accepted values: 'ungraded', '7', '8', '9', '9.5', '10'")]
pub struct GradeParseError(String);

#[derive(Debug, thiserror::Error)]
#[error("Invalid column '{0}'. Accepted values: 'item', 'url' or a grade")]
pub struct ColumnParseError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Ungraded,
    Grade7,
    Grade8,
    Grade9,
    Grade9_5,
    Grade10,
}

impl Grade {
    pub const ALL: [Grade; 6] = [
        Grade::Ungraded,
        Grade::Grade7,
        Grade::Grade8,
        Grade::Grade9,
        Grade::Grade9_5,
        Grade::Grade10,
    ];

    /// Id of the element holding this grade's price on a product page.
    pub fn element_id(&self) -> &'static str {
        match self {
            Grade::Ungraded => "used_price",
            Grade::Grade7 => "complete_price",
            Grade::Grade8 => "new_price",
            Grade::Grade9 => "graded_price",
            Grade::Grade9_5 => "box_only_price",
            Grade::Grade10 => "manual_only_price",
        }
    }

    pub fn header(&self) -> &'static str {
        HEADERS[self.index() + 1]
    }

    pub fn index(&self) -> usize {
        match self {
            Grade::Ungraded => 0,
            Grade::Grade7 => 1,
            Grade::Grade8 => 2,
            Grade::Grade9 => 3,
            Grade::Grade9_5 => 4,
            Grade::Grade10 => 5,
        }
    }
}

impl FromStr for Grade {
    type Err = GradeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '_', '-'], "");
        match normalized.trim_start_matches("grade") {
            "ungraded" | "used" => Ok(Grade::Ungraded),
            "7" => Ok(Grade::Grade7),
            "8" => Ok(Grade::Grade8),
            "9" => Ok(Grade::Grade9),
            "9.5" | "95" => Ok(Grade::Grade9_5),
            "10" => Ok(Grade::Grade10),
            _ => Err(GradeParseError(s.to_string())),
        }
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header())
    }
}

/// Cleaned price text for each grade. `None` when the page had no value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradePrices {
    pub ungraded: Option<String>,
    pub grade7: Option<String>,
    pub grade8: Option<String>,
    pub grade9: Option<String>,
    pub grade9_5: Option<String>,
    pub grade10: Option<String>,
}

impl GradePrices {
    fn slot(&self, grade: Grade) -> &Option<String> {
        match grade {
            Grade::Ungraded => &self.ungraded,
            Grade::Grade7 => &self.grade7,
            Grade::Grade8 => &self.grade8,
            Grade::Grade9 => &self.grade9,
            Grade::Grade9_5 => &self.grade9_5,
            Grade::Grade10 => &self.grade10,
        }
    }

    pub fn get(&self, grade: Grade) -> Option<&str> {
        self.slot(grade).as_deref()
    }

    pub fn set(&mut self, grade: Grade, price: Option<String>) {
        let slot = match grade {
            Grade::Ungraded => &mut self.ungraded,
            Grade::Grade7 => &mut self.grade7,
            Grade::Grade8 => &mut self.grade8,
            Grade::Grade9 => &mut self.grade9,
            Grade::Grade9_5 => &mut self.grade9_5,
            Grade::Grade10 => &mut self.grade10,
        };
        *slot = price;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Grade, Option<&str>)> {
        Grade::ALL.into_iter().map(|g| (g, self.get(g)))
    }

    pub fn has_any(&self) -> bool {
        Grade::ALL.iter().any(|g| self.slot(*g).is_some())
    }
}

impl FromIterator<(Grade, Option<String>)> for GradePrices {
    fn from_iter<I: IntoIterator<Item = (Grade, Option<String>)>>(iter: I) -> Self {
        let mut prices = GradePrices::default();
        for (grade, price) in iter {
            prices.set(grade, price);
        }
        prices
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedItem {
    pub name: String,
    pub prices: GradePrices,
}

/// One row of the data sheet. The URL identifies the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub item: String,
    pub prices: GradePrices,
    pub url: String,
}

impl PriceRecord {
    pub fn from_scraped(item: ScrapedItem, url: impl Into<String>) -> Self {
        Self {
            item: item.name,
            prices: item.prices,
            url: url.into(),
        }
    }

    pub fn apply(&mut self, item: ScrapedItem) {
        self.item = item.name;
        self.prices = item.prices;
    }

    pub fn value(&self, column: Column) -> Option<&str> {
        match column {
            Column::Item => Some(self.item.as_str()),
            Column::Price(grade) => self.prices.get(grade),
            Column::Url => Some(self.url.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Item,
    Price(Grade),
    Url,
}

impl Column {
    pub fn all() -> impl Iterator<Item = Column> {
        std::iter::once(Column::Item)
            .chain(Grade::ALL.into_iter().map(Column::Price))
            .chain(std::iter::once(Column::Url))
    }
}

impl FromStr for Column {
    type Err = ColumnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "item" | "name" => Ok(Column::Item),
            "url" => Ok(Column::Url),
            other => Grade::from_str(other)
                .map(Column::Price)
                .map_err(|_| ColumnParseError(s.to_string())),
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Column::Item => write!(f, "{}", HEADERS[0]),
            Column::Price(grade) => write!(f, "{}", grade),
            Column::Url => write!(f, "{}", HEADERS[7]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_from_str_variants() {
        assert_eq!(Grade::from_str("ungraded").unwrap(), Grade::Ungraded);
        assert_eq!(Grade::from_str("7").unwrap(), Grade::Grade7);
        assert_eq!(Grade::from_str("Grade 9.5").unwrap(), Grade::Grade9_5);
        assert_eq!(Grade::from_str("grade_10").unwrap(), Grade::Grade10);
        assert!(Grade::from_str("11").is_err());
    }

    #[test]
    fn test_grade_headers_follow_sheet_order() {
        let headers: Vec<&str> = Grade::ALL.iter().map(Grade::header).collect();
        assert_eq!(headers, HEADERS[1..7]);
    }

    #[test]
    fn test_column_parse_and_display() {
        assert_eq!(Column::from_str("URL").unwrap(), Column::Url);
        assert_eq!(Column::from_str("item").unwrap(), Column::Item);
        assert_eq!(
            Column::from_str("9.5").unwrap(),
            Column::Price(Grade::Grade9_5)
        );
        assert!(Column::from_str("price").is_err());

        let rendered: Vec<String> = Column::all().map(|c| c.to_string()).collect();
        assert_eq!(rendered, HEADERS);
    }
}
