use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::types::{Grade, GradePrices, HEADERS, PriceRecord};

use calamine::{Data, Range, Reader, Xlsx, XlsxError, open_workbook};
use regex::Regex;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

const URL_COLUMN: u32 = 7;

// Only amounts that read back identically through the `0.00` format become number cells.
static RE_CURRENCY_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+\.\d{2}$").expect("invalid regex: currency amount"));

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },
    #[error("Failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error("Permission denied. Close the file and try again.")]
    Locked(PathBuf),
}

#[derive(Debug)]
enum SheetSlot {
    /// The price sheet. `original` holds its cells as last read from disk.
    Prices { original: Option<Range<Data>> },
    Other { name: String, range: Range<Data> },
}

/// The workbook holding the price table, kept in memory between open and save.
///
/// Sheets other than the price sheet are carried through unchanged (values only).
/// On the price sheet, records keep their original rows and cells right of the
/// URL column are written back as they were.
#[derive(Debug)]
pub struct PriceBook {
    path: PathBuf,
    sheet_name: String,
    sheets: Vec<SheetSlot>,
    records: Vec<PriceRecord>,
    rows: Vec<u32>,
    next_row: u32,
}

impl PriceBook {
    pub fn open_or_create(
        path: impl AsRef<Path>,
        sheet_name: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let sheet_name = sheet_name.into();

        if !path.exists() {
            log::info!("Creating new workbook {}", path.display());
            return Ok(Self {
                path,
                sheet_name,
                sheets: vec![SheetSlot::Prices { original: None }],
                records: Vec::new(),
                rows: Vec::new(),
                next_row: 1,
            });
        }

        let read_err = |source| StoreError::Read {
            path: path.clone(),
            source,
        };

        let mut workbook: Xlsx<_> = open_workbook(&path).map_err(read_err)?;
        let mut sheets = Vec::new();
        let mut loaded = None;

        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name).map_err(read_err)?;
            if name == sheet_name {
                let next_row = range.end().map_or(1, |(last_row, _)| last_row + 1);
                loaded = Some((read_records(&range), next_row));
                sheets.push(SheetSlot::Prices {
                    original: Some(range),
                });
            } else {
                sheets.push(SheetSlot::Other { name, range });
            }
        }

        let (rows_and_records, next_row) = loaded.unwrap_or_else(|| {
            log::info!(
                "Sheet '{}' not found in {}, creating it",
                sheet_name,
                path.display()
            );
            sheets.push(SheetSlot::Prices { original: None });
            (Vec::new(), 1)
        });
        let (rows, records): (Vec<u32>, Vec<PriceRecord>) = rows_and_records.into_iter().unzip();

        log::debug!("Loaded {} record(s) from {}", records.len(), path.display());

        Ok(Self {
            path,
            sheet_name,
            sheets,
            records,
            rows,
            next_row,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [PriceRecord] {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<PriceRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.records.iter().any(|r| r.url == url)
    }

    /// Adds a row below the last used row of the sheet.
    pub fn append(&mut self, record: PriceRecord) {
        self.records.push(record);
        self.rows.push(self.next_row);
        self.next_row += 1;
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let mut workbook = Workbook::new();

        for slot in &self.sheets {
            let worksheet = workbook.add_worksheet();
            match slot {
                SheetSlot::Prices { original } => {
                    worksheet.set_name(&self.sheet_name)?;
                    if let Some(range) = original {
                        write_range(worksheet, range, |_, col| col > URL_COLUMN as u16)?;
                    }
                    write_records(worksheet, &self.rows, &self.records)?;
                }
                SheetSlot::Other { name, range } => {
                    worksheet.set_name(name)?;
                    write_range(worksheet, range, |_, _| true)?;
                }
            }
        }

        workbook
            .save(&self.path)
            .map_err(|e| save_error(&self.path, e))?;

        log::info!(
            "Saved {} record(s) to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn save_error(path: &Path, err: rust_xlsxwriter::XlsxError) -> StoreError {
    match err {
        rust_xlsxwriter::XlsxError::IoError(io_err) if is_locked(&io_err) => {
            log::error!("Cannot write {}: {}", path.display(), io_err);
            StoreError::Locked(path.to_path_buf())
        }
        other => StoreError::Write(other),
    }
}

fn is_locked(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy
    )
}

fn cell_text(cell: Option<&Data>) -> Option<String> {
    match cell? {
        Data::Empty => None,
        Data::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        other => Some(other.to_string()),
    }
}

fn price_text(cell: Option<&Data>) -> Option<String> {
    match cell? {
        Data::Float(f) => Some(format!("{f:.2}")),
        Data::Int(i) => Some(format!("{:.2}", *i as f64)),
        other => cell_text(Some(other)),
    }
}

/// Reads data rows with their sheet row numbers. Row 0 holds the headers.
fn read_records(range: &Range<Data>) -> Vec<(u32, PriceRecord)> {
    let Some((last_row, _)) = range.end() else {
        return Vec::new();
    };

    (1..=last_row)
        .filter_map(|row| {
            let cell = |col: u32| range.get_value((row, col));

            let prices = Grade::ALL
                .into_iter()
                .map(|grade| (grade, price_text(cell(grade.index() as u32 + 1))))
                .collect::<GradePrices>();
            let item = cell_text(cell(0));
            let url = cell_text(cell(URL_COLUMN));

            if item.is_none() && url.is_none() && !prices.has_any() {
                return None;
            }

            Some((
                row,
                PriceRecord {
                    item: item.unwrap_or_default(),
                    prices,
                    url: url.unwrap_or_default(),
                },
            ))
        })
        .collect()
}

fn write_records(
    worksheet: &mut Worksheet,
    rows: &[u32],
    records: &[PriceRecord],
) -> Result<(), rust_xlsxwriter::XlsxError> {
    let header_format = Format::new().set_bold();
    let price_format = Format::new().set_num_format("0.00");

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }
    worksheet.set_column_width(0, 32)?;
    for grade in Grade::ALL {
        worksheet.set_column_width(grade.index() as u16 + 1, 12)?;
    }
    worksheet.set_column_width(URL_COLUMN as u16, 60)?;

    for (&row, record) in rows.iter().zip(records) {
        if !record.item.is_empty() {
            worksheet.write_string(row, 0, &record.item)?;
        }

        for (grade, price) in record.prices.iter() {
            let col = grade.index() as u16 + 1;
            match price {
                Some(p) if RE_CURRENCY_AMOUNT.is_match(p) => match p.parse::<f64>() {
                    Ok(n) => {
                        worksheet.write_number_with_format(row, col, n, &price_format)?;
                    }
                    Err(_) => {
                        worksheet.write_string(row, col, p)?;
                    }
                },
                Some(p) => {
                    worksheet.write_string(row, col, p)?;
                }
                None => {}
            }
        }

        if !record.url.is_empty() {
            worksheet.write_string(row, URL_COLUMN as u16, &record.url)?;
        }
    }

    Ok(())
}

fn write_range<F>(
    worksheet: &mut Worksheet,
    range: &Range<Data>,
    keep: F,
) -> Result<(), rust_xlsxwriter::XlsxError>
where
    F: Fn(u32, u16) -> bool,
{
    let Some((start_row, start_col)) = range.start() else {
        return Ok(());
    };

    for (rel_row, rel_col, cell) in range.used_cells() {
        let row = start_row + rel_row as u32;
        let col = (start_col as usize + rel_col) as u16;
        if !keep(row, col) {
            continue;
        }

        match cell {
            Data::Empty => {}
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                worksheet.write_string(row, col, s)?;
            }
            Data::Float(f) => {
                worksheet.write_number(row, col, *f)?;
            }
            Data::Int(i) => {
                worksheet.write_number(row, col, *i as f64)?;
            }
            Data::Bool(b) => {
                worksheet.write_boolean(row, col, *b)?;
            }
            Data::DateTime(dt) => {
                worksheet.write_number(row, col, dt.as_f64())?;
            }
            Data::Error(e) => {
                worksheet.write_string(row, col, e.to_string())?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tmp_path(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("pricedex_store_{}", name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir.join("scraped_prices.xlsx")
    }

    fn record(item: &str, ungraded: &str, url: &str) -> PriceRecord {
        let mut prices = GradePrices::default();
        prices.set(Grade::Ungraded, Some(ungraded.to_string()));
        prices.set(Grade::Grade9_5, Some("-".to_string()));
        PriceRecord {
            item: item.to_string(),
            prices,
            url: url.to_string(),
        }
    }

    #[test]
    fn test_open_missing_file_starts_empty() {
        let path = tmp_path("missing");

        let book = PriceBook::open_or_create(&path, "Scraped Data").unwrap();

        assert!(book.is_empty());
        assert_eq!(book.sheet_name(), "Scraped Data");
        assert!(!path.exists(), "Opening must not write the file");
    }

    #[test]
    fn test_save_writes_header_and_rows() {
        let path = tmp_path("header");

        let mut book = PriceBook::open_or_create(&path, "Scraped Data").unwrap();
        book.append(record("Charizard #4", "312.50", "https://example.com/charizard"));
        book.append(record("Pikachu #58", "4.10", "https://example.com/pikachu"));
        book.save().unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Scraped Data".to_string()]);
        let range = workbook.worksheet_range("Scraped Data").unwrap();

        let header: Vec<String> = (0..8)
            .map(|c| range.get_value((0, c)).unwrap().to_string())
            .collect();
        assert_eq!(header, HEADERS);
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(312.5)));
        assert_eq!(
            range.get_value((2, 7)),
            Some(&Data::String("https://example.com/pikachu".to_string()))
        );

        let reopened = PriceBook::open_or_create(&path, "Scraped Data").unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.records()[0].item, "Charizard #4");
        assert_eq!(reopened.records()[0].prices.get(Grade::Ungraded), Some("312.50"));
        assert_eq!(reopened.records()[0].prices.get(Grade::Grade9_5), Some("-"));
        assert_eq!(reopened.records()[0].prices.get(Grade::Grade10), None);
        assert!(reopened.contains_url("https://example.com/pikachu"));
        assert!(!reopened.contains_url("https://example.com/pikachu/"));
    }

    #[test]
    fn test_missing_sheet_is_added_and_other_sheets_kept() {
        let path = tmp_path("other_sheets");

        let mut workbook = Workbook::new();
        let notes = workbook.add_worksheet();
        notes.set_name("Notes").unwrap();
        notes.write_string(0, 0, "wishlist").unwrap();
        notes.write_number(1, 2, 42.0).unwrap();
        workbook.save(&path).unwrap();

        let mut book = PriceBook::open_or_create(&path, "Scraped Data").unwrap();
        assert!(book.is_empty());
        book.append(record("Mew #8", "99.00", "https://example.com/mew"));
        book.save().unwrap();

        let mut reread: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(
            reread.sheet_names(),
            vec!["Notes".to_string(), "Scraped Data".to_string()]
        );
        let notes = reread.worksheet_range("Notes").unwrap();
        assert_eq!(
            notes.get_value((0, 0)),
            Some(&Data::String("wishlist".to_string()))
        );
        assert_eq!(notes.get_value((1, 2)), Some(&Data::Float(42.0)));
    }

    #[test]
    fn test_short_and_blank_rows() {
        let path = tmp_path("short_rows");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Scraped Data").unwrap();
        for (col, header) in HEADERS.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_string(1, 0, "Only a name").unwrap();
        sheet.write_string(3, 0, "Full row").unwrap();
        sheet.write_string(3, 7, "https://example.com/full").unwrap();
        workbook.save(&path).unwrap();

        let book = PriceBook::open_or_create(&path, "Scraped Data").unwrap();

        assert_eq!(book.len(), 2);
        assert_eq!(book.records()[0].item, "Only a name");
        assert_eq!(book.records()[0].url, "");
        assert!(!book.records()[0].prices.has_any());
        assert_eq!(book.records()[1].url, "https://example.com/full");
    }

    #[test]
    fn test_price_sheet_keeps_extra_columns_and_row_positions() {
        let path = tmp_path("extra_columns");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Scraped Data").unwrap();
        for (col, header) in HEADERS.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_string(0, 8, "Notes").unwrap();
        sheet.write_string(1, 0, "Charizard #4").unwrap();
        sheet.write_string(1, 7, "https://example.com/charizard").unwrap();
        sheet.write_string(1, 8, "first edition").unwrap();
        sheet.write_string(3, 0, "Mew #8").unwrap();
        sheet.write_string(3, 7, "https://example.com/mew").unwrap();
        sheet.write_number(3, 9, 3.0).unwrap();
        workbook.save(&path).unwrap();

        let mut book = PriceBook::open_or_create(&path, "Scraped Data").unwrap();
        assert_eq!(book.len(), 2);
        book.records_mut()[0].item = "Charizard #4 Holo".to_string();
        book.append(record("Pikachu #58", "4.10", "https://example.com/pikachu"));
        book.save().unwrap();

        let mut reread: Xlsx<_> = open_workbook(&path).unwrap();
        let range = reread.worksheet_range("Scraped Data").unwrap();
        let text = |row, col| range.get_value((row, col)).map(|d: &Data| d.to_string());

        assert_eq!(text(0, 8).as_deref(), Some("Notes"));
        assert_eq!(text(1, 0).as_deref(), Some("Charizard #4 Holo"));
        assert_eq!(text(1, 8).as_deref(), Some("first edition"));
        assert_eq!(range.get_value((2, 0)), Some(&Data::Empty));
        assert_eq!(text(3, 0).as_deref(), Some("Mew #8"));
        assert_eq!(range.get_value((3, 9)), Some(&Data::Float(3.0)));
        assert_eq!(text(4, 0).as_deref(), Some("Pikachu #58"));
        assert_eq!(text(4, 7).as_deref(), Some("https://example.com/pikachu"));
    }

    #[test]
    fn test_prices_without_two_decimals_are_kept_as_text() {
        let path = tmp_path("precision");

        let mut prices = GradePrices::default();
        prices.set(Grade::Ungraded, Some("7".to_string()));
        prices.set(Grade::Grade7, Some("0.125".to_string()));
        prices.set(Grade::Grade8, Some("12.50".to_string()));
        let mut book = PriceBook::open_or_create(&path, "Scraped Data").unwrap();
        book.append(PriceRecord {
            item: "Eevee #51".to_string(),
            prices: prices.clone(),
            url: "https://example.com/eevee".to_string(),
        });
        book.save().unwrap();

        let reopened = PriceBook::open_or_create(&path, "Scraped Data").unwrap();

        assert_eq!(reopened.records()[0].prices, prices);
    }

    #[test]
    fn test_is_locked_error_kinds() {
        assert!(is_locked(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(is_locked(&io::Error::from(io::ErrorKind::ResourceBusy)));
        assert!(!is_locked(&io::Error::from(io::ErrorKind::NotFound)));
    }

    #[test]
    fn test_save_error_maps_permission_denied_to_locked() {
        let path = Path::new("scraped_prices.xlsx");

        let locked = save_error(
            path,
            rust_xlsxwriter::XlsxError::IoError(io::Error::from(io::ErrorKind::PermissionDenied)),
        );
        assert!(matches!(locked, StoreError::Locked(ref p) if p == path));
        assert_eq!(
            locked.to_string(),
            "Permission denied. Close the file and try again."
        );

        let other = save_error(
            path,
            rust_xlsxwriter::XlsxError::IoError(io::Error::from(io::ErrorKind::NotFound)),
        );
        assert!(matches!(other, StoreError::Write(_)));
    }

    #[test]
    fn test_save_into_missing_directory_is_a_write_error() {
        let dir = tmp_path("not_a_dir").with_file_name("blocker");
        fs::write(&dir, b"plain file").unwrap();

        let mut book = PriceBook::open_or_create(dir.join("prices.xlsx"), "Scraped Data").unwrap();
        book.append(record("Mew #8", "99.00", "https://example.com/mew"));
        let result = book.save();

        assert!(matches!(result, Err(StoreError::Write(_))));
    }
}
