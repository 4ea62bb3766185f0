//! Bulk company import from delimited text
//!
//! The first non-blank line is the header. Each header cell is mapped to a
//! company field by keyword (checked in this order): "name", "type",
//! "address", "phone", then "company" as a fallback for the name. When
//! several columns map to the same field the first one wins.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::forms::CompanyDraft;
use crate::validation::{sanitize_input, validate_company_name, validate_phone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportField {
    Name,
    Type,
    Address,
    Phone,
}

fn field_for_header(header: &str) -> Option<ImportField> {
    let h = header.trim().to_lowercase();
    if h.contains("name") {
        Some(ImportField::Name)
    } else if h.contains("type") {
        Some(ImportField::Type)
    } else if h.contains("address") {
        Some(ImportField::Address)
    } else if h.contains("phone") {
        Some(ImportField::Phone)
    } else if h.contains("company") {
        Some(ImportField::Name)
    } else {
        None
    }
}

/// Column index for each field
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ColumnMap {
    name: Option<usize>,
    company_type: Option<usize>,
    address: Option<usize>,
    phone: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Self {
        let mut map = ColumnMap::default();
        for (index, header) in headers.iter().enumerate() {
            let slot = match field_for_header(header) {
                Some(ImportField::Name) => &mut map.name,
                Some(ImportField::Type) => &mut map.company_type,
                Some(ImportField::Address) => &mut map.address,
                Some(ImportField::Phone) => &mut map.phone,
                None => continue,
            };
            if slot.is_none() {
                *slot = Some(index);
            }
        }
        map
    }
}

/// A company row accepted by the importer, already sanitized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedCompany {
    pub name: String,
    pub company_type: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl ImportedCompany {
    pub fn to_draft(&self) -> CompanyDraft {
        CompanyDraft {
            name: self.name.clone(),
            company_type: self.company_type.clone(),
            address: self.address.clone().unwrap_or_default(),
            phone: self.phone.clone().unwrap_or_default(),
            logo: String::new(),
        }
    }
}

/// A row the importer dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the source text
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub companies: Vec<ImportedCompany>,
    pub skipped: Vec<SkippedRow>,
}

impl ImportOutcome {
    pub fn summary(&self) -> String {
        format!(
            "{} compan{} ready to import, {} row{} skipped",
            self.companies.len(),
            if self.companies.len() == 1 { "y" } else { "ies" },
            self.skipped.len(),
            if self.skipped.len() == 1 { "" } else { "s" },
        )
    }
}

/// Splits one line into fields. Fields may be wrapped in double quotes,
/// in which case commas are literal and `""` stands for one quote.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

fn cell(values: &[String], column: Option<usize>) -> &str {
    column
        .and_then(|i| values.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parses company rows out of CSV text.
///
/// Never fails: rows that cannot be used are reported in
/// [`ImportOutcome::skipped`].
pub fn parse_companies_csv(text: &str) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header_line)) = lines.next() else {
        return outcome;
    };
    let columns = ColumnMap::from_headers(&split_line(header_line));
    log::debug!("Import column map: {:?}", columns);

    for (line_no, line) in lines {
        let values = split_line(line);
        let name = sanitize_input(cell(&values, columns.name));
        let company_type = sanitize_input(cell(&values, columns.company_type));

        if name.is_empty() || company_type.is_empty() {
            outcome.skipped.push(SkippedRow {
                line: line_no,
                reason: "missing company name or type".to_string(),
            });
            continue;
        }

        let name = match validate_company_name(&name).into_result("name") {
            Ok(name) => name,
            Err(e) => {
                outcome.skipped.push(SkippedRow {
                    line: line_no,
                    reason: e.message,
                });
                continue;
            }
        };

        let phone = sanitize_input(cell(&values, columns.phone));
        if !validate_phone(&phone) {
            outcome.skipped.push(SkippedRow {
                line: line_no,
                reason: format!("invalid phone number '{}'", phone),
            });
            continue;
        }

        outcome.companies.push(ImportedCompany {
            name,
            company_type,
            address: non_empty(sanitize_input(cell(&values, columns.address))),
            phone: non_empty(phone),
        });
    }

    for skipped in &outcome.skipped {
        log::warn!("Skipping import line {}: {}", skipped.line, skipped.reason);
    }
    outcome
}

/// Reads and parses a CSV file of companies
pub fn read_companies_csv(path: &Path) -> Result<ImportOutcome> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {:?}", path))?;
    Ok(parse_companies_csv(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_row_dropped() {
        let outcome = parse_companies_csv("Company Name,Company Type\nAcme,Tech\n,Retail\n");
        assert_eq!(
            outcome.companies,
            vec![ImportedCompany {
                name: "Acme".into(),
                company_type: "Tech".into(),
                address: None,
                phone: None,
            }]
        );
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].line, 3);
    }

    #[test]
    fn test_header_keywords() {
        let text = "Company,Industry Type,Street Address,Phone Number\n\
                    Globex,Chemical,1 Main St,+1 555 010 9999\n";
        let outcome = parse_companies_csv(text);
        assert_eq!(outcome.companies.len(), 1);
        let c = &outcome.companies[0];
        assert_eq!(c.name, "Globex");
        assert_eq!(c.company_type, "Chemical");
        assert_eq!(c.address.as_deref(), Some("1 Main St"));
        assert_eq!(c.phone.as_deref(), Some("+1 555 010 9999"));
    }

    #[test]
    fn test_first_matching_column_wins() {
        let text = "Name,Contact Name,Type\nAcme,Jane,Food\n";
        let outcome = parse_companies_csv(text);
        assert_eq!(outcome.companies[0].name, "Acme");
    }

    #[test]
    fn test_quoted_fields_and_crlf() {
        let text = "name,type,address\r\n\"Acme, Inc.\",Food,\"Dock \"\"B\"\"\"\r\n";
        let outcome = parse_companies_csv(text);
        assert_eq!(outcome.companies.len(), 1);
        assert_eq!(outcome.companies[0].name, "Acme, Inc.");
        assert_eq!(outcome.companies[0].address.as_deref(), Some("Dock \"B\""));
    }

    #[test]
    fn test_invalid_rows_are_reported() {
        let text = "name,type,phone\nA,Food,\nAcme,Food,123\n<script>,Food,\nGood Co,Food,\n";
        let outcome = parse_companies_csv(text);
        assert_eq!(outcome.companies.len(), 1);
        assert_eq!(outcome.companies[0].name, "Good Co");
        let lines: Vec<usize> = outcome.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
        assert_eq!(outcome.summary(), "1 company ready to import, 3 rows skipped");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_companies_csv(""), ImportOutcome::default());
        assert!(parse_companies_csv("name,type\n\n").companies.is_empty());
    }

    #[test]
    fn test_short_rows_treat_missing_cells_as_empty() {
        let outcome = parse_companies_csv("name,type,address\nAcme,Food\n");
        assert_eq!(outcome.companies.len(), 1);
        assert_eq!(outcome.companies[0].address, None);
    }

    #[test]
    fn test_split_line() {
        assert_eq!(split_line("a, b ,\"c,d\""), vec!["a", "b", "c,d"]);
        assert_eq!(split_line(""), vec![""]);
    }
}
