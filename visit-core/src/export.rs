use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;

use crate::models::Visit;
use crate::resolver::Resolver;

/// Column headers of the visit report, in output order
pub const REPORT_HEADERS: [&str; 9] = [
    "Visit Date",
    "Company",
    "Company Type",
    "Customer",
    "Action Type",
    "Status",
    "Notes",
    "Next Follow-up",
    "Recorded Date",
];

/// US-style short date, e.g. 3/7/2024 is written 03/07/2024
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// One rendered line of the visit report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub visit_date: String,
    pub company: String,
    pub company_type: String,
    pub customer: String,
    pub action_type: String,
    pub status: String,
    pub notes: String,
    pub next_follow_up: String,
    pub recorded_date: String,
}

impl ReportRow {
    pub fn fields(&self) -> [&str; 9] {
        [
            &self.visit_date,
            &self.company,
            &self.company_type,
            &self.customer,
            &self.action_type,
            &self.status,
            &self.notes,
            &self.next_follow_up,
            &self.recorded_date,
        ]
    }
}

/// Turns visits into report rows and CSV text
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    date_format: String,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMAT)
    }
}

impl ReportFormatter {
    pub fn new(date_format: &str) -> Self {
        Self {
            date_format: date_format.to_string(),
        }
    }

    fn date(&self, date: NaiveDate) -> String {
        date.format(&self.date_format).to_string()
    }

    pub fn row(&self, visit: &Visit, resolver: &Resolver<'_>) -> ReportRow {
        ReportRow {
            visit_date: self.date(visit.visit_date),
            company: resolver.company_name(&visit.company_id).to_string(),
            company_type: resolver.company_type(&visit.company_id).to_string(),
            customer: resolver.customer_name(&visit.customer_id).to_string(),
            action_type: visit.action_type.label().to_string(),
            status: visit.status.to_string(),
            notes: visit.notes.clone().unwrap_or_default(),
            next_follow_up: visit.next_follow_up.map(|d| self.date(d)).unwrap_or_default(),
            recorded_date: self.date(visit.created_at.date_naive()),
        }
    }

    /// Renders rows for visits already filtered and sorted by the caller
    pub fn rows(&self, visits: &[&Visit], resolver: &Resolver<'_>) -> Vec<ReportRow> {
        visits.iter().map(|v| self.row(v, resolver)).collect()
    }

    /// Full CSV document: header line, then one line per visit
    pub fn to_csv(&self, visits: &[&Visit], resolver: &Resolver<'_>) -> String {
        rows_to_csv(&self.rows(visits, resolver))
    }
}

/// Wraps a field in double quotes, doubling any embedded quote
pub fn quote_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn csv_line<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .map(quote_field)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn rows_to_csv(rows: &[ReportRow]) -> String {
    std::iter::once(csv_line(REPORT_HEADERS))
        .chain(rows.iter().map(|r| csv_line(r.fields())))
        .collect::<Vec<_>>()
        .join("\n")
}

/// File name for a report generated on `today`
pub fn report_file_name(today: NaiveDate) -> String {
    format!("visit-report-{}.csv", today.format("%Y-%m-%d"))
}

/// Writes a rendered report to disk
pub fn write_report(csv: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output_path, csv)
        .with_context(|| format!("Failed to write report to {:?}", output_path))?;
    log::info!("Wrote visit report to {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionType, Company, CompanyType, Customer, VisitStatus};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> (Vec<Company>, Vec<Customer>, Visit) {
        let acme = Company::new("u1", "Acme".into(), CompanyType::Food);
        let jane = Customer::new("u1", "Jane".into(), acme.id);
        let mut visit = Visit::new("u1", acme.id, jane.id, ActionType::SendQuotation, date(2024, 3, 7));
        visit.status = VisitStatus::Pending;
        visit.next_follow_up = Some(date(2024, 3, 14));
        visit.created_at = Utc.with_ymd_and_hms(2024, 3, 6, 15, 30, 0).unwrap();
        (vec![acme], vec![jane], visit)
    }

    #[test]
    fn test_row_layout() {
        let (companies, customers, visit) = sample();
        let resolver = Resolver::new(&companies, &customers);
        let row = ReportFormatter::default().row(&visit, &resolver);

        assert_eq!(
            row.fields(),
            [
                "03/07/2024",
                "Acme",
                "Food",
                "Jane",
                "Send Quotation",
                "pending",
                "",
                "03/14/2024",
                "03/06/2024",
            ]
        );
    }

    #[test]
    fn test_csv_quotes_every_field_and_doubles_quotes() {
        let (companies, customers, mut visit) = sample();
        visit.notes = Some("Asked for \"best price\", urgent".into());
        let resolver = Resolver::new(&companies, &customers);

        let csv = ReportFormatter::new("%Y-%m-%d").to_csv(&[&visit], &resolver);
        let lines: Vec<&str> = csv.split('\n').collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("\"Visit Date\",\"Company\","));
        assert_eq!(
            lines[1],
            "\"2024-03-07\",\"Acme\",\"Food\",\"Jane\",\"Send Quotation\",\"pending\",\
             \"Asked for \"\"best price\"\", urgent\",\"2024-03-14\",\"2024-03-06\""
        );
    }

    #[test]
    fn test_dangling_company_still_exports() {
        let (_, customers, mut visit) = sample();
        visit.company_id = Uuid::new_v4();
        let resolver = Resolver::new(&[], &customers);

        let rows = ReportFormatter::default().rows(&[&visit], &resolver);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].company, "Unknown Company");
        assert_eq!(rows[0].company_type, "Unknown Type");
    }

    #[test]
    fn test_empty_report_is_header_only() {
        let csv = rows_to_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn test_output_is_deterministic() {
        let (companies, customers, visit) = sample();
        let resolver = Resolver::new(&companies, &customers);
        let f = ReportFormatter::default();
        assert_eq!(f.to_csv(&[&visit], &resolver), f.to_csv(&[&visit], &resolver));
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(report_file_name(date(2024, 7, 1)), "visit-report-2024-07-01.csv");
    }

    #[test]
    fn test_write_report() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("reports").join("out.csv");
        write_report("\"a\"", &path)?;
        assert_eq!(fs::read_to_string(&path)?, "\"a\"");
        Ok(())
    }
}
