//! Derived views over the roster and attendance records: text tables,
//! per-employee day counts, CSV and PDF exports.

use crate::types::{AttendanceRecord, Employee};
use indexmap::{IndexMap, IndexSet};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CSV_HEADER: &str = "Name,Date,Clock In,Clock Out";
pub const PDF_TITLE: &str = "Icon Security - Monthly Attendance";
pub const CSV_FILE_NAME: &str = "attendance.csv";
pub const PDF_FILE_NAME: &str = "attendance.pdf";

// A4 portrait, positions measured from the top edge in millimetres.
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_X_MM: f32 = 10.0;
const TITLE_Y_MM: f32 = 10.0;
const FIRST_LINE_Y_MM: f32 = 20.0;
const LINE_SPACING_MM: f32 = 10.0;
const BOTTOM_LIMIT_MM: f32 = 287.0;
const FONT_SIZE: f32 = 14.0;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("pdf: {0}")]
    Pdf(#[from] printpdf::Error),
}

/// Number of distinct days an employee appears in the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub name: String,
    pub days: usize,
}

/// Count distinct calendar-day strings per name, in order of first appearance.
///
/// Several shifts on one day count once. With `month = Some((year, month))`
/// only records dated in that month are counted.
pub fn monthly_summary(records: &[AttendanceRecord], month: Option<(i32, u32)>) -> Vec<DaySummary> {
    let mut days: IndexMap<&str, IndexSet<&str>> = IndexMap::new();
    for r in records {
        if let Some(month) = month {
            if !in_month(&r.date, month) {
                continue;
            }
        }
        days.entry(r.name.as_str()).or_default().insert(r.date.as_str());
    }
    days.into_iter()
        .map(|(name, dates)| DaySummary {
            name: name.to_string(),
            days: dates.len(),
        })
        .collect()
}

/// Match an "M/D/YYYY" date string against a (year, month).
fn in_month(date: &str, (year, month): (i32, u32)) -> bool {
    let mut parts = date.split('/');
    let (Some(m), Some(_), Some(y)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    m.trim().parse::<u32>().ok() == Some(month) && y.trim().parse::<i32>().ok() == Some(year)
}

pub fn render_summary(summary: &[DaySummary]) -> String {
    summary
        .iter()
        .map(|s| format!("{}: {} days\n", s.name, s.days))
        .collect()
}

/// Roster table; the index column is the position used by edit and delete.
pub fn render_employee_table(employees: &[Employee]) -> String {
    let rows: Vec<Vec<String>> = employees
        .iter()
        .enumerate()
        .map(|(i, e)| vec![i.to_string(), e.name.clone(), e.company_number.clone(), e.pin.clone()])
        .collect();
    render_table(&["#", "Name", "Company Number", "PIN"], &rows)
}

pub fn render_record_table(records: &[AttendanceRecord]) -> String {
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.date.clone(),
                r.clock_in.clone(),
                r.clock_out.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&["Name", "Date", "Clock In", "Clock Out"], &rows)
}

fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &widths, header.iter().copied());
    for row in rows {
        push_row(&mut out, &widths, row.iter().map(String::as_str));
    }
    out
}

fn push_row<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells
        .zip(widths.iter().copied())
        .map(|(c, w)| format!("{c:<w$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

/// CSV export. Fields are joined with commas as-is; no quoting is applied.
pub fn to_csv(records: &[AttendanceRecord]) -> String {
    let mut csv = String::with_capacity(CSV_HEADER.len() + 1 + records.len() * 40);
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for r in records {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            r.name,
            r.date,
            r.clock_in,
            r.clock_out.as_deref().unwrap_or("")
        ));
    }
    csv
}

fn pdf_line(r: &AttendanceRecord) -> String {
    format!(
        "{} | {} | Clock In: {} | Clock Out: {}",
        r.name,
        r.date,
        r.clock_in,
        r.clock_out.as_deref().unwrap_or("")
    )
}

/// PDF export: title, then one text line per record, continuing onto new
/// pages when a page fills up.
pub fn to_pdf(records: &[AttendanceRecord]) -> Result<Vec<u8>, ReportError> {
    let (doc, page, layer) = PdfDocument::new(
        PDF_TITLE,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Page 1",
    );
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let mut current = doc.get_page(page).get_layer(layer);

    write_line(&current, &font, PDF_TITLE, TITLE_Y_MM);

    let mut y = FIRST_LINE_Y_MM;
    let mut pages = 1;
    for r in records {
        if y > BOTTOM_LIMIT_MM {
            pages += 1;
            let (page, layer) = doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                format!("Page {pages}"),
            );
            current = doc.get_page(page).get_layer(layer);
            y = TITLE_Y_MM;
        }
        write_line(&current, &font, &pdf_line(r), y);
        y += LINE_SPACING_MM;
    }

    tracing::debug!(records = records.len(), pages, "rendered attendance pdf");
    Ok(doc.save_to_bytes()?)
}

fn write_line(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str, y_from_top: f32) {
    layer.use_text(
        text,
        FONT_SIZE,
        Mm(MARGIN_X_MM),
        Mm(PAGE_HEIGHT_MM - y_from_top),
        font,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, date: &str, clock_in: &str, clock_out: Option<&str>) -> AttendanceRecord {
        AttendanceRecord {
            name: name.into(),
            date: date.into(),
            clock_in: clock_in.into(),
            clock_out: clock_out.map(str::to_string),
        }
    }

    #[test]
    fn test_csv_single_record() {
        let records = [rec("Eve", "1/1/2024", "9:00:00 AM", Some("5:00:00 PM"))];
        assert_eq!(
            to_csv(&records),
            "Name,Date,Clock In,Clock Out\nEve,1/1/2024,9:00:00 AM,5:00:00 PM\n"
        );
    }

    #[test]
    fn test_csv_open_record_and_no_escaping() {
        let records = [rec("Doe, John", "1/2/2024", "8:00:00 AM", None)];
        let csv = to_csv(&records);
        assert_eq!(csv.lines().nth(1), Some("Doe, John,1/2/2024,8:00:00 AM,"));
    }

    #[test]
    fn test_csv_empty() {
        assert_eq!(to_csv(&[]), "Name,Date,Clock In,Clock Out\n");
    }

    #[test]
    fn test_summary_counts_distinct_days_not_shifts() {
        let records = [
            rec("Alice", "1/1/2024", "9:00:00 AM", Some("12:00:00 PM")),
            rec("Alice", "1/1/2024", "1:00:00 PM", Some("5:00:00 PM")),
            rec("Bob", "1/1/2024", "9:00:00 AM", None),
            rec("Alice", "1/2/2024", "9:00:00 AM", None),
        ];
        let summary = monthly_summary(&records, None);
        assert_eq!(
            summary,
            vec![
                DaySummary { name: "Alice".into(), days: 2 },
                DaySummary { name: "Bob".into(), days: 1 },
            ]
        );
    }

    #[test]
    fn test_summary_month_filter() {
        let records = [
            rec("Alice", "1/31/2024", "9:00:00 AM", None),
            rec("Alice", "2/1/2024", "9:00:00 AM", None),
            rec("Alice", "2/2/2024", "9:00:00 AM", None),
            rec("Bob", "2/1/2023", "9:00:00 AM", None),
        ];
        let summary = monthly_summary(&records, Some((2024, 2)));
        assert_eq!(summary, vec![DaySummary { name: "Alice".into(), days: 2 }]);
    }

    #[test]
    fn test_render_summary() {
        let summary = vec![DaySummary { name: "Alice".into(), days: 3 }];
        assert_eq!(render_summary(&summary), "Alice: 3 days\n");
    }

    #[test]
    fn test_render_employee_table_aligns_columns() {
        let employees = [
            Employee { name: "Alice".into(), pin: "1234".into(), company_number: "C1".into() },
            Employee { name: "Bo".into(), pin: "0001".into(), company_number: "C200".into() },
        ];
        let table = render_employee_table(&employees);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "#  Name   Company Number  PIN");
        assert_eq!(lines[1], "0  Alice  C1              1234");
        assert_eq!(lines[2], "1  Bo     C200            0001");
    }

    #[test]
    fn test_render_record_table_open_record() {
        let table = render_record_table(&[rec("Eve", "1/1/2024", "9:00:00 AM", None)]);
        assert_eq!(table.lines().nth(1), Some("Eve   1/1/2024  9:00:00 AM"));
    }

    #[test]
    fn test_pdf_is_produced() {
        let records = [rec("Eve", "1/1/2024", "9:00:00 AM", Some("5:00:00 PM"))];
        let bytes = to_pdf(&records).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_pdf_overflows_onto_more_pages() {
        let records: Vec<AttendanceRecord> = (0..60)
            .map(|i| rec(&format!("E{i}"), "1/1/2024", "9:00:00 AM", None))
            .collect();
        // 27 lines fit under the title on page 1, 28 on each later page.
        assert_eq!(page_count(&to_pdf(&records[..1]).unwrap()), 1);
        assert_eq!(page_count(&to_pdf(&records[..27]).unwrap()), 1);
        assert_eq!(page_count(&to_pdf(&records[..28]).unwrap()), 2);
        assert_eq!(page_count(&to_pdf(&records).unwrap()), 3);
    }

    /// Count `/Type /Page` objects, excluding the `/Type /Pages` tree node.
    fn page_count(pdf: &[u8]) -> usize {
        let text = String::from_utf8_lossy(pdf).replace("/Type /Page", "/Type/Page");
        text.matches("/Type/Page").count() - text.matches("/Type/Pages").count()
    }

    #[test]
    fn test_pdf_line_format() {
        let line = pdf_line(&rec("Eve", "1/1/2024", "9:00:00 AM", Some("5:00:00 PM")));
        assert_eq!(line, "Eve | 1/1/2024 | Clock In: 9:00:00 AM | Clock Out: 5:00:00 PM");
    }
}
