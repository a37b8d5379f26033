//! Result page parsing.
//!
//! The portal renders three states after a search is submitted: a results
//! table, a "No records found" banner, or the captcha form again when the
//! solution was rejected. Parsing works on the page HTML so it can be unit
//! tested against fixtures without a browser.

use gstmap_core::{Gstin, GstinDetails, GstinSummary};
use scraper::{ElementRef, Html, Selector};

/// Banner text the portal shows for an empty result set.
pub const NO_RECORDS_MARKER: &str = "No records found";

/// Classified lookup result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsPage {
    /// A results table with one row per registration.
    Results(Vec<GstinSummary>),
    /// The empty-result banner.
    NoRecords,
    /// Still on the captcha form; the solution was rejected.
    CaptchaPending,
    /// None of the known states; treat as a transient portal hiccup.
    Unrecognized,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Classify the page a PAN search lands on.
#[must_use]
pub fn classify_lookup_page(html: &str) -> ResultsPage {
    if html.contains(NO_RECORDS_MARKER) {
        return ResultsPage::NoRecords;
    }

    let document = Html::parse_document(html);
    let rows = selector("table.table tbody tr");
    let cells = selector("td");

    let mut summaries = Vec::new();
    for row in document.select(&rows) {
        let cells: Vec<ElementRef<'_>> = row.select(&cells).collect();
        // Result rows carry serial, GSTIN, status and state columns
        if cells.len() < 4 {
            continue;
        }
        let raw_gstin = cell_text(cells[1]);
        let gstin = match Gstin::parse(&raw_gstin) {
            Ok(gstin) => gstin,
            Err(_) => {
                tracing::warn!("Skipping result row with malformed GSTIN '{}'", raw_gstin);
                continue;
            }
        };
        summaries.push(GstinSummary {
            gstin,
            status: cell_text(cells[2]),
            state: cell_text(cells[3]),
        });
    }

    if !summaries.is_empty() {
        return ResultsPage::Results(summaries);
    }

    if has_captcha_form(html) {
        return ResultsPage::CaptchaPending;
    }

    ResultsPage::Unrecognized
}

/// Whether the captcha entry form is present on the page.
#[must_use]
pub fn has_captcha_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    document.select(&selector("#fo-captcha")).next().is_some()
}

/// Extract detail attributes from a GSTIN detail page.
///
/// Returns `None` when the portal reported no record for the GSTIN. Fields
/// render independently, so any subset may come back empty.
#[must_use]
pub fn parse_detail_page(html: &str) -> Option<GstinDetails> {
    if html.contains(NO_RECORDS_MARKER) {
        return None;
    }

    let document = Html::parse_document(html);

    let mut details = GstinDetails {
        trade_name: labeled_cell_value(&document, "Trade Name"),
        registration_date: labeled_cell_value(&document, "Date of Registration"),
        hsn_codes: Vec::new(),
    };

    for value in labeled_cell_values(&document, "HSN") {
        for code in value.split(',') {
            let code = code.trim().to_string();
            if !code.is_empty() && !details.hsn_codes.contains(&code) {
                details.hsn_codes.push(code);
            }
        }
    }

    Some(details)
}

/// The text of the cell following the first cell containing `label`.
fn labeled_cell_value(document: &Html, label: &str) -> Option<String> {
    labeled_cell_values(document, label).into_iter().next()
}

/// The texts of cells following every cell containing `label`.
fn labeled_cell_values(document: &Html, label: &str) -> Vec<String> {
    let cells = selector("td");
    let mut values = Vec::new();
    for cell in document.select(&cells) {
        if !cell_text(cell).contains(label) {
            continue;
        }
        if let Some(next) = cell.next_siblings().filter_map(ElementRef::wrap).next() {
            let value = cell_text(next);
            if !value.is_empty() {
                values.push(value);
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_HTML: &str = r#"
        <html><body>
        <table class="table tbl inv exp table-bordered ng-table">
          <thead><tr><th>S.No</th><th>GSTIN/UIN</th><th>GSTIN / UIN Status</th><th>State</th></tr></thead>
          <tbody>
            <tr><td>1</td><td>27AAACA1234F1Z5</td><td>Active</td><td>Maharashtra</td></tr>
            <tr><td>2</td><td>07AAACA1234F1Z6</td><td>Cancelled</td><td>Delhi</td></tr>
            <tr><td>3</td><td>BADGSTIN</td><td>Active</td><td>Goa</td></tr>
          </tbody>
        </table>
        </body></html>
    "#;

    const NO_RECORDS_HTML: &str = r"
        <html><body><div class='alert'>No records found</div></body></html>
    ";

    const CAPTCHA_HTML: &str = r#"
        <html><body>
        <img id="imgCaptcha" src="/captcha"/>
        <input id="fo-captcha" type="text"/>
        </body></html>
    "#;

    const DETAIL_HTML: &str = r#"
        <html><body>
        <table class="table">
          <tr><td>Legal Name of Business</td><td>ACME PRIVATE LIMITED</td></tr>
          <tr><td>Trade Name</td><td>ACME</td></tr>
          <tr><td>Date of Registration</td><td>01/07/2017</td></tr>
          <tr><td>HSN Codes</td><td>8471, 8473</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_classify_results_table() {
        let page = classify_lookup_page(RESULTS_HTML);
        let ResultsPage::Results(summaries) = page else {
            panic!("expected results, got {page:?}");
        };
        // The malformed third row is skipped
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].gstin.as_str(), "27AAACA1234F1Z5");
        assert_eq!(summaries[0].status, "Active");
        assert_eq!(summaries[0].state, "Maharashtra");
        assert_eq!(summaries[1].status, "Cancelled");
    }

    #[test]
    fn test_classify_no_records() {
        assert_eq!(classify_lookup_page(NO_RECORDS_HTML), ResultsPage::NoRecords);
    }

    #[test]
    fn test_classify_captcha_pending() {
        assert_eq!(
            classify_lookup_page(CAPTCHA_HTML),
            ResultsPage::CaptchaPending
        );
    }

    #[test]
    fn test_classify_unrecognized() {
        assert_eq!(
            classify_lookup_page("<html><body><p>maintenance</p></body></html>"),
            ResultsPage::Unrecognized
        );
    }

    #[test]
    fn test_parse_detail_page() {
        let details = parse_detail_page(DETAIL_HTML).expect("detail page");
        assert_eq!(details.trade_name.as_deref(), Some("ACME"));
        assert_eq!(details.registration_date.as_deref(), Some("01/07/2017"));
        assert_eq!(details.hsn_codes, vec!["8471", "8473"]);
    }

    #[test]
    fn test_parse_detail_page_not_found() {
        assert!(parse_detail_page(NO_RECORDS_HTML).is_none());
    }

    #[test]
    fn test_parse_detail_page_partial_fields() {
        let html = r"<html><body><table>
            <tr><td>Trade Name</td><td>ACME</td></tr>
        </table></body></html>";
        let details = parse_detail_page(html).expect("detail page");
        assert_eq!(details.trade_name.as_deref(), Some("ACME"));
        assert!(details.registration_date.is_none());
        assert!(details.hsn_codes.is_empty());
    }

    #[test]
    fn test_has_captcha_form() {
        assert!(has_captcha_form(CAPTCHA_HTML));
        assert!(!has_captcha_form(RESULTS_HTML));
    }
}
