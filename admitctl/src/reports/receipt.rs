//! Admission receipt rendered as a single A5 PDF page.

use anyhow::Context;
use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use rust_decimal::Decimal;

use super::format_time;
use crate::api::models::incentives::IncentiveStatus;

const PAGE_WIDTH: f32 = 148.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 14.0;
const LINE: f32 = 7.0;

/// Everything printed on a receipt
#[derive(Debug, Clone)]
pub struct ReceiptData {
    pub token_number: String,
    pub student_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub agent_name: String,
    pub agent_code: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub coordinator_name: Option<String>,
    pub coordinator_approved_at: Option<DateTime<Utc>>,
    pub admin_name: Option<String>,
    pub admin_reviewed_at: Option<DateTime<Utc>>,
    pub incentive_amount: Option<Decimal>,
    pub incentive_status: Option<IncentiveStatus>,
    pub coordinator_signed: bool,
    pub admin_signed: bool,
    /// Printed copy for the office rather than the agent
    pub admin_copy: bool,
    pub generated_at: DateTime<Utc>,
}

impl ReceiptData {
    pub fn file_name(&self) -> String {
        if self.admin_copy {
            format!("receipt_{}_admin.pdf", self.token_number)
        } else {
            format!("receipt_{}.pdf", self.token_number)
        }
    }
}

struct Cursor<'a> {
    layer: PdfLayerReference,
    regular: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
    y: f32,
}

impl Cursor<'_> {
    fn heading(&mut self, text: &str, size: f32) {
        self.layer.use_text(text, size, Mm(MARGIN), Mm(self.y), self.bold);
        self.y -= LINE * 1.4;
    }

    fn field(&mut self, label: &str, value: &str) {
        self.layer.use_text(label, 10.0, Mm(MARGIN), Mm(self.y), self.bold);
        self.layer.use_text(value, 10.0, Mm(MARGIN + 44.0), Mm(self.y), self.regular);
        self.y -= LINE;
    }

    fn gap(&mut self) {
        self.y -= LINE * 0.6;
    }
}

fn amount_text(amount: Option<Decimal>) -> String {
    amount.map(|a| format!("Rs. {}", a.round_dp(2))).unwrap_or_else(|| "-".to_string())
}

/// Render the receipt to PDF bytes. Blocking.
pub fn render_receipt(data: &ReceiptData) -> anyhow::Result<Vec<u8>> {
    let title = format!("Admission Receipt {}", data.token_number);
    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Receipt");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("failed to load receipt font")?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("failed to load receipt font")?;

    let mut cursor = Cursor {
        layer: doc.get_page(page).get_layer(layer),
        regular: &regular,
        bold: &bold,
        y: PAGE_HEIGHT - MARGIN - 4.0,
    };

    cursor.heading("ADMISSION RECEIPT", 16.0);
    if data.admin_copy {
        cursor.heading("Office copy", 10.0);
    }
    cursor.field("Token number", &data.token_number);
    cursor.field("Generated", &format_time(Some(data.generated_at)));
    cursor.gap();

    cursor.heading("Student", 12.0);
    cursor.field("Name", &data.student_name);
    cursor.field("Email", &data.email);
    cursor.field("Phone", &data.phone);
    cursor.field("Course", &data.course);
    cursor.field("Submitted", &format_time(Some(data.submitted_at)));
    cursor.gap();

    cursor.heading("Agent", 12.0);
    cursor.field("Name", &data.agent_name);
    cursor.field("Agent ID", data.agent_code.as_deref().unwrap_or("-"));
    cursor.field("Incentive", &amount_text(data.incentive_amount));
    let incentive_status = match data.incentive_status {
        Some(IncentiveStatus::Paid) => "Paid",
        Some(IncentiveStatus::Unpaid) => "Unpaid",
        None => "-",
    };
    cursor.field("Incentive status", incentive_status);
    cursor.gap();

    cursor.heading("Approval", 12.0);
    cursor.field("Coordinator", data.coordinator_name.as_deref().unwrap_or("-"));
    cursor.field("Approved at", &format_time(data.coordinator_approved_at));
    cursor.field("Admin", data.admin_name.as_deref().unwrap_or("-"));
    cursor.field("Reviewed at", &format_time(data.admin_reviewed_at));
    cursor.gap();

    let signed = |on_file: bool| if on_file { "On file" } else { "Not provided" };
    cursor.field("Coordinator signature", signed(data.coordinator_signed));
    cursor.field("Admin signature", signed(data.admin_signed));

    doc.save_to_bytes().context("failed to render receipt PDF")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(admin_copy: bool) -> ReceiptData {
        ReceiptData {
            token_number: "TOK20250301ABCDEF12".to_string(),
            student_name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9876543210".to_string(),
            course: "BSc".to_string(),
            agent_name: "Agent One".to_string(),
            agent_code: Some("AGT001".to_string()),
            submitted_at: Utc::now(),
            coordinator_name: Some("Coord".to_string()),
            coordinator_approved_at: Some(Utc::now()),
            admin_name: None,
            admin_reviewed_at: None,
            incentive_amount: Some(Decimal::from(3000)),
            incentive_status: Some(IncentiveStatus::Unpaid),
            coordinator_signed: true,
            admin_signed: false,
            admin_copy,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_receipt_produces_pdf() {
        let bytes = render_receipt(&receipt(false)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(receipt(false).file_name(), "receipt_TOK20250301ABCDEF12.pdf");
        assert_eq!(receipt(true).file_name(), "receipt_TOK20250301ABCDEF12_admin.pdf");
    }

    #[test]
    fn test_amount_text() {
        assert_eq!(amount_text(Some(Decimal::new(300050, 2))), "Rs. 3000.50");
        assert_eq!(amount_text(None), "-");
    }
}
