//! Excel export of student records with a per-agent summary sheet.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::BTreeMap;

use super::format_time;
use crate::api::models::incentives::IncentiveStatus;
use crate::api::models::students::StudentStatus;

pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// One student row of the export
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub token_number: String,
    pub student_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub status: StudentStatus,
    pub agent_username: String,
    pub agent_name: String,
    pub agent_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub coordinator_approved_at: Option<DateTime<Utc>>,
    pub admin_reviewed_at: Option<DateTime<Utc>>,
    pub incentive_amount: Option<Decimal>,
    pub incentive_status: Option<IncentiveStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentSummaryRow {
    pub agent_username: String,
    pub agent_name: String,
    pub agent_code: Option<String>,
    pub students: u32,
    pub approved: u32,
    pub paid: Decimal,
    pub unpaid: Decimal,
}

/// Per-agent totals over the exported rows, ordered by username
pub fn agent_summary(rows: &[ExportRow]) -> Vec<AgentSummaryRow> {
    let mut by_agent: BTreeMap<&str, AgentSummaryRow> = BTreeMap::new();
    for row in rows {
        let summary = by_agent.entry(&row.agent_username).or_insert_with(|| AgentSummaryRow {
            agent_username: row.agent_username.clone(),
            agent_name: row.agent_name.clone(),
            agent_code: row.agent_code.clone(),
            ..Default::default()
        });
        summary.students += 1;
        if row.status == StudentStatus::Approved {
            summary.approved += 1;
        }
        if let Some(amount) = row.incentive_amount {
            match row.incentive_status {
                Some(IncentiveStatus::Paid) => summary.paid += amount,
                Some(IncentiveStatus::Unpaid) => summary.unpaid += amount,
                None => {}
            }
        }
    }
    by_agent.into_values().collect()
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("students_export_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
}

fn write_header(sheet: &mut Worksheet, columns: &[(&str, f64)], format: &Format) -> anyhow::Result<()> {
    for (col, (title, width)) in columns.iter().enumerate() {
        let col = u16::try_from(col).context("too many columns")?;
        sheet.write_string_with_format(0, col, *title, format)?;
        sheet.set_column_width(col, *width)?;
    }
    Ok(())
}

fn money(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Render the workbook to bytes. Blocking.
pub fn render_export(rows: &[ExportRow]) -> anyhow::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let currency = Format::new().set_num_format("#,##0.00");

    let students = workbook.add_worksheet();
    students.set_name("Students")?;
    write_header(
        students,
        &[
            ("Token Number", 22.0),
            ("Student Name", 24.0),
            ("Email", 28.0),
            ("Phone", 16.0),
            ("Course", 12.0),
            ("Status", 20.0),
            ("Agent", 20.0),
            ("Agent ID", 12.0),
            ("Submitted", 22.0),
            ("Coordinator Approved", 22.0),
            ("Admin Reviewed", 22.0),
            ("Incentive", 12.0),
            ("Incentive Status", 16.0),
        ],
        &header,
    )?;

    for (index, row) in rows.iter().enumerate() {
        let r = u32::try_from(index + 1).context("too many rows for one sheet")?;
        students.write_string(r, 0, &row.token_number)?;
        students.write_string(r, 1, &row.student_name)?;
        students.write_string(r, 2, &row.email)?;
        students.write_string(r, 3, &row.phone)?;
        students.write_string(r, 4, &row.course)?;
        students.write_string(r, 5, row.status.as_str())?;
        students.write_string(r, 6, &row.agent_name)?;
        students.write_string(r, 7, row.agent_code.as_deref().unwrap_or(""))?;
        students.write_string(r, 8, format_time(Some(row.created_at)))?;
        students.write_string(r, 9, format_time(row.coordinator_approved_at))?;
        students.write_string(r, 10, format_time(row.admin_reviewed_at))?;
        if let Some(amount) = row.incentive_amount {
            students.write_number_with_format(r, 11, money(amount), &currency)?;
        }
        let incentive_status = match row.incentive_status {
            Some(IncentiveStatus::Paid) => "paid",
            Some(IncentiveStatus::Unpaid) => "unpaid",
            None => "",
        };
        students.write_string(r, 12, incentive_status)?;
    }

    let summary = workbook.add_worksheet();
    summary.set_name("Agent Summary")?;
    write_header(
        summary,
        &[
            ("Agent", 22.0),
            ("Username", 18.0),
            ("Agent ID", 12.0),
            ("Students", 10.0),
            ("Approved", 10.0),
            ("Paid", 14.0),
            ("Unpaid", 14.0),
        ],
        &header,
    )?;
    for (index, agent) in agent_summary(rows).iter().enumerate() {
        let r = u32::try_from(index + 1).context("too many rows for one sheet")?;
        summary.write_string(r, 0, &agent.agent_name)?;
        summary.write_string(r, 1, &agent.agent_username)?;
        summary.write_string(r, 2, agent.agent_code.as_deref().unwrap_or(""))?;
        summary.write_number(r, 3, agent.students)?;
        summary.write_number(r, 4, agent.approved)?;
        summary.write_number_with_format(r, 5, money(agent.paid), &currency)?;
        summary.write_number_with_format(r, 6, money(agent.unpaid), &currency)?;
    }

    workbook.save_to_buffer().context("failed to render workbook")
}
