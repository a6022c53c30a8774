//! CSV export of the audit log.

use crate::models::AuditRecord;
use crate::timestamps::{NOT_AVAILABLE, display_date};
use chrono::{DateTime, Utc};
use std::fmt::Write;

const HEADER: [&str; 5] = [
    "Substation",
    "Fault Type",
    "Date Completed",
    "Status",
    "Lineman ID",
];

pub fn audit_csv<'a>(records: impl IntoIterator<Item = &'a AuditRecord>) -> String {
    let mut out = String::new();
    push_row(&mut out, HEADER);
    for record in records {
        push_row(
            &mut out,
            [
                record.substation.as_str(),
                record.fault_type.as_str(),
                &display_date(record.resolved_at),
                record.status.as_str(),
                record.lineman_id.as_deref().unwrap_or(NOT_AVAILABLE),
            ],
        );
    }
    out
}

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("audit_log_{}.csv", now.format("%Y-%m-%d"))
}

fn push_row<const N: usize>(out: &mut String, fields: [&str; N]) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let field = if field.is_empty() { NOT_AVAILABLE } else { field };
        push_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        // Writing to a String cannot fail.
        write!(out, "\"{}\"", field.replace('"', "\"\"")).ok();
    } else {
        out.push_str(field);
    }
}
