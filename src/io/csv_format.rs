//! CSV report output
//!
//! Operator dumps of the ledger are written as CSV with one row per
//! obligation and a leading `section` column naming the group the row was
//! listed under.

use crate::types::Obligation;
use chrono::{DateTime, Utc};
use std::io::Write;

const HEADER: [&str; 13] = [
    "section",
    "id",
    "external_id",
    "payee",
    "address",
    "currency",
    "amount",
    "transaction_id",
    "state",
    "pulled_at",
    "locked_at",
    "paid_at",
    "associated_at",
];

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}

/// Write obligations grouped by section
///
/// Rows are written in the order given; amounts keep their exact decimal
/// form.
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_obligations_csv(
    rows: &[(&str, &Obligation)],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(HEADER)
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for (section, obligation) in rows {
        writer
            .write_record(&[
                section.to_string(),
                obligation.id.to_string(),
                obligation.external_id.clone(),
                obligation.payee.clone(),
                obligation.destination_address.clone(),
                obligation.currency.clone(),
                obligation.amount.to_string(),
                obligation.transaction_id.clone().unwrap_or_default(),
                obligation.state().to_string(),
                obligation.pulled_at.to_rfc3339(),
                timestamp(obligation.locked_at),
                timestamp(obligation.paid_at),
                timestamp(obligation.associated_at),
            ])
            .map_err(|e| format!("Failed to write obligation {}: {}", obligation.id, e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
