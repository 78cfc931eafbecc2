use donation_engine::{
    db_types::{Donation, ReconciliationFlag},
    traits::BatchAudit,
};
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

pub fn format_audit(audit: &[BatchAudit]) -> String {
    if audit.is_empty() {
        return "No batches".to_string();
    }
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["Batch", "Name", "Recorded total", "Ledger total", "Drift", ""]);
    audit.iter().for_each(|a| {
        let marker = if a.is_consistent() { "✅️" } else { "❌️" };
        table.add_row(row![
            a.batch_id,
            a.name,
            a.recorded_total.to_string(),
            a.ledger_total.to_string(),
            a.drift().to_string(),
            marker
        ]);
    });
    table.to_string()
}

pub fn format_donations(donations: &[Donation]) -> String {
    if donations.is_empty() {
        return "No donations".to_string();
    }
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["Donation id", "Transaction id", "Amount", "Method", "Status", "Batch", "Created At"]);
    donations.iter().for_each(|d| {
        table.add_row(row![
            d.donation_id,
            d.transaction_id,
            d.amount.to_string(),
            d.payment_method.to_string(),
            d.payment_status.to_string(),
            d.batch_id.map(|b| b.to_string()).unwrap_or_default(),
            d.created_at.to_string()
        ]);
    });
    table.to_string()
}

pub fn format_flags(flags: &[ReconciliationFlag]) -> String {
    if flags.is_empty() {
        return "No reconciliation flags".to_string();
    }
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["ID", "Donation id", "Batch", "Delta", "Reason", "Created At", "Resolved At"]);
    flags.iter().for_each(|f| {
        table.add_row(row![
            f.id,
            f.donation_id,
            f.batch_id,
            f.delta.to_string(),
            f.reason,
            f.created_at.to_string(),
            f.resolved_at.map(|t| t.to_string()).unwrap_or_default()
        ]);
    });
    table.to_string()
}
