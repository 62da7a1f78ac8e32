//! Flat CSV dump of every deal.

use crate::errors::Result;
use crate::models::Deal;
use crate::storage::{DealFilter, DealStore};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Column order of the export.
pub const EXPORT_HEADER: [&str; 10] = [
    "deal_id",
    "seller_id",
    "buyer_id",
    "category",
    "item_info",
    "description",
    "amount",
    "status",
    "created_at",
    "updated_at",
];

pub type DealRow = [String; 10];

/// One export row. A missing buyer is an empty cell.
pub fn deal_row(deal: &Deal) -> DealRow {
    [
        deal.id.to_string(),
        deal.seller_id.to_string(),
        deal.buyer_id.map(|b| b.to_string()).unwrap_or_default(),
        deal.category.to_string(),
        deal.item_info.clone(),
        deal.description.clone(),
        deal.amount.to_string(),
        deal.status.to_string(),
        deal.created_at.to_string(),
        deal.updated_at.to_string(),
    ]
}

/// Every deal in the store as rows, newest created first.
pub async fn deal_rows(store: &dyn DealStore) -> Result<Vec<DealRow>> {
    let deals = store.list_deals(&DealFilter::All).await?;
    Ok(deals.iter().map(deal_row).collect())
}

/// Write the header and `rows` as RFC 4180 CSV.
pub fn write_csv<W: Write>(mut writer: W, rows: &[DealRow]) -> io::Result<()> {
    write_record(&mut writer, EXPORT_HEADER.iter().copied())?;
    for row in rows {
        write_record(&mut writer, row.iter().map(String::as_str))?;
    }
    writer.flush()
}

/// Export every deal to `path`. Returns the number of rows written.
pub async fn export_deals_csv(store: &dyn DealStore, path: &Path) -> Result<usize> {
    let rows = deal_rows(store).await?;
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), &rows)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "deals exported");
    Ok(rows.len())
}

fn write_record<'a, W: Write>(
    writer: &mut W,
    fields: impl Iterator<Item = &'a str>,
) -> io::Result<()> {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            writer.write_all(b",")?;
        }
        write_field(writer, field)?;
    }
    writer.write_all(b"\r\n")
}

fn write_field<W: Write>(writer: &mut W, field: &str) -> io::Result<()> {
    let needs_quotes = field.contains([',', '"', '\n', '\r']);
    if !needs_quotes {
        return writer.write_all(field.as_bytes());
    }
    writer.write_all(b"\"")?;
    writer.write_all(field.replace('"', "\"\"").as_bytes())?;
    writer.write_all(b"\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::models::{Category, DealId, UserId};

    fn sample() -> Deal {
        let mut deal = Deal::new(
            DealId::parse("abc").unwrap(),
            UserId(1),
            Category::Channel,
            "Channel \"Crypto\", 10k".to_string(),
            "line one\nline two".to_string(),
            Amount::parse_user_input("12,5").unwrap(),
            100,
        );
        deal.updated_at = 200;
        deal
    }

    #[test]
    fn test_row_layout() {
        let row = deal_row(&sample());
        assert_eq!(row[0], "abc");
        assert_eq!(row[2], "");
        assert_eq!(row[3], "channel");
        assert_eq!(row[6], "12.5");
        assert_eq!(row[7], "created");
        assert_eq!(row[9], "200");
    }

    #[test]
    fn test_csv_escaping() {
        let mut out = Vec::new();
        write_csv(&mut out, &[deal_row(&sample())]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.split("\r\n");
        assert_eq!(
            lines.next().unwrap(),
            "deal_id,seller_id,buyer_id,category,item_info,description,amount,status,created_at,updated_at"
        );
        assert_eq!(
            lines.next().unwrap(),
            "abc,1,,channel,\"Channel \"\"Crypto\"\", 10k\",\"line one\nline two\",12.5,created,100,200"
        );
    }

    #[test]
    fn test_header_only_when_empty() {
        let mut out = Vec::new();
        write_csv(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().matches("\r\n").count(), 1);
    }
}
