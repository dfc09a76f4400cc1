use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::partner::PartnerRecord;

const PARTNER_COLUMNS: &str = "listing_id, owner_id, punti, commission, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PartnerRow {
    pub listing_id: String,
    pub owner_id: String,
    pub punti: i64,
    pub commission: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl PartnerRow {
    pub fn into_record(self) -> PartnerRecord {
        PartnerRecord {
            listing_id: self.listing_id,
            owner_id: self.owner_id,
            punti: self.punti,
            commission: self.commission,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<&Row<'_>> for PartnerRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            listing_id: row.get("listing_id")?,
            owner_id: row.get("owner_id")?,
            punti: row.get("punti")?,
            commission: row.get("commission")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct PartnerRepository;

impl PartnerRepository {
    pub fn insert(conn: &Connection, record: &PartnerRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO partners (
                    listing_id,
                    owner_id,
                    punti,
                    commission,
                    created_at,
                    updated_at
                ) VALUES (
                    :listing_id,
                    :owner_id,
                    :punti,
                    :commission,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":listing_id": &record.listing_id,
                ":owner_id": &record.owner_id,
                ":punti": record.punti,
                ":commission": record.commission,
                ":created_at": &record.created_at,
                ":updated_at": &record.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn find_by_listing(conn: &Connection, listing_id: &str) -> AppResult<Option<PartnerRecord>> {
        let sql = format!("SELECT {PARTNER_COLUMNS} FROM partners WHERE listing_id = :listing_id");
        let mut stmt = conn.prepare(&sql)?;

        let row = stmt
            .query_row(named_params! {":listing_id": listing_id}, |row| {
                PartnerRow::try_from(row)
            })
            .optional()?;

        Ok(row.map(PartnerRow::into_record))
    }

    /// Returns the number of rows touched; zero means the listing is unknown.
    pub fn update_punti(
        conn: &Connection,
        listing_id: &str,
        punti: i64,
        commission: i64,
        updated_at: &str,
    ) -> AppResult<usize> {
        let changed = conn.execute(
            r#"
                UPDATE partners
                SET punti = :punti,
                    commission = :commission,
                    updated_at = :updated_at
                WHERE listing_id = :listing_id
            "#,
            named_params! {
                ":listing_id": listing_id,
                ":punti": punti,
                ":commission": commission,
                ":updated_at": updated_at,
            },
        )?;

        Ok(changed)
    }

    pub fn mark_reconciled(conn: &Connection, listing_id: &str, reconciled_at: &str) -> AppResult<()> {
        conn.execute(
            "UPDATE partners SET reconciled_at = :reconciled_at WHERE listing_id = :listing_id",
            named_params! {":listing_id": listing_id, ":reconciled_at": reconciled_at},
        )?;
        Ok(())
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<PartnerRecord>> {
        let sql = format!("SELECT {PARTNER_COLUMNS} FROM partners ORDER BY listing_id ASC");
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt
            .query_map([], |row| PartnerRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().map(PartnerRow::into_record).collect())
    }
}
