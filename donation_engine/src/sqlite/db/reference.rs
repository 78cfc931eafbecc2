//! Reference data: the place hierarchy, units and coordinators.
use sqlx::SqliteConnection;

use crate::{
    db_types::{Attribution, Coordinator, District, Place, Section, Unit},
    traits::{DonationReferences, LedgerError},
};

#[derive(Debug, Clone, Copy)]
enum ReferenceTable {
    Batches,
    Units,
    Places,
    Districts,
    Sections,
    Coordinators,
}

impl ReferenceTable {
    fn name(&self) -> &'static str {
        match self {
            Self::Batches => "batches",
            Self::Units => "units",
            Self::Places => "places",
            Self::Districts => "districts",
            Self::Sections => "sections",
            Self::Coordinators => "coordinators",
        }
    }
}

async fn exists(table: ReferenceTable, id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)", table.name());
    sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(conn).await
}

/// Verifies that every reference in `refs` points at an existing record.
pub async fn check_references(refs: &DonationReferences, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    if let Some(batch_id) = refs.batch_id {
        if !exists(ReferenceTable::Batches, batch_id, &mut *conn).await? {
            return Err(LedgerError::BatchNotFound(batch_id));
        }
    }
    let mut checks = Vec::with_capacity(3);
    if let Some(unit_id) = refs.unit_id {
        checks.push((ReferenceTable::Units, unit_id));
    }
    match refs.attribution {
        Attribution::None => {},
        Attribution::Place(id) => checks.push((ReferenceTable::Places, id)),
        Attribution::District(id) => checks.push((ReferenceTable::Districts, id)),
        Attribution::Section(id) => checks.push((ReferenceTable::Sections, id)),
    }
    if let Some(coordinator) = refs.collected_by {
        checks.push((ReferenceTable::Coordinators, coordinator));
    }
    for (table, id) in checks {
        if !exists(table, id, &mut *conn).await? {
            return Err(LedgerError::InvalidReference(format!("{table:?} #{id} does not exist")));
        }
    }
    Ok(())
}

pub async fn insert_section(name: &str, conn: &mut SqliteConnection) -> Result<Section, sqlx::Error> {
    sqlx::query_as("INSERT INTO sections (name) VALUES ($1) RETURNING *;").bind(name).fetch_one(conn).await
}

pub async fn insert_district(
    name: &str,
    section_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<District, sqlx::Error> {
    sqlx::query_as("INSERT INTO districts (name, section_id) VALUES ($1, $2) RETURNING *;")
        .bind(name)
        .bind(section_id)
        .fetch_one(conn)
        .await
}

pub async fn insert_place(
    name: &str,
    district_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Place, sqlx::Error> {
    sqlx::query_as("INSERT INTO places (name, district_id) VALUES ($1, $2) RETURNING *;")
        .bind(name)
        .bind(district_id)
        .fetch_one(conn)
        .await
}

pub async fn insert_unit(name: &str, conn: &mut SqliteConnection) -> Result<Unit, sqlx::Error> {
    sqlx::query_as("INSERT INTO units (name) VALUES ($1) RETURNING *;").bind(name).fetch_one(conn).await
}

pub async fn insert_coordinator(
    name: &str,
    mobile: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Coordinator, sqlx::Error> {
    sqlx::query_as("INSERT INTO coordinators (name, mobile) VALUES ($1, $2) RETURNING *;")
        .bind(name)
        .bind(mobile)
        .fetch_one(conn)
        .await
}

pub async fn fetch_sections(conn: &mut SqliteConnection) -> Result<Vec<Section>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM sections ORDER BY id").fetch_all(conn).await
}

pub async fn fetch_districts(conn: &mut SqliteConnection) -> Result<Vec<District>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM districts ORDER BY id").fetch_all(conn).await
}

pub async fn fetch_places(conn: &mut SqliteConnection) -> Result<Vec<Place>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM places ORDER BY id").fetch_all(conn).await
}
