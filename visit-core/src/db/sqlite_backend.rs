//! SQLite database storage backend
//!
//! One table per collection. Rows carry a `position` column so records come
//! back in the order they were stored.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{
    ActionType, Company, CompanyType, Customer, EquipmentType, Requirement, RequirementStatus,
    Visit, VisitStatus, VisitStore, SCHEMA_VERSION,
};

use super::traits::{BackendType, DatabaseBackend, StoreUpdate};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite backend implementation
pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) the database at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open SQLite database {:?}", path))?;

        // Enable WAL mode for better concurrent access
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

        let backend = Self {
            path,
            conn: Mutex::new(conn),
        };

        backend.init_schema()?;
        Ok(backend)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("SQLite connection lock poisoned: {:?}", self.path))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        let has_version_table: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
                [],
                |row| row.get(0),
            )
            .context("Failed to inspect database schema")?;

        let current_version: u32 = if has_version_table {
            conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()
            .context("Failed to read database schema version")?
            .unwrap_or(0)
        } else {
            0
        };

        if current_version == 0 {
            conn.execute_batch(include_str!("schema.sql"))
                .context("Failed to create database schema")?;
            log::info!("Initialized SQLite schema v{} at {}", SCHEMA_VERSION, self.path.display());
        } else if current_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is not supported, expected {}",
                current_version,
                SCHEMA_VERSION
            );
        }

        Ok(())
    }

    // =========================================================================
    // Column conversions
    // =========================================================================

    fn parse_id(s: &str) -> Result<Uuid> {
        Uuid::parse_str(s).with_context(|| format!("Invalid id in database: {}", s))
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("Invalid timestamp in database: {}", s))
    }

    fn parse_date(s: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .with_context(|| format!("Invalid date in database: {}", s))
    }

    fn date_to_str(date: &NaiveDate) -> String {
        date.format(DATE_FORMAT).to_string()
    }

    fn str_to_action(s: &str) -> Result<ActionType> {
        ActionType::from_label(s).with_context(|| format!("Unknown action type in database: {}", s))
    }

    fn str_to_visit_status(s: &str) -> Result<VisitStatus> {
        VisitStatus::from_label(s).with_context(|| format!("Unknown visit status in database: {}", s))
    }

    fn str_to_requirement_status(s: &str) -> Result<RequirementStatus> {
        RequirementStatus::from_label(s)
            .with_context(|| format!("Unknown requirement status in database: {}", s))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn load_companies(conn: &Connection) -> Result<Vec<Company>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, company_type, address, phone, logo, owner_id, created_at
             FROM companies ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut companies = Vec::new();
        for row_result in rows {
            let (id, name, company_type, address, phone, logo, owner_id, created_at) = row_result?;
            companies.push(Company {
                id: Self::parse_id(&id)?,
                name,
                company_type: CompanyType::from_label(&company_type),
                address,
                phone,
                logo,
                owner_id,
                created_at: Self::parse_timestamp(&created_at)?,
            });
        }
        Ok(companies)
    }

    fn load_customers(conn: &Connection) -> Result<Vec<Customer>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, company_id, position_title, email, phone, owner_id, created_at
             FROM customers ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut customers = Vec::new();
        for row_result in rows {
            let (id, name, company_id, position, email, phone, owner_id, created_at) = row_result?;
            customers.push(Customer {
                id: Self::parse_id(&id)?,
                name,
                company_id: Self::parse_id(&company_id)?,
                position,
                email,
                phone,
                owner_id,
                created_at: Self::parse_timestamp(&created_at)?,
            });
        }
        Ok(customers)
    }

    fn load_visits(conn: &Connection) -> Result<Vec<Visit>> {
        let mut stmt = conn.prepare(
            "SELECT id, company_id, customer_id, action_type, visit_date, notes,
                    next_follow_up, next_action_type, status, owner_id, created_at
             FROM visits ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
            ))
        })?;

        let mut visits = Vec::new();
        for row_result in rows {
            let (
                id, company_id, customer_id, action_type, visit_date, notes,
                next_follow_up, next_action_type, status, owner_id, created_at,
            ) = row_result?;

            visits.push(Visit {
                id: Self::parse_id(&id)?,
                company_id: Self::parse_id(&company_id)?,
                customer_id: Self::parse_id(&customer_id)?,
                action_type: Self::str_to_action(&action_type)?,
                visit_date: Self::parse_date(&visit_date)?,
                notes,
                next_follow_up: next_follow_up.as_deref().map(Self::parse_date).transpose()?,
                next_action_type: next_action_type
                    .as_deref()
                    .map(Self::str_to_action)
                    .transpose()?,
                status: Self::str_to_visit_status(&status)?,
                owner_id,
                created_at: Self::parse_timestamp(&created_at)?,
            });
        }
        Ok(visits)
    }

    fn load_requirements(conn: &Connection) -> Result<Vec<Requirement>> {
        let mut stmt = conn.prepare(
            "SELECT id, company_id, customer_id, equipment_name, required_period, status,
                    notes, recorded_date, owner_id, created_at, updated_at
             FROM requirements ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
            ))
        })?;

        let mut requirements = Vec::new();
        for row_result in rows {
            let (
                id, company_id, customer_id, equipment_name, required_period, status,
                notes, recorded_date, owner_id, created_at, updated_at,
            ) = row_result?;

            requirements.push(Requirement {
                id: Self::parse_id(&id)?,
                company_id: Self::parse_id(&company_id)?,
                customer_id: Self::parse_id(&customer_id)?,
                equipment_name,
                required_period,
                status: Self::str_to_requirement_status(&status)?,
                notes,
                recorded_date: Self::parse_date(&recorded_date)?,
                owner_id,
                created_at: Self::parse_timestamp(&created_at)?,
                updated_at: Self::parse_timestamp(&updated_at)?,
            });
        }
        Ok(requirements)
    }

    fn load_equipment_types(conn: &Connection) -> Result<Vec<EquipmentType>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, owner_id, created_at FROM equipment_types ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut equipment_types = Vec::new();
        for row_result in rows {
            let (id, name, owner_id, created_at) = row_result?;
            equipment_types.push(EquipmentType {
                id: Self::parse_id(&id)?,
                name,
                owner_id,
                created_at: Self::parse_timestamp(&created_at)?,
            });
        }
        Ok(equipment_types)
    }

    fn read_all(conn: &Connection) -> Result<VisitStore> {
        Ok(VisitStore {
            schema_version: SCHEMA_VERSION,
            companies: Self::load_companies(conn)?,
            customers: Self::load_customers(conn)?,
            visits: Self::load_visits(conn)?,
            requirements: Self::load_requirements(conn)?,
            equipment_types: Self::load_equipment_types(conn)?,
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn save_company(conn: &Connection, position: usize, c: &Company) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO companies
             (id, name, company_type, address, phone, logo, owner_id, created_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                c.id.to_string(),
                c.name,
                c.company_type.label(),
                c.address,
                c.phone,
                c.logo,
                c.owner_id,
                c.created_at.to_rfc3339(),
                position as i64,
            ],
        )?;
        Ok(())
    }

    fn save_customer(conn: &Connection, position: usize, c: &Customer) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO customers
             (id, name, company_id, position_title, email, phone, owner_id, created_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                c.id.to_string(),
                c.name,
                c.company_id.to_string(),
                c.position,
                c.email,
                c.phone,
                c.owner_id,
                c.created_at.to_rfc3339(),
                position as i64,
            ],
        )?;
        Ok(())
    }

    fn save_visit(conn: &Connection, position: usize, v: &Visit) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO visits
             (id, company_id, customer_id, action_type, visit_date, notes, next_follow_up,
              next_action_type, status, owner_id, created_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                v.id.to_string(),
                v.company_id.to_string(),
                v.customer_id.to_string(),
                v.action_type.label(),
                Self::date_to_str(&v.visit_date),
                v.notes,
                v.next_follow_up.as_ref().map(Self::date_to_str),
                v.next_action_type.map(|a| a.label()),
                v.status.as_str(),
                v.owner_id,
                v.created_at.to_rfc3339(),
                position as i64,
            ],
        )?;
        Ok(())
    }

    fn save_requirement(conn: &Connection, position: usize, r: &Requirement) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO requirements
             (id, company_id, customer_id, equipment_name, required_period, status, notes,
              recorded_date, owner_id, created_at, updated_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                r.id.to_string(),
                r.company_id.to_string(),
                r.customer_id.to_string(),
                r.equipment_name,
                r.required_period,
                r.status.as_str(),
                r.notes,
                Self::date_to_str(&r.recorded_date),
                r.owner_id,
                r.created_at.to_rfc3339(),
                r.updated_at.to_rfc3339(),
                position as i64,
            ],
        )?;
        Ok(())
    }

    fn save_equipment_type(conn: &Connection, position: usize, e: &EquipmentType) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO equipment_types (id, name, owner_id, created_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                e.id.to_string(),
                e.name,
                e.owner_id,
                e.created_at.to_rfc3339(),
                position as i64,
            ],
        )?;
        Ok(())
    }

    /// Replaces every table's contents with `store`. Callers wrap this in
    /// a transaction.
    fn write_all(conn: &Connection, store: &VisitStore) -> Result<()> {
        conn.execute_batch(
            "DELETE FROM companies;
             DELETE FROM customers;
             DELETE FROM visits;
             DELETE FROM requirements;
             DELETE FROM equipment_types;",
        )?;

        for (i, c) in store.companies.iter().enumerate() {
            Self::save_company(conn, i, c)?;
        }
        for (i, c) in store.customers.iter().enumerate() {
            Self::save_customer(conn, i, c)?;
        }
        for (i, v) in store.visits.iter().enumerate() {
            Self::save_visit(conn, i, v)?;
        }
        for (i, r) in store.requirements.iter().enumerate() {
            Self::save_requirement(conn, i, r)?;
        }
        for (i, e) in store.equipment_types.iter().enumerate() {
            Self::save_equipment_type(conn, i, e)?;
        }
        Ok(())
    }
}

impl DatabaseBackend for SqliteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<VisitStore> {
        let conn = self.conn()?;
        let store = Self::read_all(&conn)?;
        log::debug!(
            "Loaded {} companies, {} visits from {}",
            store.companies.len(),
            store.visits.len(),
            self.path.display()
        );
        Ok(store)
    }

    fn save(&self, store: &VisitStore) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::write_all(&tx, store)?;
        tx.commit()?;
        log::debug!("Saved store to {}", self.path.display());
        Ok(())
    }

    fn update_atomically(&self, update_fn: &mut StoreUpdate<'_>) -> Result<VisitStore> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut store = Self::read_all(&tx)?;
        // Dropping `tx` on error rolls back
        update_fn(&mut store)?;
        Self::write_all(&tx, &store)?;

        tx.commit()?;
        Ok(store)
    }
}
