//! The working session of one user
//!
//! A `Session` keeps a local copy of the current owner's records and routes
//! every mutation through the injected backend. Local state changes only
//! after the backend has accepted the change; every failure produces exactly
//! one [`Notice`].

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::audit;
use crate::db::{DatabaseBackend, DatabaseStats, EntityStore, StoreError};
use crate::derived::{
    dashboard_stats, distinct_by, filter_visits, partition_follow_ups, upcoming_follow_ups,
    DashboardStats, FollowUpPartition, VisitFilter, DEFAULT_FOLLOW_UP_WINDOW,
};
use crate::export::{report_file_name, write_report, ReportFormatter};
use crate::forms::{CompanyDraft, CustomerDraft, RequirementDraft, VisitDraft};
use crate::import::{parse_companies_csv, SkippedRow};
use crate::models::{
    ActionType, Company, Customer, Entity, EquipmentType, EquipmentTypePatch, Requirement, Visit,
    VisitPatch, VisitStatus, VisitStore,
};
use crate::resolver::Resolver;
use crate::validation::{sanitize_input, ValidationError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },
    #[error("Not signed in")]
    Unauthenticated,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0:#}")]
    Store(anyhow::Error),
}

impl SessionError {
    fn from_store(err: anyhow::Error) -> Self {
        if let Some(StoreError::NotFound { kind, id }) = err.downcast_ref::<StoreError>() {
            return SessionError::NotFound {
                kind: *kind,
                id: *id,
            };
        }
        SessionError::Store(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing message, like a toast in a UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Receives notices raised by the session
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        let level = match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => log::Level::Info,
            NoticeLevel::Warning => log::Level::Warn,
            NoticeLevel::Error => log::Level::Error,
        };
        log::log!(level, "{}: {}", notice.title, notice.message);
    }
}

/// Supplies the id of the signed-in user, if any
pub trait IdentityProvider {
    fn current_user(&self) -> Option<String>;
}

/// A fixed user, e.g. from configuration or a command-line flag
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    user_id: String,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<String> {
        Some(self.user_id.clone())
    }
}

/// Nobody signed in
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_user(&self) -> Option<String> {
        None
    }
}

/// Result of a bulk company import
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub imported: Vec<Company>,
    pub skipped: Vec<SkippedRow>,
}

pub struct Session {
    backend: Box<dyn DatabaseBackend>,
    identity: Box<dyn IdentityProvider>,
    notifier: Box<dyn Notifier>,
    data: VisitStore,
    follow_up_window: i64,
    formatter: ReportFormatter,
}

impl Session {
    pub fn new(
        backend: Box<dyn DatabaseBackend>,
        identity: Box<dyn IdentityProvider>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        if let Some(user) = identity.current_user() {
            audit::log_auth_success(&user);
        }
        Self {
            backend,
            identity,
            notifier,
            data: VisitStore::new(),
            follow_up_window: DEFAULT_FOLLOW_UP_WINDOW,
            formatter: ReportFormatter::default(),
        }
    }

    pub fn with_follow_up_window(mut self, days: i64) -> Self {
        self.follow_up_window = days;
        self
    }

    pub fn with_date_format(mut self, format: &str) -> Self {
        self.formatter = ReportFormatter::new(format);
        self
    }

    pub fn backend(&self) -> &dyn DatabaseBackend {
        self.backend.as_ref()
    }

    pub fn current_user(&self) -> Option<String> {
        self.identity.current_user()
    }

    pub fn follow_up_window(&self) -> i64 {
        self.follow_up_window
    }

    // =========================================================================
    // Notices
    // =========================================================================

    fn notify(&self, level: NoticeLevel, title: &str, message: impl Into<String>) {
        self.notifier.notify(Notice::new(level, title, message));
    }

    fn require_user(&self) -> Result<String, SessionError> {
        match self.identity.current_user() {
            Some(user) => Ok(user),
            None => {
                audit::log_auth_failure("Mutation attempted without a signed-in user");
                self.notify(
                    NoticeLevel::Error,
                    "Error",
                    "You must be signed in to change data",
                );
                Err(SessionError::Unauthenticated)
            }
        }
    }

    fn invalid(&self, err: ValidationError) -> SessionError {
        self.notify(NoticeLevel::Warning, "Invalid input", err.to_string());
        SessionError::Validation(err)
    }

    fn store_failure(&self, message: &str, err: anyhow::Error) -> SessionError {
        log::error!("{}: {:#}", message, err);
        self.notify(NoticeLevel::Error, "Error", message);
        SessionError::from_store(err)
    }

    // =========================================================================
    // Local state
    // =========================================================================

    /// Reloads the owner's records from the backend. Signed-out sessions
    /// see nothing. On failure the previous records are kept.
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        let Some(user) = self.identity.current_user() else {
            self.data = VisitStore::new();
            return Ok(());
        };

        match self.backend.load() {
            Ok(store) => {
                let mut data = store.owned_by(&user);
                // Stored oldest first; reversing keeps ties newest first too
                newest_first(&mut data.companies, |c| c.created_at);
                newest_first(&mut data.customers, |c| c.created_at);
                newest_first(&mut data.visits, |v| v.created_at);
                newest_first(&mut data.requirements, |r| r.created_at);
                self.data = data;
                audit::log_data_access(&user, "visit records", "loaded");
                Ok(())
            }
            Err(e) => Err(self.store_failure("Failed to load data", e)),
        }
    }

    pub fn data(&self) -> &VisitStore {
        &self.data
    }

    pub fn companies(&self) -> &[Company] {
        &self.data.companies
    }

    pub fn customers(&self) -> &[Customer] {
        &self.data.customers
    }

    pub fn visits(&self) -> &[Visit] {
        &self.data.visits
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.data.requirements
    }

    /// Equipment catalog sorted by name, ignoring case
    pub fn equipment_types(&self) -> Vec<&EquipmentType> {
        let mut types: Vec<&EquipmentType> = self.data.equipment_types.iter().collect();
        types.sort_by_key(|t| t.name.to_lowercase());
        types
    }

    /// Record counts for the current owner
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats::of(&self.data, self.backend.backend_type())
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::from_store(&self.data)
    }

    // =========================================================================
    // Generic persistence
    // =========================================================================

    fn insert_record<E: Entity>(&mut self, user: &str, record: E) -> anyhow::Result<E> {
        let created = self.backend.create(record)?;
        E::collection_mut(&mut self.data).insert(0, created.clone());
        audit::log_data_access(user, &format!("{} {}", E::KIND, created.id()), "created");
        log::info!("{} {} created", E::KIND, created.id());
        Ok(created)
    }

    fn create<E: Entity>(&mut self, user: &str, record: E) -> Result<E, SessionError> {
        match self.insert_record(user, record) {
            Ok(created) => {
                self.notify(NoticeLevel::Success, "Success", format!("{} added", E::KIND));
                Ok(created)
            }
            Err(e) => Err(self.store_failure(
                &format!("Failed to add {}", E::KIND.to_lowercase()),
                e,
            )),
        }
    }

    fn update<E: Entity>(
        &mut self,
        user: &str,
        id: &Uuid,
        patch: &E::Patch,
    ) -> Result<E, SessionError> {
        match self.backend.update::<E>(user, id, patch) {
            Ok(updated) => {
                if let Some(local) = E::collection_mut(&mut self.data)
                    .iter_mut()
                    .find(|r| r.id() == *id)
                {
                    *local = updated.clone();
                }
                audit::log_data_access(user, &format!("{} {}", E::KIND, id), "updated");
                log::info!("{} {} updated", E::KIND, id);
                self.notify(NoticeLevel::Success, "Success", format!("{} updated", E::KIND));
                Ok(updated)
            }
            Err(e) => Err(self.store_failure(
                &format!("Failed to update {}", E::KIND.to_lowercase()),
                e,
            )),
        }
    }

    fn delete<E: Entity>(&mut self, user: &str, id: &Uuid) -> Result<(), SessionError> {
        match self.backend.delete::<E>(user, id) {
            Ok(()) => {
                E::collection_mut(&mut self.data).retain(|r| r.id() != *id);
                audit::log_data_access(user, &format!("{} {}", E::KIND, id), "deleted");
                log::info!("{} {} deleted", E::KIND, id);
                self.notify(NoticeLevel::Success, "Success", format!("{} deleted", E::KIND));
                Ok(())
            }
            Err(e) => Err(self.store_failure(
                &format!("Failed to delete {}", E::KIND.to_lowercase()),
                e,
            )),
        }
    }

    // =========================================================================
    // Companies
    // =========================================================================

    pub fn add_company(&mut self, draft: CompanyDraft) -> Result<Company, SessionError> {
        let user = self.require_user()?;
        let draft = draft.validate().map_err(|e| self.invalid(e))?;
        self.create(&user, draft.into_company(&user))
    }

    pub fn update_company(&mut self, id: &Uuid, draft: CompanyDraft) -> Result<Company, SessionError> {
        let user = self.require_user()?;
        let draft = draft.validate().map_err(|e| self.invalid(e))?;
        self.update::<Company>(&user, id, &draft.into_patch())
    }

    pub fn delete_company(&mut self, id: &Uuid) -> Result<(), SessionError> {
        let user = self.require_user()?;
        self.delete::<Company>(&user, id)
    }

    /// Parses CSV text and stores every acceptable row as a new company.
    ///
    /// Stops at the first storage failure; companies stored before it are
    /// kept.
    pub fn import_companies(&mut self, text: &str) -> Result<ImportSummary, SessionError> {
        let user = self.require_user()?;
        let outcome = parse_companies_csv(text);

        let mut imported = Vec::with_capacity(outcome.companies.len());
        for row in &outcome.companies {
            let company = row.to_draft().into_company(&user);
            match self.insert_record(&user, company) {
                Ok(created) => imported.push(created),
                Err(e) => {
                    return Err(self.store_failure(
                        &format!(
                            "Import stopped after {} of {} companies",
                            imported.len(),
                            outcome.companies.len()
                        ),
                        e,
                    ))
                }
            }
        }

        let level = if outcome.skipped.is_empty() {
            NoticeLevel::Success
        } else {
            NoticeLevel::Warning
        };
        self.notify(
            level,
            "Import complete",
            format!(
                "Imported {} companies, skipped {} rows",
                imported.len(),
                outcome.skipped.len()
            ),
        );

        Ok(ImportSummary {
            imported,
            skipped: outcome.skipped,
        })
    }

    /// Reads a CSV file and imports it, see [`Session::import_companies`]
    pub fn import_companies_file(&mut self, path: &Path) -> Result<ImportSummary, SessionError> {
        match std::fs::read_to_string(path) {
            Ok(text) => self.import_companies(&text),
            Err(e) => {
                let err = anyhow::Error::new(e).context(format!("Failed to read {:?}", path));
                Err(self.store_failure("Failed to read import file", err))
            }
        }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub fn add_customer(&mut self, draft: CustomerDraft) -> Result<Customer, SessionError> {
        let user = self.require_user()?;
        let draft = draft.validate().map_err(|e| self.invalid(e))?;
        let customer = draft
            .into_customer(&user)
            .ok_or_else(|| self.invalid(ValidationError::new("company", "Company is required")))?;
        self.create(&user, customer)
    }

    pub fn update_customer(&mut self, id: &Uuid, draft: CustomerDraft) -> Result<Customer, SessionError> {
        let user = self.require_user()?;
        let draft = draft.validate().map_err(|e| self.invalid(e))?;
        self.update::<Customer>(&user, id, &draft.into_patch())
    }

    pub fn delete_customer(&mut self, id: &Uuid) -> Result<(), SessionError> {
        let user = self.require_user()?;
        self.delete::<Customer>(&user, id)
    }

    // =========================================================================
    // Visits
    // =========================================================================

    pub fn add_visit(&mut self, draft: VisitDraft) -> Result<Visit, SessionError> {
        let user = self.require_user()?;
        let draft = draft
            .validate(&self.data.customers)
            .map_err(|e| self.invalid(e))?;
        let visit = draft.into_visit(&user).ok_or_else(|| {
            self.invalid(ValidationError::new("visit", "Visit is missing required fields"))
        })?;
        self.create(&user, visit)
    }

    pub fn update_visit(&mut self, id: &Uuid, draft: VisitDraft) -> Result<Visit, SessionError> {
        let user = self.require_user()?;
        let draft = draft
            .validate(&self.data.customers)
            .map_err(|e| self.invalid(e))?;
        self.update::<Visit>(&user, id, &draft.into_patch())
    }

    /// Changes only the status; any status may follow any other
    pub fn set_visit_status(&mut self, id: &Uuid, status: VisitStatus) -> Result<Visit, SessionError> {
        let user = self.require_user()?;
        let patch = VisitPatch {
            status: Some(status),
            ..Default::default()
        };
        self.update::<Visit>(&user, id, &patch)
    }

    pub fn delete_visit(&mut self, id: &Uuid) -> Result<(), SessionError> {
        let user = self.require_user()?;
        self.delete::<Visit>(&user, id)
    }

    // =========================================================================
    // Requirements and equipment
    // =========================================================================

    pub fn add_requirement(&mut self, draft: RequirementDraft) -> Result<Requirement, SessionError> {
        let user = self.require_user()?;
        let draft = draft
            .validate(&self.data.customers)
            .map_err(|e| self.invalid(e))?;
        let requirement = draft.into_requirement(&user).ok_or_else(|| {
            self.invalid(ValidationError::new(
                "requirement",
                "Requirement is missing required fields",
            ))
        })?;
        self.create(&user, requirement)
    }

    pub fn update_requirement(
        &mut self,
        id: &Uuid,
        draft: RequirementDraft,
    ) -> Result<Requirement, SessionError> {
        let user = self.require_user()?;
        let draft = draft
            .validate(&self.data.customers)
            .map_err(|e| self.invalid(e))?;
        self.update::<Requirement>(&user, id, &draft.into_patch())
    }

    pub fn delete_requirement(&mut self, id: &Uuid) -> Result<(), SessionError> {
        let user = self.require_user()?;
        self.delete::<Requirement>(&user, id)
    }

    fn equipment_name(&self, raw: &str) -> Result<String, SessionError> {
        let name = sanitize_input(raw);
        if name.is_empty() {
            return Err(self.invalid(ValidationError::new("name", "Equipment name is required")));
        }
        Ok(name)
    }

    pub fn add_equipment_type(&mut self, name: &str) -> Result<EquipmentType, SessionError> {
        let user = self.require_user()?;
        let name = self.equipment_name(name)?;
        self.create(&user, EquipmentType::new(&user, name))
    }

    pub fn rename_equipment_type(&mut self, id: &Uuid, name: &str) -> Result<EquipmentType, SessionError> {
        let user = self.require_user()?;
        let patch = EquipmentTypePatch {
            name: Some(self.equipment_name(name)?),
        };
        self.update::<EquipmentType>(&user, id, &patch)
    }

    pub fn delete_equipment_type(&mut self, id: &Uuid) -> Result<(), SessionError> {
        let user = self.require_user()?;
        self.delete::<EquipmentType>(&user, id)
    }

    // =========================================================================
    // Derived views
    // =========================================================================

    pub fn dashboard(&self, today: NaiveDate) -> DashboardStats {
        dashboard_stats(&self.data, today, self.follow_up_window)
    }

    pub fn follow_ups(&self, today: NaiveDate) -> FollowUpPartition<'_> {
        partition_follow_ups(&self.data.visits, today, self.follow_up_window)
    }

    /// Follow-ups due within the alert window, soonest first
    pub fn upcoming_follow_ups(&self, today: NaiveDate) -> Vec<&Visit> {
        upcoming_follow_ups(&self.data.visits, today, self.follow_up_window)
    }

    /// Visits matching `filter`, newest first
    pub fn filtered_visits(&self, filter: &VisitFilter) -> Vec<&Visit> {
        filter_visits(&self.data.visits, filter, &self.resolver())
    }

    /// Company type labels present in the data, first seen first
    pub fn company_types(&self) -> Vec<String> {
        distinct_by(&self.data.companies, |c| c.company_type.label().to_string())
    }

    /// Action types present in the data, first seen first
    pub fn action_types(&self) -> Vec<ActionType> {
        distinct_by(&self.data.visits, |v| v.action_type)
    }

    pub fn report_csv(&self, filter: &VisitFilter) -> String {
        let resolver = self.resolver();
        let visits = filter_visits(&self.data.visits, filter, &resolver);
        self.formatter.to_csv(&visits, &resolver)
    }

    /// Writes the filtered report into `dir` as `visit-report-<today>.csv`.
    /// Returns `None` without writing anything when no visit matches.
    pub fn export_report(
        &self,
        filter: &VisitFilter,
        dir: &Path,
        today: NaiveDate,
    ) -> Result<Option<PathBuf>, SessionError> {
        let resolver = self.resolver();
        let visits = filter_visits(&self.data.visits, filter, &resolver);
        if visits.is_empty() {
            self.notify(
                NoticeLevel::Warning,
                "No Data",
                "No visits found for the selected criteria",
            );
            return Ok(None);
        }

        let path = dir.join(report_file_name(today));
        match write_report(&self.formatter.to_csv(&visits, &resolver), &path) {
            Ok(()) => {
                if let Some(user) = self.current_user() {
                    audit::log_data_access(&user, "visit report", "exported");
                }
                self.notify(
                    NoticeLevel::Success,
                    "Export complete",
                    format!(
                        "Exported {} visit{} to {}",
                        visits.len(),
                        if visits.len() == 1 { "" } else { "s" },
                        path.display()
                    ),
                );
                Ok(Some(path))
            }
            Err(e) => Err(self.store_failure("Failed to export report", e)),
        }
    }
}

fn newest_first<T, K: Ord>(records: &mut [T], key: impl Fn(&T) -> K) {
    records.reverse();
    records.sort_by(|a, b| key(b).cmp(&key(a)));
}
