pub mod audit;
pub mod config;
pub mod db;
pub mod derived;
pub mod export;
pub mod forms;
pub mod import;
pub mod models;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod validation;

// Re-export commonly used types
pub use config::{get_config_path, AppConfig};
pub use db::{
    create_backend, open_or_create, BackendType, DatabaseBackend, EntityStore, SqliteBackend,
    StoreError, YamlBackend,
};
pub use derived::{
    classify_follow_up, dashboard_stats, filter_visits, DashboardStats, DateRange, FollowUp,
    FollowUpBucket, Selection, Tally, VisitFilter, DEFAULT_FOLLOW_UP_WINDOW,
};
pub use export::{report_file_name, ReportFormatter, ReportRow, REPORT_HEADERS};
pub use forms::{CompanyDraft, CustomerDraft, RequirementDraft, VisitDraft};
pub use import::{parse_companies_csv, ImportOutcome, ImportedCompany, SkippedRow};
pub use models::{
    ActionType, Company, CompanyType, Customer, Entity, EquipmentType, Requirement,
    RequirementStatus, Visit, VisitStatus, VisitStore, SCHEMA_VERSION,
};
pub use resolver::Resolver;
pub use session::{
    Anonymous, IdentityProvider, ImportSummary, LogNotifier, Notice, NoticeLevel, Notifier,
    Session, SessionError, StaticIdentity,
};
pub use storage::Storage;
pub use validation::{
    is_safe_logo, sanitize_input, sanitize_text_content, validate_company_name,
    validate_customer_name, validate_email, validate_phone, NameCheck, ValidationError,
};
