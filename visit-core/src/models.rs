use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current on-disk schema version of the store
pub const SCHEMA_VERSION: u32 = 1;

/// Kind of contact recorded for a visit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActionType {
    Call,
    SendQuotation,
    SiteVisit,
    EmailFollowUp,
    Meeting,
    Presentation,
    ProductDemo,
    ContractDiscussion,
}

impl ActionType {
    /// All action types, in display order
    pub fn all() -> &'static [ActionType] {
        &[
            ActionType::Call,
            ActionType::SendQuotation,
            ActionType::SiteVisit,
            ActionType::EmailFollowUp,
            ActionType::Meeting,
            ActionType::Presentation,
            ActionType::ProductDemo,
            ActionType::ContractDiscussion,
        ]
    }

    /// Human readable label, also used in exports
    pub fn label(&self) -> &'static str {
        match self {
            ActionType::Call => "Call",
            ActionType::SendQuotation => "Send Quotation",
            ActionType::SiteVisit => "Site Visit",
            ActionType::EmailFollowUp => "Email Follow-up",
            ActionType::Meeting => "Meeting",
            ActionType::Presentation => "Presentation",
            ActionType::ProductDemo => "Product Demo",
            ActionType::ContractDiscussion => "Contract Discussion",
        }
    }

    /// Parses an action type from its label or variant name.
    /// Case, spaces, dashes and underscores are ignored.
    pub fn from_label(s: &str) -> Option<Self> {
        let wanted = normalize_key(s);
        Self::all()
            .iter()
            .copied()
            .find(|a| normalize_key(a.label()) == wanted)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome state of a visit. Any value may be set at any time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    #[default]
    Completed,
    Pending,
    Cancelled,
}

impl VisitStatus {
    pub fn all() -> &'static [VisitStatus] {
        &[
            VisitStatus::Completed,
            VisitStatus::Pending,
            VisitStatus::Cancelled,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Completed => "completed",
            VisitStatus::Pending => "pending",
            VisitStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "completed" | "done" => Some(VisitStatus::Completed),
            "pending" => Some(VisitStatus::Pending),
            "cancelled" | "canceled" => Some(VisitStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Industry category of a company
///
/// Known categories get their own variant; anything else (legacy data,
/// bulk imports) is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CompanyType {
    PharmaManufacturing,
    Research,
    Food,
    Cosmetics,
    Nutraceuticals,
    Biotechnology,
    MedicalDevices,
    Chemical,
    Agriculture,
    Other(String),
}

impl CompanyType {
    /// The predefined categories offered when creating a company
    pub fn known() -> &'static [CompanyType] {
        &[
            CompanyType::PharmaManufacturing,
            CompanyType::Research,
            CompanyType::Food,
            CompanyType::Cosmetics,
            CompanyType::Nutraceuticals,
            CompanyType::Biotechnology,
            CompanyType::MedicalDevices,
            CompanyType::Chemical,
            CompanyType::Agriculture,
        ]
    }

    pub fn label(&self) -> &str {
        match self {
            CompanyType::PharmaManufacturing => "Pharma Manufacturing",
            CompanyType::Research => "Research",
            CompanyType::Food => "Food",
            CompanyType::Cosmetics => "Cosmetics",
            CompanyType::Nutraceuticals => "Nutraceuticals",
            CompanyType::Biotechnology => "Biotechnology",
            CompanyType::MedicalDevices => "Medical Devices",
            CompanyType::Chemical => "Chemical",
            CompanyType::Agriculture => "Agriculture",
            CompanyType::Other(name) => name,
        }
    }

    /// Maps a label onto a known category, falling back to `Other`
    pub fn from_label(s: &str) -> Self {
        let trimmed = s.trim();
        let wanted = normalize_key(trimmed);
        Self::known()
            .iter()
            .find(|t| normalize_key(t.label()) == wanted)
            .cloned()
            .unwrap_or_else(|| CompanyType::Other(trimmed.to_string()))
    }
}

impl From<String> for CompanyType {
    fn from(s: String) -> Self {
        CompanyType::from_label(&s)
    }
}

impl From<CompanyType> for String {
    fn from(t: CompanyType) -> Self {
        t.label().to_string()
    }
}

impl fmt::Display for CompanyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Progress of an equipment requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RequirementStatus {
    #[default]
    Pending,
    InProgress,
    Fulfilled,
    Cancelled,
}

impl RequirementStatus {
    pub fn all() -> &'static [RequirementStatus] {
        &[
            RequirementStatus::Pending,
            RequirementStatus::InProgress,
            RequirementStatus::Fulfilled,
            RequirementStatus::Cancelled,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementStatus::Pending => "pending",
            RequirementStatus::InProgress => "in-progress",
            RequirementStatus::Fulfilled => "fulfilled",
            RequirementStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        let wanted = normalize_key(s);
        Self::all()
            .iter()
            .copied()
            .find(|st| normalize_key(st.as_str()) == wanted)
    }
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lower-cases and drops separators so "Email Follow-up", "email_followup"
/// and "EmailFollowUp" compare equal.
fn normalize_key(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// A company the user visits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub company_type: CompanyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// URL or data-URI of the company logo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(owner_id: &str, name: String, company_type: CompanyType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            company_type,
            address: None,
            phone: None,
            logo: None,
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A contact person working at a company
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub company_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(owner_id: &str, name: String, company_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            company_id,
            position: None,
            email: None,
            phone: None,
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A recorded contact with a customer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub action_type: ActionType,
    pub visit_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_follow_up: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action_type: Option<ActionType>,
    #[serde(default)]
    pub status: VisitStatus,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl Visit {
    pub fn new(
        owner_id: &str,
        company_id: Uuid,
        customer_id: Uuid,
        action_type: ActionType,
        visit_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            customer_id,
            action_type,
            visit_date,
            notes: None,
            next_follow_up: None,
            next_action_type: None,
            status: VisitStatus::default(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Equipment a customer needs, recorded for later quoting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requirement {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub equipment_name: String,
    /// Free-form period, e.g. "Q3 2025" or "next 6 months"
    pub required_period: String,
    #[serde(default)]
    pub status: RequirementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub recorded_date: NaiveDate,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Requirement {
    pub fn new(
        owner_id: &str,
        company_id: Uuid,
        customer_id: Uuid,
        equipment_name: String,
        required_period: String,
        recorded_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id,
            customer_id,
            equipment_name,
            required_period,
            status: RequirementStatus::default(),
            notes: None,
            recorded_date,
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Catalog entry for equipment names offered when recording requirements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EquipmentType {
    pub id: Uuid,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl EquipmentType {
    pub fn new(owner_id: &str, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

// =========================================================================
// Partial updates
// =========================================================================

/// Field changes for a company. `None` leaves the field untouched; for
/// optional fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyPatch {
    pub name: Option<String>,
    pub company_type: Option<CompanyType>,
    pub address: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub logo: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub company_id: Option<Uuid>,
    pub position: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitPatch {
    pub company_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub action_type: Option<ActionType>,
    pub visit_date: Option<NaiveDate>,
    pub notes: Option<Option<String>>,
    pub next_follow_up: Option<Option<NaiveDate>>,
    pub next_action_type: Option<Option<ActionType>>,
    pub status: Option<VisitStatus>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequirementPatch {
    pub company_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub equipment_name: Option<String>,
    pub required_period: Option<String>,
    pub status: Option<RequirementStatus>,
    pub notes: Option<Option<String>>,
    pub recorded_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquipmentTypePatch {
    pub name: Option<String>,
}

fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

// =========================================================================
// Entity trait
// =========================================================================

/// A record kind held in one collection of the [`VisitStore`]
pub trait Entity: Clone + Sized {
    /// Partial update accepted by the store
    type Patch;

    /// Name used in messages, e.g. "Company"
    const KIND: &'static str;

    fn id(&self) -> Uuid;
    fn owner_id(&self) -> &str;

    fn collection(store: &VisitStore) -> &Vec<Self>;
    fn collection_mut(store: &mut VisitStore) -> &mut Vec<Self>;

    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Rejects an insert that would conflict with existing records
    fn check_insert(&self, _existing: &[Self]) -> Result<(), String> {
        Ok(())
    }
}

impl Entity for Company {
    type Patch = CompanyPatch;
    const KIND: &'static str = "Company";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn collection(store: &VisitStore) -> &Vec<Self> {
        &store.companies
    }

    fn collection_mut(store: &mut VisitStore) -> &mut Vec<Self> {
        &mut store.companies
    }

    fn apply_patch(&mut self, patch: &CompanyPatch) {
        set(&mut self.name, &patch.name);
        set(&mut self.company_type, &patch.company_type);
        set(&mut self.address, &patch.address);
        set(&mut self.phone, &patch.phone);
        set(&mut self.logo, &patch.logo);
    }
}

impl Entity for Customer {
    type Patch = CustomerPatch;
    const KIND: &'static str = "Customer";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn collection(store: &VisitStore) -> &Vec<Self> {
        &store.customers
    }

    fn collection_mut(store: &mut VisitStore) -> &mut Vec<Self> {
        &mut store.customers
    }

    fn apply_patch(&mut self, patch: &CustomerPatch) {
        set(&mut self.name, &patch.name);
        set(&mut self.company_id, &patch.company_id);
        set(&mut self.position, &patch.position);
        set(&mut self.email, &patch.email);
        set(&mut self.phone, &patch.phone);
    }
}

impl Entity for Visit {
    type Patch = VisitPatch;
    const KIND: &'static str = "Visit";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn collection(store: &VisitStore) -> &Vec<Self> {
        &store.visits
    }

    fn collection_mut(store: &mut VisitStore) -> &mut Vec<Self> {
        &mut store.visits
    }

    fn apply_patch(&mut self, patch: &VisitPatch) {
        set(&mut self.company_id, &patch.company_id);
        set(&mut self.customer_id, &patch.customer_id);
        set(&mut self.action_type, &patch.action_type);
        set(&mut self.visit_date, &patch.visit_date);
        set(&mut self.notes, &patch.notes);
        set(&mut self.next_follow_up, &patch.next_follow_up);
        set(&mut self.next_action_type, &patch.next_action_type);
        set(&mut self.status, &patch.status);
    }
}

impl Entity for Requirement {
    type Patch = RequirementPatch;
    const KIND: &'static str = "Requirement";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn collection(store: &VisitStore) -> &Vec<Self> {
        &store.requirements
    }

    fn collection_mut(store: &mut VisitStore) -> &mut Vec<Self> {
        &mut store.requirements
    }

    fn apply_patch(&mut self, patch: &RequirementPatch) {
        set(&mut self.company_id, &patch.company_id);
        set(&mut self.customer_id, &patch.customer_id);
        set(&mut self.equipment_name, &patch.equipment_name);
        set(&mut self.required_period, &patch.required_period);
        set(&mut self.status, &patch.status);
        set(&mut self.notes, &patch.notes);
        set(&mut self.recorded_date, &patch.recorded_date);
        self.updated_at = Utc::now();
    }
}

impl Entity for EquipmentType {
    type Patch = EquipmentTypePatch;
    const KIND: &'static str = "Equipment type";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn collection(store: &VisitStore) -> &Vec<Self> {
        &store.equipment_types
    }

    fn collection_mut(store: &mut VisitStore) -> &mut Vec<Self> {
        &mut store.equipment_types
    }

    fn apply_patch(&mut self, patch: &EquipmentTypePatch) {
        set(&mut self.name, &patch.name);
    }

    fn check_insert(&self, existing: &[Self]) -> Result<(), String> {
        let lowered = self.name.to_lowercase();
        if existing
            .iter()
            .any(|e| e.owner_id == self.owner_id && e.name.to_lowercase() == lowered)
        {
            return Err(format!("Equipment type '{}' already exists", self.name));
        }
        Ok(())
    }
}

// =========================================================================
// Store
// =========================================================================

/// Every persisted collection, as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitStore {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub visits: Vec<Visit>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub equipment_types: Vec<EquipmentType>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl VisitStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            companies: Vec::new(),
            customers: Vec::new(),
            visits: Vec::new(),
            requirements: Vec::new(),
            equipment_types: Vec::new(),
        }
    }

    /// Returns a copy holding only the records owned by `owner_id`
    pub fn owned_by(&self, owner_id: &str) -> VisitStore {
        fn keep<E: Entity>(records: &[E], owner_id: &str) -> Vec<E> {
            records
                .iter()
                .filter(|r| r.owner_id() == owner_id)
                .cloned()
                .collect()
        }

        VisitStore {
            schema_version: self.schema_version,
            companies: keep(&self.companies, owner_id),
            customers: keep(&self.customers, owner_id),
            visits: keep(&self.visits, owner_id),
            requirements: keep(&self.requirements, owner_id),
            equipment_types: keep(&self.equipment_types, owner_id),
        }
    }

    pub fn get_company_by_id(&self, id: &Uuid) -> Option<&Company> {
        self.companies.iter().find(|c| c.id == *id)
    }

    pub fn get_customer_by_id(&self, id: &Uuid) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == *id)
    }

    pub fn get_visit_by_id(&self, id: &Uuid) -> Option<&Visit> {
        self.visits.iter().find(|v| v.id == *id)
    }

    pub fn get_requirement_by_id(&self, id: &Uuid) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == *id)
    }
}

impl Default for VisitStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_from_label() {
        assert_eq!(ActionType::from_label("Email Follow-up"), Some(ActionType::EmailFollowUp));
        assert_eq!(ActionType::from_label("email_followup"), Some(ActionType::EmailFollowUp));
        assert_eq!(ActionType::from_label("site-visit"), Some(ActionType::SiteVisit));
        assert_eq!(ActionType::from_label("Lunch"), None);
    }

    #[test]
    fn test_company_type_known_and_other() {
        assert_eq!(CompanyType::from_label("medical devices"), CompanyType::MedicalDevices);
        assert_eq!(CompanyType::from_label(" Tech "), CompanyType::Other("Tech".into()));
        assert_eq!(CompanyType::Other("Tech".into()).label(), "Tech");
    }

    #[test]
    fn test_company_type_serializes_as_label() {
        let company = Company::new("u1", "Acme".into(), CompanyType::PharmaManufacturing);
        let yaml = serde_yaml::to_string(&company).unwrap();
        assert!(yaml.contains("type: Pharma Manufacturing"));

        let back: Company = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.company_type, CompanyType::PharmaManufacturing);
    }

    #[test]
    fn test_visit_status_serde_lowercase() {
        let json = serde_json::to_string(&VisitStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        assert_eq!(VisitStatus::from_label("Canceled"), Some(VisitStatus::Cancelled));
    }

    #[test]
    fn test_company_patch_clears_optional_fields() {
        let mut company = Company::new("u1", "Acme".into(), CompanyType::Food);
        company.phone = Some("+1 555 123 4567".into());

        company.apply_patch(&CompanyPatch {
            name: Some("Acme Foods".into()),
            phone: Some(None),
            ..Default::default()
        });

        assert_eq!(company.name, "Acme Foods");
        assert_eq!(company.phone, None);
        assert_eq!(company.company_type, CompanyType::Food);
    }

    #[test]
    fn test_requirement_patch_touches_updated_at() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let mut req = Requirement::new(
            "u1",
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Autoclave".into(),
            "Q3".into(),
            date,
        );
        let before = req.updated_at;
        req.apply_patch(&RequirementPatch {
            status: Some(RequirementStatus::Fulfilled),
            ..Default::default()
        });
        assert_eq!(req.status, RequirementStatus::Fulfilled);
        assert!(req.updated_at >= before);
    }

    #[test]
    fn test_equipment_type_duplicate_names_rejected_per_owner() {
        let existing = vec![EquipmentType::new("u1", "Blister Pack".into())];

        assert!(EquipmentType::new("u1", "blister pack".into())
            .check_insert(&existing)
            .is_err());
        assert!(EquipmentType::new("u2", "Blister Pack".into())
            .check_insert(&existing)
            .is_ok());
    }

    #[test]
    fn test_owned_by_filters_every_collection() {
        let mut store = VisitStore::new();
        let mine = Company::new("u1", "Mine".into(), CompanyType::Food);
        let theirs = Company::new("u2", "Theirs".into(), CompanyType::Food);
        store.customers.push(Customer::new("u2", "Bob".into(), theirs.id));
        store.companies.push(mine.clone());
        store.companies.push(theirs);

        let scoped = store.owned_by("u1");
        assert_eq!(scoped.companies, vec![mine]);
        assert!(scoped.customers.is_empty());
    }
}
