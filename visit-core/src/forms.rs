//! Form drafts
//!
//! A draft holds raw user input for one entity. `validate` sanitizes every
//! field and reports the first problem as a [`ValidationError`]; a validated
//! draft converts into a new record or into a patch for an existing one.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::audit;
use crate::models::{
    ActionType, Company, CompanyPatch, CompanyType, Customer, CustomerPatch, Requirement,
    RequirementPatch, RequirementStatus, Visit, VisitPatch, VisitStatus,
};
use crate::validation::{
    is_safe_logo, sanitize_input, sanitize_text_content, validate_company_name,
    validate_customer_name, validate_email, validate_phone, ValidationError,
};

fn optional(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn clean(field: &'static str, raw: &str) -> String {
    let sanitized = sanitize_input(raw);
    audit::note_sanitized(field, raw, &sanitized);
    sanitized
}

fn clean_text(field: &'static str, raw: &str) -> String {
    let sanitized = sanitize_text_content(raw);
    audit::note_sanitized(field, raw, &sanitized);
    sanitized
}

fn checked_phone(raw: &str) -> Result<String, ValidationError> {
    let phone = clean("phone", raw);
    if !validate_phone(&phone) {
        return Err(ValidationError::new(
            "phone",
            "Phone number must have at least 10 digits",
        ));
    }
    Ok(phone)
}

/// Raw input for a company
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyDraft {
    pub name: String,
    pub company_type: String,
    pub address: String,
    pub phone: String,
    pub logo: String,
}

impl CompanyDraft {
    /// Pre-fills a draft from an existing company, for editing
    pub fn from_company(company: &Company) -> Self {
        Self {
            name: company.name.clone(),
            company_type: company.company_type.label().to_string(),
            address: company.address.clone().unwrap_or_default(),
            phone: company.phone.clone().unwrap_or_default(),
            logo: company.logo.clone().unwrap_or_default(),
        }
    }

    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = validate_company_name(&self.name).into_result("name")?;

        let company_type = clean("type", &self.company_type);
        if company_type.is_empty() {
            return Err(ValidationError::new("type", "Company type is required"));
        }

        let phone = checked_phone(&self.phone)?;

        let logo = self.logo.trim().to_string();
        if !is_safe_logo(&logo) {
            audit::log_suspicious_activity("Rejected markup or script in company logo", None);
            return Err(ValidationError::new("logo", "Logo must be an image URL"));
        }

        Ok(Self {
            name,
            company_type,
            address: clean("address", &self.address),
            phone,
            logo,
        })
    }

    /// Builds a new company. Call on a validated draft.
    pub fn into_company(self, owner_id: &str) -> Company {
        let mut company = Company::new(
            owner_id,
            self.name,
            CompanyType::from_label(&self.company_type),
        );
        company.address = optional(self.address);
        company.phone = optional(self.phone);
        company.logo = optional(self.logo);
        company
    }

    /// Builds a patch replacing every editable field. Call on a validated draft.
    pub fn into_patch(self) -> CompanyPatch {
        CompanyPatch {
            name: Some(self.name),
            company_type: Some(CompanyType::from_label(&self.company_type)),
            address: Some(optional(self.address)),
            phone: Some(optional(self.phone)),
            logo: Some(optional(self.logo)),
        }
    }
}

/// Raw input for a customer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerDraft {
    pub name: String,
    pub company_id: Option<Uuid>,
    pub position: String,
    pub email: String,
    pub phone: String,
}

impl CustomerDraft {
    pub fn from_customer(customer: &Customer) -> Self {
        Self {
            name: customer.name.clone(),
            company_id: Some(customer.company_id),
            position: customer.position.clone().unwrap_or_default(),
            email: customer.email.clone().unwrap_or_default(),
            phone: customer.phone.clone().unwrap_or_default(),
        }
    }

    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = validate_customer_name(&self.name).into_result("name")?;

        if self.company_id.is_none() {
            return Err(ValidationError::new("company", "Company is required"));
        }

        let email = clean("email", &self.email);
        if !email.is_empty() && !validate_email(&email) {
            return Err(ValidationError::new("email", "Invalid email address"));
        }

        Ok(Self {
            name,
            company_id: self.company_id,
            position: clean("position", &self.position),
            email,
            phone: checked_phone(&self.phone)?,
        })
    }

    /// Builds a new customer, or `None` when the company was never set.
    /// A validated draft always has one.
    pub fn into_customer(self, owner_id: &str) -> Option<Customer> {
        let mut customer = Customer::new(owner_id, self.name, self.company_id?);
        customer.position = optional(self.position);
        customer.email = optional(self.email);
        customer.phone = optional(self.phone);
        Some(customer)
    }

    pub fn into_patch(self) -> CustomerPatch {
        CustomerPatch {
            name: Some(self.name),
            company_id: self.company_id,
            position: Some(optional(self.position)),
            email: Some(optional(self.email)),
            phone: Some(optional(self.phone)),
        }
    }
}

/// Raw input for a visit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitDraft {
    pub company_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub action_type: Option<ActionType>,
    pub visit_date: Option<NaiveDate>,
    pub notes: String,
    pub next_follow_up: Option<NaiveDate>,
    pub next_action_type: Option<ActionType>,
    pub status: VisitStatus,
}

impl VisitDraft {
    pub fn from_visit(visit: &Visit) -> Self {
        Self {
            company_id: Some(visit.company_id),
            customer_id: Some(visit.customer_id),
            action_type: Some(visit.action_type),
            visit_date: Some(visit.visit_date),
            notes: visit.notes.clone().unwrap_or_default(),
            next_follow_up: visit.next_follow_up,
            next_action_type: visit.next_action_type,
            status: visit.status,
        }
    }

    /// Checks required fields and that the customer works at the chosen
    /// company. Customers missing from `customers` are not checked.
    pub fn validate(self, customers: &[Customer]) -> Result<Self, ValidationError> {
        let Some(company_id) = self.company_id else {
            return Err(ValidationError::new("company", "Company is required"));
        };
        let Some(customer_id) = self.customer_id else {
            return Err(ValidationError::new("customer", "Customer is required"));
        };
        if self.action_type.is_none() {
            return Err(ValidationError::new("action_type", "Action type is required"));
        }
        if self.visit_date.is_none() {
            return Err(ValidationError::new("visit_date", "Visit date is required"));
        }

        if let Some(customer) = customers.iter().find(|c| c.id == customer_id) {
            if customer.company_id != company_id {
                return Err(ValidationError::new(
                    "customer",
                    "Customer does not belong to the selected company",
                ));
            }
        }

        Ok(Self {
            notes: clean_text("notes", &self.notes),
            ..self
        })
    }

    /// Builds a new visit, or `None` when a required field is missing.
    /// A validated draft always has them.
    pub fn into_visit(self, owner_id: &str) -> Option<Visit> {
        let mut visit = Visit::new(
            owner_id,
            self.company_id?,
            self.customer_id?,
            self.action_type?,
            self.visit_date?,
        );
        visit.notes = optional(self.notes);
        visit.next_follow_up = self.next_follow_up;
        visit.next_action_type = self.next_action_type;
        visit.status = self.status;
        Some(visit)
    }

    pub fn into_patch(self) -> VisitPatch {
        VisitPatch {
            company_id: self.company_id,
            customer_id: self.customer_id,
            action_type: self.action_type,
            visit_date: self.visit_date,
            notes: Some(optional(self.notes)),
            next_follow_up: Some(self.next_follow_up),
            next_action_type: Some(self.next_action_type),
            status: Some(self.status),
        }
    }
}

/// Raw input for an equipment requirement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequirementDraft {
    pub company_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub equipment_name: String,
    pub required_period: String,
    pub status: RequirementStatus,
    pub notes: String,
    pub recorded_date: Option<NaiveDate>,
}

impl RequirementDraft {
    pub fn from_requirement(req: &Requirement) -> Self {
        Self {
            company_id: Some(req.company_id),
            customer_id: Some(req.customer_id),
            equipment_name: req.equipment_name.clone(),
            required_period: req.required_period.clone(),
            status: req.status,
            notes: req.notes.clone().unwrap_or_default(),
            recorded_date: Some(req.recorded_date),
        }
    }

    pub fn validate(self, customers: &[Customer]) -> Result<Self, ValidationError> {
        let Some(company_id) = self.company_id else {
            return Err(ValidationError::new("company", "Company is required"));
        };
        let Some(customer_id) = self.customer_id else {
            return Err(ValidationError::new("customer", "Customer is required"));
        };

        let equipment_name = clean("equipment_name", &self.equipment_name);
        if equipment_name.is_empty() {
            return Err(ValidationError::new("equipment_name", "Equipment is required"));
        }
        let required_period = clean("required_period", &self.required_period);
        if required_period.is_empty() {
            return Err(ValidationError::new(
                "required_period",
                "Required period is required",
            ));
        }
        if self.recorded_date.is_none() {
            return Err(ValidationError::new("recorded_date", "Recorded date is required"));
        }

        if let Some(customer) = customers.iter().find(|c| c.id == customer_id) {
            if customer.company_id != company_id {
                return Err(ValidationError::new(
                    "customer",
                    "Customer does not belong to the selected company",
                ));
            }
        }

        Ok(Self {
            equipment_name,
            required_period,
            notes: clean_text("notes", &self.notes),
            ..self
        })
    }

    pub fn into_requirement(self, owner_id: &str) -> Option<Requirement> {
        let mut req = Requirement::new(
            owner_id,
            self.company_id?,
            self.customer_id?,
            self.equipment_name,
            self.required_period,
            self.recorded_date?,
        );
        req.status = self.status;
        req.notes = optional(self.notes);
        Some(req)
    }

    pub fn into_patch(self) -> RequirementPatch {
        RequirementPatch {
            company_id: self.company_id,
            customer_id: self.customer_id,
            equipment_name: Some(self.equipment_name),
            required_period: Some(self.required_period),
            status: Some(self.status),
            notes: Some(optional(self.notes)),
            recorded_date: self.recorded_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_company_draft_sanitizes_fields() {
        let draft = CompanyDraft {
            name: "  <Acme> Labs ".into(),
            company_type: "biotechnology".into(),
            address: " 1 Main St ".into(),
            phone: "".into(),
            logo: "".into(),
        };

        let company = draft.validate().unwrap().into_company("u1");
        assert_eq!(company.name, "Acme Labs");
        assert_eq!(company.company_type, CompanyType::Biotechnology);
        assert_eq!(company.address.as_deref(), Some("1 Main St"));
        assert_eq!(company.phone, None);
        assert_eq!(company.owner_id, "u1");
    }

    #[test]
    fn test_company_draft_rejects_bad_input() {
        let short = CompanyDraft {
            name: "A".into(),
            company_type: "Food".into(),
            ..Default::default()
        };
        assert_eq!(short.validate().unwrap_err().field, "name");

        let no_type = CompanyDraft {
            name: "Acme".into(),
            ..Default::default()
        };
        assert_eq!(no_type.validate().unwrap_err().field, "type");

        let bad_phone = CompanyDraft {
            name: "Acme".into(),
            company_type: "Food".into(),
            phone: "123".into(),
            ..Default::default()
        };
        assert_eq!(bad_phone.validate().unwrap_err().field, "phone");

        let bad_logo = CompanyDraft {
            name: "Acme".into(),
            company_type: "Food".into(),
            logo: "javascript:alert(1)".into(),
            ..Default::default()
        };
        assert_eq!(bad_logo.validate().unwrap_err().field, "logo");

        let markup_logo = CompanyDraft {
            name: "Acme".into(),
            company_type: "Food".into(),
            logo: "<svg onload=alert(1)>".into(),
            ..Default::default()
        };
        assert_eq!(markup_logo.validate().unwrap_err().field, "logo");

        let url_logo = CompanyDraft {
            name: "Acme".into(),
            company_type: "Food".into(),
            logo: " https://cdn.example.com/acme.png ".into(),
            ..Default::default()
        };
        let company = url_logo.validate().unwrap().into_company("u1");
        assert_eq!(company.logo.as_deref(), Some("https://cdn.example.com/acme.png"));
    }

    #[test]
    fn test_customer_draft_email_optional_but_checked() {
        let company_id = Uuid::new_v4();
        let ok = CustomerDraft {
            name: "Jane Roe".into(),
            company_id: Some(company_id),
            ..Default::default()
        };
        let customer = ok.validate().unwrap().into_customer("u1").unwrap();
        assert_eq!(customer.email, None);
        assert_eq!(customer.company_id, company_id);

        let bad = CustomerDraft {
            name: "Jane Roe".into(),
            company_id: Some(company_id),
            email: "jane@".into(),
            ..Default::default()
        };
        assert_eq!(bad.validate().unwrap_err().field, "email");
    }

    #[test]
    fn test_visit_draft_requires_fields() {
        let draft = VisitDraft {
            company_id: Some(Uuid::new_v4()),
            customer_id: Some(Uuid::new_v4()),
            action_type: Some(ActionType::Call),
            ..Default::default()
        };
        assert_eq!(draft.validate(&[]).unwrap_err().field, "visit_date");
    }

    #[test]
    fn test_visit_draft_checks_customer_company() {
        let acme = Uuid::new_v4();
        let other = Uuid::new_v4();
        let jane = Customer::new("u1", "Jane".into(), other);

        let draft = VisitDraft {
            company_id: Some(acme),
            customer_id: Some(jane.id),
            action_type: Some(ActionType::Meeting),
            visit_date: Some(date(2024, 3, 1)),
            ..Default::default()
        };
        let err = draft.validate(std::slice::from_ref(&jane)).unwrap_err();
        assert_eq!(err.field, "customer");
    }

    #[test]
    fn test_visit_draft_sanitizes_notes() {
        let acme = Uuid::new_v4();
        let jane = Customer::new("u1", "Jane".into(), acme);
        let draft = VisitDraft {
            company_id: Some(acme),
            customer_id: Some(jane.id),
            action_type: Some(ActionType::ProductDemo),
            visit_date: Some(date(2024, 3, 1)),
            notes: "Demo went well <script>x()</script>".into(),
            next_follow_up: Some(date(2024, 3, 8)),
            ..Default::default()
        };

        let visit = draft.validate(&[jane]).unwrap().into_visit("u1").unwrap();
        assert_eq!(visit.notes.as_deref(), Some("Demo went well"));
        assert_eq!(visit.next_follow_up, Some(date(2024, 3, 8)));
        assert_eq!(visit.status, VisitStatus::Completed);
    }

    #[test]
    fn test_visit_draft_round_trips_through_patch() {
        let acme = Uuid::new_v4();
        let mut visit = Visit::new("u1", acme, Uuid::new_v4(), ActionType::Call, date(2024, 1, 1));
        visit.notes = Some("old".into());

        let mut draft = VisitDraft::from_visit(&visit);
        draft.notes = String::new();
        draft.status = VisitStatus::Pending;

        let patch = draft.validate(&[]).unwrap().into_patch();
        crate::models::Entity::apply_patch(&mut visit, &patch);
        assert_eq!(visit.notes, None);
        assert_eq!(visit.status, VisitStatus::Pending);
    }

    #[test]
    fn test_requirement_draft() {
        let acme = Uuid::new_v4();
        let draft = RequirementDraft {
            company_id: Some(acme),
            customer_id: Some(Uuid::new_v4()),
            equipment_name: " Tablet Press ".into(),
            required_period: "Q3 2025".into(),
            recorded_date: Some(date(2025, 1, 15)),
            ..Default::default()
        };
        let req = draft.validate(&[]).unwrap().into_requirement("u1").unwrap();
        assert_eq!(req.equipment_name, "Tablet Press");
        assert_eq!(req.status, RequirementStatus::Pending);

        let missing = RequirementDraft {
            company_id: Some(acme),
            customer_id: Some(Uuid::new_v4()),
            equipment_name: "Press".into(),
            recorded_date: Some(date(2025, 1, 15)),
            ..Default::default()
        };
        assert_eq!(missing.validate(&[]).unwrap_err().field, "required_period");
    }
}
