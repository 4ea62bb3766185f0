//! Cross-entity lookups used by listings, filters and exports
//!
//! Lookups never fail: a dangling reference resolves to a placeholder so a
//! row can always be rendered.

use uuid::Uuid;

use crate::models::{Company, Customer, VisitStore};

pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_CUSTOMER: &str = "Unknown Customer";
pub const UNKNOWN_TYPE: &str = "Unknown Type";

/// Borrowed view over the company and customer collections
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    companies: &'a [Company],
    customers: &'a [Customer],
}

impl<'a> Resolver<'a> {
    pub fn new(companies: &'a [Company], customers: &'a [Customer]) -> Self {
        Self {
            companies,
            customers,
        }
    }

    pub fn from_store(store: &'a VisitStore) -> Self {
        Self::new(&store.companies, &store.customers)
    }

    pub fn company(&self, id: &Uuid) -> Option<&'a Company> {
        self.companies.iter().find(|c| c.id == *id)
    }

    pub fn customer(&self, id: &Uuid) -> Option<&'a Customer> {
        self.customers.iter().find(|c| c.id == *id)
    }

    pub fn company_name(&self, id: &Uuid) -> &'a str {
        self.company(id).map_or(UNKNOWN_COMPANY, |c| c.name.as_str())
    }

    pub fn company_type(&self, id: &Uuid) -> &'a str {
        self.company(id).map_or(UNKNOWN_TYPE, |c| c.company_type.label())
    }

    pub fn company_logo(&self, id: &Uuid) -> Option<&'a str> {
        self.company(id).and_then(|c| c.logo.as_deref())
    }

    pub fn customer_name(&self, id: &Uuid) -> &'a str {
        self.customer(id).map_or(UNKNOWN_CUSTOMER, |c| c.name.as_str())
    }

    /// Customers working at `company_id`; empty when no company is chosen
    pub fn customers_of(&self, company_id: Option<&Uuid>) -> Vec<&'a Customer> {
        match company_id {
            Some(id) => self
                .customers
                .iter()
                .filter(|c| c.company_id == *id)
                .collect(),
            None => Vec::new(),
        }
    }
}
