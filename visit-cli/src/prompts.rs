use anyhow::Result;
use chrono::NaiveDate;
use inquire::validator::Validation;
use inquire::{Confirm, Editor, Select, Text};
use std::fmt;
use uuid::Uuid;

use visit_core::{
    ActionType, Company, CompanyDraft, CompanyType, Customer, CustomerDraft, RequirementDraft,
    RequirementStatus, Resolver, VisitDraft, VisitStatus,
};

type ValidatorError = Box<dyn std::error::Error + Send + Sync>;

const DATE_INPUT: &str = "%Y-%m-%d";
const OTHER_TYPE: &str = "Other (type a new one)";

/// A record offered in a selection list
#[derive(Debug, Clone)]
pub struct Choice {
    pub id: Uuid,
    pub label: String,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Prompts the user to pick one record, starting at `current` when given
pub fn prompt_select(message: &str, choices: Vec<Choice>, current: Option<Uuid>) -> Result<Uuid> {
    if choices.is_empty() {
        anyhow::bail!("Nothing to choose from for '{}'", message.trim_end_matches(':'));
    }
    let start = current
        .and_then(|id| choices.iter().position(|c| c.id == id))
        .unwrap_or(0);
    let choice = Select::new(message, choices)
        .with_starting_cursor(start)
        .prompt()?;
    Ok(choice.id)
}

fn company_choices(companies: &[Company]) -> Vec<Choice> {
    companies
        .iter()
        .map(|c| Choice {
            id: c.id,
            label: format!("{} ({})", c.name, c.company_type),
        })
        .collect()
}

fn customer_choices(customers: &[&Customer]) -> Vec<Choice> {
    customers
        .iter()
        .map(|c| Choice {
            id: c.id,
            label: match &c.position {
                Some(position) => format!("{} - {}", c.name, position),
                None => c.name.clone(),
            },
        })
        .collect()
}

/// Asks for a date in YYYY-MM-DD form. An empty answer is allowed only
/// when the date is optional.
fn prompt_date(message: &str, initial: Option<NaiveDate>, required: bool) -> Result<Option<NaiveDate>> {
    let initial = initial
        .map(|d| d.format(DATE_INPUT).to_string())
        .unwrap_or_default();
    let input = Text::new(message)
        .with_initial_value(&initial)
        .with_help_message("YYYY-MM-DD")
        .with_validator(move |input: &str| -> Result<Validation, ValidatorError> {
            let input = input.trim();
            if input.is_empty() {
                return Ok(if required {
                    Validation::Invalid("A date is required".into())
                } else {
                    Validation::Valid
                });
            }
            Ok(match NaiveDate::parse_from_str(input, DATE_INPUT) {
                Ok(_) => Validation::Valid,
                Err(_) => Validation::Invalid("Use the form YYYY-MM-DD".into()),
            })
        })
        .prompt()?;

    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    Ok(Some(NaiveDate::parse_from_str(input, DATE_INPUT)?))
}

/// Prompts for company details, pre-filled from `initial`
pub fn prompt_company(initial: CompanyDraft, known_types: &[String]) -> Result<CompanyDraft> {
    let name = Text::new("Company name:")
        .with_initial_value(&initial.name)
        .prompt()?;

    // Built-in categories first, then custom ones already in use
    let mut type_options: Vec<String> = CompanyType::known()
        .iter()
        .map(|t| t.label().to_string())
        .collect();
    for custom in known_types {
        if !type_options.contains(custom) {
            type_options.push(custom.clone());
        }
    }
    if !initial.company_type.is_empty() && !type_options.contains(&initial.company_type) {
        type_options.push(initial.company_type.clone());
    }
    let start = type_options
        .iter()
        .position(|t| *t == initial.company_type)
        .unwrap_or(0);
    type_options.push(OTHER_TYPE.to_string());

    let mut company_type = Select::new("Company type:", type_options)
        .with_starting_cursor(start)
        .prompt()?;
    if company_type == OTHER_TYPE {
        company_type = Text::new("New company type:").prompt()?;
    }

    let address = Text::new("Address:")
        .with_initial_value(&initial.address)
        .prompt()?;
    let phone = Text::new("Phone:")
        .with_initial_value(&initial.phone)
        .with_help_message("optional, at least 10 digits")
        .prompt()?;
    let logo = Text::new("Logo URL:")
        .with_initial_value(&initial.logo)
        .with_help_message("optional")
        .prompt()?;

    Ok(CompanyDraft {
        name,
        company_type,
        address,
        phone,
        logo,
    })
}

/// Prompts for customer details
pub fn prompt_customer(initial: CustomerDraft, companies: &[Company]) -> Result<CustomerDraft> {
    let name = Text::new("Customer name:")
        .with_initial_value(&initial.name)
        .prompt()?;
    let company_id = prompt_select("Company:", company_choices(companies), initial.company_id)?;
    let position = Text::new("Position:")
        .with_initial_value(&initial.position)
        .prompt()?;
    let email = Text::new("Email:")
        .with_initial_value(&initial.email)
        .with_help_message("optional")
        .prompt()?;
    let phone = Text::new("Phone:")
        .with_initial_value(&initial.phone)
        .with_help_message("optional, at least 10 digits")
        .prompt()?;

    Ok(CustomerDraft {
        name,
        company_id: Some(company_id),
        position,
        email,
        phone,
    })
}

fn prompt_action(message: &str, current: Option<ActionType>) -> Result<ActionType> {
    let options = ActionType::all().to_vec();
    let start = current
        .and_then(|a| options.iter().position(|o| *o == a))
        .unwrap_or(0);
    Ok(Select::new(message, options)
        .with_starting_cursor(start)
        .prompt()?)
}

/// Company, then one of its customers
fn prompt_company_and_customer(
    companies: &[Company],
    resolver: &Resolver<'_>,
    company: Option<Uuid>,
    customer: Option<Uuid>,
) -> Result<(Uuid, Uuid)> {
    let company_id = prompt_select("Company:", company_choices(companies), company)?;
    let customers = resolver.customers_of(Some(&company_id));
    if customers.is_empty() {
        anyhow::bail!("This company has no customers yet. Add one with 'visits customer add'.");
    }
    let customer_id = prompt_select("Customer:", customer_choices(&customers), customer)?;
    Ok((company_id, customer_id))
}

/// Prompts for a visit
pub fn prompt_visit(
    initial: VisitDraft,
    companies: &[Company],
    resolver: &Resolver<'_>,
) -> Result<VisitDraft> {
    let (company_id, customer_id) =
        prompt_company_and_customer(companies, resolver, initial.company_id, initial.customer_id)?;
    let action_type = prompt_action("Action type:", initial.action_type)?;
    let visit_date = prompt_date("Visit date:", initial.visit_date, true)?;

    let notes = Editor::new("Notes:")
        .with_predefined_text(&initial.notes)
        .prompt()?;

    let plan_follow_up = Confirm::new("Plan a follow-up?")
        .with_default(initial.next_follow_up.is_some())
        .prompt()?;
    let (next_follow_up, next_action_type) = if plan_follow_up {
        let date = prompt_date("Follow-up date:", initial.next_follow_up, true)?;
        let action = prompt_action("Follow-up action:", initial.next_action_type)?;
        (date, Some(action))
    } else {
        (None, None)
    };

    let statuses = VisitStatus::all().to_vec();
    let start = statuses
        .iter()
        .position(|s| *s == initial.status)
        .unwrap_or(0);
    let status = Select::new("Status:", statuses)
        .with_starting_cursor(start)
        .prompt()?;

    Ok(VisitDraft {
        company_id: Some(company_id),
        customer_id: Some(customer_id),
        action_type: Some(action_type),
        visit_date,
        notes,
        next_follow_up,
        next_action_type,
        status,
    })
}

/// Prompts for an equipment requirement. Equipment can be picked from the
/// catalog or typed in.
pub fn prompt_requirement(
    initial: RequirementDraft,
    companies: &[Company],
    resolver: &Resolver<'_>,
    catalog: &[String],
) -> Result<RequirementDraft> {
    let (company_id, customer_id) =
        prompt_company_and_customer(companies, resolver, initial.company_id, initial.customer_id)?;

    let equipment_name = if catalog.is_empty() {
        Text::new("Equipment:")
            .with_initial_value(&initial.equipment_name)
            .prompt()?
    } else {
        let mut options = catalog.to_vec();
        let start = options
            .iter()
            .position(|e| *e == initial.equipment_name)
            .unwrap_or(0);
        options.push(OTHER_TYPE.to_string());
        let picked = Select::new("Equipment:", options)
            .with_starting_cursor(start)
            .prompt()?;
        if picked == OTHER_TYPE {
            Text::new("Equipment name:").prompt()?
        } else {
            picked
        }
    };

    let required_period = Text::new("Required period:")
        .with_initial_value(&initial.required_period)
        .with_help_message("e.g. Q3 2025, next 6 months")
        .prompt()?;

    let statuses = RequirementStatus::all().to_vec();
    let start = statuses
        .iter()
        .position(|s| *s == initial.status)
        .unwrap_or(0);
    let status = Select::new("Status:", statuses)
        .with_starting_cursor(start)
        .prompt()?;

    let recorded_date = prompt_date("Recorded date:", initial.recorded_date, true)?;
    let notes = Text::new("Notes:")
        .with_initial_value(&initial.notes)
        .prompt()?;

    Ok(RequirementDraft {
        company_id: Some(company_id),
        customer_id: Some(customer_id),
        equipment_name,
        required_period,
        status,
        notes,
        recorded_date,
    })
}

/// Asks before a destructive action
pub fn confirm(message: &str) -> Result<bool> {
    Ok(Confirm::new(message).with_default(false).prompt()?)
}
