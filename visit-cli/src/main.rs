mod cli;
mod prompts;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use colored::{ColoredString, Colorize};
use inquire::InquireError;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use visit_core::config::USER_ENV;
use visit_core::db::{
    copy_store, export_backend_to_json, export_to_json, import_json_to_backend, DatabaseStats,
};
use visit_core::{
    classify_follow_up, create_backend, get_config_path, open_or_create, ActionType, Anonymous,
    AppConfig, BackendType, CompanyDraft, CustomerDraft, DateRange, IdentityProvider, Notice,
    NoticeLevel, Notifier, RequirementDraft, RequirementStatus, Selection, Session, SessionError,
    StaticIdentity, Visit, VisitDraft, VisitFilter, VisitStatus,
};

use crate::cli::{
    Cli, Command, CompanyCommand, ConfigCommand, CustomerCommand, DbCommand, EquipmentCommand,
    ExportCommand, RequirementCommand, VisitCommand, VisitFilterArgs,
};
use crate::prompts::confirm;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => Ok(()),
        Err(e) if is_cancelled(&e) => {
            println!("{}", "Cancelled.".yellow());
            Ok(())
        }
        // Session failures were already shown through the notifier
        Err(e) if e.is::<SessionError>() => std::process::exit(1),
        Err(e) => Err(e),
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<InquireError>(),
        Some(InquireError::OperationCanceled | InquireError::OperationInterrupted)
    )
}

fn run(cli: Cli) -> Result<()> {
    let config_path = get_config_path()?;
    let config = AppConfig::load(&config_path)?;
    let data_path = config.resolve_data_path(cli.file.clone())?;
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    log::debug!("Config {:?}, data file {:?}", config_path, data_path);
    let open = || open_session(&config, &data_path, cli.user.clone());

    match &cli.command {
        Command::Company(cmd) => handle_company_command(cmd, &mut open()?),
        Command::Customer(cmd) => handle_customer_command(cmd, &mut open()?),
        Command::Visit(cmd) => handle_visit_command(cmd, &mut open()?, today),
        Command::Requirement(cmd) => handle_requirement_command(cmd, &mut open()?, today),
        Command::Equipment(cmd) => handle_equipment_command(cmd, &mut open()?),
        Command::Dashboard => show_dashboard(&open()?, today),
        Command::Export(cmd) => handle_export_command(cmd, &open()?, today),
        Command::Db(DbCommand::Stats { all: false }) => {
            print_stats(&open()?.stats(), &data_path, "Current user")
        }
        Command::Db(cmd) => handle_db_command(cmd, &config, &data_path),
        Command::Config(cmd) => handle_config_command(cmd, &config, &config_path, &data_path),
    }
}

/// Prints session notices to the terminal
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => println!("{} {}", "✓".green(), notice.message),
            NoticeLevel::Info => println!("{} {}", "i".blue(), notice.message),
            NoticeLevel::Warning => {
                eprintln!("{} {}: {}", "!".yellow(), notice.title.yellow(), notice.message)
            }
            NoticeLevel::Error => {
                eprintln!("{} {}: {}", "✗".red(), notice.title.red(), notice.message)
            }
        }
    }
}

fn open_session(config: &AppConfig, data_path: &Path, user_flag: Option<String>) -> Result<Session> {
    let backend = open_or_create(data_path, config.backend)?;

    let identity: Box<dyn IdentityProvider> = match config.resolve_user(user_flag) {
        Some(user) => Box::new(StaticIdentity::new(user)),
        None => {
            println!(
                "{} No user set. Use --user or {} to see and change data.",
                "!".yellow(),
                USER_ENV
            );
            Box::new(Anonymous)
        }
    };

    let mut session = Session::new(backend, identity, Box::new(ConsoleNotifier))
        .with_follow_up_window(config.follow_up_window)
        .with_date_format(&config.date_format);
    session.refresh()?;
    Ok(session)
}

// =========================================================================
// Lookups and parsing
// =========================================================================

fn parse_uuid(id_str: &str) -> Result<Uuid> {
    Uuid::parse_str(id_str.trim()).with_context(|| format!("Invalid UUID: {}", id_str))
}

/// Accepts a UUID or an exact (case-insensitive) name
fn find_by_name<'a>(
    entries: impl IntoIterator<Item = (Uuid, &'a str)>,
    key: &str,
    kind: &str,
) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(key.trim()) {
        return Ok(uuid);
    }

    let wanted = key.trim().to_lowercase();
    let matches: Vec<Uuid> = entries
        .into_iter()
        .filter(|(_, name)| name.to_lowercase() == wanted)
        .map(|(id, _)| id)
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => anyhow::bail!("No {} named '{}'", kind, key),
        _ => anyhow::bail!("Several {}s are named '{}'; use the UUID instead", kind, key),
    }
}

fn find_company(session: &Session, key: &str) -> Result<Uuid> {
    find_by_name(
        session.companies().iter().map(|c| (c.id, c.name.as_str())),
        key,
        "company",
    )
}

fn find_customer(session: &Session, key: &str) -> Result<Uuid> {
    find_by_name(
        session.customers().iter().map(|c| (c.id, c.name.as_str())),
        key,
        "customer",
    )
}

fn find_equipment(session: &Session, key: &str) -> Result<Uuid> {
    find_by_name(
        session
            .equipment_types()
            .into_iter()
            .map(|t| (t.id, t.name.as_str())),
        key,
        "equipment type",
    )
}

fn parse_action(action_str: &str) -> Result<ActionType> {
    ActionType::from_label(action_str).with_context(|| {
        let known: Vec<&str> = ActionType::all().iter().map(|a| a.label()).collect();
        format!(
            "Invalid action type: {} (expected one of: {})",
            action_str,
            known.join(", ")
        )
    })
}

fn parse_visit_status(status_str: &str) -> Result<VisitStatus> {
    VisitStatus::from_label(status_str).with_context(|| {
        format!(
            "Invalid status: {} (expected completed, pending or cancelled)",
            status_str
        )
    })
}

fn parse_requirement_status(status_str: &str) -> Result<RequirementStatus> {
    RequirementStatus::from_label(status_str).with_context(|| {
        format!(
            "Invalid requirement status: {} (expected pending, in-progress, fulfilled or cancelled)",
            status_str
        )
    })
}

fn build_filter(args: &VisitFilterArgs, session: &Session) -> Result<VisitFilter> {
    Ok(VisitFilter {
        company: args
            .company
            .as_deref()
            .map(|c| find_company(session, c))
            .transpose()?
            .into(),
        customer: args
            .customer
            .as_deref()
            .map(|c| find_customer(session, c))
            .transpose()?
            .into(),
        action_type: args.action.as_deref().map(parse_action).transpose()?.into(),
        status: args
            .status
            .as_deref()
            .map(parse_visit_status)
            .transpose()?
            .into(),
        company_type: args.company_type.clone().into(),
        date_range: DateRange {
            start: args.from,
            end: args.to,
        },
    })
}

// =========================================================================
// Formatting
// =========================================================================

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn visit_status_colored(status: VisitStatus) -> ColoredString {
    match status {
        VisitStatus::Completed => status.as_str().green(),
        VisitStatus::Pending => status.as_str().yellow(),
        VisitStatus::Cancelled => status.as_str().red(),
    }
}

fn requirement_status_colored(status: RequirementStatus) -> ColoredString {
    match status {
        RequirementStatus::Pending => status.as_str().yellow(),
        RequirementStatus::InProgress => status.as_str().blue(),
        RequirementStatus::Fulfilled => status.as_str().green(),
        RequirementStatus::Cancelled => status.as_str().red(),
    }
}

fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn optional_str(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn print_visit_table(session: &Session, visits: &[&Visit], today: NaiveDate) {
    let resolver = session.resolver();
    println!(
        "{:<36} | {:<10} | {:<24} | {:<20} | {:<19} | {:<10} | {:<18}",
        "ID", "Date", "Company", "Customer", "Action", "Status", "Follow-up"
    );
    println!("{}", "-".repeat(156));

    for visit in visits {
        let follow_up = match visit.next_follow_up {
            Some(date) => format!("{} ({})", date_str(date), classify_follow_up(visit, today)),
            None => "-".to_string(),
        };
        println!(
            "{:<36} | {:<10} | {:<24} | {:<20} | {:<19} | {:<10} | {}",
            visit.id.to_string(),
            date_str(visit.visit_date),
            truncate(resolver.company_name(&visit.company_id), 24),
            truncate(resolver.customer_name(&visit.customer_id), 20),
            visit.action_type.label(),
            visit_status_colored(visit.status),
            follow_up
        );
    }
}

// =========================================================================
// Companies
// =========================================================================

fn handle_company_command(cmd: &CompanyCommand, session: &mut Session) -> Result<()> {
    match cmd {
        CompanyCommand::Add {
            name,
            r#type,
            address,
            phone,
            logo,
            interactive,
        } => {
            // Default to interactive mode if no specific arguments are provided
            let should_be_interactive = *interactive
                || (name.is_none()
                    && r#type.is_none()
                    && address.is_none()
                    && phone.is_none()
                    && logo.is_none());

            let draft = if should_be_interactive {
                prompts::prompt_company(CompanyDraft::default(), &session.company_types())?
            } else {
                CompanyDraft {
                    name: name
                        .clone()
                        .context("Company name is required. Use --name to specify one.")?,
                    company_type: r#type
                        .clone()
                        .context("Company type is required. Use --type to specify one.")?,
                    address: address.clone().unwrap_or_default(),
                    phone: phone.clone().unwrap_or_default(),
                    logo: logo.clone().unwrap_or_default(),
                }
            };

            let company = session.add_company(draft)?;
            println!("UUID: {}", company.id);
        }
        CompanyCommand::List { r#type } => {
            let companies: Vec<_> = session
                .companies()
                .iter()
                .filter(|c| {
                    r#type
                        .as_ref()
                        .map_or(true, |t| c.company_type.label().eq_ignore_ascii_case(t.trim()))
                })
                .collect();

            if companies.is_empty() {
                println!("{}", "No companies found.".yellow());
                return Ok(());
            }

            println!(
                "{:<36} | {:<30} | {:<22} | {:<18} | {:<6}",
                "ID", "Name", "Type", "Phone", "Visits"
            );
            println!("{}", "-".repeat(124));
            for company in companies {
                let visits = session
                    .visits()
                    .iter()
                    .filter(|v| v.company_id == company.id)
                    .count();
                println!(
                    "{:<36} | {:<30} | {:<22} | {:<18} | {:<6}",
                    company.id.to_string(),
                    truncate(&company.name, 30),
                    truncate(company.company_type.label(), 22),
                    optional_str(&company.phone),
                    visits
                );
            }
        }
        CompanyCommand::Show { company } => {
            let id = find_company(session, company)?;
            let company = session
                .companies()
                .iter()
                .find(|c| c.id == id)
                .context("Company not found")?;

            println!("{}: {}", "ID".blue(), company.id);
            println!("{}: {}", "Name".blue(), company.name);
            println!("{}: {}", "Type".blue(), company.company_type);
            println!("{}: {}", "Address".blue(), optional_str(&company.address));
            println!("{}: {}", "Phone".blue(), optional_str(&company.phone));
            if let Some(logo) = &company.logo {
                println!("{}: {}", "Logo".blue(), truncate(logo, 60));
            }
            println!("{}: {}", "Created".blue(), company.created_at);

            let resolver = session.resolver();
            let customers = resolver.customers_of(Some(&id));
            if !customers.is_empty() {
                println!("\n{}:", "Customers".green());
                for customer in customers {
                    println!(
                        "  {} {}",
                        customer.name,
                        customer.position.as_deref().unwrap_or("").cyan()
                    );
                }
            }

            let filter = VisitFilter {
                company: Selection::Only(id),
                ..Default::default()
            };
            let visits = session.filtered_visits(&filter);
            if !visits.is_empty() {
                println!("\n{}:", "Visits".green());
                for visit in visits.iter().take(10) {
                    println!(
                        "  {} {} with {} ({})",
                        date_str(visit.visit_date),
                        visit.action_type.label().cyan(),
                        resolver.customer_name(&visit.customer_id),
                        visit_status_colored(visit.status)
                    );
                }
                if visits.len() > 10 {
                    println!("  ... and {} more", visits.len() - 10);
                }
            }
        }
        CompanyCommand::Edit { company } => {
            let id = find_company(session, company)?;
            let current = session
                .companies()
                .iter()
                .find(|c| c.id == id)
                .context("Company not found")?;
            let draft = prompts::prompt_company(
                CompanyDraft::from_company(current),
                &session.company_types(),
            )?;
            session.update_company(&id, draft)?;
        }
        CompanyCommand::Del { company, yes } => {
            let id = find_company(session, company)?;
            let name = session.resolver().company_name(&id).to_string();

            println!("{}", "Company to delete:".yellow());
            println!("  ID: {}", id);
            println!("  Name: {}", name);

            if !*yes && !confirm("Are you sure you want to delete this company?")? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }
            session.delete_company(&id)?;
        }
        CompanyCommand::Import { path } => {
            let summary = session.import_companies_file(path)?;
            for company in &summary.imported {
                println!("  {} {} ({})", "+".green(), company.name, company.company_type);
            }
            for row in &summary.skipped {
                println!("  {} line {}: {}", "-".yellow(), row.line, row.reason);
            }
        }
    }

    Ok(())
}

// =========================================================================
// Customers
// =========================================================================

fn handle_customer_command(cmd: &CustomerCommand, session: &mut Session) -> Result<()> {
    match cmd {
        CustomerCommand::Add {
            name,
            company,
            position,
            email,
            phone,
            interactive,
        } => {
            let should_be_interactive = *interactive
                || (name.is_none()
                    && company.is_none()
                    && position.is_none()
                    && email.is_none()
                    && phone.is_none());

            let draft = if should_be_interactive {
                prompts::prompt_customer(CustomerDraft::default(), session.companies())?
            } else {
                let company = company
                    .as_deref()
                    .context("Company is required. Use --company to specify one.")?;
                CustomerDraft {
                    name: name
                        .clone()
                        .context("Customer name is required. Use --name to specify one.")?,
                    company_id: Some(find_company(session, company)?),
                    position: position.clone().unwrap_or_default(),
                    email: email.clone().unwrap_or_default(),
                    phone: phone.clone().unwrap_or_default(),
                }
            };

            let customer = session.add_customer(draft)?;
            println!("UUID: {}", customer.id);
        }
        CustomerCommand::List { company } => {
            let company_id = company
                .as_deref()
                .map(|c| find_company(session, c))
                .transpose()?;
            let resolver = session.resolver();
            let customers: Vec<_> = session
                .customers()
                .iter()
                .filter(|c| company_id.map_or(true, |id| c.company_id == id))
                .collect();

            if customers.is_empty() {
                println!("{}", "No customers found.".yellow());
                return Ok(());
            }

            println!(
                "{:<36} | {:<24} | {:<24} | {:<18} | {:<28}",
                "ID", "Name", "Company", "Position", "Email"
            );
            println!("{}", "-".repeat(140));
            for customer in customers {
                println!(
                    "{:<36} | {:<24} | {:<24} | {:<18} | {:<28}",
                    customer.id.to_string(),
                    truncate(&customer.name, 24),
                    truncate(resolver.company_name(&customer.company_id), 24),
                    truncate(optional_str(&customer.position), 18),
                    optional_str(&customer.email)
                );
            }
        }
        CustomerCommand::Edit { customer } => {
            let id = find_customer(session, customer)?;
            let current = session
                .customers()
                .iter()
                .find(|c| c.id == id)
                .context("Customer not found")?;
            let draft =
                prompts::prompt_customer(CustomerDraft::from_customer(current), session.companies())?;
            session.update_customer(&id, draft)?;
        }
        CustomerCommand::Del { customer, yes } => {
            let id = find_customer(session, customer)?;
            let name = session.resolver().customer_name(&id).to_string();

            println!("{}", "Customer to delete:".yellow());
            println!("  ID: {}", id);
            println!("  Name: {}", name);

            if !*yes && !confirm("Are you sure you want to delete this customer?")? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }
            session.delete_customer(&id)?;
        }
    }

    Ok(())
}

// =========================================================================
// Visits
// =========================================================================

fn handle_visit_command(cmd: &VisitCommand, session: &mut Session, today: NaiveDate) -> Result<()> {
    match cmd {
        VisitCommand::Add {
            company,
            customer,
            action,
            date,
            notes,
            follow_up,
            next_action,
            status,
            interactive,
        } => {
            let should_be_interactive = *interactive || (company.is_none() && customer.is_none());

            let draft = if should_be_interactive {
                let initial = VisitDraft {
                    visit_date: Some(date.unwrap_or(today)),
                    ..Default::default()
                };
                prompts::prompt_visit(initial, session.companies(), &session.resolver())?
            } else {
                let company = company
                    .as_deref()
                    .context("Company is required. Use --company to specify one.")?;
                let customer = customer
                    .as_deref()
                    .context("Customer is required. Use --customer to specify one.")?;
                let action = action
                    .as_deref()
                    .context("Action type is required. Use --action to specify one.")?;
                VisitDraft {
                    company_id: Some(find_company(session, company)?),
                    customer_id: Some(find_customer(session, customer)?),
                    action_type: Some(parse_action(action)?),
                    visit_date: Some(date.unwrap_or(today)),
                    notes: notes.clone().unwrap_or_default(),
                    next_follow_up: *follow_up,
                    next_action_type: next_action.as_deref().map(parse_action).transpose()?,
                    status: status
                        .as_deref()
                        .map(parse_visit_status)
                        .transpose()?
                        .unwrap_or_default(),
                }
            };

            let visit = session.add_visit(draft)?;
            println!("UUID: {}", visit.id);
        }
        VisitCommand::List { filter } => {
            let filter = build_filter(filter, session)?;
            let visits = session.filtered_visits(&filter);
            if visits.is_empty() {
                println!("{}", "No visits found.".yellow());
                return Ok(());
            }
            print_visit_table(session, &visits, today);
        }
        VisitCommand::Show { id } => {
            let id = parse_uuid(id)?;
            let visit = session
                .visits()
                .iter()
                .find(|v| v.id == id)
                .context("Visit not found")?;
            let resolver = session.resolver();

            println!("{}: {}", "ID".blue(), visit.id);
            println!("{}: {}", "Date".blue(), date_str(visit.visit_date));
            println!(
                "{}: {} ({})",
                "Company".blue(),
                resolver.company_name(&visit.company_id),
                resolver.company_type(&visit.company_id)
            );
            println!("{}: {}", "Customer".blue(), resolver.customer_name(&visit.customer_id));
            println!("{}: {}", "Action".blue(), visit.action_type);
            println!("{}: {}", "Status".blue(), visit_status_colored(visit.status));
            if let Some(date) = visit.next_follow_up {
                let next_action = visit
                    .next_action_type
                    .map(|a| format!(" - {}", a))
                    .unwrap_or_default();
                println!(
                    "{}: {}{} ({})",
                    "Follow-up".blue(),
                    date_str(date),
                    next_action,
                    classify_follow_up(visit, today)
                );
            }
            println!("{}: {}", "Recorded".blue(), visit.created_at);
            if let Some(notes) = &visit.notes {
                println!("\n{}:\n{}", "Notes".green(), notes);
            }
        }
        VisitCommand::Edit { id } => {
            let id = parse_uuid(id)?;
            let current = session
                .visits()
                .iter()
                .find(|v| v.id == id)
                .context("Visit not found")?;
            let draft = prompts::prompt_visit(
                VisitDraft::from_visit(current),
                session.companies(),
                &session.resolver(),
            )?;
            session.update_visit(&id, draft)?;
        }
        VisitCommand::Status { id, status } => {
            let id = parse_uuid(id)?;
            let status = parse_visit_status(status)?;
            session.set_visit_status(&id, status)?;
        }
        VisitCommand::FollowUps => {
            let partition = session.follow_ups(today);
            let sections: [(ColoredString, &[&Visit]); 4] = [
                ("Overdue".red(), &partition.overdue),
                ("Due today".yellow(), &partition.due_today),
                (
                    format!("Due in the next {} days", session.follow_up_window()).cyan(),
                    &partition.due_soon,
                ),
                ("Later".normal(), &partition.due_later),
            ];

            if sections.iter().all(|(_, visits)| visits.is_empty()) {
                println!("{}", "No follow-ups scheduled.".yellow());
                return Ok(());
            }

            let resolver = session.resolver();
            for (title, visits) in sections {
                if visits.is_empty() {
                    continue;
                }
                println!("\n{} ({}):", title, visits.len());
                for visit in visits {
                    let follow_up = visit.next_follow_up.map(date_str).unwrap_or_default();
                    println!(
                        "  {} {} at {} with {} [{}]",
                        follow_up,
                        visit
                            .next_action_type
                            .map_or("Follow-up", |a| a.label())
                            .cyan(),
                        resolver.company_name(&visit.company_id),
                        resolver.customer_name(&visit.customer_id),
                        visit.id
                    );
                }
            }
        }
        VisitCommand::Del { id, yes } => {
            let id = parse_uuid(id)?;
            let visit = session
                .visits()
                .iter()
                .find(|v| v.id == id)
                .context("Visit not found")?;
            let resolver = session.resolver();

            println!("{}", "Visit to delete:".yellow());
            println!("  ID: {}", visit.id);
            println!("  Date: {}", date_str(visit.visit_date));
            println!("  Company: {}", resolver.company_name(&visit.company_id));
            println!("  Action: {}", visit.action_type);

            if !*yes && !confirm("Are you sure you want to delete this visit?")? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }
            session.delete_visit(&id)?;
        }
    }

    Ok(())
}

// =========================================================================
// Requirements and equipment
// =========================================================================

fn equipment_catalog(session: &Session) -> Vec<String> {
    session
        .equipment_types()
        .into_iter()
        .map(|t| t.name.clone())
        .collect()
}

fn handle_requirement_command(
    cmd: &RequirementCommand,
    session: &mut Session,
    today: NaiveDate,
) -> Result<()> {
    match cmd {
        RequirementCommand::Add {
            company,
            customer,
            equipment,
            period,
            status,
            notes,
            date,
            interactive,
        } => {
            let should_be_interactive = *interactive
                || (company.is_none()
                    && customer.is_none()
                    && equipment.is_none()
                    && period.is_none());

            let draft = if should_be_interactive {
                let initial = RequirementDraft {
                    recorded_date: Some(date.unwrap_or(today)),
                    ..Default::default()
                };
                prompts::prompt_requirement(
                    initial,
                    session.companies(),
                    &session.resolver(),
                    &equipment_catalog(session),
                )?
            } else {
                let company = company
                    .as_deref()
                    .context("Company is required. Use --company to specify one.")?;
                let customer = customer
                    .as_deref()
                    .context("Customer is required. Use --customer to specify one.")?;
                RequirementDraft {
                    company_id: Some(find_company(session, company)?),
                    customer_id: Some(find_customer(session, customer)?),
                    equipment_name: equipment.clone().unwrap_or_default(),
                    required_period: period.clone().unwrap_or_default(),
                    status: status
                        .as_deref()
                        .map(parse_requirement_status)
                        .transpose()?
                        .unwrap_or_default(),
                    notes: notes.clone().unwrap_or_default(),
                    recorded_date: Some(date.unwrap_or(today)),
                }
            };

            let requirement = session.add_requirement(draft)?;
            println!("UUID: {}", requirement.id);
        }
        RequirementCommand::List { status, company } => {
            let status = status
                .as_deref()
                .map(parse_requirement_status)
                .transpose()?;
            let company_id = company
                .as_deref()
                .map(|c| find_company(session, c))
                .transpose()?;
            let resolver = session.resolver();
            let requirements: Vec<_> = session
                .requirements()
                .iter()
                .filter(|r| status.map_or(true, |s| r.status == s))
                .filter(|r| company_id.map_or(true, |id| r.company_id == id))
                .collect();

            if requirements.is_empty() {
                println!("{}", "No requirements found.".yellow());
                return Ok(());
            }

            println!(
                "{:<36} | {:<24} | {:<24} | {:<18} | {:<11} | {:<10}",
                "ID", "Equipment", "Company", "Period", "Status", "Recorded"
            );
            println!("{}", "-".repeat(136));
            for req in requirements {
                println!(
                    "{:<36} | {:<24} | {:<24} | {:<18} | {:<11} | {:<10}",
                    req.id.to_string(),
                    truncate(&req.equipment_name, 24),
                    truncate(resolver.company_name(&req.company_id), 24),
                    truncate(&req.required_period, 18),
                    requirement_status_colored(req.status),
                    date_str(req.recorded_date)
                );
            }
        }
        RequirementCommand::Edit { id } => {
            let id = parse_uuid(id)?;
            let current = session
                .requirements()
                .iter()
                .find(|r| r.id == id)
                .context("Requirement not found")?;
            let draft = prompts::prompt_requirement(
                RequirementDraft::from_requirement(current),
                session.companies(),
                &session.resolver(),
                &equipment_catalog(session),
            )?;
            session.update_requirement(&id, draft)?;
        }
        RequirementCommand::Del { id, yes } => {
            let id = parse_uuid(id)?;
            let req = session
                .requirements()
                .iter()
                .find(|r| r.id == id)
                .context("Requirement not found")?;

            println!("{}", "Requirement to delete:".yellow());
            println!("  ID: {}", req.id);
            println!("  Equipment: {}", req.equipment_name);
            println!("  Company: {}", session.resolver().company_name(&req.company_id));

            if !*yes && !confirm("Are you sure you want to delete this requirement?")? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }
            session.delete_requirement(&id)?;
        }
    }

    Ok(())
}

fn handle_equipment_command(cmd: &EquipmentCommand, session: &mut Session) -> Result<()> {
    match cmd {
        EquipmentCommand::Add { name } => {
            session.add_equipment_type(name)?;
        }
        EquipmentCommand::List => {
            let types = session.equipment_types();
            if types.is_empty() {
                println!("{}", "No equipment types defined.".yellow());
                return Ok(());
            }
            for equipment in types {
                let requested = session
                    .requirements()
                    .iter()
                    .filter(|r| r.equipment_name.eq_ignore_ascii_case(&equipment.name))
                    .count();
                println!("  {} ({} requirements)", equipment.name.cyan(), requested);
            }
        }
        EquipmentCommand::Rename { equipment, name } => {
            let id = find_equipment(session, equipment)?;
            session.rename_equipment_type(&id, name)?;
        }
        EquipmentCommand::Del { equipment } => {
            let id = find_equipment(session, equipment)?;
            session.delete_equipment_type(&id)?;
        }
    }

    Ok(())
}

// =========================================================================
// Dashboard and export
// =========================================================================

fn show_dashboard(session: &Session, today: NaiveDate) -> Result<()> {
    let stats = session.dashboard(today);

    println!("{} {}", "Dashboard for".bold(), date_str(today).bold());
    println!("{}: {}", "Companies".blue(), stats.total_companies);
    println!("{}: {}", "Customers".blue(), stats.total_customers);
    println!("{}: {}", "Visits".blue(), stats.total_visits);
    println!("{}: {}", "Requirements".blue(), stats.total_requirements);
    println!(
        "{}: {}",
        "Pending follow-ups".blue(),
        stats.pending_follow_ups.to_string().yellow()
    );

    if !stats.companies_by_type.is_empty() {
        println!("\n{}:", "Companies by type".green());
        for tally in &stats.companies_by_type {
            println!("  {:<28} {}", tally.key, tally.count);
        }
    }

    if !stats.visits_by_action.is_empty() {
        println!("\n{}:", "Visits by action".green());
        for tally in &stats.visits_by_action {
            println!("  {:<28} {}", tally.key.label(), tally.count);
        }
    }

    if !stats.requirements_by_status.is_empty() {
        println!("\n{}:", "Requirements by status".green());
        for tally in &stats.requirements_by_status {
            println!("  {:<28} {}", tally.key.as_str(), tally.count);
        }
    }

    let upcoming = session.upcoming_follow_ups(today);
    if !upcoming.is_empty() {
        let resolver = session.resolver();
        println!("\n{}:", "Upcoming follow-ups".green());
        for visit in upcoming {
            println!(
                "  {} {} at {} with {}",
                classify_follow_up(visit, today).to_string().yellow(),
                visit.next_action_type.map_or("Follow-up", |a| a.label()),
                resolver.company_name(&visit.company_id),
                resolver.customer_name(&visit.customer_id)
            );
        }
    }

    Ok(())
}

fn handle_export_command(cmd: &ExportCommand, session: &Session, today: NaiveDate) -> Result<()> {
    match cmd {
        ExportCommand::Csv { dir, filter } => {
            let filter = build_filter(filter, session)?;
            // An empty result is reported through the notifier
            session.export_report(&filter, dir, today)?;
        }
        ExportCommand::Json { output } => {
            export_to_json(session.data(), output)?;
            println!("{} Exported your records to {}", "✓".green(), output.display());
        }
    }

    Ok(())
}

// =========================================================================
// Database and configuration
// =========================================================================

fn print_stats(stats: &DatabaseStats, data_path: &Path, scope: &str) -> Result<()> {
    println!("{}: {}", "File".blue(), data_path.display());
    println!("{}: {}", "Backend".blue(), stats.backend_type);
    println!("{}: {}", "Scope".blue(), scope);
    println!("{}: {}", "Companies".blue(), stats.company_count);
    println!("{}: {}", "Customers".blue(), stats.customer_count);
    println!("{}: {}", "Visits".blue(), stats.visit_count);
    println!("{}: {}", "Requirements".blue(), stats.requirement_count);
    println!("{}: {}", "Equipment types".blue(), stats.equipment_type_count);
    println!("{}: {}", "Total records".blue(), stats.total());
    Ok(())
}

fn handle_db_command(cmd: &DbCommand, config: &AppConfig, data_path: &Path) -> Result<()> {
    match cmd {
        DbCommand::Path => {
            println!("{}", data_path.display());
        }
        DbCommand::Stats { .. } => {
            let backend = open_or_create(data_path, config.backend)?;
            print_stats(&backend.stats()?, data_path, "All users")?;
        }
        DbCommand::Migrate { to, force } => {
            if !data_path.exists() {
                anyhow::bail!("Nothing to migrate: {} does not exist", data_path.display());
            }
            let source = create_backend(data_path, config.backend)?;
            let target = create_backend(to, None)?;

            if !*force && target.exists() && target.stats()?.total() > 0 {
                anyhow::bail!(
                    "{} already holds data. Use --force to overwrite it.",
                    to.display()
                );
            }

            let count = copy_store(source.as_ref(), target.as_ref())?;
            println!(
                "{} Migrated {} records from {} ({}) to {} ({})",
                "✓".green(),
                count,
                data_path.display(),
                source.backend_type(),
                to.display(),
                target.backend_type()
            );
            println!(
                "Use --file {} or 'visits config set data-path' to switch to it.",
                to.display()
            );
        }
        DbCommand::Backup { output } => {
            let backend = open_or_create(data_path, config.backend)?;
            export_backend_to_json(backend.as_ref(), output)?;
            println!("{} Backup written to {}", "✓".green(), output.display());
        }
        DbCommand::Restore { from, yes } => {
            println!(
                "{} This replaces every record in {} with the contents of {}.",
                "!".yellow(),
                data_path.display(),
                from.display()
            );
            if !*yes && !confirm("Continue?")? {
                println!("{}", "Restore cancelled.".yellow());
                return Ok(());
            }
            let backend = open_or_create(data_path, config.backend)?;
            let count = import_json_to_backend(from, backend.as_ref())?;
            println!("{} Restored {} records", "✓".green(), count);
        }
    }

    Ok(())
}

fn handle_config_command(
    cmd: &ConfigCommand,
    config: &AppConfig,
    config_path: &Path,
    data_path: &Path,
) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            println!("{}: {}", "Config file".blue(), config_path.display());
            println!("{}: {}", "Data file".blue(), data_path.display());
            let backend = config
                .backend
                .unwrap_or_else(|| BackendType::from_path(data_path));
            println!("{}: {}", "Backend".blue(), backend);
            println!(
                "{}: {}",
                "Default user".blue(),
                config.default_user.as_deref().unwrap_or("-")
            );
            println!("{}: {}", "Date format".blue(), config.date_format);
            println!("{}: {} days", "Follow-up window".blue(), config.follow_up_window);
        }
        ConfigCommand::Init => {
            if config_path.exists() {
                println!(
                    "{} Config already exists at {}",
                    "!".yellow(),
                    config_path.display()
                );
            } else {
                AppConfig::create_default(config_path)?;
                println!("{} Created {}", "✓".green(), config_path.display());
            }
        }
        ConfigCommand::Set { key, value } => {
            let mut updated = config.clone();
            match key.as_str() {
                "data-path" => updated.data_path = Some(value.into()),
                "backend" => updated.backend = Some(BackendType::from_str(value)?),
                "user" => updated.default_user = Some(value.trim().to_string()),
                "date-format" => {
                    // chrono panics when rendering an invalid specifier
                    if chrono::format::StrftimeItems::new(value)
                        .any(|item| matches!(item, chrono::format::Item::Error))
                    {
                        anyhow::bail!("Invalid date format: {}", value);
                    }
                    updated.date_format = value.clone();
                }
                "follow-up-window" => {
                    let days: i64 = value
                        .parse()
                        .with_context(|| format!("Invalid number of days: {}", value))?;
                    if days < 0 {
                        anyhow::bail!("Follow-up window must not be negative");
                    }
                    updated.follow_up_window = days;
                }
                other => anyhow::bail!(
                    "Unknown setting: {} (expected data-path, backend, user, date-format or follow-up-window)",
                    other
                ),
            }
            updated.save(config_path)?;
            println!("{} {} set to {}", "✓".green(), key, value);
        }
    }

    Ok(())
}
