use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Track business visits, customers and equipment requirements")]
pub struct Cli {
    /// Path to the data file (.yaml for YAML, .db/.sqlite for SQLite)
    #[clap(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Act as this user (overrides VISITS_USER and the config file)
    #[clap(long, short = 'u')]
    pub user: Option<String>,

    /// Treat this date (YYYY-MM-DD) as today for follow-up calculations
    #[clap(long)]
    pub today: Option<NaiveDate>,

    #[clap(subcommand)]
    pub command: Command,
}

/// Filters shared by `visit list` and `export csv`
#[derive(Args, Debug, Default, Clone)]
pub struct VisitFilterArgs {
    /// Only visits at this company (name or UUID)
    #[clap(long)]
    pub company: Option<String>,

    /// Only visits with this customer (name or UUID)
    #[clap(long)]
    pub customer: Option<String>,

    /// Only visits of this action type (e.g. call, "site visit")
    #[clap(long)]
    pub action: Option<String>,

    /// Only visits with this status (completed, pending, cancelled)
    #[clap(long)]
    pub status: Option<String>,

    /// Only visits at companies of this type
    #[clap(long)]
    pub company_type: Option<String>,

    /// Earliest visit date (YYYY-MM-DD)
    #[clap(long)]
    pub from: Option<NaiveDate>,

    /// Latest visit date (YYYY-MM-DD)
    #[clap(long)]
    pub to: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum CompanyCommand {
    /// Add a new company
    Add {
        /// Company name
        #[clap(long)]
        name: Option<String>,

        /// Company type (e.g. "Pharma Manufacturing", Food, or any custom label)
        #[clap(long)]
        r#type: Option<String>,

        #[clap(long)]
        address: Option<String>,

        #[clap(long)]
        phone: Option<String>,

        /// Logo URL
        #[clap(long)]
        logo: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List companies
    List {
        /// Filter by company type
        #[clap(long)]
        r#type: Option<String>,
    },

    /// Show a company with its customers and visits
    Show {
        /// Company name or UUID
        company: String,
    },

    /// Edit a company
    Edit {
        /// Company name or UUID
        company: String,
    },

    /// Delete a company
    Del {
        /// Company name or UUID
        company: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Import companies from a CSV file
    Import {
        /// CSV file with a header row (name and type columns are required)
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum CustomerCommand {
    /// Add a new customer
    Add {
        /// Customer name
        #[clap(long)]
        name: Option<String>,

        /// Company the customer works at (name or UUID)
        #[clap(long)]
        company: Option<String>,

        /// Job title
        #[clap(long)]
        position: Option<String>,

        #[clap(long)]
        email: Option<String>,

        #[clap(long)]
        phone: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List customers
    List {
        /// Only customers of this company (name or UUID)
        #[clap(long)]
        company: Option<String>,
    },

    /// Edit a customer
    Edit {
        /// Customer name or UUID
        customer: String,
    },

    /// Delete a customer
    Del {
        /// Customer name or UUID
        customer: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum VisitCommand {
    /// Record a visit
    Add {
        /// Company visited (name or UUID)
        #[clap(long)]
        company: Option<String>,

        /// Customer met (name or UUID)
        #[clap(long)]
        customer: Option<String>,

        /// Action type (call, send quotation, site visit, ...)
        #[clap(long)]
        action: Option<String>,

        /// Visit date (YYYY-MM-DD), defaults to today
        #[clap(long)]
        date: Option<NaiveDate>,

        #[clap(long)]
        notes: Option<String>,

        /// Next follow-up date (YYYY-MM-DD)
        #[clap(long)]
        follow_up: Option<NaiveDate>,

        /// Planned action for the follow-up
        #[clap(long)]
        next_action: Option<String>,

        /// Status (completed, pending, cancelled)
        #[clap(long)]
        status: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List visits, newest first
    List {
        #[clap(flatten)]
        filter: VisitFilterArgs,
    },

    /// Show details for a visit
    Show {
        /// Visit UUID
        id: String,
    },

    /// Edit a visit
    Edit {
        /// Visit UUID
        id: String,
    },

    /// Change the status of a visit
    Status {
        /// Visit UUID
        id: String,

        /// New status (completed, pending, cancelled)
        status: String,
    },

    /// List follow-ups grouped by due date
    FollowUps,

    /// Delete a visit
    Del {
        /// Visit UUID
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RequirementCommand {
    /// Record an equipment requirement
    Add {
        /// Company (name or UUID)
        #[clap(long)]
        company: Option<String>,

        /// Customer (name or UUID)
        #[clap(long)]
        customer: Option<String>,

        /// Equipment needed
        #[clap(long)]
        equipment: Option<String>,

        /// When it is needed, e.g. "Q3 2025"
        #[clap(long)]
        period: Option<String>,

        /// Status (pending, in-progress, fulfilled, cancelled)
        #[clap(long)]
        status: Option<String>,

        #[clap(long)]
        notes: Option<String>,

        /// Date recorded (YYYY-MM-DD), defaults to today
        #[clap(long)]
        date: Option<NaiveDate>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List requirements
    List {
        /// Filter by status
        #[clap(long)]
        status: Option<String>,

        /// Only requirements of this company (name or UUID)
        #[clap(long)]
        company: Option<String>,
    },

    /// Edit a requirement
    Edit {
        /// Requirement UUID
        id: String,
    },

    /// Delete a requirement
    Del {
        /// Requirement UUID
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum EquipmentCommand {
    /// Add an equipment type to the catalog
    Add {
        /// Equipment name
        name: String,
    },

    /// List the equipment catalog
    List,

    /// Rename an equipment type
    Rename {
        /// Current name or UUID
        equipment: String,

        /// New name
        name: String,
    },

    /// Remove an equipment type from the catalog
    Del {
        /// Name or UUID
        equipment: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ExportCommand {
    /// Write the visit report as CSV
    Csv {
        /// Output directory (the file is named visit-report-<date>.csv)
        #[clap(long, short = 'o', default_value = ".")]
        dir: PathBuf,

        #[clap(flatten)]
        filter: VisitFilterArgs,
    },

    /// Write the current user's records as JSON
    Json {
        /// Output file path
        #[clap(long, short = 'o', default_value = "visits.json")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Print the path to the data file
    Path,

    /// Show record counts for the current user
    Stats {
        /// Count every user's records in the file instead
        #[clap(long)]
        all: bool,
    },

    /// Copy all data into another file; the target backend follows its extension
    Migrate {
        /// Target data file
        to: PathBuf,

        /// Overwrite a target that already holds data
        #[clap(long)]
        force: bool,
    },

    /// Write every record in the data file, for all users, to JSON
    Backup {
        /// Output file path
        #[clap(long, short = 'o', default_value = "visits-backup.json")]
        output: PathBuf,
    },

    /// Replace all data with a JSON backup
    Restore {
        /// JSON file written by `db backup`
        from: PathBuf,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the config file path and the effective settings
    Show,

    /// Write a default config file if none exists
    Init,

    /// Change a setting
    Set {
        /// Setting name (data-path, backend, user, date-format, follow-up-window)
        key: String,

        /// New value
        value: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Company management commands
    #[clap(subcommand)]
    Company(CompanyCommand),

    /// Customer management commands
    #[clap(subcommand)]
    Customer(CustomerCommand),

    /// Visit management commands
    #[clap(subcommand)]
    Visit(VisitCommand),

    /// Equipment requirement commands
    #[clap(subcommand)]
    Requirement(RequirementCommand),

    /// Equipment catalog commands
    #[clap(subcommand)]
    Equipment(EquipmentCommand),

    /// Show totals, breakdowns and upcoming follow-ups
    Dashboard,

    /// Export data
    #[clap(subcommand)]
    Export(ExportCommand),

    /// Database management commands
    #[clap(subcommand)]
    Db(DbCommand),

    /// Configuration commands
    #[clap(subcommand)]
    Config(ConfigCommand),
}
