use std::cell::RefCell;
use std::rc::Rc;

use chrono::NaiveDate;
use tempfile::tempdir;
use visit_core::{
    open_or_create, ActionType, CompanyDraft, CustomerDraft, Notice, NoticeLevel, Notifier,
    RequirementDraft, RequirementStatus, Selection, Session, StaticIdentity, VisitDraft,
    VisitFilter, VisitStatus,
};

#[derive(Clone, Default)]
struct Collected(Rc<RefCell<Vec<Notice>>>);

impl Notifier for Collected {
    fn notify(&self, notice: Notice) {
        self.0.borrow_mut().push(notice);
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn open_session(path: &std::path::Path, user: &str, notices: &Collected) -> Session {
    let backend = open_or_create(path, None).unwrap();
    let mut session = Session::new(
        backend,
        Box::new(StaticIdentity::new(user)),
        Box::new(notices.clone()),
    );
    session.refresh().unwrap();
    session
}

#[test]
fn full_workflow_on_sqlite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("visits.db");
    let notices = Collected::default();

    let mut session = open_session(&path, "alice", &notices);
    let acme = session
        .add_company(CompanyDraft {
            name: "Acme Pharma".into(),
            company_type: "Pharma Manufacturing".into(),
            phone: "+1 (555) 010-2000".into(),
            ..Default::default()
        })
        .unwrap();
    let jane = session
        .add_customer(CustomerDraft {
            name: "Jane Doe".into(),
            company_id: Some(acme.id),
            email: "jane@acme.example".into(),
            ..Default::default()
        })
        .unwrap();
    session
        .add_visit(VisitDraft {
            company_id: Some(acme.id),
            customer_id: Some(jane.id),
            action_type: Some(ActionType::SendQuotation),
            visit_date: Some(date(2024, 9, 2)),
            notes: "Quote for \"line 2\" <script>alert(1)</script>".into(),
            next_follow_up: Some(date(2024, 9, 4)),
            status: VisitStatus::Pending,
            ..Default::default()
        })
        .unwrap();
    session
        .add_requirement(RequirementDraft {
            company_id: Some(acme.id),
            customer_id: Some(jane.id),
            equipment_name: "Blister Packer".into(),
            required_period: "Q1 2025".into(),
            recorded_date: Some(date(2024, 9, 2)),
            ..Default::default()
        })
        .unwrap();

    // A second session over the same file sees everything alice stored
    let reopened = open_session(&path, "alice", &notices);
    assert_eq!(reopened.companies().len(), 1);
    assert_eq!(reopened.visits()[0].notes.as_deref(), Some("Quote for \"line 2\""));
    assert_eq!(reopened.requirements()[0].status, RequirementStatus::Pending);

    let stats = reopened.dashboard(date(2024, 9, 3));
    assert_eq!(stats.pending_follow_ups, 1);
    assert_eq!(stats.companies_by_type[0].key, "Pharma Manufacturing");

    let csv = reopened.report_csv(&VisitFilter {
        company: Selection::Only(acme.id),
        ..Default::default()
    });
    let row = csv.lines().nth(1).unwrap();
    assert_eq!(
        row,
        "\"09/02/2024\",\"Acme Pharma\",\"Pharma Manufacturing\",\"Jane Doe\",\"Send Quotation\",\
         \"pending\",\"Quote for \"\"line 2\"\"\",\"09/04/2024\",\"".to_string()
            + &reopened.visits()[0].created_at.format("%m/%d/%Y").to_string()
            + "\""
    );

    // Nobody else can see alice's records
    let bob = open_session(&path, "bob", &notices);
    assert!(bob.companies().is_empty());
    assert!(bob.visits().is_empty());

    assert!(notices
        .0
        .borrow()
        .iter()
        .all(|n| n.level != NoticeLevel::Error));
}

#[test]
fn import_then_list_on_yaml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("visits.yaml");
    let notices = Collected::default();
    let mut session = open_session(&path, "alice", &notices);

    let csv = "Name,Type,Address,Phone\n\
               Acme,Food,1 Main St,+1 555 123 4567\n\
               Globex,Chemical,,bad\n\
               Initech,Research,,\n";
    let summary = session.import_companies(csv).unwrap();

    assert_eq!(summary.imported.len(), 2);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].line, 3);

    let reopened = open_session(&path, "alice", &notices);
    let mut names: Vec<&str> = reopened.companies().iter().map(|c| c.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Acme", "Initech"]);
}
