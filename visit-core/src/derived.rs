//! Derived state: visit filtering and sorting, follow-up classification
//! and dashboard aggregates.
//!
//! All functions are pure. "Today" is always passed in by the caller so
//! results do not depend on the wall clock.

use chrono::NaiveDate;
use std::fmt;
use uuid::Uuid;

use crate::models::{ActionType, RequirementStatus, Visit, VisitStatus, VisitStore};
use crate::resolver::Resolver;

/// Default number of days ahead a follow-up still counts as "pending"
pub const DEFAULT_FOLLOW_UP_WINDOW: i64 = 2;

/// Either every value or one specific value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Selection<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == value,
        }
    }
}

impl<T> From<Option<T>> for Selection<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Selection::All, Selection::Only)
    }
}

/// Inclusive date range; either end may be open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Criteria for narrowing down the visit list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisitFilter {
    pub company: Selection<Uuid>,
    pub customer: Selection<Uuid>,
    pub action_type: Selection<ActionType>,
    pub status: Selection<VisitStatus>,
    /// Matched against the resolved company type label
    pub company_type: Selection<String>,
    pub date_range: DateRange,
}

impl VisitFilter {
    pub fn matches(&self, visit: &Visit, resolver: &Resolver<'_>) -> bool {
        self.company.matches(&visit.company_id)
            && self.customer.matches(&visit.customer_id)
            && self.action_type.matches(&visit.action_type)
            && self.status.matches(&visit.status)
            && self.date_range.contains(visit.visit_date)
            && match &self.company_type {
                Selection::All => true,
                Selection::Only(t) => resolver.company_type(&visit.company_id) == t,
            }
    }
}

/// Sorts visits newest first. Visits on the same date keep their input
/// order.
pub fn sort_visits_desc(visits: &mut [&Visit]) {
    visits.sort_by(|a, b| b.visit_date.cmp(&a.visit_date));
}

/// Returns the visits matching `filter`, newest first
pub fn filter_visits<'v>(
    visits: &'v [Visit],
    filter: &VisitFilter,
    resolver: &Resolver<'_>,
) -> Vec<&'v Visit> {
    let mut matched: Vec<&Visit> = visits
        .iter()
        .filter(|v| filter.matches(v, resolver))
        .collect();
    sort_visits_desc(&mut matched);
    matched
}

/// Where a visit's follow-up date stands relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    Overdue { days: i64 },
    DueToday,
    DueIn { days: i64 },
    None,
}

impl FollowUp {
    /// Days from today until the follow-up, negative when overdue
    pub fn days_until(&self) -> Option<i64> {
        match *self {
            FollowUp::Overdue { days } => Some(-days),
            FollowUp::DueToday => Some(0),
            FollowUp::DueIn { days } => Some(days),
            FollowUp::None => None,
        }
    }

    pub fn bucket(&self, window: i64) -> FollowUpBucket {
        match *self {
            FollowUp::Overdue { .. } => FollowUpBucket::Overdue,
            FollowUp::DueToday => FollowUpBucket::DueToday,
            FollowUp::DueIn { days } if days <= window => FollowUpBucket::DueSoon,
            FollowUp::DueIn { .. } => FollowUpBucket::DueLater,
            FollowUp::None => FollowUpBucket::None,
        }
    }
}

impl fmt::Display for FollowUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FollowUp::Overdue { days: 1 } => write!(f, "overdue by 1 day"),
            FollowUp::Overdue { days } => write!(f, "overdue by {} days", days),
            FollowUp::DueToday => write!(f, "due today"),
            FollowUp::DueIn { days: 1 } => write!(f, "due in 1 day"),
            FollowUp::DueIn { days } => write!(f, "due in {} days", days),
            FollowUp::None => write!(f, "no follow-up"),
        }
    }
}

/// Coarse follow-up grouping; every visit falls in exactly one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FollowUpBucket {
    Overdue,
    DueToday,
    DueSoon,
    DueLater,
    None,
}

/// Classifies a follow-up date relative to `today`
pub fn classify_date(follow_up: Option<NaiveDate>, today: NaiveDate) -> FollowUp {
    let Some(date) = follow_up else {
        return FollowUp::None;
    };
    let days = (date - today).num_days();
    match days {
        d if d < 0 => FollowUp::Overdue { days: -d },
        0 => FollowUp::DueToday,
        d => FollowUp::DueIn { days: d },
    }
}

pub fn classify_follow_up(visit: &Visit, today: NaiveDate) -> FollowUp {
    classify_date(visit.next_follow_up, today)
}

/// True when the follow-up is due between today and `window` days ahead
pub fn is_pending_follow_up(visit: &Visit, today: NaiveDate, window: i64) -> bool {
    matches!(
        classify_follow_up(visit, today).days_until(),
        Some(d) if (0..=window).contains(&d)
    )
}

/// Visits split by follow-up bucket; input order is kept inside each bucket
#[derive(Debug, Default, Clone)]
pub struct FollowUpPartition<'v> {
    pub overdue: Vec<&'v Visit>,
    pub due_today: Vec<&'v Visit>,
    pub due_soon: Vec<&'v Visit>,
    pub due_later: Vec<&'v Visit>,
    pub none: Vec<&'v Visit>,
}

impl FollowUpPartition<'_> {
    pub fn len(&self) -> usize {
        self.overdue.len()
            + self.due_today.len()
            + self.due_soon.len()
            + self.due_later.len()
            + self.none.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn partition_follow_ups(visits: &[Visit], today: NaiveDate, window: i64) -> FollowUpPartition<'_> {
    let mut partition = FollowUpPartition::default();
    for visit in visits {
        let bucket = match classify_follow_up(visit, today).bucket(window) {
            FollowUpBucket::Overdue => &mut partition.overdue,
            FollowUpBucket::DueToday => &mut partition.due_today,
            FollowUpBucket::DueSoon => &mut partition.due_soon,
            FollowUpBucket::DueLater => &mut partition.due_later,
            FollowUpBucket::None => &mut partition.none,
        };
        bucket.push(visit);
    }
    partition
}

/// Visits with a follow-up in the alert window, soonest first
pub fn upcoming_follow_ups(visits: &[Visit], today: NaiveDate, window: i64) -> Vec<&Visit> {
    let mut upcoming: Vec<&Visit> = visits
        .iter()
        .filter(|v| is_pending_follow_up(v, today, window))
        .collect();
    upcoming.sort_by_key(|v| v.next_follow_up);
    upcoming
}

/// One group of a tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally<K> {
    pub key: K,
    pub count: usize,
}

/// Counts items per key. Groups appear in the order their key is first seen.
pub fn tally_by<T, K, F>(items: &[T], key: F) -> Vec<Tally<K>>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut tallies: Vec<Tally<K>> = Vec::new();
    for item in items {
        let k = key(item);
        match tallies.iter_mut().find(|t| t.key == k) {
            Some(existing) => existing.count += 1,
            None => tallies.push(Tally { key: k, count: 1 }),
        }
    }
    tallies
}

/// Distinct keys in first-seen order, e.g. for filter choices
pub fn distinct_by<T, K, F>(items: &[T], key: F) -> Vec<K>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    tally_by(items, key).into_iter().map(|t| t.key).collect()
}

/// Figures shown on the dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_companies: usize,
    pub total_customers: usize,
    pub total_visits: usize,
    pub total_requirements: usize,
    pub pending_follow_ups: usize,
    pub companies_by_type: Vec<Tally<String>>,
    pub visits_by_action: Vec<Tally<ActionType>>,
    pub requirements_by_status: Vec<Tally<RequirementStatus>>,
}

pub fn dashboard_stats(store: &VisitStore, today: NaiveDate, window: i64) -> DashboardStats {
    DashboardStats {
        total_companies: store.companies.len(),
        total_customers: store.customers.len(),
        total_visits: store.visits.len(),
        total_requirements: store.requirements.len(),
        pending_follow_ups: store
            .visits
            .iter()
            .filter(|v| is_pending_follow_up(v, today, window))
            .count(),
        companies_by_type: tally_by(&store.companies, |c| c.company_type.label().to_string()),
        visits_by_action: tally_by(&store.visits, |v| v.action_type),
        requirements_by_status: tally_by(&store.requirements, |r| r.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Company, CompanyType, Customer};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn visit(on: NaiveDate, status: VisitStatus) -> Visit {
        let mut v = Visit::new("u1", Uuid::new_v4(), Uuid::new_v4(), ActionType::Call, on);
        v.status = status;
        v
    }

    fn with_follow_up(follow_up: Option<NaiveDate>) -> Visit {
        let mut v = visit(date(2024, 5, 1), VisitStatus::Completed);
        v.next_follow_up = follow_up;
        v
    }

    #[test]
    fn test_classify_follow_up() {
        let today = date(2024, 5, 10);
        assert_eq!(classify_date(Some(date(2024, 5, 7)), today), FollowUp::Overdue { days: 3 });
        assert_eq!(classify_date(Some(today), today), FollowUp::DueToday);
        assert_eq!(classify_date(Some(date(2024, 5, 12)), today), FollowUp::DueIn { days: 2 });
        assert_eq!(classify_date(None, today), FollowUp::None);
    }

    #[test]
    fn test_classify_crosses_month_and_year() {
        let today = date(2023, 12, 30);
        assert_eq!(classify_date(Some(date(2024, 1, 2)), today), FollowUp::DueIn { days: 3 });
    }

    #[test]
    fn test_pending_window_bounds() {
        let today = date(2024, 5, 10);
        let cases = [
            (Some(date(2024, 5, 9)), false),
            (Some(date(2024, 5, 10)), true),
            (Some(date(2024, 5, 12)), true),
            (Some(date(2024, 5, 13)), false),
            (None, false),
        ];
        for (follow_up, expected) in cases {
            let v = with_follow_up(follow_up);
            assert_eq!(
                is_pending_follow_up(&v, today, DEFAULT_FOLLOW_UP_WINDOW),
                expected,
                "{:?}",
                follow_up
            );
        }
    }

    #[test]
    fn test_partition_covers_every_visit_once() {
        let today = date(2024, 5, 10);
        let visits: Vec<Visit> = (-5..=8)
            .map(|offset| with_follow_up(Some(today + chrono::Duration::days(offset))))
            .chain(std::iter::once(with_follow_up(None)))
            .collect();

        let p = partition_follow_ups(&visits, today, DEFAULT_FOLLOW_UP_WINDOW);
        assert_eq!(p.len(), visits.len());
        assert_eq!(p.overdue.len(), 5);
        assert_eq!(p.due_today.len(), 1);
        assert_eq!(p.due_soon.len(), 2);
        assert_eq!(p.due_later.len(), 6);
        assert_eq!(p.none.len(), 1);

        for v in &visits {
            let hits = [&p.overdue, &p.due_today, &p.due_soon, &p.due_later, &p.none]
                .iter()
                .filter(|bucket| bucket.iter().any(|b| b.id == v.id))
                .count();
            assert_eq!(hits, 1);
        }
    }

    #[test]
    fn test_filter_pending_sorted_desc() {
        let visits = vec![
            visit(date(2024, 1, 5), VisitStatus::Pending),
            visit(date(2024, 3, 1), VisitStatus::Completed),
            visit(date(2024, 2, 20), VisitStatus::Pending),
            visit(date(2023, 12, 31), VisitStatus::Pending),
        ];
        let filter = VisitFilter {
            status: Selection::Only(VisitStatus::Pending),
            ..Default::default()
        };
        let resolver = Resolver::new(&[], &[]);

        let dates: Vec<_> = filter_visits(&visits, &filter, &resolver)
            .iter()
            .map(|v| v.visit_date)
            .collect();
        assert_eq!(dates, vec![date(2024, 2, 20), date(2024, 1, 5), date(2023, 12, 31)]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_dates() {
        let same_day = date(2024, 4, 1);
        let visits = vec![
            visit(same_day, VisitStatus::Completed),
            visit(date(2024, 4, 2), VisitStatus::Completed),
            visit(same_day, VisitStatus::Pending),
        ];
        let sorted = filter_visits(&visits, &VisitFilter::default(), &Resolver::new(&[], &[]));
        assert_eq!(sorted[0].id, visits[1].id);
        assert_eq!(sorted[1].id, visits[0].id);
        assert_eq!(sorted[2].id, visits[2].id);
    }

    #[test]
    fn test_filter_composes_company_customer_type_and_dates() {
        let acme = Company::new("u1", "Acme".into(), CompanyType::Food);
        let globex = Company::new("u1", "Globex".into(), CompanyType::Chemical);
        let jane = Customer::new("u1", "Jane".into(), acme.id);

        let mut v1 = Visit::new("u1", acme.id, jane.id, ActionType::Meeting, date(2024, 2, 1));
        v1.status = VisitStatus::Pending;
        let v2 = Visit::new("u1", acme.id, jane.id, ActionType::Call, date(2024, 6, 1));
        let v3 = Visit::new("u1", globex.id, Uuid::new_v4(), ActionType::Meeting, date(2024, 2, 2));
        let visits = vec![v1.clone(), v2, v3.clone()];

        let companies = vec![acme.clone(), globex];
        let customers = vec![jane.clone()];
        let resolver = Resolver::new(&companies, &customers);

        let by_type = VisitFilter {
            company_type: Selection::Only("Chemical".into()),
            ..Default::default()
        };
        let hits = filter_visits(&visits, &by_type, &resolver);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, v3.id);

        let narrowed = VisitFilter {
            company: Selection::Only(acme.id),
            customer: Selection::Only(jane.id),
            action_type: Selection::Only(ActionType::Meeting),
            date_range: DateRange {
                start: Some(date(2024, 1, 1)),
                end: Some(date(2024, 2, 1)),
            },
            ..Default::default()
        };
        let hits = filter_visits(&visits, &narrowed, &resolver);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, v1.id);
    }

    #[test]
    fn test_tally_keeps_first_seen_order() {
        let companies = vec![
            Company::new("u1", "A".into(), CompanyType::Other("Tech".into())),
            Company::new("u1", "B".into(), CompanyType::Other("Tech".into())),
            Company::new("u1", "C".into(), CompanyType::Other("Finance".into())),
        ];
        let groups = tally_by(&companies, |c| c.company_type.label().to_string());
        assert_eq!(
            groups,
            vec![
                Tally { key: "Tech".to_string(), count: 2 },
                Tally { key: "Finance".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_dashboard_stats() {
        let today = date(2024, 5, 10);
        let mut store = VisitStore::new();
        store.companies.push(Company::new("u1", "A".into(), CompanyType::Food));
        store.companies.push(Company::new("u1", "B".into(), CompanyType::Research));
        store.companies.push(Company::new("u1", "C".into(), CompanyType::Food));

        let mut meeting = with_follow_up(Some(date(2024, 5, 11)));
        meeting.action_type = ActionType::Meeting;
        store.visits.push(with_follow_up(Some(date(2024, 5, 10))));
        store.visits.push(meeting);
        store.visits.push(with_follow_up(Some(date(2024, 5, 20))));

        let stats = dashboard_stats(&store, today, DEFAULT_FOLLOW_UP_WINDOW);
        assert_eq!(stats.total_companies, 3);
        assert_eq!(stats.total_visits, 3);
        assert_eq!(stats.pending_follow_ups, 2);
        assert_eq!(stats.companies_by_type[0], Tally { key: "Food".to_string(), count: 2 });
        assert_eq!(
            stats.visits_by_action,
            vec![
                Tally { key: ActionType::Call, count: 2 },
                Tally { key: ActionType::Meeting, count: 1 },
            ]
        );
    }

    #[test]
    fn test_upcoming_follow_ups_soonest_first() {
        let today = date(2024, 5, 10);
        let later = with_follow_up(Some(date(2024, 5, 12)));
        let sooner = with_follow_up(Some(date(2024, 5, 10)));
        let visits = vec![later.clone(), sooner.clone(), with_follow_up(None)];

        let upcoming = upcoming_follow_ups(&visits, today, DEFAULT_FOLLOW_UP_WINDOW);
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].id, sooner.id);
    }

    #[test]
    fn test_distinct_action_types() {
        let mut a = visit(date(2024, 1, 1), VisitStatus::Completed);
        a.action_type = ActionType::SiteVisit;
        let b = visit(date(2024, 1, 2), VisitStatus::Completed);
        let visits = vec![a, b.clone(), b];
        assert_eq!(
            distinct_by(&visits, |v| v.action_type),
            vec![ActionType::SiteVisit, ActionType::Call]
        );
    }
}
