//! Read-only projections of a result set.
//!
//! A [`ResultFilter`] combines two independent predicates. The OS predicate removes whole rows;
//! the plan/term predicate only selects which purchasing-option tables and term rows a visible
//! row renders.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{PaymentOption, PlanFamily, PricingOutcome, PricingRequest, Term};

const HOURS_PER_YEAR: f64 = 365.0 * 24.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PlanType {
    #[default]
    All,
    OnDemand,
    /// Reserved instances
    Ri,
    /// Both savings-plan families
    Sp,
}

impl PlanType {
    pub fn shows_on_demand(self) -> bool {
        matches!(self, PlanType::All | PlanType::OnDemand)
    }

    pub fn shows_family(self, family: PlanFamily) -> bool {
        match self {
            PlanType::All => true,
            PlanType::OnDemand => false,
            PlanType::Ri => family == PlanFamily::ReservedInstance,
            PlanType::Sp => family.is_savings_plan(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum TermFilter {
    #[default]
    #[serde(rename = "all")]
    #[value(name = "all")]
    All,
    #[serde(rename = "1yr")]
    #[value(name = "1yr")]
    OneYear,
    #[serde(rename = "3yr")]
    #[value(name = "3yr")]
    ThreeYear,
}

impl TermFilter {
    pub fn includes(self, term: Term) -> bool {
        match self {
            TermFilter::All => true,
            TermFilter::OneYear => term == Term::OneYear,
            TermFilter::ThreeYear => term == Term::ThreeYear,
        }
    }

    pub fn terms(self) -> impl Iterator<Item = Term> {
        Term::ALL.into_iter().filter(move |t| self.includes(*t))
    }
}

/// User-editable view filter. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFilter {
    pub plan_type: PlanType,
    pub term: TermFilter,
    /// Lower-cased operating systems to show
    pub os: BTreeSet<String>,
}

impl Default for ResultFilter {
    fn default() -> Self {
        Self {
            plan_type: PlanType::All,
            term: TermFilter::All,
            os: ["linux", "windows"].into_iter().map(String::from).collect(),
        }
    }
}

impl ResultFilter {
    pub fn new(plan_type: PlanType, term: TermFilter, os: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            plan_type,
            term,
            os: os.into_iter().map(|s| s.as_ref().trim().to_lowercase()).collect(),
        }
    }

    pub fn includes_os(&self, operating_system: &str) -> bool {
        self.os.contains(&operating_system.to_lowercase())
    }
}

/// Effective discount of a purchasing option relative to on-demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Discount {
    Percent(f64),
    /// On-demand rate is zero
    NotApplicable,
}

impl fmt::Display for Discount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discount::Percent(p) => write!(f, "{p:.2}%"),
            Discount::NotApplicable => f.write_str("N/A"),
        }
    }
}

/// Discount of a commitment costing `total_cost` over `years` against `on_demand_rate` per hour.
pub fn calculate_discount(on_demand_rate: f64, total_cost: f64, years: u32) -> Discount {
    if on_demand_rate == 0.0 {
        return Discount::NotApplicable;
    }
    let effective_rate = total_cost / (f64::from(years) * HOURS_PER_YEAR);
    Discount::Percent((on_demand_rate - effective_rate) / on_demand_rate * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnDemandRow {
    pub term: Term,
    pub hourly_rate: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanRow {
    pub term: Term,
    pub payment: PaymentOption,
    pub hourly_rate: f64,
    pub total_cost: f64,
    /// Only set for partial-upfront rows: `(upfront_fee, plan_cost)`
    pub partial_breakdown: Option<(f64, f64)>,
    pub discount: Discount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanTable {
    pub family: PlanFamily,
    pub rows: Vec<PlanRow>,
}

/// What one visible row renders.
#[derive(Debug, Clone, PartialEq)]
pub enum RowBody {
    Errors(Vec<String>),
    Priced {
        on_demand: Option<Vec<OnDemandRow>>,
        plans: Vec<PlanTable>,
    },
}

/// A visible row of the filtered view.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView<'a> {
    pub input: &'a PricingRequest,
    pub body: RowBody,
}

fn project(filter: &ResultFilter, outcome: &PricingOutcome) -> RowBody {
    let Some(figures) = outcome.priced_figures() else {
        let errors = if outcome.errors.is_empty() {
            vec!["No pricing results returned".to_string()]
        } else {
            outcome.errors.clone()
        };
        return RowBody::Errors(errors);
    };

    let on_demand = filter.plan_type.shows_on_demand().then(|| {
        filter
            .term
            .terms()
            .map(|term| OnDemandRow {
                term,
                hourly_rate: figures.on_demand_hourly_rate,
                total_cost: figures.on_demand_total(term),
            })
            .collect()
    });

    let plans = PlanFamily::ALL
        .into_iter()
        .filter(|family| filter.plan_type.shows_family(*family))
        .map(|family| {
            let rows = filter
                .term
                .terms()
                .flat_map(|term| {
                    let term_figures = figures.term_figures(family, term);
                    PaymentOption::ALL.into_iter().map(move |payment| {
                        let (hourly_rate, total_cost) = term_figures.rate_and_total(payment);
                        PlanRow {
                            term,
                            payment,
                            hourly_rate,
                            total_cost,
                            partial_breakdown: (payment == PaymentOption::PartialUpfront).then_some((
                                term_figures.partial_upfront.upfront_fee,
                                term_figures.partial_upfront.plan_cost,
                            )),
                            discount: calculate_discount(figures.on_demand_hourly_rate, total_cost, term.years()),
                        }
                    })
                })
                .collect();
            PlanTable { family, rows }
        })
        .collect();

    RowBody::Priced { on_demand, plans }
}

/// Project `results` through `filter`. Pure and idempotent.
pub fn apply<'a>(filter: &ResultFilter, results: &'a [PricingOutcome]) -> Vec<ResultView<'a>> {
    results
        .iter()
        .filter(|outcome| filter.includes_os(&outcome.input.operating_system))
        .map(|outcome| ResultView {
            input: &outcome.input,
            body: project(filter, outcome),
        })
        .collect()
}
