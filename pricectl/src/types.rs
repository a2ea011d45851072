//! Wire and domain types shared by every pipeline stage.
//!
//! Field names follow the pricing service's JSON contract, so these types serialize
//! directly into request bodies and deserialize straight out of responses.

use serde::{Deserialize, Serialize};

/// Tenancy assumed when an upload leaves the column empty.
pub const DEFAULT_TENANCY: &str = "Shared";

/// A canonical request to price one instance descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRequest {
    pub region_code: String,
    pub instance_type: String,
    pub operation: String,
    pub operating_system: String,
    #[serde(default = "default_tenancy")]
    pub product_tenancy: String,
    #[serde(default = "default_qty")]
    pub qty: u32,
}

fn default_tenancy() -> String {
    DEFAULT_TENANCY.to_string()
}

fn default_qty() -> u32 {
    1
}

impl PricingRequest {
    /// Build a request with the default tenancy and a quantity of one.
    pub fn new(
        region_code: impl Into<String>,
        instance_type: impl Into<String>,
        operation: impl Into<String>,
        operating_system: impl Into<String>,
    ) -> Self {
        Self {
            region_code: region_code.into(),
            instance_type: instance_type.into(),
            operation: operation.into(),
            operating_system: operating_system.into(),
            product_tenancy: default_tenancy(),
            qty: default_qty(),
        }
    }

    /// Whether all four required fields are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.region_code.is_empty()
            && !self.instance_type.is_empty()
            && !self.operation.is_empty()
            && !self.operating_system.is_empty()
    }
}

/// Partial-upfront cost breakdown. Producers guarantee `total_cost = upfront_fee + plan_cost`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialUpfront {
    pub total_cost: f64,
    pub upfront_fee: f64,
    pub plan_cost: f64,
}

impl PartialUpfront {
    /// Checks the `total_cost = upfront_fee + plan_cost` invariant within rounding error.
    pub fn is_balanced(&self) -> bool {
        let sum = self.upfront_fee + self.plan_cost;
        (self.total_cost - sum).abs() <= 1e-6 * self.total_cost.abs().max(1.0)
    }
}

/// Every figure the pricing service returns for one instance descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PricingFigures {
    pub on_demand_hourly_rate: f64,
    pub on_demand_1_year_total_cost: f64,
    pub on_demand_3_year_total_cost: f64,

    pub compute_savings_plan_1_year_no_upfront_total_cost: f64,
    pub compute_savings_plan_1_year_no_upfront_hourly_rate: f64,
    pub compute_savings_plan_1_year_partial_upfront_total_cost: PartialUpfront,
    pub compute_savings_plan_1_year_partial_upfront_hourly_rate: f64,
    pub compute_savings_plan_1_year_all_upfront_total_cost: f64,
    pub compute_savings_plan_1_year_all_upfront_hourly_rate: f64,

    pub compute_savings_plan_3_year_no_upfront_total_cost: f64,
    pub compute_savings_plan_3_year_no_upfront_hourly_rate: f64,
    pub compute_savings_plan_3_year_partial_upfront_total_cost: PartialUpfront,
    pub compute_savings_plan_3_year_partial_upfront_hourly_rate: f64,
    pub compute_savings_plan_3_year_all_upfront_total_cost: f64,
    pub compute_savings_plan_3_year_all_upfront_hourly_rate: f64,

    pub ec2_savings_plan_1_year_no_upfront_total_cost: f64,
    pub ec2_savings_plan_1_year_no_upfront_hourly_rate: f64,
    pub ec2_savings_plan_1_year_partial_upfront_total_cost: PartialUpfront,
    pub ec2_savings_plan_1_year_partial_upfront_hourly_rate: f64,
    pub ec2_savings_plan_1_year_all_upfront_total_cost: f64,
    pub ec2_savings_plan_1_year_all_upfront_hourly_rate: f64,

    pub ec2_savings_plan_3_year_no_upfront_total_cost: f64,
    pub ec2_savings_plan_3_year_no_upfront_hourly_rate: f64,
    pub ec2_savings_plan_3_year_partial_upfront_total_cost: PartialUpfront,
    pub ec2_savings_plan_3_year_partial_upfront_hourly_rate: f64,
    pub ec2_savings_plan_3_year_all_upfront_total_cost: f64,
    pub ec2_savings_plan_3_year_all_upfront_hourly_rate: f64,

    pub standard_reserved_instance_1_year_no_upfront_total_cost: f64,
    pub standard_reserved_instance_1_year_no_upfront_hourly_rate: f64,
    pub standard_reserved_instance_1_year_partial_upfront_total_cost: PartialUpfront,
    pub standard_reserved_instance_1_year_partial_upfront_hourly_rate: f64,
    pub standard_reserved_instance_1_year_all_upfront_total_cost: f64,
    pub standard_reserved_instance_1_year_all_upfront_hourly_rate: f64,

    pub standard_reserved_instance_3_year_no_upfront_total_cost: f64,
    pub standard_reserved_instance_3_year_no_upfront_hourly_rate: f64,
    pub standard_reserved_instance_3_year_partial_upfront_total_cost: PartialUpfront,
    pub standard_reserved_instance_3_year_partial_upfront_hourly_rate: f64,
    pub standard_reserved_instance_3_year_all_upfront_total_cost: f64,
    pub standard_reserved_instance_3_year_all_upfront_hourly_rate: f64,
}

/// Commitment length of a purchasing option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    OneYear,
    ThreeYear,
}

impl Term {
    pub const ALL: [Term; 2] = [Term::OneYear, Term::ThreeYear];

    pub fn years(self) -> u32 {
        match self {
            Term::OneYear => 1,
            Term::ThreeYear => 3,
        }
    }

    /// Infix used by the flat field names, e.g. `1_year`.
    pub fn key(self) -> &'static str {
        match self {
            Term::OneYear => "1_year",
            Term::ThreeYear => "3_year",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Term::OneYear => "1 Year",
            Term::ThreeYear => "3 Year",
        }
    }
}

/// Discounted purchasing-option families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanFamily {
    ComputeSavingsPlan,
    InstanceSavingsPlan,
    ReservedInstance,
}

impl PlanFamily {
    /// Display order of the families.
    pub const ALL: [PlanFamily; 3] = [
        PlanFamily::ComputeSavingsPlan,
        PlanFamily::InstanceSavingsPlan,
        PlanFamily::ReservedInstance,
    ];

    /// Prefix used by the flat field names.
    pub fn key(self) -> &'static str {
        match self {
            PlanFamily::ComputeSavingsPlan => "compute_savings_plan",
            PlanFamily::InstanceSavingsPlan => "ec2_savings_plan",
            PlanFamily::ReservedInstance => "standard_reserved_instance",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlanFamily::ComputeSavingsPlan => "Compute Savings Plan",
            PlanFamily::InstanceSavingsPlan => "EC2 Savings Plan",
            PlanFamily::ReservedInstance => "Standard Reserved Instance",
        }
    }

    pub fn is_savings_plan(self) -> bool {
        matches!(self, PlanFamily::ComputeSavingsPlan | PlanFamily::InstanceSavingsPlan)
    }
}

/// Upfront payment variants of a discounted purchasing option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentOption {
    NoUpfront,
    PartialUpfront,
    AllUpfront,
}

impl PaymentOption {
    pub const ALL: [PaymentOption; 3] = [PaymentOption::NoUpfront, PaymentOption::PartialUpfront, PaymentOption::AllUpfront];

    pub fn label(self) -> &'static str {
        match self {
            PaymentOption::NoUpfront => "No Upfront",
            PaymentOption::PartialUpfront => "Partial Upfront",
            PaymentOption::AllUpfront => "All Upfront",
        }
    }
}

/// The six figures of one family and term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermFigures {
    pub no_upfront_total_cost: f64,
    pub no_upfront_hourly_rate: f64,
    pub partial_upfront: PartialUpfront,
    pub partial_upfront_hourly_rate: f64,
    pub all_upfront_total_cost: f64,
    pub all_upfront_hourly_rate: f64,
}

impl TermFigures {
    /// `(hourly_rate, total_cost)` for one payment option.
    pub fn rate_and_total(&self, payment: PaymentOption) -> (f64, f64) {
        match payment {
            PaymentOption::NoUpfront => (self.no_upfront_hourly_rate, self.no_upfront_total_cost),
            PaymentOption::PartialUpfront => (self.partial_upfront_hourly_rate, self.partial_upfront.total_cost),
            PaymentOption::AllUpfront => (self.all_upfront_hourly_rate, self.all_upfront_total_cost),
        }
    }
}

// Expands the six `<family>_<years>_year_*` fields into a `TermFigures`.
macro_rules! term_figures {
    ($f:expr, $family:ident, $years:literal) => {
        paste::paste! {
            TermFigures {
                no_upfront_total_cost: $f.[<$family _ $years _year_no_upfront_total_cost>],
                no_upfront_hourly_rate: $f.[<$family _ $years _year_no_upfront_hourly_rate>],
                partial_upfront: $f.[<$family _ $years _year_partial_upfront_total_cost>],
                partial_upfront_hourly_rate: $f.[<$family _ $years _year_partial_upfront_hourly_rate>],
                all_upfront_total_cost: $f.[<$family _ $years _year_all_upfront_total_cost>],
                all_upfront_hourly_rate: $f.[<$family _ $years _year_all_upfront_hourly_rate>],
            }
        }
    };
}

impl PricingFigures {
    /// On-demand total for a term.
    pub fn on_demand_total(&self, term: Term) -> f64 {
        match term {
            Term::OneYear => self.on_demand_1_year_total_cost,
            Term::ThreeYear => self.on_demand_3_year_total_cost,
        }
    }

    /// The six figures of one family and term.
    pub fn term_figures(&self, family: PlanFamily, term: Term) -> TermFigures {
        match (family, term) {
            (PlanFamily::ComputeSavingsPlan, Term::OneYear) => term_figures!(self, compute_savings_plan, 1),
            (PlanFamily::ComputeSavingsPlan, Term::ThreeYear) => term_figures!(self, compute_savings_plan, 3),
            (PlanFamily::InstanceSavingsPlan, Term::OneYear) => term_figures!(self, ec2_savings_plan, 1),
            (PlanFamily::InstanceSavingsPlan, Term::ThreeYear) => term_figures!(self, ec2_savings_plan, 3),
            (PlanFamily::ReservedInstance, Term::OneYear) => term_figures!(self, standard_reserved_instance, 1),
            (PlanFamily::ReservedInstance, Term::ThreeYear) => term_figures!(self, standard_reserved_instance, 3),
        }
    }

    /// Number of partial-upfront triples violating `total = upfront_fee + plan_cost`.
    pub fn unbalanced_partial_upfronts(&self) -> usize {
        PlanFamily::ALL
            .iter()
            .flat_map(|family| Term::ALL.iter().map(move |term| (*family, *term)))
            .filter(|(family, term)| !self.term_figures(*family, *term).partial_upfront.is_balanced())
            .count()
    }
}

/// Pricing result for one request, order-matched to the submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingOutcome {
    #[serde(rename = "input_data")]
    pub input: PricingRequest,
    #[serde(rename = "pricing_results", default)]
    pub results: Option<PricingFigures>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl PricingOutcome {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Figures to render: present only when the row has no errors.
    pub fn priced_figures(&self) -> Option<&PricingFigures> {
        if self.has_errors() { None } else { self.results.as_ref() }
    }
}
