//! Flattened column layout shared by the file exports.
//!
//! One row per outcome: the six input fields, the three on-demand figures, then eight columns
//! for every family and term with the partial-upfront triple expanded in place.

use crate::types::{PlanFamily, PricingFigures, PricingOutcome, Term, TermFigures};

/// A single exported cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Integer(u32),
    Number(f64),
    /// Missing figure of an outcome with no results
    Empty,
}

impl Cell {
    /// Text form used by delimited output.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Integer(i) => i.to_string(),
            Cell::Number(n) => n.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

const INPUT_COLUMNS: [&str; 6] = [
    "region_code",
    "instance_type",
    "operation",
    "operating_system",
    "product_tenancy",
    "qty",
];

const TERM_COLUMNS: [&str; 8] = [
    "no_upfront_total_cost",
    "no_upfront_hourly_rate",
    "partial_upfront_total_cost",
    "partial_upfront_upfront_fee",
    "partial_upfront_plan_cost",
    "partial_upfront_hourly_rate",
    "all_upfront_total_cost",
    "all_upfront_hourly_rate",
];

fn term_sections() -> impl Iterator<Item = (PlanFamily, Term)> {
    PlanFamily::ALL
        .into_iter()
        .flat_map(|family| Term::ALL.into_iter().map(move |term| (family, term)))
}

/// Column headers in export order.
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = INPUT_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.push("on_demand_hourly_rate".to_string());
    for term in Term::ALL {
        columns.push(format!("on_demand_{}_total_cost", term.key()));
    }
    for (family, term) in term_sections() {
        for column in TERM_COLUMNS {
            columns.push(format!("{}_{}_{}", family.key(), term.key(), column));
        }
    }
    columns
}

fn term_cells(figures: &TermFigures) -> [f64; 8] {
    [
        figures.no_upfront_total_cost,
        figures.no_upfront_hourly_rate,
        figures.partial_upfront.total_cost,
        figures.partial_upfront.upfront_fee,
        figures.partial_upfront.plan_cost,
        figures.partial_upfront_hourly_rate,
        figures.all_upfront_total_cost,
        figures.all_upfront_hourly_rate,
    ]
}

fn figure_cells(figures: &PricingFigures) -> Vec<Cell> {
    let mut cells = vec![Cell::Number(figures.on_demand_hourly_rate)];
    cells.extend(Term::ALL.into_iter().map(|term| Cell::Number(figures.on_demand_total(term))));
    for (family, term) in term_sections() {
        cells.extend(term_cells(&figures.term_figures(family, term)).map(Cell::Number));
    }
    cells
}

/// Cells of one outcome, aligned with [`header`].
pub fn row(outcome: &PricingOutcome) -> Vec<Cell> {
    let input = &outcome.input;
    let mut cells = vec![
        Cell::Text(input.region_code.clone()),
        Cell::Text(input.instance_type.clone()),
        Cell::Text(input.operation.clone()),
        Cell::Text(input.operating_system.clone()),
        Cell::Text(input.product_tenancy.clone()),
        Cell::Integer(input.qty),
    ];
    match &outcome.results {
        Some(figures) => cells.extend(figure_cells(figures)),
        None => cells.resize(header_len(), Cell::Empty),
    }
    cells
}

/// Number of exported columns.
pub fn header_len() -> usize {
    INPUT_COLUMNS.len() + 1 + Term::ALL.len() + PlanFamily::ALL.len() * Term::ALL.len() * TERM_COLUMNS.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PartialUpfront, PricingRequest};

    #[test]
    fn test_header_layout() {
        let header = header();
        assert_eq!(header.len(), 57);
        assert_eq!(header.len(), header_len());
        assert_eq!(header[5], "qty");
        assert_eq!(header[6], "on_demand_hourly_rate");
        assert_eq!(header[8], "on_demand_3_year_total_cost");
        assert_eq!(header[9], "compute_savings_plan_1_year_no_upfront_total_cost");
        assert_eq!(header[13], "compute_savings_plan_1_year_partial_upfront_plan_cost");
        assert_eq!(header[25], "ec2_savings_plan_1_year_no_upfront_total_cost");
        assert_eq!(header[56], "standard_reserved_instance_3_year_all_upfront_hourly_rate");
    }

    #[test]
    fn test_row_expands_partial_upfront() {
        let outcome = PricingOutcome {
            input: PricingRequest::new("us-east-1", "t3.micro", "RunInstances", "Linux"),
            results: Some(PricingFigures {
                on_demand_hourly_rate: 0.0104,
                compute_savings_plan_1_year_partial_upfront_total_cost: PartialUpfront {
                    total_cost: 60.0,
                    upfront_fee: 25.0,
                    plan_cost: 35.0,
                },
                ..Default::default()
            }),
            errors: vec![],
        };

        let cells = row(&outcome);
        assert_eq!(cells.len(), 57);
        assert_eq!(cells[5], Cell::Integer(1));
        assert_eq!(cells[6], Cell::Number(0.0104));
        assert_eq!(cells[11], Cell::Number(60.0));
        assert_eq!(cells[12], Cell::Number(25.0));
        assert_eq!(cells[13], Cell::Number(35.0));
    }

    #[test]
    fn test_error_only_outcome_has_empty_figures() {
        let outcome = PricingOutcome {
            input: PricingRequest::new("us-east-1", "bogus", "RunInstances", "Linux"),
            results: None,
            errors: vec!["not found".to_string()],
        };

        let cells = row(&outcome);
        assert_eq!(cells.len(), 57);
        assert_eq!(cells[1], Cell::Text("bogus".to_string()));
        assert!(cells[6..].iter().all(|c| *c == Cell::Empty));
        assert_eq!(cells[6].to_text(), "");
    }
}
