//! Column dialect detection and row normalization.
//!
//! Two column-naming conventions are understood. The standard dialect uses the canonical field
//! names as headers. The billing-export dialect prefixes most headers with `aws/` and carries
//! the quantity positionally in the last column of each row.

use super::reader::RawRow;
use crate::types::{DEFAULT_TENANCY, PricingRequest};

const BILLING_EXPORT_MARKERS: [&str; 3] = ["aws/region_code", "aws/instance_type", "aws/operating_system"];

/// Column-naming convention of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Canonical headers: `region_code`, `instance_type`, `operation`, `operating_system`,
    /// `product_tenancy`, `qty`
    Standard,
    /// Billing-export headers: `aws/region_code`, `aws/instance_type`, `Operation`,
    /// `aws/operating_system`, `aws/product_tenancy`; quantity is the last column
    BillingExport,
}

impl Dialect {
    /// Pick the dialect from the headers present in a row.
    pub fn detect<'a>(mut headers: impl Iterator<Item = &'a str>) -> Self {
        if headers.any(|h| BILLING_EXPORT_MARKERS.contains(&h)) {
            Dialect::BillingExport
        } else {
            Dialect::Standard
        }
    }

    pub fn of(row: &RawRow) -> Self {
        Self::detect(row.headers())
    }

    /// Map a row to a canonical request. The result may be incomplete.
    pub fn extract(self, row: &RawRow) -> PricingRequest {
        let field = |header: &str| row.get(header).map(str::trim).unwrap_or_default().to_string();
        let tenancy = |header: &str| match row.get(header).map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => DEFAULT_TENANCY.to_string(),
        };

        match self {
            Dialect::Standard => PricingRequest {
                region_code: field("region_code"),
                instance_type: field("instance_type"),
                operation: field("operation"),
                operating_system: field("operating_system"),
                product_tenancy: tenancy("product_tenancy"),
                qty: parse_qty(row.get("qty")),
            },
            Dialect::BillingExport => PricingRequest {
                region_code: field("aws/region_code"),
                instance_type: field("aws/instance_type"),
                operation: field("Operation"),
                operating_system: field("aws/operating_system"),
                product_tenancy: tenancy("aws/product_tenancy"),
                qty: parse_qty(row.last_value()),
            },
        }
    }
}

/// Parse a quantity from its leading integer digits, falling back to 1 when absent or below 1.
pub fn parse_qty(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else { return 1 };
    let raw = raw.trim();

    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    let digits = &digits[..end];

    if negative || digits.is_empty() {
        return 1;
    }
    match digits.parse::<u32>() {
        Ok(0) => 1,
        Ok(qty) => qty,
        Err(_) => u32::MAX,
    }
}

/// Normalize rows into canonical requests, discarding any row missing a required field.
pub fn normalize(rows: &[RawRow]) -> Vec<PricingRequest> {
    let mut billing_export_rows = 0usize;
    let requests: Vec<PricingRequest> = rows
        .iter()
        .map(|row| {
            let dialect = Dialect::of(row);
            if dialect == Dialect::BillingExport {
                billing_export_rows += 1;
            }
            dialect.extract(row)
        })
        .filter(PricingRequest::is_complete)
        .collect();

    tracing::info!(
        rows = rows.len(),
        kept = requests.len(),
        dropped = rows.len() - requests.len(),
        billing_export_rows,
        "Normalized upload rows"
    );
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_billing_export_row_normalizes() {
        let row = RawRow::from_pairs([
            ("aws/region_code", "us-east-1"),
            ("aws/instance_type", "t2.micro"),
            ("Operation", "RunInstances"),
            ("aws/operating_system", "Linux"),
            ("Usage Quantity", "3"),
        ]);

        assert_eq!(Dialect::of(&row), Dialect::BillingExport);
        let requests = normalize(&[row]);
        assert_eq!(
            requests,
            vec![PricingRequest {
                region_code: "us-east-1".to_string(),
                instance_type: "t2.micro".to_string(),
                operation: "RunInstances".to_string(),
                operating_system: "Linux".to_string(),
                product_tenancy: "Shared".to_string(),
                qty: 3,
            }]
        );
    }

    #[test]
    fn test_billing_export_qty_ignores_named_columns() {
        let row = RawRow::from_pairs([
            ("aws/region_code", "eu-west-1"),
            ("aws/instance_type", "m5.large"),
            ("Operation", "RunInstances"),
            ("aws/operating_system", "Windows"),
            ("aws/product_tenancy", "Dedicated"),
            ("qty", "9"),
            ("Cost", "12.5"),
        ]);

        let request = Dialect::of(&row).extract(&row);
        assert_eq!(request.product_tenancy, "Dedicated");
        assert_eq!(request.qty, 12);
    }

    #[test]
    fn test_standard_row_trims_and_defaults() {
        let row = RawRow::from_pairs([
            ("region_code", " us-east-1 "),
            ("instance_type", "t3.micro"),
            ("operation", "RunInstances"),
            ("operating_system", "Linux"),
            ("product_tenancy", "  "),
            ("qty", "abc"),
        ]);

        assert_eq!(Dialect::of(&row), Dialect::Standard);
        let request = Dialect::Standard.extract(&row);
        assert_eq!(request.region_code, "us-east-1");
        assert_eq!(request.product_tenancy, "Shared");
        assert_eq!(request.qty, 1);
    }

    #[test]
    fn test_incomplete_rows_are_dropped() {
        let complete = RawRow::from_pairs([
            ("region_code", "us-east-1"),
            ("instance_type", "t3.micro"),
            ("operation", "RunInstances"),
            ("operating_system", "Linux"),
        ]);
        let missing_os = RawRow::from_pairs([
            ("region_code", "us-east-1"),
            ("instance_type", "t3.micro"),
            ("operation", "RunInstances"),
        ]);
        let unrelated = RawRow::from_pairs([("name", "web-1")]);

        let requests = normalize(&[complete, missing_os, unrelated]);
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_rows_detect_dialect_independently() {
        let standard = RawRow::from_pairs([
            ("region_code", "us-east-1"),
            ("instance_type", "t3.micro"),
            ("operation", "RunInstances"),
            ("operating_system", "Linux"),
            ("qty", "2"),
        ]);
        let billing = RawRow::from_pairs([
            ("aws/region_code", "us-west-2"),
            ("aws/instance_type", "c5.large"),
            ("Operation", "RunInstances"),
            ("aws/operating_system", "Linux"),
            ("count", "5"),
        ]);

        let requests = normalize(&[standard, billing]);
        assert_eq!(requests.iter().map(|r| r.qty).collect::<Vec<_>>(), vec![2, 5]);
    }

    #[rstest]
    #[case(None, 1)]
    #[case(Some(""), 1)]
    #[case(Some("4"), 4)]
    #[case(Some(" 12 "), 12)]
    #[case(Some("7.9"), 7)]
    #[case(Some("3 instances"), 3)]
    #[case(Some("0"), 1)]
    #[case(Some("-2"), 1)]
    #[case(Some("+6"), 6)]
    #[case(Some("x5"), 1)]
    fn test_parse_qty(#[case] raw: Option<&str>, #[case] expected: u32) {
        assert_eq!(parse_qty(raw), expected);
    }
}
