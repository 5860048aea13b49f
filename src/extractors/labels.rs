// src/extractors/labels.rs
use crate::statement::{Field, Statement};
use std::collections::VecDeque;

/// Label phrases, lowercase, matched as sentence prefixes.
pub static LABELS: &[(&str, Field)] = &[
    ("franked amount", Field::FrankedAmount),
    ("unfranked", Field::UnfrankedAmount),
    ("withholding tax", Field::WithholdingTax),
    ("less withholding tax", Field::WithholdingTax),
    ("number of shares allotted", Field::SharesAllotted),
    ("cost of shares allotted", Field::CostOfSharesAllotted),
    ("total shares", Field::TotalShares),
    ("total payment", Field::TotalPayment),
    ("total amount", Field::TotalPayment),
    ("franking credit", Field::FrankingCredit),
    // Recognized so their numbers are not taken by an earlier label.
    ("dividend rate", Field::Other),
    ("participating shares", Field::Other),
    ("participating holding", Field::Other),
    ("net amount", Field::Other),
    ("dividend reinvestment plan amount", Field::Other),
    ("cash balance brought forward", Field::Other),
    ("amount available from this payment", Field::Other),
    ("total amount available for reinvestment", Field::Other),
    ("cash balance carried forward", Field::Other),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelMatch {
    pub field: Field,
    pub label: &'static str,
}

/// Finds the longest label that prefixes `text` (case-insensitively) and
/// whose field is neither bound nor already waiting for a numeral.
pub fn match_label(text: &str, statement: &Statement, pending: &VecDeque<Field>) -> Option<LabelMatch> {
    let lowered = text.to_lowercase();
    LABELS
        .iter()
        .filter(|(label, _)| lowered.starts_with(label))
        .filter(|(_, field)| {
            *field == Field::Other || !(statement.is_populated(*field) || pending.contains(field))
        })
        .max_by_key(|(label, _)| label.len())
        .map(|&(label, field)| LabelMatch { field, label })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_prefix_match_is_case_insensitive() {
        let statement = Statement::default();
        let pending = VecDeque::new();
        let found = match_label("Franked Amount: $36.00", &statement, &pending).unwrap();
        assert_eq!(found.field, Field::FrankedAmount);
        assert_eq!(found.label, "franked amount");

        let found = match_label("LESS WITHHOLDING TAX", &statement, &pending).unwrap();
        assert_eq!(found.field, Field::WithholdingTax);

        assert!(match_label("The franked amount", &statement, &pending).is_none());
    }

    #[test]
    fn test_populated_or_pending_fields_are_skipped() {
        let mut statement = Statement::default();
        let mut pending = VecDeque::new();
        pending.push_back(Field::TotalShares);
        assert!(match_label("Total shares held", &statement, &pending).is_none());

        let found = match_label("Total amount available for reinvestment", &statement, &pending).unwrap();
        assert_eq!(found.field, Field::Other);
        let found = match_label("Total amount", &statement, &pending).unwrap();
        assert_eq!(found.field, Field::TotalPayment);

        statement.bind(Field::TotalPayment, Decimal::ONE);
        let found = match_label("Total amount available for reinvestment", &statement, &pending).unwrap();
        assert_eq!(found.field, Field::Other);
        assert!(match_label("Total payment", &statement, &pending).is_none());
    }

    #[test]
    fn test_other_labels_always_match() {
        let statement = Statement::default();
        let mut pending = VecDeque::new();
        pending.push_back(Field::Other);
        let found = match_label("Net Amount", &statement, &pending).unwrap();
        assert_eq!(found.field, Field::Other);
    }
}
