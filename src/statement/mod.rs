// src/statement/mod.rs
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A currency amount held as whole cents. `has_value` separates a bound
/// zero from a field that was never found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dollar {
    pub cents: i64,
    pub has_value: bool,
}

impl Dollar {
    /// Rounds `value` to the nearest cent, halves away from zero.
    /// `None` if the amount does not fit in an `i64` cent count.
    pub fn from_value(value: Decimal) -> Option<Dollar> {
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()?;
        Some(Dollar {
            cents,
            has_value: true,
        })
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.has_value.then(|| Decimal::new(self.cents, 2))
    }
}

impl fmt::Display for Dollar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amount() {
            Some(amount) => write!(f, "${}", amount),
            None => f.write_str("-"),
        }
    }
}

// Absent amounts are `null`; present ones are number literals with exactly
// two decimals (`0.00`). serde_json's `arbitrary_precision` keeps the literal.
impl Serialize for Dollar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.amount() {
            Some(amount) => serde_json::Number::from_str(&amount.to_string())
                .map_err(S::Error::custom)?
                .serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

/// Statement fields a label can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    FrankedAmount,
    UnfrankedAmount,
    WithholdingTax,
    SharesAllotted,
    CostOfSharesAllotted,
    TotalShares,
    TotalPayment,
    FrankingCredit,
    /// Recognized labels whose values are not kept.
    Other,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::FrankedAmount => "franked amount",
            Field::UnfrankedAmount => "unfranked amount",
            Field::WithholdingTax => "withholding tax",
            Field::SharesAllotted => "shares allotted",
            Field::CostOfSharesAllotted => "cost of shares allotted",
            Field::TotalShares => "total shares",
            Field::TotalPayment => "total payment",
            Field::FrankingCredit => "franking credit",
            Field::Other => "other",
        };
        f.write_str(name)
    }
}

/// Facts extracted from one dividend or distribution statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub entity: Option<String>,
    #[serde(rename = "ASXCode")]
    pub asx_code: Option<String>,
    pub account_holders: Vec<String>,
    pub payment_date: Option<NaiveDate>,
    pub total_payment: Dollar,
    pub franking_credit: Dollar,
    pub unfranked_amount: Dollar,
    pub franked_amount: Dollar,
    pub withholding_tax: Dollar,
    pub shares_allotted: Option<i64>,
    pub cost_of_shares_allotted: Dollar,
    pub total_shares: Option<i64>,
}

impl Statement {
    /// Whether `field` already holds a value. `Other` never does.
    pub fn is_populated(&self, field: Field) -> bool {
        match field {
            Field::FrankedAmount => self.franked_amount.has_value,
            Field::UnfrankedAmount => self.unfranked_amount.has_value,
            Field::WithholdingTax => self.withholding_tax.has_value,
            Field::SharesAllotted => self.shares_allotted.is_some(),
            Field::CostOfSharesAllotted => self.cost_of_shares_allotted.has_value,
            Field::TotalShares => self.total_shares.is_some(),
            Field::TotalPayment => self.total_payment.has_value,
            Field::FrankingCredit => self.franking_credit.has_value,
            Field::Other => false,
        }
    }

    /// Stores a numeral in `field`. Currency fields round to cents, share
    /// counts truncate toward zero. Returns false when the value was dropped.
    pub fn bind(&mut self, field: Field, value: Decimal) -> bool {
        let slot = match field {
            Field::FrankedAmount => &mut self.franked_amount,
            Field::UnfrankedAmount => &mut self.unfranked_amount,
            Field::WithholdingTax => &mut self.withholding_tax,
            Field::CostOfSharesAllotted => &mut self.cost_of_shares_allotted,
            Field::TotalPayment => &mut self.total_payment,
            Field::FrankingCredit => &mut self.franking_credit,
            Field::SharesAllotted => {
                self.shares_allotted = value.trunc().to_i64();
                return self.shares_allotted.is_some();
            }
            Field::TotalShares => {
                self.total_shares = value.trunc().to_i64();
                return self.total_shares.is_some();
            }
            Field::Other => return false,
        };
        match Dollar::from_value(value) {
            Some(dollar) => {
                *slot = dollar;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    #[test]
    fn test_dollar_rounds_to_cents() {
        assert_eq!(Dollar::from_value(dec("36.005")).unwrap().cents, 3601);
        assert_eq!(Dollar::from_value(dec("36.004")).unwrap().cents, 3600);
        assert_eq!(Dollar::from_value(dec("-1.005")).unwrap().cents, -101);
        assert_eq!(Dollar::from_value(dec("4500.50")).unwrap().cents, 450050);
    }

    #[test]
    fn test_zero_and_absent_serialize_differently() {
        let zero = Dollar::from_value(Decimal::ZERO).unwrap();
        assert!(zero.has_value);
        assert_eq!(zero.cents, 0);
        assert_eq!(serde_json::to_string(&zero).unwrap(), "0.00");
        assert_eq!(serde_json::to_string(&Dollar::default()).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&Dollar::from_value(dec("36")).unwrap()).unwrap(),
            "36.00"
        );
        assert_eq!(
            serde_json::to_string(&Dollar::from_value(dec("-1.5")).unwrap()).unwrap(),
            "-1.50"
        );
    }

    #[test]
    fn test_bind_and_populated() {
        let mut statement = Statement::default();
        assert!(!statement.is_populated(Field::FrankedAmount));
        assert!(statement.bind(Field::FrankedAmount, dec("36.00")));
        assert!(statement.is_populated(Field::FrankedAmount));
        assert_eq!(statement.franked_amount.cents, 3600);

        assert!(statement.bind(Field::SharesAllotted, dec("12.9")));
        assert_eq!(statement.shares_allotted, Some(12));

        assert!(!statement.bind(Field::Other, dec("1.5")));
        assert!(!statement.is_populated(Field::Other));
    }

    #[test]
    fn test_statement_json_field_names() {
        let mut statement = Statement {
            asx_code: Some("XYZ".to_string()),
            payment_date: NaiveDate::from_ymd_opt(2020, 3, 15),
            ..Default::default()
        };
        statement.bind(Field::TotalPayment, dec("100"));
        let json = serde_json::to_value(&statement).unwrap();
        assert_eq!(json["ASXCode"], "XYZ");
        assert_eq!(json["PaymentDate"], "2020-03-15");
        assert!(json["TotalPayment"].is_number());
        assert_eq!(json["TotalPayment"].to_string(), "100.00");
        assert!(json["Entity"].is_null());
        assert!(json["FrankedAmount"].is_null());
        assert!(json["SharesAllotted"].is_null());
        assert_eq!(json["AccountHolders"], serde_json::json!([]));
    }

    #[test]
    fn test_empty_statement_serializes_nulls() {
        let json = serde_json::to_string(&Statement::default()).unwrap();
        assert!(json.starts_with(r#"{"Entity":null,"ASXCode":null,"AccountHolders":[],"PaymentDate":null,"TotalPayment":null"#));
    }
}
