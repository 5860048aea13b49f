// src/extractors/statement.rs

// --- Imports ---
use crate::config::ExtractorConfig;
use crate::dispenser::Dispenser;
use crate::extractors::labels::{match_label, LabelMatch};
use crate::statement::{Field, Statement};
use crate::utils::error::ExtractWarning;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::VecDeque;

// --- Positional Patterns (Lazy Static) ---
static ASX_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^asx code: (.+)").expect("Failed to compile ASX_CODE_RE"));

// The sentence after one of these headers holds the payment date.
static PAYMENT_DATE_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)payment date|holder reference number")
        .expect("Failed to compile PAYMENT_DATE_HEADER_RE")
});

const PAYMENT_DATE_FORMAT: &str = "%d %B %Y"; // 15 March 2020

/// Walks reconstructed text sentence by sentence and fills a [`Statement`].
pub struct StatementExtractor<'h> {
    config: ExtractorConfig,
    holders: &'h [String],
}

/// Mutable state of one extraction pass.
struct Pass {
    statement: Statement,
    pending: VecDeque<Field>,
    warnings: Vec<ExtractWarning>,
}

impl<'h> StatementExtractor<'h> {
    pub fn new(config: ExtractorConfig, holders: &'h [String]) -> Self {
        Self { config, holders }
    }

    pub fn extract(&self, fragments: &[String]) -> (Statement, Vec<ExtractWarning>) {
        let mut d = Dispenser::new(fragments);
        let mut pass = Pass {
            statement: Statement::default(),
            pending: VecDeque::new(),
            warnings: Vec::new(),
        };

        while d.next_sentence() {
            let sentence = d.consume_sentence();

            if let Some(found) = match_label(&sentence, &pass.statement, &pass.pending) {
                self.accept_label(&mut pass, found, Some(&sentence));
                continue;
            }

            d.start_of_sentence();
            let joined = d.peek_sentences(self.config.lookahead_sentences).join(" ");
            if let Some(found) = match_label(&joined, &pass.statement, &pass.pending) {
                self.accept_label(&mut pass, found, None);
                continue;
            }
            if pass.statement.account_holders.is_empty() {
                self.match_holders(&joined, &mut pass.statement);
            }

            self.find_positional(&sentence, &mut d, &mut pass);

            if let Some(&field) = pass.pending.front() {
                if let Some(value) = self.numeral_near_start(&sentence) {
                    pass.pending.pop_front();
                    self.bind(&mut pass.statement, field, value);
                }
            }
        }

        if !pass.pending.is_empty() {
            tracing::debug!("Labels left without a value: {:?}", pass.pending);
        }
        (pass.statement, pass.warnings)
    }

    /// Binds the value following the label in the same sentence, or queues
    /// the field until a later sentence supplies one.
    fn accept_label(&self, pass: &mut Pass, found: LabelMatch, sentence: Option<&str>) {
        tracing::debug!("Found label '{}' for {}", found.label, found.field);
        let inline = sentence.and_then(|sentence| {
            let rest: String = sentence.chars().skip(found.label.chars().count()).collect();
            self.numeral_near_start(rest.trim_start())
        });
        match inline {
            Some(value) => self.bind(&mut pass.statement, found.field, value),
            None => pass.pending.push_back(found.field),
        }
    }

    fn bind(&self, statement: &mut Statement, field: Field, value: Decimal) {
        if statement.bind(field, value) {
            tracing::debug!("Bound {} to {}", value, field);
        } else if field != Field::Other {
            tracing::warn!("Value {} does not fit {}, leaving it unset", value, field);
        }
    }

    /// The first numeral of `sentence`, if it sits within the numeral window.
    fn numeral_near_start(&self, sentence: &str) -> Option<Decimal> {
        let mut words = Dispenser::from_sentence(sentence);
        words.next_sentence();
        if words.jump_next_numeral() && words.position() < self.config.numeral_window {
            words.numeral()
        } else {
            None
        }
    }

    fn match_holders(&self, text: &str, statement: &mut Statement) {
        let lowered = text.to_lowercase();
        for holder in self.holders {
            if lowered.contains(&holder.to_lowercase()) {
                tracing::debug!("Found account holder '{}'", holder);
                statement.account_holders.push(holder.clone());
            }
        }
    }

    /// Entity, ASX code and payment date, recognized by where they sit
    /// rather than by a label. Expects `d` at the start of `sentence` and
    /// leaves it there.
    fn find_positional(&self, sentence: &str, d: &mut Dispenser, pass: &mut Pass) {
        if sentence.len() > 3 && sentence.starts_with("ABN") {
            if d.position() == 0 {
                tracing::debug!("ABN line opens the document, no entity name before it");
            } else {
                d.last_sentence();
                let entity = d.consume_sentence();
                let entity = entity.trim();
                if !entity.is_empty() {
                    tracing::debug!("Found entity '{}'", entity);
                    pass.statement.entity = Some(entity.to_string());
                }
                d.next_sentence();
            }
        }

        if let Some(caps) = ASX_CODE_RE.captures(sentence) {
            let code = caps[1].to_uppercase();
            if !code.trim().is_empty() {
                tracing::debug!("Found ASX code '{}'", code);
                pass.statement.asx_code = Some(code);
            }
        }

        if PAYMENT_DATE_HEADER_RE.is_match(sentence) {
            if !d.next_sentence() {
                return;
            }
            let text = d.consume_sentence();
            match NaiveDate::parse_from_str(text.trim(), PAYMENT_DATE_FORMAT) {
                Ok(date) => {
                    tracing::debug!("Found payment date {}", date);
                    pass.statement.payment_date = Some(date);
                }
                Err(e) => {
                    let warning = ExtractWarning::DateParse {
                        text: text.trim().to_string(),
                        reason: e.to_string(),
                    };
                    tracing::warn!("{}", warning);
                    pass.warnings.push(warning);
                }
            }
            d.last_sentence();
        }
    }
}
