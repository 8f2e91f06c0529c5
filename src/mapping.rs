//! Import column mapping.
//!
//! Matches the headers of an uploaded commitments/actuals file against the
//! fixed target schema using a lexical heuristic. Every suggestion is meant
//! to be confirmed by a person before rows are imported; confirmed mappings
//! can be kept in a [`MappingTemplateStore`] and replayed for the next file
//! with the same layout.

use crate::error::{ForecastError, Result};
use crate::schema::{ColumnSuggestion, TargetSchema};
use crate::utils::normalize_key;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const EXACT_MATCH_CONFIDENCE: f64 = 1.0;
pub const ALIAS_MATCH_CONFIDENCE: f64 = 0.95;
pub const ALIAS_PARTIAL_CONFIDENCE: f64 = 0.8;
pub const SUBSTRING_CONFIDENCE: f64 = 0.7;

/// Normalised headers shorter than this only take part in exact matching.
pub const MIN_PARTIAL_MATCH_LEN: usize = 2;

/// A column of the import target schema. Aliases are stored normalised
/// (lower-case, no separators).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetColumn {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

const COMMITMENT_COLUMNS: &[TargetColumn] = &[
    TargetColumn {
        name: "project_id",
        aliases: &["project", "projectcode", "projectnumber", "projectno", "proj"],
        required: true,
    },
    TargetColumn {
        name: "po_number",
        aliases: &["po", "purchaseorder", "ponum", "pono", "orderno", "ordernumber"],
        required: true,
    },
    TargetColumn {
        name: "vendor_id",
        aliases: &["supplierid", "vendorcode", "suppliercode", "vendorno"],
        required: false,
    },
    TargetColumn {
        name: "vendor_name",
        aliases: &["vendor", "supplier", "suppliername", "payee"],
        required: true,
    },
    TargetColumn {
        name: "description",
        aliases: &["desc", "details", "lineitem", "memo", "text"],
        required: false,
    },
    TargetColumn {
        name: "amount",
        aliases: &["value", "total", "cost", "netamount", "price"],
        required: true,
    },
    TargetColumn {
        name: "currency",
        aliases: &["curr", "ccy", "currencycode"],
        required: false,
    },
    TargetColumn {
        name: "issue_date",
        aliases: &["date", "podate", "orderdate", "created", "issued"],
        required: true,
    },
    TargetColumn {
        name: "status",
        aliases: &["state", "postatus"],
        required: false,
    },
];

const ACTUAL_COLUMNS: &[TargetColumn] = &[
    TargetColumn {
        name: "project_id",
        aliases: &["project", "projectcode", "projectnumber", "projectno", "proj"],
        required: true,
    },
    TargetColumn {
        name: "po_number",
        aliases: &["po", "purchaseorder", "ponum", "pono", "orderno", "ordernumber"],
        required: false,
    },
    TargetColumn {
        name: "invoice_number",
        aliases: &["invoice", "invoiceno", "invoicenum", "documentnumber", "docno"],
        required: true,
    },
    TargetColumn {
        name: "vendor_id",
        aliases: &["supplierid", "vendorcode", "suppliercode", "vendorno"],
        required: false,
    },
    TargetColumn {
        name: "vendor_name",
        aliases: &["vendor", "supplier", "suppliername", "payee"],
        required: false,
    },
    TargetColumn {
        name: "description",
        aliases: &["desc", "details", "lineitem", "memo", "text"],
        required: false,
    },
    TargetColumn {
        name: "amount",
        aliases: &["value", "total", "cost", "netamount", "price"],
        required: true,
    },
    TargetColumn {
        name: "currency",
        aliases: &["curr", "ccy", "currencycode"],
        required: false,
    },
    TargetColumn {
        name: "posting_date",
        aliases: &["date", "invoicedate", "posted", "bookingdate"],
        required: true,
    },
];

pub fn schema_columns(schema: TargetSchema) -> &'static [TargetColumn] {
    match schema {
        TargetSchema::Commitment => COMMITMENT_COLUMNS,
        TargetSchema::Actual => ACTUAL_COLUMNS,
    }
}

/// One suggestion per header that matched anything, in header order.
/// Headers without any match are left out.
pub fn detect_mapping<S: AsRef<str>>(headers: &[S], schema: TargetSchema) -> Vec<ColumnSuggestion> {
    let suggestions: Vec<ColumnSuggestion> = headers
        .iter()
        .filter_map(|header| best_match(header.as_ref(), schema))
        .collect();

    debug!(
        "Column mapping for {:?}: {} of {} headers matched",
        schema,
        suggestions.len(),
        headers.len()
    );
    suggestions
}

/// Highest-confidence target column for a single header. Ties keep the
/// column that comes first in the schema.
pub fn best_match(header: &str, schema: TargetSchema) -> Option<ColumnSuggestion> {
    let source = normalize_key(header);
    if source.is_empty() {
        return None;
    }

    let mut best: Option<(&TargetColumn, f64)> = None;
    for column in schema_columns(schema) {
        if let Some(score) = score_column(&source, column) {
            if best.map_or(true, |(_, current)| score > current) {
                best = Some((column, score));
            }
        }
    }

    match best {
        Some((column, confidence)) => Some(ColumnSuggestion {
            source_header: header.to_string(),
            target_column: column.name.to_string(),
            confidence,
        }),
        None => {
            debug!("No target column for header '{}'", header);
            None
        }
    }
}

fn score_column(source: &str, column: &TargetColumn) -> Option<f64> {
    let target = normalize_key(column.name);

    if source == target {
        return Some(EXACT_MATCH_CONFIDENCE);
    }
    if column.aliases.iter().any(|alias| *alias == source) {
        return Some(ALIAS_MATCH_CONFIDENCE);
    }
    if source.chars().count() < MIN_PARTIAL_MATCH_LEN {
        return None;
    }
    if column
        .aliases
        .iter()
        .any(|alias| source.contains(alias) || alias.contains(source))
    {
        return Some(ALIAS_PARTIAL_CONFIDENCE);
    }
    if source.contains(&target) || target.contains(source) {
        return Some(SUBSTRING_CONFIDENCE);
    }
    None
}

/// Required target columns no suggestion points at.
pub fn missing_required(schema: TargetSchema, suggestions: &[ColumnSuggestion]) -> Vec<&'static str> {
    schema_columns(schema)
        .iter()
        .filter(|column| column.required)
        .filter(|column| !suggestions.iter().any(|s| s.target_column == column.name))
        .map(|column| column.name)
        .collect()
}

/// A confirmed header -> column mapping for one file layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTemplate {
    pub name: String,
    pub schema: TargetSchema,
    /// Keyed by normalised source header.
    pub columns: BTreeMap<String, String>,
}

impl MappingTemplate {
    pub fn from_suggestions(name: &str, schema: TargetSchema, confirmed: &[ColumnSuggestion]) -> Self {
        let columns = confirmed
            .iter()
            .map(|s| (normalize_key(&s.source_header), s.target_column.clone()))
            .collect();
        Self {
            name: name.to_string(),
            schema,
            columns,
        }
    }

    /// Replays the template against a new header row. Headers the template
    /// knows come back with full confidence; others are left out.
    pub fn apply<S: AsRef<str>>(&self, headers: &[S]) -> Vec<ColumnSuggestion> {
        headers
            .iter()
            .filter_map(|header| {
                let header = header.as_ref();
                self.columns
                    .get(&normalize_key(header))
                    .map(|target| ColumnSuggestion {
                        source_header: header.to_string(),
                        target_column: target.clone(),
                        confidence: EXACT_MATCH_CONFIDENCE,
                    })
            })
            .collect()
    }
}

/// Caller-owned store of mapping templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingTemplateStore {
    templates: BTreeMap<String, MappingTemplate>,
}

impl MappingTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves (or replaces) the template called `name`.
    pub fn save(&mut self, name: &str, schema: TargetSchema, confirmed: &[ColumnSuggestion]) -> &MappingTemplate {
        let template = MappingTemplate::from_suggestions(name, schema, confirmed);
        debug!(
            "Saving mapping template '{}' with {} columns",
            name,
            template.columns.len()
        );
        self.templates.insert(name.to_string(), template);
        &self.templates[name]
    }

    pub fn get(&self, name: &str) -> Result<&MappingTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| ForecastError::TemplateNotFound(name.to_string()))
    }

    pub fn remove(&mut self, name: &str) -> Result<MappingTemplate> {
        self.templates
            .remove(name)
            .ok_or_else(|| ForecastError::TemplateNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(|k| k.as_str()).collect()
    }

    pub fn for_schema(&self, schema: TargetSchema) -> Vec<&MappingTemplate> {
        self.templates
            .values()
            .filter(|t| t.schema == schema)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion_for<'s>(suggestions: &'s [ColumnSuggestion], header: &str) -> Option<&'s ColumnSuggestion> {
        suggestions.iter().find(|s| s.source_header == header)
    }

    #[test]
    fn test_exact_match() {
        let s = best_match("PO_Number", TargetSchema::Commitment).unwrap();
        assert_eq!(s.target_column, "po_number");
        assert_eq!(s.confidence, EXACT_MATCH_CONFIDENCE);

        let s = best_match("Issue Date", TargetSchema::Commitment).unwrap();
        assert_eq!(s.target_column, "issue_date");
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn test_alias_exact_match() {
        let s = best_match("po", TargetSchema::Commitment).unwrap();
        assert_eq!(s.target_column, "po_number");
        assert_eq!(s.confidence, 0.95);

        let s = best_match("Supplier", TargetSchema::Commitment).unwrap();
        assert_eq!(s.target_column, "vendor_name");
        assert_eq!(s.confidence, 0.95);
    }

    #[test]
    fn test_alias_partial_match() {
        let s = best_match("Supplier Name Full", TargetSchema::Commitment).unwrap();
        assert_eq!(s.target_column, "vendor_name");
        assert_eq!(s.confidence, ALIAS_PARTIAL_CONFIDENCE);
    }

    #[test]
    fn test_substring_match() {
        let s = best_match("Amount USD", TargetSchema::Commitment).unwrap();
        assert_eq!(s.target_column, "amount");
        assert_eq!(s.confidence, SUBSTRING_CONFIDENCE);
    }

    #[test]
    fn test_confidence_ordering() {
        let exact = best_match("po_number", TargetSchema::Commitment).unwrap();
        let alias = best_match("po", TargetSchema::Commitment).unwrap();
        let partial = best_match("Supplier Name Full", TargetSchema::Commitment).unwrap();
        let substring = best_match("Amount USD", TargetSchema::Commitment).unwrap();

        assert!(exact.confidence > alias.confidence);
        assert!(alias.confidence > partial.confidence);
        assert!(partial.confidence > substring.confidence);
    }

    #[test]
    fn test_single_letter_headers_do_not_partially_match() {
        assert!(best_match("A", TargetSchema::Commitment).is_none());
        assert!(best_match("-x_", TargetSchema::Actual).is_none());

        let s = best_match("PO #", TargetSchema::Commitment).unwrap();
        assert_eq!(s.target_column, "po_number");
        assert_eq!(s.confidence, ALIAS_PARTIAL_CONFIDENCE);
    }

    #[test]
    fn test_unmatched_headers_are_dropped() {
        let headers = ["PO Number", "Zebra", "", "Amount"];
        let suggestions = detect_mapping(&headers, TargetSchema::Commitment);
        assert_eq!(suggestions.len(), 2);
        assert!(suggestion_for(&suggestions, "Zebra").is_none());
        assert_eq!(suggestions[0].source_header, "PO Number");
        assert_eq!(suggestions[1].target_column, "amount");
    }

    #[test]
    fn test_actual_schema() {
        let headers = vec!["Invoice #".to_string(), "Posting Date".to_string(), "Net Amount".to_string()];
        let suggestions = detect_mapping(&headers, TargetSchema::Actual);

        let invoice = suggestion_for(&suggestions, "Invoice #").unwrap();
        assert_eq!(invoice.target_column, "invoice_number");
        assert_eq!(invoice.confidence, ALIAS_PARTIAL_CONFIDENCE);

        let posting = suggestion_for(&suggestions, "Posting Date").unwrap();
        assert_eq!(posting.target_column, "posting_date");
        assert_eq!(posting.confidence, EXACT_MATCH_CONFIDENCE);

        let amount = suggestion_for(&suggestions, "Net Amount").unwrap();
        assert_eq!(amount.target_column, "amount");
        assert_eq!(amount.confidence, ALIAS_MATCH_CONFIDENCE);
    }

    #[test]
    fn test_missing_required() {
        let suggestions = detect_mapping(&["PO", "Vendor", "Amount"], TargetSchema::Commitment);
        let missing = missing_required(TargetSchema::Commitment, &suggestions);
        assert_eq!(missing, vec!["project_id", "issue_date"]);
    }

    #[test]
    fn test_template_store_round_trip() {
        let mut store = MappingTemplateStore::new();
        let confirmed = detect_mapping(&["PO", "Supplier", "Total"], TargetSchema::Commitment);
        store.save("erp-export", TargetSchema::Commitment, &confirmed);

        assert_eq!(store.names(), vec!["erp-export"]);
        assert_eq!(store.for_schema(TargetSchema::Commitment).len(), 1);
        assert!(store.for_schema(TargetSchema::Actual).is_empty());

        let template = store.get("erp-export").unwrap();
        let replayed = template.apply(&["supplier", "Unknown", "po"]);
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].target_column, "vendor_name");
        assert_eq!(replayed[0].confidence, 1.0);
        assert_eq!(replayed[1].source_header, "po");

        assert!(store.remove("erp-export").is_ok());
        assert_eq!(
            store.get("erp-export").unwrap_err(),
            ForecastError::TemplateNotFound("erp-export".to_string())
        );
    }
}
