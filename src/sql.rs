//! Render a dataset as an idempotent SQL script for the PostgreSQL store.
//!
//! Every statement is an `INSERT ... ON CONFLICT ... DO UPDATE` so the script
//! can be re-applied for the same reference date without changing the final
//! table contents.  A new reference date inserts fresh `indicator_values`
//! rows, which is how a per-day snapshot is taken.

use itertools::Itertools;
use jiff::civil::Date;
use jiff::Zoned;
use log::warn;
use thiserror::Error;

use crate::dataset::Dataset;

#[derive(Error, Debug)]
pub enum ScriptError {
    /// Indicator identity must be unique within a run; a duplicate means the
    /// dataset shape does not match what the generator expects.
    #[error("duplicate indicator ids in dataset: {0}")]
    DuplicateIndicatorIds(String),
}

/// Escape a free-text field for a PostgreSQL string literal and wrap it in
/// quotes.  Single quotes are doubled.
fn literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Render a numeric field.  Values that failed normalization upstream come
/// through as NaN; a bare `NaN` token is not a valid PostgreSQL numeric
/// literal and would abort the whole batch, so non-finite values become NULL.
fn numeric(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        "NULL".to_string()
    }
}

/// Fixed category name -> id mapping.  Unmapped names fall back to the first
/// category id; that is a documented default, not a failure.
pub fn category_id(name: &str) -> i64 {
    match name {
        "epidemiologico" => 1,
        "producao" => 2,
        "financeiro" => 3,
        "recursos_humanos" => 4,
        "metas_pas" => 5,
        other => {
            warn!("unmapped indicator category '{}', defaulting to id 1", other);
            1
        }
    }
}

/// Generate the full upsert script for one run.  `as_of` keys the
/// `indicator_values` rows; re-running on the same date overwrites that
/// date's rows.
pub fn generate(dataset: &Dataset, as_of: Date) -> Result<String, ScriptError> {
    let duplicates: Vec<i64> = dataset
        .indicators
        .iter()
        .map(|i| i.id)
        .duplicates()
        .sorted()
        .collect();
    if !duplicates.is_empty() {
        return Err(ScriptError::DuplicateIndicatorIds(
            duplicates.iter().join(", "),
        ));
    }

    let mut script = format!(
        r#"-- =====================================================
-- Municipal health indicator monitoring system
-- Upsert script generated from '{}'
-- Date: {}
-- =====================================================

"#,
        dataset.metadata.source_file,
        Zoned::now().strftime("%Y-%m-%d %H:%M:%S"),
    );

    script.push_str("-- Indicator categories\n");
    for category in &dataset.categories {
        script.push_str(&format!(
            r#"INSERT INTO categories (id, name, description, active) VALUES
({}, {}, {}, true)
ON CONFLICT (id) DO UPDATE SET
    name = EXCLUDED.name,
    description = EXCLUDED.description;

"#,
            category.id,
            literal(&category.name),
            literal(&category.description),
        ));
    }

    script.push_str("-- Indicators\n");
    for ind in &dataset.indicators {
        script.push_str(&format!(
            r#"INSERT INTO indicators (id, name, description, category_id, unit, annual_target, data_source, notes, active) VALUES
({}, {}, {}, {}, {}, {}, {}, {}, true)
ON CONFLICT (id) DO UPDATE SET
    name = EXCLUDED.name,
    description = EXCLUDED.description,
    annual_target = EXCLUDED.annual_target,
    data_source = EXCLUDED.data_source;

"#,
            ind.id,
            literal(&ind.name),
            literal(&ind.description),
            category_id(&ind.category),
            literal(&ind.unit),
            numeric(ind.annual_target),
            literal(&ind.data_source),
            literal(&format!("Extraído da aba: {}", ind.origin_sheet)),
        ));
    }

    script.push_str("-- Current indicator values\n");
    for ind in &dataset.indicators {
        script.push_str(&format!(
            r#"INSERT INTO indicator_values (indicator_id, reference_date, realized_value, target_value, data_source, notes, validated) VALUES
({}, '{}', {}, {}, {}, 'Valor extraído da planilha oficial', true)
ON CONFLICT (indicator_id, reference_date) DO UPDATE SET
    realized_value = EXCLUDED.realized_value,
    target_value = EXCLUDED.target_value;

"#,
            ind.id,
            as_of,
            numeric(ind.current_value),
            numeric(ind.annual_target),
            literal(&ind.data_source),
        ));
    }

    script.push_str("-- Alerts\n");
    for alert in &dataset.alerts {
        script.push_str(&format!(
            r#"INSERT INTO alerts (id, indicator_id, title, message, severity, reference_date, resolved) VALUES
({}, {}, {}, {}, '{}', '{}', {})
ON CONFLICT (id) DO UPDATE SET
    title = EXCLUDED.title,
    message = EXCLUDED.message,
    severity = EXCLUDED.severity;

"#,
            alert.id,
            alert.indicator_id,
            literal(&alert.title),
            literal(&alert.message),
            alert.severity.as_str(),
            alert.reference_date,
            alert.resolved,
        ));
    }

    Ok(script)
}
