//! Public JSON snapshot of the dataset, the document served to the public
//! dashboard.  Indicators are projected down to the display fields; alerts
//! and metadata pass through unmodified.

use jiff::civil::Date;
use jiff::Zoned;
use log::{error, info};
use serde::Serialize;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dataset::{Alert, Dataset, Metadata, TargetDirection};

#[derive(Debug, Serialize)]
struct PublicIndicator<'a> {
    id: i64,
    name: &'a str,
    value: f64,
    target: f64,
    unit: &'a str,
    category: &'a str,
    last_updated: Date,
    source: &'a str,
    description: &'a str,
    target_direction: TargetDirection,
}

#[derive(Debug, Serialize)]
struct PublicSnapshot<'a> {
    indicators: Vec<PublicIndicator<'a>>,
    alerts: &'a [Alert],
    metadata: &'a Metadata,
}

fn write_snapshot(dataset: &Dataset, path: &Path) -> Result<(), Box<dyn Error>> {
    let today: Date = Zoned::now().date();
    let snapshot = PublicSnapshot {
        indicators: dataset
            .indicators
            .iter()
            .map(|i| PublicIndicator {
                id: i.id,
                name: &i.name,
                value: i.current_value,
                target: i.annual_target,
                unit: &i.unit,
                category: &i.category,
                last_updated: today,
                source: &i.data_source,
                description: &i.description,
                target_direction: i.target_direction,
            })
            .collect(),
        alerts: &dataset.alerts,
        metadata: &dataset.metadata,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    // serde_json keeps non-ASCII characters literal, which the public
    // document requires.
    fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
    Ok(())
}

/// Write the public snapshot.  Any failure is logged and reported as `None`;
/// the export never takes the pipeline down.
pub fn export(dataset: &Dataset, path: &Path) -> Option<PathBuf> {
    match write_snapshot(dataset, path) {
        Ok(()) => {
            info!("public snapshot written to {}", path.display());
            Some(path.to_path_buf())
        }
        Err(e) => {
            error!("failed to write public snapshot to {}: {}", path.display(), e);
            None
        }
    }
}
