//! Output record export: flat CSV and JSON.
//!
//! ```text
//! RunOutput.cells → write_csv()  → one row per cell, one column per score
//!                 → write_json() → array of HexCell records
//! ```
//!
//! CSV columns, in order:
//!
//! ```text
//! cell_id, lat, lon, <cat>_accessibility..., <cat>_norm..., avg_rent, match_score, group, group_label
//! ```
//!
//! Score columns cover every category present on at least one cell, in
//! enum order. Absent values are empty fields. `group` is the tier index,
//! the cluster id, or `-1` for noise.

use std::io::Write;

use crate::model::{Category, Classification, ClusterLabel, HexCell};
use crate::Result;

/// Write cells as a pretty-printed JSON array.
pub fn write_json(cells: &[HexCell], writer: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, cells)?;
    writeln!(writer)?;
    Ok(())
}

/// Write cells as CSV with a header row.
pub fn write_csv(cells: &[HexCell], writer: &mut dyn Write) -> Result<()> {
    let accessibility = present_categories(cells, |c| c.accessibility.keys().collect());
    let normalized = present_categories(cells, |c| c.normalized.keys().collect());

    let mut header = vec!["cell_id".to_string(), "lat".into(), "lon".into()];
    header.extend(accessibility.iter().map(|c| c.accessibility_column()));
    header.extend(normalized.iter().map(|c| c.norm_column()));
    header.extend(["avg_rent", "match_score", "group", "group_label"].map(String::from));
    writeln!(writer, "{}", header.join(","))?;

    for cell in cells {
        let mut row = vec![cell.id.to_string(), cell.centroid.lat.to_string(), cell.centroid.lon.to_string()];
        row.extend(accessibility.iter().map(|c| format_opt(cell.accessibility.get(*c).copied())));
        row.extend(normalized.iter().map(|c| format_opt(cell.normalized.get(*c).copied())));
        row.push(format_opt(cell.avg_rent));
        row.push(format_opt(cell.match_score));

        let (group, label) = match &cell.classification {
            Some(class @ Classification::Tier { index, .. }) => (index.to_string(), class.label()),
            Some(class @ Classification::Cluster { label, .. }) => (
                match label {
                    ClusterLabel::Noise => "-1".to_string(),
                    ClusterLabel::Cluster(id) => id.to_string(),
                },
                class.label(),
            ),
            None => (String::new(), ""),
        };
        row.push(group);
        row.push(escape(label));
        writeln!(writer, "{}", row.join(","))?;
    }
    Ok(())
}

fn present_categories(cells: &[HexCell], keys: impl Fn(&HexCell) -> Vec<Category>) -> Vec<Category> {
    let mut seen = [false; Category::COUNT];
    for cell in cells {
        for c in keys(cell) {
            seen[c.index()] = true;
        }
    }
    Category::ALL.into_iter().filter(|c| seen[c.index()]).collect()
}

fn format_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Quote a field when it holds a delimiter, quote or newline.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
