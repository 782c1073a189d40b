//! Sectional gate label normalisation.
//!
//! A handful of venues report sectional gates every 200m ("1400m") instead of
//! every furlong ("7f"). Labels are rewritten to furlongs so downstream code
//! only ever sees one convention; exact distances remain in the `D` field.

use serde_json::Value;

/// Course codes whose sectional gates are labelled in metres.
pub const METRIC_GATE_COURSES: [&str; 5] = ["65", "66", "67", "68", "31"];

const METRES_PER_GATE: f64 = 200.0;

pub fn uses_metric_gates(course_code: &str) -> bool {
    METRIC_GATE_COURSES.contains(&course_code)
}

/// Convert a metric gate label to furlongs; other labels pass through.
pub fn furlong_label(label: &str) -> String {
    if label.len() < 10 {
        if let Some(metres) = label.strip_suffix('m') {
            if let Ok(metres) = metres.parse::<f64>() {
                return format!("{}f", metres / METRES_PER_GATE);
            }
        }
    }
    label.to_string()
}

/// Rewrite the `G` field of every sectional row in place.
pub fn normalize_gate_labels(rows: &mut Value) {
    let Value::Array(rows) = rows else {
        return;
    };
    for row in rows.iter_mut() {
        if let Some(Value::String(label)) = row.get_mut("G") {
            *label = furlong_label(label);
        }
    }
}
