//! Region-of-interest checks against a dataset's scan grid.

use super::JobExecutionError;
use crate::analysis::AnalysisDetails;
use crate::dataset::Dataset;
use serde::Deserialize;

/// A region of interest over the scan grid, as found under `parameters.roi`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Roi {
    Disk {
        cx: f64,
        cy: f64,
        r: f64,
    },
    Rect {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    },
}

/// Scan grid as (height, width). A line scan is one row.
fn scan_grid(dataset: &Dataset) -> (f64, f64) {
    match dataset.scan_size() {
        [] => (0.0, 0.0),
        [w] => (1.0, *w as f64),
        [.., h, w] => (*h as f64, *w as f64),
    }
}

/// Parses and checks the ROI in `details`, if there is one.
pub fn validate_roi(
    details: &AnalysisDetails,
    dataset: &Dataset,
) -> Result<Option<Roi>, JobExecutionError> {
    let raw = match details.parameters.get("roi") {
        None => return Ok(None),
        Some(value) if value.is_null() => return Ok(None),
        Some(value) => value.clone(),
    };

    let roi: Roi = serde_json::from_value(raw)
        .map_err(|e| JobExecutionError::InvalidRoi(e.to_string()))?;
    let (height, width) = scan_grid(dataset);

    match &roi {
        Roi::Disk { cx, cy, r } => {
            if *r <= 0.0 {
                return Err(JobExecutionError::InvalidRoi(format!(
                    "disk radius must be positive, got {}",
                    r
                )));
            }
            if !(0.0..width).contains(cx) || !(0.0..height).contains(cy) {
                return Err(JobExecutionError::InvalidRoi(format!(
                    "disk center ({}, {}) outside scan grid {}x{}",
                    cx, cy, width, height
                )));
            }
        }
        Roi::Rect {
            x,
            y,
            width: w,
            height: h,
        } => {
            if *w <= 0 || *h <= 0 {
                return Err(JobExecutionError::InvalidRoi(format!(
                    "rect size must be positive, got {}x{}",
                    w, h
                )));
            }
            let right = x.checked_add(*w);
            let bottom = y.checked_add(*h);
            let fits = match (right, bottom) {
                (Some(right), Some(bottom)) => {
                    *x >= 0 && *y >= 0 && right as f64 <= width && bottom as f64 <= height
                }
                _ => false,
            };
            if !fits {
                return Err(JobExecutionError::InvalidRoi(format!(
                    "rect at ({}, {}) size {}x{} exceeds scan grid {}x{}",
                    x, y, w, h, width, height
                )));
            }
        }
    }

    Ok(Some(roi))
}
