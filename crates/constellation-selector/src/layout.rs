//! Plot layout hand-off
//!
//! Places selected satellites on a polar layout for an external plotter:
//! each satellite takes the next angular slot (`2π / N` apart) and sits at
//! radius `1 - coverage`, so better-covering satellites sit nearer the
//! target at the origin. Each constellation is a closed polyline.

use crate::{CoverageDataset, ScoredConstellation};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutPoint {
    pub satellite: usize,
    pub x: f64,
    pub y: f64,
}

/// Closed outline of one constellation; the first point is repeated last
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationTrace {
    pub points: Vec<LayoutPoint>,
}

pub fn layout(chosen: &[ScoredConstellation], dataset: &CoverageDataset) -> Vec<ConstellationTrace> {
    let angle = 2.0 * PI / dataset.num_satellites() as f64;
    let mut slot = 0usize;

    chosen
        .iter()
        .filter(|c| !c.constellation.is_empty())
        .map(|c| {
            let mut points: Vec<LayoutPoint> = c
                .constellation
                .iter()
                .map(|satellite| {
                    let radius = 1.0 - dataset.coverage(satellite);
                    let theta = slot as f64 * angle;
                    slot += 1;
                    LayoutPoint {
                        satellite,
                        x: radius * theta.cos(),
                        y: radius * theta.sin(),
                    }
                })
                .collect();
            points.push(points[0]);
            ConstellationTrace { points }
        })
        .collect()
}

/// Layout wrapped for the plotter, target marked at the origin
pub fn to_layout_json(chosen: &[ScoredConstellation], dataset: &CoverageDataset) -> serde_json::Value {
    let traces: Vec<serde_json::Value> = layout(chosen, dataset)
        .into_iter()
        .zip(chosen.iter().filter(|c| !c.constellation.is_empty()))
        .map(|(trace, c)| {
            serde_json::json!({
                "constellation": c.constellation,
                "score": c.score,
                "points": trace.points,
            })
        })
        .collect();

    serde_json::json!({
        "title": "Constellations",
        "target": {"x": 0.0, "y": 0.0},
        "traces": traces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::score_constellation;
    use crate::Constellation;

    fn chosen(dataset: &CoverageDataset) -> Vec<ScoredConstellation> {
        vec![
            score_constellation(Constellation::new([0, 3]), dataset),
            score_constellation(Constellation::new([1, 2]), dataset),
        ]
    }

    #[test]
    fn test_traces_are_closed_and_slotted() {
        let data = CoverageDataset::new(2, vec![0.9, 0.1, 0.9, 0.1]).unwrap();
        let traces = layout(&chosen(&data), &data);

        assert_eq!(traces.len(), 2);
        for trace in &traces {
            assert_eq!(trace.points.len(), 3);
            assert_eq!(trace.points.first(), trace.points.last());
        }

        // Slot 0 on the +x axis at radius 1 - 0.9
        let p = traces[0].points[0];
        assert_eq!(p.satellite, 0);
        assert!((p.x - 0.1).abs() < 1e-9);
        assert!(p.y.abs() < 1e-9);

        // Slot 2 (satellite 1) lands on -x at radius 0.9
        let p = traces[1].points[0];
        assert_eq!(p.satellite, 1);
        assert!((p.x + 0.9).abs() < 1e-9);
        assert!(p.y.abs() < 1e-9);
    }

    #[test]
    fn test_layout_json_shape() {
        let data = CoverageDataset::new(2, vec![0.9, 0.1, 0.9, 0.1]).unwrap();
        let json = to_layout_json(&chosen(&data), &data);

        let traces = json["traces"].as_array().unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0]["constellation"], serde_json::json!([0, 3]));
        assert_eq!(traces[1]["points"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_empty_selection_has_no_traces() {
        let data = CoverageDataset::new(1, vec![0.5]).unwrap();
        assert!(layout(&[], &data).is_empty());
    }
}
