//! Deterministic square-grid layout.

use serde::Serialize;

use crate::config::DiagramSettings;

/// Top-left corner of a node, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Places nodes on a grid with `ceil(sqrt(n))` columns, filled row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub node_width: u32,
    pub node_height: u32,
    pub spacing: u32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::from(&DiagramSettings::default())
    }
}

impl From<&DiagramSettings> for GridLayout {
    fn from(settings: &DiagramSettings) -> Self {
        Self {
            node_width: settings.node_width,
            node_height: settings.node_height,
            spacing: settings.spacing,
        }
    }
}

impl GridLayout {
    /// Number of grid columns for `count` nodes.
    pub fn columns(count: usize) -> usize {
        let mut columns = (count as f64).sqrt().ceil() as usize;
        // Guard against float rounding at perfect squares.
        while columns * columns < count {
            columns += 1;
        }
        while columns > 1 && (columns - 1) * (columns - 1) >= count {
            columns -= 1;
        }
        columns
    }

    /// Positions for `count` nodes in enumeration order.
    pub fn positions(&self, count: usize) -> Vec<Position> {
        let columns = Self::columns(count).max(1);
        let step_x = f64::from(self.node_width) + f64::from(self.spacing);
        let step_y = f64::from(self.node_height) + f64::from(self.spacing);

        (0..count)
            .map(|i| {
                let column = (i % columns) as f64;
                let row = (i / columns) as f64;
                Position {
                    x: column * step_x,
                    y: row * step_y,
                }
            })
            .collect()
    }
}
