//! Placing panels on the dashboard grid
use crate::promdash_types::model::panel::{GridPos, PanelDescription};

/// Widths and heights are in grid units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    pub grid_width: u32,
    /// Height of graphs and singlestats; also the step used when wrapping
    pub row_height: u32,
    pub graph_width: u32,
    pub singlestat_width: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            grid_width: 24,
            row_height: 5,
            graph_width: 12,
            singlestat_width: 6,
        }
    }
}

impl LayoutConfig {
    fn width_of(&self, panel: &PanelDescription) -> u32 {
        match panel {
            PanelDescription::Graph(_) => self.graph_width,
            PanelDescription::Singlestat(_) => self.singlestat_width,
            PanelDescription::RowHeader(_) => self.grid_width,
        }
    }
}

/// Assigns a position to every panel in order.
///
/// Panels are placed left to right and wrap onto the next line when they
/// would exceed the grid width. A row header always starts a new line and
/// spans the full width. Positions only depend on the order and kinds of
/// the panels so laying out twice gives the same result.
pub fn layout(panels: &mut [PanelDescription], config: &LayoutConfig) {
    let mut x = 0;
    let mut y = 0;

    for panel in panels.iter_mut() {
        if panel.is_row_header() {
            if y != 0 {
                y += config.row_height;
            }
            panel.set_grid_pos(GridPos::new(0, y, config.grid_width, 1));
            x = 0;
            y += 1;
            continue;
        }

        let w = config.width_of(panel);
        if x + w > config.grid_width {
            x = 0;
            y += config.row_height;
        }
        panel.set_grid_pos(GridPos::new(x, y, w, config.row_height));
        x += w;
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::promdash_types::model::panel::{Graph, RowHeader, Singlestat};

    fn positions(panels: &[PanelDescription]) -> Vec<(u32, u32, u32, u32)> {
        panels
            .iter()
            .map(|p| {
                let pos = p.grid_pos().unwrap();
                (pos.x, pos.y, pos.w, pos.h)
            })
            .collect()
    }

    fn config() -> LayoutConfig {
        LayoutConfig {
            grid_width: 24,
            row_height: 8,
            graph_width: 12,
            singlestat_width: 6,
        }
    }

    #[test]
    fn graphs_wrap_when_the_line_is_full() {
        let mut panels: Vec<PanelDescription> = (0..3)
            .map(|i| Graph::new(format!("g{}", i)).into())
            .collect();

        layout(&mut panels, &config());

        assert_eq!(
            positions(&panels),
            vec![(0, 0, 12, 8), (12, 0, 12, 8), (0, 8, 12, 8)]
        );
    }

    #[test]
    fn mixed_widths_fill_the_line() {
        let mut panels: Vec<PanelDescription> = vec![
            Singlestat::new("a", "a").into(),
            Graph::new("b").into(),
            Singlestat::new("c", "c").into(),
            Singlestat::new("d", "d").into(),
        ];

        layout(&mut panels, &config());

        assert_eq!(
            positions(&panels),
            vec![(0, 0, 6, 8), (6, 0, 12, 8), (18, 0, 6, 8), (0, 8, 6, 8)]
        );
    }

    #[test]
    fn row_headers_start_a_new_line() {
        let mut panels: Vec<PanelDescription> = vec![
            RowHeader::new("http").into(),
            Graph::new("a").into(),
            RowHeader::new("process").into(),
            Graph::new("b").into(),
        ];

        layout(&mut panels, &config());

        assert_eq!(
            positions(&panels),
            vec![(0, 0, 24, 1), (0, 1, 12, 8), (0, 9, 24, 1), (0, 10, 12, 8)]
        );
    }

    #[test]
    fn layout_is_idempotent() {
        let mut panels: Vec<PanelDescription> = vec![
            Graph::new("a").into(),
            RowHeader::new("r").into(),
            Singlestat::new("b", "b").into(),
            Graph::new("c").into(),
            Graph::new("d").into(),
        ];

        layout(&mut panels, &config());
        let first = positions(&panels);
        layout(&mut panels, &config());

        assert_eq!(positions(&panels), first);
    }

    #[test]
    fn empty_input_is_fine() {
        let mut panels: Vec<PanelDescription> = Vec::new();
        layout(&mut panels, &LayoutConfig::default());
        assert!(panels.is_empty());
    }
}
