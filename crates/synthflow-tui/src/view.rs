use synthflow_flow::Bounds;

pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 4.0;

/// Layout units covered by one terminal column at zoom 1.
const UNITS_PER_COL: f64 = 10.0;
/// Layout units covered by one terminal row at zoom 1. Cells are about
/// twice as tall as they are wide.
const UNITS_PER_ROW: f64 = 20.0;

const ZOOM_STEP: f64 = 1.25;

/// Visible window onto the laid-out graph.
///
/// Layout y grows downward; canvas y grows upward, so canvas bounds are
/// returned with y negated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center_x: f64,
    pub center_y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Layout-space size of a `cols` x `rows` area.
    pub fn extent(&self, cols: u16, rows: u16) -> (f64, f64) {
        (
            f64::from(cols) * UNITS_PER_COL / self.zoom,
            f64::from(rows) * UNITS_PER_ROW / self.zoom,
        )
    }

    /// Canvas `x_bounds` and `y_bounds` for an area of the given size.
    pub fn canvas_bounds(&self, cols: u16, rows: u16) -> ([f64; 2], [f64; 2]) {
        let (w, h) = self.extent(cols, rows);
        (
            [self.center_x - w / 2.0, self.center_x + w / 2.0],
            [-(self.center_y + h / 2.0), -(self.center_y - h / 2.0)],
        )
    }

    /// Whole terminal columns spanned by `units` of layout width.
    pub fn cols_for(&self, units: f64) -> usize {
        (units * self.zoom / UNITS_PER_COL).floor().max(0.0) as usize
    }

    /// Whole terminal rows spanned by `units` of layout height.
    pub fn rows_for(&self, units: f64) -> usize {
        (units * self.zoom / UNITS_PER_ROW).floor().max(0.0) as usize
    }

    /// Move by a number of terminal cells.
    pub fn pan(&mut self, cols: f64, rows: f64) {
        self.center_x += cols * UNITS_PER_COL / self.zoom;
        self.center_y += rows * UNITS_PER_ROW / self.zoom;
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / ZOOM_STEP);
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Center on `bounds` at the largest zoom that shows all of it.
    pub fn fit(&mut self, bounds: &Bounds, cols: u16, rows: u16) {
        let (cx, cy) = bounds.center();
        self.center_x = cx;
        self.center_y = cy;
        if cols == 0 || rows == 0 || bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            self.zoom = 1.0;
            return;
        }
        let zx = f64::from(cols) * UNITS_PER_COL / bounds.width();
        let zy = f64::from(rows) * UNITS_PER_ROW / bounds.height();
        self.set_zoom(zx.min(zy));
    }
}
