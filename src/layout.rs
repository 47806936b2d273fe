//! Side panel geometry, shared by the renderer and by click hit-testing so
//! the two can never disagree about where a row or indicator is.

use crate::types::Point;

/// Rectangle in panel-local pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PanelRect {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }
}

/// What a click inside the panel landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelHit {
    ScrollUp,
    ScrollDown,
    /// Editor row by visible slot.
    Row(usize),
}

/// Geometry of the panel appended to the right of a `frame_width` video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelLayout {
    /// Composite x where the panel starts (= video width).
    pub origin_x: u32,
    pub width: u32,
    pub height: u32,
    pub visible_rows: usize,
}

impl PanelLayout {
    pub const MARGIN: i32 = 10;
    pub const LINE_HEIGHT: i32 = 14;
    pub const FIELDS_TOP: i32 = 84;
    pub const ROW_HEIGHT: i32 = 70;
    pub const INDICATOR_SIZE: i32 = 30;
    pub const ESTIMATE_HEIGHT: i32 = 80;

    pub fn new(frame_width: u32, panel_width: u32, height: u32, visible_rows: usize) -> Self {
        Self {
            origin_x: frame_width,
            width: panel_width,
            height,
            visible_rows,
        }
    }

    pub fn composite_width(&self) -> u32 {
        self.origin_x + self.width
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.origin_x as f32
            && p.x < self.composite_width() as f32
            && p.y >= 0.0
            && p.y < self.height as f32
    }

    /// Composite x of a panel-local x.
    pub fn abs_x(&self, local_x: i32) -> i32 {
        self.origin_x as i32 + local_x
    }

    /// Editor row at a visible slot. Rows leave room for the indicators
    /// on the right.
    pub fn row_rect(&self, slot: usize) -> PanelRect {
        PanelRect {
            x: 5,
            y: Self::FIELDS_TOP + slot as i32 * Self::ROW_HEIGHT,
            w: self.width as i32 - 10 - Self::INDICATOR_SIZE,
            h: Self::ROW_HEIGHT - 6,
        }
    }

    fn fields_bottom(&self) -> i32 {
        Self::FIELDS_TOP + self.visible_rows as i32 * Self::ROW_HEIGHT
    }

    pub fn scroll_up_rect(&self) -> PanelRect {
        PanelRect {
            x: self.width as i32 - Self::INDICATOR_SIZE,
            y: Self::FIELDS_TOP,
            w: Self::INDICATOR_SIZE,
            h: Self::INDICATOR_SIZE,
        }
    }

    pub fn scroll_down_rect(&self) -> PanelRect {
        PanelRect {
            x: self.width as i32 - Self::INDICATOR_SIZE,
            y: self.fields_bottom() - Self::INDICATOR_SIZE - 6,
            w: Self::INDICATOR_SIZE,
            h: Self::INDICATOR_SIZE,
        }
    }

    /// Target readout box at the bottom of the panel.
    pub fn estimate_rect(&self) -> PanelRect {
        PanelRect {
            x: 5,
            y: self.height as i32 - Self::ESTIMATE_HEIGHT - 5,
            w: self.width as i32 - 10,
            h: Self::ESTIMATE_HEIGHT,
        }
    }

    /// Baseline of the transient notice, just above the readout box.
    pub fn notice_y(&self) -> i32 {
        self.estimate_rect().y - Self::LINE_HEIGHT - 4
    }

    /// Resolve a composite-space click. Indicators win over rows.
    pub fn hit(&self, p: Point) -> Option<PanelHit> {
        if !self.contains(p) {
            return None;
        }
        let x = p.x as i32 - self.origin_x as i32;
        let y = p.y as i32;
        if self.scroll_up_rect().contains(x, y) {
            return Some(PanelHit::ScrollUp);
        }
        if self.scroll_down_rect().contains(x, y) {
            return Some(PanelHit::ScrollDown);
        }
        (0..self.visible_rows)
            .find(|&slot| self.row_rect(slot).contains(x, y))
            .map(PanelHit::Row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> PanelLayout {
        PanelLayout::new(640, 300, 480, 3)
    }

    #[test]
    fn test_hit_rows_and_indicators() {
        let l = layout();
        let row1 = l.row_rect(1);
        let p = Point::new((l.abs_x(row1.x) + 20) as f32, (row1.y + 10) as f32);
        assert_eq!(l.hit(p), Some(PanelHit::Row(1)));

        let up = l.scroll_up_rect();
        let p = Point::new((l.abs_x(up.x) + 5) as f32, (up.y + 5) as f32);
        assert_eq!(l.hit(p), Some(PanelHit::ScrollUp));

        let down = l.scroll_down_rect();
        let p = Point::new((l.abs_x(down.x) + 5) as f32, (down.y + 5) as f32);
        assert_eq!(l.hit(p), Some(PanelHit::ScrollDown));
    }

    #[test]
    fn test_video_area_is_not_panel() {
        let l = layout();
        assert_eq!(l.hit(Point::new(100.0, 100.0)), None);
        assert!(!l.contains(Point::new(639.0, 10.0)));
        assert!(l.contains(Point::new(640.0, 10.0)));
        assert!(!l.contains(Point::new(940.0, 10.0)));
    }

    #[test]
    fn test_gap_between_rows_hits_nothing() {
        let l = layout();
        let row0 = l.row_rect(0);
        let p = Point::new(l.abs_x(20) as f32, (row0.bottom() + 2) as f32);
        assert_eq!(l.hit(p), None);
    }
}
