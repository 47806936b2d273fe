use crate::canvas::{text_width, Canvas, Color, RasterCanvas};
use crate::config::OverlayConfig;
use crate::error::RenderError;
use crate::frame_mode::ModeKind;
use crate::layout::{PanelLayout, PanelRect};
use crate::overlay::{EstimateState, Overlay};
use crate::types::{Delivery, Point};
use image::RgbImage;
use std::time::{Duration, Instant};

const SELECTED: Color = [255, 0, 0];
const OTHER: Color = [0, 0, 255];
const GRID: Color = [40, 40, 40];
const INTEREST: Color = [255, 220, 0];
const TEXT: Color = [230, 230, 230];
const DIM: Color = [160, 160, 160];
const OFF: Color = [128, 128, 128];
const TRACKING: Color = [0, 220, 0];
const FROZEN: Color = [255, 60, 60];
const STOPPED: Color = [255, 170, 0];
const ARROW: Color = [220, 220, 0];
const PANEL_BG: Color = [0, 0, 0];
const ROW_BG: Color = [40, 40, 40];
const ROW_ACTIVE_BG: Color = [100, 60, 60];
const INPUT_BG: Color = [80, 60, 60];
const INPUT_ACTIVE_BG: Color = [150, 100, 80];
const BORDER: Color = [100, 100, 100];
const BORDER_ACTIVE: Color = [255, 200, 100];
const NOTICE: Color = [255, 80, 80];

const HOTKEYS: [&str; 9] = [
    "CLICK - SELECT TARGET",
    "S - STOP MODE",
    "F - AUTO-FREEZE",
    "T - TRAILS",
    "G - GRID",
    "I - INFO",
    "C - CLEAR SELECTION",
    "R - RECORD",
    "ESC - QUIT",
];

/// Per-frame values that live outside the overlay.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    /// Elapsed recording time, `None` when not recording.
    pub recording_elapsed: Option<Duration>,
    /// Wall time, for notice expiry.
    pub now: Instant,
    /// Session clock, for trail staleness and the recording pulse.
    pub session_secs: f64,
}

/// Projects overlay state into a composite image: the effective frame with
/// annotations, plus an information panel to its right.
pub struct Renderer {
    panel_width: u32,
    grid_spacing: u32,
}

impl Renderer {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            panel_width: config.panel_width,
            grid_spacing: config.grid_spacing.max(1),
        }
    }

    /// Panel geometry for the frame currently on screen.
    pub fn layout_for(&self, overlay: &Overlay) -> Option<PanelLayout> {
        overlay.effective().map(|d| {
            PanelLayout::new(
                d.frame.width(),
                self.panel_width,
                d.frame.height(),
                overlay.form().visible_count(),
            )
        })
    }

    pub fn compose(&self, overlay: &Overlay, ctx: &RenderContext) -> Result<RgbImage, RenderError> {
        let delivery = overlay.effective().ok_or(RenderError::NoFrame)?;
        let layout = self.layout_for(overlay).ok_or(RenderError::NoFrame)?;
        let mut img = blit(delivery, layout.composite_width())?;
        let mut canvas = RasterCanvas::new(&mut img);
        self.draw(&mut canvas, overlay, delivery, &layout, ctx);
        Ok(img)
    }

    /// Draw annotations and the panel over an already-blitted frame.
    pub fn draw<C: Canvas>(
        &self,
        canvas: &mut C,
        overlay: &Overlay,
        delivery: &Delivery,
        layout: &PanelLayout,
        ctx: &RenderContext,
    ) {
        let (w, h) = (delivery.frame.width(), delivery.frame.height());
        if overlay.toggles().grid {
            self.draw_grid(canvas, w, h);
        }
        draw_targets(canvas, overlay, delivery, ctx.session_secs);

        canvas.fill_rect(layout.abs_x(0), 0, layout.width, layout.height, PANEL_BG);
        let y = draw_header(canvas, overlay, delivery, layout, ctx);
        if overlay.mode() == ModeKind::Stopped {
            draw_editor(canvas, overlay, layout);
            if let Some(id) = overlay.tracks().selected() {
                draw_estimate(canvas, id, overlay.estimate(), layout);
            }
            if let Some(notice) = overlay.notice(ctx.now) {
                canvas.text(layout.abs_x(PanelLayout::MARGIN), layout.notice_y(), notice, NOTICE, 1);
            }
        } else if overlay.toggles().info {
            draw_info(canvas, overlay, layout, y);
            if let Some(notice) = overlay.notice(ctx.now) {
                canvas.text(layout.abs_x(PanelLayout::MARGIN), y + 5 * PanelLayout::LINE_HEIGHT, notice, NOTICE, 1);
            }
        }
    }

    fn draw_grid<C: Canvas>(&self, canvas: &mut C, w: u32, h: u32) {
        for x in (0..w).step_by(self.grid_spacing as usize) {
            canvas.line((x as i32, 0), (x as i32, h as i32 - 1), GRID, 1);
        }
        for y in (0..h).step_by(self.grid_spacing as usize) {
            canvas.line((0, y as i32), (w as i32 - 1, y as i32), GRID, 1);
        }
    }
}

/// Copy the frame into the left part of a `width`-wide composite.
fn blit(delivery: &Delivery, width: u32) -> Result<RgbImage, RenderError> {
    let frame = &delivery.frame;
    let height = frame.height();
    let alloc = || RenderError::Allocation { width, height };
    let row_out = (width as usize).checked_mul(3).ok_or_else(alloc)?;
    let total = row_out.checked_mul(height as usize).ok_or_else(alloc)?;
    let row_in = frame.width() as usize * 3;

    let mut buf = vec![0u8; total];
    for (dst, src) in buf.chunks_exact_mut(row_out).zip(frame.data().chunks_exact(row_in)) {
        dst[..row_in].copy_from_slice(src);
    }
    RgbImage::from_raw(width, height, buf).ok_or_else(alloc)
}

fn px(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

fn draw_targets<C: Canvas>(canvas: &mut C, overlay: &Overlay, delivery: &Delivery, now_secs: f64) {
    let tracks = overlay.tracks();
    let selected = tracks.selected();

    for r in &delivery.results {
        let (color, thickness) = if Some(r.track_id) == selected {
            (SELECTED, 3)
        } else {
            (OTHER, 2)
        };

        if overlay.toggles().trails && !tracks.is_stale(r.track_id, now_secs) {
            if let Some(trail) = tracks.trail(r.track_id) {
                if trail.len() > 1 {
                    let points: Vec<_> = trail.iter().copied().map(px).collect();
                    canvas.polyline(&points, color, 2);
                }
            }
        }

        let b = r.bbox;
        canvas.rect(
            b.x1.round() as i32,
            b.y1.round() as i32,
            b.width().round() as u32,
            b.height().round() as u32,
            color,
            thickness,
        );
        canvas.circle(px(b.center()), 4, color, true);
    }

    if selected.is_some() {
        let trail = tracks.selection_trail();
        if trail.len() > 1 {
            let points: Vec<_> = trail.iter().copied().map(px).collect();
            canvas.polyline(&points, INTEREST, 1);
        }
    }
}

/// Title and status lines. Returns the y below them.
fn draw_header<C: Canvas>(
    canvas: &mut C,
    overlay: &Overlay,
    delivery: &Delivery,
    layout: &PanelLayout,
    ctx: &RenderContext,
) -> i32 {
    let x = layout.abs_x(PanelLayout::MARGIN);
    let line = PanelLayout::LINE_HEIGHT;
    canvas.text(x, 8, "INFORMATION", TEXT, 2);

    let (freeze, freeze_color) = match (overlay.auto_freeze(), overlay.mode()) {
        (false, _) => ("AUTO-FREEZE: OFF", OFF),
        (true, ModeKind::AutoFrozen) => ("AUTO-FREEZE: ON (FROZEN)", FROZEN),
        (true, _) => ("AUTO-FREEZE: ON (TRACKING)", TRACKING),
    };
    let mut y = 32;
    canvas.text(x, y, freeze, freeze_color, 1);
    y += line;
    let (stop, stop_color) = if overlay.is_stopped() {
        ("STOP: ACTIVE", STOPPED)
    } else {
        ("STOP: OFF", OFF)
    };
    canvas.text(x, y, stop, stop_color, 1);
    y += line;
    canvas.text(x, y, &format!("TARGETS: {}", delivery.results.len()), TEXT, 1);
    y += line;

    if let Some(elapsed) = ctx.recording_elapsed {
        let pulse = (127.0 + 127.0 * (ctx.session_secs * 5.0).sin()) as u8;
        let right = layout.abs_x(layout.width as i32);
        canvas.circle((right - 18, 16), 8, [pulse, 0, 0], true);
        let secs = elapsed.as_secs();
        let clock = format!("{:02}:{:02}", secs / 60, secs % 60);
        canvas.text(right - 8 - text_width(&clock, 1), 30, &clock, FROZEN, 1);
    }
    y
}

fn draw_info<C: Canvas>(canvas: &mut C, overlay: &Overlay, layout: &PanelLayout, top: i32) {
    let x = layout.abs_x(PanelLayout::MARGIN);
    let line = PanelLayout::LINE_HEIGHT;
    let mut y = top + line;

    match overlay.tracks().selected() {
        Some(id) => {
            canvas.text(x, y, &format!("SELECTED: #{}", id), SELECTED, 1);
            y += line;
            let v = overlay.tracks().velocity(id);
            let speed = match v.and_then(|v| v.speed) {
                Some(s) => format!("SPEED: {:.1} PX/S", s),
                None => "SPEED: --".to_string(),
            };
            let heading = match v.and_then(|v| v.heading_deg) {
                Some(hd) => format!("HEADING: {:.0} DEG", hd),
                None => "HEADING: --".to_string(),
            };
            canvas.text(x, y, &speed, DIM, 1);
            y += line;
            canvas.text(x, y, &heading, DIM, 1);
        }
        None => canvas.text(x, y, "SELECTED: NONE", DIM, 1),
    }

    let legend_top = layout.height as i32 - (HOTKEYS.len() as i32 + 1) * line - 6;
    canvas.text(x, legend_top, "HOTKEYS:", TEXT, 1);
    for (i, key) in HOTKEYS.iter().enumerate() {
        canvas.text(x + 8, legend_top + (i as i32 + 1) * line, key, DIM, 1);
    }
}

fn draw_editor<C: Canvas>(canvas: &mut C, overlay: &Overlay, layout: &PanelLayout) {
    let view = overlay.form().view();
    for row in &view.rows {
        let r = layout.row_rect(row.slot);
        let (bg, input_bg, border, thickness) = if row.is_active {
            (ROW_ACTIVE_BG, INPUT_ACTIVE_BG, BORDER_ACTIVE, 2)
        } else {
            (ROW_BG, INPUT_BG, BORDER, 1)
        };
        let rx = layout.abs_x(r.x);
        canvas.fill_rect(rx, r.y, r.w as u32, r.h as u32, bg);
        canvas.text(rx + 5, r.y + 8, row.label, if row.is_active { TEXT } else { DIM }, 1);

        let input_y = r.y + 26;
        let input_w = (r.w - 10).max(0) as u32;
        canvas.fill_rect(rx + 5, input_y, input_w, 24, input_bg);
        canvas.rect(rx + 5, input_y, input_w, 24, border, thickness);
        let shown = if row.is_active {
            format!("{}_", row.text)
        } else {
            row.text.to_string()
        };
        canvas.text(rx + 10, input_y + 8, &shown, TEXT, 1);
    }

    let cx = |rect: PanelRect| layout.abs_x(rect.x + rect.w / 2);
    if view.can_scroll_up {
        let r = layout.scroll_up_rect();
        canvas.arrow((cx(r), r.bottom() - 4), (cx(r), r.y + 4), ARROW, 2);
    }
    if view.can_scroll_down {
        let r = layout.scroll_down_rect();
        canvas.arrow((cx(r), r.y + 4), (cx(r), r.bottom() - 4), ARROW, 2);
    }
}

fn draw_estimate<C: Canvas>(canvas: &mut C, id: u64, estimate: EstimateState, layout: &PanelLayout) {
    let r = layout.estimate_rect();
    let x = layout.abs_x(r.x);
    let available = matches!(estimate, EstimateState::Available(_));
    canvas.fill_rect(x, r.y, r.w as u32, r.h as u32, if available { [20, 50, 20] } else { [30, 30, 30] });
    canvas.rect(x, r.y, r.w as u32, r.h as u32, if available { TRACKING } else { BORDER }, 1);

    let tx = x + 8;
    let line = PanelLayout::LINE_HEIGHT + 2;
    let mut y = r.y + 8;
    canvas.text(tx, y, &format!("TARGET #{}", id), TEXT, 1);
    y += line;
    match estimate {
        EstimateState::Available(est) => {
            canvas.text(tx, y, &format!("DISTANCE: {:.2} M", est.distance_m), TEXT, 1);
            y += line;
            canvas.text(tx, y, &format!("LAT: {:.6}", est.latitude), TEXT, 1);
            y += line;
            canvas.text(tx, y, &format!("LON: {:.6}", est.longitude), TEXT, 1);
        }
        EstimateState::Unavailable(reason) => {
            canvas.text(tx, y, "NO ESTIMATE", NOTICE, 1);
            y += line;
            canvas.text(tx, y, &reason.to_string().to_uppercase(), DIM, 1);
        }
        EstimateState::Stale => {
            canvas.text(tx, y, "NO ESTIMATE", DIM, 1);
            y += line;
            canvas.text(tx, y, "CONFIRM ALL FIELDS", DIM, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BBox, DetectionResult, Frame};

    /// Canvas that records text and fills, for layout assertions.
    #[derive(Default)]
    struct TextLog {
        texts: Vec<(i32, i32, String)>,
    }

    impl TextLog {
        fn has(&self, needle: &str) -> bool {
            self.texts.iter().any(|(_, _, t)| t.contains(needle))
        }
    }

    impl Canvas for TextLog {
        fn width(&self) -> u32 {
            940
        }
        fn height(&self) -> u32 {
            480
        }
        fn line(&mut self, _: (i32, i32), _: (i32, i32), _: Color, _: u32) {}
        fn rect(&mut self, _: i32, _: i32, _: u32, _: u32, _: Color, _: u32) {}
        fn fill_rect(&mut self, _: i32, _: i32, _: u32, _: u32, _: Color) {}
        fn circle(&mut self, _: (i32, i32), _: i32, _: Color, _: bool) {}
        fn text(&mut self, x: i32, y: i32, text: &str, _: Color, _: u32) {
            self.texts.push((x, y, text.to_string()));
        }
    }

    fn ctx() -> RenderContext {
        RenderContext {
            recording_elapsed: None,
            now: Instant::now(),
            session_secs: 0.0,
        }
    }

    fn overlay_with(targets: &[(u64, f32, f32)]) -> Overlay {
        let mut overlay = Overlay::new(&OverlayConfig::default());
        let results = targets
            .iter()
            .map(|&(id, x, y)| DetectionResult::new(id, BBox::around(Point::new(x, y), 40.0, 40.0)))
            .collect();
        overlay.ingest(Delivery::new(Frame::solid(640, 480, [0, 0, 0]).unwrap(), results), 0.0);
        overlay
    }

    fn draw_log(overlay: &Overlay, ctx: &RenderContext) -> TextLog {
        let renderer = Renderer::new(&OverlayConfig::default());
        let layout = renderer.layout_for(overlay).unwrap();
        let mut log = TextLog::default();
        renderer.draw(&mut log, overlay, overlay.effective().unwrap(), &layout, ctx);
        log
    }

    #[test]
    fn test_composite_size_and_box_colors() {
        let mut overlay = overlay_with(&[(1, 100.0, 110.0), (2, 300.0, 310.0)]);
        overlay.select_at(Point::new(100.0, 110.0));
        let img = Renderer::new(&OverlayConfig::default()).compose(&overlay, &ctx()).unwrap();
        assert_eq!(img.dimensions(), (940, 480));
        // Left edges of the boxes: selected red, other blue.
        assert_eq!(img.get_pixel(80, 110).0, SELECTED);
        assert_eq!(img.get_pixel(82, 110).0, SELECTED, "selected box is 3 px thick");
        assert_eq!(img.get_pixel(280, 310).0, OTHER);
        assert_eq!(img.get_pixel(282, 310).0, [0, 0, 0], "other boxes are 2 px thick");
    }

    #[test]
    fn test_grid_toggle() {
        let mut overlay = overlay_with(&[]);
        let renderer = Renderer::new(&OverlayConfig::default());
        let img = renderer.compose(&overlay, &ctx()).unwrap();
        assert_eq!(img.get_pixel(50, 7).0, GRID);
        overlay.toggle_grid();
        let img = renderer.compose(&overlay, &ctx()).unwrap();
        assert_eq!(img.get_pixel(50, 7).0, [0, 0, 0]);
    }

    #[test]
    fn test_no_frame_is_an_error() {
        let overlay = Overlay::new(&OverlayConfig::default());
        let r = Renderer::new(&OverlayConfig::default()).compose(&overlay, &ctx());
        assert!(matches!(r, Err(RenderError::NoFrame)));
    }

    #[test]
    fn test_live_panel_shows_status_and_legend() {
        let mut overlay = overlay_with(&[(4, 320.0, 240.0)]);
        overlay.select_at(Point::new(320.0, 240.0));
        let log = draw_log(&overlay, &ctx());
        assert!(log.has("AUTO-FREEZE: OFF"));
        assert!(log.has("STOP: OFF"));
        assert!(log.has("TARGETS: 1"));
        assert!(log.has("SELECTED: #4"));
        assert!(log.has("ESC - QUIT"));
        assert!(!log.has("LATITUDE"));
    }

    #[test]
    fn test_stopped_panel_shows_editor_and_estimate() {
        let mut overlay = overlay_with(&[(4, 320.0, 240.0)]);
        overlay.select_at(Point::new(320.0, 240.0));
        overlay.toggle_stop(Instant::now()).unwrap();
        let log = draw_log(&overlay, &ctx());
        assert!(log.has("STOP: ACTIVE"));
        assert!(log.has("DRONE LATITUDE:"));
        assert!(log.has("DRONE ALTITUDE (m):"));
        assert!(!log.has("COMPASS"), "only three rows visible");
        assert!(log.has("NO ESTIMATE"));
        assert!(!log.has("HOTKEYS:"));
    }

    #[test]
    fn test_recording_indicator() {
        let overlay = overlay_with(&[]);
        let ctx = RenderContext {
            recording_elapsed: Some(Duration::from_secs(75)),
            ..ctx()
        };
        let log = draw_log(&overlay, &ctx);
        assert!(log.has("01:15"));
    }
}
