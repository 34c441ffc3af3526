// Replays a recorded chart onto a ratatui braille canvas

use super::surface::{DisplayList, DrawCommand, Point, Size, Surface, TextAlign};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    text::{Line as TextLine, Span},
    widgets::{
        Block, Widget,
        canvas::{Canvas, Context, Line},
    },
};
use unicode_width::UnicodeWidthStr;

/// Braille resolution: dots per terminal cell
pub const DOTS_PER_COLUMN: u16 = 2;
pub const DOTS_PER_ROW: u16 = 4;

/// Line pieces per quadratic segment when flattening
const CURVE_STEPS: usize = 8;

/// Surface size, in dots, of a terminal area
pub fn dots_for(area: Rect) -> Size {
    Size::new(
        (area.width * DOTS_PER_COLUMN) as f64,
        (area.height * DOTS_PER_ROW) as f64,
    )
}

/// Widget drawing a [`DisplayList`] stretched over its area
pub struct TerminalCanvas<'a> {
    list: &'a DisplayList,
    block: Option<Block<'a>>,
}

impl<'a> TerminalCanvas<'a> {
    pub fn new(list: &'a DisplayList) -> Self {
        Self { list, block: None }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl Widget for TerminalCanvas<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = match &self.block {
            Some(block) => block.inner(area),
            None => area,
        };
        let Some(size) = self.list.size() else {
            if let Some(block) = self.block {
                block.render(area, buf);
            }
            return;
        };

        let units_per_column = if inner.width > 0 {
            size.width / inner.width as f64
        } else {
            DOTS_PER_COLUMN as f64
        };
        let list = self.list;

        let mut canvas = Canvas::default()
            .marker(Marker::Braille)
            .x_bounds([0.0, size.width])
            .y_bounds([0.0, size.height])
            .paint(move |ctx| replay(ctx, list, size, units_per_column));
        if let Some(block) = self.block {
            canvas = canvas.block(block);
        }
        canvas.render(area, buf);
    }
}

fn replay(ctx: &mut Context, list: &DisplayList, size: Size, units_per_column: f64) {
    // Surface y points down, canvas y points up
    let flip = |p: Point| (p.x, size.height - p.y);

    for command in list.commands() {
        match command {
            DrawCommand::Clear => {}
            DrawCommand::Stroke { path, stroke } => {
                let color: Color = stroke.paint.composite().into();
                for polyline in path.flatten(CURVE_STEPS) {
                    for pair in polyline.windows(2) {
                        let (x1, y1) = flip(pair[0]);
                        let (x2, y2) = flip(pair[1]);
                        ctx.draw(&Line {
                            x1,
                            y1,
                            x2,
                            y2,
                            color,
                        });
                    }
                }
            }
            DrawCommand::Fill { path, paint } => {
                let color: Color = paint.composite().into();
                for polygon in path.flatten(CURVE_STEPS) {
                    for (x, y_top, y_bottom) in scanline_spans(&polygon) {
                        let (x1, y1) = flip(Point::new(x, y_top));
                        let (x2, y2) = flip(Point::new(x, y_bottom));
                        ctx.draw(&Line {
                            x1,
                            y1,
                            x2,
                            y2,
                            color,
                        });
                    }
                }
            }
            DrawCommand::Text { text } => {
                let width = text.content.width() as f64 * units_per_column;
                let x = match text.align {
                    TextAlign::Left => text.position.x,
                    TextAlign::Right => (text.position.x - width).max(0.0),
                };
                let (x, y) = flip(Point::new(x, text.position.y));
                let span = Span::styled(text.content.clone(), Style::default().fg(text.color.into()));
                ctx.print(x, y.clamp(0.0, size.height), TextLine::from(span));
            }
        }
        ctx.layer();
    }
}

/// Vertical spans covering a closed polygon, one per whole x unit (even-odd rule)
fn scanline_spans(polygon: &[Point]) -> Vec<(f64, f64, f64)> {
    let mut spans = Vec::new();
    if polygon.len() < 3 {
        return spans;
    }

    let min_x = polygon.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = polygon.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    if !min_x.is_finite() || !max_x.is_finite() {
        return spans;
    }

    let mut x = min_x.ceil();
    while x <= max_x {
        let mut crossings: Vec<f64> = polygon
            .windows(2)
            .filter_map(|edge| {
                let (a, b) = (edge[0], edge[1]);
                let spans_x = (a.x <= x && x < b.x) || (b.x <= x && x < a.x);
                spans_x.then(|| a.y + (x - a.x) / (b.x - a.x) * (b.y - a.y))
            })
            .collect();
        crossings.sort_by(f64::total_cmp);

        for pair in crossings.chunks_exact(2) {
            spans.push((x, pair[0], pair[1]));
        }
        x += 1.0;
    }
    spans
}
