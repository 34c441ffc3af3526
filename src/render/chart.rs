use super::surface::{Paint, Path, Point, Size, Stroke, Surface, Text, TextAlign};
use crate::format::format_bps;
use crate::history::RollingBuffer;
use crate::registry::{Rgb, SeriesRegistry};
use crate::sample::Direction;
use crate::scale::AxisScale;

/// Horizontal gridline divisions (labeled)
pub const HORIZONTAL_DIVISIONS: usize = 5;
/// Vertical gridline divisions (unlabeled)
pub const VERTICAL_DIVISIONS: usize = 6;

/// Geometry and colors of a chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    /// Space reserved left of the plot for axis labels
    pub left_margin: f64,
    pub right_margin: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
    pub grid_color: Rgb,
    pub label_color: Rgb,
    pub line_width: f64,
    pub fill_alpha: f64,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            left_margin: 60.0,
            right_margin: 10.0,
            top_margin: 10.0,
            bottom_margin: 10.0,
            grid_color: Rgb(0x33, 0x33, 0x40),
            label_color: Rgb(0x80, 0x80, 0x80),
            line_width: 2.0,
            fill_alpha: 0.2,
        }
    }
}

impl ChartStyle {
    /// Margins sized for a braille canvas (2x4 dots per cell)
    pub fn terminal() -> Self {
        Self {
            left_margin: 22.0, // 11 columns of labels
            right_margin: 2.0,
            top_margin: 4.0,
            bottom_margin: 4.0,
            line_width: 1.0,
            fill_alpha: 0.35,
            ..Self::default()
        }
    }
}

/// Plot rectangle inside the surface
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlotArea {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl PlotArea {
    fn new(size: Size, style: &ChartStyle) -> Option<Self> {
        let width = size.width - style.left_margin - style.right_margin;
        let height = size.height - style.top_margin - style.bottom_margin;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Self {
            left: style.left_margin,
            top: style.top_margin,
            width,
            height,
        })
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn y_for(&self, value: f64, max: f64) -> f64 {
        let ratio = if max > 0.0 {
            (value / max).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.bottom() - ratio * self.height
    }
}

/// Draws one direction's chart onto a surface
#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    style: ChartStyle,
}

impl ChartRenderer {
    pub fn new(style: ChartStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &ChartStyle {
        &self.style
    }

    /// Full redraw. Returns `false` if the surface was unavailable and nothing was drawn.
    pub fn render(
        &self,
        surface: &mut dyn Surface,
        buffer: &RollingBuffer,
        direction: Direction,
        scale: &AxisScale,
        registry: &SeriesRegistry,
    ) -> bool {
        let Some(size) = surface.size() else {
            log::trace!("{} surface unavailable, skipping draw", direction.title());
            return false;
        };

        surface.clear();

        let Some(area) = PlotArea::new(size, &self.style) else {
            log::trace!("{} surface too small for a plot", direction.title());
            return true;
        };

        let max = scale.max_for(direction);
        self.draw_grid(surface, &area, max);

        if buffer.size() < 2 {
            return true;
        }

        for entry in registry.visible() {
            let values = buffer.series(&entry.name, direction);
            let points = self.project(&area, &values, max);
            self.draw_series(surface, &area, &points, entry.color);
        }

        true
    }

    fn draw_grid(&self, surface: &mut dyn Surface, area: &PlotArea, max: f64) {
        let grid = Stroke {
            paint: Paint::solid(self.style.grid_color),
            width: 1.0,
        };

        for i in 0..=HORIZONTAL_DIVISIONS {
            let fraction = i as f64 / HORIZONTAL_DIVISIONS as f64;
            let y = area.top + fraction * area.height;
            let value = max * (HORIZONTAL_DIVISIONS - i) as f64 / HORIZONTAL_DIVISIONS as f64;

            surface.stroke(
                &Path::line(Point::new(area.left, y), Point::new(area.right(), y)),
                grid,
            );
            surface.fill_text(Text {
                content: format_bps(value),
                position: Point::new(area.left - 2.0, y),
                color: self.style.label_color,
                align: TextAlign::Right,
            });
        }

        for i in 0..=VERTICAL_DIVISIONS {
            let x = area.left + (i as f64 / VERTICAL_DIVISIONS as f64) * area.width;
            surface.stroke(
                &Path::line(Point::new(x, area.top), Point::new(x, area.bottom())),
                grid,
            );
        }
    }

    /// Buffer index -> x, value -> y
    fn project(&self, area: &PlotArea, values: &[f64], max: f64) -> Vec<Point> {
        let step = if values.len() > 1 {
            area.width / (values.len() - 1) as f64
        } else {
            0.0
        };

        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Point::new(area.left + i as f64 * step, area.y_for(v, max)))
            .collect()
    }

    fn draw_series(&self, surface: &mut dyn Surface, area: &PlotArea, points: &[Point], color: Rgb) {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return;
        };

        let line = smooth_path(points);

        let mut area_path = line.clone();
        area_path.line_to(Point::new(last.x, area.bottom()));
        area_path.line_to(Point::new(first.x, area.bottom()));
        area_path.close();

        surface.fill(&area_path, Paint::with_alpha(color, self.style.fill_alpha));
        surface.stroke(
            &line,
            Stroke {
                paint: Paint::solid(color),
                width: self.style.line_width,
            },
        );
    }
}

/// Quadratic curve through the midpoints of consecutive points, using each
/// interior point as the control point
pub fn smooth_path(points: &[Point]) -> Path {
    let mut path = Path::new();
    let Some(first) = points.first() else {
        return path;
    };
    path.move_to(*first);

    if points.len() == 2 {
        path.line_to(points[1]);
        return path;
    }

    for pair in points.windows(2).skip(1) {
        let (control, next) = (pair[0], pair[1]);
        path.quadratic_curve_to(control, control.midpoint(&next));
    }
    if let Some(last) = points.last() {
        path.line_to(*last);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::{DisplayList, DrawCommand, PathSegment};
    use crate::sample::{RawInterfaceSample, SampleIngest};

    fn buffer_for(ticks: &[Vec<(&str, f64)>]) -> (RollingBuffer, SeriesRegistry) {
        let mut buffer = RollingBuffer::new(30);
        let mut registry = SeriesRegistry::new();
        for (t, tick) in ticks.iter().enumerate() {
            let batch: Vec<RawInterfaceSample> = tick
                .iter()
                .map(|(name, v)| RawInterfaceSample::new(*name, *v, *v / 2.0, t as f64))
                .collect();
            let point = SampleIngest::reduce(&batch).point.unwrap();
            for name in point.interface_names() {
                registry.ensure(name);
            }
            buffer.append(point).unwrap();
        }
        (buffer, registry)
    }

    fn count(list: &DisplayList) -> (usize, usize, usize) {
        let mut strokes = 0;
        let mut fills = 0;
        let mut texts = 0;
        for cmd in list.commands() {
            match cmd {
                DrawCommand::Stroke { .. } => strokes += 1,
                DrawCommand::Fill { .. } => fills += 1,
                DrawCommand::Text { .. } => texts += 1,
                DrawCommand::Clear => {}
            }
        }
        (strokes, fills, texts)
    }

    const GRID_STROKES: usize = HORIZONTAL_DIVISIONS + 1 + VERTICAL_DIVISIONS + 1;

    #[test]
    fn test_single_point_draws_grid_only() {
        let (buffer, registry) = buffer_for(&[vec![("eth0", 500_000.0)]]);
        let mut list = DisplayList::new(Size::new(400.0, 200.0));

        let drawn = ChartRenderer::default().render(
            &mut list,
            &buffer,
            Direction::In,
            &AxisScale::floor(1000.0),
            &registry,
        );

        assert!(drawn);
        assert_eq!(list.commands()[0], DrawCommand::Clear);
        assert_eq!(count(&list), (GRID_STROKES, 0, HORIZONTAL_DIVISIONS + 1));
    }

    #[test]
    fn test_axis_labels() {
        let (buffer, registry) = buffer_for(&[vec![("eth0", 1.0)]]);
        let mut list = DisplayList::new(Size::new(400.0, 200.0));
        let scale = AxisScale {
            max_bits_in: 5_000_000.0,
            max_bits_out: 1000.0,
        };

        ChartRenderer::default().render(&mut list, &buffer, Direction::In, &scale, &registry);

        let labels: Vec<&str> = list.texts().map(|t| t.content.as_str()).collect();
        assert_eq!(
            labels,
            vec!["5 Mbps", "4 Mbps", "3 Mbps", "2 Mbps", "1 Mbps", "0 bps"]
        );
    }

    #[test]
    fn test_series_per_visible_interface() {
        let (buffer, mut registry) = buffer_for(&[
            vec![("eth0", 100.0), ("eth1", 200.0)],
            vec![("eth0", 300.0), ("eth1", 100.0)],
            vec![("eth0", 200.0)],
        ]);
        let scale = AxisScale::floor(1000.0);

        let mut list = DisplayList::new(Size::new(400.0, 200.0));
        ChartRenderer::default().render(&mut list, &buffer, Direction::In, &scale, &registry);
        assert_eq!(count(&list), (GRID_STROKES + 2, 2, HORIZONTAL_DIVISIONS + 1));

        registry.toggle("eth1");
        let mut list = DisplayList::new(Size::new(400.0, 200.0));
        ChartRenderer::default().render(&mut list, &buffer, Direction::In, &scale, &registry);
        assert_eq!(count(&list), (GRID_STROKES + 1, 1, HORIZONTAL_DIVISIONS + 1));
    }

    #[test]
    fn test_zero_series_draws_flat_line() {
        let (buffer, registry) = buffer_for(&[vec![("eth0", 0.0)], vec![("eth0", 0.0)]]);
        let mut list = DisplayList::new(Size::new(400.0, 200.0));
        let style = ChartStyle::default();

        ChartRenderer::new(style.clone()).render(
            &mut list,
            &buffer,
            Direction::Out,
            &AxisScale::floor(1000.0),
            &registry,
        );

        let line = list
            .commands()
            .iter()
            .rev()
            .find_map(|c| match c {
                DrawCommand::Stroke { path, .. } => Some(path.clone()),
                _ => None,
            })
            .unwrap();
        let bottom = 200.0 - style.bottom_margin;
        for segment in line.segments() {
            match segment {
                PathSegment::MoveTo { to } | PathSegment::LineTo { to } => {
                    assert_eq!(to.y, bottom)
                }
                other => panic!("unexpected segment {:?}", other),
            }
        }
    }

    #[test]
    fn test_unavailable_surface_is_skipped() {
        let (buffer, registry) = buffer_for(&[vec![("eth0", 1.0)], vec![("eth0", 2.0)]]);
        let mut list = DisplayList::unmeasured();

        let drawn = ChartRenderer::default().render(
            &mut list,
            &buffer,
            Direction::In,
            &AxisScale::floor(1000.0),
            &registry,
        );

        assert!(!drawn);
        assert!(list.commands().is_empty());
    }

    #[test]
    fn test_values_above_scale_are_clamped() {
        let (buffer, registry) = buffer_for(&[vec![("eth0", 9_000.0)], vec![("eth0", 9_000.0)]]);
        let mut list = DisplayList::new(Size::new(400.0, 200.0));
        let style = ChartStyle::default();

        ChartRenderer::new(style.clone()).render(
            &mut list,
            &buffer,
            Direction::In,
            &AxisScale::floor(1000.0),
            &registry,
        );

        let strokes = list.commands().iter().filter_map(|c| match c {
            DrawCommand::Stroke { path, .. } => Some(path),
            _ => None,
        });
        for path in strokes {
            for segment in path.segments() {
                if let PathSegment::LineTo { to } = segment {
                    assert!(to.y >= style.top_margin);
                }
            }
        }
    }

    #[test]
    fn test_smooth_path_shape() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 0.0),
            Point::new(30.0, 10.0),
        ];
        let path = smooth_path(&points);
        let segments = path.segments();

        assert_eq!(segments[0], PathSegment::MoveTo { to: points[0] });
        assert_eq!(
            segments[1],
            PathSegment::QuadTo {
                control: points[1],
                to: Point::new(15.0, 5.0)
            }
        );
        assert_eq!(segments.last(), Some(&PathSegment::LineTo { to: points[3] }));
    }
}
