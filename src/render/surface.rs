//! Drawing-surface abstraction.
//!
//! The chart renderer only talks to [`Surface`]. [`DisplayList`] records the
//! calls so a host can replay them (the terminal widget does) or ship them as
//! JSON.

use crate::registry::Rgb;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Surface dimensions in device units (pixels, or braille dots for terminals)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Positive and finite in both directions
    pub fn is_drawable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PathSegment {
    MoveTo { to: Point },
    LineTo { to: Point },
    QuadTo { control: Point, to: Point },
    Close,
}

/// Sequence of subpaths, y pointing down
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(from: Point, to: Point) -> Self {
        let mut path = Self::new();
        path.move_to(from);
        path.line_to(to);
        path
    }

    pub fn move_to(&mut self, to: Point) {
        self.segments.push(PathSegment::MoveTo { to });
    }

    pub fn line_to(&mut self, to: Point) {
        self.segments.push(PathSegment::LineTo { to });
    }

    pub fn quadratic_curve_to(&mut self, control: Point, to: Point) {
        self.segments.push(PathSegment::QuadTo { control, to });
    }

    pub fn close(&mut self) {
        self.segments.push(PathSegment::Close);
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Approximate curves with `steps` line pieces each and return one
    /// polyline per subpath. Closed subpaths end on their start point.
    pub fn flatten(&self, steps: usize) -> Vec<Vec<Point>> {
        let steps = steps.max(1);
        let mut polylines: Vec<Vec<Point>> = Vec::new();
        let mut current: Vec<Point> = Vec::new();

        for segment in &self.segments {
            match *segment {
                PathSegment::MoveTo { to } => {
                    if current.len() > 1 {
                        polylines.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    current.push(to);
                }
                PathSegment::LineTo { to } => current.push(to),
                PathSegment::QuadTo { control, to } => {
                    let Some(&from) = current.last() else {
                        current.push(to);
                        continue;
                    };
                    for i in 1..=steps {
                        let t = i as f64 / steps as f64;
                        let u = 1.0 - t;
                        current.push(Point::new(
                            u * u * from.x + 2.0 * u * t * control.x + t * t * to.x,
                            u * u * from.y + 2.0 * u * t * control.y + t * t * to.y,
                        ));
                    }
                }
                PathSegment::Close => {
                    if let Some(&start) = current.first() {
                        current.push(start);
                    }
                    if current.len() > 1 {
                        polylines.push(std::mem::take(&mut current));
                    }
                    current.clear();
                }
            }
        }

        if current.len() > 1 {
            polylines.push(current);
        }
        polylines
    }
}

/// Color with opacity
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Paint {
    pub color: Rgb,
    pub alpha: f64,
}

impl Paint {
    pub fn solid(color: Rgb) -> Self {
        Self { color, alpha: 1.0 }
    }

    pub fn with_alpha(color: Rgb, alpha: f64) -> Self {
        Self {
            color,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// Flatten onto a black background
    pub fn composite(&self) -> Rgb {
        self.color.scaled(self.alpha)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stroke {
    pub paint: Paint,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub content: String,
    pub position: Point,
    pub color: Rgb,
    pub align: TextAlign,
}

/// Immediate-mode drawing target
pub trait Surface {
    /// `None` while the surface is not mounted or sized
    fn size(&self) -> Option<Size>;
    fn clear(&mut self);
    fn stroke(&mut self, path: &Path, stroke: Stroke);
    fn fill(&mut self, path: &Path, paint: Paint);
    fn fill_text(&mut self, text: Text);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum DrawCommand {
    Clear,
    Stroke { path: Path, stroke: Stroke },
    Fill { path: Path, paint: Paint },
    Text { text: Text },
}

/// Surface that records what was drawn
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayList {
    size: Option<Size>,
    commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new(size: Size) -> Self {
        Self {
            size: Some(size),
            commands: Vec::new(),
        }
    }

    /// A surface that has not been measured yet
    pub fn unmeasured() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn texts(&self) -> impl Iterator<Item = &Text> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text } => Some(text),
            _ => None,
        })
    }
}

impl Surface for DisplayList {
    fn size(&self) -> Option<Size> {
        self.size.filter(Size::is_drawable)
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn stroke(&mut self, path: &Path, stroke: Stroke) {
        self.commands.push(DrawCommand::Stroke {
            path: path.clone(),
            stroke,
        });
    }

    fn fill(&mut self, path: &Path, paint: Paint) {
        self.commands.push(DrawCommand::Fill {
            path: path.clone(),
            paint,
        });
    }

    fn fill_text(&mut self, text: Text) {
        self.commands.push(DrawCommand::Text { text });
    }
}
