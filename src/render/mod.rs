pub mod chart;
pub mod surface;
pub mod terminal;

pub use chart::{ChartRenderer, ChartStyle};
pub use surface::{DisplayList, DrawCommand, Path, Point, Size, Surface};
pub use terminal::TerminalCanvas;
