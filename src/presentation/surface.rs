// Drawing surface - Primitive draw calls in pixel space, origin top-left

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
}

impl Stroke {
    pub fn new(color: &str, width: f64) -> Self {
        Self {
            color: color.to_string(),
            width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: String,
    pub size: f64,
    pub align: TextAlign,
    /// Clockwise rotation in degrees around the anchor point.
    pub rotation: f64,
}

impl TextStyle {
    pub fn new(color: &str, size: f64, align: TextAlign) -> Self {
        Self {
            color: color.to_string(),
            size,
            align,
            rotation: 0.0,
        }
    }

    pub fn rotated(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }
}

pub trait Surface {
    fn width(&self) -> f64;
    fn height(&self) -> f64;
    /// Erase everything drawn so far.
    fn clear(&mut self);
    fn line(&mut self, from: Point, to: Point, stroke: &Stroke);
    fn polyline(&mut self, points: &[Point], stroke: &Stroke);
    fn marker(&mut self, center: Point, radius: f64, color: &str);
    fn text(&mut self, text: &str, anchor: Point, style: &TextStyle);
}
