// SVG backend for the drawing surface
use crate::presentation::surface::{Point, Stroke, Surface, TextAlign, TextStyle};
use std::fmt::Write;

const BACKGROUND: &str = "#16181d";

/// Serializes draw calls into a standalone SVG document.
#[derive(Debug, Clone)]
pub struct SvgSurface {
    width: f64,
    height: f64,
    body: String,
}

impl SvgSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            body: String::new(),
        }
    }

    pub fn finish(self) -> String {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="100%" height="100%" fill="{bg}"/>{body}</svg>"#,
            w = self.width,
            h = self.height,
            bg = BACKGROUND,
            body = self.body
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Surface for SvgSurface {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn clear(&mut self) {
        self.body.clear();
    }

    fn line(&mut self, from: Point, to: Point, stroke: &Stroke) {
        let _ = write!(
            self.body,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="{}"/>"#,
            from.x,
            from.y,
            to.x,
            to.y,
            escape(&stroke.color),
            stroke.width
        );
    }

    fn polyline(&mut self, points: &[Point], stroke: &Stroke) {
        let coords: Vec<String> = points
            .iter()
            .map(|p| format!("{:.1},{:.1}", p.x, p.y))
            .collect();
        let _ = write!(
            self.body,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linejoin="round"/>"#,
            coords.join(" "),
            escape(&stroke.color),
            stroke.width
        );
    }

    fn marker(&mut self, center: Point, radius: f64, color: &str) {
        let _ = write!(
            self.body,
            r#"<circle cx="{:.1}" cy="{:.1}" r="{}" fill="{}"/>"#,
            center.x,
            center.y,
            radius,
            escape(color)
        );
    }

    fn text(&mut self, text: &str, anchor: Point, style: &TextStyle) {
        let text_anchor = match style.align {
            TextAlign::Left => "start",
            TextAlign::Center => "middle",
            TextAlign::Right => "end",
        };
        let transform = if style.rotation != 0.0 {
            format!(
                r#" transform="rotate({} {:.1} {:.1})""#,
                style.rotation, anchor.x, anchor.y
            )
        } else {
            String::new()
        };
        let _ = write!(
            self.body,
            r#"<text x="{:.1}" y="{:.1}" fill="{}" font-size="{}" font-family="sans-serif" text-anchor="{}"{}>{}</text>"#,
            anchor.x,
            anchor.y,
            escape(&style.color),
            style.size,
            text_anchor,
            transform,
            escape(text)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_svg_document() {
        let mut surface = SvgSurface::new(200.0, 100.0);
        surface.line(Point::new(0.0, 0.0), Point::new(10.0, 10.0), &Stroke::new("#fff", 1.0));
        surface.text(
            "<5 & >1",
            Point::new(50.0, 50.0),
            &TextStyle::new("#ccc", 10.0, TextAlign::Right).rotated(-45.0),
        );
        let svg = surface.finish();

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"<line x1="0.0" y1="0.0" x2="10.0" y2="10.0""#));
        assert!(svg.contains("&lt;5 &amp; &gt;1"));
        assert!(svg.contains(r#"text-anchor="end""#));
        assert!(svg.contains("rotate(-45 50.0 50.0)"));
    }

    #[test]
    fn test_clear_drops_body() {
        let mut surface = SvgSurface::new(100.0, 100.0);
        surface.marker(Point::new(1.0, 1.0), 3.0, "red");
        surface.clear();
        assert!(!surface.finish().contains("circle"));
    }
}
