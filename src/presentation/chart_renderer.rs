// Chart renderer - Hand-drawn line charts and latest-value overview
use crate::domain::telemetry::{MetricSpec, Sample};
use crate::presentation::surface::{Point, Stroke, Surface, TextAlign, TextStyle};

const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 55.0;

const GRID_ROWS: usize = 5;
const MAX_X_DIVISIONS: usize = 10;
const MARKER_RADIUS: f64 = 3.0;
const X_LABEL_ROTATION: f64 = -45.0;

const GRID_COLOR: &str = "#2c2f36";
const AXIS_COLOR: &str = "#8a8f98";
const TEXT_COLOR: &str = "#c9ccd1";

/// Plot rectangle inside the fixed margins.
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl PlotArea {
    fn of(surface: &dyn Surface) -> Option<Self> {
        let width = surface.width() - MARGIN_LEFT - MARGIN_RIGHT;
        let height = surface.height() - MARGIN_TOP - MARGIN_BOTTOM;
        (width > 0.0 && height > 0.0).then_some(Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width,
            height,
        })
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    /// A single sample sits in the middle of the x range.
    fn x_at(&self, index: usize, count: usize) -> f64 {
        if count <= 1 {
            self.left + self.width / 2.0
        } else {
            self.left + self.width * index as f64 / (count - 1) as f64
        }
    }

    fn y_at(&self, value: f64, range: &ValueRange) -> f64 {
        self.bottom() - (value - range.min) / range.span() * self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ValueRange {
    min: f64,
    max: f64,
}

impl ValueRange {
    /// A degenerate range is widened by one unit centred on the value so a
    /// constant series draws at mid-height.
    fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        let (min, max) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
        if max > min {
            Some(Self { min, max })
        } else {
            Some(Self {
                min: min - 0.5,
                max: max + 0.5,
            })
        }
    }

    fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Stride shared by vertical gridlines and x-axis labels.
fn x_stride(count: usize) -> usize {
    count.div_ceil(MAX_X_DIVISIONS).max(1)
}

/// Draws one metric of `samples` as a line chart. With no values for the
/// metric the surface is left blank.
pub fn render(surface: &mut dyn Surface, spec: &MetricSpec, samples: &[Sample]) {
    surface.clear();

    let values: Vec<(usize, f64)> = samples
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.value(spec.key).map(|v| (i, v)))
        .collect();
    let Some(range) = ValueRange::of(values.iter().map(|(_, v)| *v)) else {
        return;
    };
    let Some(area) = PlotArea::of(surface) else {
        return;
    };
    let count = samples.len();
    let stride = x_stride(count);

    draw_grid(surface, spec, &area, &range, count, stride);

    let points: Vec<Point> = values
        .iter()
        .map(|(i, v)| Point::new(area.x_at(*i, count), area.y_at(*v, &range)))
        .collect();
    surface.polyline(&points, &Stroke::new(&spec.color, 2.0));
    for point in &points {
        surface.marker(*point, MARKER_RADIUS, &spec.color);
    }

    let label_style =
        TextStyle::new(TEXT_COLOR, 10.0, TextAlign::Right).rotated(X_LABEL_ROTATION);
    for i in (0..count).step_by(stride) {
        let label = samples[i].timestamp.format("%H:%M:%S").to_string();
        surface.text(
            &label,
            Point::new(area.x_at(i, count), area.bottom() + 12.0),
            &label_style,
        );
    }

    surface.text(
        &spec.title(),
        Point::new(area.left + area.width / 2.0, MARGIN_TOP / 2.0 + 5.0),
        &TextStyle::new(TEXT_COLOR, 14.0, TextAlign::Center),
    );
}

fn draw_grid(
    surface: &mut dyn Surface,
    spec: &MetricSpec,
    area: &PlotArea,
    range: &ValueRange,
    count: usize,
    stride: usize,
) {
    let grid = Stroke::new(GRID_COLOR, 1.0);
    let label_style = TextStyle::new(TEXT_COLOR, 10.0, TextAlign::Right);

    for row in 0..GRID_ROWS {
        let fraction = row as f64 / (GRID_ROWS - 1) as f64;
        let y = area.top + area.height * fraction;
        surface.line(Point::new(area.left, y), Point::new(area.right(), y), &grid);

        let value = range.max - range.span() * fraction;
        surface.text(
            &format!("{:.*}", spec.precision, value),
            Point::new(area.left - 6.0, y + 4.0),
            &label_style,
        );
    }

    for i in (0..count).step_by(stride) {
        let x = area.x_at(i, count);
        surface.line(Point::new(x, area.top), Point::new(x, area.bottom()), &grid);
    }

    let axis = Stroke::new(AXIS_COLOR, 1.0);
    surface.line(
        Point::new(area.left, area.top),
        Point::new(area.left, area.bottom()),
        &axis,
    );
    surface.line(
        Point::new(area.left, area.bottom()),
        Point::new(area.right(), area.bottom()),
        &axis,
    );
}

/// One row per metric with its most recent present value.
pub fn render_overview(surface: &mut dyn Surface, specs: &[MetricSpec], samples: &[Sample]) {
    surface.clear();
    let Some(last) = samples.last() else {
        return;
    };

    surface.text(
        &format!("Latest readings · {}", last.timestamp.format("%Y-%m-%d %H:%M:%S")),
        Point::new(surface.width() / 2.0, MARGIN_TOP / 2.0 + 5.0),
        &TextStyle::new(TEXT_COLOR, 14.0, TextAlign::Center),
    );

    let row_height = ((surface.height() - MARGIN_TOP) / specs.len().max(1) as f64).min(28.0);
    let label_style = TextStyle::new(TEXT_COLOR, 12.0, TextAlign::Left);
    let value_style = TextStyle::new(TEXT_COLOR, 12.0, TextAlign::Right);

    for (row, spec) in specs.iter().enumerate() {
        let y = MARGIN_TOP + row_height * (row as f64 + 0.5);
        let latest = samples.iter().rev().find_map(|s| s.value(spec.key));

        surface.marker(Point::new(MARGIN_RIGHT, y - 4.0), 5.0, &spec.color);
        surface.text(&spec.label, Point::new(MARGIN_RIGHT + 12.0, y), &label_style);
        surface.text(
            &spec.format_value(latest),
            Point::new(surface.width() - MARGIN_RIGHT, y),
            &value_style,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::{default_metric_specs, Metric};
    use crate::presentation::surface::recording::{DrawOp, RecordingSurface};
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[Option<f64>]) -> Vec<Sample> {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut s = Sample::empty(base + Duration::seconds(i as i64));
                s.set(Metric::Voltage, *v);
                s
            })
            .collect()
    }

    fn voltage_spec() -> MetricSpec {
        default_metric_specs()
            .into_iter()
            .find(|s| s.key == Metric::Voltage)
            .unwrap()
    }

    #[test]
    fn test_empty_samples_leave_surface_blank() {
        let mut surface = RecordingSurface::new(600.0, 300.0);
        surface.text("stale", Point::new(0.0, 0.0), &TextStyle::new("#fff", 10.0, TextAlign::Left));

        render(&mut surface, &voltage_spec(), &[]);

        assert!(surface.is_blank());
        assert_eq!(surface.clears, 1);
        assert_eq!(surface.polylines().count(), 0);
    }

    #[test]
    fn test_metric_absent_everywhere_is_blank() {
        let mut surface = RecordingSurface::new(600.0, 300.0);
        render(&mut surface, &voltage_spec(), &series(&[None, None]));
        assert!(surface.is_blank());
    }

    #[test]
    fn test_constant_series_is_flat_at_mid_height() {
        let mut surface = RecordingSurface::new(600.0, 300.0);
        render(&mut surface, &voltage_spec(), &series(&[Some(12.0); 4]));

        let line = surface.polylines().next().unwrap();
        let mid = MARGIN_TOP + (300.0 - MARGIN_TOP - MARGIN_BOTTOM) / 2.0;
        assert_eq!(line.len(), 4);
        for point in line {
            assert!(point.y.is_finite());
            assert!((point.y - mid).abs() < 1e-9);
        }
    }

    #[test]
    fn test_grid_labels_interpolate_max_to_min() {
        let mut surface = RecordingSurface::new(600.0, 300.0);
        render(&mut surface, &voltage_spec(), &series(&[Some(10.0), Some(14.0), Some(12.0)]));

        let y_labels: Vec<&str> = surface
            .texts()
            .filter(|(_, style)| style.rotation == 0.0 && style.align == TextAlign::Right)
            .map(|(text, _)| text)
            .collect();
        assert_eq!(y_labels, vec!["14.00", "13.00", "12.00", "11.00", "10.00"]);
        assert!(surface.texts().any(|(text, style)| text == "Voltage (V)" && style.align == TextAlign::Center));
    }

    #[test]
    fn test_title_centred_over_plot() {
        let mut surface = RecordingSurface::new(600.0, 300.0);
        render(&mut surface, &voltage_spec(), &series(&[Some(1.0), Some(2.0)]));

        let anchor = surface
            .ops
            .iter()
            .find_map(|op| match op {
                DrawOp::Text { text, anchor, .. } if text == "Voltage (V)" => Some(*anchor),
                _ => None,
            })
            .unwrap();
        let plot_centre = MARGIN_LEFT + (600.0 - MARGIN_LEFT - MARGIN_RIGHT) / 2.0;
        assert_eq!(anchor.x, plot_centre);
        assert!(anchor.y < MARGIN_TOP);
    }

    #[test]
    fn test_points_span_plot_extent() {
        let mut surface = RecordingSurface::new(600.0, 300.0);
        render(&mut surface, &voltage_spec(), &series(&[Some(1.0), Some(3.0), Some(2.0)]));

        let line = surface.polylines().next().unwrap();
        let bottom = 300.0 - MARGIN_BOTTOM;
        assert_eq!(line[0], Point::new(MARGIN_LEFT, bottom));
        assert_eq!(line[1], Point::new(MARGIN_LEFT + (600.0 - MARGIN_LEFT - MARGIN_RIGHT) / 2.0, MARGIN_TOP));
        assert_eq!(line[2].x, 600.0 - MARGIN_RIGHT);
        assert_eq!(surface.markers().count(), 3);
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let mut surface = RecordingSurface::new(600.0, 300.0);
        render(&mut surface, &voltage_spec(), &series(&[Some(1.0), None, Some(2.0)]));
        assert_eq!(surface.polylines().next().unwrap().len(), 2);
    }

    #[test]
    fn test_x_stride_for_labels_and_gridlines() {
        assert_eq!(x_stride(0), 1);
        assert_eq!(x_stride(10), 1);
        assert_eq!(x_stride(11), 2);
        assert_eq!(x_stride(50), 5);

        let values: Vec<Option<f64>> = (0..25).map(|i| Some(i as f64)).collect();
        let mut surface = RecordingSurface::new(800.0, 300.0);
        render(&mut surface, &voltage_spec(), &series(&values));

        let rotated = surface.texts().filter(|(_, style)| style.rotation != 0.0).count();
        assert_eq!(rotated, 9);
        let vertical = surface
            .lines()
            .filter(|(from, to)| from.x == to.x && from.x != MARGIN_LEFT)
            .count();
        assert_eq!(vertical, 8);
    }

    #[test]
    fn test_one_metric_missing_does_not_affect_another() {
        let mut samples = series(&[Some(1.0), Some(2.0)]);
        samples[1].temperature = Some(30.0);
        let specs = default_metric_specs();

        let mut temperature = RecordingSurface::new(600.0, 300.0);
        let mut current = RecordingSurface::new(600.0, 300.0);
        render(&mut temperature, &specs[0], &samples);
        render(&mut current, &specs[2], &samples);

        assert_eq!(temperature.polylines().next().unwrap().len(), 1);
        assert!(current.is_blank());
    }

    #[test]
    fn test_overview_uses_latest_present_value() {
        let mut samples = series(&[Some(12.5), None]);
        samples[0].temperature = Some(25.4);
        let mut surface = RecordingSurface::new(400.0, 240.0);

        render_overview(&mut surface, &default_metric_specs(), &samples);

        let texts: Vec<&str> = surface.texts().map(|(t, _)| t).collect();
        assert!(texts.contains(&"12.50 V"));
        assert!(texts.contains(&"25.4 °C"));
        assert!(texts.contains(&"--"));
        assert_eq!(surface.markers().count(), 6);

        render_overview(&mut surface, &default_metric_specs(), &[]);
        assert!(surface.is_blank());
    }
}
