//! Inline SVG charts for the HTML report.

use crate::domain::metrics::drawdown_series;
use crate::domain::portfolio::EquityPoint;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 260.0;
const PADDING: f64 = 40.0;

struct Frame {
    min: f64,
    max: f64,
    len: usize,
}

impl Frame {
    fn new(values: &[f64]) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            min,
            max,
            len: values.len(),
        }
    }

    fn x(&self, i: usize) -> f64 {
        if self.len > 1 {
            PADDING + i as f64 * (WIDTH - 2.0 * PADDING) / (self.len - 1) as f64
        } else {
            WIDTH / 2.0
        }
    }

    fn y(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        let plot = HEIGHT - 2.0 * PADDING;
        if range > 0.0 {
            HEIGHT - PADDING - (value - self.min) / range * plot
        } else {
            HEIGHT / 2.0
        }
    }
}

fn open_svg(out: &mut String) {
    out.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {HEIGHT}" "#
    ));
    out.push_str(r#"width="100%" preserveAspectRatio="none">"#);
    let (bottom, right) = (HEIGHT - PADDING, WIDTH - PADDING);
    line(out, PADDING, bottom, right, bottom);
    line(out, PADDING, PADDING, PADDING, bottom);
}

fn line(out: &mut String, x1: f64, y1: f64, x2: f64, y2: f64) {
    out.push_str(&format!(
        r##"<line x1="{x1}" y1="{y1}" x2="{x2}" y2="{y2}" stroke="#9ca3af"/>"##
    ));
}

fn text(out: &mut String, x: f64, y: f64, anchor: &str, label: &str) {
    out.push_str(&format!(
        r#"<text x="{x:.1}" y="{y:.1}" font-size="11" text-anchor="{anchor}">{label}</text>"#
    ));
}

fn axis_labels(out: &mut String, top: &str, bottom: &str, first: &str, last: &str) {
    text(out, 4.0, PADDING, "start", top);
    text(out, 4.0, HEIGHT - PADDING, "start", bottom);
    text(out, PADDING, HEIGHT - 12.0, "start", first);
    text(out, WIDTH - PADDING, HEIGHT - 12.0, "end", last);
}

/// Equity curve as a polyline. Empty string for an empty curve.
pub fn generate_equity_svg(equity_curve: &[EquityPoint]) -> String {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return String::new();
    };
    let values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
    let frame = Frame::new(&values);

    let points: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| format!("{:.1},{:.1}", frame.x(i), frame.y(v)))
        .collect();

    let mut out = String::new();
    open_svg(&mut out);
    out.push_str(&format!(
        r##"<polyline fill="none" stroke="#2563eb" stroke-width="1.5" points="{}"/>"##,
        points.join(" ")
    ));
    axis_labels(
        &mut out,
        &format!("{:.0}", frame.max),
        &format!("{:.0}", frame.min),
        &first.date.to_string(),
        &last.date.to_string(),
    );
    out.push_str("</svg>");
    out
}

/// Underwater chart: drawdown from the running peak, filled below zero.
pub fn generate_drawdown_svg(equity_curve: &[EquityPoint]) -> String {
    let series = drawdown_series(equity_curve);
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return String::new();
    };
    // plotted as negative values so deeper drawdowns sit lower
    let values: Vec<f64> = series.iter().map(|(_, dd)| -dd).collect();
    let mut frame = Frame::new(&values);
    frame.max = 0.0;

    let mut points = vec![format!("{:.1},{:.1}", frame.x(0), frame.y(0.0))];
    points.extend(
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| format!("{:.1},{:.1}", frame.x(i), frame.y(v))),
    );
    points.push(format!("{:.1},{:.1}", frame.x(values.len() - 1), frame.y(0.0)));

    let mut out = String::new();
    open_svg(&mut out);
    out.push_str(&format!(
        r##"<polygon fill="rgba(239,68,68,0.3)" stroke="#ef4444" stroke-width="1" points="{}"/>"##,
        points.join(" ")
    ));
    axis_labels(
        &mut out,
        "0%",
        &format!("{:.1}%", frame.min * 100.0),
        &first.0.to_string(),
        &last.0.to_string(),
    );
    out.push_str("</svg>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                date: NaiveDate::from_ymd_opt(2017, 1, 2).unwrap()
                    + chrono::Duration::days(i as i64),
                equity,
            })
            .collect()
    }

    #[test]
    fn empty_curve_renders_nothing() {
        assert!(generate_equity_svg(&[]).is_empty());
        assert!(generate_drawdown_svg(&[]).is_empty());
    }

    #[test]
    fn equity_chart_has_one_point_per_day() {
        let svg = generate_equity_svg(&curve(&[100.0, 105.0, 103.0]));
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r##"stroke="#2563eb""##));
        let points = svg.split("points=\"").nth(1).unwrap().split('"').next().unwrap();
        assert_eq!(points.split(' ').count(), 3);
        assert!(svg.contains("2017-01-02"));
        assert!(svg.contains("2017-01-04"));
    }

    #[test]
    fn highest_equity_plots_at_top() {
        let svg = generate_equity_svg(&curve(&[100.0, 200.0]));
        let points = svg.split("points=\"").nth(1).unwrap().split('"').next().unwrap();
        let ys: Vec<f64> = points
            .split(' ')
            .map(|p| p.split(',').nth(1).unwrap().parse().unwrap())
            .collect();
        assert_eq!(ys, vec![HEIGHT - PADDING, PADDING]);
    }

    #[test]
    fn flat_curve_is_centred() {
        let svg = generate_equity_svg(&curve(&[100.0]));
        assert!(svg.contains(&format!("{:.1},{:.1}", WIDTH / 2.0, HEIGHT / 2.0)));
    }

    #[test]
    fn drawdown_chart_is_closed_polygon() {
        let svg = generate_drawdown_svg(&curve(&[100.0, 80.0, 100.0]));
        assert!(svg.contains(r#"fill="rgba(239,68,68,0.3)""#));
        assert!(svg.contains("-20.0%"));
        let points = svg.split("points=\"").nth(1).unwrap().split('"').next().unwrap();
        assert_eq!(points.split(' ').count(), 5);
    }
}
