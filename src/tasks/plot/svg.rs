use crate::tasks::{
    plot::{
        color::{get_series_color, FONT_SIZE, STROKE_WIDTH},
        AxisSpec, Chart, Series, Style,
    },
    series::read_points,
};
use anyhow::Result;
use log::{debug, warn};
use plotters::prelude::*;
use std::{ops::Range, path::Path};

const CHART_SIZE: (u32, u32) = (640, 480);

/// Map a data value onto the drawn axis. Log axes are drawn linearly over
/// `log10` of the data, so non-positive values have no position.
fn to_axis(axis: &AxisSpec, v: f64) -> Option<f64> {
    if !axis.log {
        return Some(v);
    }
    if v > 0.0 {
        Some(v.log10())
    } else {
        None
    }
}

fn axis_label(axis_log: bool, v: f64) -> String {
    if axis_log {
        format!("{:.0e}", 10f64.powf(v))
    } else {
        format!("{v}")
    }
}

fn load_series(chart: &Chart, series: &Series) -> Result<Vec<(f64, f64)>> {
    let points: Vec<(f64, f64)> = read_points(&series.data)?
        .into_iter()
        .filter_map(|(x, y)| {
            let x = match series.x_divisor {
                Some(divisor) => x / divisor,
                None => x,
            };
            Some((to_axis(&chart.x, x)?, to_axis(&chart.y, y)?))
        })
        .collect();

    if points.is_empty() {
        warn!(
            "load_series(): no points to draw (path={})",
            series.data.display()
        );
    }

    Ok(points)
}

/// Drawn range of an axis: the configured bounds where set, the data extent
/// otherwise.
fn axis_range(axis: &AxisSpec, values: impl Iterator<Item = f64>) -> Range<f64> {
    let (data_min, data_max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    let mut min = axis.min.and_then(|v| to_axis(axis, v)).unwrap_or(data_min);
    let mut max = axis.max.and_then(|v| to_axis(axis, v)).unwrap_or(data_max);
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if min >= max {
        min -= 1.0;
        max += 1.0;
    }

    min..max
}

pub fn render(chart: &Chart, out: &Path) -> Result<()> {
    let mut data = Vec::with_capacity(chart.series.len());
    for series in &chart.series {
        data.push((series, load_series(chart, series)?));
    }

    let x_range = axis_range(
        &chart.x,
        data.iter().flat_map(|(_, points)| points.iter().map(|p| p.0)),
    );
    let y_range = axis_range(
        &chart.y,
        data.iter().flat_map(|(_, points)| points.iter().map(|p| p.1)),
    );
    debug!("render(): x={x_range:?}, y={y_range:?}");

    let root = SVGBackend::new(out, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let caption = chart.title.clone().unwrap_or_else(|| chart.name.clone());
    let mut chart_ctx = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", FONT_SIZE).into_font())
        .x_label_area_size(40)
        .y_label_area_size(70)
        .margin(10)
        .build_cartesian_2d(x_range, y_range)?;

    let (x_log, y_log) = (chart.x.log, chart.y.log);
    let x_formatter = move |v: &f64| axis_label(x_log, *v);
    let y_formatter = move |v: &f64| axis_label(y_log, *v);
    chart_ctx
        .configure_mesh()
        .light_line_style(WHITE)
        .x_desc(chart.x.label.clone().unwrap_or_default())
        .y_desc(chart.y.label.clone().unwrap_or_default())
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .label_style(("sans-serif", FONT_SIZE / 2).into_font())
        .axis_desc_style(("sans-serif", FONT_SIZE * 3 / 4).into_font())
        .draw()?;

    for (idx, (series, points)) in data.iter().enumerate() {
        let color = get_series_color(idx)?;
        let width = match series.style {
            Style::Lines { width } => width.round().max(1.0) as u32,
            Style::LinesPoints => STROKE_WIDTH,
        };

        chart_ctx
            .draw_series(LineSeries::new(
                points.iter().copied(),
                color.stroke_width(width),
            ))?
            .label(series.title.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(STROKE_WIDTH))
            });

        if series.style == Style::LinesPoints {
            chart_ctx.draw_series(
                points
                    .iter()
                    .map(|point| Circle::new(*point, 3, color.filled())),
            )?;
        }
    }

    chart_ctx
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .label_font(("sans-serif", FONT_SIZE / 2).into_font())
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_range() {
        let linear = AxisSpec::default();
        assert_eq!(axis_range(&linear, [3.0, 1.0, 2.0].into_iter()), 1.0..3.0);
        assert_eq!(axis_range(&linear, std::iter::empty()), 0.0..1.0);
        assert_eq!(axis_range(&linear, [2.0].into_iter()), 1.0..3.0);

        let log = AxisSpec::default().log().range(Some(100.0), None);
        assert_eq!(axis_range(&log, [3.0, 4.0].into_iter()), 2.0..4.0);
    }

    #[test]
    fn test_log_axis_drops_non_positive() {
        let log = AxisSpec::default().log();
        assert_eq!(to_axis(&log, 1000.0), Some(3.0));
        assert_eq!(to_axis(&log, 0.0), None);
        assert_eq!(to_axis(&AxisSpec::default(), -1.0), Some(-1.0));
    }
}
