use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};
use eframe::egui::{Color32, Ui};
use egui_plot::{uniform_grid_spacer, Bar, BarChart, GridMark, Legend, Line, Plot};

use crate::color::SeriesColors;

const PLOT_HEIGHT: f32 = 320.0;
const BAR_COLOR: Color32 = Color32::from_rgb(99, 110, 250);

/// 1970-01-01 in `num_days_from_ce`; plot x values are days since the epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn date_to_x(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce() - EPOCH_DAYS_FROM_CE)
}

/// Axis label for a plot x value; blank outside the representable date range.
fn x_to_label(x: f64) -> String {
    i32::try_from(x.round() as i64)
        .ok()
        .and_then(|days| days.checked_add(EPOCH_DAYS_FROM_CE))
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Time series (one line per location)
// ---------------------------------------------------------------------------

/// Render date-ordered rows as one line per series label.
pub fn series_plot<R>(
    ui: &mut Ui,
    id: &str,
    y_label: &str,
    rows: &[R],
    colors: &SeriesColors,
    point: impl Fn(&R) -> (&str, NaiveDate, f64),
) {
    let mut series: BTreeMap<&str, Vec<[f64; 2]>> = BTreeMap::new();
    for row in rows {
        let (label, date, y) = point(row);
        series.entry(label).or_default().push([date_to_x(date), y]);
    }

    Plot::new(id)
        .height(PLOT_HEIGHT)
        .legend(Legend::default())
        .x_axis_label("Date")
        .y_axis_label(y_label)
        .x_axis_formatter(|mark: GridMark, _range: &RangeInclusive<f64>| x_to_label(mark.value))
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for (label, points) in series {
                let line = Line::new(points)
                    .name(label)
                    .color(colors.color_for(label))
                    .width(2.0);
                plot_ui.line(line);
            }
        });
}

// ---------------------------------------------------------------------------
// Bar charts (one bar per category)
// ---------------------------------------------------------------------------

/// Render labelled values as a bar chart. Null values leave an empty slot.
pub fn bar_plot(ui: &mut Ui, id: &str, y_label: &str, bars: Vec<(String, Option<f64>)>) {
    let labels: Vec<String> = bars.iter().map(|(l, _)| l.clone()).collect();
    let chart = BarChart::new(
        bars.into_iter()
            .enumerate()
            .filter_map(|(i, (label, value))| {
                value.map(|v| Bar::new(i as f64, v).name(label).width(0.7))
            })
            .collect(),
    )
    .color(BAR_COLOR);

    Plot::new(id)
        .height(PLOT_HEIGHT)
        .y_axis_label(y_label)
        .x_grid_spacer(uniform_grid_spacer(|_| [1.0, 5.0, 10.0]))
        .x_axis_formatter(move |mark: GridMark, _range: &RangeInclusive<f64>| {
            let idx = mark.value.round();
            if (mark.value - idx).abs() > f64::EPSILON || idx < 0.0 {
                return String::new();
            }
            labels.get(idx as usize).cloned().unwrap_or_default()
        })
        .allow_drag(true)
        .allow_zoom(true)
        .allow_scroll(true)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(chart);
        });
}
