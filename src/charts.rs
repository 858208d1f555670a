//! Chart rendering with Plotters

use std::path::Path;

use plotters::prelude::*;
use tracing::debug;

use crate::classify::{Classification, AGGREGATE_CODES};
use crate::error::Error;
use crate::output::{display_label, LongRow, ValueKind};
use crate::record::MortalityTable;
use crate::regions::GeoJoin;

/// Band colors from mildest to most severe increase
const SEVERITY_PALETTE: [RGBColor; 5] = [
    RGBColor(255, 237, 160),
    RGBColor(254, 178, 76),
    RGBColor(240, 59, 32),
    RGBColor(189, 0, 38),
    RGBColor(102, 0, 13),
];

/// Appearance of a rendered chart. Passed to every render call.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub font: String,
    pub baseline_color: RGBColor,
    pub target_color: RGBColor,
    pub improved_color: RGBColor,
    /// Non-improved bands, mildest first; wraps when there are more bands
    pub severity_palette: Vec<RGBColor>,
    /// Countries without a severity class
    pub missing_color: RGBColor,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 1169,
            height: 827,
            title: String::new(),
            font: "sans-serif".to_string(),
            baseline_color: RGBColor(31, 120, 180),
            target_color: RGBColor(227, 26, 28),
            improved_color: RGBColor(49, 130, 189),
            severity_palette: SEVERITY_PALETTE.to_vec(),
            missing_color: RGBColor(211, 211, 211),
        }
    }
}

impl ChartStyle {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// One bar of the severity chart.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityBar {
    pub code: String,
    pub label: String,
    pub increase_percent: Option<f64>,
    pub severity_class: Option<f64>,
}

/// Bars for every non-aggregate country, by ascending increase, no-data last.
///
/// With a region join the bars follow its rows, so regions without a record
/// show up as no-data bars.
pub fn severity_bars(table: &MortalityTable, join: Option<&GeoJoin>) -> Vec<SeverityBar> {
    let mut bars: Vec<SeverityBar> = match join {
        Some(join) => join
            .rows
            .iter()
            .map(|row| SeverityBar {
                code: row.code.to_string(),
                label: display_label(row.code, row.region.map(|r| r.name.as_str())).to_string(),
                increase_percent: row.record.and_then(|r| r.increase_percent),
                severity_class: row.severity_class(),
            })
            .collect(),
        None => table
            .records
            .iter()
            .filter(|r| !AGGREGATE_CODES.contains(&r.country_code.as_str()))
            .map(|r| SeverityBar {
                code: r.country_code.clone(),
                label: display_label(&r.country_code, None).to_string(),
                increase_percent: r.increase_percent,
                severity_class: r.severity_class,
            })
            .collect(),
    };

    bars.sort_by(|a, b| match (a.increase_percent, b.increase_percent) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    bars
}

/// Color for a severity label, looked up through the classification bands.
pub fn band_color(
    style: &ChartStyle,
    classification: &Classification,
    label: Option<f64>,
) -> RGBColor {
    let Some(label) = label else {
        return style.missing_color;
    };

    let Some(band) = classification.bands.iter().find(|b| b.label == label) else {
        return style.missing_color;
    };
    if band.improved {
        return style.improved_color;
    }

    let severity_rank = classification
        .bands
        .iter()
        .filter(|b| !b.improved && b.mean < band.mean)
        .count();
    if style.severity_palette.is_empty() {
        return style.target_color;
    }
    style.severity_palette[severity_rank % style.severity_palette.len()]
}

fn render_error<E: std::fmt::Display>(err: E) -> Error {
    Error::Render(err.to_string())
}

/// Label for an integer tick, empty between ticks.
fn tick_label(labels: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

/// Grouped bar chart of baseline mean vs target year per country
///
/// # Arguments
/// * `rows` - Long-format comparison rows, already ordered
/// * `style` - Chart appearance
/// * `output_path` - Path to save the PNG chart
pub fn render_comparison_chart(
    rows: &[LongRow],
    style: &ChartStyle,
    output_path: &Path,
) -> crate::Result<()> {
    let mut labels: Vec<String> = Vec::new();
    for row in rows {
        if labels.last() != Some(&row.label) {
            labels.push(row.label.clone());
        }
    }

    let n = labels.len().max(1);
    let y_max = rows.iter().map(|r| r.value).fold(0.0, f64::max) * 1.1;
    let y_max = if y_max > 0.0 { y_max } else { 1.0 };

    let root = BitMapBackend::new(output_path, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&style.title, (style.font.as_str(), 30))
        .margin(10)
        .x_label_area_size(120)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..y_max)
        .map_err(render_error)?;

    let formatter = |x: &f64| tick_label(&labels, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&formatter)
        .x_label_style(
            (style.font.as_str(), 12)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_desc("Deaths per 1000 inhabitants")
        .axis_desc_style((style.font.as_str(), 15))
        .draw()
        .map_err(render_error)?;

    let series = [
        (ValueKind::Baseline, style.baseline_color, -0.4, "Baseline mean"),
        (ValueKind::Target, style.target_color, 0.0, "Target year"),
    ];
    for (kind, color, offset, name) in series {
        let bars = rows.iter().filter(|r| r.kind == kind).filter_map(|r| {
            let idx = labels.iter().position(|l| l == &r.label)? as f64;
            Some(Rectangle::new(
                [(idx + offset, 0.0), (idx + offset + 0.4, r.value)],
                color.filled(),
            ))
        });

        chart
            .draw_series(bars)
            .map_err(render_error)?
            .label(name)
            .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    debug!(path = %output_path.display(), countries = labels.len(), "Rendered comparison chart");

    Ok(())
}

/// Bar chart of percentage increase per country, colored by severity band
///
/// Countries without a class are drawn as full-height bars in the missing color.
pub fn render_severity_chart(
    bars: &[SeverityBar],
    classification: &Classification,
    style: &ChartStyle,
    output_path: &Path,
) -> crate::Result<()> {
    let labels: Vec<String> = bars.iter().map(|b| b.label.clone()).collect();
    let n = labels.len().max(1);

    let values = bars.iter().filter_map(|b| b.increase_percent);
    let (y_min, y_max) = values.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((y_max - y_min) * 0.1).max(1.0);
    let (y_min, y_max) = (y_min - if y_min < 0.0 { pad } else { 0.0 }, y_max + pad);

    let root = BitMapBackend::new(output_path, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&style.title, (style.font.as_str(), 30))
        .margin(10)
        .x_label_area_size(120)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_min..y_max)
        .map_err(render_error)?;

    let formatter = |x: &f64| tick_label(&labels, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n + 1)
        .x_label_formatter(&formatter)
        .x_label_style(
            (style.font.as_str(), 12)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_desc("Increase (%)")
        .axis_desc_style((style.font.as_str(), 15))
        .draw()
        .map_err(render_error)?;

    // One series per band so each gets a legend entry
    for band in &classification.bands {
        let color = band_color(style, classification, Some(band.label));
        let rects = bars.iter().enumerate().filter_map(|(i, bar)| {
            let value = bar.increase_percent?;
            (bar.severity_class == Some(band.label) && band.members.contains(&bar.code)).then(|| {
                Rectangle::new([(i as f64 - 0.4, 0.0), (i as f64 + 0.4, value)], color.filled())
            })
        });

        let name = if band.improved {
            format!("{:.1}% (improved)", band.label)
        } else {
            format!("{:.1}%", band.label)
        };
        chart
            .draw_series(rects)
            .map_err(render_error)?
            .label(name)
            .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], color.filled()));
    }

    let missing = style.missing_color;
    let missing_rects = bars.iter().enumerate().filter_map(|(i, bar)| {
        bar.severity_class.is_none().then(|| {
            Rectangle::new([(i as f64 - 0.4, y_min), (i as f64 + 0.4, y_max)], missing.filled())
        })
    });
    chart
        .draw_series(missing_rects)
        .map_err(render_error)?
        .label("No data")
        .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], missing.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    debug!(path = %output_path.display(), countries = bars.len(), "Rendered severity chart");

    Ok(())
}
