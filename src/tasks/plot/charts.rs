//! The charts drawn from sweep results. Each family selects result files by
//! parameter, extracts one measurement series per file into scratch data
//! files, and describes how to draw them.

use crate::tasks::{
    naming::{grouping_str, param_set, ParamSet, ParamValue},
    plot::{AxisSpec, Chart, Dash, Series, Style},
    results::{ResultFile, ResultSet},
    series::{write_series, Extract, Tag},
};
use anyhow::Result;
use clap::ValueEnum;
use log::{info, warn};
use std::{fmt, path::Path};

/// Computations measured by the throughput and load charts.
const COMPUTATIONS: [&str; 3] = ["arrange", "maintain", "count"];

const KEY_LEFT_BOTTOM: &str = "left bottom Left reverse font \",10\"";
const KEY_LEFT_TOP: &str = "left top Left reverse font \",10\"";

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum ChartFamily {
    /// Throughput against cores, one line per computation
    Throughput,
    /// Latency ccdf per offered load, one chart per (work, computation)
    LoadVaries,
    /// Latency ccdf per interactive query class
    SingleQuery,
    /// Latency ccdf with and without shared arrangements
    Sharing,
    /// Resident set size over time, one chart per rate
    MemoryRss,
}

impl ChartFamily {
    pub const THROUGHPUT_NAME: &'static str = "iv_throughput";
    pub const LOAD_VARIES_NAME: &'static str = "i_load_varies";
    pub const SINGLE_QUERY_NAME: &'static str = "i_single_query";
    pub const SHARING_NAME: &'static str = "ii_sharing";
    pub const MEMORY_RSS_NAME: &'static str = "iii_memory_rss";

    pub fn name(&self) -> &'static str {
        match self {
            ChartFamily::Throughput => Self::THROUGHPUT_NAME,
            ChartFamily::LoadVaries => Self::LOAD_VARIES_NAME,
            ChartFamily::SingleQuery => Self::SINGLE_QUERY_NAME,
            ChartFamily::Sharing => Self::SHARING_NAME,
            ChartFamily::MemoryRss => Self::MEMORY_RSS_NAME,
        }
    }
}

impl fmt::Display for ChartFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Build every chart of `family`. Extracted series are written under
/// `scratch`, which must outlive rendering.
pub fn build(family: ChartFamily, results: &ResultSet, scratch: &Path) -> Result<Vec<Chart>> {
    let charts = match family {
        ChartFamily::Throughput => vec![throughput(results, scratch)?],
        ChartFamily::LoadVaries => load_varies(results, scratch)?,
        ChartFamily::SingleQuery => vec![single_query(results)],
        ChartFamily::Sharing => vec![sharing(results, scratch)?],
        ChartFamily::MemoryRss => memory_rss(results, scratch)?,
    };

    for chart in &charts {
        if chart.series.is_empty() {
            warn!(
                "no result files match chart (chart={}, experiment={})",
                chart.name, results.experiment
            );
        }
    }
    info!("built {} {family} chart(s)", charts.len());

    Ok(charts)
}

fn with_param(filter: &ParamSet, key: &str, value: ParamValue) -> ParamSet {
    let mut filter = filter.clone();
    filter.insert((key.to_string(), value));
    filter
}

fn param_title(file: &ResultFile, key: &str) -> String {
    file.get(key).map(ParamValue::to_string).unwrap_or_default()
}

/// Extract `extract` from `file` into its own scratch data file.
fn extract_file(
    chart_name: &str,
    file: &ResultFile,
    extract: &Extract,
    scratch: &Path,
) -> Result<std::path::PathBuf> {
    let data = scratch.join(format!("{chart_name}_{}", file.file_name));
    write_series(&extract.read(&file.path)?, &data, false)?;
    Ok(data)
}

/// Axes shared by the latency ccdf charts.
fn ccdf_chart(name: &str, grouping: ParamSet, x_min: f64, y_min: f64) -> Chart {
    let mut chart = Chart::new(name, grouping);
    chart.x = AxisSpec::labelled("nanoseconds")
        .log()
        .range(Some(x_min), Some(5e9))
        .format("10^{%T}");
    chart.y = AxisSpec::labelled("complementary cdf")
        .log()
        .range(Some(y_min), Some(1.01));
    chart.key = Some(KEY_LEFT_BOTTOM.to_string());
    chart
}

fn throughput(results: &ResultSet, scratch: &Path) -> Result<Chart> {
    let filter = param_set([("rate", 10000u64), ("work", 4u64)]);
    let extract = Extract::new(Tag::Throughput, &[3, 4]);

    let mut chart = Chart::new(ChartFamily::THROUGHPUT_NAME, filter.clone());
    chart.size = Some("6cm,4cm".to_string());
    chart.extra.push("bmargin at screen 0.2".to_string());
    chart.x = AxisSpec::labelled("cores");
    chart.y = AxisSpec::labelled("throughput (records/s)");
    chart.key = Some(KEY_LEFT_TOP.to_string());

    for comp in COMPUTATIONS {
        let comp_filter = with_param(&filter, "comp", ParamValue::from(comp));
        let data = scratch.join(format!(
            "{}_{}",
            ChartFamily::THROUGHPUT_NAME,
            grouping_str(&comp_filter)
        ));

        // All worker counts of a computation go into one line
        write_series(&[], &data, false)?;
        for file in results.select_sorted(&comp_filter, "w") {
            write_series(&extract.read(&file.path)?, &data, true)?;
        }

        chart
            .series
            .push(Series::new(&data, comp).style(Style::LinesPoints));
    }

    Ok(chart)
}

fn load_varies(results: &ResultSet, scratch: &Path) -> Result<Vec<Chart>> {
    let filter = param_set([("w", 16u64)]);
    let extract = Extract::new(Tag::LatencyFraction, &[3, 4]);

    let mut charts = Vec::new();
    for work in results.domain("work")? {
        for comp in COMPUTATIONS {
            let grouping = with_param(
                &with_param(&filter, "work", work.clone()),
                "comp",
                ParamValue::from(comp),
            );
            let mut chart =
                ccdf_chart(ChartFamily::LOAD_VARIES_NAME, grouping.clone(), 50000.0, 0.005);
            chart.size = Some("6cm,4cm".to_string());
            chart.extra.push("bmargin at screen 0.2".to_string());

            let mut dt = 2;
            for file in results.select_sorted(&grouping, "rate") {
                let data = extract_file(ChartFamily::LOAD_VARIES_NAME, file, &extract, scratch)?;
                chart.series.push(
                    Series::new(&data, &param_title(file, "rate"))
                        .style(Style::Lines { width: 2.0 })
                        .dash(Dash::Index(dt)),
                );
                dt += 1;
            }

            charts.push(chart);
        }
    }

    Ok(charts)
}

fn query_title(file: &ResultFile) -> String {
    match file.get("query").and_then(ParamValue::as_int) {
        Some(1) => "lookup".to_string(),
        Some(2) => "1-hop".to_string(),
        Some(3) => "2-hop".to_string(),
        Some(4) => "4-hop".to_string(),
        _ => param_title(file, "query"),
    }
}

/// Plots the result files as they are: every line is already an `x y` pair.
fn single_query(results: &ResultSet) -> Chart {
    let filter = param_set([
        ("rate", 200000u64),
        ("w", 32u64),
        ("nodes", 10000000u64),
        ("edges", 32000000u64),
    ]);

    let mut chart = ccdf_chart(ChartFamily::SINGLE_QUERY_NAME, filter.clone(), 10000.0, 0.0001);
    chart.size = Some("4.8cm,3.2cm".to_string());
    chart.extra.push("bmargin at screen 0.25".to_string());
    chart.extra.push("key samplen 2".to_string());
    chart.y = chart.y.format("10^{%T}");

    let mut dt = 2;
    for file in results.select_sorted(&filter, "query") {
        chart.series.push(
            Series::new(&file.path, &query_title(file))
                .style(Style::Lines { width: 2.0 })
                .dash(Dash::Pattern(dt, 2)),
        );
        dt += 3;
    }

    chart
}

fn shared_title(file: &ResultFile) -> String {
    match file.get("shared") {
        Some(ParamValue::Text(shared)) if shared == "no" => "not shared".to_string(),
        Some(ParamValue::Text(shared)) if shared == "shared" => "shared".to_string(),
        _ => param_title(file, "shared"),
    }
}

fn sharing(results: &ResultSet, scratch: &Path) -> Result<Chart> {
    let filter = param_set([
        ("rate", 200000u64),
        ("w", 32u64),
        ("nodes", 10000000u64),
        ("edges", 32000000u64),
        ("goal", 1800u64),
    ]);
    let extract = Extract::new(Tag::Latency, &[2, 3]);

    let mut chart = ccdf_chart(ChartFamily::SHARING_NAME, filter.clone(), 10000.0, 0.0001);
    chart.size = Some("4.8cm,3.2cm".to_string());
    chart.extra.push("bmargin at screen 0.25".to_string());
    chart.extra.push("key samplen 2".to_string());
    chart.y = chart.y.format("10^{%T}");

    let mut dt = 4;
    for file in results.select_sorted(&filter, "shared") {
        let data = extract_file(ChartFamily::SHARING_NAME, file, &extract, scratch)?;
        chart.series.push(
            Series::new(&data, &shared_title(file))
                .style(Style::Lines { width: 2.0 })
                .dash(Dash::Pattern(dt, 2)),
        );
        dt += 4;
    }

    Ok(chart)
}

fn memory_rss(results: &ResultSet, scratch: &Path) -> Result<Vec<Chart>> {
    let extract = Extract::new(Tag::Rss, &[2, 3]).every_nth(10);

    let mut charts = Vec::new();
    for rate in results.domain("rate")? {
        let filter = param_set([("rate", rate), ("goal", ParamValue::Int(1800))]);

        let mut chart = Chart::new(ChartFamily::MEMORY_RSS_NAME, filter.clone());
        chart.size = Some("4.8cm,3.2cm".to_string());
        chart.extra.extend(
            [
                "bmargin at screen 0.25",
                "style fill transparent solid 0.35 noborder",
                "style circle radius 10",
            ]
            .map(str::to_string),
        );
        chart.x = AxisSpec::labelled("elapsed seconds")
            .range(Some(-200.0), Some(3500.0))
            .tics("0,1000,3000");
        chart.y = AxisSpec::labelled("resident set size")
            .log()
            .range(Some(100000000.0), None)
            .format("%.0s %cB");
        chart.key = Some(KEY_LEFT_TOP.to_string());

        for file in results.select_sorted(&filter, "shared") {
            let data = extract_file(ChartFamily::MEMORY_RSS_NAME, file, &extract, scratch)?;
            chart.series.push(
                Series::new(&data, &shared_title(file))
                    .style(Style::Lines { width: 1.5 })
                    .x_divisor(1e9),
            );
        }

        charts.push(chart);
    }

    Ok(charts)
}
