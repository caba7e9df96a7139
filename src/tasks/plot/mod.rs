use crate::tasks::{
    naming::{self, ParamSet},
    results::ResultSet,
    run_id::RunId,
    runner::CommandRunner,
};
use anyhow::Result;
use clap::ValueEnum;
use log::{error, info, warn};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

pub mod charts;
pub mod color;
pub mod svg;

pub use charts::ChartFamily;

/// Backend used to turn a `Chart` into a file.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum Renderer {
    /// Pipe a generated script into `gnuplot`, producing a PDF
    #[default]
    Gnuplot,
    /// Draw an SVG in-process
    Svg,
}

impl Renderer {
    pub fn extension(&self) -> &'static str {
        match self {
            Renderer::Gnuplot => "pdf",
            Renderer::Svg => "svg",
        }
    }
}

impl fmt::Display for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Renderer::Gnuplot => write!(f, "gnuplot"),
            Renderer::Svg => write!(f, "svg"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AxisSpec {
    pub label: Option<String>,
    pub log: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// gnuplot tick label format
    pub format: Option<String>,
    /// gnuplot tick placement
    pub tics: Option<String>,
}

impl AxisSpec {
    pub fn labelled(label: &str) -> Self {
        AxisSpec {
            label: Some(label.to_string()),
            ..AxisSpec::default()
        }
    }

    pub fn log(mut self) -> Self {
        self.log = true;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn tics(mut self, tics: &str) -> Self {
        self.tics = Some(tics.to_string());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Style {
    Lines { width: f64 },
    LinesPoints,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dash {
    /// One of the terminal's predefined dash types
    Index(u32),
    /// Solid and empty segment lengths
    Pattern(u32, u32),
}

/// One line of a chart, read from a two-column data file.
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub data: PathBuf,
    pub title: String,
    /// Divide the x column by this before plotting
    pub x_divisor: Option<f64>,
    pub style: Style,
    pub dash: Option<Dash>,
}

impl Series {
    pub fn new(data: &Path, title: &str) -> Self {
        Series {
            data: data.to_path_buf(),
            title: title.to_string(),
            x_divisor: None,
            style: Style::Lines { width: 1.0 },
            dash: None,
        }
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn dash(mut self, dash: Dash) -> Self {
        self.dash = Some(dash);
        self
    }

    pub fn x_divisor(mut self, divisor: f64) -> Self {
        self.x_divisor = Some(divisor);
        self
    }

    fn to_gnuplot(&self) -> String {
        let x = match self.x_divisor {
            Some(divisor) => format!("($1/{divisor})"),
            None => "1".to_string(),
        };
        let style = match self.style {
            Style::Lines { width } => format!("lines lw {width}"),
            Style::LinesPoints => "linespoints".to_string(),
        };
        let dash = match self.dash {
            Some(Dash::Index(dt)) => format!(" dt {dt}"),
            Some(Dash::Pattern(solid, empty)) => format!(" dt ({solid}, {empty})"),
            None => String::new(),
        };

        format!(
            "\"{}\" using {x}:2 with {style}{dash} title \"{}\"",
            self.data.display(),
            self.title
        )
    }
}

/// A chart over the result files selected by `grouping`.
#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    pub name: String,
    pub grouping: ParamSet,
    /// Terminal size, e.g. `6cm,4cm`
    pub size: Option<String>,
    pub title: Option<String>,
    pub x: AxisSpec,
    pub y: AxisSpec,
    /// gnuplot key placement
    pub key: Option<String>,
    /// Extra gnuplot `set` commands, applied before the axes
    pub extra: Vec<String>,
    pub series: Vec<Series>,
}

fn gnuplot_range(min: Option<f64>, max: Option<f64>) -> String {
    let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_else(|| "*".to_string());
    format!("[{}:{}]", bound(min), bound(max))
}

impl Chart {
    pub fn new(name: &str, grouping: ParamSet) -> Self {
        Chart {
            name: name.to_string(),
            grouping,
            size: None,
            title: None,
            x: AxisSpec::default(),
            y: AxisSpec::default(),
            key: None,
            extra: Vec::new(),
            series: Vec::new(),
        }
    }

    /// `<name>_<grouping>.<ext>`, or `<name>.<ext>` without a grouping.
    pub fn file_name(&self, renderer: Renderer) -> String {
        let grouping = naming::grouping_str(&self.grouping);
        if grouping.is_empty() {
            format!("{}.{}", self.name, renderer.extension())
        } else {
            format!("{}_{grouping}.{}", self.name, renderer.extension())
        }
    }

    pub fn to_gnuplot_script(&self) -> String {
        let mut script = String::from("set terminal pdf");
        if let Some(size) = &self.size {
            script.push_str(&format!(" size {size}"));
        }
        script.push_str("; ");

        if let Some(title) = &self.title {
            script.push_str(&format!("set title \"{title}\"; "));
        }
        for (name, axis) in [("x", &self.x), ("y", &self.y)] {
            if axis.log {
                script.push_str(&format!("set logscale {name}; "));
            }
        }
        for setting in &self.extra {
            script.push_str(&format!("set {setting}; "));
        }
        for (name, axis) in [("x", &self.x), ("y", &self.y)] {
            if axis.min.is_some() || axis.max.is_some() {
                script.push_str(&format!(
                    "set {name}range {}; ",
                    gnuplot_range(axis.min, axis.max)
                ));
            }
            if let Some(format) = &axis.format {
                script.push_str(&format!("set format {name} \"{format}\"; "));
            }
            if let Some(tics) = &axis.tics {
                script.push_str(&format!("set {name}tics {tics}; "));
            }
            if let Some(label) = &axis.label {
                script.push_str(&format!("set {name}label \"{label}\"; "));
            }
        }
        if let Some(key) = &self.key {
            script.push_str(&format!("set key {key}; "));
        }

        script.push_str("plot ");
        script.push_str(
            &self
                .series
                .iter()
                .map(Series::to_gnuplot)
                .collect::<Vec<String>>()
                .join(", "),
        );

        script
    }
}

/// Draw `chart` into `out_dir` and return the path of the file written.
pub fn render(
    chart: &Chart,
    renderer: Renderer,
    out_dir: &Path,
    runner: &mut dyn CommandRunner,
) -> Result<PathBuf> {
    let out = out_dir.join(chart.file_name(renderer));
    if chart.series.is_empty() {
        warn!("render(): chart has no series (chart={})", chart.name);
    }

    match renderer {
        Renderer::Gnuplot => {
            let script = chart.to_gnuplot_script();
            info!("{script}");

            let out_arg = out.to_string_lossy();
            let cmd = format!("gnuplot > {}", shell_words::quote(&out_arg));
            let status = runner.pipe(&cmd, &script)?;
            if !status.is_success() {
                let reason = format!(
                    "gnuplot failed (chart={}, code={:?})",
                    chart.name,
                    status.code()
                );
                error!("{reason}");
                anyhow::bail!(reason);
            }
        }
        Renderer::Svg => svg::render(chart, &out)?,
    }

    info!("{}", out.display());
    Ok(out)
}

/// Paths and capabilities a plotting pass needs.
pub struct PlotContext<'a> {
    pub results_root: &'a Path,
    pub plots_root: &'a Path,
    pub run_id: &'a RunId,
    pub runner: &'a mut dyn CommandRunner,
    pub renderer: Renderer,
}

/// Build and render every chart of `family` for `experiment`. Scratch data
/// lives in a temporary directory removed when this returns.
pub fn plot(family: ChartFamily, experiment: &str, ctx: &mut PlotContext) -> Result<Vec<PathBuf>> {
    info!("commit {}, experiment {experiment}", ctx.run_id);

    let results = ResultSet::load(ctx.results_root, ctx.run_id, experiment)?;
    results.log_domains();

    let scratch = tempfile::Builder::new()
        .prefix(&format!("{experiment}-{}-", ctx.run_id))
        .tempdir()?;
    let charts = charts::build(family, &results, scratch.path())?;

    let out_dir = ctx.plots_root.join(ctx.run_id.as_str()).join(experiment);
    fs::create_dir_all(&out_dir).map_err(|e| {
        let reason = format!(
            "error creating plots directory (path={}, error={e:?})",
            out_dir.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })?;

    let mut written = Vec::with_capacity(charts.len());
    for chart in &charts {
        written.push(render(chart, ctx.renderer, &out_dir, ctx.runner)?);
    }

    Ok(written)
}
