use anyhow::Result;
use log::error;
use plotters::prelude::RGBColor;

pub static FONT_SIZE: i32 = 20;
pub static STROKE_WIDTH: u32 = 2;

/// Series colours, in the order series are drawn.
const PALETTE: [&str; 6] = [
    "dark-red",
    "dark-blue",
    "dark-green",
    "dark-orange",
    "dark-yellow",
    "dark-grey",
];

pub fn get_color_from_label(label: &str) -> Result<RGBColor> {
    match label {
        "dark-red" => Ok(RGBColor(130, 1, 1)),
        "dark-blue" => Ok(RGBColor(1, 6, 130)),
        "dark-green" => Ok(RGBColor(0, 97, 29)),
        "dark-orange" => Ok(RGBColor(163, 99, 2)),
        "dark-yellow" => Ok(RGBColor(179, 176, 0)),
        "dark-grey" => Ok(RGBColor(80, 80, 80)),
        _ => {
            error!("unrecognized label for color (label={label})");
            anyhow::bail!("unrecognized label (label={label})");
        }
    }
}

/// Colour of the `idx`-th series of a chart. Wraps around the palette.
pub fn get_series_color(idx: usize) -> Result<RGBColor> {
    get_color_from_label(PALETTE[idx % PALETTE.len()])
}
