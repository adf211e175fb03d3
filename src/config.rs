use clap::Parser;

use crate::{
    content::Layout,
    field::Field,
    text::FontDescription,
    theme::Theme,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edge {
    #[default]
    Top,
    Bottom,
}

#[derive(Debug, Parser)]
#[command(name = "swab")]
#[command(about = "A minimal status bar for Wayland compositors")]
#[command(version)]
pub struct Cli {
    /// Bar height in logical pixels
    #[arg(short = 'H', long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Font description, e.g. "monospace:size=10" or "Iosevka 14px"
    #[arg(short, long, default_value = "monospace:size=10")]
    pub font: FontDescription,

    /// Foreground color as RGBA hex
    #[arg(short = 'F', long = "fg", value_parser = parse_rgba, default_value = "0xbbbbbbff")]
    pub foreground: u32,

    /// Background color as RGBA hex
    #[arg(short = 'B', long = "bg", value_parser = parse_rgba, default_value = "0x0c0c0cff")]
    pub background: u32,

    /// Anchor the bar to the bottom edge
    #[arg(short, long)]
    pub bottom: bool,

    /// Fields shown on the left: clock, battery, workspaces, window, stdin
    #[arg(long, value_delimiter = ',')]
    pub left: Vec<Field>,

    /// Fields shown in the center
    #[arg(long, value_delimiter = ',')]
    pub center: Vec<Field>,

    /// Fields shown on the right
    #[arg(long, value_delimiter = ',')]
    pub right: Vec<Field>,
}

/// Parses `RRGGBBAA` with an optional `0x` or `#` prefix.
pub fn parse_rgba(s: &str) -> Result<u32, String> {
    let hex = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('#'))
        .unwrap_or(s);

    if hex.len() != 8 {
        return Err(format!("Expected 8 hex digits (RRGGBBAA), got: {}", s));
    }
    u32::from_str_radix(hex, 16).map_err(|_| format!("Invalid color: {}", s))
}

/// Settings fixed for the lifetime of the bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub height: u32,
    pub font: FontDescription,
    pub theme: Theme,
    pub edge: Edge,
    pub layout: Layout,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            height: cli.height,
            font: cli.font,
            theme: Theme::from_packed(cli.foreground, cli.background),
            edge: if cli.bottom { Edge::Bottom } else { Edge::Top },
            layout: Layout {
                start: cli.left,
                center: cli.center,
                end: cli.right,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            height: 20,
            font: FontDescription::default(),
            theme: Theme::default(),
            edge: Edge::Top,
            layout: Layout::default(),
        }
    }
}
