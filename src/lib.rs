mod bar;
pub mod canvas;
pub mod config;
pub mod content;
pub mod field;
pub mod geometry;
pub mod ipc;
pub mod layout;
pub mod modules;
pub mod monitor;
pub mod pool;
mod registry;
pub mod stdin;
pub mod text;
pub mod theme;
pub mod wayland;

pub use bar::{Bar, RefreshFlag};
pub use canvas::Canvas;
pub use config::{Cli, Config, Edge};
pub use content::{ContentModel, Layout};
pub use field::Field;
pub use geometry::Extent;
pub use layout::{Align, Painter};
pub use text::{CosmicShaper, FontDescription, Shaper};
pub use theme::{Bgra, Theme};
pub use wayland::Display;
