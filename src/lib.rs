#![forbid(unsafe_code)]

pub mod anim;
pub mod anim_ease;
pub mod anim_ops;
pub mod camera;
pub mod color;
pub mod config;
pub mod element;
pub mod encode;
pub mod error;
pub mod postfx;
pub mod raster;
pub mod render;
pub mod scene;
pub mod series;

pub use anim::Animation;
pub use anim_ease::Ease;
pub use anim_ops::{AnimKind, AppearStyle, Direction, PostFxTween, PropChange};
pub use camera::{Camera, CameraSnapshot, FitPaddings};
pub use color::Rgba;
pub use config::{ColorGrading, PostFx, PostFxField, RenderConfig, Theme};
pub use element::{Element, ElementId};
pub use error::{ChartAnimError, ChartAnimResult};
pub use render::Renderer;
pub use scene::{PlayOpts, Scene};
pub use series::{CandleSeries, OhlcRecord};
