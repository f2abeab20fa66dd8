//! Brushwork compiles declarative effect pipelines into native compositor brushes.
//!
//! A pipeline starts from one source (color, backdrop, image, tile, or another pipeline) and
//! accumulates transforms (tint, blur, saturation, luminance-to-alpha, blend). The public API
//! is split in three layers:
//!
//! - Describe a graph with [`PipelineBuilder`], directly or from JSON [`EffectDescriptor`]s
//! - Resolve it against a host [`GraphSink`] into a [`RealizedGraph`]
//! - Tie the realized brush to a consumer's lifetime with a [`BrushGuard`]
//!
//! [`RecordingSink`] is a headless sink for tests and tooling; with a [`SurfaceLoader`] it
//! also decodes image sources through the shared [`SurfaceCache`].
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod assets;
mod effects;
mod foundation;
mod lifecycle;
mod pipeline;
mod sink;

pub use crate::foundation::color::Color;
pub use crate::foundation::error::{BrushworkError, BrushworkResult};

pub use crate::effects::descriptor::{
    BackdropSource, BlendMode, CacheMode, DpiMode, EffectDescriptor, Placement, parse_effects,
};
pub use crate::pipeline::builder::{AcrylicParams, PipelineBuilder, Source, Step, Transform};
pub use crate::pipeline::resolve::RealizedGraph;

pub use crate::sink::recording::{
    BrushId, NodeId, RecordedBrush, RecordingSink, SinkCall, SinkOp,
};
pub use crate::sink::{GraphSink, ImageRequest};

pub use crate::assets::cache::{CacheStats, SurfaceCache};
pub use crate::assets::decode::{DecodedSurface, decode_image};
pub use crate::assets::loader::{
    LoadedSurface, LoaderConfig, SurfaceLoader, logical_size, normalize_rel_path, normalize_uri,
};

pub use crate::lifecycle::guard::{BrushConsumer, BrushGuard, BrushState};
