//! The narrow capability brushwork needs from a host compositor.

use std::future::Future;

use crate::{
    effects::descriptor::{BackdropSource, BlendMode, CacheMode, DpiMode},
    foundation::color::Color,
};

pub(crate) mod recording;

/// Image or tile source handed to [`GraphSink::create_from_image`] and
/// [`GraphSink::create_from_tile`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ImageRequest {
    /// Image location (`file:///abs/path` or a root-relative path).
    pub uri: String,
    /// DPI scaling applied to the decoded surface.
    #[serde(default)]
    pub dpi_mode: DpiMode,
    /// Decode caching policy.
    #[serde(default)]
    pub cache_mode: CacheMode,
}

impl ImageRequest {
    /// Request `uri` with default DPI and caching.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            dpi_mode: DpiMode::default(),
            cache_mode: CacheMode::default(),
        }
    }

    /// Set the DPI mode.
    pub fn dpi_mode(mut self, dpi_mode: DpiMode) -> Self {
        self.dpi_mode = dpi_mode;
        self
    }

    /// Set the cache mode.
    pub fn cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }
}

/// Host compositor capability consumed by pipeline resolution.
///
/// Node operations borrow their inputs: the resolver keeps ownership of every node it creates
/// and disposes them itself, either together with the realized brush or on a failure path.
/// Futures are not required to be `Send`; sinks usually have UI-thread affinity.
pub trait GraphSink {
    /// Intermediate effect node.
    type Node;
    /// Realized brush usable by a visual.
    type Brush;

    /// Create a flat color node.
    fn create_from_color(&self, color: Color) -> anyhow::Result<Self::Node>;

    /// Create a backdrop sampling node.
    fn create_from_backdrop(&self, source: BackdropSource) -> anyhow::Result<Self::Node>;

    /// Load an image and create a node stretching it over the consumer.
    fn create_from_image(
        &self,
        request: &ImageRequest,
    ) -> impl Future<Output = anyhow::Result<Self::Node>>;

    /// Load an image and create a node tiling it over the consumer.
    fn create_from_tile(
        &self,
        request: &ImageRequest,
    ) -> impl Future<Output = anyhow::Result<Self::Node>>;

    /// Mix `color` over `input` with `opacity` in `[0, 1]`.
    fn apply_tint(
        &self,
        input: &Self::Node,
        color: Color,
        opacity: f32,
    ) -> anyhow::Result<Self::Node>;

    /// Gaussian blur of `input`.
    fn apply_blur(&self, input: &Self::Node, amount: f32) -> anyhow::Result<Self::Node>;

    /// Saturation adjustment of `input`.
    fn apply_saturation(&self, input: &Self::Node, amount: f32) -> anyhow::Result<Self::Node>;

    /// Luminance-to-alpha mapping of `input`.
    fn apply_luminance_to_alpha(&self, input: &Self::Node) -> anyhow::Result<Self::Node>;

    /// Blend `foreground` over `background` with `mode`.
    fn apply_blend(
        &self,
        foreground: &Self::Node,
        background: &Self::Node,
        mode: BlendMode,
    ) -> anyhow::Result<Self::Node>;

    /// Turn the finished graph rooted at `root` into a brush.
    fn realize(&self, root: &Self::Node) -> impl Future<Output = anyhow::Result<Self::Brush>>;

    /// Release a node.
    fn dispose_node(&self, node: Self::Node);

    /// Release a brush.
    fn dispose_brush(&self, brush: Self::Brush);
}
