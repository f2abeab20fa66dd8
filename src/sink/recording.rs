use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use anyhow::anyhow;

use crate::{
    assets::loader::{LoadedSurface, SurfaceLoader},
    effects::descriptor::{BackdropSource, BlendMode},
    foundation::color::Color,
    sink::{GraphSink, ImageRequest},
};

/// Node handle allocated by [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Brush handle allocated by [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BrushId(pub u32);

/// Brush realized by [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordedBrush {
    /// Brush handle.
    pub id: BrushId,
    /// Root node the brush was realized from.
    pub root: NodeId,
}

/// Fallible [`GraphSink`] operations, used for failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SinkOp {
    CreateFromColor,
    CreateFromBackdrop,
    CreateFromImage,
    CreateFromTile,
    ApplyTint,
    ApplyBlur,
    ApplySaturation,
    ApplyLuminanceToAlpha,
    ApplyBlend,
    Realize,
}

/// One successful call observed by [`RecordingSink`].
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum SinkCall {
    CreateFromColor {
        color: Color,
        out: NodeId,
    },
    CreateFromBackdrop {
        source: BackdropSource,
        out: NodeId,
    },
    CreateFromImage {
        uri: String,
        out: NodeId,
    },
    CreateFromTile {
        uri: String,
        out: NodeId,
    },
    ApplyTint {
        input: NodeId,
        color: Color,
        opacity: f32,
        out: NodeId,
    },
    ApplyBlur {
        input: NodeId,
        amount: f32,
        out: NodeId,
    },
    ApplySaturation {
        input: NodeId,
        amount: f32,
        out: NodeId,
    },
    ApplyLuminanceToAlpha {
        input: NodeId,
        out: NodeId,
    },
    ApplyBlend {
        foreground: NodeId,
        background: NodeId,
        mode: BlendMode,
        out: NodeId,
    },
    Realize {
        root: NodeId,
        out: BrushId,
    },
    DisposeNode(NodeId),
    DisposeBrush(BrushId),
}

#[derive(Debug, Default)]
struct RecorderState {
    calls: Vec<SinkCall>,
    next_node: u32,
    next_brush: u32,
    live_nodes: BTreeSet<NodeId>,
    live_brushes: BTreeSet<BrushId>,
    failing: HashSet<SinkOp>,
    surfaces: HashMap<NodeId, LoadedSurface>,
    double_disposals: usize,
}

impl RecorderState {
    fn check(&self, op: SinkOp) -> anyhow::Result<()> {
        if self.failing.contains(&op) {
            return Err(anyhow!("injected failure in {op:?}"));
        }
        Ok(())
    }

    fn require_live(&self, node: NodeId) -> anyhow::Result<()> {
        if !self.live_nodes.contains(&node) {
            return Err(anyhow!("node {} is not live", node.0));
        }
        Ok(())
    }

    fn alloc_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.live_nodes.insert(id);
        id
    }

    fn transform(
        &mut self,
        op: SinkOp,
        input: NodeId,
        call: impl FnOnce(NodeId) -> SinkCall,
    ) -> anyhow::Result<NodeId> {
        self.check(op)?;
        self.require_live(input)?;
        let out = self.alloc_node();
        self.calls.push(call(out));
        Ok(out)
    }
}

/// Headless [`GraphSink`] that records every call and tracks live native objects.
///
/// Nodes and brushes are opaque counters. When built with a [`SurfaceLoader`], image and
/// tile sources are actually loaded and decoded; otherwise they succeed without IO.
/// Operations can be made to fail with [`RecordingSink::fail_on`].
#[derive(Debug, Default)]
pub struct RecordingSink {
    state: parking_lot::Mutex<RecorderState>,
    loader: Option<Arc<SurfaceLoader>>,
}

impl RecordingSink {
    /// Sink without image IO.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that loads image and tile sources through `loader`.
    pub fn with_loader(loader: Arc<SurfaceLoader>) -> Self {
        Self {
            state: parking_lot::Mutex::default(),
            loader: Some(loader),
        }
    }

    /// Make every later `op` call fail.
    pub fn fail_on(&self, op: SinkOp) {
        self.state.lock().failing.insert(op);
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Every successful call so far, in order.
    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.lock().calls.clone()
    }

    /// Successful calls excluding disposals.
    pub fn construction_calls(&self) -> Vec<SinkCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, SinkCall::DisposeNode(_) | SinkCall::DisposeBrush(_)))
            .collect()
    }

    /// Number of successful `realize` calls.
    pub fn realize_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, SinkCall::Realize { .. }))
            .count()
    }

    /// Nodes created and not yet disposed.
    pub fn live_nodes(&self) -> usize {
        self.state.lock().live_nodes.len()
    }

    /// Brushes realized and not yet disposed.
    pub fn live_brushes(&self) -> usize {
        self.state.lock().live_brushes.len()
    }

    /// Whether every node and brush has been disposed.
    pub fn is_clean(&self) -> bool {
        let state = self.state.lock();
        state.live_nodes.is_empty() && state.live_brushes.is_empty()
    }

    /// Dispose calls for objects that were not live.
    pub fn double_disposals(&self) -> usize {
        self.state.lock().double_disposals
    }

    /// Surface loaded for an image or tile node.
    pub fn surface(&self, node: NodeId) -> Option<LoadedSurface> {
        self.state.lock().surfaces.get(&node).cloned()
    }

    async fn create_from_surface(
        &self,
        op: SinkOp,
        request: &ImageRequest,
    ) -> anyhow::Result<NodeId> {
        self.state.lock().check(op)?;

        let loaded = match &self.loader {
            Some(loader) => Some(loader.load(request).await?),
            None => None,
        };

        let mut state = self.state.lock();
        let out = state.alloc_node();
        let uri = request.uri.clone();
        state.calls.push(match op {
            SinkOp::CreateFromTile => SinkCall::CreateFromTile { uri, out },
            _ => SinkCall::CreateFromImage { uri, out },
        });
        if let Some(loaded) = loaded {
            state.surfaces.insert(out, loaded);
        }
        Ok(out)
    }
}

impl GraphSink for RecordingSink {
    type Node = NodeId;
    type Brush = RecordedBrush;

    fn create_from_color(&self, color: Color) -> anyhow::Result<NodeId> {
        let mut state = self.state.lock();
        state.check(SinkOp::CreateFromColor)?;
        let out = state.alloc_node();
        state.calls.push(SinkCall::CreateFromColor { color, out });
        Ok(out)
    }

    fn create_from_backdrop(&self, source: BackdropSource) -> anyhow::Result<NodeId> {
        let mut state = self.state.lock();
        state.check(SinkOp::CreateFromBackdrop)?;
        let out = state.alloc_node();
        state.calls.push(SinkCall::CreateFromBackdrop { source, out });
        Ok(out)
    }

    async fn create_from_image(&self, request: &ImageRequest) -> anyhow::Result<NodeId> {
        self.create_from_surface(SinkOp::CreateFromImage, request)
            .await
    }

    async fn create_from_tile(&self, request: &ImageRequest) -> anyhow::Result<NodeId> {
        self.create_from_surface(SinkOp::CreateFromTile, request)
            .await
    }

    fn apply_tint(&self, input: &NodeId, color: Color, opacity: f32) -> anyhow::Result<NodeId> {
        let input = *input;
        self.state
            .lock()
            .transform(SinkOp::ApplyTint, input, |out| SinkCall::ApplyTint {
                input,
                color,
                opacity,
                out,
            })
    }

    fn apply_blur(&self, input: &NodeId, amount: f32) -> anyhow::Result<NodeId> {
        let input = *input;
        self.state
            .lock()
            .transform(SinkOp::ApplyBlur, input, |out| SinkCall::ApplyBlur {
                input,
                amount,
                out,
            })
    }

    fn apply_saturation(&self, input: &NodeId, amount: f32) -> anyhow::Result<NodeId> {
        let input = *input;
        self.state
            .lock()
            .transform(SinkOp::ApplySaturation, input, |out| {
                SinkCall::ApplySaturation { input, amount, out }
            })
    }

    fn apply_luminance_to_alpha(&self, input: &NodeId) -> anyhow::Result<NodeId> {
        let input = *input;
        self.state
            .lock()
            .transform(SinkOp::ApplyLuminanceToAlpha, input, |out| {
                SinkCall::ApplyLuminanceToAlpha { input, out }
            })
    }

    fn apply_blend(
        &self,
        foreground: &NodeId,
        background: &NodeId,
        mode: BlendMode,
    ) -> anyhow::Result<NodeId> {
        let (foreground, background) = (*foreground, *background);
        let mut state = self.state.lock();
        state.require_live(background)?;
        state.transform(SinkOp::ApplyBlend, foreground, |out| SinkCall::ApplyBlend {
            foreground,
            background,
            mode,
            out,
        })
    }

    async fn realize(&self, root: &NodeId) -> anyhow::Result<RecordedBrush> {
        let mut state = self.state.lock();
        state.check(SinkOp::Realize)?;
        state.require_live(*root)?;
        let id = BrushId(state.next_brush);
        state.next_brush += 1;
        state.live_brushes.insert(id);
        state.calls.push(SinkCall::Realize {
            root: *root,
            out: id,
        });
        Ok(RecordedBrush { id, root: *root })
    }

    fn dispose_node(&self, node: NodeId) {
        let mut state = self.state.lock();
        if !state.live_nodes.remove(&node) {
            state.double_disposals += 1;
            tracing::warn!(node = node.0, "dispose of a node that is not live");
            return;
        }
        state.surfaces.remove(&node);
        state.calls.push(SinkCall::DisposeNode(node));
    }

    fn dispose_brush(&self, brush: RecordedBrush) {
        let mut state = self.state.lock();
        if !state.live_brushes.remove(&brush.id) {
            state.double_disposals += 1;
            tracing::warn!(brush = brush.id.0, "dispose of a brush that is not live");
            return;
        }
        state.calls.push(SinkCall::DisposeBrush(brush.id));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sink/recording.rs"]
mod tests;
