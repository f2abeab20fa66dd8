use std::fmt;

use futures_util::future::{FutureExt, LocalBoxFuture};

use crate::{
    effects::descriptor::Placement,
    foundation::error::{BrushworkError, BrushworkResult},
    pipeline::builder::{PipelineBuilder, Source, Transform},
    sink::GraphSink,
};

/// Realized brush plus every node created to build it.
///
/// The handle owns its native objects. Release them with [`RealizedGraph::dispose`]; dropping
/// the handle without disposing leaks them in the host compositor.
pub struct RealizedGraph<S: GraphSink> {
    brush: S::Brush,
    nodes: Vec<S::Node>,
}

impl<S: GraphSink> RealizedGraph<S> {
    /// The realized brush.
    pub fn brush(&self) -> &S::Brush {
        &self.brush
    }

    /// Nodes in creation order; the last one is the root the brush was realized from.
    pub fn nodes(&self) -> &[S::Node] {
        &self.nodes
    }

    /// Release the brush, then every node, newest first.
    pub fn dispose(self, sink: &S) {
        sink.dispose_brush(self.brush);
        for node in self.nodes.into_iter().rev() {
            sink.dispose_node(node);
        }
    }
}

impl<S> fmt::Debug for RealizedGraph<S>
where
    S: GraphSink,
    S::Brush: fmt::Debug,
    S::Node: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealizedGraph")
            .field("brush", &self.brush)
            .field("nodes", &self.nodes)
            .finish()
    }
}

/// Nodes created by one resolution. Anything still held when the scope drops (an error,
/// or the resolution future being dropped) is disposed, newest first.
struct NodeScope<'s, S: GraphSink> {
    sink: &'s S,
    nodes: Vec<S::Node>,
}

impl<'s, S: GraphSink> NodeScope<'s, S> {
    fn new(sink: &'s S) -> Self {
        Self {
            sink,
            nodes: Vec::new(),
        }
    }

    fn push(&mut self, node: S::Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn get(&self, ix: usize) -> &S::Node {
        &self.nodes[ix]
    }

    fn into_nodes(mut self) -> Vec<S::Node> {
        std::mem::take(&mut self.nodes)
    }
}

impl<S: GraphSink> Drop for NodeScope<'_, S> {
    fn drop(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        tracing::debug!(
            nodes = self.nodes.len(),
            "disposing nodes of an unfinished resolution"
        );
        for node in self.nodes.drain(..).rev() {
            self.sink.dispose_node(node);
        }
    }
}

impl PipelineBuilder {
    /// Resolve this pipeline against `sink` into a realized graph.
    ///
    /// The whole tree is validated before the first sink call. Steps then run strictly in
    /// append order; image/tile sources, nested pipelines, and the final realize are awaited
    /// in sequence. On any failure every node created so far is disposed before the error is
    /// returned.
    #[tracing::instrument(skip_all, fields(steps = self.len()))]
    pub async fn resolve<S: GraphSink>(&self, sink: &S) -> BrushworkResult<RealizedGraph<S>> {
        validate(self)?;

        let mut scope = NodeScope::new(sink);
        let root = build(self, &mut scope).await?;
        let brush = sink
            .realize(scope.get(root))
            .await
            .map_err(|cause| BrushworkError::NativeRealizeFailed { cause })?;

        let nodes = scope.into_nodes();
        tracing::debug!(nodes = nodes.len(), "pipeline realized");
        Ok(RealizedGraph { brush, nodes })
    }
}

fn validate(pipeline: &PipelineBuilder) -> BrushworkResult<()> {
    let Some(source) = pipeline.source() else {
        return Err(BrushworkError::EmptyPipeline);
    };
    if let Source::Pipeline(inner) = source {
        validate(inner)?;
    }
    for transform in pipeline.transforms() {
        if let Transform::Blend { other, .. } = transform {
            if other.is_empty() {
                return Err(BrushworkError::EmptyBlendInputs);
            }
            validate(other)?;
        }
    }
    Ok(())
}

/// Build the graph of `pipeline` into `scope`, returning the index of its root node.
fn build<'a, 's, S>(
    pipeline: &'a PipelineBuilder,
    scope: &'a mut NodeScope<'s, S>,
) -> LocalBoxFuture<'a, BrushworkResult<usize>>
where
    S: GraphSink + 'a,
    's: 'a,
{
    async move {
        let sink = scope.sink;
        let source = pipeline.source().ok_or(BrushworkError::EmptyPipeline)?;
        tracing::debug!(step = source.name(), "creating source");

        let mut current = match source {
            Source::Color(color) => {
                let node = sink
                    .create_from_color(*color)
                    .map_err(|e| BrushworkError::resolution("create_from_color", e))?;
                scope.push(node)
            }
            Source::Backdrop(backdrop) => {
                let node = sink
                    .create_from_backdrop(*backdrop)
                    .map_err(|e| BrushworkError::resolution("create_from_backdrop", e))?;
                scope.push(node)
            }
            Source::Image(request) => {
                let node = sink
                    .create_from_image(request)
                    .await
                    .map_err(|e| BrushworkError::resolution("create_from_image", e))?;
                scope.push(node)
            }
            Source::Tile(request) => {
                let node = sink
                    .create_from_tile(request)
                    .await
                    .map_err(|e| BrushworkError::resolution("create_from_tile", e))?;
                scope.push(node)
            }
            Source::Pipeline(inner) => build(inner, scope).await?,
        };

        for transform in pipeline.transforms() {
            tracing::debug!(step = transform.name(), "applying transform");
            let node = match transform {
                Transform::Tint { color, opacity } => sink
                    .apply_tint(scope.get(current), *color, *opacity)
                    .map_err(|e| BrushworkError::resolution("apply_tint", e))?,
                Transform::Blur { amount } => sink
                    .apply_blur(scope.get(current), *amount)
                    .map_err(|e| BrushworkError::resolution("apply_blur", e))?,
                Transform::Saturation { amount } => sink
                    .apply_saturation(scope.get(current), *amount)
                    .map_err(|e| BrushworkError::resolution("apply_saturation", e))?,
                Transform::LuminanceToAlpha => sink
                    .apply_luminance_to_alpha(scope.get(current))
                    .map_err(|e| BrushworkError::resolution("apply_luminance_to_alpha", e))?,
                Transform::Blend {
                    other,
                    mode,
                    placement,
                } => {
                    let other_root = build(other, scope).await?;
                    let (foreground, background) = match placement {
                        Placement::Foreground => (current, other_root),
                        Placement::Background => (other_root, current),
                    };
                    sink.apply_blend(scope.get(foreground), scope.get(background), *mode)
                        .map_err(|e| BrushworkError::resolution("apply_blend", e))?
                }
            };
            current = scope.push(node);
        }

        Ok(current)
    }
    .boxed_local()
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/resolve.rs"]
mod tests;
