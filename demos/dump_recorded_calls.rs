use brushwork::{PipelineBuilder, RecordingSink, parse_effects};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let effects = parse_effects(include_str!("../tests/data/frosted_panel.json"))?;
    let pipeline = PipelineBuilder::from_effects(&effects)?;

    let sink = RecordingSink::new();
    let graph = pipeline.resolve(&sink).await?;
    for call in sink.calls() {
        println!("{call:?}");
    }
    println!("brush {:?} over {} nodes", graph.brush(), graph.nodes().len());

    graph.dispose(&sink);
    println!("clean after dispose: {}", sink.is_clean());
    Ok(())
}
