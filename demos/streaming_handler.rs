//! Stream chunks through the handler façade with live callbacks.
//!
//! Run with: cargo run --example streaming_handler

use agent_stream::{SegmentEventType, StreamingResponseHandler};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut handler = StreamingResponseHandler::new(None, Some("xml"))?
        .on_event(|event| {
            if event.event_type == SegmentEventType::Start {
                println!("-- segment {} opened ({:?})", event.segment_id, event.segment_type);
            }
        })
        .on_invocation(|invocation| {
            println!(
                ">> dispatch {} ({}) with {}",
                invocation.name,
                invocation.id,
                serde_json::Value::Object(invocation.arguments.clone())
            );
        });

    // Simulate an LLM stream arriving in awkward chunks.
    let chunks = [
        "Running the check now: <tool name=\"run_term",
        "inal_cmd\"><arguments><arg name=\"command\">cargo te",
        "st --workspace</arg></argu",
        "ments></tool> and that's it.",
    ];

    for chunk in chunks {
        for event in handler.feed(chunk)? {
            if let Some(delta) = event.delta() {
                print!("{delta}");
            }
        }
    }
    handler.finalize()?;
    println!();

    println!("total events: {}", handler.all_events().len());
    println!("total invocations: {}", handler.all_invocations().len());
    Ok(())
}
