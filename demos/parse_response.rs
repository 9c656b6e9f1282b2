//! Parse a complete LLM response and print its segments.
//!
//! Run with: cargo run --example parse_response

use agent_stream::{ParserConfig, collect_segments, parse_complete_response};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let response = "Let me create that file.\
<tool name=\"write_file\"><arguments>\
<arg name=\"path\">/tmp/hello.py</arg>\
<arg name=\"content\">__START_CONTENT__\nprint('hello')\n__END_CONTENT__</arg>\
</arguments></tool>Done!";

    let events = parse_complete_response(response, ParserConfig::default())?;
    println!("{} events", events.len());

    for segment in collect_segments(&events) {
        println!(
            "[{}] {:?}: {:?}",
            segment.id, segment.segment_type, segment.content
        );
        if let Some(args) = segment.metadata.get("arguments") {
            println!("      arguments: {args}");
        }
    }

    Ok(())
}
