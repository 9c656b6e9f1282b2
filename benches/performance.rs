use agent_stream::{ParserConfig, StreamingParser, ToolInvocationAdapter};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

// Helper to build a plain-text stream of the requested size
fn text_stream(size: usize) -> String {
    "The quick brown fox jumps over the lazy dog. "
        .chars()
        .cycle()
        .take(size)
        .collect()
}

// Helper to build a stream with interleaved tool blocks
fn tool_stream(blocks: usize) -> String {
    let mut out = String::new();
    for i in 0..blocks {
        out.push_str("some narration before the call ");
        out.push_str(&format!(
            "<tool name=\"search\"><arguments><arg name=\"q\">query {i}</arg><arg name=\"limit\">10</arg></arguments></tool>"
        ));
    }
    out
}

// Helper to build a write_file block with a sentinel-guarded body
fn write_file_stream(body_lines: usize) -> String {
    let mut body = String::new();
    for i in 0..body_lines {
        body.push_str(&format!("line {i}: value = {{ a: {i}, b: \"<tag>\" }}\n"));
    }
    format!(
        "<tool name=\"write_file\"><arguments><arg name=\"path\">/tmp/out.rs</arg><arg name=\"content\">__START_CONTENT__\n{body}__END_CONTENT__</arg></arguments></tool>"
    )
}

fn feed_in_chunks(input: &str, chunk_size: usize) -> usize {
    let mut parser = StreamingParser::new(ParserConfig::default());
    let mut adapter = ToolInvocationAdapter::new();
    let mut event_count = 0;

    for chunk in input.as_bytes().chunks(chunk_size) {
        let events = parser.feed(std::str::from_utf8(chunk).unwrap()).unwrap();
        event_count += events.len();
        adapter.process_events(&events);
    }
    event_count += parser.finalize().unwrap().len();
    event_count
}

// Benchmark: plain text throughput at varying chunk sizes
fn bench_text_by_chunk_size(c: &mut Criterion) {
    let input = text_stream(64 * 1024);
    let mut group = c.benchmark_group("text_by_chunk_size");

    for chunk_size in [16, 256, 4096] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &size| b.iter(|| feed_in_chunks(black_box(&input), size)),
        );
    }
    group.finish();
}

// Benchmark: tool-heavy streams
fn bench_tool_blocks(c: &mut Criterion) {
    let mut group = c.benchmark_group("tool_blocks");

    for blocks in [1, 10, 50] {
        let input = tool_stream(blocks);
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &input, |b, input| {
            b.iter(|| feed_in_chunks(black_box(input), 256))
        });
    }
    group.finish();
}

// Benchmark: sentinel-guarded file bodies
fn bench_write_file_body(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_file_body");

    for lines in [10, 100, 1000] {
        let input = write_file_stream(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &input, |b, input| {
            b.iter(|| feed_in_chunks(black_box(input), 512))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_text_by_chunk_size,
    bench_tool_blocks,
    bench_write_file_body
);
criterion_main!(benches);
