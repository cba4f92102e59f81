use std::fs;
use std::io::{BufRead, BufReader};
use std::sync::mpsc;
use std::thread;

use serde_json::{json, Value};
use tempfile::TempDir;
use tether_core::ffi;
use tether_core::pipeline::{self, PipelineEvent};
use tether_core::{
    decode_block, decode_envelope, encode_block, Block, CancellableSource, CommandKind,
    CommandParameters, CommandTarget, ContentPipeline, Paragraph, StreamConfig, StreamDecoder,
    StreamEnding, StreamError, StreamEvent, Transcript,
};

fn source(lines: &[&str]) -> impl Iterator<Item = std::io::Result<String>> {
    lines
        .iter()
        .map(|&line| Ok(line.to_owned()))
        .collect::<Vec<_>>()
        .into_iter()
}

fn every_block() -> Vec<Block> {
    vec![
        Block::paragraph("Plain text with \"quotes\" and {braces}"),
        Block::Code {
            language: "rust".into(),
            content: "fn main() {\n    println!(\"hi\");\n}\n".into(),
            executable: true,
            filename: Some("main.rs".into()),
        },
        Block::Command {
            kind: CommandKind::Create,
            target: CommandTarget::File,
            parameters: CommandParameters::CreateFile {
                path: "src/lib.rs".into(),
                content: "pub fn f() {}\n".into(),
            },
        },
        Block::Command {
            kind: CommandKind::Execute,
            target: CommandTarget::BuildTool,
            parameters: CommandParameters::ExecuteBuild {
                command: "make".into(),
                args: vec!["test".into(), "-j4".into()],
            },
        },
        Block::List {
            ordered: true,
            items: vec![Paragraph::new("first"), Paragraph::new("second")],
        },
        Block::Heading {
            level: 2,
            text: "Summary".into(),
        },
        Block::Callout {
            style: "warning".into(),
            title: "Heads up".into(),
            text: "Check the build output.".into(),
        },
    ]
}

#[test]
fn every_block_survives_encode_and_decode() {
    for block in every_block() {
        let encoded = encode_block(&block);
        let decoded = decode_block(&encoded).expect("decode encoded block");
        assert_eq!(decoded, block, "wire form {encoded}");
    }
}

#[test]
fn envelope_shapes_decode_identically() {
    let blocks = every_block();
    let wire: Vec<Value> = blocks.iter().map(encode_block).collect();

    let flat = json!({ "blocks": wire });
    let nested = json!({
        "schema": "assistant-response",
        "response": { "content": { "blocks": wire } },
    });

    assert_eq!(decode_envelope(&flat).expect("flat"), blocks);
    assert_eq!(decode_envelope(&nested).expect("nested"), blocks);
    assert_eq!(
        decode_envelope(&wire[0]).expect("single"),
        vec![blocks[0].clone()]
    );
}

#[test]
fn paragraph_then_sentinel_delivers_one_block() {
    let mut blocks = Vec::new();
    let mut errors = Vec::new();

    let outcome = pipeline::process(
        source(&[r#"data: {"type":"paragraph","content":"Hi"}"#, "data: [DONE]"]),
        |block| blocks.push(block),
        |_| {},
        |error, auth_related| errors.push((error.to_string(), auth_related)),
    );

    assert_eq!(blocks, vec![Block::paragraph("Hi")]);
    assert!(errors.is_empty());
    assert_eq!(outcome.ending, StreamEnding::Completed);
}

#[test]
fn unauthorized_error_is_auth_related() {
    let mut errors = Vec::new();

    let outcome = pipeline::process(
        source(&[r#"data: {"error":"401 Unauthorized"}"#]),
        |_| panic!("no blocks expected"),
        |_| {},
        |error, auth_related| errors.push((error, auth_related)),
    );

    assert_eq!(errors.len(), 1);
    let (error, auth_related) = &errors[0];
    assert!(matches!(error, StreamError::Protocol { message } if message == "401 Unauthorized"));
    assert!(*auth_related);
    assert_eq!(outcome.ending, StreamEnding::Failed { auth_related: true });
}

#[test]
fn fragments_reassemble_regardless_of_split_points() {
    let payload = encode_block(&Block::Callout {
        style: "info".into(),
        title: "Nested {object}".into(),
        text: "Body with } and { inside".into(),
    })
    .to_string();
    let chars: Vec<char> = payload.chars().collect();

    for pieces in 1..=10 {
        let chunk = chars.len().div_ceil(pieces);
        let mut lines: Vec<String> = chars
            .chunks(chunk)
            .map(|part| format!("data: {}", part.iter().collect::<String>()))
            .collect();
        lines.push("data: [DONE]".into());

        let events: Vec<StreamEvent> =
            StreamDecoder::new(lines.into_iter().map(Ok::<_, std::io::Error>)).collect();

        assert_eq!(events.len(), 2, "split into {pieces} pieces");
        match &events[0] {
            StreamEvent::BlockPayload(value) => {
                assert_eq!(value.to_string(), payload, "split into {pieces} pieces");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(events[1], StreamEvent::Done));
    }
}

#[test]
fn later_session_id_replaces_earlier_one() {
    let mut transcript = Transcript::new();
    let outcome = ContentPipeline::default().process(
        source(&[
            r#"data: {"session_id":"first"}"#,
            r#"data: {"type":"paragraph","content":"one"}"#,
            r#"data: {"session_id":"second"}"#,
            "data: [DONE]",
        ]),
        &mut transcript,
    );

    assert_eq!(transcript.session_id(), Some("second"));
    assert_eq!(outcome.session_id.as_deref(), Some("second"));
    assert!(outcome.session_reassigned);
    assert_eq!(transcript.latest_response(), &[Block::paragraph("one")]);
}

#[test]
fn null_session_id_and_error_add_no_notice() {
    let mut transcript = Transcript::new();
    let outcome = ContentPipeline::default().process(
        source(&[
            r#"data: {"session_id":"kept"}"#,
            r#"data: {"session_id":null}"#,
            r#"data: {"error":null}"#,
            r#"data: {"type":"paragraph","content":"answer"}"#,
            "data: [DONE]",
        ]),
        &mut transcript,
    );

    assert_eq!(transcript.latest_response(), &[Block::paragraph("answer")]);
    assert_eq!(outcome.notices_delivered, 0);
    assert_eq!(outcome.ending, StreamEnding::Completed);
    assert_eq!(transcript.session_id(), Some("kept"));
    assert!(transcript.last_error().is_none());
}

#[test]
fn undecodable_payload_becomes_notice_and_stream_continues() {
    let mut transcript = Transcript::new();
    let outcome = ContentPipeline::default().process(
        source(&[
            r#"data: {"type":"table","rows":[]}"#,
            r#"data: {"type":"paragraph","content":"after"}"#,
            "data: [DONE]",
        ]),
        &mut transcript,
    );

    let response = transcript.latest_response();
    assert_eq!(response.len(), 2);
    assert!(matches!(&response[0], Block::Callout { style, .. } if style == "error"));
    assert_eq!(response[1], Block::paragraph("after"));
    assert_eq!(outcome.notices_delivered, 1);
    assert_eq!(outcome.blocks_delivered, 1);
}

#[test]
fn stream_read_from_file_lines() -> std::io::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("response.sse");
    fs::write(
        &path,
        concat!(
            ": keep-alive\r\n",
            "data: {\"type\":\"heading\",\"level\":1,\r\n",
            "data: \"content\":\"Title\"}\r\n",
            "\r\n",
            "data: {\"blocks\":[{\"type\":\"paragraph\",\"text\":\"body\"}]}\r\n",
            "data: [DONE]\r\n",
        ),
    )?;

    let reader = BufReader::new(fs::File::open(&path)?);
    let mut transcript = Transcript::new();
    let outcome = ContentPipeline::default().process(reader.lines(), &mut transcript);

    assert_eq!(outcome.ending, StreamEnding::Completed);
    assert_eq!(
        transcript.latest_response(),
        &[
            Block::Heading {
                level: 1,
                text: "Title".into()
            },
            Block::paragraph("body"),
        ]
    );
    Ok(())
}

#[test]
fn channel_sink_preserves_order_across_threads() {
    let (sender, receiver) = mpsc::channel::<PipelineEvent>();
    let lines: Vec<String> = (0..20)
        .map(|n| format!(r#"data: {{"type":"paragraph","content":"item {n}"}}"#))
        .chain(std::iter::once("data: [DONE]".to_owned()))
        .collect();

    let producer = thread::spawn(move || {
        let mut sender = sender;
        ContentPipeline::default().process(lines.into_iter().map(Ok::<_, std::io::Error>), &mut sender)
    });

    let received: Vec<Block> = receiver
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::Block(block) => Some(block),
            _ => None,
        })
        .collect();
    let outcome = producer.join().expect("producer thread");

    assert_eq!(outcome.blocks_delivered, 20);
    let expected: Vec<Block> = (0..20)
        .map(|n| Block::paragraph(format!("item {n}")))
        .collect();
    assert_eq!(received, expected);
}

#[test]
fn cancelled_source_stops_without_flushing_partial_fragment() {
    let (source, handle) = CancellableSource::new(source(&[
        r#"data: {"type":"paragraph","content":"kept"}"#,
        r#"data: {"type":"paragraph","#,
        r#"data: "content":"lost"}"#,
    ]));
    let mut decoder = StreamDecoder::new(source);

    assert!(matches!(decoder.next(), Some(StreamEvent::BlockPayload(_))));
    handle.cancel();

    let rest: Vec<StreamEvent> = decoder.by_ref().collect();
    assert_eq!(rest.len(), 1);
    assert!(matches!(rest[0], StreamEvent::Error(StreamError::Io { .. })));
    assert!(decoder.next().is_none());
}

#[test]
fn custom_sentinel_from_config() {
    let config = StreamConfig {
        done_sentinel: "[END]".into(),
        ..StreamConfig::default()
    };
    let mut transcript = Transcript::new();
    let outcome = ContentPipeline::new(config).process(
        source(&["data: [DONE]", "data: [END]"]),
        &mut transcript,
    );
    assert_eq!(outcome.ending, StreamEnding::Completed);
    assert!(transcript.latest_response().is_empty());
}

#[test]
fn ffi_decode_stream_summarizes_body() {
    let body = [
        r#"data: {"session_id":"abc"}"#,
        r#"data: {"type":"paragraph","content":"Hello"}"#,
        r#"data: {"error":{"message":"403 Forbidden"}}"#,
    ]
    .join("\n");

    let transcript = ffi::decode_stream(body);

    assert_eq!(transcript.blocks, vec![Block::paragraph("Hello")]);
    assert_eq!(transcript.session_id.as_deref(), Some("abc"));
    assert_eq!(transcript.error.as_deref(), Some("403 Forbidden"));
    assert!(transcript.auth_error);
    assert!(!transcript.completed);
}

#[test]
fn ffi_block_functions_round_trip() {
    let block = Block::Heading {
        level: 3,
        text: "Details".into(),
    };
    let json = ffi::encode_block(block.clone());
    assert_eq!(ffi::decode_block(json).expect("decode"), block);
    assert!(matches!(
        ffi::decode_envelope("{\"unexpected\":true}".into()),
        Err(ffi::CoreError::Decode)
    ));
}
