use crate::streaming_sse::{SseDecoder, SseEvent, BOM};

fn decode_chunks(chunks: &[&[u8]]) -> Vec<SseEvent> {
    let mut decoder = SseDecoder::new();
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(decoder.push(chunk));
    }
    events
}

#[test]
fn test_simple_event() {
    let mut decoder = SseDecoder::new();
    let events: Vec<_> = decoder.push(b"data: hello world\n\n").collect();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, "hello world");
    assert_eq!(events[0].event, "message");
    assert_eq!(events[0].id, "");
}

#[test]
fn test_multiline_data_is_newline_joined() {
    let events = decode_chunks(&[b"data: A\ndata: B\n\n"]);

    assert_eq!(events, vec![SseEvent::data("A\nB")]);
}

#[test]
fn test_named_event_then_default_type() {
    let events = decode_chunks(&[b"event: ping\ndata: x\n\ndata: y\n\n"]);

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], SseEvent::data("x").with_event("ping"));
    assert_eq!(events[1], SseEvent::data("y"));
}

#[test]
fn test_last_event_id_persists_across_dispatches() {
    let events = decode_chunks(&[b"id: 42\ndata: x\n\n", b"data: y\n\n"]);

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].id, "42");
    assert_eq!(events[1].id, "42");
}

#[test]
fn test_empty_id_resets_last_event_id() {
    let mut decoder = SseDecoder::new();
    let first: Vec<_> = decoder.push(b"id: 7\ndata: a\n\n").collect();
    assert_eq!(first[0].id, "7");

    let second: Vec<_> = decoder.push(b"id\ndata: b\n\n").collect();
    assert_eq!(second[0].id, "");
    assert_eq!(decoder.last_event_id(), "");
}

#[test]
fn test_id_without_dispatch_is_still_kept() {
    let mut decoder = SseDecoder::with_last_event_id("old");
    assert_eq!(decoder.push(b"id: new\n\n").count(), 0);
    assert_eq!(decoder.last_event_id(), "new");
}

#[test]
fn test_retry_is_reported_once() {
    let mut decoder = SseDecoder::new();
    assert_eq!(decoder.push(b"retry: 5000\n\n").count(), 0);
    assert_eq!(decoder.take_retry(), Some(5000));
    assert_eq!(decoder.take_retry(), None);
}

#[test]
fn test_malformed_retry_is_ignored() {
    let mut decoder = SseDecoder::new();
    assert_eq!(decoder.push(b"retry: notanumber\n\n").count(), 0);
    assert_eq!(decoder.push(b"retry: 12ms\nretry: -5\nretry:\n\n").count(), 0);
    assert_eq!(decoder.take_retry(), None);
}

#[test]
fn test_comment_does_not_touch_pending_fields() {
    let events = decode_chunks(&[b"event: update\n: this is a comment\ndata: v\n\n"]);

    assert_eq!(events, vec![SseEvent::data("v").with_event("update")]);
    assert!(decode_chunks(&[b": this is a comment\n\n"]).is_empty());
}

#[test]
fn test_blank_line_without_data_resets_event_name() {
    let events = decode_chunks(&[b"event: lost\n\ndata: kept\n\n"]);

    assert_eq!(events, vec![SseEvent::data("kept")]);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let events = decode_chunks(&[b"foo: bar\ndata: ok\nbaz\n\n"]);

    assert_eq!(events, vec![SseEvent::data("ok")]);
}

#[test]
fn test_field_without_colon_has_empty_value() {
    let events = decode_chunks(&[b"data\n\n"]);

    assert_eq!(events, vec![SseEvent::data("")]);
}

#[test]
fn test_only_one_leading_space_is_stripped() {
    let events = decode_chunks(&[b"data:  two spaces\ndata:none\n\n"]);

    assert_eq!(events[0].data, " two spaces\nnone");
}

#[test]
fn test_value_may_contain_colons() {
    let events = decode_chunks(&[b"data: {\"a\":1}\n\n"]);

    assert_eq!(events[0].data, "{\"a\":1}");
}

#[test]
fn test_all_line_terminators() {
    let lf = decode_chunks(&[b"data: a\n\n"]);
    let cr = decode_chunks(&[b"data: a\r\r"]);
    let crlf = decode_chunks(&[b"data: a\r\n\r\n"]);

    assert_eq!(lf, cr);
    assert_eq!(lf, crlf);
}

#[test]
fn test_crlf_split_across_chunks() {
    let mut decoder = SseDecoder::new();

    assert_eq!(decoder.push(b"data: chunked\r").count(), 0);
    assert_eq!(decoder.push(b"\n\r").count(), 1);
    assert_eq!(decoder.push(b"\ndata: next\r\n\r\n").count(), 1);
}

#[test]
fn test_very_chunked_multiline() {
    let mut decoder = SseDecoder::new();

    assert_eq!(decoder.push(b"da").count(), 0);
    assert_eq!(decoder.push(b"ta: li").count(), 0);
    assert_eq!(decoder.push(b"ne 1\nda").count(), 0);
    assert_eq!(decoder.push(b"ta: line 2").count(), 0);
    assert!(decoder.has_buffered_data());

    let events: Vec<_> = decoder.push(b"\n\n").collect();
    assert_eq!(events, vec![SseEvent::data("line 1\nline 2")]);
    assert!(!decoder.has_buffered_data());
}

#[test]
fn test_bom_is_stripped_once() {
    let mut stream = BOM.to_vec();
    stream.extend_from_slice(b"data: first\n\n");
    stream.extend_from_slice(&BOM);
    stream.extend_from_slice(b"data: second\n\n");

    let events = decode_chunks(&[&stream]);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, "first");
}

#[test]
fn test_bom_inside_data_is_ordinary_text() {
    let mut stream = b"data: ".to_vec();
    stream.extend_from_slice(&BOM);
    stream.extend_from_slice(b"x\n\n");

    let events = decode_chunks(&[&stream]);

    assert_eq!(events[0].data, "\u{feff}x");
}

#[test]
fn test_bom_only_at_start_of_attempt() {
    let mut decoder = SseDecoder::new();
    assert_eq!(decoder.push(b"data: a\n\n").count(), 1);

    let mut later = BOM.to_vec();
    later.extend_from_slice(b"data: b\n\n");
    let events: Vec<_> = decoder.push(&later).collect();

    // the BOM prefixes the field name, which is then not "data"
    assert!(events.is_empty());
}

#[test]
fn test_invalid_utf8_is_replaced() {
    let events = decode_chunks(&[b"data: \xff\xfe ok\n\n"]);

    assert_eq!(events[0].data, "\u{fffd}\u{fffd} ok");
}

#[test]
fn test_every_two_way_split_matches_single_chunk() {
    let mut stream = BOM.to_vec();
    stream.extend_from_slice(
        b"retry: 2500\r\nid: 1\r\nevent: tick\r\ndata: one\r\ndata:two\r\n\r\n\
          : keepalive\n\
          data: three\r\rid\ndata\n\n\
          event: x\ndata: y:z\n\n",
    );

    let mut whole = SseDecoder::new();
    let expected: Vec<_> = whole.push(&stream).collect();
    assert_eq!(expected.len(), 4);
    assert_eq!(whole.take_retry(), Some(2500));

    for split in 0..=stream.len() {
        let (head, tail) = stream.split_at(split);
        let mut decoder = SseDecoder::new();
        let mut events: Vec<_> = decoder.push(head).collect();
        events.extend(decoder.push(tail));
        assert_eq!(events, expected, "split at byte {split}");
        assert_eq!(decoder.take_retry(), Some(2500), "split at byte {split}");
        assert_eq!(decoder.last_event_id(), "", "split at byte {split}");
    }
}

#[test]
fn test_byte_at_a_time_matches_single_chunk() {
    let stream = b"\xEF\xBB\xBFevent: a\r\ndata: 1\r\n\r\ndata: 2\r\r: c\ndata: 3\n\n";

    let expected = decode_chunks(&[stream]);
    let singles: Vec<&[u8]> = stream.chunks(1).collect();
    let events = decode_chunks(&singles);

    assert_eq!(events, expected);
    assert_eq!(
        events.iter().map(|e| e.data.as_str()).collect::<Vec<_>>(),
        vec!["1", "2", "3"]
    );
    assert_eq!(events[0].event, "a");
}
