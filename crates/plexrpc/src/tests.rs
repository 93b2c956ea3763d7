//! Codec tests: field layout, payload safety, defensive classification.

use serde_json::{Value, json};

use crate::correlate::Correlation;
use crate::listing::{Listing, ListingNode};
use crate::message::{
    CallEncoder, ErrEncoder, ExitEncoder, Frame, InitEncoder, LsEncoder, ResEncoder, split_fields,
};

fn corr() -> Correlation {
    Correlation::echo("0", "")
}

#[test]
fn test_ls_layout() {
    let body = LsEncoder::new().encode();
    let fields = split_fields(&body);
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0], "ls");
}

#[test]
fn test_init_layout() {
    let mut listing = Listing::new();
    listing.insert("add", ListingNode::Arity(2));
    let json = listing.to_json().unwrap();

    let body = InitEncoder::new(corr(), &json).encode();
    assert_eq!(body, "init\n0\n\n{\"add\":2}");
}

#[test]
fn test_listing_handles_nested_scopes() {
    let mut inner = Listing::new();
    inner.insert("bar", ListingNode::Arity(0));
    inner.insert("baz", ListingNode::Arity(1));
    let mut listing = Listing::new();
    listing.insert("add", ListingNode::Arity(2));
    listing.insert("foo", ListingNode::Scope(inner));

    let json = listing.to_json().unwrap();
    assert!(json.contains("bar"));

    let parsed = Listing::from_json(&json).unwrap();
    assert_eq!(parsed, listing);
    assert_eq!(
        parsed.paths(),
        vec![
            ("add".to_string(), 2),
            ("foo.bar".to_string(), 0),
            ("foo.baz".to_string(), 1),
        ]
    );
}

#[test]
fn test_call_fields_survive_embedded_newline() {
    let hello = "hello\nworld";
    let args = vec![json!(1), json!(hello)];
    let body = CallEncoder::new("foo", &args, None).encode();

    let fields = split_fields(&body);
    let parsed: Vec<Value> = serde_json::from_str(&fields[4]).unwrap();
    assert_eq!(parsed[1], json!(hello));
}

#[test]
fn test_call_roundtrip_with_implicits() {
    let args = vec![json!(2), json!(3)];
    let body = CallEncoder::new("foo.bar", &args, Some("{\"user\":\"u1\"}")).encode();

    let fields = split_fields(&body);
    match Frame::parse(&fields).unwrap() {
        Frame::Call {
            path,
            args,
            implicits,
            ..
        } => {
            assert_eq!(path, "foo.bar");
            assert_eq!(args, "[2,3]");
            assert_eq!(implicits, Some("{\"user\":\"u1\"}"));
        }
        other => panic!("Expected Call frame, got {:?}", other),
    }
}

#[test]
fn test_call_without_implicits_has_empty_trailing_field() {
    let args = vec![json!(1)];
    let body = CallEncoder::new("p", &args, None).encode();

    let fields = split_fields(&body);
    assert_eq!(fields.len(), 6);
    assert_eq!(fields[5], "");

    match Frame::parse(&fields).unwrap() {
        Frame::Call { implicits, .. } => assert_eq!(implicits, None),
        other => panic!("Expected Call frame, got {:?}", other),
    }
}

#[test]
fn test_res_roundtrip() {
    let value = json!({"total": 10});
    let body = ResEncoder::new(corr(), &value).encode();

    let fields = split_fields(&body);
    match Frame::parse(&fields).unwrap() {
        Frame::Res { payload, .. } => {
            let parsed: Value = serde_json::from_str(payload).unwrap();
            assert_eq!(parsed, value);
        }
        other => panic!("Expected Res frame, got {:?}", other),
    }
}

#[test]
fn test_err_message_roundtrip() {
    let body = ErrEncoder::encode_message(corr(), "BOOM");

    let fields = split_fields(&body);
    match Frame::parse(&fields).unwrap() {
        Frame::Err { payload, .. } => assert_eq!(payload, "\"BOOM\""),
        other => panic!("Expected Err frame, got {:?}", other),
    }
}

// Regression: exit responses must carry the exit kind for every argument
// shape, never err.
#[test]
fn test_exit_always_emits_exit_kind() {
    let reason = json!("maintenance");
    for correlation in [corr(), Correlation::next()] {
        let body = ExitEncoder::new(correlation, &reason).encode();
        let fields = split_fields(&body);
        assert_eq!(fields[0], "exit");
        match Frame::parse(&fields).unwrap() {
            Frame::Exit { reason, .. } => assert_eq!(reason, Some("\"maintenance\"")),
            other => panic!("Expected Exit frame, got {:?}", other),
        }
    }
}

#[test]
fn test_exit_frame_without_reason() {
    let fields = split_fields("exit\n0\nabc");
    match Frame::parse(&fields).unwrap() {
        Frame::Exit { reason, .. } => assert_eq!(reason, None),
        other => panic!("Expected Exit frame, got {:?}", other),
    }
}

#[test]
fn test_correlation_echoed_through_frames() {
    let correlation = Correlation::next();
    let value = json!(true);
    let body = ResEncoder::new(correlation.clone(), &value).encode();

    let fields = split_fields(&body);
    let frame = Frame::parse(&fields).unwrap();
    assert_eq!(frame.correlation(), correlation);
}

#[test]
fn test_unknown_kind_is_rejected_not_panicked() {
    let fields = split_fields("booya");
    assert!(Frame::parse(&fields).is_err());

    let fields = split_fields("res\n0");
    assert!(Frame::parse(&fields).is_err());
}

#[test]
fn test_split_fields_is_total() {
    assert_eq!(split_fields(""), vec![String::new()]);
    assert_eq!(split_fields("a\n\nb"), vec!["a", "", "b"]);
}
