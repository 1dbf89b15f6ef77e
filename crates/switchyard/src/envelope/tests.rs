//! Unit tests for the envelope codec.

use rstest::rstest;
use serde_json::{Value, json};

use super::*;

fn decode_json(value: &Value) -> Result<Envelope, EnvelopeError> {
    Envelope::decode(value.to_string().as_bytes())
}

#[test]
fn decodes_request_with_positional_params() {
    let envelope = Envelope::decode(br#"{"jsonrpc":"2.0","id":"1","method":"add","params":[1,2]}"#)
        .expect("decode request");
    assert_eq!(
        envelope,
        Envelope::Request(Request::new(
            "1",
            "add",
            Params::Positional(vec![json!(1), json!(2)])
        ))
    );
}

#[test]
fn decodes_notification_with_absent_params_as_empty_map() {
    let envelope =
        Envelope::decode(br#"{"jsonrpc":"2.0","method":"ping"}"#).expect("decode notification");
    let Envelope::Notification(notification) = envelope else {
        panic!("expected a notification");
    };
    assert_eq!(notification.method, "ping");
    assert_eq!(notification.params, Params::default());
    assert!(notification.params.is_empty());
}

#[test]
fn explicit_null_id_is_still_a_request() {
    let envelope = decode_json(&json!({"jsonrpc": "2.0", "id": null, "method": "ping"}))
        .expect("decode");
    assert_eq!(envelope.id(), Some(&RequestId::Null));
    assert_eq!(envelope.kind(), "request");
}

#[test]
fn decodes_error_response() {
    let envelope = decode_json(&json!({
        "jsonrpc": "2.0",
        "id": 7,
        "error": {"code": -32000, "message": "quota exceeded", "data": {"limit": 3}}
    }))
    .expect("decode error response");
    let Envelope::ErrorResponse(response) = envelope else {
        panic!("expected an error response");
    };
    assert_eq!(response.id, RequestId::from(7_i64));
    assert_eq!(response.error.code, -32000);
    assert_eq!(response.error.message, "quota exceeded");
    assert_eq!(response.error.data, Some(json!({"limit": 3})));
}

#[test]
fn tolerates_trailing_newline() {
    let envelope = Envelope::decode(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\n  ")
        .expect("decode with whitespace");
    assert_eq!(envelope.method(), Some("ping"));
}

#[rstest]
#[case::empty(b"".as_slice())]
#[case::whitespace(b"  \n".as_slice())]
#[case::garbage(b"not json".as_slice())]
#[case::truncated(br#"{"jsonrpc":"2.0","#.as_slice())]
fn rejects_non_json_as_parse_error(#[case] payload: &[u8]) {
    let error = Envelope::decode(payload).expect_err("should fail");
    assert!(matches!(error, EnvelopeError::Parse { .. }), "{error:?}");
    assert_eq!(error.standard_error().code(), -32700);
}

#[rstest]
#[case::scalar(json!(42))]
#[case::batch(json!([{"jsonrpc": "2.0", "method": "ping"}]))]
#[case::missing_version(json!({"method": "ping"}))]
#[case::wrong_version(json!({"jsonrpc": "1.0", "method": "ping"}))]
#[case::numeric_method(json!({"jsonrpc": "2.0", "id": 1, "method": 5}))]
#[case::scalar_params(json!({"jsonrpc": "2.0", "id": 1, "method": "add", "params": 3}))]
#[case::object_id(json!({"jsonrpc": "2.0", "id": {}, "method": "add"}))]
#[case::result_and_error(json!({"jsonrpc": "2.0", "id": 1, "result": 1, "error": {"code": 1, "message": "x"}}))]
#[case::neither(json!({"jsonrpc": "2.0", "id": 1}))]
#[case::response_without_id(json!({"jsonrpc": "2.0", "result": 1}))]
#[case::error_without_code(json!({"jsonrpc": "2.0", "id": 1, "error": {"message": "x"}}))]
#[case::error_without_message(json!({"jsonrpc": "2.0", "id": 1, "error": {"code": 1}}))]
fn rejects_malformed_shapes_as_invalid(#[case] value: Value) {
    let error = decode_json(&value).expect_err("should fail");
    assert!(matches!(error, EnvelopeError::Invalid { .. }), "{error:?}");
    assert_eq!(error.standard_error(), StandardError::InvalidRequest);
}

#[test]
fn encodes_response_with_members_in_protocol_order() {
    let bytes = encode_response(&RequestId::from("1"), &json!(3));
    assert_eq!(
        String::from_utf8(bytes).expect("utf8"),
        r#"{"jsonrpc":"2.0","id":"1","result":3}"#
    );
}

#[test]
fn encodes_null_result_explicitly() {
    let bytes = encode_response(&RequestId::from(4_i64), &Value::Null);
    let value: Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(value, json!({"jsonrpc": "2.0", "id": 4, "result": null}));
}

#[test]
fn encodes_error_without_data() {
    let bytes = encode_error(&RequestId::Null, -32601, "Method not found", None);
    assert_eq!(
        String::from_utf8(bytes).expect("utf8"),
        r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32601,"message":"Method not found"}}"#
    );
}

#[test]
fn response_round_trip_is_stable() {
    let id = RequestId::from("abc");
    let result = json!({"nested": [1, "two", null], "flag": true});
    let first = Envelope::decode(&encode_response(&id, &result)).expect("first decode");
    let Envelope::Response(first_response) = &first else {
        panic!("expected a response");
    };
    let second = Envelope::decode(&encode_response(&id, &first_response.result))
        .expect("second decode");
    assert_eq!(first, second);
    assert_eq!(first_response.result, result);
}

#[test]
fn request_encoding_decodes_back() {
    let request = Request::new(9_i64, "wordy_add", Params::Positional(vec![json!(1), json!(2)]));
    let decoded = Envelope::decode(&request.encode()).expect("decode");
    assert_eq!(decoded, Envelope::Request(request));
}

#[test]
fn notification_encoding_omits_id() {
    let notification = Notification::new("ping", Params::default());
    let value: Value = serde_json::from_slice(&notification.encode()).expect("json");
    assert_eq!(value, json!({"jsonrpc": "2.0", "method": "ping", "params": {}}));
}

#[test]
fn error_data_carries_exception_and_traceback() {
    assert_eq!(
        error_data(Some("ValueError"), Some("line 1")),
        json!({"exception": "ValueError", "traceback": "line 1"})
    );
    assert_eq!(error_data(None, None), json!({"exception": null}));
}

#[rstest]
#[case::positional(Params::Positional(vec![json!(2), json!("x")]))]
#[case::named(Params::Named(serde_json::Map::from_iter([
    ("a".to_owned(), json!(2)),
    ("b".to_owned(), json!("x")),
])))]
fn binds_arguments_by_position_or_name(#[case] params: Params) {
    assert_eq!(params.require::<i64>(0, "a").expect("a"), 2);
    assert_eq!(params.require::<String>(1, "b").expect("b"), "x");
    assert_eq!(params.optional::<i64>(2, "c").expect("c"), None);
}

#[test]
fn reports_missing_and_mistyped_arguments() {
    let params = Params::Positional(vec![json!("nope")]);
    assert!(matches!(
        params.require::<i64>(0, "a"),
        Err(ParamsError::Type { .. })
    ));
    assert!(matches!(
        params.require::<i64>(1, "b"),
        Err(ParamsError::Missing { position: 1, .. })
    ));
}

#[test]
fn parses_named_params_into_struct() {
    #[derive(serde::Deserialize)]
    struct Pair {
        x: i64,
        y: i64,
    }

    let params = Params::Named(serde_json::Map::from_iter([
        ("x".to_owned(), json!(4)),
        ("y".to_owned(), json!(5)),
    ]));
    let pair: Pair = params.parse().expect("parse pair");
    assert_eq!(pair.x + pair.y, 9);
    let tuple: (i64, i64) = Params::Positional(vec![json!(1), json!(2)])
        .parse()
        .expect("parse tuple");
    assert_eq!(tuple, (1, 2));
}
