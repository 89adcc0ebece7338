//! Integration tests for routewire.
//!
//! These tests cross module boundaries without touching the network: frames
//! carrying envelopes, and envelopes driven through a dispatcher.

use routewire::codec::MsgPackCodec;
use routewire::protocol::envelope::unpack_envelope;
use routewire::protocol::{
    build_frame, decode_request, decode_response, encode_request, flags, FrameBuffer, Header,
    HEADER_SIZE,
};
use routewire::{
    Dispatcher, Fault, Map, Middleware, MiddlewareChain, PreAction, Registry, Request, Response,
    Value,
};

fn echo_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .add_method("", "echo", |_, params| params.required(0, "s").cloned())
        .unwrap();
    registry
}

/// Request envelope inside a request frame, reassembled from fragments.
#[test]
fn test_envelope_in_fragmented_frame() {
    let request = Request::new("abc", "a.b", "f")
        .with_args(vec![Value::from("héllo"), Value::binary(vec![0u8, 255])]);
    let payload = encode_request(&request).unwrap();
    let bytes = build_frame(&Header::request(7, payload.len() as u32), &payload);

    let mut buffer = FrameBuffer::new();
    let mut frames = Vec::new();
    for chunk in bytes.chunks(3) {
        frames.extend(buffer.push(chunk).unwrap());
    }

    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert_eq!(frame.sequence(), 7);
    assert!(!frame.is_reply());
    assert_eq!(decode_request(frame.payload()).unwrap(), request);
}

/// Several reply frames back to back keep their order and sequence numbers.
#[test]
fn test_multiple_reply_frames() {
    let mut stream = Vec::new();
    for i in 0..5u32 {
        let payload = MsgPackCodec::pack(&Value::from(i)).unwrap();
        stream.extend(build_frame(&Header::reply(i, payload.len() as u32), &payload));
    }

    let frames = FrameBuffer::new().push(&stream).unwrap();
    assert_eq!(frames.len(), 5);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.sequence(), i as u32);
        assert_eq!(frame.header.flags, flags::REPLY);
        assert_eq!(MsgPackCodec::unpack(frame.payload()).unwrap(), Value::from(i as u64));
    }
}

/// Oversized and corrupted headers are protocol errors.
#[test]
fn test_bad_headers_rejected() {
    let mut buffer = FrameBuffer::with_max_payload(16);
    let header = Header::request(1, 17).encode();
    assert!(buffer.push(&header).is_err());

    let mut header = Header::request(1, 0).encode();
    header[1] = 0x80;
    assert!(FrameBuffer::new().push(&header).is_err());

    let mut header = Header::request(1, 0).encode();
    header[0] = 9;
    assert!(FrameBuffer::new().push(&header).is_err());
    assert_eq!(header.len(), HEADER_SIZE);
}

/// `{i:"x", m:"echo", a:["hi"]}` answers `{r:"hi"}`.
#[test]
fn test_echo_envelope_bytes() {
    let dispatcher = Dispatcher::new(echo_registry());

    let mut map = Map::new();
    map.insert("i".into(), Value::from("x"));
    map.insert("m".into(), Value::from("echo"));
    map.insert("a".into(), Value::Array(vec![Value::from("hi")]));
    let request = MsgPackCodec::pack(&Value::Map(map)).unwrap();

    let reply = unpack_envelope(&dispatcher.handle_bytes(&request)).unwrap();
    let mut expected = Map::new();
    expected.insert("r".into(), Value::from("hi"));
    assert_eq!(reply, Value::Map(expected));
}

/// `{i:"y", m:"nope"}` answers `{e:"KeyError", e_msg:"No such method: nope"}`.
#[test]
fn test_unknown_method_envelope_bytes() {
    let dispatcher = Dispatcher::new(echo_registry());

    let mut map = Map::new();
    map.insert("i".into(), Value::from("y"));
    map.insert("m".into(), Value::from("nope"));
    let request = MsgPackCodec::pack(&Value::Map(map)).unwrap();

    let reply = unpack_envelope(&dispatcher.handle_bytes(&request)).unwrap();
    let mut expected = Map::new();
    expected.insert("e".into(), Value::from("KeyError"));
    expected.insert("e_msg".into(), Value::from("No such method: nope"));
    assert_eq!(reply, Value::Map(expected));
}

/// Extension fields reach middleware, which can refuse the request.
#[test]
fn test_extension_checked_by_middleware() {
    struct RequireToken;

    impl Middleware for RequireToken {
        fn pre(
            &self,
            request: &mut Request,
            _method: Option<&routewire::MethodHandle>,
            _registry: &Registry,
        ) -> PreAction {
            match request.extension("t").and_then(Value::as_str) {
                Some("secret") => PreAction::Continue,
                _ => PreAction::Fail(Fault::new("PermissionError", "bad token")),
            }
        }
    }

    let mut chain = MiddlewareChain::new();
    chain.push(RequireToken);
    let dispatcher = Dispatcher::with_middleware(echo_registry(), chain);

    let allowed = Request::new("1", "", "echo")
        .with_args(vec![Value::from("ok")])
        .with_extension("t", "secret");
    let reply = dispatcher.handle_bytes(&encode_request(&allowed).unwrap());
    assert_eq!(decode_response(&reply).unwrap(), Response::Success(Value::from("ok")));

    let denied = Request::new("2", "", "echo").with_args(vec![Value::from("ok")]);
    let reply = dispatcher.handle_bytes(&encode_request(&denied).unwrap());
    assert_eq!(
        decode_response(&reply).unwrap(),
        Response::error("PermissionError", "bad token")
    );
}

/// Argument binding errors are TypeErrors.
#[test]
fn test_argument_errors() {
    let dispatcher = Dispatcher::new(echo_registry());

    let missing = dispatcher.handle_request(Request::new("1", "", "echo"));
    assert_eq!(
        missing,
        Response::error("TypeError", "missing required argument: 's'")
    );

    let mut kwargs = Map::new();
    kwargs.insert("s".into(), Value::from("kw"));
    let by_name = dispatcher.handle_request(Request::new("2", "", "echo").with_kwargs(kwargs));
    assert_eq!(by_name, Response::Success(Value::from("kw")));
}
