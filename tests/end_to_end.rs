//! End-to-end tests: a real server loop and client over TCP and Unix sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use routewire::{
    Client, ClientMiddleware, Endpoint, Error, Fault, IntrospectionMiddleware, Map, Method,
    MethodHandle, MethodResult, MethodTable, Middleware, Params, PreAction, Registry, Request,
    RetryPolicy, Server, ServerBuilder, Service, StaticExtension, Value,
};
use tokio::task::JoinHandle;

struct Calculator;

impl Calculator {
    fn add(&self, _: &Request, params: Params<'_>) -> MethodResult {
        Ok(Value::Int(params.i64(0, "a")? + params.i64(1, "b")?))
    }

    fn div(&self, _: &Request, params: Params<'_>) -> MethodResult {
        let a = params.i64(0, "a")?;
        let b = params.i64(1, "b")?;
        if b == 0 {
            return Err(Fault::zero_division("integer division or modulo by zero"));
        }
        Ok(Value::Int(a / b))
    }
}

impl Service for Calculator {
    fn method_table() -> MethodTable<Self> {
        MethodTable::new()
            .documented("add", "Add two integers.", Calculator::add)
            .method("div", Calculator::div)
    }
}

fn builder() -> ServerBuilder {
    Server::builder()
        .documented("", "echo", "Return the argument unchanged.", |_, params| {
            params.required(0, "s").cloned()
        })
        .route_method("greet", "hello", |_, params| {
            let name = params.str_or(0, "name", "world")?;
            let punct = params.str_or(1, "punct", "!")?;
            Ok(Value::from(format!("hello {name}{punct}")))
        })
        .service("math", Calculator)
        .route_method("math.deep", "ping", |_, _| Ok(Value::from("pong")))
}

async fn spawn(builder: ServerBuilder, endpoint: &str) -> (Endpoint, JoinHandle<routewire::Result<()>>) {
    let server = builder.bind(endpoint).await.unwrap();
    let bound = server.endpoints()[0].clone();
    (bound, tokio::spawn(server.run()))
}

async fn tcp_server(builder: ServerBuilder) -> (String, JoinHandle<routewire::Result<()>>) {
    let (bound, task) = spawn(builder, "tcp://127.0.0.1:0").await;
    (bound.to_string(), task)
}

fn kwargs(pairs: &[(&str, Value)]) -> Map {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_echo_and_unknown_method() {
    let (endpoint, task) = tcp_server(builder()).await;
    let mut client = Client::new(&endpoint).unwrap();

    let reply = client
        .call("", "echo", vec![Value::from("hi")], Map::new())
        .await
        .unwrap();
    assert_eq!(reply, Value::from("hi"));

    let err = client.call("", "nope", Vec::new(), Map::new()).await.unwrap_err();
    assert!(err.is_remote());
    let fault = err.remote().unwrap();
    assert_eq!(fault.kind(), "KeyError");
    assert_eq!(fault.message(), "No such method: nope");

    task.abort();
}

#[tokio::test]
async fn test_routes_and_kwargs() {
    let (endpoint, task) = tcp_server(builder()).await;
    let mut client = Client::new(&endpoint).unwrap();

    let mut greet = client.route("greet");
    assert_eq!(
        greet.call("hello", Vec::new(), Map::new()).await.unwrap(),
        Value::from("hello world!")
    );
    assert_eq!(
        greet
            .call(
                "hello",
                vec![Value::from("ada")],
                kwargs(&[("punct", Value::from("?"))])
            )
            .await
            .unwrap(),
        Value::from("hello ada?")
    );

    let reply = client
        .route("math")
        .route("deep")
        .call("ping", Vec::new(), Map::new())
        .await
        .unwrap();
    assert_eq!(reply, Value::from("pong"));

    let err = client
        .route("math.missing")
        .call("ping", Vec::new(), Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.remote().unwrap().message(), "No such route: math.missing");

    task.abort();
}

#[tokio::test]
async fn test_remote_division_by_zero() {
    let (endpoint, task) = tcp_server(builder()).await;
    let mut client = Client::new(&endpoint).unwrap();
    let mut math = client.route("math");

    assert_eq!(
        math.call("add", vec![Value::Int(2), Value::Int(40)], Map::new())
            .await
            .unwrap(),
        Value::Int(42)
    );

    match math.call("div", vec![Value::Int(1), Value::Int(0)], Map::new()).await {
        Err(Error::Remote(fault)) => {
            assert_eq!(fault.kind(), "ZeroDivisionError");
            assert_eq!(fault.message(), "integer division or modulo by zero");
        }
        other => panic!("expected a remote fault, got {other:?}"),
    }

    task.abort();
}

#[tokio::test]
async fn test_introspection() {
    let (endpoint, task) = tcp_server(builder().middleware(IntrospectionMiddleware)).await;
    let mut client = Client::new(&endpoint).unwrap();

    assert_eq!(client.dir().await.unwrap(), vec!["echo"]);
    assert_eq!(client.routes().await.unwrap(), vec!["greet", "math"]);
    assert_eq!(
        client.doc("echo").await.unwrap().as_deref(),
        Some("Return the argument unchanged.")
    );

    let mut math = client.route("math");
    assert_eq!(math.dir().await.unwrap(), vec!["add", "div"]);
    assert_eq!(math.routes().await.unwrap(), vec!["deep"]);
    assert_eq!(math.doc("add").await.unwrap().as_deref(), Some("Add two integers."));
    assert_eq!(math.doc("div").await.unwrap(), None);

    task.abort();
}

#[cfg(unix)]
#[tokio::test]
async fn test_lazy_client_against_unreachable_endpoint() {
    let endpoint = Endpoint::random_ipc().to_string();
    let mut client = Client::lazy(&endpoint, RetryPolicy::new(1, Duration::ZERO)).unwrap();

    let err = client.call("", "echo", Vec::new(), Map::new()).await.unwrap_err();
    assert!(matches!(err, Error::ServerUnavailable { attempts: 1 }));
    assert!(!err.is_remote());
}

#[tokio::test]
async fn test_lazy_client_against_live_server() {
    let (endpoint, task) = tcp_server(builder()).await;
    let mut client = Client::builder(endpoint)
        .retries(3)
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    for i in 0..3 {
        let reply = client
            .call("", "echo", vec![Value::Int(i)], Map::new())
            .await
            .unwrap();
        assert_eq!(reply, Value::Int(i));
    }

    task.abort();
}

#[cfg(unix)]
#[tokio::test]
async fn test_lazy_client_survives_server_restart() {
    let endpoint = Endpoint::random_ipc();
    let (_, first) = spawn(builder(), &endpoint.to_string()).await;

    let mut client = Client::lazy(
        &endpoint.to_string(),
        RetryPolicy::new(20, Duration::from_millis(100)),
    )
    .unwrap();
    assert_eq!(
        client
            .call("", "echo", vec![Value::from("one")], Map::new())
            .await
            .unwrap(),
        Value::from("one")
    );

    first.abort();
    let _ = first.await;
    // Let the aborted acceptor drop its listener and socket file.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (_, second) = spawn(builder(), &endpoint.to_string()).await;
    assert_eq!(
        client
            .call("", "echo", vec![Value::from("two")], Map::new())
            .await
            .unwrap(),
        Value::from("two")
    );

    second.abort();
}

/// Server middleware echoing the `t` extension back as the result.
struct TokenEcho;

impl Middleware for TokenEcho {
    fn pre(&self, request: &mut Request, _: Option<&MethodHandle>, _: &Registry) -> PreAction {
        match request.extension("t") {
            Some(token) => PreAction::Respond(token.clone()),
            None => PreAction::Continue,
        }
    }
}

/// Client middleware upper-casing string results.
struct Shout;

impl ClientMiddleware for Shout {
    fn post(&self, _: &Request, response: &mut Value) -> routewire::Result<()> {
        if let Value::Map(map) = response {
            if let Some(Value::String(s)) = map.get_mut("r") {
                *s = s.to_uppercase();
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_client_middleware_round_trip() {
    let (endpoint, task) = tcp_server(builder().middleware(TokenEcho)).await;
    let mut client = Client::builder(endpoint)
        .middleware(StaticExtension::new("t", "token-123"))
        .middleware(Shout)
        .build()
        .unwrap();

    let reply = client
        .call("", "echo", vec![Value::from("ignored")], Map::new())
        .await
        .unwrap();
    assert_eq!(reply, Value::from("TOKEN-123"));

    task.abort();
}

struct Cached;

impl Middleware for Cached {
    fn pre(&self, _: &mut Request, _: Option<&MethodHandle>, _: &Registry) -> PreAction {
        PreAction::Respond(Value::from("cached"))
    }
}

#[tokio::test]
async fn test_short_circuit_never_invokes_method() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let builder = Server::builder()
        .method("expensive", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from("computed"))
        })
        .middleware(Cached);

    let (endpoint, task) = tcp_server(builder).await;
    let mut client = Client::new(&endpoint).unwrap();

    let reply = client.call("", "expensive", Vec::new(), Map::new()).await.unwrap();
    assert_eq!(reply, Value::from("cached"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    task.abort();
}

/// Documented fallback bound when lookup fails.
struct Fallback;

impl Method for Fallback {
    fn call(&self, request: &Request, _: Params<'_>) -> MethodResult {
        Ok(Value::from(format!("fallback:{}", request.method)))
    }

    fn doc(&self) -> Option<&str> {
        Some("Answers any unknown method.")
    }
}

struct Substitute;

impl Middleware for Substitute {
    fn pre(&self, _: &mut Request, method: Option<&MethodHandle>, _: &Registry) -> PreAction {
        match method {
            Some(_) => PreAction::Continue,
            None => PreAction::UseMethod(MethodHandle::new("fallback", Fallback)),
        }
    }
}

#[tokio::test]
async fn test_method_substitution() {
    let (endpoint, task) = tcp_server(builder().middleware(Substitute)).await;
    let mut client = Client::new(&endpoint).unwrap();

    let reply = client.call("", "missing", Vec::new(), Map::new()).await.unwrap();
    assert_eq!(reply, Value::from("fallback:missing"));

    let reply = client
        .call("", "echo", vec![Value::from("real")], Map::new())
        .await
        .unwrap();
    assert_eq!(reply, Value::from("real"));

    task.abort();
}

#[tokio::test]
async fn test_value_round_trip_through_server() {
    let (endpoint, task) = tcp_server(builder()).await;
    let mut client = Client::new(&endpoint).unwrap();

    let mut nested = Map::new();
    nested.insert("ünïcode".into(), Value::from("✓"));
    nested.insert("list".into(), Value::Array(vec![Value::Nil, Value::Bool(true)]));
    let values = vec![
        Value::Nil,
        Value::Bool(false),
        Value::Int(i64::MIN),
        Value::UInt(u64::MAX),
        Value::Float(-1.5),
        Value::from("naïve"),
        Value::binary(vec![0u8, 1, 254, 255]),
        Value::Map(nested),
    ];

    for value in values {
        let reply = client
            .call("", "echo", vec![value.clone()], Map::new())
            .await
            .unwrap();
        assert_eq!(reply, value);
        assert_eq!(reply.type_name(), value.type_name());
    }

    task.abort();
}

#[cfg(unix)]
#[tokio::test]
async fn test_multiple_endpoints_share_one_server() {
    let ipc = Endpoint::random_ipc().to_string();
    let server = builder()
        .bind_all(&["tcp://127.0.0.1:0", ipc.as_str()])
        .await
        .unwrap();
    let tcp = server.endpoints()[0].to_string();
    let task = tokio::spawn(server.run());

    for endpoint in [tcp, ipc] {
        let mut client = Client::new(&endpoint).unwrap();
        let reply = client
            .call("", "echo", vec![Value::from(endpoint.as_str())], Map::new())
            .await
            .unwrap();
        assert_eq!(reply, Value::from(endpoint.as_str()));
    }

    task.abort();
}
