use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use booter::bind::BindError;
use booter::config::parser::parse_expression;
use booter::{Bind, EvalContext, Value};

fn value(src: &str) -> Value {
    EvalContext::new()
        .eval(&parse_expression(src, "test.hcl").unwrap())
        .unwrap()
}

#[derive(Debug, Default, PartialEq, Bind)]
#[bind(rename_all = "kebab-case")]
enum Mode {
    #[default]
    Active,
    Standby,
    #[bind(rename = "off")]
    Disabled,
}

#[derive(Debug, Default, Bind)]
struct Upstream {
    host: String,
    port: u16,
    weight: Option<f64>,
}

#[derive(Debug, Bind)]
struct Remote {
    endpoint: url::Url,
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            endpoint: url::Url::parse("http://localhost/").unwrap(),
        }
    }
}

#[derive(Debug, Default, Bind)]
#[bind(rename_all = "camelCase")]
struct ServerConf {
    listen_addr: String,
    mode: Mode,
    read_timeout: Duration,
    upstreams: Vec<Upstream>,
    limits: HashMap<String, u32>,
    labels: BTreeMap<String, String>,
    remote: Option<Remote>,
    extra: Value,
    #[bind(skip)]
    runtime_only: usize,
    r#type: String,
}

#[test]
fn nested_structs_lists_and_maps_bind() {
    let mut conf = ServerConf {
        runtime_only: 7,
        ..Default::default()
    };
    conf.bind(
        "ServerConf",
        &value(
            r#"{
                listenAddr  = "0.0.0.0:8080"
                mode        = "standby"
                readTimeout = "5s"
                upstreams   = [
                    { host = "a", port = 1 },
                    { host = "b", port = "2", weight = 0.5 },
                ]
                limits      = { rps = 100 }
                labels      = { team = "core" }
                remote      = { endpoint = "https://example.org/api" }
                extra       = { anything = [1, true] }
                type        = "edge"
            }"#,
        ),
    )
    .unwrap();

    assert_eq!(conf.listen_addr, "0.0.0.0:8080");
    assert_eq!(conf.mode, Mode::Standby);
    assert_eq!(conf.read_timeout, Duration::from_secs(5));
    assert_eq!(conf.upstreams.len(), 2);
    assert_eq!(conf.upstreams[1].port, 2);
    assert_eq!(conf.upstreams[1].weight, Some(0.5));
    assert_eq!(conf.upstreams[0].weight, None);
    assert_eq!(conf.limits["rps"], 100);
    assert_eq!(conf.labels["team"], "core");
    assert_eq!(conf.remote.as_ref().map(|r| r.endpoint.path()), Some("/api"));
    assert_eq!(
        conf.extra.get("anything"),
        Some(&Value::List(vec![Value::int(1), Value::Bool(true)]))
    );
    assert_eq!(conf.runtime_only, 7);
    assert_eq!(conf.r#type, "edge");
}

#[test]
fn defaults_survive_for_missing_keys() {
    let mut conf = ServerConf {
        listen_addr: "127.0.0.1:1".into(),
        mode: Mode::Disabled,
        ..Default::default()
    };
    conf.bind("ServerConf", &value(r#"{ readTimeout = 10 }"#)).unwrap();
    assert_eq!(conf.listen_addr, "127.0.0.1:1");
    assert_eq!(conf.mode, Mode::Disabled);
    assert_eq!(conf.read_timeout, Duration::from_nanos(10));
}

#[test]
fn errors_report_the_full_path() {
    let mut conf = ServerConf::default();
    let err = conf
        .bind(
            "ServerConf",
            &value(r#"{ upstreams = [{ host = "a", port = 1 }, { host = "b", port = "x" }] }"#),
        )
        .unwrap_err();
    assert_eq!(err.path(), "ServerConf.upstreams[1].port");
    assert!(matches!(err, BindError::InvalidValue { .. }));

    let err = conf
        .bind("ServerConf", &value(r#"{ limits = { "burst" = true } }"#))
        .unwrap_err();
    assert_eq!(err.to_string(), r#"ServerConf.limits["burst"] should be uint"#);

    let err = conf
        .bind("ServerConf", &value(r#"{ runtimeOnly = 1 }"#))
        .unwrap_err();
    assert_eq!(err.to_string(), "runtimeOnly field not found in ServerConf");

    let err = conf.bind("ServerConf", &value(r#""flat""#)).unwrap_err();
    assert_eq!(err.to_string(), "ServerConf should be object as ServerConf");

    let err = conf
        .bind("ServerConf", &value(r#"{ upstreams = [1] }"#))
        .unwrap_err();
    assert_eq!(err.to_string(), "ServerConf.upstreams[0] should be object as Upstream");
}

#[test]
fn enums_bind_from_variant_names() {
    let mut mode = Mode::default();
    mode.bind("c.mode", &"off".into()).unwrap();
    assert_eq!(mode, Mode::Disabled);

    let err = mode.bind("c.mode", &"disabled".into()).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"c.mode, unknown variant "disabled", expected one of: active, standby, off"#
    );

    let err = mode.bind("c.mode", &Value::int(1)).unwrap_err();
    assert_eq!(err.to_string(), "c.mode should be string as Mode");
}

#[derive(Debug, Default, Bind)]
struct Marker;

#[test]
fn unit_structs_accept_only_empty_objects() {
    let mut marker = Marker;
    marker.bind("Marker", &value("{}")).unwrap();
    let err = marker.bind("Marker", &value("{ a = 1 }")).unwrap_err();
    assert!(matches!(err, BindError::UnknownField { ref field, .. } if field == "a"));
}

#[derive(Debug, Default, Bind)]
struct Wrapper<T> {
    inner: T,
}

#[test]
fn generic_structs_bind_through_their_parameter() {
    let mut w: Wrapper<Vec<i32>> = Wrapper::default();
    w.bind("Wrapper", &value("{ inner = [1, -2] }")).unwrap();
    assert_eq!(w.inner, vec![1, -2]);
}
