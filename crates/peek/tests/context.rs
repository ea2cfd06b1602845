use std::sync::Arc;

use peek::{
    ClassInfo, Config, Context, ErrorObject, Format, HttpTransport, MemoryTransport, Registry,
    SentKind, Value,
};

fn config(format: Format) -> Config {
    Config {
        format,
        dump_trace: false,
        ..Config::default()
    }
}

#[test]
fn test_text_dump_layout() {
    let memory = MemoryTransport::new();
    let mut ctx = Context::new(config(Format::Text)).with_transport(memory.clone());

    ctx.dump(
        &[
            Value::list([Value::from("a"), Value::from("b"), Value::from("c")]),
            Value::assoc([
                (0, Value::from("a")),
                (2, Value::from("b")),
                (1, Value::from("c")),
            ]),
        ],
        0,
    )
    .unwrap();

    let body = &memory.bodies()[0];
    let (stats, entities) = body.split_once('\n').unwrap();
    assert!(stats.starts_with("Time: "));
    assert!(stats.ends_with("Entities: 2"));
    insta::assert_snapshot!(entities.trim_end(), @r#"
    array(3) #array-1 ["a", "b", "c"]
    array(3) #array-2 {
      0: "a"
      2: "b"
      1: "c"
    }
    "#);
}

#[test]
fn test_shared_registry() {
    let mut registry = Registry::new();
    registry.register_class(ClassInfo::interface("app::Named"));
    let registry = Arc::new(registry);

    let memory = MemoryTransport::new();
    let mut ctx = Context::new(config(Format::Text))
        .with_registry(Arc::clone(&registry))
        .with_transport(memory.clone());

    ctx.dump(&[Value::from("app::Named"), Value::from("app::Other")], 0)
        .unwrap();
    let body = &memory.bodies()[0];
    assert!(body.contains("interface app::Named #interface-1"));
    assert!(body.contains("\"app::Other\""));
    assert!(Arc::ptr_eq(ctx.registry(), &registry));
}

#[test]
fn test_html_dumps_are_isolated_until_error() {
    let memory = MemoryTransport::new();
    let mut ctx = Context::new(config(Format::Html)).with_transport(memory.clone());

    ctx.dump(&[Value::Int(1)], 0).unwrap();
    ctx.dump_error(ErrorObject::new("app::Failure", "it <broke>"))
        .unwrap();

    let sent = memory.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].kind, SentKind::Dump);
    assert!(sent[0].packet.body.starts_with("<iframe"));
    assert_eq!(sent[1].kind, SentKind::Error);
    assert!(sent[1].packet.body.starts_with("<!DOCTYPE html>"));
    assert!(sent[1].packet.body.contains("it &lt;broke&gt;"));
}

#[test]
fn test_http_transport_error_page() {
    let mut ctx = Context::new(config(Format::Html))
        .with_transport(HttpTransport::new(std::io::sink()));
    let packet = ctx
        .dump_error(ErrorObject::new("app::Failure", "boom"))
        .unwrap();
    assert_eq!(packet.content_type, "text/html; charset=utf-8");
}

#[test]
fn test_http_response_is_one_document() {
    let file = tempfile::NamedTempFile::new().unwrap();
    {
        let mut ctx = Context::new(config(Format::Html))
            .with_transport(HttpTransport::new(file.reopen().unwrap()));
        ctx.dump(&[Value::Int(1)], 0).unwrap();
        ctx.dump(&[Value::Int(2)], 0).unwrap();
        ctx.dump_error(ErrorObject::new("app::Failure", "boom"))
            .unwrap();
        ctx.finish().unwrap();
    }

    let out = std::fs::read_to_string(file.path()).unwrap();
    let (head, body) = out.split_once("\r\n\r\n").unwrap();
    assert!(head.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(head.contains("Cache-Control: no-cache, no-store, must-revalidate"));
    assert!(head.ends_with(&format!("Content-Length: {}", body.len())));

    assert!(body.starts_with("<!DOCTYPE html>"));
    assert_eq!(body.matches("<!DOCTYPE html>").count(), 1);
    assert_eq!(body.matches("<iframe").count(), 2);
    let iframes = body.find("<iframe").unwrap();
    assert!(body.find("<body>").unwrap() < iframes);
    assert!(iframes < body.find("</html>").unwrap());
}

#[test]
fn test_trace_is_captured() {
    let memory = MemoryTransport::new();
    let mut ctx = Context::new(Config {
        source_excerpts: false,
        ..Config::default()
    })
    .with_transport(memory.clone());

    let packet = ctx.dump(&[Value::Null], 0).unwrap();
    assert!(packet.body.contains("null"));
    // Backtraces can be unavailable; when present they render as a section.
    if packet.body.contains("stack:") {
        assert!(packet.body.contains("#0 "));
    }
}

#[test]
fn test_path_aliases_in_location() {
    let mut ctx = Context::new(config(Format::Text)).with_transport(MemoryTransport::new());
    ctx.add_alias("app", "/srv/app");
    assert_eq!(ctx.aliases().apply("/srv/app/src/lib.rs"), "app://src/lib.rs");
}
