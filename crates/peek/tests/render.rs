use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use peek::{
    EntityValue, HtmlRenderer, Inspectable, Inspector, Registry, TextRenderer, Value,
    render_value,
};

#[derive(Inspectable)]
#[inspect(name = "app::User")]
pub struct User {
    pub name: String,
    pub(crate) email: String,
    password: String,
    #[inspect(skip)]
    session: u64,
}

#[derive(Inspectable)]
#[inspect(name = "app::Node")]
pub struct Node {
    pub name: String,
    pub next: RefCell<Option<Rc<Node>>>,
}

fn inspect(registry: &Registry, value: &Value) -> EntityValue {
    Inspector::new(registry).inspect(value)
}

fn text(value: &Value) -> String {
    let registry = Registry::with_defaults();
    render_value(&mut TextRenderer::default(), &inspect(&registry, value))
}

fn user() -> User {
    User {
        name: "ada".into(),
        email: "ada@example.com".into(),
        password: "hunter2".into(),
        session: 7,
    }
}

#[test]
fn test_object_visibility_prefixes() {
    insta::assert_snapshot!(text(&Value::object(user())), @r#"
    object app::User #object-1 {
      name: "ada"
      *email: "ada@example.com"
      !password: "hunter2"
    }
    "#);
}

#[test]
fn test_nested_array_inside_map() {
    let value = Value::assoc([
        ("id", Value::Int(7)),
        ("tags", Value::list([Value::from("a"), Value::from("b")])),
        ("ratio", Value::Float(1.0)),
    ]);
    insta::assert_snapshot!(text(&value), @r#"
    array(3) #array-1 {
      id: 7
      tags: array(2) #array-2 ["a", "b"]
      ratio: 1.0
    }
    "#);
}

#[test]
fn test_self_referential_object() {
    let node = Rc::new(Node {
        name: "a".into(),
        next: RefCell::new(None),
    });
    *node.next.borrow_mut() = Some(Rc::clone(&node));

    insta::assert_snapshot!(text(&Value::Object(node.clone())), @r#"
    object app::Node #object-1 {
      name: "a"
      next: ref app::Node #object-1
    }
    "#);

    node.next.borrow_mut().take();
}

#[test]
fn test_two_node_cycle() {
    let a = Rc::new(Node {
        name: "a".into(),
        next: RefCell::new(None),
    });
    let b = Rc::new(Node {
        name: "b".into(),
        next: RefCell::new(Some(Rc::clone(&a))),
    });
    *a.next.borrow_mut() = Some(Rc::clone(&b));

    let out = text(&Value::Object(a.clone()));
    assert!(out.contains("next: object app::Node #object-2 {"));
    assert!(out.contains("next: ref app::Node #object-1"));

    a.next.borrow_mut().take();
}

#[test]
fn test_registered_type_shows_definition() {
    let mut registry = Registry::new();
    registry.register_type::<User>();
    let entity = inspect(&registry, &Value::from("app::User"));
    let out = render_value(&mut TextRenderer::default(), &entity);

    assert!(out.starts_with("app::User = class app::User #class-1 {"));
    assert!(out.contains("defined in: "));
    assert!(out.contains("definition:"));
    assert!(out.contains("struct app::User {"));
    assert!(out.contains("pub(crate) email,"));
    assert!(!out.contains("session"));
}

#[test]
fn test_file_stream_resource() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(b"hello world").unwrap();
    let stream = peek::FileStream::open(tmp.path()).unwrap();

    let out = text(&Value::resource("stream", stream));
    assert!(out.starts_with("resource(stream) #resource-1 {"));
    assert!(out.contains("size: 11"));
    assert!(out.contains("file_type: \"file\""));
}

#[test]
fn test_html_escapes_user_data() {
    let registry = Registry::new();
    let value = Value::list([Value::from("<script>alert(1)</script>")]);
    let out = render_value(&mut HtmlRenderer::default(), &inspect(&registry, &value));

    assert!(!out.contains("<script>"));
    assert!(out.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
}

#[test]
fn test_control_characters_escaped() {
    assert_eq!(text(&Value::from("a\0b\x1bc")), r#""a\0b\ec""#);
    assert_eq!(text(&Value::from("\x07")), r#""\x07""#);
}
