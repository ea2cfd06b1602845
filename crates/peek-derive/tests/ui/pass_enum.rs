use peek::{Inspectable, Inspector, Registry, Value};

#[derive(Inspectable)]
#[inspect(name = "app::Shape")]
enum Shape {
    Circle { radius: f64 },
    Rect(u32, u32),
    Empty,
}

fn main() {
    assert_eq!(Shape::Circle { radius: 1.5 }.fields().len(), 1);
    assert_eq!(Shape::Rect(2, 3).fields()[1].name, "1");
    assert!(Shape::Empty.fields().is_empty());
    assert_eq!(Shape::Empty.class_name(), "app::Shape");

    let registry = Registry::new();
    let value = Value::object(Shape::Rect(2, 3));
    let entity = Inspector::new(&registry).inspect(&value);
    let entity = entity.as_entity().unwrap();
    assert_eq!(
        entity.get_meta("variant").and_then(|v| v.as_scalar()),
        Some(&peek::Scalar::Str("Rect".into()))
    );
}
