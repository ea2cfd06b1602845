use peek::{Describe, Inspectable, Visibility};

#[derive(Inspectable)]
#[inspect(parent = "app::Model", implements = "app::Named")]
pub struct User {
    pub name: String,
    pub(crate) email: String,
    #[inspect(skip)]
    password: String,
    #[inspect(rename = "type", visibility = "public")]
    kind: u8,
}

#[derive(Inspectable)]
struct Pair(i32, #[inspect(skip)] i32);

#[derive(Inspectable)]
struct Marker;

fn main() {
    let user = User {
        name: "ada".into(),
        email: "ada@example.com".into(),
        password: "hunter2".into(),
        kind: 1,
    };
    let fields = user.fields();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[1].visibility, Visibility::Protected);
    assert_eq!(fields[2].name, "type");
    assert_eq!(fields[2].visibility, Visibility::Public);
    assert_eq!(user.parent_classes(), vec!["app::Model".to_owned()]);
    assert!(user.class_name().ends_with("::User"));
    assert_eq!(user.password.len(), 7);

    let info = User::class_info();
    assert_eq!(info.fields.len(), 3);
    assert_eq!(info.interfaces, vec!["app::Named".to_owned()]);

    assert_eq!(Pair(1, 2).fields().len(), 1);
    assert!(Marker.fields().is_empty());
}
