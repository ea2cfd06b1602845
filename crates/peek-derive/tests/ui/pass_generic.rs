use peek::Inspectable;

#[derive(Inspectable)]
pub struct Wrapper<T> {
    pub inner: T,
    pub items: Vec<T>,
}

#[derive(Inspectable)]
#[inspect(opaque)]
pub struct Handle {
    fd: std::fs::File,
}

fn main() {
    let wrapper = Wrapper {
        inner: 1_u32,
        items: vec![2, 3],
    };
    assert_eq!(wrapper.fields().len(), 2);

    fn assert_inspectable<T: Inspectable>() {}
    assert_inspectable::<Handle>();
}
