use bytes::Bytes;
use structbind::{
    codec::{
        shape, this, Array, BitsInteger, Const, Construct, ConstructExt, Defaulted, Enum, Flag,
        If, Int, Kind, PrefixedArray, RawBytes,
    },
    materialize, materialize_dyn, struct_of, to_struct, Binding, Container, Declared, EnumValue,
    Enumeration, Error, FieldDefault, FromMaterialized, Lookup, Record, RecordOptions, Registry,
    Serializable, Source, Value,
};
use structbind_macros::test_traced;

#[derive(Record, Debug, Clone, PartialEq)]
struct Point {
    #[field(codec = Int::u8())]
    x: u8,
    #[field(codec = Int::u8())]
    y: u8,
}

#[derive(Enumeration, Clone, Copy, Debug, PartialEq, Eq)]
enum Orientation {
    None = 0,
    Horizontal = 1,
    Vertical = 2,
}

#[derive(Record, Debug, PartialEq)]
struct Header {
    #[field(codec = Const::bytes(b"BMP"))]
    signature: [u8; 3],
    #[field(enumeration = Orientation, codec = Int::u8())]
    orientation: EnumValue<Orientation>,
}

#[derive(Record, Debug, PartialEq)]
struct Image {
    #[field(record)]
    header: Header,
    #[field(codec = Int::u8())]
    width: u8,
    #[field(codec = Int::u8())]
    height: u8,
}

#[test_traced]
fn test_point_round_trip() {
    let point = Point::parse(&[0, 1]).unwrap();
    assert_eq!(point, Point { x: 0, y: 1 });
    assert_eq!(&point.build().unwrap()[..], &[0, 1]);

    let again = Point::parse(&Point { x: 200, y: 7 }.build().unwrap()).unwrap();
    assert_eq!(again, Point { x: 200, y: 7 });
}

#[test_traced]
fn test_image_with_nested_header() {
    let data = b"BMP\x02\x03\x02";
    let image = Image::parse(data).unwrap();
    assert_eq!(image.header.signature, *b"BMP");
    assert_eq!(
        image.header.orientation,
        EnumValue::Member(Orientation::Vertical)
    );
    assert_eq!((image.width, image.height), (3, 2));
    assert_eq!(&image.build().unwrap()[..], &data[..]);

    // The header is compiled in place, not referenced.
    let tree = Image::structure().unwrap();
    let shape = shape(tree.as_ref());
    assert_eq!(shape.names(), vec!["header", "width", "height"]);
    assert_eq!(shape.child("header").unwrap().kind, Kind::Struct);
}

#[test_traced]
fn test_bad_signature() {
    let result = Image::parse(b"PNG\x00\x01\x01");
    assert!(matches!(result, Err(Error::Codec(_))));
}

#[test_traced]
fn test_typed_materialize_is_identity() {
    let point = Point { x: 4, y: 5 };
    assert_eq!(
        materialize(Source::Typed(point.clone())).unwrap(),
        Some(point)
    );
    assert_eq!(materialize::<Point>(Source::Absent).unwrap(), None);
    assert_eq!(
        materialize::<Point>(Source::Generic(Value::None)).unwrap(),
        None
    );
}

#[test_traced]
fn test_generic_materialize() {
    let value: Container = [("x", Value::Int(1)), ("y", Value::Int(2))]
        .into_iter()
        .collect();
    let point = materialize::<Point>(Source::Generic(Value::Map(value.clone()))).unwrap();
    assert_eq!(point, Some(Point { x: 1, y: 2 }));

    let erased = materialize_dyn(Value::Map(value), &Point::declared_type()).unwrap();
    assert_eq!(
        Point::from_materialized(erased).unwrap(),
        Point { x: 1, y: 2 }
    );

    assert!(matches!(
        materialize::<Point>(Source::Generic(Value::Int(3))),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        materialize_dyn(Value::Int(3), &u8::declared_type()),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test_traced]
fn test_encode_generic_map() {
    let binding = Point::parser().unwrap();
    let value: Container = [("x", Value::Int(9)), ("y", Value::Int(8))]
        .into_iter()
        .collect();
    assert_eq!(&binding.build_generic(Value::Map(value)).unwrap()[..], &[9, 8]);
    assert!(matches!(
        binding.build_generic(Value::Int(1)),
        Err(Error::TypeMismatch { .. })
    ));

    let missing: Container = [("x", Value::Int(9))].into_iter().collect();
    assert!(matches!(
        binding.build_generic(Value::Map(missing)),
        Err(Error::Codec(structbind::codec::Error::MissingValue(_)))
    ));
}

#[derive(Enumeration, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    A,
    B,
}

#[derive(Record, Debug, PartialEq)]
struct Tagged {
    #[field(enumeration = Mode, codec = Int::u8())]
    mode: EnumValue<Mode>,
    #[field(enumeration = Mode, codec = Int::u8())]
    raw: Value,
}

#[derive(Record, Debug, PartialEq)]
struct Strict {
    #[field(enumeration = Mode, codec = Int::u8())]
    mode: Mode,
}

#[test_traced("TRACE")]
fn test_unknown_enumeration_value() {
    let tagged = Tagged::parse(&[2, 2]).unwrap();
    assert_eq!(tagged.mode, EnumValue::Unknown(2));
    assert_eq!(tagged.raw, Value::Int(2));
    assert_eq!(&tagged.build().unwrap()[..], &[2, 2]);

    let known = Tagged::parse(&[1, 0]).unwrap();
    assert_eq!(known.mode, EnumValue::Member(Mode::B));
    assert!(matches!(known.raw, Value::Enum(ref e) if e.value == 0));

    assert_eq!(Strict::parse(&[1]).unwrap().mode, Mode::B);
    assert!(matches!(Strict::parse(&[2]), Err(Error::TypeMismatch { .. })));
    assert_eq!(&Strict { mode: Mode::A }.build().unwrap()[..], &[0]);
}

#[test]
fn test_enumeration_members() {
    assert_eq!(Mode::MEMBERS, &[("A", 0i128), ("B", 1i128)][..]);
    assert_eq!(Orientation::from_value(2), Some(Orientation::Vertical));
    assert_eq!(Orientation::from_value(3), None);
    assert_eq!(Orientation::None.name(), "None");
    assert_eq!(Orientation::Horizontal.value(), 1);
}

#[derive(Record, Debug, PartialEq)]
struct InnerStruct {
    #[field(codec = Int::u8())]
    value: u8,
}

#[derive(Record, Debug, PartialEq)]
struct OuterStruct {
    #[field(codec = Int::u8())]
    count: u8,
    #[field(nested = InnerStruct, codec = Array::new(this("count"), struct_of::<InnerStruct>()))]
    items: Vec<InnerStruct>,
}

#[test_traced]
fn test_array_of_records() {
    let outer = OuterStruct::parse(&[3, 10, 20, 30]).unwrap();
    assert_eq!(outer.count, 3);
    assert_eq!(
        outer.items,
        vec![
            InnerStruct { value: 10 },
            InnerStruct { value: 20 },
            InnerStruct { value: 30 },
        ]
    );
    assert_eq!(&outer.build().unwrap()[..], &[3, 10, 20, 30]);

    let empty = OuterStruct::parse(&[0]).unwrap();
    assert!(empty.items.is_empty());
}

#[derive(Enumeration, Clone, Copy, Debug, PartialEq, Eq)]
enum Feature {
    Compressed = 1,
    Encrypted = 2,
    Signed = 4,
}

#[derive(Record, Debug, PartialEq)]
struct Capabilities {
    #[field(codec = PrefixedArray::new(
        Int::u8(),
        Enum::new(Int::u8(), Feature::MEMBERS.iter().copied()),
    ))]
    features: Vec<Feature>,
}

#[test_traced]
fn test_list_of_enumerations() {
    let caps = Capabilities::parse(&[2, 4, 1]).unwrap();
    assert_eq!(caps.features, vec![Feature::Signed, Feature::Compressed]);
    assert_eq!(&caps.build().unwrap()[..], &[2, 4, 1]);
}

#[derive(Record, Debug, PartialEq)]
struct Node {
    #[field(codec = Flag)]
    has_next: bool,
    #[field(codec = Int::u8())]
    value: u8,
    #[field(nested = Node, codec = If::new(this("has_next"), struct_of::<Node>()))]
    next: Option<Box<Node>>,
}

#[test_traced]
fn test_linked_records() {
    let data = [1, 5, 1, 6, 0, 7];
    let head = Node::parse(&data).unwrap();
    assert_eq!(head.value, 5);
    let second = head.next.as_deref().unwrap();
    assert_eq!(second.value, 6);
    let third = second.next.as_deref().unwrap();
    assert_eq!(third.value, 7);
    assert!(third.next.is_none());
    assert_eq!(&head.build().unwrap()[..], &data[..]);
}

#[derive(Record, Debug)]
struct Tree {
    #[field(codec = Int::u8())]
    value: u8,
    #[field(record = Tree)]
    child: Option<Box<Tree>>,
}

#[test_traced]
fn test_depth_bounded_expansion() {
    let bounded = to_struct::<Tree>(&RecordOptions::new().depth(1)).unwrap();
    let outer = shape(bounded.as_ref());
    assert_eq!(outer.nesting(Kind::Struct), 2);
    let inner = outer.child("child").unwrap();
    assert_eq!(inner.kind, Kind::Struct);
    assert_eq!(inner.child("child").unwrap().kind, Kind::Reference);

    let deeper = to_struct::<Tree>(&RecordOptions::new().depth(3)).unwrap();
    assert_eq!(shape(deeper.as_ref()).nesting(Kind::Struct), 4);

    // Without a bound, expansion stops at the first cycle.
    let unbounded = to_struct::<Tree>(&RecordOptions::new()).unwrap();
    let unbounded = shape(unbounded.as_ref());
    assert_eq!(unbounded.nesting(Kind::Struct), 1);
    assert_eq!(unbounded.child("child").unwrap().kind, Kind::Reference);
}

#[derive(Record, Debug)]
struct UsesParser {
    #[field(codec = Int::u8())]
    parser: u8,
}

#[derive(Record, Debug)]
struct UsesStruct {
    #[field(codec = Int::u8())]
    r#struct: u8,
}

#[test_traced]
fn test_reserved_field_names() {
    let registry = Registry::new();
    assert!(matches!(
        registry.register::<UsesParser>(),
        Err(Error::NameCollision { ref name, record: "UsesParser" }) if name == "parser"
    ));
    assert!(matches!(
        registry.register::<UsesStruct>(),
        Err(Error::NameCollision { ref name, record: "UsesStruct" }) if name == "struct"
    ));
    assert!(matches!(
        UsesStruct::parse(&[1]),
        Err(Error::NameCollision { .. })
    ));

    // The raw tree itself is unaffected.
    let tree = to_struct::<UsesStruct>(&RecordOptions::new()).unwrap();
    assert_eq!(shape(tree.as_ref()).names(), vec!["struct"]);
}

#[derive(Record, Debug, PartialEq)]
#[record(union = "raw")]
struct Word {
    #[field(codec = Int::u16_be())]
    raw: u16,
    #[field(codec = RawBytes::new(2))]
    bytes: Bytes,
    #[field(codec = Int::u8())]
    high: u8,
}

#[test_traced]
fn test_union_record() {
    let binding = Word::parser().unwrap();
    let mut stream = structbind::codec::Stream::new(&[0x12, 0x34, 0xff]);
    let word = binding
        .decode(&mut stream, &structbind::codec::Context::new())
        .unwrap();
    assert_eq!(word.raw, 0x1234);
    assert_eq!(&word.bytes[..], &[0x12, 0x34]);
    assert_eq!(word.high, 0x12);
    assert_eq!(stream.tell(), 2);

    // Only the first present alternative is written.
    assert_eq!(&word.build().unwrap()[..], &[0x12, 0x34]);
    let only_high: Container = [("high", Value::Int(9))].into_iter().collect();
    assert_eq!(&binding.build_generic(Value::Map(only_high)).unwrap()[..], &[9]);
    assert!(matches!(
        binding.build_generic(Value::Map(Container::new())),
        Err(Error::Codec(structbind::codec::Error::NoUnionAlternative))
    ));
}

#[test_traced]
fn test_compile_is_repeatable() {
    let trees = [
        (to_struct::<Image>(&Image::options()), to_struct::<Image>(&Image::options())),
        (
            to_struct::<Tree>(&RecordOptions::new().depth(2)),
            to_struct::<Tree>(&RecordOptions::new().depth(2)),
        ),
        (to_struct::<Word>(&Word::options()), to_struct::<Word>(&Word::options())),
    ];
    for (first, second) in trees {
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(shape(first.as_ref()), shape(second.as_ref()));
    }
    assert_eq!(Word::structure().unwrap().kind(), Kind::Union);
}

#[derive(Record, Debug, PartialEq)]
#[record(aligned = 4)]
struct Padded {
    #[field(codec = Int::u8())]
    a: u8,
    #[field(codec = Int::u16_be())]
    b: u16,
}

#[test_traced]
fn test_aligned_record() {
    let data = [1, 0, 0, 0, 0, 2, 0, 0];
    let padded = Padded::parse(&data).unwrap();
    assert_eq!(padded, Padded { a: 1, b: 2 });
    assert_eq!(&padded.build().unwrap()[..], &data[..]);
    assert_eq!(Padded::structure().unwrap().kind(), Kind::AlignedStruct);
}

#[derive(Record, Debug, PartialEq)]
#[record(bitwise)]
struct Nibbles {
    #[field(codec = BitsInteger::nibble())]
    high: u8,
    #[field(codec = BitsInteger::bit())]
    flag: u8,
    #[field(codec = BitsInteger::new(3, false))]
    low: u8,
}

#[test_traced]
fn test_bitwise_record() {
    let nibbles = Nibbles::parse(&[0xab, 0xff]).unwrap();
    assert_eq!(
        nibbles,
        Nibbles {
            high: 0xa,
            flag: 1,
            low: 3
        }
    );
    assert_eq!(&nibbles.build().unwrap()[..], &[0xab]);
    assert!(matches!(
        Nibbles {
            high: 16,
            flag: 0,
            low: 0
        }
        .build(),
        Err(Error::Codec(_))
    ));
}

#[derive(Record, Debug, PartialEq)]
#[record(reverse)]
struct Swapped {
    #[field(codec = Int::u8())]
    first: u8,
    #[field(codec = Int::u8())]
    second: u8,
}

#[test_traced]
fn test_reverse_record() {
    let swapped = Swapped::parse(&[1, 2]).unwrap();
    assert_eq!(swapped, Swapped { first: 2, second: 1 });
    assert_eq!(&swapped.build().unwrap()[..], &[1, 2]);
}

#[derive(Record, Debug)]
#[record(container)]
struct Settings {
    #[field(codec = Int::u16_le())]
    port: u16,
    #[field(codec = Flag)]
    verbose: bool,
}

#[test_traced]
fn test_container_lookup() {
    let settings = Settings::parse(&[0x90, 0x1f, 1]).unwrap();
    assert_eq!(settings.lookup("port"), Some(Value::Int(8080)));
    assert_eq!(settings.lookup("verbose"), Some(Value::Bool(true)));
    assert_eq!(settings.lookup("missing"), None);
    assert!(Settings::options().container);
}

#[derive(Record, Debug, PartialEq)]
struct Annotated {
    #[field(
        codec = Int::u16_le(),
        doc = "width in pixels",
        meta(unit = "px", max = 4096)
    )]
    width: u16,
    #[field(codec = Defaulted::new(Int::u8(), 7u8))]
    version: u8,
    #[field(
        codec = Int::u8(),
        parsed = |value, _| Ok(Value::Int(value.to_int()? * 2))
    )]
    doubled: u16,
}

#[test_traced]
fn test_field_annotations() {
    let schema = Annotated::schema().unwrap();
    assert_eq!(
        schema.names().collect::<Vec<_>>(),
        vec!["width", "version", "doubled"]
    );

    let width = schema.field("width").unwrap();
    assert_eq!(width.doc(), Some("width in pixels"));
    assert_eq!(width.metadata().get("unit"), Some(&Value::from("px")));
    assert_eq!(width.metadata().get("max"), Some(&Value::Int(4096)));
    assert!(width.requires_value());

    let version = schema.field("version").unwrap();
    assert!(!version.requires_value());
    assert_eq!(version.default_value(), &FieldDefault::Value(Value::Int(7)));

    let annotated = Annotated::parse(&[0x20, 0x00, 3, 21]).unwrap();
    assert_eq!(annotated.width, 32);
    assert_eq!(annotated.version, 3);
    assert_eq!(annotated.doubled, 42);
}

#[test_traced]
fn test_explicit_options_binding() {
    let binding = Binding::<Point>::new(RecordOptions::new().reverse()).unwrap();
    assert_eq!(binding.parse(&[1, 2]).unwrap(), Point { x: 2, y: 1 });
    assert!(binding.options().reverse);

    // A binding embeds in other codecs and parses to the generic mapping.
    let parsed = Array::new(2, binding.embed())
        .parse_exact(&[1, 2, 3, 4])
        .unwrap();
    let items = parsed.as_list().unwrap();
    assert_eq!(items[0].as_map().unwrap().get("y"), Some(&Value::Int(1)));
}

#[test_traced]
fn test_registry_isolation() {
    let registry = Registry::new();
    assert!(!registry.contains::<Point>());
    let binding = registry
        .register_with::<Point>(RecordOptions::new().reverse())
        .unwrap();
    assert_eq!(binding.parse(&[1, 2]).unwrap(), Point { x: 2, y: 1 });
    assert_eq!(&binding.build(&Point { x: 2, y: 1 }).unwrap()[..], &[1, 2]);
    assert!(matches!(
        registry.register::<Point>(),
        Err(Error::AlreadyRegistered("Point"))
    ));
    // The global registry keeps its own binding.
    assert_eq!(Point::parse(&[1, 2]).unwrap(), Point { x: 1, y: 2 });
}
