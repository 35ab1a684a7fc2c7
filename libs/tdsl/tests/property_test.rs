//! Property-based tests using QuickCheck

use quickcheck::{Arbitrary, Gen, QuickCheck};
use tconf_dsl::{build_tree, flat_tree, read, ConfigMap, ConfigWriter, Value};

const KEYS: &[&str] = &[
    "admins",
    "c2s",
    "sess-man",
    "max-queue-size",
    "5222",
    "x-gy+=x",
    "dataSource",
    "repo-uri",
    "ports",
    "level",
];

const STRING_CHARS: &[char] = &[
    'a', 'b', 'z', 'Q', '0', '7', ' ', '-', '_', '/', '.', ':', '#', '=', ',', '[', ']', '{',
    '}', '(', ')', '"', '*', '+',
];

/// Configuration tree without beans and without empty nested maps.
#[derive(Debug, Clone)]
struct Tree(ConfigMap);

fn arbitrary_string(g: &mut Gen) -> String {
    let len = usize::arbitrary(g) % 12;
    (0..len)
        .map(|_| *g.choose(STRING_CHARS).unwrap_or(&'a'))
        .collect()
}

fn arbitrary_scalar(g: &mut Gen) -> Value {
    match u8::arbitrary(g) % 8 {
        0 => Value::Null,
        1 => Value::Bool(bool::arbitrary(g)),
        2 => Value::Int(i32::arbitrary(g)),
        3 => Value::Long(i64::arbitrary(g)),
        4 => Value::Double(f64::from(i32::arbitrary(g)) / 64.0),
        5 => Value::Float(f32::from(i16::arbitrary(g)) / 8.0),
        _ => Value::Str(arbitrary_string(g)),
    }
}

fn arbitrary_value(g: &mut Gen, depth: usize) -> Value {
    let choice = u8::arbitrary(g) % 10;
    if depth == 0 || choice < 6 {
        return arbitrary_scalar(g);
    }
    if choice < 8 {
        let len = usize::arbitrary(g) % 8;
        let items = (0..len)
            .map(|_| {
                if depth > 1 && bool::arbitrary(g) && bool::arbitrary(g) {
                    Value::Map(arbitrary_map(g, depth - 1))
                } else {
                    arbitrary_scalar(g)
                }
            })
            .collect();
        return Value::List(items);
    }
    Value::Map(arbitrary_map(g, depth - 1))
}

fn arbitrary_map(g: &mut Gen, depth: usize) -> ConfigMap {
    let len = 1 + usize::arbitrary(g) % 5;
    let mut map = ConfigMap::new();
    for _ in 0..len {
        let key = g.choose(KEYS).copied().unwrap_or("key");
        map.insert(key.to_string(), arbitrary_value(g, depth));
    }
    map
}

impl Arbitrary for Tree {
    fn arbitrary(g: &mut Gen) -> Self {
        Tree(arbitrary_map(g, 3))
    }
}

/// Property: reading a written tree gives the same tree back
#[test]
fn prop_write_then_read_is_identity() {
    fn prop(tree: Tree) -> bool {
        let text = match ConfigWriter::new().write(&tree.0) {
            Ok(text) => text,
            Err(_) => return false,
        };
        match read(&text) {
            Ok(parsed) => parsed == tree.0,
            Err(e) => {
                eprintln!("{e}\n{text}");
                false
            }
        }
    }

    QuickCheck::new()
        .tests(200)
        .quickcheck(prop as fn(Tree) -> bool);
}

/// Property: building a tree from its flat form gives the same tree back
#[test]
fn prop_build_inverts_flat() {
    fn prop(tree: Tree) -> bool {
        build_tree(&flat_tree(&tree.0)) == tree.0
    }

    QuickCheck::new()
        .tests(200)
        .quickcheck(prop as fn(Tree) -> bool);
}

#[test]
fn written_text_is_stable() {
    let mut g = Gen::new(10);
    for _ in 0..50 {
        let tree = Tree::arbitrary(&mut g);
        let first = ConfigWriter::new().write(&tree.0).unwrap();
        let second = ConfigWriter::new()
            .write(&read(&first).unwrap())
            .unwrap();
        assert_eq!(first, second);
    }
}
