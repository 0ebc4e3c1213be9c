use smallcc::analyzer::{
    DataType, SymbolKind, SymbolTable, FIRST_PARAM_OFFSET, MAX_STORAGE_SIZE, PARAM_STRIDE,
};

#[test]
fn locals_grow_downward_in_8_byte_slots() {
    let mut table = SymbolTable::new();
    table.reset_frame();
    assert!(table.insert_variable("x", DataType::Int, None, Some("main")));
    assert!(table.insert_variable("c", DataType::Char, None, Some("main")));
    assert!(table.insert_variable("buf", DataType::Char, Some(10), Some("main")));
    assert!(table.insert_variable("arr", DataType::Int, Some(3), Some("main")));

    let offset = |name: &str| table.lookup(name, Some("main")).unwrap().offset;
    assert_eq!(offset("x"), -8);
    assert_eq!(offset("c"), -16);
    assert_eq!(offset("buf"), -32);
    assert_eq!(offset("arr"), -56);
    assert_eq!(table.current_offset(), -56);
    assert_eq!(table.frame_size("main"), 64);
}

#[test]
fn globals_take_no_frame_space() {
    let mut table = SymbolTable::new();
    assert!(table.insert_variable("g", DataType::Int, Some(100), None));
    assert_eq!(table.current_offset(), 0);

    let g = table.lookup("g", None).unwrap();
    assert!(g.is_global());
    assert_eq!(g.storage_size(), Some(800));
    assert_eq!(table.global_variables().count(), 1);
}

#[test]
fn frame_is_per_function() {
    let mut table = SymbolTable::new();
    table.reset_frame();
    table.insert_variable("a", DataType::Int, None, Some("f"));
    table.reset_frame();
    table.insert_variable("a", DataType::Int, None, Some("g"));
    table.insert_variable("b", DataType::Int, None, Some("g"));
    table.insert_variable("c", DataType::Int, None, Some("g"));

    assert_eq!(table.lookup("a", Some("f")).unwrap().offset, -8);
    assert_eq!(table.lookup("a", Some("g")).unwrap().offset, -8);
    assert_eq!(table.frame_size("f"), 16);
    assert_eq!(table.frame_size("g"), 32);
    assert_eq!(table.frame_size("missing"), 0);
}

#[test]
fn parameters_do_not_count_towards_frame() {
    let mut table = SymbolTable::new();
    table.reset_frame();
    for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
        let offset = FIRST_PARAM_OFFSET + PARAM_STRIDE * i as i64;
        assert!(table.insert_parameter(name, DataType::Int, offset, false, "f"));
    }
    assert!(table.insert_parameter("s", DataType::Char, 40, true, "f"));

    assert_eq!(table.lookup("a", Some("f")).unwrap().offset, 16);
    assert_eq!(table.lookup("c", Some("f")).unwrap().offset, 32);
    let s = table.lookup("s", Some("f")).unwrap();
    assert_eq!(s.kind, SymbolKind::Parameter);
    assert!(s.is_array);
    assert_eq!(s.array_size, None);
    assert_eq!(table.frame_size("f"), 0);
}

#[test]
fn duplicate_insert_is_rejected() {
    let mut table = SymbolTable::new();
    assert!(table.insert_variable("x", DataType::Int, None, None));
    assert!(!table.insert_variable("x", DataType::Char, None, None));
    assert_eq!(table.len(), 1);
    assert_eq!(table.lookup("x", None).unwrap().data_type, DataType::Int);

    table.reset_frame();
    assert!(table.insert_variable("y", DataType::Int, None, Some("main")));
    assert!(!table.insert_variable("y", DataType::Int, None, Some("main")));
    assert_eq!(table.len(), 2);
    // A rejected local must not consume a slot.
    assert_eq!(table.current_offset(), -8);

    assert!(table.insert_function("f", DataType::Int, 0, true, false));
    assert!(!table.insert_function("f", DataType::Int, 2, false, false));
    assert_eq!(table.lookup("f", None).unwrap().param_count(), Some(0));
}

#[test]
fn locals_shadow_globals() {
    let mut table = SymbolTable::new();
    table.insert_variable("x", DataType::Char, None, None);
    table.reset_frame();
    table.insert_variable("x", DataType::Int, None, Some("main"));

    let inside = table.lookup("x", Some("main")).unwrap();
    assert_eq!(inside.owner.as_deref(), Some("main"));
    assert_eq!(inside.data_type, DataType::Int);

    let outside = table.lookup("x", None).unwrap();
    assert!(outside.is_global());
    assert_eq!(outside.data_type, DataType::Char);

    let other = table.lookup("x", Some("other")).unwrap();
    assert!(other.is_global());

    assert!(table.lookup("y", Some("main")).is_none());
    assert!(table.lookup_in_scope("x", Some("other")).is_none());
}

#[test]
fn function_status() {
    let mut table = SymbolTable::new();
    table.insert_function("proto", DataType::Int, 1, false, false);
    table.insert_function("ext", DataType::Int, 1, false, true);
    table.insert_function("main", DataType::Int, 0, true, false);

    assert!(table.lookup("proto", None).unwrap().is_undefined_function());
    assert!(!table.lookup("ext", None).unwrap().is_undefined_function());
    assert!(!table.lookup("main", None).unwrap().is_undefined_function());

    table.mark_defined("proto");
    assert!(!table.lookup("proto", None).unwrap().is_undefined_function());
    assert_eq!(
        table.lookup("proto", None).unwrap().kind,
        SymbolKind::Function {
            param_count: 1,
            defined: true
        }
    );
}

#[test]
fn extern_variables_reserve_nothing() {
    let mut table = SymbolTable::new();
    table.insert_extern_variable("errno", DataType::Int, None);
    table.insert_variable("count", DataType::Int, None, None);

    let names: Vec<_> = table.global_variables().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["count"]);
    assert!(table.lookup("errno", None).unwrap().is_extern);
}

#[test]
fn dump_lists_every_entry() {
    let mut table = SymbolTable::new();
    table.insert_variable("g", DataType::Char, Some(4), None);
    table.insert_function("main", DataType::Int, 0, true, false);
    table.reset_frame();
    table.insert_variable("x", DataType::Int, None, Some("main"));

    let dump = table.to_string();
    let lines: Vec<_> = dump.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("Name"));
    assert!(lines[2].starts_with("g "));
    assert!(lines[2].contains("char"));
    assert!(lines[2].contains("<global>"));
    assert!(lines[3].contains("function"));
    assert!(lines[3].contains("0 args"));
    assert!(lines[4].contains("main"));
    assert!(lines[4].contains("-8"));
}

#[test]
fn oversized_storage_is_refused() {
    let mut table = SymbolTable::new();
    table.reset_frame();
    // 8 * 2^61 overflows usize.
    assert!(!table.insert_variable("a", DataType::Int, Some(1 << 61), Some("main")));
    assert!(!table.insert_variable("b", DataType::Int, Some(1_000_000_000), Some("main")));
    assert!(!table.insert_variable("g", DataType::Int, Some(1_000_000_000), None));
    assert!(table.is_empty());
    assert_eq!(table.current_offset(), 0);

    assert!(table.insert_variable("c", DataType::Char, Some(2_000_000_000), Some("main")));
    assert!(!table.insert_variable("d", DataType::Char, Some(2_000_000_000), Some("main")));
    assert_eq!(table.current_offset(), -2_000_000_000);
    assert_eq!(table.len(), 1);
}

#[test]
fn largest_frame_fits_imm32() {
    let mut table = SymbolTable::new();
    table.reset_frame();
    assert!(table.insert_variable("a", DataType::Char, Some(MAX_STORAGE_SIZE), Some("main")));
    assert!(!table.insert_variable("x", DataType::Char, None, Some("main")));
    assert_eq!(table.frame_size("main"), MAX_STORAGE_SIZE);
    assert!(table.frame_size("main") <= i32::MAX as usize);
}
