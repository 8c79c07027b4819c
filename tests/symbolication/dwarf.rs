use crate::common::{dwarf_image, encode, foo_unit, DwarfUnit, PeBuilder};
use crashsym::{DwarfReader, PeImage, SymbolError};

fn reader(builder: &PeBuilder) -> DwarfReader {
    let pe = PeImage::from_bytes(builder.build()).unwrap();
    DwarfReader::load(&pe).unwrap().expect("image has DWARF")
}

const BASE: u64 = 0x40_0000;

#[test]
fn images_without_debug_info_have_no_reader() {
    let pe = PeImage::from_bytes(PeBuilder::pe32().text(0x100).build()).unwrap();
    assert!(DwarfReader::load(&pe).unwrap().is_none());
}

#[test]
fn functions_are_found_by_pc_range() {
    let reader = reader(&dwarf_image(PeBuilder::pe32()));

    let foo = reader.find_function(BASE + 0x1000).unwrap();
    assert_eq!(foo.name, "foo");
    assert_eq!(foo.start, BASE + 0x1000);
    assert_eq!(foo.displacement, 0);

    let foo = reader.find_function(BASE + 0x1004).unwrap();
    assert_eq!((foo.name.as_str(), foo.displacement), ("foo", 4));

    // Named through DW_AT_specification
    let bar = reader.find_function(BASE + 0x102f).unwrap();
    assert_eq!((bar.name.as_str(), bar.displacement), ("bar", 0x1f));
}

#[test]
fn addresses_outside_every_unit_are_not_found() {
    let reader = reader(&dwarf_image(PeBuilder::pe32()));
    assert!(matches!(reader.find_function(BASE + 0x1030), Err(SymbolError::NotFound)));
    assert!(matches!(reader.find_function(BASE + 0x0fff), Err(SymbolError::NotFound)));
    assert!(matches!(reader.find_line(BASE + 0x2000), Err(SymbolError::NotFound)));
}

#[test]
fn lines_follow_the_nearest_preceding_row() {
    let reader = reader(&dwarf_image(PeBuilder::pe32()));
    let line = |offset: u64| reader.find_line(BASE + offset).unwrap();

    let exact = line(0x1000);
    assert_eq!(exact.file, "/src/foo.c");
    assert_eq!((exact.line, exact.displacement), (10, 0));

    let between = line(0x1006);
    assert_eq!(between.line, 11);
    assert_eq!(between.address, BASE + 0x1004);
    assert_eq!(between.displacement, 2);

    assert_eq!(line(0x1008).line, 12);
    assert_eq!(line(0x1017).line, 20);
    // Last row covers up to the end of its sequence
    assert_eq!(line(0x102f).line, 21);
}

#[test]
fn units_missing_from_aranges_are_still_indexed() {
    let baz = DwarfUnit::new("baz.c", BASE + 0x1040, 0x10)
        .function("baz", BASE + 0x1040, 0x10)
        .sequence(&[(BASE + 0x1040, 5), (BASE + 0x1048, 7)], BASE + 0x1050)
        .without_arange();
    let sections = encode(&[foo_unit(BASE), baz], 4);
    let reader = reader(&PeBuilder::pe32().text(0x100).dwarf(&sections));

    assert_eq!(reader.aranges().len(), 2);
    let found = reader.find_function(BASE + 0x1044).unwrap();
    assert_eq!((found.name.as_str(), found.displacement), ("baz", 4));

    let line = reader.find_line(BASE + 0x1049).unwrap();
    assert_eq!((line.file.as_str(), line.line), ("/src/baz.c", 7));

    // The listed unit still resolves through its arange
    assert_eq!(reader.find_function(BASE + 0x1010).unwrap().name, "bar");
}

#[test]
fn index_is_built_without_any_aranges_section() {
    let sections = encode(&[foo_unit(BASE).without_arange()], 4);
    assert!(sections.aranges.is_none());
    let reader = reader(&PeBuilder::pe32().text(0x100).dwarf(&sections));

    assert_eq!(reader.aranges().len(), 1);
    assert_eq!(reader.find_function(BASE + 0x1004).unwrap().name, "foo");
}

#[test]
fn windows_directories_join_with_backslash() {
    let sections = encode(&[foo_unit(BASE).directory("C:\\work\\src")], 4);
    let reader = reader(&PeBuilder::pe32().text(0x100).dwarf(&sections));
    assert_eq!(reader.find_line(BASE + 0x1000).unwrap().file, "C:\\work\\src\\foo.c");
}

#[test]
fn pe32_plus_uses_eight_byte_addresses() {
    let base = 0x1_4000_0000;
    let reader = reader(&dwarf_image(PeBuilder::pe32_plus()));

    let found = reader.find_function(base + 0x1014).unwrap();
    assert_eq!((found.name.as_str(), found.displacement), ("bar", 4));
    assert_eq!(reader.find_line(base + 0x1014).unwrap().line, 20);
}

#[test]
fn address_class_high_pc_is_absolute() {
    let unit = DwarfUnit::new("abs.c", BASE + 0x1000, 0x40).absolute("abs", BASE + 0x1000, BASE + 0x1020);
    let reader = reader(&PeBuilder::pe32().text(0x100).dwarf(&encode(&[unit], 4)));

    let found = reader.find_function(BASE + 0x101f).unwrap();
    assert_eq!((found.name.as_str(), found.displacement), ("abs", 0x1f));
    // Inside the unit but past the function's absolute high_pc
    assert!(matches!(reader.find_function(BASE + 0x1020), Err(SymbolError::NotFound)));
}

#[test]
fn nameless_subprograms_are_reported_as_unknown() {
    let unit = DwarfUnit::new("anon.c", BASE + 0x1000, 0x10).nameless(BASE + 0x1000, 0x10);
    let reader = reader(&PeBuilder::pe32().text(0x100).dwarf(&encode(&[unit], 4)));

    let found = reader.find_function(BASE + 0x1008).unwrap();
    assert_eq!(found.name, "??");
    assert_eq!((found.start, found.displacement), (BASE + 0x1000, 8));
}

#[test]
fn split_functions_match_through_their_range_list() {
    let unit = DwarfUnit::new("split.c", BASE + 0x1000, 0x100)
        .ranged("split", &[(BASE + 0x1040, BASE + 0x1050), (BASE + 0x1000, BASE + 0x1010)]);
    let reader = reader(&PeBuilder::pe32().text(0x100).dwarf(&encode(&[unit], 4)));

    // The lowest range start is the entry point
    let cold = reader.find_function(BASE + 0x1044).unwrap();
    assert_eq!(cold.name, "split");
    assert_eq!((cold.start, cold.displacement), (BASE + 0x1000, 0x44));
    assert_eq!(reader.find_function(BASE + 0x100c).unwrap().displacement, 0xc);

    // The gap between the ranges belongs to no function
    assert!(matches!(reader.find_function(BASE + 0x1020), Err(SymbolError::NotFound)));
}

#[test]
fn units_are_indexed_from_their_range_lists() {
    let unit = DwarfUnit::new("hot.c", 0, 0)
        .code_ranges(&[(BASE + 0x2000, BASE + 0x2010), (BASE + 0x3000, BASE + 0x3010)])
        .function("hot", BASE + 0x3000, 0x10)
        .without_arange();
    let reader = reader(&PeBuilder::pe32().text(0x100).dwarf(&encode(&[unit], 4)));

    assert_eq!(reader.aranges().len(), 2);
    assert_eq!(reader.find_function(BASE + 0x3004).unwrap().name, "hot");
    assert!(matches!(reader.find_function(BASE + 0x2800), Err(SymbolError::NotFound)));
}

#[test]
fn unreadable_unit_ranges_leave_other_units_indexed() {
    let lost = DwarfUnit::new("lost.c", BASE + 0x1040, 0x10)
        .function("lost", BASE + 0x1040, 0x10)
        .dangling_ranges()
        .without_arange();
    let baz = DwarfUnit::new("baz.c", BASE + 0x1060, 0x10)
        .function("baz", BASE + 0x1060, 0x10)
        .without_arange();
    let sections = encode(&[foo_unit(BASE), lost, baz], 4);
    let reader = reader(&PeBuilder::pe32().text(0x100).dwarf(&sections));

    assert_eq!(reader.aranges().len(), 2);
    assert_eq!(reader.find_function(BASE + 0x1004).unwrap().name, "foo");
    assert_eq!(reader.find_function(BASE + 0x1064).unwrap().name, "baz");
    assert!(matches!(reader.find_function(BASE + 0x1044), Err(SymbolError::NotFound)));
}

#[test]
fn specifications_are_followed_across_units() {
    let types = DwarfUnit::new("types.c", BASE + 0x1000, 0x20)
        .declaration("Widget::draw")
        .declaration("helper")
        .defined_elsewhere("helper", BASE + 0x1000, 0x20);
    let widget = DwarfUnit::new("widget.c", BASE + 0x1040, 0x20).defined_elsewhere("Widget::draw", BASE + 0x1040, 0x20);
    let reader = reader(&PeBuilder::pe32().text(0x100).dwarf(&encode(&[types, widget], 4)));

    // DW_FORM_ref_addr into the defining unit itself
    assert_eq!(reader.find_function(BASE + 0x1004).unwrap().name, "helper");

    let draw = reader.find_function(BASE + 0x1048).unwrap();
    assert_eq!((draw.name.as_str(), draw.displacement), ("Widget::draw", 8));
}
