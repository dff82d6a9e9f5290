//! Matcher-rule coverage through the stub front-end.
//!
//! The stub synthesises declaration attributes the tree-sitter front-end
//! never produces (system macros, invalid locations, unnameable
//! declarations), so every edge of the rule catalogue can be pinned down.

use symscan::analysis::analyse;
use symscan::parser::stub::{StubDecl, StubTranslationUnit};

#[test]
fn test_usage_without_binding_is_dropped() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    // Externally linked: no rename pattern ever sets a binding.
    let external = tu.add_decl(
        StubDecl::function("api")
            .external()
            .in_main_file()
            .globalish()
            .definition()
            .at(1, 6),
    );
    tu.add_reference(3, 10, external);

    let analysis = analyse(&tu);
    assert!(analysis.renames.replacements().is_empty());
}

#[test]
fn test_reference_outside_main_file_is_dropped() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    let local = tu.add_decl(
        StubDecl::function("helper")
            .in_main_file()
            .globalish()
            .definition()
            .at(1, 13),
    );
    tu.add_reference_in("/other.h", 5, 1, local);

    let analysis = analyse(&tu);
    // Only the declaration's own position remains.
    let positions: Vec<_> = analysis.renames.replacements().into_keys().collect();
    assert_eq!(positions.len(), 1);
    assert_eq!((positions[0].line, positions[0].col), (1, 13));
}

#[test]
fn test_invalid_reference_location_is_dropped() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    let local = tu.add_decl(
        StubDecl::variable("state")
            .in_main_file()
            .globalish()
            .definition()
            .at(1, 12),
    );
    tu.add_invalid_reference(local);

    let analysis = analyse(&tu);
    assert_eq!(analysis.renames.replacements().len(), 1);
}

#[test]
fn test_reference_to_inline_method_is_not_rewritten() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    let method = tu.add_decl(
        StubDecl::function("x")
            .external()
            .in_main_file()
            .inline_fn()
            .method()
            .definition()
            .at(2, 12),
    );
    tu.add_reference(5, 20, method);

    let analysis = analyse(&tu);
    assert!(analysis.renames.replacements().is_empty());
}

#[test]
fn test_type_usage_prefers_typedef_target() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    let typedef = tu.add_decl(
        StubDecl::typedef_name("Alias")
            .in_main_file()
            .globalish()
            .definition()
            .at(1, 13),
    );
    let record = tu.add_decl(
        StubDecl::record("Shape")
            .in_main_file()
            .globalish()
            .definition()
            .at(2, 8),
    );
    tu.add_type_usage(4, 1, Some(typedef), Some(record));

    let analysis = analyse(&tu);
    let replacements = analysis.renames.replacements();
    let usage = replacements
        .iter()
        .find(|(location, _)| location.line == 4)
        .map(|(_, pair)| pair.clone())
        .expect("type usage recorded");
    assert_eq!(usage.0, "Alias");
}

#[test]
fn test_type_usage_falls_back_to_record_target() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    // The typedef target fails the re-match (declared in a header).
    let foreign_typedef = tu.add_decl(
        StubDecl::typedef_name("Alias")
            .in_file("/h.h")
            .globalish()
            .definition()
            .at(1, 13),
    );
    let record = tu.add_decl(
        StubDecl::record("Shape")
            .in_main_file()
            .globalish()
            .definition()
            .at(2, 8),
    );
    tu.add_type_usage(4, 1, Some(foreign_typedef), Some(record));

    let analysis = analyse(&tu);
    let replacements = analysis.renames.replacements();
    let usage = replacements
        .iter()
        .find(|(location, _)| location.line == 4)
        .map(|(_, pair)| pair.clone())
        .expect("type usage recorded");
    assert_eq!(usage.0, "Shape");
}

#[test]
fn test_implements_skips_system_macro_location() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    let previous = tu.add_decl(
        StubDecl::function("f")
            .external()
            .in_file("/h.h")
            .globalish()
            .in_system_macro()
            .at(3, 1),
    );
    tu.add_decl(
        StubDecl::function("f")
            .external()
            .in_main_file()
            .globalish()
            .definition()
            .at(9, 1)
            .previous(previous),
    );

    let analysis = analyse(&tu);
    assert!(analysis.implements.entries().is_empty());
}

#[test]
fn test_implements_synthesises_unnameable_symbol() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    let previous = tu.add_decl(
        StubDecl::unnamed_function("")
            .external()
            .in_file("/h.h")
            .globalish()
            .at(7, 3),
    );
    tu.add_decl(
        StubDecl::unnamed_function("")
            .external()
            .in_main_file()
            .globalish()
            .definition()
            .at(9, 1)
            .previous(previous),
    );

    let analysis = analyse(&tu);
    let symbols: Vec<_> = analysis.implements.entries()["/h.h"].iter().cloned().collect();
    assert_eq!(symbols, vec!["unnameable_decl_at__7_3"]);
}

#[test]
fn test_implements_uses_printable_name_for_operators() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    let previous = tu.add_decl(
        StubDecl::unnamed_function("operator+")
            .external()
            .in_file("/h.h")
            .globalish()
            .at(2, 1),
    );
    tu.add_decl(
        StubDecl::unnamed_function("operator+")
            .external()
            .in_main_file()
            .globalish()
            .definition()
            .at(4, 1)
            .previous(previous),
    );

    let analysis = analyse(&tu);
    let symbols: Vec<_> = analysis.implements.entries()["/h.h"].iter().cloned().collect();
    assert_eq!(symbols, vec!["operator+"]);
}

#[test]
fn test_symbol_table_skips_system_header_locations() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    tu.add_decl(
        StubDecl::function("sysfun")
            .external()
            .in_file("/usr/include/sys.h")
            .globalish()
            .in_system_header()
            .at(40, 1),
    );

    let analysis = analyse(&tu);
    assert!(analysis.symbols.known_files().is_empty());
}

#[test]
fn test_symbol_table_skips_member_definitions() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    tu.add_decl(
        StubDecl::function("x")
            .external()
            .in_main_file()
            .globalish()
            .method()
            .definition()
            .at(2, 1),
    );
    tu.add_decl(
        StubDecl::variable("data")
            .external()
            .in_main_file()
            .globalish()
            .field()
            .definition()
            .at(3, 1),
    );

    let analysis = analyse(&tu);
    assert!(analysis.symbols.definitions_in("/main.cpp").is_empty());
}

#[test]
fn test_forward_suppression_needs_both_in_main_file() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    // Forward in a header, definition in the main file: kept.
    let fwd = tu.add_decl(
        StubDecl::function("g")
            .external()
            .in_file("/common.h")
            .globalish()
            .at(3, 1),
    );
    let def = tu.add_decl(
        StubDecl::function("g")
            .external()
            .in_main_file()
            .globalish()
            .definition()
            .at(8, 1)
            .previous(fwd),
    );
    tu.link_definition(fwd, def);

    let analysis = analyse(&tu);
    let forwards = analysis.symbols.forward_declarations_in("/common.h");
    assert_eq!(forwards.len(), 1);
    assert_eq!(forwards[0].symbol, "g");
}

#[test]
fn test_record_span_is_recorded() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    tu.add_decl(
        StubDecl::record("Config")
            .external()
            .in_main_file()
            .globalish()
            .definition()
            .at(3, 8)
            .spanning((3, 1), (10, 2)),
    );

    let analysis = analyse(&tu);
    let definitions = analysis.symbols.definitions_in("/main.cpp");
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].begin, (3, 1));
    assert_eq!(definitions[0].end, (10, 2));
}

#[test]
fn test_declaration_without_location_still_binds() {
    let mut tu = StubTranslationUnit::new("/main.cpp");
    let ghost = tu.add_decl(
        StubDecl::variable("phantom")
            .in_main_file()
            .globalish()
            .definition()
            .without_locations(),
    );
    tu.add_reference(6, 2, ghost);

    let analysis = analyse(&tu);
    let replacements = analysis.renames.replacements();
    assert_eq!(replacements.len(), 1);
    let location = replacements.keys().next().unwrap();
    assert_eq!((location.line, location.col), (6, 2));
}
