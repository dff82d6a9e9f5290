//! Symbol-table scenarios over the tree-sitter front-end.

use symscan::{execute_with_files, FileMap, TuAnalysis};

fn analyse(files: &[(&str, &str)], main: &str) -> TuAnalysis {
    let map: FileMap = files
        .iter()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect();
    execute_with_files(&map, main, &[]).expect("analysis should succeed")
}

fn symbols(records: &[symscan::SymbolRecord]) -> Vec<&str> {
    records.iter().map(|record| record.symbol.as_str()).collect()
}

#[test]
fn test_local_forward_declaration_is_suppressed() {
    let analysis = analyse(
        &[("/main.cpp", "int f();\nint f() { return 2; }\n")],
        "/main.cpp",
    );

    // Declared and defined in the same file: a coding convention, not an
    // inter-TU boundary.
    assert!(analysis
        .symbols
        .forward_declarations_in("/main.cpp")
        .is_empty());

    let definitions = analysis.symbols.definitions_in("/main.cpp");
    assert_eq!(symbols(definitions), vec!["f"]);
    assert_eq!(definitions[0].begin, (2, 1));
    assert_eq!(definitions[0].end, (2, 22));
}

#[test]
fn test_header_forward_declaration_is_kept() {
    let analysis = analyse(
        &[
            ("/main.cpp", "#include \"common.h\"\nvoid g() {}\n"),
            ("/common.h", "void g();\n"),
        ],
        "/main.cpp",
    );

    let forwards = analysis.symbols.forward_declarations_in("/common.h");
    assert_eq!(symbols(forwards), vec!["g"]);
    assert_eq!(forwards[0].begin, (1, 1));

    let definitions = analysis.symbols.definitions_in("/main.cpp");
    assert_eq!(symbols(definitions), vec!["g"]);

    let files: Vec<_> = analysis.symbols.known_files().into_iter().collect();
    assert_eq!(files, vec!["/common.h", "/main.cpp"]);
}

#[test]
fn test_record_forward_declaration_only() {
    let analysis = analyse(&[("/main.cpp", "struct Widget;\n")], "/main.cpp");

    let forwards = analysis.symbols.forward_declarations_in("/main.cpp");
    assert_eq!(symbols(forwards), vec!["Widget"]);
    assert!(analysis.symbols.definitions_in("/main.cpp").is_empty());
}

#[test]
fn test_record_redeclared_after_definition() {
    let analysis = analyse(
        &[("/main.cpp", "struct S {};\nstruct S;\n")],
        "/main.cpp",
    );

    // The late re-declaration must not be reported as a second definition.
    let definitions = analysis.symbols.definitions_in("/main.cpp");
    assert_eq!(symbols(definitions), vec!["S"]);
    assert_eq!(definitions[0].begin, (1, 1));

    let forwards = analysis.symbols.forward_declarations_in("/main.cpp");
    assert_eq!(symbols(forwards), vec!["S"]);
    assert_eq!(forwards[0].begin, (2, 1));
}

#[test]
fn test_tentative_variable_definition_counts_as_forward() {
    let analysis = analyse(&[("/main.cpp", "int x;\n")], "/main.cpp");

    assert!(analysis.symbols.definitions_in("/main.cpp").is_empty());
    assert_eq!(
        symbols(analysis.symbols.forward_declarations_in("/main.cpp")),
        vec!["x"]
    );
}

#[test]
fn test_initialised_variable_is_a_definition() {
    let analysis = analyse(&[("/main.cpp", "int x = 1;\n")], "/main.cpp");

    assert_eq!(
        symbols(analysis.symbols.definitions_in("/main.cpp")),
        vec!["x"]
    );
    assert!(analysis
        .symbols
        .forward_declarations_in("/main.cpp")
        .is_empty());
}

#[test]
fn test_internal_symbols_are_not_defined_entries() {
    let analysis = analyse(
        &[(
            "/main.cpp",
            "static int s;\nstatic void f();\nstatic void f() {}\n",
        )],
        "/main.cpp",
    );

    // Internal linkage keeps definitions out; the local forward of f is
    // suppressed because its definition sits next to it.
    assert!(analysis.symbols.known_files().is_empty());
}

#[test]
fn test_qualified_names_in_namespaces() {
    let analysis = analyse(
        &[("/main.cpp", "namespace ns\n{\nint value = 3;\n}\n")],
        "/main.cpp",
    );

    assert_eq!(
        symbols(analysis.symbols.definitions_in("/main.cpp")),
        vec!["ns::value"]
    );
}

#[test]
fn test_extern_variable_forward_in_header() {
    let analysis = analyse(
        &[
            ("/main.cpp", "#include \"g.h\"\nint g = 1;\n"),
            ("/g.h", "extern int g;\n"),
        ],
        "/main.cpp",
    );

    assert_eq!(
        symbols(analysis.symbols.forward_declarations_in("/g.h")),
        vec!["g"]
    );
    assert_eq!(
        symbols(analysis.symbols.definitions_in("/main.cpp")),
        vec!["g"]
    );
}

#[test]
fn test_same_file_may_carry_both_kinds() {
    let analysis = analyse(
        &[
            (
                "/main.cpp",
                "#include \"mixed.h\"\nvoid a() {}\nint main() { return 0; }\n",
            ),
            ("/mixed.h", "void a();\nstruct B {};\n"),
        ],
        "/main.cpp",
    );

    assert_eq!(
        symbols(analysis.symbols.forward_declarations_in("/mixed.h")),
        vec!["a"]
    );
    assert_eq!(
        symbols(analysis.symbols.definitions_in("/mixed.h")),
        vec!["B"]
    );
}
