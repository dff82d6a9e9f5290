//! Line-oriented output formats.
//!
//! All three report families share one shape: newline-terminated records
//! with `##` between fields and `line:col` positions. Bytes pass through
//! untouched.

use std::io::{self, Write};

use crate::analysis::{ImplementsEdges, RenameDirectives, SymbolTable};

/// `<tu>##<line>:<col>##<original>##<rewritten>`, ordered by position.
pub fn write_replacements(out: &mut dyn Write, directives: &RenameDirectives) -> io::Result<()> {
    let filepath = directives.filepath();
    for (location, (original, rewritten)) in directives.replacements() {
        writeln!(
            out,
            "{}##{}:{}##{}##{}",
            filepath, location.line, location.col, original, rewritten
        )?;
    }
    Ok(())
}

/// `<tu>##<header>##<symbol>`, headers and symbols in sorted order.
pub fn write_implements(out: &mut dyn Write, edges: &ImplementsEdges) -> io::Result<()> {
    let filepath = edges.filepath();
    for (header, symbols) in edges.entries() {
        for symbol in symbols {
            writeln!(out, "{}##{}##{}", filepath, header, symbol)?;
        }
    }
    Ok(())
}

/// `<file>##<line>:<col>##<endLine>:<endCol>##<qualified-name>` for every
/// definition recorded against `file`.
pub fn write_symbol_definitions(
    out: &mut dyn Write,
    file: &str,
    table: &SymbolTable,
) -> io::Result<()> {
    for record in table.definitions_in(file) {
        writeln!(
            out,
            "{}##{}:{}##{}:{}##{}",
            file, record.begin.0, record.begin.1, record.end.0, record.end.1, record.symbol
        )?;
    }
    Ok(())
}

/// Same schema as definitions, for forward declarations.
pub fn write_symbol_forward_declarations(
    out: &mut dyn Write,
    file: &str,
    table: &SymbolTable,
) -> io::Result<()> {
    for record in table.forward_declarations_in(file) {
        writeln!(
            out,
            "{}##{}:{}##{}:{}##{}",
            file, record.begin.0, record.begin.1, record.end.0, record.end.1, record.symbol
        )?;
    }
    Ok(())
}
