//! Matcher engine: classifies declarations and routes hits into the three
//! per-TU stores.
//!
//! A fixed catalogue of patterns runs over every declaration, type usage and
//! reference the front-end reports. Hits dispatch to four handler families:
//! renameable declarations, usage points, implements relations and
//! symbol-table entries. Handlers are stateless between invocations; all
//! state lives in the stores.

use std::path::Path;

use crate::analysis::{ImplementsEdges, RenameDirectives, SpellingLocation, SymbolTable};
use crate::parser::{DeclCategory, DeclId, Reference, TranslationUnit, TypeUsage};

/// A reusable composite predicate over a declaration, so handlers can
/// re-match a referred declaration against the same criteria the patterns
/// use.
#[derive(Clone, Copy)]
pub struct Predicate(fn(&dyn TranslationUnit, DeclId) -> bool);

impl Predicate {
    pub fn matches(&self, tu: &dyn TranslationUnit, id: DeclId) -> bool {
        (self.0)(tu, id)
    }
}

/// Named but not addressable from outside the TU, and expanded in the main
/// file rather than pulled in from a header.
fn local_in_the_tu(tu: &dyn TranslationUnit, id: DeclId) -> bool {
    !tu.has_external_linkage(id) && tu.in_main_file(id)
}

/// Outside-addressable and expanded in the main file.
fn externally_named_but_implemented_in_the_tu(tu: &dyn TranslationUnit, id: DeclId) -> bool {
    tu.has_external_linkage(id) && tu.in_main_file(id)
}

/// The parent scope is the TU root or a namespace. Without this, things like
/// a local variable inside a static function would be picked up too. Every
/// namespace counts: a named namespace can still hold TU-local typedefs and
/// classes.
fn in_some_globalish_scope(tu: &dyn TranslationUnit, id: DeclId) -> bool {
    tu.in_globalish_scope(id)
}

fn tu_internal(tu: &dyn TranslationUnit, id: DeclId) -> bool {
    local_in_the_tu(tu, id) && in_some_globalish_scope(tu, id)
}

fn tu_visible(tu: &dyn TranslationUnit, id: DeclId) -> bool {
    externally_named_but_implemented_in_the_tu(tu, id) && in_some_globalish_scope(tu, id)
}

/// Renaming declarations with these traits is enough to break ambiguity in a
/// merged compilation unit.
pub const TU_INTERNAL_TRAITS: Predicate = Predicate(tu_internal);

/// Declarations with these traits tell us which headers the TU implements.
pub const TU_VISIBLE_TRAITS: Predicate = Predicate(tu_visible);

const LOCAL_IN_THE_TU: Predicate = Predicate(local_in_the_tu);

/// The three stores produced by analysing one translation unit.
#[derive(Debug)]
pub struct TuAnalysis {
    pub renames: RenameDirectives,
    pub implements: ImplementsEdges,
    pub symbols: SymbolTable,
}

/// Run the full matcher catalogue over `tu` and return the populated stores.
pub fn analyse(tu: &dyn TranslationUnit) -> TuAnalysis {
    let main_file = tu.main_file().to_string();
    let stem = Path::new(&main_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tu")
        .to_string();

    let mut engine = MatchEngine {
        tu,
        renames: RenameDirectives::new(&main_file, &stem),
        implements: ImplementsEdges::new(&main_file),
        symbols: SymbolTable::new(),
    };
    engine.run();

    TuAnalysis {
        renames: engine.renames,
        implements: engine.implements,
        symbols: engine.symbols,
    }
}

/// Owns the handler state (the stores) while the patterns run.
struct MatchEngine<'tu> {
    tu: &'tu dyn TranslationUnit,
    renames: RenameDirectives,
    implements: ImplementsEdges,
    symbols: SymbolTable,
}

impl MatchEngine<'_> {
    fn run(&mut self) {
        for id in self.tu.declarations() {
            self.match_declaration(id);
        }
        for usage in self.tu.type_usages() {
            self.handle_type_usage(&usage);
        }
        for reference in self.tu.references() {
            self.match_reference(&reference);
        }
    }

    /// Apply every declaration-shaped pattern to one node. The patterns are
    /// independent; a node may hit several handler families.
    fn match_declaration(&mut self, id: DeclId) {
        let tu = self.tu;
        let category = tu.category(id);

        // Basically every name-able "top-level" thing is a rename candidate
        // when it is TU-internal.
        if TU_INTERNAL_TRAITS.matches(tu, id) {
            self.handle_declaration(id, false);
        }

        // Inline functions expanded in the main file need their own pattern:
        // they carry external linkage, yet an out-of-line inline in an
        // implementation file is only callable from that file.
        if category == DeclCategory::Function
            && tu.is_inline_function(id)
            && tu.in_main_file(id)
        {
            self.handle_declaration(id, true);
        }

        if matches!(category, DeclCategory::Function | DeclCategory::Variable)
            && TU_VISIBLE_TRAITS.matches(tu, id)
        {
            self.handle_implements_relation(id);
        }

        self.match_symbol_table(id, category);
    }

    /// The symbol-table patterns: forward declarations regardless of
    /// linkage, definitions only for externally linked symbols.
    fn match_symbol_table(&mut self, id: DeclId, category: DeclCategory) {
        let tu = self.tu;
        if !tu.in_globalish_scope(id) {
            return;
        }

        match category {
            DeclCategory::Function | DeclCategory::Variable => {
                if !tu.is_definition(id) {
                    self.handle_forward_declaration(id);
                } else if tu.has_external_linkage(id) {
                    // A definition-tagged node without a body (e.g. a
                    // tentative variable definition) is still only a forward
                    // declaration from the symbol table's point of view.
                    if tu.has_body(id) {
                        self.handle_definition(id);
                    } else {
                        self.handle_forward_declaration(id);
                    }
                }
            }
            DeclCategory::Record => {
                if !tu.has_definition(id) {
                    self.handle_forward_declaration(id);
                } else if tu.has_external_linkage(id) {
                    // A record can be re-declared after its full body was
                    // already seen; such nodes count as forwards even though
                    // the chain has a definition.
                    if tu.definition(id) == Some(id) {
                        self.handle_definition(id);
                    } else {
                        self.handle_forward_declaration(id);
                    }
                }
            }
            DeclCategory::TypedefName => {}
        }
    }

    /// Record a rename binding and the usage at the declaration's own name.
    fn handle_declaration(&mut self, id: DeclId, from_inline_pattern: bool) {
        let tu = self.tu;

        // An inline member implemented out-of-line in a source file appears
        // TU-local to the inline pattern, but renaming it would break the
        // class; it must be ignored.
        if from_inline_pattern && tu.is_class_method(id) {
            return;
        }

        let Some(name) = nonempty_identifier(tu, id) else {
            return;
        };

        // The binding is set even when the location is unusable; usage sites
        // matched later still need it to resolve.
        self.renames.set_binding(&name, id);

        let Some(location) = tu.name_location(id) else {
            return;
        };
        if location.file != tu.main_file() {
            return;
        }
        self.renames.add_usage(location.position(), &name, id);
    }

    /// A type spelled in the main file: resolve what it refers to and record
    /// a usage if the referred declaration is TU-internal.
    fn handle_type_usage(&mut self, usage: &TypeUsage) {
        let Some(location) = &usage.location else {
            return;
        };
        if location.file != self.tu.main_file() {
            return;
        }

        // Try the typedef target first, then the record target. A type that
        // refers to neither is not a problem.
        for target in [usage.typedef_target, usage.record_target] {
            let Some(id) = target else {
                continue;
            };
            if self.try_type_usage_target(id, location) {
                return;
            }
        }
    }

    fn try_type_usage_target(&mut self, id: DeclId, location: &SpellingLocation) -> bool {
        // The type-location pattern did not constrain the referred
        // declaration, so it is re-matched here.
        if !TU_INTERNAL_TRAITS.matches(self.tu, id) {
            return false;
        }
        let Some(name) = nonempty_identifier(self.tu, id) else {
            return false;
        };
        self.renames.add_usage(location.position(), &name, id);
        true
    }

    /// Apply the reference-shaped patterns to one declaration reference.
    fn match_reference(&mut self, reference: &Reference) {
        let tu = self.tu;
        let category = tu.category(reference.target);

        // References to TU-local functions and variables. This matches more
        // than the rename patterns do (e.g. locals inside function bodies);
        // the extra hits never gain a binding and drop out at the join.
        if matches!(category, DeclCategory::Function | DeclCategory::Variable)
            && LOCAL_IN_THE_TU.matches(tu, reference.target)
        {
            self.handle_reference(reference, false);
        }

        // References to main-file inline functions.
        if category == DeclCategory::Function
            && tu.is_inline_function(reference.target)
            && tu.in_main_file(reference.target)
        {
            self.handle_reference(reference, true);
        }
    }

    fn handle_reference(&mut self, reference: &Reference, to_inline: bool) {
        let tu = self.tu;

        // Same rule as at the declaration: an inline member defined
        // out-of-line must not have its usages rewritten.
        if to_inline && tu.is_class_method(reference.target) {
            return;
        }

        let Some(location) = &reference.location else {
            return;
        };
        if location.file != tu.main_file() {
            return;
        }
        let Some(name) = nonempty_identifier(tu, reference.target) else {
            return;
        };
        self.renames
            .add_usage(location.position(), &name, reference.target);
    }

    /// An externally linked declaration in the main file implements a header
    /// symbol if some previous declaration of it lives outside the main
    /// file.
    fn handle_implements_relation(&mut self, id: DeclId) {
        let tu = self.tu;

        let Some(previous) = tu.previous_declaration(id) else {
            // The one and only declaration: an externally linked symbol that
            // was never declared in a header. Developer oversight or a
            // dynamically loaded symbol; either way there is nothing to
            // connect it to.
            return;
        };

        let Some((begin, _)) = tu.extent(previous) else {
            return;
        };
        if begin.in_system_code() {
            // System headers stay where they are.
            return;
        }
        if begin.file == tu.main_file() {
            // A forward declaration earlier in the same file is not an
            // implements edge.
            return;
        }

        // Prefer the identifier; fall back to the printable name (operators
        // and such), then to a synthesised position-based name.
        let mut name = nonempty_identifier(tu, id).unwrap_or_else(|| tu.printable_name(id));
        if name.is_empty() {
            name = format!("unnameable_decl_at__{}_{}", begin.line, begin.col);
        }

        // Declaration chains need not be walked transitively: the pattern
        // fires on every declaration of the chain.
        self.implements.add_implemented(&begin.file, &name);
    }

    fn handle_definition(&mut self, id: DeclId) {
        let tu = self.tu;

        // Out-of-line member definitions cannot be forward-declared on their
        // own, so they carry no value for the symbol table.
        if tu.is_field(id) || tu.is_class_method(id) {
            return;
        }

        let Some((begin, end)) = tu.extent(id) else {
            return;
        };
        if begin.in_system_code() {
            return;
        }
        if nonempty_identifier(tu, id).is_none() {
            return;
        }

        self.symbols.add_definition(
            &begin.file,
            (begin.line, begin.col),
            (end.line, end.col),
            tu.qualified_name(id),
        );
    }

    fn handle_forward_declaration(&mut self, id: DeclId) {
        let tu = self.tu;

        let Some((begin, end)) = tu.extent(id) else {
            return;
        };
        if begin.in_system_code() {
            return;
        }
        if nonempty_identifier(tu, id).is_none() {
            return;
        }

        // A function both forward-declared and defined in the main file is
        // just a local coding convention, not an inter-TU boundary.
        if tu.category(id) == DeclCategory::Function {
            if let Some(def) = tu.definition(id) {
                if let Some((def_begin, _)) = tu.extent(def) {
                    if def_begin.file == tu.main_file() && begin.file == tu.main_file() {
                        return;
                    }
                }
            }
        }

        self.symbols.add_forward_declaration(
            &begin.file,
            (begin.line, begin.col),
            (end.line, end.col),
            tu.qualified_name(id),
        );
    }
}

/// The declaration's identifier when it has a usable, non-empty one.
fn nonempty_identifier(tu: &dyn TranslationUnit, id: DeclId) -> Option<String> {
    tu.identifier(id).filter(|name| !name.is_empty())
}
