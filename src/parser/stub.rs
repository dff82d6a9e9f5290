//! In-memory front-end that synthesises translation units programmatically.
//!
//! Lets tests exercise every matcher rule without parsing any source,
//! including system-header flags and invalid locations, which the
//! tree-sitter front-end never produces.

use crate::analysis::SpellingLocation;
use crate::parser::{DeclCategory, DeclId, Reference, TranslationUnit, TypeUsage};

/// Builder for one synthesised declaration. All flags default to off; tests
/// switch on exactly what a scenario needs.
#[derive(Debug, Clone)]
pub struct StubDecl {
    category: DeclCategory,
    identifier: Option<String>,
    printable: String,
    qualified: Option<String>,
    external: bool,
    in_main: bool,
    globalish: bool,
    inline_fn: bool,
    method: bool,
    field: bool,
    definition: bool,
    body: bool,
    file: Option<String>,
    name_loc: Option<(usize, usize)>,
    span: Option<((usize, usize), (usize, usize))>,
    system_header: bool,
    system_macro: bool,
    omit_locations: bool,
    prev: Option<DeclId>,
    def: Option<DeclId>,
}

impl StubDecl {
    fn named(category: DeclCategory, name: &str) -> Self {
        Self {
            category,
            identifier: Some(name.to_string()),
            printable: name.to_string(),
            qualified: None,
            external: false,
            in_main: false,
            globalish: false,
            inline_fn: false,
            method: false,
            field: false,
            definition: false,
            body: false,
            file: None,
            name_loc: None,
            span: None,
            system_header: false,
            system_macro: false,
            omit_locations: false,
            prev: None,
            def: None,
        }
    }

    pub fn function(name: &str) -> Self {
        Self::named(DeclCategory::Function, name)
    }

    pub fn variable(name: &str) -> Self {
        Self::named(DeclCategory::Variable, name)
    }

    pub fn record(name: &str) -> Self {
        Self::named(DeclCategory::Record, name)
    }

    pub fn typedef_name(name: &str) -> Self {
        Self::named(DeclCategory::TypedefName, name)
    }

    /// A declaration without a plain identifier, e.g. `operator+`.
    pub fn unnamed_function(printable: &str) -> Self {
        let mut decl = Self::named(DeclCategory::Function, "");
        decl.identifier = None;
        decl.printable = printable.to_string();
        decl
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn in_main_file(mut self) -> Self {
        self.in_main = true;
        self.file = None;
        self
    }

    /// Place the declaration in an included header.
    pub fn in_file(mut self, file: &str) -> Self {
        self.in_main = false;
        self.file = Some(file.to_string());
        self
    }

    pub fn globalish(mut self) -> Self {
        self.globalish = true;
        self
    }

    pub fn inline_fn(mut self) -> Self {
        self.inline_fn = true;
        self
    }

    pub fn method(mut self) -> Self {
        self.method = true;
        self
    }

    pub fn field(mut self) -> Self {
        self.field = true;
        self
    }

    /// Mark this node a definition with a body (function body or defining
    /// initialiser).
    pub fn definition(mut self) -> Self {
        self.definition = true;
        self.body = true;
        self
    }

    /// Mark this node a tentative definition: counts as a definition but
    /// carries no body.
    pub fn tentative(mut self) -> Self {
        self.definition = true;
        self.body = false;
        self
    }

    /// Position of the name token. Declarations without an explicit position
    /// get an auto-assigned one when added.
    pub fn at(mut self, line: usize, col: usize) -> Self {
        self.name_loc = Some((line, col));
        self
    }

    /// Begin/end extent of the whole declaration. Defaults to the name
    /// position as a point.
    pub fn spanning(mut self, begin: (usize, usize), end: (usize, usize)) -> Self {
        self.span = Some((begin, end));
        self
    }

    pub fn in_system_header(mut self) -> Self {
        self.system_header = true;
        self
    }

    pub fn in_system_macro(mut self) -> Self {
        self.system_macro = true;
        self
    }

    /// Report invalid locations for this declaration.
    pub fn without_locations(mut self) -> Self {
        self.omit_locations = true;
        self
    }

    /// Link to the previous declaration of the same entity.
    pub fn previous(mut self, prev: DeclId) -> Self {
        self.prev = Some(prev);
        self
    }

    /// Link a forward declaration to its chain's defining node.
    pub fn defined_at(mut self, def: DeclId) -> Self {
        self.def = Some(def);
        self
    }

    /// Override the fully qualified name (defaults to the plain name).
    pub fn qualified(mut self, qualified: &str) -> Self {
        self.qualified = Some(qualified.to_string());
        self
    }
}

/// A synthesised translation unit.
#[derive(Debug)]
pub struct StubTranslationUnit {
    main_file: String,
    decls: Vec<StubDecl>,
    type_usages: Vec<TypeUsage>,
    references: Vec<Reference>,
}

impl StubTranslationUnit {
    pub fn new(main_file: &str) -> Self {
        Self {
            main_file: main_file.to_string(),
            decls: Vec::new(),
            type_usages: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Add a declaration and get its handle. Declarations without an
    /// explicit position are placed on consecutive lines.
    pub fn add_decl(&mut self, mut decl: StubDecl) -> DeclId {
        if decl.name_loc.is_none() && !decl.omit_locations {
            decl.name_loc = Some((self.decls.len() + 1, 1));
        }
        self.decls.push(decl);
        DeclId((self.decls.len() - 1) as u32)
    }

    /// Link `decl` to the defining node of its chain after the fact, for
    /// chains where the definition is added later than the declaration.
    pub fn link_definition(&mut self, decl: DeclId, def: DeclId) {
        self.decls[decl.0 as usize].def = Some(def);
    }

    /// Add a reference to `target` at a main-file position.
    pub fn add_reference(&mut self, line: usize, col: usize, target: DeclId) {
        let location = SpellingLocation::user(&self.main_file, line, col);
        self.references.push(Reference {
            location: Some(location),
            target,
        });
    }

    /// Add a reference located in some other file of the TU.
    pub fn add_reference_in(&mut self, file: &str, line: usize, col: usize, target: DeclId) {
        self.references.push(Reference {
            location: Some(SpellingLocation::user(file, line, col)),
            target,
        });
    }

    /// Add a reference whose location the front-end reports as invalid.
    pub fn add_invalid_reference(&mut self, target: DeclId) {
        self.references.push(Reference {
            location: None,
            target,
        });
    }

    /// Add a type usage at a main-file position.
    pub fn add_type_usage(
        &mut self,
        line: usize,
        col: usize,
        typedef_target: Option<DeclId>,
        record_target: Option<DeclId>,
    ) {
        self.type_usages.push(TypeUsage {
            location: Some(SpellingLocation::user(&self.main_file, line, col)),
            typedef_target,
            record_target,
        });
    }

    fn decl(&self, id: DeclId) -> &StubDecl {
        &self.decls[id.0 as usize]
    }

    fn file_of(&self, decl: &StubDecl) -> String {
        decl.file.clone().unwrap_or_else(|| self.main_file.clone())
    }

    fn location(&self, decl: &StubDecl, position: (usize, usize)) -> SpellingLocation {
        SpellingLocation {
            file: self.file_of(decl),
            line: position.0,
            col: position.1,
            in_system_header: decl.system_header,
            in_system_macro: decl.system_macro,
        }
    }
}

impl TranslationUnit for StubTranslationUnit {
    fn main_file(&self) -> &str {
        &self.main_file
    }

    fn declarations(&self) -> Vec<DeclId> {
        (0..self.decls.len() as u32).map(DeclId).collect()
    }

    fn type_usages(&self) -> Vec<TypeUsage> {
        self.type_usages.clone()
    }

    fn references(&self) -> Vec<Reference> {
        self.references.clone()
    }

    fn category(&self, id: DeclId) -> DeclCategory {
        self.decl(id).category
    }

    fn identifier(&self, id: DeclId) -> Option<String> {
        self.decl(id).identifier.clone()
    }

    fn printable_name(&self, id: DeclId) -> String {
        self.decl(id).printable.clone()
    }

    fn qualified_name(&self, id: DeclId) -> String {
        let decl = self.decl(id);
        decl.qualified
            .clone()
            .unwrap_or_else(|| decl.printable.clone())
    }

    fn has_external_linkage(&self, id: DeclId) -> bool {
        self.decl(id).external
    }

    fn in_main_file(&self, id: DeclId) -> bool {
        self.decl(id).in_main
    }

    fn in_globalish_scope(&self, id: DeclId) -> bool {
        self.decl(id).globalish
    }

    fn is_inline_function(&self, id: DeclId) -> bool {
        self.decl(id).inline_fn
    }

    fn is_class_method(&self, id: DeclId) -> bool {
        self.decl(id).method
    }

    fn is_field(&self, id: DeclId) -> bool {
        self.decl(id).field
    }

    fn is_definition(&self, id: DeclId) -> bool {
        self.decl(id).definition
    }

    fn has_body(&self, id: DeclId) -> bool {
        self.decl(id).body
    }

    fn has_definition(&self, id: DeclId) -> bool {
        let decl = self.decl(id);
        decl.definition || decl.def.is_some()
    }

    fn definition(&self, id: DeclId) -> Option<DeclId> {
        let decl = self.decl(id);
        if decl.definition {
            Some(id)
        } else {
            decl.def
        }
    }

    fn previous_declaration(&self, id: DeclId) -> Option<DeclId> {
        self.decl(id).prev
    }

    fn name_location(&self, id: DeclId) -> Option<SpellingLocation> {
        let decl = self.decl(id);
        if decl.omit_locations {
            return None;
        }
        decl.name_loc.map(|pos| self.location(decl, pos))
    }

    fn extent(&self, id: DeclId) -> Option<(SpellingLocation, SpellingLocation)> {
        let decl = self.decl(id);
        if decl.omit_locations {
            return None;
        }
        let (begin, end) = match decl.span {
            Some(span) => span,
            None => {
                let point = decl.name_loc?;
                (point, point)
            }
        };
        Some((self.location(decl, begin), self.location(decl, end)))
    }
}
