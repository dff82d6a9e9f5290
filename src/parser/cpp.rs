//! Tree-sitter backed C/C++ front-end.
//!
//! Builds the translation-unit model by parsing the main file and every
//! include it can resolve through the compile command's include directories.
//! Linkage, scope, redeclaration chains and qualified names are derived
//! syntactically: storage classes, anonymous namespaces, namespace-scope
//! `const` in C++, bodies and initialisers, qualified declarators. No
//! preprocessing is performed; spelling locations are the literal positions,
//! and headers that cannot be resolved (or resolve into `-isystem`
//! directories) are treated as system code.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, Query, QueryCursor};

use crate::analysis::SpellingLocation;
use crate::compiledb::{CompileCommand, IncludePaths};
use crate::parser::{DeclCategory, DeclId, Reference, TranslationUnit, TypeUsage};

/// In-memory file overlay: path → contents. Paths shadow the filesystem.
pub type FileMap = BTreeMap<String, String>;

/// Every type spelled in the main file.
static TYPE_QUERY: Lazy<Query> = Lazy::new(|| {
    Query::new(&tree_sitter_cpp::LANGUAGE.into(), "(type_identifier) @type")
        .expect("type usage query must compile")
});

/// Every identifier in the main file; declarator names and macro names are
/// filtered out afterwards.
static REF_QUERY: Lazy<Query> = Lazy::new(|| {
    Query::new(&tree_sitter_cpp::LANGUAGE.into(), "(identifier) @ref")
        .expect("reference query must compile")
});

/// The front-end configuration for one TU: include directories plus an
/// optional virtual file overlay.
pub struct CppFrontEnd {
    includes: IncludePaths,
    overlay: FileMap,
}

impl CppFrontEnd {
    /// Configure from a real compile command.
    pub fn from_command(command: &CompileCommand) -> Self {
        Self {
            includes: command.include_paths(),
            overlay: FileMap::new(),
        }
    }

    /// Configure from raw compiler arguments with an in-memory overlay.
    pub fn with_virtual_files(arguments: &[String], files: FileMap) -> Self {
        let command = CompileCommand {
            directory: PathBuf::from("/"),
            file: PathBuf::from("-"),
            arguments: arguments.to_vec(),
        };
        let overlay = files
            .into_iter()
            .map(|(path, content)| (normalise_str(&path), content))
            .collect();
        Self {
            includes: command.include_paths(),
            overlay,
        }
    }

    /// Parse `main_file` and everything it includes into a queryable TU.
    pub fn parse(&self, main_file: &str) -> anyhow::Result<CppTranslationUnit> {
        let main_file = normalise_str(main_file);
        let mut builder = TuBuilder::new(self, main_file.clone());
        builder.process_file(&main_file, false)?;
        builder.link_chains();
        builder.collect_usage_sites();
        Ok(builder.finish())
    }

    fn read_file(&self, path: &str) -> Option<String> {
        if let Some(content) = self.overlay.get(path) {
            return Some(content.clone());
        }
        std::fs::read_to_string(path).ok()
    }

    fn file_exists(&self, path: &str) -> bool {
        self.overlay.contains_key(path) || Path::new(path).is_file()
    }

    /// Resolve an include spec to (path, is-system). Quoted includes look
    /// next to the including file first; unresolvable includes yield `None`
    /// and the header simply is not parsed.
    fn resolve_include(
        &self,
        spec: &str,
        quoted: bool,
        including_dir: &Path,
    ) -> Option<(String, bool)> {
        let mut candidates: Vec<(&Path, bool)> = Vec::new();
        if quoted {
            candidates.push((including_dir, false));
            for dir in &self.includes.quote {
                candidates.push((dir, false));
            }
        }
        for dir in &self.includes.user {
            candidates.push((dir, false));
        }
        for dir in &self.includes.system {
            candidates.push((dir, true));
        }

        for (dir, system) in candidates {
            let candidate = normalise_str(&dir.join(spec).to_string_lossy());
            if self.file_exists(&candidate) {
                return Some((candidate, system));
            }
        }
        None
    }
}

/// One declaration node of the TU model.
#[derive(Debug)]
struct DeclData {
    category: DeclCategory,
    identifier: Option<String>,
    printable: String,
    qualified: String,
    file: String,
    system: bool,
    in_main: bool,
    globalish: bool,
    inline_fn: bool,
    method: bool,
    field: bool,
    definition: bool,
    body: bool,
    name_pos: (usize, usize),
    begin_pos: (usize, usize),
    end_pos: (usize, usize),
    prev: Option<DeclId>,
    def: Option<DeclId>,
    chain_has_def: bool,
    /// Computed during the walk: no external formal linkage.
    internal: bool,
}

/// A parsed translation unit, ready for the matcher engine.
pub struct CppTranslationUnit {
    main_file: String,
    decls: Vec<DeclData>,
    type_usages: Vec<TypeUsage>,
    references: Vec<Reference>,
}

impl CppTranslationUnit {
    fn decl(&self, id: DeclId) -> &DeclData {
        &self.decls[id.0 as usize]
    }

    fn spelling(&self, decl: &DeclData, pos: (usize, usize)) -> SpellingLocation {
        SpellingLocation {
            file: decl.file.clone(),
            line: pos.0,
            col: pos.1,
            in_system_header: decl.system,
            in_system_macro: false,
        }
    }
}

impl TranslationUnit for CppTranslationUnit {
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
        self.decl(id).qualified.clone()
    }

    fn has_external_linkage(&self, id: DeclId) -> bool {
        !self.decl(id).internal
    }

    fn in_main_file(&self, id: DeclId) -> bool {
        self.decl(id).in_main
    }

    fn in_globalish_scope(&self, id: DeclId) -> bool {
        self.decl(id).globalish
    }

    fn is_inline_function(&self, id: DeclId) -> bool {
        self.decl(id).category == DeclCategory::Function && self.decl(id).inline_fn
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
        self.decl(id).chain_has_def
    }

    fn definition(&self, id: DeclId) -> Option<DeclId> {
        self.decl(id).def
    }

    fn previous_declaration(&self, id: DeclId) -> Option<DeclId> {
        self.decl(id).prev
    }

    fn name_location(&self, id: DeclId) -> Option<SpellingLocation> {
        let decl = self.decl(id);
        Some(self.spelling(decl, decl.name_pos))
    }

    fn extent(&self, id: DeclId) -> Option<(SpellingLocation, SpellingLocation)> {
        let decl = self.decl(id);
        Some((
            self.spelling(decl, decl.begin_pos),
            self.spelling(decl, decl.end_pos),
        ))
    }
}

/// Storage specifiers and qualifiers of one declaration.
#[derive(Debug, Default, Clone, Copy)]
struct Specifiers {
    is_static: bool,
    is_extern: bool,
    is_inline: bool,
    is_const: bool,
}

/// The namespace context of the walk.
#[derive(Debug, Default, Clone)]
struct Scope {
    parts: Vec<String>,
    anonymous: usize,
}

impl Scope {
    fn qualify(&self, tail: &str) -> String {
        if self.parts.is_empty() {
            tail.to_string()
        } else {
            format!("{}::{}", self.parts.join("::"), tail)
        }
    }

    fn in_anonymous(&self) -> bool {
        self.anonymous > 0
    }
}

/// Name information extracted from a declarator.
#[derive(Debug)]
struct NameInfo {
    identifier: Option<String>,
    printable: String,
    /// Textual qualifier of a qualified declarator (`X` in `X::f`).
    qualifier: Option<String>,
    name_pos: (usize, usize),
}

/// What a declarator turned out to be once unwrapped.
#[derive(Debug)]
struct DeclaratorInfo<'t> {
    name_node: Node<'t>,
    is_function: bool,
    has_initialiser: bool,
}

struct ParsedSource {
    file: String,
    tree: tree_sitter::Tree,
    source: String,
}

struct TuBuilder<'fe> {
    front_end: &'fe CppFrontEnd,
    main_file: String,
    cpp: bool,
    decls: Vec<DeclData>,
    /// Qualified name → declaration chain, in parse order.
    chains: HashMap<String, Vec<u32>>,
    /// Plain identifier → declarations, in parse order.
    by_name: HashMap<String, Vec<u32>>,
    record_names: HashSet<String>,
    included: HashSet<String>,
    main_parse: Option<ParsedSource>,
    type_usages: Vec<TypeUsage>,
    references: Vec<Reference>,
}

impl<'fe> TuBuilder<'fe> {
    fn new(front_end: &'fe CppFrontEnd, main_file: String) -> Self {
        let cpp = Path::new(&main_file)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext != "c")
            .unwrap_or(true);
        Self {
            front_end,
            main_file,
            cpp,
            decls: Vec::new(),
            chains: HashMap::new(),
            by_name: HashMap::new(),
            record_names: HashSet::new(),
            included: HashSet::new(),
            main_parse: None,
            type_usages: Vec::new(),
            references: Vec::new(),
        }
    }

    fn parse_source(source: &str) -> anyhow::Result<tree_sitter::Tree> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_cpp::LANGUAGE.into())?;
        parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("tree-sitter failed to produce a tree"))
    }

    /// Parse one file of the TU and walk its top level, recursing into
    /// resolvable includes at their include position.
    fn process_file(&mut self, file: &str, system: bool) -> anyhow::Result<()> {
        if !self.included.insert(file.to_string()) {
            return Ok(());
        }

        let Some(source) = self.front_end.read_file(file) else {
            if file == self.main_file {
                anyhow::bail!("cannot read main file '{}'", file);
            }
            return Ok(());
        };

        let tree = Self::parse_source(&source)?;
        let mut scope = Scope::default();
        self.walk_scope(tree.root_node(), &source, file, system, &mut scope);

        if file == self.main_file {
            self.main_parse = Some(ParsedSource {
                file: file.to_string(),
                tree,
                source,
            });
        }
        Ok(())
    }

    fn walk_scope(&mut self, node: Node, src: &str, file: &str, system: bool, scope: &mut Scope) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "preproc_include" => self.handle_include(child, src, file),
                "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif" => {
                    self.walk_scope(child, src, file, system, scope);
                }
                "namespace_definition" => {
                    self.handle_namespace(child, src, file, system, scope);
                }
                "linkage_specification" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        if body.kind() == "declaration_list" {
                            self.walk_scope(body, src, file, system, scope);
                        } else {
                            self.handle_scope_item(body, src, file, system, scope);
                        }
                    }
                }
                "template_declaration" => {
                    let mut inner_cursor = child.walk();
                    let inner: Vec<Node> = child.children(&mut inner_cursor).collect();
                    for item in inner {
                        self.handle_scope_item(item, src, file, system, scope);
                    }
                }
                _ => self.handle_scope_item(child, src, file, system, scope),
            }
        }
    }

    fn handle_scope_item(&mut self, node: Node, src: &str, file: &str, system: bool, scope: &mut Scope) {
        match node.kind() {
            "function_definition" => {
                self.add_function(node, src, file, system, scope, None);
            }
            "declaration" => {
                self.handle_declaration(node, src, file, system, scope, None);
            }
            "type_definition" => {
                self.add_typedefs(node, src, file, system, scope);
            }
            "alias_declaration" => {
                self.add_alias(node, src, file, system, scope);
            }
            "struct_specifier" | "class_specifier" | "union_specifier" => {
                self.add_record(node, src, file, system, scope, true, None);
            }
            _ => {}
        }
    }

    fn handle_include(&mut self, node: Node, src: &str, file: &str) {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let raw = node_text(path_node, src);
        let (spec, quoted) = match path_node.kind() {
            "string_literal" => (raw.trim_matches('"'), true),
            "system_lib_string" => (raw.trim_start_matches('<').trim_end_matches('>'), false),
            _ => return,
        };

        let including_dir = Path::new(file)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        if let Some((resolved, system)) = self.front_end.resolve_include(spec, quoted, &including_dir) {
            // A failing nested parse only loses that header's declarations.
            let _ = self.process_file(&resolved, system);
        }
    }

    fn handle_namespace(&mut self, node: Node, src: &str, file: &str, system: bool, scope: &mut Scope) {
        let name_node = node.child_by_field_name("name");
        let mut pushed = 0usize;
        let mut anonymous = false;

        match name_node {
            Some(name) if name.kind() == "nested_namespace_specifier" => {
                for part in node_text(name, src).split("::") {
                    if !part.is_empty() {
                        scope.parts.push(part.to_string());
                        pushed += 1;
                    }
                }
            }
            Some(name) => {
                scope.parts.push(node_text(name, src).to_string());
                pushed = 1;
            }
            None => {
                scope.parts.push("(anonymous namespace)".to_string());
                scope.anonymous += 1;
                pushed = 1;
                anonymous = true;
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.walk_scope(body, src, file, system, scope);
        }

        for _ in 0..pushed {
            scope.parts.pop();
        }
        if anonymous {
            scope.anonymous -= 1;
        }
    }

    fn specifiers(node: Node, src: &str) -> Specifiers {
        let mut specifiers = Specifiers::default();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "storage_class_specifier" => match node_text(child, src) {
                    "static" => specifiers.is_static = true,
                    "extern" => specifiers.is_extern = true,
                    "inline" => specifiers.is_inline = true,
                    _ => {}
                },
                "type_qualifier" => {
                    if node_text(child, src) == "const" {
                        specifiers.is_const = true;
                    }
                }
                _ => {}
            }
        }
        specifiers
    }

    /// A function definition at namespace scope (free function, or an
    /// out-of-line member whose lexical parent is still the TU).
    fn add_function(
        &mut self,
        node: Node,
        src: &str,
        file: &str,
        system: bool,
        scope: &Scope,
        in_record: Option<&RecordContext>,
    ) {
        let specifiers = Self::specifiers(node, src);
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };
        let Some(info) = unwrap_declarator(declarator) else {
            return;
        };
        if !info.is_function {
            return;
        }
        let Some(name) = extract_name(info.name_node, src) else {
            return;
        };

        self.push_function(name, node, file, system, scope, specifiers, in_record, true);
    }

    #[allow(clippy::too_many_arguments)]
    fn push_function(
        &mut self,
        name: NameInfo,
        node: Node,
        file: &str,
        system: bool,
        scope: &Scope,
        specifiers: Specifiers,
        in_record: Option<&RecordContext>,
        has_body: bool,
    ) {
        let plain = name.identifier.clone();
        let (qualified, method) = match in_record {
            Some(record) => (format!("{}::{}", record.qualified, name.printable), true),
            None => match &name.qualifier {
                Some(qualifier) => {
                    let qualified = scope.qualify(&format!("{}::{}", qualifier, name.printable));
                    let method = self.record_names.contains(qualifier)
                        || self.record_names.contains(&scope.qualify(qualifier));
                    (qualified, method)
                }
                None => (scope.qualify(&name.printable), false),
            },
        };

        let internal = if in_record.is_some() || method {
            in_record.map(|r| !r.external).unwrap_or(false) || scope.in_anonymous()
        } else {
            specifiers.is_static || scope.in_anonymous()
        };

        // In-class definitions are implicitly inline.
        let implicit_inline = in_record.is_some() && has_body;

        let decl = DeclData {
            category: DeclCategory::Function,
            identifier: plain.clone(),
            printable: name.printable.clone(),
            qualified: qualified.clone(),
            file: file.to_string(),
            system,
            in_main: file == self.main_file,
            globalish: in_record.is_none(),
            inline_fn: specifiers.is_inline || implicit_inline,
            method,
            field: false,
            definition: has_body,
            body: has_body,
            name_pos: name.name_pos,
            begin_pos: point(node.start_position()),
            end_pos: point(node.end_position()),
            prev: None,
            def: None,
            chain_has_def: false,
            internal,
        };
        self.push_decl(decl, plain.as_deref(), &qualified);
    }

    /// A `declaration` node: variables, function prototypes, bare record
    /// declarations.
    fn handle_declaration(
        &mut self,
        node: Node,
        src: &str,
        file: &str,
        system: bool,
        scope: &Scope,
        in_record: Option<&RecordContext>,
    ) {
        let specifiers = Self::specifiers(node, src);

        // `struct S {} s;` declares the record and the variable at once.
        if let Some(type_node) = node.child_by_field_name("type") {
            if matches!(
                type_node.kind(),
                "struct_specifier" | "class_specifier" | "union_specifier"
            ) {
                self.add_record(type_node, src, file, system, scope, in_record.is_none(), in_record);
            }
        }

        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            let Some(info) = unwrap_declarator(declarator) else {
                continue;
            };
            let Some(name) = extract_name(info.name_node, src) else {
                continue;
            };

            if info.is_function {
                self.push_function(
                    name, node, file, system, scope, specifiers, in_record, false,
                );
                continue;
            }

            self.push_variable(name, node, declarator, file, system, scope, specifiers, in_record);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_variable(
        &mut self,
        name: NameInfo,
        decl_node: Node,
        declarator: Node,
        file: &str,
        system: bool,
        scope: &Scope,
        specifiers: Specifiers,
        in_record: Option<&RecordContext>,
    ) {
        let has_initialiser = unwrap_declarator(declarator)
            .map(|info| info.has_initialiser)
            .unwrap_or(false);

        let plain = name.identifier.clone();
        let (qualified, is_member) = match in_record {
            Some(record) => (format!("{}::{}", record.qualified, name.printable), true),
            None => match &name.qualifier {
                Some(qualifier) => (
                    scope.qualify(&format!("{}::{}", qualifier, name.printable)),
                    self.record_names.contains(qualifier)
                        || self.record_names.contains(&scope.qualify(qualifier)),
                ),
                None => (scope.qualify(&name.printable), false),
            },
        };

        // Members are fields only when they are non-static data members of
        // the record body itself.
        let field = in_record.is_some() && !specifiers.is_static;

        let internal = if is_member || in_record.is_some() {
            in_record.map(|r| !r.external).unwrap_or(false) || scope.in_anonymous()
        } else {
            specifiers.is_static
                || scope.in_anonymous()
                || (self.cpp && specifiers.is_const && !specifiers.is_extern)
        };

        // `extern int x;` declares only; everything else at least tentatively
        // defines.
        let definition = !(specifiers.is_extern && !has_initialiser);

        let decl = DeclData {
            category: DeclCategory::Variable,
            identifier: plain.clone(),
            printable: name.printable.clone(),
            qualified: qualified.clone(),
            file: file.to_string(),
            system,
            in_main: file == self.main_file,
            globalish: in_record.is_none(),
            inline_fn: false,
            method: false,
            field,
            definition,
            body: has_initialiser,
            name_pos: name.name_pos,
            begin_pos: point(decl_node.start_position()),
            end_pos: point(declarator.end_position()),
            prev: None,
            def: None,
            chain_has_def: false,
            internal,
        };
        self.push_decl(decl, plain.as_deref(), &qualified);
    }

    fn add_typedefs(&mut self, node: Node, src: &str, file: &str, system: bool, scope: &Scope) {
        // `typedef struct S { ... } T;` also declares the record.
        if let Some(type_node) = node.child_by_field_name("type") {
            if matches!(
                type_node.kind(),
                "struct_specifier" | "class_specifier" | "union_specifier"
            ) {
                self.add_record(type_node, src, file, system, scope, true, None);
            }
        }

        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            let Some(info) = unwrap_declarator(declarator) else {
                continue;
            };
            let Some(name) = extract_name(info.name_node, src) else {
                continue;
            };
            self.push_typedef(name, node, file, system, scope);
        }
    }

    fn add_alias(&mut self, node: Node, src: &str, file: &str, system: bool, scope: &Scope) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = NameInfo {
            identifier: Some(node_text(name_node, src).to_string()),
            printable: node_text(name_node, src).to_string(),
            qualifier: None,
            name_pos: point(name_node.start_position()),
        };
        self.push_typedef(name, node, file, system, scope);
    }

    fn push_typedef(&mut self, name: NameInfo, node: Node, file: &str, system: bool, scope: &Scope) {
        let plain = name.identifier.clone();
        let qualified = scope.qualify(&name.printable);
        let decl = DeclData {
            category: DeclCategory::TypedefName,
            identifier: plain.clone(),
            printable: name.printable.clone(),
            qualified: qualified.clone(),
            file: file.to_string(),
            system,
            in_main: file == self.main_file,
            globalish: true,
            inline_fn: false,
            method: false,
            field: false,
            definition: true,
            body: true,
            name_pos: name.name_pos,
            begin_pos: point(node.start_position()),
            end_pos: point(node.end_position()),
            prev: None,
            def: None,
            chain_has_def: false,
            // Typedef names have no linkage of their own.
            internal: true,
        };
        self.push_decl(decl, plain.as_deref(), &qualified);
    }

    #[allow(clippy::too_many_arguments)]
    fn add_record(
        &mut self,
        node: Node,
        src: &str,
        file: &str,
        system: bool,
        scope: &Scope,
        globalish: bool,
        in_record: Option<&RecordContext>,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            // Anonymous records cannot be renamed or forward-declared.
            return;
        };
        if name_node.kind() != "type_identifier" {
            return;
        }
        let name = node_text(name_node, src).to_string();
        let qualified = match in_record {
            Some(record) => format!("{}::{}", record.qualified, name),
            None => scope.qualify(&name),
        };
        let body = node.child_by_field_name("body");
        let internal = scope.in_anonymous() || in_record.map(|r| !r.external).unwrap_or(false);

        let decl = DeclData {
            category: DeclCategory::Record,
            identifier: Some(name.clone()),
            printable: name.clone(),
            qualified: qualified.clone(),
            file: file.to_string(),
            system,
            in_main: file == self.main_file,
            globalish,
            inline_fn: false,
            method: false,
            field: false,
            definition: body.is_some(),
            body: body.is_some(),
            name_pos: point(name_node.start_position()),
            begin_pos: point(node.start_position()),
            end_pos: point(node.end_position()),
            prev: None,
            def: None,
            chain_has_def: false,
            internal,
        };
        self.push_decl(decl, Some(&name), &qualified);

        self.record_names.insert(name.clone());
        self.record_names.insert(qualified.clone());

        if let Some(body) = body {
            let context = RecordContext {
                qualified,
                external: !internal,
            };
            self.walk_record_body(body, src, file, system, scope, &context);
        }
    }

    /// Walk a record body to collect member declarations. Members are never
    /// matched directly, but they anchor redeclaration chains: an out-of-line
    /// definition's previous declaration is its in-class prototype.
    fn walk_record_body(
        &mut self,
        body: Node,
        src: &str,
        file: &str,
        system: bool,
        scope: &Scope,
        record: &RecordContext,
    ) {
        let mut cursor = body.walk();
        let children: Vec<Node> = body.children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "function_definition" => {
                    self.add_function(child, src, file, system, scope, Some(record));
                }
                "field_declaration" => {
                    let specifiers = Self::specifiers(child, src);
                    let mut field_cursor = child.walk();
                    let declarators: Vec<Node> = child
                        .children_by_field_name("declarator", &mut field_cursor)
                        .collect();
                    for declarator in declarators {
                        let Some(info) = unwrap_declarator(declarator) else {
                            continue;
                        };
                        let Some(name) = extract_name(info.name_node, src) else {
                            continue;
                        };
                        if info.is_function {
                            self.push_function(
                                name,
                                child,
                                file,
                                system,
                                scope,
                                specifiers,
                                Some(record),
                                false,
                            );
                        } else {
                            self.push_variable(
                                name,
                                child,
                                declarator,
                                file,
                                system,
                                scope,
                                specifiers,
                                Some(record),
                            );
                        }
                    }
                }
                "struct_specifier" | "class_specifier" | "union_specifier" => {
                    // Inner records: renaming the outer class suffices, but
                    // the names must exist for method-qualifier lookup.
                    self.add_record(child, src, file, system, scope, false, Some(record));
                }
                _ => {}
            }
        }
    }

    fn push_decl(&mut self, mut decl: DeclData, plain: Option<&str>, qualified: &str) {
        let index = self.decls.len() as u32;
        let chain = self.chains.entry(qualified.to_string()).or_default();
        decl.prev = chain.last().map(|&i| DeclId(i));
        chain.push(index);

        if let Some(plain) = plain {
            self.by_name.entry(plain.to_string()).or_default().push(index);
        }
        self.decls.push(decl);
    }

    /// Resolve each chain's defining node and propagate it to every member.
    fn link_chains(&mut self) {
        for chain in self.chains.values() {
            let def = chain
                .iter()
                .copied()
                .find(|&i| self.decls[i as usize].definition);
            for &index in chain {
                self.decls[index as usize].def = def.map(DeclId);
                self.decls[index as usize].chain_has_def = def.is_some();
            }
        }
    }

    /// Sweep the main file for type spellings and identifier references.
    /// Over-collection is deliberate: hits that resolve to nothing, or to
    /// declarations that fail the engine's re-match, drop out downstream.
    fn collect_usage_sites(&mut self) {
        let Some(parse) = self.main_parse.take() else {
            return;
        };
        let source = parse.source.as_bytes();
        let root = parse.tree.root_node();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&TYPE_QUERY, root, source);
        while let Some(matched) = matches.next() {
            for capture in matched.captures {
                let node = capture.node;
                if is_declared_type_name(node) {
                    continue;
                }
                let name = node.utf8_text(source).unwrap_or("");
                if name.is_empty() {
                    continue;
                }
                let typedef_target = self.lookup(name, |d| d.category == DeclCategory::TypedefName);
                let record_target = self.lookup(name, |d| d.category == DeclCategory::Record);
                if typedef_target.is_none() && record_target.is_none() {
                    continue;
                }
                self.type_usages.push(TypeUsage {
                    location: Some(SpellingLocation::user(
                        &parse.file,
                        node.start_position().row + 1,
                        node.start_position().column + 1,
                    )),
                    typedef_target,
                    record_target,
                });
            }
        }

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&REF_QUERY, root, source);
        while let Some(matched) = matches.next() {
            for capture in matched.captures {
                let node = capture.node;
                if is_declarator_name(node) {
                    continue;
                }
                let name = node.utf8_text(source).unwrap_or("");
                let Some(target) = self.lookup(name, |d| {
                    matches!(d.category, DeclCategory::Function | DeclCategory::Variable)
                }) else {
                    continue;
                };
                self.references.push(Reference {
                    location: Some(SpellingLocation::user(
                        &parse.file,
                        node.start_position().row + 1,
                        node.start_position().column + 1,
                    )),
                    target,
                });
            }
        }
    }

    /// The latest declaration of `name` satisfying `filter`.
    fn lookup(&self, name: &str, filter: impl Fn(&DeclData) -> bool) -> Option<DeclId> {
        let candidates = self.by_name.get(name)?;
        candidates
            .iter()
            .rev()
            .copied()
            .find(|&i| filter(&self.decls[i as usize]))
            .map(DeclId)
    }

    fn finish(self) -> CppTranslationUnit {
        CppTranslationUnit {
            main_file: self.main_file,
            decls: self.decls,
            type_usages: self.type_usages,
            references: self.references,
        }
    }
}

/// Lexical context while walking a record body.
struct RecordContext {
    qualified: String,
    external: bool,
}

fn node_text<'s>(node: Node, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

fn point(position: tree_sitter::Point) -> (usize, usize) {
    (position.row + 1, position.column + 1)
}

/// Peel a declarator down to its name node, noting whether it declares a
/// function and whether an initialiser is attached. Abstract declarators
/// yield `None`.
fn unwrap_declarator(mut node: Node) -> Option<DeclaratorInfo> {
    let mut is_function = false;
    let mut has_initialiser = false;

    loop {
        match node.kind() {
            "init_declarator" => {
                has_initialiser = true;
                node = node.child_by_field_name("declarator")?;
            }
            "function_declarator" => {
                is_function = true;
                node = node.child_by_field_name("declarator")?;
            }
            "pointer_declarator" | "array_declarator" => {
                // A pointer wrapped inside a function declarator makes the
                // whole thing a (function-)pointer variable.
                is_function = false;
                node = node.child_by_field_name("declarator")?;
            }
            "reference_declarator" | "parenthesized_declarator" => {
                is_function = false;
                node = inner_declarator(node)?;
            }
            "identifier" | "field_identifier" | "type_identifier" | "qualified_identifier"
            | "operator_name" | "destructor_name" | "template_function" => {
                return Some(DeclaratorInfo {
                    name_node: node,
                    is_function,
                    has_initialiser,
                });
            }
            _ => return None,
        }
    }
}

fn inner_declarator(node: Node) -> Option<Node> {
    if let Some(declarator) = node.child_by_field_name("declarator") {
        return Some(declarator);
    }
    let mut cursor = node.walk();
    let inner = node.named_children(&mut cursor).next();
    inner
}

/// Extract identifier / printable / qualifier information from a name node.
fn extract_name(node: Node, src: &str) -> Option<NameInfo> {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" => Some(NameInfo {
            identifier: Some(node_text(node, src).to_string()),
            printable: node_text(node, src).to_string(),
            qualifier: None,
            name_pos: point(node.start_position()),
        }),
        "operator_name" | "destructor_name" => Some(NameInfo {
            identifier: None,
            printable: node_text(node, src).to_string(),
            qualifier: None,
            name_pos: point(node.start_position()),
        }),
        "template_function" => {
            let name = node.child_by_field_name("name")?;
            extract_name(name, src)
        }
        "qualified_identifier" => {
            let inner = node.child_by_field_name("name")?;
            let mut info = extract_name(inner, src)?;
            let qualifier_text = node
                .child_by_field_name("scope")
                .map(|scope| node_text(scope, src).to_string());
            info.qualifier = match (qualifier_text, info.qualifier.take()) {
                (Some(outer), Some(nested)) => Some(format!("{}::{}", outer, nested)),
                (Some(outer), None) => Some(outer),
                (None, nested) => nested,
            };
            Some(info)
        }
        _ => None,
    }
}

/// The written name of a record/enum/typedef declaration itself, as opposed
/// to a use of the type.
fn is_declared_type_name(node: Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "struct_specifier" | "class_specifier" | "union_specifier" | "enum_specifier"
        | "alias_declaration" => field_child_is(parent, "name", node),
        "type_definition" => {
            let mut cursor = parent.walk();
            let result = parent
                .children_by_field_name("declarator", &mut cursor)
                .any(|child| child.id() == node.id());
            result
        }
        _ => false,
    }
}

/// Declarator names, macro names and enumerators are not references.
fn is_declarator_name(node: Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "preproc_def" | "preproc_function_def" | "preproc_ifdef" | "enumerator" => {
            field_child_is(parent, "name", node)
        }
        "preproc_params" => true,
        _ => {
            let mut cursor = parent.walk();
            let result = parent
                .children_by_field_name("declarator", &mut cursor)
                .any(|child| child.id() == node.id());
            result
        }
    }
}

fn field_child_is(parent: Node, field: &str, node: Node) -> bool {
    parent
        .child_by_field_name(field)
        .map(|child| child.id() == node.id())
        .unwrap_or(false)
}

/// Lexically normalise a path: resolve `.` and `..` without touching the
/// filesystem.
fn normalise_path(path: &Path) -> PathBuf {
    let mut normalised = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalised.pop();
            }
            other => normalised.push(other.as_os_str()),
        }
    }
    normalised
}

fn normalise_str(path: &str) -> String {
    normalise_path(Path::new(path)).to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_virtual(files: &[(&str, &str)], main: &str) -> CppTranslationUnit {
        let map: FileMap = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        let front_end = CppFrontEnd::with_virtual_files(&[], map);
        front_end.parse(main).unwrap()
    }

    #[test]
    fn test_static_function_is_internal() {
        let tu = parse_virtual(&[("/main.cpp", "static void f() {}\n")], "/main.cpp");
        let decls = tu.declarations();
        assert_eq!(decls.len(), 1);
        let f = decls[0];
        assert_eq!(tu.identifier(f).as_deref(), Some("f"));
        assert!(!tu.has_external_linkage(f));
        assert!(tu.in_main_file(f));
        assert!(tu.in_globalish_scope(f));
        assert!(tu.is_definition(f));
    }

    #[test]
    fn test_anonymous_namespace_typedef() {
        let tu = parse_virtual(
            &[("/main.cpp", "\nnamespace\n{\n    typedef int MyIntType;\n}\n")],
            "/main.cpp",
        );
        let decls = tu.declarations();
        assert_eq!(decls.len(), 1);
        let t = decls[0];
        assert_eq!(tu.category(t), DeclCategory::TypedefName);
        assert!(!tu.has_external_linkage(t));
        assert!(tu.in_globalish_scope(t));
        let loc = tu.name_location(t).unwrap();
        assert_eq!((loc.line, loc.col), (4, 17));
    }

    #[test]
    fn test_redeclaration_chain_and_definition_link() {
        let tu = parse_virtual(
            &[("/main.cpp", "int g(int);\nint g(int x) { return x; }\n")],
            "/main.cpp",
        );
        let decls = tu.declarations();
        assert_eq!(decls.len(), 2);
        let (fwd, def) = (decls[0], decls[1]);
        assert!(!tu.is_definition(fwd));
        assert!(tu.is_definition(def));
        assert_eq!(tu.previous_declaration(def), Some(fwd));
        assert_eq!(tu.definition(fwd), Some(def));
        assert!(tu.has_definition(fwd));
    }

    #[test]
    fn test_quoted_include_resolution() {
        let tu = parse_virtual(
            &[
                ("/src/main.cpp", "#include \"util.h\"\nvoid f() {}\n"),
                ("/src/util.h", "void f();\n"),
            ],
            "/src/main.cpp",
        );
        let decls = tu.declarations();
        assert_eq!(decls.len(), 2);
        let header_decl = decls[0];
        assert!(!tu.in_main_file(header_decl));
        assert_eq!(
            tu.name_location(header_decl).unwrap().file,
            "/src/util.h"
        );
        let main_decl = decls[1];
        assert_eq!(tu.previous_declaration(main_decl), Some(header_decl));
    }

    #[test]
    fn test_unresolvable_include_is_skipped() {
        let tu = parse_virtual(
            &[("/main.cpp", "#include <cstdio>\nstatic int x;\n")],
            "/main.cpp",
        );
        assert_eq!(tu.declarations().len(), 1);
    }

    #[test]
    fn test_references_resolve_to_declarations() {
        let tu = parse_virtual(
            &[(
                "/main.cpp",
                "static int counter;\nstatic void bump() { counter = counter + 1; }\n",
            )],
            "/main.cpp",
        );
        let refs = tu.references();
        let counter_refs: Vec<_> = refs
            .iter()
            .filter(|r| tu.identifier(r.target).as_deref() == Some("counter"))
            .collect();
        assert_eq!(counter_refs.len(), 2);
    }

    #[test]
    fn test_type_usage_targets() {
        let tu = parse_virtual(
            &[(
                "/main.cpp",
                "namespace { struct S {}; }\nS make() { S value; return value; }\n",
            )],
            "/main.cpp",
        );
        let usages = tu.type_usages();
        assert!(usages.len() >= 2);
        for usage in &usages {
            let target = usage.record_target.expect("record target");
            assert_eq!(tu.identifier(target).as_deref(), Some("S"));
        }
    }

    #[test]
    fn test_out_of_line_method_definition() {
        let tu = parse_virtual(
            &[
                ("/main.cpp", "#include \"x.h\"\ninline int X::x() { return 1; }\n"),
                ("/x.h", "class X { public: inline int x(); };\n"),
            ],
            "/main.cpp",
        );
        let decls = tu.declarations();
        // Record X, in-class prototype, out-of-line definition.
        let def = *decls.last().unwrap();
        assert!(tu.is_class_method(def));
        assert!(tu.is_inline_function(def));
        assert!(tu.in_globalish_scope(def));
        assert!(tu.in_main_file(def));
        let prev = tu.previous_declaration(def).expect("in-class prototype");
        assert_eq!(tu.name_location(prev).unwrap().file, "/x.h");
    }

    #[test]
    fn test_const_namespace_var_is_internal_in_cpp() {
        let tu = parse_virtual(&[("/main.cpp", "const int limit = 5;\n")], "/main.cpp");
        let decls = tu.declarations();
        assert_eq!(decls.len(), 1);
        assert!(!tu.has_external_linkage(decls[0]));

        let c_tu = parse_virtual(&[("/main.c", "const int limit = 5;\n")], "/main.c");
        assert!(c_tu.has_external_linkage(c_tu.declarations()[0]));
    }

    #[test]
    fn test_path_normalisation() {
        assert_eq!(normalise_str("/a/./b/../c.h"), "/a/c.h");
        assert_eq!(normalise_str("/main.cpp"), "/main.cpp");
    }
}
