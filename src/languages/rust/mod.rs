//! Rust language support

mod lexer;

use std::path::Path;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::model::{
    DeclarationNode, EdgeKind, FileExtraction, NodeKind, RawEdge, SymbolRef, Visibility,
};
use crate::languages::{relative_file_name, LanguageSupport};

use crate::languages::text::{collapse_whitespace, line_of, line_starts, subtract};

use self::lexer::{
    brace_depths, header_end, is_ident_byte, mask, matching_angle, matching_brace,
    split_top_level, statement_end,
};

const SEPARATOR: &str = "::";

/// How far back from an item keyword to look for a visibility modifier.
const VISIBILITY_WINDOW: usize = 96;

static FN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfn\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static STRUCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:struct|union)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static ENUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\benum\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static TRAIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\btrait\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static IMPL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:(?:pub(?:\s*\([^)]*\))?|unsafe|default)\s+)*(impl)\b").unwrap()
});
static MOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bmod\s+([A-Za-z_][A-Za-z0-9_]*)\s*[{;]").unwrap());
static CONST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:const|static)\s+(?:mut\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap()
});
static MACRO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bmacro_rules!\s*([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static USE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\buse\s+").unwrap());
static VISIBILITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\bpub\s*(?:\(\s*([^)]*?)\s*\))?\s*(?:(?:const|async|unsafe|default|extern(?:\s*"[^"]*")?)\s+)*$"#,
    )
    .unwrap()
});
static CALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\(").unwrap());
static WHERE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bwhere\b").unwrap());
static FOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfor\s").unwrap());

/// Identifiers followed by `(` that are never call targets.
const CALL_DENYLIST: &[&str] = &[
    "if", "while", "for", "match", "return", "loop", "fn", "let", "in", "as", "move", "Some", "Ok",
    "Err", "None", "Box", "Vec", "self", "Self", "super", "crate", "where", "unsafe", "async",
    "await", "impl", "dyn", "mut", "ref", "else", "struct", "enum", "type",
];

/// Rust language support implementation
pub struct RustLanguage;

impl RustLanguage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageSupport for RustLanguage {
    fn language_id(&self) -> &str {
        "rust"
    }

    fn file_extensions(&self) -> &[&str] {
        &[".rs"]
    }

    /// Directories of the file relative to the root, with a leading `src` dropped.
    fn module_path(&self, relative_path: &Path) -> String {
        let mut segments: Vec<String> = relative_path
            .parent()
            .map(|dir| {
                dir.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        if segments.first().map(String::as_str) == Some("src") {
            segments.remove(0);
        }
        segments.join(SEPARATOR)
    }

    fn extract_file(&self, relative_path: &Path, source: &str) -> Result<FileExtraction> {
        let module_path = self.module_path(relative_path);
        let file = relative_file_name(relative_path);
        let mut extractor = RustGraphExtractor::new(source, file);
        extractor.scan_block(0, source.len(), &module_path, None);
        Ok(FileExtraction {
            nodes: extractor.nodes,
            edges: extractor.edges,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Function,
    Struct,
    Enum,
    Trait,
    Impl,
    Module,
    Constant,
    Macro,
    Use,
}

/// An item keyword found at the top level of a block.
#[derive(Debug, Clone)]
struct ItemMatch {
    kind: ItemKind,
    /// Offset of the item keyword
    start: usize,
    /// Offset just past the name (or keyword for `impl` and `use`)
    name_end: usize,
    name: String,
}

/// Helper for extracting graph data from Rust source
struct RustGraphExtractor<'a> {
    source: &'a str,
    masked: String,
    depths: Vec<u32>,
    lines: Vec<usize>,
    file: String,
    nodes: Vec<DeclarationNode>,
    edges: Vec<RawEdge>,
}

impl<'a> RustGraphExtractor<'a> {
    fn new(source: &'a str, file: String) -> Self {
        let masked = mask(source);
        let depths = brace_depths(&masked);
        Self {
            source,
            lines: line_starts(source),
            masked,
            depths,
            file,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Run every item matcher over `start..end` and keep the matches that sit
    /// at the block's own brace depth, in source order.
    fn collect_items(&self, start: usize, end: usize) -> Vec<ItemMatch> {
        let base = self.depths[start];
        let block = &self.masked[start..end];
        let matchers: [(ItemKind, &Regex); 9] = [
            (ItemKind::Function, &*FN_RE),
            (ItemKind::Struct, &*STRUCT_RE),
            (ItemKind::Enum, &*ENUM_RE),
            (ItemKind::Trait, &*TRAIT_RE),
            (ItemKind::Impl, &*IMPL_RE),
            (ItemKind::Module, &*MOD_RE),
            (ItemKind::Constant, &*CONST_RE),
            (ItemKind::Macro, &*MACRO_RE),
            (ItemKind::Use, &*USE_RE),
        ];

        let mut items = Vec::new();
        for (kind, re) in matchers {
            for caps in re.captures_iter(block) {
                let (keyword_start, name_end, name) = match caps.get(1) {
                    Some(group) if kind == ItemKind::Impl => (start + group.start(), start + group.end(), String::new()),
                    Some(group) => (
                        start + caps.get(0).map(|m| m.start()).unwrap_or(0),
                        start + group.end(),
                        group.as_str().to_string(),
                    ),
                    None => {
                        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
                        (start + whole.0, start + whole.1, String::new())
                    }
                };
                if self.depths[keyword_start] != base {
                    continue;
                }
                // `'static` is a lifetime, not an item
                if kind == ItemKind::Constant
                    && keyword_start > 0
                    && self.masked.as_bytes()[keyword_start - 1] == b'\''
                {
                    continue;
                }
                // const generic parameters, as in `struct Buf<const N: usize>`
                if kind == ItemKind::Constant
                    && matches!(previous_token_byte(&self.masked, keyword_start), Some(b'<') | Some(b','))
                {
                    continue;
                }
                items.push(ItemMatch {
                    kind,
                    start: keyword_start,
                    name_end,
                    name,
                });
            }
        }
        items.sort_by_key(|item| item.start);
        items
    }

    /// Extract every item declared directly inside `start..end`.
    fn scan_block(
        &mut self,
        start: usize,
        end: usize,
        scope: &str,
        container: Option<&DeclarationNode>,
    ) {
        for item in self.collect_items(start, end) {
            let node = match item.kind {
                ItemKind::Function => self.extract_function(&item, scope),
                ItemKind::Struct => Some(self.extract_type(&item, scope, NodeKind::Struct)),
                ItemKind::Enum => Some(self.extract_type(&item, scope, NodeKind::Enum)),
                ItemKind::Trait => Some(self.extract_trait(&item, scope)),
                ItemKind::Impl => self.extract_impl(&item, scope),
                ItemKind::Module => Some(self.extract_module(&item, scope)),
                ItemKind::Constant => Some(self.extract_constant(&item, scope)),
                ItemKind::Macro => Some(self.extract_macro(&item, scope)),
                ItemKind::Use => self.extract_use(&item, scope),
            };

            if let (Some(parent), Some(child)) = (container, node.as_ref()) {
                self.edges.push(RawEdge::between(parent, child, EdgeKind::Contains));
            }
        }
    }

    fn extract_function(&mut self, item: &ItemMatch, scope: &str) -> Option<DeclarationNode> {
        let (header, terminator) = header_end(&self.masked, item.name_end)?;
        let node = DeclarationNode::new(
            NodeKind::Function,
            item.name.clone(),
            scope,
            self.file.clone(),
            self.line(item.start),
        )
        .with_signature(self.signature(item.start, header))
        .with_visibility(self.visibility(item.start));
        self.nodes.push(node.clone());

        if terminator == b'{' {
            let close = matching_brace(&self.masked, header);
            let nested = self.nested_item_spans(header + 1, close);
            self.extract_calls(&node, &subtract(header + 1, close, &nested));
        }
        Some(node)
    }

    /// Spans of the brace-bodied items declared directly inside `start..end`.
    fn nested_item_spans(&self, start: usize, end: usize) -> Vec<(usize, usize)> {
        if start >= end || end > self.masked.len() {
            return Vec::new();
        }
        self.collect_items(start, end)
            .into_iter()
            .filter(|item| {
                matches!(
                    item.kind,
                    ItemKind::Function | ItemKind::Impl | ItemKind::Trait | ItemKind::Module
                )
            })
            .filter_map(|item| match header_end(&self.masked, item.name_end)? {
                (open, b'{') => Some((item.start, matching_brace(&self.masked, open) + 1)),
                _ => None,
            })
            .collect()
    }

    fn extract_type(&mut self, item: &ItemMatch, scope: &str, kind: NodeKind) -> DeclarationNode {
        let signature = header_end(&self.masked, item.name_end)
            .and_then(|(header, _)| self.signature(item.start, header));
        let node = DeclarationNode::new(kind, item.name.clone(), scope, self.file.clone(), self.line(item.start))
            .with_signature(signature)
            .with_visibility(self.visibility(item.start));
        self.nodes.push(node.clone());
        node
    }

    fn extract_trait(&mut self, item: &ItemMatch, scope: &str) -> DeclarationNode {
        let header = header_end(&self.masked, item.name_end);
        let signature = header.and_then(|(pos, _)| self.signature(item.start, pos));
        let node = DeclarationNode::new(
            NodeKind::Trait,
            item.name.clone(),
            scope,
            self.file.clone(),
            self.line(item.start),
        )
        .with_signature(signature)
        .with_visibility(self.visibility(item.start));
        self.nodes.push(node.clone());

        let Some((header, terminator)) = header else {
            return node;
        };

        for bound in supertraits(&self.masked[item.name_end..header]) {
            let target = SymbolRef::new(bound, scope, "trait").accepting(&[NodeKind::Trait]);
            self.edges.push(RawEdge::to_symbol(&node, target, EdgeKind::Extends));
        }

        if terminator == b'{' {
            let close = matching_brace(&self.masked, header);
            let inner_scope = join(scope, &item.name);
            self.scan_block(header + 1, close, &inner_scope, Some(&node));
        }
        node
    }

    fn extract_impl(&mut self, item: &ItemMatch, scope: &str) -> Option<DeclarationNode> {
        let (header, terminator) = header_end(&self.masked, item.name_end)?;
        let (trait_name, type_name) = parse_impl_header(&self.masked[item.name_end..header])?;

        let name = match &trait_name {
            Some(trait_name) => format!("{} for {}", trait_name, type_name),
            None => type_name.clone(),
        };
        let node = DeclarationNode::new(NodeKind::Impl, name, scope, self.file.clone(), self.line(item.start))
            .with_signature(self.signature(item.start, header));
        self.nodes.push(node.clone());

        if let Some(trait_name) = trait_name {
            let implementor = SymbolRef::new(type_name.clone(), scope, "struct")
                .accepting(&[NodeKind::Struct, NodeKind::Enum]);
            let target = SymbolRef::new(trait_name, scope, "trait").accepting(&[NodeKind::Trait]);
            self.edges.push(RawEdge::symbolic(implementor, target, EdgeKind::Implements, self.file.clone()));
        }

        if terminator == b'{' {
            let close = matching_brace(&self.masked, header);
            let inner_scope = join(scope, &type_name);
            self.scan_block(header + 1, close, &inner_scope, Some(&node));
        }
        Some(node)
    }

    fn extract_module(&mut self, item: &ItemMatch, scope: &str) -> DeclarationNode {
        let node = DeclarationNode::new(
            NodeKind::Module,
            item.name.clone(),
            scope,
            self.file.clone(),
            self.line(item.start),
        )
        .with_visibility(self.visibility(item.start));
        self.nodes.push(node.clone());

        if let Some((header, b'{')) = header_end(&self.masked, item.name_end) {
            let close = matching_brace(&self.masked, header);
            let inner_scope = join(scope, &item.name);
            self.scan_block(header + 1, close, &inner_scope, Some(&node));
        }
        node
    }

    fn extract_constant(&mut self, item: &ItemMatch, scope: &str) -> DeclarationNode {
        let end = statement_end(&self.masked, item.name_end);
        let declaration = &self.masked[item.start..end];
        let header = declaration.find('=').map(|p| item.start + p).unwrap_or(end);
        let node = DeclarationNode::new(
            NodeKind::Constant,
            item.name.clone(),
            scope,
            self.file.clone(),
            self.line(item.start),
        )
        .with_signature(self.signature(item.start, header))
        .with_visibility(self.visibility(item.start));
        self.nodes.push(node.clone());
        node
    }

    fn extract_macro(&mut self, item: &ItemMatch, scope: &str) -> DeclarationNode {
        let node = DeclarationNode::new(
            NodeKind::Macro,
            item.name.clone(),
            scope,
            self.file.clone(),
            self.line(item.start),
        );
        self.nodes.push(node.clone());
        node
    }

    fn extract_use(&mut self, item: &ItemMatch, scope: &str) -> Option<DeclarationNode> {
        let end = statement_end(&self.masked, item.name_end);
        let tree = collapse_whitespace(&self.masked[item.name_end..end]);
        if tree.is_empty() {
            return None;
        }

        let node = DeclarationNode::new(NodeKind::Use, tree.clone(), scope, self.file.clone(), self.line(item.start))
            .with_visibility(self.visibility(item.start));
        self.nodes.push(node.clone());

        for (prefix, leaf) in use_leaves(&tree) {
            let target = SymbolRef::new(leaf, prefix, "symbol").accepting(&[
                NodeKind::Function,
                NodeKind::Struct,
                NodeKind::Enum,
                NodeKind::Trait,
                NodeKind::Module,
                NodeKind::Constant,
                NodeKind::Macro,
            ]);
            self.edges.push(RawEdge::to_symbol(&node, target, EdgeKind::Uses));
        }
        Some(node)
    }

    /// Record a `calls` edge for every call-like identifier in `ranges`.
    fn extract_calls(&mut self, caller: &DeclarationNode, ranges: &[(usize, usize)]) {
        let mut targets = Vec::new();
        for &(start, end) in ranges {
            let end = end.min(self.masked.len());
            if start >= end {
                continue;
            }
            let body = &self.masked[start..end];
            for caps in CALL_RE.captures_iter(body) {
                let Some(ident) = caps.get(1) else { continue };
                let name = ident.as_str();
                if CALL_DENYLIST.contains(&name) || follows_fn_keyword(body, ident.start()) {
                    continue;
                }
                targets.push(name.to_string());
            }
        }

        for name in targets {
            let target = SymbolRef::new(name, caller.qualified_path.clone(), "function")
                .accepting(&[NodeKind::Function]);
            self.edges.push(RawEdge::to_symbol(caller, target, EdgeKind::Calls));
        }
    }

    fn visibility(&self, keyword_start: usize) -> Visibility {
        let line_start = self.lines[line_of(&self.lines, keyword_start) - 1];
        let mut window_start = keyword_start.saturating_sub(VISIBILITY_WINDOW).max(line_start);
        while !self.masked.is_char_boundary(window_start) {
            window_start += 1;
        }
        let window = &self.masked[window_start..keyword_start];

        match VISIBILITY_RE.captures(window) {
            None => Visibility::Private,
            Some(caps) => match caps.get(1).map(|m| m.as_str().trim()) {
                None => Visibility::Public,
                Some("crate") => Visibility::Crate,
                Some("super") | Some("self") => Visibility::Super,
                Some(_) => Visibility::Restricted,
            },
        }
    }

    fn signature(&self, start: usize, end: usize) -> Option<String> {
        let text = collapse_whitespace(self.source.get(start..end)?);
        (!text.is_empty()).then_some(text)
    }

    fn line(&self, pos: usize) -> usize {
        line_of(&self.lines, pos)
    }
}

fn join(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", scope, SEPARATOR, name)
    }
}

/// Last non-whitespace byte before `pos`.
fn previous_token_byte(masked: &str, pos: usize) -> Option<u8> {
    masked.as_bytes()[..pos]
        .iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        .copied()
}

/// True when the identifier at `pos` is the name in a nested `fn name(` header.
fn follows_fn_keyword(text: &str, pos: usize) -> bool {
    let before = text[..pos].trim_end();
    before.ends_with("fn")
        && before
            .as_bytes()
            .get(before.len().wrapping_sub(3))
            .map_or(true, |&b| !is_ident_byte(b))
}

/// Split an impl header (text after `impl`) into `(trait, type)` simple names.
fn parse_impl_header(header: &str) -> Option<(Option<String>, String)> {
    let mut text = header.trim_start();
    if text.starts_with('<') {
        let close = matching_angle(text, 0);
        text = &text[close..];
    }
    if let Some(m) = WHERE_RE.find(text) {
        text = &text[..m.start()];
    }

    let split = FOR_RE
        .find_iter(text)
        .find(|m| angle_depth(&text[..m.start()]) == 0);

    match split {
        Some(m) => {
            let trait_name = simple_type_name(text[..m.start()].trim_start_matches(|c: char| c == '!' || c.is_whitespace()))?;
            let type_name = simple_type_name(&text[m.end()..])?;
            Some((Some(trait_name), type_name))
        }
        None => simple_type_name(text).map(|type_name| (None, type_name)),
    }
}

fn angle_depth(text: &str) -> i32 {
    let mut depth = 0;
    let mut prev = '\0';
    for c in text.chars() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => depth -= 1,
            _ => {}
        }
        prev = c;
    }
    depth
}

/// `&'a mut foo::Bar<T>` -> `Bar`
fn simple_type_name(text: &str) -> Option<String> {
    let mut text = text.trim();
    loop {
        let before = text;
        text = text.trim_start_matches(['&', '*', '(', '?']).trim_start();
        if let Some(rest) = text.strip_prefix('\'') {
            let skip = rest.find(|c: char| !(c.is_alphanumeric() || c == '_')).unwrap_or(rest.len());
            text = rest[skip..].trim_start();
        }
        for keyword in ["mut ", "dyn ", "const "] {
            if let Some(rest) = text.strip_prefix(keyword) {
                text = rest.trim_start();
            }
        }
        if text == before {
            break;
        }
    }

    let path = text.split(['<', '(', '[', ' ', ')']).next().unwrap_or("");
    let name = path.rsplit(SEPARATOR).next().unwrap_or("").trim();
    let valid = !name.is_empty() && name.bytes().all(is_ident_byte);
    valid.then(|| name.to_string())
}

/// Trait bounds listed after `trait Name<…>:`.
fn supertraits(after_name: &str) -> Vec<String> {
    let mut text = after_name.trim_start();
    if text.starts_with('<') {
        let close = matching_angle(text, 0);
        text = &text[close..];
    }
    let Some(bounds) = text.trim_start().strip_prefix(':') else {
        return Vec::new();
    };
    let bounds = match WHERE_RE.find(bounds) {
        Some(m) => &bounds[..m.start()],
        None => bounds,
    };

    split_top_level(bounds, '+')
        .into_iter()
        .map(str::trim)
        .filter(|bound| !bound.is_empty() && !bound.starts_with('\'') && !bound.starts_with('?'))
        .filter_map(simple_type_name)
        .collect()
}

/// Flatten a use tree into `(path prefix, imported name)` pairs.
fn use_leaves(tree: &str) -> Vec<(String, String)> {
    let mut leaves = Vec::new();
    collect_use_leaves("", tree, &mut leaves);
    leaves
}

fn collect_use_leaves(prefix: &str, tree: &str, leaves: &mut Vec<(String, String)>) {
    let tree = tree.trim().trim_start_matches(SEPARATOR);
    if tree.is_empty() {
        return;
    }

    if let Some(open) = tree.find('{') {
        let head = tree[..open].trim().trim_end_matches(SEPARATOR);
        let close = tree.rfind('}').unwrap_or(tree.len());
        let inner = &tree[open + 1..close.max(open + 1)];
        let nested_prefix = join_use_path(prefix, head);
        for part in split_top_level(inner, ',') {
            collect_use_leaves(&nested_prefix, part, leaves);
        }
        return;
    }

    // `a::b as c` imports `b`
    let path = tree.split(" as ").next().unwrap_or(tree).trim();
    let full = join_use_path(prefix, path);
    let mut segments: Vec<&str> = full.split(SEPARATOR).map(str::trim).collect();
    if segments.last() == Some(&"self") {
        segments.pop();
    }
    let Some(leaf) = segments.pop() else { return };
    if matches!(leaf, "*" | "self" | "super" | "crate" | "") {
        return;
    }
    leaves.push((segments.join(SEPARATOR), leaf.to_string()));
}

fn join_use_path(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}{}{}", prefix, SEPARATOR, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Endpoint;

    fn extract(path: &str, source: &str) -> FileExtraction {
        RustLanguage::new().extract_file(Path::new(path), source).unwrap()
    }

    fn node<'a>(extraction: &'a FileExtraction, kind: NodeKind, name: &str) -> &'a DeclarationNode {
        extraction
            .nodes
            .iter()
            .find(|n| n.kind == kind && n.name == name)
            .unwrap_or_else(|| panic!("missing {} {}", kind, name))
    }

    fn symbol_targets(extraction: &FileExtraction, kind: EdgeKind) -> Vec<String> {
        extraction
            .edges
            .iter()
            .filter(|e| e.kind == kind)
            .filter_map(|e| match &e.target {
                Endpoint::Symbol(s) => Some(s.name.clone()),
                Endpoint::Node(id) => Some(id.clone()),
            })
            .collect()
    }

    #[test]
    fn test_module_path_drops_src_and_file_name() {
        let lang = RustLanguage::new();
        assert_eq!(lang.module_path(Path::new("src/lib.rs")), "");
        assert_eq!(lang.module_path(Path::new("src/mod_a/mod_b/file2.rs")), "mod_a::mod_b");
        assert_eq!(lang.module_path(Path::new("mod_a/file1.rs")), "mod_a");
    }

    #[test]
    fn test_functions_visibility_and_calls() {
        let graph = extract("lib.rs", "pub fn a() { b(); }\nfn b() {}\n");

        let a = node(&graph, NodeKind::Function, "a");
        let b = node(&graph, NodeKind::Function, "b");
        assert_eq!(a.visibility, Some(Visibility::Public));
        assert_eq!(b.visibility, Some(Visibility::Private));
        assert_eq!(a.signature.as_deref(), Some("fn a()"));
        assert_eq!(b.line, 2);

        let calls: Vec<_> = graph.edges.iter().filter(|e| e.kind == EdgeKind::Calls).collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source, Endpoint::Node(a.id.clone()));
        assert_eq!(symbol_targets(&graph, EdgeKind::Calls), vec!["b"]);
    }

    #[test]
    fn test_restricted_visibility_variants() {
        let graph = extract(
            "lib.rs",
            "pub(crate) struct A;\npub(super) enum B { X }\npub(in crate::x) const C: u8 = 1;\npub async fn d() {}",
        );
        assert_eq!(node(&graph, NodeKind::Struct, "A").visibility, Some(Visibility::Crate));
        assert_eq!(node(&graph, NodeKind::Enum, "B").visibility, Some(Visibility::Super));
        assert_eq!(node(&graph, NodeKind::Constant, "C").visibility, Some(Visibility::Restricted));
        assert_eq!(node(&graph, NodeKind::Function, "d").visibility, Some(Visibility::Public));
    }

    #[test]
    fn test_impl_methods_are_scoped_and_contained() {
        let source = r#"
pub struct Server { port: u16 }

impl Server {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn start(&self) {
        bind(self.port);
    }
}

impl std::fmt::Display for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.port)
    }
}
"#;
        let graph = extract("src/net/server.rs", source);

        let new = node(&graph, NodeKind::Function, "new");
        assert_eq!(new.qualified_path, "net::Server");
        node(&graph, NodeKind::Impl, "Server");
        let display = node(&graph, NodeKind::Impl, "Display for Server");
        assert_eq!(display.qualified_path, "net");

        let contains = graph.edges.iter().filter(|e| e.kind == EdgeKind::Contains).count();
        assert_eq!(contains, 3);

        let implements: Vec<_> = graph.edges.iter().filter(|e| e.kind == EdgeKind::Implements).collect();
        assert_eq!(implements.len(), 1);
        match (&implements[0].source, &implements[0].target) {
            (Endpoint::Symbol(ty), Endpoint::Symbol(tr)) => {
                assert_eq!(ty.name, "Server");
                assert_eq!(tr.name, "Display");
            }
            other => panic!("unexpected endpoints {:?}", other),
        }

        assert_eq!(symbol_targets(&graph, EdgeKind::Calls), vec!["bind"]);
    }

    #[test]
    fn test_generic_impl_header() {
        assert_eq!(
            parse_impl_header(" <T: Clone + Fn() -> u8> From<Vec<T>> for Wrapper<T> where T: Send "),
            Some((Some("From".to_string()), "Wrapper".to_string()))
        );
        assert_eq!(parse_impl_header(" <'a> Parser<'a> "), Some((None, "Parser".to_string())));
    }

    #[test]
    fn test_traits_modules_and_supertraits() {
        let source = r#"
pub trait Shape: Clone + std::fmt::Debug {
    fn area(&self) -> f64;
    fn describe(&self) -> String { format_area(self.area()) }
}

mod inner {
    pub fn helper() {}
    mod deeper {
        fn leaf() {}
    }
}

mod external;
"#;
        let graph = extract("src/geo/mod.rs", source);

        let area = node(&graph, NodeKind::Function, "area");
        assert_eq!(area.qualified_path, "geo::Shape");
        assert_eq!(node(&graph, NodeKind::Function, "helper").qualified_path, "geo::inner");
        assert_eq!(node(&graph, NodeKind::Function, "leaf").qualified_path, "geo::inner::deeper");
        node(&graph, NodeKind::Module, "external");

        assert_eq!(symbol_targets(&graph, EdgeKind::Extends), vec!["Clone", "Debug"]);
        assert_eq!(symbol_targets(&graph, EdgeKind::Calls), vec!["format_area", "area"]);
    }

    #[test]
    fn test_use_statements_produce_uses_edges() {
        let graph = extract(
            "src/main.rs",
            "use std::collections::{HashMap, HashSet as Set};\npub use crate::model::{self, Node};\n",
        );
        let uses: Vec<_> = graph.nodes.iter().filter(|n| n.kind == NodeKind::Use).collect();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[1].visibility, Some(Visibility::Public));

        let targets: Vec<String> = graph
            .edges
            .iter()
            .filter_map(|e| match &e.target {
                Endpoint::Symbol(s) => Some(format!("{}|{}", s.scope, s.name)),
                _ => None,
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                "std::collections|HashMap",
                "std::collections|HashSet",
                "crate|model",
                "crate::model|Node"
            ]
        );
    }

    #[test]
    fn test_strings_comments_and_nested_fns_do_not_leak() {
        let source = r#"
// fn commented() {}
const BANNER: &'static str = "fn fake() { }";
static mut COUNTER: u32 = 0;

fn outer(x: &'static str) -> usize {
    fn inner(y: usize) -> usize { y }
    let s = "call(1)";
    if x.is_empty() { inner(0) } else { x.len() }
}
"#;
        let graph = extract("lib.rs", source);
        let functions: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Function)
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(functions, vec!["outer"]);

        let constants: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Constant)
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(constants, vec!["BANNER", "COUNTER"]);

        assert_eq!(symbol_targets(&graph, EdgeKind::Calls), vec!["is_empty", "inner", "len"]);
    }

    #[test]
    fn test_const_generic_parameters_are_not_constants() {
        let source = "\
pub struct Buf<const N: usize> { data: [u8; N] }
fn make<const M: usize>() -> Buf<M> { todo() }
impl<T, const K: usize> Buf<K> {}
pub const LIMIT: usize = 4;
";
        let graph = extract("lib.rs", source);
        let constants: Vec<_> = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Constant)
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(constants, vec!["LIMIT"]);
        assert_eq!(
            node(&graph, NodeKind::Constant, "LIMIT").signature.as_deref(),
            Some("const LIMIT: usize")
        );
        assert_eq!(symbol_targets(&graph, EdgeKind::Calls), vec!["todo"]);
    }

    #[test]
    fn test_nested_item_bodies_are_not_scanned_for_calls() {
        let source = "\
fn outer() {
    fn helper() { deep(); }
    impl Local { fn go(&self) { further(); } }
    helper();
}
";
        let graph = extract("lib.rs", source);
        assert_eq!(symbol_targets(&graph, EdgeKind::Calls), vec!["helper"]);
    }

    #[test]
    fn test_macro_rules_declaration() {
        let graph = extract("lib.rs", "macro_rules! square { ($x:expr) => { $x * $x }; }\n");
        node(&graph, NodeKind::Macro, "square");
    }

    #[test]
    fn test_unterminated_body_fails_soft() {
        let graph = extract("lib.rs", "fn broken() { call_me(\n");
        node(&graph, NodeKind::Function, "broken");
        assert_eq!(symbol_targets(&graph, EdgeKind::Calls), vec!["call_me"]);
    }
}
