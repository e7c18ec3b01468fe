//! Python language support

mod lexer;

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::model::{DeclarationNode, EdgeKind, FileExtraction, NodeKind, RawEdge, SymbolRef};
use crate::languages::text::{collapse_whitespace, line_of, line_starts, subtract};
use crate::languages::{relative_file_name, LanguageSupport};

use self::lexer::{
    header_colon, indent_width, is_identifier, line_infos, mask, matching_paren, split_commas,
    LineInfo,
};

const SEPARATOR: &str = ".";

static DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)((?:async[ \t]+)?def)[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(").unwrap()
});
static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)(class)[ \t]+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^([ \t]*)import[ \t]+([^\n]+)").unwrap());
static FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*)from[ \t]+([.\w]+)[ \t]+import[ \t]+(\([^)]*\)|[^\n]+)").unwrap()
});
static ASSIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([A-Za-z_][A-Za-z0-9_]*)[ \t]*(?::[^=\n]*)?=[^=]").unwrap());
static CALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(").unwrap());

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import", "in",
    "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with",
    "yield", "match", "case",
];

/// Builtins that are called everywhere and never resolve to project code.
const BUILTINS: &[&str] = &[
    "print", "len", "range", "str", "int", "float", "list", "dict", "set", "tuple", "isinstance",
    "issubclass", "super", "type", "open", "enumerate", "zip", "map", "filter", "sorted", "reversed",
    "getattr", "setattr", "hasattr", "bool", "repr", "min", "max", "sum", "any", "all", "abs",
    "iter", "next", "id", "hash", "format", "vars", "dir", "callable", "object",
];

const CALLABLE_KINDS: &[NodeKind] = &[NodeKind::Function, NodeKind::Method, NodeKind::Class];

/// Python language support implementation
pub struct PythonLanguage;

impl PythonLanguage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PythonLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageSupport for PythonLanguage {
    fn language_id(&self) -> &str {
        "python"
    }

    fn file_extensions(&self) -> &[&str] {
        &[".py"]
    }

    /// Dotted path of the file without its extension; `__init__` names its package.
    fn module_path(&self, relative_path: &Path) -> String {
        let mut segments: Vec<String> = relative_path
            .parent()
            .map(|dir| {
                dir.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        if let Some(stem) = relative_path.file_stem().map(|s| s.to_string_lossy()) {
            if stem != "__init__" {
                segments.push(stem.into_owned());
            }
        }
        segments.join(SEPARATOR)
    }

    fn extract_file(&self, relative_path: &Path, source: &str) -> Result<FileExtraction> {
        let module_path = self.module_path(relative_path);
        let is_package = relative_path
            .file_stem()
            .map(|s| s == "__init__")
            .unwrap_or(false);
        let extractor = PythonGraphExtractor::new(source, relative_file_name(relative_path), module_path, is_package);
        Ok(extractor.extract())
    }
}

/// A `def` or `class` with the extent of its body.
#[derive(Debug, Clone)]
struct Scope {
    node: DeclarationNode,
    /// First decorator line, or the header line when undecorated
    decl_start: usize,
    body_start: usize,
    body_end: usize,
    parent: Option<usize>,
}

impl Scope {
    fn full_path(&self) -> String {
        join(&self.node.qualified_path, &self.node.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Def,
    Class,
}

/// A `def`/`class` keyword found at the start of a line.
#[derive(Debug, Clone)]
struct Header {
    kind: HeaderKind,
    line_start: usize,
    keyword_start: usize,
    name_end: usize,
    indent: usize,
    name: String,
}

/// Helper for extracting graph data from Python source
struct PythonGraphExtractor<'a> {
    source: &'a str,
    masked: String,
    lines: Vec<LineInfo>,
    line_offsets: Vec<usize>,
    file: String,
    module_path: String,
    is_package: bool,
    module: Option<DeclarationNode>,
    scopes: Vec<Scope>,
    nodes: Vec<DeclarationNode>,
    edges: Vec<RawEdge>,
}

impl<'a> PythonGraphExtractor<'a> {
    fn new(source: &'a str, file: String, module_path: String, is_package: bool) -> Self {
        let masked = mask(source);
        let lines = line_infos(&masked);
        Self {
            source,
            line_offsets: line_starts(source),
            masked,
            lines,
            file,
            module_path,
            is_package,
            module: None,
            scopes: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn extract(mut self) -> FileExtraction {
        self.extract_module();
        self.extract_scopes();
        self.extract_imports();
        self.extract_assignments();
        self.extract_all_calls();
        FileExtraction {
            nodes: self.nodes,
            edges: self.edges,
        }
    }

    fn extract_module(&mut self) {
        if self.module_path.is_empty() {
            return;
        }
        let (path, name) = match self.module_path.rsplit_once('.') {
            Some((path, name)) => (path.to_string(), name.to_string()),
            None => (String::new(), self.module_path.clone()),
        };
        let mut node = DeclarationNode::new(NodeKind::Module, name, path, self.file.clone(), 1);
        node.docstring = self.docstring(0, self.masked.len());
        self.nodes.push(node.clone());
        self.module = Some(node);
    }

    fn headers(&self) -> Vec<Header> {
        let mut headers = Vec::new();
        for (kind, re) in [(HeaderKind::Def, &*DEF_RE), (HeaderKind::Class, &*CLASS_RE)] {
            for caps in re.captures_iter(&self.masked) {
                let (Some(whole), Some(indent), Some(keyword), Some(name)) =
                    (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
                else {
                    continue;
                };
                headers.push(Header {
                    kind,
                    line_start: whole.start(),
                    keyword_start: keyword.start(),
                    name_end: name.end(),
                    indent: indent_width(indent.as_str()),
                    name: name.as_str().to_string(),
                });
            }
        }
        headers.sort_by_key(|h| h.line_start);
        headers
    }

    fn extract_scopes(&mut self) {
        let mut stack: Vec<usize> = Vec::new();

        for header in self.headers() {
            let Some(colon) = header_colon(&self.masked, header.name_end) else {
                continue;
            };
            let (decorators, decl_start) = self.decorators(header.line_start);
            let body_start = colon + 1;
            let body_end = self.block_end(colon, header.indent);

            while let Some(&top) = stack.last() {
                if self.scopes[top].body_end <= decl_start {
                    stack.pop();
                } else {
                    break;
                }
            }
            let parent = stack.last().copied();

            let (kind, path) = match parent.map(|idx| &self.scopes[idx]) {
                Some(enclosing) => {
                    let kind = match (header.kind, enclosing.node.kind) {
                        (HeaderKind::Class, _) => NodeKind::Class,
                        (HeaderKind::Def, NodeKind::Class) => NodeKind::Method,
                        (HeaderKind::Def, _) => NodeKind::Function,
                    };
                    (kind, enclosing.full_path())
                }
                None => {
                    let kind = match header.kind {
                        HeaderKind::Class => NodeKind::Class,
                        HeaderKind::Def => NodeKind::Function,
                    };
                    (kind, self.module_path.clone())
                }
            };

            let mut node = DeclarationNode::new(kind, header.name.clone(), path, self.file.clone(), self.line(header.line_start))
                .with_signature(self.signature(header.keyword_start, colon));
            node.docstring = self.docstring(body_start, body_end);
            node.decorators = decorators;
            self.nodes.push(node.clone());

            let container = match parent {
                Some(idx) => Some(self.scopes[idx].node.clone()),
                None => self.module.clone(),
            };
            if let Some(container) = container {
                self.edges.push(RawEdge::between(&container, &node, EdgeKind::Contains));
            }

            if header.kind == HeaderKind::Class {
                for base in self.bases(header.name_end, colon) {
                    let target = SymbolRef::new(base, node.qualified_path.clone(), "class")
                        .accepting(&[NodeKind::Class]);
                    self.edges.push(RawEdge::to_symbol(&node, target, EdgeKind::Inherits));
                }
            }
            for decorator in &node.decorators {
                let name = decorator.rsplit('.').next().unwrap_or(decorator).to_string();
                let target = SymbolRef::new(name, node.qualified_path.clone(), "decorator")
                    .accepting(&[NodeKind::Function, NodeKind::Class]);
                self.edges.push(RawEdge::to_symbol(&node, target, EdgeKind::Uses));
            }

            self.scopes.push(Scope {
                node,
                decl_start,
                body_start,
                body_end,
                parent,
            });
            stack.push(self.scopes.len() - 1);
        }
    }

    /// Decorator names above the header at `line_start` and where the
    /// decorated declaration begins.
    fn decorators(&self, line_start: usize) -> (Vec<String>, usize) {
        let mut decorators = Vec::new();
        let mut decl_start = line_start;
        let header_line = line_of(&self.line_offsets, line_start) - 1;

        for info in self.lines[..header_line].iter().rev() {
            if info.blank {
                continue;
            }
            let masked_line = self.masked[info.start..info.end].trim_start();
            if !masked_line.starts_with('@') {
                break;
            }
            let text = self.source[info.start..info.end].trim_start();
            let name = text[1..]
                .split(|c: char| c == '(' || c.is_whitespace())
                .next()
                .unwrap_or_default()
                .to_string();
            if !name.is_empty() {
                decorators.push(name);
            }
            decl_start = info.start;
        }

        decorators.reverse();
        (decorators, decl_start)
    }

    /// Offset where the body opened by the `:` at `colon` ends.
    fn block_end(&self, colon: usize, indent: usize) -> usize {
        let colon_line = line_of(&self.line_offsets, colon) - 1;
        self.lines[colon_line + 1..]
            .iter()
            .find(|info| !info.blank && !info.continuation && info.indent <= indent)
            .map(|info| info.start)
            .unwrap_or(self.masked.len())
    }

    fn bases(&self, name_end: usize, colon: usize) -> Vec<String> {
        let header = &self.masked[name_end..colon];
        let Some(open) = header.find('(') else {
            return Vec::new();
        };
        if !header[..open].trim().is_empty() {
            return Vec::new();
        }
        let open = name_end + open;
        let close = matching_paren(&self.masked, open).min(colon);

        split_commas(&self.masked[open + 1..close])
            .into_iter()
            .filter_map(|base| {
                let base = base.trim();
                if base.contains('=') || base.starts_with('*') {
                    return None;
                }
                let base = base.split('[').next().unwrap_or(base).trim();
                let last = base.rsplit('.').next().unwrap_or(base).trim();
                (is_identifier(last) && last != "object").then(|| last.to_string())
            })
            .collect()
    }

    fn extract_imports(&mut self) {
        let mut statements: Vec<(usize, usize, Vec<String>, Vec<String>)> = Vec::new();

        for caps in IMPORT_RE.captures_iter(&self.masked) {
            let (Some(whole), Some(list)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let list = list.as_str().split(';').next().unwrap_or_default();
            let modules: Vec<String> = split_commas(list)
                .into_iter()
                .filter_map(|entry| entry.split_whitespace().next().map(str::to_string))
                .filter(|module| !module.is_empty())
                .collect();
            statements.push((whole.start(), whole.end(), modules.clone(), modules));
        }

        for caps in FROM_RE.captures_iter(&self.masked) {
            let (Some(whole), Some(module), Some(list)) = (caps.get(0), caps.get(2), caps.get(3)) else {
                continue;
            };
            let list = list.as_str();
            let list = match list.strip_prefix('(') {
                Some(inner) => inner.trim_end().trim_end_matches(')'),
                None => list.split(';').next().unwrap_or_default(),
            };
            let names: Vec<String> = split_commas(list)
                .into_iter()
                .filter_map(|entry| entry.split_whitespace().next().map(str::to_string))
                .filter(|name| !name.is_empty())
                .collect();

            let (base, rest) = self.absolute_module(module.as_str());
            let targets: Vec<String> = if rest.is_empty() {
                names.iter().filter(|n| n.as_str() != "*").map(|n| join(&base, n)).collect()
            } else {
                vec![join(&base, &rest)]
            };
            statements.push((whole.start(), whole.end(), names, targets));
        }

        statements.sort_by_key(|(start, ..)| *start);

        for (start, end, names, targets) in statements {
            let path = self.enclosing_path(start);
            let signature = self.signature(start, end);
            let line = self.line(start);
            for name in names.into_iter().filter(|n| n != "*") {
                let node = DeclarationNode::new(NodeKind::Import, name, path.clone(), self.file.clone(), line)
                    .with_signature(signature.clone());
                self.nodes.push(node);
            }

            let Some(module) = self.module.clone() else {
                continue;
            };
            for target in targets.into_iter().filter(|t| !t.is_empty()) {
                let (prefix, name) = match target.rsplit_once('.') {
                    Some((prefix, name)) => (prefix.to_string(), name.to_string()),
                    None => (String::new(), target.clone()),
                };
                let symbol = SymbolRef::new(name, prefix.clone(), "module")
                    .at_path(prefix)
                    .accepting(&[NodeKind::Module]);
                self.edges.push(RawEdge::to_symbol(&module, symbol, EdgeKind::Imports));
            }
        }
    }

    /// Resolve leading dots of a `from` target against the current package.
    ///
    /// Returns the base package and the remaining dotted name.
    fn absolute_module(&self, target: &str) -> (String, String) {
        let dots = target.chars().take_while(|&c| c == '.').count();
        let rest = target[dots..].to_string();
        if dots == 0 {
            return (String::new(), rest);
        }

        let mut package: Vec<&str> = self.module_path.split('.').filter(|s| !s.is_empty()).collect();
        if !self.is_package {
            package.pop();
        }
        for _ in 1..dots {
            package.pop();
        }
        (package.join(SEPARATOR), rest)
    }

    fn extract_assignments(&mut self) {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for caps in ASSIGN_RE.captures_iter(&self.masked) {
            let Some(name) = caps.get(1) else { continue };
            if self.continues_previous(name.start())
                || KEYWORDS.contains(&name.as_str())
                || !seen.insert(name.as_str().to_string())
            {
                continue;
            }
            found.push((name.as_str().to_string(), name.start()));
        }

        for (name, start) in found {
            let kind = if is_constant_name(&name) {
                NodeKind::Constant
            } else {
                NodeKind::Variable
            };
            let node = DeclarationNode::new(kind, name, self.module_path.clone(), self.file.clone(), self.line(start));
            if let Some(module) = &self.module {
                self.edges.push(RawEdge::between(module, &node, EdgeKind::Contains));
            }
            self.nodes.push(node);
        }
    }

    fn extract_all_calls(&mut self) {
        let top_level: Vec<(usize, usize)> = self
            .scopes
            .iter()
            .filter(|s| s.parent.is_none())
            .map(|s| (s.decl_start, s.body_end))
            .collect();
        if let Some(module) = self.module.clone() {
            let ranges = subtract(0, self.masked.len(), &top_level);
            let scope = self.module_path.clone();
            self.extract_calls(&module, &scope, &ranges);
        }

        for idx in 0..self.scopes.len() {
            let children: Vec<(usize, usize)> = self
                .scopes
                .iter()
                .filter(|s| s.parent == Some(idx))
                .map(|s| (s.decl_start, s.body_end))
                .collect();
            let scope = &self.scopes[idx];
            let ranges = subtract(scope.body_start, scope.body_end, &children);
            let caller = scope.node.clone();
            let scope = caller.qualified_path.clone();
            self.extract_calls(&caller, &scope, &ranges);
        }
    }

    /// Record a `calls` edge for every call-like identifier in `ranges`,
    /// looked up from `scope`.
    fn extract_calls(&mut self, caller: &DeclarationNode, scope: &str, ranges: &[(usize, usize)]) {
        let mut targets = Vec::new();
        for &(start, end) in ranges {
            let end = end.min(self.masked.len());
            if start >= end {
                continue;
            }
            for caps in CALL_RE.captures_iter(&self.masked[start..end]) {
                let Some(ident) = caps.get(1) else { continue };
                let name = ident.as_str();
                if KEYWORDS.contains(&name) || BUILTINS.contains(&name) {
                    continue;
                }
                targets.push(name.to_string());
            }
        }

        for name in targets {
            let target = SymbolRef::new(name, scope, "function").accepting(CALLABLE_KINDS);
            self.edges.push(RawEdge::to_symbol(caller, target, EdgeKind::Calls));
        }
    }

    fn continues_previous(&self, pos: usize) -> bool {
        self.lines[line_of(&self.line_offsets, pos) - 1].continuation
    }

    /// Qualified path for a statement at `pos`: the innermost enclosing scope,
    /// or the module itself.
    fn enclosing_path(&self, pos: usize) -> String {
        self.scopes
            .iter()
            .filter(|s| s.body_start <= pos && pos < s.body_end)
            .max_by_key(|s| s.body_start)
            .map(Scope::full_path)
            .unwrap_or_else(|| self.module_path.clone())
    }

    /// First statement of the body when it is a string literal.
    fn docstring(&self, start: usize, end: usize) -> Option<String> {
        let end = end.min(self.masked.len());
        let body = self.masked.get(start..end)?;
        let offset = body.find(|c: char| !c.is_whitespace())?;
        let literal = &body[offset..];

        let prefix = literal
            .bytes()
            .take_while(|b| matches!(b, b'r' | b'R' | b'u' | b'U' | b'b' | b'B' | b'f' | b'F'))
            .count();
        if prefix > 2 {
            return None;
        }
        let quote = *literal.as_bytes().get(prefix)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }

        let quote = char::from(quote);
        let triple: String = [quote; 3].iter().collect();
        let closing = if literal[prefix..].starts_with(&triple) {
            triple
        } else {
            quote.to_string()
        };
        let open = start + offset + prefix + closing.len();
        let close = open + self.masked.get(open..end)?.find(&closing)?;

        let text = self.source.get(open..close)?;
        let cleaned = text.lines().map(str::trim).collect::<Vec<_>>().join("\n");
        let cleaned = cleaned.trim();
        (!cleaned.is_empty()).then(|| cleaned.to_string())
    }

    fn signature(&self, start: usize, end: usize) -> Option<String> {
        let text = collapse_whitespace(self.source.get(start..end)?);
        (!text.is_empty()).then_some(text)
    }

    fn line(&self, pos: usize) -> usize {
        line_of(&self.line_offsets, pos)
    }
}

fn join(path: &str, name: &str) -> String {
    match (path.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => path.to_string(),
        _ => format!("{}{}{}", path, SEPARATOR, name),
    }
}

fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_alphabetic()) && !name.chars().any(|c| c.is_lowercase())
}
