use ra_ap_syntax::{AstNode, Edition, NodeOrToken, SourceFile, SyntaxKind, SyntaxNode, SyntaxToken};

/// FFI and unsafe-code counts for a single source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceFileInfo {
    pub lines: u64,
    pub extern_c: u64,
    pub link_attrs: u64,
    pub no_mangle: u64,
    pub unsafe_blocks: u64,
    pub unsafe_fns: u64,
    pub max_depth: u64,
    pub has_errors: bool,
}

impl SourceFileInfo {
    /// Whether the file declares anything that crosses the language boundary.
    #[must_use]
    pub const fn has_boundary_constructs(&self) -> bool {
        self.extern_c + self.link_attrs + self.no_mangle > 0
    }
}

#[derive(Default)]
struct SourceFileAnalyzer {
    info: SourceFileInfo,
    depth: u64,
}

impl SourceFileAnalyzer {
    fn analyze(&mut self, node: &SyntaxNode) {
        self.depth += 1;
        self.info.max_depth = self.info.max_depth.max(self.depth);

        self.process_node(node);

        for element in node.children_with_tokens() {
            match element {
                NodeOrToken::Node(child_node) => self.analyze(&child_node),
                NodeOrToken::Token(token) => self.process_token(&token),
            }
        }

        self.depth -= 1;
    }

    fn process_node(&mut self, node: &SyntaxNode) {
        match node.kind() {
            SyntaxKind::EXTERN_BLOCK => {
                if has_c_family_abi(node) {
                    self.info.extern_c += 1;
                }
            }
            SyntaxKind::ATTR => match attribute_name(&node.text().to_string()).as_str() {
                "link" => self.info.link_attrs += 1,
                "no_mangle" => self.info.no_mangle += 1,
                _ => {}
            },
            _ => {}
        }
    }

    fn process_token(&mut self, token: &SyntaxToken) {
        if token.kind() != SyntaxKind::UNSAFE_KW {
            return;
        }

        if let Some(parent) = token.parent() {
            match parent.kind() {
                SyntaxKind::BLOCK_EXPR => self.info.unsafe_blocks += 1,
                SyntaxKind::FN => self.info.unsafe_fns += 1,
                _ => {}
            }
        }
    }
}

/// `extern { }` defaults to the C ABI; explicit ABIs count when they are C-compatible.
fn has_c_family_abi(extern_block: &SyntaxNode) -> bool {
    let Some(abi) = extern_block.children().find(|child| child.kind() == SyntaxKind::ABI) else {
        return false;
    };

    let text = abi.text().to_string();
    let name = text.trim_start_matches("extern").trim().trim_matches('"');
    matches!(name, "" | "C" | "C-unwind" | "system" | "system-unwind")
}

/// The path an attribute starts with, looking through `unsafe(...)`.
///
/// `#[link(name = "z")]` yields `link`, `#[unsafe(no_mangle)]` yields `no_mangle`.
fn attribute_name(attr_text: &str) -> String {
    let body: String = attr_text.chars().filter(|c| !c.is_whitespace()).collect();
    let body = body.trim_start_matches('#').trim_start_matches('!').trim_start_matches('[').trim_end_matches(']');
    let body = body
        .strip_prefix("unsafe(")
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(body);

    body.split(['(', '=', '[']).next().unwrap_or_default().to_string()
}

pub fn analyze_source_file(source_file: &str) -> SourceFileInfo {
    let parse = SourceFile::parse(source_file, Edition::CURRENT);
    let root = parse.tree().syntax().clone();

    let mut analyzer = SourceFileAnalyzer::default();
    analyzer.analyze(&root);

    SourceFileInfo {
        lines: source_file.lines().count() as u64,
        has_errors: !parse.errors().is_empty(),
        ..analyzer.info
    }
}
