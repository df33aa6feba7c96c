//! Per-file analysis bundle.
//!
//! An `AnalyzedFile` owns everything derived from one file's bytes: the
//! token stream, the structural tree and the extracted facts. Rules borrow
//! it read-only, so a single bundle can be shared across rule threads.

use std::time::Instant;

use log::debug;

use super::{FileFacts, SourceFile, SyntaxTree};

#[derive(Debug, Clone)]
pub struct AnalyzedFile {
    pub source: SourceFile,
    pub tree: SyntaxTree,
    pub facts: FileFacts,
}

impl AnalyzedFile {
    /// Lex, build the tree and extract facts.
    pub fn analyze(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let started = Instant::now();
        let source = SourceFile::new(path, bytes);
        let tree = SyntaxTree::build(source.tokens());
        let facts = FileFacts::build(&source, &tree);
        debug!(
            "analyzed {}: {} tokens, {} nodes, {} lex errors, {} structure errors in {:?}",
            source.path(),
            source.tokens().len(),
            tree.len(),
            source.lex_errors().len(),
            tree.errors().len(),
            started.elapsed()
        );
        Self {
            source,
            tree,
            facts,
        }
    }

    pub fn from_text(path: impl Into<String>, text: &str) -> Self {
        Self::analyze(path, text.as_bytes().to_vec())
    }

    pub fn path(&self) -> &str {
        self.source.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_bundle() {
        let file = AnalyzedFile::from_text("m.c", "int g_x;\nint main(void)\n{\n    return g_x;\n}\n");
        assert_eq!(file.path(), "m.c");
        assert_eq!(file.facts.functions.len(), 1);
        assert_eq!(file.facts.variables.len(), 1);
        assert!(file.tree.errors().is_empty());
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let src = "void f(void)\n{\n    if (a) { b(); }\n}\n";
        let a = AnalyzedFile::from_text("a.c", src);
        let b = AnalyzedFile::from_text("a.c", src);
        assert_eq!(a.source.tokens(), b.source.tokens());
        assert_eq!(a.tree.len(), b.tree.len());
    }
}
