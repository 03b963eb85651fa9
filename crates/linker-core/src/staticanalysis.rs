//! The assigned-globals static-analysis collaborator (spec.md §6
//! `findAssignedGlobals`). Parses a script with the project's JS/TS parser
//! and walks the resulting AST for identifiers written to without a
//! matching declaration anywhere in the file — Meteor's own linker treats
//! this as a flat, scope-insensitive pass rather than full binding
//! resolution, and we follow that here.

use oxc_allocator::Allocator;
use oxc_ast::ast::{AssignmentTarget, BindingIdentifier, Program};
use oxc_ast::visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::collections::HashSet;

/// A parse failure reported by the collaborator (spec.md §6, §7
/// `ParseFailure`). Line/column are 0-based, matching the parser's own
/// offsets before any source-map translation.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

#[derive(Default)]
struct GlobalCollector {
    declared: HashSet<String>,
    assigned: HashSet<String>,
}

impl<'a> Visit<'a> for GlobalCollector {
    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.declared.insert(ident.name.to_string());
    }

    fn visit_assignment_target(&mut self, target: &AssignmentTarget<'a>) {
        if let AssignmentTarget::AssignmentTargetIdentifier(id) = target {
            self.assigned.insert(id.name.to_string());
        }
        walk::walk_assignment_target(self, target);
    }
}

fn line_col_of(source: &str, offset: usize) -> (u32, u32) {
    let mut line = 0u32;
    let mut column = 0u32;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// `findAssignedGlobals(source, contentHash) -> Set<String>` (spec.md §6).
/// `content_hash` identifies the source for error messages only; analysis
/// itself is purely structural.
pub fn find_assigned_globals(
    source: &str,
    content_hash: &str,
) -> Result<HashSet<String>, ParseFailure> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let parser_return = Parser::new(&allocator, source, source_type).parse();

    if let Some(error) = parser_return.errors.first() {
        let offset = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| label.offset())
            .unwrap_or(0);
        let (line, column) = line_col_of(source, offset);
        return Err(ParseFailure {
            line,
            column,
            message: format!("{} (hash {})", error, content_hash),
        });
    }

    let mut collector = GlobalCollector::default();
    collector.visit_program(&parser_return.program);

    Ok(collector
        .assigned
        .difference(&collector.declared)
        .cloned()
        .collect())
}

/// Needed only so `Program`'s lifetime parameter is nameable by callers that
/// want to reuse a parsed program without re-parsing (not exercised by
/// `find_assigned_globals` itself, which parses and discards per call).
pub type ParsedProgram<'a> = Program<'a>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_an_undeclared_top_level_assignment() {
        let globals = find_assigned_globals("Foo = 1;\n", "deadbeef").unwrap();
        assert!(globals.contains("Foo"));
    }

    #[test]
    fn declared_identifiers_are_not_reported() {
        let globals = find_assigned_globals("var x; x = 1;\n", "deadbeef").unwrap();
        assert!(!globals.contains("x"));
    }

    #[test]
    fn unparseable_source_reports_a_parse_failure() {
        let result = find_assigned_globals("function ( {", "deadbeef");
        assert!(result.is_err());
    }
}
