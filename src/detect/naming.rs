//! Naming rules: case, prefixes and suffixes of declared identifiers.

use lazy_static::lazy_static;
use phf::phf_set;
use regex::Regex;

use super::context::{Emitter, FileContext};
use super::registry::RuleDef;
use super::types::{Category, Severity};
use crate::analysis::VariableScope;
use crate::error::RuleEvaluationError;

pub(super) static RULES: &[RuleDef] = &[
    RuleDef::new(
        "NAMING.TYPE_SUFFIX",
        Category::Naming,
        Severity::Warning,
        "Typedef names end in _t",
        check_type_suffix,
    ),
    RuleDef::new(
        "NAMING.TYPE_CASE",
        Category::Naming,
        Severity::Warning,
        "Type names and tags are lower_snake_case",
        check_type_case,
    ),
    RuleDef::new(
        "NAMING.TYPE_TAG_PREFIX",
        Category::Naming,
        Severity::Warning,
        "struct, union and enum tags start with st_, u_ or e_",
        check_type_tag_prefix,
    ),
    RuleDef::new(
        "NAMING.MACRO_CASE",
        Category::Naming,
        Severity::Warning,
        "Macro names are UPPER_SNAKE_CASE",
        check_macro_case,
    ),
    RuleDef::new(
        "NAMING.ENUM_CONSTANT_CASE",
        Category::Naming,
        Severity::Warning,
        "Enumeration constants are UPPER_SNAKE_CASE",
        check_enum_constant_case,
    ),
    RuleDef::new(
        "NAMING.FUNCTION_CASE",
        Category::Naming,
        Severity::Warning,
        "Function names are lower_snake_case",
        check_function_case,
    ),
    RuleDef::new(
        "NAMING.VARIABLE_LENGTH",
        Category::Naming,
        Severity::Warning,
        "Variable names meet the minimum length",
        check_variable_length,
    ),
    RuleDef::new(
        "NAMING.VARIABLE_CASE",
        Category::Naming,
        Severity::Warning,
        "Variable names are lower_snake_case",
        check_variable_case,
    ),
    RuleDef::new(
        "NAMING.POINTER_PREFIX",
        Category::Naming,
        Severity::Warning,
        "Pointer variables carry one p per level of indirection (p_, pp_, gp_)",
        check_pointer_prefix,
    ),
    RuleDef::new(
        "NAMING.GLOBAL_PREFIX",
        Category::Naming,
        Severity::Warning,
        "File-scope variables start with g_",
        check_global_prefix,
    ),
    RuleDef::new(
        "NAMING.RESERVED",
        Category::Naming,
        Severity::Error,
        "Identifiers must not collide with C++ keywords, standard library names or reserved forms",
        check_reserved,
    ),
];

lazy_static! {
    static ref LOWER_SNAKE: Regex = Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").unwrap();
    static ref UPPER_SNAKE: Regex = Regex::new(r"^_*[A-Z][A-Z0-9]*(_+[A-Z0-9]+)*_*$").unwrap();
}

/// Names a C file should not define.
static RESERVED_NAMES: phf::Set<&'static str> = phf_set! {
    // C++ keywords
    "alignas", "alignof", "and", "and_eq", "asm", "bitand", "bitor", "bool",
    "catch", "char16_t", "char32_t", "class", "compl", "const_cast",
    "constexpr", "decltype", "delete", "dynamic_cast", "explicit", "export",
    "false", "friend", "mutable", "namespace", "new", "noexcept", "not",
    "not_eq", "nullptr", "operator", "or", "or_eq", "private", "protected",
    "public", "reinterpret_cast", "static_assert", "static_cast", "template",
    "this", "thread_local", "throw", "true", "try", "typeid", "typename",
    "using", "virtual", "wchar_t", "xor", "xor_eq",
    // Standard library
    "abort", "abs", "assert", "atexit", "atof", "atoi", "atol", "bsearch",
    "calloc", "clock", "errno", "exit", "fclose", "feof", "ferror", "fflush",
    "fgetc", "fgets", "fopen", "fprintf", "fputc", "fputs", "fread", "free",
    "freopen", "fscanf", "fseek", "ftell", "fwrite", "getc", "getchar",
    "getenv", "gets", "isalnum", "isalpha", "isdigit", "islower", "isspace",
    "isupper", "labs", "malloc", "memchr", "memcmp", "memcpy", "memmove",
    "memset", "perror", "printf", "putc", "putchar", "puts", "qsort", "rand",
    "realloc", "remove", "rename", "rewind", "scanf", "signal", "sprintf",
    "sqrt", "srand", "sscanf", "strcat", "strchr", "strcmp", "strcpy",
    "strlen", "strncat", "strncmp", "strncpy", "strrchr", "strstr", "strtok",
    "strtol", "strtoul", "system", "time", "tolower", "toupper", "ungetc",
    "NULL", "EOF", "FILE", "stdin", "stdout", "stderr", "offsetof", "size_t",
    "ptrdiff_t",
};

/// `myTypeName` becomes `my_type_name`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower)
            {
                out.push('_');
            }
        }
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c.to_ascii_lowercase());
    }
    out.trim_matches('_').to_string()
}

fn is_reserved(name: &str) -> bool {
    let bytes = name.as_bytes();
    RESERVED_NAMES.contains(name)
        || name.starts_with("__")
        || (bytes.len() > 1 && bytes[0] == b'_' && bytes[1].is_ascii_uppercase())
}

fn check_type_suffix(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for ty in &ctx.facts().types {
        let Some(alias) = ty.alias else { continue };
        let name = &tokens[alias].text;
        if !name.ends_with("_t") {
            out.emit_with_fix(
                tokens[alias].span,
                format!("type name '{}' must end in _t", name),
                format!("{}_t", name),
            );
        }
    }
    Ok(())
}

fn check_type_case(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for ty in &ctx.facts().types {
        if let Some(alias) = ty.alias {
            let name = &tokens[alias].text;
            let stem = name.strip_suffix("_t").unwrap_or(name);
            if !LOWER_SNAKE.is_match(stem) {
                let fixed = format!("{}_t", to_snake_case(stem));
                out.emit_with_fix(
                    tokens[alias].span,
                    format!("type name '{}' must be lower_snake_case", name),
                    fixed,
                );
            }
        }
        if let Some(tag) = ty.tag {
            let name = &tokens[tag].text;
            if !LOWER_SNAKE.is_match(name) {
                out.emit_with_fix(
                    tokens[tag].span,
                    format!("tag '{}' must be lower_snake_case", name),
                    to_snake_case(name),
                );
            }
        }
    }
    Ok(())
}

fn check_type_tag_prefix(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for ty in &ctx.facts().types {
        let (Some(kind), Some(tag)) = (ty.tag_kind, ty.tag) else {
            continue;
        };
        if !ty.has_body {
            continue;
        }
        let name = &tokens[tag].text;
        let prefix = kind.tag_prefix();
        if !name.starts_with(prefix) {
            out.emit_with_fix(
                tokens[tag].span,
                format!("{} tag '{}' must start with {}", kind.as_str(), name, prefix),
                format!("{}{}", prefix, name),
            );
        }
    }
    Ok(())
}

fn check_macro_case(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    for m in &ctx.facts().macros {
        if !UPPER_SNAKE.is_match(&m.name) {
            out.emit_with_fix(
                m.span,
                format!("macro '{}' must be UPPER_SNAKE_CASE", m.name),
                to_snake_case(&m.name).to_uppercase(),
            );
        }
    }
    Ok(())
}

fn check_enum_constant_case(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for constant in &ctx.facts().enum_constants {
        if !UPPER_SNAKE.is_match(&constant.name) || constant.name.starts_with('_') {
            out.emit_with_fix(
                tokens[constant.token].span,
                format!(
                    "enumeration constant '{}' must be UPPER_SNAKE_CASE",
                    constant.name
                ),
                to_snake_case(&constant.name).to_uppercase(),
            );
        }
    }
    Ok(())
}

fn check_function_case(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let facts = ctx.facts();
    let defined = facts.functions.iter().map(|f| (f.name.as_str(), f.name_token));
    let declared = facts.prototypes.iter().map(|p| (p.name.as_str(), p.token));
    for (name, token) in defined.chain(declared) {
        if !LOWER_SNAKE.is_match(name) {
            out.emit_with_fix(
                tokens[token].span,
                format!("function '{}' must be lower_snake_case", name),
                to_snake_case(name),
            );
        }
    }
    Ok(())
}

fn check_variable_length(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let min = ctx.params.min_variable_length;
    for var in &ctx.facts().variables {
        if var.name.len() < min {
            out.emit(
                tokens[var.token].span,
                format!(
                    "{} variable '{}' is shorter than {} characters",
                    var.scope, var.name, min
                ),
            );
        }
    }
    Ok(())
}

fn check_variable_case(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for var in &ctx.facts().variables {
        if !LOWER_SNAKE.is_match(&var.name) {
            out.emit_with_fix(
                tokens[var.token].span,
                format!("variable '{}' must be lower_snake_case", var.name),
                to_snake_case(&var.name),
            );
        }
    }
    Ok(())
}

/// `p_`, `pp_`, ... with a leading `g` at file scope.
fn pointer_prefix(depth: usize, scope: VariableScope) -> String {
    let global = if scope == VariableScope::File { "g" } else { "" };
    format!("{}{}_", global, "p".repeat(depth))
}

fn check_pointer_prefix(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for var in &ctx.facts().variables {
        if var.pointer_depth == 0 {
            continue;
        }
        let expected = pointer_prefix(var.pointer_depth, var.scope);
        if var.name.starts_with(&expected) {
            continue;
        }
        let stem = match var.name.split_once('_') {
            Some((prefix, rest))
                if !prefix.is_empty()
                    && !rest.is_empty()
                    && prefix.chars().all(|c| c == 'g' || c == 'p') =>
            {
                rest
            }
            _ => var.name.as_str(),
        };
        out.emit_with_fix(
            tokens[var.token].span,
            format!(
                "{} pointer '{}' (depth {}) must start with {}",
                var.scope, var.name, var.pointer_depth, expected
            ),
            format!("{}{}", expected, stem),
        );
    }
    Ok(())
}

fn check_global_prefix(
    ctx: &FileContext<'_>,
    out: &mut Emitter,
) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    for var in &ctx.facts().variables {
        if var.scope != VariableScope::File || var.pointer_depth > 0 {
            continue;
        }
        if !var.name.starts_with("g_") {
            out.emit_with_fix(
                tokens[var.token].span,
                format!("global variable '{}' must start with g_", var.name),
                format!("g_{}", var.name),
            );
        }
    }
    Ok(())
}

fn check_reserved(ctx: &FileContext<'_>, out: &mut Emitter) -> Result<(), RuleEvaluationError> {
    let tokens = ctx.tokens();
    let facts = ctx.facts();
    let mut names: Vec<(&str, crate::analysis::Span)> = Vec::new();
    names.extend(facts.variables.iter().map(|v| (v.name.as_str(), tokens[v.token].span)));
    names.extend(facts.functions.iter().map(|f| (f.name.as_str(), tokens[f.name_token].span)));
    names.extend(facts.prototypes.iter().map(|p| (p.name.as_str(), tokens[p.token].span)));
    names.extend(facts.macros.iter().map(|m| (m.name.as_str(), m.span)));
    names.extend(
        facts
            .enum_constants
            .iter()
            .map(|c| (c.name.as_str(), tokens[c.token].span)),
    );
    for ty in &facts.types {
        for t in [ty.alias, ty.tag].into_iter().flatten() {
            names.push((tokens[t].text.as_str(), tokens[t].span));
        }
    }
    for func in &facts.functions {
        names.extend(
            func.labels
                .iter()
                .map(|l| (l.name.as_str(), tokens[l.token].span)),
        );
    }

    for (name, span) in names {
        if is_reserved(name) {
            out.emit(span, format!("'{}' is a reserved identifier", name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::test_support::run_rule;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("myType"), "my_type");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("value2Max"), "value2_max");
        assert_eq!(to_snake_case("already_ok"), "already_ok");
    }

    #[test]
    fn test_type_case_flags_camel_case_only() {
        let diags = run_rule("NAMING.TYPE_CASE", "typedef int myType_t;\ntypedef int my_type_t;\n");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("myType_t"));
        assert_eq!(diags[0].fix.as_deref(), Some("my_type_t"));
        assert_eq!(diags[0].line(), 1);
    }

    #[test]
    fn test_type_suffix() {
        let diags = run_rule("NAMING.TYPE_SUFFIX", "typedef int counter;\ntypedef int counter_t;\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].fix.as_deref(), Some("counter_t"));
    }

    #[test]
    fn test_tag_prefix() {
        let src = "struct point\n{\n    int x;\n};\nunion u_value\n{\n    int i;\n};\nenum color\n{\n    RED\n};\nstruct point;\n";
        let diags = run_rule("NAMING.TYPE_TAG_PREFIX", src);
        let messages: Vec<&str> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(diags.len(), 2, "{:?}", messages);
        assert!(messages[0].contains("must start with st_"));
        assert!(messages[1].contains("must start with e_"));
    }

    #[test]
    fn test_macro_and_enum_case() {
        let diags = run_rule("NAMING.MACRO_CASE", "#define MAX_LEN 4\n#define maxLen 4\n#define _GUARD_H\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].fix.as_deref(), Some("MAX_LEN"));

        let diags = run_rule("NAMING.ENUM_CONSTANT_CASE", "enum e_mode\n{\n    MODE_ON,\n    modeOff\n};\n");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("modeOff"));
    }

    #[test]
    fn test_function_case() {
        let src = "int doThing(void);\nint do_thing(void)\n{\n    return 0;\n}\n";
        let diags = run_rule("NAMING.FUNCTION_CASE", src);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].fix.as_deref(), Some("do_thing"));
    }

    #[test]
    fn test_variable_length_and_case() {
        let src = "void run(void)\n{\n    int ab;\n    int itemCount;\n    int total;\n}\n";
        let short = run_rule("NAMING.VARIABLE_LENGTH", src);
        assert_eq!(short.len(), 1);
        assert!(short[0].message.contains("'ab'"));
        let case = run_rule("NAMING.VARIABLE_CASE", src);
        assert_eq!(case.len(), 1);
        assert_eq!(case[0].fix.as_deref(), Some("item_count"));
    }

    #[test]
    fn test_pointer_prefix() {
        let src = "char **gpp_names;\nchar *gp_name;\nchar *name_ptr;\nvoid run(char **argv, int *p_count)\n{\n    char *p_cursor;\n    char **p_rows;\n}\n";
        let diags = run_rule("NAMING.POINTER_PREFIX", src);
        let flagged: Vec<String> = diags
            .iter()
            .map(|d| d.message.split('\'').nth(1).unwrap_or("").to_string())
            .collect();
        assert_eq!(flagged, vec!["name_ptr", "argv", "p_rows"]);
        assert_eq!(diags[0].fix.as_deref(), Some("gp_name_ptr"));
        assert_eq!(diags[1].fix.as_deref(), Some("pp_argv"));
    }

    #[test]
    fn test_global_prefix_covers_static_and_extern() {
        let src = "int g_ok;\nstatic int count;\nextern int total;\nvoid run(void)\n{\n    int local;\n}\n";
        let diags = run_rule("NAMING.GLOBAL_PREFIX", src);
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].fix.as_deref(), Some("g_count"));
    }

    #[test]
    fn test_reserved_identifiers() {
        let src = "#define __INTERNAL 1\nint g_class;\nint class;\nint _Hidden;\nvoid free(void *p_mem);\n";
        let diags = run_rule("NAMING.RESERVED", src);
        let names: Vec<String> = diags
            .iter()
            .map(|d| d.message.split('\'').nth(1).unwrap_or("").to_string())
            .collect();
        assert_eq!(names, vec!["__INTERNAL", "class", "_Hidden", "free"]);
    }
}
