//! Skeleton Elm module parser
//!
//! The build planner only needs a module's surface: its declared name,
//! the exposing clause, which modules it imports, and whether a
//! top-level `main :` annotation exists. Bodies are never parsed.

use regex::Regex;

use crate::error::{Error, Result};

/// The header facts of one Elm source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSkeleton {
    pub name: String,
    pub exposing: Option<String>,
    pub imports: Vec<String>,
    pub has_main: bool,
}

/// Parse the skeleton of an Elm source file. `file` names the source
/// in errors.
pub fn parse_skeleton(source: &str, file: &str) -> Result<ModuleSkeleton> {
    let stripped = strip_comments(source);

    let module_re = Regex::new(
        r"(?m)^(?:port\s+module|effect\s+module|module)\s+([A-Z][A-Za-z0-9_]*(?:\.[A-Z][A-Za-z0-9_]*)*)",
    )
    .unwrap();
    let exposing_re = Regex::new(r"exposing\s*\(([^)]*)\)").unwrap();
    let import_re =
        Regex::new(r"(?m)^import\s+([A-Z][A-Za-z0-9_]*(?:\.[A-Z][A-Za-z0-9_]*)*)").unwrap();
    let main_re = Regex::new(r"(?m)^main\s*:").unwrap();

    let name = match module_re.captures(&stripped) {
        Some(captures) => captures[1].to_string(),
        None => {
            return Err(Error::parse(
                file,
                "missing module declaration (expected `module Name exposing (..)`)",
            ))
        }
    };

    let exposing = exposing_re
        .captures(&stripped)
        .map(|captures| captures[1].trim().to_string());

    let mut imports = Vec::new();
    for captures in import_re.captures_iter(&stripped) {
        let import = captures[1].to_string();
        if !imports.contains(&import) {
            imports.push(import);
        }
    }

    Ok(ModuleSkeleton {
        name,
        exposing,
        imports,
        has_main: main_re.is_match(&stripped),
    })
}

/// Remove `--` line comments and (nested) `{- -}` block comments so
/// commented-out imports never count.
fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if depth == 0 && bytes[i] == b'-' && bytes.get(i + 1) == Some(&b'-') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if bytes[i] == b'{' && bytes.get(i + 1) == Some(&b'-') {
            depth += 1;
            i += 2;
            continue;
        }
        if depth > 0 && bytes[i] == b'-' && bytes.get(i + 1) == Some(&b'}') {
            depth -= 1;
            i += 2;
            continue;
        }
        if depth == 0 {
            out.push(bytes[i] as char);
        } else if bytes[i] == b'\n' {
            // Keep line structure so (?m) anchors stay meaningful.
            out.push('\n');
        }
        i += 1;
    }
    out
}
