//! Boilerplate detection.
//!
//! Disassemblers and decompilers invent names and comments for everything
//! the analyst has not touched. None of that is analyst intent, so it is
//! neither pushed upstream nor written over local state.

/// Labels a disassembler generates for unnamed code and data.
pub const DEFAULT_NAME_PREFIXES: &[&str] = &["sub_", "dword_", "unk_", "byte_", "word_", "loc_"];

/// Function names skipped by the one-time bulk push.
pub const BOILERPLATE_FUNCTION_PREFIXES: &[&str] =
    &["sub_", "nullsub", "unknown", "SEH_", "__imp", "j_", "__IMP"];

/// Leading characters of mangled C++/MSVC symbols.
const MANGLING_MARKERS: &[char] = &['@', '?'];

/// Comment stems emitted by the decompiler and type propagation.
/// Matched case-insensitively against the start of the comment.
pub const BOILERPLATE_COMMENT_STEMS: &[&str] = &[
    "size_t",
    "int",
    "LPSTR",
    "char",
    "char *",
    "lpString",
    "dw",
    "lp",
    "Str",
    "Dest",
    "Src",
    "cch",
    "Dst",
    "jumptable",
    "switch ",
    "unsigned int",
    "void *",
    "indirect table for switch statement",
    "Size",
    "this",
    "jump table for",
    "switch jump",
    "nSize",
    "hInternet",
    "hObject",
    "SEH",
    "Exception handler",
    "Source",
    "Val",
    "Time",
    "struct",
    "unsigned __int",
    "__int32",
    "void (",
    "Memory",
    "HINSTANCE",
];

/// `true` for generator-default labels such as `sub_401000`.
pub fn is_default_local_name(name: &str) -> bool {
    DEFAULT_NAME_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Broader check used only when pushing pre-existing names in bulk.
pub fn is_boilerplate_function_name(name: &str) -> bool {
    name.starts_with(MANGLING_MARKERS)
        || BOILERPLATE_FUNCTION_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// `true` for empty comments and anything starting with a known stem.
pub fn is_boilerplate_comment(text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    BOILERPLATE_COMMENT_STEMS
        .iter()
        .any(|stem| starts_with_ignore_case(text, stem))
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}
