//! Type-string preparation before a type push.
//!
//! The host prints function types without the symbol name
//! (`int __stdcall(int a)`), but the server re-parses them as declarations
//! and needs one. The name is patched in right after the calling
//! convention. This is a text rewrite, not a parser: `__usercall` and
//! `__userpurge` declarations and variadic conventions pass through
//! unchanged.

/// Name used when the address has no symbol.
pub const FALLBACK_SYMBOL: &str = "Default";

/// Pointer markers are checked first: `__cdecl *` would also match `__cdecl`.
const POINTER_MARKERS: &[&str] = &["__cdecl *", "__stdcall *", "__fastcall *", "__thiscall *"];
const CONVENTION_MARKERS: &[&str] = &["__cdecl", "__stdcall", "__fastcall", "__thiscall"];

/// Insert `symbol` after every occurrence of the first calling-convention
/// marker the type contains. Other markers are left alone.
///
/// * `int (__cdecl *)(int)` with `cb` becomes `int (__cdecl *cb)(int)`.
/// * `int __stdcall(int a)` with `f` becomes `int __stdcall f(int a)`.
///
/// Types without a known marker are returned unchanged.
pub fn normalize_type(type_string: &str, symbol: Option<&str>) -> String {
    let symbol = match symbol {
        Some(s) if !s.is_empty() => s,
        _ => FALLBACK_SYMBOL,
    };
    if let Some(marker) = POINTER_MARKERS.iter().find(|m| type_string.contains(*m)) {
        return type_string.replace(marker, &format!("{marker}{symbol}"));
    }
    if let Some(marker) = CONVENTION_MARKERS.iter().find(|m| type_string.contains(*m)) {
        return type_string.replace(marker, &format!("{marker} {symbol}"));
    }
    type_string.to_string()
}
