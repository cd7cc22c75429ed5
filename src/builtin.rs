use crate::types::Basic;
use phf_macros::phf_map;

/// Builtin basic types, resolvable wherever a package declares no
/// shadowing type of the same name.
pub static BUILTIN_TYPES: phf::Map<&'static str, Basic> = phf_map! {
    "int" => Basic::Int,
    "float" => Basic::Float,
    "bool" => Basic::Bool,
    "string" => Basic::String,
};
