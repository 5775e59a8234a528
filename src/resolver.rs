//! Reference resolution against a flat working directory
//!
//! Only the final file-name component of a reference matters. Directory
//! prefixes, parent segments and absolute roots are discarded, so a reference
//! can never reach outside the directory it is resolved against.

use std::path::{Path, PathBuf};

/// Extract the file-name portion of a markup or CSS reference
///
/// Query strings and fragments are stripped. Returns `None` for `data:` URIs
/// and for references with no usable name (`""`, `"."`, `".."`, `"dir/"`).
#[must_use]
pub fn reference_file_name(reference: &str) -> Option<&str> {
    let reference = reference.trim();
    if reference
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        return None;
    }

    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    let path_part = &reference[..end];
    let name = path_part.rsplit(['/', '\\']).next().unwrap_or(path_part);

    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Locate the file a reference points at inside `base_dir`
///
/// Returns `None` when nothing with that name exists; callers leave the
/// reference untouched in that case. A percent-encoded name (`my%20pic.png`)
/// is retried in decoded form when the literal name is absent.
#[must_use]
pub fn resolve(base_dir: &Path, reference: &str) -> Option<PathBuf> {
    let name = reference_file_name(reference)?;

    let candidate = base_dir.join(name);
    if candidate.is_file() {
        return Some(candidate);
    }

    if name.contains('%')
        && let Ok(decoded) = urlencoding::decode(name)
        && let Some(decoded_name) = reference_file_name(&decoded)
        && decoded_name != name
    {
        let candidate = base_dir.join(decoded_name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    None
}
