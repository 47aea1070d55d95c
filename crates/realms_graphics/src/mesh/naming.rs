//! # Mesh Aliases
//!
//! Aliases are short, sanitized names ("oak_tree") that resolve to a mesh
//! type id. How they are derived is pluggable through [`MeshNaming`].

/// Longest alias kept after sanitizing.
pub const MAX_ALIAS_LEN: usize = 31;

/// Turns file paths and free-form names into aliases.
pub trait MeshNaming {
    /// Normalises a free-form name into an alias. May return an empty string
    /// when nothing usable is left.
    fn sanitize(&self, name: &str) -> String;

    /// Derives an alias from a mesh source path, or `None` when the path does
    /// not name a mesh file.
    fn alias_from_path(&self, path: &str) -> Option<String>;

    /// Next candidate after `alias` collides: `rock` becomes `rock_0`,
    /// `rock_0` becomes `rock_1`. The stem is shortened so the result stays
    /// within [`MAX_ALIAS_LEN`]. `None` once the counter cannot grow.
    fn increment_alias(&self, alias: &str) -> Option<String> {
        let (stem, next) = match alias.rsplit_once('_') {
            Some((stem, digits))
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
            {
                (stem, digits.parse::<u64>().ok()?.checked_add(1)?)
            }
            _ => (alias, 0),
        };

        let suffix = format!("_{next}");
        let keep = MAX_ALIAS_LEN.checked_sub(suffix.len())?;
        let stem = stem.get(..keep.min(stem.len())).unwrap_or(stem);
        Some(format!("{stem}{suffix}"))
    }
}

/// Naming for MagicaVoxel assets.
///
/// - ASCII lower-case
/// - each run of whitespace becomes one `_`
/// - everything but ASCII letters, digits and `_` is dropped
/// - at most [`MAX_ALIAS_LEN`] characters
///
/// Paths must end in `.vox`; the alias is the sanitized file stem.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultNaming;

impl MeshNaming for DefaultNaming {
    fn sanitize(&self, name: &str) -> String {
        let mut alias = String::with_capacity(name.len().min(MAX_ALIAS_LEN));
        let mut in_whitespace = false;

        for c in name.chars() {
            if alias.len() == MAX_ALIAS_LEN {
                break;
            }
            // Vertical tab is not covered by `is_ascii_whitespace`.
            if c.is_ascii_whitespace() || c == '\x0B' {
                if !in_whitespace {
                    alias.push('_');
                }
                in_whitespace = true;
                continue;
            }
            in_whitespace = false;
            if c.is_ascii_alphanumeric() || c == '_' {
                alias.push(c.to_ascii_lowercase());
            }
        }
        alias
    }

    fn alias_from_path(&self, path: &str) -> Option<String> {
        let file = path.rsplit(&['/', '\\'][..]).next()?;
        let stem = file.strip_suffix(".vox")?;
        if stem.is_empty() {
            return None;
        }
        Some(self.sanitize(stem))
    }
}
