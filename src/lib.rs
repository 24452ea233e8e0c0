// Armature Docstore - document-store session storage for Armature
//
// Re-exports the session provider crate so applications depend on a single
// package and pick backends through features.

pub use armature_docstore_session::*;

/// Re-export of the session crate.
pub use armature_docstore_session as session;

/// Prelude for common imports.
///
/// ```
/// use armature_docstore::prelude::*;
/// ```
pub mod prelude {
    pub use armature_docstore_session::prelude::*;
}
