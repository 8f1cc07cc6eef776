pub mod dsl;
pub mod schematic;
pub mod sexp;

// Re-export for convenience
pub use dsl::{Dialect, DslError, DslParser};
pub use schematic::{SchematicDocument, SchematicReadError, SchematicReader};
pub use sexp::{SExp, SExpError, SExpParser, SExpWriter};
