pub mod audit;
pub mod clock;
pub mod color;
pub mod diff;
pub mod document;
pub mod error;
pub mod header;
pub mod ids;
pub mod legacy;
pub mod normalize;
pub mod schema;

pub use audit::{AuditKind, AuditRecord};
pub use clock::{Clock, FixedClock, SystemClock};
pub use diff::{Diff, diff};
pub use document::Document;
pub use error::CoreError;
pub use header::HeaderAppearance;
pub use ids::*;
pub use normalize::{Concern, normalize_concern, normalize_header};
pub use schema::{FieldError, ValidationErrors, validate_header, validate_patch};
