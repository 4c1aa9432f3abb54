mod shared;
mod site;

pub use shared::SharedDatabase;
pub use site::{FIXED_NOW, TestSite, doc, init_tracing};
