//! In-memory stores shared by the dispatcher, dev server and flusher.

mod flight;
mod variant;

pub use flight::SingleFlight;
pub use variant::{Variant, VariantStore};
