/*!
 * Fragment synthesis.
 *
 * This module turns fragment text into audio files and word events:
 *
 * - `core`: Single-fragment synthesis with retries
 * - `batch`: Bounded concurrent synthesis of a unit's fragments
 */

pub use self::batch::BatchSynthesizer;
pub use self::core::{FragmentRequest, SynthesisService, SynthesizedFragment};

pub mod batch;
pub mod core;
