pub mod constants;
pub mod delay_index;
pub mod delay_prior;
pub mod detectors;
pub mod resample;
pub mod sky_dictionary;
pub mod sky_sampler;
pub mod skymarg_errors;

pub use sky_dictionary::{SkyDictionary, SkyDictionaryConfig};
pub use skymarg_errors::SkyMargError;
