mod classify;
mod confidence;
mod dedup;
mod fields;
mod normalize;
mod ocr_select;
mod pipeline;
mod rules;
mod segment;
#[cfg(test)]
mod tests;
mod validate;

pub use dedup::{Corpus, MergePolicy, MergeReport};
pub use pipeline::{PageInput, Pipeline};
pub use validate::Validator;
