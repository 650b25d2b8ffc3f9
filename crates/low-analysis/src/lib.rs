pub mod aligner;
pub mod analyzer;


pub use aligner::*;
pub use analyzer::*;
