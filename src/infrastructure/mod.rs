pub mod pdf_extractor;

pub use pdf_extractor::{DocumentError, PdfExtractor};
