pub mod writer;

pub use writer::ArtifactWriter;
