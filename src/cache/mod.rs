pub mod quality_kv;

pub use quality_kv::QualityKv;
