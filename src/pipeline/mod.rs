pub mod normalize;
pub mod sort;

pub use normalize::normalize;
pub use sort::sort_records;
