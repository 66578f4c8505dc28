pub mod analysis;
pub mod extraction;
pub mod load;
pub mod report;
pub mod table;
pub mod transform;
