pub mod cars;
pub mod images;
