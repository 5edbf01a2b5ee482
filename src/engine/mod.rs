pub mod cards;
pub mod catalog;
pub mod database;
pub mod editor;
pub mod error;
pub mod filter;
pub mod imaging;
pub mod normalize;
pub mod records;
pub mod seed;
pub mod wiki;
