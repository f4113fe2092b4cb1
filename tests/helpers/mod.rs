#![allow(dead_code)]

pub mod builders;
pub mod db;

pub use builders::{AccountBuilder, ObjectBuilder};
pub use db::TestDb;
