#[macro_use] extern crate lazy_static;

pub mod types;
pub mod constants;
pub mod data_types;
pub mod db;
pub mod load;
pub mod resolve;
pub mod corpus;
pub mod build;
pub mod api;
pub mod web;
