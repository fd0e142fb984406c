pub mod docker;
pub mod web;
