#[macro_use]
extern crate serde_with;

pub mod cmd;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod repo;
pub mod routes;
pub mod services;
pub mod startup;
pub mod time;

mod controllers;
mod cors;
mod shutdown;
