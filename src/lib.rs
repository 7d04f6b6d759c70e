#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod auth;
pub mod backend;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod model;
pub mod observer;
pub mod paths;
pub mod retention;
pub mod rotation;
pub mod util;
