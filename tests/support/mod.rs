#![allow(dead_code)]

pub mod dirs;
pub mod harness;
pub mod http_utils;
pub mod logging;
pub mod net;
pub mod upstream;

pub use dirs::*;
pub use harness::*;
pub use http_utils::*;
pub use logging::*;
pub use net::*;
pub use upstream::*;
