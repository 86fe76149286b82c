//! Stackup Library
//!
//! Packages, deploys and tears down CloudFormation stacks.

pub mod cloud;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod storage;
pub mod utils;
pub mod workers;
