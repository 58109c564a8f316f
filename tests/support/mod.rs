#![allow(dead_code)]

pub mod incidents;
pub mod regionrisk_env;
