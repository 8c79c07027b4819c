//! Binary container formats

pub mod pe;
