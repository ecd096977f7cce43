pub mod batch;
pub mod experiment;
pub mod file;
pub mod machine;
pub mod project;
pub mod webhook;
