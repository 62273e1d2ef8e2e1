pub mod files;
pub mod glue;
