pub mod flatfile;
pub mod types;
