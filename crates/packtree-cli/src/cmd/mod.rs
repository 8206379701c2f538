pub mod check;
pub mod init;
pub mod links;
pub mod location;
pub mod moves;
pub mod package;
pub mod quant;
pub mod tree;
