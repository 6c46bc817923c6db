pub mod contacts;
pub mod directory;
pub mod index;
pub mod sites;
