pub mod documents;
pub mod schema;
pub mod storage;
pub mod templates;
