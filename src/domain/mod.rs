pub mod bugs;
pub mod people;
pub mod schema;
pub mod voting;
