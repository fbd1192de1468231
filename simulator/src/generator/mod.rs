pub mod profile;
pub mod sensor;
