pub mod geo;
pub mod jwt;
pub mod time;

pub use geo::*;
pub use jwt::*;
pub use time::*;
