pub mod report;
pub mod request;
pub mod state;
pub mod team;

pub use report::*;
pub use request::*;
pub use state::*;
pub use team::*;
