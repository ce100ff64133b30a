pub mod interaction;
pub mod vendor;
pub mod wedding;
