mod auction_request;
mod bellatrix;
mod registration;

pub use auction_request::*;
pub use bellatrix::*;
pub use registration::*;
