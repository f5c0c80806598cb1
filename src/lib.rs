#[macro_use]
extern crate serde;

mod candidate;
mod election;
mod error;
mod event;
mod factory;
mod merkle;
mod oracle;
mod pipeline;
mod primitives;
mod role;
mod university;
mod verifier;

pub use candidate::*;
pub use election::*;
pub use error::*;
pub use event::*;
pub use factory::*;
pub use merkle::*;
pub use oracle::*;
pub use pipeline::*;
pub use primitives::*;
pub use role::*;
pub use university::*;
pub use verifier::*;
