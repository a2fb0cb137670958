//! The `UserModel` contract (spec §6.1): the seam external model
//! authors implement against. This crate defines the contract only —
//! concrete models live in consuming crates (see `demos/block-stats-model`).

mod context;
mod error;
mod traits;

pub use context::{BlockContext, ModelServices, UserModelService};
pub use error::UserModelError;
pub use traits::UserModel;
