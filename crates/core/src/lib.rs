//! Domain types shared by the storage and HTTP layers.

pub mod payload;
pub mod types;

pub use payload::{CupcakePayload, PayloadError};
pub use types::{Cupcake, CupcakeChanges, NewCupcake, DEFAULT_IMAGE};
