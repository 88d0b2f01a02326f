//! Wire-protocol definitions: constants, frame encoders and response-code
//! classification.

pub mod constants;
pub mod frame;
pub mod response;

pub use response::{DeviceFault, ResponseError};
