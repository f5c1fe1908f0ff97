pub mod error;
pub mod types;
pub mod value;

pub use error::{DicelangError, ErrorFamily, ErrorKind};
pub use types::*;
pub use value::*;
