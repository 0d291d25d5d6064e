pub mod address;
pub mod call;
pub mod registry;
pub mod validator;

pub use address::*;
pub use call::*;
pub use registry::*;
pub use validator::*;
