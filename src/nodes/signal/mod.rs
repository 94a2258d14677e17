mod osc;
mod sig;
mod tabplay;

pub use osc::*;
pub use sig::*;
pub use tabplay::*;
