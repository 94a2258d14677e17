mod abs;
mod float;
mod pack;
mod poly;

pub use abs::*;
pub use float::*;
pub use pack::*;
pub use poly::*;
