//! Ready-made animations

mod cycle;
pub use cycle::*;

mod flame;
pub use flame::*;

mod moves;
pub use moves::*;

mod spec;
pub use spec::*;

mod wave;
pub use wave::*;
