mod misc;
pub use misc::*;

mod states;
pub use states::*;

mod bindings;
pub use bindings::*;

mod shader;
pub use shader::*;
