// This module groups the two tensor-side abstractions the planner works between. MemoryView
// describes the strided region of global memory or shared local memory that one access site
// touches, including optional static bounds and the guaranteed base alignment. RegisterLayout
// describes where each element of that region ends up in the register buffer once the access
// builder has decided on a message decomposition.

//! Memory views and register layouts.

pub mod layout;
pub mod view;

pub use layout::{LayoutBlock, RegisterLayout};
pub use view::{MemoryView, ViewDim, DEFAULT_BASE_ALIGN};
