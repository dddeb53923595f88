pub mod common;
pub mod sparse;
pub mod rwr;

pub use common::{GraphView, NodeId};
pub use sparse::CsrMatrix;
pub use rwr::{
    kernel_propagation, propagation_kernel, random_walk_with_restart, RwrConfig, RwrResult,
};
