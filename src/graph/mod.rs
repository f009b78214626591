pub mod node;
pub mod resolve;
pub mod scheduler;

pub use node::{Action, Node, NodeId};
pub use resolve::{DependencyMode, Graph};
pub use scheduler::{run, NodeFailure, RunReport};
