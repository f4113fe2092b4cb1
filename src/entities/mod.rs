pub mod edge;
pub mod node;

pub use edge::Entity as Edge;
pub use node::Entity as Node;
