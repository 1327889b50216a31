//! Hash-consed IR arena, memoized rewriter, and SPIR-V emitter for a GPU
//! shader IR: intern once, rewrite functionally between arenas, lower away
//! the high-level mask/stack abstractions, then emit SPIR-V words.
pub use spirv;

pub mod arena;
pub mod block;
pub mod config;
pub mod emit;
pub mod error;
pub mod module;
pub mod node;
pub mod passes;
pub mod rewrite;

pub use arena::IrArena;
pub use config::{Config, SubgroupMaskRepresentation};
pub use module::{new_arena, new_module, Module};
pub use node::{Node, NodeId, Tag};
