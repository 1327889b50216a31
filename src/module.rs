//! Arena/module lifecycle (§6 External Interfaces): thin constructors a
//! driver uses to chain passes, each of which is a free function with the
//! signature `pass(config, src_module, dst_module) -> Result<Module>`.
use crate::arena::IrArena;
use crate::config::Config;
use crate::node::NodeId;

/// A named handle to a module's root declaration within its owning arena.
/// Distinct from `NodeId` only in that it carries the module's name
/// alongside the root it points to; the arena remains the sole owner of
/// storage.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub root: NodeId,
}

pub fn new_arena(config: Config) -> IrArena {
    IrArena::new(config)
}

pub fn new_module(arena: &mut IrArena, name: impl Into<String>) -> Module {
    let root = arena.begin_root();
    Module { name: name.into(), root }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{nodes, Node};

    #[test]
    fn new_module_starts_with_an_empty_root() {
        let mut arena = new_arena(Config::default());
        let module = new_module(&mut arena, "kernel");
        match arena.get(module.root) {
            Node::Root(r) => assert!(r.declarations.is_empty()),
            _ => panic!("expected root"),
        }
        assert_eq!(module.name, "kernel");
    }

    #[test]
    fn declarations_can_be_attached_after_construction() {
        let mut arena = new_arena(Config::default());
        let module = new_module(&mut arena, "kernel");
        let f = arena.begin_function(nodes(vec![]), nodes(vec![]));
        let body = arena.unreachable();
        arena.set_function_body(f, body);
        arena.set_root_declarations(module.root, nodes(vec![f]));
        match arena.get(module.root) {
            Node::Root(r) => assert_eq!(r.declarations.len(), 1),
            _ => panic!("expected root"),
        }
    }
}
