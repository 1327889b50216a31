//! Entrypoint-arg remap (C8): promotes a `GlobalVariable` annotated
//! `EntryPointArgs` from address space `External` to `PushConstant`, marking
//! its record type `DecorateBlock` so the emitter decorates it as a block.
//! Grounded in `original_source/src/shady/passes/spirv_map_entrypoint_args.c`.
use crate::arena::IrArena;
use crate::config::Config;
use crate::error::{IrErrorKind, Result};
use crate::node::{AddressSpace, Node, NodeId, RecordSpecial, Tag};
use crate::rewrite::{rewrite_default, RewritePass, Rewriter};

const ENTRY_POINT_ARGS_ANNOTATION: &str = "EntryPointArgs";

pub fn remap_entry_point_args(config: Config, src: &IrArena, dst: &mut IrArena, root: NodeId) -> Result<NodeId> {
    let mut rw = Rewriter::new_importer(src, dst);
    let mut pass = EntryPointArgsPass { _config: config };
    rw.rewrite_node(&mut pass, root)
}

struct EntryPointArgsPass {
    _config: Config,
}

impl RewritePass for EntryPointArgsPass {
    fn rewrite(&mut self, rw: &mut Rewriter, old: NodeId) -> Result<NodeId> {
        let node = rw.src.get(old);
        if node.tag() != Tag::GlobalVariable {
            return rewrite_default(self, rw, old);
        }
        let p = match node {
            Node::GlobalVariable(p) => p.clone(),
            _ => unreachable!(),
        };
        let is_entry_point_args = p.annotations.iter().any(|&a| match rw.src.get(a) {
            Node::Annotation(ann) => &*ann.name == ENTRY_POINT_ARGS_ANNOTATION,
            _ => false,
        });
        if !is_entry_point_args {
            return rewrite_default(self, rw, old);
        }
        log::info!("remapping entrypoint args global {:?}", p.name);

        if p.address_space != AddressSpace::External {
            return Err(IrErrorKind::malformed(
                p.name.to_string(),
                format!("EntryPointArgs global must have address space External, found {:?}", p.address_space),
            ));
        }
        let (members, names) = match rw.src.get(p.ty) {
            Node::RecordType(rt) if rt.special == RecordSpecial::NotSpecial => (rt.members.clone(), rt.names.clone()),
            other => {
                return Err(IrErrorKind::malformed(
                    p.name.to_string(),
                    format!("EntryPointArgs global must have a plain record type, found {:?}", other.tag()),
                ))
            }
        };

        let new_members = rw.rewrite_nodes(self, &members)?;
        let new_ty = rw.dst.record_type(new_members, names, RecordSpecial::DecorateBlock);
        let new_annotations = rw.rewrite_nodes(self, &p.annotations)?;
        Ok(rw.dst.global_variable(new_annotations, new_ty, p.name, AddressSpace::PushConstant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::nodes;

    fn entry_point_args_global(src: &mut IrArena, address_space: AddressSpace) -> NodeId {
        let i32t = src.int32_type();
        let record = src.record_type(nodes(vec![i32t, i32t]), None, RecordSpecial::NotSpecial);
        let annotation = src.annotation(ENTRY_POINT_ARGS_ANNOTATION.into(), nodes(vec![]));
        src.global_variable(nodes(vec![annotation]), record, "args".into(), address_space)
    }

    #[test]
    fn external_entry_point_args_becomes_push_constant_block() {
        let mut src = IrArena::new(Config::default());
        let g = entry_point_args_global(&mut src, AddressSpace::External);

        let mut dst = IrArena::new(Config::default());
        let new_g = remap_entry_point_args(Config::default(), &src, &mut dst, g).unwrap();
        match dst.get(new_g) {
            Node::GlobalVariable(p) => {
                assert_eq!(p.address_space, AddressSpace::PushConstant);
                match dst.get(p.ty) {
                    Node::RecordType(rt) => assert_eq!(rt.special, RecordSpecial::DecorateBlock),
                    _ => panic!("expected record type"),
                }
                assert_eq!(p.annotations.len(), 1, "annotation list must be preserved, not dropped");
            }
            _ => panic!("expected global variable"),
        }
    }

    #[test]
    fn private_entry_point_args_is_malformed() {
        let mut src = IrArena::new(Config::default());
        let g = entry_point_args_global(&mut src, AddressSpace::Private);

        let mut dst = IrArena::new(Config::default());
        let err = remap_entry_point_args(Config::default(), &src, &mut dst, g).unwrap_err();
        assert!(err.downcast_ref::<IrErrorKind>().is_some());
    }
}
