//! The rewriter (C4): a memoized recursive mapper from an old arena's IR to
//! a new one. Grounded in the reference project's registry idiom (`set`/
//! `get` with a conflict check, see `ty::reg::TypeRegistry`) generalized
//! from "one concrete key type" to "any node id".
use fnv::FnvHashMap as HashMap;

use crate::arena::IrArena;
use crate::error::{IrErrorKind, Result};
use crate::node::{nodes, Node, NodeId, Nodes, Tag};

/// A pass's rewrite behavior. Implementations typically match on the old
/// node's tag, special-case what they care about, and fall back to
/// [`rewrite_default`] (which itself special-cases declarations before
/// delegating to [`recreate_node_identity`]) for everything else.
///
/// This collapses the source project's struct-of-function-pointers
/// (`rewrite_field_type.{rewrite_type, rewrite_value, ...}`) into a single
/// trait method: Rust's exhaustive `match` on `Tag` already gives a pass
/// the same per-kind granularity without a second dispatch layer.
pub trait RewritePass {
    fn rewrite(&mut self, rw: &mut Rewriter, old: NodeId) -> Result<NodeId>;
}

/// A pass that does nothing but call [`rewrite_default`] everywhere; used
/// to exercise P2 (idempotence of identity rewrite) and as the innermost
/// fallback every other pass in this crate eventually bottoms out at.
pub struct IdentityPass;

impl RewritePass for IdentityPass {
    fn rewrite(&mut self, rw: &mut Rewriter, old: NodeId) -> Result<NodeId> {
        rewrite_default(self, rw, old)
    }
}

/// Memoized old→new map plus the two independent toggles the source
/// project calls `config.search_map` / `config.write_map`.
pub struct Rewriter<'a> {
    pub src: &'a IrArena,
    pub dst: &'a mut IrArena,
    map: HashMap<NodeId, NodeId>,
    search_map: bool,
    write_map: bool,
}

impl<'a> Rewriter<'a> {
    /// An "importer": both reads and writes the memoization map. The
    /// default and most common configuration.
    pub fn new_importer(src: &'a IrArena, dst: &'a mut IrArena) -> Self {
        Rewriter {
            src,
            dst,
            map: HashMap::default(),
            search_map: true,
            write_map: true,
        }
    }

    /// A "substituter": writes the map (so later lookups within the same
    /// pass see earlier substitutions) but never reads it as a first
    /// resort — every node is visited fresh.
    pub fn new_substituter(src: &'a IrArena, dst: &'a mut IrArena) -> Self {
        Rewriter {
            src,
            dst,
            map: HashMap::default(),
            search_map: false,
            write_map: true,
        }
    }

    pub fn search_processed(&self, old: NodeId) -> Option<NodeId> {
        self.map.get(&old).copied()
    }

    /// Registers `old → new`. Registering the same mapping twice is a
    /// no-op (declarations register their header before their body is
    /// rewritten, and the generic post-dispatch registration in
    /// `rewrite_node` would otherwise try to register it again). Registering
    /// a *different* `new` for an already-mapped `old` is a programming
    /// error.
    pub fn register_processed(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        match self.map.get(&old) {
            Some(&existing) if existing == new => Ok(()),
            Some(_) => Err(IrErrorKind::invariant(format!(
                "conflicting re-registration for node {:?}",
                old
            ))),
            None => {
                self.map.insert(old, new);
                Ok(())
            }
        }
    }

    /// Top-level recursive entry point: memo lookup, then dispatch to the
    /// pass, then (if `write_map`) record the result.
    pub fn rewrite_node(&mut self, pass: &mut dyn RewritePass, old: NodeId) -> Result<NodeId> {
        if self.search_map {
            if let Some(new) = self.search_processed(old) {
                log::trace!("memo hit for {:?}", old);
                return Ok(new);
            }
        }
        let new = pass.rewrite(self, old)?;
        if self.write_map {
            self.register_processed(old, new)?;
        }
        Ok(new)
    }

    /// Maps a `Nodes` list elementwise, left to right, so a node's own
    /// rewrite observes the memoized results of whatever preceded it in
    /// the list (relevant for stack optimization's left-to-right state
    /// threading over `Block.instructions`).
    pub fn rewrite_nodes(&mut self, pass: &mut dyn RewritePass, olds: &Nodes) -> Result<Nodes> {
        let mut out = Vec::with_capacity(olds.len());
        for &old in olds.iter() {
            out.push(self.rewrite_node(pass, old)?);
        }
        Ok(nodes(out))
    }

    fn rewrite_opt(&mut self, pass: &mut dyn RewritePass, old: Option<NodeId>) -> Result<Option<NodeId>> {
        match old {
            Some(id) => Ok(Some(self.rewrite_node(pass, id)?)),
            None => Ok(None),
        }
    }
}

/// Default fallback: declarations go through the two-phase protocol,
/// everything else goes through [`recreate_node_identity`].
pub fn rewrite_default(pass: &mut dyn RewritePass, rw: &mut Rewriter, old: NodeId) -> Result<NodeId> {
    let tag = rw.src.get(old).tag();
    if crate::node::is_declaration(tag) || tag == Tag::Root {
        let new = recreate_decl_header_identity(pass, rw, old)?;
        recreate_decl_body_identity(pass, rw, old, new)?;
        Ok(new)
    } else {
        recreate_node_identity(pass, rw, old)
    }
}

/// Recursively rewrites every node-typed payload field of `old` and
/// re-interns with the same tag. Must never be called directly on
/// `Function`/`GlobalVariable`/`Root` — those require the two-phase
/// protocol so self- and mutually-recursive references resolve; callers
/// are expected to have special-cased `is_declaration` first (this is
/// exactly what `rewrite_default` does).
pub fn recreate_node_identity(pass: &mut dyn RewritePass, rw: &mut Rewriter, old: NodeId) -> Result<NodeId> {
    let node = rw.src.get(old).clone();
    let new = match node {
        Node::IntType { width, signed } => rw.dst.int_type(width, signed),
        Node::PtrType(p) => {
            let pointee = rw.rewrite_node(pass, p.pointee)?;
            rw.dst.ptr_type(pointee, p.address_space)
        }
        Node::RecordType(p) => {
            let members = rw.rewrite_nodes(pass, &p.members)?;
            rw.dst.record_type(members, p.names, p.special)
        }
        Node::FnType(p) => {
            let params = rw.rewrite_nodes(pass, &p.params)?;
            let returns = rw.rewrite_nodes(pass, &p.returns)?;
            rw.dst.fn_type(params, returns)
        }
        Node::QualifiedType(p) => {
            let inner = rw.rewrite_node(pass, p.inner)?;
            rw.dst.qualified_type(inner, p.divergence)
        }
        Node::MaskType => rw.dst.mask_type(),
        Node::IntLiteral { width, bits } => rw.dst.int_literal(width, bits),
        Node::TrueLit => rw.dst.true_lit(),
        Node::Variable(p) => {
            let ty = rw.rewrite_node(pass, p.ty)?;
            rw.dst.fresh_variable(p.name, ty)
        }
        Node::PrimOp(p) => {
            let operands = rw.rewrite_nodes(pass, &p.operands)?;
            rw.dst.primop(p.op, operands)
        }
        Node::LeafCall(p) => {
            let callee = rw.rewrite_node(pass, p.callee)?;
            let args = rw.rewrite_nodes(pass, &p.args)?;
            rw.dst.leaf_call(callee, args)
        }
        Node::IndirectCall(p) => {
            let callee = rw.rewrite_node(pass, p.callee)?;
            let args = rw.rewrite_nodes(pass, &p.args)?;
            rw.dst.indirect_call(callee, args)
        }
        Node::Match(p) => {
            let inspect = rw.rewrite_node(pass, p.inspect)?;
            let literals = rw.rewrite_nodes(pass, &p.literals)?;
            let cases = rw.rewrite_nodes(pass, &p.cases)?;
            let default = rw.rewrite_node(pass, p.default)?;
            rw.dst.match_(inspect, literals, cases, default)
        }
        Node::Control(p) => {
            let body = rw.rewrite_node(pass, p.body)?;
            rw.dst.control(body)
        }
        Node::Loop(p) => {
            let params = rw.rewrite_nodes(pass, &p.params)?;
            let initial_args = rw.rewrite_nodes(pass, &p.initial_args)?;
            let body = rw.rewrite_node(pass, p.body)?;
            rw.dst.loop_(params, initial_args, body)
        }
        Node::If(p) => {
            let condition = rw.rewrite_node(pass, p.condition)?;
            let then_case = rw.rewrite_node(pass, p.then_case)?;
            let else_case = rw.rewrite_opt(pass, p.else_case)?;
            rw.dst.if_(condition, then_case, else_case)
        }
        Node::Let(p) => {
            let instruction = rw.rewrite_node(pass, p.instruction)?;
            let vars = rw.rewrite_nodes(pass, &p.vars)?;
            let tail = rw.rewrite_node(pass, p.tail)?;
            rw.dst.let_(instruction, vars, tail)
        }
        Node::Block(p) => {
            let instructions = rw.rewrite_nodes(pass, &p.instructions)?;
            let terminator = rw.rewrite_node(pass, p.terminator)?;
            rw.dst.block(instructions, terminator)
        }
        Node::Annotation(p) => {
            let args = rw.rewrite_nodes(pass, &p.args)?;
            rw.dst.annotation(p.name, args)
        }
        Node::Return(p) => {
            let values = rw.rewrite_nodes(pass, &p.values)?;
            rw.dst.return_(values)
        }
        Node::Unreachable => rw.dst.unreachable(),
        Node::Function(_) | Node::GlobalVariable(_) | Node::Root(_) => {
            return Err(IrErrorKind::invariant(format!(
                "recreate_node_identity called directly on a declaration ({:?}); \
                 the caller must special-case is_declaration first",
                old
            )))
        }
    };
    Ok(new)
}

/// Creates the new declaration's header (signature, empty body placeholder
/// where one exists) and registers `old → new` **before** the body is
/// rewritten, so recursive/mutually-recursive references resolve.
pub fn recreate_decl_header_identity(pass: &mut dyn RewritePass, rw: &mut Rewriter, old: NodeId) -> Result<NodeId> {
    let node = rw.src.get(old).clone();
    let new = match node {
        Node::Function(p) => {
            let params = rw.rewrite_nodes(pass, &p.params)?;
            let return_types = rw.rewrite_nodes(pass, &p.return_types)?;
            rw.dst.begin_function(params, return_types)
        }
        Node::GlobalVariable(p) => {
            let annotations = rw.rewrite_nodes(pass, &p.annotations)?;
            let ty = rw.rewrite_node(pass, p.ty)?;
            rw.dst.global_variable(annotations, ty, p.name, p.address_space)
        }
        Node::Root(_) => rw.dst.begin_root(),
        _ => {
            return Err(IrErrorKind::invariant(format!(
                "{:?} is not a declaration",
                old
            )))
        }
    };
    rw.register_processed(old, new)?;
    Ok(new)
}

/// Fills the body of a declaration whose header was already registered by
/// [`recreate_decl_header_identity`]. A no-op for `GlobalVariable`, which
/// has no separate body.
pub fn recreate_decl_body_identity(
    pass: &mut dyn RewritePass,
    rw: &mut Rewriter,
    old: NodeId,
    new: NodeId,
) -> Result<()> {
    let node = rw.src.get(old).clone();
    match node {
        Node::Function(p) => {
            let body = p
                .body
                .ok_or_else(|| IrErrorKind::invariant("function header has no body to rewrite"))?;
            let new_body = rw.rewrite_node(pass, body)?;
            rw.dst.set_function_body(new, new_body);
        }
        Node::GlobalVariable(_) => {}
        Node::Root(p) => {
            let new_decls = rw.rewrite_nodes(pass, &p.declarations)?;
            rw.dst.set_root_declarations(new, new_decls);
        }
        _ => {
            return Err(IrErrorKind::invariant(format!(
                "{:?} is not a declaration",
                old
            )))
        }
    }
    Ok(())
}

/// Rewrites an entire module (a `Root`) through `pass`, seeding by
/// registering the root first (§4.4 step 5).
pub fn rewrite_module(pass: &mut dyn RewritePass, rw: &mut Rewriter, root: NodeId) -> Result<NodeId> {
    log::debug!("rewriting module {:?}", root);
    rw.rewrite_node(pass, root)
}
