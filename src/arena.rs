//! The IR arena (C1): owns all node storage, interns structurally equal
//! nodes to one identity, and exposes the node constructors the rest of the
//! crate builds IR with.
//!
//! Grounded in the registry idiom used throughout the reference project's
//! `ty::reg::TypeRegistry` and `func::FunctionRegistry` (`set`/`get` pairs
//! backed by an `fnv::FnvHashMap`), generalized here from "one registry per
//! concrete kind" to "one interning table for every hash-consed node kind".
use fnv::FnvHashMap as HashMap;

use crate::config::Config;
use crate::node::{
    nodes, AddressSpace, AnnotationPayload, BlockPayload, CallPayload, ControlPayload, Divergence,
    FnTypePayload, FunctionPayload, GlobalVariablePayload, IfPayload, LetPayload, LoopPayload,
    MatchPayload, Node, NodeId, Nodes, Op, PrimOpPayload, PtrTypePayload, QualifiedTypePayload,
    RecordSpecial, RecordTypePayload, ReturnPayload, RootPayload, Str, VariablePayload,
};

pub struct IrArena {
    config: Config,
    nodes: Vec<Node>,
    /// Structural interning table. `Function`/`GlobalVariable`/`Root` never
    /// go through this map — see §4.1.1: declarations have their own
    /// identity independent of payload equality.
    intern: HashMap<Node, NodeId>,
    next_var_id: u32,
}

impl IrArena {
    pub fn new(config: Config) -> Self {
        IrArena {
            config,
            nodes: Vec::new(),
            intern: HashMap::default(),
            next_var_id: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consumes the arena. `Drop` would release the same storage on its
    /// own; this exists so callers used to the source project's explicit
    /// `destroy_ir_arena` have a matching call to make.
    pub fn destroy(self) {}

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// All nodes currently stored, in allocation order. Mostly useful to
    /// tests and tooling that want to scan a whole arena rather than walk
    /// from a known root.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Referentially-transparent construction: two calls with an equal
    /// payload return the same `NodeId` (P1).
    fn intern(&mut self, node: Node) -> NodeId {
        if let Some(&id) = self.intern.get(&node) {
            return id;
        }
        let id = self.push(node.clone());
        self.intern.insert(node, id);
        id
    }

    // ---- types ----------------------------------------------------------

    pub fn int_type(&mut self, width: u32, signed: bool) -> NodeId {
        self.intern(Node::IntType { width, signed })
    }

    pub fn int32_type(&mut self) -> NodeId {
        self.int_type(32, true)
    }

    pub fn int64_type(&mut self) -> NodeId {
        self.int_type(64, true)
    }

    pub fn ptr_type(&mut self, pointee: NodeId, address_space: AddressSpace) -> NodeId {
        self.intern(Node::PtrType(PtrTypePayload {
            pointee,
            address_space,
        }))
    }

    pub fn record_type(&mut self, members: Nodes, names: Option<Vec<Str>>, special: RecordSpecial) -> NodeId {
        self.intern(Node::RecordType(RecordTypePayload {
            members,
            names,
            special,
        }))
    }

    pub fn fn_type(&mut self, params: Nodes, returns: Nodes) -> NodeId {
        self.intern(Node::FnType(FnTypePayload { params, returns }))
    }

    pub fn qualified_type(&mut self, inner: NodeId, divergence: Divergence) -> NodeId {
        self.intern(Node::QualifiedType(QualifiedTypePayload { inner, divergence }))
    }

    pub fn mask_type(&mut self) -> NodeId {
        self.intern(Node::MaskType)
    }

    // ---- values -----------------------------------------------------------

    pub fn int_literal(&mut self, width: u32, bits: u64) -> NodeId {
        self.intern(Node::IntLiteral { width, bits })
    }

    pub fn true_lit(&mut self) -> NodeId {
        self.intern(Node::TrueLit)
    }

    /// Variables are never hash-consed: a fresh variable is a fresh binding
    /// site even if its name and type coincide with another's.
    pub fn fresh_variable(&mut self, name: Option<Str>, ty: NodeId) -> NodeId {
        let unique_id = self.next_var_id;
        self.next_var_id += 1;
        self.push(Node::Variable(VariablePayload { name, ty, unique_id }))
    }

    // ---- instructions -----------------------------------------------------

    pub fn primop(&mut self, op: Op, operands: Nodes) -> NodeId {
        self.intern(Node::PrimOp(PrimOpPayload { op, operands }))
    }

    pub fn leaf_call(&mut self, callee: NodeId, args: Nodes) -> NodeId {
        self.intern(Node::LeafCall(CallPayload { callee, args }))
    }

    pub fn indirect_call(&mut self, callee: NodeId, args: Nodes) -> NodeId {
        self.intern(Node::IndirectCall(CallPayload { callee, args }))
    }

    pub fn match_(&mut self, inspect: NodeId, literals: Nodes, cases: Nodes, default: NodeId) -> NodeId {
        self.intern(Node::Match(MatchPayload {
            inspect,
            literals,
            cases,
            default,
        }))
    }

    pub fn control(&mut self, body: NodeId) -> NodeId {
        self.intern(Node::Control(ControlPayload { body }))
    }

    pub fn loop_(&mut self, params: Nodes, initial_args: Nodes, body: NodeId) -> NodeId {
        self.intern(Node::Loop(LoopPayload {
            params,
            initial_args,
            body,
        }))
    }

    pub fn if_(&mut self, condition: NodeId, then_case: NodeId, else_case: Option<NodeId>) -> NodeId {
        self.intern(Node::If(IfPayload {
            condition,
            then_case,
            else_case,
        }))
    }

    // ---- structural ---------------------------------------------------

    pub fn let_(&mut self, instruction: NodeId, vars: Nodes, tail: NodeId) -> NodeId {
        self.intern(Node::Let(LetPayload { instruction, vars, tail }))
    }

    pub fn block(&mut self, instructions: Nodes, terminator: NodeId) -> NodeId {
        self.intern(Node::Block(BlockPayload {
            instructions,
            terminator,
        }))
    }

    pub fn return_(&mut self, values: Nodes) -> NodeId {
        self.intern(Node::Return(ReturnPayload { values }))
    }

    pub fn unreachable(&mut self) -> NodeId {
        self.intern(Node::Unreachable)
    }

    pub fn annotation(&mut self, name: Str, args: Nodes) -> NodeId {
        self.intern(Node::Annotation(AnnotationPayload { name, args }))
    }

    // ---- declarations (two-phase, never hash-consed; §4.1.1) ------------

    pub fn begin_function(&mut self, params: Nodes, return_types: Nodes) -> NodeId {
        self.push(Node::Function(FunctionPayload {
            params,
            return_types,
            body: None,
        }))
    }

    pub fn set_function_body(&mut self, id: NodeId, body: NodeId) {
        match &mut self.nodes[id.index()] {
            Node::Function(f) if f.body.is_none() => f.body = Some(body),
            Node::Function(_) => panic!("function body already set for {:?}", id),
            other => panic!("{:?} is not a function, got {:?}", id, other.tag()),
        }
    }

    pub fn global_variable(
        &mut self,
        annotations: Nodes,
        ty: NodeId,
        name: Str,
        address_space: AddressSpace,
    ) -> NodeId {
        self.push(Node::GlobalVariable(GlobalVariablePayload {
            annotations,
            ty,
            name,
            address_space,
        }))
    }

    pub fn begin_root(&mut self) -> NodeId {
        self.push(Node::Root(RootPayload {
            declarations: Nodes::from(Vec::new().into_boxed_slice()),
        }))
    }

    pub fn set_root_declarations(&mut self, id: NodeId, declarations: Nodes) {
        match &mut self.nodes[id.index()] {
            Node::Root(r) => r.declarations = declarations,
            other => panic!("{:?} is not a root, got {:?}", id, other.tag()),
        }
    }

    // ---- node-model predicates that need arena lookups (§4.2) ------------

    /// Unwraps one layer of `QualifiedType`, returning its divergence. A
    /// type that isn't qualified at all is treated as `Uniform` — the
    /// implicit default for every type this crate builds without an
    /// explicit `qualified_type` wrapper.
    pub fn strip_qualifier(&self, ty: NodeId) -> (NodeId, Divergence) {
        match self.get(ty) {
            Node::QualifiedType(p) => (p.inner, p.divergence),
            _ => (ty, Divergence::Uniform),
        }
    }

    /// Builds the `FnType` matching `f`'s current parameter types and
    /// return types.
    pub fn derive_fn_type(&mut self, f: NodeId) -> NodeId {
        let (params, returns) = match self.get(f) {
            Node::Function(p) => (p.params.clone(), p.return_types.clone()),
            other => panic!("derive_fn_type called on {:?}, not a function", other.tag()),
        };
        let param_tys: Vec<NodeId> = params
            .iter()
            .map(|&v| match self.get(v) {
                Node::Variable(vp) => vp.ty,
                other => panic!("function parameter {:?} is not a Variable", other.tag()),
            })
            .collect();
        self.fn_type(nodes(param_tys), returns)
    }
}
