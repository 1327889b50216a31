//! The tagged-union node definition (C2) and its structural predicates.
//!
//! `Node` fuses tag and payload the way a Rust enum naturally does; `Tag`
//! exists separately because passes frequently want to ask "what kind of
//! thing is this" without borrowing the payload (e.g. `is_terminator`).

use std::rc::Rc;

/// Index of a node within its owning [`crate::arena::IrArena`]. Stands in
/// for the source project's raw node pointer: stable across arena growth,
/// `Copy`, and compares by value the same way pointer identity would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A reference-counted, structurally-hashed list of node ids. Cheap to
/// clone and to share across interned payloads; `Hash`/`Eq` on `Rc<[T]>`
/// compare contents (length then elements, in order), which is exactly the
/// normalization the interning table needs.
pub type Nodes = Rc<[NodeId]>;

/// A reference-counted string, cheap to clone across arenas.
pub type Str = Rc<str>;

pub fn nodes(ids: impl Into<Vec<NodeId>>) -> Nodes {
    Rc::from(ids.into().into_boxed_slice())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    IntType,
    PtrType,
    RecordType,
    FnType,
    QualifiedType,
    MaskType,
    IntLiteral,
    TrueLit,
    Variable,
    PrimOp,
    LeafCall,
    IndirectCall,
    Match,
    Control,
    Loop,
    If,
    Let,
    Block,
    Function,
    GlobalVariable,
    Root,
    Annotation,
    Return,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    Generic,
    Private,
    Shared,
    Global,
    External,
    PushConstant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Divergence {
    Uniform,
    Varying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSpecial {
    NotSpecial,
    DecorateBlock,
}

/// Arithmetic, memory and high-level primitive operations a `PrimOp` may
/// carry. High-level ops (`push_stack` .. `mask_is_thread_active`) never
/// reach the emitter directly: mask lowering and stack optimization must
/// have rewritten them away first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    And,
    Or,
    LShift,
    RShiftLogical,
    Eq,
    Extract,
    Reinterpret,
    PushStack,
    PopStack,
    EmptyMask,
    SubgroupBallot,
    SubgroupActiveMask,
    MaskIsThreadActive,
}

impl Op {
    pub fn name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::And => "and",
            Op::Or => "or",
            Op::LShift => "lshift",
            Op::RShiftLogical => "rshift_logical",
            Op::Eq => "eq",
            Op::Extract => "extract",
            Op::Reinterpret => "reinterpret",
            Op::PushStack => "push_stack",
            Op::PopStack => "pop_stack",
            Op::EmptyMask => "empty_mask",
            Op::SubgroupBallot => "subgroup_ballot",
            Op::SubgroupActiveMask => "subgroup_active_mask",
            Op::MaskIsThreadActive => "mask_is_thread_active",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PtrTypePayload {
    pub pointee: NodeId,
    pub address_space: AddressSpace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordTypePayload {
    pub members: Nodes,
    pub names: Option<Vec<Str>>,
    pub special: RecordSpecial,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnTypePayload {
    pub params: Nodes,
    pub returns: Nodes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedTypePayload {
    pub inner: NodeId,
    pub divergence: Divergence,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariablePayload {
    pub name: Option<Str>,
    pub ty: NodeId,
    pub unique_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimOpPayload {
    pub op: Op,
    pub operands: Nodes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallPayload {
    pub callee: NodeId,
    pub args: Nodes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchPayload {
    pub inspect: NodeId,
    pub literals: Nodes,
    pub cases: Nodes,
    pub default: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlPayload {
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoopPayload {
    pub params: Nodes,
    pub initial_args: Nodes,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IfPayload {
    pub condition: NodeId,
    pub then_case: NodeId,
    pub else_case: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LetPayload {
    pub instruction: NodeId,
    /// Fresh variables bound to `instruction`'s results, in order. Zero-length
    /// for instructions kept only for their side effect.
    pub vars: Nodes,
    pub tail: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockPayload {
    pub instructions: Nodes,
    pub terminator: NodeId,
}

/// `body` is `None` between `begin_function` and `set_function_body` (the
/// two-phase construction window described in §3/§9 of the spec). Functions
/// are never hash-consed (see `arena` module docs), so an `Option` here is
/// unproblematic: each `Function` node is its own unique identity regardless
/// of payload equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionPayload {
    pub params: Nodes,
    pub return_types: Nodes,
    pub body: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalVariablePayload {
    pub annotations: Nodes,
    pub ty: NodeId,
    pub name: Str,
    pub address_space: AddressSpace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootPayload {
    pub declarations: Nodes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationPayload {
    pub name: Str,
    pub args: Nodes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReturnPayload {
    pub values: Nodes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    IntType { width: u32, signed: bool },
    PtrType(PtrTypePayload),
    RecordType(RecordTypePayload),
    FnType(FnTypePayload),
    QualifiedType(QualifiedTypePayload),
    MaskType,
    IntLiteral { width: u32, bits: u64 },
    TrueLit,
    Variable(VariablePayload),
    PrimOp(PrimOpPayload),
    LeafCall(CallPayload),
    IndirectCall(CallPayload),
    Match(MatchPayload),
    Control(ControlPayload),
    Loop(LoopPayload),
    If(IfPayload),
    Let(LetPayload),
    Block(BlockPayload),
    Function(FunctionPayload),
    GlobalVariable(GlobalVariablePayload),
    Root(RootPayload),
    Annotation(AnnotationPayload),
    Return(ReturnPayload),
    Unreachable,
}

impl Node {
    pub fn tag(&self) -> Tag {
        match self {
            Node::IntType { .. } => Tag::IntType,
            Node::PtrType(_) => Tag::PtrType,
            Node::RecordType(_) => Tag::RecordType,
            Node::FnType(_) => Tag::FnType,
            Node::QualifiedType(_) => Tag::QualifiedType,
            Node::MaskType => Tag::MaskType,
            Node::IntLiteral { .. } => Tag::IntLiteral,
            Node::TrueLit => Tag::TrueLit,
            Node::Variable(_) => Tag::Variable,
            Node::PrimOp(_) => Tag::PrimOp,
            Node::LeafCall(_) => Tag::LeafCall,
            Node::IndirectCall(_) => Tag::IndirectCall,
            Node::Match(_) => Tag::Match,
            Node::Control(_) => Tag::Control,
            Node::Loop(_) => Tag::Loop,
            Node::If(_) => Tag::If,
            Node::Let(_) => Tag::Let,
            Node::Block(_) => Tag::Block,
            Node::Function(_) => Tag::Function,
            Node::GlobalVariable(_) => Tag::GlobalVariable,
            Node::Root(_) => Tag::Root,
            Node::Annotation(_) => Tag::Annotation,
            Node::Return(_) => Tag::Return,
            Node::Unreachable => Tag::Unreachable,
        }
    }
}

pub fn is_type(tag: Tag) -> bool {
    matches!(
        tag,
        Tag::IntType | Tag::PtrType | Tag::RecordType | Tag::FnType | Tag::QualifiedType | Tag::MaskType
    )
}

pub fn is_value(tag: Tag) -> bool {
    matches!(tag, Tag::IntLiteral | Tag::TrueLit | Tag::Variable)
}

/// `Match`/`Control`/`Loop`/`If` are double-duty: bound via a `Let` they act
/// as instructions, appearing bare as a `Block.terminator` they act as
/// terminators (see §3.1).
pub fn is_instruction(tag: Tag) -> bool {
    matches!(
        tag,
        Tag::PrimOp | Tag::LeafCall | Tag::IndirectCall | Tag::Match | Tag::Control | Tag::Loop | Tag::If
    )
}

pub fn is_terminator(tag: Tag) -> bool {
    matches!(
        tag,
        Tag::Return | Tag::Unreachable | Tag::Match | Tag::Control | Tag::Loop | Tag::If | Tag::Let
    )
}

pub fn is_declaration(tag: Tag) -> bool {
    matches!(tag, Tag::Function | Tag::GlobalVariable)
}

pub fn is_annotation(tag: Tag) -> bool {
    matches!(tag, Tag::Annotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_list_equality_is_structural_by_element_identity() {
        let a = nodes(vec![NodeId(0), NodeId(1)]);
        let b = nodes(vec![NodeId(0), NodeId(1)]);
        let c = nodes(vec![NodeId(1), NodeId(0)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn control_tags_are_both_instruction_and_terminator() {
        assert!(is_instruction(Tag::If) && is_terminator(Tag::If));
        assert!(is_instruction(Tag::Loop) && is_terminator(Tag::Loop));
    }
}
