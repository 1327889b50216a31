//! The SPIR-V emitter (C7): lowers a fully-rewritten module to the binary
//! word stream, grounded in the section-ordered `LogicalLayout`/`Writer`
//! idiom from the javelin SPIR-V backend (`other_examples` pack) and in
//! `spirq-core`'s `InstructionBuilder` word encoding (`emit::words`).
pub mod words;

use fnv::FnvHashMap as HashMap;
use spirv::{Op as SpvOp, StorageClass, Word};

use crate::arena::IrArena;
use crate::config::Config;
use crate::error::{IrErrorKind, Result};
use crate::node::{nodes, AddressSpace, CallPayload, Node, NodeId, Nodes, Op as IrOp, PrimOpPayload, RecordSpecial};

use words::{emit_into, InstructionBuilder};

const SPV_MAGIC: u32 = 0x0723_0203;
const SPV_VERSION_1_3: u32 = 0x0001_0300;
const GENERATOR_ID: u32 = 0;

/// Emits `root` (a `Root` declaration) from `arena` as a complete SPIR-V
/// module. `arena` is expected to already be the output of the canonical
/// mask-lowering + stack-optimization pipeline; any node this emitter does
/// not know how to lower surfaces as [`IrErrorKind::UnsupportedOp`], never
/// silently.
pub fn emit_module(_config: Config, arena: &IrArena, root: NodeId) -> Result<Vec<u32>> {
    let mut emitter = Emitter::new(arena);
    emitter.emit_capabilities();
    emitter.emit_memory_model();
    emitter.void_type()?;

    let declarations = match arena.get(root) {
        Node::Root(r) => r.declarations.clone(),
        other => return Err(IrErrorKind::invariant(format!("emit_module root is not a Root, got {:?}", other.tag()))),
    };
    log::info!("emitting {} top-level declarations", declarations.len());

    for &decl in declarations.iter() {
        let id = emitter.fresh_id();
        emitter.ids.insert(decl, id);
    }
    for &decl in declarations.iter() {
        let reserved = emitter.ids[&decl];
        match arena.get(decl) {
            Node::GlobalVariable(_) => emitter.emit_global_variable(decl, reserved)?,
            Node::Function(_) => emitter.emit_function(decl, reserved)?,
            other => {
                return Err(IrErrorKind::invariant(format!(
                    "unexpected top-level declaration {:?}",
                    other.tag()
                )))
            }
        }
    }

    Ok(emitter.finalize())
}

struct Sections {
    capabilities: Vec<u32>,
    memory_model: Vec<u32>,
    annotations: Vec<u32>,
    types_and_constants: Vec<u32>,
    functions: Vec<u32>,
}

struct Emitter<'a> {
    arena: &'a IrArena,
    next_id: Word,
    /// Node-identity → SpvId, so every node is emitted at most once.
    ids: HashMap<NodeId, Word>,
    void_type: Option<Word>,
    bool_type: Option<Word>,
    /// `(width, signed) → SpvId`, so a literal's synthesized `OpTypeInt`
    /// and the same-shaped `OpTypeInt` emitted for a real `IntType` node
    /// resolve to the same id rather than each declaring their own.
    int_types: HashMap<(u32, bool), Word>,
    sections: Sections,
}

impl<'a> Emitter<'a> {
    fn new(arena: &'a IrArena) -> Self {
        Emitter {
            arena,
            next_id: 1,
            ids: HashMap::default(),
            void_type: None,
            bool_type: None,
            int_types: HashMap::default(),
            sections: Sections {
                capabilities: Vec::new(),
                memory_model: Vec::new(),
                annotations: Vec::new(),
                types_and_constants: Vec::new(),
                functions: Vec::new(),
            },
        }
    }

    fn fresh_id(&mut self) -> Word {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn emit_capabilities(&mut self) {
        for cap in [spirv::Capability::Shader, spirv::Capability::Linkage, spirv::Capability::PhysicalStorageBufferAddresses] {
            let instr = InstructionBuilder::new(SpvOp::Capability).push(cap as u32).build();
            emit_into(&mut self.sections.capabilities, instr);
        }
    }

    fn emit_memory_model(&mut self) {
        let instr = InstructionBuilder::new(SpvOp::MemoryModel)
            .push(spirv::AddressingModel::Logical as u32)
            .push(spirv::MemoryModel::GLSL450 as u32)
            .build();
        emit_into(&mut self.sections.memory_model, instr);
    }

    fn void_type(&mut self) -> Result<Word> {
        if let Some(w) = self.void_type {
            return Ok(w);
        }
        let w = self.fresh_id();
        let instr = InstructionBuilder::new(SpvOp::TypeVoid).push(w).build();
        emit_into(&mut self.sections.types_and_constants, instr);
        self.void_type = Some(w);
        Ok(w)
    }

    /// `int_type(1, false)` is this crate's stand-in for a boolean (the
    /// node model has no dedicated `Bool` type kind) — emitted as
    /// `OpTypeBool`, since SPIR-V has no valid width-1 `OpTypeInt` and
    /// `OpIEqual` requires a `Bool` result type.
    fn emit_bool_type(&mut self) -> Result<Word> {
        if let Some(w) = self.bool_type {
            return Ok(w);
        }
        let w = self.fresh_id();
        let instr = InstructionBuilder::new(SpvOp::TypeBool).push(w).build();
        emit_into(&mut self.sections.types_and_constants, instr);
        self.bool_type = Some(w);
        Ok(w)
    }

    fn emit_type(&mut self, id: NodeId) -> Result<Word> {
        if let Some(&w) = self.ids.get(&id) {
            return Ok(w);
        }
        let node = self.arena.get(id).clone();
        let word = match node {
            Node::IntType { width: 1, signed: false } => self.emit_bool_type()?,
            Node::IntType { width, signed } => {
                if let Some(&w) = self.int_types.get(&(width, signed)) {
                    w
                } else {
                    let w = self.fresh_id();
                    let instr = InstructionBuilder::new(SpvOp::TypeInt).push(w).push(width).push(signed as u32).build();
                    emit_into(&mut self.sections.types_and_constants, instr);
                    self.int_types.insert((width, signed), w);
                    w
                }
            }
            Node::PtrType(p) => {
                let pointee = self.emit_type(p.pointee)?;
                let sc = storage_class_for_pointer(p.address_space);
                let w = self.fresh_id();
                let instr = InstructionBuilder::new(SpvOp::TypePointer).push(w).push(sc as u32).push(pointee).build();
                emit_into(&mut self.sections.types_and_constants, instr);
                w
            }
            Node::RecordType(p) => {
                let member_ids = self.emit_type_list(&p.members)?;
                let w = self.fresh_id();
                let instr = InstructionBuilder::new(SpvOp::TypeStruct).push(w).push_list(&member_ids).build();
                emit_into(&mut self.sections.types_and_constants, instr);
                if p.special == RecordSpecial::DecorateBlock {
                    let deco = InstructionBuilder::new(SpvOp::Decorate)
                        .push(w)
                        .push(spirv::Decoration::Block as u32)
                        .build();
                    emit_into(&mut self.sections.annotations, deco);
                }
                w
            }
            Node::FnType(p) => {
                let ret = self.derive_return_type(&p.returns)?;
                let param_ids = self.emit_type_list(&p.params)?;
                let w = self.fresh_id();
                let instr = InstructionBuilder::new(SpvOp::TypeFunction).push(w).push(ret).push_list(&param_ids).build();
                emit_into(&mut self.sections.types_and_constants, instr);
                w
            }
            Node::QualifiedType(p) => self.emit_type(p.inner)?,
            other => {
                log::warn!("unsupported type {:?} reached emit_type", other.tag());
                return Err(IrErrorKind::unsupported(
                    format!("{:?}", other.tag()),
                    "emit_type (mask lowering must run before emission)",
                ));
            }
        };
        self.ids.insert(id, word);
        Ok(word)
    }

    fn emit_type_list(&mut self, ids: &Nodes) -> Result<Vec<Word>> {
        ids.iter().map(|&id| self.emit_type(id)).collect()
    }

    /// Functions with zero returns use `void`; one return uses that type
    /// directly; two or more are modeled as a synthesized struct, built
    /// here without needing a `RecordType` node in the source arena.
    fn derive_return_type(&mut self, returns: &Nodes) -> Result<Word> {
        match returns.len() {
            0 => self.void_type(),
            1 => self.emit_type(returns[0]),
            _ => {
                let member_ids = self.emit_type_list(returns)?;
                let w = self.fresh_id();
                let instr = InstructionBuilder::new(SpvOp::TypeStruct).push(w).push_list(&member_ids).build();
                emit_into(&mut self.sections.types_and_constants, instr);
                Ok(w)
            }
        }
    }

    /// Int literals carry no signedness of their own; every literal in
    /// this crate is built against a signed integer type of the same
    /// width (see `arena::int_type`'s call sites), so the emitter assumes
    /// signed here too rather than threading a type through every
    /// literal-producing call.
    fn emit_value(&mut self, id: NodeId) -> Result<Word> {
        if let Some(&w) = self.ids.get(&id) {
            return Ok(w);
        }
        let node = self.arena.get(id).clone();
        let word = match node {
            Node::IntLiteral { width, bits } => {
                let ty = self.emit_type_int(width, true)?;
                let w = self.fresh_id();
                let mut builder = InstructionBuilder::new(SpvOp::Constant).push(ty).push(w).push(bits as u32);
                if width > 32 {
                    builder = builder.push((bits >> 32) as u32);
                }
                emit_into(&mut self.sections.types_and_constants, builder.build());
                w
            }
            Node::TrueLit => {
                let ty = self.emit_bool_type()?;
                let w = self.fresh_id();
                let instr = InstructionBuilder::new(SpvOp::ConstantTrue).push(ty).push(w).build();
                emit_into(&mut self.sections.types_and_constants, instr);
                w
            }
            Node::Variable(_) => {
                return Err(IrErrorKind::invariant(format!(
                    "variable {:?} used before its binding was emitted",
                    id
                )))
            }
            Node::Function(_) | Node::GlobalVariable(_) => {
                return Err(IrErrorKind::invariant(format!("declaration {:?} was not reserved an id up front", id)))
            }
            other => {
                log::warn!("unsupported value {:?} reached emit_value", other.tag());
                return Err(IrErrorKind::unsupported(format!("{:?}", other.tag()), "emit_value"));
            }
        };
        self.ids.insert(id, word);
        Ok(word)
    }

    /// Literals don't carry a type node id, only width/signedness, so this
    /// can't key off `NodeId` the way `emit_type` does — it shares the
    /// `int_types` cache instead, keyed by `(width, signed)`, so a literal
    /// reuses the `OpTypeInt` already emitted for a same-shaped `IntType`
    /// node (or vice versa) rather than redeclaring it.
    fn emit_type_int(&mut self, width: u32, signed: bool) -> Result<Word> {
        if let Some(&w) = self.int_types.get(&(width, signed)) {
            return Ok(w);
        }
        let w = self.fresh_id();
        let instr = InstructionBuilder::new(SpvOp::TypeInt).push(w).push(width).push(signed as u32).build();
        emit_into(&mut self.sections.types_and_constants, instr);
        self.int_types.insert((width, signed), w);
        Ok(w)
    }

    fn emit_global_variable(&mut self, id: NodeId, reserved: Word) -> Result<()> {
        let p = match self.arena.get(id) {
            Node::GlobalVariable(p) => p.clone(),
            _ => unreachable!("reserved id must name a GlobalVariable"),
        };
        let pointee_ty = self.emit_type(p.ty)?;
        let sc = storage_class_for_variable(p.address_space);
        let ptr_ty = self.fresh_id();
        emit_into(
            &mut self.sections.types_and_constants,
            InstructionBuilder::new(SpvOp::TypePointer).push(ptr_ty).push(sc as u32).push(pointee_ty).build(),
        );
        let instr = InstructionBuilder::new(SpvOp::Variable).push(ptr_ty).push(reserved).push(sc as u32).build();
        emit_into(&mut self.sections.types_and_constants, instr);
        Ok(())
    }

    fn emit_function(&mut self, id: NodeId, fn_id: Word) -> Result<()> {
        let p = match self.arena.get(id) {
            Node::Function(p) => p.clone(),
            _ => unreachable!("reserved id must name a Function"),
        };
        let return_ty = self.derive_return_type(&p.return_types)?;
        let param_tys: Vec<Word> = p
            .params
            .iter()
            .map(|&param| match self.arena.get(param) {
                Node::Variable(v) => self.emit_type(v.ty),
                _ => Err(IrErrorKind::invariant("function parameter is not a Variable")),
            })
            .collect::<Result<_>>()?;

        let fn_type_id = self.fresh_id();
        emit_into(
            &mut self.sections.types_and_constants,
            InstructionBuilder::new(SpvOp::TypeFunction).push(fn_type_id).push(return_ty).push_list(&param_tys).build(),
        );

        emit_into(
            &mut self.sections.functions,
            InstructionBuilder::new(SpvOp::Function).push(return_ty).push(fn_id).push(0).push(fn_type_id).build(),
        );

        for (&param, &param_ty) in p.params.iter().zip(param_tys.iter()) {
            let param_id = self.fresh_id();
            self.ids.insert(param, param_id);
            emit_into(
                &mut self.sections.functions,
                InstructionBuilder::new(SpvOp::FunctionParameter).push(param_ty).push(param_id).build(),
            );
        }

        let label_id = self.fresh_id();
        emit_into(&mut self.sections.functions, InstructionBuilder::new(SpvOp::Label).push(label_id).build());

        let body_id = p.body.ok_or_else(|| IrErrorKind::invariant("function has no body at emission time"))?;
        self.emit_block(body_id, return_ty)?;

        emit_into(&mut self.sections.functions, InstructionBuilder::new(SpvOp::FunctionEnd).build());
        Ok(())
    }

    fn emit_block(&mut self, block_id: NodeId, return_ty: Word) -> Result<()> {
        let p = match self.arena.get(block_id) {
            Node::Block(p) => p.clone(),
            other => return Err(IrErrorKind::invariant(format!("expected a Block, got {:?}", other.tag()))),
        };
        for &instr in p.instructions.iter() {
            self.emit_instruction(instr)?;
        }
        self.emit_terminator(p.terminator, return_ty)
    }

    fn emit_instruction(&mut self, id: NodeId) -> Result<()> {
        match self.arena.get(id).clone() {
            Node::Let(p) => self.emit_bound_instruction(p.instruction, &p.vars),
            other if crate::node::is_instruction(other.tag()) => self.emit_bound_instruction(id, &nodes(vec![])),
            other => Err(IrErrorKind::invariant(format!(
                "{:?} cannot appear directly inside Block.instructions",
                other.tag()
            ))),
        }
    }

    fn emit_bound_instruction(&mut self, instr_id: NodeId, vars: &Nodes) -> Result<()> {
        match self.arena.get(instr_id).clone() {
            Node::PrimOp(op) => self.emit_primop(op, vars),
            Node::LeafCall(c) => self.emit_call(false, c, vars),
            Node::IndirectCall(c) => self.emit_call(true, c, vars),
            other => {
                log::warn!("unsupported instruction {:?} reached emit_bound_instruction", other.tag());
                Err(IrErrorKind::unsupported(format!("{:?}", other.tag()), "emit_instruction"))
            }
        }
    }

    fn emit_primop(&mut self, op: PrimOpPayload, vars: &Nodes) -> Result<()> {
        let &var = vars
            .first()
            .ok_or_else(|| IrErrorKind::malformed("primop", "expected exactly one bound result"))?;
        let result_ty = match self.arena.get(var) {
            Node::Variable(v) => self.emit_type(v.ty)?,
            _ => return Err(IrErrorKind::invariant("primop result is not bound to a Variable")),
        };
        let result_id = self.fresh_id();
        self.ids.insert(var, result_id);

        if op.op == IrOp::Extract {
            let composite = self.emit_value(op.operands[0])?;
            let mut builder = InstructionBuilder::new(SpvOp::CompositeExtract)
                .push(result_ty)
                .push(result_id)
                .push(composite);
            for &idx_node in &op.operands[1..] {
                let literal = match self.arena.get(idx_node) {
                    Node::IntLiteral { bits, .. } => *bits as u32,
                    _ => return Err(IrErrorKind::malformed("extract", "index operand must be an int literal")),
                };
                builder = builder.push(literal);
            }
            emit_into(&mut self.sections.functions, builder.build());
            return Ok(());
        }

        let spv_op = match op.op {
            IrOp::Add => SpvOp::IAdd,
            IrOp::And => SpvOp::BitwiseAnd,
            IrOp::Or => SpvOp::BitwiseOr,
            IrOp::LShift => SpvOp::ShiftLeftLogical,
            IrOp::RShiftLogical => SpvOp::ShiftRightLogical,
            IrOp::Eq => SpvOp::IEqual,
            IrOp::Reinterpret => SpvOp::Bitcast,
            other => {
                log::warn!("unsupported primop {:?} reached emit_primop", other.name());
                return Err(IrErrorKind::unsupported(other.name(), "emit_instruction"));
            }
        };
        let operand_ids: Vec<Word> = op.operands.iter().map(|&o| self.emit_value(o)).collect::<Result<_>>()?;
        let instr = InstructionBuilder::new(spv_op).push(result_ty).push(result_id).push_list(&operand_ids).build();
        emit_into(&mut self.sections.functions, instr);
        Ok(())
    }

    fn emit_call(&mut self, is_indirect: bool, c: CallPayload, vars: &Nodes) -> Result<()> {
        if is_indirect {
            log::warn!("unsupported indirect_call reached emit_call");
            return Err(IrErrorKind::unsupported("indirect_call", "emit_instruction"));
        }
        let return_ty = match self.arena.get(c.callee) {
            Node::Function(f) => self.derive_return_type(&f.return_types)?,
            _ => return Err(IrErrorKind::invariant("call callee is not a Function")),
        };
        let callee_word = self.emit_value(c.callee)?;
        let result_id = self.fresh_id();
        if let Some(&var) = vars.first() {
            self.ids.insert(var, result_id);
        }
        let arg_ids: Vec<Word> = c.args.iter().map(|&a| self.emit_value(a)).collect::<Result<_>>()?;
        let instr = InstructionBuilder::new(SpvOp::FunctionCall)
            .push(return_ty)
            .push(result_id)
            .push(callee_word)
            .push_list(&arg_ids)
            .build();
        emit_into(&mut self.sections.functions, instr);
        Ok(())
    }

    fn emit_terminator(&mut self, id: NodeId, return_ty: Word) -> Result<()> {
        match self.arena.get(id).clone() {
            Node::Return(p) => match p.values.len() {
                0 => {
                    emit_into(&mut self.sections.functions, InstructionBuilder::new(SpvOp::Return).build());
                    Ok(())
                }
                1 => {
                    let v = self.emit_value(p.values[0])?;
                    emit_into(&mut self.sections.functions, InstructionBuilder::new(SpvOp::ReturnValue).push(v).build());
                    Ok(())
                }
                _ => {
                    let member_ids: Vec<Word> = p.values.iter().map(|&v| self.emit_value(v)).collect::<Result<_>>()?;
                    let composite_id = self.fresh_id();
                    emit_into(
                        &mut self.sections.functions,
                        InstructionBuilder::new(SpvOp::CompositeConstruct)
                            .push(return_ty)
                            .push(composite_id)
                            .push_list(&member_ids)
                            .build(),
                    );
                    emit_into(
                        &mut self.sections.functions,
                        InstructionBuilder::new(SpvOp::ReturnValue).push(composite_id).build(),
                    );
                    Ok(())
                }
            },
            Node::Unreachable => {
                emit_into(&mut self.sections.functions, InstructionBuilder::new(SpvOp::Unreachable).build());
                Ok(())
            }
            other => {
                log::warn!("unsupported terminator {:?} reached emit_terminator", other.tag());
                Err(IrErrorKind::unsupported(format!("{:?}", other.tag()), "emit_terminator"))
            }
        }
    }

    fn finalize(self) -> Vec<u32> {
        let mut out = Vec::new();
        out.push(SPV_MAGIC);
        out.push(SPV_VERSION_1_3);
        out.push(GENERATOR_ID);
        out.push(self.next_id);
        out.push(0); // schema, reserved
        out.extend(self.sections.capabilities);
        out.extend(self.sections.memory_model);
        out.extend(self.sections.annotations);
        out.extend(self.sections.types_and_constants);
        out.extend(self.sections.functions);
        out
    }
}

/// Storage class for a variable *declaration* (`OpVariable`'s storage
/// class operand). `External`/`PushConstant` sit outside §4.7's table
/// (that table only names the four pre-entrypoint-remap spaces); they are
/// mapped to their natural SPIR-V counterparts here.
fn storage_class_for_variable(space: AddressSpace) -> StorageClass {
    match space {
        AddressSpace::Generic => StorageClass::Generic,
        AddressSpace::Private => StorageClass::Private,
        AddressSpace::Shared => StorageClass::CrossWorkgroup,
        AddressSpace::Global => StorageClass::StorageBuffer,
        AddressSpace::External => StorageClass::UniformConstant,
        AddressSpace::PushConstant => StorageClass::PushConstant,
    }
}

/// Storage class for a *pointer type* (`OpTypePointer`'s storage class
/// operand). Differs from the variable table only for `Global`.
fn storage_class_for_pointer(space: AddressSpace) -> StorageClass {
    match space {
        AddressSpace::Global => StorageClass::PhysicalStorageBuffer,
        other => storage_class_for_variable(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::nodes;

    fn single_return_function(arena: &mut IrArena) -> NodeId {
        let i32t = arena.int32_type();
        let a = arena.int_literal(32, 1);
        let b = arena.int_literal(32, 2);
        let sum = arena.primop(IrOp::Add, nodes(vec![a, b]));
        let result = arena.fresh_variable(None, i32t);
        let ret = arena.return_(nodes(vec![result]));
        let body = arena.let_(sum, nodes(vec![result]), ret);
        let f = arena.begin_function(nodes(vec![]), nodes(vec![i32t]));
        let block = arena.block(nodes(vec![body]), ret);
        arena.set_function_body(f, block);
        f
    }

    #[test]
    fn emits_a_well_formed_header_and_bound() {
        let mut arena = IrArena::new(Config::default());
        let f = single_return_function(&mut arena);
        let root = arena.begin_root();
        arena.set_root_declarations(root, nodes(vec![f]));

        let words = emit_module(Config::default(), &arena, root).unwrap();
        assert_eq!(words[0], SPV_MAGIC);
        assert!(words[3] > 1, "bound must exceed the first allocated id");
    }

    #[test]
    fn return_arity_two_uses_composite_construct() {
        let mut arena = IrArena::new(Config::default());
        let i32t = arena.int32_type();
        let a = arena.int_literal(32, 1);
        let b = arena.int_literal(32, 2);
        let ret = arena.return_(nodes(vec![a, b]));
        let block = arena.block(nodes(vec![]), ret);
        let f = arena.begin_function(nodes(vec![]), nodes(vec![i32t, i32t]));
        arena.set_function_body(f, block);
        let root = arena.begin_root();
        arena.set_root_declarations(root, nodes(vec![f]));

        let words = emit_module(Config::default(), &arena, root).unwrap();
        let has_composite_construct = words.iter().any(|&w| (w & 0xFFFF) == SpvOp::CompositeConstruct as u32);
        assert!(has_composite_construct);
    }

    #[test]
    fn wide_int_literal_emits_a_two_word_constant() {
        let mut arena = IrArena::new(Config::default());
        let i64t = arena.int64_type();
        let big = arena.int_literal(64, 0x1_0000_0001);
        let ret = arena.return_(nodes(vec![big]));
        let block = arena.block(nodes(vec![]), ret);
        let f = arena.begin_function(nodes(vec![]), nodes(vec![i64t]));
        arena.set_function_body(f, block);
        let root = arena.begin_root();
        arena.set_root_declarations(root, nodes(vec![f]));

        let words = emit_module(Config::default(), &arena, root).unwrap();
        let mut found = false;
        let mut i = 5; // past the 5-word header
        while i < words.len() {
            let word_count = (words[i] >> 16) as usize;
            let op = words[i] & 0xFFFF;
            if op == SpvOp::Constant as u32 && word_count == 4 {
                // result type, result id, low word, high word
                assert_eq!(words[i + 3], 0x1_0000_0001u64 as u32);
                assert_eq!(words[i + 4], (0x1_0000_0001u64 >> 32) as u32);
                found = true;
            }
            i += word_count;
        }
        assert!(found, "expected a 4-word OpConstant for the 64-bit literal");
    }

    #[test]
    fn int_type_is_not_redeclared_between_a_type_node_and_a_literal() {
        let mut arena = IrArena::new(Config::default());
        let i32t = arena.int32_type();
        let a = arena.int_literal(32, 1);
        let ret = arena.return_(nodes(vec![a]));
        let block = arena.block(nodes(vec![]), ret);
        let f = arena.begin_function(nodes(vec![]), nodes(vec![i32t]));
        arena.set_function_body(f, block);
        let root = arena.begin_root();
        arena.set_root_declarations(root, nodes(vec![f]));

        let words = emit_module(Config::default(), &arena, root).unwrap();
        let mut count = 0;
        let mut i = 5;
        while i < words.len() {
            let word_count = (words[i] >> 16) as usize;
            if words[i] & 0xFFFF == SpvOp::TypeInt as u32 {
                count += 1;
            }
            i += word_count;
        }
        assert_eq!(count, 1, "the function's return type and the literal's type must share one OpTypeInt");
    }

    #[test]
    fn mask_is_thread_active_result_is_a_real_spv_bool() {
        use crate::passes::mask_lowering::lower_masks;

        let mut src = IrArena::new(Config::default());
        let mask_ty = src.mask_type();
        let mask_var = src.fresh_variable(None, mask_ty);
        let idx_ty = src.int32_type();
        let idx_var = src.fresh_variable(None, idx_ty);
        let check = src.primop(IrOp::MaskIsThreadActive, nodes(vec![mask_var, idx_var]));
        let bool_ty = src.int_type(1, false);
        let result = src.fresh_variable(None, bool_ty);
        let ret = src.return_(nodes(vec![result]));
        let body = src.let_(check, nodes(vec![result]), ret);
        let block = src.block(nodes(vec![body]), ret);
        let f = src.begin_function(nodes(vec![mask_var, idx_var]), nodes(vec![bool_ty]));
        src.set_function_body(f, block);
        let root = src.begin_root();
        src.set_root_declarations(root, nodes(vec![f]));

        let mut dst = IrArena::new(Config::default());
        let new_root = lower_masks(Config::default(), &src, &mut dst, root).unwrap();

        let words = emit_module(Config::default(), &dst, new_root).unwrap();
        let mut has_type_bool = false;
        let mut has_width_one_int = false;
        let mut i = 5;
        while i < words.len() {
            let word_count = (words[i] >> 16) as usize;
            let op = words[i] & 0xFFFF;
            if op == SpvOp::TypeBool as u32 {
                has_type_bool = true;
            }
            if op == SpvOp::TypeInt as u32 && words[i + 2] == 1 {
                has_width_one_int = true;
            }
            i += word_count;
        }
        assert!(has_type_bool, "eq's boolean result must be backed by OpTypeBool, not a width-1 OpTypeInt");
        assert!(!has_width_one_int, "no OpTypeInt of width 1 may appear in valid SPIR-V");
    }

    #[test]
    fn unlowered_mask_op_is_reported_not_silently_dropped() {
        let mut arena = IrArena::new(Config::default());
        let empty = arena.primop(IrOp::EmptyMask, nodes(vec![]));
        let mask_ty = arena.mask_type();
        let m = arena.fresh_variable(None, mask_ty);
        let ret = arena.return_(nodes(vec![]));
        let body = arena.let_(empty, nodes(vec![m]), ret);
        let block = arena.block(nodes(vec![body]), ret);
        let f = arena.begin_function(nodes(vec![]), nodes(vec![]));
        arena.set_function_body(f, block);
        let root = arena.begin_root();
        arena.set_root_declarations(root, nodes(vec![f]));

        let err = emit_module(Config::default(), &arena, root).unwrap_err();
        assert!(err.downcast_ref::<IrErrorKind>().is_some());
    }
}
