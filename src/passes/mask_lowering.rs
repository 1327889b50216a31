//! Mask lowering (C5): replaces the abstract `MaskType` and its
//! mask-producing primops with explicit 64-bit integer bit math, grounded in
//! `original_source/src/shady/passes/lower_mask.c`'s per-instruction switch.
use fnv::FnvHashSet as HashSet;

use crate::arena::IrArena;
use crate::config::{Config, SubgroupMaskRepresentation};
use crate::error::Result;
use crate::node::{nodes, LetPayload, Node, NodeId, Op, PrimOpPayload, RecordSpecial};
use crate::rewrite::{rewrite_default, RewritePass, Rewriter};

/// Entry point: rewrites `root` from `src` into `dst`, eliminating `MaskType`.
pub fn lower_masks(config: Config, src: &IrArena, dst: &mut IrArena, root: NodeId) -> Result<NodeId> {
    log::debug!("lowering masks under {:?}", config.subgroup_mask_representation);
    let mut rw = Rewriter::new_importer(src, dst);
    let mut pass = MaskLoweringPass {
        mask_repr: config.subgroup_mask_representation,
    };
    rw.rewrite_node(&mut pass, root)
}

struct MaskLoweringPass {
    mask_repr: SubgroupMaskRepresentation,
}

impl RewritePass for MaskLoweringPass {
    fn rewrite(&mut self, rw: &mut Rewriter, old: NodeId) -> Result<NodeId> {
        match rw.src.get(old) {
            Node::MaskType => Ok(rw.dst.int64_type()),
            Node::Let(p) => {
                let p = p.clone();
                let instr = rw.src.get(p.instruction).clone();
                match instr {
                    Node::PrimOp(op) if op.op == Op::EmptyMask => self.lower_empty_mask(rw, &p),
                    Node::PrimOp(op) if op.op == Op::MaskIsThreadActive => {
                        self.lower_mask_is_thread_active(rw, &p, &op)
                    }
                    Node::PrimOp(op) if op.op == Op::SubgroupActiveMask => self.lower_ballot(rw, &p, None),
                    Node::PrimOp(op) if op.op == Op::SubgroupBallot => {
                        let pred = op.operands[0];
                        self.lower_ballot(rw, &p, Some(pred))
                    }
                    _ => rewrite_default(self, rw, old),
                }
            }
            _ => rewrite_default(self, rw, old),
        }
    }
}

impl MaskLoweringPass {
    fn lower_empty_mask(&mut self, rw: &mut Rewriter, p: &LetPayload) -> Result<NodeId> {
        let zero = rw.dst.int_literal(64, 0);
        for &old_var in p.vars.iter() {
            rw.register_processed(old_var, zero)?;
        }
        rw.rewrite_node(self, p.tail)
    }

    fn lower_mask_is_thread_active(
        &mut self,
        rw: &mut Rewriter,
        p: &LetPayload,
        op: &PrimOpPayload,
    ) -> Result<NodeId> {
        let mask_new = rw.rewrite_node(self, op.operands[0])?;
        let idx_new = rw.rewrite_node(self, op.operands[1])?;

        let i64t = rw.dst.int64_type();
        // No dedicated Bool node kind; the emitter special-cases this exact
        // shape (width 1, unsigned) as `OpTypeBool`.
        let bool_ty = rw.dst.int_type(1, false);
        let idx64_var = rw.dst.fresh_variable(None, i64t);
        let shifted_var = rw.dst.fresh_variable(None, i64t);
        let anded_var = rw.dst.fresh_variable(None, i64t);
        let eq_var = rw.dst.fresh_variable(None, bool_ty);

        for &old_var in p.vars.iter() {
            rw.register_processed(old_var, eq_var)?;
        }
        let new_tail = rw.rewrite_node(self, p.tail)?;

        let one = rw.dst.int_literal(64, 1);
        let eq_instr = rw.dst.primop(Op::Eq, nodes(vec![anded_var, one]));
        let eq_let = rw.dst.let_(eq_instr, nodes(vec![eq_var]), new_tail);
        let and_instr = rw.dst.primop(Op::And, nodes(vec![shifted_var, one]));
        let and_let = rw.dst.let_(and_instr, nodes(vec![anded_var]), eq_let);
        let shift_instr = rw.dst.primop(Op::RShiftLogical, nodes(vec![mask_new, idx64_var]));
        let shift_let = rw.dst.let_(shift_instr, nodes(vec![shifted_var]), and_let);
        let reinterpret_instr = rw.dst.primop(Op::Reinterpret, nodes(vec![idx_new]));
        Ok(rw.dst.let_(reinterpret_instr, nodes(vec![idx64_var]), shift_let))
    }

    /// `pred_old == None` means `subgroup_active_mask`, lowered as
    /// `subgroup_ballot(true)` per the rule "rewrite and fall through".
    fn lower_ballot(&mut self, rw: &mut Rewriter, p: &LetPayload, pred_old: Option<NodeId>) -> Result<NodeId> {
        let old_var = match p.vars.first() {
            Some(&v) => v,
            None => return rw.rewrite_node(self, p.tail),
        };
        let mut seen = HashSet::default();
        if !mentions(rw.src, p.tail, old_var, &mut seen) {
            log::debug!("dropping dead ballot bound to {:?}", old_var);
            return rw.rewrite_node(self, p.tail);
        }

        let predicate_new = match pred_old {
            Some(id) => rw.rewrite_node(self, id)?,
            None => rw.dst.true_lit(),
        };

        match self.mask_repr {
            SubgroupMaskRepresentation::I64 => {
                let i64t = rw.dst.int64_type();
                let ballot_var = rw.dst.fresh_variable(None, i64t);
                rw.register_processed(old_var, ballot_var)?;
                let new_tail = rw.rewrite_node(self, p.tail)?;
                let ballot_instr = rw.dst.primop(Op::SubgroupBallot, nodes(vec![predicate_new]));
                Ok(rw.dst.let_(ballot_instr, nodes(vec![ballot_var]), new_tail))
            }
            SubgroupMaskRepresentation::SpvKHRBallot => {
                let i32t = rw.dst.int32_type();
                let i64t = rw.dst.int64_type();
                let vec4_ty = rw.dst.record_type(nodes(vec![i32t, i32t, i32t, i32t]), None, RecordSpecial::NotSpecial);
                let ballot_var = rw.dst.fresh_variable(None, vec4_ty);
                let lane0 = rw.dst.fresh_variable(None, i32t);
                let lane1 = rw.dst.fresh_variable(None, i32t);
                let lo64 = rw.dst.fresh_variable(None, i64t);
                let hi64 = rw.dst.fresh_variable(None, i64t);
                let hi_shifted = rw.dst.fresh_variable(None, i64t);
                let final_var = rw.dst.fresh_variable(None, i64t);
                rw.register_processed(old_var, final_var)?;
                let new_tail = rw.rewrite_node(self, p.tail)?;

                let idx0 = rw.dst.int_literal(32, 0);
                let idx1 = rw.dst.int_literal(32, 1);
                let thirty_two = rw.dst.int_literal(64, 32);

                let or_instr = rw.dst.primop(Op::Or, nodes(vec![lo64, hi_shifted]));
                let or_let = rw.dst.let_(or_instr, nodes(vec![final_var]), new_tail);
                let shift_instr = rw.dst.primop(Op::LShift, nodes(vec![hi64, thirty_two]));
                let shift_let = rw.dst.let_(shift_instr, nodes(vec![hi_shifted]), or_let);
                let reinterp1 = rw.dst.primop(Op::Reinterpret, nodes(vec![lane1]));
                let reinterp1_let = rw.dst.let_(reinterp1, nodes(vec![hi64]), shift_let);
                let reinterp0 = rw.dst.primop(Op::Reinterpret, nodes(vec![lane0]));
                let reinterp0_let = rw.dst.let_(reinterp0, nodes(vec![lo64]), reinterp1_let);
                let extract1 = rw.dst.primop(Op::Extract, nodes(vec![ballot_var, idx1]));
                let extract1_let = rw.dst.let_(extract1, nodes(vec![lane1]), reinterp0_let);
                let extract0 = rw.dst.primop(Op::Extract, nodes(vec![ballot_var, idx0]));
                let extract0_let = rw.dst.let_(extract0, nodes(vec![lane0]), extract1_let);
                let ballot_instr = rw.dst.primop(Op::SubgroupBallot, nodes(vec![predicate_new]));
                Ok(rw.dst.let_(ballot_instr, nodes(vec![ballot_var]), extract0_let))
            }
        }
    }
}

/// Does `root`'s reachable subtree reference `target`? Used for the
/// dead-bind check on ballot-producing primops. Stops at declaration
/// boundaries: a variable never escapes the function it is bound in, so
/// there is no need (and no sound way, without whole-program liveness) to
/// chase a reference through a call's callee.
fn mentions(src: &IrArena, root: NodeId, target: NodeId, seen: &mut HashSet<NodeId>) -> bool {
    if root == target {
        return true;
    }
    if !seen.insert(root) {
        return false;
    }
    match src.get(root) {
        Node::IntType { .. } | Node::MaskType | Node::IntLiteral { .. } | Node::TrueLit | Node::Unreachable => false,
        Node::PtrType(p) => mentions(src, p.pointee, target, seen),
        Node::RecordType(p) => p.members.iter().any(|&m| mentions(src, m, target, seen)),
        Node::FnType(p) => p
            .params
            .iter()
            .chain(p.returns.iter())
            .any(|&m| mentions(src, m, target, seen)),
        Node::QualifiedType(p) => mentions(src, p.inner, target, seen),
        Node::Variable(p) => mentions(src, p.ty, target, seen),
        Node::PrimOp(p) => p.operands.iter().any(|&o| mentions(src, o, target, seen)),
        Node::LeafCall(p) | Node::IndirectCall(p) => {
            p.callee == target || p.args.iter().any(|&a| mentions(src, a, target, seen))
        }
        Node::Match(p) => {
            mentions(src, p.inspect, target, seen)
                || p.literals.iter().any(|&l| mentions(src, l, target, seen))
                || p.cases.iter().any(|&c| mentions(src, c, target, seen))
                || mentions(src, p.default, target, seen)
        }
        Node::Control(p) => mentions(src, p.body, target, seen),
        Node::Loop(p) => {
            p.params.iter().any(|&v| mentions(src, v, target, seen))
                || p.initial_args.iter().any(|&v| mentions(src, v, target, seen))
                || mentions(src, p.body, target, seen)
        }
        Node::If(p) => {
            mentions(src, p.condition, target, seen)
                || mentions(src, p.then_case, target, seen)
                || p.else_case.map_or(false, |e| mentions(src, e, target, seen))
        }
        Node::Let(p) => {
            mentions(src, p.instruction, target, seen)
                || p.vars.iter().any(|&v| mentions(src, v, target, seen))
                || mentions(src, p.tail, target, seen)
        }
        Node::Block(p) => {
            p.instructions.iter().any(|&i| mentions(src, i, target, seen)) || mentions(src, p.terminator, target, seen)
        }
        Node::Annotation(p) => p.args.iter().any(|&a| mentions(src, a, target, seen)),
        Node::Return(p) => p.values.iter().any(|&v| mentions(src, v, target, seen)),
        Node::Function(_) | Node::GlobalVariable(_) | Node::Root(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mask_becomes_zero_literal() {
        let mut src = IrArena::new(Config::default());
        let mask_ty = src.mask_type();
        let empty = src.primop(Op::EmptyMask, nodes(vec![]));
        let m = src.fresh_variable(None, mask_ty);
        let ret = src.return_(nodes(vec![m]));
        let body = src.let_(empty, nodes(vec![m]), ret);
        let f = src.begin_function(nodes(vec![]), nodes(vec![mask_ty]));
        src.set_function_body(f, body);

        let mut dst = IrArena::new(Config::default());
        let new_f = lower_masks(Config::default(), &src, &mut dst, f).unwrap();
        let body = match dst.get(new_f) {
            Node::Function(p) => p.body.unwrap(),
            _ => panic!("expected function"),
        };
        match dst.get(body) {
            Node::Return(p) => match dst.get(p.values[0]) {
                Node::IntLiteral { width, bits } => {
                    assert_eq!(*width, 64);
                    assert_eq!(*bits, 0);
                }
                other => panic!("expected i64 literal 0, got {:?}", other),
            },
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn dead_ballot_is_dropped() {
        let mut src = IrArena::new(Config::default());
        let p = src.true_lit();
        let ballot = src.primop(Op::SubgroupBallot, nodes(vec![p]));
        let mask_ty = src.mask_type();
        let m = src.fresh_variable(None, mask_ty);
        let ret = src.return_(nodes(vec![]));
        let body = src.let_(ballot, nodes(vec![m]), ret);
        let f = src.begin_function(nodes(vec![]), nodes(vec![]));
        src.set_function_body(f, body);

        let mut dst = IrArena::new(Config::default());
        let new_f = lower_masks(Config::default(), &src, &mut dst, f).unwrap();
        let body = match dst.get(new_f) {
            Node::Function(p) => p.body.unwrap(),
            _ => panic!("expected function"),
        };
        assert!(matches!(dst.get(body), Node::Return(_)), "dead ballot must leave only the return");
    }

    #[test]
    fn ballot_lowering_under_spv_khr_ballot_produces_expected_chain() {
        let mut src = IrArena::new(Config::default());
        let pred = src.true_lit();
        let ballot = src.primop(Op::SubgroupBallot, nodes(vec![pred]));
        let mask_ty = src.mask_type();
        let m = src.fresh_variable(None, mask_ty);
        let ret = src.return_(nodes(vec![m]));
        let body = src.let_(ballot, nodes(vec![m]), ret);
        let f = src.begin_function(nodes(vec![]), nodes(vec![mask_ty]));
        src.set_function_body(f, body);

        let mut dst = IrArena::new(Config::default());
        let new_f = lower_masks(Config::default(), &src, &mut dst, f).unwrap();
        let mut count_extract = 0;
        let mut count_reinterpret = 0;
        for node in dst.nodes() {
            if let Node::PrimOp(pp) = node {
                match pp.op {
                    Op::Extract => count_extract += 1,
                    Op::Reinterpret => count_reinterpret += 1,
                    _ => {}
                }
            }
        }
        assert_eq!(count_extract, 2);
        assert_eq!(count_reinterpret, 2);
    }
}
